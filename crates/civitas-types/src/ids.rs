//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Agents and buildings each get a strongly-typed ID so the two can never
//! be mixed up at compile time. IDs use UUID v7 (time-ordered), which keeps
//! snapshot keys sortable by creation order.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }

            /// Parse an identifier from its hyphenated string form.
            ///
            /// Returns `None` for anything that is not a valid UUID.
            pub fn parse(s: &str) -> Option<Self> {
                Uuid::parse_str(s.trim()).ok().map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a resident agent.
    AgentId
}

define_id! {
    /// Unique identifier for a building in the city.
    BuildingId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let agent = AgentId::new();
        let building = BuildingId::new();
        assert_ne!(agent.into_inner(), Uuid::nil());
        assert_ne!(building.into_inner(), Uuid::nil());
    }

    #[test]
    fn parse_accepts_display_output() {
        let id = BuildingId::new();
        assert_eq!(BuildingId::parse(&id.to_string()), Some(id));
        assert_eq!(BuildingId::parse(&format!("  {id} ")), Some(id));
    }

    #[test]
    fn parse_rejects_names() {
        assert!(BuildingId::parse("park_1").is_none());
        assert!(AgentId::parse("").is_none());
    }
}
