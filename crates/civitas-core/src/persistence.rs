//! Best-effort snapshot persistence.
//!
//! Snapshots live in a key-value store as JSON strings. Writes happen every
//! N ticks and once at shutdown, never on every tick. On startup, whatever
//! is found is restored; a missing key is not an error.
//!
//! # Key Patterns
//!
//! | Pattern | Description |
//! |---------|-------------|
//! | `city:clock` | Clock and weather |
//! | `agent:{id}:state` | Full agent snapshot |

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use civitas_agents::AgentSnapshot;
use civitas_types::{AgentId, Weather};

use crate::clock::{CityClock, ClockSnapshot};
use crate::tick::CityState;

/// Key of the city-level snapshot.
const CITY_KEY: &str = "city:clock";

/// Errors that can occur while reading or writing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The store could not be read or written.
    #[error("snapshot I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A snapshot could not be encoded or decoded.
    #[error("snapshot serialization error: {source}")]
    Serialization {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// Clock and weather, saved next to the agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySnapshot {
    /// Clock state.
    pub clock: ClockSnapshot,
    /// Weather at snapshot time.
    pub weather: Weather,
}

/// Key for an agent snapshot.
pub fn agent_key(id: AgentId) -> String {
    format!("agent:{id}:state")
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// A string key-value store for snapshots.
pub trait SnapshotStore {
    /// Store `value` at `key`, replacing what was there.
    fn put(
        &mut self,
        key: &str,
        value: String,
    ) -> impl Future<Output = Result<(), PersistError>> + Send;

    /// Read the value at `key`, or `None` if it was never written.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, PersistError>> + Send;
}

/// Keeps snapshots in memory. Used in tests and when persistence is off.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    entries: BTreeMap<String, String>,
}

impl MemorySnapshotStore {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    async fn put(&mut self, key: &str, value: String) -> Result<(), PersistError> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.entries.get(key).cloned())
    }
}

/// Keeps one JSON file per key in a directory.
///
/// Writes go to a temporary file that is renamed into place, so a crash
/// mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    directory: PathBuf,
}

impl FileSnapshotStore {
    /// Use `directory`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Io`] if the directory cannot be created.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;
        Ok(Self { directory })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.directory.join(format!("{file}.json"))
    }
}

impl SnapshotStore for FileSnapshotStore {
    async fn put(&mut self, key: &str, value: String) -> Result<(), PersistError> {
        let path = self.path_for(key);
        let partial = path.with_extension("json.tmp");
        tokio::fs::write(&partial, value).await?;
        tokio::fs::rename(&partial, &path).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Counts from one save or restore pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    /// Agents written or restored.
    pub agents: u32,
    /// Agents that failed.
    pub failed: u32,
    /// Whether the city snapshot was written or restored.
    pub city: bool,
}

/// Snapshot policy on top of a store.
#[derive(Debug)]
pub struct Persistence<S> {
    store: S,
    interval_ticks: u64,
}

impl<S: SnapshotStore> Persistence<S> {
    /// Save every `interval_ticks` ticks; 0 only saves on request.
    pub const fn new(store: S, interval_ticks: u64) -> Self {
        Self {
            store,
            interval_ticks,
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Whether a save is due after `tick`.
    pub const fn due(&self, tick: u64) -> bool {
        tick > 0 && matches!(tick.checked_rem(self.interval_ticks), Some(0))
    }

    async fn put_json<T: Serialize + Sync>(&mut self, key: &str, value: &T) -> Result<(), PersistError> {
        let json = serde_json::to_string(value)?;
        self.store.put(key, json).await
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PersistError> {
        match self.store.get(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Write every agent and the city.
    ///
    /// Failures are logged and counted; a failed agent does not stop the
    /// others from being written.
    pub async fn save(&mut self, state: &CityState) -> PersistReport {
        let mut report = PersistReport::default();
        let city = CitySnapshot {
            clock: state.clock.snapshot(),
            weather: state.weather.current(),
        };
        match self.put_json(CITY_KEY, &city).await {
            Ok(()) => report.city = true,
            Err(e) => warn!(error = %e, "Failed to save city snapshot"),
        }

        for agent in state.agents() {
            match self.put_json(&agent_key(agent.id), &agent.snapshot()).await {
                Ok(()) => report.agents = report.agents.saturating_add(1),
                Err(e) => {
                    report.failed = report.failed.saturating_add(1);
                    warn!(agent_id = %agent.id, error = %e, "Failed to save agent snapshot");
                }
            }
        }
        info!(
            tick = state.clock.tick(),
            agents = report.agents,
            failed = report.failed,
            "Snapshot saved"
        );
        report
    }

    /// Save if one is due after `tick`.
    pub async fn save_if_due(&mut self, tick: u64, state: &CityState) -> Option<PersistReport> {
        if self.due(tick) {
            Some(self.save(state).await)
        } else {
            None
        }
    }

    /// Restore the city and every agent that has a snapshot.
    ///
    /// Missing snapshots are skipped; unreadable ones are logged and
    /// counted as failed.
    pub async fn restore(&self, state: &mut CityState) -> PersistReport {
        let mut report = PersistReport::default();
        match self.get_json::<CitySnapshot>(CITY_KEY).await {
            Ok(Some(city)) => {
                state.clock = CityClock::from_snapshot(city.clock);
                state.weather.set_current(city.weather);
                report.city = true;
            }
            Ok(None) => debug!("No city snapshot"),
            Err(e) => warn!(error = %e, "Failed to read city snapshot"),
        }

        let ids: Vec<AgentId> = state.agents().iter().map(|a| a.id).collect();
        for id in ids {
            match self.get_json::<AgentSnapshot>(&agent_key(id)).await {
                Ok(Some(snapshot)) => match state.restore_agent(snapshot) {
                    Ok(()) => report.agents = report.agents.saturating_add(1),
                    Err(e) => {
                        report.failed = report.failed.saturating_add(1);
                        warn!(agent_id = %id, error = %e, "Failed to restore agent");
                    }
                },
                Ok(None) => debug!(agent_id = %id, "No snapshot for agent"),
                Err(e) => {
                    report.failed = report.failed.saturating_add(1);
                    warn!(agent_id = %id, error = %e, "Failed to read agent snapshot");
                }
            }
        }
        if report.city || report.agents > 0 {
            info!(agents = report.agents, failed = report.failed, "Snapshot restored");
        }
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use civitas_agents::{Agent, AgentSpawn, AgentState};
    use civitas_types::{DailySchedule, Personality, Position};
    use civitas_world::create_starting_city;

    use super::*;
    use crate::config::SimulationConfig;

    fn make_state() -> (CityState, AgentId) {
        let (registry, ids) = create_starting_city().unwrap();
        let mut state = CityState::new(&SimulationConfig::default(), registry).unwrap();
        let agent = Agent::new(
            AgentSpawn {
                name: String::from("Ada"),
                occupation: String::from("clerk"),
                position: Position::default(),
                residence: ids.residences.first().copied(),
                workplace: None,
                personality: Personality::default(),
                schedule: DailySchedule::default(),
            },
            state.memory,
        );
        let id = state.add_agent(agent).unwrap();
        (state, id)
    }

    #[tokio::test]
    async fn missing_snapshot_is_not_an_error() {
        let (mut state, _) = make_state();
        let persistence = Persistence::new(MemorySnapshotStore::new(), 10);
        let report = persistence.restore(&mut state).await;
        assert_eq!(report, PersistReport::default());
    }

    #[tokio::test]
    async fn memory_store_round_trips_agent_state() {
        let (mut state, id) = make_state();
        state.agent_mut(id).unwrap().set_state(AgentState {
            energy: 42.0,
            ..AgentState::default()
        });
        let mut persistence = Persistence::new(MemorySnapshotStore::new(), 10);
        let saved = persistence.save(&state).await;
        assert_eq!(saved.agents, 1);
        assert!(saved.city);
        assert_eq!(persistence.store().len(), 2);

        state.agent_mut(id).unwrap().set_state(AgentState::default());
        let restored = persistence.restore(&mut state).await;
        assert_eq!(restored.agents, 1);
        assert!((state.agent(id).unwrap().state().energy - 42.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (mut state, id) = make_state();
        state.agent_mut(id).unwrap().set_state(AgentState {
            stress: 77.0,
            ..AgentState::default()
        });

        let store = FileSnapshotStore::open(dir.path()).await.unwrap();
        let mut persistence = Persistence::new(store, 10);
        persistence.save(&state).await;

        let reopened = FileSnapshotStore::open(dir.path()).await.unwrap();
        let value = reopened.get(&agent_key(id)).await.unwrap().unwrap();
        let snapshot: AgentSnapshot = serde_json::from_str(&value).unwrap();
        assert_eq!(snapshot.id, id);
        assert!((snapshot.state.stress - 77.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn file_store_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).await.unwrap();
        assert!(store.get("agent:nobody:state").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_counted_not_fatal() {
        let (mut state, id) = make_state();
        let mut store = MemorySnapshotStore::new();
        store.put(&agent_key(id), String::from("{not json")).await.unwrap();
        let persistence = Persistence::new(store, 10);
        let report = persistence.restore(&mut state).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.agents, 0);
    }

    #[test]
    fn saves_on_interval_only() {
        let persistence = Persistence::new(MemorySnapshotStore::new(), 10);
        assert!(!persistence.due(0));
        assert!(!persistence.due(9));
        assert!(persistence.due(10));
        assert!(persistence.due(20));
        let never = Persistence::new(MemorySnapshotStore::new(), 0);
        assert!(!never.due(10));
    }
}
