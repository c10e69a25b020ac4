//! Prompt template loading and rendering via `minijinja`.
//!
//! Each request kind has a system template and a user template, compiled
//! into the binary from `templates/`. Contexts are rendered straight from
//! their `serde` form, so a template sees the same field names the JSON
//! does.

use minijinja::Environment;
use serde::Serialize;

use crate::error::LlmError;

/// The complete rendered prompt ready to send to an LLM backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// System message setting the task and the reply format.
    pub system: String,
    /// User message with the concrete situation.
    pub user: String,
}

/// What a prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// The next action of an agent.
    Decision,
    /// A conversation between two agents.
    Conversation,
    /// A personality profile.
    Personality,
    /// A daily schedule.
    Schedule,
}

impl PromptKind {
    const fn system_name(self) -> &'static str {
        match self {
            Self::Decision => "decision_system",
            Self::Conversation => "conversation_system",
            Self::Personality => "personality_system",
            Self::Schedule => "schedule_system",
        }
    }

    const fn user_name(self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Conversation => "conversation",
            Self::Personality => "personality",
            Self::Schedule => "schedule",
        }
    }
}

const TEMPLATES: [(&str, &str); 8] = [
    ("decision_system", include_str!("../templates/decision_system.j2")),
    ("decision", include_str!("../templates/decision.j2")),
    ("conversation_system", include_str!("../templates/conversation_system.j2")),
    ("conversation", include_str!("../templates/conversation.j2")),
    ("personality_system", include_str!("../templates/personality_system.j2")),
    ("personality", include_str!("../templates/personality.j2")),
    ("schedule_system", include_str!("../templates/schedule_system.j2")),
    ("schedule", include_str!("../templates/schedule.j2")),
];

/// Manages prompt template rendering.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Create a prompt engine with the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] if a template does not compile.
    pub fn new() -> Result<Self, LlmError> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .map_err(|e| LlmError::Template(format!("failed to add {name} template: {e}")))?;
        }
        Ok(Self { env })
    }

    /// Render the system and user prompt for a request.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] if rendering fails.
    pub fn render<C: Serialize>(&self, kind: PromptKind, context: &C) -> Result<RenderedPrompt, LlmError> {
        Ok(RenderedPrompt {
            system: self.render_one(kind.system_name(), context)?,
            user: self.render_one(kind.user_name(), context)?,
        })
    }

    fn render_one<C: Serialize>(&self, name: &str, context: &C) -> Result<String, LlmError> {
        self.env
            .get_template(name)
            .map_err(|e| LlmError::Template(format!("missing {name} template: {e}")))?
            .render(context)
            .map_err(|e| LlmError::Template(format!("{name} render failed: {e}")))
    }
}
