//! Engine configuration.

use crate::engine::{database::DEFAULT_PROFILE, restart::DEFAULT_MAX_RESTARTS};

/// Settings for an [`Engine`](crate::engine::Engine).
///
/// `options` are option commands in the textual protocol (e.g. `"togglerule doubleshift
/// off"`), applied in order after the profile is made current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Profile whose root action is run.
    pub current_action: String,
    /// Maximum restarts per function.
    pub max_restarts: usize,
    /// Verify the IR after every committed rewrite (slow; for testing new rules)
    pub check_invariants: bool,
    /// Option commands applied at construction.
    pub options: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            current_action: DEFAULT_PROFILE.to_string(),
            max_restarts: DEFAULT_MAX_RESTARTS,
            check_invariants: false,
            options: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// The default configuration with invariant checking switched on.
    #[must_use]
    pub fn checked() -> Self {
        Self {
            check_invariants: true,
            ..Self::default()
        }
    }

    /// Runs profile `name` instead of the default one.
    #[must_use]
    pub fn with_action(mut self, name: impl Into<String>) -> Self {
        self.current_action = name.into();
        self
    }

    /// Sets the restart bound.
    #[must_use]
    pub fn with_max_restarts(mut self, max: usize) -> Self {
        self.max_restarts = max;
        self
    }

    /// Appends an option command.
    #[must_use]
    pub fn with_option(mut self, command: impl Into<String>) -> Self {
        self.options.push(command.into());
        self
    }
}
