//! Worker lifecycle states.

use serde::{Deserialize, Serialize};

/// Where a worker instance is in its install/activate lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Script evaluated, no lifecycle event seen yet.
    #[default]
    Parsed,
    /// Install handler running.
    Installing,
    /// Install finished; waiting to activate.
    Installed,
    /// Activate handler running.
    Activating,
    /// Controlling pages and routing fetches.
    Active,
    /// Install or activation failed; this instance will never route.
    Redundant,
}

impl LifecycleState {
    /// Whether fetches are routed through the worker.
    pub fn is_active(&self) -> bool {
        matches!(self, LifecycleState::Active)
    }

    /// Whether `install` may run from this state.
    pub fn can_install(&self) -> bool {
        matches!(self, LifecycleState::Parsed)
    }

    /// Whether `activate` may run from this state.
    pub fn can_activate(&self) -> bool {
        matches!(self, LifecycleState::Installed)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions_allowed() {
        assert!(LifecycleState::Parsed.can_install());
        assert!(!LifecycleState::Installed.can_install());
        assert!(LifecycleState::Installed.can_activate());
        assert!(!LifecycleState::Redundant.can_activate());
        assert!(LifecycleState::Active.is_active());
        assert!(!LifecycleState::Activating.is_active());
    }

    #[test]
    fn test_lifecycle_display() {
        assert_eq!(LifecycleState::default().to_string(), "parsed");
        assert_eq!(LifecycleState::Redundant.to_string(), "redundant");
    }
}
