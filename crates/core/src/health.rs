//! Readiness derived from the runtime's human-readable container status.
//!
//! The status grammar assumed here is the one container runtimes print in
//! their listing output:
//!
//! ```text
//! status  := "Created" | "Restarting" ... | "Paused" ...
//!          | "Exited (<code>) <ago>"
//!          | "Up <duration>" [ " (" health ")" ]
//! health  := "healthy" | "unhealthy" | "health: starting"
//! ```
//!
//! Only the parenthesised health suffix of a running instance is
//! interpreted; the duration text is never parsed.

use std::fmt::Display;

const HEALTHY_SUFFIX: &str = " (healthy)";
const UNHEALTHY_SUFFIX: &str = " (unhealthy)";
const STARTING_SUFFIX: &str = " (health: starting)";
const RUNNING_PREFIX: &str = "Up ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// The status string is outside the known vocabulary, or the instance is
    /// not running.
    Unknown,
    /// Running, but the health check has not passed (yet).
    Starting,
    Healthy,
    /// The probe itself failed: the runtime could not be queried or does not
    /// know the instance.
    Unreachable,
}

impl HealthState {
    pub fn from_status(status: &str) -> Self {
        let status = status.trim();

        if status.ends_with(HEALTHY_SUFFIX) {
            return Self::Healthy;
        }

        if !status.starts_with(RUNNING_PREFIX) {
            return Self::Unknown;
        }

        if status.ends_with(STARTING_SUFFIX) || status.ends_with(UNHEALTHY_SUFFIX) {
            return Self::Starting;
        }

        // running without a declared health check never becomes healthy
        if status.ends_with(')') {
            return Self::Unknown;
        }

        Self::Starting
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Unknown => "unknown",
            Self::Starting => "starting",
            Self::Healthy => "healthy",
            Self::Unreachable => "unreachable",
        };

        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_requires_exact_suffix() {
        assert_eq!(
            HealthState::from_status("Up 3 minutes (healthy)"),
            HealthState::Healthy
        );
        assert_eq!(
            HealthState::from_status("Up 3 minutes (unhealthy)"),
            HealthState::Starting
        );
        assert_eq!(
            HealthState::from_status("Up 3 minutes (healthy) "),
            HealthState::Healthy
        );
        assert_ne!(
            HealthState::from_status("Up 3 minutes (healthy-ish)"),
            HealthState::Healthy
        );
    }

    #[test]
    fn starting_states() {
        assert_eq!(
            HealthState::from_status("Up 2 seconds (health: starting)"),
            HealthState::Starting
        );
        assert_eq!(HealthState::from_status("Up 2 seconds"), HealthState::Starting);
    }

    #[test]
    fn non_running_states_are_unknown() {
        assert_eq!(HealthState::from_status("Created"), HealthState::Unknown);
        assert_eq!(
            HealthState::from_status("Exited (137) 5 seconds ago"),
            HealthState::Unknown
        );
        assert_eq!(HealthState::from_status(""), HealthState::Unknown);
    }
}
