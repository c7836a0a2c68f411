//! Access predicates for chat commands.

use crate::bot::commands::Command;

/// Commands that change monitoring need an active subscription.
pub fn requires_subscription(command: &Command) -> bool {
    matches!(
        command,
        Command::StartMonitor { .. } | Command::StopMonitor
    )
}

/// Commands restricted to configured admins.
pub fn requires_admin(command: &Command) -> bool {
    matches!(command, Command::ListSubscribers | Command::Test)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_control_needs_subscription() {
        assert!(requires_subscription(&Command::StartMonitor {
            interval_secs: None
        }));
        assert!(requires_subscription(&Command::StopMonitor));
        assert!(!requires_subscription(&Command::Status));
        assert!(!requires_subscription(&Command::SetInterval {
            interval_secs: 60
        }));
        assert!(!requires_subscription(&Command::Subscribe));
    }

    #[test]
    fn test_admin_commands() {
        assert!(requires_admin(&Command::ListSubscribers));
        assert!(requires_admin(&Command::Test));
        assert!(!requires_admin(&Command::StartMonitor {
            interval_secs: None
        }));
        assert!(!requires_admin(&Command::Status));
    }
}
