//! Console output for flow notifications and navigation.

use morph_split_orchestrator::{Navigator, Notification, NotificationLevel, Notifier, Route};

/// Prints notifications: successes to stdout, errors to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        let line: String = format_notification(&notification);
        match notification.level {
            NotificationLevel::Error => eprintln!("{}", line),
            NotificationLevel::Success => println!("{}", line),
        }
    }
}

/// Prints the page the web front-end would move to next.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, route: Route) {
        println!("-> {}", route);
    }
}

fn format_notification(notification: &Notification) -> String {
    let marker: &str = match notification.level {
        NotificationLevel::Success => "ok",
        NotificationLevel::Error => "error",
    };
    if notification.message.is_empty() {
        format!("[{}] {}", marker, notification.title)
    } else {
        format!("[{}] {}: {}", marker, notification.title, notification.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_notification() {
        let line: String = format_notification(&Notification::error(
            "Resize Failed",
            "Failed to resize uploaded images.",
        ));
        assert_eq!(line, "[error] Resize Failed: Failed to resize uploaded images.");

        let line: String = format_notification(&Notification::success("Session Ended", ""));
        assert_eq!(line, "[ok] Session Ended");
    }
}
