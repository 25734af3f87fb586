//! Seams for the side effects a flow has on whoever drives it: user
//! notifications and navigation.

use std::fmt;

use tracing::{error, info};

/// Severity of a [`Notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

/// A transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Receives the notifications raised by flows.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that turns notifications into log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => {
                error!(title = %notification.title, "{}", notification.message)
            }
            NotificationLevel::Success => {
                info!(title = %notification.title, "{}", notification.message)
            }
        }
    }
}

/// Pages a flow can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Welcome,
    ImageUpload,
    MaskUpload,
    DataSplit,
    Transformations,
    VisualAttributes,
    PreProcessing,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Welcome => "/",
            Route::ImageUpload => "/upload_data/images",
            Route::MaskUpload => "/upload_data/masks",
            Route::DataSplit => "/settings/data_split",
            Route::Transformations => "/settings/select_transformation",
            Route::VisualAttributes => "/settings/visual_attributes_file",
            Route::PreProcessing => "/settings/pre_processing",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Moves the user to another page.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator for headless use; only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, route: Route) {
        info!(route = %route, "Navigate");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_paths() {
        assert_eq!(Route::Welcome.to_string(), "/");
        assert_eq!(Route::ImageUpload.path(), "/upload_data/images");
    }

    #[test]
    fn test_notification_constructors() {
        let n: Notification = Notification::error("Resize Failed", "Failed to resize uploaded images.");
        assert_eq!(n.level, NotificationLevel::Error);
        assert_eq!(n.title, "Resize Failed");
    }
}
