//! Capabilities the adapter expects from its host environment.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::notification::Notification;
use crate::error::CapabilityError;

/// Outcome of a notification permission query or prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionState {
    /// The user has not decided yet (browser `default`).
    Default,
    /// The user will be asked on the next request (native `prompt`).
    Prompt,
    /// As `Prompt`, with a rationale shown first.
    PromptWithRationale,
    /// Notifications may be shown.
    Granted,
    /// Notifications are blocked.
    Denied,
}

impl PermissionState {
    /// Wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Prompt => "prompt",
            Self::PromptWithRationale => "prompt-with-rationale",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle to a held screen wake lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WakeLockHandle(pub u64);

/// Device description reported by the native bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Platform name: `android`, `ios` or `web`.
    pub platform: String,
    /// Device model, if reported.
    #[serde(default)]
    pub model: Option<String>,
    /// Operating system version, if reported.
    #[serde(default)]
    pub os_version: Option<String>,
}

/// Native plugins the adapter may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plugin {
    /// Local notification scheduling.
    LocalNotifications,
    /// Keep-awake / allow-sleep.
    KeepAwake,
    /// Background execution mode.
    BackgroundMode,
    /// Device information.
    Device,
    /// App-level helpers such as opening URLs.
    App,
}

impl Plugin {
    /// Name the bridge registers the plugin under.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LocalNotifications => "LocalNotifications",
            Self::KeepAwake => "KeepAwake",
            Self::BackgroundMode => "BackgroundMode",
            Self::Device => "Device",
            Self::App => "App",
        }
    }
}

/// Browser web APIs used in a plain tab.
#[async_trait]
pub trait BrowserApis: Send + Sync {
    /// Current notification permission, or `None` if notifications are unsupported.
    fn notification_permission(&self) -> Option<PermissionState>;

    /// Prompts the user for notification permission.
    async fn request_notification_permission(&self) -> Result<PermissionState, CapabilityError>;

    /// Displays a notification.
    async fn show_notification(&self, notification: &Notification) -> Result<(), CapabilityError>;

    /// Closes the notification carrying `tag`, if it is still shown.
    async fn close_notification(&self, tag: &str);

    /// Whether the screen wake lock API exists.
    fn wake_lock_supported(&self) -> bool;

    /// Acquires a screen wake lock.
    async fn request_wake_lock(&self) -> Result<WakeLockHandle, CapabilityError>;

    /// Releases a previously acquired wake lock.
    async fn release_wake_lock(&self, handle: WakeLockHandle);
}

/// Native plugin bridge of a wrapped app.
#[async_trait]
pub trait NativeBridge: Send + Sync {
    /// Whether the page runs inside the native wrapper.
    fn is_native_platform(&self) -> bool;

    /// Whether `plugin` is registered with the bridge.
    fn has_plugin(&self, plugin: Plugin) -> bool;

    /// Requests notification permission from the OS.
    async fn request_notification_permissions(&self) -> Result<PermissionState, CapabilityError>;

    /// Schedules local notifications.
    async fn schedule(&self, notifications: &[Notification]) -> Result<(), CapabilityError>;

    /// Keeps the screen on.
    async fn keep_awake(&self) -> Result<(), CapabilityError>;

    /// Lets the screen turn off again.
    async fn allow_sleep(&self) -> Result<(), CapabilityError>;

    /// Enables background execution.
    async fn enable_background_mode(&self) -> Result<(), CapabilityError>;

    /// Describes the device.
    async fn device_info(&self) -> Result<DeviceInfo, CapabilityError>;

    /// Opens a URL or settings deep link.
    async fn open_url(&self, url: &str) -> Result<(), CapabilityError>;
}

/// Blocking acknowledgment channel to the user (an `alert` in a page).
#[async_trait]
pub trait UserNotifier: Send + Sync {
    /// Shows `message` and returns once the user dismissed it.
    async fn alert(&self, message: &str);
}

/// Browser host without notification or wake lock support.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessBrowser;

#[async_trait]
impl BrowserApis for HeadlessBrowser {
    fn notification_permission(&self) -> Option<PermissionState> {
        None
    }

    async fn request_notification_permission(&self) -> Result<PermissionState, CapabilityError> {
        Err(CapabilityError::Unavailable("Notification"))
    }

    async fn show_notification(&self, _notification: &Notification) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unavailable("Notification"))
    }

    async fn close_notification(&self, _tag: &str) {}

    fn wake_lock_supported(&self) -> bool {
        false
    }

    async fn request_wake_lock(&self) -> Result<WakeLockHandle, CapabilityError> {
        Err(CapabilityError::Unavailable("WakeLock"))
    }

    async fn release_wake_lock(&self, _handle: WakeLockHandle) {}
}
