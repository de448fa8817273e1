//! Cross-platform notification, wake lock and battery capability adapter.
//!
//! The adapter decides once, at construction, whether it runs in a plain
//! browser tab ([`Platform::Web`]) or inside the native wrapper
//! ([`Platform::Native`]), and implements every operation for both. Missing
//! or failing host capabilities never reach the caller: they degrade to a
//! no-op, a status result, or a message through the [`UserNotifier`].

mod host;
mod notification;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::config::AdapterConfig;
use crate::error::CapabilityError;

pub use host::{
    BrowserApis, DeviceInfo, HeadlessBrowser, NativeBridge, PermissionState, Plugin,
    UserNotifier, WakeLockHandle,
};
pub use notification::{MAX_PRIORITY, Notification, Schedule, id_from_time};

/// Tag of the notification shown after notification permission was granted.
pub const PERMISSION_TEST_TAG: &str = "permission-test";

/// Identifier of the native confirmation notification.
pub const PERMISSION_TEST_ID: i32 = 999_999;

/// Result of [`CapabilityAdapter::send_system_alarm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmOutcome {
    /// A native notification was scheduled.
    Scheduled,
    /// Not handled here; the caller shows its own browser notification.
    Deferred,
    /// The native notification could not be scheduled.
    Failed,
}

impl AlarmOutcome {
    /// Returns true if the alarm was scheduled by the adapter.
    #[must_use]
    pub const fn is_scheduled(self) -> bool {
        matches!(self, Self::Scheduled)
    }
}

#[derive(Debug, Default)]
struct WakeState {
    handle: Option<WakeLockHandle>,
    awake: bool,
    reacquired: bool,
}

/// Browser tab environment.
pub struct WebPlatform {
    browser: Arc<dyn BrowserApis>,
    wake: Mutex<WakeState>,
}

/// Native wrapper environment.
pub struct NativePlatform {
    bridge: Arc<dyn NativeBridge>,
}

/// Host environment, decided once.
pub enum Platform {
    /// Plain browser tab.
    Web(WebPlatform),
    /// Native wrapper with a plugin bridge.
    Native(NativePlatform),
}

impl Platform {
    /// Picks the native variant when a bridge is present and reports a
    /// native platform, the web variant otherwise.
    #[must_use]
    pub fn detect(browser: Arc<dyn BrowserApis>, bridge: Option<Arc<dyn NativeBridge>>) -> Self {
        match bridge {
            Some(bridge) if bridge.is_native_platform() => Self::native(bridge),
            _ => Self::web(browser),
        }
    }

    /// Web variant over `browser`.
    #[must_use]
    pub fn web(browser: Arc<dyn BrowserApis>) -> Self {
        Self::Web(WebPlatform {
            browser,
            wake: Mutex::new(WakeState::default()),
        })
    }

    /// Native variant over `bridge`.
    #[must_use]
    pub fn native(bridge: Arc<dyn NativeBridge>) -> Self {
        Self::Native(NativePlatform { bridge })
    }

    /// Returns true for the native variant.
    #[must_use]
    pub const fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }
}

/// Uniform capability surface over a [`Platform`].
pub struct CapabilityAdapter {
    platform: Platform,
    notifier: Arc<dyn UserNotifier>,
    config: AdapterConfig,
}

impl CapabilityAdapter {
    /// Creates an adapter for an already detected platform.
    #[must_use]
    pub fn new(platform: Platform, notifier: Arc<dyn UserNotifier>, config: AdapterConfig) -> Self {
        log::info!(
            "Capability adapter running in {} mode",
            if platform.is_native() { "native" } else { "web" }
        );
        Self {
            platform,
            notifier,
            config,
        }
    }

    /// Detects the platform and creates an adapter for it.
    #[must_use]
    pub fn detect(
        browser: Arc<dyn BrowserApis>,
        bridge: Option<Arc<dyn NativeBridge>>,
        notifier: Arc<dyn UserNotifier>,
        config: AdapterConfig,
    ) -> Self {
        Self::new(Platform::detect(browser, bridge), notifier, config)
    }

    /// The platform this adapter was built for.
    #[must_use]
    pub const fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Returns true in the native wrapper.
    #[must_use]
    pub const fn is_native(&self) -> bool {
        self.platform.is_native()
    }

    /// Native start-up: request permissions and enable background mode.
    /// Does nothing in a browser tab.
    pub async fn initialize(&self) {
        if !self.is_native() {
            return;
        }
        self.request_permissions().await;
        self.setup_background_mode().await;
    }

    /// Asks for notification permission and reports the outcome to the user.
    ///
    /// Returns whether the request went through: in a tab, whether
    /// notifications are now granted; in the wrapper, whether the bridge
    /// calls succeeded.
    pub async fn request_permissions(&self) -> bool {
        match &self.platform {
            Platform::Web(web) => self.request_web_permissions(web).await,
            Platform::Native(native) => match self.request_native_permissions(native).await {
                Ok(results) => {
                    self.notifier
                        .alert(&format!("Permission Results:\n{}", results.join("\n")))
                        .await;
                    true
                }
                Err(e) => {
                    log::error!("Permission request failed: {e}");
                    self.notifier
                        .alert(&format!("Permission request failed: {e}"))
                        .await;
                    false
                }
            },
        }
    }

    async fn request_web_permissions(&self, web: &WebPlatform) -> bool {
        let Some(current) = web.browser.notification_permission() else {
            self.notifier
                .alert("Notifications not supported in this browser")
                .await;
            return false;
        };
        log::debug!("Current notification permission: {current}");

        if current == PermissionState::Granted {
            self.notifier.alert("Notifications already enabled!").await;
            return true;
        }

        let state = match web.browser.request_notification_permission().await {
            Ok(state) => state,
            Err(e) => {
                log::warn!("Notification permission prompt failed: {e}");
                PermissionState::Denied
            }
        };
        log::info!("Notification permission: {state}");

        if state != PermissionState::Granted {
            self.notifier
                .alert("Notification permission denied. Please enable in browser settings.")
                .await;
            return false;
        }

        let confirmation = Notification::new(
            0,
            format!("{} Permissions", self.config.app_name),
            "Notifications are now enabled!",
        )
        .with_icon(self.config.icon.clone())
        .with_tag(PERMISSION_TEST_TAG);

        match web.browser.show_notification(&confirmation).await {
            Ok(()) => {
                let browser = Arc::clone(&web.browser);
                let dismiss_after = self.config.confirmation_dismiss();
                tokio::spawn(async move {
                    tokio::time::sleep(dismiss_after).await;
                    browser.close_notification(PERMISSION_TEST_TAG).await;
                });
                self.notifier
                    .alert("Notification permission granted!")
                    .await;
            }
            Err(e) => {
                self.notifier
                    .alert(&format!(
                        "Permission granted but notification failed: {e}"
                    ))
                    .await;
            }
        }
        true
    }

    async fn request_native_permissions(
        &self,
        native: &NativePlatform,
    ) -> Result<Vec<String>, CapabilityError> {
        let bridge = &native.bridge;
        if !bridge.has_plugin(Plugin::LocalNotifications) {
            return Ok(vec!["Notifications: Plugin not available".to_string()]);
        }

        let state = bridge.request_notification_permissions().await?;
        log::info!("Native notification permission: {state}");

        if state == PermissionState::Granted {
            let confirmation = Notification::new(
                PERMISSION_TEST_ID,
                format!("{} Permissions", self.config.app_name),
                "Native notifications enabled!",
            )
            .fire_after(Utc::now(), self.config.confirmation_delay());
            bridge.schedule(&[confirmation]).await?;
        }
        Ok(vec![format!("Notifications: {state}")])
    }

    /// Keeps the screen on until [`allow_screen_sleep`](Self::allow_screen_sleep).
    ///
    /// In a tab a wake lock is acquired and, if the browser revokes it, taken
    /// again once through [`handle_wake_lock_release`](Self::handle_wake_lock_release).
    /// Failures are logged and ignored.
    pub async fn keep_screen_awake(&self) {
        match &self.platform {
            Platform::Web(web) => {
                if !web.browser.wake_lock_supported() {
                    log::debug!("Wake lock not supported");
                    return;
                }
                let mut wake = web.wake.lock().await;
                wake.awake = true;
                wake.reacquired = false;
                if wake.handle.is_some() {
                    return;
                }
                match web.browser.request_wake_lock().await {
                    Ok(handle) => {
                        log::info!("Web wake lock activated");
                        wake.handle = Some(handle);
                    }
                    Err(e) => {
                        log::warn!("Wake lock failed: {e}");
                        wake.awake = false;
                    }
                }
            }
            Platform::Native(native) => {
                if !native.bridge.has_plugin(Plugin::KeepAwake) {
                    log::warn!("{} plugin not available", Plugin::KeepAwake.name());
                    return;
                }
                if let Err(e) = native.bridge.keep_awake().await {
                    log::warn!("Keep awake failed: {e}");
                }
            }
        }
    }

    /// Lets the screen sleep again, releasing any held wake lock.
    pub async fn allow_screen_sleep(&self) {
        match &self.platform {
            Platform::Web(web) => {
                let mut wake = web.wake.lock().await;
                wake.awake = false;
                if let Some(handle) = wake.handle.take() {
                    web.browser.release_wake_lock(handle).await;
                    log::info!("Web wake lock released");
                }
            }
            Platform::Native(native) => {
                if !native.bridge.has_plugin(Plugin::KeepAwake) {
                    log::warn!("{} plugin not available", Plugin::KeepAwake.name());
                    return;
                }
                if let Err(e) = native.bridge.allow_sleep().await {
                    log::warn!("Allow sleep failed: {e}");
                }
            }
        }
    }

    /// Host notification that the browser released `handle` on its own,
    /// for example because the page was hidden.
    ///
    /// The handle is forgotten. If the screen should still stay awake and no
    /// automatic re-acquisition happened since the last
    /// [`keep_screen_awake`](Self::keep_screen_awake), one new lock is
    /// requested; failure is swallowed. Returns whether a lock is held
    /// afterwards. Stale handles and native mode are ignored.
    pub async fn handle_wake_lock_release(&self, handle: WakeLockHandle) -> bool {
        let Platform::Web(web) = &self.platform else {
            return false;
        };
        let mut wake = web.wake.lock().await;
        if wake.handle != Some(handle) {
            return wake.handle.is_some();
        }
        wake.handle = None;

        if !wake.awake || wake.reacquired {
            log::info!("Wake lock released");
            return false;
        }
        wake.reacquired = true;
        log::info!("Wake lock released, attempting to reacquire");
        match web.browser.request_wake_lock().await {
            Ok(handle) => {
                wake.handle = Some(handle);
                true
            }
            Err(e) => {
                log::warn!("Failed to reacquire wake lock: {e}");
                false
            }
        }
    }

    /// Returns true while a browser wake lock is held.
    pub async fn wake_lock_held(&self) -> bool {
        match &self.platform {
            Platform::Web(web) => web.wake.lock().await.handle.is_some(),
            Platform::Native(_) => false,
        }
    }

    /// Sends an alarm notification through the system.
    ///
    /// In a tab nothing is shown and [`AlarmOutcome::Deferred`] tells the
    /// caller to use its own browser notification. In the wrapper a native
    /// notification is scheduled almost immediately.
    pub async fn send_system_alarm(&self, title: &str, body: &str) -> AlarmOutcome {
        log::info!("Sending system alarm: {title}");
        let native = match &self.platform {
            Platform::Web(_) => {
                log::debug!("Web mode, deferring alarm to browser notifications");
                return AlarmOutcome::Deferred;
            }
            Platform::Native(native) => native,
        };

        if !native.bridge.has_plugin(Plugin::LocalNotifications) {
            log::warn!(
                "{} plugin not available",
                Plugin::LocalNotifications.name()
            );
            return AlarmOutcome::Failed;
        }

        let now = Utc::now();
        let alarm = Notification::new(id_from_time(now), title, body)
            .fire_after(now, self.config.alarm_delay())
            .alarm();
        match native.bridge.schedule(&[alarm]).await {
            Ok(()) => {
                log::info!("Native alarm scheduled");
                AlarmOutcome::Scheduled
            }
            Err(e) => {
                log::error!("Native notification failed: {e}");
                AlarmOutcome::Failed
            }
        }
    }

    /// Returns true if the app is exempt from battery optimization.
    ///
    /// Always true in a tab. On Android there is no way to query the
    /// exemption through the bridge yet, so the answer is false there.
    pub async fn check_battery_optimization_exempt(&self) -> bool {
        let Platform::Native(native) = &self.platform else {
            return true;
        };
        if !native.bridge.has_plugin(Plugin::Device) {
            return false;
        }
        match native.bridge.device_info().await {
            Ok(info) => info.platform != "android",
            Err(e) => {
                log::warn!("Device info failed: {e}");
                false
            }
        }
    }

    /// Helps the user exempt the app from battery optimization: opens the
    /// system settings in the wrapper, or explains the manual steps.
    pub async fn request_battery_optimization_exemption(&self) {
        let native = match &self.platform {
            Platform::Web(_) => {
                self.notifier
                    .alert(&format!(
                        "Battery optimization settings:\n\n\
                         1. Go to browser settings\n\
                         2. Find \"Site Settings\" or \"Permissions\"\n\
                         3. Allow notifications and background sync for {}",
                        self.config.app_name
                    ))
                    .await;
                return;
            }
            Platform::Native(native) => native,
        };

        if native.bridge.has_plugin(Plugin::App) {
            match native
                .bridge
                .open_url(&self.config.battery_settings_url)
                .await
            {
                Ok(()) => return,
                Err(e) => log::warn!("Opening battery settings failed: {e}"),
            }
        }
        self.notifier
            .alert(&format!(
                "To ensure reliable alarms:\n\n\
                 1. Go to Settings > Battery\n\
                 2. Find \"Battery Optimization\"\n\
                 3. Select \"{0}\"\n\
                 4. Choose \"Don't optimize\"\n\n\
                 This prevents Android from killing the app.",
                self.config.app_name
            ))
            .await;
    }

    /// Enables background execution in the wrapper.
    pub async fn setup_background_mode(&self) {
        let Platform::Native(native) = &self.platform else {
            return;
        };
        if !native.bridge.has_plugin(Plugin::BackgroundMode) {
            log::warn!(
                "Background mode setup failed: {} plugin not available",
                Plugin::BackgroundMode.name()
            );
            return;
        }
        if let Err(e) = native.bridge.enable_background_mode().await {
            log::warn!("Background mode setup failed: {e}");
        }
    }

    /// Keeps the screen on for a firing alarm in the wrapper.
    pub async fn wake_screen(&self, should_wake: bool) {
        let Platform::Native(native) = &self.platform else {
            return;
        };
        if should_wake && native.bridge.has_plugin(Plugin::App) {
            self.keep_screen_awake().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    // =========================================================================
    // Mock hosts
    // =========================================================================

    /// Records every alert shown to the user.
    #[derive(Default)]
    struct RecordingNotifier {
        messages: StdMutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }

        fn last(&self) -> String {
            self.messages().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl UserNotifier for RecordingNotifier {
        async fn alert(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    struct MockBrowser {
        permission: Option<PermissionState>,
        prompt_answer: PermissionState,
        prompts: AtomicUsize,
        show_fails: bool,
        shown: StdMutex<Vec<Notification>>,
        closed: StdMutex<Vec<String>>,
        wake_supported: bool,
        /// Wake lock requests beyond this count fail.
        wake_grants: usize,
        wake_requests: AtomicUsize,
        released: StdMutex<Vec<WakeLockHandle>>,
        next_handle: AtomicU64,
    }

    impl Default for MockBrowser {
        fn default() -> Self {
            Self {
                permission: Some(PermissionState::Default),
                prompt_answer: PermissionState::Granted,
                prompts: AtomicUsize::new(0),
                show_fails: false,
                shown: StdMutex::new(Vec::new()),
                closed: StdMutex::new(Vec::new()),
                wake_supported: true,
                wake_grants: usize::MAX,
                wake_requests: AtomicUsize::new(0),
                released: StdMutex::new(Vec::new()),
                next_handle: AtomicU64::new(1),
            }
        }
    }

    impl MockBrowser {
        fn wake_requests(&self) -> usize {
            self.wake_requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BrowserApis for MockBrowser {
        fn notification_permission(&self) -> Option<PermissionState> {
            self.permission
        }

        async fn request_notification_permission(&self) -> Result<PermissionState, CapabilityError> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            Ok(self.prompt_answer)
        }

        async fn show_notification(&self, notification: &Notification) -> Result<(), CapabilityError> {
            if self.show_fails {
                return Err(CapabilityError::Rejected("Illegal constructor".to_string()));
            }
            self.shown.lock().unwrap().push(notification.clone());
            Ok(())
        }

        async fn close_notification(&self, tag: &str) {
            self.closed.lock().unwrap().push(tag.to_string());
        }

        fn wake_lock_supported(&self) -> bool {
            self.wake_supported
        }

        async fn request_wake_lock(&self) -> Result<WakeLockHandle, CapabilityError> {
            let n = self.wake_requests.fetch_add(1, Ordering::SeqCst);
            if n >= self.wake_grants {
                return Err(CapabilityError::Rejected("NotAllowedError".to_string()));
            }
            Ok(WakeLockHandle(self.next_handle.fetch_add(1, Ordering::SeqCst)))
        }

        async fn release_wake_lock(&self, handle: WakeLockHandle) {
            self.released.lock().unwrap().push(handle);
        }
    }

    struct MockBridge {
        native: bool,
        plugins: Vec<Plugin>,
        permission: Result<PermissionState, CapabilityError>,
        schedule_fails: bool,
        scheduled: StdMutex<Vec<Notification>>,
        calls: StdMutex<Vec<&'static str>>,
        device: Result<DeviceInfo, CapabilityError>,
        open_fails: bool,
        opened: StdMutex<Vec<String>>,
    }

    impl Default for MockBridge {
        fn default() -> Self {
            Self {
                native: true,
                plugins: vec![
                    Plugin::LocalNotifications,
                    Plugin::KeepAwake,
                    Plugin::BackgroundMode,
                    Plugin::Device,
                    Plugin::App,
                ],
                permission: Ok(PermissionState::Granted),
                schedule_fails: false,
                scheduled: StdMutex::new(Vec::new()),
                calls: StdMutex::new(Vec::new()),
                device: Ok(DeviceInfo {
                    platform: "android".to_string(),
                    model: None,
                    os_version: None,
                }),
                open_fails: false,
                opened: StdMutex::new(Vec::new()),
            }
        }
    }

    impl MockBridge {
        fn without(plugin: Plugin) -> Self {
            let mut bridge = Self::default();
            bridge.plugins.retain(|p| *p != plugin);
            bridge
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn scheduled(&self) -> Vec<Notification> {
            self.scheduled.lock().unwrap().clone()
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl NativeBridge for MockBridge {
        fn is_native_platform(&self) -> bool {
            self.native
        }

        fn has_plugin(&self, plugin: Plugin) -> bool {
            self.plugins.contains(&plugin)
        }

        async fn request_notification_permissions(&self) -> Result<PermissionState, CapabilityError> {
            self.record("request_permissions");
            self.permission.clone()
        }

        async fn schedule(&self, notifications: &[Notification]) -> Result<(), CapabilityError> {
            self.record("schedule");
            if self.schedule_fails {
                return Err(CapabilityError::Rejected("exact alarms denied".to_string()));
            }
            self.scheduled
                .lock()
                .unwrap()
                .extend(notifications.iter().cloned());
            Ok(())
        }

        async fn keep_awake(&self) -> Result<(), CapabilityError> {
            self.record("keep_awake");
            Ok(())
        }

        async fn allow_sleep(&self) -> Result<(), CapabilityError> {
            self.record("allow_sleep");
            Ok(())
        }

        async fn enable_background_mode(&self) -> Result<(), CapabilityError> {
            self.record("enable_background_mode");
            Ok(())
        }

        async fn device_info(&self) -> Result<DeviceInfo, CapabilityError> {
            self.record("device_info");
            self.device.clone()
        }

        async fn open_url(&self, url: &str) -> Result<(), CapabilityError> {
            self.record("open_url");
            if self.open_fails {
                return Err(CapabilityError::Rejected("no activity".to_string()));
            }
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn test_config() -> AdapterConfig {
        AdapterConfig::new().with_confirmation_dismiss(Duration::ZERO)
    }

    fn web(browser: MockBrowser) -> (CapabilityAdapter, Arc<MockBrowser>, Arc<RecordingNotifier>) {
        let browser = Arc::new(browser);
        let notifier = Arc::new(RecordingNotifier::default());
        let adapter = CapabilityAdapter::detect(
            browser.clone(),
            None,
            notifier.clone(),
            test_config(),
        );
        (adapter, browser, notifier)
    }

    fn native(bridge: MockBridge) -> (CapabilityAdapter, Arc<MockBridge>, Arc<RecordingNotifier>) {
        let bridge = Arc::new(bridge);
        let notifier = Arc::new(RecordingNotifier::default());
        let adapter = CapabilityAdapter::detect(
            Arc::new(MockBrowser::default()),
            Some(bridge.clone()),
            notifier.clone(),
            test_config(),
        );
        (adapter, bridge, notifier)
    }

    // =========================================================================
    // Detection
    // =========================================================================

    #[test]
    fn detect_without_bridge_is_web() {
        let (adapter, _, _) = web(MockBrowser::default());
        assert!(!adapter.is_native());
        assert!(matches!(adapter.platform(), Platform::Web(_)));
    }

    #[test]
    fn detect_with_non_native_bridge_is_web() {
        let bridge = MockBridge {
            native: false,
            ..MockBridge::default()
        };
        let (adapter, _, _) = native(bridge);
        assert!(!adapter.is_native());
    }

    #[test]
    fn detect_with_native_bridge_is_native() {
        let (adapter, _, _) = native(MockBridge::default());
        assert!(adapter.is_native());
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    #[tokio::test]
    async fn web_permission_already_granted_does_not_prompt() {
        let (adapter, browser, notifier) = web(MockBrowser {
            permission: Some(PermissionState::Granted),
            ..MockBrowser::default()
        });

        assert!(adapter.request_permissions().await);
        assert_eq!(browser.prompts.load(Ordering::SeqCst), 0);
        assert!(browser.shown.lock().unwrap().is_empty());
        assert_eq!(notifier.messages(), vec!["Notifications already enabled!"]);
    }

    #[tokio::test]
    async fn web_permission_grant_shows_and_dismisses_confirmation() {
        let (adapter, browser, notifier) = web(MockBrowser::default());

        assert!(adapter.request_permissions().await);
        assert_eq!(browser.prompts.load(Ordering::SeqCst), 1);
        let shown = browser.shown.lock().unwrap().clone();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].tag.as_deref(), Some(PERMISSION_TEST_TAG));
        assert_eq!(shown[0].icon.as_deref(), Some("./favicon-32x32.png"));
        assert_eq!(notifier.last(), "Notification permission granted!");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            browser.closed.lock().unwrap().clone(),
            vec![PERMISSION_TEST_TAG]
        );
    }

    #[tokio::test]
    async fn web_permission_previously_denied_prompts_again() {
        let (adapter, browser, notifier) = web(MockBrowser {
            permission: Some(PermissionState::Denied),
            prompt_answer: PermissionState::Denied,
            ..MockBrowser::default()
        });

        assert!(!adapter.request_permissions().await);
        assert_eq!(browser.prompts.load(Ordering::SeqCst), 1);
        assert!(notifier.last().contains("denied"));
    }

    #[tokio::test]
    async fn web_permission_unsupported() {
        let (adapter, _, notifier) = web(MockBrowser {
            permission: None,
            ..MockBrowser::default()
        });
        assert!(!adapter.request_permissions().await);
        assert_eq!(
            notifier.messages(),
            vec!["Notifications not supported in this browser"]
        );
    }

    #[tokio::test]
    async fn web_permission_granted_but_notification_fails() {
        let (adapter, _, notifier) = web(MockBrowser {
            show_fails: true,
            ..MockBrowser::default()
        });
        assert!(adapter.request_permissions().await);
        assert!(notifier.last().contains("notification failed: Illegal constructor"));
    }

    #[tokio::test]
    async fn native_permission_grant_schedules_confirmation() {
        let (adapter, bridge, notifier) = native(MockBridge::default());

        assert!(adapter.request_permissions().await);
        let scheduled = bridge.scheduled();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].id, PERMISSION_TEST_ID);
        assert!(scheduled[0].schedule.is_some());
        assert_eq!(
            notifier.messages(),
            vec!["Permission Results:\nNotifications: granted"]
        );
    }

    #[tokio::test]
    async fn native_permission_denied_schedules_nothing() {
        let (adapter, bridge, notifier) = native(MockBridge {
            permission: Ok(PermissionState::Denied),
            ..MockBridge::default()
        });
        assert!(adapter.request_permissions().await);
        assert!(bridge.scheduled().is_empty());
        assert!(notifier.last().ends_with("Notifications: denied"));
    }

    #[tokio::test]
    async fn native_permission_without_plugin() {
        let (adapter, bridge, notifier) = native(MockBridge::without(Plugin::LocalNotifications));
        assert!(adapter.request_permissions().await);
        assert!(bridge.calls().is_empty());
        assert!(notifier.last().contains("Notifications: Plugin not available"));
    }

    #[tokio::test]
    async fn native_permission_failure_is_reported() {
        let (adapter, _, notifier) = native(MockBridge {
            permission: Err(CapabilityError::Rejected("bridge crashed".to_string())),
            ..MockBridge::default()
        });
        assert!(!adapter.request_permissions().await);
        assert_eq!(
            notifier.messages(),
            vec!["Permission request failed: bridge crashed"]
        );
    }

    // =========================================================================
    // Alarms
    // =========================================================================

    #[tokio::test]
    async fn web_alarm_is_deferred_to_caller() {
        let (adapter, browser, notifier) = web(MockBrowser::default());
        let outcome = adapter.send_system_alarm("Wake up", "Gym").await;
        assert_eq!(outcome, AlarmOutcome::Deferred);
        assert!(!outcome.is_scheduled());
        assert!(browser.shown.lock().unwrap().is_empty());
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn native_alarm_without_plugin_fails_quietly() {
        let (adapter, bridge, _) = native(MockBridge::without(Plugin::LocalNotifications));
        assert_eq!(
            adapter.send_system_alarm("Wake up", "Gym").await,
            AlarmOutcome::Failed
        );
        assert!(bridge.calls().is_empty());
    }

    #[tokio::test]
    async fn native_alarm_schedules_high_priority_notification() {
        let (adapter, bridge, _) = native(MockBridge::default());
        let before = Utc::now();

        let outcome = adapter.send_system_alarm("Wake up", "Gym at 7").await;
        assert!(outcome.is_scheduled());

        let scheduled = bridge.scheduled();
        assert_eq!(scheduled.len(), 1);
        let alarm = &scheduled[0];
        assert_eq!(alarm.title, "Wake up");
        assert_eq!(alarm.body, "Gym at 7");
        assert_eq!(alarm.priority, Some(MAX_PRIORITY));
        assert_eq!(alarm.sound.as_deref(), Some("default"));
        assert!(alarm.auto_cancel);
        assert!(!alarm.ongoing);
        assert_eq!(alarm.extra, Some(serde_json::json!({ "data": "alarm" })));

        let at = alarm.schedule.unwrap().at;
        assert!(at >= before);
        assert!(at <= Utc::now() + chrono::Duration::seconds(1));
    }

    #[tokio::test]
    async fn native_alarm_schedule_failure() {
        let (adapter, _, _) = native(MockBridge {
            schedule_fails: true,
            ..MockBridge::default()
        });
        assert_eq!(
            adapter.send_system_alarm("Wake up", "Gym").await,
            AlarmOutcome::Failed
        );
    }

    // =========================================================================
    // Wake lock
    // =========================================================================

    #[tokio::test]
    async fn web_wake_lock_acquire_and_release() {
        let (adapter, browser, _) = web(MockBrowser::default());

        adapter.keep_screen_awake().await;
        assert!(adapter.wake_lock_held().await);

        adapter.allow_screen_sleep().await;
        assert!(!adapter.wake_lock_held().await);
        assert_eq!(
            browser.released.lock().unwrap().clone(),
            vec![WakeLockHandle(1)]
        );
    }

    #[tokio::test]
    async fn release_event_after_sleep_does_not_reacquire() {
        let (adapter, browser, _) = web(MockBrowser::default());
        adapter.keep_screen_awake().await;
        adapter.allow_screen_sleep().await;

        assert!(!adapter.handle_wake_lock_release(WakeLockHandle(1)).await);
        assert_eq!(browser.wake_requests(), 1);
        assert!(!adapter.wake_lock_held().await);
    }

    #[tokio::test]
    async fn revoked_wake_lock_is_reacquired_once() {
        let (adapter, browser, _) = web(MockBrowser::default());
        adapter.keep_screen_awake().await;

        assert!(adapter.handle_wake_lock_release(WakeLockHandle(1)).await);
        assert_eq!(browser.wake_requests(), 2);
        assert!(adapter.wake_lock_held().await);

        assert!(!adapter.handle_wake_lock_release(WakeLockHandle(2)).await);
        assert_eq!(browser.wake_requests(), 2);
        assert!(!adapter.wake_lock_held().await);

        // A fresh request restores the retry.
        adapter.keep_screen_awake().await;
        assert!(adapter.handle_wake_lock_release(WakeLockHandle(3)).await);
        assert_eq!(browser.wake_requests(), 4);
    }

    #[tokio::test]
    async fn failed_reacquire_is_swallowed() {
        let (adapter, browser, _) = web(MockBrowser {
            wake_grants: 1,
            ..MockBrowser::default()
        });
        adapter.keep_screen_awake().await;

        assert!(!adapter.handle_wake_lock_release(WakeLockHandle(1)).await);
        assert_eq!(browser.wake_requests(), 2);
        assert!(!adapter.wake_lock_held().await);
    }

    #[tokio::test]
    async fn stale_release_event_is_ignored() {
        let (adapter, browser, _) = web(MockBrowser::default());
        adapter.keep_screen_awake().await;

        assert!(adapter.handle_wake_lock_release(WakeLockHandle(42)).await);
        assert_eq!(browser.wake_requests(), 1);
        assert!(adapter.wake_lock_held().await);
    }

    #[tokio::test]
    async fn keep_awake_twice_holds_one_lock() {
        let (adapter, browser, _) = web(MockBrowser::default());
        adapter.keep_screen_awake().await;
        adapter.keep_screen_awake().await;
        assert_eq!(browser.wake_requests(), 1);
    }

    #[tokio::test]
    async fn unsupported_wake_lock_is_a_no_op() {
        let (adapter, browser, _) = web(MockBrowser {
            wake_supported: false,
            ..MockBrowser::default()
        });
        adapter.keep_screen_awake().await;
        assert_eq!(browser.wake_requests(), 0);
        assert!(!adapter.wake_lock_held().await);
    }

    #[tokio::test]
    async fn native_wake_delegates_to_bridge() {
        let (adapter, bridge, _) = native(MockBridge::default());
        adapter.keep_screen_awake().await;
        adapter.allow_screen_sleep().await;
        assert_eq!(bridge.calls(), vec!["keep_awake", "allow_sleep"]);
        assert!(!adapter.wake_lock_held().await);
        assert!(!adapter.handle_wake_lock_release(WakeLockHandle(1)).await);
    }

    #[tokio::test]
    async fn native_wake_without_plugin_is_a_no_op() {
        let (adapter, bridge, _) = native(MockBridge::without(Plugin::KeepAwake));
        adapter.keep_screen_awake().await;
        adapter.allow_screen_sleep().await;
        assert!(bridge.calls().is_empty());
    }

    // =========================================================================
    // Battery optimization
    // =========================================================================

    #[tokio::test]
    async fn web_is_always_exempt() {
        let (adapter, _, _) = web(MockBrowser::default());
        assert!(adapter.check_battery_optimization_exempt().await);
    }

    #[tokio::test]
    async fn android_is_reported_not_exempt() {
        let (adapter, _, _) = native(MockBridge::default());
        assert!(!adapter.check_battery_optimization_exempt().await);
    }

    #[tokio::test]
    async fn other_native_platforms_are_exempt() {
        let (adapter, _, _) = native(MockBridge {
            device: Ok(DeviceInfo {
                platform: "ios".to_string(),
                model: Some("iPhone".to_string()),
                os_version: None,
            }),
            ..MockBridge::default()
        });
        assert!(adapter.check_battery_optimization_exempt().await);
    }

    #[tokio::test]
    async fn device_info_failure_is_not_exempt() {
        let (adapter, _, _) = native(MockBridge {
            device: Err(CapabilityError::Unavailable("Device")),
            ..MockBridge::default()
        });
        assert!(!adapter.check_battery_optimization_exempt().await);

        let (adapter, bridge, _) = native(MockBridge::without(Plugin::Device));
        assert!(!adapter.check_battery_optimization_exempt().await);
        assert!(bridge.calls().is_empty());
    }

    #[tokio::test]
    async fn web_exemption_request_explains_browser_steps() {
        let (adapter, _, notifier) = web(MockBrowser::default());
        adapter.request_battery_optimization_exemption().await;
        let message = notifier.last();
        assert!(message.contains("browser settings"));
        assert!(message.contains("HustleOS"));
    }

    #[tokio::test]
    async fn native_exemption_request_opens_settings() {
        let (adapter, bridge, notifier) = native(MockBridge::default());
        adapter.request_battery_optimization_exemption().await;
        assert_eq!(
            bridge.opened.lock().unwrap().clone(),
            vec![crate::config::DEFAULT_BATTERY_SETTINGS_URL]
        );
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn native_exemption_request_falls_back_to_instructions() {
        let (adapter, _, notifier) = native(MockBridge {
            open_fails: true,
            ..MockBridge::default()
        });
        adapter.request_battery_optimization_exemption().await;
        assert!(notifier.last().contains("Don't optimize"));

        let (adapter, _, notifier) = native(MockBridge::without(Plugin::App));
        adapter.request_battery_optimization_exemption().await;
        assert!(notifier.last().contains("Settings > Battery"));
    }

    // =========================================================================
    // Start-up helpers
    // =========================================================================

    #[tokio::test]
    async fn native_initialize_requests_permissions_and_background_mode() {
        let (adapter, bridge, _) = native(MockBridge::default());
        adapter.initialize().await;
        assert_eq!(
            bridge.calls(),
            vec!["request_permissions", "schedule", "enable_background_mode"]
        );
    }

    #[tokio::test]
    async fn web_initialize_does_nothing() {
        let (adapter, browser, notifier) = web(MockBrowser::default());
        adapter.initialize().await;
        assert_eq!(browser.prompts.load(Ordering::SeqCst), 0);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn wake_screen_requires_app_plugin() {
        let (adapter, bridge, _) = native(MockBridge::default());
        adapter.wake_screen(true).await;
        adapter.wake_screen(false).await;
        assert_eq!(bridge.calls(), vec!["keep_awake"]);

        let (adapter, bridge, _) = native(MockBridge::without(Plugin::App));
        adapter.wake_screen(true).await;
        assert!(bridge.calls().is_empty());
    }
}
