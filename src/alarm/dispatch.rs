//! Hand-off of computed alarms to whatever actually delivers notifications.
//!
//! The scheduler never delivers anything itself. It tells a
//! [`NotificationDispatcher`] when to fire and with which wording, and treats
//! the outcome as success or failure.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::common::constants::*;
use crate::registry::AlarmTiming;
use crate::store::{KeyValueStore, get_json, set_json};

/// Storage key of the pending notification written by [`OutboxDispatcher`].
pub const OUTBOX_KEY: &str = "pending_notification";

/// Which wording the notification uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageVariant {
    BeforeSunrise,
    AfterSunrise,
    Diagnostic,
}

impl MessageVariant {
    pub fn for_timing(timing: AlarmTiming) -> Self {
        match timing {
            AlarmTiming::Before => MessageVariant::BeforeSunrise,
            AlarmTiming::After => MessageVariant::AfterSunrise,
        }
    }

    pub fn title(&self) -> &'static str {
        ALARM_TITLE
    }

    pub fn body(&self) -> &'static str {
        match self {
            MessageVariant::BeforeSunrise => BEFORE_SUNRISE_BODY,
            MessageVariant::AfterSunrise => AFTER_SUNRISE_BODY,
            MessageVariant::Diagnostic => DIAGNOSTIC_BODY,
        }
    }
}

/// External notification delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Arm a notification repeating every day at the wall-clock time of `fire_instant`.
    async fn schedule_daily(
        &self,
        fire_instant: DateTime<FixedOffset>,
        variant: MessageVariant,
        location_label: &str,
    ) -> anyhow::Result<()>;

    /// Arm a single notification at `fire_instant`.
    async fn schedule_once(
        &self,
        fire_instant: DateTime<FixedOffset>,
        variant: MessageVariant,
        location_label: &str,
    ) -> anyhow::Result<()>;

    /// Remove every pending notification. Never fails.
    async fn cancel_all(&self);
}

/// The payload left for an external delivery agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingNotification {
    pub fire_instant: DateTime<FixedOffset>,
    /// `HH:MM` the notification repeats at, absent for one-off notifications.
    pub repeats_daily_at: Option<String>,
    pub title: String,
    pub body: String,
    pub location_label: String,
    pub variant: MessageVariant,
}

/// Writes the single pending notification into the key-value store, where an
/// OS-level agent (cron job, systemd timer, desktop notifier) picks it up.
///
/// Writing replaces any previous notification, so at most one exists.
pub struct OutboxDispatcher {
    store: Arc<dyn KeyValueStore>,
}

impl OutboxDispatcher {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The notification currently waiting for delivery, if any.
    pub fn pending(&self) -> anyhow::Result<Option<PendingNotification>> {
        Ok(get_json(self.store.as_ref(), OUTBOX_KEY)?)
    }

    fn write(
        &self,
        fire_instant: DateTime<FixedOffset>,
        variant: MessageVariant,
        location_label: &str,
        daily: bool,
    ) -> anyhow::Result<()> {
        let notification = PendingNotification {
            fire_instant,
            repeats_daily_at: daily.then(|| fire_instant.format("%H:%M").to_string()),
            title: variant.title().to_string(),
            body: variant.body().to_string(),
            location_label: location_label.to_string(),
            variant,
        };
        set_json(self.store.as_ref(), OUTBOX_KEY, &notification)?;
        log_debug!(
            "Handed off {:?} notification for {} at {}",
            variant,
            location_label,
            fire_instant.to_rfc3339()
        );
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for OutboxDispatcher {
    async fn schedule_daily(
        &self,
        fire_instant: DateTime<FixedOffset>,
        variant: MessageVariant,
        location_label: &str,
    ) -> anyhow::Result<()> {
        self.write(fire_instant, variant, location_label, true)
    }

    async fn schedule_once(
        &self,
        fire_instant: DateTime<FixedOffset>,
        variant: MessageVariant,
        location_label: &str,
    ) -> anyhow::Result<()> {
        self.write(fire_instant, variant, location_label, false)
    }

    async fn cancel_all(&self) {
        if let Err(e) = self.store.remove(OUTBOX_KEY) {
            log_warning!("Could not clear pending notification: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_variant_wording() {
        assert_eq!(
            MessageVariant::for_timing(AlarmTiming::Before).body(),
            "Good morning! The sun will rise in 10 minutes."
        );
        assert_eq!(
            MessageVariant::for_timing(AlarmTiming::After).body(),
            "Good morning! The sun has risen!"
        );
        assert_eq!(MessageVariant::Diagnostic.title(), "Sunrise Alarm");
    }

    #[tokio::test]
    async fn test_outbox_holds_single_notification() {
        let dispatcher = OutboxDispatcher::new(Arc::new(MemoryStore::new()));
        let first = DateTime::parse_from_rfc3339("2024-03-11T05:50:00+00:00").unwrap();
        let second = DateTime::parse_from_rfc3339("2024-03-12T05:49:00+00:00").unwrap();

        dispatcher
            .schedule_daily(first, MessageVariant::BeforeSunrise, "Home")
            .await
            .unwrap();
        dispatcher
            .schedule_daily(second, MessageVariant::BeforeSunrise, "Home")
            .await
            .unwrap();

        let pending = dispatcher.pending().unwrap().unwrap();
        assert_eq!(pending.fire_instant, second);
        assert_eq!(pending.repeats_daily_at.as_deref(), Some("05:49"));
        assert_eq!(pending.location_label, "Home");

        dispatcher.cancel_all().await;
        assert!(dispatcher.pending().unwrap().is_none());
        // Cancelling again is harmless
        dispatcher.cancel_all().await;
    }

    #[tokio::test]
    async fn test_one_off_notification_does_not_repeat() {
        let dispatcher = OutboxDispatcher::new(Arc::new(MemoryStore::new()));
        let fire = DateTime::parse_from_rfc3339("2024-03-10T12:00:10+00:00").unwrap();

        dispatcher
            .schedule_once(fire, MessageVariant::Diagnostic, "Home")
            .await
            .unwrap();

        let pending = dispatcher.pending().unwrap().unwrap();
        assert_eq!(pending.repeats_daily_at, None);
        assert_eq!(pending.variant, MessageVariant::Diagnostic);
    }
}
