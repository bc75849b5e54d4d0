//! The alarm scheduler: one alarm, armed relative to tomorrow's sunrise at the
//! selected location.
//!
//! ## State Machine
//!
//! ```text
//!            setup_alarm / schedule_diagnostic
//! Disabled ───────────────────────────────────► Enabling
//!    ▲                                            │  │
//!    │             resolution or dispatch failure │  │ dispatch accepted
//!    ├────────────────────────────────────────────┘  ▼
//!    │                 cancel_alarm                Enabled ──┐ refresh
//!    └─────────────────────────────────────────────────┘ ◄──┘
//! ```
//!
//! Every arming attempt and every cancel bumps a generation counter. An
//! attempt that finishes after the counter moved on is discarded and reports
//! [`AlarmError::Superseded`]; if its hand-off had already been accepted, the
//! dispatcher is told to cancel again so no notification outlives the cancel.
//!
//! Each CLI invocation runs its own scheduler over the same store, so the
//! generation alone cannot see a cancel issued by another process. Every write
//! of the alarm state also bumps a revision kept in the store. A result is
//! applied only if the revision is still the one the attempt started from,
//! compared and written under the store's exclusive lock. A losing hand-off
//! leaves whatever the other process committed in force.
//!
//! Arming, refreshing and diagnostic scheduling are serialized by an operation
//! gate. Under [`BusyPolicy::Reject`] a second caller fails with
//! [`AlarmError::Busy`]; under [`BusyPolicy::Queue`] it waits. `cancel_alarm`
//! never waits for the gate.

pub mod dispatch;
pub mod state;

pub use dispatch::{
    MessageVariant, NotificationDispatcher, OUTBOX_KEY, OutboxDispatcher, PendingNotification,
};
pub use state::{AlarmKind, AlarmPhase, AlarmState};

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use crate::error::AlarmError;
use crate::registry::{AlarmTiming, LocationRegistry};
use crate::common::constants::ALARM_REVISION_KEY;
use crate::store::{KeyValueStore, StoreLock, get_json, set_json};
use crate::sunrise::SunriseResolver;
use crate::time_source::TimeSource;

/// Label used for a diagnostic alarm when no location is selected.
const DIAGNOSTIC_LABEL: &str = "Diagnostic";

/// What a second arming operation does while another one is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BusyPolicy {
    #[default]
    Reject,
    Queue,
}

impl BusyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusyPolicy::Reject => "reject",
            BusyPolicy::Queue => "queue",
        }
    }
}

impl std::str::FromStr for BusyPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(BusyPolicy::Reject),
            "queue" => Ok(BusyPolicy::Queue),
            other => anyhow::bail!("unknown busy policy '{other}' (expected 'reject' or 'queue')"),
        }
    }
}

/// Apply the timing offset to a sunrise instant.
pub fn compute_fire_instant<Z: TimeZone>(sunrise: &DateTime<Z>, timing: AlarmTiming) -> DateTime<Z> {
    sunrise.clone() + ChronoDuration::minutes(timing.offset_minutes())
}

#[derive(Debug, Clone)]
struct CachedSunrise {
    location_id: Uuid,
    date: NaiveDate,
    sunrise: DateTime<Tz>,
}

struct SchedulerInner {
    phase: AlarmPhase,
    state: AlarmState,
    generation: u64,
    /// Store revision this state corresponds to.
    revision: u64,
    cached: Option<CachedSunrise>,
    last_error: Option<AlarmError>,
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone)]
pub struct AlarmStatus {
    pub phase: AlarmPhase,
    pub state: AlarmState,
    /// Last tomorrow-sunrise this scheduler resolved, for display.
    pub next_sunrise: Option<DateTime<Tz>>,
    /// Most recent failure, cleared by the next successful operation.
    pub last_error: Option<AlarmError>,
}

/// Result of a successful [`AlarmScheduler::refresh`].
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub sunrise: DateTime<Tz>,
    /// New fire instant when an armed sunrise alarm was rescheduled.
    pub rescheduled: Option<DateTime<FixedOffset>>,
}

/// Everything the scheduler is wired to.
pub struct SchedulerParams {
    pub registry: Arc<LocationRegistry>,
    pub resolver: SunriseResolver,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn TimeSource>,
    pub busy_policy: BusyPolicy,
}

#[derive(Debug, Clone, Copy)]
enum Arming {
    Daily,
    Once,
}

struct Attempt {
    generation: u64,
    revision: u64,
    was_armed: bool,
}

pub struct AlarmScheduler {
    registry: Arc<LocationRegistry>,
    resolver: SunriseResolver,
    dispatcher: Arc<dyn NotificationDispatcher>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn TimeSource>,
    busy_policy: BusyPolicy,
    gate: tokio::sync::Mutex<()>,
    inner: Mutex<SchedulerInner>,
}

impl AlarmScheduler {
    /// Create the scheduler, restoring the persisted alarm state.
    pub fn new(params: SchedulerParams) -> Self {
        let state = AlarmState::load(params.store.as_ref()).unwrap_or_else(|e| {
            log_warning!("Ignoring unreadable alarm state: {e}");
            AlarmState::disabled()
        });
        let revision = read_revision(params.store.as_ref());
        let (phase, state) = adopt(state, params.clock.now());

        Self {
            registry: params.registry,
            resolver: params.resolver,
            dispatcher: params.dispatcher,
            store: params.store,
            clock: params.clock,
            busy_policy: params.busy_policy,
            gate: tokio::sync::Mutex::new(()),
            inner: Mutex::new(SchedulerInner {
                phase,
                state,
                generation: 0,
                revision,
                cached: None,
                last_error: None,
            }),
        }
    }

    pub fn resolver(&self) -> &SunriseResolver {
        &self.resolver
    }

    pub fn busy_policy(&self) -> BusyPolicy {
        self.busy_policy
    }

    pub fn status(&self) -> AlarmStatus {
        let inner = self.lock();
        AlarmStatus {
            phase: inner.phase,
            state: inner.state.clone(),
            next_sunrise: inner.cached.as_ref().map(|cached| cached.sunrise),
            last_error: inner.last_error.clone(),
        }
    }

    /// Arm the daily alarm for tomorrow's sunrise at the selected location.
    ///
    /// Returns the fire instant the dispatcher accepted. On failure the alarm
    /// ends up disabled and the error is also kept in [`AlarmStatus::last_error`].
    pub async fn setup_alarm(&self) -> Result<DateTime<FixedOffset>, AlarmError> {
        let _gate = self.acquire_gate().await?;

        let Some(location) = self.registry.selected() else {
            self.record_error(AlarmError::NoLocationSelected);
            return Err(AlarmError::NoLocationSelected);
        };

        let attempt = self.begin_arming();
        let tomorrow = self.resolver.tomorrow_for(location.latitude, location.longitude);

        let sunrise = match self.cached_sunrise(location.id, tomorrow) {
            Some(sunrise) => sunrise,
            None => match self
                .resolver
                .resolve_for(location.latitude, location.longitude, tomorrow)
                .await
            {
                Ok(sunrise) => sunrise,
                Err(e) => return Err(self.abandon(&attempt, e).await),
            },
        };
        self.cache_sunrise(location.id, tomorrow, sunrise);

        let current = {
            let mut inner = self.lock();
            let current = self.still_current(&inner, &attempt);
            if !current {
                self.yield_to_committed(&mut inner, &attempt);
            }
            current
        };
        if !current {
            log_debug!("Setup superseded after sunrise resolution");
            return Err(AlarmError::Superseded);
        }

        // Timing is read now, not when the setup started
        let timing = self.registry.alarm_timing();
        let fire = compute_fire_instant(&sunrise, timing).fixed_offset();
        let armed = AlarmState::armed(fire, &location.name, AlarmKind::Sunrise, Some(timing));

        self.hand_off(
            &attempt,
            fire,
            armed,
            MessageVariant::for_timing(timing),
            Arming::Daily,
        )
        .await
    }

    /// Arm a one-off alarm `delay` from now, bypassing sunrise resolution.
    ///
    /// Replaces whatever alarm was armed before.
    pub async fn schedule_diagnostic(
        &self,
        delay: std::time::Duration,
    ) -> Result<DateTime<FixedOffset>, AlarmError> {
        let delay = ChronoDuration::from_std(delay)
            .map_err(|e| AlarmError::InvalidRequest(format!("diagnostic delay: {e}")))?;

        let _gate = self.acquire_gate().await?;
        let attempt = self.begin_arming();

        let fire = (self.clock.now() + delay).fixed_offset();
        let label = self
            .registry
            .selected()
            .map(|location| location.name)
            .unwrap_or_else(|| DIAGNOSTIC_LABEL.to_string());
        let armed = AlarmState::armed(fire, &label, AlarmKind::Diagnostic, None);

        self.hand_off(&attempt, fire, armed, MessageVariant::Diagnostic, Arming::Once)
            .await
    }

    /// Re-resolve tomorrow's sunrise and reschedule an armed sunrise alarm.
    ///
    /// A failure leaves the armed alarm exactly as it was. A disabled or
    /// diagnostic alarm is not touched; only the cached sunrise is updated.
    pub async fn refresh(&self) -> Result<RefreshOutcome, AlarmError> {
        let _gate = self.acquire_gate().await?;

        let Some(location) = self.registry.selected() else {
            self.record_error(AlarmError::NoLocationSelected);
            return Err(AlarmError::NoLocationSelected);
        };

        let attempt = self.snapshot();
        let tomorrow = self.resolver.tomorrow_for(location.latitude, location.longitude);

        let sunrise = match self
            .resolver
            .resolve_for(location.latitude, location.longitude, tomorrow)
            .await
        {
            Ok(sunrise) => sunrise,
            Err(e) => {
                log_debug!("Refresh failed, keeping current alarm: {e}");
                self.record_error(e.clone());
                return Err(e);
            }
        };

        let timing = self.registry.alarm_timing();
        let fire = compute_fire_instant(&sunrise, timing).fixed_offset();

        let rearm = {
            let mut inner = self.lock();
            inner.cached = Some(CachedSunrise {
                location_id: location.id,
                date: tomorrow,
                sunrise,
            });
            inner.last_error = None;
            // Another process may have cancelled or re-armed while we waited
            let current = self.still_current(&inner, &attempt);
            self.sync_with_store(&mut inner);
            current && inner.phase == AlarmPhase::Enabled && inner.state.kind == AlarmKind::Sunrise
        };

        if !rearm {
            return Ok(RefreshOutcome {
                sunrise,
                rescheduled: None,
            });
        }

        let variant = MessageVariant::for_timing(timing);
        if let Err(e) = self
            .dispatcher
            .schedule_daily(fire, variant, &location.name)
            .await
        {
            let error = AlarmError::Dispatch(format!("{e:#}"));
            self.record_error(error.clone());
            return Err(error);
        }

        let applied = {
            let mut inner = self.lock();
            let armed = AlarmState::armed(fire, &location.name, AlarmKind::Sunrise, Some(timing));
            let applied = self.commit(&mut inner, &attempt, armed);
            if !applied {
                self.yield_to_committed(&mut inner, &attempt);
            }
            applied
        };

        if !applied {
            log_debug!("Refresh superseded while the hand-off was in flight");
            self.withdraw_superseded().await;
            return Err(AlarmError::Superseded);
        }

        log_debug!("Alarm rescheduled for {}", fire.to_rfc3339());
        Ok(RefreshOutcome {
            sunrise,
            rescheduled: Some(fire),
        })
    }

    /// Disable the alarm and withdraw every pending notification.
    ///
    /// Always succeeds and may be called in any state. Any arming still in
    /// flight, in this process or another one sharing the store, is superseded.
    pub async fn cancel_alarm(&self) {
        {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.phase = AlarmPhase::Disabled;
            inner.state = AlarmState::disabled();
            inner.last_error = None;

            let _store = self.lock_store();
            inner.revision = inner.revision.max(read_revision(self.store.as_ref()));
            self.persist(&mut inner);
        }

        self.dispatcher.cancel_all().await;
        log_debug!("Alarm cancelled");
    }

    async fn acquire_gate(&self) -> Result<tokio::sync::MutexGuard<'_, ()>, AlarmError> {
        match self.busy_policy {
            BusyPolicy::Reject => self.gate.try_lock().map_err(|_| AlarmError::Busy),
            BusyPolicy::Queue => Ok(self.gate.lock().await),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_store(&self) -> Option<StoreLock> {
        self.store
            .lock_exclusive()
            .map_err(|e| log_warning!("Could not lock alarm state: {e}"))
            .ok()
    }

    /// Write the current state as the next revision. The store lock must be held.
    fn persist(&self, inner: &mut SchedulerInner) {
        let revision = inner.revision + 1;
        let written = inner
            .state
            .save(self.store.as_ref())
            .and_then(|()| set_json(self.store.as_ref(), ALARM_REVISION_KEY, &revision));
        match written {
            Ok(()) => inner.revision = revision,
            Err(e) => log_warning!("Could not persist alarm state: {e}"),
        }
    }

    /// Apply `state` unless the attempt was superseded here or in another process.
    fn commit(&self, inner: &mut SchedulerInner, attempt: &Attempt, state: AlarmState) -> bool {
        let _store = self.lock_store();
        if !self.still_current(inner, attempt) {
            return false;
        }
        inner.state = state;
        inner.revision = attempt.revision;
        self.persist(inner);
        true
    }

    fn still_current(&self, inner: &SchedulerInner, attempt: &Attempt) -> bool {
        inner.generation == attempt.generation
            && read_revision(self.store.as_ref()) == attempt.revision
    }

    /// Pick up an alarm state another process committed since this one last looked.
    fn sync_with_store(&self, inner: &mut SchedulerInner) {
        let revision = read_revision(self.store.as_ref());
        if revision == inner.revision {
            return;
        }
        match AlarmState::load(self.store.as_ref()) {
            Ok(state) => {
                let (phase, state) = adopt(state, self.clock.now());
                inner.phase = phase;
                inner.state = state;
                inner.revision = revision;
            }
            Err(e) => log_warning!("Ignoring unreadable alarm state: {e}"),
        }
    }

    /// Settle on the committed state after `attempt` lost to another writer.
    fn yield_to_committed(&self, inner: &mut SchedulerInner, attempt: &Attempt) {
        self.sync_with_store(inner);
        if inner.generation == attempt.generation && inner.phase == AlarmPhase::Enabling {
            inner.phase = if inner.state.is_armed() {
                AlarmPhase::Enabled
            } else {
                AlarmPhase::Disabled
            };
        }
    }

    fn record_error(&self, error: AlarmError) {
        self.lock().last_error = Some(error);
    }

    fn begin_arming(&self) -> Attempt {
        let mut inner = self.lock();
        self.sync_with_store(&mut inner);
        inner.generation += 1;
        inner.phase = AlarmPhase::Enabling;
        inner.last_error = None;
        Attempt {
            generation: inner.generation,
            revision: inner.revision,
            was_armed: inner.state.is_armed(),
        }
    }

    /// Like [`Self::begin_arming`] without leaving the current phase.
    fn snapshot(&self) -> Attempt {
        let mut inner = self.lock();
        self.sync_with_store(&mut inner);
        Attempt {
            generation: inner.generation,
            revision: inner.revision,
            was_armed: inner.state.is_armed(),
        }
    }

    fn cached_sunrise(&self, location_id: Uuid, date: NaiveDate) -> Option<DateTime<Tz>> {
        self.lock()
            .cached
            .as_ref()
            .filter(|cached| cached.location_id == location_id && cached.date == date)
            .map(|cached| cached.sunrise)
    }

    fn cache_sunrise(&self, location_id: Uuid, date: NaiveDate, sunrise: DateTime<Tz>) {
        self.lock().cached = Some(CachedSunrise {
            location_id,
            date,
            sunrise,
        });
    }

    async fn hand_off(
        &self,
        attempt: &Attempt,
        fire: DateTime<FixedOffset>,
        armed: AlarmState,
        variant: MessageVariant,
        arming: Arming,
    ) -> Result<DateTime<FixedOffset>, AlarmError> {
        let dispatched = match arming {
            Arming::Daily => {
                self.dispatcher
                    .schedule_daily(fire, variant, &armed.location_label)
                    .await
            }
            Arming::Once => {
                self.dispatcher
                    .schedule_once(fire, variant, &armed.location_label)
                    .await
            }
        };

        if let Err(e) = dispatched {
            return Err(self
                .abandon(attempt, AlarmError::Dispatch(format!("{e:#}")))
                .await);
        }

        let applied = {
            let mut inner = self.lock();
            let applied = self.commit(&mut inner, attempt, armed);
            if applied {
                inner.phase = AlarmPhase::Enabled;
            } else {
                self.yield_to_committed(&mut inner, attempt);
            }
            applied
        };

        if !applied {
            log_debug!("Withdrawing superseded {arming:?} alarm");
            self.withdraw_superseded().await;
            return Err(AlarmError::Superseded);
        }

        log_debug!("Alarm armed for {}", fire.to_rfc3339());
        Ok(fire)
    }

    /// Undo a hand-off whose result was discarded, leaving the committed alarm in force.
    async fn withdraw_superseded(&self) {
        let committed = self.lock().state.clone();
        let Some(fire) = committed.fire_instant.filter(|_| committed.enabled) else {
            self.dispatcher.cancel_all().await;
            return;
        };

        // Another process armed an alarm meanwhile; our hand-off replaced its notification
        let restored = match committed.kind {
            AlarmKind::Sunrise => {
                let variant = MessageVariant::for_timing(committed.timing.unwrap_or_default());
                self.dispatcher
                    .schedule_daily(fire, variant, &committed.location_label)
                    .await
            }
            AlarmKind::Diagnostic => {
                self.dispatcher
                    .schedule_once(fire, MessageVariant::Diagnostic, &committed.location_label)
                    .await
            }
        };
        if let Err(e) = restored {
            log_warning!("Could not restore the committed alarm: {e:#}");
        }
    }

    /// Record a failed arming attempt and return the error to report.
    async fn abandon(&self, attempt: &Attempt, error: AlarmError) -> AlarmError {
        let withdraw = {
            let mut inner = self.lock();
            if inner.generation != attempt.generation {
                return AlarmError::Superseded;
            }
            inner.last_error = Some(error.clone());
            if self.commit(&mut inner, attempt, AlarmState::disabled()) {
                inner.phase = AlarmPhase::Disabled;
                attempt.was_armed
            } else {
                // The alarm another process committed stands
                self.yield_to_committed(&mut inner, attempt);
                false
            }
        };

        // A previous alarm may still be pending with the dispatcher
        if withdraw {
            self.dispatcher.cancel_all().await;
        }
        log_debug!("Arming failed: {error}");
        error
    }
}

fn read_revision(store: &dyn KeyValueStore) -> u64 {
    get_json(store, ALARM_REVISION_KEY)
        .unwrap_or_else(|e| {
            log_warning!("Ignoring unreadable alarm revision: {e}");
            None
        })
        .unwrap_or(0)
}

/// Phase for a persisted state. A one-off alarm whose time has passed is over.
fn adopt(state: AlarmState, now: DateTime<Utc>) -> (AlarmPhase, AlarmState) {
    let expired = state.kind == AlarmKind::Diagnostic
        && state.fire_instant.is_some_and(|fire| fire <= now);
    if expired {
        (AlarmPhase::Disabled, AlarmState::disabled())
    } else if state.is_armed() {
        (AlarmPhase::Enabled, state)
    } else {
        (AlarmPhase::Disabled, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::dispatch::MockNotificationDispatcher;
    use crate::registry::SavedLocation;
    use crate::store::MemoryStore;
    use crate::sunrise::ZonePolicy;
    use crate::testing::{ScriptedTransport, sunrise_body};
    use crate::time_source::FixedTimeSource;
    use chrono::{Timelike, Utc};
    use mockall::predicate::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn scheduler_with(
        dispatcher: MockNotificationDispatcher,
        transport: Arc<ScriptedTransport>,
        store: Arc<MemoryStore>,
        select: bool,
    ) -> (AlarmScheduler, Arc<LocationRegistry>) {
        let registry = Arc::new(LocationRegistry::load(store.clone()).unwrap());
        if select {
            let home = registry.add(SavedLocation::new("Home", 51.5, -0.12)).unwrap();
            registry.select(home.id).unwrap();
        }

        let clock = Arc::new(FixedTimeSource::new(utc(2024, 3, 10, 12, 0, 0)));
        let resolver = SunriseResolver::new(
            transport,
            clock.clone(),
            "https://sunrise.invalid/json",
            ZonePolicy::Fixed(Tz::UTC),
        );

        let scheduler = AlarmScheduler::new(SchedulerParams {
            registry: registry.clone(),
            resolver,
            dispatcher: Arc::new(dispatcher),
            store,
            clock,
            busy_policy: BusyPolicy::Reject,
        });
        (scheduler, registry)
    }

    #[test]
    fn test_fire_instant_offsets() {
        let sunrise = utc(2024, 3, 11, 6, 0, 0);

        let before = compute_fire_instant(&sunrise, AlarmTiming::Before);
        assert_eq!((before.hour(), before.minute()), (5, 50));

        let after = compute_fire_instant(&sunrise, AlarmTiming::After);
        assert_eq!((after.hour(), after.minute()), (6, 10));
    }

    #[test]
    fn test_fire_instant_crosses_midnight() {
        let sunrise = chrono_tz::Europe::Oslo
            .with_ymd_and_hms(2024, 6, 21, 0, 5, 0)
            .unwrap();
        let before = compute_fire_instant(&sunrise, AlarmTiming::Before);
        assert_eq!(before.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 20).unwrap());
        assert_eq!((before.hour(), before.minute()), (23, 55));
    }

    #[test]
    fn test_busy_policy_parsing() {
        assert_eq!("reject".parse::<BusyPolicy>().unwrap(), BusyPolicy::Reject);
        assert_eq!(" Queue ".parse::<BusyPolicy>().unwrap(), BusyPolicy::Queue);
        assert!("drop".parse::<BusyPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_setup_hands_off_before_sunrise_alarm() {
        let expected_fire = DateTime::parse_from_rfc3339("2024-03-11T05:50:00+00:00").unwrap();

        let mut dispatcher = MockNotificationDispatcher::new();
        dispatcher
            .expect_schedule_daily()
            .with(eq(expected_fire), eq(MessageVariant::BeforeSunrise), eq("Home"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let transport = ScriptedTransport::always(sunrise_body("2024-03-11T06:00:00+00:00"));
        let store = Arc::new(MemoryStore::new());
        let (scheduler, _) = scheduler_with(dispatcher, transport, store.clone(), true);

        let fire = scheduler.setup_alarm().await.unwrap();
        assert_eq!(fire, expected_fire);

        let status = scheduler.status();
        assert_eq!(status.phase, AlarmPhase::Enabled);
        assert_eq!(status.state.location_label, "Home");
        assert_eq!(status.state.timing, Some(AlarmTiming::Before));
        assert_eq!(status.last_error, None);

        // Persisted for the next run
        assert_eq!(AlarmState::load(store.as_ref()).unwrap(), status.state);
    }

    #[tokio::test]
    async fn test_after_timing_uses_after_wording() {
        let mut dispatcher = MockNotificationDispatcher::new();
        dispatcher
            .expect_schedule_daily()
            .withf(|fire, variant, _| {
                fire.hour() == 6 && fire.minute() == 10 && *variant == MessageVariant::AfterSunrise
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let transport = ScriptedTransport::always(sunrise_body("2024-03-11T06:00:00Z"));
        let (scheduler, registry) =
            scheduler_with(dispatcher, transport, Arc::new(MemoryStore::new()), true);
        registry.set_alarm_timing(AlarmTiming::After).unwrap();

        scheduler.setup_alarm().await.unwrap();
    }

    #[tokio::test]
    async fn test_setup_without_location_never_dispatches() {
        let mut dispatcher = MockNotificationDispatcher::new();
        dispatcher.expect_schedule_daily().never();

        let transport = ScriptedTransport::always(sunrise_body("2024-03-11T06:00:00Z"));
        let (scheduler, _) =
            scheduler_with(dispatcher, transport.clone(), Arc::new(MemoryStore::new()), false);

        let err = scheduler.setup_alarm().await.unwrap_err();
        assert_eq!(err, AlarmError::NoLocationSelected);
        assert_eq!(scheduler.status().phase, AlarmPhase::Disabled);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_failure_disables_alarm() {
        let mut dispatcher = MockNotificationDispatcher::new();
        dispatcher
            .expect_schedule_daily()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("permission denied")));

        let transport = ScriptedTransport::always(sunrise_body("2024-03-11T06:00:00Z"));
        let (scheduler, _) =
            scheduler_with(dispatcher, transport, Arc::new(MemoryStore::new()), true);

        let err = scheduler.setup_alarm().await.unwrap_err();
        assert!(matches!(&err, AlarmError::Dispatch(message) if message.contains("permission denied")));

        let status = scheduler.status();
        assert_eq!(status.phase, AlarmPhase::Disabled);
        assert_eq!(status.state.fire_instant, None);
        assert_eq!(status.last_error, Some(err));
    }

    #[tokio::test]
    async fn test_failed_rearm_withdraws_previous_alarm() {
        let mut dispatcher = MockNotificationDispatcher::new();
        dispatcher
            .expect_schedule_daily()
            .times(1)
            .returning(|_, _, _| Ok(()));
        dispatcher.expect_cancel_all().times(1).returning(|| ());

        let transport = ScriptedTransport::new();
        transport.push(Ok(sunrise_body("2024-03-11T06:00:00Z")));
        transport.push(Err(AlarmError::Transport("offline".into())));
        let store = Arc::new(MemoryStore::new());
        let (scheduler, _) = scheduler_with(dispatcher, transport, store, true);

        scheduler.setup_alarm().await.unwrap();
        // Force a fresh resolution on the second setup
        scheduler.lock().cached = None;

        let err = scheduler.setup_alarm().await.unwrap_err();
        assert!(matches!(err, AlarmError::Transport(_)));
        assert_eq!(scheduler.status().phase, AlarmPhase::Disabled);
    }

    #[tokio::test]
    async fn test_setup_reuses_cached_sunrise() {
        let mut dispatcher = MockNotificationDispatcher::new();
        dispatcher
            .expect_schedule_daily()
            .times(2)
            .returning(|_, _, _| Ok(()));

        let transport = ScriptedTransport::always(sunrise_body("2024-03-11T06:00:00Z"));
        let (scheduler, _) =
            scheduler_with(dispatcher, transport.clone(), Arc::new(MemoryStore::new()), true);

        scheduler.setup_alarm().await.unwrap();
        scheduler.setup_alarm().await.unwrap();
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_does_not_convert_diagnostic_alarm() {
        let mut dispatcher = MockNotificationDispatcher::new();
        dispatcher
            .expect_schedule_once()
            .with(always(), eq(MessageVariant::Diagnostic), eq("Home"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        dispatcher.expect_schedule_daily().never();

        let transport = ScriptedTransport::always(sunrise_body("2024-03-11T06:00:00Z"));
        let (scheduler, _) =
            scheduler_with(dispatcher, transport, Arc::new(MemoryStore::new()), true);

        let fire = scheduler
            .schedule_diagnostic(std::time::Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(fire, utc(2024, 3, 10, 12, 0, 10));

        let outcome = scheduler.refresh().await.unwrap();
        assert_eq!(outcome.rescheduled, None);

        let status = scheduler.status();
        assert_eq!(status.state.kind, AlarmKind::Diagnostic);
        assert_eq!(status.state.fire_instant, Some(fire));
        assert_eq!(status.next_sunrise, Some(outcome.sunrise));
    }

    #[tokio::test]
    async fn test_restores_persisted_alarm() {
        let store = Arc::new(MemoryStore::new());
        let fire = DateTime::parse_from_rfc3339("2024-03-11T05:50:00Z").unwrap();
        AlarmState::armed(fire, "Cabin", AlarmKind::Sunrise, Some(AlarmTiming::Before))
            .save(store.as_ref())
            .unwrap();

        let transport = ScriptedTransport::new();
        let (scheduler, _) =
            scheduler_with(MockNotificationDispatcher::new(), transport, store, true);

        let status = scheduler.status();
        assert_eq!(status.phase, AlarmPhase::Enabled);
        assert_eq!(status.state.location_label, "Cabin");
        assert_eq!(status.state.fire_instant, Some(fire));
    }

    #[test]
    fn test_past_diagnostic_alarm_restores_disabled() {
        let store = Arc::new(MemoryStore::new());
        // The clock reads 2024-03-10 12:00 UTC
        let fired = DateTime::parse_from_rfc3339("2024-03-10T11:59:50Z").unwrap();
        AlarmState::armed(fired, "Home", AlarmKind::Diagnostic, None)
            .save(store.as_ref())
            .unwrap();

        let (scheduler, _) = scheduler_with(
            MockNotificationDispatcher::new(),
            ScriptedTransport::new(),
            store.clone(),
            true,
        );

        let status = scheduler.status();
        assert_eq!(status.phase, AlarmPhase::Disabled);
        assert!(!status.state.enabled);
        assert_eq!(status.state.fire_instant, None);
    }

    #[test]
    fn test_pending_diagnostic_alarm_restores_enabled() {
        let store = Arc::new(MemoryStore::new());
        let upcoming = DateTime::parse_from_rfc3339("2024-03-10T12:00:10Z").unwrap();
        AlarmState::armed(upcoming, "Home", AlarmKind::Diagnostic, None)
            .save(store.as_ref())
            .unwrap();

        let (scheduler, _) = scheduler_with(
            MockNotificationDispatcher::new(),
            ScriptedTransport::new(),
            store,
            true,
        );

        let status = scheduler.status();
        assert_eq!(status.phase, AlarmPhase::Enabled);
        assert_eq!(status.state.kind, AlarmKind::Diagnostic);
    }
}
