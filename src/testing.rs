//! Test doubles for the sunrise transport and the notification dispatcher.
//!
//! Available to unit tests and, through the `testing-support` feature, to the
//! integration tests under `tests/`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::Url;
use tokio::sync::{Notify, watch};

use crate::alarm::{
    AlarmScheduler, BusyPolicy, MessageVariant, NotificationDispatcher, SchedulerParams,
};
use crate::error::AlarmError;
use crate::registry::{LocationRegistry, SavedLocation};
use crate::store::MemoryStore;
use crate::sunrise::{HttpTransport, SunriseResolver, ZonePolicy};
use crate::time_source::FixedTimeSource;

/// A sunrise source response envelope carrying `sunrise`.
pub fn sunrise_body(sunrise: &str) -> String {
    format!(
        r#"{{"results":{{"sunrise":"{sunrise}","sunset":"2024-03-11T18:00:00+00:00","day_length":43200}},"status":"OK"}}"#
    )
}

/// A door that calls pass through while open and wait at while closed.
pub struct Hold {
    open: watch::Sender<bool>,
    arrived: Notify,
}

impl Default for Hold {
    fn default() -> Self {
        let (open, _) = watch::channel(true);
        Self {
            open,
            arrived: Notify::new(),
        }
    }
}

impl Hold {
    /// Make subsequent calls wait until [`Self::open`].
    pub fn close(&self) {
        self.open.send_replace(false);
    }

    pub fn open(&self) {
        self.open.send_replace(true);
    }

    /// Resolves once a call is waiting at the closed door.
    pub async fn arrived(&self) {
        self.arrived.notified().await;
    }

    async fn pass(&self) {
        let mut rx = self.open.subscribe();
        let open = *rx.borrow_and_update();
        if open {
            return;
        }
        self.arrived.notify_one();
        loop {
            if rx.changed().await.is_err() {
                return;
            }
            let open = *rx.borrow_and_update();
            if open {
                return;
            }
        }
    }
}

/// Transport answering from a script of replies.
///
/// Replies are consumed in order; once the script runs dry the fallback reply
/// (if any) is repeated, otherwise the call fails with a transport error.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<String, AlarmError>>>,
    fallback: Mutex<Option<Result<String, AlarmError>>>,
    requests: Mutex<Vec<String>>,
    pub hold: Hold,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer every request with `body`.
    pub fn always(body: String) -> Arc<Self> {
        let transport = Self::default();
        *transport.fallback.lock().unwrap() = Some(Ok(body));
        Arc::new(transport)
    }

    pub fn push(&self, reply: Result<String, AlarmError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn set_fallback(&self, reply: Result<String, AlarmError>) {
        *self.fallback.lock().unwrap() = Some(reply);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<String, AlarmError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.hold.pass().await;

        let scripted = self.replies.lock().unwrap().pop_front();
        match scripted {
            Some(reply) => reply,
            None => self
                .fallback
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Err(AlarmError::Transport("no scripted reply".to_string()))),
        }
    }
}

/// One call received by [`RecordingDispatcher`].
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchCall {
    Daily {
        fire_instant: DateTime<FixedOffset>,
        variant: MessageVariant,
        location_label: String,
    },
    Once {
        fire_instant: DateTime<FixedOffset>,
        variant: MessageVariant,
        location_label: String,
    },
    CancelAll,
}

/// Dispatcher that records every call and tracks what would be pending.
#[derive(Default)]
pub struct RecordingDispatcher {
    calls: Mutex<Vec<DispatchCall>>,
    pending: Mutex<Option<DispatchCall>>,
    failing: AtomicBool,
    pub hold: Hold,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make schedule calls fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<DispatchCall> {
        self.calls.lock().unwrap().clone()
    }

    /// The notification that would fire, if any.
    pub fn pending(&self) -> Option<DispatchCall> {
        self.pending.lock().unwrap().clone()
    }

    pub fn schedule_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| !matches!(call, DispatchCall::CancelAll))
            .count()
    }

    async fn schedule(&self, call: DispatchCall) -> anyhow::Result<()> {
        self.hold.pass().await;
        self.calls.lock().unwrap().push(call.clone());
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("notification permission denied");
        }
        *self.pending.lock().unwrap() = Some(call);
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn schedule_daily(
        &self,
        fire_instant: DateTime<FixedOffset>,
        variant: MessageVariant,
        location_label: &str,
    ) -> anyhow::Result<()> {
        self.schedule(DispatchCall::Daily {
            fire_instant,
            variant,
            location_label: location_label.to_string(),
        })
        .await
    }

    async fn schedule_once(
        &self,
        fire_instant: DateTime<FixedOffset>,
        variant: MessageVariant,
        location_label: &str,
    ) -> anyhow::Result<()> {
        self.schedule(DispatchCall::Once {
            fire_instant,
            variant,
            location_label: location_label.to_string(),
        })
        .await
    }

    async fn cancel_all(&self) {
        self.calls.lock().unwrap().push(DispatchCall::CancelAll);
        *self.pending.lock().unwrap() = None;
    }
}

/// A scheduler wired to in-memory doubles, with the clock at 2024-03-10 12:00 UTC
/// and calendar days read in UTC.
pub struct TestRig {
    pub scheduler: Arc<AlarmScheduler>,
    pub registry: Arc<LocationRegistry>,
    pub transport: Arc<ScriptedTransport>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedTimeSource>,
}

impl TestRig {
    pub fn new(busy_policy: BusyPolicy) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), busy_policy)
    }

    /// Build a rig over an existing store, as a restarted process would.
    pub fn with_store(store: Arc<MemoryStore>, busy_policy: BusyPolicy) -> Self {
        let registry = Arc::new(LocationRegistry::load(store.clone()).unwrap());
        let transport = ScriptedTransport::new();
        let dispatcher = RecordingDispatcher::new();
        let clock = Arc::new(FixedTimeSource::new(
            Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
        ));

        let resolver = SunriseResolver::new(
            transport.clone(),
            clock.clone(),
            "https://sunrise.invalid/json",
            ZonePolicy::Fixed(Tz::UTC),
        );
        let scheduler = Arc::new(AlarmScheduler::new(SchedulerParams {
            registry: registry.clone(),
            resolver,
            dispatcher: dispatcher.clone(),
            store: store.clone(),
            clock: clock.clone(),
            busy_policy,
        }));

        Self {
            scheduler,
            registry,
            transport,
            dispatcher,
            store,
            clock,
        }
    }

    /// Add a location and select it.
    pub fn select_new(&self, name: &str, latitude: f64, longitude: f64) -> SavedLocation {
        let location = self
            .registry
            .add(SavedLocation::new(name, latitude, longitude))
            .unwrap();
        self.registry.select(location.id).unwrap();
        location
    }
}
