//! Polling strategy
//!
//! Fetches a still screenshot of the active session right away and then on
//! a fixed period. Every activation change stops the timer and discards the
//! current frame; results that arrive for a session that is no longer
//! active are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use vantage_api::RemoteApi;

use crate::frame::{Frame, StillFrame, SyncStatus};
use crate::viewport::Viewport;

/// Scoped background timer; dropping the handle stops it.
struct PollHandle(JoinHandle<()>);

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// An out-of-cadence fetch waiting for its deadline.
struct PendingRefresh {
    deadline: Instant,
    handle: PollHandle,
}

impl PendingRefresh {
    fn covers(&self, deadline: Instant) -> bool {
        !self.handle.0.is_finished() && self.deadline <= deadline
    }
}

#[derive(Default)]
struct Slot {
    session_id: Option<String>,
    /// Bumped on every activation change
    generation: u64,
}

struct PollInner {
    api: Arc<dyn RemoteApi>,
    viewport: Viewport,
    frame: watch::Sender<Option<Frame>>,
    status: watch::Sender<SyncStatus>,
    slot: Mutex<Slot>,
    last_token: AtomicU64,
}

impl PollInner {
    /// Cache-busting token: wall-clock millis, forced strictly increasing.
    fn next_token(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        match self
            .last_token
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            }) {
            Ok(last) | Err(last) => now.max(last + 1),
        }
    }

    async fn fetch(&self, session_id: &str, generation: u64) {
        let token = self.next_token();
        tracing::debug!(session_id, token, "Fetching screenshot");

        let result = self.api.screenshot(session_id, token).await;

        let slot = self.slot.lock();
        if slot.generation != generation {
            tracing::debug!(session_id, token, "Discarding screenshot for inactive session");
            return;
        }

        match result {
            Ok(image) => {
                // A slow tick must not overwrite a newer refresh
                let newer = self
                    .frame
                    .borrow()
                    .as_ref()
                    .and_then(Frame::as_still)
                    .map_or(true, |current| current.token < token);

                if newer {
                    self.frame.send_replace(Some(Frame::Still(StillFrame {
                        session_id: session_id.to_string(),
                        url: self.api.screenshot_url(session_id, token),
                        token,
                        image,
                        captured_at: Utc::now(),
                    })));
                }
                self.status.send_replace(SyncStatus::Fresh);
            }
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Screenshot fetch failed, keeping last frame");
                self.status.send_replace(SyncStatus::Stale(e.to_string()));
            }
        }
    }
}

pub struct PollingSync {
    inner: Arc<PollInner>,
    period: Duration,
    timer: Mutex<Option<PollHandle>>,
    refresh: Mutex<Option<PendingRefresh>>,
}

impl PollingSync {
    pub fn new(api: Arc<dyn RemoteApi>, period: Duration, viewport: Viewport) -> Self {
        let (frame, _) = watch::channel(None);
        let (status, _) = watch::channel(SyncStatus::Idle);

        Self {
            inner: Arc::new(PollInner {
                api,
                viewport,
                frame,
                status,
                slot: Mutex::new(Slot::default()),
                last_token: AtomicU64::new(0),
            }),
            period,
            timer: Mutex::new(None),
            refresh: Mutex::new(None),
        }
    }

    /// Point the feed at `session_id`, or stop it with `None`. Re-activating
    /// the current session is a no-op.
    pub fn activate(&self, session_id: Option<&str>) {
        let mut timer = self.timer.lock();

        let generation = {
            let mut slot = self.inner.slot.lock();
            if slot.session_id.as_deref() == session_id {
                return;
            }
            slot.session_id = session_id.map(str::to_string);
            slot.generation += 1;
            slot.generation
        };

        *self.refresh.lock() = None;
        *timer = None;
        self.inner.frame.send_replace(None);

        let Some(session_id) = session_id else {
            self.inner.status.send_replace(SyncStatus::Idle);
            tracing::debug!("Polling stopped");
            return;
        };

        self.inner.status.send_replace(SyncStatus::Connecting);
        tracing::info!(
            session_id,
            period_ms = self.period.as_millis() as u64,
            "Polling started"
        );

        let inner = Arc::clone(&self.inner);
        let period = self.period;
        let session_id = session_id.to_string();
        *timer = Some(PollHandle(tokio::spawn(async move {
            // First tick fires immediately
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                inner.fetch(&session_id, generation).await;
            }
        })));
    }

    /// One out-of-cadence fetch after `delay`. Requests coalesce onto the
    /// earliest pending deadline; the steady timer is unaffected.
    pub fn refresh_after(&self, delay: Duration) {
        let (session_id, generation) = {
            let slot = self.inner.slot.lock();
            match &slot.session_id {
                Some(id) => (id.clone(), slot.generation),
                None => return,
            }
        };

        let deadline = Instant::now() + delay;
        let mut refresh = self.refresh.lock();
        if refresh.as_ref().is_some_and(|pending| pending.covers(deadline)) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let handle = PollHandle(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            inner.fetch(&session_id, generation).await;
        }));
        *refresh = Some(PendingRefresh { deadline, handle });
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.slot.lock().session_id.clone()
    }

    pub fn current_frame(&self) -> Option<Frame> {
        self.inner.frame.borrow().clone()
    }

    pub fn watch_frame(&self) -> watch::Receiver<Option<Frame>> {
        self.inner.frame.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    pub fn viewport(&self) -> Viewport {
        self.inner.viewport
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
