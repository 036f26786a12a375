//! Priority request scheduler with concurrency and rate limits.
//!
//! Jobs are queued per priority class and admitted by a single dispatcher
//! task. The dispatcher wakes on enqueue and on slot release, and sleeps for
//! a fixed deferral while the trailing one-second start window is full.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;
use tracing::debug;

use crate::config::SchedulerConfig;
use crate::error::ApiError;

const RATE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    fn index(self) -> usize {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    pub queued_high: usize,
    pub queued_normal: usize,
    pub queued_low: usize,
    pub running: usize,
    /// Starts recorded inside the trailing one-second window.
    pub recent_starts: usize,
}

impl SchedulerStats {
    pub fn queued(&self) -> usize {
        self.queued_high + self.queued_normal + self.queued_low
    }
}

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

struct Queued {
    job: Job,
    priority: Priority,
    enqueued_at: Instant,
}

#[derive(Default)]
struct SchedulerState {
    queues: [VecDeque<Queued>; 3],
    running: usize,
    starts: VecDeque<Instant>,
    closed: bool,
}

impl SchedulerState {
    fn prune_window(&mut self, now: Instant) {
        while let Some(oldest) = self.starts.front() {
            if now.duration_since(*oldest) >= RATE_WINDOW {
                self.starts.pop_front();
            } else {
                break;
            }
        }
    }

    fn has_queued(&self) -> bool {
        self.queues.iter().any(|queue| !queue.is_empty())
    }

    fn pop_next(&mut self) -> Option<Queued> {
        self.queues.iter_mut().find_map(VecDeque::pop_front)
    }
}

struct Shared {
    max_concurrent: usize,
    rate_limit: usize,
    defer: Duration,
    state: Mutex<SchedulerState>,
    wake: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        // A panic while holding the lock cannot leave the queues half-updated.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Admits queued jobs in priority order under concurrency and rate limits.
///
/// The dispatcher task is started on first use, so construction does not
/// require a running Tokio runtime. Dropping the scheduler stops the
/// dispatcher; jobs still queued at that point are discarded.
pub struct RequestScheduler {
    shared: Arc<Shared>,
    started: AtomicBool,
}

impl RequestScheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                max_concurrent: config.max_concurrent.max(1),
                rate_limit: config.rate_limit_per_second.max(1),
                defer: config.defer_delay(),
                state: Mutex::new(SchedulerState::default()),
                wake: Notify::new(),
            }),
            started: AtomicBool::new(false),
        }
    }

    /// Queue `task` and wait for its result.
    ///
    /// A failing job only fails its own caller; the scheduler keeps
    /// dispatching.
    pub async fn enqueue<T, F>(&self, priority: Priority, task: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        self.ensure_dispatcher();
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let _ = tx.send(task.await);
        });
        {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(ApiError::network("request scheduler is shut down"));
            }
            state.queues[priority.index()].push_back(Queued {
                job,
                priority,
                enqueued_at: Instant::now(),
            });
        }
        self.shared.wake.notify_one();
        rx.await
            .unwrap_or_else(|_| Err(ApiError::network("request was dropped before completion")))
    }

    pub fn stats(&self) -> SchedulerStats {
        let mut state = self.shared.lock();
        state.prune_window(Instant::now());
        SchedulerStats {
            queued_high: state.queues[0].len(),
            queued_normal: state.queues[1].len(),
            queued_low: state.queues[2].len(),
            running: state.running,
            recent_starts: state.starts.len(),
        }
    }

    fn ensure_dispatcher(&self) {
        if !self.started.swap(true, Ordering::AcqRel) {
            tokio::spawn(dispatch_loop(Arc::clone(&self.shared)));
        }
    }
}

impl Drop for RequestScheduler {
    fn drop(&mut self) {
        self.shared.lock().closed = true;
        self.shared.wake.notify_one();
    }
}

impl std::fmt::Debug for RequestScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScheduler")
            .field("max_concurrent", &self.shared.max_concurrent)
            .field("rate_limit", &self.shared.rate_limit)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Releases a running slot when the job finishes, however it finishes.
struct SlotGuard(Arc<Shared>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        {
            let mut state = self.0.lock();
            state.running = state.running.saturating_sub(1);
        }
        self.0.wake.notify_one();
    }
}

async fn dispatch_loop(shared: Arc<Shared>) {
    loop {
        let deferral = {
            let mut state = shared.lock();
            if state.closed {
                state.queues.iter_mut().for_each(VecDeque::clear);
                return;
            }
            admit_ready(&shared, &mut state)
        };
        match deferral {
            Some(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shared.wake.notified() => {}
                }
            }
            None => shared.wake.notified().await,
        }
    }
}

/// Start every job the limits allow. Returns a deferral when queued work is
/// held back only by the rate limit.
fn admit_ready(shared: &Arc<Shared>, state: &mut SchedulerState) -> Option<Duration> {
    let now = Instant::now();
    state.prune_window(now);
    while state.running < shared.max_concurrent && state.has_queued() {
        if state.starts.len() >= shared.rate_limit {
            debug!(
                window_starts = state.starts.len(),
                defer_ms = shared.defer.as_millis() as u64,
                "rate limit reached, deferring admission"
            );
            return Some(shared.defer);
        }
        let Some(next) = state.pop_next() else {
            break;
        };
        state.running += 1;
        state.starts.push_back(now);
        debug!(
            priority = ?next.priority,
            waited_ms = now.duration_since(next.enqueued_at).as_millis() as u64,
            running = state.running,
            "admitting queued request"
        );
        let guard = SlotGuard(Arc::clone(shared));
        let job = next.job;
        tokio::spawn(async move {
            let _slot = guard;
            job.await;
        });
    }
    None
}
