//! TTL response cache with in-flight request deduplication.
//!
//! Each key holds at most one stored entry and at most one pending fetch.
//! Pending fetches run as spawned tasks wrapped in a [`Shared`] future, so
//! every caller for the same key awaits one underlying request and observes
//! the same result, even if the caller that started it goes away.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::scheduler::{Priority, RequestScheduler};
use crate::config::CacheConfig;
use crate::error::ApiError;

/// Freshness class for a cached read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    Short,
    Default,
    Long,
}

/// Which entries an invalidation removes.
pub enum Invalidation<'a, K> {
    Key(&'a K),
    Matching(&'a (dyn Fn(&K) -> bool + Send + Sync)),
    All,
}

impl<K> Invalidation<'_, K>
where
    K: Eq,
{
    fn matches(&self, key: &K) -> bool {
        match self {
            Self::Key(target) => *target == key,
            Self::Matching(predicate) => predicate(key),
            Self::All => true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Ttls {
    short: Duration,
    default: Duration,
    long: Duration,
    error: Duration,
    cache_errors: bool,
}

impl Ttls {
    fn for_class(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Short => self.short,
            TtlClass::Default => self.default,
            TtlClass::Long => self.long,
        }
    }
}

impl From<&CacheConfig> for Ttls {
    fn from(config: &CacheConfig) -> Self {
        Self {
            short: Duration::from_secs(config.short_ttl_secs),
            default: Duration::from_secs(config.default_ttl_secs),
            long: Duration::from_secs(config.long_ttl_secs),
            error: Duration::from_secs(config.error_ttl_secs),
            cache_errors: config.cache_errors,
        }
    }
}

struct Entry<V> {
    value: Result<V, ApiError>,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }
}

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, ApiError>>>;

struct Pending<V> {
    id: u64,
    fetch: SharedFetch<V>,
}

struct CacheState<K, V> {
    entries: HashMap<K, Entry<V>>,
    pending: HashMap<K, Pending<V>>,
    next_id: u64,
}

/// Cache of typed read results, fronting a [`RequestScheduler`].
pub struct ResponseCache<K, V> {
    state: Arc<Mutex<CacheState<K, V>>>,
    scheduler: Arc<RequestScheduler>,
    ttls: Ttls,
}

fn lock<K, V>(state: &Mutex<CacheState<K, V>>) -> MutexGuard<'_, CacheState<K, V>> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Errors that are stable for a given request and should not be replayed
/// from cache.
fn is_cacheable_error(err: &ApiError) -> bool {
    !matches!(err, ApiError::Authentication(_) | ApiError::Validation(_))
}

impl<K, V> ResponseCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(scheduler: Arc<RequestScheduler>, config: &CacheConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                pending: HashMap::new(),
                next_id: 0,
            })),
            scheduler,
            ttls: Ttls::from(config),
        }
    }

    /// Return the live value for `key`, join its in-flight fetch, or start
    /// `fetch` through the scheduler.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: K,
        ttl: TtlClass,
        fetch: F,
    ) -> Result<V, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let shared = {
            let mut state = lock(&self.state);
            let now = Instant::now();
            let live = state
                .entries
                .get(&key)
                .filter(|entry| entry.is_live(now))
                .map(|entry| entry.value.clone());
            if let Some(value) = live {
                debug!(key = ?key, "cache hit");
                return value;
            }
            state.entries.remove(&key);
            if let Some(pending) = state.pending.get(&key) {
                debug!(key = ?key, "joining in-flight request");
                pending.fetch.clone()
            } else {
                debug!(key = ?key, "cache miss");
                let id = state.next_id;
                state.next_id += 1;
                let shared = self.spawn_fetch(key.clone(), id, self.ttls.for_class(ttl), fetch());
                state.pending.insert(
                    key,
                    Pending {
                        id,
                        fetch: shared.clone(),
                    },
                );
                shared
            }
        };
        shared.await
    }

    fn spawn_fetch<Fut>(&self, key: K, id: u64, ttl: Duration, fetch: Fut) -> SharedFetch<V>
    where
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let scheduler = Arc::clone(&self.scheduler);
        let state = Arc::clone(&self.state);
        let ttls = self.ttls;
        let task = tokio::spawn(async move {
            let result = scheduler.enqueue(Priority::Normal, fetch).await;
            let mut guard = lock(&state);
            // An invalidation while in flight removes the marker; the stale
            // result is still delivered but not stored.
            if guard.pending.get(&key).is_some_and(|p| p.id == id) {
                guard.pending.remove(&key);
                let stored_ttl = match &result {
                    Ok(_) => Some(ttl),
                    Err(err) if ttls.cache_errors && is_cacheable_error(err) => Some(ttls.error),
                    Err(_) => None,
                };
                if let Some(ttl) = stored_ttl {
                    guard.entries.insert(
                        key,
                        Entry {
                            value: result.clone(),
                            stored_at: Instant::now(),
                            ttl,
                        },
                    );
                }
            }
            result
        });
        async move {
            task.await
                .unwrap_or_else(|err| Err(ApiError::network(format!("request task failed: {err}"))))
        }
        .boxed()
        .shared()
    }

    /// Drop stored entries and pending markers selected by `which`.
    pub fn invalidate(&self, which: Invalidation<'_, K>) {
        let mut state = lock(&self.state);
        let before = state.entries.len();
        state.entries.retain(|key, _| !which.matches(key));
        state.pending.retain(|key, _| !which.matches(key));
        debug!(removed = before - state.entries.len(), "cache invalidated");
    }

    /// Live successful value for `key`, without fetching.
    pub fn peek(&self, key: &K) -> Option<V> {
        let state = lock(&self.state);
        let entry = state.entries.get(key)?;
        if !entry.is_live(Instant::now()) {
            return None;
        }
        entry.value.as_ref().ok().cloned()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> std::fmt::Debug for ResponseCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("ResponseCache")
            .field("entries", &state.entries.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientProfile, SchedulerConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache<V>() -> ResponseCache<String, V>
    where
        V: Clone + Send + Sync + 'static,
    {
        let scheduler = Arc::new(RequestScheduler::new(&SchedulerConfig::for_profile(
            ClientProfile::Web,
        )));
        ResponseCache::new(scheduler, &CacheConfig::default())
    }

    fn counted_fetch(
        calls: &Arc<AtomicUsize>,
        value: &'static str,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<String, ApiError>> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(value.to_string())
            }
            .boxed()
        }
    }

    // Verifies concurrent callers for one key share a single fetch.
    #[tokio::test]
    async fn concurrent_reads_share_one_fetch() {
        let cache = Arc::new(cache::<String>());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = Arc::clone(&cache);
            let fetch = counted_fetch(&calls, "payload");
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("tasks_list_all".to_string(), TtlClass::Short, fetch)
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.expect("join").as_deref(), Ok("payload"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    // Verifies entries are served until their TTL elapses, then refetched.
    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = cache::<String>();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = "task_item_1".to_string();

        cache
            .get_or_fetch(key.clone(), TtlClass::Short, counted_fetch(&calls, "v1"))
            .await
            .expect("first");
        tokio::time::advance(Duration::from_secs(9)).await;
        let cached = cache
            .get_or_fetch(key.clone(), TtlClass::Short, counted_fetch(&calls, "v2"))
            .await
            .expect("cached");
        assert_eq!(cached, "v1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.peek(&key), None);
        let refreshed = cache
            .get_or_fetch(key, TtlClass::Short, counted_fetch(&calls, "v2"))
            .await
            .expect("refetched");
        assert_eq!(refreshed, "v2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    // Verifies transient failures are cached briefly and auth failures never.
    #[tokio::test(start_paused = true)]
    async fn failures_are_cached_for_error_window() {
        let cache = cache::<String>();
        let calls = Arc::new(AtomicUsize::new(0));
        let failing = |calls: &Arc<AtomicUsize>, err: ApiError| {
            let calls = Arc::clone(calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(err)
            }
        };

        let key = "tasks_stats".to_string();
        let server_error = ApiError::from_response(503, "", None);
        for _ in 0..3 {
            let err = cache
                .get_or_fetch(key.clone(), TtlClass::Default, failing(&calls, server_error.clone()))
                .await
                .expect_err("fails");
            assert_eq!(err, server_error);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.peek(&key), None, "errors are not peekable");

        tokio::time::advance(Duration::from_secs(6)).await;
        cache
            .get_or_fetch(key.clone(), TtlClass::Default, failing(&calls, server_error.clone()))
            .await
            .expect_err("fails again");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let auth_key = "user_profile".to_string();
        for _ in 0..2 {
            cache
                .get_or_fetch(
                    auth_key.clone(),
                    TtlClass::Long,
                    failing(&calls, ApiError::authentication("expired")),
                )
                .await
                .expect_err("auth");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    // Verifies key, predicate and full invalidation.
    #[tokio::test]
    async fn invalidation_by_key_predicate_and_all() {
        let cache = cache::<String>();
        let calls = Arc::new(AtomicUsize::new(0));
        for key in ["tasks_list_a", "tasks_list_b", "task_item_1", "tasks_stats"] {
            cache
                .get_or_fetch(key.to_string(), TtlClass::Default, counted_fetch(&calls, "v"))
                .await
                .expect("fetch");
        }
        assert_eq!(cache.len(), 4);

        cache.invalidate(Invalidation::Key(&"task_item_1".to_string()));
        assert_eq!(cache.peek(&"task_item_1".to_string()), None);
        assert_eq!(cache.len(), 3);

        cache.invalidate(Invalidation::Matching(&|key: &String| {
            key.starts_with("tasks_list_")
        }));
        assert_eq!(cache.len(), 1);
        assert!(cache.peek(&"tasks_stats".to_string()).is_some());

        cache.invalidate(Invalidation::All);
        assert!(cache.is_empty());
    }

    // Verifies a fetch invalidated mid-flight does not repopulate the cache.
    #[tokio::test]
    async fn invalidated_pending_fetch_is_not_stored() {
        let cache = cache::<String>();
        let calls = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let key = "tasks_list_all".to_string();

        let first = cache.get_or_fetch(key.clone(), TtlClass::Short, move || async move {
            let _ = release_rx.await;
            Ok::<_, ApiError>("stale".to_string())
        });
        let invalidate_then_release = async {
            tokio::task::yield_now().await;
            cache.invalidate(Invalidation::All);
            release_tx.send(()).expect("release");
        };
        let (stale, ()) = tokio::join!(first, invalidate_then_release);
        assert_eq!(stale.as_deref(), Ok("stale"));
        assert!(cache.is_empty());

        let fresh = cache
            .get_or_fetch(key, TtlClass::Short, counted_fetch(&calls, "fresh"))
            .await;
        assert_eq!(fresh.as_deref(), Ok("fresh"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
