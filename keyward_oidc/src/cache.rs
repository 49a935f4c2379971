//! A shared, self-refreshing copy of the provider's key set

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError, Weak,
    },
    time::Duration,
};

use arc_swap::ArcSwapOption;
use futures::future::{BoxFuture, FutureExt, Shared};
use keyward::Jwks;
use keyward_clock::{Clock, System, UnixTime};

use crate::fetch::{FetchError, JwksFetcher};

/// How long a fetched key set is served before it is fetched again
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(5 * 60);

pub(crate) type SharedClock = Arc<dyn Clock + Send + Sync>;

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<JwksDocument>, FetchError>>>;

/// The fetch every caller currently joins, and the generation it serves
struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

/// A key set together with the time it was obtained
#[derive(Debug)]
pub struct JwksDocument {
    jwks: Jwks,
    fetched_at: UnixTime,
    generation: u64,
}

impl JwksDocument {
    pub(crate) fn new(jwks: Jwks, fetched_at: UnixTime, generation: u64) -> Self {
        Self {
            jwks,
            fetched_at,
            generation,
        }
    }

    /// The key set
    #[must_use]
    pub fn jwks(&self) -> &Jwks {
        &self.jwks
    }

    /// When the key set was obtained
    #[must_use]
    pub fn fetched_at(&self) -> UnixTime {
        self.fetched_at
    }
}

/// Caches the most recently fetched key set
///
/// A document younger than the freshness window is served as is. Once it
/// goes stale, or after [`invalidate()`](Self::invalidate), the next
/// [`get()`](Self::get) fetches again. Concurrent callers share a single
/// in-flight fetch, and a caller that stops waiting does not cancel it for
/// the others.
///
/// When a fetch fails and an earlier document exists, the earlier document
/// is served instead of the error.
///
/// Clones share the same underlying cache.
#[derive(Clone)]
pub struct JwksCache {
    inner: Arc<Inner>,
}

struct Inner {
    fetcher: Arc<dyn JwksFetcher>,
    clock: SharedClock,
    freshness: Duration,
    current: ArcSwapOption<JwksDocument>,
    generation: AtomicU64,
    in_flight: Mutex<Option<InFlight>>,
}

impl fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fetched_at = self.inner.current.load_full().map(|d| d.fetched_at);
        f.debug_struct("JwksCache")
            .field("fetcher", &self.inner.fetcher)
            .field("freshness", &self.inner.freshness)
            .field("fetched_at", &fetched_at)
            .field("generation", &self.inner.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl JwksCache {
    /// Constructs an empty cache using the system clock
    pub fn new<F>(fetcher: F, freshness: Duration) -> Self
    where
        F: JwksFetcher + 'static,
    {
        Self::with_clock(fetcher, freshness, System)
    }

    /// Constructs an empty cache that measures freshness with `clock`
    pub fn with_clock<F, C>(fetcher: F, freshness: Duration, clock: C) -> Self
    where
        F: JwksFetcher + 'static,
        C: Clock + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                fetcher: Arc::new(fetcher),
                clock: Arc::new(clock),
                freshness,
                current: ArcSwapOption::empty(),
                generation: AtomicU64::new(0),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// The freshness window
    #[must_use]
    pub fn freshness(&self) -> Duration {
        self.inner.freshness
    }

    pub(crate) fn clock(&self) -> &SharedClock {
        &self.inner.clock
    }

    /// The current document, if any, without fetching or checking freshness
    #[must_use]
    pub fn current(&self) -> Option<Arc<JwksDocument>> {
        self.inner.current.load_full()
    }

    /// Gets a usable key set, fetching if the cached one is stale
    ///
    /// # Errors
    ///
    /// Fails only if the fetch fails and no key set was ever obtained.
    pub async fn get(&self) -> Result<Arc<JwksDocument>, FetchError> {
        if let Some(doc) = self.fresh_document() {
            return Ok(doc);
        }

        match self.join_fetch(true).await {
            Ok(doc) => Ok(doc),
            Err(err) => match self.current() {
                Some(stale) => {
                    let error: &dyn std::error::Error = &err;
                    tracing::warn!(
                        error,
                        jwks.fetched_at = stale.fetched_at.0,
                        "JWKS refresh failed; serving stale key set",
                    );
                    Ok(stale)
                }
                None => Err(err),
            },
        }
    }

    /// Marks the current document so that the next [`get()`](Self::get)
    /// fetches again
    pub fn invalidate(&self) {
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(jwks.generation = generation, "JWKS invalidated");
    }

    /// Fetches the key set now, regardless of freshness
    ///
    /// Joins a fetch that is already in flight rather than starting a
    /// second one.
    ///
    /// # Errors
    ///
    /// Returns the fetch error. The cached document, if any, is unchanged.
    pub async fn refresh(&self) -> Result<Arc<JwksDocument>, FetchError> {
        self.join_fetch(false).await
    }

    /// Installs a key set directly, as if it had just been fetched
    pub fn set_jwks(&self, jwks: Jwks) {
        let doc = JwksDocument::new(
            jwks,
            self.inner.clock.now(),
            self.inner.generation.load(Ordering::Acquire),
        );
        self.inner.current.store(Some(Arc::new(doc)));
    }

    /// Spawns a task that refreshes the key set every `interval`
    ///
    /// Failures are logged and otherwise ignored; the next tick tries
    /// again. Abort the returned handle to stop refreshing.
    #[cfg(feature = "tokio")]
    #[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
    pub fn spawn_refresh(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let this = self.clone();

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.tick().await;

            loop {
                timer.tick().await;
                // Ignore any errors; we'll just try again next time
                let _ = this.refresh().await;
            }
        })
    }

    fn fresh_document(&self) -> Option<Arc<JwksDocument>> {
        let doc = self.inner.current.load_full()?;
        let current_generation = self.inner.generation.load(Ordering::Acquire);
        let expires = doc.fetched_at.saturating_add(self.inner.freshness);

        (doc.generation == current_generation && self.inner.clock.now() < expires).then_some(doc)
    }

    async fn join_fetch(&self, accept_fresh: bool) -> Result<Arc<JwksDocument>, FetchError> {
        let fetch = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            // a fetch may have completed while we were waiting for the lock
            if accept_fresh {
                if let Some(doc) = self.fresh_document() {
                    return Ok(doc);
                }
            }

            let generation = self.inner.generation.load(Ordering::Acquire);
            let joinable = slot
                .as_ref()
                .filter(|in_flight| in_flight.generation >= generation)
                .map(|in_flight| in_flight.fetch.clone());

            match joinable {
                Some(fetch) => fetch,
                None => {
                    // a fetch started before the last invalidation cannot
                    // satisfy this caller; chain a new one behind it
                    let previous = slot.take().map(|in_flight| in_flight.fetch);
                    let fetch = self.start_fetch(generation, previous);
                    *slot = Some(InFlight {
                        generation,
                        fetch: fetch.clone(),
                    });
                    fetch
                }
            }
        };

        fetch.await
    }

    /// Builds the shared fetch for `generation`
    ///
    /// When `previous` is given, the new fetch waits for it first so that
    /// documents are stored in generation order.
    fn start_fetch(&self, generation: u64, previous: Option<SharedFetch>) -> SharedFetch {
        let fetcher = Arc::clone(&self.inner.fetcher);
        let clock = Arc::clone(&self.inner.clock);
        let cache = Arc::downgrade(&self.inner);

        tracing::debug!(
            jwks.generation = generation,
            superseding = previous.is_some(),
            "starting JWKS fetch"
        );

        async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }

            let result = fetcher
                .fetch()
                .await
                .map(|jwks| Arc::new(JwksDocument::new(jwks, clock.now(), generation)));

            if let Some(inner) = Weak::upgrade(&cache) {
                if let Ok(doc) = &result {
                    inner.current.store(Some(Arc::clone(doc)));
                    tracing::info!(jwks.keys = doc.jwks.len(), "JWKS refreshed");
                }

                let mut slot = inner
                    .in_flight
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if slot
                    .as_ref()
                    .is_some_and(|in_flight| in_flight.generation == generation)
                {
                    *slot = None;
                }
            }

            result
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use color_eyre::Result;
    use keyward::{jwk::KeyIdRef, test_util::TestSigner};
    use keyward_clock::TestClock;
    use tracing_test::traced_test;

    use super::*;
    use crate::testing::CountingFetcher;

    const NOW: UnixTime = UnixTime(1_700_000_000);
    const FRESHNESS: Duration = Duration::from_secs(300);

    fn cache(fetcher: &Arc<CountingFetcher>) -> (JwksCache, TestClock) {
        let clock = TestClock::new(NOW);
        let cache = JwksCache::with_clock(Arc::clone(fetcher), FRESHNESS, clock.clone());
        (cache, clock)
    }

    fn primary_jwks() -> Jwks {
        TestSigner::primary().jwks()
    }

    #[tokio::test]
    async fn first_get_fetches_and_later_gets_reuse() -> Result<()> {
        let fetcher = Arc::new(CountingFetcher::serving(primary_jwks()));
        let (cache, _) = cache(&fetcher);
        assert!(cache.current().is_none());

        let first = cache.get().await?;
        let second = cache.get().await?;

        assert_eq!(fetcher.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.fetched_at(), NOW);
        Ok(())
    }

    #[tokio::test]
    async fn stale_document_is_refetched() -> Result<()> {
        let fetcher = Arc::new(CountingFetcher::serving(primary_jwks()));
        let (cache, clock) = cache(&fetcher);

        cache.get().await?;
        clock.advance(FRESHNESS - Duration::from_secs(1));
        cache.get().await?;
        assert_eq!(fetcher.calls(), 1);

        clock.advance(Duration::from_secs(1));
        let doc = cache.get().await?;
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(doc.fetched_at(), NOW.saturating_add(FRESHNESS));
        Ok(())
    }

    #[tokio::test]
    async fn invalidate_forces_the_next_get_to_fetch() -> Result<()> {
        let fetcher = Arc::new(CountingFetcher::serving(Jwks::default()));
        let (cache, _) = cache(&fetcher);

        let before = cache.get().await?;
        assert!(before.jwks().is_empty());

        fetcher.serve(primary_jwks());
        cache.invalidate();

        let after = cache.get().await?;
        assert_eq!(fetcher.calls(), 2);
        assert!(after
            .jwks()
            .get_key_by_id(KeyIdRef::from_static("K1"))
            .is_some());

        cache.get().await?;
        assert_eq!(fetcher.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_refresh_serves_stale_document() -> Result<()> {
        let fetcher = Arc::new(CountingFetcher::serving(primary_jwks()));
        let (cache, clock) = cache(&fetcher);

        let original = cache.get().await?;
        fetcher.fail();
        clock.advance(FRESHNESS * 2);

        let served = cache.get().await?;
        assert!(Arc::ptr_eq(&original, &served));
        assert_eq!(fetcher.calls(), 2);
        assert!(logs_contain("serving stale key set"));
        Ok(())
    }

    #[tokio::test]
    async fn failure_without_any_document_is_returned() {
        let fetcher = Arc::new(CountingFetcher::failing());
        let (cache, _) = cache(&fetcher);

        let err = cache.get().await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));

        // the failed fetch is not remembered
        assert!(cache.get().await.is_err());
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn refresh_fetches_even_when_fresh() -> Result<()> {
        let fetcher = Arc::new(CountingFetcher::serving(primary_jwks()));
        let (cache, _) = cache(&fetcher);

        cache.get().await?;
        cache.refresh().await?;
        assert_eq!(fetcher.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_failure_keeps_current_document() -> Result<()> {
        let fetcher = Arc::new(CountingFetcher::serving(primary_jwks()));
        let (cache, _) = cache(&fetcher);

        let original = cache.get().await?;
        fetcher.fail();

        assert!(cache.refresh().await.is_err());
        let current = cache.current().expect("document retained");
        assert!(Arc::ptr_eq(&original, &current));
        Ok(())
    }

    #[tokio::test]
    async fn set_jwks_is_served_without_fetching() -> Result<()> {
        let fetcher = Arc::new(CountingFetcher::failing());
        let (cache, _) = cache(&fetcher);

        cache.set_jwks(primary_jwks());
        let doc = cache.get().await?;

        assert_eq!(doc.jwks().len(), 1);
        assert_eq!(fetcher.calls(), 0);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_share_one_fetch() -> Result<()> {
        let fetcher = Arc::new(
            CountingFetcher::serving(primary_jwks()).with_delay(Duration::from_millis(50)),
        );
        let (cache, _) = cache(&fetcher);

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get().await })
            })
            .collect();

        for task in tasks {
            task.await??;
        }

        assert_eq!(fetcher.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn abandoned_wait_does_not_cancel_the_fetch() -> Result<()> {
        let fetcher = Arc::new(CountingFetcher::serving(primary_jwks()).gated());
        let (cache, _) = cache(&fetcher);

        let abandoned = tokio::time::timeout(Duration::from_millis(20), cache.get()).await;
        assert!(abandoned.is_err());
        assert_eq!(fetcher.calls(), 1);

        let waiter = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get().await }
        });
        tokio::task::yield_now().await;
        fetcher.open_gate();

        let doc = waiter.await??;
        assert_eq!(doc.jwks().len(), 1);
        assert_eq!(fetcher.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn invalidate_during_fetch_is_not_answered_by_that_fetch() -> Result<()> {
        let fetcher = Arc::new(CountingFetcher::serving(Jwks::default()).gated());
        let (cache, _) = cache(&fetcher);

        let early = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get().await }
        });
        while fetcher.calls() < 1 {
            tokio::task::yield_now().await;
        }

        // the provider rotates while the first request is still outstanding
        fetcher.serve(primary_jwks());
        cache.invalidate();

        let late = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get().await }
        });
        tokio::task::yield_now().await;
        fetcher.open_gate();

        assert!(early.await??.jwks().is_empty());

        let doc = late.await??;
        assert!(doc
            .jwks()
            .get_key_by_id(KeyIdRef::from_static("K1"))
            .is_some());
        assert_eq!(fetcher.calls(), 2);

        let current = cache.current().expect("document stored");
        assert!(Arc::ptr_eq(&current, &doc));
        Ok(())
    }

    #[cfg(feature = "tokio")]
    #[tokio::test(start_paused = true)]
    async fn background_refresh_runs_on_interval() -> Result<()> {
        let fetcher = Arc::new(CountingFetcher::serving(primary_jwks()));
        let (cache, _) = cache(&fetcher);

        let handle = cache.spawn_refresh(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(150)).await;
        handle.abort();

        assert_eq!(fetcher.calls(), 2);
        assert!(cache.current().is_some());
        Ok(())
    }
}
