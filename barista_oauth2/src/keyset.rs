//! A lazily populated cache of the identity provider's signing keys

use std::{fmt, future::Future, pin::Pin, sync::Arc, time::Duration};

use arc_swap::{ArcSwap, ArcSwapOption};
use barista::{
    clock::{Clock, System, UnixTime},
    jwk, Jwk, Jwks,
};
use reqwest::{
    header::{self, HeaderValue},
    Client, StatusCode,
};
use thiserror::Error;

/// The key set could not be obtained from its source
#[derive(Debug, Error)]
pub enum KeySetError {
    /// The request to the key set endpoint failed, or its body was not a key set
    #[error("unable to fetch key set from {url}")]
    Fetch {
        /// The endpoint that was queried
        url: String,
        /// The underlying transport or decoding error
        #[source]
        source: reqwest::Error,
    },

    /// The source reported no change, but no copy has ever been stored
    #[error("key set source reported no change before any key set was loaded")]
    NotModifiedWithoutCopy,
}

/// The outcome of asking a [`KeySource`] for the current key set
#[derive(Debug)]
pub enum Fetched {
    /// A fresh copy of the key set
    Updated(Jwks),

    /// The key set has not changed since the last successful fetch
    NotModified,
}

/// A boxed future returned by [`KeySource::fetch`]
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Fetched, KeySetError>> + Send + 'a>>;

/// A place from which a key set can be loaded
///
/// Calls to `fetch` made by a [`KeySetCache`] are never concurrent.
pub trait KeySource: fmt::Debug + Send + Sync + 'static {
    /// Loads the current key set
    fn fetch(&self) -> FetchFuture<'_>;
}

#[derive(Debug, Default)]
struct CacheValidators {
    etag: Option<HeaderValue>,
    last_modified: Option<HeaderValue>,
}

/// A key set published at a remote URL, such as
/// `https://{domain}/.well-known/jwks.json`
///
/// Refreshes are conditional: the `ETag` or `Last-Modified` value from the
/// last successful response is sent back, and a `304 Not Modified` answer
/// keeps the copy already held.
pub struct RemoteKeySource {
    jwks_url: String,
    client: Client,
    validators: ArcSwap<CacheValidators>,
}

impl RemoteKeySource {
    /// Constructs a source for the key set at the given URL
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(jwks_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("barista_oauth2/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(jwks_url, client))
    }

    /// Constructs a source for the key set at the given URL using an
    /// existing client
    pub fn with_client(jwks_url: impl Into<String>, client: Client) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            client,
            validators: ArcSwap::from_pointee(CacheValidators::default()),
        }
    }

    /// The URL of the key set
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    async fn fetch_remote(&self) -> Result<Fetched, KeySetError> {
        let fetch_error = |source| KeySetError::Fetch {
            url: self.jwks_url.clone(),
            source,
        };

        let mut request = self.client.get(&self.jwks_url);

        {
            let validators = self.validators.load();
            if let Some(etag) = &validators.etag {
                request = request.header(header::IF_NONE_MATCH, etag);
            } else if let Some(last_modified) = &validators.last_modified {
                request = request.header(header::IF_MODIFIED_SINCE, last_modified);
            }
        }

        let response = request.send().await.map_err(fetch_error)?;

        if response.status() == StatusCode::NOT_MODIFIED {
            tracing::debug!(jwks.url = %self.jwks_url, "JWKS not modified");
            return Ok(Fetched::NotModified);
        }

        if let Err(err) = response.error_for_status_ref() {
            let error: &dyn std::error::Error = &err;
            tracing::warn!(
                error,
                jwks.url = %self.jwks_url,
                http.status_code = response.status().as_u16(),
                "JWKS fetch failed; unexpected response status",
            );
            return Err(fetch_error(err));
        }

        let etag = response.headers().get(header::ETAG).map(ToOwned::to_owned);
        let last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .map(ToOwned::to_owned);

        let jwks = response.json::<Jwks>().await.map_err(fetch_error)?;

        self.validators.store(Arc::new(CacheValidators {
            etag,
            last_modified,
        }));

        Ok(Fetched::Updated(jwks))
    }
}

impl fmt::Debug for RemoteKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteKeySource")
            .field("jwks_url", &self.jwks_url)
            .finish_non_exhaustive()
    }
}

impl KeySource for RemoteKeySource {
    fn fetch(&self) -> FetchFuture<'_> {
        Box::pin(self.fetch_remote())
    }
}

/// A fixed, in-memory key set
#[derive(Clone, Debug)]
pub struct StaticKeySource(Jwks);

impl StaticKeySource {
    /// Serves the given key set on every fetch
    pub fn new(jwks: Jwks) -> Self {
        Self(jwks)
    }
}

impl KeySource for StaticKeySource {
    fn fetch(&self) -> FetchFuture<'_> {
        let jwks = self.0.clone();
        Box::pin(async move { Ok(Fetched::Updated(jwks)) })
    }
}

/// When a [`KeySetCache`] goes back to its source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// How long a fetched key set is trusted before the next lookup refetches
    /// it. `None` keeps the first copy for the lifetime of the cache.
    pub ttl: Option<Duration>,

    /// Whether a lookup for an unknown key ID refetches the key set once and
    /// retries the lookup
    pub refetch_on_miss: bool,

    /// The minimum time between two refetches triggered by unknown key IDs
    pub miss_cooldown: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            ttl: None,
            refetch_on_miss: true,
            miss_cooldown: Duration::from_secs(30),
        }
    }
}

impl RefreshPolicy {
    /// Fetches once and never again
    pub fn fetch_once() -> Self {
        Self {
            ttl: None,
            refetch_on_miss: false,
            miss_cooldown: Duration::ZERO,
        }
    }

    /// Sets the time-to-live of a fetched key set
    #[must_use]
    pub fn with_ttl(self, ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..self
        }
    }

    /// Sets the minimum spacing between refetches triggered by unknown key IDs
    #[must_use]
    pub fn with_miss_cooldown(self, miss_cooldown: Duration) -> Self {
        Self {
            miss_cooldown,
            ..self
        }
    }

    /// Disables refetching when a key ID is not found
    #[must_use]
    pub fn without_refetch_on_miss(self) -> Self {
        Self {
            refetch_on_miss: false,
            ..self
        }
    }
}

#[derive(Debug)]
struct Snapshot {
    jwks: Jwks,
    fetched_at: UnixTime,
    generation: u64,
}

#[derive(Debug, Default)]
struct FetchState {
    generation: u64,
    last_miss_refetch: Option<UnixTime>,
}

struct Inner {
    source: Box<dyn KeySource>,
    policy: RefreshPolicy,
    clock: Arc<dyn Clock + Send + Sync>,
    current: ArcSwapOption<Snapshot>,
    fetch: tokio::sync::Mutex<FetchState>,
}

impl fmt::Debug for Inner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySetCache")
            .field("source", &self.source)
            .field("policy", &self.policy)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

/// A cache of the signing keys published by an identity provider
///
/// Nothing is fetched until the first lookup. Fetches are single-flight:
/// callers that arrive while a fetch is in progress wait for it and then
/// use its result instead of fetching again. Clones share the same cache.
#[derive(Clone, Debug)]
#[must_use]
pub struct KeySetCache {
    inner: Arc<Inner>,
}

impl KeySetCache {
    /// Constructs a cache over the given source
    pub fn new(source: impl KeySource, policy: RefreshPolicy) -> Self {
        Self::with_clock(source, policy, System)
    }

    /// Constructs a cache over the given source, judging key set age by `clock`
    pub fn with_clock(
        source: impl KeySource,
        policy: RefreshPolicy,
        clock: impl Clock + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source: Box::new(source),
                policy,
                clock: Arc::new(clock),
                current: ArcSwapOption::empty(),
                fetch: tokio::sync::Mutex::new(FetchState::default()),
            }),
        }
    }

    /// Constructs a cache over the key set published at `jwks_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn remote(
        jwks_url: impl Into<String>,
        policy: RefreshPolicy,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(RemoteKeySource::new(jwks_url)?, policy))
    }

    /// Constructs a cache that always serves the given key set
    pub fn from_jwks(jwks: Jwks) -> Self {
        Self::new(StaticKeySource::new(jwks), RefreshPolicy::fetch_once())
    }

    /// The refresh policy in force
    pub fn policy(&self) -> &RefreshPolicy {
        &self.inner.policy
    }

    /// Whether a key set has been loaded yet
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.inner.current.load().is_some()
    }

    /// Looks up the key with the given key ID
    ///
    /// The key set is fetched first if nothing has been loaded yet or the
    /// loaded copy has outlived its time-to-live. If the key is not found
    /// and the policy allows it, the key set is refetched once and the
    /// lookup retried once.
    ///
    /// # Errors
    ///
    /// Returns an error only when no key set has ever been obtained.
    pub async fn get(&self, kid: &jwk::KeyIdRef) -> Result<Option<Jwk>, KeySetError> {
        let snapshot = self.current_or_fetch().await?;

        if let Some(key) = snapshot.jwks.get_key_by_id(kid) {
            return Ok(Some(key.clone()));
        }

        if !self.inner.policy.refetch_on_miss {
            tracing::debug!(%kid, "no key with matching kid");
            return Ok(None);
        }

        let snapshot = self.refetch_after_miss(&snapshot, kid).await?;
        let key = snapshot.jwks.get_key_by_id(kid).cloned();
        if key.is_none() {
            tracing::debug!(%kid, "no key with matching kid after refetch");
        }

        Ok(key)
    }

    /// Fetches the key set now, regardless of the age of the current copy
    ///
    /// If the fetch fails but a copy is already held, that copy is kept.
    ///
    /// # Errors
    ///
    /// Returns an error only when no key set has ever been obtained.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), KeySetError> {
        let mut state = self.inner.fetch.lock().await;
        self.fetch_locked(&mut state).await.map(|_| ())
    }

    /// Refreshes the key set in the background every `interval`
    ///
    /// The first refresh happens one `interval` after the call. A failed
    /// refresh keeps the current copy and is retried at the next interval.
    /// The task runs until the returned handle is aborted or the runtime
    /// shuts down.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_refresh(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let this = self.clone();

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            timer.tick().await;

            loop {
                timer.tick().await;
                if let Err(err) = this.refresh().await {
                    tracing::debug!(
                        retry_in_secs = interval.as_secs(),
                        "background JWKS refresh failed: {err}"
                    );
                }
            }
        })
    }

    fn is_fresh(&self, snapshot: &Snapshot) -> bool {
        match self.inner.policy.ttl {
            Some(ttl) => {
                let age = self.inner.clock.now().saturating_secs_since(snapshot.fetched_at);
                age < ttl.as_secs()
            }
            None => true,
        }
    }

    async fn current_or_fetch(&self) -> Result<Arc<Snapshot>, KeySetError> {
        if let Some(snapshot) = self.inner.current.load_full() {
            if self.is_fresh(&snapshot) {
                return Ok(snapshot);
            }
        }

        let mut state = self.inner.fetch.lock().await;

        if let Some(snapshot) = self.inner.current.load_full() {
            if self.is_fresh(&snapshot) {
                return Ok(snapshot);
            }
            tracing::debug!(
                jwks.fetched_at = snapshot.fetched_at.0,
                "cached JWKS expired"
            );
        }

        self.fetch_locked(&mut state).await
    }

    async fn refetch_after_miss(
        &self,
        seen: &Arc<Snapshot>,
        kid: &jwk::KeyIdRef,
    ) -> Result<Arc<Snapshot>, KeySetError> {
        let mut state = self.inner.fetch.lock().await;

        if let Some(current) = self.inner.current.load_full() {
            if current.generation != seen.generation {
                return Ok(current);
            }
        }

        let now = self.inner.clock.now();
        if let Some(last) = state.last_miss_refetch {
            if now.saturating_secs_since(last) < self.inner.policy.miss_cooldown.as_secs() {
                tracing::debug!(%kid, "unknown kid; JWKS refetch suppressed by cooldown");
                return Ok(Arc::clone(seen));
            }
        }

        tracing::debug!(%kid, "unknown kid; refetching JWKS");
        state.last_miss_refetch = Some(now);
        self.fetch_locked(&mut state).await
    }

    async fn fetch_locked(&self, state: &mut FetchState) -> Result<Arc<Snapshot>, KeySetError> {
        let previous = self.inner.current.load_full();

        let jwks = match self.inner.source.fetch().await {
            Ok(Fetched::Updated(jwks)) => {
                tracing::info!(jwks.keys = jwks.keys().len(), "JWKS refreshed");
                jwks
            }
            Ok(Fetched::NotModified) => match &previous {
                Some(previous) => previous.jwks.clone(),
                None => return Err(KeySetError::NotModifiedWithoutCopy),
            },
            Err(err) => {
                return match previous {
                    Some(previous) => {
                        let error: &dyn std::error::Error = &err;
                        tracing::warn!(error, "JWKS fetch failed; continuing with cached copy");
                        Ok(previous)
                    }
                    None => {
                        let error: &dyn std::error::Error = &err;
                        tracing::error!(error, "JWKS fetch failed; no keys available");
                        Err(err)
                    }
                };
            }
        };

        state.generation += 1;
        let snapshot = Arc::new(Snapshot {
            jwks,
            fetched_at: self.inner.clock.now(),
            generation: state.generation,
        });
        self.inner.current.store(Some(Arc::clone(&snapshot)));

        Ok(snapshot)
    }
}
