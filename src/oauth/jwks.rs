//! Remote JWKS verification with a shared key cache.
//!
//! [`JwksValidator`] fetches the issuer's `/jwks.json` and caches the keys by
//! `kid`. The cache is the only mutable state shared between connections:
//!
//! - Lookups take a read lock and never wait for a network fetch when the
//!   `kid` is already known.
//! - A key set older than the cache TTL triggers a single background
//!   refresh. Readers keep using the stale keys meanwhile, and a failed
//!   refresh keeps them. Failed attempts are retried no more often than the
//!   minimum refresh interval.
//! - An unknown `kid` triggers a refresh so keys rotated on the issuer side
//!   are picked up. Refreshes are serialized by an async mutex. A waiter that
//!   finds another attempt finished when it gets the lock takes that
//!   attempt's outcome instead of fetching again, whether it succeeded or
//!   failed. Every attempt is timestamped and unknown-`kid` refreshes are
//!   rate-limited by a minimum interval. A storm of connections presenting a
//!   bogus `kid`, or arriving while the issuer is down, therefore causes at
//!   most one fetch per interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use jsonwebtoken::{DecodingKey, Validation};
use tokio::sync::{Mutex, RwLock};

use super::error::OAuthError;
use super::jwk::{KeySet, KeySetDocument};
use super::token::{ExpectedClaims, TokenClaims, TokenValidator, token_kid, verify_with_key};

/// Default age after which the cached key set is refreshed in the background.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default minimum spacing between fetch attempts outside the TTL schedule.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Default timeout for a single key-set fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while building a [`JwksValidator`] or fetching keys.
#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    #[error("failed to fetch key set from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Cached keys plus bookkeeping for refresh decisions.
#[derive(Default)]
struct CachedKeys {
    keys: KeySet,
    /// Last successful fetch.
    fetched_at: Option<Instant>,
    /// Last fetch attempt, successful or not.
    attempted_at: Option<Instant>,
    /// Incremented on every fetch attempt.
    attempts: u64,
    /// Set while the most recent attempt has failed.
    last_error: Option<String>,
}

impl CachedKeys {
    fn attempted_within(&self, interval: Duration) -> bool {
        self.attempted_at.is_some_and(|at| at.elapsed() < interval)
    }

    /// Rejection for a `kid` the most recent attempt did not produce.
    fn miss_error(&self, kid: &str) -> OAuthError {
        match &self.last_error {
            Some(description) => OAuthError::KeySetUnavailable {
                description: description.clone(),
            },
            None => OAuthError::UnknownKey {
                kid: kid.to_string(),
            },
        }
    }
}

struct JwksInner {
    url: String,
    http: reqwest::Client,
    validation: Validation,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    cache: RwLock<CachedKeys>,
    refresh: Arc<Mutex<()>>,
    fetches: AtomicU64,
}

impl JwksInner {
    /// Fetch the key set and record the attempt. Caller holds the refresh lock.
    ///
    /// A failed attempt keeps the cached keys.
    async fn fetch(&self) -> Result<(), JwksError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let result = self.fetch_document().await;

        let mut cache = self.cache.write().await;
        cache.attempts += 1;
        cache.attempted_at = Some(Instant::now());
        match result {
            Ok(document) => {
                let keys = KeySet::from_document(&document);
                tracing::debug!(url = %self.url, kids = ?keys.kids(), "Fetched key set");
                cache.keys = keys;
                cache.fetched_at = cache.attempted_at;
                cache.last_error = None;
                Ok(())
            }
            Err(e) => {
                cache.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch_document(&self) -> Result<KeySetDocument, JwksError> {
        let fetch_error = |source| JwksError::Fetch {
            url: self.url.clone(),
            source,
        };

        self.http
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_error)?
            .json()
            .await
            .map_err(fetch_error)
    }

    /// Whether the cached set is past its TTL and no attempt ran recently.
    fn refresh_due(&self, cache: &CachedKeys) -> bool {
        cache
            .fetched_at
            .is_some_and(|at| at.elapsed() >= self.cache_ttl)
            && !cache.attempted_within(self.min_refresh_interval)
    }

    /// Resolve a `kid` that was absent from the cache after `seen_attempts`
    /// fetch attempts.
    async fn resolve_miss(
        &self,
        kid: &str,
        seen_attempts: u64,
    ) -> Result<Arc<DecodingKey>, OAuthError> {
        let _guard = self.refresh.lock().await;

        {
            let cache = self.cache.read().await;
            if let Some(key) = cache.keys.get(kid) {
                return Ok(key);
            }
            // An attempt finished while we waited, or one ran too recently:
            // share its outcome instead of fetching again
            if cache.attempts != seen_attempts
                || cache.attempted_within(self.min_refresh_interval)
            {
                return Err(cache.miss_error(kid));
            }
        }

        tracing::info!(%kid, url = %self.url, "Unknown key id, refreshing key set");
        if let Err(e) = self.fetch().await {
            tracing::error!(error = %e, "Key set refresh failed");
            return Err(OAuthError::KeySetUnavailable {
                description: e.to_string(),
            });
        }

        self.cache
            .read()
            .await
            .keys
            .get(kid)
            .ok_or_else(|| OAuthError::UnknownKey {
                kid: kid.to_string(),
            })
    }
}

/// Token validator backed by a remote JWKS endpoint.
///
/// Cheap to clone; clones share the key cache.
///
/// # Example
///
/// ```rust,no_run
/// use mcp_gatekeeper::oauth::JwksValidator;
///
/// # async fn example() -> Result<(), mcp_gatekeeper::oauth::JwksError> {
/// let validator = JwksValidator::builder("http://localhost:8080/jwks.json")
///     .expected_issuer("http://localhost:8080")
///     .expected_audience("mcp-server")
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct JwksValidator {
    inner: Arc<JwksInner>,
}

impl JwksValidator {
    /// Start building a validator for the key set at `url`.
    pub fn builder(url: impl Into<String>) -> JwksValidatorBuilder {
        JwksValidatorBuilder::new(url)
    }

    /// The JWKS URL this validator fetches from.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Number of fetches attempted so far.
    pub fn fetch_count(&self) -> u64 {
        self.inner.fetches.load(Ordering::Relaxed)
    }

    /// Key identifiers currently cached.
    pub async fn cached_kids(&self) -> Vec<String> {
        let cache = self.inner.cache.read().await;
        cache.keys.kids().into_iter().map(String::from).collect()
    }

    /// Force a refresh, waiting for any in-flight one first.
    pub async fn refresh(&self) -> Result<(), JwksError> {
        let _guard = self.inner.refresh.lock().await;
        self.inner.fetch().await
    }

    async fn decoding_key(&self, kid: &str) -> Result<Arc<DecodingKey>, OAuthError> {
        let (key, attempts, refresh_due) = {
            let cache = self.inner.cache.read().await;
            (
                cache.keys.get(kid),
                cache.attempts,
                self.inner.refresh_due(&cache),
            )
        };

        match key {
            Some(key) => {
                if refresh_due {
                    self.spawn_background_refresh();
                }
                Ok(key)
            }
            None => self.inner.resolve_miss(kid, attempts).await,
        }
    }

    /// Refresh in the background unless a refresh is already running.
    fn spawn_background_refresh(&self) {
        let Ok(guard) = self.inner.refresh.clone().try_lock_owned() else {
            return;
        };
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _guard = guard;
            // Another attempt may have finished between the check and the lock
            let due = {
                let cache = inner.cache.read().await;
                inner.refresh_due(&cache)
            };
            if !due {
                return;
            }
            if let Err(e) = inner.fetch().await {
                tracing::warn!(error = %e, "Background key set refresh failed, keeping stale keys");
            }
        });
    }
}

impl TokenValidator for JwksValidator {
    async fn validate_token(&self, token: &str) -> Result<TokenClaims, OAuthError> {
        let kid = token_kid(token)?;
        let key = self.decoding_key(&kid).await?;
        verify_with_key(token, &key, &self.inner.validation)
    }
}

/// Builder for [`JwksValidator`].
pub struct JwksValidatorBuilder {
    url: String,
    expected: ExpectedClaims,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
    fetch_timeout: Duration,
}

impl JwksValidatorBuilder {
    fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expected: ExpectedClaims::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Require the given `iss` claim.
    pub fn expected_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected.issuer = Some(issuer.into());
        self
    }

    /// Require the given `aud` claim.
    pub fn expected_audience(mut self, audience: impl Into<String>) -> Self {
        self.expected.audience = Some(audience.into());
        self
    }

    /// Tolerate clock skew on expiry. Defaults to zero.
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.expected.leeway = leeway;
        self
    }

    /// Age after which the cached set is refreshed in the background.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Minimum spacing between fetch attempts caused by unknown key ids or
    /// by retrying a failed background refresh.
    pub fn min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Timeout for a single fetch.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Build and fetch the key set once, failing if it cannot be fetched.
    pub async fn build(self) -> Result<JwksValidator, JwksError> {
        let validator = self.build_lazy()?;
        validator.refresh().await?;
        Ok(validator)
    }

    /// Build without fetching; the first token triggers the fetch.
    ///
    /// Lets the gateway start before the issuer is reachable.
    pub fn build_lazy(self) -> Result<JwksValidator, JwksError> {
        let http = reqwest::Client::builder()
            .timeout(self.fetch_timeout)
            .build()
            .map_err(JwksError::Client)?;

        Ok(JwksValidator {
            inner: Arc::new(JwksInner {
                url: self.url,
                http,
                validation: self.expected.validation(),
                cache_ttl: self.cache_ttl,
                min_refresh_interval: self.min_refresh_interval,
                cache: RwLock::new(CachedKeys::default()),
                refresh: Arc::new(Mutex::new(())),
                fetches: AtomicU64::new(0),
            }),
        })
    }
}
