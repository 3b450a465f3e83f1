use crate::compose::{ComposedPolicy, CompositionKey};
use crate::constants::{
    DEFAULT_CACHE_DURATION_SECS, DEFAULT_MAX_REPORT_SIZE, DEFAULT_NONCE_LENGTH,
    DEFAULT_POLICY_CACHE_ENTRIES, DEFAULT_REPORT_MAX_AGE, DEFAULT_REPORT_PATH,
};
use crate::error::CspError;
use crate::monitoring::stats::CspStats;
use crate::security::nonce::NonceGenerator;
use crate::utils::CachedValue;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Deserialize;
use std::num::{NonZeroU64, NonZeroUsize};
use std::{borrow::Cow, fs, path::Path, sync::Arc, time::Duration};

type ComposedCache = LruCache<NonZeroU64, CachedValue<(CompositionKey, Arc<ComposedPolicy>)>>;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CspSettings {
    pub report_max_age: i64,
    pub report_path: String,
    pub live: bool,
    pub nonce_length: Option<usize>,
    pub cache_duration_secs: u64,
    pub cache_size: usize,
    pub max_report_size: usize,
}

impl Default for CspSettings {
    fn default() -> Self {
        Self {
            report_max_age: DEFAULT_REPORT_MAX_AGE,
            report_path: DEFAULT_REPORT_PATH.to_owned(),
            live: true,
            nonce_length: None,
            cache_duration_secs: DEFAULT_CACHE_DURATION_SECS,
            cache_size: DEFAULT_POLICY_CACHE_ENTRIES,
            max_report_size: DEFAULT_MAX_REPORT_SIZE,
        }
    }
}

/// Process-wide settings shared by the composer and both middlewares.
#[derive(Clone)]
pub struct CspConfig {
    report_max_age: i64,
    report_path: Cow<'static, str>,
    live: bool,
    nonce_generator: Option<Arc<NonceGenerator>>,
    cache_duration: Duration,
    max_report_size: usize,
    stats: Arc<CspStats>,
    composed_cache: Arc<Mutex<ComposedCache>>,
}

impl Default for CspConfig {
    fn default() -> Self {
        CspConfigBuilder::new().build()
    }
}

impl CspConfig {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: CspSettings) -> Result<Self, CspError> {
        if !settings.report_path.starts_with('/') {
            return Err(CspError::ConfigError(format!(
                "report_path must be an absolute path, got '{}'",
                settings.report_path
            )));
        }
        if settings.nonce_length == Some(0) {
            return Err(CspError::ConfigError(
                "nonce_length must be greater than zero".to_owned(),
            ));
        }

        let mut builder = CspConfigBuilder::new()
            .with_report_max_age(settings.report_max_age)
            .with_report_path(settings.report_path)
            .with_live(settings.live)
            .with_cache_duration(Duration::from_secs(settings.cache_duration_secs))
            .with_cache_size(settings.cache_size)
            .with_max_report_size(settings.max_report_size);

        if let Some(length) = settings.nonce_length {
            builder = builder.with_nonce_generator(length);
        }

        Ok(builder.build())
    }

    pub fn from_json(json: &str) -> Result<Self, CspError> {
        let settings: CspSettings = serde_json::from_str(json)?;
        Self::from_settings(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CspError> {
        let json = fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded CSP settings from {}", path.as_ref().display());
        Self::from_json(&json)
    }

    /// Reporting group lifetime in seconds. Negative configuration values are
    /// taken by magnitude.
    #[inline]
    pub fn report_max_age(&self) -> u64 {
        self.report_max_age.unsigned_abs()
    }

    #[inline]
    pub(crate) fn raw_report_max_age(&self) -> i64 {
        self.report_max_age
    }

    #[inline]
    pub fn report_path(&self) -> &str {
        &self.report_path
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.live
    }

    #[inline]
    pub fn nonces_enabled(&self) -> bool {
        self.nonce_generator.is_some()
    }

    pub fn generate_nonce(&self) -> Result<Option<String>, CspError> {
        match &self.nonce_generator {
            Some(generator) => {
                let nonce = generator.generate()?;
                self.stats.increment_nonce_generation_count();
                Ok(Some(nonce))
            }
            None => Ok(None),
        }
    }

    #[inline]
    pub fn cache_duration(&self) -> Duration {
        self.cache_duration
    }

    #[inline]
    pub fn max_report_size(&self) -> usize {
        self.max_report_size
    }

    #[inline]
    pub fn stats(&self) -> &Arc<CspStats> {
        &self.stats
    }

    /// Returns the cached composition for `key`. An entry whose fingerprint
    /// matches but whose inputs differ is not returned.
    pub fn get_cached_composition(&self, key: &CompositionKey) -> Option<Arc<ComposedPolicy>> {
        let mut cache = self.composed_cache.lock();
        match cache.get(&key.fingerprint()) {
            Some(entry) if entry.is_valid() => {
                let (cached_key, composed) = entry.value();
                if cached_key.matches(key) {
                    Some(composed.clone())
                } else {
                    log::debug!("Composition cache collision on {}", key.fingerprint());
                    None
                }
            }
            Some(_) => {
                cache.pop(&key.fingerprint());
                None
            }
            None => None,
        }
    }

    pub fn cache_composition(
        &self,
        key: CompositionKey,
        composed: ComposedPolicy,
    ) -> Arc<ComposedPolicy> {
        let composed = Arc::new(composed);
        self.composed_cache.lock().put(
            key.fingerprint(),
            CachedValue::new((key, composed.clone()), self.cache_duration),
        );
        composed
    }

    /// Drops every cached composition, e.g. after policies were edited.
    pub fn clear_cache(&self) {
        self.composed_cache.lock().clear();
    }
}

#[derive(Default)]
pub struct CspConfigBuilder {
    report_max_age: Option<i64>,
    report_path: Option<Cow<'static, str>>,
    live: Option<bool>,
    nonce_length: Option<usize>,
    nonce_generator: Option<Arc<NonceGenerator>>,
    cache_duration: Option<Duration>,
    cache_size: Option<usize>,
    max_report_size: Option<usize>,
    stats: Option<Arc<CspStats>>,
}

impl CspConfigBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_report_max_age(mut self, max_age: i64) -> Self {
        self.report_max_age = Some(max_age);
        self
    }

    #[inline]
    pub fn with_report_path(mut self, path: impl Into<Cow<'static, str>>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    #[inline]
    pub fn with_live(mut self, live: bool) -> Self {
        self.live = Some(live);
        self
    }

    #[inline]
    pub fn with_nonce_generator(mut self, length: usize) -> Self {
        self.nonce_length = Some(length);
        self
    }

    #[inline]
    pub fn with_default_nonce_generator(self) -> Self {
        self.with_nonce_generator(DEFAULT_NONCE_LENGTH)
    }

    #[inline]
    pub fn with_prebuilt_nonce_generator(mut self, generator: Arc<NonceGenerator>) -> Self {
        self.nonce_generator = Some(generator);
        self
    }

    #[inline]
    pub fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = Some(duration);
        self
    }

    #[inline]
    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }

    #[inline]
    pub fn with_max_report_size(mut self, size: usize) -> Self {
        self.max_report_size = Some(size);
        self
    }

    #[inline]
    pub fn with_stats(mut self, stats: Arc<CspStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn build(self) -> CspConfig {
        let nonce_generator = match (self.nonce_generator, self.nonce_length) {
            (Some(generator), _) => Some(generator),
            (None, Some(length)) => Some(Arc::new(NonceGenerator::new(length))),
            (None, None) => None,
        };

        let cache_size = self
            .cache_size
            .and_then(NonZeroUsize::new)
            .or_else(|| NonZeroUsize::new(DEFAULT_POLICY_CACHE_ENTRIES))
            .unwrap_or(NonZeroUsize::MIN);

        CspConfig {
            report_max_age: self.report_max_age.unwrap_or(DEFAULT_REPORT_MAX_AGE),
            report_path: self
                .report_path
                .unwrap_or(Cow::Borrowed(DEFAULT_REPORT_PATH)),
            live: self.live.unwrap_or(true),
            nonce_generator,
            cache_duration: self
                .cache_duration
                .unwrap_or(Duration::from_secs(DEFAULT_CACHE_DURATION_SECS)),
            max_report_size: self.max_report_size.unwrap_or(DEFAULT_MAX_REPORT_SIZE),
            stats: self.stats.unwrap_or_default(),
            composed_cache: Arc::new(Mutex::new(LruCache::new(cache_size))),
        }
    }
}
