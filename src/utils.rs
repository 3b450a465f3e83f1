use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroU64;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub(crate) struct CachedValue<T> {
    value: T,
    timestamp: Instant,
    ttl: Duration,
}

impl<T> CachedValue<T> {
    #[inline]
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            timestamp: Instant::now(),
            ttl,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.timestamp.elapsed() < self.ttl
    }

    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }
}

/// Folds anything hashable into a non-zero key for the composition cache.
#[inline]
pub(crate) fn fingerprint<T: Hash + ?Sized>(value: &T) -> NonZeroU64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    NonZeroU64::new(hasher.finish()).unwrap_or(NonZeroU64::MIN)
}

/// Escapes a value for use inside a double-quoted HTML attribute.
pub fn escape_html_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 16);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
