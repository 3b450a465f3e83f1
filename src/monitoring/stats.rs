use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct CspStats {
    request_count: AtomicUsize,
    nonce_generation_count: AtomicUsize,
    header_emitted_count: AtomicUsize,
    suppressed_count: AtomicUsize,
    cache_hit_count: AtomicUsize,
    violation_count: AtomicUsize,
    compose_time_ns: AtomicUsize,
    start_time: Instant,
}

impl Default for CspStats {
    fn default() -> Self {
        Self {
            request_count: Default::default(),
            nonce_generation_count: Default::default(),
            header_emitted_count: Default::default(),
            suppressed_count: Default::default(),
            cache_hit_count: Default::default(),
            violation_count: Default::default(),
            compose_time_ns: Default::default(),
            start_time: Instant::now(),
        }
    }
}

impl CspStats {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn nonce_generation_count(&self) -> usize {
        self.nonce_generation_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn header_emitted_count(&self) -> usize {
        self.header_emitted_count.load(Ordering::Relaxed)
    }

    /// Requests for which no policy applied or composition came out empty.
    #[inline]
    pub fn suppressed_count(&self) -> usize {
        self.suppressed_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn cache_hit_count(&self) -> usize {
        self.cache_hit_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn violation_count(&self) -> usize {
        self.violation_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn total_compose_time_ns(&self) -> usize {
        self.compose_time_ns.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn avg_compose_time_ns(&self) -> f64 {
        let count = self.header_emitted_count() + self.suppressed_count();
        if count == 0 {
            0.0
        } else {
            self.total_compose_time_ns() as f64 / count as f64
        }
    }

    #[inline]
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    #[inline]
    pub(crate) fn increment_request_count(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_nonce_generation_count(&self) {
        self.nonce_generation_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_header_emitted_count(&self) {
        self.header_emitted_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_suppressed_count(&self) {
        self.suppressed_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_cache_hit_count(&self) {
        self.cache_hit_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_violation_count(&self) {
        self.violation_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_compose_time(&self, elapsed: Duration) {
        self.compose_time_ns
            .fetch_add(elapsed.as_nanos() as usize, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.request_count.store(0, Ordering::Relaxed);
        self.nonce_generation_count.store(0, Ordering::Relaxed);
        self.header_emitted_count.store(0, Ordering::Relaxed);
        self.suppressed_count.store(0, Ordering::Relaxed);
        self.cache_hit_count.store(0, Ordering::Relaxed);
        self.violation_count.store(0, Ordering::Relaxed);
        self.compose_time_ns.store(0, Ordering::Relaxed);
    }
}

impl fmt::Display for CspStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CSP Statistics:")?;
        writeln!(f, "  Uptime: {} seconds", self.uptime_secs())?;
        writeln!(f, "  Requests processed: {}", self.request_count())?;
        writeln!(f, "  Headers emitted: {}", self.header_emitted_count())?;
        writeln!(f, "  Headers suppressed: {}", self.suppressed_count())?;
        writeln!(f, "  Nonces generated: {}", self.nonce_generation_count())?;
        writeln!(f, "  Cache hits: {}", self.cache_hit_count())?;
        writeln!(
            f,
            "  Average compose time: {:.2} ns",
            self.avg_compose_time_ns()
        )?;
        writeln!(f, "  Violations reported: {}", self.violation_count())?;
        Ok(())
    }
}

/// Measures wall time from construction.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceTimer {
    start: Instant,
}

impl PerformanceTimer {
    #[inline]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for PerformanceTimer {
    fn default() -> Self {
        Self::new()
    }
}
