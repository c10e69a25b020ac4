//! Per-provider request rate limiting.
//!
//! Each provider has a rolling per-minute and per-hour budget plus a
//! minimum gap between requests. A 429 from the provider adds a backoff
//! window of twice the cooldown on top.
//!
//! | Provider   | Per minute | Per hour | Cooldown |
//! |------------|------------|----------|----------|
//! | `step`     | 20         | 200      | 3 s      |
//! | `deepseek` | 30         | 300      | 2 s      |
//! | `openai`   | 50         | 500      | 1.2 s    |
//!
//! Providers without an entry are only subject to 429 backoff.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

use civitas_core::config::RateLimitConfig;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Backoff after a 429 from a provider with no configured cooldown.
const DEFAULT_BACKOFF: Duration = Duration::from_millis(5000);

#[derive(Debug, Default)]
struct Window {
    /// Request times within the last hour, oldest first.
    sent: VecDeque<Instant>,
    backoff_until: Option<Instant>,
}

impl Window {
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.sent.front() {
            if now.saturating_duration_since(*oldest) >= HOUR {
                self.sent.pop_front();
            } else {
                break;
            }
        }
    }

    fn in_last(&self, span: Duration, now: Instant) -> usize {
        self.sent
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < span)
            .count()
    }

    /// When the request that opened the budget of `span` frees up.
    fn budget_wait(&self, span: Duration, limit: u32, now: Instant) -> Duration {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let recent: Vec<&Instant> = self
            .sent
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < span)
            .collect();
        if recent.len() < limit {
            return Duration::ZERO;
        }
        // The oldest request that must age out before one more fits.
        let excess = recent.len().saturating_sub(limit);
        recent
            .get(excess)
            .map_or(Duration::ZERO, |t| span.saturating_sub(now.saturating_duration_since(**t)))
    }
}

/// Tracks request windows for every provider.
#[derive(Debug)]
pub struct RateLimiter {
    limits: BTreeMap<String, RateLimitConfig>,
    windows: HashMap<String, Window>,
}

impl RateLimiter {
    /// Create a limiter from the configured per-provider limits.
    pub fn new(limits: BTreeMap<String, RateLimitConfig>) -> Self {
        Self {
            limits,
            windows: HashMap::new(),
        }
    }

    /// The configured cooldown of a provider.
    pub fn cooldown(&self, provider: &str) -> Duration {
        self.limits
            .get(provider)
            .map_or(Duration::ZERO, |l| Duration::from_millis(l.cooldown_ms))
    }

    /// How long until `provider` may be called. Zero means now.
    pub fn wait_time(&mut self, provider: &str, now: Instant) -> Duration {
        let window = self.windows.entry(provider.to_owned()).or_default();
        window.prune(now);

        let backoff = window
            .backoff_until
            .map_or(Duration::ZERO, |until| until.saturating_duration_since(now));

        let Some(limit) = self.limits.get(provider) else {
            return backoff;
        };

        let cooldown = window.sent.back().map_or(Duration::ZERO, |last| {
            Duration::from_millis(limit.cooldown_ms)
                .saturating_sub(now.saturating_duration_since(*last))
        });
        let minute = window.budget_wait(MINUTE, limit.per_minute, now);
        let hour = window.budget_wait(HOUR, limit.per_hour, now);

        backoff.max(cooldown).max(minute).max(hour)
    }

    /// Record a request sent at `now`.
    pub fn record(&mut self, provider: &str, now: Instant) {
        self.windows
            .entry(provider.to_owned())
            .or_default()
            .sent
            .push_back(now);
    }

    /// Record a 429 and return how long the provider is backed off.
    pub fn back_off(&mut self, provider: &str, now: Instant) -> Duration {
        let cooldown = self.cooldown(provider);
        let backoff = if cooldown.is_zero() {
            DEFAULT_BACKOFF
        } else {
            cooldown.saturating_mul(2)
        };
        let window = self.windows.entry(provider.to_owned()).or_default();
        window.backoff_until = now.checked_add(backoff);
        backoff
    }

    /// Requests sent to `provider` in the last minute.
    pub fn sent_last_minute(&self, provider: &str, now: Instant) -> usize {
        self.windows
            .get(provider)
            .map_or(0, |w| w.in_last(MINUTE, now))
    }

    /// Forget all request history.
    pub fn clear(&mut self) {
        self.windows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_limiter(per_minute: u32, per_hour: u32, cooldown_ms: u64) -> RateLimiter {
        let mut limits = BTreeMap::new();
        limits.insert(
            "step".to_owned(),
            RateLimitConfig {
                per_minute,
                per_hour,
                cooldown_ms,
            },
        );
        RateLimiter::new(limits)
    }

    #[test]
    fn first_request_goes_through() {
        let mut limiter = make_limiter(20, 200, 3000);
        assert_eq!(limiter.wait_time("step", Instant::now()), Duration::ZERO);
    }

    #[test]
    fn cooldown_spaces_requests() {
        let mut limiter = make_limiter(20, 200, 3000);
        let start = Instant::now();
        limiter.record("step", start);
        assert_eq!(
            limiter.wait_time("step", start + Duration::from_secs(1)),
            Duration::from_secs(2)
        );
        assert_eq!(
            limiter.wait_time("step", start + Duration::from_secs(3)),
            Duration::ZERO
        );
    }

    #[test]
    fn minute_budget_blocks_until_oldest_ages_out() {
        let mut limiter = make_limiter(2, 200, 0);
        let start = Instant::now();
        limiter.record("step", start);
        limiter.record("step", start + Duration::from_secs(10));
        assert_eq!(limiter.sent_last_minute("step", start + Duration::from_secs(10)), 2);

        let wait = limiter.wait_time("step", start + Duration::from_secs(20));
        assert_eq!(wait, Duration::from_secs(40));
        assert_eq!(
            limiter.wait_time("step", start + Duration::from_secs(60)),
            Duration::ZERO
        );
    }

    #[test]
    fn hour_budget_applies_too() {
        let mut limiter = make_limiter(100, 2, 0);
        let start = Instant::now();
        limiter.record("step", start);
        limiter.record("step", start + Duration::from_secs(120));
        let wait = limiter.wait_time("step", start + Duration::from_secs(600));
        assert_eq!(wait, Duration::from_secs(3000));
    }

    #[test]
    fn too_many_requests_doubles_the_cooldown() {
        let mut limiter = make_limiter(20, 200, 3000);
        let start = Instant::now();
        assert_eq!(limiter.back_off("step", start), Duration::from_secs(6));
        assert_eq!(limiter.wait_time("step", start), Duration::from_secs(6));
    }

    #[test]
    fn unlisted_provider_only_backs_off() {
        let mut limiter = make_limiter(1, 1, 1000);
        let start = Instant::now();
        limiter.record("anthropic", start);
        limiter.record("anthropic", start);
        assert_eq!(limiter.wait_time("anthropic", start), Duration::ZERO);
        assert_eq!(limiter.back_off("anthropic", start), DEFAULT_BACKOFF);
    }
}
