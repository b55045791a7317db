use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Outcome of one admission attempt. A denial is never an error; the caller
/// decides whether to wait `wait` and try again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub granted: bool,
    pub wait: Duration,
}

impl Admission {
    const fn granted() -> Self {
        Self {
            granted: true,
            wait: Duration::ZERO,
        }
    }

    const fn denied(wait: Duration) -> Self {
        Self {
            granted: false,
            wait,
        }
    }
}

/// Token bucket plus a trailing 60 second request log.
///
/// Tokens refill continuously at `requests_per_minute / 60` per second and
/// never exceed `burst_limit`; the log caps admissions per minute.
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_minute: u32,
    burst_limit: f64,
    cooldown: Duration,
    tokens: f64,
    last_refill: Instant,
    requests: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let burst_limit = f64::from(config.burst_limit);
        Self {
            requests_per_minute: config.requests_per_minute,
            burst_limit,
            cooldown: config.cooldown(),
            tokens: burst_limit,
            last_refill: Instant::now(),
            requests: VecDeque::new(),
        }
    }

    pub fn acquire(&mut self) -> Admission {
        self.acquire_at(Instant::now())
    }

    pub fn acquire_at(&mut self, now: Instant) -> Admission {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let rate = f64::from(self.requests_per_minute) / 60.0;
        self.tokens = elapsed
            .as_secs_f64()
            .mul_add(rate, self.tokens)
            .min(self.burst_limit);
        self.last_refill = self.last_refill.max(now);

        while let Some(&oldest) = self.requests.front() {
            if now.saturating_duration_since(oldest) >= WINDOW {
                self.requests.pop_front();
            } else {
                break;
            }
        }

        if self.requests.len() >= self.requests_per_minute as usize {
            let wait = self
                .requests
                .front()
                .map_or(WINDOW, |oldest| {
                    WINDOW.saturating_sub(now.saturating_duration_since(*oldest))
                });
            log::debug!("Rate limiter: minute window full, wait {wait:?}");
            return Admission::denied(wait);
        }

        if self.tokens < 1.0 {
            log::debug!("Rate limiter: bucket empty, cooling down {:?}", self.cooldown);
            return Admission::denied(self.cooldown);
        }

        self.tokens -= 1.0;
        self.requests.push_back(now);
        Admission::granted()
    }

    pub const fn available_tokens(&self) -> f64 {
        self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn limiter(rpm: u32, burst: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            requests_per_minute: rpm,
            burst_limit: burst,
            cooldown_seconds: 1.0,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn burst_then_denied() {
        let mut limiter = limiter(60, 10);
        let granted = (0..10).filter(|_| limiter.acquire().granted).count();
        assert_eq!(granted, 10);

        let denied = limiter.acquire();
        assert!(!denied.granted);
        assert!(denied.wait > Duration::ZERO);
        assert_eq!(denied.wait, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_refill_over_time() {
        let mut limiter = limiter(60, 2);
        assert!(limiter.acquire().granted);
        assert!(limiter.acquire().granted);
        assert!(!limiter.acquire().granted);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.acquire().granted);
        assert!(!limiter.acquire().granted);
    }

    #[tokio::test(start_paused = true)]
    async fn minute_window_caps_admissions() {
        let mut limiter = limiter(3, 10);
        for _ in 0..3 {
            assert!(limiter.acquire().granted);
        }
        tokio::time::advance(Duration::from_secs(20)).await;

        let denied = limiter.acquire();
        assert!(!denied.granted);
        assert_eq!(denied.wait, Duration::from_secs(40));

        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(limiter.acquire().granted);
    }

    proptest! {
        #[test]
        fn bucket_and_window_stay_bounded(
            rpm in 1u32..30,
            burst in 1u32..15,
            steps in proptest::collection::vec(0u64..5_000, 1..200),
        ) {
            let mut limiter = limiter(rpm, burst);
            let mut now = Instant::now();
            let mut granted_at: Vec<Instant> = Vec::new();
            for step in steps {
                now += Duration::from_millis(step);
                if limiter.acquire_at(now).granted {
                    granted_at.push(now);
                }
                prop_assert!(limiter.available_tokens() >= 0.0);
                prop_assert!(limiter.available_tokens() <= f64::from(burst));
                let recent = granted_at
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) < WINDOW)
                    .count();
                prop_assert!(recent <= rpm as usize);
            }
        }
    }
}
