use std::time::{Duration, Instant};

/// Token bucket capping the queue's global throughput. One token admits one
/// job; tokens refill continuously at the configured rate, with burst
/// capacity of one second's worth.
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(jobs_per_second: u32, now: Instant) -> TokenBucket {
        let rate = f64::from(jobs_per_second);
        TokenBucket {
            capacity: rate,
            tokens: rate,
            refill_per_sec: rate,
            last_refill: now,
        }
    }

    /// Take one token, or report how long until one will be available
    pub fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(needed / self.refill_per_sec))
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_up_to_capacity_then_denied() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(5, now);
        for _ in 0..5 {
            assert!(bucket.try_take(now).is_ok());
        }
        assert!(bucket.try_take(now).is_err());
    }

    #[test]
    fn test_denial_reports_time_until_next_token() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(2, now);
        bucket.try_take(now).unwrap();
        bucket.try_take(now).unwrap();

        let wait = bucket.try_take(now).unwrap_err();
        // 2 tokens per second: next token is half a second out
        assert!(wait > Duration::from_millis(400));
        assert!(wait <= Duration::from_millis(500));
    }

    #[test]
    fn test_tokens_refill_over_time() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(10, now);
        for _ in 0..10 {
            bucket.try_take(now).unwrap();
        }
        assert!(bucket.try_take(now).is_err());

        // 100ms later one token has refilled
        let later = now + Duration::from_millis(100);
        assert!(bucket.try_take(later).is_ok());
        assert!(bucket.try_take(later).is_err());
    }

    #[test]
    fn test_refill_never_exceeds_capacity() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(3, now);

        // A long idle stretch must not bank more than one second's burst
        let much_later = now + Duration::from_secs(60);
        for _ in 0..3 {
            assert!(bucket.try_take(much_later).is_ok());
        }
        assert!(bucket.try_take(much_later).is_err());
    }
}
