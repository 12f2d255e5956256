use std::time::Duration;

/// Bounded exponential backoff: delays double from `base` up to `cap`,
/// and the iterator is exhausted after `attempts` delays. Exhaustion is
/// the signal to stop retrying entirely.
#[derive(Debug, Clone)]
pub struct Backoff {
    next_delay: Duration,
    cap: Duration,
    remaining: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration, attempts: u32) -> Self {
        Self {
            next_delay: base.min(cap),
            cap,
            remaining: attempts,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let delay = self.next_delay;
        self.next_delay = delay.saturating_mul(2).min(self.cap);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_until_the_cap() {
        let delays: Vec<_> =
            Backoff::new(Duration::from_secs(1), Duration::from_secs(8), 5).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(8),
            ]
        );
    }

    #[test]
    fn delays_are_non_decreasing_and_bounded() {
        let delays: Vec<_> =
            Backoff::new(Duration::from_millis(250), Duration::from_secs(30), 10).collect();
        assert_eq!(delays.len(), 10);
        for pair in delays.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(30)));
    }

    #[test]
    fn zero_attempts_never_yields() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(8), 0);
        assert_eq!(backoff.next(), None);
    }

    #[test]
    fn base_above_cap_is_clamped() {
        let mut backoff = Backoff::new(Duration::from_secs(60), Duration::from_secs(30), 2);
        assert_eq!(backoff.next(), Some(Duration::from_secs(30)));
        assert_eq!(backoff.next(), Some(Duration::from_secs(30)));
        assert_eq!(backoff.next(), None);
    }
}
