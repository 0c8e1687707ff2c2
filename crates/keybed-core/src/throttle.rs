/// Outcome of offering one event to a [`LogThrottle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admit {
    /// Log this event normally.
    Log,
    /// Log this event and announce that further ones are suppressed.
    Last,
    /// Count silently.
    Suppressed,
}

/// Bounds how many occurrences of a repeating problem reach the log.
#[derive(Debug, Clone)]
pub struct LogThrottle {
    limit: u32,
    total: u64,
}

impl LogThrottle {
    pub fn new(limit: u32) -> Self {
        Self { limit, total: 0 }
    }

    pub fn admit(&mut self) -> Admit {
        self.total = self.total.saturating_add(1);
        match self.total.cmp(&u64::from(self.limit)) {
            std::cmp::Ordering::Less => Admit::Log,
            std::cmp::Ordering::Equal => Admit::Last,
            std::cmp::Ordering::Greater => Admit::Suppressed,
        }
    }

    /// Occurrences seen so far, logged or not.
    pub fn total(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_up_to_the_limit_then_counts() {
        let mut throttle = LogThrottle::new(3);
        assert_eq!(throttle.admit(), Admit::Log);
        assert_eq!(throttle.admit(), Admit::Log);
        assert_eq!(throttle.admit(), Admit::Last);
        assert_eq!(throttle.admit(), Admit::Suppressed);
        assert_eq!(throttle.admit(), Admit::Suppressed);
        assert_eq!(throttle.total(), 5);
    }

    #[test]
    fn zero_limit_suppresses_everything() {
        let mut throttle = LogThrottle::new(0);
        assert_eq!(throttle.admit(), Admit::Suppressed);
    }
}
