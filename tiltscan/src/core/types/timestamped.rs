//! Generic timestamp wrapper.

/// Value tagged with the time it was observed.
///
/// Timestamps are seconds since epoch, converted from the nanosecond
/// counters stored in the logs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestamped<T> {
    /// The wrapped data
    pub data: T,
    /// Seconds since epoch
    pub timestamp: f64,
}

impl<T> Timestamped<T> {
    /// Create a new timestamped value.
    #[inline]
    pub fn new(data: T, timestamp: f64) -> Self {
        Self { data, timestamp }
    }

    /// Map the inner data while preserving timestamp.
    #[inline]
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Timestamped<U> {
        Timestamped {
            data: f(self.data),
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamped_map() {
        let ts = Timestamped::new(21i32, 12.5);
        let doubled = ts.map(|x| x * 2);

        assert_eq!(doubled.data, 42);
        assert_eq!(doubled.timestamp, 12.5);
    }
}
