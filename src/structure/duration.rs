use core::cmp::{Ord, Ordering, PartialOrd};
use core::time::Duration as CoreDuration;
use serde::{Deserialize, Serialize};

/// DDS Duration_t
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Duration {
    /// time in seconds
    pub seconds: i32,
    /// sub-second part in nanoseconds
    pub nanosec: u32,
}

impl Duration {
    pub const INFINITE: Self = Self {
        seconds: 0x7fffffff,
        nanosec: 0x7fffffff,
    };
    pub const ZERO: Self = Self {
        seconds: 0,
        nanosec: 0,
    };

    pub const fn new(seconds: i32, nanosec: u32) -> Self {
        Self { seconds, nanosec }
    }

    pub fn from_secs(seconds: i32) -> Self {
        Self {
            seconds,
            nanosec: 0,
        }
    }

    pub fn from_millis(milliseconds: i64) -> Self {
        Self::from_nanos(milliseconds * 1_000_000)
    }

    pub fn from_nanos(nanoseconds: i64) -> Self {
        Self {
            seconds: (nanoseconds / 1_000_000_000) as i32,
            nanosec: (nanoseconds % 1_000_000_000) as u32,
        }
    }

    pub fn is_infinite(&self) -> bool {
        *self == Self::INFINITE
    }

    /// `None` for INFINITE and for negative durations.
    pub fn to_core(self) -> Option<CoreDuration> {
        if self.is_infinite() || self.seconds < 0 {
            None
        } else {
            Some(CoreDuration::new(self.seconds as u64, self.nanosec))
        }
    }
}

impl From<CoreDuration> for Duration {
    fn from(item: CoreDuration) -> Self {
        if item.as_secs() >= Self::INFINITE.seconds as u64 {
            Self::INFINITE
        } else {
            Self {
                seconds: item.as_secs() as i32,
                nanosec: item.subsec_nanos(),
            }
        }
    }
}

impl PartialOrd for Duration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Duration {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seconds
            .cmp(&other.seconds)
            .then_with(|| self.nanosec.cmp(&other.nanosec))
    }
}

#[cfg(test)]
mod test {
    use super::Duration;
    use core::time::Duration as CoreDuration;

    #[test]
    fn duration_interoperability() {
        let duration = Duration::from_millis(1500);
        assert_eq!(duration, Duration::new(1, 500_000_000));
        assert_eq!(Some(CoreDuration::from_millis(1500)), duration.to_core());

        let core_duration = CoreDuration::from_millis(1500);
        assert_eq!(Duration::from_millis(1500), Duration::from(core_duration));
        assert_eq!(Duration::INFINITE.to_core(), None);
    }

    #[test]
    fn duration_order() {
        assert!(Duration::ZERO < Duration::from_millis(1));
        assert!(Duration::new(1, 0) > Duration::new(0, 999_999_999));
        assert!(Duration::from_secs(3600) < Duration::INFINITE);
    }
}
