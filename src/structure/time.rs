use chrono::{DateTime, TimeZone, Utc};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Source timestamp attached to every sample, seconds and nanoseconds since the UNIX epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanosec: u32,
}

impl Timestamp {
    pub const TIME_INVALID: Self = Self {
        seconds: -1,
        nanosec: 0xffffffff,
    };

    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.seconds, self.nanosec).single()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            nanosec: dt.timestamp_subsec_nanos(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "TIME_INVALID"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub i64);

impl SequenceNumber {
    pub const MIN: Self = Self(1);
    pub const MAX: Self = Self(i64::MAX);

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_timestamp() {
        let dt = Utc.timestamp_opt(1_700_000_000, 250).single().unwrap();
        let ts = Timestamp::from(dt);
        assert_eq!(ts.seconds, 1_700_000_000);
        assert_eq!(ts.nanosec, 250);
        assert_eq!(ts.to_datetime(), Some(dt));
        assert!(Timestamp::now() > ts);
        assert_eq!(Timestamp::TIME_INVALID.to_string(), "TIME_INVALID");
    }

    #[test]
    fn test_sequence_number() {
        assert_eq!(SequenceNumber::MIN.next(), SequenceNumber(2));
    }
}
