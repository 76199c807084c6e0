// ABOUTME: Release identifier: epoch seconds with an optional collision suffix.
// ABOUTME: Ordered numerically so ids stay sorted when the seconds grow a digit.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

/// Identifier of one release directory, e.g. `1700000000` or `1700000000-01`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReleaseId {
    secs: u64,
    seq: u32,
}

/// Error returned when a directory name is not a release id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a release id: {0:?}")]
pub struct ParseReleaseIdError(String);

impl ReleaseId {
    pub fn new(secs: u64, seq: u32) -> Self {
        Self { secs, seq }
    }

    /// Id for a deployment started at `now`.
    pub fn from_time(now: DateTime<Utc>) -> Self {
        Self {
            secs: now.timestamp().max(0) as u64,
            seq: 0,
        }
    }

    /// Id for a deployment started at `now`, given the newest existing id.
    ///
    /// The result always sorts after `latest`, even when the clock has not
    /// advanced past it.
    pub fn next(now: DateTime<Utc>, latest: Option<&ReleaseId>) -> Self {
        let candidate = Self::from_time(now);
        match latest {
            Some(latest) if *latest >= candidate => latest.successor(),
            _ => candidate,
        }
    }

    pub fn secs(&self) -> u64 {
        self.secs
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// The smallest id after this one. An exhausted sequence moves on to the
    /// next second.
    fn successor(&self) -> Self {
        match self.seq.checked_add(1) {
            Some(seq) => Self {
                secs: self.secs,
                seq,
            },
            None => Self {
                secs: self.secs.saturating_add(1),
                seq: 0,
            },
        }
    }
}

impl Ord for ReleaseId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.secs, self.seq).cmp(&(other.secs, other.seq))
    }
}

impl PartialOrd for ReleaseId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seq == 0 {
            write!(f, "{}", self.secs)
        } else {
            write!(f, "{}-{:02}", self.secs, self.seq)
        }
    }
}

fn digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl FromStr for ReleaseId {
    type Err = ParseReleaseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseReleaseIdError(s.to_string());
        let (secs, seq) = match s.split_once('-') {
            Some((secs, seq)) => (secs, Some(seq)),
            None => (s, None),
        };
        if !digits(secs) || !seq.is_none_or(digits) {
            return Err(err());
        }
        let secs: u64 = secs.parse().map_err(|_| err())?;
        // Seconds the clock can never produce are not release names.
        if i64::try_from(secs).is_err() {
            return Err(err());
        }
        let id = Self {
            secs,
            seq: seq.map(str::parse).transpose().map_err(|_| err())?.unwrap_or(0),
        };
        // Only canonical spellings name a release; "0123" or "5-00" would not
        // map back to the directory they came from.
        if id.to_string() != s {
            return Err(err());
        }
        Ok(id)
    }
}
