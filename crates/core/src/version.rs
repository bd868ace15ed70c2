use std::{cmp::Ordering, fmt::Display, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid ledger version {0:?}, expected major[.minor[.patch]]")]
pub struct VersionParseError(pub String);

/// A ledger release number.
///
/// Missing minor or patch components count as zero, so `2.0` and `2.0.0`
/// compare equal. Anything after the first `-` or `+` (pre-release or build
/// tags) is ignored for ordering purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LedgerVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl LedgerVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    fn as_tuple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

impl Ord for LedgerVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_tuple().cmp(&other.as_tuple())
    }
}

impl PartialOrd for LedgerVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for LedgerVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VersionParseError(s.to_owned());

        let core = s
            .trim()
            .trim_start_matches('v')
            .split(['-', '+'])
            .next()
            .unwrap_or_default();

        if core.is_empty() {
            return Err(invalid());
        }

        let mut parts = [0u64; 3];
        let mut count = 0;

        for component in core.split('.') {
            if count == parts.len() {
                return Err(invalid());
            }

            parts[count] = component.parse().map_err(|_| invalid())?;
            count += 1;
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl Display for LedgerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
