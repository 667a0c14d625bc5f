//! Log sequence numbers
//!
//! An LSN is a 64-bit position in the server's write-ahead log. On the wire
//! it travels as a big-endian `u64`; in commands and query results it is the
//! familiar `XXXXXXXX/XXXXXXXX` pair of hex halves.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::core::errors::WalError;

/// A position in the write-ahead log.
///
/// Ordering, equality and hashing are those of the underlying integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lsn(pub u64);

impl Lsn {
    /// `0/0`, the invalid position
    pub const INVALID: Lsn = Lsn(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Larger of the two positions
    pub fn max(self, other: Lsn) -> Lsn {
        Lsn(self.0.max(other.0))
    }
}

impl From<u64> for Lsn {
    fn from(value: u64) -> Self {
        Lsn(value)
    }
}

impl From<Lsn> for u64 {
    fn from(value: Lsn) -> Self {
        value.0
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.0 >> 32, self.0 & 0xFFFF_FFFF)
    }
}

impl FromStr for Lsn {
    type Err = WalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hi, lo) = s
            .split_once('/')
            .ok_or_else(|| WalError::invalid(format!("malformed LSN {s:?}: missing '/'")))?;
        if hi.is_empty() || hi.len() > 8 || lo.is_empty() || lo.len() > 8 {
            return Err(WalError::invalid(format!(
                "malformed LSN {s:?}: each half must be 1-8 hex digits"
            )));
        }
        let hi = u64::from_str_radix(hi, 16)
            .map_err(|_| WalError::invalid(format!("malformed LSN {s:?}: bad hex")))?;
        let lo = u64::from_str_radix(lo, 16)
            .map_err(|_| WalError::invalid(format!("malformed LSN {s:?}: bad hex")))?;
        Ok(Lsn((hi << 32) | lo))
    }
}

impl Serialize for Lsn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
