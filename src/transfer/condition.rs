//! Transfer gating policies.
//!
//! A condition decides, from metadata alone, whether a transfer proceeds.
//! Evaluation is pure: no I/O, same inputs, same answer. For `Newer`/`Older`
//! an absent destination means there is no comparison baseline, and the safe
//! default is to transfer.

use std::fmt;
use std::str::FromStr;

use crate::errors::TransferError;
use crate::storage::FileMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Proceed unconditionally.
    Always,
    /// Proceed only when the destination is absent.
    NotExists,
    /// Proceed only when the destination is present.
    Exists,
    /// Proceed when the destination is absent or older than the source.
    Newer,
    /// Proceed when the destination is absent or newer than the source.
    Older,
}

impl Condition {
    /// Decide whether a transfer should proceed. `dst` is `None` when the
    /// destination path does not exist.
    pub fn decide(self, src: &FileMetadata, dst: Option<&FileMetadata>) -> bool {
        match self {
            Condition::Always => true,
            Condition::NotExists => dst.is_none(),
            Condition::Exists => dst.is_some(),
            Condition::Newer => dst.is_none_or(|d| src.modified > d.modified),
            Condition::Older => dst.is_none_or(|d| src.modified < d.modified),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Condition::Always => "always",
            Condition::NotExists => "not_exists",
            Condition::Exists => "exists",
            Condition::Newer => "newer",
            Condition::Older => "older",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = TransferError;

    /// Parse one of the five policy names. Unknown names fail naming the
    /// invalid policy; there is deliberately no default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Condition::Always),
            "not_exists" => Ok(Condition::NotExists),
            "exists" => Ok(Condition::Exists),
            "newer" => Ok(Condition::Newer),
            "older" => Ok(Condition::Older),
            other => Err(TransferError::Condition(other.to_string())),
        }
    }
}
