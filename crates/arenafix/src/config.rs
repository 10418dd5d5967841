//! Parser configuration: pool sizing and validation flags.

use crate::error::{FixError, Result};
use std::ops::{BitOr, BitOrAssign};

/// Sizing of the per-parser resource pools.
///
/// Pages back every byte of field data; group stores back every repeating
/// group instance and the root field store of each message. The `num_*`
/// counts are pre-allocated at parser construction, the `max_*` counts bound
/// growth across all live messages of the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Bytes per arena page.
    pub page_size: u32,
    /// Pages pre-allocated at construction.
    pub num_pages: u32,
    /// Maximum page count across all live messages.
    pub max_pages: u32,
    /// Group stores pre-allocated at construction.
    pub num_groups: u32,
    /// Maximum group-store count across all live messages.
    pub max_groups: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            page_size: 4096,
            num_pages: 8,
            max_pages: 128,
            num_groups: 8,
            max_groups: 128,
        }
    }
}

impl ParserConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(FixError::InvalidArgument("page size must be non-zero".into()));
        }
        if self.max_pages == 0 || self.max_groups == 0 {
            return Err(FixError::InvalidArgument(
                "pool maxima must be non-zero".into(),
            ));
        }
        if self.num_pages > self.max_pages || self.num_groups > self.max_groups {
            return Err(FixError::InvalidArgument(
                "initial pool size exceeds maximum".into(),
            ));
        }
        Ok(())
    }
}

/// Validations the parser applies while decoding, combinable with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckFlags(u32);

impl CheckFlags {
    /// No decode-time validation.
    pub const NONE: CheckFlags = CheckFlags(0);
    /// Verify `CheckSum` against the byte sum of the message.
    pub const CRC: CheckFlags = CheckFlags(0x01);
    /// Verify every required field of the descriptor is present.
    pub const REQUIRED: CheckFlags = CheckFlags(0x02);
    /// Reject tags unknown to the message descriptor instead of skipping.
    pub const EXISTING: CheckFlags = CheckFlags(0x04);
    /// Verify values against the dictionary's permitted value sets.
    pub const VALUE: CheckFlags = CheckFlags(0x08);
    /// All of the above.
    pub const ALL: CheckFlags = CheckFlags(0x0F);

    #[must_use]
    pub const fn contains(self, other: CheckFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CheckFlags {
    type Output = CheckFlags;

    fn bitor(self, rhs: CheckFlags) -> CheckFlags {
        CheckFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for CheckFlags {
    fn bitor_assign(&mut self, rhs: CheckFlags) {
        self.0 |= rhs.0;
    }
}
