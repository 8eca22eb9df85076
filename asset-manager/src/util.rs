use thiserror::Error;

use crate::descriptor::SoundId;

/// Constants & small helpers
pub const SAMPLE_FORMAT_TAG: u16 = 3;
pub const SAMPLE_HEADER_LEN: usize = 8;

/// Upper bound on alias/link hops when resolving a descriptor.
pub const MAX_CHAIN_DEPTH: usize = 16;

pub const DEFAULT_OUTPUT_RATE: u32 = 44_100;
pub const DEFAULT_SFX_MEMORY_BUDGET_BYTES: usize = 8 * 1024 * 1024; // 8 MB

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("sample lump too short for header ({0} bytes)")]
    TruncatedHeader(usize),
    #[error("bad sample format tag {0:#06x}")]
    BadFormatTag(u16),
    #[error("declared {declared} samples but only {available} present")]
    DeclaredLengthOverflow { declared: usize, available: usize },
    #[error("sample lump has no sample data")]
    Empty,
    #[error("sample rate must be non-zero")]
    BadSampleRate,
    #[error("lump not found: {0}")]
    MissingLump(String),
    #[error("unknown sound {0:?}")]
    UnknownSound(SoundId),
    #[error("alias/link chain starting at {0:?} exceeds the hop limit")]
    ChainTooLong(SoundId),
}
