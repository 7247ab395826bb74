//! Error types for configuration, compression and decompression.

use thiserror::Error;

/// Broad category of an [`AstcError`].
///
/// Host bindings map each kind onto their own exception type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A malformed swizzle string.
    Parse,
    /// An invalid footprint, quality, flag combination or buffer shape.
    Config,
    /// The codec state or worker pool could not be created.
    Resource,
    /// Missing or unusable source data for compression.
    Compression,
    /// Compressed input that does not fit the destination image.
    Decompression,
}

/// Errors that can occur while configuring the codec or running it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AstcError {
    /// The swizzle string could not be parsed.
    #[error("invalid swizzle {input:?}: {reason}")]
    InvalidSwizzle {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A raw integer does not name a member of an enumeration.
    #[error("invalid {what} value: {value}")]
    InvalidEnumValue {
        /// Which enumeration ("profile", "data type", ...).
        what: &'static str,
        /// The rejected value.
        value: u32,
    },

    /// The block footprint is not one of the supported ASTC footprints.
    #[error("unsupported block footprint {x}x{y}x{z}")]
    InvalidBlockSize {
        /// Block width in texels.
        x: u32,
        /// Block height in texels.
        y: u32,
        /// Block depth in texels.
        z: u32,
    },

    /// The quality is not a number in `0.0..=100.0`.
    #[error("quality {0} out of range (must be 0..=100)")]
    InvalidQuality(f32),

    /// The flag set contains unknown bits or an incompatible combination.
    #[error("invalid flags {flags:#x}: {reason}")]
    InvalidFlags {
        /// The rejected flag bits.
        flags: u32,
        /// Why the combination is rejected.
        reason: &'static str,
    },

    /// A scalar configuration parameter is out of range.
    #[error("invalid parameter {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The rejected value.
        value: f32,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The image dimensions are invalid (zero or too large).
    #[error("invalid dimensions: {width}x{height}x{depth} ({reason})")]
    InvalidDimensions {
        /// Width in texels.
        width: u32,
        /// Height in texels.
        height: u32,
        /// Depth in texels.
        depth: u32,
        /// Why the dimensions are invalid.
        reason: &'static str,
    },

    /// A pixel buffer does not match the declared image shape.
    #[error("buffer length {actual} does not match the expected {expected} bytes")]
    BufferSize {
        /// Bytes required by the image shape.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },

    /// Two images that must be compared do not match.
    #[error("images do not match: {0}")]
    ImageMismatch(&'static str),

    /// The codec state or worker pool could not be allocated.
    #[error("resource error: {0}")]
    Resource(String),

    /// Compression could not run.
    #[error("compression error: {0}")]
    Compression(String),

    /// The compressed input length does not match the destination image.
    #[error("compressed length {actual} does not match the expected {expected} bytes")]
    CompressedLength {
        /// `block_count * 16` for the destination image.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },

    /// Decompression could not run.
    #[error("decompression error: {0}")]
    Decompression(String),
}

impl AstcError {
    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AstcError::InvalidSwizzle { .. } => ErrorKind::Parse,
            AstcError::InvalidEnumValue { .. }
            | AstcError::InvalidBlockSize { .. }
            | AstcError::InvalidQuality(_)
            | AstcError::InvalidFlags { .. }
            | AstcError::InvalidParameter { .. }
            | AstcError::InvalidDimensions { .. }
            | AstcError::BufferSize { .. }
            | AstcError::ImageMismatch(_) => ErrorKind::Config,
            AstcError::Resource(_) => ErrorKind::Resource,
            AstcError::Compression(_) => ErrorKind::Compression,
            AstcError::CompressedLength { .. } | AstcError::Decompression(_) => {
                ErrorKind::Decompression
            }
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = AstcError> = std::result::Result<T, E>;
