//! Compression configuration.
//!
//! A [`Config`] is validated once, at construction, against the supported
//! block footprints, the quality range and the flag compatibility rules.
//! After that it is a plain read-only value.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::error::{AstcError, Result};

/// Size in bytes of one physical ASTC block, whatever its footprint.
pub const BLOCK_BYTES: usize = 16;

/// Supported 2D footprints, `(x, y)`.
pub const FOOTPRINTS_2D: [(u32, u32); 14] = [
    (4, 4),
    (5, 4),
    (5, 5),
    (6, 5),
    (6, 6),
    (8, 5),
    (8, 6),
    (8, 8),
    (10, 5),
    (10, 6),
    (10, 8),
    (10, 10),
    (12, 10),
    (12, 12),
];

/// Supported 3D footprints, `(x, y, z)`.
pub const FOOTPRINTS_3D: [(u32, u32, u32); 10] = [
    (3, 3, 3),
    (4, 3, 3),
    (4, 4, 3),
    (4, 4, 4),
    (5, 4, 4),
    (5, 5, 4),
    (5, 5, 5),
    (6, 5, 5),
    (6, 6, 5),
    (6, 6, 6),
];

/// Whether `(x, y, z)` is a supported footprint. `z == 1` means 2D.
pub fn is_valid_footprint(x: u32, y: u32, z: u32) -> bool {
    if z == 1 {
        FOOTPRINTS_2D.contains(&(x, y))
    } else {
        FOOTPRINTS_3D.contains(&(x, y, z))
    }
}

/// Colour profile of the pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Profile {
    /// LDR, sRGB-encoded colour with linear alpha.
    LdrSrgb = 0,
    /// LDR, linear.
    Ldr = 1,
    /// HDR colour with LDR alpha.
    HdrRgbLdrA = 2,
    /// HDR colour and alpha.
    Hdr = 3,
}

impl Profile {
    /// Whether colour channels may carry HDR values.
    pub fn is_hdr(self) -> bool {
        matches!(self, Profile::HdrRgbLdrA | Profile::Hdr)
    }
}

impl TryFrom<u32> for Profile {
    type Error = AstcError;

    fn try_from(value: u32) -> Result<Self> {
        Ok(match value {
            0 => Profile::LdrSrgb,
            1 => Profile::Ldr,
            2 => Profile::HdrRgbLdrA,
            3 => Profile::Hdr,
            _ => {
                return Err(AstcError::InvalidEnumValue {
                    what: "profile",
                    value,
                })
            }
        })
    }
}

/// Named search quality presets. Any value in `0.0..=100.0` is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum QualityPreset {
    /// The fastest, lowest quality, search preset.
    Fastest = 0,
    /// The fast search preset.
    Fast = 10,
    /// The medium quality search preset.
    Medium = 60,
    /// The thorough quality search preset.
    Thorough = 98,
    /// The very thorough quality search preset.
    VeryThorough = 99,
    /// The exhaustive, highest quality, search preset.
    Exhaustive = 100,
}

impl QualityPreset {
    /// The preset as a quality value.
    pub fn value(self) -> f32 {
        self as u32 as f32
    }
}

impl From<QualityPreset> for f32 {
    fn from(preset: QualityPreset) -> Self {
        preset.value()
    }
}

/// A set of `ConfigFlags::*` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConfigFlags(u32);

impl ConfigFlags {
    /// No flags.
    pub const EMPTY: Self = ConfigFlags(0);
    /// Two-component normal map; optimise for angular error.
    pub const MAP_NORMAL: Self = ConfigFlags(1 << 0);
    /// Compress assuming the decode_unorm8 decode mode.
    pub const USE_DECODE_UNORM8: Self = ConfigFlags(1 << 1);
    /// Weight RGB errors by texel alpha.
    pub const USE_ALPHA_WEIGHT: Self = ConfigFlags(1 << 2);
    /// Optimise for perceptual error rather than PSNR.
    pub const USE_PERCEPTUAL: Self = ConfigFlags(1 << 3);
    /// The context only ever decompresses.
    pub const DECOMPRESS_ONLY: Self = ConfigFlags(1 << 4);
    /// The context only decompresses images it compressed itself.
    pub const SELF_DECOMPRESS_ONLY: Self = ConfigFlags(1 << 5);
    /// LDR RGBM-wrapped HDR data.
    pub const MAP_RGBM: Self = ConfigFlags(1 << 6);

    const ALL_BITS: u32 = (1 << 7) - 1;

    /// Flags from raw bits, or `None` if unknown bits are set.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::ALL_BITS != 0 {
            None
        } else {
            Some(ConfigFlags(bits))
        }
    }

    /// The raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ConfigFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        ConfigFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ConfigFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

fn validate_flags(profile: Profile, flags: u32) -> Result<ConfigFlags> {
    let invalid = |reason| AstcError::InvalidFlags { flags, reason };
    let flags = ConfigFlags::from_bits(flags).ok_or_else(|| invalid("unknown flag bits"))?;

    if flags.contains(ConfigFlags::MAP_NORMAL) && flags.contains(ConfigFlags::MAP_RGBM) {
        return Err(invalid("at most one of MAP_NORMAL and MAP_RGBM may be set"));
    }
    if flags.contains(ConfigFlags::DECOMPRESS_ONLY)
        && flags.contains(ConfigFlags::SELF_DECOMPRESS_ONLY)
    {
        return Err(invalid(
            "DECOMPRESS_ONLY and SELF_DECOMPRESS_ONLY are mutually exclusive",
        ));
    }
    if flags.contains(ConfigFlags::USE_DECODE_UNORM8) && profile.is_hdr() {
        return Err(invalid("USE_DECODE_UNORM8 requires an LDR profile"));
    }
    Ok(flags)
}

/// Default RGBM multiplier scale.
pub const DEFAULT_RGBM_M_SCALE: f32 = 5.0;

const MAX_CANDIDATE_LIMIT: u32 = 32;
const MAX_REFINEMENT_LIMIT: u32 = 8;

/// Validated compression parameters.
///
/// # Examples
///
/// ```
/// use astc_encoder_core::{Config, ConfigFlags, Profile, QualityPreset};
/// let config = Config::new(Profile::LdrSrgb, 6, 6, 1, QualityPreset::Medium.into(), ConfigFlags::EMPTY)
///     .unwrap();
/// assert_eq!(config.block_count(64, 64, 1), 11 * 11);
/// assert!(Config::new(Profile::Ldr, 7, 7, 1, 60.0, ConfigFlags::EMPTY).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    profile: Profile,
    block_x: u32,
    block_y: u32,
    block_z: u32,
    quality: f32,
    flags: ConfigFlags,
    cw_weights: [f32; 4],
    a_scale_radius: u32,
    rgbm_m_scale: f32,
    tune_candidate_limit: u32,
    tune_refinement_limit: u32,
}

impl Config {
    /// Validate and build a configuration with default scalar parameters.
    ///
    /// # Errors
    ///
    /// [`AstcError::InvalidBlockSize`] for footprints outside the supported
    /// table, [`AstcError::InvalidQuality`] outside `0..=100`, and
    /// [`AstcError::InvalidFlags`] for unknown or incompatible flags.
    pub fn new(
        profile: Profile,
        block_x: u32,
        block_y: u32,
        block_z: u32,
        quality: f32,
        flags: ConfigFlags,
    ) -> Result<Self> {
        ConfigBuilder::new(profile, block_x, block_y)
            .block_z(block_z)
            .quality(quality)
            .flags(flags.bits())
            .build()
    }

    /// Start a builder for the optional scalar parameters.
    pub fn builder(profile: Profile, block_x: u32, block_y: u32) -> ConfigBuilder {
        ConfigBuilder::new(profile, block_x, block_y)
    }

    /// The colour profile.
    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Block width in texels.
    pub fn block_x(&self) -> u32 {
        self.block_x
    }

    /// Block height in texels.
    pub fn block_y(&self) -> u32 {
        self.block_y
    }

    /// Block depth in texels (1 for 2D footprints).
    pub fn block_z(&self) -> u32 {
        self.block_z
    }

    /// Whether the footprint is 3D.
    pub fn is_3d(&self) -> bool {
        self.block_z > 1
    }

    /// Texels per block.
    pub fn texels_per_block(&self) -> usize {
        (self.block_x * self.block_y * self.block_z) as usize
    }

    /// The search quality in `0.0..=100.0`.
    pub fn quality(&self) -> f32 {
        self.quality
    }

    /// The flag set.
    pub fn flags(&self) -> ConfigFlags {
        self.flags
    }

    /// Red channel error weight.
    pub fn cw_r_weight(&self) -> f32 {
        self.cw_weights[0]
    }

    /// Green channel error weight.
    pub fn cw_g_weight(&self) -> f32 {
        self.cw_weights[1]
    }

    /// Blue channel error weight.
    pub fn cw_b_weight(&self) -> f32 {
        self.cw_weights[2]
    }

    /// Alpha channel error weight.
    pub fn cw_a_weight(&self) -> f32 {
        self.cw_weights[3]
    }

    /// All four channel error weights.
    pub fn channel_weights(&self) -> [f32; 4] {
        self.cw_weights
    }

    /// Radius for alpha-weight scaling; 0 disables neighbourhood averaging.
    pub fn a_scale_radius(&self) -> u32 {
        self.a_scale_radius
    }

    /// RGBM scale factor for the shared multiplier.
    pub fn rgbm_m_scale(&self) -> f32 {
        self.rgbm_m_scale
    }

    /// Number of block mode candidates tried per block.
    pub fn tune_candidate_limit(&self) -> u32 {
        self.tune_candidate_limit
    }

    /// Number of endpoint refinement passes per candidate.
    pub fn tune_refinement_limit(&self) -> u32 {
        self.tune_refinement_limit
    }

    /// Number of blocks covering an image of the given size.
    pub fn block_count(&self, width: u32, height: u32, depth: u32) -> usize {
        width.div_ceil(self.block_x) as usize
            * height.div_ceil(self.block_y) as usize
            * depth.div_ceil(self.block_z) as usize
    }

    /// Compressed size in bytes of an image of the given size.
    pub fn compressed_len(&self, width: u32, height: u32, depth: u32) -> usize {
        self.block_count(width, height, depth) * BLOCK_BYTES
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ASTCConfig<({}, {}, {}, {})>",
            self.profile as u32, self.block_x, self.block_y, self.block_z
        )
    }
}

/// Builder for [`Config`] with optional overrides of the scalar parameters.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    profile: Profile,
    block_x: u32,
    block_y: u32,
    block_z: u32,
    quality: f32,
    flags: u32,
    cw_weights: Option<[f32; 4]>,
    a_scale_radius: u32,
    rgbm_m_scale: Option<f32>,
    tune_candidate_limit: Option<u32>,
    tune_refinement_limit: Option<u32>,
}

impl ConfigBuilder {
    /// A 2D builder with MEDIUM quality and no flags.
    pub fn new(profile: Profile, block_x: u32, block_y: u32) -> Self {
        Self {
            profile,
            block_x,
            block_y,
            block_z: 1,
            quality: QualityPreset::Medium.value(),
            flags: 0,
            cw_weights: None,
            a_scale_radius: 0,
            rgbm_m_scale: None,
            tune_candidate_limit: None,
            tune_refinement_limit: None,
        }
    }

    /// Block depth; values above 1 select a 3D footprint.
    pub fn block_z(mut self, block_z: u32) -> Self {
        self.block_z = block_z;
        self
    }

    /// Search quality in `0.0..=100.0`.
    pub fn quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    /// Raw flag bits, validated by [`build`](Self::build).
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Per-channel error weights, overriding the mode defaults.
    pub fn channel_weights(mut self, weights: [f32; 4]) -> Self {
        self.cw_weights = Some(weights);
        self
    }

    /// Radius for alpha-weight scaling.
    pub fn a_scale_radius(mut self, radius: u32) -> Self {
        self.a_scale_radius = radius;
        self
    }

    /// RGBM multiplier scale, overriding the default of 5.
    pub fn rgbm_m_scale(mut self, scale: f32) -> Self {
        self.rgbm_m_scale = Some(scale);
        self
    }

    /// Block mode candidates tried per block.
    pub fn tune_candidate_limit(mut self, limit: u32) -> Self {
        self.tune_candidate_limit = Some(limit);
        self
    }

    /// Endpoint refinement passes per candidate.
    pub fn tune_refinement_limit(mut self, limit: u32) -> Self {
        self.tune_refinement_limit = Some(limit);
        self
    }

    /// Validate everything and produce the configuration.
    pub fn build(self) -> Result<Config> {
        if self.block_z == 0 || !is_valid_footprint(self.block_x, self.block_y, self.block_z) {
            return Err(AstcError::InvalidBlockSize {
                x: self.block_x,
                y: self.block_y,
                z: self.block_z,
            });
        }
        if !(0.0..=100.0).contains(&self.quality) {
            return Err(AstcError::InvalidQuality(self.quality));
        }
        let flags = validate_flags(self.profile, self.flags)?;

        let rgbm = flags.contains(ConfigFlags::MAP_RGBM);
        let rgbm_m_scale = match self.rgbm_m_scale {
            Some(scale) => scale,
            None if rgbm => DEFAULT_RGBM_M_SCALE,
            None => 0.0,
        };
        if !rgbm_m_scale.is_finite() || rgbm_m_scale < 0.0 || (rgbm && rgbm_m_scale == 0.0) {
            return Err(AstcError::InvalidParameter {
                name: "rgbm_m_scale",
                value: rgbm_m_scale,
                reason: "must be finite and positive in RGBM mode",
            });
        }

        let cw_weights = match self.cw_weights {
            Some(weights) => weights,
            None if flags.contains(ConfigFlags::MAP_NORMAL) => [1.0, 0.0, 0.0, 1.0],
            None if rgbm => [1.0, 1.0, 1.0, 2.0 * rgbm_m_scale],
            None => [1.0; 4],
        };
        for (name, value) in ["cw_r_weight", "cw_g_weight", "cw_b_weight", "cw_a_weight"]
            .into_iter()
            .zip(cw_weights)
        {
            if !value.is_finite() || value < 0.0 {
                return Err(AstcError::InvalidParameter {
                    name,
                    value,
                    reason: "must be finite and non-negative",
                });
            }
        }
        if cw_weights.iter().all(|&w| w == 0.0) {
            return Err(AstcError::InvalidParameter {
                name: "cw_weights",
                value: 0.0,
                reason: "at least one channel weight must be non-zero",
            });
        }

        let candidate_limit = self
            .tune_candidate_limit
            .unwrap_or(1 + (self.quality * 7.0 / 100.0).round() as u32);
        if !(1..=MAX_CANDIDATE_LIMIT).contains(&candidate_limit) {
            return Err(AstcError::InvalidParameter {
                name: "tune_candidate_limit",
                value: candidate_limit as f32,
                reason: "must be in 1..=32",
            });
        }
        let refinement_limit = self
            .tune_refinement_limit
            .unwrap_or(1 + (self.quality * 3.0 / 100.0).round() as u32);
        if refinement_limit > MAX_REFINEMENT_LIMIT {
            return Err(AstcError::InvalidParameter {
                name: "tune_refinement_limit",
                value: refinement_limit as f32,
                reason: "must be at most 8",
            });
        }

        Ok(Config {
            profile: self.profile,
            block_x: self.block_x,
            block_y: self.block_y,
            block_z: self.block_z,
            quality: self.quality,
            flags,
            cw_weights,
            a_scale_radius: self.a_scale_radius,
            rgbm_m_scale,
            tune_candidate_limit: candidate_limit,
            tune_refinement_limit: refinement_limit,
        })
    }
}
