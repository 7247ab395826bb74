//! # astc-encoder-core
//!
//! ASTC texture compression and decompression with per-CPU SIMD dispatch.
//!
//! A [`Context`] binds one [`Config`] (profile, block footprint, quality,
//! flags) to a worker pool and to the fastest codec [`Variant`] the running
//! CPU supports. Images are described by [`Image`]; channel routing on the
//! way in and out of the codec is controlled by a [`Swizzle`].
//!
//! ## Quick Start
//!
//! ```
//! use astc_encoder_core::{
//!     Config, ConfigFlags, Context, DataType, Image, Profile, QualityPreset, Swizzle,
//! };
//!
//! let config = Config::new(
//!     Profile::LdrSrgb,
//!     6,
//!     6,
//!     1,
//!     QualityPreset::Fast.value(),
//!     ConfigFlags::EMPTY,
//! )
//! .unwrap();
//! let context = Context::new(config, 0).unwrap();
//!
//! // Compress: 12x12 RGBA8 image -> 2x2 blocks of 16 bytes
//! let image = Image::with_data(DataType::U8, 12, 12, 1, vec![90; 12 * 12 * 4]).unwrap();
//! let blocks = context.compress(&image, &Swizzle::RGBA).unwrap();
//! assert_eq!(blocks.len(), 4 * 16);
//!
//! // Decompress: blocks -> RGBA8 image of the same size
//! let mut out = Image::new(DataType::U8, 12, 12, 1).unwrap();
//! context.decompress(&blocks, &mut out, &Swizzle::RGBA).unwrap();
//! assert_eq!(out.byte_len(), 12 * 12 * 4);
//! ```
//!
//! ## Variant selection
//!
//! [`selected_variant`] probes the CPU once per process and returns the best
//! variant that is both supported and compiled in, falling back to
//! [`Variant::Portable`]. The `variant-*` cargo features choose which
//! variants are compiled.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod image;
pub mod metrics;
pub mod simd;
pub mod swizzle;
pub mod variant;

mod codec;

// Re-export primary types at crate root.
pub use config::{
    is_valid_footprint, Config, ConfigBuilder, ConfigFlags, Profile, QualityPreset, BLOCK_BYTES,
    FOOTPRINTS_2D, FOOTPRINTS_3D,
};
pub use context::Context;
pub use dispatch::{is_runnable, select_variant, selected_variant, FeatureProbe, HostProbe};
pub use error::{AstcError, ErrorKind, Result};
pub use image::{DataType, Image};
pub use metrics::{compute_error_metrics, ErrorMetrics};
pub use swizzle::{Swizzle, SwizzleSelector};
pub use variant::{preference_order, ArchFamily, CpuFeature, Variant};
