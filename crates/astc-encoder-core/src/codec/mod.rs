//! The bundled block codec.
//!
//! Encodes void-extent blocks and single-partition, single-plane blocks
//! with direct RGB or RGBA endpoints at 8 bits per value and power-of-two
//! weight ranges. The decoder understands every block mode layout; blocks
//! outside the supported subset decode to the error colour.

mod bits;
mod block_mode;
mod decode;
mod encode;
mod infill;
mod texels;

use std::collections::HashMap;

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::config::{Config, ConfigFlags, Profile, BLOCK_BYTES};
use crate::image::{Image, CHANNELS};
use crate::simd::{Kernels, Texel};
use crate::swizzle::Swizzle;

use block_mode::{decode_block_mode, is_void_extent, BlockMode, MODE_COUNT};
use infill::Infill;

pub(crate) use texels::read_image;

/// Bits left for colour values after the mode, partition and CEM fields.
const COLOR_BITS: u32 = 128 - 17;

/// Most block modes kept as encoder candidates.
const MAX_CANDIDATES: usize = 32;

/// Codec outcome before translation into the public error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodecStatus {
    /// The swizzle cannot be used in this direction.
    BadSwizzle,
    /// The context was created for decompression only.
    BadContext,
    /// No block mode can encode this footprint.
    BadBlockSize,
    /// A buffer does not have the size the image shape requires.
    BadLength { expected: usize, actual: usize },
}

/// Colour endpoint modes the encoder emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cem {
    /// LDR RGB direct, mode 8.
    Rgb = 8,
    /// LDR RGBA direct, mode 12.
    Rgba = 12,
}

impl Cem {
    pub(crate) fn values(self) -> u32 {
        match self {
            Cem::Rgb => 6,
            Cem::Rgba => 8,
        }
    }
}

/// A block mode the encoder may use.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    pub mode: u32,
    pub block_mode: BlockMode,
    pub bits: u32,
}

/// How decoded endpoints are expanded and written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DecodeMode {
    /// Expand endpoints as `(e << 8) | 0x80` and truncate to 8 bits on output.
    pub unorm8: bool,
    /// Error colour is NaN and HDR void extents are accepted.
    pub hdr: bool,
}

/// Per-context codec state, built once and shared by every worker.
pub(crate) struct Codec {
    block: [u32; 3],
    is_3d: bool,
    profile: Profile,
    flags: ConfigFlags,
    kernels: &'static Kernels,
    channel_weights: Texel,
    a_scale_radius: u32,
    candidate_limit: usize,
    refinement_limit: u32,
    infills: HashMap<[u32; 3], Infill>,
    rgb_candidates: Vec<Candidate>,
    rgba_candidates: Vec<Candidate>,
}

impl Codec {
    pub(crate) fn new(config: &Config, kernels: &'static Kernels) -> Result<Self, CodecStatus> {
        let block = [config.block_x(), config.block_y(), config.block_z()];
        let is_3d = config.is_3d();

        let mut infills = HashMap::new();
        let mut seen = Vec::new();
        let mut rgb_candidates = Vec::new();
        let mut rgba_candidates = Vec::new();
        for mode in 0..MODE_COUNT {
            if is_void_extent(mode) {
                continue;
            }
            let Some(bm) = decode_block_mode(mode, is_3d) else {
                continue;
            };
            if !bm.fits(block) {
                continue;
            }
            infills
                .entry(bm.grid)
                .or_insert_with(|| Infill::new(block, bm.grid));

            let Some(bits) = bm.pure_bits() else {
                continue;
            };
            if bm.dual_plane || seen.contains(&(bm.grid, bm.quant)) {
                continue;
            }
            seen.push((bm.grid, bm.quant));
            let candidate = Candidate {
                mode,
                block_mode: bm,
                bits,
            };
            for (cem, list) in [
                (Cem::Rgb, &mut rgb_candidates),
                (Cem::Rgba, &mut rgba_candidates),
            ] {
                if COLOR_BITS - bm.weight_bits >= 8 * cem.values() {
                    list.push(candidate);
                }
            }
        }

        if rgb_candidates.is_empty() || rgba_candidates.is_empty() {
            return Err(CodecStatus::BadBlockSize);
        }
        for list in [&mut rgb_candidates, &mut rgba_candidates] {
            // Rank by weight bits, counting at most 3 bits per weight.
            list.sort_by_key(|c| {
                let count = c.block_mode.grid_weights();
                std::cmp::Reverse((count * c.bits.min(3), count))
            });
            list.truncate(MAX_CANDIDATES);
        }

        Ok(Self {
            block,
            is_3d,
            profile: config.profile(),
            flags: config.flags(),
            kernels,
            channel_weights: config.channel_weights(),
            a_scale_radius: config.a_scale_radius(),
            candidate_limit: config.tune_candidate_limit() as usize,
            refinement_limit: config.tune_refinement_limit(),
            infills,
            rgb_candidates,
            rgba_candidates,
        })
    }

    pub(crate) fn texels_per_block(&self) -> usize {
        (self.block[0] * self.block[1] * self.block[2]) as usize
    }

    pub(crate) fn decode_mode(&self) -> DecodeMode {
        DecodeMode {
            unorm8: self.profile == Profile::LdrSrgb
                || self.flags.contains(ConfigFlags::USE_DECODE_UNORM8),
            hdr: self.profile.is_hdr(),
        }
    }

    fn block_counts(&self, image: &Image) -> [u32; 3] {
        [
            image.width().div_ceil(self.block[0]),
            image.height().div_ceil(self.block[1]),
            image.depth().div_ceil(self.block[2]),
        ]
    }

    /// Compress `image` into `out`, one 16-byte block per chunk.
    pub(crate) fn compress_image(
        &self,
        pool: &ThreadPool,
        image: &Image,
        swizzle: &Swizzle,
        out: &mut [u8],
    ) -> Result<(), CodecStatus> {
        if self.flags.contains(ConfigFlags::DECOMPRESS_ONLY) {
            return Err(CodecStatus::BadContext);
        }
        if swizzle.uses_reconstructed_z() {
            return Err(CodecStatus::BadSwizzle);
        }
        let counts = self.block_counts(image);
        let expected = counts.iter().map(|&c| c as usize).product::<usize>() * BLOCK_BYTES;
        if out.len() != expected {
            return Err(CodecStatus::BadLength {
                expected,
                actual: out.len(),
            });
        }

        let n = self.texels_per_block();
        pool.install(|| {
            out.par_chunks_mut(BLOCK_BYTES).enumerate().for_each_init(
                || encode::Scratch::new(n),
                |scratch, (index, dst)| {
                    let origin = block_origin(index, counts, self.block);
                    texels::load_block(
                        image,
                        self.kernels,
                        origin,
                        self.block,
                        swizzle,
                        &mut scratch.texels,
                        &mut scratch.row,
                    );
                    let bits = self.encode_block(scratch);
                    dst.copy_from_slice(&bits.to_le_bytes());
                },
            );
        });
        Ok(())
    }

    /// Decompress `data` into `image`.
    ///
    /// Work is split into bands of block rows per image slice; a 3D block
    /// is decoded once for each slice it covers.
    pub(crate) fn decompress_image(
        &self,
        pool: &ThreadPool,
        data: &[u8],
        image: &mut Image,
        swizzle: &Swizzle,
    ) -> Result<(), CodecStatus> {
        let counts = self.block_counts(image);
        let expected = counts.iter().map(|&c| c as usize).product::<usize>() * BLOCK_BYTES;
        if data.len() != expected {
            return Err(CodecStatus::BadLength {
                expected,
                actual: data.len(),
            });
        }

        let data_type = image.data_type();
        let width = image.width();
        let height = image.height() as usize;
        let row_bytes = width as usize * CHANNELS * data_type.element_size();
        let band_bytes = row_bytes * self.block[1] as usize;
        let n = self.texels_per_block();
        let mode = self.decode_mode();

        pool.install(|| {
            image
                .data_mut()
                .par_chunks_mut(row_bytes * height)
                .enumerate()
                .for_each(|(z, slice)| {
                    let bz = z as u32 / self.block[2];
                    let layer = z as u32 % self.block[2];
                    slice.par_chunks_mut(band_bytes).enumerate().for_each_init(
                        || decode::Scratch::new(n),
                        |scratch, (by, band)| {
                            for bx in 0..counts[0] {
                                let index = block_index([bx, by as u32, bz], counts);
                                let start = index * BLOCK_BYTES;
                                let mut raw = [0u8; BLOCK_BYTES];
                                raw.copy_from_slice(&data[start..start + BLOCK_BYTES]);
                                self.decode_block(u128::from_le_bytes(raw), &mut scratch.texels);
                                texels::store_block_layer(
                                    band,
                                    row_bytes,
                                    data_type,
                                    self.kernels,
                                    &scratch.texels,
                                    self.block,
                                    layer,
                                    bx * self.block[0],
                                    width,
                                    swizzle,
                                    mode,
                                    &mut scratch.row,
                                );
                            }
                        },
                    );
                });
        });
        image.mark_filled();
        Ok(())
    }
}

/// Raster-order index of the block at block coordinates `pos`.
fn block_index(pos: [u32; 3], counts: [u32; 3]) -> usize {
    let [bx, by, bz] = pos.map(|v| v as usize);
    let [cx, cy, _] = counts.map(|c| c as usize);
    bx + by * cx + bz * cx * cy
}

/// Texel origin of block `index` in raster block order.
fn block_origin(index: usize, counts: [u32; 3], block: [u32; 3]) -> [u32; 3] {
    let [cx, cy, _] = counts.map(|c| c as usize);
    let pos = [index % cx, (index / cx) % cy, index / (cx * cy)];
    // Origins are texel coordinates inside the image, so they fit in u32.
    [0, 1, 2].map(|i| (pos[i] * block[i] as usize) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::kernels_for;
    use crate::variant::Variant;
    use rstest::rstest;

    fn codec(profile: Profile, x: u32, y: u32, z: u32) -> Codec {
        let config = Config::new(profile, x, y, z, 60.0, ConfigFlags::EMPTY).unwrap();
        Codec::new(&config, kernels_for(Variant::Portable).unwrap()).unwrap()
    }

    #[rstest]
    #[case(4, 4, 1)]
    #[case(6, 6, 1)]
    #[case(12, 12, 1)]
    #[case(3, 3, 3)]
    #[case(6, 6, 6)]
    fn test_every_footprint_has_candidates(#[case] x: u32, #[case] y: u32, #[case] z: u32) {
        let codec = codec(Profile::Ldr, x, y, z);
        for list in [&codec.rgb_candidates, &codec.rgba_candidates] {
            assert!(!list.is_empty());
            for c in list {
                assert!(c.block_mode.fits([x, y, z]));
                assert!(codec.infills.contains_key(&c.block_mode.grid));
            }
        }
    }

    #[test]
    fn test_candidates_respect_color_budget() {
        let codec = codec(Profile::Ldr, 4, 4, 1);
        for c in &codec.rgba_candidates {
            assert!(COLOR_BITS - c.block_mode.weight_bits >= 64);
        }
        // 4x4 grid at 3 bits fits RGB but not RGBA.
        assert_eq!(codec.rgb_candidates[0].block_mode.grid, [4, 4, 1]);
        assert_eq!(codec.rgb_candidates[0].bits, 3);
        assert_eq!(codec.rgba_candidates[0].block_mode.grid_weights(), 12);
        assert!(codec
            .rgba_candidates
            .iter()
            .all(|c| c.block_mode.grid != [4, 4, 1] || c.bits <= 2));
    }

    #[test]
    fn test_block_origin_raster_order() {
        let counts = [3, 2, 2];
        assert_eq!(block_origin(0, counts, [4, 4, 1]), [0, 0, 0]);
        assert_eq!(block_origin(4, counts, [4, 4, 1]), [4, 4, 0]);
        assert_eq!(block_origin(7, counts, [4, 4, 1]), [4, 0, 1]);
        for index in 0..12 {
            let o = block_origin(index, counts, [1, 1, 1]);
            assert_eq!(block_index(o, counts), index);
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_block_index_beyond_u32() {
        // A 2^16 x 2^16 block grid has more than u32::MAX blocks in two layers.
        let counts = [1 << 16, 1 << 16, 2];
        let last = block_index([(1 << 16) - 1, (1 << 16) - 1, 1], counts);
        assert_eq!(last, (1usize << 33) - 1);
        assert_eq!(block_origin(last, counts, [4, 4, 1]), [262_140, 262_140, 1]);
        assert_eq!(block_origin(1 << 32, counts, [4, 4, 1]), [0, 0, 1]);
    }
}
