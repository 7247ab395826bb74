//! Block decoding.

use half::f16;

use crate::simd::Texel;

use super::bits::{read_bits, BitReader};
use super::block_mode::{decode_block_mode, is_void_extent, unquantize_weight};
use super::{Codec, DecodeMode};

/// Working buffers for one decoding worker.
pub(crate) struct Scratch {
    pub texels: Vec<Texel>,
    pub row: Vec<f32>,
}

impl Scratch {
    pub(crate) fn new(texels: usize) -> Self {
        Self {
            texels: vec![[0.0; 4]; texels],
            row: Vec::new(),
        }
    }
}

const MAGENTA: Texel = [1.0, 0.0, 1.0, 1.0];

/// Expand an 8-bit endpoint to the 16-bit interpolation domain.
#[inline]
pub(crate) fn expand_endpoint(e: u8, unorm8: bool) -> u32 {
    let e = u32::from(e);
    if unorm8 {
        (e << 8) | 0x80
    } else {
        e * 257
    }
}

/// Interpolate two 16-bit endpoints with a 0..=64 weight.
#[inline]
pub(crate) fn interpolate(c0: u32, c1: u32, w: u32) -> u32 {
    (c0 * (64 - w) + c1 * w + 32) >> 6
}

/// Blue contraction used when the endpoint sums are inverted.
fn blue_contract(r: u32, g: u32, b: u32) -> [u32; 3] {
    [(r + b) >> 1, (g + b) >> 1, b]
}

/// Endpoints of a direct RGB (6 values) or RGBA (8 values) encoding.
pub(crate) fn unpack_direct(v: &[u32]) -> [[u32; 4]; 2] {
    let (a0, a1) = if v.len() >= 8 { (v[6], v[7]) } else { (255, 255) };
    let s0 = v[0] + v[2] + v[4];
    let s1 = v[1] + v[3] + v[5];
    if s1 >= s0 {
        [[v[0], v[2], v[4], a0], [v[1], v[3], v[5], a1]]
    } else {
        let [r0, g0, b0] = blue_contract(v[1], v[3], v[5]);
        let [r1, g1, b1] = blue_contract(v[0], v[2], v[4]);
        [[r0, g0, b0, a1], [r1, g1, b1, a0]]
    }
}

/// Fill `out` from a pair of 8-bit endpoints and effective texel weights.
pub(crate) fn interpolate_texels(
    endpoints: [[u32; 4]; 2],
    weights: &[u32],
    mode: DecodeMode,
    out: &mut [Texel],
) {
    let c0 = endpoints[0].map(|e| expand_endpoint(e as u8, mode.unorm8));
    let c1 = endpoints[1].map(|e| expand_endpoint(e as u8, mode.unorm8));
    for (dst, &w) in out.iter_mut().zip(weights) {
        for c in 0..4 {
            dst[c] = interpolate(c0[c], c1[c], w) as f32 / 65535.0;
        }
    }
}

impl Codec {
    fn error_colour(&self) -> Texel {
        if self.decode_mode().hdr {
            [f32::NAN; 4]
        } else {
            MAGENTA
        }
    }

    /// Decode one block into `out`, which holds one texel per block texel.
    pub(crate) fn decode_block(&self, block: u128, out: &mut [Texel]) {
        if !self.try_decode_block(block, out) {
            out.fill(self.error_colour());
        }
    }

    fn try_decode_block(&self, block: u128, out: &mut [Texel]) -> bool {
        let mode = read_bits(block, 0, 11);
        if is_void_extent(mode) {
            return self.decode_void_extent(block, out);
        }

        let Some(bm) = decode_block_mode(mode, self.is_3d) else {
            return false;
        };
        if !bm.fits(self.block) || bm.dual_plane || read_bits(block, 11, 2) != 0 {
            return false;
        }
        let values = match read_bits(block, 13, 4) {
            8 => 6,
            12 => 8,
            _ => return false,
        };
        if super::COLOR_BITS - bm.weight_bits < 8 * values {
            return false;
        }
        let Some(bits) = bm.pure_bits() else {
            return false;
        };
        let Some(infill) = self.infills.get(&bm.grid) else {
            return false;
        };

        let mut colours = BitReader::new(block, 17);
        let mut raw = [0u32; 8];
        for v in raw.iter_mut().take(values as usize) {
            *v = colours.read(8);
        }
        let endpoints = unpack_direct(&raw[..values as usize]);

        let mut grid = [0u32; 64];
        let count = infill.grid_len();
        let mut weights = BitReader::new(block.reverse_bits(), 0);
        for g in grid.iter_mut().take(count) {
            *g = unquantize_weight(weights.read(bits), bits);
        }

        let mut texel_weights = [0u32; 216];
        let n = out.len();
        infill.apply(&grid[..count], &mut texel_weights[..n]);
        interpolate_texels(endpoints, &texel_weights[..n], self.decode_mode(), out);
        true
    }

    fn decode_void_extent(&self, block: u128, out: &mut [Texel]) -> bool {
        let hdr = read_bits(block, 9, 1) == 1;
        if hdr && !self.decode_mode().hdr {
            return false;
        }
        let mut colour = [0.0f32; 4];
        for (c, dst) in colour.iter_mut().enumerate() {
            let raw = read_bits(block, 64 + 16 * c as u32, 16);
            *dst = if hdr {
                f16::from_bits(raw as u16).to_f32()
            } else {
                raw as f32 / 65535.0
            };
        }
        out.fill(colour);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_endpoints() {
        assert_eq!(interpolate(0, 65535, 0), 0);
        assert_eq!(interpolate(0, 65535, 64), 65535);
        assert_eq!(interpolate(1000, 1000, 37), 1000);
    }

    #[test]
    fn test_unpack_direct_orders_and_contracts() {
        let direct = unpack_direct(&[10, 20, 30, 40, 50, 60]);
        assert_eq!(direct, [[10, 30, 50, 255], [20, 40, 60, 255]]);

        let contracted = unpack_direct(&[100, 10, 100, 10, 100, 10, 7, 9]);
        assert_eq!(contracted[0], [10, 10, 10, 9]);
        assert_eq!(contracted[1], [100, 100, 100, 7]);
    }

    #[test]
    fn test_expand_endpoint() {
        assert_eq!(expand_endpoint(255, false), 65535);
        assert_eq!(expand_endpoint(1, true), 0x180);
    }
}
