//! Block encoding.
//!
//! A block is encoded as a void extent when every texel is identical.
//! Otherwise endpoints come from the principal axis of the block colours,
//! weights are fitted per candidate block mode, and endpoints are refitted
//! by least squares for the configured number of passes. The candidate
//! with the lowest channel-weighted error wins, with a mean-colour void
//! extent as the baseline.

use half::f16;

use crate::config::ConfigFlags;
use crate::simd::Texel;

use super::bits::BitWriter;
use super::block_mode::unquantize_weight;
use super::decode::{expand_endpoint, interpolate_texels};
use super::infill::Infill;
use super::{Candidate, Cem, Codec};

const LDR_VOID_EXTENT: u64 = 0xFFFF_FFFF_FFFF_FDFC;
const HDR_VOID_EXTENT: u64 = 0xFFFF_FFFF_FFFF_FFFC;

const POWER_ITERATIONS: usize = 8;

/// Working buffers for one encoding worker.
pub(crate) struct Scratch {
    pub texels: Vec<Texel>,
    pub row: Vec<f32>,
    work: Vec<Texel>,
    error_weights: Vec<Texel>,
    proj: Vec<f32>,
    decoded: Vec<Texel>,
    texel_weights: Vec<u32>,
    grid_sum: [f32; 64],
    grid_norm: [f32; 64],
    grid_q: [u32; 64],
    grid_unq: [u32; 64],
}

impl Scratch {
    pub(crate) fn new(texels: usize) -> Self {
        Self {
            texels: vec![[0.0; 4]; texels],
            row: Vec::new(),
            work: vec![[0.0; 4]; texels],
            error_weights: vec![[0.0; 4]; texels],
            proj: vec![0.0; texels],
            decoded: vec![[0.0; 4]; texels],
            texel_weights: vec![0; texels],
            grid_sum: [0.0; 64],
            grid_norm: [0.0; 64],
            grid_q: [0; 64],
            grid_unq: [0; 64],
        }
    }
}

#[inline]
fn unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// A void-extent block of one colour.
pub(crate) fn void_extent(colour: Texel, hdr: bool) -> u128 {
    let mut high = 0u64;
    for (c, &v) in colour.iter().enumerate() {
        let bits = if hdr {
            f16::from_f32(v).to_bits()
        } else {
            (unit(v) * 65535.0).round() as u16
        };
        high |= u64::from(bits) << (16 * c);
    }
    let low = if hdr { HDR_VOID_EXTENT } else { LDR_VOID_EXTENT };
    (u128::from(high) << 64) | u128::from(low)
}

fn mean(texels: &[Texel]) -> Texel {
    let mut sum = [0.0f32; 4];
    for t in texels {
        for c in 0..4 {
            sum[c] += t[c];
        }
    }
    sum.map(|s| s / texels.len() as f32)
}

/// Dominant direction of the colour distribution around `centre`.
fn principal_axis(texels: &[Texel], centre: Texel) -> Option<Texel> {
    let mut cov = [[0.0f32; 4]; 4];
    for t in texels {
        let d = [
            t[0] - centre[0],
            t[1] - centre[1],
            t[2] - centre[2],
            t[3] - centre[3],
        ];
        for i in 0..4 {
            for j in 0..4 {
                cov[i][j] += d[i] * d[j];
            }
        }
    }

    // Seed with the row of the largest variance.
    let start = (0..4).max_by(|&a, &b| cov[a][a].total_cmp(&cov[b][b]))?;
    let mut v = cov[start];
    for _ in 0..POWER_ITERATIONS {
        let mut next = [0.0f32; 4];
        for i in 0..4 {
            next[i] = (0..4).map(|j| cov[i][j] * v[j]).sum();
        }
        let norm = next.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm.is_nan() || norm <= 1e-12 {
            return None;
        }
        v = next.map(|x| x / norm);
    }
    Some(v)
}

/// Round two float endpoints to 8 bits, ordered so the decoder reads them
/// without blue contraction.
fn quantize_endpoints(e0: Texel, e1: Texel, cem: Cem) -> [[u8; 4]; 2] {
    let q = |e: Texel| {
        let mut out = e.map(|v| (unit(v) * 255.0).round() as u8);
        if cem == Cem::Rgb {
            out[3] = 255;
        }
        out
    };
    let (q0, q1) = (q(e0), q(e1));
    let sum = |e: &[u8; 4]| u32::from(e[0]) + u32::from(e[1]) + u32::from(e[2]);
    if sum(&q1) < sum(&q0) {
        [q1, q0]
    } else {
        [q0, q1]
    }
}

/// Least-squares endpoints for fixed texel weights.
fn refit_endpoints(texels: &[Texel], weights: &[u32]) -> Option<(Texel, Texel)> {
    let (mut aa, mut ab, mut bb) = (0.0f32, 0.0f32, 0.0f32);
    let mut rhs0 = [0.0f32; 4];
    let mut rhs1 = [0.0f32; 4];
    for (t, &w) in texels.iter().zip(weights) {
        let f = w as f32 / 64.0;
        let g = 1.0 - f;
        aa += g * g;
        ab += g * f;
        bb += f * f;
        for c in 0..4 {
            rhs0[c] += g * t[c];
            rhs1[c] += f * t[c];
        }
    }
    let det = aa * bb - ab * ab;
    if det.abs() < 1e-6 {
        return None;
    }
    let mut e0 = [0.0; 4];
    let mut e1 = [0.0; 4];
    for c in 0..4 {
        e0[c] = unit((bb * rhs0[c] - ab * rhs1[c]) / det);
        e1[c] = unit((aa * rhs1[c] - ab * rhs0[c]) / det);
    }
    Some((e0, e1))
}

fn pack(candidate: &Candidate, cem: Cem, endpoints: [[u8; 4]; 2], grid_q: &[u32]) -> u128 {
    let mut header = BitWriter::new();
    header.write(candidate.mode, 11);
    header.write(0, 2);
    header.write(cem as u32, 4);
    let channels = cem.values() as usize / 2;
    for c in 0..channels {
        header.write(u32::from(endpoints[0][c]), 8);
        header.write(u32::from(endpoints[1][c]), 8);
    }

    let mut weights = BitWriter::new();
    for &q in grid_q {
        weights.write(q, candidate.bits);
    }
    debug_assert!(header.position() + weights.position() <= 128);
    header.finish() | weights.finish().reverse_bits()
}

impl Codec {
    /// Encode the texels in `s.texels`.
    pub(crate) fn encode_block(&self, s: &mut Scratch) -> u128 {
        let hdr = self.profile.is_hdr();
        let first = s.texels[0];
        if s.texels.iter().all(|t| *t == first) {
            return void_extent(first, hdr);
        }

        // Non-constant blocks are encoded in the LDR range.
        for (w, t) in s.work.iter_mut().zip(&s.texels) {
            *w = t.map(unit);
        }
        self.fill_error_weights(s);

        let centre = mean(&s.work);
        let mut best = void_extent(centre, false);
        let baseline = centre.map(|v| (unit(v) * 65535.0).round() / 65535.0);
        s.decoded.fill(baseline);
        let mut best_error = self
            .kernels
            .weighted_error(&s.work, &s.decoded, &s.error_weights);

        let Some(axis) = principal_axis(&s.work, centre) else {
            return best;
        };
        self.kernels.project(&s.work, centre, axis, &mut s.proj);
        let (lo, hi) = s
            .proj
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        let start0: Texel = std::array::from_fn(|c| centre[c] + axis[c] * lo);
        let start1: Texel = std::array::from_fn(|c| centre[c] + axis[c] * hi);

        let has_alpha = s.work.iter().any(|t| t[3] != 1.0);
        let (cem, candidates) = if has_alpha {
            (Cem::Rgba, &self.rgba_candidates)
        } else {
            (Cem::Rgb, &self.rgb_candidates)
        };
        let mode = self.decode_mode();

        for candidate in candidates.iter().take(self.candidate_limit) {
            let Some(infill) = self.infills.get(&candidate.block_mode.grid) else {
                continue;
            };
            let count = infill.grid_len();
            let (mut e0, mut e1) = (start0, start1);
            for pass in 0..self.refinement_limit.max(1) {
                let endpoints = quantize_endpoints(e0, e1, cem);
                self.fit_weights(s, endpoints, candidate.bits, infill);
                interpolate_texels(
                    endpoints.map(|e| e.map(u32::from)),
                    &s.texel_weights,
                    mode,
                    &mut s.decoded,
                );
                let error = self
                    .kernels
                    .weighted_error(&s.work, &s.decoded, &s.error_weights);
                if error < best_error {
                    best_error = error;
                    best = pack(candidate, cem, endpoints, &s.grid_q[..count]);
                }

                if pass + 1 < self.refinement_limit {
                    match refit_endpoints(&s.work, &s.texel_weights) {
                        Some((a, b)) => (e0, e1) = (a, b),
                        None => break,
                    }
                }
            }
        }
        best
    }

    fn fill_error_weights(&self, s: &mut Scratch) {
        let alpha_weighted = self.flags.contains(ConfigFlags::USE_ALPHA_WEIGHT);
        let radius = self.a_scale_radius as i64;
        let [bx, by, bz] = self.block.map(|d| d as i64);
        for i in 0..s.work.len() {
            let mut w = self.channel_weights;
            if alpha_weighted {
                let alpha = if radius == 0 {
                    s.work[i][3]
                } else {
                    let (x, y, z) = (i as i64 % bx, (i as i64 / bx) % by, i as i64 / (bx * by));
                    let (mut sum, mut n) = (0.0f32, 0u32);
                    for nz in (z - radius).max(0)..=(z + radius).min(bz - 1) {
                        for ny in (y - radius).max(0)..=(y + radius).min(by - 1) {
                            for nx in (x - radius).max(0)..=(x + radius).min(bx - 1) {
                                sum += s.work[(nx + ny * bx + nz * bx * by) as usize][3];
                                n += 1;
                            }
                        }
                    }
                    sum / n as f32
                };
                for c in &mut w[..3] {
                    *c *= alpha;
                }
            }
            s.error_weights[i] = w;
        }
    }

    /// Ideal weights for `endpoints`, decimated onto the grid, quantised
    /// to `bits`, and infilled back to per-texel weights.
    fn fit_weights(&self, s: &mut Scratch, endpoints: [[u8; 4]; 2], bits: u32, infill: &Infill) {
        let mode = self.decode_mode();
        let c0 = endpoints[0].map(|e| expand_endpoint(e, mode.unorm8) as f32 / 65535.0);
        let c1 = endpoints[1].map(|e| expand_endpoint(e, mode.unorm8) as f32 / 65535.0);
        let dir: Texel = std::array::from_fn(|c| (c1[c] - c0[c]) * self.channel_weights[c]);
        let len2: f32 = (0..4).map(|c| (c1[c] - c0[c]) * dir[c]).sum();

        if len2 > 1e-12 {
            let axis = dir.map(|d| d / len2);
            self.kernels.project(&s.work, c0, axis, &mut s.proj);
        } else {
            s.proj.fill(0.0);
        }

        let count = infill.grid_len();
        s.grid_sum[..count].fill(0.0);
        s.grid_norm[..count].fill(0.0);
        for (taps, &p) in infill.taps().iter().zip(&s.proj) {
            let ideal = p.clamp(0.0, 1.0);
            for &(idx, w) in taps {
                let w = f32::from(w);
                s.grid_sum[idx as usize] += ideal * w;
                s.grid_norm[idx as usize] += w;
            }
        }

        let top = ((1u32 << bits) - 1) as f32;
        for j in 0..count {
            let g = if s.grid_norm[j] > 0.0 {
                s.grid_sum[j] / s.grid_norm[j]
            } else {
                0.0
            };
            let q = (g * top).round().clamp(0.0, top) as u32;
            s.grid_q[j] = q;
            s.grid_unq[j] = unquantize_weight(q, bits);
        }
        infill.apply(&s.grid_unq[..count], &mut s.texel_weights);
    }
}
