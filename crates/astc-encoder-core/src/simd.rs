//! SIMD inner loops shared by the encoder, decoder and error metrics.
//!
//! Each codec variant owns a [`Kernels`] table of function pointers. A table
//! is only handed out for a variant that is compiled in and supported by the
//! running CPU, so the `unsafe` target-feature functions below are never
//! reached on a CPU that lacks their instructions.

use half::f16;

use crate::dispatch::{supports, HostProbe};
use crate::variant::Variant;

/// One RGBA texel in working precision.
pub type Texel = [f32; 4];

type ProjectFn = unsafe fn(&[Texel], Texel, Texel, &mut [f32]);
type WeightedErrorFn = unsafe fn(&[Texel], &[Texel], &[Texel]) -> f32;
type WidenFn = unsafe fn(&[u8], &mut [f32]);
type NarrowFn = unsafe fn(&[f32], &mut [u8]);

/// Per-variant table of inner loops.
#[derive(Clone, Copy)]
pub struct Kernels {
    variant: Variant,
    project: ProjectFn,
    weighted_error: WeightedErrorFn,
    widen_f16: WidenFn,
    narrow_f16: NarrowFn,
}

impl std::fmt::Debug for Kernels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernels")
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

impl Kernels {
    /// The variant this table implements.
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// `out[i] = dot(texels[i] - origin, axis)`.
    pub fn project(&self, texels: &[Texel], origin: Texel, axis: Texel, out: &mut [f32]) {
        assert_eq!(texels.len(), out.len());
        // SAFETY: tables are only created for variants the CPU supports.
        unsafe { (self.project)(texels, origin, axis, out) }
    }

    /// `sum_i sum_c weights[i][c] * (a[i][c] - b[i][c])^2`.
    pub fn weighted_error(&self, a: &[Texel], b: &[Texel], weights: &[Texel]) -> f32 {
        assert!(a.len() == b.len() && a.len() == weights.len());
        // SAFETY: as for `project`.
        unsafe { (self.weighted_error)(a, b, weights) }
    }

    /// Convert native-endian binary16 bytes to `f32`.
    pub fn widen_f16(&self, src: &[u8], out: &mut [f32]) {
        assert_eq!(src.len(), out.len() * 2);
        // SAFETY: as for `project`.
        unsafe { (self.widen_f16)(src, out) }
    }

    /// Convert `f32` to native-endian binary16 bytes, rounding to nearest.
    pub fn narrow_f16(&self, src: &[f32], out: &mut [u8]) {
        assert_eq!(src.len() * 2, out.len());
        // SAFETY: as for `project`.
        unsafe { (self.narrow_f16)(src, out) }
    }
}

/// The kernel table of a variant, if it is compiled in and this CPU runs it.
///
/// SVE variants run the NEON loops; the portable variant always exists.
pub fn kernels_for(variant: Variant) -> Option<&'static Kernels> {
    if !supports(&HostProbe, variant) {
        return None;
    }
    match variant {
        Variant::Portable => Some(&PORTABLE),
        #[cfg(all(target_arch = "x86_64", feature = "variant-sse2"))]
        Variant::Sse2 => Some(&SSE2),
        #[cfg(all(target_arch = "x86_64", feature = "variant-sse41"))]
        Variant::Sse41 => Some(&SSE41),
        #[cfg(all(target_arch = "x86_64", feature = "variant-avx2"))]
        Variant::Avx2 => Some(&AVX2),
        #[cfg(all(target_arch = "aarch64", feature = "variant-neon"))]
        Variant::Neon => Some(&NEON),
        #[cfg(all(target_arch = "aarch64", feature = "variant-sve"))]
        Variant::Sve128 => Some(&SVE128),
        #[cfg(all(target_arch = "aarch64", feature = "variant-sve"))]
        Variant::Sve256 => Some(&SVE256),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

static PORTABLE: Kernels = Kernels {
    variant: Variant::Portable,
    project: scalar::project,
    weighted_error: scalar::weighted_error,
    widen_f16: scalar::widen_f16,
    narrow_f16: scalar::narrow_f16,
};

#[cfg(all(target_arch = "x86_64", feature = "variant-sse2"))]
static SSE2: Kernels = Kernels {
    variant: Variant::Sse2,
    project: x86::project_sse2,
    weighted_error: x86::weighted_error_sse2,
    widen_f16: scalar::widen_f16,
    narrow_f16: scalar::narrow_f16,
};

#[cfg(all(target_arch = "x86_64", feature = "variant-sse41"))]
static SSE41: Kernels = Kernels {
    variant: Variant::Sse41,
    project: x86::project_sse41,
    weighted_error: x86::weighted_error_sse2,
    widen_f16: scalar::widen_f16,
    narrow_f16: scalar::narrow_f16,
};

#[cfg(all(target_arch = "x86_64", feature = "variant-avx2"))]
static AVX2: Kernels = Kernels {
    variant: Variant::Avx2,
    project: x86::project_avx2,
    weighted_error: x86::weighted_error_avx2,
    widen_f16: x86::widen_f16c,
    narrow_f16: x86::narrow_f16c,
};

#[cfg(all(target_arch = "aarch64", feature = "variant-neon"))]
static NEON: Kernels = Kernels {
    variant: Variant::Neon,
    project: arm::project_neon,
    weighted_error: arm::weighted_error_neon,
    widen_f16: scalar::widen_f16,
    narrow_f16: scalar::narrow_f16,
};

#[cfg(all(target_arch = "aarch64", feature = "variant-sve"))]
static SVE128: Kernels = Kernels {
    variant: Variant::Sve128,
    ..NEON_LOOPS
};

#[cfg(all(target_arch = "aarch64", feature = "variant-sve"))]
static SVE256: Kernels = Kernels {
    variant: Variant::Sve256,
    ..NEON_LOOPS
};

#[cfg(all(target_arch = "aarch64", feature = "variant-sve"))]
const NEON_LOOPS: Kernels = Kernels {
    variant: Variant::Neon,
    project: arm::project_neon,
    weighted_error: arm::weighted_error_neon,
    widen_f16: scalar::widen_f16,
    narrow_f16: scalar::narrow_f16,
};

// ---------------------------------------------------------------------------
// Scalar
// ---------------------------------------------------------------------------

mod scalar {
    use super::{f16, Texel};

    pub(super) fn project(texels: &[Texel], origin: Texel, axis: Texel, out: &mut [f32]) {
        for (t, dst) in texels.iter().zip(out.iter_mut()) {
            *dst = (t[0] - origin[0]) * axis[0]
                + (t[1] - origin[1]) * axis[1]
                + (t[2] - origin[2]) * axis[2]
                + (t[3] - origin[3]) * axis[3];
        }
    }

    pub(super) fn weighted_error(a: &[Texel], b: &[Texel], weights: &[Texel]) -> f32 {
        let mut sum = 0.0f32;
        for ((ta, tb), w) in a.iter().zip(b).zip(weights) {
            for c in 0..4 {
                let d = ta[c] - tb[c];
                sum += d * d * w[c];
            }
        }
        sum
    }

    pub(super) fn widen_f16(src: &[u8], out: &mut [f32]) {
        for (bytes, dst) in src.chunks_exact(2).zip(out.iter_mut()) {
            *dst = f16::from_bits(u16::from_ne_bytes([bytes[0], bytes[1]])).to_f32();
        }
    }

    pub(super) fn narrow_f16(src: &[f32], out: &mut [u8]) {
        for (&v, bytes) in src.iter().zip(out.chunks_exact_mut(2)) {
            bytes.copy_from_slice(&f16::from_f32(v).to_bits().to_ne_bytes());
        }
    }
}

// ---------------------------------------------------------------------------
// x86-64
// ---------------------------------------------------------------------------

#[cfg(target_arch = "x86_64")]
#[allow(dead_code)]
mod x86 {
    use std::arch::x86_64::*;

    use super::{scalar, Texel};

    /// Sum of the four lanes.
    #[inline(always)]
    unsafe fn hsum(v: __m128) -> f32 {
        let shuf = _mm_shuffle_ps(v, v, 0b10_11_00_01);
        let sums = _mm_add_ps(v, shuf);
        let hi = _mm_movehl_ps(shuf, sums);
        _mm_cvtss_f32(_mm_add_ss(sums, hi))
    }

    #[target_feature(enable = "sse2")]
    pub(super) unsafe fn project_sse2(
        texels: &[Texel],
        origin: Texel,
        axis: Texel,
        out: &mut [f32],
    ) {
        let o = _mm_loadu_ps(origin.as_ptr());
        let a = _mm_loadu_ps(axis.as_ptr());
        for (t, dst) in texels.iter().zip(out.iter_mut()) {
            let v = _mm_mul_ps(_mm_sub_ps(_mm_loadu_ps(t.as_ptr()), o), a);
            *dst = hsum(v);
        }
    }

    #[target_feature(enable = "sse4.1")]
    pub(super) unsafe fn project_sse41(
        texels: &[Texel],
        origin: Texel,
        axis: Texel,
        out: &mut [f32],
    ) {
        let o = _mm_loadu_ps(origin.as_ptr());
        let a = _mm_loadu_ps(axis.as_ptr());
        for (t, dst) in texels.iter().zip(out.iter_mut()) {
            let d = _mm_sub_ps(_mm_loadu_ps(t.as_ptr()), o);
            *dst = _mm_cvtss_f32(_mm_dp_ps(d, a, 0xF1));
        }
    }

    #[target_feature(enable = "sse2")]
    pub(super) unsafe fn weighted_error_sse2(a: &[Texel], b: &[Texel], weights: &[Texel]) -> f32 {
        let mut acc = _mm_setzero_ps();
        for ((ta, tb), w) in a.iter().zip(b).zip(weights) {
            let d = _mm_sub_ps(_mm_loadu_ps(ta.as_ptr()), _mm_loadu_ps(tb.as_ptr()));
            acc = _mm_add_ps(acc, _mm_mul_ps(_mm_mul_ps(d, d), _mm_loadu_ps(w.as_ptr())));
        }
        hsum(acc)
    }

    /// Two texels per 256-bit register.
    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn project_avx2(
        texels: &[Texel],
        origin: Texel,
        axis: Texel,
        out: &mut [f32],
    ) {
        let n = texels.len().min(out.len());
        let src = texels.as_ptr() as *const f32;
        let o4 = _mm_loadu_ps(origin.as_ptr());
        let a4 = _mm_loadu_ps(axis.as_ptr());
        let o = _mm256_set_m128(o4, o4);
        let a = _mm256_set_m128(a4, a4);

        let pairs = n / 2;
        for p in 0..pairs {
            let v = _mm256_loadu_ps(src.add(p * 8));
            let m = _mm256_mul_ps(_mm256_sub_ps(v, o), a);
            let h = _mm256_hadd_ps(m, m);
            let h = _mm256_hadd_ps(h, h);
            out[2 * p] = _mm_cvtss_f32(_mm256_castps256_ps128(h));
            out[2 * p + 1] = _mm_cvtss_f32(_mm256_extractf128_ps(h, 1));
        }
        if n % 2 == 1 {
            let t = _mm_loadu_ps(src.add((n - 1) * 4));
            out[n - 1] = hsum(_mm_mul_ps(_mm_sub_ps(t, o4), a4));
        }
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn weighted_error_avx2(a: &[Texel], b: &[Texel], weights: &[Texel]) -> f32 {
        let n = a.len().min(b.len()).min(weights.len());
        let pa = a.as_ptr() as *const f32;
        let pb = b.as_ptr() as *const f32;
        let pw = weights.as_ptr() as *const f32;

        let mut acc = _mm256_setzero_ps();
        let pairs = n / 2;
        for p in 0..pairs {
            let d = _mm256_sub_ps(_mm256_loadu_ps(pa.add(p * 8)), _mm256_loadu_ps(pb.add(p * 8)));
            let w = _mm256_loadu_ps(pw.add(p * 8));
            acc = _mm256_add_ps(acc, _mm256_mul_ps(_mm256_mul_ps(d, d), w));
        }
        let mut acc4 = _mm_add_ps(_mm256_castps256_ps128(acc), _mm256_extractf128_ps(acc, 1));
        if n % 2 == 1 {
            let i = (n - 1) * 4;
            let d = _mm_sub_ps(_mm_loadu_ps(pa.add(i)), _mm_loadu_ps(pb.add(i)));
            acc4 = _mm_add_ps(acc4, _mm_mul_ps(_mm_mul_ps(d, d), _mm_loadu_ps(pw.add(i))));
        }
        hsum(acc4)
    }

    #[target_feature(enable = "f16c")]
    pub(super) unsafe fn widen_f16c(src: &[u8], out: &mut [f32]) {
        let n = out.len().min(src.len() / 2);
        let quads = n / 4;
        for q in 0..quads {
            let h = _mm_loadl_epi64(src.as_ptr().add(q * 8) as *const __m128i);
            _mm_storeu_ps(out.as_mut_ptr().add(q * 4), _mm_cvtph_ps(h));
        }
        let done = quads * 4;
        scalar::widen_f16(&src[done * 2..n * 2], &mut out[done..n]);
    }

    #[target_feature(enable = "f16c")]
    pub(super) unsafe fn narrow_f16c(src: &[f32], out: &mut [u8]) {
        let n = src.len().min(out.len() / 2);
        let quads = n / 4;
        for q in 0..quads {
            let v = _mm_loadu_ps(src.as_ptr().add(q * 4));
            let h = _mm_cvtps_ph::<_MM_FROUND_TO_NEAREST_INT>(v);
            _mm_storel_epi64(out.as_mut_ptr().add(q * 8) as *mut __m128i, h);
        }
        let done = quads * 4;
        scalar::narrow_f16(&src[done..n], &mut out[done * 2..n * 2]);
    }
}

// ---------------------------------------------------------------------------
// AArch64
// ---------------------------------------------------------------------------

#[cfg(target_arch = "aarch64")]
#[allow(dead_code)]
mod arm {
    use std::arch::aarch64::*;

    use super::Texel;

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn project_neon(
        texels: &[Texel],
        origin: Texel,
        axis: Texel,
        out: &mut [f32],
    ) {
        let o = vld1q_f32(origin.as_ptr());
        let a = vld1q_f32(axis.as_ptr());
        for (t, dst) in texels.iter().zip(out.iter_mut()) {
            *dst = vaddvq_f32(vmulq_f32(vsubq_f32(vld1q_f32(t.as_ptr()), o), a));
        }
    }

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn weighted_error_neon(a: &[Texel], b: &[Texel], weights: &[Texel]) -> f32 {
        let mut acc = vdupq_n_f32(0.0);
        for ((ta, tb), w) in a.iter().zip(b).zip(weights) {
            let d = vsubq_f32(vld1q_f32(ta.as_ptr()), vld1q_f32(tb.as_ptr()));
            acc = vfmaq_f32(acc, vmulq_f32(d, d), vld1q_f32(w.as_ptr()));
        }
        vaddvq_f32(acc)
    }
}
