//! Error metrics between a source image and its reconstruction.

use crate::codec::read_image;
use crate::dispatch::selected_variant;
use crate::error::{AstcError, Result};
use crate::image::Image;
use crate::simd::{kernels_for, Kernels, Texel};

/// Texels per kernel call; keeps `f32` partial sums short.
const CHUNK: usize = 256;

/// Log values are floored here before taking `log2`.
const LOG_FLOOR: f64 = 1e-6;

/// Widest exposure range, in stops, for the multi-exposure PSNR.
const MAX_FSTOP_SPAN: i64 = 64;

/// Comparison results. PSNR values are in decibels and are infinite for
/// identical inputs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ErrorMetrics {
    /// PSNR over every compared channel.
    pub psnr: f64,
    /// PSNR over the colour channels.
    pub psnr_rgb: f64,
    /// PSNR over alpha; infinite when alpha is not compared.
    pub psnr_alpha: f64,
    /// Peak colour value used for the PSNR figures.
    pub peak_rgb: f64,
    /// Multi-exposure colour PSNR over `fstop_lo..=fstop_hi`.
    pub mpsnr_rgb: f64,
    /// RMS of the base-2 log colour difference.
    pub log_rmse_rgb: f64,
    /// Mean angle between normals, in degrees.
    pub mean_angular_errorsum: f64,
    /// Largest angle between normals, in degrees.
    pub worst_angular_errorsum: f64,
}

fn psnr(peak: f64, sum: f64, count: f64) -> f64 {
    if count == 0.0 || sum == 0.0 {
        f64::INFINITY
    } else {
        10.0 * (peak * peak / (sum / count)).log10()
    }
}

fn chunked_error(kernels: &Kernels, a: &[Texel], b: &[Texel], weights: Texel) -> f64 {
    let w = [weights; CHUNK];
    a.chunks(CHUNK)
        .zip(b.chunks(CHUNK))
        .map(|(ca, cb)| f64::from(kernels.weighted_error(ca, cb, &w[..ca.len()])))
        .sum()
}

fn normal(t: &Texel) -> [f64; 3] {
    let v = [0, 1, 2].map(|c| f64::from(t[c]) * 2.0 - 1.0);
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len > 0.0 {
        v.map(|x| x / len)
    } else {
        v
    }
}

/// Exposure-adjusted 8-bit value used by the multi-exposure PSNR.
fn exposed(v: f32, scale: f64) -> f64 {
    let v = (f64::from(v).max(0.0) * scale).powf(1.0 / 2.2) * 255.0;
    v.clamp(0.0, 255.0)
}

/// Compare `a` (the source) against `b` (the reconstruction).
///
/// `input_components` is the number of meaningful source channels: 1 and 2
/// compare luminance in red (plus alpha for 2), 3 compares RGB, 4 RGBA.
/// LDR figures use a peak of 255; HDR figures use the brightest source
/// colour channel.
///
/// # Errors
///
/// [`AstcError::ImageMismatch`] if the images differ in type or shape, and
/// [`AstcError::InvalidParameter`] for `input_components` outside `1..=4`,
/// `fstop_lo > fstop_hi`, or an exposure range wider than 64 stops.
pub fn compute_error_metrics(
    hdr: bool,
    normal_map: bool,
    input_components: u32,
    a: &Image,
    b: &Image,
    fstop_lo: i32,
    fstop_hi: i32,
) -> Result<ErrorMetrics> {
    if a.data_type() != b.data_type() {
        return Err(AstcError::ImageMismatch("data types differ"));
    }
    if (a.width(), a.height(), a.depth()) != (b.width(), b.height(), b.depth()) {
        return Err(AstcError::ImageMismatch("dimensions differ"));
    }
    if !(1..=4).contains(&input_components) {
        return Err(AstcError::InvalidParameter {
            name: "input_components",
            value: input_components as f32,
            reason: "must be 1..=4",
        });
    }
    if fstop_lo > fstop_hi {
        return Err(AstcError::InvalidParameter {
            name: "fstop_lo",
            value: fstop_lo as f32,
            reason: "must not exceed fstop_hi",
        });
    }
    if i64::from(fstop_hi) - i64::from(fstop_lo) > MAX_FSTOP_SPAN {
        return Err(AstcError::InvalidParameter {
            name: "fstop_hi",
            value: fstop_hi as f32,
            reason: "exposure range is wider than 64 stops",
        });
    }

    let kernels = kernels_for(selected_variant())
        .ok_or_else(|| AstcError::Resource("selected variant is not compiled in".into()))?;
    let ta = read_image(a, kernels);
    let tb = read_image(b, kernels);
    let texels = ta.len() as f64;

    let colour_channels: usize = if input_components <= 2 { 1 } else { 3 };
    let has_alpha = input_components == 2 || input_components == 4;
    let mut rgb_weights = [0.0; 4];
    rgb_weights[..colour_channels].fill(1.0);
    let alpha_weights = [0.0, 0.0, 0.0, if has_alpha { 1.0 } else { 0.0 }];

    let rgb_sum = chunked_error(kernels, &ta, &tb, rgb_weights);
    let alpha_sum = chunked_error(kernels, &ta, &tb, alpha_weights);

    let peak = if hdr {
        ta.iter()
            .flat_map(|t| t[..3].iter().copied())
            .fold(0.0f32, f32::max)
            .max(f32::MIN_POSITIVE)
            .into()
    } else {
        1.0
    };
    let reported_peak = if hdr { peak } else { 255.0 };
    let rgb_count = texels * colour_channels as f64;
    let alpha_count = if has_alpha { texels } else { 0.0 };

    let mut mpsnr_sum = 0.0f64;
    let mut log_sum = 0.0f64;
    let mut angle_sum = 0.0f64;
    let mut angle_worst = 0.0f64;
    for (pa, pb) in ta.iter().zip(&tb) {
        for fstop in fstop_lo..=fstop_hi {
            let scale = 2.0f64.powi(fstop);
            for c in 0..colour_channels {
                let d = exposed(pa[c], scale) - exposed(pb[c], scale);
                mpsnr_sum += d * d;
            }
        }
        for c in 0..colour_channels {
            let la = f64::from(pa[c]).max(LOG_FLOOR).log2();
            let lb = f64::from(pb[c]).max(LOG_FLOOR).log2();
            log_sum += (la - lb) * (la - lb);
        }
        if normal_map {
            let (na, nb) = (normal(pa), normal(pb));
            let dot = (na[0] * nb[0] + na[1] * nb[1] + na[2] * nb[2]).clamp(-1.0, 1.0);
            let angle = dot.acos().to_degrees();
            angle_sum += angle;
            angle_worst = angle_worst.max(angle);
        }
    }
    let fstops = f64::from(fstop_hi) - f64::from(fstop_lo) + 1.0;

    Ok(ErrorMetrics {
        psnr: psnr(peak, rgb_sum + alpha_sum, rgb_count + alpha_count),
        psnr_rgb: psnr(peak, rgb_sum, rgb_count),
        psnr_alpha: psnr(peak, alpha_sum, alpha_count),
        peak_rgb: reported_peak,
        mpsnr_rgb: psnr(255.0, mpsnr_sum, rgb_count * fstops),
        log_rmse_rgb: (log_sum / rgb_count).sqrt(),
        mean_angular_errorsum: if normal_map { angle_sum / texels } else { 0.0 },
        worst_angular_errorsum: angle_worst,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::DataType;

    fn image(pixels: Vec<u8>) -> Image {
        Image::with_data(DataType::U8, 2, 2, 1, pixels).unwrap()
    }

    #[test]
    fn test_identical_images() {
        let a = image(vec![10, 20, 30, 255].repeat(4));
        let m = compute_error_metrics(false, true, 4, &a, &a.clone(), -10, 10).unwrap();
        assert!(m.psnr.is_infinite());
        assert!(m.psnr_rgb.is_infinite());
        assert_eq!(m.peak_rgb, 255.0);
        assert_eq!(m.log_rmse_rgb, 0.0);
        assert_eq!(m.worst_angular_errorsum, 0.0);
    }

    #[test]
    fn test_known_rgb_error() {
        // Every colour channel off by one code: MSE of 1 on a 0..255 scale.
        let a = image(vec![100, 100, 100, 255].repeat(4));
        let b = image(vec![101, 101, 101, 255].repeat(4));
        let m = compute_error_metrics(false, false, 4, &a, &b, 0, 0).unwrap();
        let expected = 10.0 * (255.0f64 * 255.0).log10();
        assert!((m.psnr_rgb - expected).abs() < 1e-3, "{}", m.psnr_rgb);
        assert!(m.psnr_alpha.is_infinite());
        assert!(m.psnr > m.psnr_rgb);
    }

    #[test]
    fn test_components_limit_channels() {
        let a = image(vec![100, 0, 0, 255].repeat(4));
        let b = image(vec![100, 50, 50, 0].repeat(4));
        let m = compute_error_metrics(false, false, 1, &a, &b, 0, 0).unwrap();
        assert!(m.psnr.is_infinite());
        let m = compute_error_metrics(false, false, 2, &a, &b, 0, 0).unwrap();
        assert!(m.psnr_alpha.is_finite());
    }

    #[test]
    fn test_rejects_mismatched_inputs() {
        let a = image(vec![0; 16]);
        let b = Image::with_data(DataType::U8, 4, 1, 1, vec![0; 16]).unwrap();
        assert!(matches!(
            compute_error_metrics(false, false, 4, &a, &b, 0, 0),
            Err(AstcError::ImageMismatch(_))
        ));
        assert!(compute_error_metrics(false, false, 5, &a, &a, 0, 0).is_err());
        assert!(compute_error_metrics(false, false, 4, &a, &a, 3, 1).is_err());
    }

    #[test]
    fn test_exposure_range_is_bounded() {
        let a = image(vec![40; 16]);
        assert!(compute_error_metrics(false, false, 4, &a, &a, -32, 32).is_ok());
        for (lo, hi) in [(-32, 33), (i32::MIN, i32::MAX), (0, i32::MAX)] {
            let err = compute_error_metrics(false, false, 4, &a, &a, lo, hi).unwrap_err();
            assert!(
                matches!(err, AstcError::InvalidParameter { name: "fstop_hi", .. }),
                "{lo}..={hi}: {err}"
            );
        }
    }
}
