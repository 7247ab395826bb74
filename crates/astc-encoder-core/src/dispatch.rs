//! Choosing the codec variant for the running CPU.
//!
//! Selection walks the preference order of the host family and takes the
//! first variant whose required features are all present. When that
//! variant was left out of the build, the portable variant is used rather
//! than stepping down to a weaker SIMD variant.

use std::sync::OnceLock;

use tracing::{debug, info, warn};

use crate::variant::{preference_order, ArchFamily, CpuFeature, Variant};

/// Source of CPU feature information.
pub trait FeatureProbe {
    /// Architecture family of the probed CPU.
    fn family(&self) -> ArchFamily;

    /// Whether the CPU offers `feature`.
    fn has(&self, feature: CpuFeature) -> bool;
}

/// Probes the CPU this process runs on.
///
/// With the `no-runtime-cpu-detection` feature the answers come from the
/// compile target instead of the CPU.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProbe;

impl FeatureProbe for HostProbe {
    fn family(&self) -> ArchFamily {
        ArchFamily::host()
    }

    fn has(&self, feature: CpuFeature) -> bool {
        host_has(feature)
    }
}

#[cfg(all(target_arch = "x86_64", not(feature = "no-runtime-cpu-detection")))]
fn host_has(feature: CpuFeature) -> bool {
    match feature {
        CpuFeature::Sse2 => is_x86_feature_detected!("sse2"),
        CpuFeature::Sse41 => is_x86_feature_detected!("sse4.1"),
        CpuFeature::Popcnt => is_x86_feature_detected!("popcnt"),
        CpuFeature::Avx2 => is_x86_feature_detected!("avx2"),
        CpuFeature::F16c => is_x86_feature_detected!("f16c"),
        _ => false,
    }
}

#[cfg(all(target_arch = "x86_64", feature = "no-runtime-cpu-detection"))]
fn host_has(feature: CpuFeature) -> bool {
    match feature {
        CpuFeature::Sse2 => cfg!(target_feature = "sse2"),
        CpuFeature::Sse41 => cfg!(target_feature = "sse4.1"),
        CpuFeature::Popcnt => cfg!(target_feature = "popcnt"),
        CpuFeature::Avx2 => cfg!(target_feature = "avx2"),
        CpuFeature::F16c => cfg!(target_feature = "f16c"),
        _ => false,
    }
}

// NEON is part of the AArch64 baseline. SVE is taken from the build target.
#[cfg(target_arch = "aarch64")]
fn host_has(feature: CpuFeature) -> bool {
    match feature {
        CpuFeature::Neon => true,
        CpuFeature::Sve => cfg!(target_feature = "sve"),
        CpuFeature::Sve256 => cfg!(all(target_feature = "sve", feature = "sve256")),
        _ => false,
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn host_has(_feature: CpuFeature) -> bool {
    false
}

/// Whether `probe` reports every feature `variant` needs.
pub fn supports<P: FeatureProbe + ?Sized>(probe: &P, variant: Variant) -> bool {
    (variant == Variant::Portable || variant.family() == probe.family())
        && variant.required_features().iter().all(|&f| probe.has(f))
}

/// Pick the variant for `probe`.
///
/// `is_available` reports whether a variant's implementation exists; pass
/// [`Variant::is_compiled`] for the real build.
///
/// # Examples
///
/// ```
/// use astc_encoder_core::{select_variant, ArchFamily, CpuFeature, FeatureProbe, Variant};
///
/// struct Sse2Only;
/// impl FeatureProbe for Sse2Only {
///     fn family(&self) -> ArchFamily { ArchFamily::X86_64 }
///     fn has(&self, f: CpuFeature) -> bool { f == CpuFeature::Sse2 }
/// }
///
/// assert_eq!(select_variant(&Sse2Only, |_| true), Variant::Sse2);
/// assert_eq!(select_variant(&Sse2Only, |v| v == Variant::Portable), Variant::Portable);
/// ```
pub fn select_variant<P, F>(probe: &P, is_available: F) -> Variant
where
    P: FeatureProbe + ?Sized,
    F: Fn(Variant) -> bool,
{
    for &variant in preference_order(probe.family()) {
        if !supports(probe, variant) {
            debug!(variant = variant.name(), "cpu lacks features for variant");
            continue;
        }
        if is_available(variant) {
            return variant;
        }
        warn!(
            variant = variant.name(),
            "preferred variant is not compiled in, using the portable variant"
        );
        return Variant::Portable;
    }
    Variant::Portable
}

static SELECTED: OnceLock<Variant> = OnceLock::new();

/// The variant used by every context in this process.
///
/// Probed once; later calls return the cached answer.
pub fn selected_variant() -> Variant {
    *SELECTED.get_or_init(|| {
        let variant = select_variant(&HostProbe, Variant::is_compiled);
        info!(
            variant = variant.name(),
            family = ?ArchFamily::host(),
            "selected codec variant"
        );
        variant
    })
}

/// Whether `variant` is both compiled in and supported by this CPU.
pub fn is_runnable(variant: Variant) -> bool {
    variant.is_compiled() && supports(&HostProbe, variant)
}
