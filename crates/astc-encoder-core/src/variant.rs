//! Registry of the codec variants and the CPU features each one needs.

use std::fmt;

/// Architecture family of a host or build target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchFamily {
    /// 64-bit x86.
    X86_64,
    /// 64-bit ARM.
    Aarch64,
    /// Anything else; only the portable variant applies.
    Other,
}

impl ArchFamily {
    /// The family this crate was compiled for.
    pub const fn host() -> Self {
        if cfg!(target_arch = "x86_64") {
            ArchFamily::X86_64
        } else if cfg!(target_arch = "aarch64") {
            ArchFamily::Aarch64
        } else {
            ArchFamily::Other
        }
    }
}

/// A CPU feature a variant may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuFeature {
    /// x86 SSE2.
    Sse2,
    /// x86 SSE4.1.
    Sse41,
    /// x86 POPCNT.
    Popcnt,
    /// x86 AVX2.
    Avx2,
    /// x86 half-precision conversions.
    F16c,
    /// ARM Advanced SIMD.
    Neon,
    /// ARM Scalable Vector Extension.
    Sve,
    /// SVE with 256-bit vectors, declared by the build.
    Sve256,
}

/// One implementation of the codec inner loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Scalar code, valid everywhere.
    Portable,
    /// x86-64 SSE2.
    Sse2,
    /// x86-64 SSE4.1 + POPCNT.
    Sse41,
    /// x86-64 AVX2 + POPCNT + F16C.
    Avx2,
    /// AArch64 NEON.
    Neon,
    /// AArch64 SVE, 128-bit vectors.
    Sve128,
    /// AArch64 SVE, 256-bit vectors.
    Sve256,
}

impl Variant {
    /// Every variant, portable first.
    pub const ALL: [Variant; 7] = [
        Variant::Portable,
        Variant::Sse2,
        Variant::Sse41,
        Variant::Avx2,
        Variant::Neon,
        Variant::Sve128,
        Variant::Sve256,
    ];

    /// Short lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Variant::Portable => "none",
            Variant::Sse2 => "sse2",
            Variant::Sse41 => "sse41",
            Variant::Avx2 => "avx2",
            Variant::Neon => "neon",
            Variant::Sve128 => "sve128",
            Variant::Sve256 => "sve256",
        }
    }

    /// The family the variant runs on; `Other` for portable.
    pub const fn family(self) -> ArchFamily {
        match self {
            Variant::Portable => ArchFamily::Other,
            Variant::Sse2 | Variant::Sse41 | Variant::Avx2 => ArchFamily::X86_64,
            Variant::Neon | Variant::Sve128 | Variant::Sve256 => ArchFamily::Aarch64,
        }
    }

    /// Features that must all be present before the variant may run.
    pub const fn required_features(self) -> &'static [CpuFeature] {
        use CpuFeature::*;
        match self {
            Variant::Portable => &[],
            Variant::Sse2 => &[Sse2],
            Variant::Sse41 => &[Sse41, Popcnt],
            Variant::Avx2 => &[Avx2, Popcnt, F16c],
            Variant::Neon => &[Neon],
            Variant::Sve128 => &[Neon, Sve],
            Variant::Sve256 => &[Neon, Sve, Sve256],
        }
    }

    /// Whether this build carries the variant's implementation.
    pub const fn is_compiled(self) -> bool {
        match self {
            Variant::Portable => true,
            Variant::Sse2 => cfg!(all(target_arch = "x86_64", feature = "variant-sse2")),
            Variant::Sse41 => cfg!(all(target_arch = "x86_64", feature = "variant-sse41")),
            Variant::Avx2 => cfg!(all(target_arch = "x86_64", feature = "variant-avx2")),
            Variant::Neon => cfg!(all(target_arch = "aarch64", feature = "variant-neon")),
            Variant::Sve128 | Variant::Sve256 => {
                cfg!(all(target_arch = "aarch64", feature = "variant-sve"))
            }
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Variants for a family in descending preference. Portable is implied last.
pub const fn preference_order(family: ArchFamily) -> &'static [Variant] {
    match family {
        ArchFamily::X86_64 => &[Variant::Avx2, Variant::Sse41, Variant::Sse2],
        ArchFamily::Aarch64 => &[Variant::Sve256, Variant::Sve128, Variant::Neon],
        ArchFamily::Other => &[],
    }
}
