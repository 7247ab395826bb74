//! Channel swizzle descriptors.
//!
//! A [`Swizzle`] selects, for each of the four output channels, which input
//! channel (or constant) feeds it. Compression applies it when reading the
//! source image; decompression applies it when writing the destination.

use std::fmt;
use std::str::FromStr;

use crate::error::AstcError;

/// A single component selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SwizzleSelector {
    /// Select the red component.
    R = 0,
    /// Select the green component.
    G = 1,
    /// Select the blue component.
    B = 2,
    /// Select the alpha component.
    A = 3,
    /// Use a constant zero component.
    Zero = 4,
    /// Use a constant one component.
    One = 5,
    /// Use a reconstructed normal vector Z component.
    Z = 6,
}

impl SwizzleSelector {
    /// Parse one grammar character (case-insensitive).
    pub fn from_char(ch: char) -> Option<Self> {
        match ch.to_ascii_lowercase() {
            'r' => Some(Self::R),
            'g' => Some(Self::G),
            'b' => Some(Self::B),
            'a' => Some(Self::A),
            '0' => Some(Self::Zero),
            '1' => Some(Self::One),
            'z' => Some(Self::Z),
            _ => None,
        }
    }

    /// The grammar character for this selector.
    pub fn as_char(self) -> char {
        match self {
            Self::R => 'r',
            Self::G => 'g',
            Self::B => 'b',
            Self::A => 'a',
            Self::Zero => '0',
            Self::One => '1',
            Self::Z => 'z',
        }
    }
}

impl TryFrom<u32> for SwizzleSelector {
    type Error = AstcError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::R,
            1 => Self::G,
            2 => Self::B,
            3 => Self::A,
            4 => Self::Zero,
            5 => Self::One,
            6 => Self::Z,
            _ => {
                return Err(AstcError::InvalidEnumValue {
                    what: "swizzle selector",
                    value,
                })
            }
        })
    }
}

/// A four-component channel selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle {
    /// Selector feeding the red channel.
    pub r: SwizzleSelector,
    /// Selector feeding the green channel.
    pub g: SwizzleSelector,
    /// Selector feeding the blue channel.
    pub b: SwizzleSelector,
    /// Selector feeding the alpha channel.
    pub a: SwizzleSelector,
}

impl Swizzle {
    /// The identity swizzle, `rgba`.
    pub const RGBA: Swizzle = Swizzle::new(
        SwizzleSelector::R,
        SwizzleSelector::G,
        SwizzleSelector::B,
        SwizzleSelector::A,
    );

    /// Build a swizzle from four explicit selectors.
    pub const fn new(
        r: SwizzleSelector,
        g: SwizzleSelector,
        b: SwizzleSelector,
        a: SwizzleSelector,
    ) -> Self {
        Self { r, g, b, a }
    }

    /// Parse a four-character swizzle such as `"rgb1"` or `"rrrg"`.
    ///
    /// # Errors
    ///
    /// Returns [`AstcError::InvalidSwizzle`] if the string is not exactly
    /// four characters long or contains a character outside `rgba01z`.
    ///
    /// # Examples
    ///
    /// ```
    /// use astc_encoder_core::{Swizzle, SwizzleSelector};
    /// let swz = Swizzle::parse("10ZB").unwrap();
    /// assert_eq!(swz.r, SwizzleSelector::One);
    /// assert_eq!(swz.b, SwizzleSelector::Z);
    /// assert!(Swizzle::parse("LLLL").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, AstcError> {
        let invalid = |reason| AstcError::InvalidSwizzle {
            input: s.to_owned(),
            reason,
        };

        let mut selectors = [SwizzleSelector::R; 4];
        let mut count = 0;
        for ch in s.chars() {
            if count == 4 {
                return Err(invalid("expected exactly 4 characters"));
            }
            selectors[count] =
                SwizzleSelector::from_char(ch).ok_or_else(|| invalid("expected one of rgba01z"))?;
            count += 1;
        }
        if count != 4 {
            return Err(invalid("expected exactly 4 characters"));
        }

        let [r, g, b, a] = selectors;
        Ok(Self::new(r, g, b, a))
    }

    /// The selectors in channel order.
    pub fn selectors(&self) -> [SwizzleSelector; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Whether any channel asks for a reconstructed normal Z.
    pub fn uses_reconstructed_z(&self) -> bool {
        self.selectors().contains(&SwizzleSelector::Z)
    }
}

impl Default for Swizzle {
    fn default() -> Self {
        Self::RGBA
    }
}

impl FromStr for Swizzle {
    type Err = AstcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Swizzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sel in self.selectors() {
            write!(f, "{}", sel.as_char())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use SwizzleSelector::*;

    #[test]
    fn test_default_is_identity() {
        let swz = Swizzle::default();
        assert_eq!(swz.selectors(), [R, G, B, A]);
        assert!(!swz.uses_reconstructed_z());
    }

    #[rstest]
    #[case("10ZB", [One, Zero, Z, B])]
    #[case("razg", [R, A, Z, G])]
    #[case("rgb1", [R, G, B, One])]
    #[case("RRRG", [R, R, R, G])]
    fn test_parse(#[case] input: &str, #[case] expected: [SwizzleSelector; 4]) {
        assert_eq!(Swizzle::parse(input).unwrap().selectors(), expected);
    }

    #[rstest]
    #[case("R")]
    #[case("LLLL")]
    #[case("")]
    #[case("rgbaa")]
    #[case("rgb2")]
    #[case("rgé1")]
    fn test_parse_rejects(#[case] input: &str) {
        let err = Swizzle::parse(input).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);
    }

    #[test]
    fn test_display_round_trips() {
        let swz: Swizzle = "10ZB".parse().unwrap();
        assert_eq!(swz.to_string(), "10zb");
        assert_eq!(swz.to_string().parse::<Swizzle>().unwrap(), swz);
    }

    #[test]
    fn test_selector_from_u32() {
        assert_eq!(SwizzleSelector::try_from(6).unwrap(), Z);
        assert!(SwizzleSelector::try_from(7).is_err());
    }
}
