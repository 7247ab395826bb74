//! The 11-bit block mode field: weight grid, plane count and weight range.

/// Block mode value shared by all void-extent blocks (low nine bits).
pub(crate) const VOID_EXTENT_MODE: u32 = 0x1FC;

/// Number of encodable block modes.
pub(crate) const MODE_COUNT: u32 = 1 << 11;

/// Upper bound on weights in a block.
pub(crate) const MAX_WEIGHTS: u32 = 64;
const MIN_WEIGHT_BITS: u32 = 24;
const MAX_WEIGHT_BITS: u32 = 96;

/// `(trits, quints, bits)` per weight quantisation method, from 2 levels
/// up to 32.
const ISE_LAYOUT: [(u32, u32, u32); 12] = [
    (0, 0, 1),
    (1, 0, 0),
    (0, 0, 2),
    (0, 1, 0),
    (1, 0, 1),
    (0, 0, 3),
    (0, 1, 1),
    (1, 0, 2),
    (0, 0, 4),
    (0, 1, 2),
    (1, 0, 3),
    (0, 0, 5),
];

/// Bits taken by `count` integers of quantisation method `quant`.
pub(crate) fn ise_bits(count: u32, quant: usize) -> u32 {
    let (trits, quints, bits) = ISE_LAYOUT[quant];
    let mut total = count * bits;
    if trits != 0 {
        total += (8 * count + 4) / 5;
    }
    if quints != 0 {
        total += (7 * count + 2) / 3;
    }
    total
}

/// A decoded block mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BlockMode {
    /// Weight grid dimensions; `[x, y, 1]` for 2D modes.
    pub grid: [u32; 3],
    pub dual_plane: bool,
    /// Index into `ISE_LAYOUT`.
    pub quant: usize,
    pub weight_bits: u32,
}

impl BlockMode {
    pub(crate) fn grid_weights(&self) -> u32 {
        self.grid[0] * self.grid[1] * self.grid[2]
    }

    /// Bits per weight when the range is a power of two.
    pub(crate) fn pure_bits(&self) -> Option<u32> {
        match ISE_LAYOUT[self.quant] {
            (0, 0, bits) => Some(bits),
            _ => None,
        }
    }

    pub(crate) fn fits(&self, block: [u32; 3]) -> bool {
        self.grid.iter().zip(block).all(|(&g, b)| g <= b)
    }
}

pub(crate) fn is_void_extent(mode: u32) -> bool {
    mode & 0x1FF == VOID_EXTENT_MODE
}

/// Decode an 11-bit block mode. `None` for reserved or out-of-range modes.
pub(crate) fn decode_block_mode(mode: u32, is_3d: bool) -> Option<BlockMode> {
    if is_3d {
        decode_3d(mode)
    } else {
        decode_2d(mode)
    }
}

fn decode_2d(mode: u32) -> Option<BlockMode> {
    let mut base_quant = (mode >> 4) & 1;
    let mut h = (mode >> 9) & 1;
    let mut d = (mode >> 10) & 1;
    let a = (mode >> 5) & 3;

    let (x, y);
    if mode & 3 != 0 {
        base_quant |= (mode & 3) << 1;
        let b = (mode >> 7) & 3;
        (x, y) = match (mode >> 2) & 3 {
            0 => (b + 4, a + 2),
            1 => (b + 8, a + 2),
            2 => (a + 2, b + 8),
            _ if mode & 0x100 != 0 => ((b & 1) + 2, a + 2),
            _ => (a + 2, (b & 1) + 6),
        };
    } else {
        base_quant |= ((mode >> 2) & 3) << 1;
        if (mode >> 2) & 3 == 0 {
            return None;
        }
        let b = (mode >> 9) & 3;
        (x, y) = match (mode >> 7) & 3 {
            0 => (12, a + 2),
            1 => (a + 2, 12),
            2 => {
                d = 0;
                h = 0;
                (a + 6, b + 6)
            }
            _ => match a {
                0 => (6, 10),
                1 => (10, 6),
                _ => return None,
            },
        };
    }
    finish([x, y, 1], base_quant, h, d)
}

fn decode_3d(mode: u32) -> Option<BlockMode> {
    let mut base_quant = (mode >> 4) & 1;
    let mut h = (mode >> 9) & 1;
    let mut d = (mode >> 10) & 1;
    let a = (mode >> 5) & 3;

    let grid;
    if mode & 3 != 0 {
        base_quant |= (mode & 3) << 1;
        let b = (mode >> 7) & 3;
        let c = (mode >> 2) & 3;
        grid = [a + 2, b + 2, c + 2];
    } else {
        base_quant |= ((mode >> 2) & 3) << 1;
        if (mode >> 2) & 3 == 0 {
            return None;
        }
        let b = (mode >> 9) & 3;
        if (mode >> 7) & 3 != 3 {
            d = 0;
            h = 0;
        }
        grid = match (mode >> 7) & 3 {
            0 => [6, b + 2, a + 2],
            1 => [a + 2, 6, b + 2],
            2 => [a + 2, b + 2, 6],
            _ => match a {
                0 => [6, 2, 2],
                1 => [2, 6, 2],
                2 => [2, 2, 6],
                _ => return None,
            },
        };
    }
    finish(grid, base_quant, h, d)
}

fn finish(grid: [u32; 3], base_quant: u32, h: u32, d: u32) -> Option<BlockMode> {
    let quant = (base_quant - 2 + 6 * h) as usize;
    let count = grid[0] * grid[1] * grid[2] * (d + 1);
    let weight_bits = ise_bits(count, quant);
    if count > MAX_WEIGHTS || !(MIN_WEIGHT_BITS..=MAX_WEIGHT_BITS).contains(&weight_bits) {
        return None;
    }
    Some(BlockMode {
        grid,
        dual_plane: d != 0,
        quant,
        weight_bits,
    })
}

/// Expand a `bits`-wide weight to the 0..=64 range.
pub(crate) fn unquantize_weight(value: u32, bits: u32) -> u32 {
    let mut v = 0;
    let mut filled = 0;
    while filled < 6 {
        let shift = 6 - filled as i32 - bits as i32;
        v |= if shift >= 0 {
            value << shift
        } else {
            value >> -shift
        };
        filled += bits;
    }
    let v = v & 0x3F;
    if v > 32 {
        v + 1
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 0, 0)]
    #[case(1, 1, 64)]
    #[case(2, 1, 21)]
    #[case(2, 2, 43)]
    #[case(3, 7, 64)]
    #[case(4, 8, 35)]
    #[case(5, 16, 34)]
    #[case(5, 31, 64)]
    fn test_unquantize_weight(#[case] bits: u32, #[case] value: u32, #[case] expected: u32) {
        assert_eq!(unquantize_weight(value, bits), expected);
    }

    #[test]
    fn test_ise_bits() {
        assert_eq!(ise_bits(16, 2), 32);
        assert_eq!(ise_bits(5, 1), 8);
        assert_eq!(ise_bits(3, 3), 7);
    }

    #[test]
    fn test_void_extent_pattern() {
        assert!(is_void_extent(0x1FC));
        assert!(is_void_extent(0x3FC));
        assert!(!is_void_extent(0x0FC));
    }

    #[test]
    fn test_decode_known_2d_mode() {
        // 4x4 grid, 4 levels.
        let mode = (2 << 5) | 0b10;
        let bm = decode_block_mode(mode, false).unwrap();
        assert_eq!(bm.grid, [4, 4, 1]);
        assert_eq!(bm.weight_bits, 32);
        assert_eq!(bm.quant, 2);
        assert_eq!(bm.pure_bits(), Some(2));
        assert!(!bm.dual_plane);
    }

    #[test]
    fn test_every_decoded_mode_respects_limits() {
        for is_3d in [false, true] {
            let mut valid = 0;
            for mode in 0..MODE_COUNT {
                if is_void_extent(mode) {
                    continue;
                }
                if let Some(bm) = decode_block_mode(mode, is_3d) {
                    valid += 1;
                    let planes = if bm.dual_plane { 2 } else { 1 };
                    assert!(bm.grid_weights() * planes <= MAX_WEIGHTS);
                    assert!((24..=96).contains(&bm.weight_bits));
                    assert!(bm.grid.iter().all(|&g| g >= 2 || (!is_3d && g == 1)));
                }
            }
            assert!(valid > 100);
        }
    }
}
