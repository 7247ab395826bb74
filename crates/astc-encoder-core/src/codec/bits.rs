//! Bit-level access to 128-bit blocks.
//!
//! A block is handled as a little-endian `u128`. Header and colour data
//! grow upward from bit 0; weight data grows downward from bit 127, which
//! is the same as writing it upward into the bit-reversed block.

/// Read `count` bits starting at bit `start`.
#[inline]
pub(crate) fn read_bits(block: u128, start: u32, count: u32) -> u32 {
    debug_assert!(count <= 32 && start + count <= 128);
    if count == 0 {
        return 0;
    }
    ((block >> start) as u32) & mask(count)
}

#[inline]
fn mask(count: u32) -> u32 {
    if count >= 32 {
        u32::MAX
    } else {
        (1 << count) - 1
    }
}

/// Sequential writer into a 128-bit block.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct BitWriter {
    bits: u128,
    pos: u32,
}

impl BitWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append the low `count` bits of `value`.
    pub(crate) fn write(&mut self, value: u32, count: u32) {
        debug_assert!(self.pos + count <= 128);
        if count > 0 {
            self.bits |= u128::from(value & mask(count)) << self.pos;
            self.pos += count;
        }
    }

    pub(crate) fn position(&self) -> u32 {
        self.pos
    }

    pub(crate) fn finish(self) -> u128 {
        self.bits
    }
}

/// Sequential reader from a 128-bit block.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BitReader {
    bits: u128,
    pos: u32,
}

impl BitReader {
    pub(crate) fn new(bits: u128, start: u32) -> Self {
        Self { bits, pos: start }
    }

    pub(crate) fn read(&mut self, count: u32) -> u32 {
        let value = read_bits(self.bits, self.pos, count);
        self.pos += count;
        value
    }
}
