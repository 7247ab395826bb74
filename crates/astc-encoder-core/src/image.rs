//! Uncompressed image buffers.
//!
//! Pixels are always stored as four interleaved RGBA components of one
//! [`DataType`], x fastest, then y, then z slices. Channels a source image
//! does not have are synthesised by the swizzle, not by this buffer.

use std::fmt;

use crate::error::{AstcError, Result};

/// Component storage format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DataType {
    /// Unorm 8-bit data per component.
    U8 = 0,
    /// 16-bit float per component.
    F16 = 1,
    /// 32-bit float per component.
    F32 = 2,
}

impl DataType {
    /// Bytes per component.
    pub const fn element_size(self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::F16 => 2,
            DataType::F32 => 4,
        }
    }
}

impl TryFrom<u32> for DataType {
    type Error = AstcError;

    fn try_from(value: u32) -> Result<Self> {
        Ok(match value {
            0 => DataType::U8,
            1 => DataType::F16,
            2 => DataType::F32,
            _ => {
                return Err(AstcError::InvalidEnumValue {
                    what: "data type",
                    value,
                })
            }
        })
    }
}

/// Number of components stored per texel.
pub const CHANNELS: usize = 4;

/// Bytes needed for an RGBA image of the given shape.
pub fn required_len(data_type: DataType, width: u32, height: u32, depth: u32) -> Result<usize> {
    let invalid = |reason| AstcError::InvalidDimensions {
        width,
        height,
        depth,
        reason,
    };
    if width == 0 || height == 0 || depth == 0 {
        return Err(invalid("dimensions must be > 0"));
    }
    (width as u64)
        .checked_mul(height as u64)
        .and_then(|v| v.checked_mul(depth as u64))
        .and_then(|v| v.checked_mul((CHANNELS * data_type.element_size()) as u64))
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| invalid("dimensions overflow buffer size calculation"))
}

/// An owned RGBA pixel buffer with a declared shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    data_type: DataType,
    width: u32,
    height: u32,
    depth: u32,
    data: Vec<u8>,
    has_source_data: bool,
}

impl Image {
    /// A zero-filled destination image.
    ///
    /// The buffer is allocated at full size, but it does not count as
    /// source pixels: compressing it fails until [`set_data`](Self::set_data)
    /// is called or a decompression fills it.
    pub fn new(data_type: DataType, width: u32, height: u32, depth: u32) -> Result<Self> {
        let len = required_len(data_type, width, height, depth)?;
        Ok(Self {
            data_type,
            width,
            height,
            depth,
            data: vec![0; len],
            has_source_data: false,
        })
    }

    /// An image over caller-supplied pixels.
    ///
    /// # Errors
    ///
    /// [`AstcError::BufferSize`] unless `data.len()` equals
    /// `width * height * depth * 4 * element_size`.
    pub fn with_data(
        data_type: DataType,
        width: u32,
        height: u32,
        depth: u32,
        data: Vec<u8>,
    ) -> Result<Self> {
        let mut image = Self::new_unfilled(data_type, width, height, depth)?;
        image.set_data(data)?;
        Ok(image)
    }

    fn new_unfilled(data_type: DataType, width: u32, height: u32, depth: u32) -> Result<Self> {
        required_len(data_type, width, height, depth)?;
        Ok(Self {
            data_type,
            width,
            height,
            depth,
            data: Vec::new(),
            has_source_data: false,
        })
    }

    /// Replace the pixel buffer, re-validating its length.
    pub fn set_data(&mut self, data: Vec<u8>) -> Result<()> {
        let expected = self.byte_len();
        if data.len() != expected {
            return Err(AstcError::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        self.data = data;
        self.has_source_data = true;
        Ok(())
    }

    /// Component data type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Width in texels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in texels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Depth in texels (1 for 2D images).
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of texels.
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    /// Expected buffer length in bytes.
    pub fn byte_len(&self) -> usize {
        self.texel_count() * CHANNELS * self.data_type.element_size()
    }

    /// The raw pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the image and return its pixel bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Whether the buffer holds real pixels rather than the initial zero fill.
    pub fn has_source_data(&self) -> bool {
        self.has_source_data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn mark_filled(&mut self) {
        self.has_source_data = true;
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ASTCImage({}, {}, {}, {})",
            self.width, self.height, self.depth, self.data_type as u32
        )
    }
}
