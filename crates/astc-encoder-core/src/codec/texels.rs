//! Moving texels between image buffers and block-local working arrays.

use crate::image::{DataType, Image, CHANNELS};
use crate::simd::{Kernels, Texel};
use crate::swizzle::{Swizzle, SwizzleSelector};

use super::DecodeMode;

/// Convert one row of packed components to floats in `row`.
fn read_row(src: &[u8], data_type: DataType, kernels: &Kernels, row: &mut Vec<f32>) {
    let components = src.len() / data_type.element_size();
    row.clear();
    row.resize(components, 0.0);
    match data_type {
        DataType::U8 => {
            for (dst, &v) in row.iter_mut().zip(src) {
                *dst = f32::from(v) / 255.0;
            }
        }
        DataType::F16 => kernels.widen_f16(src, row),
        DataType::F32 => {
            for (dst, bytes) in row.iter_mut().zip(src.chunks_exact(4)) {
                *dst = bytemuck::pod_read_unaligned::<f32>(bytes);
            }
        }
    }
}

/// Every texel of `image` as floats, in raster order.
pub(crate) fn read_image(image: &Image, kernels: &Kernels) -> Vec<Texel> {
    let row_bytes = image.width() as usize * CHANNELS * image.data_type().element_size();
    let mut row = Vec::new();
    let mut out = Vec::with_capacity(image.texel_count());
    for src in image.data().chunks_exact(row_bytes) {
        read_row(src, image.data_type(), kernels, &mut row);
        out.extend(row.chunks_exact(CHANNELS).map(|c| [c[0], c[1], c[2], c[3]]));
    }
    out
}

#[inline]
fn select_input(texel: &[f32], sel: SwizzleSelector) -> f32 {
    match sel {
        SwizzleSelector::R => texel[0],
        SwizzleSelector::G => texel[1],
        SwizzleSelector::B => texel[2],
        SwizzleSelector::A => texel[3],
        SwizzleSelector::Zero => 0.0,
        // Z is refused before compression starts.
        SwizzleSelector::One | SwizzleSelector::Z => 1.0,
    }
}

/// Gather one block starting at texel `origin`, replicating edge texels
/// where the block overhangs the image.
pub(crate) fn load_block(
    image: &Image,
    kernels: &Kernels,
    origin: [u32; 3],
    block: [u32; 3],
    swizzle: &Swizzle,
    out: &mut [Texel],
    row: &mut Vec<f32>,
) {
    let data_type = image.data_type();
    let texel_bytes = CHANNELS * data_type.element_size();
    let (width, height, depth) = (image.width(), image.height(), image.depth());
    let row_bytes = width as usize * texel_bytes;
    let selectors = swizzle.selectors();

    let x0 = origin[0];
    let span = (width - x0).min(block[0]) as usize;
    let mut texels = out.chunks_exact_mut(block[0] as usize);
    for z in 0..block[2] {
        let iz = (origin[2] + z).min(depth - 1) as usize;
        for y in 0..block[1] {
            let iy = (origin[1] + y).min(height - 1) as usize;
            let start = (iz * height as usize + iy) * row_bytes + x0 as usize * texel_bytes;
            read_row(
                &image.data()[start..start + span * texel_bytes],
                data_type,
                kernels,
                row,
            );
            let Some(dst_row) = texels.next() else {
                return;
            };
            for (x, dst) in dst_row.iter_mut().enumerate() {
                let src = &row[x.min(span - 1) * CHANNELS..][..CHANNELS];
                for (c, sel) in selectors.iter().enumerate() {
                    dst[c] = select_input(src, *sel);
                }
            }
        }
    }
}

/// Output value for one channel of a decoded texel.
#[inline]
fn select_output(texel: &Texel, sel: SwizzleSelector) -> f32 {
    match sel {
        SwizzleSelector::R => texel[0],
        SwizzleSelector::G => texel[1],
        SwizzleSelector::B => texel[2],
        SwizzleSelector::A => texel[3],
        SwizzleSelector::Zero => 0.0,
        SwizzleSelector::One => 1.0,
        SwizzleSelector::Z => reconstruct_z(texel[0], texel[3]),
    }
}

/// Normal Z from X stored in red and Y stored in alpha.
pub(crate) fn reconstruct_z(r: f32, a: f32) -> f32 {
    let x = r * 2.0 - 1.0;
    let y = a * 2.0 - 1.0;
    (1.0 - x * x - y * y).max(0.0).sqrt() * 0.5 + 0.5
}

/// Quantise a decoded value to 8 bits.
#[inline]
pub(crate) fn to_unorm8(value: f32, unorm8: bool) -> u8 {
    let c = (value.clamp(0.0, 1.0) * 65535.0).round() as u32;
    if unorm8 {
        (c >> 8) as u8
    } else {
        ((c * 255 + 32767) / 65535) as u8
    }
}

/// Write layer `layer` of a decoded block into a band of image rows.
///
/// `band` starts at the first image row covered by the block and may be
/// shorter than a full block at the bottom edge.
#[allow(clippy::too_many_arguments)]
pub(crate) fn store_block_layer(
    band: &mut [u8],
    row_bytes: usize,
    data_type: DataType,
    kernels: &Kernels,
    decoded: &[Texel],
    block: [u32; 3],
    layer: u32,
    x0: u32,
    width: u32,
    swizzle: &Swizzle,
    mode: DecodeMode,
    row: &mut Vec<f32>,
) {
    let texel_bytes = CHANNELS * data_type.element_size();
    let span = (width - x0).min(block[0]) as usize;
    let rows = (band.len() / row_bytes).min(block[1] as usize);
    let selectors = swizzle.selectors();
    let layer_start = (layer * block[0] * block[1]) as usize;

    for y in 0..rows {
        let src = &decoded[layer_start + y * block[0] as usize..][..span];
        row.clear();
        for texel in src {
            row.extend(selectors.iter().map(|&sel| select_output(texel, sel)));
        }

        let start = y * row_bytes + x0 as usize * texel_bytes;
        let dst = &mut band[start..start + span * texel_bytes];
        match data_type {
            DataType::U8 => {
                for (d, &v) in dst.iter_mut().zip(row.iter()) {
                    *d = to_unorm8(v, mode.unorm8);
                }
            }
            DataType::F16 => kernels.narrow_f16(row, dst),
            DataType::F32 => dst.copy_from_slice(bytemuck::cast_slice(row.as_slice())),
        }
    }
}
