//! ASTC round trip - compress and decompress a synthetic image
//!
//! Run with: cargo run --example roundtrip

use astc_encoder_core::{
    compute_error_metrics, selected_variant, Config, ConfigFlags, Context, DataType, Image,
    Profile, QualityPreset, Swizzle,
};

fn main() {
    println!("=== ASTC Round Trip ===\n");
    println!("Codec variant: {}\n", selected_variant());

    // 96x64 RGBA gradient with a soft alpha ramp.
    let (width, height) = (96u32, 64u32);
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / (width - 1)) as u8;
            let g = (y * 255 / (height - 1)) as u8;
            let a = 255 - (x * 64 / width) as u8;
            pixels.extend_from_slice(&[r, g, 160, a]);
        }
    }
    let image = Image::with_data(DataType::U8, width, height, 1, pixels).expect("valid image");
    println!("1. Source image: {image}");

    for &(bx, by) in &[(4u32, 4u32), (6, 6), (8, 8), (12, 12)] {
        let config = Config::new(
            Profile::LdrSrgb,
            bx,
            by,
            1,
            QualityPreset::Medium.value(),
            ConfigFlags::EMPTY,
        )
        .expect("supported footprint");
        let context = Context::new(config, 0).expect("context");

        let blocks = context
            .compress(&image, &Swizzle::RGBA)
            .expect("compression failed");
        let mut out = Image::new(DataType::U8, width, height, 1).expect("destination");
        context
            .decompress(&blocks, &mut out, &Swizzle::RGBA)
            .expect("decompression failed");

        let metrics =
            compute_error_metrics(false, false, 4, &image, &out, 0, 0).expect("metrics");
        let bpp = blocks.len() as f64 * 8.0 / f64::from(width * height);
        println!(
            "2. {bx}x{by}: {} bytes ({bpp:.2} bpp), PSNR {:.2} dB (rgb {:.2}, alpha {:.2})",
            blocks.len(),
            metrics.psnr,
            metrics.psnr_rgb,
            metrics.psnr_alpha,
        );
    }

    println!("\n=== Done ===");
}
