//! Context teardown. Kept in its own test binary so no other test's
//! threads run while the process thread count is sampled.
#![cfg(target_os = "linux")]

use astc_encoder_core::{Config, ConfigFlags, Context, DataType, Image, Profile, Swizzle};

const WORKERS: usize = 8;

/// Threads in this process, from `/proc/self/status`.
fn thread_count() -> usize {
    std::fs::read_to_string("/proc/self/status")
        .expect("read /proc/self/status")
        .lines()
        .find_map(|line| line.strip_prefix("Threads:"))
        .and_then(|count| count.trim().parse().ok())
        .expect("Threads: line")
}

fn gradient_image(width: u32, height: u32) -> Image {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[(x * 16) as u8, (y * 16) as u8, 128, 255]);
        }
    }
    Image::with_data(DataType::U8, width, height, 1, pixels).expect("gradient image")
}

#[test]
fn dropping_a_context_joins_its_workers() {
    let image = gradient_image(16, 16);
    let swizzle = Swizzle::parse("rgba").unwrap();
    let baseline = thread_count();

    for _ in 0..20 {
        let config = Config::new(Profile::LdrSrgb, 4, 4, 1, 10.0, ConfigFlags::EMPTY).unwrap();
        let context = Context::new(config, WORKERS).unwrap();
        assert_eq!(thread_count(), baseline + WORKERS);

        let blocks = context.compress(&image, &swizzle).unwrap();
        let mut out = Image::new(DataType::U8, 16, 16, 1).unwrap();
        context.decompress(&blocks, &mut out, &swizzle).unwrap();

        drop(context);
        assert_eq!(thread_count(), baseline);
    }
}

