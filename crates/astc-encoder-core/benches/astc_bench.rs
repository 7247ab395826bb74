use astc_encoder_core::simd::kernels_for;
use astc_encoder_core::{
    is_runnable, Config, ConfigFlags, Context, DataType, Image, Profile, QualityPreset, Swizzle,
    Variant,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn gradient_image(width: u32, height: u32) -> Image {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = ((x as f64 / width as f64) * 255.0) as u8;
            let g = ((y as f64 / height as f64) * 255.0) as u8;
            pixels.extend_from_slice(&[r, g, 128, 255]);
        }
    }
    Image::with_data(DataType::U8, width, height, 1, pixels).expect("gradient image")
}

fn context(x: u32, y: u32, quality: QualityPreset) -> Context {
    let config = Config::new(Profile::LdrSrgb, x, y, 1, quality.value(), ConfigFlags::EMPTY)
        .expect("valid config");
    Context::new(config, 0).expect("context")
}

// ---------------------------------------------------------------------------
// Compression benchmarks
// ---------------------------------------------------------------------------

fn bench_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("compress");
    group.sample_size(20);

    let context = context(4, 4, QualityPreset::Fast);
    for &size in &[64u32, 256, 512] {
        let image = gradient_image(size, size);
        group.throughput(Throughput::Elements(u64::from(size) * u64::from(size)));
        group.bench_with_input(BenchmarkId::new("4x4", size), &image, |b, image| {
            b.iter(|| context.compress(image, &Swizzle::RGBA).unwrap());
        });
    }

    group.finish();
}

fn bench_compress_quality(c: &mut Criterion) {
    let mut group = c.benchmark_group("compress_quality");
    group.sample_size(20);

    let image = gradient_image(128, 128);
    for &(name, quality) in &[
        ("fastest", QualityPreset::Fastest),
        ("medium", QualityPreset::Medium),
        ("exhaustive", QualityPreset::Exhaustive),
    ] {
        let context = context(6, 6, quality);
        group.bench_with_input(BenchmarkId::new("6x6", name), &image, |b, image| {
            b.iter(|| context.compress(image, &Swizzle::RGBA).unwrap());
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Decompression benchmarks
// ---------------------------------------------------------------------------

fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompress");

    for &(x, y) in &[(4u32, 4u32), (8, 8), (12, 12)] {
        let context = context(x, y, QualityPreset::Fast);
        let blocks = context
            .compress(&gradient_image(256, 256), &Swizzle::RGBA)
            .expect("compress ok");
        let mut out = Image::new(DataType::U8, 256, 256, 1).expect("destination");
        group.throughput(Throughput::Elements(256 * 256));
        group.bench_with_input(
            BenchmarkId::new("256x256", format!("{x}x{y}")),
            &blocks,
            |b, blocks| {
                b.iter(|| {
                    context
                        .decompress(blocks, &mut out, &Swizzle::RGBA)
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Kernel benchmarks, one per runnable variant
// ---------------------------------------------------------------------------

fn bench_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("weighted_error");

    let a: Vec<[f32; 4]> = (0..4096).map(|i| [i as f32 / 4096.0; 4]).collect();
    let b: Vec<[f32; 4]> = a.iter().map(|t| t.map(|v| 1.0 - v)).collect();
    let weights = vec![[1.0f32; 4]; a.len()];

    for variant in Variant::ALL.into_iter().filter(|&v| is_runnable(v)) {
        let Some(kernels) = kernels_for(variant) else {
            continue;
        };
        group.bench_function(variant.name(), |bench| {
            bench.iter(|| kernels.weighted_error(&a, &b, &weights));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Criterion harness
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_compress,
    bench_compress_quality,
    bench_decompress,
    bench_kernels,
);
criterion_main!(benches);
