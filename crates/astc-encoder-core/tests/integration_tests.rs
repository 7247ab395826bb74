use astc_encoder_core::{
    compute_error_metrics, is_runnable, selected_variant, AstcError, Config, ConfigFlags, Context,
    DataType, ErrorKind, Image, Profile, QualityPreset, Swizzle, SwizzleSelector, Variant,
};
use rstest::rstest;

// ---------------------------------------------------------------------------
// Helpers: synthetic RGBA images
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

fn solid_image(width: u32, height: u32, depth: u32, rgba: [u8; 4]) -> Image {
    let pixels = rgba.repeat((width * height * depth) as usize);
    Image::with_data(DataType::U8, width, height, depth, pixels).expect("solid image")
}

fn context(profile: Profile, x: u32, y: u32, z: u32) -> Context {
    let config = Config::new(profile, x, y, z, QualityPreset::Medium.value(), ConfigFlags::EMPTY)
        .expect("valid config");
    Context::new(config, 2).expect("context")
}

fn roundtrip(context: &Context, image: &Image) -> Image {
    let blocks = context.compress(image, &Swizzle::RGBA).expect("compress");
    let mut out = Image::new(
        image.data_type(),
        image.width(),
        image.height(),
        image.depth(),
    )
    .expect("destination");
    context
        .decompress(&blocks, &mut out, &Swizzle::RGBA)
        .expect("decompress");
    out
}

// ===========================================================================
// End-to-end scenario
// ===========================================================================

#[test]
fn srgb_64x64_medium_roundtrip() {
    let context = context(Profile::LdrSrgb, 4, 4, 1);
    let image = gradient_image(64, 64);

    let blocks = context.compress(&image, &Swizzle::RGBA).unwrap();
    assert_eq!(blocks.len(), 16 * 16 * 16);

    let mut out = Image::new(DataType::U8, 64, 64, 1).unwrap();
    let out = context.decompress(&blocks, &mut out, &Swizzle::RGBA).unwrap();
    assert_eq!((out.width(), out.height(), out.depth()), (64, 64, 1));
    assert_eq!(out.data().len(), 64 * 64 * 4);

    let metrics = compute_error_metrics(false, false, 4, &image, out, 0, 0).unwrap();
    assert!(metrics.psnr_rgb > 30.0, "psnr_rgb = {}", metrics.psnr_rgb);
    assert!(metrics.psnr_alpha.is_infinite());
}

#[test]
fn decompression_is_deterministic() {
    let context = context(Profile::Ldr, 6, 6, 1);
    let blocks = context.compress(&gradient_image(50, 30), &Swizzle::RGBA).unwrap();

    let mut first = Image::new(DataType::U8, 50, 30, 1).unwrap();
    let mut second = Image::new(DataType::U8, 50, 30, 1).unwrap();
    context.decompress(&blocks, &mut first, &Swizzle::RGBA).unwrap();
    context.decompress(&blocks, &mut second, &Swizzle::RGBA).unwrap();
    assert_eq!(first.data(), second.data());
}

#[test]
fn partial_edge_blocks() {
    let context = context(Profile::Ldr, 5, 4, 1);
    let image = solid_image(11, 9, 1, [12, 34, 56, 78]);
    let blocks = context.compress(&image, &Swizzle::RGBA).unwrap();
    // ceil(11/5) * ceil(9/4) blocks.
    assert_eq!(blocks.len(), 3 * 3 * 16);
    assert_eq!(roundtrip(&context, &image).data(), image.data());
}

// ===========================================================================
// Footprint validation
// ===========================================================================

#[rstest]
#[case(3, 3, 1)]
#[case(7, 7, 1)]
#[case(13, 13, 1)]
#[case(2, 2, 2)]
#[case(7, 7, 7)]
fn unsupported_footprints_are_config_errors(#[case] x: u32, #[case] y: u32, #[case] z: u32) {
    let err = Config::new(Profile::Ldr, x, y, z, 60.0, ConfigFlags::EMPTY).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(err, AstcError::InvalidBlockSize { x, y, z });
}

#[rstest]
#[case(3, 3, 3)]
#[case(4, 4, 4)]
#[case(6, 6, 6)]
fn three_dimensional_footprints(#[case] x: u32, #[case] y: u32, #[case] z: u32) {
    let context = context(Profile::Ldr, x, y, z);
    let image = solid_image(8, 8, 8, [200, 100, 50, 255]);
    let blocks = context.compress(&image, &Swizzle::RGBA).unwrap();
    let per_axis = |n: u32| 8u32.div_ceil(n) as usize;
    assert_eq!(blocks.len(), per_axis(x) * per_axis(y) * per_axis(z) * 16);
    assert_eq!(roundtrip(&context, &image).data(), image.data());
}

#[test]
fn three_dimensional_gradient() {
    let context = context(Profile::Ldr, 4, 4, 4);
    let mut pixels = Vec::new();
    for z in 0..8u8 {
        for _y in 0..8u8 {
            for x in 0..8u8 {
                let v = x * 12 + z * 8;
                pixels.extend_from_slice(&[v, v, v, 255]);
            }
        }
    }
    let image = Image::with_data(DataType::U8, 8, 8, 8, pixels).unwrap();
    let out = roundtrip(&context, &image);
    let metrics = compute_error_metrics(false, false, 3, &image, &out, 0, 0).unwrap();
    assert!(metrics.psnr_rgb > 25.0, "psnr_rgb = {}", metrics.psnr_rgb);
}

// ===========================================================================
// Swizzle grammar
// ===========================================================================

#[rstest]
#[case("10ZB", [SwizzleSelector::One, SwizzleSelector::Zero, SwizzleSelector::Z, SwizzleSelector::B])]
#[case("razg", [SwizzleSelector::R, SwizzleSelector::A, SwizzleSelector::Z, SwizzleSelector::G])]
fn swizzle_parse(#[case] input: &str, #[case] expected: [SwizzleSelector; 4]) {
    assert_eq!(Swizzle::parse(input).unwrap().selectors(), expected);
}

#[rstest]
#[case("R")]
#[case("LLLL")]
#[case("rgbaa")]
fn swizzle_parse_errors(#[case] input: &str) {
    assert_eq!(Swizzle::parse(input).unwrap_err().kind(), ErrorKind::Parse);
}

#[test]
fn normal_map_z_reconstruction() {
    let context = context(Profile::Ldr, 4, 4, 1);
    let image = solid_image(4, 4, 1, [128, 0, 0, 128]);
    let blocks = context.compress(&image, &Swizzle::RGBA).unwrap();

    let mut out = Image::new(DataType::U8, 4, 4, 1).unwrap();
    context
        .decompress(&blocks, &mut out, &Swizzle::parse("raz1").unwrap())
        .unwrap();
    assert_eq!(&out.data()[..4], &[128, 128, 255, 255]);
}

// ===========================================================================
// Buffer and length enforcement
// ===========================================================================

#[test]
fn short_image_buffer_rejected() {
    let err = Image::with_data(DataType::U8, 4, 4, 1, vec![0; 63]).unwrap_err();
    assert_eq!(
        err,
        AstcError::BufferSize {
            expected: 64,
            actual: 63
        }
    );
}

#[test]
fn compress_without_data_fails() {
    let context = context(Profile::Ldr, 4, 4, 1);
    let image = Image::new(DataType::U8, 16, 16, 1).unwrap();
    let err = context.compress(&image, &Swizzle::RGBA).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compression);
}

#[test]
fn set_data_makes_image_compressible() {
    let context = context(Profile::Ldr, 4, 4, 1);
    let mut image = Image::new(DataType::U8, 4, 4, 1).unwrap();
    image.set_data(vec![7; 64]).unwrap();
    assert_eq!(context.compress(&image, &Swizzle::RGBA).unwrap().len(), 16);
}

#[rstest]
#[case(0)]
#[case(4080)]
#[case(4112)]
fn decompress_length_mismatch(#[case] len: usize) {
    let context = context(Profile::LdrSrgb, 4, 4, 1);
    let mut out = Image::new(DataType::U8, 64, 64, 1).unwrap();
    let err = context
        .decompress(&vec![0; len], &mut out, &Swizzle::RGBA)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decompression);
}

#[test]
fn z_swizzle_cannot_compress() {
    let context = context(Profile::Ldr, 4, 4, 1);
    let image = solid_image(4, 4, 1, [1, 2, 3, 4]);
    let err = context
        .compress(&image, &Swizzle::parse("rgbz").unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compression);
}

#[test]
fn decompress_only_context_refuses_compress() {
    let config = Config::new(Profile::Ldr, 4, 4, 1, 60.0, ConfigFlags::DECOMPRESS_ONLY).unwrap();
    let context = Context::new(config, 1).unwrap();
    let err = context
        .compress(&solid_image(4, 4, 1, [0; 4]), &Swizzle::RGBA)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compression);
}

// ===========================================================================
// Floating-point images
// ===========================================================================

#[test]
fn f16_constant_roundtrip() {
    let context = context(Profile::Ldr, 4, 4, 1);
    let texel = [0.5f32, 0.25, 1.0, 1.0].map(half::f16::from_f32);
    let pixels: Vec<u8> = bytemuck::cast_slice(&texel.repeat(8 * 8)).to_vec();
    let image = Image::with_data(DataType::F16, 8, 8, 1, pixels).unwrap();

    let out = roundtrip(&context, &image);
    let decoded = out
        .data()
        .chunks_exact(2)
        .map(|b| half::f16::from_ne_bytes([b[0], b[1]]));
    for (d, e) in decoded.zip(texel.iter().cycle()) {
        assert!((d.to_f32() - e.to_f32()).abs() < 1e-3, "{d} vs {e}");
    }
}

#[test]
fn f32_hdr_constant_roundtrip() {
    let context = context(Profile::Hdr, 6, 6, 1);
    let texel = [4.0f32, 0.25, 1.5, 1.0];
    let pixels: Vec<u8> = bytemuck::cast_slice(&texel.repeat(12 * 12)).to_vec();
    let image = Image::with_data(DataType::F32, 12, 12, 1, pixels).unwrap();

    let out = roundtrip(&context, &image);
    assert_eq!(out.data(), image.data());
}

#[test]
fn f32_ldr_gradient() {
    let context = context(Profile::Ldr, 4, 4, 1);
    let mut texels = Vec::new();
    for y in 0..16 {
        for x in 0..16 {
            let v = (x + y) as f32 / 30.0;
            texels.extend_from_slice(&[v, v, v, 1.0]);
        }
    }
    let pixels: Vec<u8> = bytemuck::cast_slice(&texels).to_vec();
    let image = Image::with_data(DataType::F32, 16, 16, 1, pixels).unwrap();
    let out = roundtrip(&context, &image);
    let metrics = compute_error_metrics(false, false, 4, &image, &out, 0, 0).unwrap();
    assert!(metrics.psnr > 30.0, "psnr = {}", metrics.psnr);
}

// ===========================================================================
// Resource lifecycle
// ===========================================================================

#[test]
fn failed_call_leaves_context_usable() {
    let context = context(Profile::Ldr, 4, 4, 1);
    let mut out = Image::new(DataType::U8, 8, 8, 1).unwrap();
    assert!(context.decompress(&[0; 5], &mut out, &Swizzle::RGBA).is_err());
    let image = solid_image(8, 8, 1, [9, 9, 9, 9]);
    assert_eq!(roundtrip(&context, &image).data(), image.data());
}

// ===========================================================================
// Variant dispatch
// ===========================================================================

#[test]
fn selected_variant_is_runnable() {
    let variant = selected_variant();
    assert!(is_runnable(variant));
    assert!(is_runnable(Variant::Portable));
    assert_eq!(selected_variant(), variant);
}

#[test]
fn portable_and_selected_variants_agree() {
    let config = Config::new(Profile::Ldr, 8, 8, 1, 60.0, ConfigFlags::EMPTY).unwrap();
    let image = gradient_image(32, 32);
    let portable = Context::with_variant(config.clone(), 1, Variant::Portable).unwrap();
    let selected = Context::new(config, 1).unwrap();

    let blocks = portable.compress(&image, &Swizzle::RGBA).unwrap();
    let mut a = Image::new(DataType::U8, 32, 32, 1).unwrap();
    let mut b = Image::new(DataType::U8, 32, 32, 1).unwrap();
    portable.decompress(&blocks, &mut a, &Swizzle::RGBA).unwrap();
    selected.decompress(&blocks, &mut b, &Swizzle::RGBA).unwrap();
    assert_eq!(a.data(), b.data());
}

// ===========================================================================
// Error metrics
// ===========================================================================

#[test]
fn error_metrics_against_reconstruction() {
    let context = context(Profile::Ldr, 8, 8, 1);
    let image = gradient_image(32, 32);
    let out = roundtrip(&context, &image);

    let exact = compute_error_metrics(false, false, 4, &image, &image, -2, 2).unwrap();
    assert!(exact.psnr.is_infinite());

    let lossy = compute_error_metrics(false, false, 4, &image, &out, -2, 2).unwrap();
    assert!(lossy.psnr.is_finite());
    assert!(lossy.psnr_rgb > 20.0);
    assert_eq!(lossy.peak_rgb, 255.0);
}

#[test]
fn error_metrics_reject_mismatched_images() {
    let a = gradient_image(8, 8);
    let b = gradient_image(8, 4);
    let err = compute_error_metrics(false, false, 4, &a, &b, 0, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}
