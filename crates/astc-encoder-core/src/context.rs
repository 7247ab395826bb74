//! The compression context: one configuration, one codec variant, one
//! worker pool.

use std::fmt;
use std::mem::ManuallyDrop;
use std::num::NonZeroUsize;
use std::thread::{self, JoinHandle};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, trace, warn};

use crate::codec::{Codec, CodecStatus};
use crate::config::Config;
use crate::dispatch::{is_runnable, selected_variant};
use crate::error::{AstcError, Result};
use crate::image::Image;
use crate::simd::kernels_for;
use crate::swizzle::Swizzle;
use crate::variant::Variant;

/// Codec state bound to one [`Config`].
///
/// All resources are released when the context is dropped: the drop
/// returns only after every worker thread has exited. Calls on one
/// context are expected to be made sequentially; use one context per
/// concurrent user.
///
/// # Examples
///
/// ```
/// use astc_encoder_core::{Config, ConfigFlags, Context, DataType, Image, Profile, Swizzle};
///
/// let config = Config::new(Profile::LdrSrgb, 4, 4, 1, 60.0, ConfigFlags::EMPTY).unwrap();
/// let context = Context::new(config, 1).unwrap();
///
/// let image = Image::with_data(DataType::U8, 8, 8, 1, vec![200; 8 * 8 * 4]).unwrap();
/// let blocks = context.compress(&image, &Swizzle::RGBA).unwrap();
/// assert_eq!(blocks.len(), 4 * 16);
///
/// let mut out = Image::new(DataType::U8, 8, 8, 1).unwrap();
/// context.decompress(&blocks, &mut out, &Swizzle::RGBA).unwrap();
/// assert_eq!(out.data(), image.data());
/// ```
pub struct Context {
    config: Config,
    threads: usize,
    variant: Variant,
    codec: Codec,
    pool: WorkerPool,
}

/// A rayon pool whose worker threads are joined when it is dropped.
struct WorkerPool {
    pool: ManuallyDrop<ThreadPool>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn new(threads: usize) -> Result<Self> {
        let mut workers = Vec::with_capacity(threads);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("astc-worker-{i}"))
            .spawn_handler(|worker| {
                let mut builder = thread::Builder::new();
                if let Some(name) = worker.name() {
                    builder = builder.name(name.to_owned());
                }
                if let Some(size) = worker.stack_size() {
                    builder = builder.stack_size(size);
                }
                workers.push(builder.spawn(|| worker.run())?);
                Ok(())
            })
            .build()
            .map_err(|e| AstcError::Resource(e.to_string()))?;
        Ok(Self {
            pool: ManuallyDrop::new(pool),
            workers,
        })
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // SAFETY: `pool` is never used again; dropping it terminates the
        // workers, which are then joined.
        unsafe { ManuallyDrop::drop(&mut self.pool) };
        let workers = self.workers.len();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("codec worker thread panicked");
            }
        }
        debug!(workers, "joined worker threads");
    }
}

enum Stage {
    Setup,
    Compress,
    Decompress,
}

fn translate(status: CodecStatus, stage: Stage) -> AstcError {
    match (status, stage) {
        (CodecStatus::BadLength { expected, actual }, Stage::Decompress) => {
            AstcError::CompressedLength { expected, actual }
        }
        (CodecStatus::BadLength { expected, actual }, _) => AstcError::Compression(format!(
            "output buffer is {actual} bytes, expected {expected}"
        )),
        (CodecStatus::BadSwizzle, Stage::Decompress) => {
            AstcError::Decompression("swizzle cannot be used for decompression".into())
        }
        (CodecStatus::BadSwizzle, _) => AstcError::Compression(
            "the reconstructed Z selector cannot be used for compression".into(),
        ),
        (CodecStatus::BadContext, Stage::Decompress) => {
            AstcError::Decompression("context cannot decompress".into())
        }
        (CodecStatus::BadContext, _) => {
            AstcError::Compression("context was created for decompression only".into())
        }
        (CodecStatus::BadBlockSize, _) => {
            AstcError::Resource("no block mode can encode this footprint".into())
        }
    }
}

impl Context {
    /// Create a context using the process-wide variant.
    ///
    /// `threads == 0` uses one worker per logical core.
    ///
    /// # Errors
    ///
    /// [`AstcError::Resource`] if the codec state or the worker pool cannot
    /// be created.
    pub fn new(config: Config, threads: usize) -> Result<Self> {
        Self::with_variant(config, threads, selected_variant())
    }

    /// Create a context pinned to a specific variant.
    ///
    /// # Errors
    ///
    /// [`AstcError::Resource`] if `variant` is not compiled in or the CPU
    /// lacks one of its required features, in addition to the failures of
    /// [`Context::new`].
    pub fn with_variant(config: Config, threads: usize, variant: Variant) -> Result<Self> {
        if !is_runnable(variant) {
            return Err(AstcError::Resource(format!(
                "variant {variant} is not available on this CPU"
            )));
        }
        let kernels = kernels_for(variant)
            .ok_or_else(|| AstcError::Resource(format!("variant {variant} is not compiled in")))?;
        let codec = Codec::new(&config, kernels).map_err(|s| translate(s, Stage::Setup))?;

        let threads = if threads == 0 {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        } else {
            threads
        };
        let pool = WorkerPool::new(threads)?;

        debug!(
            block_x = config.block_x(),
            block_y = config.block_y(),
            block_z = config.block_z(),
            profile = ?config.profile(),
            threads,
            variant = variant.name(),
            "created context"
        );
        Ok(Self {
            config,
            threads,
            variant,
            codec,
            pool,
        })
    }

    /// The bound configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// The codec variant in use.
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Compress `image` into a stream of 16-byte blocks.
    ///
    /// # Errors
    ///
    /// [`AstcError::Compression`] if the image holds no source pixels, the
    /// swizzle asks for a reconstructed Z, or the context is
    /// decompress-only.
    pub fn compress(&self, image: &Image, swizzle: &Swizzle) -> Result<Vec<u8>> {
        if !image.has_source_data() || image.data().len() != image.byte_len() {
            return Err(AstcError::Compression(
                "image has no source data to compress".into(),
            ));
        }
        let len = self
            .config
            .compressed_len(image.width(), image.height(), image.depth());
        trace!(image = %image, swizzle = %swizzle, len, "compress");

        let mut out = vec![0u8; len];
        self.codec
            .compress_image(&self.pool.pool, image, swizzle, &mut out)
            .map_err(|s| translate(s, Stage::Compress))?;
        Ok(out)
    }

    /// Decompress `data` into `image`, returning it for chaining.
    ///
    /// # Errors
    ///
    /// [`AstcError::CompressedLength`] unless `data` holds exactly one block
    /// per block footprint covering `image`.
    pub fn decompress<'a>(
        &self,
        data: &[u8],
        image: &'a mut Image,
        swizzle: &Swizzle,
    ) -> Result<&'a mut Image> {
        let expected = self
            .config
            .compressed_len(image.width(), image.height(), image.depth());
        if data.len() != expected {
            return Err(AstcError::CompressedLength {
                expected,
                actual: data.len(),
            });
        }
        trace!(image = %image, swizzle = %swizzle, len = data.len(), "decompress");

        self.codec
            .decompress_image(&self.pool.pool, data, image, swizzle)
            .map_err(|s| translate(s, Stage::Decompress))?;
        Ok(image)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("threads", &self.threads)
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        debug!(
            variant = self.variant.name(),
            threads = self.threads,
            "releasing context"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFlags, Profile};
    use crate::error::ErrorKind;
    use crate::image::DataType;

    fn config(flags: ConfigFlags) -> Config {
        Config::new(Profile::Ldr, 4, 4, 1, 10.0, flags).unwrap()
    }

    #[test]
    fn test_zero_threads_uses_all_cores() {
        let context = Context::new(config(ConfigFlags::EMPTY), 0).unwrap();
        assert!(context.threads() >= 1);
        assert_eq!(context.variant(), selected_variant());
    }

    #[test]
    fn test_compress_requires_source_data() {
        let context = Context::new(config(ConfigFlags::EMPTY), 1).unwrap();
        let image = Image::new(DataType::U8, 4, 4, 1).unwrap();
        let err = context.compress(&image, &Swizzle::RGBA).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compression);
    }

    #[test]
    fn test_z_swizzle_rejected_for_compression() {
        let context = Context::new(config(ConfigFlags::EMPTY), 1).unwrap();
        let image = Image::with_data(DataType::U8, 4, 4, 1, vec![9; 64]).unwrap();
        let err = context
            .compress(&image, &Swizzle::parse("rgbz").unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compression);
    }

    #[test]
    fn test_decompress_only_context() {
        let context = Context::new(config(ConfigFlags::DECOMPRESS_ONLY), 1).unwrap();
        let image = Image::with_data(DataType::U8, 4, 4, 1, vec![9; 64]).unwrap();
        let err = context.compress(&image, &Swizzle::RGBA).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compression);

        let mut out = Image::new(DataType::U8, 4, 4, 1).unwrap();
        let block = Context::new(config(ConfigFlags::EMPTY), 1)
            .unwrap()
            .compress(&image, &Swizzle::RGBA)
            .unwrap();
        context.decompress(&block, &mut out, &Swizzle::RGBA).unwrap();
        assert_eq!(out.data(), image.data());
    }

    #[test]
    fn test_decompress_length_mismatch() {
        let context = Context::new(config(ConfigFlags::EMPTY), 1).unwrap();
        let mut out = Image::new(DataType::U8, 8, 8, 1).unwrap();
        let err = context
            .decompress(&[0; 48], &mut out, &Swizzle::RGBA)
            .unwrap_err();
        assert_eq!(
            err,
            AstcError::CompressedLength {
                expected: 64,
                actual: 48
            }
        );
    }

    #[test]
    fn test_every_runnable_variant_decodes_identically() {
        let pixels: Vec<u8> = (0..16 * 16 * 4).map(|i| (i * 7 % 251) as u8).collect();
        let image = Image::with_data(DataType::U8, 16, 16, 1, pixels).unwrap();
        let reference = Context::with_variant(config(ConfigFlags::EMPTY), 1, Variant::Portable)
            .unwrap()
            .compress(&image, &Swizzle::RGBA)
            .unwrap();

        let mut expected = Image::new(DataType::U8, 16, 16, 1).unwrap();
        Context::with_variant(config(ConfigFlags::EMPTY), 1, Variant::Portable)
            .unwrap()
            .decompress(&reference, &mut expected, &Swizzle::RGBA)
            .unwrap();

        for variant in Variant::ALL.into_iter().filter(|&v| is_runnable(v)) {
            let context = Context::with_variant(config(ConfigFlags::EMPTY), 2, variant).unwrap();
            let mut out = Image::new(DataType::U8, 16, 16, 1).unwrap();
            context
                .decompress(&reference, &mut out, &Swizzle::RGBA)
                .unwrap();
            assert_eq!(out.data(), expected.data(), "{variant}");
        }
    }

    #[test]
    fn test_unavailable_variant_is_resource_error() {
        let foreign = if cfg!(target_arch = "x86_64") {
            Variant::Neon
        } else {
            Variant::Avx2
        };
        let err = Context::with_variant(config(ConfigFlags::EMPTY), 1, foreign).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }
}
