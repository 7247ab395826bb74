use astc_encoder_core::{
    AstcError, Config, ConfigFlags, Context, DataType, ErrorKind, Image, Profile, Swizzle,
    SwizzleSelector,
};
use pyo3::create_exception;
use pyo3::exceptions::PyException;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict};

create_exception!(astc_encoder, ASTCError, PyException, "Base class of every codec error.");
create_exception!(astc_encoder, ASTCParseError, ASTCError, "A malformed swizzle string.");
create_exception!(astc_encoder, ASTCConfigError, ASTCError, "An invalid configuration or buffer shape.");
create_exception!(astc_encoder, ASTCResourceError, ASTCError, "The codec state could not be created.");
create_exception!(astc_encoder, ASTCCompressionError, ASTCError, "Compression could not run.");
create_exception!(astc_encoder, ASTCDecompressionError, ASTCError, "Decompression could not run.");

/// Convert an `AstcError` into the exception class for its kind.
fn to_py_err(e: AstcError) -> PyErr {
    let message = e.to_string();
    match e.kind() {
        ErrorKind::Parse => ASTCParseError::new_err(message),
        ErrorKind::Config => ASTCConfigError::new_err(message),
        ErrorKind::Resource => ASTCResourceError::new_err(message),
        ErrorKind::Compression => ASTCCompressionError::new_err(message),
        ErrorKind::Decompression => ASTCDecompressionError::new_err(message),
    }
}

// ---------------------------------------------------------------------------
// ASTCConfig
// ---------------------------------------------------------------------------

/// ASTC configuration.
///
/// Args:
///     profile: An ``ASTCProfile`` value.
///     block_x: Block width in texels.
///     block_y: Block height in texels.
///     block_z: Block depth in texels (1 for 2D).
///     quality: Search quality, an ``ASTCQualityPreset`` value or 0..=100.
///     flags: A combination of ``ASTCConfigFlags`` bits.
#[pyclass(name = "ASTCConfig", module = "astc_encoder", frozen)]
struct PyConfig {
    inner: Config,
}

#[pymethods]
impl PyConfig {
    #[new]
    #[pyo3(signature = (profile, block_x, block_y, block_z = 1, quality = 60.0, flags = 0))]
    fn new(
        profile: u32,
        block_x: u32,
        block_y: u32,
        block_z: u32,
        quality: f32,
        flags: u32,
    ) -> PyResult<Self> {
        let profile = Profile::try_from(profile).map_err(to_py_err)?;
        let inner = Config::builder(profile, block_x, block_y)
            .block_z(block_z)
            .quality(quality)
            .flags(flags)
            .build()
            .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn profile(&self) -> u32 {
        self.inner.profile() as u32
    }

    #[getter]
    fn flags(&self) -> u32 {
        self.inner.flags().bits()
    }

    #[getter]
    fn block_x(&self) -> u32 {
        self.inner.block_x()
    }

    #[getter]
    fn block_y(&self) -> u32 {
        self.inner.block_y()
    }

    #[getter]
    fn block_z(&self) -> u32 {
        self.inner.block_z()
    }

    #[getter]
    fn quality(&self) -> f32 {
        self.inner.quality()
    }

    #[getter]
    fn cw_r_weight(&self) -> f32 {
        self.inner.cw_r_weight()
    }

    #[getter]
    fn cw_g_weight(&self) -> f32 {
        self.inner.cw_g_weight()
    }

    #[getter]
    fn cw_b_weight(&self) -> f32 {
        self.inner.cw_b_weight()
    }

    #[getter]
    fn cw_a_weight(&self) -> f32 {
        self.inner.cw_a_weight()
    }

    #[getter]
    fn a_scale_radius(&self) -> u32 {
        self.inner.a_scale_radius()
    }

    #[getter]
    fn rgbm_m_scale(&self) -> f32 {
        self.inner.rgbm_m_scale()
    }

    #[getter]
    fn tune_candidate_limit(&self) -> u32 {
        self.inner.tune_candidate_limit()
    }

    #[getter]
    fn tune_refinement_limit(&self) -> u32 {
        self.inner.tune_refinement_limit()
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }
}

// ---------------------------------------------------------------------------
// ASTCImage
// ---------------------------------------------------------------------------

/// ASTC image: RGBA texels of one data type.
///
/// Args:
///     data_type: An ``ASTCType`` value.
///     dim_x: Width in texels.
///     dim_y: Height in texels.
///     dim_z: Depth in texels.
///     data: Optional pixel bytes, exactly ``dim_x * dim_y * dim_z * 4``
///         components long. Without data the image is a destination for
///         ``ASTCContext.decompress``.
#[pyclass(name = "ASTCImage", module = "astc_encoder")]
struct PyImage {
    inner: Image,
}

#[pymethods]
impl PyImage {
    #[new]
    #[pyo3(signature = (data_type, dim_x, dim_y, dim_z = 1, data = None))]
    fn new(
        data_type: u32,
        dim_x: u32,
        dim_y: u32,
        dim_z: u32,
        data: Option<Bound<'_, PyBytes>>,
    ) -> PyResult<Self> {
        let data_type = DataType::try_from(data_type).map_err(to_py_err)?;
        let inner = match data {
            Some(bytes) => {
                Image::with_data(data_type, dim_x, dim_y, dim_z, bytes.as_bytes().to_vec())
            }
            None => Image::new(data_type, dim_x, dim_y, dim_z),
        }
        .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn data_type(&self) -> u32 {
        self.inner.data_type() as u32
    }

    #[getter]
    fn dim_x(&self) -> u32 {
        self.inner.width()
    }

    #[getter]
    fn dim_y(&self) -> u32 {
        self.inner.height()
    }

    #[getter]
    fn dim_z(&self) -> u32 {
        self.inner.depth()
    }

    /// The pixel bytes, or None for a destination image not yet filled.
    #[getter]
    fn data<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyBytes>> {
        self.inner
            .has_source_data()
            .then(|| PyBytes::new(py, self.inner.data()))
    }

    #[setter]
    fn set_data(&mut self, data: Bound<'_, PyBytes>) -> PyResult<()> {
        self.inner
            .set_data(data.as_bytes().to_vec())
            .map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }
}

// ---------------------------------------------------------------------------
// ASTCSwizzle
// ---------------------------------------------------------------------------

/// ASTC swizzle: one ``ASTCSwizzleComponentSelector`` per output channel.
#[pyclass(name = "ASTCSwizzle", module = "astc_encoder", frozen)]
struct PySwizzle {
    inner: Swizzle,
}

#[pymethods]
impl PySwizzle {
    #[new]
    #[pyo3(signature = (r = 0, g = 1, b = 2, a = 3))]
    fn new(r: u32, g: u32, b: u32, a: u32) -> PyResult<Self> {
        let select = |v| SwizzleSelector::try_from(v).map_err(to_py_err);
        Ok(Self {
            inner: Swizzle::new(select(r)?, select(g)?, select(b)?, select(a)?),
        })
    }

    /// Parse a four-character swizzle such as ``"rgb1"``.
    #[staticmethod]
    fn from_str(swizzle: &str) -> PyResult<Self> {
        let inner = Swizzle::parse(swizzle).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn r(&self) -> u32 {
        self.inner.r as u32
    }

    #[getter]
    fn g(&self) -> u32 {
        self.inner.g as u32
    }

    #[getter]
    fn b(&self) -> u32 {
        self.inner.b as u32
    }

    #[getter]
    fn a(&self) -> u32 {
        self.inner.a as u32
    }

    fn __str__(&self) -> String {
        self.inner.to_string()
    }

    fn __repr__(&self) -> String {
        let [r, g, b, a] = self.inner.selectors().map(|s| s as u32);
        format!("ASTCSwizzle<({r}, {g}, {b}, {a})>")
    }
}

// ---------------------------------------------------------------------------
// ASTCContext
// ---------------------------------------------------------------------------

/// ASTC codec context bound to one configuration.
///
/// Args:
///     config: The ``ASTCConfig`` to use.
///     threads: Worker threads; 0 uses one per logical core.
///
/// The context releases its worker pool on ``close()``, on leaving a
/// ``with`` block, or when it is garbage collected.
#[pyclass(name = "ASTCContext", module = "astc_encoder")]
struct PyContext {
    config: Py<PyConfig>,
    threads: usize,
    inner: Option<Context>,
}

impl PyContext {
    fn context(&self) -> PyResult<&Context> {
        self.inner
            .as_ref()
            .ok_or_else(|| ASTCResourceError::new_err("context is closed"))
    }
}

#[pymethods]
impl PyContext {
    #[new]
    #[pyo3(signature = (config, threads = 0))]
    fn new(py: Python<'_>, config: Py<PyConfig>, threads: usize) -> PyResult<Self> {
        let settings = config.get().inner.clone();
        let inner = py
            .allow_threads(|| Context::new(settings, threads))
            .map_err(to_py_err)?;
        Ok(Self {
            config,
            threads: inner.threads(),
            inner: Some(inner),
        })
    }

    #[getter]
    fn config(&self, py: Python<'_>) -> Py<PyConfig> {
        self.config.clone_ref(py)
    }

    #[getter]
    fn threads(&self) -> usize {
        self.threads
    }

    /// Name of the SIMD variant this context runs.
    #[getter]
    fn variant(&self) -> PyResult<&'static str> {
        Ok(self.context()?.variant().name())
    }

    /// Compress an image, returning the ASTC blocks as bytes.
    fn compress<'py>(
        &self,
        py: Python<'py>,
        image: PyRef<'py, PyImage>,
        swizzle: PyRef<'py, PySwizzle>,
    ) -> PyResult<Bound<'py, PyBytes>> {
        let context = self.context()?;
        let source = &image.inner;
        let swizzle = swizzle.inner;
        let blocks = py
            .allow_threads(|| context.compress(source, &swizzle))
            .map_err(to_py_err)?;
        Ok(PyBytes::new(py, &blocks))
    }

    /// Decompress ASTC blocks into ``image`` and return it.
    fn decompress<'py>(
        &self,
        py: Python<'py>,
        data: &[u8],
        image: Bound<'py, PyImage>,
        swizzle: PyRef<'py, PySwizzle>,
    ) -> PyResult<Bound<'py, PyImage>> {
        let context = self.context()?;
        let swizzle = swizzle.inner;
        {
            let mut guard = image.borrow_mut();
            let target = &mut guard.inner;
            py.allow_threads(|| context.decompress(data, target, &swizzle).map(|_| ()))
                .map_err(to_py_err)?;
        }
        Ok(image)
    }

    /// Release the worker pool and codec state. Further calls fail.
    fn close(&mut self) {
        self.inner = None;
    }

    fn __enter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    #[pyo3(signature = (_exc_type = None, _exc_value = None, _traceback = None))]
    fn __exit__(
        &mut self,
        _exc_type: Option<PyObject>,
        _exc_value: Option<PyObject>,
        _traceback: Option<PyObject>,
    ) -> bool {
        self.close();
        false
    }

    fn __repr__(&self) -> &'static str {
        "ASTCContext"
    }
}

// ---------------------------------------------------------------------------
// Integer enumerations
// ---------------------------------------------------------------------------

/// Colour profiles.
#[pyclass(name = "ASTCProfile", module = "astc_encoder", frozen)]
struct PyProfile;

#[pymethods]
impl PyProfile {
    #[classattr]
    const LDR_SRGB: u32 = Profile::LdrSrgb as u32;
    #[classattr]
    const LDR: u32 = Profile::Ldr as u32;
    #[classattr]
    const HDR_RGB_LDR_A: u32 = Profile::HdrRgbLdrA as u32;
    #[classattr]
    const HDR: u32 = Profile::Hdr as u32;
}

/// Search quality presets.
#[pyclass(name = "ASTCQualityPreset", module = "astc_encoder", frozen)]
struct PyQualityPreset;

#[pymethods]
impl PyQualityPreset {
    #[classattr]
    const FASTEST: f32 = 0.0;
    #[classattr]
    const FAST: f32 = 10.0;
    #[classattr]
    const MEDIUM: f32 = 60.0;
    #[classattr]
    const THOROUGH: f32 = 98.0;
    #[classattr]
    const VERYTHOROUGH: f32 = 99.0;
    #[classattr]
    const EXHAUSTIVE: f32 = 100.0;
}

/// Configuration flag bits.
#[pyclass(name = "ASTCConfigFlags", module = "astc_encoder", frozen)]
struct PyConfigFlags;

#[pymethods]
impl PyConfigFlags {
    #[classattr]
    const MAP_NORMAL: u32 = ConfigFlags::MAP_NORMAL.bits();
    #[classattr]
    const USE_DECODE_UNORM8: u32 = ConfigFlags::USE_DECODE_UNORM8.bits();
    #[classattr]
    const USE_ALPHA_WEIGHT: u32 = ConfigFlags::USE_ALPHA_WEIGHT.bits();
    #[classattr]
    const USE_PERCEPTUAL: u32 = ConfigFlags::USE_PERCEPTUAL.bits();
    #[classattr]
    const DECOMPRESS_ONLY: u32 = ConfigFlags::DECOMPRESS_ONLY.bits();
    #[classattr]
    const SELF_DECOMPRESS_ONLY: u32 = ConfigFlags::SELF_DECOMPRESS_ONLY.bits();
    #[classattr]
    const MAP_RGBM: u32 = ConfigFlags::MAP_RGBM.bits();
}

/// Image component data types.
#[pyclass(name = "ASTCType", module = "astc_encoder", frozen)]
struct PyDataType;

#[pymethods]
impl PyDataType {
    #[classattr]
    const U8: u32 = DataType::U8 as u32;
    #[classattr]
    const F16: u32 = DataType::F16 as u32;
    #[classattr]
    const F32: u32 = DataType::F32 as u32;
}

/// Swizzle component selectors.
#[pyclass(name = "ASTCSwizzleComponentSelector", module = "astc_encoder", frozen)]
struct PySwizzleComponentSelector;

#[pymethods]
impl PySwizzleComponentSelector {
    #[classattr]
    const R: u32 = SwizzleSelector::R as u32;
    #[classattr]
    const G: u32 = SwizzleSelector::G as u32;
    #[classattr]
    const B: u32 = SwizzleSelector::B as u32;
    #[classattr]
    const A: u32 = SwizzleSelector::A as u32;
    #[classattr]
    const ZERO: u32 = SwizzleSelector::Zero as u32;
    #[classattr]
    const ONE: u32 = SwizzleSelector::One as u32;
    #[classattr]
    const Z: u32 = SwizzleSelector::Z as u32;
}

// ---------------------------------------------------------------------------
// Module functions
// ---------------------------------------------------------------------------

/// Name of the SIMD variant selected for this process.
#[pyfunction]
fn selected_variant() -> &'static str {
    astc_encoder_core::selected_variant().name()
}

/// Compare a source image against its reconstruction.
///
/// Args:
///     hdr: Use an HDR peak instead of 255.
///     normal: Also compute angular errors between normals.
///     input_components: Meaningful source channels, 1..=4.
///     a: The source image.
///     b: The reconstructed image.
///     fstop_lo: Lowest exposure for the multi-exposure PSNR.
///     fstop_hi: Highest exposure for the multi-exposure PSNR.
///
/// Returns:
///     A dict of metric name to value.
#[pyfunction]
#[pyo3(signature = (hdr, normal, input_components, a, b, fstop_lo = -10, fstop_hi = 10))]
#[allow(clippy::too_many_arguments)]
fn compute_error_metrics<'py>(
    py: Python<'py>,
    hdr: bool,
    normal: bool,
    input_components: u32,
    a: PyRef<'py, PyImage>,
    b: PyRef<'py, PyImage>,
    fstop_lo: i32,
    fstop_hi: i32,
) -> PyResult<Bound<'py, PyDict>> {
    let (a, b) = (&a.inner, &b.inner);
    let m = py
        .allow_threads(|| {
            astc_encoder_core::compute_error_metrics(
                hdr,
                normal,
                input_components,
                a,
                b,
                fstop_lo,
                fstop_hi,
            )
        })
        .map_err(to_py_err)?;

    let dict = PyDict::new(py);
    dict.set_item("psnr", m.psnr)?;
    dict.set_item("psnr_rgb", m.psnr_rgb)?;
    dict.set_item("psnr_alpha", m.psnr_alpha)?;
    dict.set_item("peak_rgb", m.peak_rgb)?;
    dict.set_item("mpsnr_rgb", m.mpsnr_rgb)?;
    dict.set_item("log_rmse_rgb", m.log_rmse_rgb)?;
    dict.set_item("mean_angular_errorsum", m.mean_angular_errorsum)?;
    dict.set_item("worst_angular_errorsum", m.worst_angular_errorsum)?;
    Ok(dict)
}

/// ASTC texture compression (Rust-powered).
#[pymodule]
fn astc_encoder(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = m.py();
    m.add_class::<PyConfig>()?;
    m.add_class::<PyImage>()?;
    m.add_class::<PySwizzle>()?;
    m.add_class::<PyContext>()?;
    m.add_class::<PyProfile>()?;
    m.add_class::<PyQualityPreset>()?;
    m.add_class::<PyConfigFlags>()?;
    m.add_class::<PyDataType>()?;
    m.add_class::<PySwizzleComponentSelector>()?;

    m.add("ASTCError", py.get_type::<ASTCError>())?;
    m.add("ASTCParseError", py.get_type::<ASTCParseError>())?;
    m.add("ASTCConfigError", py.get_type::<ASTCConfigError>())?;
    m.add("ASTCResourceError", py.get_type::<ASTCResourceError>())?;
    m.add("ASTCCompressionError", py.get_type::<ASTCCompressionError>())?;
    m.add("ASTCDecompressionError", py.get_type::<ASTCDecompressionError>())?;

    m.add_function(wrap_pyfunction!(selected_variant, m)?)?;
    m.add_function(wrap_pyfunction!(compute_error_metrics, m)?)?;
    Ok(())
}
