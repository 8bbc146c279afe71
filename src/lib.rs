//! agrireport
//!
//! Exports a crop-recommendation results view to a paginated PDF document.
//!
//! The pipeline is a straight line: locate the capture region, clone it with
//! print-friendly style overrides, rasterize the clone, slice the raster into
//! page-sized bands and write the PDF.
//!
//! # Features
//!
//! - **client** (default): blocking HTTP client for the prediction backend
//!
//! # Example
//!
//! ```no_run
//! use agrireport::{CaptureRegion, ExportConfig, ExportState, Exporter, SoftwareRasterizer};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let html = std::fs::read_to_string("results.html")?;
//! let mut region = CaptureRegion::from_html(&html, "results-to-export")?;
//!
//! let exporter = Exporter::new(SoftwareRasterizer::new(), ExportConfig::default());
//! let state = ExportState::new();
//! let outcome = exporter.export(&state, Some(&mut region), Some("Pune")).await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod capture;
pub mod document;
pub mod dom;
pub mod export;
pub mod paginate;
pub mod rendering;
pub mod report;

// HTTP client for the prediction backend
#[cfg(feature = "client")]
pub mod client;

pub use capture::{CaptureRegion, OverrideSet, StyleOverride};
pub use document::ExportDocument;
pub use dom::Color;
pub use export::{ExportOutcome, ExportReport, ExportState, Exporter};
pub use paginate::{PageGeometry, PageSlice, Pagination};
pub use rendering::raster::MAX_RASTER_DIMENSION;
pub use rendering::{RasterImage, RasterOptions, Rasterizer, SoftwareRasterizer};
pub use report::{CropInputs, Prediction, ResultsView};

#[cfg(feature = "client")]
pub use client::{ClientConfig, CurrentWeather, ForecastEntry, PredictionClient, WeatherForecast};

/// Configuration for an export
///
/// The defaults reproduce the results panel export: A4 portrait pages with
/// 10 mm margins, a 2x raster over white, the built-in print rules and files
/// named `agripredict_report_<city>.pdf` in the current directory.
///
/// The raster is capped at [`MAX_RASTER_DIMENSION`] device pixels per edge,
/// so the tallest capture that can be exported is that limit divided by
/// `pixel_ratio` (8192 CSS px at the default 2x, about seven A4 pages at the
/// default width). Taller captures fail with a render error; lower the
/// ratio to export them. See [`ExportConfig::max_capture_height`].
///
/// # Examples
///
/// ```
/// let cfg = agrireport::ExportConfig::default();
/// assert_eq!(cfg.file_prefix, "agripredict_report");
/// assert_eq!(cfg.pixel_ratio, 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// First part of the output file name
    pub file_prefix: String,
    /// Label used when none is given
    pub fallback_label: String,
    /// Page size and margins
    pub geometry: PageGeometry,
    /// Layout width of the capture region
    pub viewport: Viewport,
    /// Device pixels per CSS pixel
    pub pixel_ratio: f32,
    /// Fill behind the capture
    pub background: Color,
    /// Print rules applied to the clone before rasterizing
    pub overrides: OverrideSet,
    /// Directory the document is written to
    pub output_dir: PathBuf,
    /// Font file for text; system fonts are searched when unset
    pub font_path: Option<PathBuf>,
}

impl ExportConfig {
    pub fn raster_options(&self) -> RasterOptions {
        RasterOptions {
            pixel_ratio: self.pixel_ratio,
            background: self.background,
            viewport: self.viewport,
        }
    }

    /// Tallest capture, in CSS pixels, that fits under the raster size limit
    pub fn max_capture_height(&self) -> u32 {
        (MAX_RASTER_DIMENSION as f32 / self.pixel_ratio).floor() as u32
    }

    /// Check the settings that can be wrong before any export runs
    pub fn validate(&self) -> Result<()> {
        self.geometry.validate()?;
        if !self.pixel_ratio.is_finite() || self.pixel_ratio <= 0.0 {
            return Err(Error::ConfigError(format!("invalid pixel ratio {}", self.pixel_ratio)));
        }
        if self.viewport.width == 0 {
            return Err(Error::ConfigError("viewport width must be positive".into()));
        }
        if self.viewport.width > self.max_capture_height() {
            return Err(Error::ConfigError(format!(
                "viewport of {} px at {}x exceeds the {} px raster limit",
                self.viewport.width, self.pixel_ratio, MAX_RASTER_DIMENSION
            )));
        }
        if self.file_prefix.trim().is_empty() {
            return Err(Error::ConfigError("file prefix must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_prefix: "agripredict_report".to_string(),
            fallback_label: "custom".to_string(),
            geometry: PageGeometry::default(),
            viewport: Viewport::default(),
            pixel_ratio: 2.0,
            background: Color::WHITE,
            overrides: OverrideSet::default(),
            output_dir: PathBuf::from("."),
            font_path: None,
        }
    }
}

/// Layout viewport; the capture is laid out at this width in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 800 }
    }
}

/// Build the software rasterizer the config asks for
pub fn new_rasterizer(config: &ExportConfig) -> Result<SoftwareRasterizer> {
    match &config.font_path {
        Some(path) => SoftwareRasterizer::with_font_file(path),
        None => Ok(SoftwareRasterizer::new()),
    }
}
