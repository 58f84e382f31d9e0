//! Gift certificate payment step
//!
//! Composes a gift certificate from a [`CertificateDescriptor`], rasterizes it
//! and exports it as a single-page PDF, driven by the payment-confirmation
//! step of a purchase wizard.
//!
//! # Features
//!
//! - **Render pipeline**: markup → layout → paint commands → raster → PDF
//! - **Pluggable rasterizers**: [`SoftwareRasterizer`] (TrueType text) or
//!   [`PreviewRasterizer`] (no fonts needed), or your own [`Rasterizer`]
//! - **Step lifecycle**: cancellable settle delay, explicit failed state with
//!   retry, documents released on teardown
//!
//! # Example
//!
//! ```no_run
//! use giftcert::{CertificateDescriptor, CertificateExporter, ExportConfig, PaymentStep};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let exporter = Arc::new(CertificateExporter::new(ExportConfig::default())?);
//! let descriptor = CertificateDescriptor::new("Anna")
//!     .with_denomination(5000)
//!     .with_caption("Happy birthday");
//!
//! let mut step = PaymentStep::new(exporter, descriptor);
//! step.activate();
//! step.wait_settled().await;
//! let path = step.download(std::path::Path::new("."))?;
//! println!("saved {}", path.display());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{RenderError, Result};

pub mod compose;
pub mod descriptor;
pub mod document;
pub mod export;
pub mod indicator;
pub mod rendering;
pub mod step;

pub use descriptor::{BackgroundSource, CertificateDescriptor, CertificateLabels, Locale};
pub use document::{DocumentHandle, DocumentStore, ExportedDocument};
pub use export::CertificateExporter;
pub use indicator::{StepIndicator, StepState};
pub use rendering::{PreviewRasterizer, RasterImage, RasterOptions, Rasterizer, SoftwareRasterizer};
pub use step::{PaymentStep, ProcessingState, StepView};

/// Configuration for certificate export
///
/// Defaults reproduce the storefront certificate:
/// - 1200×800 surface rasterized at 2× over white
/// - 500ms settle delay before rendering starts
/// - rasterization bounded to 30s (`0` disables the bound)
///
/// # Examples
///
/// ```
/// let cfg = giftcert::ExportConfig::default();
/// assert_eq!(cfg.surface.width, 1200);
/// assert_eq!(cfg.scale, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Logical size of the certificate surface
    pub surface: Surface,
    /// Oversampling factor applied when rasterizing
    pub scale: u32,
    /// Opaque backdrop color under the certificate
    pub backdrop: [u8; 3],
    /// Delay between step activation and render start, in milliseconds
    pub settle_delay_ms: u64,
    /// Rasterization timeout in milliseconds (0 => disabled)
    pub raster_timeout_ms: u64,
    /// JPEG quality of the image embedded in the PDF
    pub jpeg_quality: u8,
    /// TrueType font for certificate text; system fonts are probed when unset
    pub font_path: Option<PathBuf>,
    /// Fixed texts printed on the certificate
    pub labels: CertificateLabels,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            surface: Surface::default(),
            scale: 2,
            backdrop: [255, 255, 255],
            settle_delay_ms: 500,
            raster_timeout_ms: 30_000,
            jpeg_quality: 92,
            font_path: None,
            labels: CertificateLabels::default(),
        }
    }
}

impl ExportConfig {
    /// Load a JSON config; missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(text).map_err(|e| RenderError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.surface.width == 0 || self.surface.height == 0 {
            return Err(RenderError::Config("surface must not be empty".into()));
        }
        if self.scale == 0 || self.scale > 8 {
            return Err(RenderError::Config(format!("scale {} out of range 1..=8", self.scale)));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(RenderError::Config(format!("jpeg_quality {} out of range 1..=100", self.jpeg_quality)));
        }
        Ok(())
    }

    pub fn raster_options(&self) -> RasterOptions {
        RasterOptions { scale: self.scale, backdrop: self.backdrop }
    }
}

/// Certificate surface dimensions in logical units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
}

impl Default for Surface {
    fn default() -> Self {
        Self { width: 1200, height: 800 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExportConfig::default();
        assert_eq!(config.surface, Surface { width: 1200, height: 800 });
        assert_eq!(config.settle_delay_ms, 500);
        assert_eq!(config.backdrop, [255, 255, 255]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_config() {
        let cfg = ExportConfig::from_json(r#"{"scale": 1, "labels": {"sender_prefix": "От:"}}"#)
            .expect("config");
        assert_eq!(cfg.scale, 1);
        assert_eq!(cfg.labels.sender_prefix, "От:");
        assert_eq!(cfg.labels.brand, "UVI JEWELRY");
        assert_eq!(cfg.raster_timeout_ms, 30_000);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            ExportConfig::from_json(r#"{"scale": 0}"#),
            Err(RenderError::Config(_))
        ));
        assert!(matches!(ExportConfig::from_json("not json"), Err(RenderError::Config(_))));
    }
}
