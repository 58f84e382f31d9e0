//! Rendering pipeline: markup layout, paint commands, render target, raster

pub mod layout;
pub mod paint;
pub mod raster;
pub mod target;

pub use raster::{PreviewRasterizer, RasterImage, RasterOptions, Rasterizer, SoftwareRasterizer};
pub use target::{RenderTarget, TargetTracker};
