/// Rasterizers turning a render target into pixels

use std::path::{Path, PathBuf};

use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage, RgbaImage};
use rusttype::{point, Font, Scale};

use super::paint::PaintCommand;
use super::target::RenderTarget;
use crate::{RenderError, Result};

/// Environment variable consulted for a font when none is configured
pub const FONT_ENV: &str = "GIFTCERT_FONT";

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    /// Device pixels per logical unit
    pub scale: u32,
    /// Opaque color under everything
    pub backdrop: [u8; 3],
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self { scale: 2, backdrop: [255, 255, 255] }
    }
}

/// Rasterized certificate. Always opaque.
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub pixels: RgbImage,
}

impl RasterImage {
    pub fn new(pixels: RgbImage) -> Self {
        Self { width: pixels.width(), height: pixels.height(), pixels }
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut out = std::io::Cursor::new(Vec::new());
        self.pixels.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    /// `data:image/png;base64,...`
    pub fn to_data_uri(&self) -> Result<String> {
        let png = self.to_png()?;
        Ok(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        ))
    }

    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
            encoder.encode_image(&self.pixels)?;
        }
        Ok(out)
    }
}

/// Converts a composed render target into pixels.
///
/// Implementations must be shareable across the blocking pool.
pub trait Rasterizer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn rasterize(&self, target: &RenderTarget, options: &RasterOptions) -> Result<RasterImage>;
}

/// Load a TrueType font from `path`, or from `GIFTCERT_FONT`, or from a list
/// of common system locations.
pub fn load_font(path: Option<&Path>) -> Result<Font<'static>> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(p) = path {
        candidates.push(p.to_path_buf());
    } else {
        if let Ok(p) = std::env::var(FONT_ENV) {
            candidates.push(PathBuf::from(p));
        }
        candidates.extend(SYSTEM_FONTS.iter().map(PathBuf::from));
    }

    for candidate in &candidates {
        let Ok(bytes) = std::fs::read(candidate) else {
            continue;
        };
        match Font::try_from_vec(bytes) {
            Some(font) => {
                log::debug!("using font {}", candidate.display());
                return Ok(font);
            }
            None => log::warn!("not a usable font: {}", candidate.display()),
        }
    }

    Err(RenderError::Rasterization(match path {
        Some(p) => format!("cannot load font {}", p.display()),
        None => format!("no font found; set {} or configure font_path", FONT_ENV),
    }))
}

/// Canvas shared by the rasterizers: opaque RGB with alpha blending.
struct Canvas {
    img: RgbImage,
    scale: f32,
}

impl Canvas {
    fn new(target: &RenderTarget, options: &RasterOptions) -> Result<Self> {
        if options.scale == 0 {
            return Err(RenderError::Rasterization("scale must be at least 1".into()));
        }
        let w = target.surface.width.saturating_mul(options.scale);
        let h = target.surface.height.saturating_mul(options.scale);
        if w == 0 || h == 0 {
            return Err(RenderError::Rasterization("empty surface".into()));
        }
        Ok(Self {
            img: RgbImage::from_pixel(w, h, Rgb(options.backdrop)),
            scale: options.scale as f32,
        })
    }

    fn blend(&mut self, x: i32, y: i32, rgb: [u8; 3], alpha: f32) {
        if x < 0 || y < 0 || alpha <= 0.0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.img.width() || y >= self.img.height() {
            return;
        }
        let a = alpha.min(1.0);
        let inv = 1.0 - a;
        let dst = self.img.get_pixel_mut(x, y);
        for c in 0..3 {
            dst.0[c] = (rgb[c] as f32 * a + dst.0[c] as f32 * inv).round() as u8;
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, rgba: (u8, u8, u8, u8)) {
        let s = self.scale;
        let x0 = (x * s).round() as i32;
        let y0 = (y * s).round() as i32;
        let x1 = ((x + width) * s).round() as i32;
        let y1 = ((y + height) * s).round() as i32;
        let alpha = rgba.3 as f32 / 255.0;
        for py in y0.max(0)..y1.min(self.img.height() as i32) {
            for px in x0.max(0)..x1.min(self.img.width() as i32) {
                self.blend(px, py, [rgba.0, rgba.1, rgba.2], alpha);
            }
        }
    }

    /// Draw `image` cover-fit and centered into the box.
    fn draw_cover(&mut self, image: &RgbaImage, x: f32, y: f32, width: f32, height: f32) -> Result<()> {
        let s = self.scale;
        let bw = (width * s).round() as u32;
        let bh = (height * s).round() as u32;
        if bw == 0 || bh == 0 {
            return Ok(());
        }
        let fitted = cover_fit(image, bw, bh)?;
        let ox = (x * s).round() as i32;
        let oy = (y * s).round() as i32;
        for (px, py, p) in fitted.enumerate_pixels() {
            self.blend(ox + px as i32, oy + py as i32, [p.0[0], p.0[1], p.0[2]], p.0[3] as f32 / 255.0);
        }
        Ok(())
    }
}

/// Cover-fit `image` into `w`x`h`: crop the centered region that stays
/// visible at cover scale, then resize only that region.
///
/// Output size never depends on the source aspect ratio, so very tall or very
/// wide backgrounds cost no more than the target box.
pub fn cover_fit(image: &RgbaImage, w: u32, h: u32) -> Result<RgbaImage> {
    let (iw, ih) = image.dimensions();
    if iw == 0 || ih == 0 {
        return Err(RenderError::Rasterization("background image is empty".into()));
    }
    if w == 0 || h == 0 {
        return Err(RenderError::Rasterization("cover box is empty".into()));
    }
    let factor = (w as f64 / iw as f64).max(h as f64 / ih as f64);
    let cw = ((w as f64 / factor).round() as u32).clamp(1, iw);
    let ch = ((h as f64 / factor).round() as u32).clamp(1, ih);
    let visible = imageops::crop_imm(image, (iw - cw) / 2, (ih - ch) / 2, cw, ch).to_image();
    Ok(imageops::resize(&visible, w, h, FilterType::Triangle))
}

/// Full rasterizer: background, scrim and anti-aliased text.
pub struct SoftwareRasterizer {
    font: Font<'static>,
}

impl SoftwareRasterizer {
    pub fn new(font: Font<'static>) -> Self {
        Self { font }
    }

    pub fn from_font_path(path: Option<&Path>) -> Result<Self> {
        load_font(path).map(Self::new)
    }

    /// Advance width of `text` in device pixels, letter spacing after each glyph.
    pub fn text_width(&self, px: f32, text: &str, letter_spacing: f32) -> f32 {
        let scale = Scale::uniform(px);
        text.chars()
            .map(|ch| self.font.glyph(ch).scaled(scale).h_metrics().advance_width + letter_spacing)
            .sum()
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_text(
        &self,
        canvas: &mut Canvas,
        center_x: f32,
        top: f32,
        line_height: f32,
        font_size: f32,
        letter_spacing: f32,
        rgba: (u8, u8, u8, u8),
        text: &str,
    ) {
        let s = canvas.scale;
        let px = font_size * s;
        let spacing = letter_spacing * s;
        let scale = Scale::uniform(px);
        let v_metrics = self.font.v_metrics(scale);
        let glyph_height = v_metrics.ascent - v_metrics.descent;
        let baseline = top * s + (line_height * s - glyph_height) / 2.0 + v_metrics.ascent;
        let mut caret = center_x * s - self.text_width(px, text, spacing) / 2.0;
        let color = [rgba.0, rgba.1, rgba.2];
        let alpha = rgba.3 as f32 / 255.0;

        for ch in text.chars() {
            let glyph = self.font.glyph(ch).scaled(scale).positioned(point(caret, baseline));
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, v| {
                    canvas.blend(gx as i32 + bb.min.x, gy as i32 + bb.min.y, color, v * alpha);
                });
            }
            caret += glyph.unpositioned().h_metrics().advance_width + spacing;
        }
    }
}

impl Rasterizer for SoftwareRasterizer {
    fn name(&self) -> &str {
        "software"
    }

    fn rasterize(&self, target: &RenderTarget, options: &RasterOptions) -> Result<RasterImage> {
        let mut canvas = Canvas::new(target, options)?;
        for cmd in &target.commands {
            match cmd {
                PaintCommand::Background { x, y, width, height } => {
                    if let Some(bg) = &target.background {
                        canvas.draw_cover(bg, *x, *y, *width, *height)?;
                    }
                }
                PaintCommand::SolidRect { x, y, width, height, rgba } => {
                    canvas.fill_rect(*x, *y, *width, *height, *rgba)
                }
                PaintCommand::Text { center_x, y, line_height, font_size, letter_spacing, rgba, text, .. } => {
                    self.draw_text(&mut canvas, *center_x, *y, *line_height, *font_size, *letter_spacing, *rgba, text)
                }
            }
        }
        Ok(RasterImage::new(canvas.img))
    }
}

/// Font-free rasterizer that draws text lines as solid bars.
///
/// Useful for layout previews and wherever no font is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreviewRasterizer;

impl PreviewRasterizer {
    /// Average glyph advance as a fraction of the font size
    const ADVANCE: f32 = 0.55;
}

impl Rasterizer for PreviewRasterizer {
    fn name(&self) -> &str {
        "preview"
    }

    fn rasterize(&self, target: &RenderTarget, options: &RasterOptions) -> Result<RasterImage> {
        let mut canvas = Canvas::new(target, options)?;
        for cmd in &target.commands {
            match cmd {
                PaintCommand::Background { x, y, width, height } => {
                    if let Some(bg) = &target.background {
                        canvas.draw_cover(bg, *x, *y, *width, *height)?;
                    }
                }
                PaintCommand::SolidRect { x, y, width, height, rgba } => {
                    canvas.fill_rect(*x, *y, *width, *height, *rgba)
                }
                PaintCommand::Text { center_x, y, line_height, font_size, letter_spacing, rgba, text, .. } => {
                    let chars = text.chars().count() as f32;
                    let width = chars * (font_size * Self::ADVANCE + letter_spacing);
                    let bar = font_size * 0.7;
                    canvas.fill_rect(center_x - width / 2.0, y + (line_height - bar) / 2.0, width, bar, *rgba);
                }
            }
        }
        Ok(RasterImage::new(canvas.img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{CertificateDescriptor, CertificateLabels};
    use crate::rendering::target::TargetTracker;
    use crate::{BackgroundSource, Surface};

    fn target(d: &CertificateDescriptor) -> RenderTarget {
        RenderTarget::acquire(d, &CertificateLabels::default(), Surface::default(), &TargetTracker::new())
            .expect("acquire")
    }

    fn png_of(color: [u8; 4], w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, image::Rgba(color));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).expect("encode");
        out.into_inner()
    }

    #[test]
    fn preview_raster_is_oversampled_and_opaque() {
        let t = target(&CertificateDescriptor::new("Anna").with_denomination(1000));
        let img = PreviewRasterizer.rasterize(&t, &RasterOptions::default()).expect("raster");
        assert_eq!((img.width, img.height), (2400, 1600));
        // corner: white backdrop under a 10% black scrim
        let corner = img.pixels.get_pixel(0, 0).0;
        assert_eq!(corner, [229, 229, 229]);
    }

    #[test]
    fn transparent_background_shows_white_backdrop() {
        let bg = BackgroundSource::Bytes(png_of([0, 0, 0, 0], 30, 20));
        let t = target(&CertificateDescriptor::new("Anna").with_background(bg));
        let img = PreviewRasterizer.rasterize(&t, &RasterOptions { scale: 1, ..Default::default() }).expect("raster");
        assert_eq!(img.pixels.get_pixel(5, 5).0, [229, 229, 229]);
    }

    #[test]
    fn opaque_background_covers_the_surface() {
        let bg = BackgroundSource::Bytes(png_of([200, 0, 0, 255], 40, 10));
        let t = target(&CertificateDescriptor::new("Anna").with_background(bg));
        let img = PreviewRasterizer.rasterize(&t, &RasterOptions { scale: 1, ..Default::default() }).expect("raster");
        // red under 10% black: 200 * 0.898 ~ 180
        let p = img.pixels.get_pixel(1199, 799).0;
        assert_eq!(p[1], 0);
        assert!(p[0] > 170 && p[0] < 190);
    }

    #[test]
    fn cover_fit_crops_to_requested_box() {
        let img = RgbaImage::from_pixel(300, 100, image::Rgba([1, 2, 3, 255]));
        let fitted = cover_fit(&img, 120, 80).expect("fit");
        assert_eq!(fitted.dimensions(), (120, 80));
    }

    #[test]
    fn cover_fit_keeps_the_center_of_a_wide_image() {
        // left third red, middle third green, right third blue
        let img = RgbaImage::from_fn(300, 100, |x, _| match x / 100 {
            0 => image::Rgba([255, 0, 0, 255]),
            1 => image::Rgba([0, 255, 0, 255]),
            _ => image::Rgba([0, 0, 255, 255]),
        });
        let fitted = cover_fit(&img, 90, 90).expect("fit");
        assert_eq!(fitted.dimensions(), (90, 90));
        assert_eq!(fitted.get_pixel(45, 45).0, [0, 255, 0, 255]);
        assert_eq!(fitted.get_pixel(2, 45).0, [0, 255, 0, 255]);
    }

    #[test]
    fn cover_fit_handles_extreme_aspect_ratios() {
        let tall = RgbaImage::from_pixel(1, 100_000, image::Rgba([9, 8, 7, 255]));
        let fitted = cover_fit(&tall, 2400, 1600).expect("tall");
        assert_eq!(fitted.dimensions(), (2400, 1600));
        assert_eq!(fitted.get_pixel(1200, 800).0, [9, 8, 7, 255]);

        let wide = RgbaImage::from_pixel(100_000, 1, image::Rgba([7, 8, 9, 255]));
        let fitted = cover_fit(&wide, 2400, 1600).expect("wide");
        assert_eq!(fitted.dimensions(), (2400, 1600));
        assert_eq!(fitted.get_pixel(0, 0).0, [7, 8, 9, 255]);
    }

    #[test]
    fn zero_scale_is_rejected() {
        let t = target(&CertificateDescriptor::new("Anna"));
        let err = PreviewRasterizer
            .rasterize(&t, &RasterOptions { scale: 0, ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, RenderError::Rasterization(_)));
    }

    #[test]
    fn data_uri_is_png() {
        let img = RasterImage::new(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let uri = img.to_data_uri().expect("uri");
        assert!(uri.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn software_raster_draws_text_when_font_available() {
        let Ok(raster) = SoftwareRasterizer::from_font_path(None) else {
            println!("No system font found; skipping.");
            return;
        };
        let t = target(&CertificateDescriptor::new("Anna").with_denomination(5000));
        let img = raster.rasterize(&t, &RasterOptions::default()).expect("raster");
        // White text over the grey scrim somewhere on the amount row
        let bright = img.pixels.pixels().filter(|p| p.0[0] > 240).count();
        assert!(bright > 0, "expected text pixels");
    }
}
