use giftcert::rendering::{RenderTarget, TargetTracker};
use giftcert::{
    CertificateDescriptor, CertificateExporter, CertificateLabels, ExportConfig, RasterOptions, Rasterizer,
    SoftwareRasterizer, Surface,
};

fn software() -> Option<SoftwareRasterizer> {
    match SoftwareRasterizer::from_font_path(None) {
        Ok(r) => Some(r),
        Err(e) => {
            println!("{}; skipping.", e);
            None
        }
    }
}

#[test]
fn visual_text_rows_are_centered() {
    let Some(raster) = software() else { return };
    // ASCII only so the check does not depend on the font covering the currency sign
    let d = CertificateDescriptor::new("Anna").with_caption("Happy birthday");
    let target = RenderTarget::acquire(&d, &CertificateLabels::default(), Surface::default(), &TargetTracker::new())
        .expect("acquire");
    let img = raster.rasterize(&target, &RasterOptions::default()).expect("raster");

    // Bright (text) pixels must straddle the vertical center line
    let (mut min_x, mut max_x) = (u32::MAX, 0u32);
    for (x, _, p) in img.pixels.enumerate_pixels() {
        if p.0.iter().all(|c| *c > 240) {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
        }
    }
    assert!(min_x < max_x, "Expected rendered text pixels");
    let mid = (min_x + max_x) / 2;
    assert!((mid as i64 - 1200).abs() < 40, "text center {} too far from 1200", mid);

    // Background corner: white under the scrim
    assert_eq!(img.pixels.get_pixel(0, 0).0, [229, 229, 229]);
}

#[tokio::test]
async fn visual_pdf_export_with_system_font() {
    if software().is_none() {
        return;
    }
    let exporter = CertificateExporter::new(ExportConfig::default()).expect("exporter");
    let handle = exporter
        .render(&CertificateDescriptor::new("Anna").with_denomination(5000).with_caption("Hi"))
        .await
        .expect("render");
    let doc = exporter.document(handle).expect("doc");
    assert!(doc.bytes.starts_with(b"%PDF"));
    assert_eq!(doc.sha256_hex().len(), 64);
}
