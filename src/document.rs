//! Single-page PDF export and the in-memory document store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use base64::Engine as _;
use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use sha2::{Digest, Sha256};

use crate::rendering::raster::RasterImage;
use crate::{RenderError, Result};

/// A4 in PDF points, landscape
pub const A4_LANDSCAPE: (f32, f32) = (841.89, 595.28);

const IMAGE_NAME: &str = "Im0";

/// PDF text string: UTF-16BE with byte order mark.
fn text_string(text: &str) -> Vec<u8> {
    let mut out = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

/// Wrap `raster` as a JPEG image filling one A4 landscape page.
pub fn assemble_pdf(raster: &RasterImage, jpeg_quality: u8, title: &str) -> Result<Vec<u8>> {
    let (page_w, page_h) = A4_LANDSCAPE;
    let jpeg = raster.to_jpeg(jpeg_quality)?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => raster.width as i64,
            "Height" => raster.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    );
    image.allows_compression = false;
    let image_id = doc.add_object(image);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![page_w.into(), 0.into(), 0.into(), page_h.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { IMAGE_NAME => image_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(text_string(title), StringFormat::Hexadecimal),
        "Producer" => Object::string_literal("giftcert"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

/// Opaque reference to a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A finished certificate document.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub bytes: Arc<[u8]>,
    pub created_at: DateTime<Utc>,
    /// `certificate_<timestamp>.pdf`
    pub file_name: String,
}

impl ExportedDocument {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    /// `data:application/pdf;base64,...`
    pub fn data_uri(&self) -> String {
        format!(
            "data:application/pdf;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Session-scoped store of exported documents, keyed by handle.
///
/// Documents stay until released or until the last clone of the store is
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    docs: Arc<Mutex<HashMap<u64, Arc<ExportedDocument>>>>,
    next_id: Arc<AtomicU64>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, doc: ExportedDocument) -> DocumentHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(doc));
        DocumentHandle(id)
    }

    pub fn get(&self, handle: DocumentHandle) -> Result<Arc<ExportedDocument>> {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle.0)
            .cloned()
            .ok_or(RenderError::UnknownHandle(handle.0))
    }

    /// Drop the document; returns whether it was present.
    pub fn release(&self, handle: DocumentHandle) -> bool {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.0)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn raster() -> RasterImage {
        RasterImage::new(RgbImage::from_pixel(48, 32, Rgb([10, 200, 30])))
    }

    #[test]
    fn pdf_has_one_landscape_a4_page_with_one_image() {
        let bytes = assemble_pdf(&raster(), 90, "Gift certificate").expect("pdf");
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).expect("reload");
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = *pages.get(&1).expect("page 1");
        let page = doc.get_dictionary(page_id).expect("page dict");
        let media = page.get(b"MediaBox").and_then(Object::as_array).expect("media box");
        let w = media[2].as_float().expect("width");
        let h = media[3].as_float().expect("height");
        assert!(w > h);
        assert!((w - 841.89).abs() < 0.01);

        let xobjects = page
            .get(b"Resources")
            .and_then(Object::as_dict)
            .and_then(|r| r.get(b"XObject"))
            .and_then(Object::as_dict)
            .expect("xobjects");
        assert_eq!(xobjects.len(), 1);
        let image_ref = xobjects.get(b"Im0").and_then(Object::as_reference).expect("image ref");
        let image = doc.get_object(image_ref).and_then(Object::as_stream).expect("image stream");
        assert_eq!(image.dict.get(b"Width").and_then(Object::as_i64).expect("width"), 48);
        assert_eq!(image.dict.get(b"Height").and_then(Object::as_i64).expect("height"), 32);
    }

    #[test]
    fn title_is_utf16_text_string() {
        assert_eq!(text_string("A\u{20bd}"), vec![0xFE, 0xFF, 0x00, 0x41, 0x20, 0xBD]);
    }

    #[test]
    fn store_hands_out_distinct_handles_until_released() {
        let store = DocumentStore::new();
        let doc = ExportedDocument {
            bytes: Arc::from(&b"%PDF"[..]),
            created_at: Utc::now(),
            file_name: "certificate_1.pdf".into(),
        };
        let a = store.insert(doc.clone());
        let b = store.insert(doc);
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert!(store.release(a));
        assert!(!store.release(a));
        assert!(matches!(store.get(a), Err(RenderError::UnknownHandle(_))));
        assert!(store.get(b).is_ok());
    }

    #[test]
    fn digest_and_data_uri() {
        let doc = ExportedDocument {
            bytes: Arc::from(&b"abc"[..]),
            created_at: Utc::now(),
            file_name: "certificate_1.pdf".into(),
        };
        assert_eq!(
            doc.sha256_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(doc.data_uri(), "data:application/pdf;base64,YWJj");
    }
}
