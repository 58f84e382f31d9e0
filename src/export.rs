//! Certificate exporter: descriptor in, stored PDF handle out.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::document::{assemble_pdf, DocumentHandle, DocumentStore, ExportedDocument};
use crate::rendering::{Rasterizer, RenderTarget, SoftwareRasterizer, TargetTracker};
use crate::{CertificateDescriptor, ExportConfig, RenderError, Result};

/// Renders certificates and keeps the resulting documents for download.
///
/// One exporter is meant to live for a browsing session; it can be shared
/// between steps behind an `Arc`.
pub struct CertificateExporter {
    config: ExportConfig,
    rasterizer: Arc<dyn Rasterizer>,
    store: DocumentStore,
    targets: TargetTracker,
    renders: AtomicUsize,
    last_stamp: AtomicI64,
}

impl CertificateExporter {
    /// Create an exporter using the software rasterizer and the configured
    /// (or a probed system) font.
    pub fn new(config: ExportConfig) -> Result<Self> {
        config.validate()?;
        let rasterizer = SoftwareRasterizer::from_font_path(config.font_path.as_deref())?;
        Ok(Self::with_rasterizer(config, Arc::new(rasterizer)))
    }

    pub fn with_rasterizer(config: ExportConfig, rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            config,
            rasterizer,
            store: DocumentStore::new(),
            targets: TargetTracker::new(),
            renders: AtomicUsize::new(0),
            last_stamp: AtomicI64::new(0),
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Render targets currently alive
    pub fn live_targets(&self) -> usize {
        self.targets.live()
    }

    /// Number of times `render` was invoked
    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    /// Compose, rasterize and package `descriptor` into a stored PDF.
    ///
    /// Fails only on composition, rasterization or document errors; missing
    /// optional fields just leave their lines out.
    pub async fn render(&self, descriptor: &CertificateDescriptor) -> Result<DocumentHandle> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        log::debug!("rendering certificate with {} rasterizer", self.rasterizer.name());

        match self.render_document(descriptor).await {
            Ok(doc) => {
                let file_name = doc.file_name.clone();
                let size = doc.len();
                let handle = self.store.insert(doc);
                log::info!("certificate {} ready ({} bytes, handle {})", file_name, size, handle.id());
                Ok(handle)
            }
            Err(e) => {
                log::error!("certificate render failed: {}", e);
                Err(e)
            }
        }
    }

    async fn render_document(&self, descriptor: &CertificateDescriptor) -> Result<ExportedDocument> {
        let target = RenderTarget::acquire(
            descriptor,
            &self.config.labels,
            self.config.surface,
            &self.targets,
        )?;

        let rasterizer = self.rasterizer.clone();
        let options = self.config.raster_options();
        let quality = self.config.jpeg_quality;
        let title = match descriptor.amount_text(&self.config.labels) {
            Some(amount) => format!("{} {}", self.config.labels.subtitle, amount),
            None => self.config.labels.subtitle.clone(),
        };

        // The target moves into the job and is dropped there on every path,
        // including after a timeout has already been reported.
        let job = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let raster = rasterizer.rasterize(&target, &options);
            drop(target);
            assemble_pdf(&raster?, quality, &title)
        });

        let timeout_ms = self.config.raster_timeout_ms;
        let joined = if timeout_ms > 0 {
            tokio::time::timeout(Duration::from_millis(timeout_ms), job)
                .await
                .map_err(|_| RenderError::Timeout(timeout_ms))?
        } else {
            job.await
        };
        let bytes = joined.map_err(|e| RenderError::Rasterization(format!("render job failed: {}", e)))??;

        Ok(ExportedDocument {
            bytes: Arc::from(bytes),
            created_at: Utc::now(),
            file_name: self.next_file_name(),
        })
    }

    /// Millisecond timestamp, strictly increasing for this exporter.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let prev = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(now.max(prev + 1)))
            .unwrap_or(now);
        now.max(prev + 1)
    }

    /// `certificate_<timestamp>.pdf`, unique per call
    pub fn next_file_name(&self) -> String {
        format!("certificate_{}.pdf", self.next_stamp())
    }

    pub fn document(&self, handle: DocumentHandle) -> Result<Arc<ExportedDocument>> {
        self.store.get(handle)
    }

    /// Name assigned when the document was rendered.
    pub fn suggested_file_name(&self, handle: DocumentHandle) -> Result<String> {
        Ok(self.store.get(handle)?.file_name.clone())
    }

    /// The document as a `data:` URI, for handing to a browser-like surface.
    pub fn data_uri(&self, handle: DocumentHandle) -> Result<String> {
        Ok(self.store.get(handle)?.data_uri())
    }

    /// Write the document into `dir` under a fresh `certificate_<timestamp>.pdf`
    /// name so repeated downloads never overwrite each other.
    pub fn download(&self, handle: DocumentHandle, dir: &Path) -> Result<PathBuf> {
        let doc = self.store.get(handle)?;
        let path = dir.join(self.next_file_name());
        std::fs::write(&path, &doc.bytes)?;
        log::info!("certificate saved to {}", path.display());
        Ok(path)
    }

    /// Forget the document; the handle becomes invalid.
    pub fn release(&self, handle: DocumentHandle) -> bool {
        let released = self.store.release(handle);
        if released {
            log::debug!("released document handle {}", handle.id());
        }
        released
    }
}

impl std::fmt::Debug for CertificateExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateExporter")
            .field("rasterizer", &self.rasterizer.name())
            .field("documents", &self.store.len())
            .field("live_targets", &self.targets.live())
            .finish()
    }
}
