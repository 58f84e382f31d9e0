//! Off-screen render target.
//!
//! A `RenderTarget` is the fully composed certificate (display list plus the
//! decoded background) waiting to be rasterized. It is never shown; it is
//! consumed by one rasterization and released when dropped, whichever way the
//! rasterization ends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use scraper::Html;

use super::layout::layout_certificate;
use super::paint::{build_display_list, PaintCommand};
use crate::compose::certificate_markup;
use crate::descriptor::{CertificateDescriptor, CertificateLabels};
use crate::{Result, Surface};

/// Counts live render targets so leaks are observable.
#[derive(Debug, Clone, Default)]
pub struct TargetTracker {
    live: Arc<AtomicUsize>,
    acquired: Arc<AtomicUsize>,
}

impl TargetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets acquired and not yet dropped
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Targets ever acquired through this tracker
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    fn lease(&self) -> TargetLease {
        self.live.fetch_add(1, Ordering::SeqCst);
        self.acquired.fetch_add(1, Ordering::SeqCst);
        TargetLease { live: self.live.clone() }
    }
}

#[derive(Debug)]
struct TargetLease {
    live: Arc<AtomicUsize>,
}

impl Drop for TargetLease {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct RenderTarget {
    pub surface: Surface,
    pub markup: String,
    pub commands: Vec<PaintCommand>,
    pub background: Option<RgbaImage>,
    _lease: TargetLease,
}

impl RenderTarget {
    /// Compose `descriptor` into a new target registered with `tracker`.
    pub fn acquire(
        descriptor: &CertificateDescriptor,
        labels: &CertificateLabels,
        surface: Surface,
        tracker: &TargetTracker,
    ) -> Result<Self> {
        let background = match &descriptor.background {
            Some(src) => Some(src.load()?.to_rgba8()),
            None => None,
        };

        let markup = certificate_markup(descriptor, labels);
        // `Html` is not Send; keep it scoped to this call
        let commands = {
            let document = Html::parse_fragment(&markup);
            let nodes = layout_certificate(&document, surface)?;
            build_display_list(surface, &nodes, background.is_some())
        };

        log::debug!(
            "render target acquired: {}x{} with {} paint commands",
            surface.width,
            surface.height,
            commands.len()
        );

        Ok(Self {
            surface,
            markup,
            commands,
            background,
            _lease: tracker.lease(),
        })
    }
}
