//! Payment confirmation step.
//!
//! On activation the step waits a short settle delay, then renders the
//! certificate. The delay is cancelled if the step is deactivated first, so
//! no render starts after the wizard has moved on.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::document::DocumentHandle;
use crate::{CertificateDescriptor, CertificateExporter, RenderError, Result};

/// Where the step is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProcessingState {
    #[default]
    Idle,
    Processing,
    Complete(DocumentHandle),
    /// Render failed; carries a message for the user
    Failed(String),
}

impl ProcessingState {
    /// Anything but `Processing`
    pub fn is_settled(&self) -> bool {
        !matches!(self, ProcessingState::Processing)
    }

    pub fn handle(&self) -> Option<DocumentHandle> {
        match self {
            ProcessingState::Complete(h) => Some(*h),
            _ => None,
        }
    }
}

/// What the step shows to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepView {
    Idle,
    Processing {
        message: String,
        hint: String,
    },
    Complete {
        title: String,
        summary: String,
        sent_to: String,
        download_prompt: String,
        download_label: String,
        confirmations: Vec<String>,
    },
    Failed {
        message: String,
        can_retry: bool,
    },
}

impl StepView {
    pub const HEADER: &'static str = "Payment processing";
    pub const SUBHEADER: &'static str = "Confirming the certificate payment";

    /// True only when a finished document can be downloaded
    pub fn has_download(&self) -> bool {
        matches!(self, StepView::Complete { .. })
    }

    pub fn lines(&self) -> Vec<String> {
        let mut out = vec![Self::HEADER.to_string(), Self::SUBHEADER.to_string()];
        match self {
            StepView::Idle => {}
            StepView::Processing { message, hint } => {
                out.push(message.clone());
                out.push(hint.clone());
            }
            StepView::Complete { title, summary, sent_to, download_prompt, download_label, confirmations } => {
                out.extend([title, summary, sent_to, download_prompt].into_iter().cloned());
                out.push(format!("[{}]", download_label));
                out.extend(confirmations.iter().map(|c| format!("\u{2713} {}", c)));
            }
            StepView::Failed { message, can_retry } => {
                out.push(format!("Certificate could not be created: {}", message));
                if *can_retry {
                    out.push("[Try again]".to_string());
                }
            }
        }
        out
    }
}

/// The payment confirmation step for one certificate.
pub struct PaymentStep {
    exporter: Arc<CertificateExporter>,
    descriptor: Arc<CertificateDescriptor>,
    settle_delay: Duration,
    state: Arc<watch::Sender<ProcessingState>>,
    cancel: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl PaymentStep {
    pub fn new(exporter: Arc<CertificateExporter>, descriptor: CertificateDescriptor) -> Self {
        let settle_delay = Duration::from_millis(exporter.config().settle_delay_ms);
        let (state, _) = watch::channel(ProcessingState::Idle);
        Self {
            exporter,
            descriptor: Arc::new(descriptor),
            settle_delay,
            state: Arc::new(state),
            cancel: None,
            task: None,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn state(&self) -> ProcessingState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessingState> {
        self.state.subscribe()
    }

    pub fn descriptor(&self) -> &CertificateDescriptor {
        &self.descriptor
    }

    /// Enter `Processing` and schedule the render after the settle delay.
    ///
    /// Must be called inside a tokio runtime. Returns `false` when the step is
    /// already processing or complete.
    pub fn activate(&mut self) -> bool {
        if !matches!(*self.state.borrow(), ProcessingState::Idle | ProcessingState::Failed(_)) {
            return false;
        }
        self.state.send_replace(ProcessingState::Processing);

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let exporter = self.exporter.clone();
        let descriptor = self.descriptor.clone();
        let state = self.state.clone();
        let delay = self.settle_delay;

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel_rx.changed() => {
                    log::debug!("settle delay cancelled; render not started");
                    return;
                }
            }

            let result = exporter.render(&descriptor).await;

            // Decide under the state lock so a concurrent deactivate either
            // sees the finished document or the task sees the cancellation.
            let mut orphan = None;
            state.send_if_modified(|current| {
                if *cancel_rx.borrow() {
                    orphan = result.as_ref().ok().copied();
                    return false;
                }
                *current = match &result {
                    Ok(handle) => ProcessingState::Complete(*handle),
                    Err(e) => ProcessingState::Failed(e.to_string()),
                };
                true
            });
            if let Some(handle) = orphan {
                log::warn!("step torn down during render; releasing document {}", handle.id());
                exporter.release(handle);
            }
        });

        self.cancel = Some(cancel_tx);
        self.task = Some(task);
        true
    }

    /// Re-run the render after a failure.
    pub fn retry(&mut self) -> Result<()> {
        if !matches!(*self.state.borrow(), ProcessingState::Failed(_)) {
            return Err(RenderError::NotReady);
        }
        log::info!("retrying certificate render");
        self.activate();
        Ok(())
    }

    /// Wait until the step leaves `Processing`.
    pub async fn wait_settled(&self) -> ProcessingState {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(ProcessingState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    /// Cancel a pending render and release the held document.
    pub fn deactivate(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.send_replace(true);
        }
        // The task is not aborted: an in-flight render finishes and releases
        // its own document once it sees the cancellation. Its handle is kept
        // so `has_pending_work` keeps reporting it until then.

        let mut held = None;
        self.state.send_modify(|current| {
            held = current.handle();
            *current = ProcessingState::Idle;
        });
        if let Some(handle) = held {
            self.exporter.release(handle);
        }
    }

    /// The settle timer or render of the latest activation is still running,
    /// even when left to finish after `deactivate`.
    pub fn has_pending_work(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().handle().is_some()
    }

    /// Save the finished certificate into `dir`.
    pub fn download(&self, dir: &Path) -> Result<PathBuf> {
        let handle = self.state.borrow().handle().ok_or(RenderError::NotReady)?;
        self.exporter.download(handle, dir)
    }

    pub fn suggested_file_name(&self) -> Result<String> {
        let handle = self.state.borrow().handle().ok_or(RenderError::NotReady)?;
        self.exporter.suggested_file_name(handle)
    }

    pub fn view(&self) -> StepView {
        match &*self.state.borrow() {
            ProcessingState::Idle => StepView::Idle,
            ProcessingState::Processing => StepView::Processing {
                message: "Checking payment...".to_string(),
                hint: "Please wait".to_string(),
            },
            ProcessingState::Complete(_) => {
                let labels = &self.exporter.config().labels;
                let summary = match self.descriptor.amount_text(labels) {
                    Some(amount) => format!("Certificate for {} created", amount),
                    None => "Certificate created".to_string(),
                };
                let contact = self.descriptor.recipient().unwrap_or("the specified number");
                StepView::Complete {
                    title: "Payment successful!".to_string(),
                    summary,
                    sent_to: format!("Sent to: {}", contact),
                    download_prompt: "Your certificate is ready! Download the PDF to print or send it".to_string(),
                    download_label: "Download PDF certificate".to_string(),
                    confirmations: vec![
                        "Certificate sent by email".to_string(),
                        "Saved to your account".to_string(),
                        "Valid for 3 years".to_string(),
                    ],
                }
            }
            ProcessingState::Failed(message) => StepView::Failed {
                message: message.clone(),
                can_retry: true,
            },
        }
    }
}

impl Drop for PaymentStep {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl std::fmt::Debug for PaymentStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentStep")
            .field("state", &*self.state.borrow())
            .field("settle_delay", &self.settle_delay)
            .finish()
    }
}
