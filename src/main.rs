use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use giftcert::{
    CertificateDescriptor, CertificateExporter, ExportConfig, PaymentStep, PreviewRasterizer,
    ProcessingState, StepIndicator,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "giftcert", version, about = "Render and export gift certificates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the payment step for a descriptor and save the PDF
    Render {
        /// JSON certificate descriptor
        #[arg(long)]
        descriptor: PathBuf,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// JSON export config
        #[arg(long)]
        config: Option<PathBuf>,
        /// TrueType font for certificate text
        #[arg(long)]
        font: Option<PathBuf>,
        #[arg(long)]
        settle_ms: Option<u64>,
        /// Rasterization timeout, 0 disables it
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Draw text as bars; needs no font
        #[arg(long)]
        preview: bool,
    },
    /// Print the composed certificate markup
    Markup {
        #[arg(long)]
        descriptor: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the wizard step indicator
    Indicator {
        #[arg(long)]
        current: u32,
        #[arg(long, default_value_t = StepIndicator::DEFAULT_TOTAL)]
        total: u32,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ExportConfig> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            Ok(ExportConfig::from_json(&text)?)
        }
        None => Ok(ExportConfig::default()),
    }
}

fn load_descriptor(path: &Path) -> anyhow::Result<CertificateDescriptor> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing descriptor {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Render { descriptor, out, config, font, settle_ms, timeout_ms, preview } => {
            let mut cfg = load_config(config.as_ref())?;
            if font.is_some() {
                cfg.font_path = font;
            }
            if let Some(ms) = settle_ms {
                cfg.settle_delay_ms = ms;
            }
            if let Some(ms) = timeout_ms {
                cfg.raster_timeout_ms = ms;
            }
            let descriptor = load_descriptor(&descriptor)?;

            let exporter = if preview {
                cfg.validate()?;
                CertificateExporter::with_rasterizer(cfg, Arc::new(PreviewRasterizer))
            } else {
                CertificateExporter::new(cfg).context("creating exporter (use --font or --preview)")?
            };
            let exporter = Arc::new(exporter);

            std::fs::create_dir_all(&out).with_context(|| format!("creating {}", out.display()))?;

            println!("{}", StepIndicator::new(3));
            let mut step = PaymentStep::new(exporter.clone(), descriptor);
            step.activate();
            for line in step.view().lines() {
                println!("{}", line);
            }

            let settled = step.wait_settled().await;
            for line in step.view().lines().into_iter().skip(2) {
                println!("{}", line);
            }
            match settled {
                ProcessingState::Complete(handle) => {
                    let path = step.download(&out)?;
                    let doc = exporter.document(handle)?;
                    println!("saved {} (sha256 {})", path.display(), doc.sha256_hex());
                }
                ProcessingState::Failed(message) => bail!("certificate render failed: {}", message),
                other => bail!("step ended in unexpected state {:?}", other),
            }
        }
        Command::Markup { descriptor, config } => {
            let cfg = load_config(config.as_ref())?;
            let descriptor = load_descriptor(&descriptor)?;
            println!("{}", giftcert::compose::certificate_markup(&descriptor, &cfg.labels));
        }
        Command::Indicator { current, total } => {
            let ind = StepIndicator::with_total(current, total);
            println!("{}", ind);
            for (step, state) in ind.states() {
                println!("{} {:?} {}", step, state, state.css_class());
            }
        }
    }
    Ok(())
}
