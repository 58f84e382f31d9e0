//! Certificate descriptor: the wizard's input for one certificate

use std::path::PathBuf;

use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{RenderError, Result};

/// Locale used for grouping denomination digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    /// `5 000` with a no-break space, as browsers format `ru-RU`
    #[default]
    #[serde(rename = "ru-RU")]
    RuRu,
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "de-DE")]
    DeDe,
}

impl Locale {
    pub fn group_separator(self) -> char {
        match self {
            Locale::RuRu => '\u{a0}',
            Locale::EnUs => ',',
            Locale::DeDe => '.',
        }
    }

    /// Format a whole amount with thousands grouping.
    pub fn format_grouped(self, amount: u64) -> String {
        let digits = amount.to_string();
        let sep = self.group_separator();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(sep);
            }
            out.push(ch);
        }
        out
    }
}

/// Fixed texts printed on every certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateLabels {
    pub brand: String,
    pub subtitle: String,
    pub sender_prefix: String,
    pub currency: String,
    pub locale: Locale,
}

impl Default for CertificateLabels {
    fn default() -> Self {
        Self {
            brand: "UVI JEWELRY".to_string(),
            subtitle: "Gift certificate".to_string(),
            sender_prefix: "From:".to_string(),
            currency: "\u{20bd}".to_string(),
            locale: Locale::RuRu,
        }
    }
}

impl CertificateLabels {
    /// Amount as printed: grouped digits followed by the currency suffix.
    pub fn amount_text(&self, amount: u64) -> String {
        format!("{} {}", self.locale.format_grouped(amount), self.currency)
    }
}

/// Where the background picture comes from.
#[derive(Clone, PartialEq)]
pub enum BackgroundSource {
    Path(PathBuf),
    /// `data:image/...;base64,...`
    DataUri(String),
    Bytes(Vec<u8>),
}

impl std::fmt::Debug for BackgroundSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackgroundSource::Path(p) => f.debug_tuple("Path").field(p).finish(),
            BackgroundSource::DataUri(uri) => write!(f, "DataUri({} bytes)", uri.len()),
            BackgroundSource::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
        }
    }
}

impl From<String> for BackgroundSource {
    fn from(s: String) -> Self {
        if s.starts_with("data:") {
            BackgroundSource::DataUri(s)
        } else {
            BackgroundSource::Path(PathBuf::from(s))
        }
    }
}

impl<'de> Deserialize<'de> for BackgroundSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(BackgroundSource::from)
    }
}

impl BackgroundSource {
    /// Raw encoded image bytes.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        match self {
            BackgroundSource::Path(p) => std::fs::read(p).map_err(|e| {
                RenderError::Composition(format!("cannot read background {}: {}", p.display(), e))
            }),
            BackgroundSource::DataUri(uri) => decode_data_uri(uri),
            BackgroundSource::Bytes(b) => Ok(b.clone()),
        }
    }

    /// Decode the background into pixels.
    pub fn load(&self) -> Result<image::DynamicImage> {
        let bytes = self.bytes()?;
        image::load_from_memory(&bytes)
            .map_err(|e| RenderError::Composition(format!("cannot decode background: {}", e)))
    }
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| RenderError::Composition("not a data URI".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| RenderError::Composition("data URI without payload".into()))?;
    if !meta.ends_with(";base64") {
        return Err(RenderError::Composition(format!(
            "unsupported data URI encoding: {}",
            meta
        )));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| RenderError::Composition(format!("invalid base64 in data URI: {}", e)))
}

/// Input for one certificate as collected by the earlier wizard steps.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CertificateDescriptor {
    /// Amount in whole currency units
    #[serde(default)]
    pub denomination: Option<u64>,
    #[serde(default)]
    pub background: Option<BackgroundSource>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub sender_name: String,
    /// Email or phone the certificate is sent to
    #[serde(default)]
    pub recipient_contact: Option<String>,
}

impl CertificateDescriptor {
    pub fn new(sender_name: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            ..Default::default()
        }
    }

    pub fn with_denomination(mut self, amount: u64) -> Self {
        self.denomination = Some(amount);
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_background(mut self, background: BackgroundSource) -> Self {
        self.background = Some(background);
        self
    }

    pub fn with_recipient(mut self, contact: impl Into<String>) -> Self {
        self.recipient_contact = Some(contact.into());
        self
    }

    /// Caption if present and not blank.
    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    pub fn amount_text(&self, labels: &CertificateLabels) -> Option<String> {
        self.denomination.map(|d| labels.amount_text(d))
    }

    pub fn sender_line(&self, labels: &CertificateLabels) -> String {
        format!("{} {}", labels.sender_prefix, self.sender_name.trim())
    }

    /// Recipient contact if one was given.
    pub fn recipient(&self) -> Option<&str> {
        self.recipient_contact
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands_per_locale() {
        assert_eq!(Locale::RuRu.format_grouped(0), "0");
        assert_eq!(Locale::RuRu.format_grouped(999), "999");
        assert_eq!(Locale::RuRu.format_grouped(5000), "5\u{a0}000");
        assert_eq!(Locale::EnUs.format_grouped(1234567), "1,234,567");
        assert_eq!(Locale::DeDe.format_grouped(100000), "100.000");
    }

    #[test]
    fn amount_text_appends_currency() {
        let labels = CertificateLabels::default();
        let d = CertificateDescriptor::new("Anna").with_denomination(15000);
        assert_eq!(d.amount_text(&labels).as_deref(), Some("15\u{a0}000 \u{20bd}"));
        assert_eq!(CertificateDescriptor::new("Anna").amount_text(&labels), None);
    }

    #[test]
    fn blank_caption_counts_as_absent() {
        let d = CertificateDescriptor::new("Anna").with_caption("   ");
        assert_eq!(d.caption(), None);
        let d = d.with_caption(" Happy birthday ");
        assert_eq!(d.caption(), Some("Happy birthday"));
    }

    #[test]
    fn deserializes_from_json() {
        let json = r#"{
            "denomination": 3000,
            "background": "data:image/png;base64,AAAA",
            "sender_name": "Ivan",
            "recipient_contact": "+7 900 000 00 00"
        }"#;
        let d: CertificateDescriptor = serde_json::from_str(json).expect("parse");
        assert_eq!(d.denomination, Some(3000));
        assert!(matches!(d.background, Some(BackgroundSource::DataUri(_))));
        assert_eq!(d.caption(), None);
        assert_eq!(d.recipient(), Some("+7 900 000 00 00"));

        let d: CertificateDescriptor =
            serde_json::from_str(r#"{"background": "bg/roses.jpg"}"#).expect("parse");
        assert_eq!(
            d.background,
            Some(BackgroundSource::Path(PathBuf::from("bg/roses.jpg")))
        );
    }

    #[test]
    fn data_uri_requires_base64() {
        let err = BackgroundSource::DataUri("data:image/png,raw".into())
            .bytes()
            .unwrap_err();
        assert!(matches!(err, RenderError::Composition(_)));

        let ok = BackgroundSource::DataUri("data:image/png;base64,aGk=".into())
            .bytes()
            .expect("decode");
        assert_eq!(ok, b"hi");
    }

    #[test]
    fn undecodable_background_is_composition_error() {
        let err = BackgroundSource::Bytes(vec![1, 2, 3]).load().unwrap_err();
        assert!(matches!(err, RenderError::Composition(_)));
    }
}
