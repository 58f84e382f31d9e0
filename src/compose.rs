//! Certificate markup composition.
//!
//! The certificate is described as a small HTML fragment, one `<p>` per text
//! line in top-to-bottom order. The layout pass parses it back, so the markup
//! is the single source of which lines appear and in what order.

use crate::descriptor::{CertificateDescriptor, CertificateLabels};

/// Classes of the text lines, in the order they are stacked.
pub const LINE_CLASSES: [&str; 5] = ["brand", "caption", "amount", "subtitle", "sender"];

/// Escape text for inclusion in element content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Build the certificate fragment for `descriptor`.
///
/// Optional parts (caption, amount) are left out entirely when absent; the
/// sender line is always present.
pub fn certificate_markup(descriptor: &CertificateDescriptor, labels: &CertificateLabels) -> String {
    let mut lines = Vec::with_capacity(LINE_CLASSES.len());
    lines.push(("brand", labels.brand.clone()));
    if let Some(caption) = descriptor.caption() {
        lines.push(("caption", caption.to_string()));
    }
    if let Some(amount) = descriptor.amount_text(labels) {
        lines.push(("amount", amount));
    }
    lines.push(("subtitle", labels.subtitle.clone()));
    lines.push(("sender", descriptor.sender_line(labels)));

    let mut html = String::from("<div class=\"certificate\"><div class=\"scrim\">");
    for (class, text) in lines {
        html.push_str(&format!("<p class=\"{}\">{}</p>", class, escape_html(&text)));
    }
    html.push_str("</div></div>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape_html("<b>&\"x'"), "&lt;b&gt;&amp;&quot;x&#39;");
    }

    #[test]
    fn markup_lists_lines_in_order() {
        let d = CertificateDescriptor::new("Anna")
            .with_denomination(5000)
            .with_caption("With love");
        let html = certificate_markup(&d, &CertificateLabels::default());
        let positions: Vec<usize> = LINE_CLASSES
            .iter()
            .map(|c| html.find(&format!("class=\"{}\"", c)).expect("line present"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn user_text_cannot_inject_elements() {
        let d = CertificateDescriptor::new("<p class=\"caption\">x</p>");
        let html = certificate_markup(&d, &CertificateLabels::default());
        assert!(!html.contains("class=\"caption\""));
    }
}
