/// Layout of the certificate text stack

use crate::{RenderError, Result, Surface};
use scraper::{Html, Selector};

/// CSS `line-height: normal` approximation
pub const LINE_HEIGHT: f32 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxModel {
    pub margin_top: f32,
    pub margin_bottom: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutBox {
    pub rect: Rect,
    pub box_model: BoxModel,
}

impl LayoutBox {
    /// Vertical space taken including margins (flex items, margins do not collapse).
    pub fn outer_height(&self) -> f32 {
        self.box_model.margin_top + self.rect.height + self.box_model.margin_bottom
    }
}

/// Which certificate line a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Brand,
    Caption,
    Amount,
    Subtitle,
    Sender,
    Other,
}

impl ElementType {
    pub fn from_class(class: &str) -> Self {
        match class {
            "brand" => ElementType::Brand,
            "caption" => ElementType::Caption,
            "amount" => ElementType::Amount,
            "subtitle" => ElementType::Subtitle,
            "sender" => ElementType::Sender,
            _ => ElementType::Other,
        }
    }

    /// Fixed typography per line. Sizes are in logical units of the surface.
    pub fn style(self) -> Option<TextStyle> {
        let white = |alpha: f32| (255, 255, 255, (alpha * 255.0).round() as u8);
        let style = match self {
            ElementType::Brand => TextStyle {
                font_size: 14.0,
                rgba: white(0.8),
                letter_spacing: 0.2 * 14.0,
                box_model: BoxModel { margin_top: 0.0, margin_bottom: 10.0 },
            },
            ElementType::Caption => TextStyle {
                font_size: 24.0,
                rgba: white(1.0),
                letter_spacing: 0.0,
                box_model: BoxModel { margin_top: 0.0, margin_bottom: 20.0 },
            },
            ElementType::Amount => TextStyle {
                font_size: 64.0,
                rgba: white(1.0),
                letter_spacing: 0.0,
                box_model: BoxModel { margin_top: 0.0, margin_bottom: 0.0 },
            },
            ElementType::Subtitle => TextStyle {
                font_size: 14.0,
                rgba: white(0.7),
                letter_spacing: 0.0,
                box_model: BoxModel { margin_top: 20.0, margin_bottom: 0.0 },
            },
            ElementType::Sender => TextStyle {
                font_size: 12.0,
                rgba: white(0.6),
                letter_spacing: 0.0,
                box_model: BoxModel { margin_top: 40.0, margin_bottom: 0.0 },
            },
            ElementType::Other => return None,
        };
        Some(style)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub rgba: (u8, u8, u8, u8),
    pub letter_spacing: f32,
    pub box_model: BoxModel,
}

/// A laid out text line.
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub lb: LayoutBox,
    pub text: String,
    pub elem_type: ElementType,
    pub style: TextStyle,
}

/// Lay out the certificate lines found in `document` on `surface`.
/// - Lines are stacked in document order
/// - The stack is centered vertically, each line spans the full width and is
///   centered horizontally when painted
pub fn layout_certificate(document: &Html, surface: Surface) -> Result<Vec<LayoutNode>> {
    let p_sel = Selector::parse("div.scrim > p")
        .map_err(|e| RenderError::Composition(format!("bad selector: {:?}", e)))?;

    let mut nodes = Vec::new();
    for p in document.select(&p_sel) {
        let class = p.value().attr("class").unwrap_or_default();
        let elem_type = ElementType::from_class(class);
        let Some(style) = elem_type.style() else {
            log::debug!("skipping unknown certificate line class {:?}", class);
            continue;
        };
        let text = p.text().collect::<String>().trim().to_string();
        let lb = LayoutBox {
            rect: Rect {
                x: 0.0,
                y: 0.0,
                width: surface.width as f32,
                height: style.font_size * LINE_HEIGHT,
            },
            box_model: style.box_model,
        };
        nodes.push(LayoutNode { lb, text, elem_type, style });
    }

    let total: f32 = nodes.iter().map(|n| n.lb.outer_height()).sum();
    let mut y = (surface.height as f32 - total) / 2.0;
    for node in &mut nodes {
        y += node.lb.box_model.margin_top;
        node.lb.rect.y = y;
        y += node.lb.rect.height + node.lb.box_model.margin_bottom;
    }

    Ok(nodes)
}
