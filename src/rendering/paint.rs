/// Paint commands for the certificate surface

use super::layout::{ElementType, LayoutNode};
use crate::Surface;

/// Scrim drawn over the background, `rgba(0, 0, 0, 0.1)`
pub const SCRIM_RGBA: (u8, u8, u8, u8) = (0, 0, 0, 26);

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    /// Background image, cover-fit and centered in the given box
    Background {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    SolidRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        rgba: (u8, u8, u8, u8),
    },
    /// A single line of text centered on `center_x`, top of line box at `y`
    Text {
        center_x: f32,
        y: f32,
        line_height: f32,
        font_size: f32,
        letter_spacing: f32,
        rgba: (u8, u8, u8, u8),
        text: String,
        elem_type: ElementType,
    },
}

/// Turn layout into an ordered display list (back to front).
pub fn build_display_list(surface: Surface, nodes: &[LayoutNode], has_background: bool) -> Vec<PaintCommand> {
    let (w, h) = (surface.width as f32, surface.height as f32);
    let mut cmds = Vec::with_capacity(nodes.len() + 2);
    if has_background {
        cmds.push(PaintCommand::Background { x: 0.0, y: 0.0, width: w, height: h });
    }
    cmds.push(PaintCommand::SolidRect { x: 0.0, y: 0.0, width: w, height: h, rgba: SCRIM_RGBA });
    for node in nodes {
        cmds.push(PaintCommand::Text {
            center_x: node.lb.rect.center_x(),
            y: node.lb.rect.y,
            line_height: node.lb.rect.height,
            font_size: node.style.font_size,
            letter_spacing: node.style.letter_spacing,
            rgba: node.style.rgba,
            text: node.text.clone(),
            elem_type: node.elem_type,
        });
    }
    cmds
}

/// Texts of the display list, top to bottom.
pub fn text_lines(cmds: &[PaintCommand]) -> Vec<(ElementType, &str)> {
    cmds.iter()
        .filter_map(|c| match c {
            PaintCommand::Text { elem_type, text, .. } => Some((*elem_type, text.as_str())),
            _ => None,
        })
        .collect()
}
