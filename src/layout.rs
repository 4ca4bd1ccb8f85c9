//! Block layout – uses Taffy to lay out one styled content block at a fixed
//! pixel width, then flattens the result into positioned boxes for painting.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::RgbaImage;
use taffy::prelude::*;

use crate::error::RenderError;
use crate::fonts::{wrap_text, FontBook};
use crate::markup::Tag;
use crate::style::{self, ComputedStyle, Edges, StyledNode};

/// A box positioned relative to the top-left corner of the block, in px.
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    pub children: Vec<PositionedBox>,
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    /// Wrapped text; alignment is applied against the box width when painted.
    Text { lines: Vec<TextLine> },
    Image { pixels: RgbaImage },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub width: f32,
}

/// A laid-out block: its natural height at the requested width and the
/// positioned box tree.
#[derive(Debug, Clone)]
pub struct BlockLayout {
    pub width: f32,
    pub height: f32,
    pub boxes: Vec<PositionedBox>,
}

fn layout_error(e: taffy::TaffyError) -> RenderError {
    RenderError::Layout(e.to_string())
}

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontBook,
    node_styles: HashMap<NodeId, ComputedStyle>,
    node_content: HashMap<NodeId, BoxContent>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontBook) -> Self {
        let mut taffy = TaffyTree::new();
        // fractional heights feed page placement directly
        taffy.disable_rounding();
        Self {
            taffy,
            fonts,
            node_styles: HashMap::new(),
            node_content: HashMap::new(),
        }
    }

    /// Collect all text content from an inline subtree.
    fn collect_inline_text(node: &StyledNode) -> String {
        match node {
            StyledNode::Text { text, .. } => text.clone(),
            StyledNode::Element { children, .. } => {
                children.iter().map(Self::collect_inline_text).collect()
            }
        }
    }

    /// True when no child is block-level.
    fn all_inline(children: &[StyledNode]) -> bool {
        children.iter().all(|c| match c {
            StyledNode::Text { .. } => true,
            StyledNode::Element {
                tag,
                style,
                children: gc,
                ..
            } => *tag != Tag::Img && style.display == style::Display::Inline && Self::all_inline(gc),
        })
    }

    fn build_node(&mut self, styled: &StyledNode, parent_width: f32) -> Result<NodeId, RenderError> {
        match styled {
            StyledNode::Text { text, style } => self.build_text_leaf(text, style, parent_width),
            StyledNode::Element {
                tag,
                style,
                children,
                attrs,
            } => self.build_element_node(*tag, style, children, attrs, parent_width),
        }
    }

    /// A text leaf stretches across a column container but never shrinks
    /// below its widest line, so it also sizes correctly inside rows.
    fn build_text_leaf(
        &mut self,
        text: &str,
        style: &ComputedStyle,
        max_width: f32,
    ) -> Result<NodeId, RenderError> {
        let bold = style.is_bold();
        let font_size = style.font_size;
        let line_height = self.fonts.line_height_px(font_size, style.line_height);

        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let lines: Vec<TextLine> = wrap_text(&normalized, font_size, bold, max_width, self.fonts)
            .into_iter()
            .map(|text| {
                let width = self.fonts.measure_text_width(&text, font_size, bold);
                TextLine { text, width }
            })
            .collect();
        let text_width = lines.iter().map(|l| l.width).fold(0.0f32, f32::max);
        let text_height = lines.len() as f32 * line_height;

        let leaf = Style {
            size: Size {
                width: Dimension::Auto,
                height: Dimension::Length(text_height),
            },
            min_size: Size {
                width: Dimension::Length(text_width.ceil()),
                height: Dimension::Auto,
            },
            flex_shrink: 0.0,
            ..Default::default()
        };
        let node = self.taffy.new_leaf(leaf).map_err(layout_error)?;
        self.node_styles.insert(node, style.text_style());
        self.node_content.insert(node, BoxContent::Text { lines });
        Ok(node)
    }

    fn build_element_node(
        &mut self,
        tag: Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        attrs: &HashMap<String, String>,
        parent_width: f32,
    ) -> Result<NodeId, RenderError> {
        let my_width = match style.width {
            style::Dimension::Px(w) => w,
            style::Dimension::Percent(p) => parent_width * p / 100.0,
            style::Dimension::Auto => parent_width - style.margin.horizontal(),
        };
        let inner_width =
            (my_width - style.padding.horizontal() - style.border.horizontal()).max(1.0);

        if tag == Tag::Img {
            return self.build_image_node(style, attrs, parent_width);
        }

        let mut child_nodes = Vec::new();

        // Paragraph-like elements with only inline content become one
        // wrapped text run so spans flow with the surrounding text.
        if tag.is_paragraph() && Self::all_inline(children) {
            let combined: String = children.iter().map(Self::collect_inline_text).collect();
            if !combined.trim().is_empty() {
                child_nodes.push(self.build_text_leaf(&combined, style, inner_width)?);
            }
        } else {
            let is_flex_row = style.display == style::Display::Flex
                && style.flex_direction == style::FlexDirection::Row;
            let elem_child_count = children.len().max(1);
            // Estimate per-child width in rows so text wraps to its column.
            let child_build_width = if is_flex_row {
                let gap_total = style.gap * elem_child_count.saturating_sub(1) as f32;
                ((inner_width - gap_total) / elem_child_count as f32).max(1.0)
            } else {
                inner_width
            };
            for child in children {
                child_nodes.push(self.build_node(child, child_build_width)?);
            }
        }

        let taffy_style = computed_to_taffy(style);
        let node = self
            .taffy
            .new_with_children(taffy_style, &child_nodes)
            .map_err(layout_error)?;
        self.node_styles.insert(node, style.clone());
        Ok(node)
    }

    fn build_image_node(
        &mut self,
        style: &ComputedStyle,
        attrs: &HashMap<String, String>,
        parent_width: f32,
    ) -> Result<NodeId, RenderError> {
        let src = attrs.get("src").map(String::as_str).unwrap_or("");
        let pixels = decode_data_uri(src)?;
        let resolved = resolve_img_dimensions(&pixels, style, parent_width);
        let node = self
            .taffy
            .new_leaf(computed_to_taffy(&resolved))
            .map_err(layout_error)?;
        self.node_styles.insert(node, resolved);
        self.node_content.insert(node, BoxContent::Image { pixels });
        Ok(node)
    }

    fn extract(&mut self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox, RenderError> {
        let layout = *self.taffy.layout(node).map_err(layout_error)?;
        let style = self.node_styles.remove(&node).unwrap_or_default();
        let content = self.node_content.remove(&node).unwrap_or(BoxContent::None);

        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let child_ids = self.taffy.children(node).map_err(layout_error)?;
        let mut children = Vec::with_capacity(child_ids.len());
        for child in child_ids {
            children.push(self.extract(child, x, y)?);
        }

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            style,
            content,
            children,
        })
    }
}

fn edges_to_lp(e: Edges) -> Rect<LengthPercentage> {
    Rect {
        top: LengthPercentage::Length(e.top),
        right: LengthPercentage::Length(e.right),
        bottom: LengthPercentage::Length(e.bottom),
        left: LengthPercentage::Length(e.left),
    }
}

fn computed_to_taffy(s: &ComputedStyle) -> Style {
    let mut ts = Style::default();

    match s.display {
        style::Display::Flex => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = match s.flex_direction {
                style::FlexDirection::Row => taffy::FlexDirection::Row,
                style::FlexDirection::Column => taffy::FlexDirection::Column,
            };
            ts.justify_content = Some(match s.justify_content {
                style::JustifyContent::Start => taffy::JustifyContent::Start,
                style::JustifyContent::End => taffy::JustifyContent::End,
                style::JustifyContent::Center => taffy::JustifyContent::Center,
                style::JustifyContent::SpaceBetween => taffy::JustifyContent::SpaceBetween,
                style::JustifyContent::SpaceAround => taffy::JustifyContent::SpaceAround,
            });
            ts.align_items = Some(match s.align_items {
                style::AlignItems::Start => taffy::AlignItems::Start,
                style::AlignItems::End => taffy::AlignItems::End,
                style::AlignItems::Center => taffy::AlignItems::Center,
                style::AlignItems::Stretch => taffy::AlignItems::Stretch,
            });
        }
        style::Display::Block => {
            // Block-level elements stack vertically.
            ts.display = taffy::Display::Flex;
            ts.flex_direction = taffy::FlexDirection::Column;
        }
        style::Display::Inline => {
            ts.display = taffy::Display::Flex;
            ts.flex_direction = taffy::FlexDirection::Row;
            ts.flex_wrap = taffy::FlexWrap::Wrap;
        }
        style::Display::None => ts.display = taffy::Display::None,
    }

    ts.size = Size {
        width: dim_to_taffy(s.width),
        height: dim_to_taffy(s.height),
    };
    ts.flex_shrink = 1.0;
    ts.min_size.width = Dimension::Length(0.0);
    ts.margin = Rect {
        top: LengthPercentageAuto::Length(s.margin.top),
        right: LengthPercentageAuto::Length(s.margin.right),
        bottom: LengthPercentageAuto::Length(s.margin.bottom),
        left: LengthPercentageAuto::Length(s.margin.left),
    };
    ts.padding = edges_to_lp(s.padding);
    ts.border = edges_to_lp(s.border);
    ts.gap = Size {
        width: LengthPercentage::Length(s.gap),
        height: LengthPercentage::Length(s.gap),
    };
    ts
}

fn dim_to_taffy(d: style::Dimension) -> Dimension {
    match d {
        style::Dimension::Auto => Dimension::Auto,
        style::Dimension::Px(v) => Dimension::Length(v),
        style::Dimension::Percent(v) => Dimension::Percent(v / 100.0),
    }
}

/// Decode a `data:image/...;base64,` URI. Any other source is unsupported;
/// blocks never reach out to the network or the filesystem.
fn decode_data_uri(src: &str) -> Result<RgbaImage, RenderError> {
    let payload = src
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, b64)| b64.trim())
        .ok_or_else(|| RenderError::UnsupportedResource(abbreviate(src)))?;
    let bytes = BASE64_STD
        .decode(payload)
        .map_err(|e| RenderError::UnsupportedResource(format!("bad base64 image: {e}")))?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| RenderError::UnsupportedResource(format!("undecodable image: {e}")))?;
    Ok(img.to_rgba8())
}

fn abbreviate(src: &str) -> String {
    if src.is_empty() {
        return "image without src".to_string();
    }
    let short: String = src.chars().take(48).collect();
    if short.len() < src.len() {
        format!("{short}...")
    } else {
        short
    }
}

/// Replace `Auto` image dimensions with concrete px values from the
/// intrinsic size, preserving the aspect ratio.
fn resolve_img_dimensions(pixels: &RgbaImage, style: &ComputedStyle, parent_width: f32) -> ComputedStyle {
    let (px_w, px_h) = (pixels.width().max(1) as f32, pixels.height().max(1) as f32);
    let aspect = px_w / px_h;

    let known_w = match style.width {
        style::Dimension::Px(v) => Some(v),
        style::Dimension::Percent(p) => Some(parent_width * p / 100.0),
        style::Dimension::Auto => None,
    };
    let known_h = match style.height {
        style::Dimension::Px(v) => Some(v),
        _ => None,
    };

    let mut s = style.clone();
    s.display = style::Display::Block;
    let (w, h) = match (known_w, known_h) {
        (Some(w), None) => (w, (w / aspect).max(1.0)),
        (None, Some(h)) => ((h * aspect).max(1.0), h),
        (None, None) => {
            let w = px_w.min(parent_width.max(1.0));
            (w, (w / aspect).max(1.0))
        }
        (Some(w), Some(h)) => (w, h),
    };
    s.width = style::Dimension::Px(w);
    s.height = style::Dimension::Px(h);
    s
}

/// Lay out a styled block at exactly `width` px.
pub fn compute_block_layout(
    styled_nodes: &[StyledNode],
    width: f32,
    fonts: &FontBook,
) -> Result<BlockLayout, RenderError> {
    let mut builder = LayoutBuilder::new(fonts);

    let mut child_ids = Vec::with_capacity(styled_nodes.len());
    for node in styled_nodes {
        child_ids.push(builder.build_node(node, width)?);
    }

    let root_style = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: Dimension::Length(width),
            height: Dimension::Auto,
        },
        ..Default::default()
    };
    let root = builder
        .taffy
        .new_with_children(root_style, &child_ids)
        .map_err(layout_error)?;

    builder
        .taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(layout_error)?;

    let root_box = builder.extract(root, 0.0, 0.0)?;
    Ok(BlockLayout {
        width,
        height: root_box.height,
        boxes: root_box.children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_markup;
    use crate::style::build_styled_tree;

    fn layout(markup: &str, width: f32) -> Result<BlockLayout, RenderError> {
        let nodes = parse_markup(markup)?;
        let styled = build_styled_tree(&nodes, None);
        compute_block_layout(&styled, width, &FontBook::heuristic())
    }

    fn png_data_uri(w: u32, h: u32) -> String {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([200, 30, 30]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", BASE64_STD.encode(bytes))
    }

    #[test]
    fn simple_paragraph_has_height() {
        let l = layout("<p>Hello world</p>", 680.0).unwrap();
        assert_eq!(l.boxes.len(), 1);
        assert!(l.boxes[0].width > 0.0);
        // 16px × 1.4 line height
        assert!((l.height - 22.4).abs() < 0.5, "height {}", l.height);
    }

    #[test]
    fn narrower_width_wraps_taller() {
        let text = "<p>In the name of Allah, the Most Gracious, the Most Merciful</p>";
        let wide = layout(text, 680.0).unwrap();
        let narrow = layout(text, 120.0).unwrap();
        assert!(narrow.height > wide.height);
    }

    #[test]
    fn padding_and_margin_add_to_height() {
        let plain = layout("<div><p>x</p></div>", 400.0).unwrap();
        let padded = layout(
            r#"<div style="padding: 10px; margin-bottom: 5px"><p>x</p></div>"#,
            400.0,
        )
        .unwrap();
        assert!((padded.height - plain.height - 25.0).abs() < 0.5);
    }

    #[test]
    fn flex_row_places_children_side_by_side() {
        let l = layout(
            r#"<div style="display: flex; gap: 8px"><span>A</span><span>B</span></div>"#,
            400.0,
        )
        .unwrap();
        let row = &l.boxes[0];
        assert_eq!(row.children.len(), 2);
        assert!(row.children[1].x > row.children[0].x);
        assert_eq!(row.children[0].y, row.children[1].y);
    }

    #[test]
    fn data_uri_image_takes_explicit_size() {
        let markup = format!(
            r#"<div><img src="{}" style="width: 40px"></div>"#,
            png_data_uri(4, 4)
        );
        let l = layout(&markup, 400.0).unwrap();
        let img = &l.boxes[0].children[0];
        assert!(matches!(img.content, BoxContent::Image { .. }));
        assert_eq!(img.width, 40.0);
        assert_eq!(img.height, 40.0);
    }

    #[test]
    fn remote_image_is_unsupported() {
        let err = layout(r#"<img src="https://example.com/a.png">"#, 400.0).unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedResource(_)));
    }

    #[test]
    fn empty_markup_has_zero_height() {
        let l = layout("", 400.0).unwrap();
        assert!(l.boxes.is_empty());
        assert_eq!(l.height, 0.0);
    }
}
