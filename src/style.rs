//! Style resolver – maps tag defaults and inline `style` attributes to a
//! flat [`ComputedStyle`] consumed by the block layout.

use std::collections::HashMap;

use crate::markup::{Element, Node, Tag};

/// Fully resolved style for a single element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    // Display / layout
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    pub gap: f32,

    // Sizing
    pub width: Dimension,
    pub height: Dimension,

    // Box model (px)
    pub margin: Edges,
    pub padding: Edges,
    pub border: Edges,
    pub border_color: Color,
    pub border_radius: Radius,

    // Typography
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,

    pub background_color: Color,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            justify_content: JustifyContent::Start,
            align_items: AlignItems::Stretch,
            gap: 0.0,
            width: Dimension::Auto,
            height: Dimension::Auto,
            margin: Edges::ZERO,
            padding: Edges::ZERO,
            border: Edges::ZERO,
            border_color: Color::BLACK,
            border_radius: Radius::None,
            font_size: 16.0,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.4,
            background_color: Color::TRANSPARENT,
        }
    }
}

impl ComputedStyle {
    pub fn is_bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    pub fn is_italic(&self) -> bool {
        self.font_style == FontStyle::Italic
    }

    /// Typography only; box properties reset to their defaults.
    pub fn text_style(&self) -> ComputedStyle {
        ComputedStyle {
            display: Display::Inline,
            font_size: self.font_size,
            font_weight: self.font_weight,
            font_style: self.font_style,
            color: self.color,
            text_align: self.text_align,
            line_height: self.line_height,
            ..ComputedStyle::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Inline,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JustifyContent {
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignItems {
    Start,
    End,
    Center,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Px(f32),
    Percent(f32),
}

/// Corner radius; percentages resolve against the box's smaller side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Radius {
    None,
    Px(f32),
    Percent(f32),
}

impl Radius {
    pub fn resolve(self, width: f32, height: f32) -> f32 {
        let limit = width.min(height) / 2.0;
        match self {
            Radius::None => 0.0,
            Radius::Px(r) => r.min(limit),
            Radius::Percent(p) => (width.min(height) * p / 100.0).min(limit),
        }
    }
}

/// Per-side lengths in px.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub const ZERO: Self = Self::all(0.0);

    pub const fn all(v: f32) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }

    pub fn is_zero(&self) -> bool {
        self.top <= 0.0 && self.right <= 0.0 && self.bottom <= 0.0 && self.left <= 0.0
    }

    pub fn is_uniform(&self) -> bool {
        self.top == self.right && self.right == self.bottom && self.bottom == self.left
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Parse `#rgb`, `#rrggbb`, `rgb(r, g, b)` or a few named colours.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        match value.to_ascii_lowercase().as_str() {
            "white" => return Some(Self::WHITE),
            "black" => return Some(Self::BLACK),
            "transparent" | "none" => return Some(Self::TRANSPARENT),
            _ => {}
        }
        if let Some(hex) = value.strip_prefix('#') {
            return Self::from_hex(hex);
        }
        let inner = value.strip_prefix("rgb(")?.strip_suffix(')')?;
        let channels: Vec<f32> = inner
            .split(',')
            .filter_map(|c| c.trim().parse::<f32>().ok())
            .collect();
        match channels.as_slice() {
            [r, g, b] => Some(Self::rgb(r / 255.0, g / 255.0, b / 255.0)),
            _ => None,
        }
    }

    fn from_hex(hex: &str) -> Option<Self> {
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for an element, inheriting text properties from its parent.
pub fn resolve_style(element: &Element, parent: Option<&ComputedStyle>) -> ComputedStyle {
    let mut style = ComputedStyle::default();

    if let Some(p) = parent {
        style.font_size = p.font_size;
        style.font_weight = p.font_weight;
        style.font_style = p.font_style;
        style.color = p.color;
        style.text_align = p.text_align;
        style.line_height = p.line_height;
    }

    apply_tag_defaults(&mut style, element.tag);

    if let Some(inline) = element.inline_style() {
        apply_inline_style(&mut style, inline);
    }

    style
}

fn apply_tag_defaults(s: &mut ComputedStyle, tag: Tag) {
    match tag {
        Tag::H1 => {
            s.font_size = 28.0;
            s.font_weight = FontWeight::Bold;
            s.line_height = 1.25;
        }
        Tag::H2 => {
            s.font_size = 22.0;
            s.font_weight = FontWeight::Bold;
            s.line_height = 1.25;
        }
        Tag::H3 => {
            s.font_size = 18.0;
            s.font_weight = FontWeight::Bold;
            s.line_height = 1.25;
        }
        Tag::Span => s.display = Display::Inline,
        Tag::Div | Tag::P | Tag::Img => {}
    }
}

/// Apply a `style` attribute value (`prop: value; ...`).
pub fn apply_inline_style(s: &mut ComputedStyle, style_str: &str) {
    for decl in style_str.split(';') {
        let Some((prop, val)) = decl.split_once(':') else {
            continue;
        };
        apply_css_property(s, prop.trim(), val.trim());
    }
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str) {
    match prop {
        "display" => {
            s.display = match val {
                "flex" | "inline-flex" => Display::Flex,
                "block" => Display::Block,
                "inline" | "inline-block" => Display::Inline,
                "none" => Display::None,
                _ => s.display,
            }
        }
        "flex-direction" => {
            s.flex_direction = match val {
                "column" => FlexDirection::Column,
                _ => FlexDirection::Row,
            }
        }
        "justify-content" => {
            s.justify_content = match val {
                "flex-end" | "end" => JustifyContent::End,
                "center" => JustifyContent::Center,
                "space-between" => JustifyContent::SpaceBetween,
                "space-around" => JustifyContent::SpaceAround,
                _ => JustifyContent::Start,
            }
        }
        "align-items" => {
            s.align_items = match val {
                "flex-start" | "start" => AlignItems::Start,
                "flex-end" | "end" => AlignItems::End,
                "center" => AlignItems::Center,
                _ => AlignItems::Stretch,
            }
        }
        "gap" => {
            if let Some(px) = parse_px(val) {
                s.gap = px;
            }
        }
        "width" => s.width = parse_dimension(val),
        "height" => s.height = parse_dimension(val),
        "margin" => apply_shorthand_edges(val, &mut s.margin),
        "margin-top" => set_px(val, &mut s.margin.top),
        "margin-right" => set_px(val, &mut s.margin.right),
        "margin-bottom" => set_px(val, &mut s.margin.bottom),
        "margin-left" => set_px(val, &mut s.margin.left),
        "padding" => apply_shorthand_edges(val, &mut s.padding),
        "padding-top" => set_px(val, &mut s.padding.top),
        "padding-right" => set_px(val, &mut s.padding.right),
        "padding-bottom" => set_px(val, &mut s.padding.bottom),
        "padding-left" => set_px(val, &mut s.padding.left),
        "border" => {
            let width = apply_border_shorthand(s, val);
            s.border = Edges::all(width);
        }
        "border-top" => s.border.top = apply_border_shorthand(s, val),
        "border-right" => s.border.right = apply_border_shorthand(s, val),
        "border-bottom" => s.border.bottom = apply_border_shorthand(s, val),
        "border-left" => s.border.left = apply_border_shorthand(s, val),
        "border-width" => {
            if let Some(px) = parse_px(val) {
                s.border = Edges::all(px);
            }
        }
        "border-color" => {
            if let Some(c) = Color::parse(val) {
                s.border_color = c;
            }
        }
        "border-radius" => {
            s.border_radius = if let Some(p) = val.strip_suffix('%') {
                p.trim().parse().map(Radius::Percent).unwrap_or(Radius::None)
            } else {
                parse_px(val).map(Radius::Px).unwrap_or(Radius::None)
            };
        }
        "background-color" | "background" => {
            if let Some(c) = Color::parse(val) {
                s.background_color = c;
            }
        }
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "font-size" => set_px(val, &mut s.font_size),
        "font-weight" => {
            s.font_weight = match val {
                "bold" | "bolder" | "600" | "700" | "800" | "900" => FontWeight::Bold,
                _ => FontWeight::Normal,
            }
        }
        "font-style" => {
            s.font_style = match val {
                "italic" | "oblique" => FontStyle::Italic,
                _ => FontStyle::Normal,
            }
        }
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "line-height" => {
            if let Ok(v) = val.parse::<f32>() {
                s.line_height = v;
            } else if let Some(px) = parse_px(val) {
                s.line_height = px / s.font_size.max(1.0);
            }
        }
        _ => log::trace!("ignoring unsupported style property '{prop}'"),
    }
}

fn set_px(val: &str, slot: &mut f32) {
    if let Some(px) = parse_px(val) {
        *slot = px;
    }
}

fn parse_px(s: &str) -> Option<f32> {
    s.trim().trim_end_matches("px").trim().parse().ok()
}

fn parse_dimension(s: &str) -> Dimension {
    let s = s.trim();
    if s == "auto" {
        Dimension::Auto
    } else if let Some(p) = s.strip_suffix('%') {
        p.parse::<f32>().map(Dimension::Percent).unwrap_or(Dimension::Auto)
    } else {
        parse_px(s).map(Dimension::Px).unwrap_or(Dimension::Auto)
    }
}

fn apply_shorthand_edges(val: &str, edges: &mut Edges) {
    let parts: Vec<f32> = val.split_whitespace().filter_map(parse_px).collect();
    match parts.as_slice() {
        [v] => *edges = Edges::all(*v),
        [v, h] => {
            *edges = Edges {
                top: *v,
                right: *h,
                bottom: *v,
                left: *h,
            }
        }
        [t, h, b] => {
            *edges = Edges {
                top: *t,
                right: *h,
                bottom: *b,
                left: *h,
            }
        }
        [t, r, b, l] => {
            *edges = Edges {
                top: *t,
                right: *r,
                bottom: *b,
                left: *l,
            }
        }
        _ => {}
    }
}

/// Parse `<width> <style> <color>` (any order); records the colour and
/// returns the width, or 0 for `none`.
fn apply_border_shorthand(s: &mut ComputedStyle, val: &str) -> f32 {
    let mut width = 0.0;
    for part in val.split_whitespace() {
        if part == "none" || part == "0" {
            return 0.0;
        }
        if let Some(px) = part.strip_suffix("px").and_then(|p| p.parse::<f32>().ok()) {
            width = px;
        } else if let Some(c) = Color::parse(part) {
            s.border_color = c;
        }
    }
    width
}

// ---------------------------------------------------------------------------
// Styled tree
// ---------------------------------------------------------------------------

/// A markup node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        attrs: HashMap<String, String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

/// Build a styled tree from parsed markup, resolving styles top-down.
/// Elements with `display: none` are dropped.
pub fn build_styled_tree(nodes: &[Node], parent_style: Option<&ComputedStyle>) -> Vec<StyledNode> {
    let mut result = Vec::new();
    for node in nodes {
        match node {
            Node::Element(e) => {
                let style = resolve_style(e, parent_style);
                if style.display == Display::None {
                    continue;
                }
                let children = build_styled_tree(&e.children, Some(&style));
                result.push(StyledNode::Element {
                    tag: e.tag,
                    style,
                    children,
                    attrs: e.attributes.clone(),
                });
            }
            Node::Text(text) => {
                if text.trim().is_empty() {
                    continue;
                }
                // Text only inherits typography; box properties stay on the
                // owning element.
                let style = parent_style.cloned().unwrap_or_default().text_style();
                result.push(StyledNode::Text {
                    text: text.clone(),
                    style,
                });
            }
        }
    }
    result
}
