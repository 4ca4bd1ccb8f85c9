//! Content block builders.
//!
//! Pure functions from domain data to [`ContentBlock`]s. All user text is
//! escaped before it is embedded in markup. Builders never render and never
//! fail; layout problems surface later, from the rasterizer.

use chrono::NaiveDate;

use crate::content::{BlockRole, ContentBlock, CoverOptions, Entry, EntryBlocks, SectionData, SectionMeta};
use crate::markup::escape_text;

/// Gap after the cover block, in mm.
pub const COVER_SPACING_MM: f64 = 0.0;
pub const HEADER_SPACING_MM: f64 = 15.0;
pub const PREAMBLE_SPACING_MM: f64 = 15.0;
pub const ENTRY_SPACING_MM: f64 = 10.0;
pub const FOOTER_SPACING_MM: f64 = 0.0;

/// Annotations longer than this many characters are cut and end in "...".
pub const MAX_ANNOTATION_CHARS: usize = 5000;

/// Shown in place of an annotation the provider did not supply.
pub const MISSING_ANNOTATION: &str = "Translation not available";

/// The fixed opening line of sections that carry a preamble, with its gloss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreambleText {
    pub text: String,
    pub gloss: String,
}

impl Default for PreambleText {
    fn default() -> Self {
        Self {
            text: "بِسْمِ اللَّهِ الرَّحْمَٰنِ الرَّحِيمِ".to_string(),
            gloss: "In the name of Allah, the Most Gracious, the Most Merciful".to_string(),
        }
    }
}

/// All blocks of one section in placement order.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionBlocks {
    pub header: ContentBlock,
    pub preamble: Option<ContentBlock>,
    pub entries: Vec<EntryBlocks>,
}

fn format_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

pub fn cover_block(sections: &[SectionData], options: &CoverOptions, generated_on: NaiveDate) -> ContentBlock {
    let mut markup = String::from(
        r#"<div style="text-align: center; padding: 160px 40px 60px 40px; border: 2px solid #2563eb; border-radius: 12px;">"#,
    );
    markup.push_str(&format!(
        r#"<h1 style="color: #2563eb; font-size: 40px; margin: 0 0 20px 0;">{}</h1>"#,
        escape_text(&options.title)
    ));
    if !options.subtitle.is_empty() {
        markup.push_str(&format!(
            r#"<h2 style="color: #1f2937; font-size: 22px; font-weight: normal; margin: 0 0 40px 0;">{}</h2>"#,
            escape_text(&options.subtitle)
        ));
    }
    if options.include_stats {
        let entries: usize = sections.iter().map(|s| s.entries.len()).sum();
        markup.push_str(&format!(
            r#"<p style="color: #4b5563; font-size: 16px; margin: 0 0 10px 0;">{} • {}</p>"#,
            plural(sections.len(), "chapter", "chapters"),
            plural(entries, "verse", "verses")
        ));
        let names: Vec<String> = sections.iter().map(|s| escape_text(&s.meta.name)).collect();
        if !names.is_empty() {
            markup.push_str(&format!(
                r#"<p style="color: #6b7280; font-size: 14px; margin: 0 0 10px 0;">{}</p>"#,
                names.join(", ")
            ));
        }
    }
    if options.include_date {
        markup.push_str(&format!(
            r#"<p style="color: #9ca3af; font-size: 12px; margin: 30px 0 0 0;">Generated on {}</p>"#,
            format_date(generated_on)
        ));
    }
    markup.push_str("</div>");
    ContentBlock::new(BlockRole::Cover, markup, COVER_SPACING_MM)
}

/// `position` is the section's 1-based position in the document.
pub fn section_header_block(position: usize, meta: &SectionMeta) -> ContentBlock {
    let mut markup = String::from(
        r#"<div style="text-align: center; border-bottom: 2px solid #2563eb; padding-bottom: 20px;">"#,
    );
    markup.push_str(&format!(
        r#"<h1 style="color: #2563eb; margin: 0 0 10px 0; font-size: 28px;">{}</h1>"#,
        escape_text(&meta.name)
    ));
    if !meta.native_name.is_empty() {
        markup.push_str(&format!(
            r#"<h2 style="color: #1f2937; margin: 0 0 10px 0; font-size: 24px; font-weight: normal;">{}</h2>"#,
            escape_text(&meta.native_name)
        ));
    }
    markup.push_str(&format!(
        r#"<p style="color: #6b7280; margin: 0; font-size: 14px;">Chapter {} • {}</p></div>"#,
        meta.id,
        plural(meta.entry_count as usize, "verse", "verses")
    ));
    ContentBlock::new(BlockRole::SectionHeader { section: position }, markup, HEADER_SPACING_MM)
}

pub fn preamble_block(position: usize, preamble: &PreambleText) -> ContentBlock {
    let markup = format!(
        concat!(
            r#"<div style="text-align: center; padding: 20px; background-color: #f3f4f6; border-radius: 8px;">"#,
            r#"<p dir="rtl" style="font-size: 20px; color: #1f2937; margin: 0;">{}</p>"#,
            r#"<p style="font-size: 12px; color: #6b7280; margin: 5px 0 0 0;">{}</p>"#,
            "</div>"
        ),
        escape_text(&preamble.text),
        escape_text(&preamble.gloss)
    );
    ContentBlock::new(BlockRole::Preamble { section: position }, markup, PREAMBLE_SPACING_MM)
}

/// Annotation text as displayed: missing texts are replaced and very long
/// ones truncated on a character boundary.
pub fn display_annotation(text: Option<&str>) -> String {
    let text = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return MISSING_ANNOTATION.to_string(),
    };
    match text.char_indices().nth(MAX_ANNOTATION_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn badge(diameter: u32, font_size: u32, label: &str) -> String {
    format!(
        concat!(
            r#"<span style="background-color: #252525; color: white; width: {d}px; height: {d}px; "#,
            r#"border-radius: 50%; display: flex; align-items: center; justify-content: center; "#,
            r#"font-size: {f}px; font-weight: bold;">{l}</span>"#
        ),
        d = diameter,
        f = font_size,
        l = label
    )
}

/// Entry block plus its reduced-fidelity fallback.
pub fn entry_blocks(position: usize, entry: &Entry) -> EntryBlocks {
    let role = BlockRole::Entry {
        section: position,
        index: entry.index,
    };
    let primary_text = escape_text(&entry.primary);

    let mut markup = String::from(
        r#"<div style="padding: 20px; border: 1px solid #e5e7eb; border-radius: 8px; background-color: #f3f4f6;">"#,
    );
    markup.push_str(
        r#"<div style="display: flex; justify-content: space-between; align-items: center; margin-bottom: 15px;">"#,
    );
    markup.push_str(&badge(30, 14, &entry.index.to_string()));
    for marker in &entry.markers {
        markup.push_str(&format!(
            r#"<span style="background-color: #10b981; color: white; padding: 5px 10px; border-radius: 20px; font-size: 12px;">{} {}</span>"#,
            escape_text(&marker.label),
            marker.value
        ));
    }
    markup.push_str("</div>");
    markup.push_str(&format!(
        r#"<div style="text-align: right; margin-bottom: 15px;"><p dir="rtl" style="font-size: 24px; color: #1f2937; margin: 0; line-height: 1.8;">{primary_text}</p></div>"#
    ));
    if !entry.annotations.is_empty() {
        markup.push_str(r#"<div style="border-top: 1px solid #e5e7eb; padding-top: 15px;">"#);
        for annotation in &entry.annotations {
            markup.push_str(&format!(
                r#"<p style="font-size: 14px; color: #4b5563; margin: 0 0 10px 0; font-style: italic; line-height: 1.6;">{}</p>"#,
                escape_text(&display_annotation(annotation.as_deref()))
            ));
        }
        markup.push_str("</div>");
    }
    markup.push_str("</div>");

    let fallback = format!(
        concat!(
            r#"<div style="padding: 15px; border: 1px solid #e5e7eb; background-color: #f3f4f6;">"#,
            r#"<p style="font-size: 12px; font-weight: bold; margin: 0 0 10px 0;">{}</p>"#,
            r#"<p dir="rtl" style="font-size: 18px; color: #1f2937; margin: 0; line-height: 1.6; text-align: right;">{}</p>"#,
            "</div>"
        ),
        entry.index, primary_text
    );

    EntryBlocks {
        primary: ContentBlock::new(role, markup, ENTRY_SPACING_MM),
        fallback: ContentBlock::new(role, fallback, ENTRY_SPACING_MM),
    }
}

/// Header, optional preamble and entry blocks of one section.
pub fn section_blocks(position: usize, section: &SectionData, preamble: &PreambleText) -> SectionBlocks {
    SectionBlocks {
        header: section_header_block(position, &section.meta),
        preamble: section
            .meta
            .has_preamble
            .then(|| preamble_block(position, preamble)),
        entries: section
            .entries
            .iter()
            .map(|e| entry_blocks(position, e))
            .collect(),
    }
}

pub fn footer_block(label: &str, generated_on: NaiveDate) -> ContentBlock {
    let markup = format!(
        concat!(
            r#"<div style="text-align: center; border-top: 1px solid #e5e7eb; padding-top: 10px; margin-top: 10px;">"#,
            r#"<p style="font-size: 10px; color: #9ca3af; margin: 0;">{} • {}</p>"#,
            "</div>"
        ),
        escape_text(label),
        format_date(generated_on)
    );
    ContentBlock::new(BlockRole::Footer, markup, FOOTER_SPACING_MM)
}
