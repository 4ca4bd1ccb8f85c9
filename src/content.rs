//! Domain data handed to the engine and the content blocks built from it.
//!
//! Sections arrive already validated (see [`crate::provider`]); blocks are
//! immutable once built and are consumed exactly once by a rasterizer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Section-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionMeta {
    /// Provider identifier (chapter number).
    pub id: u32,
    /// Display name, also used for artifact naming.
    pub name: String,
    /// Name in the section's own script.
    #[serde(default)]
    pub native_name: String,
    /// Entry count advertised by the provider.
    pub entry_count: u32,
    /// Whether the section opens with the preamble block.
    #[serde(default)]
    pub has_preamble: bool,
}

/// A labelled numeric marker shown as a badge on an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub label: String,
    pub value: u32,
}

impl Marker {
    pub fn new(label: impl Into<String>, value: u32) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// The smallest content unit of a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub index: u32,
    pub primary: String,
    /// Secondary texts in provider order; `None` marks a missing text.
    #[serde(default)]
    pub annotations: Vec<Option<String>>,
    #[serde(default)]
    pub markers: Vec<Marker>,
}

impl Entry {
    pub fn new(index: u32, primary: impl Into<String>) -> Self {
        Self {
            index,
            primary: primary.into(),
            annotations: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, text: impl Into<String>) -> Self {
        self.annotations.push(Some(text.into()));
        self
    }

    pub fn with_marker(mut self, label: impl Into<String>, value: u32) -> Self {
        self.markers.push(Marker::new(label, value));
        self
    }
}

/// One section with its ordered entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionData {
    pub meta: SectionMeta,
    pub entries: Vec<Entry>,
}

impl SectionData {
    /// A section without preamble whose advertised count matches `entries`.
    pub fn new(id: u32, name: impl Into<String>, entries: Vec<Entry>) -> Self {
        Self {
            meta: SectionMeta {
                id,
                name: name.into(),
                native_name: String::new(),
                entry_count: entries.len() as u32,
                has_preamble: false,
            },
            entries,
        }
    }

    pub fn with_native_name(mut self, native: impl Into<String>) -> Self {
        self.meta.native_name = native.into();
        self
    }

    pub fn with_preamble(mut self, has_preamble: bool) -> Self {
        self.meta.has_preamble = has_preamble;
        self
    }
}

/// Options consumed by the cover builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverOptions {
    pub title: String,
    pub subtitle: String,
    pub include_date: bool,
    pub include_stats: bool,
}

impl Default for CoverOptions {
    fn default() -> Self {
        Self {
            title: "Holy Quran".to_string(),
            subtitle: "Selected Chapters".to_string(),
            include_date: true,
            include_stats: true,
        }
    }
}

/// Where a block sits in the document. Sections are numbered from 1 in
/// input order; entries carry their own index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockRole {
    Cover,
    SectionHeader { section: usize },
    Preamble { section: usize },
    Entry { section: usize, index: u32 },
    Footer,
}

impl fmt::Display for BlockRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockRole::Cover => write!(f, "Cover"),
            BlockRole::SectionHeader { section } => write!(f, "Chapter {section} header"),
            BlockRole::Preamble { section } => write!(f, "Chapter {section} preamble"),
            BlockRole::Entry { section, index } => write!(f, "Chapter {section}, verse {index}"),
            BlockRole::Footer => write!(f, "Footer"),
        }
    }
}

/// An opaque renderable unit: markup plus the gap reserved after it.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    markup: String,
    spacing_mm: f64,
    role: BlockRole,
}

impl ContentBlock {
    pub fn new(role: BlockRole, markup: impl Into<String>, spacing_mm: f64) -> Self {
        Self {
            markup: markup.into(),
            spacing_mm: spacing_mm.max(0.0),
            role,
        }
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn spacing_mm(&self) -> f64 {
        self.spacing_mm
    }

    pub fn role(&self) -> BlockRole {
        self.role
    }
}

/// An entry block together with the plain-text block used if it fails.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryBlocks {
    pub primary: ContentBlock,
    pub fallback: ContentBlock,
}
