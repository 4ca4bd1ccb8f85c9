//! Error types for every stage of the book pipeline.

use std::io;

use thiserror::Error;

use crate::content::BlockRole;

/// Problems with the input before any rendering starts.
#[derive(Error, Debug)]
pub enum InputError {
    /// No section identifiers were requested.
    #[error("Please select at least one chapter")]
    NoSectionsSelected,

    /// The provider could not supply a section.
    #[error("Chapter {id} is unavailable: {reason}")]
    Unavailable { id: u32, reason: String },

    /// A provider record failed validation.
    #[error("Chapter {id} record is invalid: {reason}")]
    InvalidRecord { id: u32, reason: String },

    /// Page size and margins leave no usable area.
    #[error("Invalid page geometry: {0}")]
    InvalidGeometry(String),

    /// A font file could not be parsed.
    #[error("Invalid font: {0}")]
    InvalidFont(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A content block could not be rasterized.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The markup is structurally broken.
    #[error("Markup parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// The markup uses an element outside the supported subset.
    #[error("Unsupported element <{0}>")]
    UnsupportedElement(String),

    /// An embedded resource cannot be loaded.
    #[error("Unsupported resource: {0}")]
    UnsupportedResource(String),

    /// The flex layout could not be computed.
    #[error("Layout error: {0}")]
    Layout(String),

    /// The off-screen surface could not be allocated.
    #[error("Cannot allocate a {width}x{height} px render surface")]
    Surface { width: u32, height: u32 },
}

/// Assembly aborted; no document was produced.
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("No chapters to assemble")]
    EmptyInput,

    #[error(transparent)]
    Input(#[from] InputError),

    /// An entry failed to render, and so did its fallback.
    #[error("Chapter {section}, verse {entry} failed to render: {source}")]
    RenderFailed {
        section: usize,
        entry: u32,
        #[source]
        source: RenderError,
    },

    /// A cover, header, preamble or footer block failed to render.
    #[error("{role} failed to render: {source}")]
    BlockFailed {
        role: BlockRole,
        #[source]
        source: RenderError,
    },
}

/// The finished document could not be encoded as PDF.
#[derive(Error, Debug)]
pub enum SerializeError {
    #[error("Page {page}: cannot encode block image: {message}")]
    ImageEncode { page: usize, message: String },

    #[error("Page {page}: cannot embed block image: {message}")]
    ImageEmbed { page: usize, message: String },
}

/// Top-level error surfaced to callers of [`crate::pipeline`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error("Cannot deliver '{name}': {source}")]
    Deliver {
        name: String,
        #[source]
        source: io::Error,
    },
}
