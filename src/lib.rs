//! # chapterbook – paginated PDF books from chaptered content
//!
//! This crate turns an ordered selection of chapters (each a list of
//! verses with translations and markers) into a fixed-size, multi-page PDF.
//! The pipeline stages are:
//!
//! 1. **Fetch** – provider records → validated [`content::SectionData`] ([`provider`])
//! 2. **Build** – cover, header, preamble, entry and footer markup ([`blocks`])
//! 3. **Rasterize** – markup → styled tree → Taffy layout → pixels ([`markup`], [`style`], [`layout`], [`raster`])
//! 4. **Paginate** – stack rasters top-to-bottom onto A4 pages ([`pagination`], [`assembler`])
//! 5. **Serialize** – embed every raster into a PDF via printpdf ([`pdf`])
//! 6. **Deliver** – name the artifact and hand it to a sink ([`pipeline`])
//!
//! A C-compatible FFI surface is exposed via the [`ffi`] module.

pub mod assembler;
pub mod blocks;
pub mod content;
pub mod document;
pub mod error;
pub mod ffi;
pub mod fonts;
pub mod layout;
pub mod markup;
pub mod pagination;
pub mod pdf;
pub mod pipeline;
pub mod provider;
pub mod raster;
pub mod samples;
pub mod style;
pub mod units;

// Re-exports for convenience
pub use assembler::{Assembler, AssemblyConfig};
pub use content::{BlockRole, ContentBlock, CoverOptions, Entry, SectionData, SectionMeta};
pub use document::{Document, DocumentLayout};
pub use error::{AssemblyError, InputError, PipelineError, RenderError, SerializeError};
pub use pagination::PageGeometry;
pub use pipeline::{generate_book, Artifact, DirectorySink, MemorySink, OutputSink, Pipeline};
pub use raster::{HtmlRasterizer, RasterImage, Rasterizer};
