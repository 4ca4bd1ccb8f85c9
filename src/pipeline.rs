//! Pipeline – ties together assembly, PDF serialization, naming and
//! delivery into a single call.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::assembler::{Assembler, AssemblyConfig};
use crate::content::{CoverOptions, SectionData};
use crate::document::Document;
use crate::error::PipelineError;
use crate::pdf::write_pdf;
use crate::raster::{HtmlRasterizer, Rasterizer};

/// A finished, named PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Destination for finished artifacts.
pub trait OutputSink {
    fn deliver(&mut self, artifact: Artifact) -> io::Result<()>;
}

/// Writes artifacts into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    /// Paths of the files written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl OutputSink for DirectorySink {
    fn deliver(&mut self, artifact: Artifact) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&artifact.name);
        fs::write(&path, &artifact.bytes)?;
        log::info!("wrote {} ({} bytes)", path.display(), artifact.bytes.len());
        self.written.push(path);
        Ok(())
    }
}

/// Keeps artifacts in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    artifacts: Vec<Artifact>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn into_artifacts(self) -> Vec<Artifact> {
        self.artifacts
    }
}

impl OutputSink for MemorySink {
    fn deliver(&mut self, artifact: Artifact) -> io::Result<()> {
        self.artifacts.push(artifact);
        Ok(())
    }
}

/// File name for a document of `sections`: the sanitized display name for
/// a single section, otherwise `Chapters_<n>_Selected.pdf`.
pub fn artifact_name(sections: &[SectionData]) -> String {
    match sections {
        [only] => {
            let stem = sanitize_file_stem(&only.meta.name);
            if stem.is_empty() {
                format!("Chapter_{}.pdf", only.meta.id)
            } else {
                format!("{stem}.pdf")
            }
        }
        _ => format!("Chapters_{}_Selected.pdf", sections.len()),
    }
}

/// Collapse every run of non-alphanumeric characters into one `_`.
fn sanitize_file_stem(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Assembly → PDF → delivery.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    assembler: Assembler,
}

impl Pipeline {
    pub fn new(config: AssemblyConfig) -> Self {
        Self {
            assembler: Assembler::new(config),
        }
    }

    /// Assemble and serialize without delivering.
    pub fn build<R: Rasterizer + ?Sized>(
        &self,
        sections: &[SectionData],
        cover: &CoverOptions,
        rasterizer: &mut R,
    ) -> Result<(Document, Artifact), PipelineError> {
        let document = self.assembler.assemble(sections, cover, rasterizer)?;
        let bytes = write_pdf(&document)?;
        let artifact = Artifact {
            name: artifact_name(sections),
            bytes,
        };
        Ok((document, artifact))
    }

    /// Build the artifact and hand it to `sink`. On any error the sink
    /// receives nothing.
    pub fn run<R: Rasterizer + ?Sized, S: OutputSink + ?Sized>(
        &self,
        sections: &[SectionData],
        cover: &CoverOptions,
        rasterizer: &mut R,
        sink: &mut S,
    ) -> Result<Document, PipelineError> {
        let (document, artifact) = self.build(sections, cover, rasterizer)?;
        let name = artifact.name.clone();
        sink.deliver(artifact)
            .map_err(|source| PipelineError::Deliver { name, source })?;
        Ok(document)
    }
}

/// Convenience: PDF bytes for `sections` with default settings.
pub fn generate_book(sections: &[SectionData], cover: &CoverOptions) -> Result<Vec<u8>, PipelineError> {
    let mut rasterizer = HtmlRasterizer::default();
    let (_, artifact) = Pipeline::default().build(sections, cover, &mut rasterizer)?;
    Ok(artifact.bytes)
}
