//! Document assembly – drives builders, the rasterizer and the page flow in
//! document order.

use chrono::{Local, NaiveDate};

use crate::blocks::{cover_block, footer_block, section_blocks, PreambleText};
use crate::content::{ContentBlock, CoverOptions, EntryBlocks, SectionData};
use crate::document::Document;
use crate::error::{AssemblyError, RenderError};
use crate::pagination::{PageFlow, PageGeometry};
use crate::raster::{RasterImage, Rasterizer};

/// Settings for one assembly run.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyConfig {
    pub geometry: PageGeometry,
    /// Date printed on the cover and in the footer.
    pub generated_on: NaiveDate,
    pub preamble: PreambleText,
    pub footer_label: String,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            geometry: PageGeometry::default(),
            generated_on: Local::now().date_naive(),
            preamble: PreambleText::default(),
            footer_label: "Generated by chapterbook".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Assembler {
    config: AssemblyConfig,
}

impl Assembler {
    pub fn new(config: AssemblyConfig) -> Self {
        Self { config }
    }

    /// Render and place the cover, every section and the footer. Sections
    /// and entries are placed strictly in input order; each section starts
    /// on a new page.
    pub fn assemble<R: Rasterizer + ?Sized>(
        &self,
        sections: &[SectionData],
        cover: &CoverOptions,
        rasterizer: &mut R,
    ) -> Result<Document, AssemblyError> {
        if sections.is_empty() {
            return Err(AssemblyError::EmptyInput);
        }
        self.config.geometry.validate()?;
        let width_px = self.config.geometry.content_px_width();
        let mut flow = PageFlow::new(self.config.geometry, cover.title.clone());

        let block = cover_block(sections, cover, self.config.generated_on);
        place_block(&mut flow, rasterizer, &block, width_px)?;

        for (i, section) in sections.iter().enumerate() {
            let position = i + 1;
            log::debug!(
                "chapter {position}: '{}' with {} verse(s)",
                section.meta.name,
                section.entries.len()
            );
            flow.force_new_page();

            let blocks = section_blocks(position, section, &self.config.preamble);
            place_block(&mut flow, rasterizer, &blocks.header, width_px)?;
            if let Some(preamble) = &blocks.preamble {
                place_block(&mut flow, rasterizer, preamble, width_px)?;
            }
            for (entry, entry_blocks) in section.entries.iter().zip(&blocks.entries) {
                let image = render_entry(rasterizer, entry_blocks, width_px).map_err(|source| {
                    AssemblyError::RenderFailed {
                        section: position,
                        entry: entry.index,
                        source,
                    }
                })?;
                let primary = &entry_blocks.primary;
                flow.place_next(image, primary.role(), primary.spacing_mm());
            }
        }

        let footer = footer_block(&self.config.footer_label, self.config.generated_on);
        place_block(&mut flow, rasterizer, &footer, width_px)?;

        let document = flow.seal_and_finalize();
        log::info!(
            "assembled {} chapter(s) into {} page(s)",
            sections.len(),
            document.page_count()
        );
        Ok(document)
    }
}

fn place_block<R: Rasterizer + ?Sized>(
    flow: &mut PageFlow,
    rasterizer: &mut R,
    block: &ContentBlock,
    width_px: u32,
) -> Result<(), AssemblyError> {
    let image = rasterizer
        .render(block, width_px)
        .map_err(|source| AssemblyError::BlockFailed {
            role: block.role(),
            source,
        })?;
    flow.place_next(image, block.role(), block.spacing_mm());
    Ok(())
}

/// Render an entry, retrying once with its fallback block.
fn render_entry<R: Rasterizer + ?Sized>(
    rasterizer: &mut R,
    blocks: &EntryBlocks,
    width_px: u32,
) -> Result<RasterImage, RenderError> {
    match rasterizer.render(&blocks.primary, width_px) {
        Ok(image) => Ok(image),
        Err(err) => {
            log::warn!(
                "{} failed to render ({err}); retrying with plain fallback",
                blocks.primary.role()
            );
            rasterizer.render(&blocks.fallback, width_px)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{BlockRole, Entry};
    use crate::error::InputError;

    /// Renders every block as a 680 × 100 px raster and records roles.
    #[derive(Default)]
    struct FixedRasterizer {
        calls: Vec<BlockRole>,
    }

    impl Rasterizer for FixedRasterizer {
        fn render(&mut self, block: &ContentBlock, width: u32) -> Result<RasterImage, RenderError> {
            self.calls.push(block.role());
            Ok(RasterImage::blank(width, 100))
        }
    }

    fn fixed_config() -> AssemblyConfig {
        AssemblyConfig {
            generated_on: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            ..AssemblyConfig::default()
        }
    }

    #[test]
    fn empty_input_renders_nothing() {
        let mut r = FixedRasterizer::default();
        let err = Assembler::new(fixed_config())
            .assemble(&[], &CoverOptions::default(), &mut r)
            .unwrap_err();
        assert!(matches!(err, AssemblyError::EmptyInput));
        assert!(r.calls.is_empty());
    }

    #[test]
    fn block_order_for_one_section() {
        let section = SectionData::new(
            7,
            "Test",
            vec![Entry::new(1, "a"), Entry::new(2, "b"), Entry::new(3, "c")],
        );
        let mut r = FixedRasterizer::default();
        let doc = Assembler::new(fixed_config())
            .assemble(&[section], &CoverOptions::default(), &mut r)
            .unwrap();
        let expected = vec![
            BlockRole::Cover,
            BlockRole::SectionHeader { section: 1 },
            BlockRole::Entry { section: 1, index: 1 },
            BlockRole::Entry { section: 1, index: 2 },
            BlockRole::Entry { section: 1, index: 3 },
            BlockRole::Footer,
        ];
        assert_eq!(doc.roles(), expected);
        assert_eq!(r.calls, expected);
        // cover alone on page 0, the section starts page 1
        assert_eq!(doc.pages()[0].placements.len(), 1);
        assert_eq!(doc.pages()[1].placements[0].role, BlockRole::SectionHeader { section: 1 });
    }

    #[test]
    fn invalid_geometry_renders_nothing() {
        let config = AssemblyConfig {
            geometry: PageGeometry {
                margin_mm: 110.0,
                ..PageGeometry::default()
            },
            ..fixed_config()
        };
        let section = SectionData::new(1, "S", vec![Entry::new(1, "a")]);
        let mut r = FixedRasterizer::default();
        let err = Assembler::new(config)
            .assemble(&[section], &CoverOptions::default(), &mut r)
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::Input(InputError::InvalidGeometry(_))
        ));
        assert!(r.calls.is_empty());
    }

    #[test]
    fn failing_header_is_a_block_failure() {
        struct HeaderFails;
        impl Rasterizer for HeaderFails {
            fn render(&mut self, block: &ContentBlock, width: u32) -> Result<RasterImage, RenderError> {
                match block.role() {
                    BlockRole::SectionHeader { .. } => Err(RenderError::Layout("boom".into())),
                    _ => Ok(RasterImage::blank(width, 10)),
                }
            }
        }
        let section = SectionData::new(1, "S", vec![Entry::new(1, "a")]);
        let err = Assembler::new(fixed_config())
            .assemble(&[section], &CoverOptions::default(), &mut HeaderFails)
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::BlockFailed {
                role: BlockRole::SectionHeader { section: 1 },
                ..
            }
        ));
    }
}
