//! Integration tests for the chapterbook pipeline.
//!
//! These tests validate:
//! - Block order and page breaks across sections and entries
//! - Failure handling (fallback recovery, aborted runs deliver nothing)
//! - PDF output exists and has valid format
//! - Layout export and deterministic rendering

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use chapterbook::assembler::{Assembler, AssemblyConfig};
use chapterbook::content::{BlockRole, ContentBlock, CoverOptions, Entry, SectionData};
use chapterbook::document::{Document, DocumentLayout};
use chapterbook::error::{AssemblyError, PipelineError, RenderError};
use chapterbook::pipeline::{generate_book, MemorySink, Pipeline};
use chapterbook::raster::{HtmlRasterizer, RasterImage, Rasterizer};
use chapterbook::samples::demo_sections;

// =====================================================================
// Helpers
// =====================================================================

fn config() -> AssemblyConfig {
    AssemblyConfig {
        generated_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        ..AssemblyConfig::default()
    }
}

/// Every block is `width` px wide (1 px = 1 mm at the 180 mm usable width)
/// and `height_mm` tall, unless overridden per role.
struct MmRasterizer {
    height_mm: u32,
    overrides: Vec<(BlockRole, u32)>,
}

impl MmRasterizer {
    fn new(height_mm: u32) -> Self {
        Self {
            height_mm,
            overrides: Vec::new(),
        }
    }

    fn with(mut self, role: BlockRole, height_mm: u32) -> Self {
        self.overrides.push((role, height_mm));
        self
    }
}

impl Rasterizer for MmRasterizer {
    fn render(&mut self, block: &ContentBlock, _width: u32) -> Result<RasterImage, RenderError> {
        let height = self
            .overrides
            .iter()
            .find(|(role, _)| *role == block.role())
            .map(|(_, h)| *h)
            .unwrap_or(self.height_mm);
        Ok(RasterImage::blank(180, height))
    }
}

fn entries(n: u32) -> Vec<Entry> {
    (1..=n)
        .map(|i| Entry::new(i, format!("verse {i}")).with_annotation(format!("translation {i}")))
        .collect()
}

fn page_of(doc: &Document, role: BlockRole) -> usize {
    doc.pages()
        .iter()
        .find(|p| p.placements.iter().any(|pl| pl.role == role))
        .map(|p| p.index)
        .unwrap_or_else(|| panic!("{role} not placed"))
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

// =====================================================================
// Page flow through the assembler
// =====================================================================

#[test]
fn entries_keep_order_across_pages() {
    // 100 mm entries + 10 mm spacing: two per page after the header.
    let section = SectionData::new(1, "Long", entries(5));
    let mut r = MmRasterizer::new(100).with(BlockRole::SectionHeader { section: 1 }, 20);
    let doc = Assembler::new(config())
        .assemble(&[section], &CoverOptions::default(), &mut r)
        .unwrap();

    let order: Vec<u32> = doc
        .placements()
        .filter_map(|p| match p.role {
            BlockRole::Entry { index, .. } => Some(index),
            _ => None,
        })
        .collect();
    assert_eq!(order, vec![1, 2, 3, 4, 5]);

    let e1 = page_of(&doc, BlockRole::Entry { section: 1, index: 1 });
    let e3 = page_of(&doc, BlockRole::Entry { section: 1, index: 3 });
    assert!(e3 > e1, "entry 3 should have moved to a later page");

    for page in doc.pages() {
        for pair in page.placements.windows(2) {
            assert!(pair[1].y_mm >= pair[0].bottom_mm(), "placements overlap");
        }
    }
}

#[test]
fn block_of_exact_usable_height_fits_a_fresh_page() {
    // A4 with 15 mm margins leaves 267 mm.
    let section = SectionData::new(1, "Exact", entries(1));
    let entry_role = BlockRole::Entry { section: 1, index: 1 };
    let header_role = BlockRole::SectionHeader { section: 1 };
    let mut r = MmRasterizer::new(10).with(entry_role, 267).with(header_role, 5);
    let doc = Assembler::new(config())
        .assemble(&[section], &CoverOptions::default(), &mut r)
        .unwrap();

    // header on page 1, full-height entry breaks to page 2 and fills it
    assert_eq!(page_of(&doc, header_role), 1);
    let entry_page = page_of(&doc, entry_role);
    assert_eq!(entry_page, 2);
    let placement = &doc.pages()[entry_page].placements[0];
    assert_eq!(placement.y_mm, 15.0);
    assert!((placement.bottom_mm() - 282.0).abs() < 1e-9);
    // the footer could not fit after it
    assert_eq!(page_of(&doc, BlockRole::Footer), 3);
}

#[test]
fn each_section_starts_a_new_page() {
    let sections = vec![
        SectionData::new(1, "One", entries(1)),
        SectionData::new(2, "Two", entries(1)),
    ];
    let mut r = MmRasterizer::new(10);
    let doc = Assembler::new(config())
        .assemble(&sections, &CoverOptions::default(), &mut r)
        .unwrap();

    assert_eq!(page_of(&doc, BlockRole::Cover), 0);
    assert_eq!(page_of(&doc, BlockRole::SectionHeader { section: 1 }), 1);
    assert_eq!(page_of(&doc, BlockRole::SectionHeader { section: 2 }), 2);
    assert_eq!(doc.pages()[2].placements[0].y_mm, 15.0);
}

#[test]
fn demo_has_cover_sections_and_one_footer() {
    let sections = vec![
        SectionData::new(1, "First", entries(1)),
        SectionData::new(2, "Second", entries(1)).with_preamble(true),
    ];
    let mut r = MmRasterizer::new(30);
    let doc = Assembler::new(config())
        .assemble(&sections, &CoverOptions::default(), &mut r)
        .unwrap();

    assert!(doc.page_count() >= 3);
    let roles = doc.roles();
    assert_eq!(roles.iter().filter(|r| **r == BlockRole::Footer).count(), 1);
    assert_eq!(roles.last(), Some(&BlockRole::Footer));
    assert_eq!(
        roles[roles.len() - 2],
        BlockRole::Entry { section: 2, index: 1 }
    );
    assert!(roles.contains(&BlockRole::Preamble { section: 2 }));
    assert!(!roles.contains(&BlockRole::Preamble { section: 1 }));
    // footer shares the last page
    assert_eq!(page_of(&doc, BlockRole::Footer), 2);
    assert!(doc.pages().last().unwrap().is_last);
}

// =====================================================================
// Failure handling
// =====================================================================

/// Fails every render of one entry, primary and fallback alike.
struct FailingEntry {
    section: usize,
    index: u32,
    attempts: u32,
}

impl Rasterizer for FailingEntry {
    fn render(&mut self, block: &ContentBlock, width: u32) -> Result<RasterImage, RenderError> {
        if block.role() == (BlockRole::Entry { section: self.section, index: self.index }) {
            self.attempts += 1;
            return Err(RenderError::Layout("surface lost".into()));
        }
        Ok(RasterImage::blank(width, 40))
    }
}

#[test]
fn failing_entry_aborts_and_delivers_nothing() {
    let sections = vec![
        SectionData::new(1, "One", entries(2)),
        SectionData::new(2, "Two", entries(4)),
    ];
    let mut r = FailingEntry {
        section: 2,
        index: 3,
        attempts: 0,
    };
    let mut sink = MemorySink::new();
    let err = Pipeline::new(config())
        .run(&sections, &CoverOptions::default(), &mut r, &mut sink)
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Assembly(AssemblyError::RenderFailed {
            section: 2,
            entry: 3,
            ..
        })
    ));
    assert_eq!(r.attempts, 2, "primary and fallback should both be tried");
    assert!(sink.artifacts().is_empty());
}

#[test]
fn fallback_recovers_a_failed_entry() {
    /// Fails the first attempt at every entry.
    #[derive(Default)]
    struct FlakyEntries {
        failed: Vec<BlockRole>,
    }
    impl Rasterizer for FlakyEntries {
        fn render(&mut self, block: &ContentBlock, width: u32) -> Result<RasterImage, RenderError> {
            let role = block.role();
            if matches!(role, BlockRole::Entry { .. }) && !self.failed.contains(&role) {
                self.failed.push(role);
                return Err(RenderError::UnsupportedElement("table".into()));
            }
            Ok(RasterImage::blank(width, 40))
        }
    }

    let section = SectionData::new(1, "One", entries(3));
    let mut r = FlakyEntries::default();
    let doc = Assembler::new(config())
        .assemble(&[section], &CoverOptions::default(), &mut r)
        .unwrap();
    assert_eq!(r.failed.len(), 3);
    assert_eq!(
        doc.roles()
            .iter()
            .filter(|r| matches!(r, BlockRole::Entry { .. }))
            .count(),
        3
    );
}

// =====================================================================
// End-to-end with the markup rasterizer
// =====================================================================

#[test]
fn demo_book_is_a_pdf() {
    let sections = demo_sections().unwrap();
    let mut r = HtmlRasterizer::default();
    let mut sink = MemorySink::new();
    let doc = Pipeline::new(config())
        .run(&sections, &CoverOptions::default(), &mut r, &mut sink)
        .unwrap();

    let artifacts = sink.into_artifacts();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].name, "Chapters_2_Selected.pdf");
    assert_valid_pdf(&artifacts[0].bytes);
    assert!(doc.page_count() >= 3);
    assert_eq!(doc.roles().last(), Some(&BlockRole::Footer));
}

#[test]
fn single_chapter_book_is_named_after_it() {
    let sections = demo_sections().unwrap();
    let mut r = HtmlRasterizer::default();
    let (_, artifact) = Pipeline::new(config())
        .build(&sections[..1], &CoverOptions::default(), &mut r)
        .unwrap();
    assert_eq!(artifact.name, "Al_Fatihah.pdf");
    assert_valid_pdf(&artifact.bytes);
}

#[test]
fn generate_book_convenience() {
    let sections = demo_sections().unwrap();
    let bytes = generate_book(&sections[1..], &CoverOptions::default()).unwrap();
    assert_valid_pdf(&bytes);
}

#[test]
fn layout_json_round_trip() {
    let sections = demo_sections().unwrap();
    let mut r = HtmlRasterizer::default();
    let doc = Assembler::new(config())
        .assemble(&sections, &CoverOptions::default(), &mut r)
        .unwrap();
    let layout = doc.layout();
    let parsed = DocumentLayout::from_json(&layout.to_json().unwrap()).unwrap();
    assert_eq!(parsed, layout);
    assert_eq!(parsed.pages.len(), doc.page_count());
    assert_eq!(parsed.title, "Holy Quran");
}

#[test]
fn rendering_is_deterministic() {
    fn digest(doc: &Document) -> Vec<u8> {
        let mut hasher = Sha256::new();
        for placement in doc.placements() {
            hasher.update(placement.image.pixels().as_raw());
        }
        hasher.finalize().to_vec()
    }

    let sections = demo_sections().unwrap();
    let cover = CoverOptions::default();
    let first = Assembler::new(config())
        .assemble(&sections, &cover, &mut HtmlRasterizer::default())
        .unwrap();
    let second = Assembler::new(config())
        .assemble(&sections, &cover, &mut HtmlRasterizer::default())
        .unwrap();
    assert_eq!(digest(&first), digest(&second));
    assert_eq!(first.layout(), second.layout());
}
