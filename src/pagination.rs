//! Page flow – places rasterized blocks top to bottom and opens a new page
//! when the next block would cross the bottom margin.
//!
//! Blocks are never split. A block taller than the usable height is placed
//! at the top of a page of its own and overflows the bottom margin.

use serde::{Deserialize, Serialize};

use crate::content::BlockRole;
use crate::document::{Document, Page, PageState, Placement};
use crate::error::InputError;
use crate::raster::RasterImage;
use crate::units::{scaled_physical_height, to_pixels};

/// Physical page size and uniform margin, in mm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub margin_mm: f64,
}

impl Default for PageGeometry {
    /// A4 portrait with 15 mm margins.
    fn default() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm: 15.0,
        }
    }
}

impl PageGeometry {
    /// Reject sizes that are not finite and positive, and margins that
    /// leave no usable width or height.
    pub fn validate(&self) -> Result<(), InputError> {
        let invalid = |reason: String| Err(InputError::InvalidGeometry(reason));
        let fields = [
            ("page width", self.page_width_mm),
            ("page height", self.page_height_mm),
            ("margin", self.margin_mm),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return invalid(format!("{name} is {value}"));
            }
        }
        if self.page_width_mm <= 0.0 || self.page_height_mm <= 0.0 {
            return invalid(format!(
                "page is {} x {} mm",
                self.page_width_mm, self.page_height_mm
            ));
        }
        if self.margin_mm < 0.0 {
            return invalid(format!("margin is {} mm", self.margin_mm));
        }
        if self.usable_width_mm() <= 0.0 || self.usable_height_mm() <= 0.0 {
            return invalid(format!(
                "a {} mm margin leaves no room on a {} x {} mm page",
                self.margin_mm, self.page_width_mm, self.page_height_mm
            ));
        }
        Ok(())
    }

    pub fn usable_width_mm(&self) -> f64 {
        self.page_width_mm - 2.0 * self.margin_mm
    }

    pub fn usable_height_mm(&self) -> f64 {
        self.page_height_mm - 2.0 * self.margin_mm
    }

    /// Lowest y a fitting block may reach.
    pub fn bottom_limit_mm(&self) -> f64 {
        self.page_height_mm - self.margin_mm
    }

    /// Usable width in raster pixels; blocks are rendered at this width.
    pub fn content_px_width(&self) -> u32 {
        to_pixels(self.usable_width_mm())
    }
}

/// Sequential placement engine. Owns the cursor and the pages of one
/// document under construction.
#[derive(Debug)]
pub struct PageFlow {
    geometry: PageGeometry,
    title: String,
    pages: Vec<Page>,
    current: Page,
    cursor_y: f64,
}

impl PageFlow {
    pub fn new(geometry: PageGeometry, title: impl Into<String>) -> Self {
        log::debug!("opened page 0");
        Self {
            geometry,
            title: title.into(),
            pages: Vec::new(),
            current: Page::open(0),
            cursor_y: geometry.margin_mm,
        }
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn cursor_y(&self) -> f64 {
        self.cursor_y
    }

    pub fn current_page_index(&self) -> usize {
        self.current.index
    }

    /// Pages opened so far, including the current one.
    pub fn page_count(&self) -> usize {
        self.pages.len() + 1
    }

    /// Place `image` scaled to the usable width, breaking to a new page
    /// first if it does not fit and the current page already holds a block.
    /// Returns the placement just made.
    pub fn place_next(&mut self, image: RasterImage, role: BlockRole, spacing_mm: f64) -> &Placement {
        let width_mm = self.geometry.usable_width_mm();
        let height_mm = scaled_physical_height(&image, width_mm);

        if self.cursor_y + height_mm > self.geometry.bottom_limit_mm() && !self.current.is_empty() {
            self.force_new_page();
        }
        if height_mm > self.geometry.usable_height_mm() {
            log::warn!(
                "{role} is {height_mm:.1} mm tall, more than the {:.1} mm usable height; it will overflow page {}",
                self.geometry.usable_height_mm(),
                self.current.index
            );
        }

        log::debug!(
            "page {}: {role} at y={:.2} mm, h={:.2} mm",
            self.current.index,
            self.cursor_y,
            height_mm
        );
        self.current.placements.push(Placement {
            x_mm: self.geometry.margin_mm,
            y_mm: self.cursor_y,
            width_mm,
            height_mm,
            role,
            image,
        });
        self.cursor_y += height_mm + spacing_mm.max(0.0);

        let last = self.current.placements.len() - 1;
        &self.current.placements[last]
    }

    /// Seal the current page and open the next one, resetting the cursor.
    pub fn force_new_page(&mut self) {
        let next = Page::open(self.current.index + 1);
        let mut sealed = std::mem::replace(&mut self.current, next);
        sealed.state = PageState::Sealed;
        self.pages.push(sealed);
        self.cursor_y = self.geometry.margin_mm;
        log::debug!("opened page {}", self.current.index);
    }

    /// Seal the last page, mark it `is_last` and hand over the document.
    pub fn seal_and_finalize(self) -> Document {
        let PageFlow {
            geometry,
            title,
            mut pages,
            mut current,
            ..
        } = self;
        current.state = PageState::Sealed;
        current.is_last = true;
        pages.push(current);
        log::debug!("finalized {} page(s)", pages.len());
        Document::new(title, geometry, pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An image whose physical height on an A4 page is `mm` (to ~0.01 mm).
    fn block_mm(mm: f64) -> RasterImage {
        // 1800 px across 180 mm → 10 px per mm
        RasterImage::blank(1800, (mm * 10.0).round() as u32)
    }

    fn entry(index: u32) -> BlockRole {
        BlockRole::Entry { section: 1, index }
    }

    #[test]
    fn cursor_starts_at_margin_and_advances() {
        let mut flow = PageFlow::new(PageGeometry::default(), "t");
        assert_eq!(flow.cursor_y(), 15.0);
        flow.place_next(block_mm(20.0), entry(1), 10.0);
        assert!((flow.cursor_y() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn block_that_does_not_fit_opens_new_page() {
        let mut flow = PageFlow::new(PageGeometry::default(), "t");
        flow.place_next(block_mm(200.0), entry(1), 10.0);
        let p = flow.place_next(block_mm(60.0), entry(2), 10.0);
        assert_eq!(p.y_mm, 15.0);
        assert_eq!(flow.current_page_index(), 1);
        let doc = flow.seal_and_finalize();
        assert_eq!(doc.page_count(), 2);
        assert!(doc.pages()[1].is_last);
        assert!(!doc.pages()[0].is_last);
        assert!(doc.pages().iter().all(|p| p.state == PageState::Sealed));
    }

    #[test]
    fn exact_fit_does_not_break() {
        let mut flow = PageFlow::new(PageGeometry::default(), "t");
        flow.place_next(block_mm(100.0), entry(1), 0.0);
        let p = flow.place_next(block_mm(167.0), entry(2), 0.0);
        assert_eq!(p.bottom_mm(), 282.0);
        assert_eq!(flow.page_count(), 1);
    }

    #[test]
    fn usable_height_block_fits_fresh_page() {
        let mut flow = PageFlow::new(PageGeometry::default(), "t");
        flow.place_next(block_mm(267.0), entry(1), 10.0);
        assert_eq!(flow.page_count(), 1);
    }

    #[test]
    fn oversized_block_on_empty_page_does_not_leave_blank_page() {
        let mut flow = PageFlow::new(PageGeometry::default(), "t");
        let p = flow.place_next(block_mm(400.0), entry(1), 10.0);
        assert_eq!(p.y_mm, 15.0);
        assert_eq!(flow.page_count(), 1);
        // the next block breaks normally
        flow.place_next(block_mm(10.0), entry(2), 10.0);
        assert_eq!(flow.page_count(), 2);
    }

    #[test]
    fn spacing_does_not_carry_across_a_break() {
        let mut flow = PageFlow::new(PageGeometry::default(), "t");
        flow.place_next(block_mm(250.0), entry(1), 15.0);
        flow.place_next(block_mm(30.0), entry(2), 10.0);
        assert!((flow.cursor_y() - 55.0).abs() < 1e-9);
    }

    #[test]
    fn force_new_page_resets_cursor() {
        let mut flow = PageFlow::new(PageGeometry::default(), "t");
        flow.place_next(block_mm(30.0), entry(1), 10.0);
        flow.force_new_page();
        assert_eq!(flow.cursor_y(), 15.0);
        assert_eq!(flow.current_page_index(), 1);
    }

    #[test]
    fn mixed_heights_stay_inside_the_margins() {
        let geometry = PageGeometry::default();
        let mut flow = PageFlow::new(geometry, "t");
        // deterministic heights between 5 and 267 mm
        let mut seed: u64 = 0x2545_f491;
        for index in 1..=200 {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            let mm = 5.0 + ((seed >> 33) % 2621) as f64 / 10.0;
            let spacing = [0.0, 10.0, 15.0][index as usize % 3];
            flow.place_next(block_mm(mm), entry(index), spacing);
            if index % 37 == 0 {
                flow.force_new_page();
            }
        }
        let doc = flow.seal_and_finalize();

        assert!(doc.page_count() > 1);
        for (i, page) in doc.pages().iter().enumerate() {
            assert_eq!(page.index, i);
            for p in &page.placements {
                assert!(
                    p.bottom_mm() <= geometry.bottom_limit_mm() + 1e-9,
                    "page {i}: bottom at {} mm",
                    p.bottom_mm()
                );
                assert!(p.y_mm >= geometry.margin_mm);
            }
            for pair in page.placements.windows(2) {
                assert!(pair[1].y_mm >= pair[0].y_mm);
            }
        }
        let placed: Vec<BlockRole> = doc.roles();
        assert_eq!(placed, (1..=200).map(entry).collect::<Vec<_>>());
    }

    #[test]
    fn geometry_without_usable_area_is_rejected() {
        let cases = [
            PageGeometry {
                margin_mm: 110.0,
                ..PageGeometry::default()
            },
            PageGeometry {
                margin_mm: 148.5,
                page_width_mm: 400.0,
                ..PageGeometry::default()
            },
            PageGeometry {
                page_width_mm: f64::NAN,
                ..PageGeometry::default()
            },
            PageGeometry {
                page_height_mm: f64::INFINITY,
                ..PageGeometry::default()
            },
            PageGeometry {
                margin_mm: -1.0,
                ..PageGeometry::default()
            },
            PageGeometry {
                page_width_mm: 0.0,
                ..PageGeometry::default()
            },
        ];
        for geometry in cases {
            assert!(
                matches!(geometry.validate(), Err(InputError::InvalidGeometry(_))),
                "{geometry:?} should be rejected"
            );
        }
        assert!(PageGeometry::default().validate().is_ok());
        let no_margin = PageGeometry {
            margin_mm: 0.0,
            ..PageGeometry::default()
        };
        assert!(no_margin.validate().is_ok());
    }

    #[test]
    fn geometry_defaults() {
        let g = PageGeometry::default();
        assert_eq!(g.usable_width_mm(), 180.0);
        assert_eq!(g.usable_height_mm(), 267.0);
        assert_eq!(g.content_px_width(), 680);
    }
}
