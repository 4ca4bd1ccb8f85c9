//! The paginated document – the frozen structure between page flow and PDF
//! serialization, plus a pixel-free [`DocumentLayout`] view for inspection
//! and JSON export.

use serde::{Deserialize, Serialize};

use crate::content::BlockRole;
use crate::pagination::PageGeometry;
use crate::raster::RasterImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    Open,
    Sealed,
}

/// A rasterized block at its position on a page. Coordinates are in mm
/// from the page's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub x_mm: f64,
    pub y_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
    pub role: BlockRole,
    pub image: RasterImage,
}

impl Placement {
    pub fn bottom_mm(&self) -> f64 {
        self.y_mm + self.height_mm
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub index: usize,
    pub state: PageState,
    pub is_last: bool,
    pub placements: Vec<Placement>,
}

impl Page {
    pub(crate) fn open(index: usize) -> Self {
        Self {
            index,
            state: PageState::Open,
            is_last: false,
            placements: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

/// A finalized document. Every page is sealed and exactly the last one is
/// marked `is_last`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    title: String,
    geometry: PageGeometry,
    pages: Vec<Page>,
}

impl Document {
    pub(crate) fn new(title: String, geometry: PageGeometry, pages: Vec<Page>) -> Self {
        Self {
            title,
            geometry,
            pages,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All placements in document order.
    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.pages.iter().flat_map(|p| p.placements.iter())
    }

    /// Roles of all placements in document order.
    pub fn roles(&self) -> Vec<BlockRole> {
        self.placements().map(|p| p.role).collect()
    }

    pub fn layout(&self) -> DocumentLayout {
        DocumentLayout {
            title: self.title.clone(),
            page_width_mm: self.geometry.page_width_mm,
            page_height_mm: self.geometry.page_height_mm,
            margin_mm: self.geometry.margin_mm,
            pages: self
                .pages
                .iter()
                .map(|page| PageLayout {
                    index: page.index,
                    is_last: page.is_last,
                    placements: page
                        .placements
                        .iter()
                        .map(|p| PlacementLayout {
                            x_mm: p.x_mm,
                            y_mm: p.y_mm,
                            width_mm: p.width_mm,
                            height_mm: p.height_mm,
                            pixel_width: p.image.width(),
                            pixel_height: p.image.height(),
                            role: p.role,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Serializable page map of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLayout {
    pub title: String,
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub margin_mm: f64,
    pub pages: Vec<PageLayout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub index: usize,
    pub is_last: bool,
    pub placements: Vec<PlacementLayout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementLayout {
    pub x_mm: f64,
    pub y_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub role: BlockRole,
}

impl DocumentLayout {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut first = Page::open(0);
        first.state = PageState::Sealed;
        first.placements.push(Placement {
            x_mm: 15.0,
            y_mm: 15.0,
            width_mm: 180.0,
            height_mm: 40.0,
            role: BlockRole::Cover,
            image: RasterImage::blank(680, 151),
        });
        let mut second = Page::open(1);
        second.state = PageState::Sealed;
        second.is_last = true;
        second.placements.push(Placement {
            x_mm: 15.0,
            y_mm: 15.0,
            width_mm: 180.0,
            height_mm: 20.0,
            role: BlockRole::SectionHeader { section: 1 },
            image: RasterImage::blank(680, 76),
        });
        Document::new("Demo".into(), PageGeometry::default(), vec![first, second])
    }

    #[test]
    fn layout_json_round_trip() {
        let layout = sample().layout();
        let json = layout.to_json().unwrap();
        assert!(json.contains("\"kind\": \"section_header\""));
        assert_eq!(DocumentLayout::from_json(&json).unwrap(), layout);
    }

    #[test]
    fn roles_in_document_order() {
        assert_eq!(
            sample().roles(),
            vec![BlockRole::Cover, BlockRole::SectionHeader { section: 1 }]
        );
    }

    #[test]
    fn bottom_edge() {
        let doc = sample();
        assert_eq!(doc.pages()[0].placements[0].bottom_mm(), 55.0);
    }
}
