// logbook-pdf: photo grid layout with tiered cell sizes and pagination
//
// Coordinates are in millimetres with the origin at the top-left corner of
// the page and y growing downwards. The PDF sink flips them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LayoutError;
use crate::normalize::NormalizedPhoto;

// ============================================================================
// Constants
// ============================================================================

/// A4 portrait dimensions in mm
pub const A4_WIDTH_MM: f32 = 210.0;
pub const A4_HEIGHT_MM: f32 = 297.0;

/// Page margin, also the top of continuation pages
pub const MARGIN_MM: f32 = 20.0;

/// Where the photo grid starts on the first page, below the header block
pub const FIRST_PAGE_GRID_TOP_MM: f32 = 90.0;

/// Photo counts up to this use the large cell
pub const LARGE_TIER_MAX_PHOTOS: usize = 4;

// ============================================================================
// Data Structures
// ============================================================================

/// Axis-aligned rectangle in document units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One row of the cell-size table.
///
/// `max_photos: None` matches any count and belongs at the end of the table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellTier {
    #[serde(default)]
    pub max_photos: Option<usize>,
    pub cell_width: f32,
    pub cell_height: f32,
    pub spacing: f32,
}

impl CellTier {
    fn matches(&self, count: usize) -> bool {
        self.max_photos.map_or(true, |max| count <= max)
    }
}

/// Default two-tier table: few photos get tall cells, more photos get short ones
pub fn default_tiers() -> Vec<CellTier> {
    vec![
        CellTier {
            max_photos: Some(LARGE_TIER_MAX_PHOTOS),
            cell_width: 85.0,
            cell_height: 110.0,
            spacing: 10.0,
        },
        CellTier {
            max_photos: None,
            cell_width: 85.0,
            cell_height: 76.5,
            spacing: 5.0,
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageGeometry {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    /// Grid top on the first page; continuation pages start at `margin`
    pub first_page_top: f32,
    pub photos_per_row: usize,
    pub tiers: Vec<CellTier>,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            page_width: A4_WIDTH_MM,
            page_height: A4_HEIGHT_MM,
            margin: MARGIN_MM,
            first_page_top: FIRST_PAGE_GRID_TOP_MM,
            photos_per_row: 2,
            tiers: default_tiers(),
        }
    }
}

impl PageGeometry {
    /// First tier whose threshold admits `count` photos
    pub fn select_tier(&self, count: usize) -> Result<CellTier, LayoutError> {
        self.tiers
            .iter()
            .copied()
            .find(|t| t.matches(count))
            .ok_or_else(|| LayoutError::InvalidGeometry(format!("no cell tier admits {} photos", count)))
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        let invalid = |msg: String| Err(LayoutError::InvalidGeometry(msg));

        if !(self.page_width > 0.0 && self.page_height > 0.0) {
            return invalid(format!("page size {}x{} must be positive", self.page_width, self.page_height));
        }
        if !(self.margin >= 0.0) || self.first_page_top < self.margin {
            return invalid(format!(
                "margin {} and first page top {} are inconsistent",
                self.margin, self.first_page_top
            ));
        }
        if self.photos_per_row == 0 {
            return invalid("photos_per_row must be at least 1".to_string());
        }
        if self.tiers.is_empty() {
            return invalid("cell tier table is empty".to_string());
        }

        let usable_bottom = self.page_height - self.margin;
        for tier in &self.tiers {
            if !(tier.cell_width > 0.0 && tier.cell_height > 0.0 && tier.spacing >= 0.0) {
                return invalid(format!("cell {}x{} must be positive", tier.cell_width, tier.cell_height));
            }
            // A fresh continuation page must hold at least one row
            if self.margin + tier.cell_height > usable_bottom {
                return invalid(format!("cell height {} does not fit on a page", tier.cell_height));
            }
            let row_width = self.photos_per_row as f32 * tier.cell_width
                + (self.photos_per_row - 1) as f32 * tier.spacing;
            if self.margin + row_width > self.page_width {
                return invalid(format!("row of {} cells is wider than the page", self.photos_per_row));
            }
        }
        Ok(())
    }
}

/// Where one photo goes. `cell` is the nominal grid slot it was centered in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementCommand {
    pub page_index: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub photo_id: Uuid,
    pub cell: Rect,
}

// ============================================================================
// Layout
// ============================================================================

/// Place photos `photos_per_row` to a row, in input order, breaking pages
/// whenever the next cell would cross the bottom margin.
pub fn layout(photos: &[NormalizedPhoto], geometry: &PageGeometry) -> Result<Vec<PlacementCommand>, LayoutError> {
    if photos.is_empty() {
        return Ok(Vec::new());
    }
    geometry.validate()?;

    let tier = geometry.select_tier(photos.len())?;
    let per_row = geometry.photos_per_row;
    let usable_bottom = geometry.page_height - geometry.margin;

    let mut commands = Vec::with_capacity(photos.len());
    let mut page_index = 0;
    let mut x = geometry.margin;
    let mut y = geometry.first_page_top;

    for (i, photo) in photos.iter().enumerate() {
        if photo.width == 0 || photo.height == 0 {
            return Err(LayoutError::InvalidDimensions {
                photo_id: photo.id,
                width: photo.width,
                height: photo.height,
            });
        }

        if y + tier.cell_height > usable_bottom {
            page_index += 1;
            x = geometry.margin;
            y = geometry.margin;
        }

        let cell = Rect {
            x,
            y,
            width: tier.cell_width,
            height: tier.cell_height,
        };
        let (width, height) = fit_within(photo.width, photo.height, cell.width, cell.height);

        commands.push(PlacementCommand {
            page_index,
            x: cell.x + (cell.width - width) / 2.0,
            y: cell.y + (cell.height - height) / 2.0,
            width,
            height,
            photo_id: photo.id,
            cell,
        });

        if i % per_row == per_row - 1 {
            x = geometry.margin;
            y += tier.cell_height + tier.spacing;
        } else {
            x += tier.cell_width + tier.spacing;
        }
    }

    Ok(commands)
}

/// Largest size with the photo's aspect ratio that fits the box
fn fit_within(photo_width: u32, photo_height: u32, box_width: f32, box_height: f32) -> (f32, f32) {
    let (pw, ph) = (photo_width as f32, photo_height as f32);
    let scale = (box_width / pw).min(box_height / ph);
    ((pw * scale).min(box_width), (ph * scale).min(box_height))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    fn photo(width: u32, height: u32) -> NormalizedPhoto {
        NormalizedPhoto {
            id: Uuid::new_v4(),
            encoded_data: Vec::new(),
            width,
            height,
            source_name: format!("{}x{}.jpg", width, height),
        }
    }

    fn photos(n: usize, width: u32, height: u32) -> Vec<NormalizedPhoto> {
        (0..n).map(|_| photo(width, height)).collect()
    }

    fn assert_inside_cell(cmd: &PlacementCommand) {
        assert!(cmd.x >= cmd.cell.x - EPS);
        assert!(cmd.y >= cmd.cell.y - EPS);
        assert!(cmd.x + cmd.width <= cmd.cell.x + cmd.cell.width + EPS);
        assert!(cmd.y + cmd.height <= cmd.cell.y + cmd.cell.height + EPS);
    }

    #[test]
    fn test_zero_photos() {
        assert_eq!(layout(&[], &PageGeometry::default()).unwrap(), Vec::new());
    }

    #[test]
    fn test_one_command_per_photo_in_order() {
        for n in 0..=12 {
            let input = photos(n, 800, 600);
            let commands = layout(&input, &PageGeometry::default()).unwrap();
            assert_eq!(commands.len(), n);
            for (cmd, p) in commands.iter().zip(&input) {
                assert_eq!(cmd.photo_id, p.id);
            }
        }
    }

    #[test]
    fn test_tier_selection() {
        for n in 1..=4 {
            let commands = layout(&photos(n, 800, 600), &PageGeometry::default()).unwrap();
            assert!(commands.iter().all(|c| c.cell.height == 110.0 && c.cell.width == 85.0));
        }
        for n in 5..=8 {
            let commands = layout(&photos(n, 800, 600), &PageGeometry::default()).unwrap();
            assert!(commands.iter().all(|c| c.cell.height == 76.5 && c.cell.width == 85.0));
        }
    }

    #[test]
    fn test_large_tier_spacing() {
        let commands = layout(&photos(2, 85, 110), &PageGeometry::default()).unwrap();
        assert_eq!(commands[0].cell.x, 20.0);
        assert_eq!(commands[1].cell.x, 20.0 + 85.0 + 10.0);
        assert_eq!(commands[0].cell.y, commands[1].cell.y);
    }

    #[test]
    fn test_five_photos_four_by_three() {
        let commands = layout(&photos(5, 800, 600), &PageGeometry::default()).unwrap();
        assert_eq!(commands.len(), 5);

        let rows: Vec<(usize, f32)> = commands.iter().map(|c| (c.page_index, c.cell.y)).collect();
        assert_eq!(rows[0], rows[1]);
        assert_eq!(rows[2], rows[3]);
        assert_ne!(rows[1], rows[2]);
        assert_ne!(rows[3], rows[4]);

        // Rows at 90 and 171.5 fit; the third row (253 + 76.5) crosses 277
        assert_eq!(commands[0].cell.y, 90.0);
        assert_eq!(commands[2].cell.y, 90.0 + 76.5 + 5.0);
        assert_eq!(commands[4].page_index, 1);
        assert_eq!(commands[4].cell.x, 20.0);
        assert_eq!(commands[4].cell.y, 20.0);

        // 4:3 in an 85x76.5 cell is width-bound
        for cmd in &commands {
            assert_eq!(cmd.cell.height, 76.5);
            assert!((cmd.width - 85.0).abs() < EPS);
            assert!((cmd.height - 63.75).abs() < EPS);
            assert!((cmd.y - (cmd.cell.y + 6.375)).abs() < EPS);
        }
    }

    #[test]
    fn test_five_photos_tall_page_single_page() {
        let geometry = PageGeometry {
            page_height: 400.0,
            ..PageGeometry::default()
        };
        let commands = layout(&photos(5, 800, 600), &geometry).unwrap();
        assert!(commands.iter().all(|c| c.page_index == 0));
        assert_eq!(commands[4].cell.y, 90.0 + 2.0 * 81.5);
        assert_eq!(commands[4].cell.x, 20.0);
    }

    #[test]
    fn test_pagination_k_rows_per_page() {
        // Rows at 10 and 91.5 fit under 190; a third at 173 does not
        let geometry = PageGeometry {
            page_height: 200.0,
            margin: 10.0,
            first_page_top: 10.0,
            ..PageGeometry::default()
        };
        let commands = layout(&photos(10, 800, 600), &geometry).unwrap();
        let pages: Vec<usize> = commands.iter().map(|c| c.page_index).collect();
        assert_eq!(pages, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);

        for cmd in &commands {
            assert!(cmd.cell.y + cmd.cell.height <= geometry.page_height - geometry.margin + EPS);
        }
    }

    #[test]
    fn test_page_break_resets_cursor() {
        let commands = layout(&photos(3, 85, 110), &PageGeometry::default()).unwrap();
        // Second large row at 210 would end at 320 > 277
        assert_eq!(commands[0].page_index, 0);
        assert_eq!(commands[1].page_index, 0);
        assert_eq!(commands[2].page_index, 1);
        assert_eq!(commands[2].cell.x, 20.0);
        assert_eq!(commands[2].cell.y, 20.0);
    }

    #[test]
    fn test_single_photo() {
        let commands = layout(&photos(1, 600, 800), &PageGeometry::default()).unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].page_index, 0);
        assert_eq!(commands[0].cell, Rect { x: 20.0, y: 90.0, width: 85.0, height: 110.0 });
    }

    #[test]
    fn test_extreme_aspect_ratios_stay_inside_cell() {
        let input = vec![photo(4000, 10), photo(10, 4000), photo(1, 1), photo(800, 600), photo(600, 800)];
        let commands = layout(&input, &PageGeometry::default()).unwrap();
        for (cmd, p) in commands.iter().zip(&input) {
            assert_inside_cell(cmd);
            let photo_ratio = p.width as f32 / p.height as f32;
            let placed_ratio = cmd.width / cmd.height;
            assert!((photo_ratio - placed_ratio).abs() / photo_ratio < 1e-3);
        }
    }

    #[test]
    fn test_centering_is_symmetric() {
        let commands = layout(&[photo(100, 400), photo(400, 100)], &PageGeometry::default()).unwrap();
        for cmd in &commands {
            let left = cmd.x - cmd.cell.x;
            let right = cmd.cell.x + cmd.cell.width - (cmd.x + cmd.width);
            let top = cmd.y - cmd.cell.y;
            let bottom = cmd.cell.y + cmd.cell.height - (cmd.y + cmd.height);
            assert!((left - right).abs() < EPS);
            assert!((top - bottom).abs() < EPS);
        }
        // Tall photo is height-bound, wide photo is width-bound
        assert!((commands[0].height - 110.0).abs() < EPS);
        assert!((commands[1].width - 85.0).abs() < EPS);
    }

    #[test]
    fn test_idempotent() {
        let input = photos(7, 640, 480);
        let geometry = PageGeometry::default();
        assert_eq!(layout(&input, &geometry).unwrap(), layout(&input, &geometry).unwrap());
    }

    #[test]
    fn test_zero_dimension_fails_fast() {
        let bad = photo(0, 100);
        let err = layout(&[photo(10, 10), bad.clone()], &PageGeometry::default()).unwrap_err();
        assert_eq!(
            err,
            LayoutError::InvalidDimensions {
                photo_id: bad.id,
                width: 0,
                height: 100
            }
        );
    }

    #[test]
    fn test_three_per_row() {
        let geometry = PageGeometry {
            photos_per_row: 3,
            page_width: 300.0,
            page_height: 400.0,
            ..PageGeometry::default()
        };
        let commands = layout(&photos(4, 800, 600), &geometry).unwrap();
        assert_eq!(commands[2].cell.x, 20.0 + 2.0 * 95.0);
        assert_eq!(commands[3].cell.x, 20.0);
        assert_eq!(commands[3].cell.y, 90.0 + 120.0);
    }

    #[test]
    fn test_invalid_geometry() {
        let no_tiers = PageGeometry {
            tiers: Vec::new(),
            ..PageGeometry::default()
        };
        assert!(matches!(layout(&photos(1, 1, 1), &no_tiers), Err(LayoutError::InvalidGeometry(_))));

        let short_page = PageGeometry {
            page_height: 100.0,
            ..PageGeometry::default()
        };
        assert!(matches!(layout(&photos(1, 1, 1), &short_page), Err(LayoutError::InvalidGeometry(_))));

        let capped = PageGeometry {
            tiers: vec![CellTier {
                max_photos: Some(2),
                ..default_tiers()[0]
            }],
            ..PageGeometry::default()
        };
        assert!(layout(&photos(2, 1, 1), &capped).is_ok());
        assert!(matches!(layout(&photos(3, 1, 1), &capped), Err(LayoutError::InvalidGeometry(_))));
    }
}
