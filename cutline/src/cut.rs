use std::path::Path;

use image::RgbImage;
use image::imageops::crop_imm;
use serde::Serialize;
use tracing::warn;

use crate::error::{CutlineError, Result};

/// Pixel row where the page was (or would be) sliced, and which pieces
/// came out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitOutcome {
    /// Row the slice ran along.
    pub y_split: u32,
    /// A top piece was produced.
    pub top_saved: bool,
    /// A bottom piece was produced.
    pub bot_saved: bool,
    /// Height of the top piece in pixels.
    pub top_h: u32,
    /// Height of the bottom piece in pixels.
    pub bot_h: u32,
}

/// The pieces of a sliced page image.
#[derive(Debug)]
pub struct SplitImages {
    /// What was produced and where the slice ran.
    pub outcome: SplitOutcome,
    /// Content above the cut, when non-empty.
    pub top: Option<RgbImage>,
    /// Content below the cut, when non-empty.
    pub bottom: Option<RgbImage>,
}

impl SplitImages {
    /// Writes whichever pieces exist to their paths.
    pub fn save(&self, top_path: &Path, bottom_path: &Path) -> Result<()> {
        if let Some(top) = &self.top {
            top.save(top_path)
                .map_err(|e| CutlineError::Image(e.to_string()))?;
        }
        if let Some(bottom) = &self.bottom {
            bottom
                .save(bottom_path)
                .map_err(|e| CutlineError::Image(e.to_string()))?;
        }
        Ok(())
    }
}

/// Pixel row to cut at: the matched line's top edge nudged up by
/// `offset_px`, clamped into the image.
#[must_use]
pub fn resolve_cut_y(line_y0: f32, offset_px: i32, image_height: u32) -> u32 {
    let raw = (line_y0 - offset_px as f32).round() as i64;
    let max = i64::from(image_height).saturating_sub(1).max(0);
    raw.clamp(0, max) as u32
}

/// Slices the page into a top and a bottom piece at `y_cut`.
///
/// A cut at the very first or very last row produces only the surviving
/// piece; that is a warning, not an error, because the caller may still
/// use the whole-page piece.
#[must_use]
pub fn split_full(image: &RgbImage, y_cut: u32) -> SplitImages {
    let (width, height) = image.dimensions();
    let y = y_cut.min(height);

    if y == 0 {
        warn!(y_split = y, "cut at top edge, keeping only the bottom piece");
        return SplitImages {
            outcome: SplitOutcome { y_split: y, top_saved: false, bot_saved: true, top_h: 0, bot_h: height },
            top: None,
            bottom: Some(image.clone()),
        };
    }
    if y == height {
        warn!(y_split = y, "cut at bottom edge, keeping only the top piece");
        return SplitImages {
            outcome: SplitOutcome { y_split: y, top_saved: true, bot_saved: false, top_h: height, bot_h: 0 },
            top: Some(image.clone()),
            bottom: None,
        };
    }

    let top = crop_imm(image, 0, 0, width, y).to_image();
    let bottom = crop_imm(image, 0, y, width, height - y).to_image();
    SplitImages {
        outcome: SplitOutcome {
            y_split: y,
            top_saved: true,
            bot_saved: true,
            top_h: y,
            bot_h: height - y,
        },
        top: Some(top),
        bottom: Some(bottom),
    }
}

/// Keeps only the content below the cut; used for forced-heading chunks
/// whose page top carries no foreign content worth preserving.
#[must_use]
pub fn split_bottom_only(image: &RgbImage, y_cut: u32) -> SplitImages {
    let (width, height) = image.dimensions();
    let y = y_cut.min(height);

    if y == height {
        warn!(y_split = y, "cut at bottom edge, nothing to keep");
        return SplitImages {
            outcome: SplitOutcome { y_split: y, top_saved: false, bot_saved: false, top_h: 0, bot_h: 0 },
            top: None,
            bottom: None,
        };
    }

    let bottom = crop_imm(image, 0, y, width, height - y).to_image();
    SplitImages {
        outcome: SplitOutcome {
            y_split: y,
            top_saved: false,
            bot_saved: true,
            top_h: 0,
            bot_h: height - y,
        },
        top: None,
        bottom: Some(bottom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn page(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([240, 240, 240]))
    }

    #[test]
    fn cut_row_stays_inside_image() {
        assert_eq!(resolve_cut_y(100.0, 10, 500), 90);
        assert_eq!(resolve_cut_y(4.0, 10, 500), 0);
        assert_eq!(resolve_cut_y(-80.0, 10, 500), 0);
        assert_eq!(resolve_cut_y(9000.0, 10, 500), 499);
        assert_eq!(resolve_cut_y(100.4, 0, 500), 100);
    }

    #[test]
    fn interior_cut_yields_both_pieces() {
        let split = split_full(&page(100, 300), 120);
        assert_eq!(
            split.outcome,
            SplitOutcome { y_split: 120, top_saved: true, bot_saved: true, top_h: 120, bot_h: 180 }
        );
        assert_eq!(split.top.as_ref().map(RgbImage::height), Some(120));
        assert_eq!(split.bottom.as_ref().map(RgbImage::height), Some(180));
    }

    #[test]
    fn edge_cuts_keep_the_surviving_piece() {
        let at_top = split_full(&page(100, 300), 0);
        assert!(at_top.top.is_none());
        assert_eq!(at_top.bottom.as_ref().map(RgbImage::height), Some(300));
        assert!(!at_top.outcome.top_saved);

        let at_bottom = split_full(&page(100, 300), 300);
        assert!(at_bottom.bottom.is_none());
        assert_eq!(at_bottom.top.as_ref().map(RgbImage::height), Some(300));
    }

    #[test]
    fn bottom_only_drops_everything_above() {
        let split = split_bottom_only(&page(100, 300), 40);
        assert!(split.top.is_none());
        assert_eq!(split.bottom.as_ref().map(RgbImage::height), Some(260));
        assert_eq!(split.outcome.bot_h, 260);

        let nothing = split_bottom_only(&page(100, 300), 300);
        assert!(nothing.bottom.is_none());
        assert!(!nothing.outcome.bot_saved);
    }

    #[test]
    fn pieces_write_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let top_path = dir.path().join("top.png");
        let bottom_path = dir.path().join("bot.png");
        split_full(&page(60, 90), 30).save(&top_path, &bottom_path).unwrap();
        assert!(top_path.exists());
        assert!(bottom_path.exists());

        let only_bottom = dir.path().join("only_bot.png");
        let missing_top = dir.path().join("missing_top.png");
        split_bottom_only(&page(60, 90), 30)
            .save(&missing_top, &only_bottom)
            .unwrap();
        assert!(!missing_top.exists());
        assert!(only_bottom.exists());
    }
}
