//! Layout step: parse the model's region list and cut the page into crops.
//!
//! The layout prompt answers with one region per line:
//!
//! ```text
//! <|box_start|>x1 y1 x2 y2<|box_end|><|ref_start|>type<|ref_end|>[<|rotate_*|>]
//! ```
//!
//! Coordinates are on a 0–1000 grid relative to the page, independent of
//! the size of the image the model actually saw.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Coordinate grid used by the layout output.
const GRID: f32 = 1000.0;

/// Crops with a shorter edge than this are upscaled before recognition.
pub const MIN_CROP_EDGE: u32 = 28;

/// Crops longer than this many times their short edge are padded first.
pub const MAX_CROP_EDGE_RATIO: u32 = 50;

static RE_LAYOUT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^<\|box_start\|>(\d+)\s+(\d+)\s+(\d+)\s+(\d+)<\|box_end\|><\|ref_start\|>(\w+?)<\|ref_end\|>(.*)$",
    )
    .unwrap()
});

/// One region reported by the layout step.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRegion {
    /// Lower-cased region type.
    pub block_type: String,
    /// `[x1, y1, x2, y2]` normalised to `0.0..=1.0`, with `x1 < x2` and `y1 < y2`.
    pub bbox: [f32; 4],
    /// Rotation tag of the region, in degrees.
    pub angle: Option<u16>,
}

/// Parse raw layout output into regions, in the order the model listed them.
///
/// Lines that do not match the region grammar are skipped with a warning;
/// degenerate boxes (zero width or height) are dropped.
pub fn parse_layout(output: &str) -> Vec<LayoutRegion> {
    let mut regions = Vec::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some(caps) = RE_LAYOUT_LINE.captures(line) else {
            warn!("Skipping malformed layout line: {line}");
            continue;
        };

        let coords: Option<Vec<u32>> = (1..=4).map(|i| caps[i].parse().ok()).collect();
        let Some(coords) = coords else {
            warn!("Skipping layout line with unparsable coordinates: {line}");
            continue;
        };
        let Some(bbox) = normalize_bbox(coords[0], coords[1], coords[2], coords[3]) else {
            debug!("Dropping degenerate region: {line}");
            continue;
        };

        regions.push(LayoutRegion {
            block_type: caps[5].to_lowercase(),
            bbox,
            angle: parse_angle(&caps[6]),
        });
    }

    regions
}

/// Order the corners and scale to `0.0..=1.0`. Values past the grid are
/// clamped to its edge.
fn normalize_bbox(x1: u32, y1: u32, x2: u32, y2: u32) -> Option<[f32; 4]> {
    let clamp = |v: u32| (v as f32).min(GRID) / GRID;
    let (x1, x2) = if x2 < x1 { (x2, x1) } else { (x1, x2) };
    let (y1, y2) = if y2 < y1 { (y2, y1) } else { (y1, y2) };
    let bbox = [clamp(x1), clamp(y1), clamp(x2), clamp(y2)];
    if bbox[0] >= bbox[2] || bbox[1] >= bbox[3] {
        return None;
    }
    Some(bbox)
}

fn parse_angle(tail: &str) -> Option<u16> {
    if tail.contains("<|rotate_up|>") {
        Some(0)
    } else if tail.contains("<|rotate_right|>") {
        Some(90)
    } else if tail.contains("<|rotate_down|>") {
        Some(180)
    } else if tail.contains("<|rotate_left|>") {
        Some(270)
    } else {
        None
    }
}

/// Square copy of `image` for the layout request.
pub fn layout_image(image: &DynamicImage, size: u32) -> DynamicImage {
    image.resize_exact(size, size, FilterType::CatmullRom)
}

/// Cut `region` out of the full-resolution `image`, applying the
/// region's rotation tag.
///
/// Returns `None` when the box collapses to nothing at this resolution.
pub fn crop_region(image: &DynamicImage, region: &LayoutRegion) -> Option<DynamicImage> {
    let (w, h) = (image.width() as f32, image.height() as f32);
    if w < 1.0 || h < 1.0 {
        return None;
    }

    let [bx1, by1, bx2, by2] = region.bbox;
    let x1 = (bx1 * w).round().clamp(0.0, w - 1.0) as u32;
    let y1 = (by1 * h).round().clamp(0.0, h - 1.0) as u32;
    let x2 = (bx2 * w).round().clamp(0.0, w) as u32;
    let y2 = (by2 * h).round().clamp(0.0, h) as u32;
    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    let crop = image.crop_imm(x1, y1, x2 - x1, y2 - y1);
    let crop = match region.angle {
        Some(90) => crop.rotate90(),
        Some(180) => crop.rotate180(),
        Some(270) => crop.rotate270(),
        _ => crop,
    };

    Some(upscale_small(pad_thin(crop)))
}

/// Pad a strip with white on both sides of its short edge until the long
/// edge is at most [`MAX_CROP_EDGE_RATIO`] times the short one.
fn pad_thin(crop: DynamicImage) -> DynamicImage {
    let (w, h) = (crop.width(), crop.height());
    let (long, short) = (w.max(h), w.min(h));
    if long <= short.saturating_mul(MAX_CROP_EDGE_RATIO) {
        return crop;
    }

    let target = long.div_ceil(MAX_CROP_EDGE_RATIO);
    let (nw, nh) = if w >= h { (w, target) } else { (target, h) };
    let mut canvas = RgbImage::from_pixel(nw, nh, Rgb([255, 255, 255]));
    let x = i64::from((nw - w) / 2);
    let y = i64::from((nh - h) / 2);
    imageops::overlay(&mut canvas, &crop.to_rgb8(), x, y);
    DynamicImage::ImageRgb8(canvas)
}

fn upscale_small(crop: DynamicImage) -> DynamicImage {
    let short = crop.width().min(crop.height());
    if short >= MIN_CROP_EDGE {
        return crop;
    }
    let scale = MIN_CROP_EDGE as f32 / short.max(1) as f32;
    let nw = ((crop.width() as f32) * scale).ceil() as u32;
    let nh = ((crop.height() as f32) * scale).ceil() as u32;
    crop.resize_exact(nw.max(MIN_CROP_EDGE), nh.max(MIN_CROP_EDGE), FilterType::CatmullRom)
}
