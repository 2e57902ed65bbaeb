//! Software rasterizer behind `savefig` and `capture_screen_image`

use image::{imageops, DynamicImage, ImageFormat, Rgb, RgbImage};
use std::path::Path;
use vizproxy_wire::codecs::array_to_image;
use vizproxy_wire::{NdArray, Value};

use crate::error::BackendError;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const GRID: Rgb<u8> = Rgb([204, 204, 204]);

const PALETTE: [[u8; 3]; 10] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

/// Cycle color for the `index`-th series
pub fn palette(index: usize) -> Rgb<u8> {
    Rgb(PALETTE[index % PALETTE.len()])
}

/// Pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl Rect {
    /// Shrink by `margin` pixels on every side
    pub fn inset(&self, margin: i64) -> Rect {
        let margin = margin.min(self.w / 2).min(self.h / 2);
        Rect {
            x: self.x + margin,
            y: self.y + margin,
            w: self.w - 2 * margin,
            h: self.h - 2 * margin,
        }
    }
}

/// Split a canvas into a `rows` x `cols` grid, row-major
pub fn grid_cells(width: u32, height: u32, rows: usize, cols: usize) -> Vec<Rect> {
    let rows = rows.max(1) as i64;
    let cols = cols.max(1) as i64;
    let (cw, ch) = (i64::from(width) / cols, i64::from(height) / rows);
    (0..rows)
        .flat_map(|r| {
            (0..cols).map(move |c| Rect {
                x: c * cw,
                y: r * ch,
                w: cw,
                h: ch,
            })
        })
        .collect()
}

/// Linear map from data bounds onto a pixel rectangle, y pointing up
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    min: (f64, f64),
    span: (f64, f64),
    rect: Rect,
}

impl Projection {
    /// Fit the finite points into `rect`; empty input maps the unit square
    pub fn fit<I>(points: I, rect: Rect) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut lo = (f64::INFINITY, f64::INFINITY);
        let mut hi = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in points {
            if x.is_finite() && y.is_finite() {
                lo = (lo.0.min(x), lo.1.min(y));
                hi = (hi.0.max(x), hi.1.max(y));
            }
        }
        if lo.0 > hi.0 {
            lo = (0.0, 0.0);
            hi = (1.0, 1.0);
        }
        let widen = |a: f64, b: f64| if b - a > 0.0 { (a, b - a) } else { (a - 0.5, 1.0) };
        let (x0, xs) = widen(lo.0, hi.0);
        let (y0, ys) = widen(lo.1, hi.1);
        Self {
            min: (x0, y0),
            span: (xs, ys),
            rect,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (i64, i64) {
        let fx = (x - self.min.0) / self.span.0;
        let fy = (y - self.min.1) / self.span.1;
        let px = self.rect.x as f64 + fx * (self.rect.w - 1) as f64;
        let py = (self.rect.y + self.rect.h - 1) as f64 - fy * (self.rect.h - 1) as f64;
        (px.round() as i64, py.round() as i64)
    }
}

/// RGB drawing surface
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::from_pixel(width.max(1), height.max(1), WHITE),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && x < i64::from(self.width()) && y < i64::from(self.height()) {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }

    /// Bresenham line
    pub fn line(&mut self, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.put(x, y, color);
            if (x, y) == to {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    pub fn outline(&mut self, rect: Rect, color: Rgb<u8>) {
        let (x1, y1) = (rect.x + rect.w - 1, rect.y + rect.h - 1);
        self.line((rect.x, rect.y), (x1, rect.y), color);
        self.line((x1, rect.y), (x1, y1), color);
        self.line((x1, y1), (rect.x, y1), color);
        self.line((rect.x, y1), (rect.x, rect.y), color);
    }

    /// Filled square marker
    pub fn dot(&mut self, center: (i64, i64), radius: i64, color: Rgb<u8>) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                self.put(center.0 + dx, center.1 + dy, color);
            }
        }
    }

    /// Draw `src` scaled (nearest neighbour) into `rect`
    pub fn blit(&mut self, src: &RgbImage, rect: Rect) {
        if rect.w <= 0 || rect.h <= 0 {
            return;
        }
        let scaled = imageops::resize(
            src,
            rect.w as u32,
            rect.h as u32,
            imageops::FilterType::Nearest,
        );
        for (x, y, pixel) in scaled.enumerate_pixels() {
            self.put(rect.x + i64::from(x), rect.y + i64::from(y), *pixel);
        }
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), BackendError> {
        self.image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

/// Image data accepted by `imshow`: images, RGB(A) arrays and 2-D scalar fields
pub fn value_to_rgb(value: &Value) -> Option<RgbImage> {
    if let Some(image) = value.downcast_ref::<DynamicImage>() {
        return Some(image.to_rgb8());
    }
    let array = value.downcast_ref::<NdArray>()?;
    match array.shape() {
        [_, _] if array.view::<u8>().is_none() => scalar_field_to_rgb(array),
        _ => array_to_image(array).ok().map(|image| image.to_rgb8()),
    }
}

/// Normalize a 2-D numeric array to grayscale
fn scalar_field_to_rgb(array: &NdArray) -> Option<RgbImage> {
    let data = array.to_f64()?;
    let (h, w) = match data.shape() {
        [h, w] => (*h, *w),
        _ => return None,
    };
    let finite = data.iter().copied().filter(|v| v.is_finite());
    let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let span = if hi > lo { hi - lo } else { 1.0 };
    let mut image = RgbImage::new(u32::try_from(w).ok()?, u32::try_from(h).ok()?);
    for ((row, col), v) in data.indexed_iter().map(|(idx, v)| ((idx[0], idx[1]), *v)) {
        let level = if v.is_finite() {
            (((v - lo) / span) * 255.0).round() as u8
        } else {
            0
        };
        image.put_pixel(col as u32, row as u32, Rgb([level, level, level]));
    }
    Some(image)
}
