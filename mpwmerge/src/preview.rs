//! Raster previews of a layout.

use std::path::Path;

use image::{ImageFormat, Rgba, RgbaImage};
use subgeom::{Point, Polygon, Shape};

use crate::error::{with_err_context, ErrorContext, Result};
use crate::layout::cell::CellKey;
use crate::layout::layers::LayerSpec;
use crate::layout::Layout;

const PALETTE: [[u8; 3]; 8] = [
    [220, 50, 47],
    [38, 139, 210],
    [133, 153, 0],
    [211, 54, 130],
    [42, 161, 152],
    [181, 137, 0],
    [108, 113, 196],
    [203, 75, 22],
];

/// Options for [`render`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewOptions {
    /// Length in pixels of the longer image side.
    pub max_size: u32,
    pub background: [u8; 4],
    /// Opacity of filled shapes, between 0 and 1.
    pub opacity: f64,
    /// Layers drawn as outlines instead of fills.
    pub outline_layers: Vec<LayerSpec>,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            max_size: 2048,
            background: [255, 255, 255, 255],
            opacity: 0.4,
            outline_layers: vec![LayerSpec::new(99, 0)],
        }
    }
}

/// Returns the color used for `layer`.
pub fn layer_color(layer: LayerSpec) -> [u8; 3] {
    let idx = (layer.0 as i64 * 31 + layer.1 as i64).rem_euclid(PALETTE.len() as i64);
    PALETTE[idx as usize]
}

struct Raster<'a> {
    img: RgbaImage,
    origin: Point,
    scale: f64,
    opts: &'a PreviewOptions,
}

impl<'a> Raster<'a> {
    fn to_px(&self, p: Point) -> (f64, f64) {
        let x = (p.x - self.origin.x) as f64 * self.scale;
        let y = self.img.height() as f64 - (p.y - self.origin.y) as f64 * self.scale;
        (x, y)
    }

    fn blend(&mut self, col: u32, row: u32, color: [u8; 3], alpha: f64) {
        let px = self.img.get_pixel_mut(col, row);
        for (c, v) in px.0.iter_mut().zip(color) {
            *c = (*c as f64 * (1. - alpha) + v as f64 * alpha).round() as u8;
        }
    }

    /// Even-odd scanline fill sampled at pixel centers.
    fn fill(&mut self, poly: &Polygon, color: [u8; 3]) {
        let pts: Vec<(f64, f64)> = poly.points.iter().map(|p| self.to_px(*p)).collect();
        if pts.len() < 3 {
            return;
        }
        let (w, h) = self.img.dimensions();
        let ymin = pts.iter().map(|p| p.1).fold(f64::INFINITY, f64::min).max(0.);
        let ymax = pts.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max).min(h as f64);
        let mut xs = Vec::new();
        for row in ymin.floor() as u32..ymax.ceil() as u32 {
            let yc = row as f64 + 0.5;
            xs.clear();
            for (i, a) in pts.iter().enumerate() {
                let b = pts[(i + 1) % pts.len()];
                if (a.1 <= yc) != (b.1 <= yc) {
                    xs.push(a.0 + (yc - a.1) * (b.0 - a.0) / (b.1 - a.1));
                }
            }
            xs.sort_by(f64::total_cmp);
            for pair in xs.chunks_exact(2) {
                let start = (pair[0] - 0.5).ceil().max(0.);
                let stop = (pair[1] - 0.5).floor().min(w as f64 - 1.);
                if stop < start {
                    continue;
                }
                for col in start as u32..=stop as u32 {
                    self.blend(col, row, color, self.opts.opacity);
                }
            }
        }
    }

    fn outline(&mut self, poly: &Polygon, color: [u8; 3]) {
        let pts: Vec<(f64, f64)> = poly.points.iter().map(|p| self.to_px(*p)).collect();
        for (i, a) in pts.iter().enumerate() {
            let b = pts[(i + 1) % pts.len()];
            let steps = (b.0 - a.0).abs().max((b.1 - a.1).abs()).ceil().max(1.) as u32;
            for s in 0..=steps {
                let t = s as f64 / steps as f64;
                self.dot(a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t, color);
            }
        }
    }

    fn dot(&mut self, x: f64, y: f64, color: [u8; 3]) {
        let (w, h) = self.img.dimensions();
        let col = x.floor().clamp(0., w as f64 - 1.) as u32;
        let row = y.floor().clamp(0., h as f64 - 1.) as u32;
        self.blend(col, row, color, 1.);
    }
}

/// Rasterizes the geometry under `top`, scaled to fit `opts.max_size`.
///
/// Text is not drawn. An empty cell renders as a single background pixel.
pub fn render(layout: &Layout, top: CellKey, opts: &PreviewOptions) -> RgbaImage {
    let Some(bbox) = layout.bbox(top).into_option() else {
        return RgbaImage::from_pixel(1, 1, Rgba(opts.background));
    };
    let longest = bbox.width().max(bbox.height()).max(1) as f64;
    let scale = opts.max_size.max(1) as f64 / longest;
    let w = (bbox.width() as f64 * scale).ceil().max(1.) as u32;
    let h = (bbox.height() as f64 * scale).ceil().max(1.) as u32;
    let mut raster = Raster {
        img: RgbaImage::from_pixel(w, h, Rgba(opts.background)),
        origin: bbox.p0,
        scale,
        opts,
    };

    let mut shapes: Vec<(LayerSpec, Shape)> = Vec::new();
    layout.for_each_shape(top, &mut |layer, shape| shapes.push((layer, shape)));
    shapes.sort_by_key(|(layer, _)| *layer);
    for (layer, shape) in shapes {
        let color = layer_color(layer);
        let outline = opts.outline_layers.contains(&layer);
        for poly in shape.to_polygons() {
            if outline {
                raster.outline(&poly, color);
            } else {
                raster.fill(&poly, color);
            }
        }
    }
    raster.img
}

/// Renders `top` and writes it to `path` as a PNG.
pub fn write_png(
    layout: &Layout,
    top: CellKey,
    path: impl AsRef<Path>,
    opts: &PreviewOptions,
) -> Result<()> {
    let path = path.as_ref();
    let img = render(layout, top, opts);
    with_err_context(img.save_with_format(path, ImageFormat::Png), || {
        ErrorContext::CreateFile(path.to_path_buf())
    })
}
