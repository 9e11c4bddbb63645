//! Column-major placement search.
//!
//! Designs are stacked upward in columns. A column wraps when the next
//! design would cross the column height; the new column starts to the right
//! of the widest design committed to the previous one.

use subgeom::{Dims, Point, Rect};
use thiserror::Error;

use crate::config::MergeConfig;
use crate::occupancy::Occupancy;

/// Placement failures. Both abort the merge.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum PackError {
    #[error("design from x = {x} to {right} runs past the canvas width {chip_width}")]
    CanvasExceeded { x: i64, right: i64, chip_width: i64 },
    #[error("no free slot found after {retries} cursor advances")]
    RetriesExhausted { retries: usize },
}

/// The packer's search position.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Cursor {
    pub x: i64,
    pub y: i64,
    /// Widest design committed to the current column.
    pub column_width: i64,
}

/// The placement scheduler.
#[derive(Debug, Clone)]
pub struct Packer {
    cursor: Cursor,
    gap_width: i64,
    gap_height: i64,
    column_height: i64,
    chip_width: i64,
    max_retries: usize,
}

impl Packer {
    /// Creates a packer whose first candidate sits one cell and gap above the origin.
    pub fn new(config: &MergeConfig) -> Self {
        Self {
            cursor: Cursor {
                x: 0,
                y: config.cell_height + config.gap_height,
                column_width: 0,
            },
            gap_width: config.gap_width,
            gap_height: config.gap_height,
            column_height: config.column_height,
            chip_width: config.chip_width,
            max_retries: config.max_retries,
        }
    }

    #[inline]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Moves the cursor up by one gap, wrapping to a new column if a design
    /// of height `height` would no longer fit.
    fn advance(&mut self, height: i64) {
        let c = &mut self.cursor;
        c.y += self.gap_height;
        if c.y + height > self.column_height {
            c.y = 0;
            c.x += c.column_width + self.gap_width;
            c.column_width = 0;
        }
    }

    /// Finds the first position at or after the cursor where a `dims` box
    /// does not overlap `occupancy`.
    ///
    /// The cursor is left at the returned position. Rejected positions are never revisited.
    pub fn find_slot(&mut self, dims: Dims, occupancy: &Occupancy) -> Result<Point, PackError> {
        let mut advances = 0;
        loop {
            self.advance(dims.h());
            advances += 1;
            if advances > self.max_retries {
                return Err(PackError::RetriesExhausted {
                    retries: self.max_retries,
                });
            }
            let Cursor { x, y, .. } = self.cursor;
            let right = x + dims.w();
            if right > self.chip_width {
                return Err(PackError::CanvasExceeded {
                    x,
                    right,
                    chip_width: self.chip_width,
                });
            }
            let candidate = Rect::from_corner_dims(Point::new(x, y), dims);
            if !occupancy.overlaps(&candidate) {
                return Ok(Point::new(x, y));
            }
        }
    }

    /// Records a design of size `dims` placed at the cursor.
    pub fn commit(&mut self, dims: Dims) {
        let c = &mut self.cursor;
        c.column_width = c.column_width.max(dims.w());
        c.y += dims.h();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layers::LayerSpec;

    const FP: LayerSpec = LayerSpec::new(99, 0);

    fn config(column_height: i64, gap: i64) -> MergeConfig {
        MergeConfig::builder()
            .column_height(column_height)
            .gap_width(gap)
            .gap_height(gap)
            .build()
            .unwrap()
    }

    fn place(packer: &mut Packer, occupancy: &mut Occupancy, dims: Dims) -> Point {
        let at = packer.find_slot(dims, occupancy).unwrap();
        occupancy.add_shapes([Rect::from_corner_dims(at, dims).into()]);
        packer.commit(dims);
        at
    }

    #[test]
    fn second_footprint_wraps_to_next_column() {
        let mut packer = Packer::new(&config(1_000_000, 0));
        let mut occupancy = Occupancy::new(FP);
        let dims = Dims::new(605_000, 410_000);
        assert_eq!(place(&mut packer, &mut occupancy, dims), Point::new(0, 410_000));
        assert_eq!(place(&mut packer, &mut occupancy, dims), Point::new(605_000, 0));
        assert_eq!(packer.cursor().column_width, 605_000);
    }

    #[test]
    fn overlap_advances_by_gap() {
        let mut packer = Packer::new(&config(8_780_000, 8_000));
        let mut occupancy = Occupancy::new(FP);
        // A reserved block right above the first candidate.
        occupancy.add_shapes([Rect::new(Point::new(0, 418_000), Point::new(100, 450_000)).into()]);
        let at = place(&mut packer, &mut occupancy, Dims::new(100_000, 100_000));
        // Touching the top of the block is allowed.
        assert_eq!(at, Point::new(0, 450_000));
        assert_eq!(packer.cursor().y, 550_000);
    }

    #[test]
    fn canvas_overflow_is_fatal() {
        let config = MergeConfig::builder()
            .column_height(410_000)
            .chip_width(1_210_000)
            .cell_height(100)
            .gap_width(0)
            .gap_height(0)
            .build()
            .unwrap();
        let mut packer = Packer::new(&config);
        let mut occupancy = Occupancy::new(FP);
        let dims = Dims::new(605_000, 410_000);
        assert_eq!(place(&mut packer, &mut occupancy, dims), Point::new(0, 0));
        assert_eq!(place(&mut packer, &mut occupancy, dims), Point::new(605_000, 0));
        assert_eq!(
            packer.find_slot(dims, &occupancy),
            Err(PackError::CanvasExceeded {
                x: 1_210_000,
                right: 1_815_000,
                chip_width: 1_210_000
            })
        );
    }

    #[test]
    fn overhanging_column_is_fatal() {
        let config = MergeConfig::builder()
            .column_height(410_000)
            .chip_width(1_000_000)
            .cell_height(0)
            .gap_width(8_000)
            .gap_height(0)
            .build()
            .unwrap();
        let mut packer = Packer::new(&config);
        let mut occupancy = Occupancy::new(FP);
        let dims = Dims::new(605_000, 410_000);
        assert_eq!(place(&mut packer, &mut occupancy, dims), Point::new(0, 0));
        // The next column starts inside the canvas but would end past it.
        assert_eq!(
            packer.find_slot(dims, &occupancy),
            Err(PackError::CanvasExceeded {
                x: 613_000,
                right: 1_218_000,
                chip_width: 1_000_000
            })
        );
    }

    #[test]
    fn retries_are_bounded() {
        let config = MergeConfig::builder()
            .gap_height(0)
            .max_retries(50)
            .build()
            .unwrap();
        let mut packer = Packer::new(&config);
        let mut occupancy = Occupancy::new(FP);
        occupancy.add_shapes([Rect::new(Point::zero(), Point::new(10_000_000, 10_000_000)).into()]);
        assert_eq!(
            packer.find_slot(Dims::new(10, 10), &occupancy),
            Err(PackError::RetriesExhausted { retries: 50 })
        );
    }
}
