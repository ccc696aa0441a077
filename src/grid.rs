//! Rectangular grid topology.
//!
//! Nodes are indexed row-major with x varying fastest; a cell shares the
//! index of its bottom-left node. The topology is immutable after
//! construction.

use crate::error::{PicError, Result};

/// Sentinel for "no neighbor" (top row has no upper cell).
pub const NO_CELL: usize = usize::MAX;

pub struct Grid2D {
    nx: usize,
    ny: usize,
    left: f64,
    right: f64,
    bottom: f64,
    top: f64,
    hx: f64,
    hy: f64,
    /// Node coordinate along x, per linear node index.
    node_x: Vec<f64>,
    node_y: Vec<f64>,
    /// Index of the node directly above, `NO_CELL` on the top row.
    up: Vec<usize>,
    /// Distinct x samples (length nx).
    x: Vec<f64>,
    /// Distinct y samples (length ny).
    y: Vec<f64>,
}

impl Grid2D {
    pub fn new(nx: usize, ny: usize, left: f64, right: f64, bottom: f64, top: f64) -> Result<Self> {
        if nx < 2 || ny < 2 {
            return Err(PicError::InvalidConfig(format!(
                "grid needs at least 2 nodes per axis, got {}x{}",
                nx, ny
            )));
        }
        if !(right > left) || !(top > bottom) {
            return Err(PicError::InvalidConfig("grid extents must be increasing".into()));
        }

        let x = linear_spaced(nx, left, right);
        let y = linear_spaced(ny, bottom, top);

        let count = nx * ny;
        let mut node_x = vec![0.0; count];
        let mut node_y = vec![0.0; count];
        for j in 0..ny {
            for i in 0..nx {
                node_x[j * nx + i] = x[i];
                node_y[j * nx + i] = y[j];
            }
        }

        let mut up = vec![NO_CELL; count];
        for id in 0..count {
            if id + nx < count {
                up[id] = id + nx;
            }
        }

        // Spacing taken from the sample arrays, not (right-left)/(nx-1), so
        // cell lookup rounds the same way the coordinates were generated.
        let hx = x[1] - x[0];
        let hy = y[1] - y[0];

        Ok(Self { nx, ny, left, right, bottom, top, hx, hy, node_x, node_y, up, x, y })
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Total node count.
    pub fn count(&self) -> usize {
        self.nx * self.ny
    }

    pub fn hx(&self) -> f64 {
        self.hx
    }

    pub fn hy(&self) -> f64 {
        self.hy
    }

    pub fn cell_square(&self) -> f64 {
        self.hx * self.hy
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    pub fn top(&self) -> f64 {
        self.top
    }

    /// The x samples, length `nx`.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// The y samples, length `ny`.
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Cell containing (x, y), floor tie-break on grid lines.
    ///
    /// Callers must have established the point is inside the grid (see
    /// [`Grid2D::is_out_of_grid`]); out-of-range input yields an undefined
    /// cell index.
    pub fn find_cell(&self, x: f64, y: f64) -> usize {
        let cell = (y / self.hy).floor() as usize * self.nx + (x / self.hx).floor() as usize;
        debug_assert!(cell < self.count());
        cell
    }

    /// Node directly above, `NO_CELL` for the top row.
    pub fn upper_cell(&self, cell: usize) -> usize {
        self.up[cell]
    }

    /// Strict extent test; points exactly on the border are inside.
    pub fn is_out_of_grid(&self, x: f64, y: f64) -> bool {
        x > self.right || x < self.left || y > self.top || y < self.bottom
    }

    /// Coordinates of a node.
    pub fn node(&self, cell: usize) -> (f64, f64) {
        (self.node_x[cell], self.node_y[cell])
    }
}

fn linear_spaced(length: usize, start: f64, stop: f64) -> Vec<f64> {
    let step = (stop - start) / (length - 1) as f64;
    let mut data: Vec<f64> = (0..length).map(|i| start + i as f64 * step).collect();
    // Pin the last sample so the extent test agrees with the boundary value.
    data[length - 1] = stop;
    data
}
