//! Particle-mesh coupling: charge/current deposition and force
//! interpolation, both with bilinear cloud-in-cell weights.
//!
//! The weight a particle gives a corner node equals the area of the
//! rectangle spanned by the particle and the diagonally opposite corner,
//! normalized by the cell area. The four weights of a cell always sum to 1.
//!
//! Two deposition strategies exist. Plain cloud-in-cell spreads the charge
//! of a particle at rest. Current linkage deposits along the displacement
//! segment of a moving particle, split at every cell boundary it crosses,
//! so the deposited flux matches the actual path (discrete charge
//! continuity). The segment decomposition uses cheap single-split paths for
//! neighboring cells and exact ray marching for everything else.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::grid::{Grid2D, NO_CELL};
use crate::mesh::FieldMesh;
use crate::particle::Field;
use crate::storage::ParticleStore;

#[cfg(test)]
#[path = "tests.rs"]
mod tests;

/// Deposition strategy, selected once at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeKind {
    /// Static area weighting of the particle's position.
    CloudInCell,
    /// Current-conserving deposition along the displacement segment.
    #[default]
    CurrentLinkage,
}

/// Displacement start points, indexed by particle handle.
///
/// The store itself holds only the current state; whoever moves particles
/// (the cycle) records where each one came from so current linkage can
/// integrate over the path.
pub struct PrevPositions {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl PrevPositions {
    pub fn new(capacity: usize) -> Self {
        Self { x: vec![0.0; capacity], y: vec![0.0; capacity] }
    }

    pub fn set(&mut self, handle: usize, x: f64, y: f64) {
        self.x[handle] = x;
        self.y[handle] = y;
    }

    pub fn get(&self, handle: usize) -> (f64, f64) {
        (self.x[handle], self.y[handle])
    }
}

/// One piece of a displacement segment lying inside a single cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubSegment {
    pub cell: usize,
    /// Fraction of the total segment length.
    pub fraction: f64,
    pub a: (f64, f64),
    pub b: (f64, f64),
}

pub struct Depositor {
    kind: SchemeKind,
    parallel: bool,
}

impl Depositor {
    pub fn new(kind: SchemeKind, parallel: bool) -> Self {
        Self { kind, parallel }
    }

    pub fn kind(&self) -> SchemeKind {
        self.kind
    }

    /// Accumulate every live particle into the mesh density.
    ///
    /// For current linkage, `prev` supplies each particle's displacement
    /// start; a particle that has not moved degenerates to the static
    /// weight.
    pub fn deposit(&self, store: &ParticleStore, grid: &Grid2D, mesh: &mut FieldMesh, prev: &PrevPositions) {
        crate::profile_scope!("deposit");
        if self.parallel {
            self.deposit_parallel(store, grid, mesh, prev);
        } else {
            for handle in store.live_handles() {
                self.deposit_one(store, grid, prev, handle, &mut |node, d| mesh.add_density(node, d));
            }
        }
    }

    /// Sample Ex/Ey at each live particle's position and accumulate into
    /// its force fields. Callers reset forces once per pass beforehand.
    pub fn interpolate_forces(&self, store: &mut ParticleStore, grid: &Grid2D, mesh: &FieldMesh) {
        crate::profile_scope!("interpolate_forces");
        if self.parallel {
            let shared: &ParticleStore = store;
            let samples: Vec<(usize, f64, f64)> = shared
                .live_handles()
                .collect::<Vec<_>>()
                .par_iter()
                .map(|&handle| {
                    let (fx, fy) = field_sample(shared, grid, mesh, handle);
                    (handle, fx, fy)
                })
                .collect();
            for (handle, fx, fy) in samples {
                store.add_force(handle, fx, fy);
            }
        } else {
            let handles: Vec<usize> = store.live_handles().collect();
            for handle in handles {
                let (fx, fy) = field_sample(store, grid, mesh, handle);
                store.add_force(handle, fx, fy);
            }
        }
    }

    fn deposit_one(
        &self,
        store: &ParticleStore,
        grid: &Grid2D,
        prev: &PrevPositions,
        handle: usize,
        add: &mut dyn FnMut(usize, f64),
    ) {
        match self.kind {
            SchemeKind::CloudInCell => deposit_charge(store, grid, handle, add),
            SchemeKind::CurrentLinkage => deposit_current(store, grid, prev, handle, add),
        }
    }

    fn deposit_parallel(&self, store: &ParticleStore, grid: &Grid2D, mesh: &mut FieldMesh, prev: &PrevPositions) {
        let handles: Vec<usize> = store.live_handles().collect();
        if handles.is_empty() {
            return;
        }
        let nodes = mesh.count();
        let chunk = (handles.len() / rayon::current_num_threads()).max(1);
        // Disjoint particle ranges accumulate into thread-local buffers;
        // the reduction is the only place mesh nodes are combined, so no
        // per-node synchronization is needed.
        let summed = handles
            .par_chunks(chunk)
            .fold(
                || vec![0.0f64; nodes],
                |mut local, part| {
                    for &handle in part {
                        self.deposit_one(store, grid, prev, handle, &mut |node, d| local[node] += d);
                    }
                    local
                },
            )
            .reduce(
                || vec![0.0f64; nodes],
                |mut a, b| {
                    for (acc, v) in a.iter_mut().zip(b) {
                        *acc += v;
                    }
                    a
                },
            );
        for (node, v) in summed.into_iter().enumerate() {
            if v != 0.0 {
                mesh.add_density(node, v);
            }
        }
    }
}

/// Bilinear weight of the corner diagonally opposite `node`, for a point at
/// (x, y) inside the cell.
fn weight(grid: &Grid2D, x: f64, y: f64, node: usize) -> f64 {
    let (node_x, node_y) = grid.node(node);
    let w = ((node_x - x) * (node_y - y)).abs() / (grid.hx() * grid.hy());
    debug_assert!((-1e-9..=1.0 + 1e-9).contains(&w), "degenerate interpolation weight {}", w);
    w
}

/// Static cloud-in-cell deposit of one particle's charge.
fn deposit_charge(store: &ParticleStore, grid: &Grid2D, handle: usize, add: &mut dyn FnMut(usize, f64)) {
    let cell = store.cell(handle);
    let top = grid.upper_cell(cell);
    debug_assert!(top != NO_CELL);
    let density = store.get(Field::Q, handle) / grid.cell_square();
    let x = store.get(Field::X, handle);
    let y = store.get(Field::Y, handle);

    add(cell, density * weight(grid, x, y, top + 1));
    add(cell + 1, density * weight(grid, x, y, top));
    add(top, density * weight(grid, x, y, cell + 1));
    add(top + 1, density * weight(grid, x, y, cell));
}

/// Current-linkage deposit of one particle's displacement segment.
fn deposit_current(
    store: &ParticleStore,
    grid: &Grid2D,
    prev: &PrevPositions,
    handle: usize,
    add: &mut dyn FnMut(usize, f64),
) {
    let current = store.get(Field::Q, handle) / grid.cell_square();
    let x2 = store.get(Field::X, handle);
    let y2 = store.get(Field::Y, handle);
    let (x1, y1) = prev.get(handle);

    for seg in decompose(grid, x1, y1, x2, y2) {
        current_to_cell(grid, seg.cell, seg.fraction * current, seg.a, seg.b, add);
    }
}

/// Split the segment (x1,y1) -> (x2,y2) into per-cell pieces whose length
/// fractions sum to 1.
pub fn decompose(grid: &Grid2D, x1: f64, y1: f64, x2: f64, y2: f64) -> SmallVec<[SubSegment; 4]> {
    let cell1 = grid.find_cell(x1, y1);
    let cell2 = grid.find_cell(x2, y2);
    let mut segments = SmallVec::new();

    if cell2 == cell1 {
        segments.push(SubSegment { cell: cell2, fraction: 1.0, a: (x1, y1), b: (x2, y2) });
        return segments;
    }

    let length = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();
    // an index difference of 1 only means "horizontal neighbor" within a row
    let same_row = cell1 / grid.nx() == cell2 / grid.nx();

    if same_row && cell2 == cell1 + 1 {
        // crossed one vertical line moving right
        let xb = grid.node(cell2).0;
        let yb = line_y(x1, x2, y1, y2, xb);
        let head = dist(x1, y1, xb, yb) / length;
        segments.push(SubSegment { cell: cell1, fraction: head, a: (x1, y1), b: (xb, yb) });
        segments.push(SubSegment { cell: cell2, fraction: 1.0 - head, a: (xb, yb), b: (x2, y2) });
        return segments;
    }
    if same_row && cell1 == cell2 + 1 {
        // crossed one vertical line moving left
        let xb = grid.node(cell1).0;
        let yb = line_y(x1, x2, y1, y2, xb);
        let head = dist(x1, y1, xb, yb) / length;
        segments.push(SubSegment { cell: cell1, fraction: head, a: (x1, y1), b: (xb, yb) });
        segments.push(SubSegment { cell: cell2, fraction: 1.0 - head, a: (xb, yb), b: (x2, y2) });
        return segments;
    }
    if grid.upper_cell(cell1) == cell2 {
        // crossed one horizontal line moving up
        let yb = grid.node(cell2).1;
        let xb = line_x(x1, x2, y1, y2, yb);
        let head = dist(x1, y1, xb, yb) / length;
        segments.push(SubSegment { cell: cell1, fraction: head, a: (x1, y1), b: (xb, yb) });
        segments.push(SubSegment { cell: cell2, fraction: 1.0 - head, a: (xb, yb), b: (x2, y2) });
        return segments;
    }
    if grid.upper_cell(cell2) == cell1 {
        // crossed one horizontal line moving down
        let yb = grid.node(cell1).1;
        let xb = line_x(x1, x2, y1, y2, yb);
        let head = dist(x1, y1, xb, yb) / length;
        segments.push(SubSegment { cell: cell1, fraction: head, a: (x1, y1), b: (xb, yb) });
        segments.push(SubSegment { cell: cell2, fraction: 1.0 - head, a: (xb, yb), b: (x2, y2) });
        return segments;
    }

    ray_march(grid, x1, y1, x2, y2, &mut segments);
    segments
}

/// Exact decomposition for arbitrary displacements: march from the start
/// point, always crossing the near cell boundary in the direction of
/// travel, until the destination cell is reached. A boundary hit shared by
/// a vertical and a horizontal line (a grid corner) advances both cell
/// coordinates at once.
fn ray_march(grid: &Grid2D, x1: f64, y1: f64, x2: f64, y2: f64, out: &mut SmallVec<[SubSegment; 4]>) {
    const EPS: f64 = 1e-12;
    let (hx, hy) = (grid.hx(), grid.hy());
    let (dx, dy) = (x2 - x1, y2 - y1);
    let mut cx = (x1 / hx).floor() as i64;
    let mut cy = (y1 / hy).floor() as i64;

    let mut t = 0.0;
    let mut ax = x1;
    let mut ay = y1;
    let bound = grid.nx() + grid.ny() + 4;
    for _ in 0..bound {
        let tx = if dx > 0.0 {
            (((cx + 1) as f64) * hx - x1) / dx
        } else if dx < 0.0 {
            ((cx as f64) * hx - x1) / dx
        } else {
            f64::INFINITY
        };
        let ty = if dy > 0.0 {
            (((cy + 1) as f64) * hy - y1) / dy
        } else if dy < 0.0 {
            ((cy as f64) * hy - y1) / dy
        } else {
            f64::INFINITY
        };
        let t_next = tx.min(ty);

        let cell = cy as usize * grid.nx() + cx as usize;
        if t_next >= 1.0 - EPS {
            out.push(SubSegment { cell, fraction: 1.0 - t, a: (ax, ay), b: (x2, y2) });
            return;
        }

        let bx = x1 + t_next * dx;
        let by = y1 + t_next * dy;
        if t_next - t > EPS {
            out.push(SubSegment { cell, fraction: t_next - t, a: (ax, ay), b: (bx, by) });
        }
        if tx <= t_next + EPS {
            cx += if dx > 0.0 { 1 } else { -1 };
        }
        if ty <= t_next + EPS {
            cy += if dy > 0.0 { 1 } else { -1 };
        }
        t = t_next;
        ax = bx;
        ay = by;
    }
    debug_assert!(false, "ray march failed to reach the destination cell");
}

/// Spread one sub-segment's current over its cell's four corners, averaging
/// the endpoint weights.
fn current_to_cell(
    grid: &Grid2D,
    cell: usize,
    current: f64,
    (ax, ay): (f64, f64),
    (bx, by): (f64, f64),
    add: &mut dyn FnMut(usize, f64),
) {
    let top = grid.upper_cell(cell);
    debug_assert!(top != NO_CELL);

    add(cell, 0.5 * current * (weight(grid, ax, ay, top + 1) + weight(grid, bx, by, top + 1)));
    add(cell + 1, 0.5 * current * (weight(grid, ax, ay, top) + weight(grid, bx, by, top)));
    add(top, 0.5 * current * (weight(grid, ax, ay, cell + 1) + weight(grid, bx, by, cell + 1)));
    add(top + 1, 0.5 * current * (weight(grid, ax, ay, cell) + weight(grid, bx, by, cell)));
}

/// Bilinear Ex/Ey sample at one particle's position.
fn field_sample(store: &ParticleStore, grid: &Grid2D, mesh: &FieldMesh, handle: usize) -> (f64, f64) {
    let cell = store.cell(handle);
    let top = grid.upper_cell(cell);
    debug_assert!(top != NO_CELL);
    let x = store.get(Field::X, handle);
    let y = store.get(Field::Y, handle);

    let left_bottom = weight(grid, x, y, top + 1);
    let right_bottom = weight(grid, x, y, top);
    let left_top = weight(grid, x, y, cell + 1);
    let right_top = weight(grid, x, y, cell);

    let fx = mesh.ex(cell) * left_bottom
        + mesh.ex(cell + 1) * right_bottom
        + mesh.ex(top) * left_top
        + mesh.ex(top + 1) * right_top;
    let fy = mesh.ey(cell) * left_bottom
        + mesh.ey(cell + 1) * right_bottom
        + mesh.ey(top) * left_top
        + mesh.ey(top + 1) * right_top;
    (fx, fy)
}

/// y on the line through (x1,y1)-(x2,y2) at abscissa x.
fn line_y(x1: f64, x2: f64, y1: f64, y2: f64, x: f64) -> f64 {
    ((x - x2) * y1 + (x1 - x) * y2) / (x1 - x2)
}

/// x on the line through (x1,y1)-(x2,y2) at ordinate y.
fn line_x(x1: f64, x2: f64, y1: f64, y2: f64, y: f64) -> f64 {
    ((y1 - y) * x2 + (y - y2) * x1) / (y1 - y2)
}

fn dist(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt()
}
