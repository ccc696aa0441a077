//! Per-cycle snapshot for external display.
//!
//! Everything here is a value copy taken at the end of a cycle; the
//! presentation layer can hold on to it or ship it across threads without
//! touching live simulation state.

use std::collections::BTreeMap;
use std::time::Duration;

/// A grid-shaped scalar view, row-major with x fastest.
#[derive(Debug, Clone)]
pub struct ScalarField {
    nx: usize,
    ny: usize,
    pub data: Vec<f64>,
}

impl ScalarField {
    pub fn new(nx: usize, ny: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), nx * ny);
        Self { nx, ny, data }
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn at(&self, i: usize, j: usize) -> f64 {
        self.data[j * self.nx + i]
    }

    /// One horizontal line of values at node row `j`.
    pub fn row(&self, j: usize) -> &[f64] {
        &self.data[j * self.nx..(j + 1) * self.nx]
    }

    /// One vertical line of values at node column `i`.
    pub fn column(&self, i: usize) -> Vec<f64> {
        (0..self.ny).map(|j| self.at(i, j)).collect()
    }
}

/// Wall-clock bookkeeping for the cycle and the Poisson solve inside it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleTiming {
    pub last_cycle: Duration,
    pub total_cycles: Duration,
    pub last_poisson: Duration,
    pub total_poisson: Duration,
}

#[derive(Debug, Clone)]
pub struct Monitor {
    pub density: ScalarField,
    pub potential: ScalarField,
    pub ex: ScalarField,
    pub ey: ScalarField,
    /// x samples of the grid, for axis labeling.
    pub grid_x: Vec<f64>,
    /// y samples of the grid.
    pub grid_y: Vec<f64>,
    /// Live particles at snapshot time.
    pub particles_count: usize,
    pub timing: CycleTiming,
    /// Raw (handle, x, y) samples from the last recorded cycle.
    pub trajectories: Vec<(usize, f64, f64)>,
    /// Convergence metric returned by the last step.
    pub convergence: f64,
    /// Cycles completed so far.
    pub cycles: usize,
    /// Boundary reflections during the last cycle (backscattering only).
    pub reflections: usize,
}

impl Monitor {
    /// Trajectory points grouped per particle handle, in push order.
    pub fn trajectories_by_particle(&self) -> BTreeMap<usize, Vec<(f64, f64)>> {
        let mut grouped: BTreeMap<usize, Vec<(f64, f64)>> = BTreeMap::new();
        for &(handle, x, y) in &self.trajectories {
            grouped.entry(handle).or_default().push((x, y));
        }
        grouped
    }
}
