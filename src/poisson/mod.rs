//! Finite-difference Poisson solver with mixed boundary conditions.
//!
//! Unknowns are ordered column by column inside the solver (row index
//! `ny*i + j` for grid node (i, j)), while the mesh stores nodes row by
//! row with x fastest; `solve` re-orders its result into the mesh
//! convention before returning. The matrix and its ILU(0) factors are
//! assembled once per run; the geometry and boundary types never change
//! between cycles.

pub mod bicgstab;
pub mod csr;

use nalgebra::DVector;

use crate::constants::VACUUM_PERMITTIVITY;
use crate::error::{PicError, Result};
use crate::grid::Grid2D;
use bicgstab::Ilu0;
use csr::CsrMatrix;

type ValueFn = Box<dyn Fn(f64) -> f64 + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    /// Fixed potential along the side.
    Dirichlet,
    /// Fixed outward normal derivative along the side.
    Neumann,
}

/// One side's constraint; the value may vary along the side's coordinate.
pub struct BoundaryCondition {
    pub kind: BoundaryKind,
    value: ValueFn,
}

impl BoundaryCondition {
    pub fn new(kind: BoundaryKind, value: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self { kind, value: Box::new(value) }
    }

    pub fn constant(kind: BoundaryKind, value: f64) -> Self {
        Self::new(kind, move |_| value)
    }

    pub fn value(&self, coord: f64) -> f64 {
        (self.value)(coord)
    }
}

pub struct BoundaryConditions {
    pub left: BoundaryCondition,
    pub right: BoundaryCondition,
    pub bottom: BoundaryCondition,
    pub top: BoundaryCondition,
}

impl BoundaryConditions {
    /// Planar diode: grounded cathode on the left, anode voltage on the
    /// right, insulated channel walls.
    pub fn diode(voltage: f64) -> Self {
        Self {
            left: BoundaryCondition::constant(BoundaryKind::Dirichlet, 0.0),
            right: BoundaryCondition::constant(BoundaryKind::Dirichlet, voltage),
            bottom: BoundaryCondition::constant(BoundaryKind::Neumann, 0.0),
            top: BoundaryCondition::constant(BoundaryKind::Neumann, 0.0),
        }
    }
}

pub struct FdmPoissonSolver {
    /// Nodes along x.
    n: usize,
    /// Nodes along y.
    m: usize,
    x: Vec<f64>,
    y: Vec<f64>,
    conditions: BoundaryConditions,
    matrix: CsrMatrix,
    precond: Ilu0,
    max_iterations: usize,
    tolerance: f64,
    /// Iterate carried between cycles; the previous potential is the warm
    /// start for the next solve.
    iterate: DVector<f64>,
}

impl FdmPoissonSolver {
    pub fn new(
        grid: &Grid2D,
        conditions: BoundaryConditions,
        max_iterations: usize,
        tolerance: f64,
    ) -> Result<Self> {
        let n = grid.nx();
        let m = grid.ny();
        let matrix = build_matrix(n, m, grid.hx(), grid.hy(), &conditions);
        let precond = Ilu0::factor(&matrix)
            .map_err(|_| PicError::InvalidConfig("singular Poisson system: ILU(0) factorization failed".into()))?;
        Ok(Self {
            n,
            m,
            x: grid.x().to_vec(),
            y: grid.y().to_vec(),
            conditions,
            matrix,
            precond,
            max_iterations,
            tolerance,
            iterate: DVector::zeros(n * m),
        })
    }

    /// Right-hand side for a density field given in mesh (grid) ordering:
    /// `-rho/eps0` on interior rows, boundary values elsewhere.
    pub fn build_vector(&self, density: &[f64]) -> DVector<f64> {
        let (n, m) = (self.n, self.m);
        let mut vector = DVector::zeros(n * m);
        for i in 1..n - 1 {
            for j in 1..m - 1 {
                vector[m * i + j] = -density[n * j + i] / VACUUM_PERMITTIVITY;
            }
        }
        for j in 0..m {
            vector[j] = self.conditions.left.value(self.y[j]);
            vector[m * (n - 1) + j] = self.conditions.right.value(self.y[j]);
        }
        for i in 1..n - 1 {
            vector[m * i] = self.conditions.bottom.value(self.x[i]);
            vector[m * i + m - 1] = self.conditions.top.value(self.x[i]);
        }
        vector
    }

    /// Solve for the potential, returned in mesh (grid) node ordering.
    ///
    /// A numerical breakdown is retried once from a zeroed iterate; a
    /// second consecutive breakdown aborts the cycle.
    pub fn solve(&mut self, rhs: &DVector<f64>) -> Result<Vec<f64>> {
        let mut attempts = 0;
        loop {
            match bicgstab::solve(
                &self.matrix,
                rhs,
                &mut self.iterate,
                &self.precond,
                self.max_iterations,
                self.tolerance,
            ) {
                Ok(_) => break,
                Err(_) => {
                    attempts += 1;
                    if attempts == 2 {
                        return Err(PicError::SolverDivergence { attempts });
                    }
                    self.iterate.fill(0.0);
                }
            }
        }

        let (n, m) = (self.n, self.m);
        let mut potential = vec![0.0; n * m];
        for i in 0..n {
            for j in 0..m {
                potential[n * j + i] = self.iterate[m * i + j];
            }
        }
        Ok(potential)
    }
}

/// Assemble the finite-difference system: 5-point Laplacian on interior
/// rows, boundary rows overwritten per side. Corners belong to the
/// left/right conditions.
fn build_matrix(n: usize, m: usize, dx: f64, dy: f64, conditions: &BoundaryConditions) -> CsrMatrix {
    let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n * m];

    for j in 0..m {
        let row = j; // i = 0
        match conditions.left.kind {
            BoundaryKind::Dirichlet => rows[row].push((row, 1.0)),
            BoundaryKind::Neumann => {
                // outward normal points toward -x
                rows[row].push((row, 1.0 / dx));
                rows[row].push((m + j, -1.0 / dx));
            }
        }
        let row = m * (n - 1) + j;
        match conditions.right.kind {
            BoundaryKind::Dirichlet => rows[row].push((row, 1.0)),
            BoundaryKind::Neumann => {
                rows[row].push((row, 1.0 / dx));
                rows[row].push((m * (n - 2) + j, -1.0 / dx));
            }
        }
    }
    for i in 1..n - 1 {
        let row = m * i; // j = 0
        match conditions.bottom.kind {
            BoundaryKind::Dirichlet => rows[row].push((row, 1.0)),
            BoundaryKind::Neumann => {
                // outward normal points toward -y
                rows[row].push((row, 1.0 / dy));
                rows[row].push((row + 1, -1.0 / dy));
            }
        }
        let row = m * i + m - 1;
        match conditions.top.kind {
            BoundaryKind::Dirichlet => rows[row].push((row, 1.0)),
            BoundaryKind::Neumann => {
                rows[row].push((row, 1.0 / dy));
                rows[row].push((row - 1, -1.0 / dy));
            }
        }
    }
    for i in 1..n - 1 {
        for j in 1..m - 1 {
            let row = m * i + j;
            rows[row].push((row, -2.0 / (dx * dx) - 2.0 / (dy * dy)));
            rows[row].push((m * (i + 1) + j, 1.0 / (dx * dx)));
            rows[row].push((m * (i - 1) + j, 1.0 / (dx * dx)));
            rows[row].push((row + 1, 1.0 / (dy * dy)));
            rows[row].push((row - 1, 1.0 / (dy * dy)));
        }
    }

    CsrMatrix::from_rows(rows)
}
