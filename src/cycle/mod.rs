//! One full PIC cycle: emission, deposition, field solve, force
//! interpolation, particle flight, density relaxation, convergence metric.
//!
//! The cycle owns every piece of simulation state (grid, mesh, store,
//! solver) and passes it to the components explicitly; nothing global.
//! During a `step` call no other party may touch that state. A sequence of
//! cycles is aborted between steps (see [`PicCycle::run`]), never inside
//! one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::config::{PicProject, BACKSCATTER_CHARGE_FLOOR};
use crate::constants::{child_langmuir_current, LIGHT_VELOCITY};
use crate::deposition::{Depositor, PrevPositions};
use crate::emitter::LineEmitter;
use crate::error::{PicError, Result};
use crate::gradient;
use crate::grid::Grid2D;
use crate::mesh::FieldMesh;
use crate::monitor::{CycleTiming, Monitor, ScalarField};
use crate::mover::Leapfrog;
use crate::particle::Field;
use crate::poisson::{BoundaryConditions, FdmPoissonSolver};
use crate::storage::ParticleStore;

#[cfg(test)]
#[path = "tests.rs"]
mod tests;

/// Ignore smaller reference entries when forming the relative density
/// change, so empty regions do not blow the metric up.
const METRIC_FLOOR: f64 = 1e-20;

pub struct PicCycle {
    project: PicProject,
    grid: Grid2D,
    mesh: FieldMesh,
    store: ParticleStore,
    emitter: LineEmitter,
    depositor: Depositor,
    mover: Leapfrog,
    solver: FdmPoissonSolver,
    prev: PrevPositions,
    /// Relaxed density estimate carried between cycles.
    relaxed: Vec<f64>,
    /// Scratch: relaxed estimate plus the fresh deposit, fed to the solver.
    solve_density: Vec<f64>,
    /// Scratch handle list for the flight loop.
    flying: Vec<usize>,
    /// Position step scale: time step times c.
    h: f64,
    /// Charge each emitted particle starts with.
    emitted_charge: f64,
    cycles: usize,
    timing: CycleTiming,
    trajectories: Vec<(usize, f64, f64)>,
    convergence: f64,
    reflections: usize,
}

impl PicCycle {
    pub fn new(project: PicProject) -> Result<Self> {
        project.validate()?;

        let grid = Grid2D::new(
            project.grid_nx,
            project.grid_ny,
            0.0,
            project.length,
            0.0,
            project.height,
        )?;
        let mesh = FieldMesh::new(grid.count());
        let store = ParticleStore::new(project.storage_capacity());

        let current_density = -child_langmuir_current(project.length, project.voltage);
        let emitter = LineEmitter::new(
            (0.0, project.emitter_bottom),
            (0.0, project.emitter_top),
            project.particles_count,
            project.emitter_energy_ev,
            0.0,
            current_density,
            project.time_step,
        );
        let emitted_charge = emitter.particle_charge();

        let solver = FdmPoissonSolver::new(
            &grid,
            BoundaryConditions::diode(project.voltage),
            project.solver_max_iterations,
            project.solver_tolerance,
        )?;

        let depositor = Depositor::new(project.scheme, project.parallel);
        let prev = PrevPositions::new(project.storage_capacity());
        let count = grid.count();
        let h = project.time_step * LIGHT_VELOCITY;

        Ok(Self {
            project,
            grid,
            mesh,
            store,
            emitter,
            depositor,
            mover: Leapfrog,
            solver,
            prev,
            relaxed: vec![0.0; count],
            solve_density: vec![0.0; count],
            flying: Vec::new(),
            h,
            emitted_charge,
            cycles: 0,
            timing: CycleTiming::default(),
            trajectories: Vec::new(),
            convergence: 0.0,
            reflections: 0,
        })
    }

    pub fn grid(&self) -> &Grid2D {
        &self.grid
    }

    pub fn project(&self) -> &PicProject {
        &self.project
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// One complete simulation cycle. Returns the convergence metric: the
    /// relative max-norm change of the relaxed density field.
    pub fn step(&mut self) -> Result<f64> {
        crate::profile_scope!("cycle_step");
        let cycle_start = Instant::now();
        let sampling = self.cycles % self.project.trajectory_interval == 0;
        if sampling {
            self.trajectories.clear();
        }
        self.reflections = 0;

        // emission: register the batch and remember who is new
        let batch = self.emitter.inject();
        let mut injected = Vec::with_capacity(batch.len());
        for particle in batch {
            let cell = self.grid.find_cell(particle.x, particle.y);
            let handle = self.store.add(particle)?;
            self.store.set_cell(handle, cell);
            self.prev.set(handle, particle.x, particle.y);
            injected.push(handle);
        }

        // fresh deposition pass over everything alive (zero displacements,
        // so current linkage degenerates to the static weights)
        self.mesh.reset_density();
        self.depositor.deposit(&self.store, &self.grid, &mut self.mesh, &self.prev);

        // field solve from the relaxed estimate plus the fresh deposit
        for (node, value) in self.solve_density.iter_mut().enumerate() {
            *value = self.relaxed[node] + self.mesh.density[node];
        }
        let rhs = self.solver.build_vector(&self.solve_density);
        let poisson_start = Instant::now();
        self.mesh.potential = self.solver.solve(&rhs)?;
        self.timing.last_poisson = poisson_start.elapsed();
        self.timing.total_poisson += self.timing.last_poisson;
        gradient::evaluate(
            &self.mesh.potential,
            &mut self.mesh.ex,
            &mut self.mesh.ey,
            self.grid.nx(),
            self.grid.ny(),
            self.grid.hx(),
            self.grid.hy(),
        );

        // sample the field onto every particle
        self.store.reset_forces();
        self.depositor.interpolate_forces(&mut self.store, &self.grid, &self.mesh);

        // the staggered half kick applies to fresh particles only
        for &handle in &injected {
            self.mover.prepare(&mut self.store, handle, self.h);
        }

        // flight loop: push everyone until the store drains
        let mut substeps = 0;
        while self.store.count() > 0 {
            substeps += 1;
            if substeps > self.project.max_substeps {
                return Err(PicError::FlightStalled(self.project.max_substeps));
            }
            self.advance_particles(sampling);
            if self.store.count() == 0 {
                break;
            }
            self.depositor.deposit(&self.store, &self.grid, &mut self.mesh, &self.prev);
            self.store.reset_forces();
            self.depositor.interpolate_forces(&mut self.store, &self.grid, &self.mesh);
        }

        // relax the density and measure how much it still moves
        let w = self.project.relaxation;
        let mut metric: f64 = 0.0;
        for node in 0..self.relaxed.len() {
            let old = self.relaxed[node];
            let new = (1.0 - w) * old + w * self.mesh.density[node];
            if old.abs() >= METRIC_FLOOR {
                metric = metric.max(((old - new) / old).abs());
            }
            self.relaxed[node] = new;
        }
        self.mesh.density.copy_from_slice(&self.relaxed);

        self.convergence = metric;
        self.cycles += 1;
        self.timing.last_cycle = cycle_start.elapsed();
        self.timing.total_cycles += self.timing.last_cycle;
        Ok(metric)
    }

    /// Push every live particle one leapfrog step, then absorb, reflect or
    /// re-tag it. The out-of-grid test runs before any cell lookup.
    fn advance_particles(&mut self, sampling: bool) {
        let mut flying = std::mem::take(&mut self.flying);
        flying.clear();
        flying.extend(self.store.live_handles());

        let charge_floor = BACKSCATTER_CHARGE_FLOOR * self.emitted_charge.abs();
        for &handle in &flying {
            let x0 = self.store.get(Field::X, handle);
            let y0 = self.store.get(Field::Y, handle);
            self.prev.set(handle, x0, y0);

            self.mover.step(&mut self.store, handle, self.h);
            let x = self.store.get(Field::X, handle);
            let y = self.store.get(Field::Y, handle);

            if self.grid.is_out_of_grid(x, y) {
                if self.project.backscattering {
                    // put the particle back where it was, send it the other
                    // way with attenuated momentum and charge
                    let px = self.store.get(Field::Px, handle);
                    let py = self.store.get(Field::Py, handle);
                    let alfa = self.project.backscattering_alfa;
                    self.store.update(handle, x0, y0, -alfa * px, -alfa * py);
                    self.store.multiply(Field::Q, handle, self.project.backscattering_beta);
                    self.reflections += 1;
                    if self.store.get(Field::Q, handle).abs() < charge_floor {
                        self.store.remove_at(handle);
                    } else if sampling {
                        self.trajectories.push((handle, x0, y0));
                    }
                } else {
                    self.store.remove_at(handle);
                }
            } else {
                let cell = self.grid.find_cell(x, y);
                self.store.set_cell(handle, cell);
                if sampling {
                    self.trajectories.push((handle, x, y));
                }
            }
        }
        self.flying = flying;
    }

    /// Run up to `max_cycles` steps, checking the cancellation flag
    /// between cycles (never inside one).
    pub fn run(&mut self, max_cycles: usize, cancel: &AtomicBool) -> Result<f64> {
        let mut metric = self.convergence;
        for _ in 0..max_cycles {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            metric = self.step()?;
        }
        Ok(metric)
    }

    /// Value snapshot of everything the display layer may want.
    pub fn monitor(&self) -> Monitor {
        let nx = self.grid.nx();
        let ny = self.grid.ny();
        Monitor {
            density: ScalarField::new(nx, ny, self.mesh.density.clone()),
            potential: ScalarField::new(nx, ny, self.mesh.potential.clone()),
            ex: ScalarField::new(nx, ny, self.mesh.ex.clone()),
            ey: ScalarField::new(nx, ny, self.mesh.ey.clone()),
            grid_x: self.grid.x().to_vec(),
            grid_y: self.grid.y().to_vec(),
            particles_count: self.store.count(),
            timing: self.timing,
            trajectories: self.trajectories.clone(),
            convergence: self.convergence,
            cycles: self.cycles,
            reflections: self.reflections,
        }
    }
}
