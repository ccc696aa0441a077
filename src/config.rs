// Centralized configuration for the PIC engine.

use serde::{Deserialize, Serialize};

use crate::deposition::SchemeKind;
use crate::error::{PicError, Result};

// ====================
// Default run parameters
// ====================
pub const DEFAULT_PARTICLES_COUNT: usize = 100;
/// Default time step in seconds.
pub const DEFAULT_TIME_STEP: f64 = 2e-12;
/// Default anode voltage in volts.
pub const DEFAULT_VOLTAGE: f64 = 100_000.0;
pub const DEFAULT_GRID_N: usize = 101;
/// Default cathode-anode gap and channel height in meters.
pub const DEFAULT_LENGTH: f64 = 0.1;
/// Default under-relaxation weight for the density field.
pub const DEFAULT_RELAXATION: f64 = 0.7;

// ====================
// Solver parameters
// ====================
/// Iteration cap for the BiCGSTAB solve.
pub const DEFAULT_SOLVER_MAX_ITERATIONS: usize = 100;
/// Relative residual tolerance for the BiCGSTAB solve.
pub const DEFAULT_SOLVER_TOLERANCE: f64 = 1e-10;
/// Sub-step cap for one cycle's flight loop.
pub const DEFAULT_MAX_SUBSTEPS: usize = 100_000;
/// Backscattered particles are dropped below this fraction of the emitted charge.
pub const BACKSCATTER_CHARGE_FLOOR: f64 = 0.05;

/// Project configuration: everything a run needs, supplied once at setup.
///
/// The shell (GUI, CLI, whatever drives the engine) fills this in and hands
/// it to [`crate::cycle::PicCycle::new`]; the engine never reads ambient
/// state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PicProject {
    /// Particles injected per cycle.
    #[serde(default = "default_particles_count")]
    pub particles_count: usize,
    /// Time step in seconds.
    #[serde(default = "default_time_step")]
    pub time_step: f64,
    /// Anode voltage in volts (left boundary is grounded).
    #[serde(default = "default_voltage")]
    pub voltage: f64,
    /// Grid nodes along x.
    #[serde(default = "default_grid_n")]
    pub grid_nx: usize,
    /// Grid nodes along y.
    #[serde(default = "default_grid_n")]
    pub grid_ny: usize,
    /// Domain length (x extent) in meters.
    #[serde(default = "default_length")]
    pub length: f64,
    /// Domain height (y extent) in meters.
    #[serde(default = "default_length")]
    pub height: f64,
    /// Lower end of the emitter segment on the cathode line.
    #[serde(default = "default_emitter_bottom")]
    pub emitter_bottom: f64,
    /// Upper end of the emitter segment on the cathode line.
    #[serde(default = "default_emitter_top")]
    pub emitter_top: f64,
    /// Initial kinetic energy of emitted particles in electronvolts.
    #[serde(default)]
    pub emitter_energy_ev: f64,
    /// Under-relaxation weight w in (0, 1].
    #[serde(default = "default_relaxation")]
    pub relaxation: f64,
    /// Reflect particles at the boundary instead of absorbing them.
    #[serde(default)]
    pub backscattering: bool,
    /// Momentum-reflection factor applied on each bounce.
    #[serde(default = "default_backscattering_coeff")]
    pub backscattering_alfa: f64,
    /// Charge-attenuation factor applied on each bounce.
    #[serde(default = "default_backscattering_coeff")]
    pub backscattering_beta: f64,
    /// Deposition strategy; current linkage is the conservation-validated one.
    #[serde(default)]
    pub scheme: SchemeKind,
    /// Run deposition and force interpolation on the rayon pool.
    #[serde(default)]
    pub parallel: bool,
    /// Particle storage capacity; defaults to `particles_count`.
    #[serde(default)]
    pub capacity: Option<usize>,
    /// Record trajectories every this many cycles.
    #[serde(default = "default_trajectory_interval")]
    pub trajectory_interval: usize,
    #[serde(default = "default_solver_max_iterations")]
    pub solver_max_iterations: usize,
    #[serde(default = "default_solver_tolerance")]
    pub solver_tolerance: f64,
    /// Guard against a flight loop that never drains.
    #[serde(default = "default_max_substeps")]
    pub max_substeps: usize,
}

fn default_particles_count() -> usize {
    DEFAULT_PARTICLES_COUNT
}
fn default_time_step() -> f64 {
    DEFAULT_TIME_STEP
}
fn default_voltage() -> f64 {
    DEFAULT_VOLTAGE
}
fn default_grid_n() -> usize {
    DEFAULT_GRID_N
}
fn default_length() -> f64 {
    DEFAULT_LENGTH
}
fn default_emitter_bottom() -> f64 {
    0.04
}
fn default_emitter_top() -> f64 {
    0.06
}
fn default_relaxation() -> f64 {
    DEFAULT_RELAXATION
}
fn default_backscattering_coeff() -> f64 {
    0.5
}
fn default_trajectory_interval() -> usize {
    10
}
fn default_solver_max_iterations() -> usize {
    DEFAULT_SOLVER_MAX_ITERATIONS
}
fn default_solver_tolerance() -> f64 {
    DEFAULT_SOLVER_TOLERANCE
}
fn default_max_substeps() -> usize {
    DEFAULT_MAX_SUBSTEPS
}

impl Default for PicProject {
    fn default() -> Self {
        Self {
            particles_count: DEFAULT_PARTICLES_COUNT,
            time_step: DEFAULT_TIME_STEP,
            voltage: DEFAULT_VOLTAGE,
            grid_nx: DEFAULT_GRID_N,
            grid_ny: DEFAULT_GRID_N,
            length: DEFAULT_LENGTH,
            height: DEFAULT_LENGTH,
            emitter_bottom: default_emitter_bottom(),
            emitter_top: default_emitter_top(),
            emitter_energy_ev: 0.0,
            relaxation: DEFAULT_RELAXATION,
            backscattering: false,
            backscattering_alfa: 0.5,
            backscattering_beta: 0.5,
            scheme: SchemeKind::default(),
            parallel: false,
            capacity: None,
            trajectory_interval: default_trajectory_interval(),
            solver_max_iterations: DEFAULT_SOLVER_MAX_ITERATIONS,
            solver_tolerance: DEFAULT_SOLVER_TOLERANCE,
            max_substeps: DEFAULT_MAX_SUBSTEPS,
        }
    }
}

impl PicProject {
    /// Parse a project from a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let project: PicProject = toml::from_str(text)?;
        project.validate()?;
        Ok(project)
    }

    /// Storage capacity for this run.
    pub fn storage_capacity(&self) -> usize {
        self.capacity.unwrap_or(self.particles_count)
    }

    /// Reject configurations the engine must not run with.
    pub fn validate(&self) -> Result<()> {
        fn fail<T>(msg: impl Into<String>) -> Result<T> {
            Err(PicError::InvalidConfig(msg.into()))
        }
        if self.grid_nx < 3 || self.grid_ny < 3 {
            // the one-sided gradient stencils need three nodes per axis
            return fail(format!("grid must be at least 3x3, got {}x{}", self.grid_nx, self.grid_ny));
        }
        if !(self.length > 0.0) || !(self.height > 0.0) {
            return fail("domain length and height must be positive");
        }
        if !(self.time_step > 0.0) {
            return fail("time step must be positive");
        }
        if self.particles_count == 0 {
            return fail("particles_count must be nonzero");
        }
        if !(self.relaxation > 0.0 && self.relaxation <= 1.0) {
            return fail(format!("relaxation weight must lie in (0, 1], got {}", self.relaxation));
        }
        if !(self.emitter_bottom < self.emitter_top) {
            return fail("emitter_bottom must lie below emitter_top");
        }
        if self.emitter_bottom < 0.0 || self.emitter_top > self.height {
            return fail("emitter segment must lie inside the domain");
        }
        if self.storage_capacity() < self.particles_count {
            return fail("capacity must hold at least one emission");
        }
        if self.backscattering {
            if !(self.backscattering_alfa > 0.0) || !(self.backscattering_beta > 0.0) {
                return fail("backscattering coefficients must be positive");
            }
            if self.backscattering_beta >= 1.0 {
                return fail("charge attenuation must shrink charge, got beta >= 1");
            }
        }
        if self.solver_max_iterations == 0 || !(self.solver_tolerance > 0.0) {
            return fail("solver iteration cap and tolerance must be positive");
        }
        if self.trajectory_interval == 0 {
            return fail("trajectory_interval must be nonzero");
        }
        Ok(())
    }
}
