//! Line emitter: the cathode's contribution of new macro-particles.
//!
//! Injection positions are linearly spaced along a segment; every particle
//! carries an equal share of the emission current integrated over one time
//! step. The engine only depends on the output contract (a batch of
//! particle states per cycle).

use crate::constants;
use crate::particle::Particle;

pub struct LineEmitter {
    from_x: f64,
    from_y: f64,
    dx: f64,
    dy: f64,
    count: usize,
    px: f64,
    py: f64,
    /// Charge per emitted particle per cycle.
    charge: f64,
}

impl LineEmitter {
    /// `current_density` is the emission current density (A/m^2, negative
    /// for electrons), `energy_x`/`energy_y` the initial kinetic energy in
    /// electronvolts along each axis, `step` the time step in seconds.
    pub fn new(
        (from_x, from_y): (f64, f64),
        (to_x, to_y): (f64, f64),
        count: usize,
        energy_x: f64,
        energy_y: f64,
        current_density: f64,
        step: f64,
    ) -> Self {
        let length = ((to_x - from_x).powi(2) + (to_y - from_y).powi(2)).sqrt();
        let n = count as f64;
        // a single-particle emitter sits at the segment start
        let spacing = if count > 1 { n - 1.0 } else { 1.0 };

        let gamma_x = constants::kinetic_energy_to_lorentz_factor(energy_x);
        let px = constants::momentum(constants::lorentz_factor_to_beta(gamma_x));
        let gamma_y = constants::kinetic_energy_to_lorentz_factor(energy_y);
        let py = constants::momentum(constants::lorentz_factor_to_beta(gamma_y));

        Self {
            from_x,
            from_y,
            dx: (to_x - from_x) / spacing,
            dy: (to_y - from_y) / spacing,
            count,
            px,
            py,
            charge: current_density * length * step / n,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Charge each emitted particle carries.
    pub fn particle_charge(&self) -> f64 {
        self.charge
    }

    /// One cycle's batch of fresh particle states.
    pub fn inject(&self) -> Vec<Particle> {
        (0..self.count)
            .map(|i| {
                let x = self.from_x + i as f64 * self.dx;
                let y = self.from_y + i as f64 * self.dy;
                Particle::new(x, y, self.px, self.py, self.charge)
            })
            .collect()
    }
}
