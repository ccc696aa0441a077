//! Leapfrog pusher.
//!
//! Stateless: reads the force sample and kinematic state from the store,
//! writes the advanced state back through one `update` call so a concurrent
//! reader never observes a half-pushed particle. `h` is the step scaled by
//! the speed of light, so `h * beta` is a length.

use crate::constants::{beta, ALFA};
use crate::particle::Field;
use crate::storage::ParticleStore;

pub struct Leapfrog;

impl Leapfrog {
    /// Half-step momentum kick for a newly injected particle, offsetting
    /// the leapfrog's staggered velocity. Position is untouched.
    pub fn prepare(&self, store: &mut ParticleStore, handle: usize, h: f64) {
        let kick = 0.5 * h * ALFA;
        let px = store.get(Field::Px, handle) + kick * store.get(Field::Fx, handle);
        let py = store.get(Field::Py, handle) + kick * store.get(Field::Fy, handle);
        store.set(Field::Px, handle, px);
        store.set(Field::Py, handle, py);
    }

    /// One full leapfrog step: momentum from the field sample, then
    /// position from the new momentum.
    pub fn step(&self, store: &mut ParticleStore, handle: usize, h: f64) {
        let p = store.at(handle);
        let px = p.px + h * ALFA * p.fx;
        let py = p.py + h * ALFA * p.fy;
        let x = p.x + h * beta(px);
        let y = p.y + h * beta(py);
        store.update(handle, x, y, px, py);
    }
}
