//! Structure-of-arrays particle storage with stable integer handles.
//!
//! One flat `f64` buffer holds seven numbers per slot (x y px py q fx fy)
//! next to a parallel cell-index array. Freed slots go on a LIFO free list
//! and are handed out again by the next `add`, so a handle is only valid
//! until its owner removes it. There is no resizing in the hot path:
//! outgrowing the configured capacity is a setup error.

use crate::error::{PicError, Result};
use crate::particle::{Field, Particle, FIELD_COUNT};

/// Cell tag for a slot that has not been assigned one yet.
pub const UNTAGGED: usize = usize::MAX;

pub struct ParticleStore {
    data: Vec<f64>,
    cell: Vec<usize>,
    /// Slot is on the free list (still counted in `high_water`).
    freed: Vec<bool>,
    free: Vec<usize>,
    /// Slots ever handed out; live slots all lie below this mark.
    high_water: usize,
    capacity: usize,
}

impl ParticleStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; FIELD_COUNT * capacity],
            cell: vec![UNTAGGED; capacity],
            freed: vec![false; capacity],
            free: Vec::with_capacity(capacity),
            high_water: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live particles: slots handed out minus slots on the free list.
    pub fn count(&self) -> usize {
        self.high_water - self.free.len()
    }

    /// Store a particle, reusing the most recently freed slot if any.
    pub fn add(&mut self, particle: Particle) -> Result<usize> {
        let handle = if let Some(slot) = self.free.pop() {
            self.freed[slot] = false;
            slot
        } else {
            if self.high_water == self.capacity {
                return Err(PicError::CapacityExceeded(self.capacity));
            }
            self.high_water += 1;
            self.high_water - 1
        };
        self.write(handle, particle);
        self.cell[handle] = UNTAGGED;
        Ok(handle)
    }

    /// Mark a slot for reuse. Charge is zeroed so a stale read of the
    /// handle reports a chargeless particle until the slot is reassigned.
    pub fn remove_at(&mut self, handle: usize) {
        debug_assert!(handle < self.high_water && !self.freed[handle]);
        self.data[FIELD_COUNT * handle + Field::Q as usize] = 0.0;
        self.freed[handle] = true;
        self.free.push(handle);
    }

    pub fn get(&self, field: Field, handle: usize) -> f64 {
        self.data[FIELD_COUNT * handle + field as usize]
    }

    pub fn set(&mut self, field: Field, handle: usize, value: f64) {
        self.data[FIELD_COUNT * handle + field as usize] = value;
    }

    pub fn multiply(&mut self, field: Field, handle: usize, scalar: f64) {
        self.data[FIELD_COUNT * handle + field as usize] *= scalar;
    }

    /// Zero the accumulated field samples on every slot.
    pub fn reset_forces(&mut self) {
        for slot in 0..self.capacity {
            self.data[FIELD_COUNT * slot + Field::Fx as usize] = 0.0;
            self.data[FIELD_COUNT * slot + Field::Fy as usize] = 0.0;
        }
    }

    pub fn add_force(&mut self, handle: usize, fx: f64, fy: f64) {
        self.data[FIELD_COUNT * handle + Field::Fx as usize] += fx;
        self.data[FIELD_COUNT * handle + Field::Fy as usize] += fy;
    }

    /// Write position and momentum in one call so a reader between pusher
    /// sub-updates never sees a half-advanced particle.
    pub fn update(&mut self, handle: usize, x: f64, y: f64, px: f64, py: f64) {
        let base = FIELD_COUNT * handle;
        self.data[base + Field::X as usize] = x;
        self.data[base + Field::Y as usize] = y;
        self.data[base + Field::Px as usize] = px;
        self.data[base + Field::Py as usize] = py;
    }

    pub fn set_cell(&mut self, handle: usize, cell: usize) {
        self.cell[handle] = cell;
    }

    pub fn cell(&self, handle: usize) -> usize {
        self.cell[handle]
    }

    /// Read a whole slot back as a value.
    pub fn at(&self, handle: usize) -> Particle {
        let base = FIELD_COUNT * handle;
        Particle {
            x: self.data[base],
            y: self.data[base + 1],
            px: self.data[base + 2],
            py: self.data[base + 3],
            q: self.data[base + 4],
            fx: self.data[base + 5],
            fy: self.data[base + 6],
        }
    }

    fn write(&mut self, handle: usize, particle: Particle) {
        let base = FIELD_COUNT * handle;
        self.data[base] = particle.x;
        self.data[base + 1] = particle.y;
        self.data[base + 2] = particle.px;
        self.data[base + 3] = particle.py;
        self.data[base + 4] = particle.q;
        self.data[base + 5] = particle.fx;
        self.data[base + 6] = particle.fy;
    }

    /// Lazy, restartable walk over the live slots in index order. Freed
    /// slots are skipped at the moment they are visited, so indices already
    /// yielded stay valid even if later slots are removed by the consumer.
    pub fn live_handles(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.high_water).filter(move |&slot| !self.freed[slot])
    }
}
