pub mod config;
pub mod constants;
pub mod cycle;
pub mod deposition;
pub mod emitter;
pub mod error;
pub mod gradient;
pub mod grid;
pub mod mesh;
pub mod monitor;
pub mod mover;
pub mod particle;
pub mod poisson;
pub mod profiler;
pub mod storage;

#[cfg(feature = "profiling")]
use once_cell::sync::Lazy;
#[cfg(feature = "profiling")]
use parking_lot::Mutex;

#[cfg(feature = "profiling")]
pub static PROFILER: Lazy<Mutex<profiler::Profiler>> =
    Lazy::new(|| Mutex::new(profiler::Profiler::new()));
