use std::sync::atomic::{AtomicBool, Ordering};

use super::*;
use crate::constants::ALFA;

/// Full-size diode from the defaults: 101x101 nodes over 0.1 x 0.1 m,
/// grounded cathode left, 100 kV anode right, vertical emitter at x = 0.
fn diode_project() -> PicProject {
    PicProject::default()
}

/// Small, fast diode for orchestration-level checks.
fn small_project() -> PicProject {
    PicProject {
        particles_count: 10,
        grid_nx: 21,
        grid_ny: 21,
        length: 0.01,
        height: 0.01,
        emitter_bottom: 0.004,
        emitter_top: 0.006,
        ..Default::default()
    }
}

#[test]
fn diode_step_drains_the_store_and_reports_a_finite_metric() {
    let mut cycle = PicCycle::new(diode_project()).unwrap();
    let metric = cycle.step().unwrap();
    assert!(metric.is_finite() && metric >= 0.0);

    let monitor = cycle.monitor();
    assert_eq!(monitor.particles_count, 0, "every particle is absorbed within the cycle");
    assert!(
        monitor.density.data.iter().any(|&d| d < 0.0),
        "the electron beam must leave negative charge density behind"
    );
    assert!(!monitor.trajectories.is_empty(), "cycle 0 is a sampling cycle");
    assert!(monitor.timing.total_cycles >= monitor.timing.last_cycle);
    assert!(monitor.timing.total_poisson >= monitor.timing.last_poisson);
}

#[test]
fn emitted_particles_carry_negative_charge_through_the_flight() {
    let cycle = PicCycle::new(diode_project()).unwrap();
    assert!(cycle.emitter.particle_charge() < 0.0);
    let batch = cycle.emitter.inject();
    assert_eq!(batch.len(), 100);
    assert!(batch.iter().all(|p| p.q < 0.0));
    assert!(batch.iter().all(|p| p.x == 0.0 && (0.04..=0.06).contains(&p.y)));
}

#[test]
fn field_near_the_emitter_pushes_the_beam_toward_the_anode() {
    let mut cycle = PicCycle::new(diode_project()).unwrap();
    cycle.step().unwrap();
    let monitor = cycle.monitor();

    // rows covered by the emitter segment, one node column into the domain
    let mut forward = 0;
    let mut total = 0;
    for j in 40..=60 {
        total += 1;
        if ALFA * monitor.ex.at(1, j) > 0.0 {
            forward += 1;
        }
    }
    assert!(
        forward * 5 >= total * 4,
        "only {}/{} emitter-adjacent nodes accelerate the beam toward +x",
        forward,
        total
    );
}

#[test]
fn space_charge_depresses_the_potential_on_later_cycles() {
    let mut cycle = PicCycle::new(diode_project()).unwrap();
    cycle.step().unwrap();
    let metric = cycle.step().unwrap();
    assert!(metric > 0.0, "the density field must still be moving on cycle two");

    let monitor = cycle.monitor();
    let vacuum = monitor.grid_x[50] / 0.1 * 100_000.0;
    let got = monitor.potential.at(50, 50);
    assert!(
        got < vacuum - 100.0,
        "beam space charge should depress the mid-gap potential: {} vs vacuum {}",
        got,
        vacuum
    );
}

#[test]
fn backscattering_reflects_before_removal() {
    let project = PicProject { backscattering: true, ..small_project() };
    let mut cycle = PicCycle::new(project).unwrap();
    cycle.step().unwrap();

    let monitor = cycle.monitor();
    assert!(
        monitor.reflections >= monitor_particles(&cycle),
        "every particle reaching the anode must bounce at least once, saw {} reflections",
        monitor.reflections
    );
    assert_eq!(monitor.particles_count, 0, "attenuation must eventually remove every particle");
}

fn monitor_particles(cycle: &PicCycle) -> usize {
    cycle.project().particles_count
}

#[test]
fn trajectories_are_recorded_on_sampling_cycles_only() {
    let project = PicProject { trajectory_interval: 2, ..small_project() };
    let mut cycle = PicCycle::new(project).unwrap();

    cycle.step().unwrap();
    let sampled = cycle.monitor().trajectories.len();
    assert!(sampled > 0, "cycle 0 samples trajectories");

    cycle.step().unwrap();
    // cycle 1 is off-interval: the last sampled set is kept as-is
    assert_eq!(cycle.monitor().trajectories.len(), sampled);

    cycle.step().unwrap();
    assert!(!cycle.monitor().trajectories.is_empty(), "cycle 2 samples again");
}

#[test]
fn run_checks_cancellation_between_cycles() {
    let mut cycle = PicCycle::new(small_project()).unwrap();
    let cancel = AtomicBool::new(true);
    cycle.run(10, &cancel).unwrap();
    assert_eq!(cycle.cycles(), 0);

    cancel.store(false, Ordering::Relaxed);
    cycle.run(2, &cancel).unwrap();
    assert_eq!(cycle.cycles(), 2);
}

#[test]
fn invalid_projects_fail_at_setup() {
    let project = PicProject { relaxation: 0.0, ..Default::default() };
    assert!(PicCycle::new(project).is_err());

    let project = PicProject { grid_nx: 2, ..Default::default() };
    assert!(PicCycle::new(project).is_err());
}

#[test]
fn parallel_and_serial_cycles_agree() {
    let serial = {
        let mut cycle = PicCycle::new(small_project()).unwrap();
        cycle.step().unwrap();
        cycle.monitor()
    };
    let parallel = {
        let project = PicProject { parallel: true, ..small_project() };
        let mut cycle = PicCycle::new(project).unwrap();
        cycle.step().unwrap();
        cycle.monitor()
    };
    for (a, b) in serial.density.data.iter().zip(&parallel.density.data) {
        assert!((a - b).abs() <= 1e-12 * a.abs().max(1.0), "{} vs {}", a, b);
    }
}
