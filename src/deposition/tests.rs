use super::*;
use crate::particle::Particle;

fn unit_grid() -> Grid2D {
    Grid2D::new(5, 5, 0.0, 4.0, 0.0, 4.0).unwrap()
}

fn store_with(grid: &Grid2D, particles: &[Particle]) -> (ParticleStore, PrevPositions) {
    let mut store = ParticleStore::new(particles.len().max(1));
    let mut prev = PrevPositions::new(particles.len().max(1));
    for p in particles {
        let handle = store.add(*p).unwrap();
        store.set_cell(handle, grid.find_cell(p.x, p.y));
        prev.set(handle, p.x, p.y);
    }
    (store, prev)
}

fn total_density(mesh: &FieldMesh) -> f64 {
    mesh.density.iter().sum()
}

#[test]
fn corner_weights_sum_to_one() {
    let grid = unit_grid();
    fastrand::seed(42);
    for _ in 0..200 {
        let x = fastrand::f64() * 3.9;
        let y = fastrand::f64() * 3.9;
        let cell = grid.find_cell(x, y);
        let top = grid.upper_cell(cell);
        let sum = weight(&grid, x, y, top + 1)
            + weight(&grid, x, y, top)
            + weight(&grid, x, y, cell + 1)
            + weight(&grid, x, y, cell);
        assert!((sum - 1.0).abs() < 1e-12, "weights sum to {} at ({}, {})", sum, x, y);
    }
}

#[test]
fn static_deposit_conserves_charge() {
    let grid = unit_grid();
    let q = -2.5;
    let (store, prev) = store_with(&grid, &[Particle::new(1.25, 2.75, 0.0, 0.0, q)]);
    for kind in [SchemeKind::CloudInCell, SchemeKind::CurrentLinkage] {
        let mut mesh = FieldMesh::new(grid.count());
        Depositor::new(kind, false).deposit(&store, &grid, &mut mesh, &prev);
        assert!(
            (total_density(&mesh) - q / grid.cell_square()).abs() < 1e-12,
            "{:?} lost charge",
            kind
        );
    }
}

#[test]
fn same_cell_move_is_a_single_segment() {
    let grid = unit_grid();
    let segments = decompose(&grid, 0.25, 0.25, 0.75, 0.5);
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].cell, 0);
    assert!((segments[0].fraction - 1.0).abs() < 1e-12);
}

#[test]
fn horizontal_neighbor_splits_at_the_shared_line() {
    let grid = unit_grid();
    let segments = decompose(&grid, 0.5, 0.5, 1.5, 0.75);
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].cell, 0);
    assert_eq!(segments[1].cell, 1);
    assert!((segments[0].b.0 - 1.0).abs() < 1e-12, "split is on the x=1 line");
    assert!((segments[0].fraction + segments[1].fraction - 1.0).abs() < 1e-12);
}

#[test]
fn vertical_neighbor_splits_at_the_shared_line() {
    let grid = unit_grid();
    let segments = decompose(&grid, 0.5, 1.5, 0.25, 0.5);
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].cell, 5);
    assert_eq!(segments[1].cell, 0);
    assert!((segments[0].b.1 - 1.0).abs() < 1e-12, "split is on the y=1 line");
}

#[test]
fn long_crossing_fractions_sum_to_one() {
    let grid = unit_grid();
    let segments = decompose(&grid, 0.25, 0.25, 3.75, 2.75);
    assert!(segments.len() >= 4, "expected several sub-segments, got {}", segments.len());
    let sum: f64 = segments.iter().map(|s| s.fraction).sum();
    assert!((sum - 1.0).abs() < 1e-12);
    // consecutive pieces share endpoints
    for pair in segments.windows(2) {
        assert!((pair[0].b.0 - pair[1].a.0).abs() < 1e-12);
        assert!((pair[0].b.1 - pair[1].a.1).abs() < 1e-12);
    }
}

#[test]
fn current_is_conserved_over_any_crossing() {
    let grid = unit_grid();
    let q = -1.0;
    // no crossing, one vertical line, one horizontal line, many lines,
    // and a pure diagonal through the grid corner at (2, 2)
    let moves = [
        ((0.2, 0.2), (0.8, 0.7)),
        ((0.5, 0.5), (1.5, 0.75)),
        ((0.5, 0.5), (0.75, 1.5)),
        ((0.25, 0.25), (3.75, 2.75)),
        ((1.5, 1.5), (2.5, 2.5)),
    ];
    for (from, to) in moves {
        let mut store = ParticleStore::new(1);
        let mut prev = PrevPositions::new(1);
        let handle = store.add(Particle::new(to.0, to.1, 0.0, 0.0, q)).unwrap();
        store.set_cell(handle, grid.find_cell(to.0, to.1));
        prev.set(handle, from.0, from.1);

        let mut mesh = FieldMesh::new(grid.count());
        Depositor::new(SchemeKind::CurrentLinkage, false).deposit(&store, &grid, &mut mesh, &prev);
        let expected = q / grid.cell_square();
        assert!(
            (total_density(&mesh) - expected).abs() < 1e-12,
            "move {:?} -> {:?} deposited {} instead of {}",
            from,
            to,
            total_density(&mesh),
            expected
        );
    }
}

#[test]
fn diagonal_corner_crossing_visits_both_cells_or_steps_across() {
    let grid = unit_grid();
    // passes exactly through the node at (2, 2)
    let segments = decompose(&grid, 1.5, 1.5, 2.5, 2.5);
    let sum: f64 = segments.iter().map(|s| s.fraction).sum();
    assert!((sum - 1.0).abs() < 1e-12);
    assert_eq!(segments.first().unwrap().cell, grid.find_cell(1.5, 1.5));
    assert_eq!(segments.last().unwrap().cell, grid.find_cell(2.5, 2.5));
}

#[test]
fn uniform_field_interpolates_exactly() {
    let grid = unit_grid();
    let (mut store, _prev) = store_with(
        &grid,
        &[
            Particle::new(0.5, 0.5, 0.0, 0.0, -1.0),
            Particle::new(2.3, 1.7, 0.0, 0.0, -1.0),
            Particle::new(3.9, 3.1, 0.0, 0.0, -1.0),
        ],
    );
    let mut mesh = FieldMesh::new(grid.count());
    mesh.ex.fill(3.0);
    mesh.ey.fill(-2.0);

    let depositor = Depositor::new(SchemeKind::CurrentLinkage, false);
    store.reset_forces();
    depositor.interpolate_forces(&mut store, &grid, &mesh);
    for handle in store.live_handles().collect::<Vec<_>>() {
        assert!((store.get(Field::Fx, handle) - 3.0).abs() < 1e-12);
        assert!((store.get(Field::Fy, handle) + 2.0).abs() < 1e-12);
    }
}

#[test]
fn parallel_deposit_matches_serial() {
    let grid = unit_grid();
    fastrand::seed(7);
    let particles: Vec<Particle> = (0..64)
        .map(|_| {
            Particle::new(fastrand::f64() * 3.9, fastrand::f64() * 3.9, 0.0, 0.0, -1.0)
        })
        .collect();
    let (store, mut prev) = store_with(&grid, &particles);
    // give every particle a displacement crossing somewhere
    for handle in store.live_handles().collect::<Vec<_>>() {
        let (x, y) = prev.get(handle);
        prev.set(handle, (x - 0.8).max(0.0), (y - 0.6).max(0.0));
    }

    let mut serial = FieldMesh::new(grid.count());
    Depositor::new(SchemeKind::CurrentLinkage, false).deposit(&store, &grid, &mut serial, &prev);
    let mut parallel = FieldMesh::new(grid.count());
    Depositor::new(SchemeKind::CurrentLinkage, true).deposit(&store, &grid, &mut parallel, &prev);

    for (a, b) in serial.density.iter().zip(&parallel.density) {
        assert!((a - b).abs() < 1e-12);
    }
}
