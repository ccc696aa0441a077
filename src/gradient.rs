//! Electric field from the potential: E = -grad(phi).
//!
//! Second-order central differences in the interior, second-order
//! three-point one-sided differences on the first and last node of each
//! axis. All arrays use the mesh node ordering (x fastest).

/// Differentiate `potential` into `ex`/`ey`. Needs at least three nodes
/// per axis for the one-sided stencils.
pub fn evaluate(potential: &[f64], ex: &mut [f64], ey: &mut [f64], nx: usize, ny: usize, hx: f64, hy: f64) {
    debug_assert!(nx >= 3 && ny >= 3);
    debug_assert_eq!(potential.len(), nx * ny);

    for j in 0..ny {
        for i in 0..nx {
            let at = j * nx + i;

            ex[at] = if i == 0 {
                -(-3.0 * potential[at] + 4.0 * potential[at + 1] - potential[at + 2]) / (2.0 * hx)
            } else if i == nx - 1 {
                -(3.0 * potential[at] - 4.0 * potential[at - 1] + potential[at - 2]) / (2.0 * hx)
            } else {
                -(potential[at + 1] - potential[at - 1]) / (2.0 * hx)
            };

            ey[at] = if j == 0 {
                -(-3.0 * potential[at] + 4.0 * potential[at + nx] - potential[at + 2 * nx]) / (2.0 * hy)
            } else if j == ny - 1 {
                -(3.0 * potential[at] - 4.0 * potential[at - nx] + potential[at - 2 * nx]) / (2.0 * hy)
            } else {
                -(potential[at + nx] - potential[at - nx]) / (2.0 * hy)
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_potential_gives_uniform_field() {
        let (nx, ny) = (7, 5);
        let (hx, hy) = (0.5, 0.25);
        // phi = 3x - 2y  ->  Ex = -3, Ey = 2 everywhere
        let potential: Vec<f64> = (0..nx * ny)
            .map(|at| {
                let (i, j) = (at % nx, at / nx);
                3.0 * (i as f64 * hx) - 2.0 * (j as f64 * hy)
            })
            .collect();
        let mut ex = vec![0.0; nx * ny];
        let mut ey = vec![0.0; nx * ny];
        evaluate(&potential, &mut ex, &mut ey, nx, ny, hx, hy);

        for at in 0..nx * ny {
            assert!((ex[at] + 3.0).abs() < 1e-12, "Ex at {} is {}", at, ex[at]);
            assert!((ey[at] - 2.0).abs() < 1e-12, "Ey at {} is {}", at, ey[at]);
        }
    }

    #[test]
    fn quadratic_potential_is_differentiated_exactly() {
        // second-order stencils are exact on quadratics, boundaries included
        let (nx, ny) = (6, 6);
        let h = 0.1;
        let potential: Vec<f64> = (0..nx * ny)
            .map(|at| {
                let x = (at % nx) as f64 * h;
                x * x
            })
            .collect();
        let mut ex = vec![0.0; nx * ny];
        let mut ey = vec![0.0; nx * ny];
        evaluate(&potential, &mut ex, &mut ey, nx, ny, h, h);

        for at in 0..nx * ny {
            let x = (at % nx) as f64 * h;
            assert!((ex[at] + 2.0 * x).abs() < 1e-12);
            assert!(ey[at].abs() < 1e-12);
        }
    }
}
