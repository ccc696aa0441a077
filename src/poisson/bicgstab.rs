//! ILU(0)-preconditioned BiCGSTAB.
//!
//! The iteration stops when the relative residual drops under the
//! tolerance or the iteration cap is reached; only numerical breakdown
//! (a vanishing inner product the recurrence cannot continue through) is
//! reported as an error, so the caller can retry from a fresh state.

use nalgebra::DVector;

use super::csr::CsrMatrix;

/// A vanishing pivot or inner product interrupted the recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakdown;

const BREAKDOWN_EPS: f64 = 1e-300;

/// Incomplete LU factorization with zero fill-in, on the matrix sparsity
/// pattern. L has a unit diagonal and shares the strictly-lower entries;
/// U holds the diagonal and strictly-upper entries.
pub struct Ilu0 {
    row_ptr: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f64>,
    diag_ptr: Vec<usize>,
}

impl Ilu0 {
    pub fn factor(a: &CsrMatrix) -> Result<Self, Breakdown> {
        let n = a.nrows;
        let row_ptr = a.row_ptr.clone();
        let col_indices = a.col_indices.clone();
        let mut values = a.values.clone();

        let mut diag_ptr = vec![0usize; n];
        for i in 0..n {
            let range = a.row_range(i);
            match col_indices[range.clone()].binary_search(&i) {
                Ok(offset) => diag_ptr[i] = range.start + offset,
                Err(_) => return Err(Breakdown),
            }
        }

        for i in 0..n {
            let row_start = row_ptr[i];
            let row_end = row_ptr[i + 1];
            for kk in row_start..diag_ptr[i] {
                let k = col_indices[kk];
                let pivot = values[diag_ptr[k]];
                if pivot.abs() < BREAKDOWN_EPS {
                    return Err(Breakdown);
                }
                values[kk] /= pivot;
                let lik = values[kk];
                // eliminate within the existing pattern of row i only
                for jj in (diag_ptr[k] + 1)..row_ptr[k + 1] {
                    let j = col_indices[jj];
                    if let Ok(offset) = col_indices[(kk + 1)..row_end].binary_search(&j) {
                        values[kk + 1 + offset] -= lik * values[jj];
                    }
                }
            }
            if values[diag_ptr[i]].abs() < BREAKDOWN_EPS {
                return Err(Breakdown);
            }
        }

        Ok(Self { row_ptr, col_indices, values, diag_ptr })
    }

    /// z = (LU)^-1 r by forward then backward substitution.
    pub fn apply(&self, r: &DVector<f64>, z: &mut DVector<f64>) {
        let n = self.diag_ptr.len();
        for i in 0..n {
            let mut sum = r[i];
            for idx in self.row_ptr[i]..self.diag_ptr[i] {
                sum -= self.values[idx] * z[self.col_indices[idx]];
            }
            z[i] = sum;
        }
        for i in (0..n).rev() {
            let mut sum = z[i];
            for idx in (self.diag_ptr[i] + 1)..self.row_ptr[i + 1] {
                sum -= self.values[idx] * z[self.col_indices[idx]];
            }
            z[i] = sum / self.values[self.diag_ptr[i]];
        }
    }
}

/// Solve A x = b, refining `x` in place from its current value.
///
/// Returns the iteration count on a normal stop (tolerance hit or cap
/// reached), `Err(Breakdown)` when the recurrence degenerates.
pub fn solve(
    a: &CsrMatrix,
    b: &DVector<f64>,
    x: &mut DVector<f64>,
    precond: &Ilu0,
    max_iterations: usize,
    tolerance: f64,
) -> Result<usize, Breakdown> {
    let n = a.nrows;
    let b_norm = b.norm();
    if b_norm == 0.0 {
        x.fill(0.0);
        return Ok(0);
    }
    let threshold = tolerance * b_norm;

    let mut r = DVector::zeros(n);
    a.mul_to(x, &mut r);
    r.zip_apply(b, |ri, bi| *ri = bi - *ri);
    if r.norm() <= threshold {
        return Ok(0);
    }

    let r_hat = r.clone();
    let mut rho = 1.0;
    let mut alpha = 1.0;
    let mut omega = 1.0;
    let mut v: DVector<f64> = DVector::zeros(n);
    let mut p: DVector<f64> = DVector::zeros(n);
    let mut p_hat = DVector::zeros(n);
    let mut s_hat = DVector::zeros(n);
    let mut t = DVector::zeros(n);

    for iteration in 1..=max_iterations {
        let rho_next = r_hat.dot(&r);
        if rho_next.abs() < BREAKDOWN_EPS {
            return Err(Breakdown);
        }
        let beta = (rho_next / rho) * (alpha / omega);
        rho = rho_next;
        // p = r + beta * (p - omega * v)
        for i in 0..n {
            p[i] = r[i] + beta * (p[i] - omega * v[i]);
        }

        precond.apply(&p, &mut p_hat);
        a.mul_to(&p_hat, &mut v);
        let denom = r_hat.dot(&v);
        if denom.abs() < BREAKDOWN_EPS {
            return Err(Breakdown);
        }
        alpha = rho / denom;

        // s = r - alpha * v (reuse r)
        for i in 0..n {
            r[i] -= alpha * v[i];
        }
        if r.norm() <= threshold {
            x.axpy(alpha, &p_hat, 1.0);
            return Ok(iteration);
        }

        precond.apply(&r, &mut s_hat);
        a.mul_to(&s_hat, &mut t);
        let tt = t.dot(&t);
        if tt.abs() < BREAKDOWN_EPS {
            return Err(Breakdown);
        }
        omega = t.dot(&r) / tt;
        if omega.abs() < BREAKDOWN_EPS {
            return Err(Breakdown);
        }

        x.axpy(alpha, &p_hat, 1.0);
        x.axpy(omega, &s_hat, 1.0);
        // r = s - omega * t
        for i in 0..n {
            r[i] -= omega * t[i];
        }
        if r.norm() <= threshold {
            return Ok(iteration);
        }
    }
    Ok(max_iterations)
}
