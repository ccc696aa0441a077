//! Compressed sparse row storage for the finite-difference system.
//!
//! The assembly collects (column, value) pairs per row and flattens them
//! once; the matrix is built a single time per run and only multiplied
//! afterwards.

use nalgebra::DVector;

pub struct CsrMatrix {
    pub nrows: usize,
    pub row_ptr: Vec<usize>,
    pub col_indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl CsrMatrix {
    /// Flatten per-row (column, value) lists into CSR. Columns are sorted
    /// within each row; duplicate columns are summed.
    pub fn from_rows(mut rows: Vec<Vec<(usize, f64)>>) -> Self {
        let nrows = rows.len();
        let mut row_ptr = Vec::with_capacity(nrows + 1);
        let mut col_indices = Vec::new();
        let mut values = Vec::new();

        row_ptr.push(0);
        for row in &mut rows {
            row.sort_by_key(|&(col, _)| col);
            let mut last: Option<usize> = None;
            for &(col, val) in row.iter() {
                match (last, values.last_mut()) {
                    (Some(prev), Some(tail)) if prev == col => *tail += val,
                    _ => {
                        col_indices.push(col);
                        values.push(val);
                        last = Some(col);
                    }
                }
            }
            row_ptr.push(col_indices.len());
        }

        Self { nrows, row_ptr, col_indices, values }
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// The half-open index range of a row's entries.
    pub fn row_range(&self, row: usize) -> std::ops::Range<usize> {
        self.row_ptr[row]..self.row_ptr[row + 1]
    }

    /// y = A * x.
    pub fn mul_to(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        for i in 0..self.nrows {
            let mut sum = 0.0;
            for idx in self.row_range(i) {
                sum += self.values[idx] * x[self.col_indices[idx]];
            }
            y[i] = sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matvec_matches_dense() {
        // [2 1 0; 0 3 0; 1 0 4]
        let a = CsrMatrix::from_rows(vec![
            vec![(1, 1.0), (0, 2.0)],
            vec![(1, 3.0)],
            vec![(0, 1.0), (2, 4.0)],
        ]);
        assert_eq!(a.nnz(), 5);
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let mut y = DVector::zeros(3);
        a.mul_to(&x, &mut y);
        assert_eq!(y.as_slice(), &[4.0, 6.0, 13.0]);
    }

    #[test]
    fn duplicate_columns_are_summed() {
        let a = CsrMatrix::from_rows(vec![vec![(0, 1.0), (0, 2.0)]]);
        assert_eq!(a.nnz(), 1);
        assert_eq!(a.values[0], 3.0);
    }
}
