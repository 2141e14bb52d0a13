//! Small dense square matrices for multivariate Gaussian work.
//!
//! Owned, row-major storage; all factorizations allocate fresh buffers
//! and never alias, so clones are always independent.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from matrix construction and factorization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinalgError {
    #[error("data length {got} does not match a {dim}x{dim} matrix")]
    Shape { dim: usize, got: usize },
    #[error("dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },
    #[error("matrix is not positive definite")]
    NotPositiveDefinite,
    #[error("matrix is singular")]
    Singular,
}

/// Dense square matrix, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquareMatrix {
    dim: usize,
    data: Vec<f64>,
}

impl SquareMatrix {
    /// Build from row-major data; fails when the length is not dim^2.
    pub fn from_vec(dim: usize, data: Vec<f64>) -> Result<Self, LinalgError> {
        if data.len() != dim * dim {
            return Err(LinalgError::Shape {
                dim,
                got: data.len(),
            });
        }
        Ok(Self { dim, data })
    }

    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            data: vec![0.0; dim * dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.dim + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.dim + col] = value;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Lower Cholesky factor L with L * L^T = self; the upper triangle
    /// of the result is zero.
    pub fn cholesky(&self) -> Result<SquareMatrix, LinalgError> {
        let n = self.dim;
        let mut l = SquareMatrix::zeros(n);
        for i in 0..n {
            for j in 0..=i {
                let mut sum = self.get(i, j);
                for k in 0..j {
                    sum -= l.get(i, k) * l.get(j, k);
                }
                if i == j {
                    if sum <= 0.0 || sum.is_nan() {
                        return Err(LinalgError::NotPositiveDefinite);
                    }
                    l.set(i, j, sum.sqrt());
                } else {
                    l.set(i, j, sum / l.get(j, j));
                }
            }
        }
        Ok(l)
    }

    /// Log of the absolute determinant via LU decomposition with
    /// partial pivoting.
    pub fn lu_log_abs_det(&self) -> Result<f64, LinalgError> {
        let n = self.dim;
        let mut m = self.clone();
        let mut log_det = 0.0;

        for col in 0..n {
            // pivot search
            let mut pivot_row = col;
            let mut pivot_abs = m.get(col, col).abs();
            for row in (col + 1)..n {
                let candidate = m.get(row, col).abs();
                if candidate > pivot_abs {
                    pivot_abs = candidate;
                    pivot_row = row;
                }
            }
            if pivot_abs == 0.0 || pivot_abs.is_nan() {
                return Err(LinalgError::Singular);
            }
            if pivot_row != col {
                for k in 0..n {
                    let tmp = m.get(col, k);
                    m.set(col, k, m.get(pivot_row, k));
                    m.set(pivot_row, k, tmp);
                }
            }

            let pivot = m.get(col, col);
            log_det += pivot.abs().ln();
            for row in (col + 1)..n {
                let factor = m.get(row, col) / pivot;
                for k in (col + 1)..n {
                    let updated = m.get(row, k) - factor * m.get(col, k);
                    m.set(row, k, updated);
                }
            }
        }

        Ok(log_det)
    }

    /// Inverse of the original matrix A, where self is the lower
    /// Cholesky factor of A.
    pub fn invert_from_cholesky(&self) -> SquareMatrix {
        let n = self.dim;

        // Invert the lower factor by forward substitution.
        let mut l_inv = SquareMatrix::zeros(n);
        for i in 0..n {
            l_inv.set(i, i, 1.0 / self.get(i, i));
            for j in 0..i {
                let mut sum = 0.0;
                for k in j..i {
                    sum += self.get(i, k) * l_inv.get(k, j);
                }
                l_inv.set(i, j, -sum / self.get(i, i));
            }
        }

        // A^{-1} = L^{-T} * L^{-1}
        let mut inv = SquareMatrix::zeros(n);
        for i in 0..n {
            for j in 0..n {
                let mut sum = 0.0;
                for k in i.max(j)..n {
                    sum += l_inv.get(k, i) * l_inv.get(k, j);
                }
                inv.set(i, j, sum);
            }
        }
        inv
    }

    /// Matrix-vector product.
    pub fn matvec(&self, v: &[f64]) -> Result<Vec<f64>, LinalgError> {
        if v.len() != self.dim {
            return Err(LinalgError::Dimension {
                expected: self.dim,
                got: v.len(),
            });
        }
        let mut out = vec![0.0; self.dim];
        for (i, out_i) in out.iter_mut().enumerate() {
            let mut sum = 0.0;
            for (j, v_j) in v.iter().enumerate() {
                sum += self.get(i, j) * v_j;
            }
            *out_i = sum;
        }
        Ok(out)
    }
}
