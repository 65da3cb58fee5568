//! Dense row-major matrices over `f64`.
//!
//! The chains this crate targets are small enough that a dense representation
//! is both the simplest and the fastest option. Row and column `i` always
//! correspond to the state with index `i`.

use std::fmt;

use log::debug;

use crate::chain::Dtmc;
use crate::error::{Error, Result};

/// Pivots with an absolute value below this are treated as zero by [`Matrix::solve`].
pub const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, 1.0);
        }
        m
    }

    /// Builds a matrix from nested rows. All rows must have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(Error::InvalidArgument("rows have different lengths".to_string()));
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.iter().flatten().copied().collect(),
        })
    }

    /// Materializes the transition matrix of a chain.
    ///
    /// Cell `[i][j]` holds the probability of the transition from state `i` to
    /// state `j`, or 0 if there is none. The chain stores transitions ordered by
    /// `(source, target)`, so the result is bit-identical across builds.
    pub fn build(chain: &Dtmc) -> Self {
        let n = chain.num_states();
        debug!("build transition matrix: {} states, {} transitions", n, chain.num_transitions());
        let mut m = Self::zeros(n, n);
        for t in chain.transitions() {
            m.set(t.source.index(), t.target.index(), t.probability);
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.cols + j] = value;
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Row vector times matrix: `v · M`.
    pub fn vec_mul(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(v.len(), self.rows, "vector length must match the number of rows");
        let mut out = vec![0.0; self.cols];
        for (i, &vi) in v.iter().enumerate() {
            if vi == 0.0 {
                continue;
            }
            for (o, &mij) in out.iter_mut().zip(self.row(i)) {
                *o += vi * mij;
            }
        }
        out
    }

    /// Matrix times column vector: `M · v`.
    pub fn mul_vec(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(v.len(), self.cols, "vector length must match the number of columns");
        (0..self.rows)
            .map(|i| self.row(i).iter().zip(v).map(|(a, b)| a * b).sum())
            .collect()
    }

    /// Matrix product `self · other`.
    pub fn mul(&self, other: &Matrix) -> Matrix {
        assert_eq!(self.cols, other.rows, "inner dimensions must agree");
        let mut out = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.get(i, k);
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    out.data[i * other.cols + j] += a * other.get(k, j);
                }
            }
        }
        out
    }

    /// `M^k` by exponentiation by squaring. `M^0` is the identity.
    pub fn pow(&self, mut k: usize) -> Matrix {
        assert_eq!(self.rows, self.cols, "only square matrices can be raised to a power");
        let mut result = Matrix::identity(self.rows);
        let mut base = self.clone();
        while k > 0 {
            if k & 1 == 1 {
                result = result.mul(&base);
            }
            k >>= 1;
            if k > 0 {
                base = base.mul(&base);
            }
        }
        result
    }

    /// Restriction to the given rows and columns, in the given order.
    pub fn submatrix(&self, rows: &[usize], cols: &[usize]) -> Matrix {
        let mut out = Matrix::zeros(rows.len(), cols.len());
        for (oi, &i) in rows.iter().enumerate() {
            for (oj, &j) in cols.iter().enumerate() {
                out.set(oi, oj, self.get(i, j));
            }
        }
        out
    }

    /// Solves `self · x = b` by Gaussian elimination with partial pivoting.
    ///
    /// Fails with [`Error::Singular`] when a pivot falls below [`PIVOT_EPSILON`].
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>> {
        assert_eq!(self.rows, self.cols, "only square systems can be solved");
        assert_eq!(b.len(), self.rows, "right-hand side must match the system size");
        let n = self.rows;
        let mut a = self.data.clone();
        let mut x = b.to_vec();

        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&p, &q| a[p * n + col].abs().total_cmp(&a[q * n + col].abs()))
                .unwrap_or(col);
            if a[pivot * n + col].abs() < PIVOT_EPSILON {
                return Err(Error::Singular);
            }
            if pivot != col {
                for j in 0..n {
                    a.swap(col * n + j, pivot * n + j);
                }
                x.swap(col, pivot);
            }
            let diag = a[col * n + col];
            for row in col + 1..n {
                let factor = a[row * n + col] / diag;
                if factor == 0.0 {
                    continue;
                }
                for j in col..n {
                    a[row * n + j] -= factor * a[col * n + j];
                }
                x[row] -= factor * x[col];
            }
        }

        // Back substitution
        for row in (0..n).rev() {
            let tail: f64 = (row + 1..n).map(|j| a[row * n + j] * x[j]).sum();
            x[row] = (x[row] - tail) / a[row * n + row];
        }
        Ok(x)
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries((0..self.rows).map(|i| self.row(i))).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-9, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_build_three_states() {
        let mut chain = Dtmc::new();
        let s1 = chain.add_state(None, &[]);
        let s2 = chain.add_state(None, &[]);
        let s3 = chain.add_state(None, &[]);
        chain.add_transition(s1, s2, 0.5).unwrap();
        chain.add_transition(s1, s3, 0.5).unwrap();
        chain.add_transition(s2, s2, 1.0).unwrap();
        chain.add_transition(s3, s3, 1.0).unwrap();

        let m = Matrix::build(&chain);
        let expected = Matrix::from_rows(&[
            vec![0.0, 0.5, 0.5],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ])
        .unwrap();
        assert_eq!(m, expected);
    }

    #[test]
    fn test_build_is_deterministic() {
        let mut chain = Dtmc::new();
        let s: Vec<_> = (0..5).map(|_| chain.add_state(None, &[])).collect();
        for i in (0..5).rev() {
            chain.add_transition(s[i], s[(i + 1) % 5], 0.25).unwrap();
            chain.add_transition(s[i], s[i], 0.75).unwrap();
        }
        let a = Matrix::build(&chain);
        let b = Matrix::build(&chain);
        assert_eq!(a.data.iter().map(|x| x.to_bits()).collect::<Vec<_>>(), b.data.iter().map(|x| x.to_bits()).collect::<Vec<_>>());
    }

    #[test]
    fn test_vector_products() {
        let m = Matrix::from_rows(&[vec![0.5, 0.5], vec![0.0, 1.0]]).unwrap();
        assert_close(&m.vec_mul(&[1.0, 0.0]), &[0.5, 0.5]);
        assert_close(&m.mul_vec(&[1.0, 0.0]), &[0.5, 0.0]);
    }

    #[test]
    fn test_pow() {
        let m = Matrix::from_rows(&[vec![0.5, 0.5], vec![0.0, 1.0]]).unwrap();
        assert_eq!(m.pow(0), Matrix::identity(2));
        assert_eq!(m.pow(1), m);
        let m3 = m.pow(3);
        assert_close(m3.row(0), &[0.125, 0.875]);
        assert_close(m3.row(1), &[0.0, 1.0]);
    }

    #[test]
    fn test_submatrix() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]]).unwrap();
        let s = m.submatrix(&[2, 0], &[1, 2]);
        assert_close(s.row(0), &[8.0, 9.0]);
        assert_close(s.row(1), &[2.0, 3.0]);
    }

    #[test]
    fn test_solve() {
        // 2x + y = 3, x + 3y = 5  =>  x = 0.8, y = 1.4
        let m = Matrix::from_rows(&[vec![2.0, 1.0], vec![1.0, 3.0]]).unwrap();
        assert_close(&m.solve(&[3.0, 5.0]).unwrap(), &[0.8, 1.4]);

        // Needs a row swap
        let m = Matrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        assert_close(&m.solve(&[2.0, 3.0]).unwrap(), &[3.0, 2.0]);
    }

    #[test]
    fn test_solve_singular() {
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![2.0, 4.0]]).unwrap();
        assert_eq!(m.solve(&[1.0, 2.0]), Err(Error::Singular));
    }

    #[test]
    fn test_from_rows_ragged() {
        assert!(matches!(
            Matrix::from_rows(&[vec![1.0], vec![1.0, 2.0]]),
            Err(Error::InvalidArgument(_))
        ));
    }
}
