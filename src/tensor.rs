//! Matrix Operations for the Recurrent Network
//!
//! This module provides the small dense-matrix library the network is built
//! on. A vanilla RNN only ever needs matrix-vector products, never full
//! matrix-matrix products, so the API is shaped around vectors:
//!
//! - **Data**: Flat `Vec<f64>` storing all elements in row-major order
//! - **Shape**: `rows × cols`, fixed at construction
//! - **Vectors**: Plain `&[f64]` / `Vec<f64>`
//!
//! ## Operations Used by the Network
//!
//! ```text
//! forward:   W · s            matvec
//!            U[:, x_t]        column
//! backward:  Vᵀ · δ, Wᵀ · δ   transpose_matvec
//!            dW += δ ⊗ s      add_outer
//!            dU[:, x_t] += δ  add_to_column
//! update:    W -= lr · dW     scaled_sub
//! ```
//!
//! ## Precision
//!
//! Everything is `f64`. The gradient checker divides loss differences of
//! order `1e-3 × gradient` by `2h`, and single precision cannot resolve those
//! differences for small gradients.
//!
//! ## Example
//!
//! ```rust
//! use cardsmith::Matrix;
//!
//! let m = Matrix::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
//! assert_eq!(m.matvec(&[1.0, 0.0, 1.0]), vec![4.0, 10.0]);
//! assert_eq!(m.column(1), vec![2.0, 5.0]);
//! ```

use rand::Rng;

/// A dense row-major matrix of `f64`
///
/// Element `(r, c)` lives at `data[r * cols + c]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    /// Flat storage of all elements, row-major
    pub data: Vec<f64>,
    /// Number of rows
    pub rows: usize,
    /// Number of columns
    pub cols: usize,
}

impl Matrix {
    /// Create a matrix from row-major data
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != rows * cols`
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "Data length ({}) doesn't match shape {}x{}",
            data.len(),
            rows,
            cols
        );
        Self { data, rows, cols }
    }

    /// Create a matrix filled with zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::new(vec![0.0; rows * cols], rows, cols)
    }

    /// Create a matrix of independent uniform draws in `[-bound, bound)`
    ///
    /// Elements are drawn in row-major order, so the same generator state
    /// always produces the same matrix.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is not a positive finite number
    pub fn random_uniform<R: Rng + ?Sized>(
        rows: usize,
        cols: usize,
        bound: f64,
        rng: &mut R,
    ) -> Self {
        assert!(
            bound.is_finite() && bound > 0.0,
            "Uniform bound must be positive and finite, got {}",
            bound
        );
        let data = (0..rows * cols).map(|_| rng.random_range(-bound..bound)).collect();
        Self::new(data, rows, cols)
    }

    /// Shape as `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Convert a flat row-major index into `(row, col)`
    pub fn position(&self, index: usize) -> (usize, usize) {
        (index / self.cols, index % self.cols)
    }

    /// Copy out column `col`
    ///
    /// For the input matrix U this is the hidden-layer contribution of a
    /// one-hot input token, which is why the forward pass never builds
    /// one-hot vectors.
    pub fn column(&self, col: usize) -> Vec<f64> {
        assert!(col < self.cols, "Column {} out of range for {} columns", col, self.cols);
        (0..self.rows).map(|r| self.data[r * self.cols + col]).collect()
    }

    /// Add `values` into column `col` in place
    pub fn add_to_column(&mut self, col: usize, values: &[f64]) {
        assert!(col < self.cols, "Column {} out of range for {} columns", col, self.cols);
        assert_eq!(values.len(), self.rows, "Column update length mismatch");
        for (r, &v) in values.iter().enumerate() {
            self.data[r * self.cols + col] += v;
        }
    }

    /// Matrix-vector product `self · x`
    ///
    /// # Panics
    ///
    /// Panics if `x.len() != cols`
    pub fn matvec(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(
            x.len(),
            self.cols,
            "Vector length {} incompatible with {}x{} matrix",
            x.len(),
            self.rows,
            self.cols
        );
        (0..self.rows)
            .map(|r| {
                let row = &self.data[r * self.cols..(r + 1) * self.cols];
                row.iter().zip(x).map(|(a, b)| a * b).sum()
            })
            .collect()
    }

    /// Transposed matrix-vector product `selfᵀ · x`
    ///
    /// Computed without materializing the transpose: each row of `self`
    /// is scaled by the matching entry of `x` and accumulated.
    ///
    /// # Panics
    ///
    /// Panics if `x.len() != rows`
    pub fn transpose_matvec(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(
            x.len(),
            self.rows,
            "Vector length {} incompatible with transposed {}x{} matrix",
            x.len(),
            self.rows,
            self.cols
        );
        let mut result = vec![0.0; self.cols];
        for (r, &x_r) in x.iter().enumerate() {
            let row = &self.data[r * self.cols..(r + 1) * self.cols];
            for (out, &a) in result.iter_mut().zip(row) {
                *out += a * x_r;
            }
        }
        result
    }

    /// Accumulate the outer product `a ⊗ b` into `self`
    ///
    /// `self[i, j] += a[i] * b[j]`
    pub fn add_outer(&mut self, a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), self.rows, "Outer product row length mismatch");
        assert_eq!(b.len(), self.cols, "Outer product column length mismatch");
        for (i, &a_i) in a.iter().enumerate() {
            let row = &mut self.data[i * self.cols..(i + 1) * self.cols];
            for (out, &b_j) in row.iter_mut().zip(b) {
                *out += a_i * b_j;
            }
        }
    }

    /// In-place `self -= scale * other`
    pub fn scaled_sub(&mut self, other: &Matrix, scale: f64) {
        assert_eq!(
            self.shape(),
            other.shape(),
            "Shape mismatch in scaled_sub: {:?} vs {:?}",
            self.shape(),
            other.shape()
        );
        for (x, &g) in self.data.iter_mut().zip(&other.data) {
            *x -= scale * g;
        }
    }

    /// Sum of squared elements
    pub fn sum_of_squares(&self) -> f64 {
        self.data.iter().map(|v| v * v).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample() -> Matrix {
        // [[1, 2, 3],
        //  [4, 5, 6]]
        Matrix::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3)
    }

    #[test]
    #[should_panic(expected = "doesn't match shape")]
    fn test_new_rejects_wrong_length() {
        Matrix::new(vec![1.0, 2.0, 3.0], 2, 2);
    }

    #[test]
    fn test_get_set_position() {
        let mut m = sample();
        assert_eq!(m.get(1, 2), 6.0);
        m.set(0, 1, -2.0);
        assert_eq!(m.data[1], -2.0);
        assert_eq!(m.position(4), (1, 1));
    }

    #[test]
    fn test_matvec() {
        let m = sample();
        assert_eq!(m.matvec(&[1.0, 1.0, 1.0]), vec![6.0, 15.0]);
    }

    #[test]
    fn test_transpose_matvec() {
        let m = sample();
        // [1,4; 2,5; 3,6] · [1, 2] = [9, 12, 15]
        assert_eq!(m.transpose_matvec(&[1.0, 2.0]), vec![9.0, 12.0, 15.0]);
    }

    #[test]
    fn test_add_outer_and_column_update() {
        let mut m = Matrix::zeros(2, 3);
        m.add_outer(&[1.0, 2.0], &[1.0, 0.0, -1.0]);
        assert_eq!(m.data, vec![1.0, 0.0, -1.0, 2.0, 0.0, -2.0]);

        m.add_to_column(1, &[3.0, 4.0]);
        assert_eq!(m.column(1), vec![3.0, 4.0]);
    }

    #[test]
    fn test_scaled_sub() {
        let mut m = sample();
        let g = Matrix::new(vec![1.0; 6], 2, 3);
        m.scaled_sub(&g, 0.5);
        assert_eq!(m.data, vec![0.5, 1.5, 2.5, 3.5, 4.5, 5.5]);
    }

    #[test]
    fn test_random_uniform_bounds_and_determinism() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = Matrix::random_uniform(4, 5, 0.25, &mut rng);
        assert!(a.data.iter().all(|&v| (-0.25..0.25).contains(&v)));

        let mut rng = StdRng::seed_from_u64(7);
        let b = Matrix::random_uniform(4, 5, 0.25, &mut rng);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_matvec() {
        let m = Matrix::zeros(0, 3);
        assert!(m.matvec(&[1.0, 2.0, 3.0]).is_empty());
        assert_eq!(m.transpose_matvec(&[]), vec![0.0, 0.0, 0.0]);
    }
}
