//! galpha-linalg
//!
//! Dense linear-algebra kernels shared by the generalized-alpha workspace,
//! plus the `CoreError` taxonomy every upstream crate re-exports. Containers
//! are `nalgebra`'s `DMatrix`/`DVector` (dynamic extent) and `Matrix3`/
//! `Vector3` (fixed 3x3 blocks) — this crate supplies the *operations*
//! spec'd for this solver, not a replacement array library.
//!
//! Every kernel here allocates a fresh result; none mutate their operands,
//! with the one deliberate exception `solve_linear_system`, which overwrites
//! its right-hand side in place the way a LAPACK-style `gesv` call would.
//!
//! Dimension mismatches are programming errors and panic immediately; only
//! solver-time failures (a singular system) are surfaced through
//! [`CoreError`].

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use thiserror::Error;

/// The error taxonomy shared across every layer of this workspace.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// Construction-time: a parameter is out of its valid range, or a
    /// matrix/vector does not have the required shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A rotation-manifold operation was requested on data that violates an
    /// algebraic precondition (e.g. rotating a vector with a non-unit
    /// quaternion, or normalizing a zero-length quaternion).
    #[error("domain error: {0}")]
    DomainError(String),

    /// A quaternion component was addressed outside the valid `0..=3` range.
    #[error("index {index} out of range for quaternion component access (0..=3)")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
    },

    /// The dense linear solver encountered a singular (or near-singular)
    /// system and could not produce a solution.
    #[error("numeric failure: {0}")]
    NumericFailure(String),
}

/// `n x n` identity matrix.
#[must_use]
pub fn identity_matrix(n: usize) -> DMatrix<f64> {
    DMatrix::identity(n, n)
}

/// The skew-symmetric cross-product matrix of `v`, such that
/// `cross_product_matrix(v) * w == v.cross(&w)` for any `w`.
#[must_use]
pub fn cross_product_matrix(v: Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}

/// Transpose of a dense matrix.
#[must_use]
pub fn transpose(m: &DMatrix<f64>) -> DMatrix<f64> {
    m.transpose()
}

/// Matrix-vector product `m * v`. Panics on shape mismatch (programming
/// error, per the L1 contract).
#[must_use]
pub fn mat_vec(m: &DMatrix<f64>, v: &DVector<f64>) -> DVector<f64> {
    assert_eq!(
        m.ncols(),
        v.len(),
        "mat_vec: matrix has {} columns but vector has length {}",
        m.ncols(),
        v.len()
    );
    m * v
}

/// Matrix-matrix product `a * b`. Panics on shape mismatch.
#[must_use]
pub fn mat_mat(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    assert_eq!(
        a.ncols(),
        b.nrows(),
        "mat_mat: left has {} columns but right has {} rows",
        a.ncols(),
        b.nrows()
    );
    a * b
}

/// Elementwise scalar multiplication of a dense matrix.
#[must_use]
pub fn mat_scalar(m: &DMatrix<f64>, s: f64) -> DMatrix<f64> {
    m * s
}

/// Solves `a * x = b` via dense LU decomposition with partial pivoting,
/// overwriting `b` with the solution `x` in place.
///
/// # Errors
/// Returns [`CoreError::NumericFailure`] if `a` is singular (or close enough
/// to singular that the LU factorization cannot be used to solve).
pub fn solve_linear_system(a: &DMatrix<f64>, b: &mut DVector<f64>) -> Result<(), CoreError> {
    assert_eq!(
        a.nrows(),
        a.ncols(),
        "solve_linear_system: coefficient matrix must be square, got {}x{}",
        a.nrows(),
        a.ncols()
    );
    assert_eq!(
        a.nrows(),
        b.len(),
        "solve_linear_system: matrix is {}x{} but right-hand side has length {}",
        a.nrows(),
        a.ncols(),
        b.len()
    );

    let lu = a.clone().lu();
    let x = lu
        .solve(b)
        .ok_or_else(|| CoreError::NumericFailure("singular iteration matrix in LU solve".into()))?;
    b.copy_from(&x);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_times_vector_is_identity() {
        let i = identity_matrix(4);
        let v = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let r = mat_vec(&i, &v);
        assert_relative_eq!(r, v);
    }

    #[test]
    fn cross_product_matrix_matches_cross() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        let w = Vector3::new(4.0, 5.0, 6.0);
        let skew = cross_product_matrix(v);
        let via_matrix = skew * w;
        let via_cross = v.cross(&w);
        assert_relative_eq!(via_matrix, via_cross, epsilon = 1e-12);
    }

    #[test]
    fn transpose_is_involution() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(transpose(&transpose(&m)), m);
    }

    #[test]
    fn solves_simple_system() {
        let a = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 4.0]);
        let mut b = DVector::from_vec(vec![4.0, 8.0]);
        solve_linear_system(&a, &mut b).unwrap();
        assert_relative_eq!(b, DVector::from_vec(vec![2.0, 2.0]), epsilon = 1e-12);
    }

    #[test]
    fn singular_system_reports_numeric_failure() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let mut b = DVector::from_vec(vec![1.0, 2.0]);
        let err = solve_linear_system(&a, &mut b).unwrap_err();
        assert!(matches!(err, CoreError::NumericFailure(_)));
    }

    #[test]
    #[should_panic(expected = "matrix has")]
    fn mat_vec_panics_on_mismatch() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let v = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let _ = mat_vec(&m, &v);
    }
}
