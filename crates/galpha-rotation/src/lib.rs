//! galpha-rotation
//!
//! 3-vector, unit-quaternion, and rotation-matrix algebra kept on the SO(3)
//! manifold: exponential/logarithmic maps between a rotation vector and a
//! unit quaternion, quaternion composition, vector rotation, and
//! quaternion <-> rotation-matrix conversion.
//!
//! This crate has no knowledge of `galpha-dynamics` or `galpha-integrator`
//! (see the workspace's dependency-direction design note) — it only depends
//! on `galpha-linalg` for the shared [`CoreError`] type.

use std::ops::{Add, Div, Mul, Sub};

pub use galpha_linalg::CoreError;

/// Tolerance used throughout this crate for unit-length checks, zero checks,
/// and float comparisons.
pub const EPS: f64 = 1e-6;

/// `|a - b| < EPS`.
#[must_use]
pub fn close_to(a: f64, b: f64) -> bool {
    (a - b).abs() < EPS
}

/// Wraps `theta` into `(-pi, pi]` by repeatedly adding/subtracting `2*pi`.
/// The boundary `+-pi` is returned unchanged.
#[must_use]
pub fn wrap_angle_to_pi(theta: f64) -> f64 {
    use std::f64::consts::PI;

    if close_to(theta, PI) || close_to(theta, -PI) {
        return theta;
    }

    let mut wrapped = theta;
    while wrapped > PI {
        wrapped -= 2.0 * PI;
    }
    while wrapped <= -PI {
        wrapped += 2.0 * PI;
    }
    wrapped
}

/// A 3-component real vector. Immutable-by-convention: every operation
/// returns a freshly computed value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the direction of `self`. Division by (near) zero
    /// length is not special-cased here; callers needing that guard check
    /// `length()` first, as angle-axis extraction does.
    #[must_use]
    pub fn unit(self) -> Self {
        self / self.length()
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, k: f64) -> Vec3 {
        Vec3::new(self.x * k, self.y * k, self.z * k)
    }
}

impl Div<f64> for Vec3 {
    type Output = Vec3;
    fn div(self, k: f64) -> Vec3 {
        Vec3::new(self.x / k, self.y / k, self.z / k)
    }
}

impl From<Vec3> for nalgebra::Vector3<f64> {
    fn from(v: Vec3) -> Self {
        nalgebra::Vector3::new(v.x, v.y, v.z)
    }
}

impl From<nalgebra::Vector3<f64>> for Vec3 {
    fn from(v: nalgebra::Vector3<f64>) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

impl From<RotationMatrix> for nalgebra::Matrix3<f64> {
    fn from(r: RotationMatrix) -> Self {
        nalgebra::Matrix3::new(
            r.row0.x, r.row0.y, r.row0.z,
            r.row1.x, r.row1.y, r.row1.z,
            r.row2.x, r.row2.y, r.row2.z,
        )
    }
}

/// A unit-representing quaternion `q = q0 + q1 i + q2 j + q3 k`, with `q0`
/// the scalar part. Component access beyond index 3 is an error, not a
/// panic, since it is reachable from external input rather than purely a
/// programming mistake.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quaternion {
    pub q0: f64,
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
}

impl Quaternion {
    #[must_use]
    pub fn new(q0: f64, q1: f64, q2: f64, q3: f64) -> Self {
        Self { q0, q1, q2, q3 }
    }

    #[must_use]
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Vector (imaginary) part `(q1, q2, q3)`.
    #[must_use]
    pub fn vector_part(self) -> Vec3 {
        Vec3::new(self.q1, self.q2, self.q3)
    }

    /// # Errors
    /// [`CoreError::IndexOutOfRange`] if `index > 3`.
    pub fn component(self, index: usize) -> Result<f64, CoreError> {
        match index {
            0 => Ok(self.q0),
            1 => Ok(self.q1),
            2 => Ok(self.q2),
            3 => Ok(self.q3),
            _ => Err(CoreError::IndexOutOfRange { index }),
        }
    }

    #[must_use]
    pub fn length(self) -> f64 {
        (self.q0 * self.q0 + self.q1 * self.q1 + self.q2 * self.q2 + self.q3 * self.q3).sqrt()
    }

    #[must_use]
    pub fn is_unit(self) -> bool {
        close_to(self.length(), 1.0)
    }

    /// # Errors
    /// [`CoreError::DomainError`] if `self` is (near) zero length.
    pub fn normalize(self) -> Result<Self, CoreError> {
        let n = self.length();
        if close_to(n, 0.0) {
            return Err(CoreError::DomainError(
                "cannot normalize a zero-length quaternion".into(),
            ));
        }
        Ok(self / n)
    }

    #[must_use]
    pub fn conjugate(self) -> Self {
        Self::new(self.q0, -self.q1, -self.q2, -self.q3)
    }

    /// # Errors
    /// [`CoreError::DomainError`] if `self` is (near) zero length.
    pub fn inverse(self) -> Result<Self, CoreError> {
        let n2 = self.length().powi(2);
        if close_to(n2, 0.0) {
            return Err(CoreError::DomainError(
                "cannot invert a zero-length quaternion".into(),
            ));
        }
        Ok(self.conjugate() / n2)
    }
}

impl Add for Quaternion {
    type Output = Quaternion;
    fn add(self, rhs: Quaternion) -> Quaternion {
        Quaternion::new(
            self.q0 + rhs.q0,
            self.q1 + rhs.q1,
            self.q2 + rhs.q2,
            self.q3 + rhs.q3,
        )
    }
}

impl Sub for Quaternion {
    type Output = Quaternion;
    fn sub(self, rhs: Quaternion) -> Quaternion {
        Quaternion::new(
            self.q0 - rhs.q0,
            self.q1 - rhs.q1,
            self.q2 - rhs.q2,
            self.q3 - rhs.q3,
        )
    }
}

impl Mul<f64> for Quaternion {
    type Output = Quaternion;
    fn mul(self, k: f64) -> Quaternion {
        Quaternion::new(self.q0 * k, self.q1 * k, self.q2 * k, self.q3 * k)
    }
}

impl Div<f64> for Quaternion {
    type Output = Quaternion;
    fn div(self, k: f64) -> Quaternion {
        Quaternion::new(self.q0 / k, self.q1 / k, self.q2 / k, self.q3 / k)
    }
}

/// Hamilton product.
impl Mul for Quaternion {
    type Output = Quaternion;
    fn mul(self, rhs: Quaternion) -> Quaternion {
        Quaternion::new(
            self.q0 * rhs.q0 - self.q1 * rhs.q1 - self.q2 * rhs.q2 - self.q3 * rhs.q3,
            self.q0 * rhs.q1 + self.q1 * rhs.q0 + self.q2 * rhs.q3 - self.q3 * rhs.q2,
            self.q0 * rhs.q2 - self.q1 * rhs.q3 + self.q2 * rhs.q0 + self.q3 * rhs.q1,
            self.q0 * rhs.q3 + self.q1 * rhs.q2 - self.q2 * rhs.q1 + self.q3 * rhs.q0,
        )
    }
}

/// An orthogonal rotation matrix, stored row-major as three [`Vec3`] rows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotationMatrix {
    pub row0: Vec3,
    pub row1: Vec3,
    pub row2: Vec3,
}

impl RotationMatrix {
    #[must_use]
    pub fn new(row0: Vec3, row1: Vec3, row2: Vec3) -> Self {
        Self { row0, row1, row2 }
    }

    /// `self * v` (row-by-vector multiplication).
    #[must_use]
    pub fn mul_vec(self, v: Vec3) -> Vec3 {
        Vec3::new(self.row0.dot(v), self.row1.dot(v), self.row2.dot(v))
    }

    #[must_use]
    pub fn transpose(self) -> Self {
        Self::new(
            Vec3::new(self.row0.x, self.row1.x, self.row2.x),
            Vec3::new(self.row0.y, self.row1.y, self.row2.y),
            Vec3::new(self.row0.z, self.row1.z, self.row2.z),
        )
    }
}

/// `theta = ||omega||`; returns the identity quaternion when `theta` is
/// (near) zero, else `(cos(theta/2), (sin(theta/2)/theta) * omega)`.
#[must_use]
pub fn quaternion_from_rotation_vector(omega: Vec3) -> Quaternion {
    let theta = omega.length();
    if close_to(theta, 0.0) {
        return Quaternion::identity();
    }
    let half = 0.5 * theta;
    let k = half.sin() / theta;
    Quaternion::new(half.cos(), k * omega.x, k * omega.y, k * omega.z)
}

/// `s = ||(q1,q2,q3)||`; returns the zero vector when `s` is (near) zero,
/// else `k * (q1,q2,q3)` with `k = 2*atan2(s, q0)/s`.
#[must_use]
pub fn rotation_vector_from_quaternion(q: Quaternion) -> Vec3 {
    let qv = q.vector_part();
    let s = qv.length();
    if close_to(s, 0.0) {
        return Vec3::zero();
    }
    let k = 2.0 * s.atan2(q.q0) / s;
    qv * k
}

/// `(cos(theta/2), sin(theta/2) * axis)`. `axis` is assumed to already be a
/// unit vector.
#[must_use]
pub fn quaternion_from_angle_axis(theta: f64, axis: Vec3) -> Quaternion {
    let half = 0.5 * theta;
    let s = half.sin();
    Quaternion::new(half.cos(), s * axis.x, s * axis.y, s * axis.z)
}

/// `theta = 2*atan2(s, q0)`; returns `(0, (1,0,0))` when `theta` is (near)
/// zero, else `(wrap_angle_to_pi(theta), (q1,q2,q3)/s)`.
#[must_use]
pub fn angle_axis_from_quaternion(q: Quaternion) -> (f64, Vec3) {
    let qv = q.vector_part();
    let s = qv.length();
    let theta = 2.0 * s.atan2(q.q0);
    if close_to(theta, 0.0) {
        return (0.0, Vec3::new(1.0, 0.0, 0.0));
    }
    (wrap_angle_to_pi(theta), qv / s)
}

/// Rotates `v` by the unit quaternion `q` via the closed-form formula
/// `v' = (q0^2 - |qv|^2) v + 2 q0 (qv x v) + 2 qv (qv . v)`.
///
/// # Errors
/// [`CoreError::DomainError`] if `q` is not a unit quaternion (within
/// [`EPS`]).
pub fn rotate_vector(q: Quaternion, v: Vec3) -> Result<Vec3, CoreError> {
    require_unit(q)?;
    let qv = q.vector_part();
    let term1 = v * (q.q0 * q.q0 - qv.dot(qv));
    let term2 = qv.cross(v) * (2.0 * q.q0);
    let term3 = qv * (2.0 * qv.dot(v));
    Ok(term1 + term2 + term3)
}

/// Converts a unit quaternion to the equivalent orthogonal rotation matrix.
///
/// # Errors
/// [`CoreError::DomainError`] if `q` is not a unit quaternion.
pub fn quaternion_to_rotation_matrix(q: Quaternion) -> Result<RotationMatrix, CoreError> {
    require_unit(q)?;
    let (w, x, y, z) = (q.q0, q.q1, q.q2, q.q3);
    let row0 = Vec3::new(
        1.0 - 2.0 * (y * y + z * z),
        2.0 * (x * y - w * z),
        2.0 * (x * z + w * y),
    );
    let row1 = Vec3::new(
        2.0 * (x * y + w * z),
        1.0 - 2.0 * (x * x + z * z),
        2.0 * (y * z - w * x),
    );
    let row2 = Vec3::new(
        2.0 * (x * z - w * y),
        2.0 * (y * z + w * x),
        1.0 - 2.0 * (x * x + y * y),
    );
    Ok(RotationMatrix::new(row0, row1, row2))
}

/// Converts an orthogonal rotation matrix to a unit quaternion, selecting
/// whichever of the four algebraically-equivalent branches (keyed by the
/// trace, or the largest diagonal entry) avoids dividing by a small number.
/// The trace branch returns `q0 >= 0`; the sign returned by the other
/// branches is otherwise arbitrary, since `q` and `-q` denote the same
/// rotation.
#[must_use]
pub fn rotation_matrix_to_quaternion(r: RotationMatrix) -> Quaternion {
    let (r00, r01, r02) = (r.row0.x, r.row0.y, r.row0.z);
    let (r10, r11, r12) = (r.row1.x, r.row1.y, r.row1.z);
    let (r20, r21, r22) = (r.row2.x, r.row2.y, r.row2.z);
    let trace = r00 + r11 + r22;

    if trace > 0.0 {
        let s = (trace + 1.0).sqrt() * 2.0;
        Quaternion::new(
            0.25 * s,
            (r21 - r12) / s,
            (r02 - r20) / s,
            (r10 - r01) / s,
        )
    } else if r00 > r11 && r00 > r22 {
        let s = (1.0 + r00 - r11 - r22).sqrt() * 2.0;
        Quaternion::new((r21 - r12) / s, 0.25 * s, (r01 + r10) / s, (r02 + r20) / s)
    } else if r11 > r22 {
        let s = (1.0 + r11 - r00 - r22).sqrt() * 2.0;
        Quaternion::new((r02 - r20) / s, (r01 + r10) / s, 0.25 * s, (r12 + r21) / s)
    } else {
        let s = (1.0 + r22 - r00 - r11).sqrt() * 2.0;
        Quaternion::new((r10 - r01) / s, (r02 + r20) / s, (r12 + r21) / s, 0.25 * s)
    }
}

fn require_unit(q: Quaternion) -> Result<(), CoreError> {
    if q.is_unit() {
        Ok(())
    } else {
        Err(CoreError::DomainError(format!(
            "expected a unit quaternion, got one with length {}",
            q.length()
        )))
    }
}
