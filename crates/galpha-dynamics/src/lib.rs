//! galpha-dynamics
//!
//! Generalized coordinates/state, mass matrix, generalized forces, and the
//! heavy-top residual / iteration-matrix assembly that the generalized-alpha
//! integrator (`galpha-integrator`) drives against. Depends on
//! `galpha-linalg` (L1) and `galpha-rotation` (L2), but not on the
//! integrator itself — `galpha-integrator` only ever sees this crate through
//! the [`ResidualFn`] / [`IterationMatrixFn`] contracts.

use galpha_rotation::{quaternion_to_rotation_matrix, Quaternion, Vec3};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

pub use galpha_linalg::CoreError;

/// Four equal-shaped generalized-coordinate vectors: configuration `q`,
/// velocity `v`, acceleration `a`, and algorithmic acceleration `a_tilde`.
///
/// For the rigid-body problem `q` has length 7 (3 position + 4 quaternion)
/// while `v`, `a`, `a_tilde` have length 6 (3 linear + 3 angular). A plain
/// `n`-dof linear problem instead has `q` and `v`/`a`/`a_tilde` all the same
/// length.
#[derive(Clone, Debug, PartialEq)]
pub struct State {
    pub q: DVector<f64>,
    pub v: DVector<f64>,
    pub a: DVector<f64>,
    pub a_tilde: DVector<f64>,
}

impl State {
    /// # Errors
    /// [`CoreError::InvalidArgument`] if `v`, `a`, and `a_tilde` are not all
    /// the same length, or if `q`'s length is neither `v.len()` (a plain
    /// linear problem) nor `v.len() + 1` (the rigid-body position +
    /// quaternion layout).
    pub fn new(
        q: DVector<f64>,
        v: DVector<f64>,
        a: DVector<f64>,
        a_tilde: DVector<f64>,
    ) -> Result<Self, CoreError> {
        if v.len() != a.len() || v.len() != a_tilde.len() {
            return Err(CoreError::InvalidArgument(format!(
                "v, a, a_tilde must share a length; got {}, {}, {}",
                v.len(),
                a.len(),
                a_tilde.len()
            )));
        }
        if q.len() != v.len() && q.len() != v.len() + 1 {
            return Err(CoreError::InvalidArgument(format!(
                "q must have length {} (linear) or {} (rigid body); got {}",
                v.len(),
                v.len() + 1,
                q.len()
            )));
        }
        Ok(Self { q, v, a, a_tilde })
    }

    /// A zero-initial-conditions state with `q` of length `q_len` and
    /// `v`/`a`/`a_tilde` of length `v_len`.
    ///
    /// # Errors
    /// Same shape rules as [`State::new`].
    pub fn zero(q_len: usize, v_len: usize) -> Result<Self, CoreError> {
        Self::new(
            DVector::zeros(q_len),
            DVector::zeros(v_len),
            DVector::zeros(v_len),
            DVector::zeros(v_len),
        )
    }

    /// The rigid-body position block, `q[0..3]`.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.q[0], self.q[1], self.q[2])
    }

    /// The rigid-body orientation block, `q[3..7]`, as a quaternion.
    #[must_use]
    pub fn orientation(&self) -> Quaternion {
        Quaternion::new(self.q[3], self.q[4], self.q[5], self.q[6])
    }

    /// The angular-velocity block of `v`, `v[3..6]`.
    #[must_use]
    pub fn angular_velocity(&self) -> Vec3 {
        Vec3::new(self.v[3], self.v[4], self.v[5])
    }
}

/// A 6x6 symmetric positive-definite mass matrix, typically
/// `diag(m*I3, J)` with `m > 0` and principal moments `J = (Jx, Jy, Jz)`
/// all `> 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct MassMatrix(DMatrix<f64>);

impl MassMatrix {
    /// Builds `diag(m, m, m, Jx, Jy, Jz)`.
    ///
    /// # Errors
    /// [`CoreError::InvalidArgument`] if `mass` or any component of
    /// `inertia` is not strictly positive.
    pub fn from_mass_and_inertia(mass: f64, inertia: Vec3) -> Result<Self, CoreError> {
        if mass <= 0.0 {
            return Err(CoreError::InvalidArgument(format!(
                "mass must be > 0, got {mass}"
            )));
        }
        if inertia.x <= 0.0 || inertia.y <= 0.0 || inertia.z <= 0.0 {
            return Err(CoreError::InvalidArgument(format!(
                "principal moments must all be > 0, got ({}, {}, {})",
                inertia.x, inertia.y, inertia.z
            )));
        }
        let mut m = DMatrix::zeros(6, 6);
        m[(0, 0)] = mass;
        m[(1, 1)] = mass;
        m[(2, 2)] = mass;
        m[(3, 3)] = inertia.x;
        m[(4, 4)] = inertia.y;
        m[(5, 5)] = inertia.z;
        Ok(Self(m))
    }

    /// Builds `diag(m, m, m, j, j, j)` for an isotropic (spherical) inertia.
    ///
    /// # Errors
    /// [`CoreError::InvalidArgument`] if `mass` or `j` is not strictly
    /// positive.
    pub fn from_mass_and_scalar_inertia(mass: f64, j: f64) -> Result<Self, CoreError> {
        Self::from_mass_and_inertia(mass, Vec3::new(j, j, j))
    }

    /// Builds a mass matrix from an explicit 6x6 dense matrix.
    ///
    /// # Errors
    /// [`CoreError::InvalidArgument`] if `matrix` is not 6x6.
    pub fn from_matrix(matrix: DMatrix<f64>) -> Result<Self, CoreError> {
        if matrix.nrows() != 6 || matrix.ncols() != 6 {
            return Err(CoreError::InvalidArgument(format!(
                "mass matrix must be 6x6, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        Ok(Self(matrix))
    }

    #[must_use]
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.0
    }

    /// The rotational (lower-right 3x3) inertia block.
    #[must_use]
    pub fn inertia_block(&self) -> Matrix3<f64> {
        self.0.fixed_view::<3, 3>(3, 3).into_owned()
    }
}

/// A length-6 generalized force `[force (3); moment (3)]`.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneralizedForces(DVector<f64>);

impl GeneralizedForces {
    #[must_use]
    pub fn from_components(force: Vec3, moment: Vec3) -> Self {
        Self(DVector::from_vec(vec![
            force.x, force.y, force.z, moment.x, moment.y, moment.z,
        ]))
    }

    /// # Errors
    /// [`CoreError::InvalidArgument`] if `vector` does not have length 6.
    pub fn from_vector(vector: DVector<f64>) -> Result<Self, CoreError> {
        if vector.len() != 6 {
            return Err(CoreError::InvalidArgument(format!(
                "generalized forces must have length 6, got {}",
                vector.len()
            )));
        }
        Ok(Self(vector))
    }

    #[must_use]
    pub fn as_vector(&self) -> &DVector<f64> {
        &self.0
    }
}

/// The residual-function contract §4.3 integrators consume:
/// `residual(q, v, v_dot, lambda) -> R^(n+m)`.
pub trait ResidualFn {
    fn residual(
        &self,
        q: &DVector<f64>,
        v: &DVector<f64>,
        a: &DVector<f64>,
        lambda: &DVector<f64>,
    ) -> DVector<f64>;
}

/// The iteration-matrix-builder contract §4.3 integrators consume:
/// `iteration_matrix(beta_prime, gamma_prime, q, v, lambda, h, delta_q) ->
/// R^(n+m)x(n+m)`.
pub trait IterationMatrixFn {
    #[allow(clippy::too_many_arguments)]
    fn iteration_matrix(
        &self,
        beta_prime: f64,
        gamma_prime: f64,
        q: &DVector<f64>,
        v: &DVector<f64>,
        lambda: &DVector<f64>,
        h: f64,
        delta_q: &DVector<f64>,
    ) -> DMatrix<f64>;
}

/// The heavy-top problem: a rigid body suspended from a fixed pivot, with
/// `reference_position` the body-frame offset from the pivot to the center
/// of mass.
#[derive(Clone, Debug)]
pub struct HeavyTopProblem {
    pub mass: MassMatrix,
    pub forces: GeneralizedForces,
    pub reference_position: Vec3,
}

impl HeavyTopProblem {
    /// Number of scalar constraints this problem contributes: the fixed
    /// pivot pins all three translational degrees of freedom. Callers must
    /// pass this as `Integrate`'s `constraint_count` argument.
    pub const CONSTRAINT_COUNT: usize = 3;

    #[must_use]
    pub fn new(mass: MassMatrix, forces: GeneralizedForces, reference_position: Vec3) -> Self {
        Self {
            mass,
            forces,
            reference_position,
        }
    }

    fn rotation_matrix(&self, q: &DVector<f64>) -> Matrix3<f64> {
        let quat = Quaternion::new(q[3], q[4], q[5], q[6]);
        quaternion_to_rotation_matrix(quat)
            .expect("embedded quaternion must remain unit per the manifold-update invariant")
            .into()
    }

    /// Constraint gradient `B(q) = [-I3 | -R * skew(X)]`, a 3x6 matrix.
    #[must_use]
    pub fn constraint_gradient(&self, q: &DVector<f64>) -> DMatrix<f64> {
        self.constraint_gradient_with_rotation(&self.rotation_matrix(q))
    }

    fn constraint_gradient_with_rotation(&self, r: &Matrix3<f64>) -> DMatrix<f64> {
        let skew_x = galpha_linalg::cross_product_matrix(self.reference_position.into());
        let block = -(r * skew_x);

        let mut b = DMatrix::zeros(3, 6);
        for i in 0..3 {
            b[(i, i)] = -1.0;
        }
        for i in 0..3 {
            for j in 0..3 {
                b[(i, 3 + j)] = block[(i, j)];
            }
        }
        b
    }

    /// Position-level constraint value: the pivot location implied by the
    /// current configuration, `r - R*X`, which must stay at the fixed
    /// support (the origin).
    #[must_use]
    pub fn constraint_value(&self, q: &DVector<f64>) -> Vector3<f64> {
        self.constraint_value_with_rotation(q, &self.rotation_matrix(q))
    }

    fn constraint_value_with_rotation(&self, q: &DVector<f64>, r: &Matrix3<f64>) -> Vector3<f64> {
        let r_com = Vector3::new(q[0], q[1], q[2]);
        r_com - r * Vector3::from(self.reference_position)
    }

    /// Tangent damping `Ct`, 6x6 with only the lower-right 3x3 block
    /// nonzero: `skew(Omega)*J - skew(J*Omega)`.
    #[must_use]
    pub fn tangent_damping(&self, angular_velocity: Vec3) -> DMatrix<f64> {
        let j = self.mass.inertia_block();
        let omega: Vector3<f64> = angular_velocity.into();
        let j_omega = j * omega;
        let block = galpha_linalg::cross_product_matrix(omega) * j
            - galpha_linalg::cross_product_matrix(j_omega);

        let mut ct = DMatrix::zeros(6, 6);
        for i in 0..3 {
            for k in 0..3 {
                ct[(3 + i, 3 + k)] = block[(i, k)];
            }
        }
        ct
    }

    /// Tangent stiffness `Kt`, 6x6 with only the lower-right 3x3 block
    /// nonzero: `skew(X) * skew(R^T * lambda)`.
    #[must_use]
    pub fn tangent_stiffness(&self, q: &DVector<f64>, lambda: Vec3) -> DMatrix<f64> {
        self.tangent_stiffness_with_rotation(&self.rotation_matrix(q), lambda)
    }

    fn tangent_stiffness_with_rotation(&self, r: &Matrix3<f64>, lambda: Vec3) -> DMatrix<f64> {
        let skew_x = galpha_linalg::cross_product_matrix(self.reference_position.into());
        let rt_lambda = r.transpose() * Vector3::from(lambda);
        let block = skew_x * galpha_linalg::cross_product_matrix(rt_lambda);

        let mut kt = DMatrix::zeros(6, 6);
        for i in 0..3 {
            for k in 0..3 {
                kt[(3 + i, 3 + k)] = block[(i, k)];
            }
        }
        kt
    }
}

impl ResidualFn for HeavyTopProblem {
    fn residual(
        &self,
        q: &DVector<f64>,
        _v: &DVector<f64>,
        a: &DVector<f64>,
        lambda: &DVector<f64>,
    ) -> DVector<f64> {
        let r = self.rotation_matrix(q);
        let b = self.constraint_gradient_with_rotation(&r);
        let inertial_term = self.mass.as_matrix() * a.clone();
        let constraint_force = b.transpose() * lambda.clone();
        let dynamics = inertial_term + self.forces.as_vector() + constraint_force;
        let constraint = self.constraint_value_with_rotation(q, &r);

        let mut augmented = DVector::zeros(dynamics.len() + Self::CONSTRAINT_COUNT);
        augmented.rows_mut(0, dynamics.len()).copy_from(&dynamics);
        augmented[dynamics.len()] = constraint.x;
        augmented[dynamics.len() + 1] = constraint.y;
        augmented[dynamics.len() + 2] = constraint.z;
        augmented
    }
}

impl IterationMatrixFn for HeavyTopProblem {
    fn iteration_matrix(
        &self,
        beta_prime: f64,
        gamma_prime: f64,
        q: &DVector<f64>,
        v: &DVector<f64>,
        lambda: &DVector<f64>,
        _h: f64,
        _delta_q: &DVector<f64>,
    ) -> DMatrix<f64> {
        let n = self.mass.as_matrix().nrows();
        let m = Self::CONSTRAINT_COUNT;

        let r = self.rotation_matrix(q);
        let omega = Vec3::new(v[3], v[4], v[5]);
        let lambda_vec = Vec3::new(lambda[0], lambda[1], lambda[2]);

        let ct = self.tangent_damping(omega);
        let kt = self.tangent_stiffness_with_rotation(&r, lambda_vec);
        let mass_term = beta_prime * self.mass.as_matrix();
        let damping_term = gamma_prime * &ct;
        let top_left = &kt + mass_term + damping_term;

        let b = self.constraint_gradient_with_rotation(&r);
        let bt = b.transpose();

        let mut j = DMatrix::zeros(n + m, n + m);
        j.view_mut((0, 0), (n, n)).copy_from(&top_left);
        j.view_mut((0, n), (n, m)).copy_from(&bt);
        j.view_mut((n, 0), (m, n)).copy_from(&b);
        j
    }
}
