//! galpha-integrator
//!
//! The generalized-alpha time stepper: predictor, Newton corrector with
//! optional saddle-point preconditioning, the manifold-aware coordinate
//! update on R^3 x SO(3), and the `Integrate` driver that produces a state
//! history.
//!
//! This crate only ever sees a problem through the [`ResidualFn`] /
//! [`IterationMatrixFn`] contracts exported by `galpha-dynamics` — it has no
//! knowledge of `HeavyTopProblem` or any other concrete assembler.

use galpha_dynamics::{IterationMatrixFn, ResidualFn, State};
use galpha_rotation::{quaternion_from_rotation_vector, Quaternion, Vec3};
use nalgebra::{DMatrix, DVector};

pub use galpha_dynamics::CoreError;

/// Convergence threshold on the 2-norm of the augmented residual, tau in
/// the generalized-alpha literature.
pub const CONVERGENCE_TOLERANCE: f64 = 1e-4;

/// The four generalized-alpha parameters governing numerical damping of the
/// low- and high-frequency response.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntegratorConstants {
    alpha_f: f64,
    alpha_m: f64,
    beta: f64,
    gamma: f64,
}

impl IntegratorConstants {
    /// # Errors
    /// [`CoreError::InvalidArgument`] unless `alpha_f, alpha_m in [0,1]`,
    /// `beta in [0,0.5]`, and `gamma in [0,1]`.
    pub fn new(alpha_f: f64, alpha_m: f64, beta: f64, gamma: f64) -> Result<Self, CoreError> {
        if !(0.0..=1.0).contains(&alpha_f) {
            return Err(CoreError::InvalidArgument(format!(
                "alpha_f must be in [0,1], got {alpha_f}"
            )));
        }
        if !(0.0..=1.0).contains(&alpha_m) {
            return Err(CoreError::InvalidArgument(format!(
                "alpha_m must be in [0,1], got {alpha_m}"
            )));
        }
        if !(0.0..=0.5).contains(&beta) {
            return Err(CoreError::InvalidArgument(format!(
                "beta must be in [0,0.5], got {beta}"
            )));
        }
        if !(0.0..=1.0).contains(&gamma) {
            return Err(CoreError::InvalidArgument(format!(
                "gamma must be in [0,1], got {gamma}"
            )));
        }
        Ok(Self {
            alpha_f,
            alpha_m,
            beta,
            gamma,
        })
    }

    #[must_use]
    pub fn alpha_f(&self) -> f64 {
        self.alpha_f
    }

    #[must_use]
    pub fn alpha_m(&self) -> f64 {
        self.alpha_m
    }

    #[must_use]
    pub fn beta(&self) -> f64 {
        self.beta
    }

    #[must_use]
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Default for IntegratorConstants {
    /// Trapezoidal-like, neutral-damping defaults: (0.5, 0.5, 0.25, 0.5).
    fn default() -> Self {
        Self::new(0.5, 0.5, 0.25, 0.5).expect("default constants are always in range")
    }
}

/// Holds the time-stepping schedule and the per-step / cumulative Newton
/// iteration counters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeStepper {
    t0: f64,
    h: f64,
    n_steps: usize,
    max_iterations: usize,
    current_time: f64,
    iterations_this_step: usize,
    total_iterations: usize,
}

/// Default maximum Newton iterations per step.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

impl TimeStepper {
    /// # Errors
    /// [`CoreError::InvalidArgument`] if `h <= 0`.
    pub fn new(t0: f64, h: f64, n_steps: usize) -> Result<Self, CoreError> {
        Self::with_max_iterations(t0, h, n_steps, DEFAULT_MAX_ITERATIONS)
    }

    /// # Errors
    /// [`CoreError::InvalidArgument`] if `h <= 0`.
    pub fn with_max_iterations(
        t0: f64,
        h: f64,
        n_steps: usize,
        max_iterations: usize,
    ) -> Result<Self, CoreError> {
        if h <= 0.0 {
            return Err(CoreError::InvalidArgument(format!(
                "step size h must be > 0, got {h}"
            )));
        }
        Ok(Self {
            t0,
            h,
            n_steps,
            max_iterations,
            current_time: t0,
            iterations_this_step: 0,
            total_iterations: 0,
        })
    }

    /// Advances `current_time` by one step of size `h`.
    pub fn advance_time_step(&mut self) {
        self.current_time += self.h;
    }

    fn record_step_iterations(&mut self, iterations: usize) {
        self.iterations_this_step = iterations;
        self.total_iterations += iterations;
    }

    #[must_use]
    pub fn t0(&self) -> f64 {
        self.t0
    }

    #[must_use]
    pub fn h(&self) -> f64 {
        self.h
    }

    #[must_use]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    #[must_use]
    pub fn iterations_this_step(&self) -> usize {
        self.iterations_this_step
    }

    #[must_use]
    pub fn total_iterations(&self) -> usize {
        self.total_iterations
    }
}

/// The outcome of a single accepted step: the new state plus whether the
/// Newton corrector converged within the step's iteration budget.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub state: State,
    pub converged: bool,
    pub iterations: usize,
}

/// Coordinate update on R^3 x SO(3): the position block updates additively,
/// the orientation block composes the current unit quaternion with the
/// exponential map of the scaled rotation-vector increment.
///
/// For a plain (non rigid-body) problem, where `q` and `delta_q` share the
/// same length, every block is additive: `q_next = q + h * delta_q`.
///
/// # Errors
/// [`CoreError::InvalidArgument`] if `q.len()` is neither `delta_q.len()`
/// nor `delta_q.len() + 1`.
pub fn manifold_update(
    q: &DVector<f64>,
    delta_q: &DVector<f64>,
    h: f64,
) -> Result<DVector<f64>, CoreError> {
    if q.len() == delta_q.len() {
        return Ok(q + delta_q * h);
    }
    if q.len() != delta_q.len() + 1 {
        return Err(CoreError::InvalidArgument(format!(
            "manifold_update: q has length {} but delta_q has length {}; expected equal lengths \
             or q.len() == delta_q.len() + 1",
            q.len(),
            delta_q.len()
        )));
    }

    let position = Vec3::new(q[0], q[1], q[2]) + Vec3::new(delta_q[0], delta_q[1], delta_q[2]) * h;
    let current_orientation = Quaternion::new(q[3], q[4], q[5], q[6]);
    let rotation_increment = Vec3::new(delta_q[3], delta_q[4], delta_q[5]) * h;
    let delta_orientation = quaternion_from_rotation_vector(rotation_increment);
    let next_orientation = (current_orientation * delta_orientation).normalize()?;

    let mut next_q = DVector::zeros(7);
    next_q[0] = position.x;
    next_q[1] = position.y;
    next_q[2] = position.z;
    next_q[3] = next_orientation.q0;
    next_q[4] = next_orientation.q1;
    next_q[5] = next_orientation.q2;
    next_q[6] = next_orientation.q3;
    Ok(next_q)
}

/// Scales the constraint block of the saddle-point system per Bottasso et
/// al. (2008): rows `n..n+m` of `j` and `r` are multiplied by `scale`, and
/// columns `n..n+m` of `j` are multiplied by `1/scale`. Generalized over `n`
/// and `m` rather than hard-coded to the 6-dof/3-constraint heavy top.
fn apply_preconditioner(j: &mut DMatrix<f64>, r: &mut DVector<f64>, n: usize, m: usize, scale: f64) {
    for i in 0..m {
        let row = n + i;
        for col in 0..j.ncols() {
            j[(row, col)] *= scale;
        }
        r[row] *= scale;
    }
    for i in 0..m {
        let col = n + i;
        for row in 0..j.nrows() {
            j[(row, col)] /= scale;
        }
    }
}

/// Drives the generalized-alpha predictor/Newton-corrector scheme against a
/// pluggable [`ResidualFn`] / [`IterationMatrixFn`] problem.
#[derive(Clone, Copy, Debug)]
pub struct AlphaIntegrator {
    constants: IntegratorConstants,
    stepper: TimeStepper,
    precondition: bool,
}

impl AlphaIntegrator {
    #[must_use]
    pub fn new(constants: IntegratorConstants, stepper: TimeStepper, precondition: bool) -> Self {
        Self {
            constants,
            stepper,
            precondition,
        }
    }

    #[must_use]
    pub fn alpha_f(&self) -> f64 {
        self.constants.alpha_f()
    }

    #[must_use]
    pub fn alpha_m(&self) -> f64 {
        self.constants.alpha_m()
    }

    #[must_use]
    pub fn beta(&self) -> f64 {
        self.constants.beta()
    }

    #[must_use]
    pub fn gamma(&self) -> f64 {
        self.constants.gamma()
    }

    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.stepper.current_time()
    }

    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.stepper.max_iterations()
    }

    #[must_use]
    pub fn iterations_this_step(&self) -> usize {
        self.stepper.iterations_this_step()
    }

    #[must_use]
    pub fn total_iterations(&self) -> usize {
        self.stepper.total_iterations()
    }

    #[must_use]
    pub fn precondition(&self) -> bool {
        self.precondition
    }

    /// Advances the wrapped stepper's schedule by one step of size `h`.
    pub fn advance_time_step(&mut self) {
        self.stepper.advance_time_step();
    }

    /// Advances the stepper's schedule and runs one Newton-corrected step.
    /// Exposed directly so callers that need per-step convergence
    /// diagnostics can bypass [`AlphaIntegrator::integrate`].
    ///
    /// # Errors
    /// Propagates [`CoreError`] from the manifold update (non-unit
    /// quaternion, which should not occur given the invariant is maintained
    /// by construction), from a singular iteration matrix at solve time, or
    /// [`CoreError::NumericFailure`] if `beta` and `alpha_f` combine to make
    /// beta'/gamma' undefined (e.g. `beta = 0`, a construction-valid
    /// boundary value per the generalized-alpha parameter ranges).
    pub fn alpha_step(
        &mut self,
        state: &State,
        constraint_count: usize,
        residual_fn: &dyn ResidualFn,
        iteration_matrix_fn: &dyn IterationMatrixFn,
    ) -> Result<StepOutcome, CoreError> {
        let n = state.v.len();
        let m = constraint_count;
        let h = self.stepper.h();
        let alpha_f = self.constants.alpha_f();
        let alpha_m = self.constants.alpha_m();
        let beta = self.constants.beta();
        let gamma = self.constants.gamma();

        let a_tilde_next =
            (state.a.clone() * alpha_f - state.a_tilde.clone() * alpha_m) / (1.0 - alpha_m);
        let mut delta_q = state.v.clone()
            + state.a_tilde.clone() * (h * (0.5 - beta))
            + a_tilde_next.clone() * (h * beta);
        let mut v = state.v.clone()
            + state.a_tilde.clone() * (h * (1.0 - gamma))
            + a_tilde_next.clone() * (h * gamma);
        let mut a = DVector::zeros(n);
        let mut lambda = DVector::zeros(m);
        let mut a_tilde = a_tilde_next;

        if beta * (1.0 - alpha_f) == 0.0 {
            return Err(CoreError::NumericFailure(format!(
                "beta' is undefined: beta = {beta}, alpha_f = {alpha_f} (beta * (1 - alpha_f) \
                 must be nonzero)"
            )));
        }
        let beta_prime = (1.0 - alpha_m) / (h * h * beta * (1.0 - alpha_f));
        let gamma_prime = gamma / (h * beta);

        let mut q_next = state.q.clone();
        let mut converged = false;
        let max_iterations = self.stepper.max_iterations();
        let mut iterations = 0usize;

        for _ in 0..max_iterations {
            iterations += 1;
            q_next = manifold_update(&state.q, &delta_q, h)?;
            let r = residual_fn.residual(&q_next, &v, &a, &lambda);
            if r.norm() < CONVERGENCE_TOLERANCE {
                converged = true;
                break;
            }

            let mut j = iteration_matrix_fn.iteration_matrix(
                beta_prime,
                gamma_prime,
                &q_next,
                &v,
                &lambda,
                h,
                &delta_q,
            );
            let mut rhs = r;
            if self.precondition {
                apply_preconditioner(&mut j, &mut rhs, n, m, beta * h * h);
            }

            galpha_linalg::solve_linear_system(&j, &mut rhs)?;
            let delta_x = -rhs;
            let delta_x_v = delta_x.rows(0, n).into_owned();
            let mut delta_x_lambda = delta_x.rows(n, m).into_owned();
            if self.precondition {
                delta_x_lambda /= beta * h * h;
            }

            delta_q = delta_q + delta_x_v.clone() / h;
            v = v + delta_x_v.clone() * gamma_prime;
            a = a + delta_x_v.clone() * beta_prime;
            lambda = lambda + delta_x_lambda;
        }

        a_tilde = a_tilde + a.clone() * ((1.0 - alpha_f) / (1.0 - alpha_m));

        if !converged {
            log::warn!(
                "Newton corrector did not converge within {max_iterations} iterations at t = {}",
                self.stepper.current_time()
            );
        }

        self.stepper.record_step_iterations(iterations);

        let state = State::new(q_next, v, a, a_tilde)?;
        Ok(StepOutcome {
            state,
            converged,
            iterations,
        })
    }

    /// Drives the stepper for `n_steps` accepted steps, returning the full
    /// state history (length `n_steps + 1`, including `initial_state`).
    /// Newton exhaustion within a step is logged but never aborts the run.
    ///
    /// # Errors
    /// Propagates [`CoreError`] from a failed step (manifold update or
    /// singular iteration matrix).
    pub fn integrate(
        &mut self,
        initial_state: State,
        constraint_count: usize,
        residual_fn: &dyn ResidualFn,
        iteration_matrix_fn: &dyn IterationMatrixFn,
    ) -> Result<Vec<State>, CoreError> {
        let outcomes =
            self.integrate_with_outcomes(initial_state, constraint_count, residual_fn, iteration_matrix_fn)?;
        Ok(outcomes.into_iter().map(|outcome| outcome.state).collect())
    }

    /// As [`AlphaIntegrator::integrate`], but retains the convergence flag
    /// and iteration count of every accepted step.
    ///
    /// # Errors
    /// Propagates [`CoreError`] from a failed step.
    pub fn integrate_with_outcomes(
        &mut self,
        initial_state: State,
        constraint_count: usize,
        residual_fn: &dyn ResidualFn,
        iteration_matrix_fn: &dyn IterationMatrixFn,
    ) -> Result<Vec<StepOutcome>, CoreError> {
        let mut history = Vec::with_capacity(self.stepper.n_steps() + 1);
        history.push(StepOutcome {
            state: initial_state.clone(),
            converged: true,
            iterations: 0,
        });

        let mut current = initial_state;
        for _ in 0..self.stepper.n_steps() {
            self.stepper.advance_time_step();
            let outcome =
                self.alpha_step(&current, constraint_count, residual_fn, iteration_matrix_fn)?;
            current = outcome.state.clone();
            history.push(outcome);
        }

        log::debug!(
            "integrated {} steps to t = {}, {} cumulative Newton iterations",
            self.stepper.n_steps(),
            self.stepper.current_time(),
            self.stepper.total_iterations()
        );

        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// A trivial n-dof problem with constant forcing and no velocity/
    /// position coupling, used to exercise the predictor/corrector
    /// arithmetic in isolation from the heavy-top assembly.
    struct ConstantForcing {
        forcing: f64,
        n: usize,
        m: usize,
    }

    impl ResidualFn for ConstantForcing {
        fn residual(
            &self,
            _q: &DVector<f64>,
            _v: &DVector<f64>,
            a: &DVector<f64>,
            _lambda: &DVector<f64>,
        ) -> DVector<f64> {
            let mut r = DVector::zeros(self.n + self.m);
            for i in 0..self.n {
                r[i] = a[i] + self.forcing;
            }
            r
        }
    }

    impl IterationMatrixFn for ConstantForcing {
        fn iteration_matrix(
            &self,
            beta_prime: f64,
            _gamma_prime: f64,
            _q: &DVector<f64>,
            _v: &DVector<f64>,
            _lambda: &DVector<f64>,
            _h: f64,
            _delta_q: &DVector<f64>,
        ) -> DMatrix<f64> {
            let mut j = DMatrix::zeros(self.n + self.m, self.n + self.m);
            for i in 0..self.n {
                j[(i, i)] = beta_prime;
            }
            for i in 0..self.m {
                j[(self.n + i, self.n + i)] = 1.0;
            }
            j
        }
    }

    fn scalar_integrator(n_steps: usize) -> AlphaIntegrator {
        let constants = IntegratorConstants::new(0.0, 0.0, 0.5, 1.0).unwrap();
        let stepper = TimeStepper::with_max_iterations(0.0, 1.0, n_steps, 1).unwrap();
        AlphaIntegrator::new(constants, stepper, false)
    }

    #[test]
    fn default_stepper_advance() {
        let constants = IntegratorConstants::default();
        let stepper = TimeStepper::new(0.0, 1.0, 1).unwrap();
        let mut integrator = AlphaIntegrator::new(constants, stepper, false);
        assert_relative_eq!(integrator.current_time(), 0.0);
        integrator.advance_time_step();
        assert_relative_eq!(integrator.current_time(), 1.0);
    }

    #[test]
    fn history_length_and_final_time() {
        let constants = IntegratorConstants::default();
        let stepper = TimeStepper::new(0.0, 0.10, 17).unwrap();
        let mut integrator = AlphaIntegrator::new(constants, stepper, false);
        let problem = ConstantForcing {
            forcing: 0.0,
            n: 1,
            m: 0,
        };
        let initial = State::zero(1, 1).unwrap();
        let history = integrator.integrate(initial, 0, &problem, &problem).unwrap();
        assert_eq!(history.len(), 18);
        assert_relative_eq!(integrator.current_time(), 1.70, epsilon = 1e-9);
    }

    #[test]
    fn linear_update_zero_acceleration_scalar_dof() {
        let mut integrator = scalar_integrator(1);
        let problem = ConstantForcing {
            forcing: 2.0,
            n: 1,
            m: 0,
        };
        let initial = State::zero(1, 1).unwrap();
        let history = integrator.integrate(initial, 0, &problem, &problem).unwrap();
        let last = &history[1];
        assert_relative_eq!(last.q[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(last.v[0], -2.0, epsilon = 1e-12);
        assert_relative_eq!(last.a[0], -2.0, epsilon = 1e-12);
        assert_relative_eq!(last.a_tilde[0], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn linear_update_zero_acceleration_two_steps_has_expected_history_shape() {
        let mut integrator = scalar_integrator(2);
        let problem = ConstantForcing {
            forcing: 2.0,
            n: 1,
            m: 0,
        };
        let initial = State::zero(1, 1).unwrap();
        let history = integrator.integrate(initial, 0, &problem, &problem).unwrap();
        assert_eq!(history.len(), 3);
        assert_relative_eq!(integrator.current_time(), 2.0, epsilon = 1e-12);
        assert!(integrator.total_iterations() >= 2);
    }

    #[test]
    fn linear_update_nonzero_acceleration_three_dof() {
        let constants = IntegratorConstants::new(0.0, 0.0, 0.5, 1.0).unwrap();
        let stepper = TimeStepper::with_max_iterations(0.0, 1.0, 1, 1).unwrap();
        let mut integrator = AlphaIntegrator::new(constants, stepper, false);
        let problem = ConstantForcing {
            forcing: 2.0,
            n: 3,
            m: 0,
        };
        let initial = State::new(
            DVector::from_vec(vec![1.0, 2.0, 3.0]),
            DVector::from_vec(vec![1.0, 2.0, 3.0]),
            DVector::from_vec(vec![1.0, 2.0, 3.0]),
            DVector::from_vec(vec![1.0, 2.0, 3.0]),
        )
        .unwrap();
        let history = integrator.integrate(initial, 0, &problem, &problem).unwrap();
        let last = &history[1];
        assert_relative_eq!(last.q, DVector::from_vec(vec![2.0, 4.0, 6.0]), epsilon = 1e-12);
        assert_relative_eq!(last.v, DVector::from_vec(vec![-1.0, 0.0, 1.0]), epsilon = 1e-12);
        assert_relative_eq!(last.a, DVector::from_vec(vec![-2.0, -2.0, -2.0]), epsilon = 1e-12);
        assert_relative_eq!(
            last.a_tilde,
            DVector::from_vec(vec![-2.0, -2.0, -2.0]),
            epsilon = 1e-12
        );
    }

    #[test]
    fn manifold_update_of_seven_vector() {
        let q = DVector::from_vec(vec![0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
        let delta_q = DVector::from_vec(vec![1.0, 1.0, 1.0, 1.0, 2.0, 3.0]);
        let next = manifold_update(&q, &delta_q, 1.0).unwrap();
        assert_relative_eq!(next[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(next[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(next[2], 1.0, epsilon = 1e-12);

        let expected_orientation = quaternion_from_rotation_vector(Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(next[3], expected_orientation.q0, epsilon = 1e-12);
        assert_relative_eq!(next[4], expected_orientation.q1, epsilon = 1e-12);
        assert_relative_eq!(next[5], expected_orientation.q2, epsilon = 1e-12);
        assert_relative_eq!(next[6], expected_orientation.q3, epsilon = 1e-12);
    }

    #[test]
    fn convergence_predicate_matches_tolerance() {
        let tau = CONVERGENCE_TOLERANCE;
        let converged = DVector::from_vec(vec![1e-7 * tau, 2e-7 * tau, 3e-7 * tau]);
        let not_converged = DVector::from_vec(vec![1e1 * tau, 2e1 * tau, 3e1 * tau]);
        assert!(converged.norm() < tau);
        assert!(!(not_converged.norm() < tau));
    }

    #[test]
    fn integrator_constants_reject_out_of_range_parameters() {
        assert!(IntegratorConstants::new(-0.1, 0.5, 0.25, 0.5).is_err());
        assert!(IntegratorConstants::new(0.5, 1.1, 0.25, 0.5).is_err());
        assert!(IntegratorConstants::new(0.5, 0.5, 0.6, 0.5).is_err());
        assert!(IntegratorConstants::new(0.5, 0.5, 0.25, -0.1).is_err());
    }

    #[test]
    fn integrator_constants_accept_range_endpoints() {
        assert!(IntegratorConstants::new(0.0, 0.0, 0.0, 0.0).is_ok());
        assert!(IntegratorConstants::new(1.0, 1.0, 0.5, 1.0).is_ok());
    }

    #[test]
    fn zero_beta_is_accepted_at_construction_but_fails_the_step() {
        let constants = IntegratorConstants::new(0.5, 0.5, 0.0, 0.5).unwrap();
        let stepper = TimeStepper::new(0.0, 1.0, 1).unwrap();
        let mut integrator = AlphaIntegrator::new(constants, stepper, false);
        let problem = ConstantForcing {
            forcing: 2.0,
            n: 1,
            m: 0,
        };
        let initial = State::zero(1, 1).unwrap();
        let err = integrator
            .alpha_step(&initial, 0, &problem, &problem)
            .unwrap_err();
        assert!(matches!(err, CoreError::NumericFailure(_)));
    }

    #[test]
    fn time_stepper_rejects_non_positive_step() {
        assert!(TimeStepper::new(0.0, 0.0, 10).is_err());
        assert!(TimeStepper::new(0.0, -1.0, 10).is_err());
    }
}
