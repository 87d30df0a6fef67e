//! End-to-end exercise of the generalized-alpha driver against the
//! heavy-top problem assembled in `galpha-dynamics`.

use galpha_dynamics::{GeneralizedForces, HeavyTopProblem, MassMatrix, State};
use galpha_integrator::{AlphaIntegrator, IntegratorConstants, TimeStepper};
use galpha_rotation::Vec3;
use nalgebra::DVector;

fn spinning_top() -> HeavyTopProblem {
    let mass = MassMatrix::from_mass_and_inertia(1.0, Vec3::new(0.2, 0.2, 0.1)).unwrap();
    let forces = GeneralizedForces::from_components(Vec3::new(0.0, 0.0, -9.81), Vec3::zero());
    HeavyTopProblem::new(mass, forces, Vec3::new(0.0, 0.0, -0.5))
}

fn identity_state() -> State {
    State::new(
        DVector::from_vec(vec![0.0, 0.0, -0.5, 1.0, 0.0, 0.0, 0.0]),
        DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 8.0]),
        DVector::zeros(6),
        DVector::zeros(6),
    )
    .unwrap()
}

#[test]
fn integrate_produces_full_length_history() {
    let problem = spinning_top();
    let constants = IntegratorConstants::default();
    let stepper = TimeStepper::new(0.0, 0.01, 20).unwrap();
    let mut integrator = AlphaIntegrator::new(constants, stepper, false);

    let history = integrator
        .integrate(identity_state(), HeavyTopProblem::CONSTRAINT_COUNT, &problem, &problem)
        .unwrap();

    assert_eq!(history.len(), 21);
    assert!((integrator.current_time() - 0.20).abs() < 1e-9);
}

#[test]
fn quaternion_block_stays_unit_through_every_accepted_step() {
    let problem = spinning_top();
    let constants = IntegratorConstants::default();
    let stepper = TimeStepper::new(0.0, 0.01, 15).unwrap();
    let mut integrator = AlphaIntegrator::new(constants, stepper, false);

    let history = integrator
        .integrate(identity_state(), HeavyTopProblem::CONSTRAINT_COUNT, &problem, &problem)
        .unwrap();

    for state in &history {
        let orientation = state.orientation();
        assert!(
            (orientation.length() - 1.0).abs() < 1e-6,
            "quaternion drifted off the unit manifold: length {}",
            orientation.length()
        );
    }
}

#[test]
fn preconditioned_and_unpreconditioned_runs_agree_closely() {
    let problem = spinning_top();
    let constants = IntegratorConstants::default();

    let stepper_plain = TimeStepper::new(0.0, 0.01, 10).unwrap();
    let mut plain = AlphaIntegrator::new(constants, stepper_plain, false);
    let plain_history = plain
        .integrate(identity_state(), HeavyTopProblem::CONSTRAINT_COUNT, &problem, &problem)
        .unwrap();

    let stepper_precond = TimeStepper::new(0.0, 0.01, 10).unwrap();
    let mut precond = AlphaIntegrator::new(constants, stepper_precond, true);
    let precond_history = precond
        .integrate(identity_state(), HeavyTopProblem::CONSTRAINT_COUNT, &problem, &problem)
        .unwrap();

    let plain_last = plain_history.last().unwrap();
    let precond_last = precond_history.last().unwrap();
    for i in 0..plain_last.q.len() {
        assert!(
            (plain_last.q[i] - precond_last.q[i]).abs() < 1e-6,
            "component {i} diverged between preconditioned and plain solves"
        );
    }
}

#[test]
fn cumulative_iteration_count_is_monotonic_and_bounded() {
    let problem = spinning_top();
    let constants = IntegratorConstants::default();
    let stepper = TimeStepper::new(0.0, 0.01, 12).unwrap();
    let max_iterations = stepper.max_iterations();
    let mut integrator = AlphaIntegrator::new(constants, stepper, false);

    let outcomes = integrator
        .integrate_with_outcomes(identity_state(), HeavyTopProblem::CONSTRAINT_COUNT, &problem, &problem)
        .unwrap();

    let mut running_total = 0usize;
    for outcome in &outcomes {
        assert!(outcome.iterations <= max_iterations);
        running_total += outcome.iterations;
    }
    assert_eq!(integrator.total_iterations(), running_total);
    assert!(integrator.total_iterations() <= 12 * max_iterations);
}
