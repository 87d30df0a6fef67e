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

fn main() {
    let problem = spinning_top();
    let constants = IntegratorConstants::default();
    let stepper = TimeStepper::new(0.0, 0.01, 10).unwrap();
    let mut integrator = AlphaIntegrator::new(constants, stepper, true);
    let outcomes = integrator.integrate_with_outcomes(identity_state(), 3, &problem, &problem).unwrap();
    for o in &outcomes {
        println!("converged={} iters={}", o.converged, o.iterations);
    }
}
