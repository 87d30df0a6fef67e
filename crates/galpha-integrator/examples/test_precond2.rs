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
    // tiny h with a small max-iterations budget
    let stepper = TimeStepper::with_max_iterations(0.0, 1e-5, 5, 2).unwrap();
    let mut integ_pre = AlphaIntegrator::new(constants, stepper, true);
    let out_pre = integ_pre.integrate_with_outcomes(identity_state(), 3, &problem, &problem).unwrap();
    for o in &out_pre { println!("PRE converged={} iters={}", o.converged, o.iterations); }

    let stepper2 = TimeStepper::with_max_iterations(0.0, 1e-5, 5, 2).unwrap();
    let mut integ_plain = AlphaIntegrator::new(constants, stepper2, false);
    let out_plain = integ_plain.integrate_with_outcomes(identity_state(), 3, &problem, &problem).unwrap();
    for o in &out_plain { println!("PLAIN converged={} iters={}", o.converged, o.iterations); }

    let last_pre = &out_pre.last().unwrap().state;
    let last_plain = &out_plain.last().unwrap().state;
    println!("pre q = {:?}", last_pre.q);
    println!("plain q = {:?}", last_plain.q);
}
