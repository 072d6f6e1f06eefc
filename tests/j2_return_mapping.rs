use approx::assert_relative_eq;
use fea_core::materials;
use fea_core::math::{deviator, Tensor2, ROOT23};
use fea_core::prelude::*;

fn perfectly_plastic() -> J2Parameters {
    J2Parameters::new(1e4, 1e4, 200.0, 400.0, 0.0, 0.0)
}

fn uniaxial(e11: f64) -> Tensor2 {
    let mut t = Tensor2::zeros();
    t[(0, 0)] = e11;
    t
}

#[test]
fn uniaxial_strain_returns_to_initial_surface() {
    let mut point = J2Plasticity::new(1, perfectly_plastic()).unwrap();
    let update = point.set_trial_strain(&uniaxial(0.05), 0.0);

    assert!(update.yielded);
    assert!(update.gamma > 0.0);
    assert!(update.converged());
    assert_eq!(point.state(), IntegrationState::Converged);

    let s_norm = deviator(point.stress()).norm();
    assert_relative_eq!(s_norm, ROOT23 * 200.0, max_relative = 1e-6);
    // Volumetric response stays elastic (pressure is positive in compression)
    assert_relative_eq!(point.pressure(), -1e4 * 0.05, max_relative = 1e-12);
}

#[test]
fn elastic_step_leaves_internal_state() {
    let mut point = J2Plasticity::new(1, J2Parameters::steel()).unwrap();
    point.set_trial_strain(&uniaxial(0.01), 0.0);
    point.commit_state().unwrap();
    let xi = point.committed_hardening_variable();
    let plastic = *point.committed_plastic_strain();

    // Small unloading step stays inside the surface
    let update = point.set_trial_strain(&uniaxial(0.0099), 0.0);
    assert!(!update.yielded);
    assert_eq!(point.hardening_variable(), xi);
    assert_eq!(point.plastic_strain(), &plastic);
    assert!(point.yield_function() <= 0.0);
}

#[test]
fn trial_on_updated_surface_with_hardening() {
    let params = J2Parameters::steel();
    let mut point = J2Plasticity::new(1, params).unwrap();
    let mut strain = Tensor2::zeros();
    strain[(0, 0)] = 0.004;
    strain[(1, 1)] = -0.001;
    strain[(0, 1)] = 0.002;
    strain[(1, 0)] = 0.002;

    let update = point.set_trial_strain(&strain, 0.0);
    assert!(update.yielded);
    let s_norm = deviator(point.stress()).norm();
    assert_relative_eq!(
        s_norm,
        ROOT23 * params.q(point.hardening_variable()),
        max_relative = 1e-6
    );
}

#[test]
fn hardening_never_decreases_across_commits() {
    let mut point = J2Material::new(1, MaterialKind::ThreeDimensional, J2Parameters::steel()).unwrap();
    let history = [0.001, 0.003, 0.006, 0.002, -0.004, -0.001, 0.008, 0.0];

    let mut last = 0.0;
    for e in history {
        point
            .set_trial_strain(&[e, -0.3 * e, -0.3 * e, 0.2 * e, 0.0, 0.0], 0.0)
            .unwrap();
        point.commit_state().unwrap();
        let xi = point.core().committed_hardening_variable();
        assert!(xi >= last);
        last = xi;
    }
    assert!(last > 0.0);
}

#[test]
fn revert_to_start_then_zero_strain_gives_zero_state() {
    let mut point = J2Plasticity::new(1, J2Parameters::steel()).unwrap();
    point.set_trial_strain(&uniaxial(0.02), 0.0);
    point.commit_state().unwrap();

    point.revert_to_start();
    point.set_trial_strain(&Tensor2::zeros(), 0.0);
    point.commit_state().unwrap();

    assert_eq!(point.committed_stress(), &Tensor2::zeros());
    assert_eq!(point.committed_strain(), &Tensor2::zeros());
    assert_eq!(point.committed_plastic_strain(), &Tensor2::zeros());
    assert_eq!(point.committed_hardening_variable(), 0.0);
}

#[test]
fn revert_to_last_commit_discards_trial() {
    let mut point = J2Plasticity::new(1, J2Parameters::steel()).unwrap();
    point.set_trial_strain(&uniaxial(0.005), 0.0);
    point.commit_state().unwrap();
    let stress = *point.committed_stress();

    point.set_trial_strain(&uniaxial(0.05), 0.0);
    point.revert_to_last_commit();
    assert_eq!(point.stress(), &stress);
    assert_eq!(point.state(), IntegrationState::Committed);

    // Same trial after revert gives the same answer
    let a = point.set_trial_strain(&uniaxial(0.05), 0.0);
    let first = *point.stress();
    point.revert_to_last_commit();
    let b = point.set_trial_strain(&uniaxial(0.05), 0.0);
    assert_eq!(a.gamma, b.gamma);
    assert_eq!(point.stress(), &first);
}

#[test]
fn commit_without_trial_is_rejected() {
    let mut point = J2Plasticity::new(1, J2Parameters::steel()).unwrap();
    let err = point.commit_state().unwrap_err();
    assert!(matches!(err, FEAError::InvalidState(_)));
}

#[test]
fn iteration_cap_is_reported_not_fatal() {
    let params = J2Parameters::new(1e4, 1e4, 200.0, 400.0, 50.0, 0.0);
    let mut points = vec![
        J2Material::new(1, MaterialKind::ThreeDimensional, params).unwrap(),
        J2Material::new(2, MaterialKind::ThreeDimensional, params).unwrap(),
    ];
    let strains = vec![vec![0.0; 6], vec![0.05, 0.0, 0.0, 0.0, 0.0, 0.0]];

    let options = AnalysisOptions::serial().with_max_iterations(1);
    let diagnostics = materials::update_points(&mut points, &strains, 0.0, &options).unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].tag, 2);
    assert!(matches!(
        diagnostics[0].kind,
        DiagnosticKind::ConvergenceWarning { .. }
    ));
    assert!(points[1].stress().iter().all(|s| s.is_finite()));
    materials::commit_points(&mut points).unwrap();
}

#[test]
fn per_point_settings_survive_batches_without_override() {
    let params = J2Parameters::new(1e4, 1e4, 200.0, 400.0, 50.0, 0.0);
    let capped = ReturnMappingOptions {
        max_iterations: 1,
        ..ReturnMappingOptions::default()
    };
    let mut points = vec![J2Material::new(3, MaterialKind::ThreeDimensional, params)
        .unwrap()
        .with_options(capped)];
    let strains = vec![vec![0.05, 0.0, 0.0, 0.0, 0.0, 0.0]];

    let diagnostics =
        materials::update_points(&mut points, &strains, 0.0, &AnalysisOptions::serial()).unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(points[0].core().options().max_iterations, 1);
}

#[test]
fn viscosity_stiffens_the_response() {
    let rate_independent = perfectly_plastic();
    let viscous = perfectly_plastic().with_viscosity(10.0);

    let mut a = J2Plasticity::new(1, rate_independent).unwrap();
    let mut b = J2Plasticity::new(2, viscous).unwrap();
    a.set_trial_strain(&uniaxial(0.05), 0.1);
    b.set_trial_strain(&uniaxial(0.05), 0.1);

    assert!(b.gamma() < a.gamma());
    assert!(b.von_mises_stress() > a.von_mises_stress());
}

#[test]
fn reduced_kinds_share_the_3d_response() {
    let params = J2Parameters::steel();
    let mut full = J2Material::new(1, MaterialKind::ThreeDimensional, params).unwrap();
    let mut plane = J2Material::new(2, MaterialKind::PlaneStrain, params).unwrap();
    let mut axi = full.copy_as(MaterialKind::AxiSymmetric);

    full.set_trial_strain(&[0.004, -0.001, 0.0, 0.003, 0.0, 0.0], 0.0).unwrap();
    plane.set_trial_strain(&[0.004, -0.001, 0.003], 0.0).unwrap();
    axi.set_trial_strain(&[0.004, -0.001, 0.0, 0.003], 0.0).unwrap();

    let s = full.stress();
    let p = plane.stress();
    let x = axi.stress();
    assert_relative_eq!(s[0], p[0], epsilon = 1e-9);
    assert_relative_eq!(s[1], p[1], epsilon = 1e-9);
    assert_relative_eq!(s[3], p[2], epsilon = 1e-9);
    assert_relative_eq!(s[2], x[2], epsilon = 1e-9);
    assert_relative_eq!(s[3], x[3], epsilon = 1e-9);
}

#[test]
fn material_state_persists_through_channel() {
    let mut point = J2Material::new(4, MaterialKind::PlateFiber, J2Parameters::steel()).unwrap();
    point
        .set_trial_strain(&[0.006, -0.002, 0.001, 0.0005, 0.0], 0.0)
        .unwrap();
    point.commit_state().unwrap();

    let mut channel = MemoryChannel::new();
    point.send_self(11, &mut channel).unwrap();
    let mut back = J2Material::recv_self(11, &channel).unwrap();

    assert_eq!(back.kind(), MaterialKind::PlateFiber);
    assert_eq!(back.stress(), point.stress());
    assert_eq!(
        back.core().committed_hardening_variable(),
        point.core().committed_hardening_variable()
    );

    // Both continue identically from the restored state
    let next = [0.008, -0.002, 0.001, 0.0005, 0.0];
    point.set_trial_strain(&next, 0.0).unwrap();
    back.set_trial_strain(&next, 0.0).unwrap();
    for (a, b) in point.stress().iter().zip(back.stress()) {
        assert_relative_eq!(*a, b, epsilon = 1e-9);
    }
}
