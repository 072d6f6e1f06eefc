//! J2 plasticity material points

mod j2;
mod kinds;

pub use j2::{IntegrationState, J2Parameters, J2Plasticity};
pub use kinds::{J2Material, MaterialKind};

use rayon::prelude::*;

use crate::analysis::AnalysisOptions;
use crate::error::{Diagnostic, FEAError, FEAResult};

/// Update a batch of independent material points
///
/// `strains[i]` is the trial strain for `points[i]`. When `options` carries
/// return mapping settings they replace each point's own before the update.
/// Points that hit the local iteration cap are reported in the returned
/// diagnostics, in point order.
pub fn update_points(
    points: &mut [J2Material],
    strains: &[Vec<f64>],
    dt: f64,
    options: &AnalysisOptions,
) -> FEAResult<Vec<Diagnostic>> {
    if points.len() != strains.len() {
        return Err(FEAError::DimensionMismatch {
            expected: format!("{} strain vectors", points.len()),
            found: strains.len().to_string(),
        });
    }

    let local = options.return_mapping;
    let update = |point: &mut J2Material, strain: &Vec<f64>| {
        if let Some(local) = local {
            point.set_options(local);
        }
        point.set_trial_strain(strain, dt).map(|u| u.diagnostic)
    };

    let updates: Vec<FEAResult<Option<Diagnostic>>> = if options.use_parallel(points.len()) {
        points
            .par_iter_mut()
            .zip(strains.par_iter())
            .map(|(point, strain)| update(point, strain))
            .collect()
    } else {
        points
            .iter_mut()
            .zip(strains)
            .map(|(point, strain)| update(point, strain))
            .collect()
    };

    let mut diagnostics = Vec::new();
    for update in updates {
        if let Some(diag) = update? {
            diagnostics.push(diag);
        }
    }
    if !diagnostics.is_empty() {
        log::warn!("{} of {} material points did not converge", diagnostics.len(), points.len());
    }
    Ok(diagnostics)
}

/// Commit every point, or none if any point has no converged trial state
pub fn commit_points(points: &mut [J2Material]) -> FEAResult<()> {
    if let Some(p) = points
        .iter()
        .find(|p| p.state() != IntegrationState::Converged)
    {
        return Err(FEAError::InvalidState(format!(
            "material {}: commit requested in state {:?}",
            p.tag(),
            p.state()
        )));
    }
    points.iter_mut().try_for_each(|p| p.commit_state())
}

/// Revert every point to its last committed state
pub fn revert_points(points: &mut [J2Material]) {
    points.iter_mut().for_each(|p| p.revert_to_last_commit());
}
