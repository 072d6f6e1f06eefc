//! Reduced-dimension J2 materials
//!
//! Every kind wraps the same 3D return mapping and differs only in which strain
//! components it exposes. Shear components are engineering strains. Kinds with
//! a stress-free direction (plane stress, plate fiber) iterate on the
//! out-of-plane normal strain until that stress component vanishes, and
//! statically condense it out of the tangent.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::ReturnMappingOptions;
use crate::error::{Diagnostic, FEAError, FEAResult};
use crate::math::{Mat, Tensor2, Tensor4, VOIGT_3D};
use crate::persistence::{as_index, as_tag, DataBuffer, Persist};
use crate::results::StressUpdate;

use super::j2::{IntegrationState, J2Parameters, J2Plasticity};

/// Stress/strain state a J2 material is used in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialKind {
    /// 11, 22, 33, 12, 23, 31
    ThreeDimensional,
    /// 11, 22, 12 with zero out-of-plane strain
    PlaneStrain,
    /// 11, 22, 33 (hoop), 12
    AxiSymmetric,
    /// 11, 22, 12 with zero out-of-plane stress
    PlaneStress,
    /// 11, 22, 12, 23, 31 with zero normal stress through the thickness
    PlateFiber,
}

const PLANE: [(usize, usize); 3] = [(0, 0), (1, 1), (0, 1)];
const AXISYMMETRIC: [(usize, usize); 4] = [(0, 0), (1, 1), (2, 2), (0, 1)];
const PLATE_FIBER: [(usize, usize); 5] = [(0, 0), (1, 1), (0, 1), (1, 2), (2, 0)];

impl MaterialKind {
    /// Tensor index pairs of the exposed components
    pub fn components(&self) -> &'static [(usize, usize)] {
        match self {
            Self::ThreeDimensional => &VOIGT_3D,
            Self::PlaneStrain | Self::PlaneStress => &PLANE,
            Self::AxiSymmetric => &AXISYMMETRIC,
            Self::PlateFiber => &PLATE_FIBER,
        }
    }

    /// Number of strain components
    pub fn order(&self) -> usize {
        self.components().len()
    }

    /// Whether sigma_33 is driven to zero
    pub fn has_free_normal(&self) -> bool {
        matches!(self, Self::PlaneStress | Self::PlateFiber)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ThreeDimensional => "ThreeDimensional",
            Self::PlaneStrain => "PlaneStrain",
            Self::AxiSymmetric => "AxiSymmetric",
            Self::PlaneStress => "PlaneStress",
            Self::PlateFiber => "PlateFiber",
        }
    }

    fn code(&self) -> i64 {
        match self {
            Self::ThreeDimensional => 0,
            Self::PlaneStrain => 1,
            Self::AxiSymmetric => 2,
            Self::PlaneStress => 3,
            Self::PlateFiber => 4,
        }
    }

    fn from_code(code: i64) -> FEAResult<Self> {
        Ok(match code {
            0 => Self::ThreeDimensional,
            1 => Self::PlaneStrain,
            2 => Self::AxiSymmetric,
            3 => Self::PlaneStress,
            4 => Self::PlateFiber,
            other => return Err(FEAError::Persistence(format!("unknown material kind {other}"))),
        })
    }
}

/// J2 material point used through a reduced strain vector
#[derive(Debug, Clone)]
pub struct J2Material {
    kind: MaterialKind,
    core: J2Plasticity,
    /// Out-of-plane normal strain for kinds with a free normal
    trial_e33: f64,
    committed_e33: f64,
}

impl J2Material {
    pub fn new(tag: i32, kind: MaterialKind, params: J2Parameters) -> FEAResult<Self> {
        Ok(Self {
            kind,
            core: J2Plasticity::new(tag, params)?,
            trial_e33: 0.0,
            committed_e33: 0.0,
        })
    }

    pub fn with_options(mut self, options: ReturnMappingOptions) -> Self {
        self.core = self.core.with_options(options);
        self
    }

    pub fn set_options(&mut self, options: ReturnMappingOptions) {
        self.core.set_options(options);
    }

    /// Fresh copy (start state) of this material in another kind
    pub fn copy_as(&self, kind: MaterialKind) -> Self {
        Self {
            kind,
            core: {
                let mut core = self.core.clone();
                core.revert_to_start();
                core
            },
            trial_e33: 0.0,
            committed_e33: 0.0,
        }
    }

    pub fn kind(&self) -> MaterialKind {
        self.kind
    }

    pub fn tag(&self) -> i32 {
        self.core.tag()
    }

    pub fn order(&self) -> usize {
        self.kind.order()
    }

    /// Underlying 3D state
    pub fn core(&self) -> &J2Plasticity {
        &self.core
    }

    pub fn state(&self) -> IntegrationState {
        self.core.state()
    }

    fn to_tensor(&self, strain: &[f64], e33: f64) -> Tensor2 {
        let mut t = Tensor2::zeros();
        for (&(i, j), &value) in self.kind.components().iter().zip(strain) {
            let v = if i == j { value } else { 0.5 * value };
            t[(i, j)] = v;
            t[(j, i)] = v;
        }
        if self.kind.has_free_normal() {
            t[(2, 2)] = e33;
        }
        t
    }

    /// Set the trial strain in this kind's component order
    pub fn set_trial_strain(&mut self, strain: &[f64], dt: f64) -> FEAResult<StressUpdate> {
        if strain.len() != self.order() {
            return Err(FEAError::DimensionMismatch {
                expected: format!("{} strain components for {}", self.order(), self.kind.name()),
                found: strain.len().to_string(),
            });
        }

        if !self.kind.has_free_normal() {
            let t = self.to_tensor(strain, 0.0);
            return Ok(self.core.set_trial_strain(&t, dt));
        }

        let opts = *self.core.options();
        let tolerance = opts.tolerance_factor * self.core.params().sigma_0;
        let mut e33 = self.trial_e33;
        let mut iterations = 0;
        loop {
            let t = self.to_tensor(strain, e33);
            let mut update = self.core.set_trial_strain(&t, dt);
            let s33 = self.core.stress()[(2, 2)];
            if s33.abs() <= tolerance {
                self.trial_e33 = e33;
                return Ok(update);
            }
            if iterations >= opts.max_iterations {
                let diag = Diagnostic::convergence(self.tag(), iterations, s33);
                diag.log();
                update.diagnostic = Some(diag);
                self.trial_e33 = e33;
                return Ok(update);
            }
            e33 -= s33 / self.core.tangent()[2][2][2][2];
            iterations += 1;
        }
    }

    /// Set the trial strain as an increment on the committed strain
    pub fn set_trial_strain_incr(&mut self, increment: &[f64], dt: f64) -> FEAResult<StressUpdate> {
        let committed = self.committed_strain();
        if increment.len() != committed.len() {
            return Err(FEAError::DimensionMismatch {
                expected: format!("{} strain components", committed.len()),
                found: increment.len().to_string(),
            });
        }
        let strain: Vec<f64> = committed.iter().zip(increment).map(|(a, b)| a + b).collect();
        self.set_trial_strain(&strain, dt)
    }

    fn extract(&self, t: &Tensor2, engineering: bool) -> Vec<f64> {
        self.kind
            .components()
            .iter()
            .map(|&(i, j)| if engineering && i != j { 2.0 * t[(i, j)] } else { t[(i, j)] })
            .collect()
    }

    pub fn stress(&self) -> Vec<f64> {
        self.extract(self.core.stress(), false)
    }

    /// Trial strain with engineering shear
    pub fn strain(&self) -> Vec<f64> {
        self.extract(self.core.strain(), true)
    }

    pub fn committed_strain(&self) -> Vec<f64> {
        self.extract(self.core.committed_strain(), true)
    }

    fn reduce(&self, c: &Tensor4) -> Mat {
        let comps = self.kind.components();
        let n = comps.len();
        let entry = |a: (usize, usize), b: (usize, usize)| c[a.0][a.1][b.0][b.1];

        let mut d = Mat::zeros(n, n);
        for (r, &a) in comps.iter().enumerate() {
            for (s, &b) in comps.iter().enumerate() {
                d[(r, s)] = entry(a, b);
            }
        }

        if self.kind.has_free_normal() {
            let zz = (2, 2);
            let d33 = entry(zz, zz);
            for (r, &a) in comps.iter().enumerate() {
                for (s, &b) in comps.iter().enumerate() {
                    d[(r, s)] -= entry(a, zz) * entry(zz, b) / d33;
                }
            }
        }
        d
    }

    /// Consistent tangent in this kind's component order
    pub fn tangent(&self) -> Mat {
        self.reduce(self.core.tangent())
    }

    pub fn initial_tangent(&self) -> Mat {
        self.reduce(&self.core.initial_tangent())
    }

    pub fn commit_state(&mut self) -> FEAResult<()> {
        self.core.commit_state()?;
        self.committed_e33 = self.trial_e33;
        Ok(())
    }

    pub fn revert_to_last_commit(&mut self) {
        self.core.revert_to_last_commit();
        self.trial_e33 = self.committed_e33;
    }

    pub fn revert_to_start(&mut self) {
        self.core.revert_to_start();
        self.trial_e33 = 0.0;
        self.committed_e33 = 0.0;
    }
}

impl fmt::Display for J2Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} J2 material", self.kind.name())?;
        write!(f, "{}", self.core)
    }
}

fn tensor_slice(t: &Tensor2) -> &[f64] {
    t.as_slice()
}

impl Persist for J2Material {
    fn send_data(&self, buffer: &mut DataBuffer) {
        let core = &self.core;
        let p = core.params();
        let o = core.options();
        buffer.put_ints("header", &[core.tag() as i64, self.kind.code(), o.max_iterations as i64]);
        buffer.put_reals(
            "parameters",
            &[p.bulk, p.shear, p.sigma_0, p.sigma_infty, p.delta, p.hardening, p.eta],
        );
        buffer.put_reals("options", &[o.tolerance_factor, o.relaxation]);
        buffer.put_reals("committed_strain", tensor_slice(core.committed_strain()));
        buffer.put_reals("committed_stress", tensor_slice(core.committed_stress()));
        buffer.put_reals("committed_plastic_strain", tensor_slice(core.committed_plastic_strain()));
        buffer.put_reals("committed_scalars", &[core.committed_hardening_variable(), self.committed_e33]);
    }

    fn recv_data(buffer: &DataBuffer) -> FEAResult<Self> {
        let header = buffer.ints_exact("header", 3)?;
        let kind = MaterialKind::from_code(header[1])?;
        let p = buffer.reals_exact("parameters", 7)?;
        let params = J2Parameters::new(p[0], p[1], p[2], p[3], p[4], p[5]).with_viscosity(p[6]);
        let o = buffer.reals_exact("options", 2)?;
        let options = ReturnMappingOptions {
            tolerance_factor: o[0],
            max_iterations: as_index(header[2], "header")?,
            relaxation: o[1],
        };

        let tensor = |name: &str| -> FEAResult<Tensor2> {
            Ok(Tensor2::from_column_slice(buffer.reals_exact(name, 9)?))
        };
        let scalars = buffer.reals_exact("committed_scalars", 2)?;

        let mut material = J2Material::new(as_tag(header[0], "header")?, kind, params)?.with_options(options);
        material.core.restore_committed(
            tensor("committed_strain")?,
            tensor("committed_stress")?,
            tensor("committed_plastic_strain")?,
            scalars[0],
        );
        material.committed_e33 = scalars[1];
        material.trial_e33 = scalars[1];
        Ok(material)
    }
}
