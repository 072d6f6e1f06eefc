//! Mathematical utilities for constraint and material calculations

pub mod shape;

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

pub use shape::{
    barycentric_tet4, barycentric_tri3, factors_are_valid, line2_factors, quad4_factors,
};

pub type Mat = DMatrix<f64>;
pub type Vec = DVector<f64>;
pub type Vec3 = Vector3<f64>;

/// Second order tensor, always 3x3
pub type Tensor2 = Matrix3<f64>;

/// Fourth order tensor stored on the stack (81 components)
pub type Tensor4 = [[[[f64; 3]; 3]; 3]; 3];

/// sqrt(2/3)
pub const ROOT23: f64 = 0.816_496_580_927_726;
/// 2/3
pub const TWO3: f64 = 2.0 / 3.0;

/// Index pairs of the 6-component Voigt vector: 11, 22, 33, 12, 23, 31
pub const VOIGT_3D: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (0, 1), (1, 2), (2, 0)];

/// Kronecker delta
#[inline]
pub fn delta(i: usize, j: usize) -> f64 {
    if i == j {
        1.0
    } else {
        0.0
    }
}

/// Trace of a second order tensor
#[inline]
pub fn trace(t: &Tensor2) -> f64 {
    t[(0, 0)] + t[(1, 1)] + t[(2, 2)]
}

/// Deviatoric part: t - tr(t)/3 * I
pub fn deviator(t: &Tensor2) -> Tensor2 {
    t - Tensor2::identity() * (trace(t) / 3.0)
}

pub fn tensor4_zero() -> Tensor4 {
    [[[[0.0; 3]; 3]; 3]; 3]
}

/// I (x) I, i.e. delta_ij delta_kl
pub fn ibuni() -> Tensor4 {
    let mut t = tensor4_zero();
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                for l in 0..3 {
                    t[i][j][k][l] = delta(i, j) * delta(k, l);
                }
            }
        }
    }
    t
}

/// Symmetric deviatoric projector
///
/// IIdev_ijkl = (delta_ik delta_jl + delta_il delta_jk) / 2 - delta_ij delta_kl / 3
pub fn iidev() -> Tensor4 {
    let mut t = tensor4_zero();
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                for l in 0..3 {
                    t[i][j][k][l] = 0.5 * (delta(i, k) * delta(j, l) + delta(i, l) * delta(j, k))
                        - delta(i, j) * delta(k, l) / 3.0;
                }
            }
        }
    }
    t
}

/// Enforce T_ijkl = T_jikl = T_ijlk = T_jilk by averaging
pub fn symmetrize_minor(t: &mut Tensor4) {
    for i in 0..3 {
        for j in i..3 {
            for k in 0..3 {
                for l in k..3 {
                    let avg = 0.25 * (t[i][j][k][l] + t[j][i][k][l] + t[i][j][l][k] + t[j][i][l][k]);
                    t[i][j][k][l] = avg;
                    t[j][i][k][l] = avg;
                    t[i][j][l][k] = avg;
                    t[j][i][l][k] = avg;
                }
            }
        }
    }
}

/// C : e
#[cfg(test)]
pub(crate) fn contract(c: &Tensor4, e: &Tensor2) -> Tensor2 {
    let mut out = Tensor2::zeros();
    for i in 0..3 {
        for j in 0..3 {
            let mut sum = 0.0;
            for k in 0..3 {
                for l in 0..3 {
                    sum += c[i][j][k][l] * e[(k, l)];
                }
            }
            out[(i, j)] = sum;
        }
    }
    out
}
