//! Shape function values at physical positions
//!
//! Each function maps a physical point back to the element's parent domain and
//! returns the nodal shape function values there. When the element geometry
//! makes the map ill-defined (zero length, zero area, zero volume, or a quad
//! whose inverse map does not converge) every factor is `NaN`; callers check
//! with [`factors_are_valid`].

use nalgebra::{Matrix2, Matrix3, Vector2};

use super::Vec3;

const GEOMETRY_TOL: f64 = 1e-12;
const INVERSE_MAP_MAX_ITER: usize = 25;

fn degenerate(n: usize) -> Vec<f64> {
    vec![f64::NAN; n]
}

/// True when every factor is finite
pub fn factors_are_valid(factors: &[f64]) -> bool {
    !factors.is_empty() && factors.iter().all(|f| f.is_finite())
}

/// Two-node line: closest-point projection onto the segment axis
pub fn line2_factors(nodes: &[Vec3], p: &Vec3) -> Vec<f64> {
    let axis = nodes[1] - nodes[0];
    let len2 = axis.norm_squared();
    let scale = nodes[0].norm_squared().max(nodes[1].norm_squared());
    if len2 <= GEOMETRY_TOL * scale {
        return degenerate(2);
    }
    let t = (p - nodes[0]).dot(&axis) / len2;
    vec![1.0 - t, t]
}

/// Three-node triangle: barycentric coordinates of the in-plane projection
pub fn barycentric_tri3(nodes: &[Vec3], p: &Vec3) -> Vec<f64> {
    let e1 = nodes[1] - nodes[0];
    let e2 = nodes[2] - nodes[0];
    let v = p - nodes[0];

    let d00 = e1.dot(&e1);
    let d01 = e1.dot(&e2);
    let d11 = e2.dot(&e2);
    let d20 = v.dot(&e1);
    let d21 = v.dot(&e2);

    let denom = d00 * d11 - d01 * d01;
    if denom.abs() <= GEOMETRY_TOL * (d00 * d11).max(GEOMETRY_TOL) {
        return degenerate(3);
    }

    let l1 = (d11 * d20 - d01 * d21) / denom;
    let l2 = (d00 * d21 - d01 * d20) / denom;
    vec![1.0 - l1 - l2, l1, l2]
}

/// Four-node tetrahedron: volume coordinates
pub fn barycentric_tet4(nodes: &[Vec3], p: &Vec3) -> Vec<f64> {
    let edges = [nodes[1] - nodes[0], nodes[2] - nodes[0], nodes[3] - nodes[0]];
    let m = Matrix3::from_columns(&edges);
    let scale = edges[0].norm() * edges[1].norm() * edges[2].norm();
    if m.determinant().abs() <= GEOMETRY_TOL * scale {
        return degenerate(4);
    }
    match m.try_inverse() {
        Some(inv) => {
            let l = inv * (p - nodes[0]);
            vec![1.0 - l[0] - l[1] - l[2], l[0], l[1], l[2]]
        }
        None => degenerate(4),
    }
}

/// Bilinear quad shape functions at natural coordinates (xi, eta)
///
/// Node order is counter-clockwise starting at (-1, -1).
pub fn quad4_shape(xi: f64, eta: f64) -> [f64; 4] {
    [
        0.25 * (1.0 - xi) * (1.0 - eta),
        0.25 * (1.0 + xi) * (1.0 - eta),
        0.25 * (1.0 + xi) * (1.0 + eta),
        0.25 * (1.0 - xi) * (1.0 + eta),
    ]
}

fn quad4_derivatives(xi: f64, eta: f64) -> ([f64; 4], [f64; 4]) {
    (
        [
            -0.25 * (1.0 - eta),
            0.25 * (1.0 - eta),
            0.25 * (1.0 + eta),
            -0.25 * (1.0 + eta),
        ],
        [
            -0.25 * (1.0 - xi),
            -0.25 * (1.0 + xi),
            0.25 * (1.0 + xi),
            0.25 * (1.0 - xi),
        ],
    )
}

/// Four-node planar quad: inverse bilinear map by Newton iteration
pub fn quad4_factors(nodes: &[Vec3], p: &Vec3) -> Vec<f64> {
    // In-plane frame anchored at node 0
    let a = nodes[1] - nodes[0];
    let b = nodes[3] - nodes[0];
    let normal = a.cross(&b);
    // |a x b|^2 against |a|^2 |b|^2 keeps the check independent of element size
    if normal.norm_squared() <= GEOMETRY_TOL * a.norm_squared() * b.norm_squared() {
        return degenerate(4);
    }
    let e1 = a.normalize();
    let e2 = normal.normalize().cross(&e1);

    let local = |x: &Vec3| {
        let d = x - nodes[0];
        Vector2::new(d.dot(&e1), d.dot(&e2))
    };
    let xy: Vec<Vector2<f64>> = nodes.iter().take(4).map(|x| local(x)).collect();
    let target = local(p);

    let mut nat = Vector2::zeros();
    for _ in 0..INVERSE_MAP_MAX_ITER {
        let n = quad4_shape(nat[0], nat[1]);
        let (dxi, deta) = quad4_derivatives(nat[0], nat[1]);

        let mut x = Vector2::zeros();
        let mut jac = Matrix2::<f64>::zeros();
        for i in 0..4 {
            x += xy[i] * n[i];
            jac[(0, 0)] += xy[i][0] * dxi[i];
            jac[(0, 1)] += xy[i][0] * deta[i];
            jac[(1, 0)] += xy[i][1] * dxi[i];
            jac[(1, 1)] += xy[i][1] * deta[i];
        }

        let col_scale = jac.column(0).norm() * jac.column(1).norm();
        if jac.determinant().abs() <= GEOMETRY_TOL * col_scale {
            return degenerate(4);
        }
        let Some(jinv) = jac.try_inverse() else {
            return degenerate(4);
        };

        let step = jinv * (x - target);
        nat -= step;
        if step.norm() < 1e-12 {
            return quad4_shape(nat[0], nat[1]).to_vec();
        }
    }

    degenerate(4)
}
