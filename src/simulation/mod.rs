pub mod bonds;
pub mod collider;
pub mod concurrency;
pub mod counters;
pub mod error;
pub mod forces;
pub mod neighborhood_search;
pub mod particle;
pub mod recycler;
pub mod sdf;
pub mod simulation_parameters;
pub mod simulation;

#[cfg(feature = "double-precision")]
pub mod floating_type_mod {
    pub type FT = f64;
    pub use std::f64::consts::{PI, TAU};
}

#[cfg(not(feature = "double-precision"))]
pub mod floating_type_mod {
    pub type FT = f32;
    pub use std::f32::consts::{PI, TAU};
}

use floating_type_mod::FT;

use nalgebra::{Matrix4, SVector};

#[allow(dead_code)]
pub type V<FT, const D: usize> = SVector<FT, D>;

pub type VF<const D: usize> = V<FT, D>;

pub type V3 = V<FT, 3>;
pub type V4 = V<FT, 4>;

/// Homogeneous affine transform (rotation, translation and non-uniform scale).
pub type M4 = Matrix4<FT>;

pub fn vec3f(x: FT, y: FT, z: FT) -> V<FT, 3> {
    [x, y, z].into()
}

/// Applies `m` to a point (w = 1).
pub fn transform_point(m: &M4, p: &V3) -> V3 {
    let r: V4 = m * V4::new(p.x, p.y, p.z, 1.);
    vec3f(r.x, r.y, r.z)
}

/// Applies `m` to a direction (w = 0), ignoring translation.
pub fn transform_vector(m: &M4, v: &V3) -> V3 {
    let r: V4 = m * V4::new(v.x, v.y, v.z, 0.);
    vec3f(r.x, r.y, r.z)
}

/// Length of the longest basis vector of the linear part of `m`.
pub fn max_axis_scale(m: &M4) -> FT {
    (0..3)
        .map(|c| vec3f(m[(0, c)], m[(1, c)], m[(2, c)]).norm())
        .fold(0., FT::max)
}

pub use simulation::*;
