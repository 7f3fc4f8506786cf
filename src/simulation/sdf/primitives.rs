use enum_dispatch::enum_dispatch;

use crate::{floating_type_mod::FT, V3};

#[enum_dispatch]
pub trait SdfPrimitiveTrait {
    /// Axis-aligned bounds `(min, max)` of the shape (not including any search margin).
    fn bounds(&self) -> (V3, V3);

    /// Signed distance from `x` to the surface, negative inside.
    fn probe(&self, x: &V3) -> FT;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: V3,
    pub radius: FT,
}

impl SdfPrimitiveTrait for Sphere {
    fn bounds(&self) -> (V3, V3) {
        let r = V3::repeat(self.radius);
        (self.center - r, self.center + r)
    }

    fn probe(&self, x: &V3) -> FT {
        (x - self.center).norm() - self.radius
    }
}

/// Segment `a`-`b` inflated by `radius`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    pub a: V3,
    pub b: V3,
    pub radius: FT,
}

impl SdfPrimitiveTrait for Capsule {
    fn bounds(&self) -> (V3, V3) {
        let r = V3::repeat(self.radius);
        (self.a.inf(&self.b) - r, self.a.sup(&self.b) + r)
    }

    fn probe(&self, x: &V3) -> FT {
        let ab = self.b - self.a;
        let ax = x - self.a;
        let len_sq = ab.norm_squared();
        let t = if len_sq > 0. {
            (ax.dot(&ab) / len_sq).clamp(0., 1.)
        } else {
            0.
        };
        (ax - ab * t).norm() - self.radius
    }
}

#[enum_dispatch(SdfPrimitiveTrait)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SdfPrimitive {
    Sphere,
    Capsule,
}

#[test]
fn test_primitive_distances() {
    use crate::vec3f;

    let sphere: SdfPrimitive = Sphere {
        center: vec3f(1., 0., 0.),
        radius: 0.5,
    }
    .into();
    assert!((sphere.probe(&vec3f(3., 0., 0.)) - 1.5).abs() < 1e-6);
    assert!((sphere.probe(&vec3f(1., 0., 0.)) + 0.5).abs() < 1e-6);

    let capsule: SdfPrimitive = Capsule {
        a: vec3f(0., 0., 0.),
        b: vec3f(0., 2., 0.),
        radius: 0.25,
    }
    .into();
    // beside the segment, past its end, and on a degenerate segment
    assert!((capsule.probe(&vec3f(1., 1., 0.)) - 0.75).abs() < 1e-6);
    assert!((capsule.probe(&vec3f(0., 3., 0.)) - 0.75).abs() < 1e-6);
    let (lo, hi) = capsule.bounds();
    assert_eq!(lo, vec3f(-0.25, -0.25, -0.25));
    assert_eq!(hi, vec3f(0.25, 2.25, 0.25));

    let dot: SdfPrimitive = Capsule {
        a: vec3f(0., 0., 0.),
        b: vec3f(0., 0., 0.),
        radius: 0.25,
    }
    .into();
    assert!((dot.probe(&vec3f(0., 0., 1.)) - 0.75).abs() < 1e-6);
}
