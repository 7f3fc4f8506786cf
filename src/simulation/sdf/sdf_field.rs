use crate::{floating_type_mod::FT, vec3f, V3};

/// Distance samples on a `resolution³` lattice. Sample `(x, y, z)` is stored at
/// `x + y * resolution + z * resolution²` and sits at world position
/// `(index - resolution / 2) * cell_size`.
#[derive(Debug, Clone)]
pub struct SdfField {
    resolution: usize,
    cell_size: FT,
    max_distance: FT,
    values: Vec<FT>,
}

impl SdfField {
    pub fn new(resolution: usize, cell_size: FT, max_distance: FT) -> Self {
        SdfField {
            resolution,
            cell_size,
            max_distance,
            values: vec![max_distance; resolution * resolution * resolution],
        }
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn cell_size(&self) -> FT {
        self.cell_size
    }

    /// Value of every sample no shape is close to.
    pub fn max_distance(&self) -> FT {
        self.max_distance
    }

    pub fn values(&self) -> &[FT] {
        &self.values
    }

    pub(super) fn values_mut(&mut self) -> &mut [FT] {
        &mut self.values
    }

    pub fn clear(&mut self) {
        let max_distance = self.max_distance;
        self.values.iter_mut().for_each(|v| *v = max_distance);
    }

    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.resolution + z * self.resolution * self.resolution
    }

    pub fn value_at(&self, x: usize, y: usize, z: usize) -> FT {
        self.values[self.index(x, y, z)]
    }

    pub fn origin_offset(&self) -> FT {
        (self.resolution / 2) as FT
    }

    pub fn sample_position(&self, x: usize, y: usize, z: usize) -> V3 {
        let o = self.origin_offset();
        vec3f(x as FT - o, y as FT - o, z as FT - o) * self.cell_size
    }

    /// Trilinear interpolation; positions outside the lattice are clamped onto it.
    pub fn sample(&self, world: &V3) -> FT {
        let s = self.resolution;
        if s == 1 {
            return self.values[0];
        }

        let mut base = [0usize; 3];
        let mut t = [0. as FT; 3];
        for d in 0..3 {
            let g = (world[d] / self.cell_size + self.origin_offset()).clamp(0., (s - 1) as FT);
            let i = (g.floor() as usize).min(s - 2);
            base[d] = i;
            t[d] = g - i as FT;
        }

        let v = |dx: usize, dy: usize, dz: usize| self.value_at(base[0] + dx, base[1] + dy, base[2] + dz);
        let lerp = |a: FT, b: FT, t: FT| a + (b - a) * t;

        let x00 = lerp(v(0, 0, 0), v(1, 0, 0), t[0]);
        let x10 = lerp(v(0, 1, 0), v(1, 1, 0), t[0]);
        let x01 = lerp(v(0, 0, 1), v(1, 0, 1), t[0]);
        let x11 = lerp(v(0, 1, 1), v(1, 1, 1), t[0]);
        let y0 = lerp(x00, x10, t[1]);
        let y1 = lerp(x01, x11, t[1]);
        lerp(y0, y1, t[2])
    }

    /**
     * This gradient is NOT normalized.
     */
    pub fn finite_diff_gradient(&self, x: &V3, eps: FT) -> V3 {
        let inv_2eps = 1. / (2. * eps);

        let iter = (0..3).map(|i| {
            let mut xp = *x;
            let mut xn = *x;
            xp[i] += eps;
            xn[i] -= eps;
            (self.sample(&xp) - self.sample(&xn)) * inv_2eps
        });

        V3::from_iterator(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_ft_approx_eq;

    #[test]
    fn test_lattice_layout() {
        let field = SdfField::new(4, 0.5, 2.);
        assert_eq!(field.values().len(), 64);
        assert_eq!(field.index(1, 2, 3), 1 + 8 + 48);
        assert_eq!(field.sample_position(2, 2, 2), V3::zeros());
        assert_eq!(field.sample_position(0, 3, 2), vec3f(-1., 0.5, 0.));
        assert!(field.values().iter().all(|&v| v == 2.));
    }

    #[test]
    fn test_trilinear_sampling_of_linear_field() {
        let mut field = SdfField::new(8, 0.25, 10.);
        for z in 0..8 {
            for y in 0..8 {
                for x in 0..8 {
                    let p = field.sample_position(x, y, z);
                    let i = field.index(x, y, z);
                    field.values_mut()[i] = p.x + 2. * p.y - p.z;
                }
            }
        }

        let q = vec3f(0.1, -0.3, 0.45);
        assert_ft_approx_eq(field.sample(&q), 0.1 - 0.6 - 0.45, 1e-5, || "trilinear".to_string());

        let g = field.finite_diff_gradient(&q, 0.05);
        assert_ft_approx_eq(g.x, 1., 1e-3, || "grad x".to_string());
        assert_ft_approx_eq(g.y, 2., 1e-3, || "grad y".to_string());
        assert_ft_approx_eq(g.z, -1., 1e-3, || "grad z".to_string());
    }
}
