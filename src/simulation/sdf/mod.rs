mod primitives;
mod sdf_field;

pub use primitives::{Capsule, SdfPrimitive, SdfPrimitiveTrait, Sphere};
pub use sdf_field::SdfField;

use crate::{
    collider::Collider, concurrency::par_chunks_mut1, floating_type_mod::FT, particle::Particle,
    simulation_parameters::SimulationParams, V3,
};

/// Inclusive range of sample indices along each axis.
type CellRange = [(usize, usize); 3];

/// Rasterizes particle spheres and link capsules into an [`SdfField`] with min-blending.
///
/// Every primitive is binned into the z-slices its (margin expanded) bounds touch. The slices are
/// then filled in parallel, each one by a single task that gathers the primitives of its bin, so
/// no two tasks write the same sample.
pub struct SdfGenerator {
    primitives: Vec<SdfPrimitive>,
    ranges: Vec<CellRange>,
    slice_bins: Vec<Vec<u32>>,
}

impl SdfGenerator {
    pub fn new() -> Self {
        SdfGenerator {
            primitives: Vec::new(),
            ranges: Vec::new(),
            slice_bins: Vec::new(),
        }
    }

    pub fn primitives(&self) -> &[SdfPrimitive] {
        &self.primitives
    }

    /// Spheres for all particles, thin capsules for every particle-particle link (once per pair)
    /// and for every surface link.
    pub fn collect_primitives(&mut self, params: &SimulationParams, particles: &[Particle], colliders: &[Collider]) {
        let line_radius = params.line_radius();
        self.primitives.clear();

        for (i, p) in particles.iter().enumerate() {
            self.primitives.push(
                Sphere {
                    center: p.position,
                    radius: params.particle_radius,
                }
                .into(),
            );

            for &j in p.links.iter() {
                if (i as u32) < j {
                    self.primitives.push(
                        Capsule {
                            a: p.position,
                            b: particles[j as usize].position,
                            radius: line_radius,
                        }
                        .into(),
                    );
                }
            }

            for s in p.surface_links.iter() {
                if let Some(collider) = colliders.get(s.collider as usize) {
                    self.primitives.push(
                        Capsule {
                            a: p.position,
                            b: collider.to_world(&s.point),
                            radius: line_radius,
                        }
                        .into(),
                    );
                }
            }
        }
    }

    /// Clears `field` to its max distance and min-blends the collected primitives into it.
    pub fn rasterize(&mut self, field: &mut SdfField) {
        field.clear();

        let s = field.resolution();
        let cell_size = field.cell_size();
        let max_distance = field.max_distance();
        let origin_offset = field.origin_offset();

        // samples within max_distance of the bounds
        let to_range = |lo: FT, hi: FT| -> Option<(usize, usize)> {
            let first = ((lo - max_distance) / cell_size + origin_offset).ceil().max(0.);
            let last = ((hi + max_distance) / cell_size + origin_offset).floor().min((s - 1) as FT);
            if first > last || !first.is_finite() || !last.is_finite() {
                None
            } else {
                Some((first as usize, last as usize))
            }
        };

        self.ranges.clear();
        self.slice_bins.iter_mut().for_each(|bin| bin.clear());
        self.slice_bins.resize_with(s, Vec::new);

        for (idx, primitive) in self.primitives.iter().enumerate() {
            let (lo, hi) = primitive.bounds();
            let range = match (to_range(lo.x, hi.x), to_range(lo.y, hi.y), to_range(lo.z, hi.z)) {
                (Some(x), Some(y), Some(z)) => [x, y, z],
                _ => [(1, 0); 3],
            };
            self.ranges.push(range);

            let (z_first, z_last) = range[2];
            for z in z_first..=z_last {
                self.slice_bins[z].push(idx as u32);
            }
        }

        let primitives = &self.primitives;
        let ranges = &self.ranges;
        let slice_bins = &self.slice_bins;

        par_chunks_mut1(field.values_mut(), s * s, |z, slice| {
            for &idx in &slice_bins[z] {
                let primitive = &primitives[idx as usize];
                let [(x_first, x_last), (y_first, y_last), _] = ranges[idx as usize];
                for y in y_first..=y_last {
                    for x in x_first..=x_last {
                        let sample =
                            V3::new(x as FT - origin_offset, y as FT - origin_offset, z as FT - origin_offset) * cell_size;
                        let candidate = primitive.probe(&sample).min(max_distance);
                        let value = &mut slice[x + y * s];
                        if candidate < *value {
                            *value = candidate;
                        }
                    }
                }
            }
        });
    }

    pub fn generate(&mut self, params: &SimulationParams, particles: &[Particle], colliders: &[Collider], field: &mut SdfField) {
        self.collect_primitives(params, particles, colliders);
        self.rasterize(field);
    }
}

impl Default for SdfGenerator {
    fn default() -> Self {
        Self::new()
    }
}
