use crate::{
    concurrency::{par_iter_mut1, par_sort_unstable},
    floating_type_mod::FT,
    particle::Particle,
    V3,
};

/// Uniform grid over particle positions with `resolution³` cells of edge `cell_size`, centered at the origin.
///
/// Occupancy is stored as a `(cell, particle)` table sorted by cell and then particle index, so a cell
/// can hold any number of particles and the occupants of a cell are a contiguous range.
pub struct SpatialHashGrid {
    resolution: usize,
    cell_size: FT,
    entries: Vec<(u32, u32)>,
}

impl SpatialHashGrid {
    pub fn new(resolution: usize, cell_size: FT) -> Self {
        assert!(resolution > 0);
        assert!(cell_size > 0.);
        SpatialHashGrid {
            resolution,
            cell_size,
            entries: Vec::new(),
        }
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn cell_size(&self) -> FT {
        self.cell_size
    }

    pub fn num_cells(&self) -> usize {
        self.resolution * self.resolution * self.resolution
    }

    /// Integer cell coordinates, clamped to `[0, resolution - 1]` on every axis.
    pub fn cell_coords_of(&self, position: &V3) -> [i32; 3] {
        let half = (self.resolution / 2) as i64;
        let max = self.resolution as i64 - 1;
        let mut coords = [0; 3];
        for d in 0..3 {
            let c = (position[d] / self.cell_size).floor() as i64 + half;
            coords[d] = c.clamp(0, max) as i32;
        }
        coords
    }

    pub fn flatten(&self, coords: [i32; 3]) -> usize {
        let s = self.resolution;
        coords[0] as usize + coords[1] as usize * s + coords[2] as usize * s * s
    }

    pub fn cell_index_of(&self, position: &V3) -> usize {
        self.flatten(self.cell_coords_of(position))
    }

    /// Discards the previous occupancy, assigns `grid_cell` of every particle and reinserts all particles.
    pub fn rebuild(&mut self, particles: &mut [Particle]) {
        par_iter_mut1(particles, |_, p| {
            p.grid_cell = self.cell_index_of(&p.position) as u32;
        });

        self.entries.clear();
        self.entries
            .extend(particles.iter().enumerate().map(|(i, p)| (p.grid_cell, i as u32)));
        par_sort_unstable(&mut self.entries);
    }

    fn range(&self, first_cell: u32, last_cell: u32) -> &[(u32, u32)] {
        let begin = self.entries.partition_point(|&(c, _)| c < first_cell);
        let end = self.entries.partition_point(|&(c, _)| c <= last_cell);
        &self.entries[begin..end]
    }

    /// Particles that were inserted into `cell` by the last `rebuild`, in ascending index order.
    pub fn occupants(&self, cell: usize) -> impl Iterator<Item = usize> + '_ {
        self.range(cell as u32, cell as u32).iter().map(|&(_, i)| i as usize)
    }

    /// Visits the occupants of the 3x3x3 cell block around `position`: z outer, then y, then x,
    /// ascending particle index within a cell. Blocks at the grid border are clamped and every
    /// distinct cell is visited once. The querying particle itself is reported as well.
    pub fn for_each_neighbor(&self, position: &V3, mut f: impl FnMut(usize)) {
        let c = self.cell_coords_of(position);
        let max = self.resolution as i32 - 1;
        let lo = |a: i32| (a - 1).max(0);
        let hi = |a: i32| (a + 1).min(max);

        for z in lo(c[2])..=hi(c[2]) {
            for y in lo(c[1])..=hi(c[1]) {
                // a row of x cells is contiguous in the flattened index
                let first = self.flatten([lo(c[0]), y, z]) as u32;
                let last = self.flatten([hi(c[0]), y, z]) as u32;
                for &(_, j) in self.range(first, last) {
                    f(j as usize);
                }
            }
        }
    }

    /// Collects what `for_each_neighbor` visits.
    pub fn neighbors_of(&self, position: &V3) -> Vec<usize> {
        let mut result = Vec::new();
        self.for_each_neighbor(position, |j| result.push(j));
        result
    }

    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3f;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn particles_at(positions: &[V3]) -> Vec<Particle> {
        positions.iter().map(|&p| Particle::at(p)).collect()
    }

    #[test]
    fn test_cell_coordinates_are_centered_and_clamped() {
        let grid = SpatialHashGrid::new(16, 0.5);

        assert_eq!(grid.cell_coords_of(&vec3f(0., 0., 0.)), [8, 8, 8]);
        assert_eq!(grid.cell_coords_of(&vec3f(-0.1, 0.6, 1.0)), [7, 9, 10]);
        assert_eq!(grid.cell_coords_of(&vec3f(-100., 100., 3.99)), [0, 15, 15]);
        assert_eq!(grid.cell_index_of(&vec3f(0., 0., 0.)), 8 + 8 * 16 + 8 * 256);
    }

    #[test]
    fn test_all_occupants_of_a_cell_are_kept() {
        let mut grid = SpatialHashGrid::new(8, 1.0);
        let mut particles = particles_at(&[
            vec3f(0.1, 0.1, 0.1),
            vec3f(0.2, 0.3, 0.4),
            vec3f(0.9, 0.9, 0.9),
            vec3f(2.5, 0.5, 0.5),
        ]);
        grid.rebuild(&mut particles);

        let cell = grid.cell_index_of(&vec3f(0.5, 0.5, 0.5));
        assert_eq!(grid.occupants(cell).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(particles[3].grid_cell as usize, grid.cell_index_of(&vec3f(2.5, 0.5, 0.5)));
        assert_eq!(grid.num_entries(), 4);
    }

    #[test]
    fn test_nearby_particles_share_cell_with_centered_particle() {
        let cell_size = 0.04;
        let mut grid = SpatialHashGrid::new(64, cell_size);
        let mut rng = StdRng::seed_from_u64(3);

        let center = vec3f(0.5 * cell_size, 1.5 * cell_size, -2.5 * cell_size);
        let mut positions = vec![center];
        for _ in 0..50 {
            let offset = vec3f(
                rng.gen_range(-0.49..0.49),
                rng.gen_range(-0.49..0.49),
                rng.gen_range(-0.49..0.49),
            ) * cell_size;
            positions.push(center + offset);
        }
        let mut particles = particles_at(&positions);
        grid.rebuild(&mut particles);

        for p in &particles {
            assert_eq!(p.grid_cell, particles[0].grid_cell);
        }
    }

    #[test]
    fn test_neighbor_scan_order_and_border_dedup() {
        let mut grid = SpatialHashGrid::new(4, 1.0);
        // cell coordinates: position + 2
        let mut particles = particles_at(&[
            vec3f(-1.5, -1.5, -1.5), // (0,0,0)
            vec3f(-0.5, -2.0, -2.0), // (1,0,0)
            vec3f(-1.5, -0.5, -1.5), // (0,1,0)
            vec3f(-1.5, -1.5, -0.5), // (0,0,1)
            vec3f(-1.9, -1.9, -1.9), // (0,0,0)
            vec3f(0.5, 0.5, 0.5),    // (2,2,2), out of reach
        ]);
        grid.rebuild(&mut particles);

        // corner cell: the clamped block is 2x2x2, no cell may be reported twice
        let neighbors = grid.neighbors_of(&vec3f(-1.5, -1.5, -1.5));
        assert_eq!(neighbors, vec![0, 4, 1, 2, 3]);

        // out-of-range queries clamp onto the border cells
        let far = grid.neighbors_of(&vec3f(-50., -50., -50.));
        assert_eq!(far, neighbors);
    }
}
