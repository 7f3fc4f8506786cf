use crate::{
    collider::Collider,
    concurrency::par_iter_mut1,
    forces::penetration_force,
    neighborhood_search::SpatialHashGrid,
    particle::{Particle, SurfaceLink},
    simulation_parameters::SimulationParams,
    V3,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkUpdateStats {
    pub broken: usize,
    pub formed: usize,
}

/// Maintains the particle-particle bonds. Owns the candidate lists of the formation pass so they
/// are not reallocated every substep.
pub struct BondGraph {
    candidates: Vec<Vec<u32>>,
}

impl BondGraph {
    pub fn new(num_particles: usize) -> Self {
        BondGraph {
            candidates: (0..num_particles).map(|_| Vec::new()).collect(),
        }
    }

    /// Breaks overstretched links and forms new ones. Reads `front`, leaves the result in `front`
    /// (`back` is scratch).
    pub fn update_links(
        &mut self,
        params: &SimulationParams,
        grid: &SpatialHashGrid,
        front: &mut Vec<Particle>,
        back: &mut Vec<Particle>,
    ) -> LinkUpdateStats {
        let links_before: usize = front.iter().map(|p| p.link_count()).sum();
        break_links(params, front, back);
        std::mem::swap(front, back);
        let links_after_break: usize = front.iter().map(|p| p.link_count()).sum();

        let formed = self.form_links(params, grid, front);

        LinkUpdateStats {
            broken: (links_before - links_after_break) / 2,
            formed,
        }
    }

    /// Links every particle pair with `0 < d <= form_link_distance` where both particles have
    /// spare capacity. Candidates are collected in parallel, the commit runs in ascending particle
    /// index and visits the candidates of a particle in grid scan order, so the outcome does not
    /// depend on scheduling. Returns the number of links formed.
    pub fn form_links(&mut self, params: &SimulationParams, grid: &SpatialHashGrid, particles: &mut [Particle]) -> usize {
        let capacity = params.link_capacity;
        let form_link_distance = params.form_link_distance();

        if self.candidates.len() != particles.len() {
            self.candidates.resize_with(particles.len(), Vec::new);
        }

        {
            let particles: &[Particle] = particles;
            par_iter_mut1(&mut self.candidates, |i, candidates| {
                candidates.clear();
                let pi = &particles[i];
                if pi.link_count() >= capacity {
                    return;
                }
                grid.for_each_neighbor(&pi.position, |j| {
                    // every unordered pair is proposed by its lower index only
                    if j <= i {
                        return;
                    }
                    let pj = &particles[j];
                    let d = (pi.position - pj.position).norm();
                    if d > 0. && d <= form_link_distance && pj.link_count() < capacity && !pi.is_linked_to(j as u32) {
                        candidates.push(j as u32);
                    }
                });
            });
        }

        let mut formed = 0;
        for i in 0..particles.len() {
            for &j in &self.candidates[i] {
                let j = j as usize;
                if particles[i].link_count() >= capacity {
                    break;
                }
                if particles[j].link_count() >= capacity || particles[i].is_linked_to(j as u32) {
                    continue;
                }
                particles[i].links.push(j as u32);
                particles[j].links.push(i as u32);
                formed += 1;
            }
        }
        formed
    }
}

/// Copies `src` into `dst` without the links longer than `break_link_distance`. The distance is
/// symmetric, so both endpoints drop a link in the same pass.
pub fn break_links(params: &SimulationParams, src: &[Particle], dst: &mut Vec<Particle>) {
    let break_link_distance = params.break_link_distance();
    dst.clear();
    dst.extend_from_slice(src);

    par_iter_mut1(dst, |i, p| {
        let xi = src[i].position;
        p.links
            .retain(|&j| (src[j as usize].position - xi).norm() <= break_link_distance);
    });
}

/// Breaks and forms particle-surface links. The nearest contact of every collider is also turned
/// into the collider penetration force, which starts the `force` accumulation of the substep.
pub fn update_surface_links(params: &SimulationParams, colliders: &[Collider], particles: &mut [Particle]) {
    let break_link_distance = params.break_link_distance();
    let capacity = params.surface_link_capacity;

    par_iter_mut1(particles, |_, p| {
        let position = p.position;
        p.surface_links.retain(|s| match colliders.get(s.collider as usize) {
            Some(collider) => (collider.to_world(&s.point) - position).norm() <= break_link_distance,
            None => false,
        });

        p.force = V3::zeros();
        for (c, collider) in colliders.iter().enumerate() {
            let contact = match collider.contact(&position, params.particle_radius) {
                Some(contact) => contact,
                None => continue,
            };

            let hit = contact.hit;
            if hit.distance.abs() < contact.local_radius
                && p.surface_link_count() < capacity
                && !p.has_surface_link(c as u32, hit.face)
            {
                p.surface_links.push(SurfaceLink {
                    point: hit.point,
                    collider: c as u32,
                    face: hit.face,
                });
            }

            p.force += penetration_force(params, &position, &contact);
        }
    });
}

/// Unlinks `i` from all of its partners and removes its surface links.
pub fn detach_particle(particles: &mut [Particle], i: usize) {
    let partners = particles[i].links;
    for &j in partners.iter() {
        particles[j as usize].links.retain(|&l| l as usize != i);
    }
    particles[i].links.clear();
    particles[i].surface_links.clear();
}

/// Canonical `(a, b)` pairs with `a < b` of all particle-particle links.
pub fn collect_link_pairs(particles: &[Particle]) -> Vec<(u32, u32)> {
    let mut pairs = Vec::new();
    for (i, p) in particles.iter().enumerate() {
        for &j in p.links.iter() {
            if (i as u32) < j {
                pairs.push((i as u32, j));
            }
        }
    }
    pairs.sort_unstable();
    pairs
}
