use crate::{
    collider::{Collider, ColliderContact},
    concurrency::par_iter_mut1,
    floating_type_mod::FT,
    neighborhood_search::SpatialHashGrid,
    particle::Particle,
    simulation_parameters::SimulationParams,
    V3,
};

/// `v̂ * magnitude`, zero if `v` has no direction.
#[inline(always)]
fn along(v: V3, magnitude: FT) -> V3 {
    let d = v.norm();
    if d > 0. {
        v * (magnitude / d)
    } else {
        V3::zeros()
    }
}

/// Pushes a particle out of a collider it is closer to than its radius.
///
/// Outside the surface the push is directed from the contact point to the particle. Embedded or
/// exactly on the surface that direction is unreliable and the world face normal is used instead.
pub fn penetration_force(params: &SimulationParams, position: &V3, contact: &ColliderContact) -> V3 {
    if !(contact.hit.distance < contact.local_radius) {
        return V3::zeros();
    }
    let d = contact.world_distance;
    let depth = params.particle_radius - d;

    let v = position - contact.world_point;
    let n = if d > 0. {
        v.try_normalize(0.).unwrap_or(contact.world_normal)
    } else {
        contact.world_normal
    };
    n * depth * params.stiffness
}

/// Sum of all particle forces except the collider penetration, which is already in `particle.force`.
pub fn particle_force(
    params: &SimulationParams,
    grid: &SpatialHashGrid,
    colliders: &[Collider],
    particles: &[Particle],
    i: usize,
) -> V3 {
    let pi = &particles[i];
    let xi = pi.position;
    let mut force = pi.force;

    // short range repulsion keeps particles from collapsing onto each other
    let repulsion_range = params.particle_radius * 2.;
    grid.for_each_neighbor(&xi, |j| {
        if j == i {
            return;
        }
        let v = xi - particles[j].position;
        let d = v.norm();
        if d > 0. && d < repulsion_range {
            force += v * (params.repulsion / (d * d));
        }
    });

    let form_link_distance = params.form_link_distance();
    for &j in pi.links.iter() {
        let v = xi - particles[j as usize].position;
        let d = v.norm();
        force += along(v, (form_link_distance - d) * params.link_strength);
    }

    for s in pi.surface_links.iter() {
        if let Some(collider) = colliders.get(s.collider as usize) {
            let v = xi - collider.to_world(&s.point);
            let d = v.norm();
            force += along(v, (params.particle_radius - d) * params.stickyness);
        }
    }

    force += params.gravity_vector() * params.particle_mass;
    force -= pi.velocity * params.damping_factor;

    force
}

/// Writes `src` with the total force of every particle into `dst`.
pub fn accumulate_forces(
    params: &SimulationParams,
    grid: &SpatialHashGrid,
    colliders: &[Collider],
    src: &[Particle],
    dst: &mut Vec<Particle>,
) {
    dst.clear();
    dst.extend_from_slice(src);
    par_iter_mut1(dst, |i, p| {
        p.force = particle_force(params, grid, colliders, src, i);
    });
}

/// Semi-implicit Euler: velocity first, then position with the new velocity.
pub fn integrate(params: &SimulationParams, particles: &mut [Particle], dt: FT) {
    let inv_mass = 1. / params.particle_mass;
    par_iter_mut1(particles, |_, p| {
        p.velocity += p.force * (dt * inv_mass);
        p.position += p.velocity * dt;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assert_ft_approx_eq, collider::TriangleMesh, vec3f, M4};

    fn quiet_params() -> SimulationParams {
        let mut params = SimulationParams::default();
        params.grid_resolution = 32;
        params.gravity = [0., 0., 0.];
        params.damping_factor = 0.;
        params
    }

    fn forces_of(params: &SimulationParams, colliders: &[Collider], particles: &mut Vec<Particle>) -> Vec<V3> {
        let mut grid = SpatialHashGrid::new(params.grid_resolution, params.grid_cell_size());
        grid.rebuild(particles);
        let mut out = Vec::new();
        accumulate_forces(params, &grid, colliders, particles, &mut out);
        out.iter().map(|p| p.force).collect()
    }

    #[test]
    fn test_gravity_and_damping() {
        let mut params = SimulationParams::default();
        params.grid_resolution = 32;
        let mut particles = vec![Particle::at(vec3f(0., 0., 0.))];
        particles[0].velocity = vec3f(1., 0., 0.);

        let f = forces_of(&params, &[], &mut particles)[0];
        assert_ft_approx_eq(f.x, -0.99, 1e-6, || "damping".to_string());
        assert_ft_approx_eq(f.y, -0.98, 1e-6, || "gravity".to_string());
    }

    #[test]
    fn test_repulsion_is_opposite_and_equal() {
        let params = quiet_params();
        let mut particles = vec![Particle::at(vec3f(0., 0., 0.)), Particle::at(vec3f(0.02, 0., 0.))];
        let f = forces_of(&params, &[], &mut particles);

        // v * (0.005 / d²) with |v| = 0.02
        assert_ft_approx_eq(f[0].x, -0.25, 1e-4, || "repulsion".to_string());
        assert_ft_approx_eq(f[1].x, 0.25, 1e-4, || "reaction".to_string());

        let mut far = vec![Particle::at(vec3f(0., 0., 0.)), Particle::at(vec3f(0.05, 0., 0.))];
        assert_eq!(forces_of(&params, &[], &mut far)[0], V3::zeros());
    }

    #[test]
    fn test_stretched_link_pulls_together() {
        let mut params = quiet_params();
        params.repulsion = 0.;
        let mut particles = vec![Particle::at(vec3f(0., 0., 0.)), Particle::at(vec3f(0.1, 0., 0.))];
        particles[0].links.push(1);
        particles[1].links.push(0);

        let f = forces_of(&params, &[], &mut particles);
        // (0.04 - 0.1) * 2 along +x for particle 1
        assert_ft_approx_eq(f[1].x, -0.12, 1e-5, || "spring".to_string());
        assert_ft_approx_eq(f[0].x, 0.12, 1e-5, || "spring reaction".to_string());
    }

    #[test]
    fn test_surface_stick_pulls_towards_contact() {
        let params = quiet_params();
        let colliders = vec![Collider::new(TriangleMesh::plane(1.), M4::identity()).unwrap()];
        let mut particles = vec![Particle::at(vec3f(0., 0.1, 0.))];
        particles[0].surface_links.push(crate::particle::SurfaceLink {
            point: V3::zeros(),
            collider: 0,
            face: 0,
        });

        let f = forces_of(&params, &colliders, &mut particles)[0];
        assert_ft_approx_eq(f.y, (0.02 - 0.1) * 3., 1e-5, || "stick".to_string());
    }

    #[test]
    fn test_penetration_direction() {
        let params = quiet_params();
        let collider = Collider::new(TriangleMesh::plane(1.), M4::identity()).unwrap();

        let outside = vec3f(0.2, 0.005, 0.3);
        let contact = collider.contact(&outside, params.particle_radius).unwrap();
        let f = penetration_force(&params, &outside, &contact);
        assert_ft_approx_eq(f.y, (0.02 - 0.005) * 250., 1e-3, || "outside".to_string());

        let inside = vec3f(0.2, -0.01, 0.3);
        let contact = collider.contact(&inside, params.particle_radius).unwrap();
        let f = penetration_force(&params, &inside, &contact);
        assert_ft_approx_eq(f.y, (0.02 + 0.01) * 250., 1e-3, || "inside".to_string());
    }

    #[test]
    fn test_semi_implicit_euler() {
        let params = SimulationParams::default();
        let mut particles = vec![Particle::at(vec3f(0., 1., 0.))];
        particles[0].velocity = vec3f(1., 0., 0.);
        particles[0].force = vec3f(0., -0.98, 0.);

        integrate(&params, &mut particles, 0.1);
        assert_ft_approx_eq(particles[0].velocity.y, -0.98, 1e-6, || "velocity".to_string());
        assert_ft_approx_eq(particles[0].position.y, 1. - 0.098, 1e-6, || "position".to_string());
        assert_ft_approx_eq(particles[0].position.x, 0.1, 1e-6, || "drift".to_string());
    }
}
