use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    bonds::detach_particle, floating_type_mod::{FT, TAU}, particle::Particle,
    simulation_parameters::SimulationParams, vec3f, V3,
};

/// Respawns particles that fell below the floor. Owns the random state so a seeded simulation
/// replays identically.
pub struct Recycler {
    rng: StdRng,
}

impl Recycler {
    pub fn new(seed: u64) -> Self {
        Recycler {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniformly distributed point in the disk of the given radius around the origin of the xz-plane.
    fn sample_disk(&mut self, radius: FT) -> (FT, FT) {
        let r = radius * self.rng.gen::<FT>().sqrt();
        let theta = TAU * self.rng.gen::<FT>();
        (r * theta.cos(), r * theta.sin())
    }

    /// Returns the number of recycled particles.
    ///
    /// The `k`-th recycled particle of a pass is placed `(k + jitter)` particle diameters above the
    /// spawn height so a batch does not respawn on top of itself.
    pub fn recycle(&mut self, params: &SimulationParams, particles: &mut [Particle]) -> usize {
        let recycled: Vec<usize> = particles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.position.y < params.recycle_floor)
            .map(|(i, _)| i)
            .collect();

        let spawn_radius = params.spawn_radius();
        let diameter = params.particle_radius * 2.;

        for (k, &i) in recycled.iter().enumerate() {
            detach_particle(particles, i);

            let (x, z) = self.sample_disk(spawn_radius);
            let jitter: FT = self.rng.gen();
            let y = params.spawn_height + (k as FT + jitter) * diameter;

            let p = &mut particles[i];
            p.position = vec3f(x, y, z);
            p.velocity = V3::zeros();
            p.force = V3::zeros();
        }

        recycled.len()
    }
}
