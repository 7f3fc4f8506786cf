use std::fmt::Display;

use log::{debug, info};
use num_traits::Float;

use crate::{
    bonds::{collect_link_pairs, update_surface_links, BondGraph},
    collider::Collider,
    counters::{write_report, PerformanceCounters, ValueCounters},
    error::{GooError, Result},
    floating_type_mod::FT,
    forces::{accumulate_forces, integrate},
    neighborhood_search::SpatialHashGrid,
    particle::{Particle, SurfaceLink},
    recycler::Recycler,
    sdf::{SdfField, SdfGenerator},
    simulation_parameters::{SceneConfig, SimulationParams},
    vec3f, M4, V3,
};

/// Frame deltas within this fraction of a substep still trigger the substep, so a frame of exactly
/// `n` substeps runs `n` substeps despite rounding in the accumulator.
const SUBSTEP_TOLERANCE: FT = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceReport {
    pub substeps_run: usize,
}

pub struct GooSimulation {
    params: SimulationParams,

    // ping-pong particle buffers, `particles` always holds the completed state
    particles: Vec<Particle>,
    back: Vec<Particle>,

    grid: SpatialHashGrid,
    bonds: BondGraph,
    colliders: Vec<Collider>,
    recycler: Recycler,

    sdf_generator: SdfGenerator,
    sdf: SdfField,

    accumulator: FT,
    time: FT,
    substep_count: u64,
    simulation_advanced: bool,

    pcounters: PerformanceCounters,
    vcounters: ValueCounters,
}

/// Square lattice at the spawn height: `w = floor(sqrt(n))` particles per row, one diameter apart.
pub fn lattice_positions(params: &SimulationParams, particle_count: usize) -> Vec<V3> {
    let w = ((particle_count as f64).sqrt().floor() as usize).max(1);
    let half_w = w as FT / 2.;
    let spacing = params.particle_radius * 2.;

    (0..particle_count)
        .map(|i| {
            vec3f(
                ((i % w) as FT - half_w) * spacing,
                params.spawn_height,
                ((i / w) as FT - half_w) * spacing,
            )
        })
        .collect()
}

impl GooSimulation {
    /// Places `particle_count` particles on the spawn lattice.
    pub fn initialize(params: SimulationParams, particle_count: usize, colliders: Vec<Collider>) -> Result<Self> {
        let positions = lattice_positions(&params, particle_count);
        Self::initialize_with_positions(params, &positions, colliders)
    }

    pub fn initialize_with_positions(
        params: SimulationParams,
        positions: &[V3],
        colliders: Vec<Collider>,
    ) -> Result<Self> {
        let params = params.validated()?;
        if positions.len() > u32::MAX as usize {
            return Err(GooError::InvalidParams(format!(
                "{} particles exceed the addressable number of particles",
                positions.len()
            )));
        }

        let particles: Vec<Particle> = positions.iter().map(|&p| Particle::at(p)).collect();
        let cell_size = params.grid_cell_size();

        info!(
            "initialized goo simulation: {} particles, {} colliders, {}^3 cells of size {}",
            particles.len(),
            colliders.len(),
            params.grid_resolution,
            cell_size
        );

        Ok(GooSimulation {
            back: Vec::with_capacity(particles.len()),
            grid: SpatialHashGrid::new(params.grid_resolution, cell_size),
            bonds: BondGraph::new(particles.len()),
            colliders,
            recycler: Recycler::new(params.seed),
            sdf_generator: SdfGenerator::new(),
            sdf: SdfField::new(params.grid_resolution, cell_size, params.sdf_max_distance()),
            accumulator: 0.,
            time: 0.,
            substep_count: 0,
            simulation_advanced: false,
            pcounters: PerformanceCounters::new(false),
            vcounters: ValueCounters::new(false),
            particles,
            params,
        })
    }

    /// Turns on timing of the individual passes and sampling of link counts.
    pub fn with_counters(mut self, enabled: bool) -> Self {
        self.pcounters = PerformanceCounters::new(enabled);
        self.vcounters = ValueCounters::new(enabled);
        self
    }

    /// Adds `frame_dt` to the time accumulator and runs as many fixed substeps as it holds. The
    /// remainder carries over to the next call. The distance field is regenerated if at least one
    /// substep ran.
    ///
    /// A substep runs once the accumulator reaches `dt` within `SUBSTEP_TOLERANCE`, not only when it
    /// strictly exceeds `dt`: a frame of exactly `dt` runs one substep, and one frame of `n * dt`
    /// runs the same `n` substeps as `n` frames of `dt`. The accumulator is clamped at zero after
    /// each substep, so each substep may consume up to `SUBSTEP_TOLERANCE * dt` more simulated
    /// time than the frames supplied.
    pub fn advance(&mut self, frame_dt: FT) -> AdvanceReport {
        if frame_dt > 0. && frame_dt.is_finite() {
            self.accumulator += frame_dt;
        } else {
            debug!("ignoring frame delta {}", frame_dt);
        }

        let dt = self.params.fixed_time_step;
        let mut substeps_run = 0;
        while self.accumulator >= dt * (1. - SUBSTEP_TOLERANCE) {
            self.step();
            self.accumulator = (self.accumulator - dt).max(0.);
            substeps_run += 1;
        }

        self.simulation_advanced = substeps_run > 0;
        if self.simulation_advanced {
            self.regenerate_sdf();
        }

        AdvanceReport { substeps_run }
    }

    /// One fixed substep: recycle, grid, bonds, surface bonds, forces, integration.
    pub fn step(&mut self) {
        let params = self.params;
        self.pcounters.begin("simulation-step");

        self.pcounters.begin("recycle");
        let recycled = self.recycler.recycle(&params, &mut self.particles);
        self.pcounters.end("recycle");
        if recycled > 0 {
            info!("recycled {} particles at t={:.3}s", recycled, self.time);
        }

        self.pcounters.begin("grid");
        self.grid.rebuild(&mut self.particles);
        self.pcounters.end("grid");

        self.pcounters.begin("links");
        let link_stats = self
            .bonds
            .update_links(&params, &self.grid, &mut self.particles, &mut self.back);
        self.pcounters.end("links");

        self.pcounters.begin("surface-links");
        update_surface_links(&params, &self.colliders, &mut self.particles);
        self.pcounters.end("surface-links");

        self.pcounters.begin("forces");
        accumulate_forces(&params, &self.grid, &self.colliders, &self.particles, &mut self.back);
        std::mem::swap(&mut self.particles, &mut self.back);
        self.pcounters.end("forces");

        self.pcounters.begin("integrate");
        integrate(&params, &mut self.particles, params.fixed_time_step);
        self.pcounters.end("integrate");

        self.time += params.fixed_time_step;
        self.substep_count += 1;
        self.pcounters.end("simulation-step");

        let link_count: usize = self.particles.iter().map(|p| p.link_count()).sum::<usize>() / 2;
        let surface_link_count: usize = self.particles.iter().map(|p| p.surface_link_count()).sum();
        self.vcounters.add_value("link-count", link_count as FT);
        self.vcounters.add_value("surface-link-count", surface_link_count as FT);
        self.vcounters.add_value("recycled", recycled as FT);
        self.vcounters.add_value("links-formed", link_stats.formed as FT);
        self.vcounters.add_value("links-broken", link_stats.broken as FT);

        debug!(
            "substep {}: {} links (+{} -{}), {} surface links",
            self.substep_count, link_count, link_stats.formed, link_stats.broken, surface_link_count
        );
    }

    pub fn regenerate_sdf(&mut self) {
        self.pcounters.begin("sdf");
        self.sdf_generator
            .generate(&self.params, &self.particles, &self.colliders, &mut self.sdf);
        self.pcounters.end("sdf");
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn positions(&self) -> Vec<V3> {
        self.particles.iter().map(|p| p.position).collect()
    }

    pub fn velocities(&self) -> Vec<V3> {
        self.particles.iter().map(|p| p.velocity).collect()
    }

    /// Particle-particle links as `(a, b)` with `a < b`, sorted.
    pub fn links(&self) -> Vec<(u32, u32)> {
        collect_link_pairs(&self.particles)
    }

    /// `(particle, link)` for every surface link.
    pub fn surface_links(&self) -> Vec<(u32, SurfaceLink)> {
        self.particles
            .iter()
            .enumerate()
            .flat_map(|(i, p)| p.surface_links.iter().map(move |s| (i as u32, *s)))
            .collect()
    }

    /// `(particle position, world contact point)` for every surface link.
    pub fn surface_link_world_points(&self) -> Vec<(V3, V3)> {
        self.particles
            .iter()
            .flat_map(|p| {
                p.surface_links.iter().filter_map(move |s| {
                    self.colliders
                        .get(s.collider as usize)
                        .map(|c| (p.position, c.to_world(&s.point)))
                })
            })
            .collect()
    }

    pub fn sdf(&self) -> &SdfField {
        &self.sdf
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    /// Whether the last `advance` ran at least one substep (and regenerated the distance field).
    pub fn simulation_advanced(&self) -> bool {
        self.simulation_advanced
    }

    /// Simulated time, a multiple of the fixed substep.
    pub fn time(&self) -> FT {
        self.time
    }

    pub fn substep_count(&self) -> u64 {
        self.substep_count
    }

    pub fn set_collider_transform(&mut self, collider_id: usize, transform: M4) -> Result<()> {
        self.colliders
            .get_mut(collider_id)
            .ok_or(GooError::UnknownCollider(collider_id))?
            .set_transform(transform)
    }

    /// Injects position and velocity between `advance` calls. Links are left to the bond passes;
    /// an out-of-range index is ignored.
    pub fn set_particle_state(&mut self, i: usize, position: V3, velocity: V3) {
        if let Some(p) = self.particles.get_mut(i) {
            p.position = position;
            p.velocity = velocity;
        }
    }

    pub fn total_kinetic_energy(&self) -> FT {
        self.particles
            .iter()
            .map(|p| p.kinetic_energy(self.params.particle_mass))
            .sum()
    }
}

pub fn init_goo_sim(params: SimulationParams, scene: &SceneConfig, counters_enabled: bool) -> Result<GooSimulation> {
    let colliders = scene.build_colliders()?;
    Ok(GooSimulation::initialize(params, scene.particle_count, colliders)?.with_counters(counters_enabled))
}

pub fn write_statistics(goo_simulation: &GooSimulation) -> String {
    write_report(&goo_simulation.pcounters, &goo_simulation.vcounters)
}

pub fn is_ft_approx_eq<FT: Float>(a: FT, b: FT, tolerance: FT) -> bool {
    assert!(!a.is_nan());
    assert!(!b.is_nan());
    b <= a + tolerance && b >= a - tolerance
}

pub fn assert_ft_approx_eq<FT: Float + Display>(a: FT, b: FT, tolerance: FT, s: impl FnOnce() -> String) {
    if !is_ft_approx_eq(a, b, tolerance) {
        panic!(
            "{} value not equal with a tolerance of {}:\n\ta={}\n\tb={}\n",
            s(),
            tolerance,
            a,
            b
        );
    }
}
