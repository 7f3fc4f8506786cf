use std::{collections::BTreeMap, path::Path};

use log::warn;
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{
    collider::{Collider, TriangleMesh},
    error::{GooError, Result},
    floating_type_mod::FT,
    particle::MAX_LINKS,
    vec3f, M4, V3,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub particle_radius: FT,
    pub particle_mass: FT,
    pub gravity: [FT; 3],

    // force coefficients
    pub stiffness: FT,
    pub link_strength: FT,
    pub stickyness: FT,
    pub repulsion: FT,
    pub damping_factor: FT,

    // given in "number of particle radiuses"
    pub form_link_multiplier: FT,
    // given in "number of form link distances"
    pub break_link_multiplier: FT,
    pub link_capacity: usize,
    pub surface_link_capacity: usize,

    pub fixed_time_step: FT,

    /// cells per axis, shared by the particle grid and the distance field
    pub grid_resolution: usize,
    /// defaults to the particle diameter
    pub grid_cell_size: Option<FT>,

    // given in "number of particle radiuses"
    pub line_radius_factor: FT,
    // given in "number of grid cells"
    pub sdf_max_distance_cells: FT,

    pub recycle_floor: FT,
    pub spawn_height: FT,
    /// defaults to 32 particle radiuses
    pub spawn_radius: Option<FT>,
    pub seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            particle_radius: 0.02,
            particle_mass: 0.1,
            gravity: [0., -9.8, 0.],
            stiffness: 250.,
            link_strength: 2.,
            stickyness: 3.,
            repulsion: 0.005,
            damping_factor: 0.99,
            form_link_multiplier: 2.,
            break_link_multiplier: 8.,
            link_capacity: MAX_LINKS,
            surface_link_capacity: MAX_LINKS,
            fixed_time_step: 1. / 60.,
            grid_resolution: 256,
            grid_cell_size: None,
            line_radius_factor: 0.25,
            sdf_max_distance_cells: 4.,
            recycle_floor: -2.,
            spawn_height: 4.,
            spawn_radius: None,
            seed: 0,
        }
    }
}

impl SimulationParams {
    pub fn gravity_vector(&self) -> V3 {
        vec3f(self.gravity[0], self.gravity[1], self.gravity[2])
    }

    pub fn form_link_distance(&self) -> FT {
        self.particle_radius * self.form_link_multiplier
    }

    pub fn break_link_distance(&self) -> FT {
        self.form_link_distance() * self.break_link_multiplier
    }

    pub fn grid_cell_size(&self) -> FT {
        self.grid_cell_size.unwrap_or(self.particle_radius * 2.)
    }

    pub fn sdf_max_distance(&self) -> FT {
        self.grid_cell_size() * self.sdf_max_distance_cells
    }

    pub fn line_radius(&self) -> FT {
        self.particle_radius * self.line_radius_factor
    }

    pub fn spawn_radius(&self) -> FT {
        self.spawn_radius.unwrap_or(self.particle_radius * 32.)
    }

    /// Longest distance at which two particles still interact (link formation or repulsion).
    pub fn interaction_distance(&self) -> FT {
        self.form_link_distance().max(2. * self.particle_radius)
    }

    /// The 3x3x3 grid scan only sees partners up to one cell size away.
    pub fn neighborhood_covers_interactions(&self) -> bool {
        self.interaction_distance() <= self.grid_cell_size()
    }

    /// Checks the parameters a simulation cannot run with and clamps the ones it can run with
    /// after adjustment.
    pub fn validated(mut self) -> Result<Self> {
        let positive = [
            ("particle_radius", self.particle_radius),
            ("particle_mass", self.particle_mass),
            ("fixed_time_step", self.fixed_time_step),
            ("grid_cell_size", self.grid_cell_size()),
        ];
        for (name, value) in positive {
            if !(value > 0.) || !value.is_finite() {
                return Err(GooError::InvalidParams(format!("{} must be positive, got {}", name, value)));
            }
        }

        if self.grid_resolution == 0 {
            return Err(GooError::InvalidParams("grid_resolution must not be zero".to_string()));
        }
        // cell ids are stored as u32
        let num_cells = (self.grid_resolution as u128).pow(3);
        if num_cells > u32::MAX as u128 {
            return Err(GooError::InvalidParams(format!(
                "grid_resolution {} exceeds the addressable number of cells",
                self.grid_resolution
            )));
        }

        if self.link_capacity > MAX_LINKS {
            warn!(
                "link_capacity {} exceeds the maximum of {}, clamping",
                self.link_capacity, MAX_LINKS
            );
            self.link_capacity = MAX_LINKS;
        }
        if self.surface_link_capacity > MAX_LINKS {
            warn!(
                "surface_link_capacity {} exceeds the maximum of {}, clamping",
                self.surface_link_capacity, MAX_LINKS
            );
            self.surface_link_capacity = MAX_LINKS;
        }
        if !self.neighborhood_covers_interactions() {
            warn!(
                "interaction distance {} exceeds grid_cell_size {}, the neighborhood scan misses partners",
                self.interaction_distance(),
                self.grid_cell_size()
            );
        }
        if self.sdf_max_distance_cells < 0. {
            warn!("sdf_max_distance_cells is negative, clamping to zero");
            self.sdf_max_distance_cells = 0.;
        }

        Ok(self)
    }
}

/// Reads simulation parameters from a YAML file. Keys missing in the file keep their defaults.
/// Every key of the optional overwrite file replaces the corresponding parameter.
pub fn load_simulation_params(path: impl AsRef<Path>, overwrite: Option<&Path>) -> Result<SimulationParams> {
    let params_yaml = std::fs::read_to_string(path)?;
    let overwrite_yaml = match overwrite {
        Some(overwrite) => Some(std::fs::read_to_string(overwrite)?),
        None => None,
    };
    parse_simulation_params(&params_yaml, overwrite_yaml.as_deref())
}

pub fn parse_simulation_params(params_yaml: &str, overwrite_yaml: Option<&str>) -> Result<SimulationParams> {
    let mut simulation_params_serde: serde_yaml::Value = serde_yaml::to_value(SimulationParams::default())?;

    let file_values = parse_mapping(params_yaml)?;
    let overwrite_values = match overwrite_yaml {
        Some(s) => parse_mapping(s)?,
        None => BTreeMap::new(),
    };

    if let Some(mapping) = simulation_params_serde.as_mapping_mut() {
        for (k, v) in file_values.into_iter().chain(overwrite_values.into_iter()) {
            let entry = mapping
                .get_mut(&serde_yaml::Value::String(k.clone()))
                .ok_or(GooError::UnknownAttribute(k))?;
            *entry = v;
        }
    }

    Ok(serde_yaml::from_value(simulation_params_serde)?)
}

fn parse_mapping(yaml: &str) -> Result<BTreeMap<String, serde_yaml::Value>> {
    if yaml.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    match serde_yaml::from_str::<serde_yaml::Value>(yaml)? {
        serde_yaml::Value::Null => Ok(BTreeMap::new()),
        v => Ok(serde_yaml::from_value(v)?),
    }
}

pub fn write_default_simulation_params(path: impl AsRef<Path>) -> Result<()> {
    let yaml = serde_yaml::to_string(&SimulationParams::default())?;
    std::fs::write(path, yaml)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ColliderShape {
    Plane { half_size: FT },
    Box { half_extents: [FT; 3] },
}

impl ColliderShape {
    pub fn mesh(&self) -> TriangleMesh {
        match *self {
            ColliderShape::Plane { half_size } => TriangleMesh::plane(half_size),
            ColliderShape::Box { half_extents } => {
                TriangleMesh::cuboid(vec3f(half_extents[0], half_extents[1], half_extents[2]))
            }
        }
    }
}

fn unit_scale() -> [FT; 3] {
    [1., 1., 1.]
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ColliderConfig {
    pub shape: ColliderShape,
    #[serde(default)]
    pub translation: [FT; 3],
    /// roll, pitch, yaw in radians
    #[serde(default)]
    pub rotation: [FT; 3],
    #[serde(default = "unit_scale")]
    pub scale: [FT; 3],
}

impl ColliderConfig {
    /// translation * rotation * scale
    pub fn transform(&self) -> M4 {
        let [tx, ty, tz] = self.translation;
        let [roll, pitch, yaw] = self.rotation;
        let [sx, sy, sz] = self.scale;
        M4::new_translation(&Vector3::new(tx, ty, tz))
            * Rotation3::from_euler_angles(roll, pitch, yaw).to_homogeneous()
            * M4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz))
    }

    pub fn build(&self) -> Result<Collider> {
        Collider::new(self.shape.mesh(), self.transform())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    pub particle_count: usize,
    #[serde(default)]
    pub colliders: Vec<ColliderConfig>,
}

impl SceneConfig {
    pub fn build_colliders(&self) -> Result<Vec<Collider>> {
        self.colliders.iter().map(|c| c.build()).collect()
    }
}

pub fn load_scene_config(path: impl AsRef<Path>) -> Result<SceneConfig> {
    let scene_yaml = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&scene_yaml)?)
}
