use std::{
    fs::{create_dir_all, File},
    io::Write,
    path::PathBuf,
};

use vtkio::model::*;

use crate::{
    error::{GooError, Result},
    floating_type_mod::FT,
    sdf::SdfField,
    GooSimulation, V3,
};

fn to_vec3d(v: &V3) -> [FT; 3] {
    [v[0], v[1], v[2]]
}

fn export_error(e: vtkio::Error) -> GooError {
    GooError::Export(format!("{:?}", e))
}

pub(crate) struct VtkExporter {
    /// something like './data/goo' which will get expanded to './data/goo-00001.vtk' and './data/goo.vtk.series'
    folder: PathBuf,
    basename: String,
    snapshot_number: usize,
    series_file: File,
    export_sdf: bool,
}

impl VtkExporter {
    pub(crate) fn new(folder: impl Into<PathBuf>, basename: impl Into<String>, export_sdf: bool) -> Result<VtkExporter> {
        let folder: PathBuf = folder.into();
        let basename: String = basename.into();

        create_dir_all(&folder)?;

        let mut series_file = File::create(folder.join(format!("{}.vtk.series", basename)))?;
        let series_prelude_str = "{\n\"file-series-version\": \"1.0\",\n\"files\": [";
        series_file.write_all(series_prelude_str.as_bytes())?;

        Ok(VtkExporter {
            series_file,
            folder,
            basename,
            snapshot_number: 1,
            export_sdf,
        })
    }

    /// Particles with their bonds as line cells, and optionally the distance field next to it.
    pub(crate) fn add_snapshot(&mut self, goo_simulation: &GooSimulation) -> Result<()> {
        if self.snapshot_number > 1 {
            self.series_file.write_all(",".as_bytes())?;
        }

        let vtk_filename = format!("{}-{:05}.vtk", self.basename, self.snapshot_number);
        Self::write_particle_file(self.folder.join(&vtk_filename), goo_simulation)?;

        if self.export_sdf {
            let sdf_filename = format!("{}-sdf-{:05}.vtk", self.basename, self.snapshot_number);
            write_sdf_file(self.folder.join(&sdf_filename), goo_simulation.sdf())?;
        }

        write!(
            self.series_file,
            "\n{{ \"name\": \"{}\", \"time\": {} }}",
            vtk_filename,
            goo_simulation.time()
        )?;

        self.snapshot_number += 1;
        Ok(())
    }

    fn write_particle_file<P: Into<PathBuf>>(path: P, goo_simulation: &GooSimulation) -> Result<()> {
        let particles = goo_simulation.particles();
        let positions = goo_simulation.positions();

        let mut data_vec: Vec<(String, Vec<V3>)> = Vec::new();
        let mut data_u8: Vec<(String, Vec<u8>)> = Vec::new();
        let mut lines: Vec<(V3, V3)> = Vec::new();

        data_vec.push(("velocity".into(), goo_simulation.velocities()));
        data_vec.push(("force".into(), particles.iter().map(|p| p.force).collect()));
        data_u8.push((
            "link_count".into(),
            particles.iter().map(|p| p.link_count() as u8).collect(),
        ));
        data_u8.push((
            "surface_link_count".into(),
            particles.iter().map(|p| p.surface_link_count() as u8).collect(),
        ));

        for (a, b) in goo_simulation.links() {
            lines.push((positions[a as usize], positions[b as usize]));
        }
        lines.extend(goo_simulation.surface_link_world_points());

        write_vtk_file2(path, positions, data_vec, data_u8, lines)
    }
}

impl Drop for VtkExporter {
    fn drop(&mut self) {
        let series_end_str = "\n]\n}";
        if let Err(e) = self.series_file.write_all(series_end_str.as_bytes()) {
            log::error!("failed to finish vtk series file: {}", e);
        }
    }
}

pub fn write_vtk_file2<P: Into<PathBuf>>(
    path: P,
    mut positions: Vec<V3>,
    data_vec: Vec<(String, Vec<V3>)>,
    data_u8: Vec<(String, Vec<u8>)>,
    lines: Vec<(V3, V3)>,
) -> Result<()> {
    let mut data_arrays: Vec<DataArray> = Vec::new();
    let num_lines = lines.len();

    for (name, mut arr) in data_vec {
        let mut data_array = DataArray::scalars(name, 3);

        for _ in 0..2 * num_lines {
            // add dummy data for line cells
            arr.push(V3::zeros());
        }

        data_array.data = arr.iter().flat_map(to_vec3d).collect::<Vec<_>>().into();
        data_arrays.push(data_array);
    }

    for (name, mut arr) in data_u8 {
        let mut data_array = DataArray::scalars(name, 1);

        for _ in 0..2 * num_lines {
            // add dummy data for line cells
            arr.push(0);
        }

        data_array.data = arr.into();
        data_arrays.push(data_array);
    }

    let path = path.into();

    let num_particles = positions.len();
    let vtk_verts: Vec<u32> = (0..num_particles).flat_map(|i| [1, i as u32]).collect();

    let mut vtk_line_indices: Vec<u32> = Vec::new();
    for (a, b) in lines {
        let a_idx = positions.len();
        positions.push(a);

        let b_idx = positions.len();
        positions.push(b);

        vtk_line_indices.push(2);
        vtk_line_indices.push(a_idx as u32);
        vtk_line_indices.push(b_idx as u32);
    }

    let vtk_points: Vec<FT> = positions.iter().flat_map(to_vec3d).collect();

    let vtk = Vtk {
        version: Version::new((4, 2)),
        byte_order: ByteOrder::BigEndian,
        title: String::from("Goo Particles 1.0"),
        file_path: Some(path.clone()),
        data: DataSet::PolyData {
            meta: None,
            pieces: vec![Piece::Inline(Box::new(PolyDataPiece {
                points: vtk_points.into(),
                verts: VertexNumbers::Legacy {
                    num_cells: num_particles as u32,
                    vertices: vtk_verts,
                }
                .into(),
                lines: VertexNumbers::Legacy {
                    num_cells: num_lines as u32,
                    vertices: vtk_line_indices,
                }
                .into(),
                data: Attributes {
                    cell: Vec::new(),
                    point: data_arrays.into_iter().map(Attribute::DataArray).collect(),
                },
                ..Default::default()
            }))],
        },
    };
    vtk.export(path).map_err(export_error)
}

/// The distance field as structured points, one sample per grid cell.
pub fn write_sdf_file<P: Into<PathBuf>>(path: P, field: &SdfField) -> Result<()> {
    let path = path.into();
    let s = field.resolution() as u32;
    let origin = field.sample_position(0, 0, 0);
    let cell_size = field.cell_size() as f32;

    let mut distance = DataArray::scalars("distance", 1);
    distance.data = field.values().to_vec().into();

    let vtk = Vtk {
        version: Version::new((4, 2)),
        byte_order: ByteOrder::BigEndian,
        title: String::from("Goo Distance Field 1.0"),
        file_path: Some(path.clone()),
        data: DataSet::ImageData {
            extent: Extent::Dims([s, s, s]),
            origin: [origin.x as f32, origin.y as f32, origin.z as f32],
            spacing: [cell_size, cell_size, cell_size],
            meta: None,
            pieces: vec![Piece::Inline(Box::new(ImageDataPiece {
                extent: Extent::Dims([s, s, s]),
                data: Attributes {
                    point: vec![Attribute::DataArray(distance)],
                    cell: Vec::new(),
                },
            }))],
        },
    };
    vtk.export(path).map_err(export_error)
}
