mod bvh;

pub use bvh::{closest_point_on_triangle, MeshBvh, SurfaceHit};

use crate::{
    error::{GooError, Result},
    floating_type_mod::FT,
    max_axis_scale, transform_point, transform_vector, vec3f, M4, V3,
};

/// Static triangle mesh in collider-local space. Faces wind counter-clockwise around their normal.
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    vertices: Vec<V3>,
    triangles: Vec<[u32; 3]>,
}

impl TriangleMesh {
    pub fn new(vertices: Vec<V3>, triangles: Vec<[u32; 3]>) -> Result<Self> {
        if triangles.is_empty() {
            return Err(GooError::EmptyCollider);
        }
        for (t, tri) in triangles.iter().enumerate() {
            if let Some(&v) = tri.iter().find(|&&v| v as usize >= vertices.len()) {
                return Err(GooError::VertexOutOfRange {
                    triangle: t,
                    vertex: v,
                    num_vertices: vertices.len(),
                });
            }
        }
        Ok(TriangleMesh { vertices, triangles })
    }

    /// Square in the xz-plane spanning `[-half_size, half_size]`, facing +y.
    pub fn plane(half_size: FT) -> Self {
        let h = half_size;
        TriangleMesh {
            vertices: vec![
                vec3f(-h, 0., -h),
                vec3f(h, 0., -h),
                vec3f(h, 0., h),
                vec3f(-h, 0., h),
            ],
            triangles: vec![[0, 2, 1], [0, 3, 2]],
        }
    }

    /// Axis-aligned box around the origin with outward facing triangles.
    pub fn cuboid(half_extents: V3) -> Self {
        let corner = |x: usize, y: usize, z: usize| {
            vec3f(
                if x == 1 { half_extents.x } else { -half_extents.x },
                if y == 1 { half_extents.y } else { -half_extents.y },
                if z == 1 { half_extents.z } else { -half_extents.z },
            )
        };
        let vertex_index = |x: usize, y: usize, z: usize| (x + 2 * y + 4 * z) as u32;

        let vertices: Vec<V3> = (0..8).map(|i| corner(i & 1, (i >> 1) & 1, (i >> 2) & 1)).collect();
        let mut triangles = Vec::with_capacity(12);

        for axis in 0..3 {
            let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
            for side in 0..2 {
                let quad: Vec<u32> = [(0, 0), (1, 0), (1, 1), (0, 1)]
                    .iter()
                    .map(|&(a, b)| {
                        let mut c = [0; 3];
                        c[axis] = side;
                        c[u] = a;
                        c[v] = b;
                        vertex_index(c[0], c[1], c[2])
                    })
                    .collect();

                let mut outward = V3::zeros();
                outward[axis] = if side == 1 { 1. } else { -1. };

                let (p0, p1, p2) = (
                    vertices[quad[0] as usize],
                    vertices[quad[1] as usize],
                    vertices[quad[2] as usize],
                );
                let n = (p1 - p0).cross(&(p2 - p0));
                if n.dot(&outward) > 0. {
                    triangles.push([quad[0], quad[1], quad[2]]);
                    triangles.push([quad[0], quad[2], quad[3]]);
                } else {
                    triangles.push([quad[0], quad[2], quad[1]]);
                    triangles.push([quad[0], quad[3], quad[2]]);
                }
            }
        }

        TriangleMesh { vertices, triangles }
    }

    pub fn vertices(&self) -> &[V3] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangle_corners(&self, face: usize) -> [V3; 3] {
        let [a, b, c] = self.triangles[face];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Unit normal from the winding order, zero for degenerate triangles.
    pub fn face_normal(&self, face: usize) -> V3 {
        let [a, b, c] = self.triangle_corners(face);
        (b - a).cross(&(c - a)).try_normalize(0.).unwrap_or_else(V3::zeros)
    }
}

/// Result of a world-space proximity query against a collider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColliderContact {
    pub hit: SurfaceHit,
    pub world_point: V3,
    /// local signed distance divided by the local scale
    pub world_distance: FT,
    pub world_normal: V3,
    pub local_radius: FT,
}

/// Triangle mesh placed in the world by an affine transform. The mesh and its BVH stay in
/// local space; queries are transformed instead.
pub struct Collider {
    mesh: TriangleMesh,
    bvh: MeshBvh,
    transform: M4,
    inverse: M4,
    inverse_scale: FT,
}

impl Collider {
    pub fn new(mesh: TriangleMesh, transform: M4) -> Result<Self> {
        let bvh = MeshBvh::build(&mesh);
        let mut collider = Collider {
            mesh,
            bvh,
            transform: M4::identity(),
            inverse: M4::identity(),
            inverse_scale: 1.,
        };
        collider.set_transform(transform)?;
        Ok(collider)
    }

    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    pub fn transform(&self) -> &M4 {
        &self.transform
    }

    pub fn inverse_transform(&self) -> &M4 {
        &self.inverse
    }

    /// Replaces the world transform. A non-invertible matrix is rejected and the old transform kept.
    pub fn set_transform(&mut self, transform: M4) -> Result<()> {
        let inverse = transform.try_inverse().ok_or(GooError::SingularTransform)?;
        let inverse_scale = max_axis_scale(&inverse);
        if !(inverse_scale > 0.) || !inverse_scale.is_finite() {
            return Err(GooError::SingularTransform);
        }
        self.transform = transform;
        self.inverse = inverse;
        self.inverse_scale = inverse_scale;
        Ok(())
    }

    pub fn to_local(&self, world: &V3) -> V3 {
        transform_point(&self.inverse, world)
    }

    pub fn to_world(&self, local: &V3) -> V3 {
        transform_point(&self.transform, local)
    }

    /// Conservative local-space equivalent of a world-space radius.
    pub fn local_radius(&self, world_radius: FT) -> FT {
        world_radius * self.inverse_scale
    }

    /// Normals transform with the inverse transpose.
    pub fn world_normal(&self, local_normal: &V3) -> V3 {
        transform_vector(&self.inverse.transpose(), local_normal)
            .try_normalize(0.)
            .unwrap_or_else(V3::zeros)
    }

    pub fn closest_point_local(&self, local_point: &V3, max_distance: FT) -> Option<SurfaceHit> {
        self.bvh.closest_point(local_point, max_distance)
    }

    /// Nearest contact within `radius` (world units, scaled into local space) of `world_point`.
    pub fn contact(&self, world_point: &V3, radius: FT) -> Option<ColliderContact> {
        let local_radius = self.local_radius(radius);
        let hit = self.closest_point_local(&self.to_local(world_point), local_radius)?;
        Some(ColliderContact {
            hit,
            world_point: self.to_world(&hit.point),
            world_distance: hit.distance / self.inverse_scale,
            world_normal: self.world_normal(&hit.normal),
            local_radius,
        })
    }
}
