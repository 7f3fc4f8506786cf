use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::{floating_type_mod::FT, VF, V3};

use super::TriangleMesh;

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct CustomRTreePoint {
    p: VF<3>,
}

impl rstar::Point for CustomRTreePoint {
    type Scalar = FT;

    const DIMENSIONS: usize = 3;

    fn generate(mut generator: impl FnMut(usize) -> Self::Scalar) -> Self {
        CustomRTreePoint {
            p: VF::<3>::from_iterator((0..3).map(|d| generator(d))),
        }
    }

    fn nth(&self, index: usize) -> Self::Scalar {
        self.p[index]
    }

    fn nth_mut(&mut self, index: usize) -> &mut Self::Scalar {
        &mut self.p[index]
    }
}

impl From<VF<3>> for CustomRTreePoint {
    fn from(p: VF<3>) -> Self {
        CustomRTreePoint { p }
    }
}

/// Triangle stored by value in the tree, together with its index in the mesh and its unit normal.
#[derive(Debug, Clone)]
pub struct TriangleEntry {
    pub corners: [V3; 3],
    pub normal: V3,
    pub face: u32,
}

impl RTreeObject for TriangleEntry {
    type Envelope = AABB<CustomRTreePoint>;

    fn envelope(&self) -> Self::Envelope {
        let [a, b, c] = self.corners;
        AABB::from_corners(a.inf(&b).inf(&c).into(), a.sup(&b).sup(&c).into())
    }
}

impl PointDistance for TriangleEntry {
    fn distance_2(&self, point: &CustomRTreePoint) -> FT {
        (self.closest_point(&point.p) - point.p).norm_squared()
    }
}

impl TriangleEntry {
    pub fn closest_point(&self, p: &V3) -> V3 {
        let [a, b, c] = self.corners;
        closest_point_on_triangle(p, &a, &b, &c)
    }
}

/// Closest point to `p` on the (filled) triangle `abc`, found by classifying `p` against the
/// Voronoi regions of the corners, the edges and the face.
pub fn closest_point_on_triangle(p: &V3, a: &V3, b: &V3, c: &V3) -> V3 {
    let ab = b - a;
    let ac = c - a;

    let ap = p - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0. && d2 <= 0. {
        return *a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0. && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0. && d1 >= 0. && d3 <= 0. {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0. && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0. && d2 >= 0. && d6 <= 0. {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0. && (d4 - d3) >= 0. && (d5 - d6) >= 0. {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let sum = va + vb + vc;
    if sum == 0. {
        // degenerate triangle
        return *a;
    }
    let v = vb / sum;
    let w = vc / sum;
    a + ab * v + ac * w
}

/// Nearest surface point on a mesh, in the mesh's local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    pub point: V3,
    /// positive on the side the face normal points to
    pub distance: FT,
    pub face: u32,
    pub normal: V3,
}

/// R*-tree over the triangle bounding boxes of a mesh. Built once and never updated, the
/// collider transform is applied to the query instead.
pub struct MeshBvh {
    tree: RTree<TriangleEntry>,
}

impl MeshBvh {
    pub fn build(mesh: &TriangleMesh) -> Self {
        let entries: Vec<TriangleEntry> = (0..mesh.num_triangles())
            .map(|face| TriangleEntry {
                corners: mesh.triangle_corners(face),
                normal: mesh.face_normal(face),
                face: face as u32,
            })
            .collect();

        MeshBvh {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Nearest point on the mesh within `max_distance` of `point`. Equally distant faces are
    /// resolved towards the lowest face index.
    pub fn closest_point(&self, point: &V3, max_distance: FT) -> Option<SurfaceHit> {
        if !(max_distance >= 0.) {
            return None;
        }

        let mut best: Option<(FT, &TriangleEntry, V3)> = None;
        for entry in self
            .tree
            .locate_within_distance(CustomRTreePoint::from(*point), max_distance * max_distance)
        {
            let closest = entry.closest_point(point);
            let dist_sq = (closest - point).norm_squared();
            let better = match best {
                None => true,
                Some((best_sq, best_entry, _)) => {
                    dist_sq < best_sq || (dist_sq == best_sq && entry.face < best_entry.face)
                }
            };
            if better {
                best = Some((dist_sq, entry, closest));
            }
        }

        best.map(|(dist_sq, entry, closest)| {
            let unsigned = dist_sq.sqrt();
            let side = (point - closest).dot(&entry.normal);
            SurfaceHit {
                point: closest,
                distance: if side < 0. { -unsigned } else { unsigned },
                face: entry.face,
                normal: entry.normal,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assert_ft_approx_eq, vec3f};

    #[test]
    fn test_closest_point_regions() {
        let a = vec3f(0., 0., 0.);
        let b = vec3f(1., 0., 0.);
        let c = vec3f(0., 1., 0.);

        // face interior
        let q = closest_point_on_triangle(&vec3f(0.25, 0.25, 3.), &a, &b, &c);
        assert_ft_approx_eq(q.x, 0.25, 1e-6, || "face x".to_string());
        assert_ft_approx_eq(q.y, 0.25, 1e-6, || "face y".to_string());
        assert_ft_approx_eq(q.z, 0., 1e-6, || "face z".to_string());

        // corner region
        assert_eq!(closest_point_on_triangle(&vec3f(-1., -1., 0.), &a, &b, &c), a);
        assert_eq!(closest_point_on_triangle(&vec3f(3., -0.5, 0.), &a, &b, &c), b);

        // hypotenuse edge
        let q = closest_point_on_triangle(&vec3f(1., 1., 0.), &a, &b, &c);
        assert_ft_approx_eq(q.x, 0.5, 1e-6, || "edge x".to_string());
        assert_ft_approx_eq(q.y, 0.5, 1e-6, || "edge y".to_string());
    }

    #[test]
    fn test_plane_query_is_signed_and_bounded() {
        let mesh = TriangleMesh::plane(1.0);
        let bvh = MeshBvh::build(&mesh);
        assert_eq!(bvh.len(), 2);

        let above = bvh.closest_point(&vec3f(0.3, 0.1, -0.2), 0.5).unwrap();
        assert_ft_approx_eq(above.distance, 0.1, 1e-6, || "above".to_string());
        assert_ft_approx_eq(above.point.y, 0., 1e-6, || "contact height".to_string());

        let below = bvh.closest_point(&vec3f(0.3, -0.05, -0.2), 0.5).unwrap();
        assert_ft_approx_eq(below.distance, -0.05, 1e-6, || "below".to_string());

        assert!(bvh.closest_point(&vec3f(0.3, 0.6, -0.2), 0.5).is_none());
        assert!(bvh.closest_point(&vec3f(0.3, 0.6, -0.2), -1.0).is_none());
    }

    #[test]
    fn test_equally_close_faces_resolve_to_lowest_index() {
        let mesh = TriangleMesh::plane(1.0);
        let bvh = MeshBvh::build(&mesh);

        // the origin lies on the diagonal shared by both triangles
        let hit = bvh.closest_point(&vec3f(0., 0.2, 0.), 1.0).unwrap();
        assert_eq!(hit.face, 0);
    }

    #[test]
    fn test_cuboid_query_hits_outward_face() {
        let mesh = TriangleMesh::cuboid(vec3f(1., 0.5, 2.));
        let bvh = MeshBvh::build(&mesh);

        let hit = bvh.closest_point(&vec3f(0.2, 0.7, 0.1), 1.0).unwrap();
        assert_ft_approx_eq(hit.distance, 0.2, 1e-5, || "top".to_string());
        assert_ft_approx_eq(hit.normal.y, 1., 1e-6, || "top normal".to_string());

        let inside = bvh.closest_point(&vec3f(0.95, 0., 0.), 1.0).unwrap();
        assert_ft_approx_eq(inside.distance, -0.05, 1e-5, || "inside".to_string());
        assert_ft_approx_eq(inside.normal.x, 1., 1e-6, || "side normal".to_string());
    }
}
