//! Bounding Volume Hierarchy over the high-poly triangle soup.
//!
//! Uses Surface Area Heuristic (SAH) for construction. The tree is built
//! once per bake and only read afterwards, so it can be shared by every
//! worker thread without locking.

use rayon::join;
use xbake_math::{Aabb3, Dir3, Point3, Vec3};
use xbake_mesh::{shading_normals, smooth_normals, Mesh};

use crate::triangle::Triangle;
use crate::{Ray, RayHit};

/// Hits closer together than this (along the ray) count as a tie and are
/// resolved in favour of the lowest triangle index.
pub const TIE_EPSILON: f64 = 1e-9;

/// Subtrees with more triangles than this are built on the rayon pool.
const PARALLEL_BUILD_THRESHOLD: usize = 4096;

/// Maximum triangles per leaf.
const MAX_LEAF_SIZE: usize = 4;

/// A BVH node - either a leaf containing triangles or an internal node with children.
#[derive(Debug, Clone)]
pub enum BvhNode {
    /// Leaf node containing triangle indices.
    Leaf {
        /// Axis-aligned bounding box of this node.
        aabb: Aabb3,
        /// Indices into [`Bvh::triangles`].
        triangles: Vec<u32>,
    },
    /// Internal node with two children.
    Internal {
        /// Axis-aligned bounding box of this node.
        aabb: Aabb3,
        /// Left child node.
        left: Box<BvhNode>,
        /// Right child node.
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn aabb(&self) -> &Aabb3 {
        match self {
            BvhNode::Leaf { aabb, .. } => aabb,
            BvhNode::Internal { aabb, .. } => aabb,
        }
    }
}

/// Bounding Volume Hierarchy for nearest-hit queries against a triangle mesh.
#[derive(Debug, Clone)]
pub struct Bvh {
    root: Option<BvhNode>,
    triangles: Vec<Triangle>,
}

/// Per-triangle build record: (index, bounds, centroid).
type BuildItem = (u32, Aabb3, Point3);

/// A candidate hit before the tie-break: (t, triangle, u, v).
type Candidate = (f64, u32, f64, f64);

impl Bvh {
    /// Build a BVH over a mesh, using its imported normals (or smoothed
    /// normals when it has none) for hit shading.
    pub fn build(mesh: &Mesh) -> Self {
        let normals = shading_normals(mesh, &smooth_normals(mesh));
        let triangles = (0..mesh.num_triangles())
            .map(|t| {
                let [a, b, c] = mesh.triangle(t);
                Triangle::new(
                    mesh.triangle_positions(t),
                    [normals[a], normals[b], normals[c]],
                )
            })
            .collect();
        Self::from_triangles(triangles)
    }

    /// Build a BVH from a triangle soup. Triangle indices in hits refer to
    /// positions in `triangles`.
    pub fn from_triangles(triangles: Vec<Triangle>) -> Self {
        let mut items: Vec<BuildItem> = triangles
            .iter()
            .enumerate()
            .map(|(i, tri)| {
                let mut aabb = tri.aabb();
                // Pad so planar leaves never collapse to a zero-width slab
                let pad = 1e-9 * (1.0 + aabb.diagonal());
                aabb.expand(pad);
                (i as u32, aabb, tri.centroid())
            })
            .collect();

        let root = if items.is_empty() {
            None
        } else {
            Some(build_node(&mut items))
        };

        Self { root, triangles }
    }

    /// Number of triangles indexed by this BVH.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// The indexed triangles.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Bounds of the whole tree, or `None` if it is empty.
    pub fn bounds(&self) -> Option<Aabb3> {
        self.root.as_ref().map(|node| *node.aabb())
    }

    /// Get a reference to the root node, if any.
    pub fn root(&self) -> Option<&BvhNode> {
        self.root.as_ref()
    }

    /// Closest hit with `0 < t <= max_t`.
    ///
    /// Deterministic: among hits within [`TIE_EPSILON`] of the nearest one,
    /// the lowest triangle index wins regardless of traversal order.
    pub fn closest_hit(&self, ray: &Ray, max_t: f64) -> Option<RayHit> {
        let root = self.root.as_ref()?;
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut closest_t = max_t;
        self.closest_in_node(ray, root, &mut closest_t, &mut candidates);

        let limit = (closest_t + TIE_EPSILON).min(max_t);
        let &(t, triangle, u, v) = candidates
            .iter()
            .filter(|c| c.0 <= limit)
            .min_by_key(|c| c.1)?;

        Some(self.make_hit(ray, t, triangle, u, v))
    }

    /// True if anything intersects the ray within `0 < t <= max_t`.
    pub fn occluded(&self, ray: &Ray, max_t: f64) -> bool {
        match &self.root {
            Some(root) => self.any_in_node(ray, root, max_t),
            None => false,
        }
    }

    fn closest_in_node(
        &self,
        ray: &Ray,
        node: &BvhNode,
        closest_t: &mut f64,
        candidates: &mut Vec<Candidate>,
    ) {
        match node {
            BvhNode::Leaf { aabb, triangles } => {
                match ray.intersect_aabb(aabb) {
                    // Early out if AABB entry is beyond the tie window
                    Some((t_min, _)) if t_min <= *closest_t + TIE_EPSILON => {}
                    _ => return,
                }

                for &index in triangles {
                    let Some((t, u, v)) = self.triangles[index as usize]
                        .intersect(ray, *closest_t + TIE_EPSILON)
                    else {
                        continue;
                    };
                    if t < *closest_t {
                        *closest_t = t;
                        let limit = t + TIE_EPSILON;
                        candidates.retain(|c| c.0 <= limit);
                    }
                    candidates.push((t, index, u, v));
                }
            }
            BvhNode::Internal { left, right, .. } => {
                let left_t = ray.intersect_aabb(left.aabb()).map(|(t, _)| t);
                let right_t = ray.intersect_aabb(right.aabb()).map(|(t, _)| t);

                // Test children in order of AABB distance
                let order: [(&BvhNode, Option<f64>); 2] = match (left_t, right_t) {
                    (Some(lt), Some(rt)) if rt < lt => [(right, right_t), (left, left_t)],
                    _ => [(left, left_t), (right, right_t)],
                };

                for (child, entry) in order {
                    if let Some(t) = entry {
                        if t <= *closest_t + TIE_EPSILON {
                            self.closest_in_node(ray, child, closest_t, candidates);
                        }
                    }
                }
            }
        }
    }

    fn any_in_node(&self, ray: &Ray, node: &BvhNode, max_t: f64) -> bool {
        match ray.intersect_aabb(node.aabb()) {
            Some((t_min, _)) if t_min <= max_t => {}
            _ => return false,
        }
        match node {
            BvhNode::Leaf { triangles, .. } => triangles
                .iter()
                .any(|&i| self.triangles[i as usize].intersect(ray, max_t).is_some()),
            BvhNode::Internal { left, right, .. } => {
                self.any_in_node(ray, left, max_t) || self.any_in_node(ray, right, max_t)
            }
        }
    }

    fn make_hit(&self, ray: &Ray, t: f64, triangle: u32, u: f64, v: f64) -> RayHit {
        let tri = &self.triangles[triangle as usize];
        let barycentric = [1.0 - u - v, u, v];
        let shading = tri.shading_normal(barycentric);
        let geometric = tri
            .area_vector()
            .try_normalize(f64::MIN_POSITIVE)
            .unwrap_or(shading);
        RayHit {
            t,
            point: ray.at(t),
            normal: Dir3::new_unchecked(shading),
            geometric_normal: Dir3::new_unchecked(geometric),
            barycentric,
            triangle,
        }
    }
}

/// Build a BVH node recursively using SAH.
fn build_node(items: &mut [BuildItem]) -> BvhNode {
    // Compute bounds of all triangles
    let mut bounds = Aabb3::empty();
    for (_, aabb, _) in items.iter() {
        bounds.include_aabb(aabb);
    }

    // Base case: small number of triangles -> leaf
    if items.len() <= MAX_LEAF_SIZE {
        return make_leaf(bounds, items);
    }

    let mid = match find_best_split(items) {
        Some((axis, pos)) => partition(items, axis, pos),
        None => 0,
    };

    // Fallback if partition fails: split at the median by index order
    let mid = if mid == 0 || mid == items.len() {
        if centroids_coincide(items) {
            return make_leaf(bounds, items);
        }
        let axis = centroid_bounds(items).longest_axis();
        items.sort_by(|a, b| {
            a.2[axis]
                .total_cmp(&b.2[axis])
                .then_with(|| a.0.cmp(&b.0))
        });
        items.len() / 2
    } else {
        mid
    };

    let (left_items, right_items) = items.split_at_mut(mid);

    let (left, right) = if left_items.len() + right_items.len() > PARALLEL_BUILD_THRESHOLD {
        join(|| build_node(left_items), || build_node(right_items))
    } else {
        (build_node(left_items), build_node(right_items))
    };

    BvhNode::Internal {
        aabb: bounds,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn make_leaf(aabb: Aabb3, items: &[BuildItem]) -> BvhNode {
    BvhNode::Leaf {
        aabb,
        triangles: items.iter().map(|(id, _, _)| *id).collect(),
    }
}

fn centroid_bounds(items: &[BuildItem]) -> Aabb3 {
    Aabb3::from_points(items.iter().map(|(_, _, c)| c))
}

/// True when every centroid is the same point (no split can separate them).
fn centroids_coincide(items: &[BuildItem]) -> bool {
    centroid_bounds(items).size().norm() <= f64::EPSILON
}

/// Find the best split axis and position using binned SAH over centroids.
fn find_best_split(items: &[BuildItem]) -> Option<(usize, f64)> {
    const NUM_BUCKETS: usize = 12;

    let centroids = centroid_bounds(items);
    let extent: Vec3 = centroids.size();

    let mut best: Option<(f64, usize, f64)> = None;

    for axis in 0..3 {
        let axis_extent = extent[axis];
        if axis_extent < 1e-12 {
            continue;
        }
        let axis_min = centroids.min[axis];

        let mut bucket_counts = [0usize; NUM_BUCKETS];
        let mut bucket_bounds = [Aabb3::empty(); NUM_BUCKETS];

        for (_, aabb, centroid) in items {
            let b = ((centroid[axis] - axis_min) / axis_extent * NUM_BUCKETS as f64) as usize;
            let b = b.min(NUM_BUCKETS - 1);
            bucket_counts[b] += 1;
            bucket_bounds[b].include_aabb(aabb);
        }

        // Sweep to find best split
        for split in 1..NUM_BUCKETS {
            let mut left_count = 0;
            let mut left_bounds = Aabb3::empty();
            for i in 0..split {
                left_count += bucket_counts[i];
                left_bounds.include_aabb(&bucket_bounds[i]);
            }

            let mut right_count = 0;
            let mut right_bounds = Aabb3::empty();
            for i in split..NUM_BUCKETS {
                right_count += bucket_counts[i];
                right_bounds.include_aabb(&bucket_bounds[i]);
            }

            if left_count == 0 || right_count == 0 {
                continue;
            }

            // SAH cost: traversal + A(left) * N_left + A(right) * N_right
            let cost = 0.125
                + left_bounds.surface_area() * left_count as f64
                + right_bounds.surface_area() * right_count as f64;

            if best.map_or(true, |(c, _, _)| cost < c) {
                let pos = axis_min + (split as f64 / NUM_BUCKETS as f64) * axis_extent;
                best = Some((cost, axis, pos));
            }
        }
    }

    best.map(|(_, axis, pos)| (axis, pos))
}

/// Partition items by centroid along an axis.
fn partition(items: &mut [BuildItem], axis: usize, pos: f64) -> usize {
    let mut left = 0;
    let mut right = items.len();

    while left < right {
        if items[left].2[axis] < pos {
            left += 1;
        } else {
            right -= 1;
            items.swap(left, right);
        }
    }

    left
}
