#![warn(missing_docs)]

//! Ray casting against the high-poly mesh.
//!
//! The baker fires one projection ray per texel plus any ambient occlusion
//! and curvature probes, all against the same immutable acceleration
//! structure. Everything here is read-only after construction and safe to
//! share across threads.
//!
//! # Architecture
//!
//! - [`Ray`] - Ray representation with origin and direction
//! - [`RayHit`] - Closest intersection with shading data
//! - [`Triangle`] - Two-sided ray-triangle test
//! - [`bvh`] - SAH bounding volume hierarchy with deterministic tie-breaking
//!
//! # Example
//!
//! ```ignore
//! use xbake_raytrace::{Bvh, Ray};
//!
//! let bvh = Bvh::build(&high_poly);
//! let ray = Ray::new(Point3::new(0.5, 0.5, 1.0), Vec3::new(0.0, 0.0, -1.0));
//! if let Some(hit) = bvh.closest_hit(&ray, 2.0) {
//!     println!("hit triangle {} at t = {}", hit.triangle, hit.t);
//! }
//! ```

mod ray;
mod triangle;
pub mod bvh;

pub use bvh::{Bvh, TIE_EPSILON};
pub use ray::{Ray, RayHit};
pub use triangle::Triangle;
