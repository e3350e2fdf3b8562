//! An indexed k-d tree over 3D points.
//!
//! ## Creation
//!
//! Use [`KdTreeBuilder`] to construct a [`KdTree`] over a borrowed point
//! slice. The tree never copies or mutates the points; query results are
//! indices into the original slice.
//!
//! ## Search
//!
//! Six query families share one descent skeleton: [`KdTree::find_closest`]
//! and [`KdTree::find_closest_along_dir`] return a single best index,
//! [`KdTree::k_nearest_neighbors`] keeps a bounded candidate heap, and
//! [`KdTree::fixed_range_search`], [`KdTree::aabb_search`] and the segment
//! searches collect every match. Range and k-NN results are unordered;
//! callers that need sorted output must sort.
//!
//! ## Mutation
//!
//! [`KdTree::remove`] unlinks one exact-coordinate match from its leaf. It
//! takes `&mut self`, so the borrow checker serializes it against all
//! readers.
//!
//! ## Example
//!
//! ```
//! use scan_index::kdtree::KdTreeBuilder;
//! use scan_index::DVec3;
//!
//! let points = vec![
//!     DVec3::new(0.0, 0.0, 0.0),
//!     DVec3::new(1.0, 0.0, 0.0),
//!     DVec3::new(0.0, 2.0, 0.0),
//! ];
//! let tree = KdTreeBuilder::new(&points).finish().unwrap();
//!
//! assert_eq!(tree.find_closest(DVec3::new(0.2, 0.1, 0.0), 1.0), Some(0));
//! assert_eq!(tree.fixed_range_search(DVec3::ZERO, 1.0).len(), 2);
//! ```

mod builder;
mod index;
mod query;

pub use builder::{KdTreeBuilder, DEFAULT_BUCKET_SIZE};
pub use index::KdTree;

#[cfg(test)]
mod test;
