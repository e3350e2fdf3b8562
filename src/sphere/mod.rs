//! A spherical quadtree over unit directions.
//!
//! ## Creation
//!
//! [`QuadTree::build`] normalizes the input vectors and buckets them into
//! the eight faces of an axis-aligned octahedron; each face is then refined
//! into a triangular quadtree whose subdivision vertices are shared between
//! adjacent triangles.
//!
//! ## Search
//!
//! [`QuadTree::search`] returns every indexed direction within an angular
//! radius of a query direction, pruning whole subtrees against each
//! triangle's cached circumcircle. [`QuadTree::reduce`] draws an
//! area-proportional stochastic subset, the building block for uniform
//! downsampling of scan directions.
//!
//! ## Example
//!
//! ```
//! use scan_index::sphere::QuadTree;
//! use scan_index::DVec3;
//!
//! let dirs = vec![
//!     DVec3::new(1.0, 0.0, 0.0),
//!     DVec3::new(0.0, 1.0, 0.0),
//!     DVec3::new(1.0, 0.1, 0.0),
//! ];
//! let tree = QuadTree::build(&dirs);
//!
//! // directions within ~11 degrees of +x
//! let near_x = tree.search(DVec3::new(1.0, 0.0, 0.0), 0.2);
//! assert_eq!(near_x.len(), 2);
//! ```

mod node;
mod tree;

pub use tree::QuadTree;
