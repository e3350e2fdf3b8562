use glam::DVec3;

use crate::error::Result;
use crate::geom::Aabb;
use crate::kdtree::index::{KdTree, Node, NodeKind};
use crate::ScanIndexError;

/// Default bucket size in [`KdTreeBuilder::new`].
pub const DEFAULT_BUCKET_SIZE: usize = 10;

/// A builder to create a [`KdTree`].
#[derive(Debug)]
pub struct KdTreeBuilder<'a> {
    pts: &'a [DVec3],
    bucket_size: usize,
}

impl<'a> KdTreeBuilder<'a> {
    /// Create a new builder over the provided points with the default bucket
    /// size.
    pub fn new(pts: &'a [DVec3]) -> Self {
        Self {
            pts,
            bucket_size: DEFAULT_BUCKET_SIZE,
        }
    }

    /// Set the maximum number of point indices a leaf may hold.
    pub fn with_bucket_size(mut self, bucket_size: usize) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    /// Consume this builder, partitioning the indices into a [`KdTree`]
    /// ready for queries.
    ///
    /// ## Errors
    ///
    /// - If the bucket size is zero.
    /// - If the point set exceeds the `u32` index range.
    pub fn finish(self) -> Result<KdTree<'a>> {
        if self.bucket_size < 1 {
            return Err(ScanIndexError::InvalidArgument(
                "bucket size must be at least 1".to_string(),
            ));
        }
        if self.pts.len() > u32::MAX as usize {
            return Err(ScanIndexError::InvalidArgument(format!(
                "point set of {} exceeds the u32 index range",
                self.pts.len()
            )));
        }

        let mut ids: Vec<u32> = (0..self.pts.len() as u32).collect();
        let mut nodes = Vec::new();
        let num_live = ids.len();
        let root = build(
            self.pts,
            &mut ids,
            0,
            num_live,
            self.bucket_size,
            &mut nodes,
        );
        Ok(KdTree {
            pts: self.pts,
            nodes,
            ids,
            root,
            num_live,
        })
    }
}

/// Recursively partition `ids[start..end]`. Children are pushed before their
/// parent, so the subtree root is always the last node appended.
fn build(
    pts: &[DVec3],
    ids: &mut [u32],
    start: usize,
    end: usize,
    bucket_size: usize,
    nodes: &mut Vec<Node>,
) -> u32 {
    let aabb = Aabb::from_indexed_points(pts, &ids[start..end]);
    if end - start <= bucket_size {
        return push_leaf(nodes, aabb, start, end);
    }

    let axis = aabb.longest_axis();
    // geometric midpoint of the box, not the coordinate median
    let split = 0.5 * (aabb.min[axis] + aabb.max[axis]);
    let mid = partition(pts, ids, start, end, axis, split);

    // Duplicates piled on the midpoint can leave one side empty; fall back
    // to an oversized leaf rather than recursing forever.
    if mid == start || mid == end {
        return push_leaf(nodes, aabb, start, end);
    }

    let left = build(pts, ids, start, mid, bucket_size, nodes);
    let right = build(pts, ids, mid, end, bucket_size, nodes);
    nodes.push(Node {
        aabb,
        kind: NodeKind::Split {
            axis: axis as u8,
            split,
            children: [left, right],
        },
    });
    (nodes.len() - 1) as u32
}

fn push_leaf(nodes: &mut Vec<Node>, aabb: Aabb, start: usize, end: usize) -> u32 {
    nodes.push(Node {
        aabb,
        kind: NodeKind::Leaf {
            start: start as u32,
            len: (end - start) as u32,
        },
    });
    (nodes.len() - 1) as u32
}

/// Two-pointer partition of `ids[start..end]`: indices with coordinate at or
/// below `split` on `axis` move to the front. Returns the first index of the
/// high side.
fn partition(
    pts: &[DVec3],
    ids: &mut [u32],
    start: usize,
    end: usize,
    axis: usize,
    split: f64,
) -> usize {
    let mut i = start;
    let mut j = end;
    while i < j {
        if pts[ids[i] as usize][axis] <= split {
            i += 1;
        } else {
            j -= 1;
            ids.swap(i, j);
        }
    }
    i
}
