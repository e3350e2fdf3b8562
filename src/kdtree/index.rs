use glam::DVec3;

use crate::geom::Aabb;

/// An indexed k-d tree over a borrowed set of 3D points.
///
/// The tree is built once via [`KdTreeBuilder`][crate::kdtree::KdTreeBuilder]
/// and then queried many times. Nodes live in a flat arena with children
/// stored before their parent; leaves own contiguous blocks of a shared id
/// buffer, which keeps the descent cache-friendly and lets
/// [`remove`][KdTree::remove] unlink an id without touching the topology.
#[derive(Debug, Clone)]
pub struct KdTree<'a> {
    pub(crate) pts: &'a [DVec3],
    pub(crate) nodes: Vec<Node>,
    pub(crate) ids: Vec<u32>,
    pub(crate) root: u32,
    pub(crate) num_live: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub aabb: Aabb,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    /// Contiguous block of the shared id buffer; `len` is the live count
    /// within the block.
    Leaf { start: u32, len: u32 },
    /// The left child holds coordinates at or below `split` on `axis`, the
    /// right child strictly above. Children are arena indices.
    Split {
        axis: u8,
        split: f64,
        children: [u32; 2],
    },
}

impl<'a> KdTree<'a> {
    /// Number of live points.
    pub fn len(&self) -> usize {
        self.num_live
    }

    pub fn is_empty(&self) -> bool {
        self.num_live == 0
    }

    /// The point slice this tree was built over, including removed entries.
    pub fn points(&self) -> &'a [DVec3] {
        self.pts
    }

    #[inline]
    pub(crate) fn node(&self, idx: u32) -> &Node {
        &self.nodes[idx as usize]
    }

    #[inline]
    pub(crate) fn leaf_ids(&self, start: u32, len: u32) -> &[u32] {
        &self.ids[start as usize..(start + len) as usize]
    }

    /// Remove the point whose coordinates exactly equal `q`.
    ///
    /// At most one index is unlinked per call; a second index with
    /// bit-identical coordinates survives until its own call. Returns the
    /// number of indices removed (0 or 1). Removal is idempotent and leaves
    /// the tree topology untouched; node boxes stay conservative.
    pub fn remove(&mut self, q: DVec3) -> usize {
        if self.num_live == 0 {
            return 0;
        }
        let mut node = self.root;
        let (start, len) = loop {
            // follow the build-time partition rule down to the one leaf
            // whose region contains q
            match self.nodes[node as usize].kind {
                NodeKind::Split {
                    axis,
                    split,
                    children,
                } => {
                    node = if q[axis as usize] <= split {
                        children[0]
                    } else {
                        children[1]
                    };
                }
                NodeKind::Leaf { start, len } => break (start as usize, len as usize),
            }
        };

        for pos in start..start + len {
            if self.pts[self.ids[pos] as usize] == q {
                // swap-and-truncate within the leaf block
                self.ids.swap(pos, start + len - 1);
                if let NodeKind::Leaf { len, .. } = &mut self.nodes[node as usize].kind {
                    *len -= 1;
                }
                self.num_live -= 1;
                return 1;
            }
        }
        0
    }

    /// All live point indices, in leaf order.
    pub fn collect_pts(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.num_live);
        self.collect_rec(self.root, &mut out);
        out
    }

    fn collect_rec(&self, node: u32, out: &mut Vec<usize>) {
        match self.nodes[node as usize].kind {
            NodeKind::Leaf { start, len } => {
                out.extend(self.leaf_ids(start, len).iter().map(|&i| i as usize));
            }
            NodeKind::Split { children, .. } => {
                self.collect_rec(children[0], out);
                self.collect_rec(children[1], out);
            }
        }
    }
}
