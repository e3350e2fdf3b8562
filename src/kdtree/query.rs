//! The query families of [`KdTree`].
//!
//! All descents share one skeleton: prune a subtree by comparing a
//! node-summary distance against the current best radius, visit the child
//! containing the query first, and visit the other child only if it can
//! still improve the result. Single-result queries recurse with a small
//! stack-local state struct; collection queries walk an explicit node stack.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::DVec3;
use tinyvec::TinyVec;

use crate::error::Result;
use crate::geom::{self, Aabb};
use crate::kdtree::index::{KdTree, NodeKind};
use crate::ScanIndexError;

/// Node stack for the collection queries; sized so typical descents stay off
/// the heap.
type NodeStack = TinyVec<[u32; 32]>;

/// Candidate for the k-nearest search. Max-heap ordering puts the largest
/// distance on top so a full heap evicts its worst entry first.
struct Candidate {
    id: u32,
    d2: f64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.d2 == other.d2
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.d2.partial_cmp(&other.d2).unwrap_or(Ordering::Equal)
    }
}

struct ClosestState {
    q: DVec3,
    best_d2: f64,
    best: Option<u32>,
}

struct ClosestLineState {
    q: DVec3,
    dir: DVec3,
    best_d2: f64,
    best: Option<u32>,
}

struct KnnState {
    q: DVec3,
    k: usize,
    heap: BinaryHeap<Candidate>,
}

impl KnnState {
    /// Current pruning radius: the heap maximum once full, else unbounded.
    #[inline]
    fn prune_d2(&self) -> f64 {
        if self.heap.len() < self.k {
            f64::INFINITY
        } else {
            self.heap.peek().map_or(f64::INFINITY, |c| c.d2)
        }
    }
}

struct SegmentNearestState {
    q: DVec3,
    q2: DVec3,
    r_sq: f64,
    best_d2: f64,
    best: Option<u32>,
}

impl<'a> KdTree<'a> {
    /// Find the closest live point to `q` within squared distance
    /// `max_dist_sq`.
    ///
    /// Returns `None` when no live point lies strictly inside the limit.
    /// Exact distance ties go to the smaller index.
    pub fn find_closest(&self, q: DVec3, max_dist_sq: f64) -> Option<usize> {
        let mut state = ClosestState {
            q,
            best_d2: max_dist_sq,
            best: None,
        };
        self.closest_rec(self.root, &mut state);
        state.best.map(|i| i as usize)
    }

    fn closest_rec(&self, node: u32, state: &mut ClosestState) {
        match self.node(node).kind {
            NodeKind::Leaf { start, len } => {
                for &i in self.leaf_ids(start, len) {
                    let d2 = self.pts[i as usize].distance_squared(state.q);
                    if d2 < state.best_d2
                        || (d2 == state.best_d2 && state.best.is_some_and(|b| i < b))
                    {
                        state.best_d2 = d2;
                        state.best = Some(i);
                    }
                }
            }
            NodeKind::Split {
                axis,
                split,
                children,
            } => {
                let delta = state.q[axis as usize] - split;
                let (near, far) = if delta <= 0.0 {
                    (children[0], children[1])
                } else {
                    (children[1], children[0])
                };
                self.closest_rec(near, state);
                if delta * delta < state.best_d2 {
                    self.closest_rec(far, state);
                }
            }
        }
    }

    /// Find the live point with the smallest squared perpendicular distance
    /// to the infinite line `{q + t * dir}`, within `max_dist_sq`.
    ///
    /// `dir` must be normalized by the caller.
    pub fn find_closest_along_dir(
        &self,
        q: DVec3,
        dir: DVec3,
        max_dist_sq: f64,
    ) -> Option<usize> {
        let mut state = ClosestLineState {
            q,
            dir,
            best_d2: max_dist_sq,
            best: None,
        };
        self.closest_line_rec(self.root, &mut state);
        state.best.map(|i| i as usize)
    }

    fn closest_line_rec(&self, node: u32, state: &mut ClosestLineState) {
        match self.node(node).kind {
            NodeKind::Leaf { start, len } => {
                for &i in self.leaf_ids(start, len) {
                    let d2 = geom::sq_dist_point_line(self.pts[i as usize], state.q, state.dir);
                    if d2 < state.best_d2 {
                        state.best_d2 = d2;
                        state.best = Some(i);
                    }
                }
            }
            NodeKind::Split { children, .. } => {
                // order the children by their conservative line distance
                let b0 = line_box_lower_bound(&self.node(children[0]).aabb, state.q, state.dir);
                let b1 = line_box_lower_bound(&self.node(children[1]).aabb, state.q, state.dir);
                let (first, b_first, second, b_second) = if b0 <= b1 {
                    (children[0], b0, children[1], b1)
                } else {
                    (children[1], b1, children[0], b0)
                };
                if b_first < state.best_d2 {
                    self.closest_line_rec(first, state);
                }
                if b_second < state.best_d2 {
                    self.closest_line_rec(second, state);
                }
            }
        }
    }

    /// The `k` live points closest to `q`, in unspecified order.
    ///
    /// When fewer than `k` live points exist, all of them are returned.
    pub fn k_nearest_neighbors(&self, q: DVec3, k: usize) -> Vec<usize> {
        if k == 0 || self.num_live == 0 {
            return vec![];
        }
        let mut state = KnnState {
            q,
            k,
            heap: BinaryHeap::new(),
        };
        self.knn_rec(self.root, &mut state);
        state.heap.into_iter().map(|c| c.id as usize).collect()
    }

    fn knn_rec(&self, node: u32, state: &mut KnnState) {
        match self.node(node).kind {
            NodeKind::Leaf { start, len } => {
                for &i in self.leaf_ids(start, len) {
                    let d2 = self.pts[i as usize].distance_squared(state.q);
                    if state.heap.len() < state.k {
                        state.heap.push(Candidate { id: i, d2 });
                    } else if state.heap.peek().is_some_and(|top| d2 < top.d2) {
                        state.heap.pop();
                        state.heap.push(Candidate { id: i, d2 });
                    }
                }
            }
            NodeKind::Split {
                axis,
                split,
                children,
            } => {
                let delta = state.q[axis as usize] - split;
                let (near, far) = if delta <= 0.0 {
                    (children[0], children[1])
                } else {
                    (children[1], children[0])
                };
                self.knn_rec(near, state);
                if delta * delta < state.prune_d2() {
                    self.knn_rec(far, state);
                }
            }
        }
    }

    /// Collect every live index within squared distance `r_sq` of `q`.
    pub fn fixed_range_search(&self, q: DVec3, r_sq: f64) -> Vec<usize> {
        let mut result = vec![];
        let mut stack: NodeStack = TinyVec::new();
        stack.push(self.root);
        while let Some(node) = stack.pop() {
            let n = self.node(node);
            if n.aabb.sq_dist_to_point(q) > r_sq {
                continue;
            }
            match n.kind {
                NodeKind::Leaf { start, len } => {
                    for &i in self.leaf_ids(start, len) {
                        if self.pts[i as usize].distance_squared(q) <= r_sq {
                            result.push(i as usize);
                        }
                    }
                }
                NodeKind::Split { children, .. } => {
                    stack.push(children[0]);
                    stack.push(children[1]);
                }
            }
        }
        result
    }

    /// Collect every live index whose squared perpendicular distance to the
    /// infinite line `{q + t * dir}` is at most `r_sq`.
    ///
    /// `dir` must be normalized by the caller.
    pub fn fixed_range_search_along_dir(&self, q: DVec3, dir: DVec3, r_sq: f64) -> Vec<usize> {
        let mut result = vec![];
        let mut stack: NodeStack = TinyVec::new();
        stack.push(self.root);
        while let Some(node) = stack.pop() {
            let n = self.node(node);
            if line_box_lower_bound(&n.aabb, q, dir) > r_sq {
                continue;
            }
            match n.kind {
                NodeKind::Leaf { start, len } => {
                    for &i in self.leaf_ids(start, len) {
                        if geom::sq_dist_point_line(self.pts[i as usize], q, dir) <= r_sq {
                            result.push(i as usize);
                        }
                    }
                }
                NodeKind::Split { children, .. } => {
                    stack.push(children[0]);
                    stack.push(children[1]);
                }
            }
        }
        result
    }

    /// Collect every live index inside the tube of squared radius `r_sq`
    /// around the line through `q` and `q2` whose projection onto that line
    /// falls between the two endpoints, inclusive.
    pub fn fixed_range_search_between_2_points(
        &self,
        q: DVec3,
        q2: DVec3,
        r_sq: f64,
    ) -> Vec<usize> {
        let seg = q2 - q;
        let seg_len = seg.length();
        if seg_len == 0.0 {
            return self.fixed_range_search(q, r_sq);
        }
        let dir = seg / seg_len;

        let mut result = vec![];
        let mut stack: NodeStack = TinyVec::new();
        stack.push(self.root);
        while let Some(node) = stack.pop() {
            let n = self.node(node);
            if line_box_lower_bound(&n.aabb, q, dir) > r_sq {
                continue;
            }
            // conservative projection window for the whole box
            let t_center = (n.aabb.center() - q).dot(dir);
            let slack = n.aabb.half_diagonal();
            if t_center + slack < 0.0 || t_center - slack > seg_len {
                continue;
            }
            match n.kind {
                NodeKind::Leaf { start, len } => {
                    for &i in self.leaf_ids(start, len) {
                        let p = self.pts[i as usize];
                        let t = (p - q).dot(dir);
                        if t < 0.0 || t > seg_len {
                            continue;
                        }
                        if geom::sq_dist_point_line(p, q, dir) <= r_sq {
                            result.push(i as usize);
                        }
                    }
                }
                NodeKind::Split { children, .. } => {
                    stack.push(children[0]);
                    stack.push(children[1]);
                }
            }
        }
        result
    }

    /// Collect every live index whose coordinates satisfy
    /// `lo <= p <= hi` componentwise.
    ///
    /// ## Errors
    ///
    /// - If `lo` exceeds `hi` on any axis.
    pub fn aabb_search(&self, lo: DVec3, hi: DVec3) -> Result<Vec<usize>> {
        if lo.cmpgt(hi).any() {
            return Err(ScanIndexError::InvalidArgument(
                "box minimum exceeds maximum".to_string(),
            ));
        }
        let query = Aabb { min: lo, max: hi };
        let mut result = vec![];
        let mut stack: NodeStack = TinyVec::new();
        stack.push(self.root);
        while let Some(node) = stack.pop() {
            let n = self.node(node);
            if !n.aabb.intersects_box(lo, hi) {
                continue;
            }
            match n.kind {
                NodeKind::Leaf { start, len } => {
                    for &i in self.leaf_ids(start, len) {
                        if query.contains_point(self.pts[i as usize]) {
                            result.push(i as usize);
                        }
                    }
                }
                NodeKind::Split { children, .. } => {
                    stack.push(children[0]);
                    stack.push(children[1]);
                }
            }
        }
        Ok(result)
    }

    /// Collect every live index within squared distance `r_sq` of the line
    /// segment `[q, q2]`.
    pub fn segment_search_all(&self, q: DVec3, q2: DVec3, r_sq: f64) -> Vec<usize> {
        // coarse prune against the segment's bounding sphere
        let center = (q + q2) * 0.5;
        let bound = 0.5 * q.distance(q2) + r_sq.sqrt();
        let bound_sq = bound * bound;

        let mut result = vec![];
        let mut stack: NodeStack = TinyVec::new();
        stack.push(self.root);
        while let Some(node) = stack.pop() {
            let n = self.node(node);
            if n.aabb.sq_dist_to_point(center) > bound_sq {
                continue;
            }
            match n.kind {
                NodeKind::Leaf { start, len } => {
                    for &i in self.leaf_ids(start, len) {
                        if geom::sq_dist_point_segment(self.pts[i as usize], q, q2) <= r_sq {
                            result.push(i as usize);
                        }
                    }
                }
                NodeKind::Split { children, .. } => {
                    stack.push(children[0]);
                    stack.push(children[1]);
                }
            }
        }
        result
    }

    /// The single live index closest to the segment `[q, q2]`, among those
    /// within squared distance `r_sq` of it.
    ///
    /// The result is always a member of the
    /// [`segment_search_all`][KdTree::segment_search_all] set for the same
    /// arguments; exact distance ties go to the last index in leaf order.
    pub fn segment_search_1_nearest_point(
        &self,
        q: DVec3,
        q2: DVec3,
        r_sq: f64,
    ) -> Option<usize> {
        // the furthest an admissible point can be is the segment length
        // plus the tube radius
        let init = q.distance(q2) + r_sq.sqrt();
        let mut state = SegmentNearestState {
            q,
            q2,
            r_sq,
            best_d2: init * init,
            best: None,
        };
        self.segment_nearest_rec(self.root, &mut state);
        state.best.map(|i| i as usize)
    }

    fn segment_nearest_rec(&self, node: u32, state: &mut SegmentNearestState) {
        match self.node(node).kind {
            NodeKind::Leaf { start, len } => {
                for &i in self.leaf_ids(start, len) {
                    let d2 = geom::sq_dist_point_segment(self.pts[i as usize], state.q, state.q2);
                    if d2 <= state.r_sq && d2 <= state.best_d2 {
                        state.best_d2 = d2;
                        state.best = Some(i);
                    }
                }
            }
            NodeKind::Split { children, .. } => {
                let b0 = segment_box_lower_bound(&self.node(children[0]).aabb, state.q, state.q2);
                let b1 = segment_box_lower_bound(&self.node(children[1]).aabb, state.q, state.q2);
                let (first, b_first, second, b_second) = if b0 <= b1 {
                    (children[0], b0, children[1], b1)
                } else {
                    (children[1], b1, children[0], b0)
                };
                if b_first <= state.best_d2 && b_first <= state.r_sq {
                    self.segment_nearest_rec(first, state);
                }
                if b_second <= state.best_d2 && b_second <= state.r_sq {
                    self.segment_nearest_rec(second, state);
                }
            }
        }
    }
}

/// Conservative lower bound on the squared perpendicular distance from any
/// point of the box to the line; never overestimates.
#[inline]
fn line_box_lower_bound(aabb: &Aabb, origin: DVec3, dir: DVec3) -> f64 {
    let center_d = geom::sq_dist_point_line(aabb.center(), origin, dir).sqrt();
    let d = (center_d - aabb.half_diagonal()).max(0.0);
    d * d
}

/// Conservative lower bound on the squared distance from any point of the
/// box to the segment `[a, b]`.
#[inline]
fn segment_box_lower_bound(aabb: &Aabb, a: DVec3, b: DVec3) -> f64 {
    let center_d = geom::sq_dist_point_segment(aabb.center(), a, b).sqrt();
    let d = (center_d - aabb.half_diagonal()).max(0.0);
    d * d
}
