use glam::DVec3;
use rand::Rng;

use crate::geom::{circumcircle, spherical_triangle_area, triple};
use crate::sphere::tree::BuildCtx;

/// Nodes with at most this many points stop subdividing.
pub(crate) const LEAF_CUTOFF: usize = 100;

/// Circumcircle half-extents below this are treated as degenerate; a pile of
/// more than [`LEAF_CUTOFF`] duplicate directions must not recurse forever.
pub(crate) const MIN_CCR: f64 = 1e-10;

/// One spherical triangle of the subdivision.
#[derive(Debug)]
pub(crate) struct QuadNode {
    /// Circumcircle cap center on the unit sphere.
    pub(crate) ccp: DVec3,
    /// Circumcircle angular half-extent, radians.
    pub(crate) ccr: f64,
    /// Spherical triangle area.
    pub(crate) area: f64,
    pub(crate) kind: QuadKind,
}

#[derive(Debug)]
pub(crate) enum QuadKind {
    Leaf(Vec<u32>),
    /// Three corner triangles and the central inverted triangle.
    Split(Box<[QuadNode; 4]>),
}

impl QuadNode {
    /// Recursively build the triangle `(v1, v2, v3)` over the point indices
    /// in `ids`. Vertex arguments are indices into the shared pool.
    pub fn build(v1: u32, v2: u32, v3: u32, ids: Vec<u32>, ctx: &mut BuildCtx) -> QuadNode {
        let w1 = ctx.verts[v1 as usize];
        let w2 = ctx.verts[v2 as usize];
        let w3 = ctx.verts[v3 as usize];
        let (ccp, ccr) = circumcircle(w1, w2, w3);
        let area = spherical_triangle_area(w1, w2, w3);

        if ids.len() <= LEAF_CUTOFF || ccr < MIN_CCR {
            return QuadNode {
                ccp,
                ccr,
                area,
                kind: QuadKind::Leaf(ids),
            };
        }

        let v4 = ctx.middle(v1, v2);
        let v5 = ctx.middle(v2, v3);
        let v6 = ctx.middle(v3, v1);
        let w4 = ctx.verts[v4 as usize];
        let w5 = ctx.verts[v5 as usize];
        let w6 = ctx.verts[v6 as usize];

        let mut split_ids: [Vec<u32>; 4] = Default::default();
        for i in ids {
            let p = ctx.pts[i as usize];
            // A cascade of three half-space tests partitions totally; points
            // that fail all three land in the central triangle.
            let child = if triple(w4, w6, p) >= 0.0 {
                0
            } else if triple(w5, w4, p) >= 0.0 {
                1
            } else if triple(w6, w5, p) >= 0.0 {
                2
            } else {
                3
            };
            split_ids[child].push(i);
        }

        let [ids1, ids2, ids3, ids4] = split_ids;
        let children = Box::new([
            QuadNode::build(v1, v4, v6, ids1, ctx),
            QuadNode::build(v2, v5, v4, ids2, ctx),
            QuadNode::build(v3, v6, v5, ids3, ctx),
            QuadNode::build(v4, v5, v6, ids4, ctx),
        ]);
        QuadNode {
            ccp,
            ccr,
            area,
            kind: QuadKind::Split(children),
        }
    }

    /// Collect every index whose direction lies within angular distance `r`
    /// of the unit vector `q`.
    pub fn search(&self, pts: &[DVec3], q: DVec3, r: f64, out: &mut Vec<usize>) {
        match &self.kind {
            QuadKind::Leaf(ids) => {
                for &i in ids {
                    let dot = q.dot(pts[i as usize]);
                    // the dot product can overshoot 1 for near-identical
                    // directions
                    if dot >= 1.0 {
                        out.push(i as usize);
                        continue;
                    }
                    if dot.acos() < r {
                        out.push(i as usize);
                    }
                }
            }
            QuadKind::Split(children) => {
                let angle = q.dot(self.ccp).clamp(-1.0, 1.0).acos();
                if angle > r + self.ccr {
                    // the query cap cannot reach this triangle
                    return;
                }
                if angle < r - self.ccr {
                    // the query cap swallows the triangle whole
                    self.collect_all(out);
                    return;
                }
                for child in children.iter() {
                    child.search(pts, q, r, out);
                }
            }
        }
    }

    /// Area-proportional stochastic reduction; see
    /// [`QuadTree::reduce`][crate::sphere::QuadTree::reduce].
    pub fn reduce<R: Rng>(
        &self,
        theta: f64,
        cap_area: f64,
        numpts: f64,
        rng: &mut R,
        out: &mut Vec<usize>,
    ) {
        if matches!(self.kind, QuadKind::Leaf(_)) || self.ccr * 2.0 < theta {
            let mut all = vec![];
            self.collect_all(&mut all);
            // this triangle's share of a cap-sized neighborhood
            let want = numpts * self.area / cap_area;
            if all.len() as f64 <= want {
                out.extend(all);
                return;
            }
            // Bernoulli per point: many triangles owing a fractional count
            // must not all round down to zero.
            let p = (want / all.len() as f64).max(0.0);
            out.extend(all.into_iter().filter(|_| rng.gen_bool(p)));
            return;
        }
        if let QuadKind::Split(children) = &self.kind {
            for child in children.iter() {
                child.reduce(theta, cap_area, numpts, rng, out);
            }
        }
    }

    /// All indices at or below this node.
    pub fn collect_all(&self, out: &mut Vec<usize>) {
        match &self.kind {
            QuadKind::Leaf(ids) => out.extend(ids.iter().map(|&i| i as usize)),
            QuadKind::Split(children) => {
                for child in children.iter() {
                    child.collect_all(out);
                }
            }
        }
    }
}
