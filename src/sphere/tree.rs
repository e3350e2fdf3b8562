use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::sphere::node::QuadNode;
use crate::ScanIndexError;

/// Shared subdivision state threaded through the recursive build.
pub(crate) struct BuildCtx<'p> {
    pub pts: &'p [DVec3],
    pub verts: Vec<DVec3>,
    middle: FxHashMap<(u32, u32), u32>,
}

impl BuildCtx<'_> {
    /// Vertex index of the midpoint between `a` and `b`. Adjacent triangles
    /// share subdivided corners through the pair map, so no midpoint is
    /// computed twice.
    pub fn middle(&mut self, a: u32, b: u32) -> u32 {
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(&m) = self.middle.get(&key) {
            return m;
        }
        let mid = ((self.verts[a as usize] + self.verts[b as usize]) * 0.5).normalize();
        self.verts.push(mid);
        let m = (self.verts.len() - 1) as u32;
        self.middle.insert(key, m);
        m
    }
}

/// A spherical quadtree indexing unit directions.
///
/// Built once over a point set and then queried many times; the tree owns
/// normalized copies of the inputs and is fully immutable after
/// construction.
#[derive(Debug)]
pub struct QuadTree {
    pts: Vec<DVec3>,
    verts: Vec<DVec3>,
    roots: [QuadNode; 8],
}

impl QuadTree {
    /// Build a tree over the given directions.
    ///
    /// Inputs need not be unit length; each is normalized before indexing.
    /// Query results are indices into the input slice.
    pub fn build(input: &[DVec3]) -> QuadTree {
        let pts: Vec<DVec3> = input.iter().map(|p| p.normalize()).collect();

        // The octahedron is aligned with the coordinate axes, so octant
        // classification is a sign check and only eight faces ever compete
        // for a point.
        let verts = vec![
            DVec3::new(-1.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, -1.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, -1.0),
            DVec3::new(0.0, 0.0, 1.0),
        ];

        let mut octants = [[0u32; 3]; 8];
        let mut slot = 0;
        for x in [-1i32, 1] {
            for y in [-1i32, 1] {
                for z in [-1i32, 1] {
                    let mut v1 = if x < 0 { 0 } else { 1 };
                    let v2 = if y < 0 { 2 } else { 3 };
                    let mut v3 = if z < 0 { 4 } else { 5 };
                    // keep the winding outward under the right-hand rule
                    if !((x > 0) ^ (y > 0) ^ (z > 0)) {
                        std::mem::swap(&mut v1, &mut v3);
                    }
                    octants[slot] = [v1, v2, v3];
                    slot += 1;
                }
            }
        }

        let mut buckets: [Vec<u32>; 8] = Default::default();
        for (i, p) in pts.iter().enumerate() {
            let octant = ((p.x > 0.0) as usize) << 2
                | ((p.y > 0.0) as usize) << 1
                | (p.z > 0.0) as usize;
            buckets[octant].push(i as u32);
        }

        let mut ctx = BuildCtx {
            pts: &pts,
            verts,
            middle: FxHashMap::default(),
        };
        let roots: [QuadNode; 8] = std::array::from_fn(|i| {
            let [v1, v2, v3] = octants[i];
            QuadNode::build(v1, v2, v3, std::mem::take(&mut buckets[i]), &mut ctx)
        });
        let verts = ctx.verts;

        QuadTree { pts, verts, roots }
    }

    /// Number of indexed directions.
    pub fn len(&self) -> usize {
        self.pts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pts.is_empty()
    }

    /// The normalized directions this tree indexes.
    pub fn points(&self) -> &[DVec3] {
        &self.pts
    }

    /// The shared corner vertices of the subdivision triangles.
    pub fn vertices(&self) -> &[DVec3] {
        &self.verts
    }

    /// Every indexed direction within angular distance `r` (radians) of the
    /// unit vector `q`.
    pub fn search(&self, q: DVec3, r: f64) -> Vec<usize> {
        let mut out = vec![];
        for root in &self.roots {
            root.search(&self.pts, q, r, &mut out);
        }
        out
    }

    /// Area-proportional stochastic downsampling.
    ///
    /// `theta` is the angular radius of the reference cap and `numpts` the
    /// number of points the caller wants per cap-sized neighborhood; the
    /// expected total is `numpts * 4 * pi / cap_area`. Each call draws from
    /// a fresh generator seeded with 0, so a given tree and arguments always
    /// reduce to the same subset; use
    /// [`reduce_with_rng`][QuadTree::reduce_with_rng] to supply a caller-
    /// managed generator instead.
    ///
    /// ## Errors
    ///
    /// - If `numpts` is zero.
    pub fn reduce(&self, theta: f64, numpts: usize) -> Result<Vec<usize>> {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        self.reduce_with_rng(theta, numpts, &mut rng)
    }

    /// [`reduce`][QuadTree::reduce] with an explicit random source. Parallel
    /// callers wanting reproducible reductions should give each worker its
    /// own seeded generator.
    pub fn reduce_with_rng<R: Rng>(
        &self,
        theta: f64,
        numpts: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        if numpts == 0 {
            return Err(ScanIndexError::InvalidArgument(
                "number of points per cap must be positive".to_string(),
            ));
        }
        // area of the sphere cap under angle theta
        let cap_area = 2.0 * std::f64::consts::PI * (1.0 - theta.cos());
        let mut out = vec![];
        for root in &self.roots {
            root.reduce(theta, cap_area, numpts as f64, rng, &mut out);
        }
        Ok(out)
    }

    #[cfg(test)]
    pub(crate) fn roots(&self) -> &[QuadNode; 8] {
        &self.roots
    }
}
