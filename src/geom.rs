//! Elementary 3-vector geometry shared by the index cores.

use glam::DVec3;

/// An axis-aligned box in 3-space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Exact min-max envelope of the points selected by `ids`.
    pub fn from_indexed_points(pts: &[DVec3], ids: &[u32]) -> Self {
        if ids.is_empty() {
            return Self {
                min: DVec3::ZERO,
                max: DVec3::ZERO,
            };
        }
        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        for &i in ids {
            min = min.min(pts[i as usize]);
            max = max.max(pts[i as usize]);
        }
        Self { min, max }
    }

    #[inline]
    pub fn extent(&self) -> DVec3 {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Radius of the bounding sphere around the box center.
    #[inline]
    pub fn half_diagonal(&self) -> f64 {
        0.5 * self.extent().length()
    }

    /// Axis of largest extent; ties go to the lowest axis.
    #[inline]
    pub fn longest_axis(&self) -> usize {
        let e = self.extent();
        let mut axis = 0;
        if e.y > e[axis] {
            axis = 1;
        }
        if e.z > e[axis] {
            axis = 2;
        }
        axis
    }

    /// Squared distance from `q` to the nearest point of the box, zero when
    /// `q` lies inside it.
    #[inline]
    pub fn sq_dist_to_point(&self, q: DVec3) -> f64 {
        let nearest = q.max(self.min).min(self.max);
        q.distance_squared(nearest)
    }

    #[inline]
    pub fn contains_point(&self, p: DVec3) -> bool {
        self.min.cmple(p).all() && p.cmple(self.max).all()
    }

    #[inline]
    pub fn intersects_box(&self, lo: DVec3, hi: DVec3) -> bool {
        self.min.cmple(hi).all() && lo.cmple(self.max).all()
    }
}

/// Center and angular half-extent of the smallest spherical cap containing
/// the three unit vectors of a triangle.
///
/// The planar circumcircle is computed in the triangle's plane; its center is
/// then projected back onto the sphere so that angular comparisons against
/// other unit vectors stay cheap. The half-extent is the half angle under
/// which the circle is seen from the sphere center, not the planar radius.
pub(crate) fn circumcircle(v1: DVec3, v2: DVec3, v3: DVec3) -> (DVec3, f64) {
    let a = v1 - v3;
    let b = v2 - v3;
    let axb = a.cross(b);
    let la2 = a.length_squared();
    let lb2 = b.length_squared();
    let laxb2 = axb.length_squared();
    let r = (a.length() * b.length() * (a - b).length()) / (2.0 * axb.length());
    // r can overshoot 1 for triangles spanning a near-great circle
    let theta = r.min(1.0).asin();
    let center = (la2 * b - lb2 * a).cross(axb) / (2.0 * laxb2) + v3;
    (center.normalize(), theta)
}

/// Area of the spherical triangle `(v1, v2, v3)` on the unit sphere.
///
/// Spherical excess `alpha + beta + gamma - pi`, with each interior angle
/// taken between the planes through the sphere center and one triangle edge.
pub(crate) fn spherical_triangle_area(v1: DVec3, v2: DVec3, v3: DVec3) -> f64 {
    use std::f64::consts::PI;

    let na = (v1 - v2).cross(v1).normalize();
    let nb = (v2 - v3).cross(v2).normalize();
    let nc = (v3 - v1).cross(v3).normalize();
    let alpha = PI - na.dot(nb).clamp(-1.0, 1.0).acos();
    let beta = PI - nb.dot(nc).clamp(-1.0, 1.0).acos();
    let gamma = PI - nc.dot(na).clamp(-1.0, 1.0).acos();
    alpha + beta + gamma - PI
}

/// Scalar triple product `(a x b) . c`.
#[inline]
pub(crate) fn triple(a: DVec3, b: DVec3, c: DVec3) -> f64 {
    a.cross(b).dot(c)
}

/// Squared perpendicular distance from `p` to the infinite line through
/// `origin` with unit direction `dir`.
#[inline]
pub(crate) fn sq_dist_point_line(p: DVec3, origin: DVec3, dir: DVec3) -> f64 {
    let w = p - origin;
    let t = w.dot(dir);
    (w.length_squared() - t * t).max(0.0)
}

/// Squared distance from `p` to the closed segment `[a, b]`.
#[inline]
pub(crate) fn sq_dist_point_segment(p: DVec3, a: DVec3, b: DVec3) -> f64 {
    let d = b - a;
    let len2 = d.length_squared();
    if len2 == 0.0 {
        return p.distance_squared(a);
    }
    let t = ((p - a).dot(d) / len2).clamp(0.0, 1.0);
    p.distance_squared(a + d * t)
}
