use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geom;
use crate::kdtree::KdTreeBuilder;
use crate::ScanIndexError;

fn cloud(n: usize, seed: u64) -> Vec<DVec3> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            DVec3::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            )
        })
        .collect()
}

fn sorted(mut ids: Vec<usize>) -> Vec<usize> {
    ids.sort_unstable();
    ids
}

fn brute_closest(pts: &[DVec3], q: DVec3, max_dist_sq: f64) -> Option<usize> {
    let mut best = None;
    let mut best_d2 = max_dist_sq;
    for (i, p) in pts.iter().enumerate() {
        let d2 = p.distance_squared(q);
        if d2 < best_d2 {
            best_d2 = d2;
            best = Some(i);
        }
    }
    best
}

fn brute_knn(pts: &[DVec3], q: DVec3, k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..pts.len()).collect();
    order.sort_by(|&a, &b| {
        pts[a]
            .distance_squared(q)
            .total_cmp(&pts[b].distance_squared(q))
    });
    order.truncate(k);
    order
}

#[test]
fn find_closest_seed_case() {
    let pts = vec![
        DVec3::new(0.0, 0.0, 0.0),
        DVec3::new(1.0, 0.0, 0.0),
        DVec3::new(0.0, 1.0, 0.0),
        DVec3::new(0.0, 0.0, 1.0),
    ];
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    assert_eq!(tree.find_closest(DVec3::new(0.1, 0.1, 0.1), 1.0), Some(0));
}

#[test]
fn find_closest_limit_is_exclusive() {
    let pts = vec![DVec3::new(1.0, 0.0, 0.0)];
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    // a point at exactly the maximum squared distance is not a match
    assert_eq!(tree.find_closest(DVec3::ZERO, 1.0), None);
    assert_eq!(tree.find_closest(DVec3::ZERO, 1.0 + 1e-9), Some(0));
}

#[test]
fn find_closest_matches_brute_force() {
    let pts = cloud(500, 1);
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    for q in cloud(40, 2) {
        assert_eq!(
            tree.find_closest(q, f64::INFINITY),
            brute_closest(&pts, q, f64::INFINITY)
        );
        assert_eq!(tree.find_closest(q, 4.0), brute_closest(&pts, q, 4.0));
    }
}

#[test]
fn find_closest_ties_prefer_smaller_index() {
    let mut pts = cloud(40, 3);
    let dup = DVec3::new(3.0, 3.0, 3.0);
    pts[7] = dup;
    pts[2] = dup;
    let tree = KdTreeBuilder::new(&pts).with_bucket_size(4).finish().unwrap();
    assert_eq!(tree.find_closest(dup, f64::INFINITY), Some(2));
}

#[test]
fn knn_grid_seed_case() {
    let mut pts = vec![];
    for x in 0..3 {
        for y in 0..3 {
            for z in 0..3 {
                pts.push(DVec3::new(x as f64, y as f64, z as f64));
            }
        }
    }
    let tree = KdTreeBuilder::new(&pts).with_bucket_size(4).finish().unwrap();
    let result = sorted(tree.k_nearest_neighbors(DVec3::new(1.0, 1.0, 1.0), 7));
    // the center plus its six axis neighbors
    assert_eq!(result, vec![4, 10, 12, 13, 14, 16, 22]);
}

#[test]
fn knn_matches_brute_force() {
    let pts = cloud(300, 4);
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    for q in cloud(20, 5) {
        for k in [1, 4, 17] {
            assert_eq!(
                sorted(tree.k_nearest_neighbors(q, k)),
                sorted(brute_knn(&pts, q, k))
            );
        }
    }
}

#[test]
fn knn_with_fewer_points_returns_all() {
    let pts = cloud(12, 6);
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    let result = sorted(tree.k_nearest_neighbors(DVec3::ZERO, 50));
    assert_eq!(result, (0..12).collect::<Vec<_>>());
    assert!(tree.k_nearest_neighbors(DVec3::ZERO, 0).is_empty());
}

#[test]
fn fixed_range_search_matches_brute_force() {
    let pts = cloud(400, 7);
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    for q in cloud(15, 8) {
        for r_sq in [1.0, 9.0, 100.0] {
            let expected: Vec<usize> = (0..pts.len())
                .filter(|&i| pts[i].distance_squared(q) <= r_sq)
                .collect();
            assert_eq!(sorted(tree.fixed_range_search(q, r_sq)), expected);
        }
    }
}

#[test]
fn fixed_range_search_radius_is_inclusive() {
    let pts = vec![DVec3::new(1.0, 0.0, 0.0)];
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    assert_eq!(tree.fixed_range_search(DVec3::ZERO, 1.0), vec![0]);
}

#[test]
fn fixed_range_search_along_dir_matches_brute_force() {
    let pts = cloud(400, 9);
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    let dirs = [
        DVec3::X,
        DVec3::new(1.0, 1.0, 0.0).normalize(),
        DVec3::new(-0.3, 0.4, 0.9).normalize(),
    ];
    for (q, dir) in cloud(6, 10).into_iter().zip(dirs.iter().cycle()) {
        for r_sq in [0.5, 4.0] {
            let expected: Vec<usize> = (0..pts.len())
                .filter(|&i| geom::sq_dist_point_line(pts[i], q, *dir) <= r_sq)
                .collect();
            assert_eq!(
                sorted(tree.fixed_range_search_along_dir(q, *dir, r_sq)),
                expected
            );
        }
    }
}

#[test]
fn find_closest_along_dir_matches_brute_force() {
    let pts = cloud(300, 11);
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    let dir = DVec3::new(0.5, -1.0, 2.0).normalize();
    for q in cloud(12, 12) {
        let mut best = None;
        let mut best_d2 = 2.0;
        for (i, p) in pts.iter().enumerate() {
            let d2 = geom::sq_dist_point_line(*p, q, dir);
            if d2 < best_d2 {
                best_d2 = d2;
                best = Some(i);
            }
        }
        assert_eq!(tree.find_closest_along_dir(q, dir, 2.0), best);
    }
}

#[test]
fn between_2_points_matches_brute_force() {
    let pts = cloud(400, 13);
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    let q = DVec3::new(-6.0, -2.0, 1.0);
    let q2 = DVec3::new(5.0, 3.0, -4.0);
    let dir = (q2 - q).normalize();
    let seg_len = q.distance(q2);
    for r_sq in [1.0, 9.0] {
        let expected: Vec<usize> = (0..pts.len())
            .filter(|&i| {
                let t = (pts[i] - q).dot(dir);
                (0.0..=seg_len).contains(&t) && geom::sq_dist_point_line(pts[i], q, dir) <= r_sq
            })
            .collect();
        assert_eq!(
            sorted(tree.fixed_range_search_between_2_points(q, q2, r_sq)),
            expected
        );
    }
}

#[test]
fn between_2_points_includes_endpoint_projections() {
    let pts = vec![
        DVec3::new(0.0, 1.0, 0.0),
        DVec3::new(4.0, 1.0, 0.0),
        DVec3::new(-0.5, 0.5, 0.0),
        DVec3::new(4.5, 0.5, 0.0),
    ];
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    let q = DVec3::ZERO;
    let q2 = DVec3::new(4.0, 0.0, 0.0);
    // projections at exactly t = 0 and t = |q2 - q| stay in; overshoots drop
    assert_eq!(
        sorted(tree.fixed_range_search_between_2_points(q, q2, 1.0)),
        vec![0, 1]
    );
}

#[test]
fn aabb_search_seed_cases() {
    let mut corners = vec![];
    for x in 0..2 {
        for y in 0..2 {
            for z in 0..2 {
                corners.push(DVec3::new(x as f64, y as f64, z as f64));
            }
        }
    }
    let tree = KdTreeBuilder::new(&corners).finish().unwrap();
    let result = tree
        .aabb_search(DVec3::splat(-1.0), DVec3::splat(0.5))
        .unwrap();
    assert_eq!(result, vec![0]);

    let err = tree.aabb_search(DVec3::ONE, DVec3::ZERO).unwrap_err();
    assert!(matches!(err, ScanIndexError::InvalidArgument(_)));
}

#[test]
fn aabb_search_matches_brute_force() {
    let pts = cloud(400, 14);
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    let lo = DVec3::new(-5.0, -8.0, -2.0);
    let hi = DVec3::new(4.0, 1.0, 7.5);
    let expected: Vec<usize> = (0..pts.len())
        .filter(|&i| lo.cmple(pts[i]).all() && pts[i].cmple(hi).all())
        .collect();
    assert_eq!(sorted(tree.aabb_search(lo, hi).unwrap()), expected);
}

#[test]
fn segment_search_seed_case() {
    let pts = vec![
        DVec3::new(0.0, 0.0, 0.0),
        DVec3::new(10.0, 0.0, 0.0),
        DVec3::new(5.0, 0.0, 0.0),
        DVec3::new(5.0, 1.0, 0.0),
    ];
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    let q = DVec3::ZERO;
    let q2 = DVec3::new(10.0, 0.0, 0.0);
    assert_eq!(sorted(tree.segment_search_all(q, q2, 4.0)), vec![0, 1, 2, 3]);
    assert_eq!(tree.segment_search_1_nearest_point(q, q2, 4.0), Some(2));
}

#[test]
fn segment_search_all_matches_brute_force() {
    let pts = cloud(400, 15);
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    let q = DVec3::new(-7.0, 0.0, 3.0);
    let q2 = DVec3::new(6.0, 2.0, -5.0);
    for r_sq in [0.5, 4.0, 25.0] {
        let expected: Vec<usize> = (0..pts.len())
            .filter(|&i| geom::sq_dist_point_segment(pts[i], q, q2) <= r_sq)
            .collect();
        assert_eq!(sorted(tree.segment_search_all(q, q2, r_sq)), expected);
    }
}

#[test]
fn segment_nearest_refines_segment_all() {
    let pts = cloud(350, 16);
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    let segments = [
        (DVec3::new(-9.0, -9.0, -9.0), DVec3::new(9.0, 9.0, 9.0)),
        (DVec3::new(2.0, -1.0, 0.0), DVec3::new(2.5, -1.0, 0.5)),
        (DVec3::new(40.0, 40.0, 40.0), DVec3::new(50.0, 40.0, 40.0)),
    ];
    for (q, q2) in segments {
        for r_sq in [0.25, 4.0] {
            let all = tree.segment_search_all(q, q2, r_sq);
            let nearest = tree.segment_search_1_nearest_point(q, q2, r_sq);
            match nearest {
                None => assert!(all.is_empty()),
                Some(i) => {
                    assert!(all.contains(&i));
                    let best = geom::sq_dist_point_segment(pts[i], q, q2);
                    for &j in &all {
                        assert!(best <= geom::sq_dist_point_segment(pts[j], q, q2));
                    }
                }
            }
        }
    }
}

#[test]
fn remove_hides_the_index_from_queries() {
    let pts = cloud(200, 17);
    let mut tree = KdTreeBuilder::new(&pts).finish().unwrap();
    assert_eq!(tree.remove(pts[17]), 1);
    assert_eq!(tree.len(), 199);

    let expected: Vec<usize> = (0..pts.len())
        .filter(|&i| i != 17 && pts[i].distance_squared(pts[17]) <= 9.0)
        .collect();
    assert_eq!(sorted(tree.fixed_range_search(pts[17], 9.0)), expected);

    // the closest point is now the nearest survivor
    let mut best = None;
    let mut best_d2 = f64::INFINITY;
    for (i, p) in pts.iter().enumerate() {
        if i == 17 {
            continue;
        }
        let d2 = p.distance_squared(pts[17]);
        if d2 < best_d2 {
            best_d2 = d2;
            best = Some(i);
        }
    }
    assert_eq!(tree.find_closest(pts[17], f64::INFINITY), best);
    assert!(!tree.collect_pts().contains(&17));
}

#[test]
fn remove_is_idempotent() {
    let pts = cloud(50, 18);
    let mut tree = KdTreeBuilder::new(&pts).finish().unwrap();
    assert_eq!(tree.remove(pts[3]), 1);
    assert_eq!(tree.remove(pts[3]), 0);
    assert_eq!(tree.len(), 49);
    assert_eq!(tree.remove(DVec3::splat(1234.0)), 0);
}

#[test]
fn remove_unlinks_duplicates_one_per_call() {
    let mut pts = cloud(60, 19);
    let dup = DVec3::new(-2.0, 5.0, 0.5);
    pts[11] = dup;
    pts[41] = dup;
    let mut tree = KdTreeBuilder::new(&pts).finish().unwrap();

    assert_eq!(tree.remove(dup), 1);
    assert_eq!(tree.len(), 59);
    // the twin is still indexed
    assert!(tree.find_closest(dup, 1e-12).is_some());
    assert_eq!(tree.remove(dup), 1);
    assert_eq!(tree.remove(dup), 0);
    assert_eq!(tree.len(), 58);
}

#[test]
fn collect_pts_returns_every_live_index() {
    let pts = cloud(137, 20);
    let tree = KdTreeBuilder::new(&pts).finish().unwrap();
    assert_eq!(sorted(tree.collect_pts()), (0..137).collect::<Vec<_>>());
}

#[test]
fn bucket_size_zero_is_rejected() {
    let pts = cloud(10, 21);
    let err = KdTreeBuilder::new(&pts)
        .with_bucket_size(0)
        .finish()
        .unwrap_err();
    assert!(matches!(err, ScanIndexError::InvalidArgument(_)));
}

#[test]
fn bucket_size_one_builds_a_correct_tree() {
    let pts = cloud(50, 22);
    let tree = KdTreeBuilder::new(&pts).with_bucket_size(1).finish().unwrap();
    for q in cloud(10, 23) {
        assert_eq!(
            tree.find_closest(q, f64::INFINITY),
            brute_closest(&pts, q, f64::INFINITY)
        );
    }
}

#[test]
fn duplicate_heavy_input_falls_back_to_leaves() {
    // more duplicates than the bucket size cannot be split apart
    let mut pts = vec![DVec3::new(1.0, 2.0, 3.0); 40];
    pts.push(DVec3::new(8.0, 8.0, 8.0));
    let tree = KdTreeBuilder::new(&pts).with_bucket_size(5).finish().unwrap();
    assert_eq!(
        tree.fixed_range_search(DVec3::new(1.0, 2.0, 3.0), 0.0).len(),
        40
    );
}

#[test]
fn empty_tree_answers_every_query() {
    let pts: Vec<DVec3> = vec![];
    let mut tree = KdTreeBuilder::new(&pts).finish().unwrap();
    assert!(tree.is_empty());
    assert_eq!(tree.find_closest(DVec3::ZERO, f64::INFINITY), None);
    assert!(tree.k_nearest_neighbors(DVec3::ZERO, 3).is_empty());
    assert!(tree.fixed_range_search(DVec3::ZERO, 100.0).is_empty());
    assert!(tree
        .aabb_search(DVec3::splat(-1.0), DVec3::ONE)
        .unwrap()
        .is_empty());
    assert_eq!(tree.remove(DVec3::ZERO), 0);
    assert!(tree.collect_pts().is_empty());
}
