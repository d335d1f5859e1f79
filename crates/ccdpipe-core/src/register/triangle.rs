use std::collections::BTreeSet;

/// Sides shorter than this make a triangle degenerate.
const MIN_SIDE: f64 = 1e-6;

/// Twice the area must exceed this fraction of the longest side squared.
const MIN_AREA_RATIO: f64 = 1e-3;

/// Asterism of three control points.
///
/// `vertices` are ordered by the length of the side opposite each vertex,
/// shortest first, so the same vertex order comes out of any similar copy of
/// the triangle.
#[derive(Clone, Debug, PartialEq)]
pub struct Triangle {
    pub vertices: [usize; 3],
    /// (longest / middle, middle / shortest) side ratios.
    pub invariants: (f64, f64),
}

impl Triangle {
    pub fn from_points(indices: [usize; 3], points: &[(f64, f64)]) -> Option<Self> {
        let p = indices.map(|i| points[i]);
        let dist = |a: (f64, f64), b: (f64, f64)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();

        // side opposite each vertex
        let mut opposite = [
            (dist(p[1], p[2]), indices[0]),
            (dist(p[0], p[2]), indices[1]),
            (dist(p[0], p[1]), indices[2]),
        ];
        opposite.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let [short, middle, long] = [opposite[0].0, opposite[1].0, opposite[2].0];

        if short < MIN_SIDE {
            return None;
        }
        let cross = (p[1].0 - p[0].0) * (p[2].1 - p[0].1) - (p[1].1 - p[0].1) * (p[2].0 - p[0].0);
        if cross.abs() < MIN_AREA_RATIO * long * long {
            return None;
        }

        Some(Self {
            vertices: [opposite[0].1, opposite[1].1, opposite[2].1],
            invariants: (long / middle, middle / short),
        })
    }

    pub fn distance(&self, other: &Triangle) -> f64 {
        let d0 = self.invariants.0 - other.invariants.0;
        let d1 = self.invariants.1 - other.invariants.1;
        (d0 * d0 + d1 * d1).sqrt()
    }
}

/// Triangles formed by each point and every pair of its `neighbours`
/// nearest neighbours. Each vertex set appears once.
pub fn build_triangles(points: &[(f64, f64)], neighbours: usize) -> Vec<Triangle> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }
    let k = neighbours.min(n - 1);

    let mut seen: BTreeSet<[usize; 3]> = BTreeSet::new();
    let mut triangles = Vec::new();

    for i in 0..n {
        let mut others: Vec<(f64, usize)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| {
                let d = (points[j].0 - points[i].0).powi(2) + (points[j].1 - points[i].1).powi(2);
                (d, j)
            })
            .collect();
        others.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let nearest: Vec<usize> = others.iter().take(k).map(|&(_, j)| j).collect();

        for a in 0..nearest.len() {
            for b in (a + 1)..nearest.len() {
                let mut key = [i, nearest[a], nearest[b]];
                key.sort_unstable();
                if !seen.insert(key) {
                    continue;
                }
                if let Some(t) = Triangle::from_points(key, points) {
                    triangles.push(t);
                }
            }
        }
    }
    triangles
}

/// Pairs `(source, reference)` of triangle indices whose invariants lie
/// within `tolerance`, keeping the closest reference for each source triangle.
pub fn match_triangles(
    source: &[Triangle],
    reference: &[Triangle],
    tolerance: f64,
) -> Vec<(usize, usize)> {
    let mut matches = Vec::new();
    for (si, s) in source.iter().enumerate() {
        let best = reference
            .iter()
            .enumerate()
            .map(|(ri, r)| (s.distance(r), ri))
            .filter(|&(d, _)| d < tolerance)
            .min_by(|a, b| a.0.total_cmp(&b.0));
        if let Some((_, ri)) = best {
            matches.push((si, ri));
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariants_survive_similarity() {
        let points = vec![(0.0, 0.0), (4.0, 0.0), (0.0, 3.0)];
        let t = Triangle::from_points([0, 1, 2], &points).unwrap();
        assert!((t.invariants.0 - 5.0 / 4.0).abs() < 1e-12);
        assert!((t.invariants.1 - 4.0 / 3.0).abs() < 1e-12);
        // vertex opposite the shortest side (3) is point 1
        assert_eq!(t.vertices, [1, 2, 0]);

        // rotated by 90 degrees, scaled by 2, shifted
        let moved: Vec<(f64, f64)> = points
            .iter()
            .map(|&(x, y)| (-2.0 * y + 10.0, 2.0 * x - 5.0))
            .collect();
        let m = Triangle::from_points([0, 1, 2], &moved).unwrap();
        assert!(t.distance(&m) < 1e-12);
        assert_eq!(m.vertices, t.vertices);
    }

    #[test]
    fn test_collinear_points_rejected() {
        let points = vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
        assert!(Triangle::from_points([0, 1, 2], &points).is_none());
    }

    #[test]
    fn test_build_triangles_dedupes() {
        let points = vec![(0.0, 0.0), (10.0, 0.0), (0.0, 7.0), (9.0, 12.0)];
        let triangles = build_triangles(&points, 3);
        assert_eq!(triangles.len(), 4);
    }
}
