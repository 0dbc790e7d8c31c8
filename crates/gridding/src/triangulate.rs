//! Linear interpolation over a Delaunay triangulation.
//!
//! Used for contour-vertex and dense point-cloud feeds, where nearest-neighbor
//! would leave visible terracing. Samples are triangulated with the
//! Bowyer-Watson algorithm (cavities found by walking triangle adjacency), then each triangle is rasterized onto the grid
//! with barycentric weights. Cells outside the convex hull are left no-data.

use std::collections::{HashMap, HashSet};

use map_common::{Grid, GridSpec, Sample};
use tracing::debug;

/// Coordinates closer than this (degrees) are merged before triangulating.
const MERGE_QUANTUM: f64 = 1e-6;

/// Barycentric slack so cells on a shared edge aren't dropped by rounding.
const EDGE_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
struct Vertex {
    x: f64,
    y: f64,
    value: f32,
}

#[derive(Debug, Clone, Copy)]
struct Triangle {
    v: [usize; 3],
    cx: f64,
    cy: f64,
    r2: f64,
}

impl Triangle {
    fn new(points: &[Vertex], a: usize, b: usize, c: usize) -> Option<Self> {
        let (pa, pb, pc) = (points[a], points[b], points[c]);
        let d = 2.0 * (pa.x * (pb.y - pc.y) + pb.x * (pc.y - pa.y) + pc.x * (pa.y - pb.y));
        if d.abs() < f64::EPSILON {
            return None;
        }
        let a2 = pa.x * pa.x + pa.y * pa.y;
        let b2 = pb.x * pb.x + pb.y * pb.y;
        let c2 = pc.x * pc.x + pc.y * pc.y;
        let cx = (a2 * (pb.y - pc.y) + b2 * (pc.y - pa.y) + c2 * (pa.y - pb.y)) / d;
        let cy = (a2 * (pc.x - pb.x) + b2 * (pa.x - pc.x) + c2 * (pb.x - pa.x)) / d;
        let r2 = (pa.x - cx).powi(2) + (pa.y - cy).powi(2);
        Some(Self { v: [a, b, c], cx, cy, r2 })
    }

    fn circumcircle_contains(&self, x: f64, y: f64) -> bool {
        (x - self.cx).powi(2) + (y - self.cy).powi(2) < self.r2
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.v;
        [edge(a, b), edge(b, c), edge(c, a)]
    }
}

fn edge(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Average values of samples that share (nearly) the same coordinate.
fn merge_duplicates(samples: &[Sample]) -> Vec<Vertex> {
    let mut index: HashMap<(i64, i64), usize> = HashMap::new();
    let mut sums: Vec<(f64, f64, f64, u32)> = Vec::new();

    for s in samples {
        let key = (
            (s.lon / MERGE_QUANTUM).round() as i64,
            (s.lat / MERGE_QUANTUM).round() as i64,
        );
        match index.get(&key) {
            Some(&i) => {
                sums[i].2 += s.value as f64;
                sums[i].3 += 1;
            }
            None => {
                index.insert(key, sums.len());
                sums.push((s.lon, s.lat, s.value as f64, 1));
            }
        }
    }

    sums.into_iter()
        .map(|(x, y, total, n)| Vertex {
            x,
            y,
            value: (total / n as f64) as f32,
        })
        .collect()
}

const NO_TRIANGLE: usize = usize::MAX;

/// Live triangles plus edge adjacency, so a point's cavity is found by
/// walking neighbors instead of testing every triangle.
#[derive(Default)]
struct Mesh {
    triangles: Vec<Triangle>,
    alive: Vec<bool>,
    edges: HashMap<(usize, usize), [usize; 2]>,
}

impl Mesh {
    fn insert(&mut self, t: Triangle) -> usize {
        let id = self.triangles.len();
        for e in t.edges() {
            let slot = self.edges.entry(e).or_insert([NO_TRIANGLE; 2]);
            if slot[0] == NO_TRIANGLE {
                slot[0] = id;
            } else {
                slot[1] = id;
            }
        }
        self.triangles.push(t);
        self.alive.push(true);
        id
    }

    fn remove(&mut self, id: usize) {
        self.alive[id] = false;
        for e in self.triangles[id].edges() {
            let empty = match self.edges.get_mut(&e) {
                Some(slot) => {
                    if slot[0] == id {
                        slot[0] = NO_TRIANGLE;
                    } else if slot[1] == id {
                        slot[1] = NO_TRIANGLE;
                    }
                    *slot == [NO_TRIANGLE; 2]
                }
                None => false,
            };
            if empty {
                self.edges.remove(&e);
            }
        }
    }

    /// The other live triangle sharing edge `e` with `id`.
    fn neighbor(&self, id: usize, e: (usize, usize)) -> Option<usize> {
        let slot = self.edges.get(&e)?;
        let other = if slot[0] == id { slot[1] } else { slot[0] };
        (other != NO_TRIANGLE).then_some(other)
    }

    /// Triangle containing `(x, y)`, found by walking from `start` toward it.
    fn locate(&self, points: &[Vertex], start: usize, x: f64, y: f64) -> Option<usize> {
        if !self.alive.get(start).copied().unwrap_or(false) {
            return None;
        }
        let mut current = start;
        for _ in 0..self.triangles.len() {
            let [a, b, c] = self.triangles[current].v;
            let step = [(a, b, c), (b, c, a), (c, a, b)]
                .into_iter()
                .find_map(|(p, q, opposite)| {
                    let side = orient(points[p], points[q], x, y);
                    let inner = orient(points[p], points[q], points[opposite].x, points[opposite].y);
                    (side * inner < 0.0).then(|| self.neighbor(current, edge(p, q)))
                });
            match step {
                None => return Some(current),
                Some(Some(next)) => current = next,
                Some(None) => return None,
            }
        }
        None
    }

    /// Any live triangle whose circumcircle holds `(x, y)`.
    fn enclosing(&self, x: f64, y: f64) -> Option<usize> {
        (0..self.triangles.len())
            .find(|&t| self.alive[t] && self.triangles[t].circumcircle_contains(x, y))
    }

    /// Triangles whose circumcircle holds `(x, y)`, connected to `seed`.
    fn cavity(&self, seed: usize, x: f64, y: f64) -> Vec<usize> {
        let mut seen: HashSet<usize> = HashSet::from([seed]);
        let mut cavity = vec![seed];
        let mut pending = vec![seed];
        while let Some(t) = pending.pop() {
            for e in self.triangles[t].edges() {
                let Some(next) = self.neighbor(t, e) else {
                    continue;
                };
                if !seen.contains(&next) && self.triangles[next].circumcircle_contains(x, y) {
                    seen.insert(next);
                    cavity.push(next);
                    pending.push(next);
                }
            }
        }
        cavity
    }
}

/// Twice the signed area of `(p, q, (x, y))`.
fn orient(p: Vertex, q: Vertex, x: f64, y: f64) -> f64 {
    (q.x - p.x) * (y - p.y) - (q.y - p.y) * (x - p.x)
}

/// Insertion order in alternating horizontal bands, so consecutive points
/// sit close together and each walk is short.
fn insertion_order(points: &[Vertex], min_y: f64, span: f64) -> Vec<usize> {
    let bands = (points.len() as f64).sqrt().ceil().max(1.0);
    let band_height = span / bands;
    let band = |p: &Vertex| ((p.y - min_y) / band_height).floor() as i64;

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&i, &j| {
        let (a, b) = (&points[i], &points[j]);
        let (band_a, band_b) = (band(a), band(b));
        band_a.cmp(&band_b).then_with(|| {
            if band_a % 2 == 0 {
                a.x.total_cmp(&b.x)
            } else {
                b.x.total_cmp(&a.x)
            }
        })
    });
    order
}

/// Delaunay triangulation of a point set. Returns vertex-index triples into `points`.
fn bowyer_watson(points: &mut Vec<Vertex>) -> Vec<Triangle> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points.iter() {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(1.0);
    let mid_x = (min_x + max_x) / 2.0;
    let mid_y = (min_y + max_y) / 2.0;
    let order = insertion_order(points, min_y, span);

    // Super triangle enclosing every point with a wide margin
    points.push(Vertex { x: mid_x - 20.0 * span, y: mid_y - span, value: 0.0 });
    points.push(Vertex { x: mid_x, y: mid_y + 20.0 * span, value: 0.0 });
    points.push(Vertex { x: mid_x + 20.0 * span, y: mid_y - span, value: 0.0 });

    let mut mesh = Mesh::default();
    let Some(root) = Triangle::new(points, n, n + 1, n + 2) else {
        return Vec::new();
    };
    let mut last = mesh.insert(root);

    for i in order {
        let p = points[i];
        let Some(seed) = mesh
            .locate(points, last, p.x, p.y)
            .or_else(|| mesh.enclosing(p.x, p.y))
        else {
            continue;
        };
        let bad = mesh.cavity(seed, p.x, p.y);

        let mut edge_count: HashMap<(usize, usize), u32> = HashMap::new();
        for &t in &bad {
            for e in mesh.triangles[t].edges() {
                *edge_count.entry(e).or_insert(0) += 1;
            }
        }
        for &t in &bad {
            mesh.remove(t);
        }

        for (&(a, b), &count) in &edge_count {
            if count == 1 {
                if let Some(t) = Triangle::new(points, a, b, i) {
                    last = mesh.insert(t);
                }
            }
        }
    }

    points.truncate(n);
    mesh.triangles
        .into_iter()
        .zip(mesh.alive)
        .filter(|(t, alive)| *alive && t.v.iter().all(|&v| v < n))
        .map(|(t, _)| t)
        .collect()
}

/// Linearly interpolate `samples` onto `spec`.
///
/// Returns `None` if the samples can't form a single triangle (fewer than
/// three distinct points, or all collinear).
pub fn linear_interpolate(samples: &[Sample], spec: GridSpec) -> Option<Grid> {
    let mut points = merge_duplicates(samples);
    let triangles = bowyer_watson(&mut points);
    debug!(
        samples = samples.len(),
        vertices = points.len(),
        triangles = triangles.len(),
        "Triangulated samples"
    );
    if triangles.is_empty() {
        return None;
    }

    let mut grid = Grid::no_data(spec);
    let rows = spec.rows();
    let cols = spec.cols();

    for t in &triangles {
        let [a, b, c] = t.v.map(|i| points[i]);

        let lon_lo = a.x.min(b.x).min(c.x);
        let lon_hi = a.x.max(b.x).max(c.x);
        let lat_lo = a.y.min(b.y).min(c.y);
        let lat_hi = a.y.max(b.y).max(c.y);

        let (row_lo, col_lo) = spec.fractional_index(lon_lo, lat_hi);
        let (row_hi, col_hi) = spec.fractional_index(lon_hi, lat_lo);
        if row_hi < 0.0 || col_hi < 0.0 || row_lo > (rows - 1) as f64 || col_lo > (cols - 1) as f64 {
            continue;
        }
        let r0 = row_lo.ceil().max(0.0) as usize;
        let r1 = (row_hi.floor() as usize).min(rows - 1);
        let c0 = col_lo.ceil().max(0.0) as usize;
        let c1 = (col_hi.floor() as usize).min(cols - 1);

        let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
        if det.abs() < f64::EPSILON {
            continue;
        }

        for row in r0..=r1 {
            let lat = spec.lat_at(row);
            for col in c0..=c1 {
                let lon = spec.lon_at(col);
                let w1 = ((b.y - c.y) * (lon - c.x) + (c.x - b.x) * (lat - c.y)) / det;
                let w2 = ((c.y - a.y) * (lon - c.x) + (a.x - c.x) * (lat - c.y)) / det;
                let w3 = 1.0 - w1 - w2;
                if w1 < -EDGE_SLACK || w2 < -EDGE_SLACK || w3 < -EDGE_SLACK {
                    continue;
                }
                let value = w1 * a.value as f64 + w2 * b.value as f64 + w3 * c.value as f64;
                grid.set(row, col, value as f32);
            }
        }
    }

    Some(grid)
}
