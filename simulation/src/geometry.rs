//! Planar geometry for unit shapes
//!
//! Polygons are lists of exterior rings. Sampling triangulates each ring by
//! ear clipping and picks triangles with probability proportional to area.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

/// z component of (b - a) x (c - a); positive when a, b, c turn left.
fn cross(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Point,
    pub b: Point,
    pub c: Point,
}

impl Triangle {
    pub fn area(&self) -> f64 {
        cross(self.a, self.b, self.c).abs() / 2.0
    }

    /// Uniform point inside the triangle from two uniform draws in [0, 1).
    pub fn point_at(&self, r1: f64, r2: f64) -> Point {
        let s = r1.sqrt();
        let (wa, wb, wc) = (1.0 - s, s * (1.0 - r2), s * r2);
        Point {
            x: wa * self.a.x + wb * self.b.x + wc * self.c.x,
            y: wa * self.a.y + wb * self.b.y + wc * self.c.y,
        }
    }

    fn contains_inclusive(&self, p: Point, eps: f64) -> bool {
        cross(self.a, self.b, p) >= -eps
            && cross(self.b, self.c, p) >= -eps
            && cross(self.c, self.a, p) >= -eps
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    pub ring: Vec<Point>,
}

impl Polygon {
    pub fn new(ring: Vec<Point>) -> Self {
        Self { ring }
    }

    /// Ring without the closing duplicate and without repeated vertices.
    fn vertices(&self) -> Vec<Point> {
        let mut pts: Vec<Point> = Vec::with_capacity(self.ring.len());
        for p in &self.ring {
            if pts.last() != Some(p) {
                pts.push(*p);
            }
        }
        while pts.len() > 1 && pts.first() == pts.last() {
            pts.pop();
        }
        pts
    }

    pub fn signed_area(&self) -> f64 {
        shoelace(&self.vertices())
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Even-odd ray casting test.
    pub fn contains(&self, p: Point) -> bool {
        let pts = self.vertices();
        let mut inside = false;
        let mut j = pts.len().wrapping_sub(1);
        for i in 0..pts.len() {
            let (a, b) = (pts[i], pts[j]);
            if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    pub fn triangulate(&self) -> Vec<Triangle> {
        let triangles = ear_clip(self.vertices());
        if !self.is_tiled_by(&triangles) {
            warn!(
                "Ring of {} vertices is not simple: triangles cover {:.6} of its area {:.6}, sampling density is skewed",
                self.ring.len(),
                triangles.iter().map(Triangle::area).sum::<f64>(),
                self.area()
            );
        }
        triangles
    }

    /// Whether `triangles` add up to the ring's area. Fails when clipping
    /// stalled or the ring crosses itself.
    fn is_tiled_by(&self, triangles: &[Triangle]) -> bool {
        let covered: f64 = triangles.iter().map(Triangle::area).sum();
        let area = self.area();
        (covered - area).abs() <= area * 1e-6
    }
}

fn shoelace(pts: &[Point]) -> f64 {
    if pts.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..pts.len() {
        let (a, b) = (pts[i], pts[(i + 1) % pts.len()]);
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

/// Ear clipping of a simple ring. A ring that stops yielding ears (self
/// intersecting or degenerate) returns the triangles found so far.
fn ear_clip(mut pts: Vec<Point>) -> Vec<Triangle> {
    if pts.len() < 3 {
        return Vec::new();
    }
    if shoelace(&pts) < 0.0 {
        pts.reverse();
    }
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for p in &pts {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let span = (max_x - min_x).max(max_y - min_y);
    let eps = span * span * 1e-12;

    let mut idx: Vec<usize> = (0..pts.len()).collect();
    let mut triangles = Vec::with_capacity(pts.len().saturating_sub(2));
    let mut cursor = 0usize;
    let mut misses = 0usize;

    while idx.len() > 3 {
        let m = idx.len();
        if misses >= m {
            break;
        }
        let i = cursor % m;
        let (prev, cur, next) = (pts[idx[(i + m - 1) % m]], pts[idx[i]], pts[idx[(i + 1) % m]]);
        let turn = cross(prev, cur, next);

        if turn.abs() <= eps {
            // Collinear vertex: contributes no area.
            idx.remove(i);
            misses = 0;
            continue;
        }
        if turn < 0.0 {
            cursor = i + 1;
            misses += 1;
            continue;
        }

        let ear = Triangle { a: prev, b: cur, c: next };
        let blocked = (0..m).any(|j| {
            if j == i || j == (i + m - 1) % m || j == (i + 1) % m {
                return false;
            }
            let p = pts[idx[j]];
            if p == prev || p == cur || p == next {
                return false;
            }
            let reflex = cross(pts[idx[(j + m - 1) % m]], p, pts[idx[(j + 1) % m]]) <= eps;
            reflex && ear.contains_inclusive(p, eps)
        });
        if blocked {
            cursor = i + 1;
            misses += 1;
            continue;
        }

        triangles.push(ear);
        idx.remove(i);
        misses = 0;
        cursor = if i == 0 { 0 } else { i - 1 };
    }

    if idx.len() == 3 {
        let last = Triangle {
            a: pts[idx[0]],
            b: pts[idx[1]],
            c: pts[idx[2]],
        };
        if last.area() > eps {
            triangles.push(last);
        }
    }
    triangles.retain(|t| t.area() > 0.0);
    triangles
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MultiPolygon(pub Vec<Polygon>);

impl MultiPolygon {
    pub fn from_rings(rings: &[Vec<[f64; 2]>]) -> Self {
        Self(
            rings
                .iter()
                .map(|r| Polygon::new(r.iter().copied().map(Point::from).collect()))
                .collect(),
        )
    }

    pub fn area(&self) -> f64 {
        self.0.iter().map(Polygon::area).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|p| p.ring.is_empty())
    }

    pub fn contains(&self, p: Point) -> bool {
        self.0.iter().any(|poly| poly.contains(p))
    }

    /// Area-weighted centroid; the vertex mean when the shape has no area.
    pub fn centroid(&self) -> Point {
        let (mut cx, mut cy, mut total) = (0.0, 0.0, 0.0);
        for poly in &self.0 {
            let pts = poly.vertices();
            let a = shoelace(&pts);
            if a == 0.0 {
                continue;
            }
            let (mut sx, mut sy) = (0.0, 0.0);
            for i in 0..pts.len() {
                let (p, q) = (pts[i], pts[(i + 1) % pts.len()]);
                let f = p.x * q.y - q.x * p.y;
                sx += (p.x + q.x) * f;
                sy += (p.y + q.y) * f;
            }
            let (px, py) = (sx / (6.0 * a), sy / (6.0 * a));
            cx += px * a.abs();
            cy += py * a.abs();
            total += a.abs();
        }
        if total > 0.0 {
            return Point::new(cx / total, cy / total);
        }
        let all: Vec<Point> = self.0.iter().flat_map(|p| p.ring.iter().copied()).collect();
        if all.is_empty() {
            return Point::default();
        }
        let n = all.len() as f64;
        Point::new(
            all.iter().map(|p| p.x).sum::<f64>() / n,
            all.iter().map(|p| p.y).sum::<f64>() / n,
        )
    }

    pub fn triangulate(&self) -> Vec<Triangle> {
        self.0.iter().flat_map(Polygon::triangulate).collect()
    }
}

/// Triangulated shape prepared for repeated uniform sampling.
#[derive(Debug, Clone)]
pub struct SamplingSurface {
    triangles: Vec<Triangle>,
    cumulative: Vec<f64>,
}

impl SamplingSurface {
    /// `None` when the shape yields no triangle of positive area.
    pub fn new(shape: &MultiPolygon) -> Option<Self> {
        let triangles = shape.triangulate();
        if triangles.is_empty() {
            return None;
        }
        let mut acc = 0.0;
        let cumulative = triangles
            .iter()
            .map(|t| {
                acc += t.area();
                acc
            })
            .collect();
        Some(Self { triangles, cumulative })
    }

    pub fn area(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Point {
        let target = rng.gen::<f64>() * self.area();
        let idx = self
            .cumulative
            .partition_point(|c| *c <= target)
            .min(self.triangles.len() - 1);
        self.triangles[idx].point_at(rng.gen::<f64>(), rng.gen::<f64>())
    }
}
