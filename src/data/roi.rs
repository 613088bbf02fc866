//! Regions of interest.
//!
//! A ROI is a pure spatial predicate on voxel coordinates. Two shapes
//! exist: an axis-aligned box (`RectRoi`) and a set of per-plane
//! polygons (`PolygonRoi`). A `Bundle` owns exactly one of them at a
//! time through the `ActiveRoi` enum.

/// Viewing planes, numbered the way slice views are numbered:
/// the plane index is the axis perpendicular to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    /// Perpendicular to X: horizontal axis Z, vertical axis Y.
    ZY = 0,
    /// Perpendicular to Y: horizontal axis X, vertical axis Z.
    XZ = 1,
    /// Perpendicular to Z: horizontal axis X, vertical axis Y.
    XY = 2,
}

impl Plane {
    pub fn from_dir(dir : usize) -> Option<Plane> {
        match dir {
            0 => Some(Plane::ZY),
            1 => Some(Plane::XZ),
            2 => Some(Plane::XY),
            _ => None,
        }
    }

    /// Project a 3d point onto this plane's (horizontal, vertical) axes.
    #[inline]
    pub fn project(&self, x : f64, y : f64, z : f64) -> (f64, f64) {
        match self {
            Plane::ZY => (z, y),
            Plane::XZ => (x, z),
            Plane::XY => (x, y),
        }
    }
}

/// Uniform contract for every ROI shape. `in_range` never mutates.
pub trait Roi : Send + Sync {
    fn in_range(&self, x : i64, y : i64, z : i64) -> bool;
}

/// Which bound of an axis is being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Low,
    High,
}

/// Axis-aligned box with inclusive bounds. `min[d] <= max[d]` always.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RectRoi {
    min : [i64; 3],
    max : [i64; 3],
}

impl RectRoi {
    /// Builds a box from two corners in any order.
    pub fn new(a : [i64; 3], b : [i64; 3]) -> Self {
        let mut roi = RectRoi { min : [0; 3], max : [0; 3] };
        roi.set_bounds(a, b);
        roi
    }

    /// A box covering a whole volume of the given extent.
    pub fn covering(extent : [usize; 3]) -> Self {
        RectRoi::new(
            [0, 0, 0],
            [extent[0] as i64 - 1, extent[1] as i64 - 1, extent[2] as i64 - 1],
        )
    }

    pub fn min(&self) -> [i64; 3] { self.min }
    pub fn max(&self) -> [i64; 3] { self.max }

    /// Number of voxels along `axis`.
    pub fn size(&self, axis : usize) -> i64 {
        self.max[axis] - self.min[axis] + 1
    }

    /// Replace all bounds directly.
    pub fn set_bounds(&mut self, a : [i64; 3], b : [i64; 3]) {
        for d in 0..3 {
            self.min[d] = a[d].min(b[d]);
            self.max[d] = a[d].max(b[d]);
        }
    }

    /// Replace the bounds of a single axis.
    pub fn set_axis(&mut self, axis : usize, low : i64, high : i64) {
        self.min[axis] = low.min(high);
        self.max[axis] = low.max(high);
    }

    /// Move one edge of one axis. Dragging past the opposite edge
    /// swaps the two so the range never inverts.
    pub fn drag_edge(&mut self, axis : usize, edge : Edge, position : i64) {
        match edge {
            Edge::Low => self.min[axis] = position,
            Edge::High => self.max[axis] = position,
        }
        if self.min[axis] > self.max[axis] {
            std::mem::swap(&mut self.min[axis], &mut self.max[axis]);
        }
    }
}

impl Roi for RectRoi {
    #[inline]
    fn in_range(&self, x : i64, y : i64, z : i64) -> bool {
        x >= self.min[0] && x <= self.max[0]
            && y >= self.min[1] && y <= self.max[1]
            && z >= self.min[2] && z <= self.max[2]
    }
}

/// Closed polygon in a plane's 2d coordinates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub vertices : Vec<(f64, f64)>,
}

impl Polygon {
    pub fn new(vertices : Vec<(f64, f64)>) -> Self {
        Polygon { vertices }
    }

    /// Even-odd point-in-polygon test. Points on the left/top edges
    /// count as inside, points on the right/bottom edges do not.
    pub fn contains(&self, px : f64, py : f64) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.vertices[i];
            let (xj, yj) = self.vertices[j];
            if (yi > py) != (yj > py) {
                let x_cross = xi + (py - yi) * (xj - xi) / (yj - yi);
                if px < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

/// One optional polygon per viewing plane. A voxel is inside when its
/// projection falls inside every polygon that is present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolygonRoi {
    polygons : [Option<Polygon>; 3],
}

impl PolygonRoi {
    pub fn new() -> Self {
        PolygonRoi::default()
    }

    /// Accepts two or three polygons, in plane order ZY, XZ, XY.
    pub fn from_polygons(polygons : Vec<Polygon>) -> Self {
        let mut roi = PolygonRoi::new();
        for (dir, polygon) in polygons.into_iter().take(3).enumerate() {
            roi.polygons[dir] = Some(polygon);
        }
        roi
    }

    pub fn set_polygon(&mut self, plane : Plane, polygon : Option<Polygon>) {
        self.polygons[plane as usize] = polygon;
    }

    pub fn polygon(&self, plane : Plane) -> Option<&Polygon> {
        self.polygons[plane as usize].as_ref()
    }

    /// Test only against the polygon of the plane `dir` (0, 1 or 2).
    /// A missing polygon accepts everything.
    pub fn in_plane(&self, dir : usize, x : i64, y : i64, z : i64) -> bool {
        let Some(plane) = Plane::from_dir(dir) else { return false; };
        match &self.polygons[dir] {
            Some(polygon) => {
                let (u, v) = plane.project(x as f64, y as f64, z as f64);
                polygon.contains(u, v)
            },
            None => true,
        }
    }
}

impl Roi for PolygonRoi {
    fn in_range(&self, x : i64, y : i64, z : i64) -> bool {
        (0..3).all(|dir| self.in_plane(dir, x, y, z))
    }
}

/// The single ROI a `Bundle` currently uses.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveRoi {
    Rect(RectRoi),
    Polygon(PolygonRoi),
}

impl ActiveRoi {
    pub fn as_roi(&self) -> &dyn Roi {
        match self {
            ActiveRoi::Rect(roi) => roi,
            ActiveRoi::Polygon(roi) => roi,
        }
    }
}

impl Roi for ActiveRoi {
    fn in_range(&self, x : i64, y : i64, z : i64) -> bool {
        self.as_roi().in_range(x, y, z)
    }
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullRoi;

impl Roi for FullRoi {
    fn in_range(&self, _x : i64, _y : i64, _z : i64) -> bool { true }
}
