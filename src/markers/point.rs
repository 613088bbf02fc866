use crate::data::roi::Plane;

/// A marker: a 5d position `(x, y, z, element, time)` in pixel units
/// plus the intensity measurements taken there.
#[derive(Debug, Clone, PartialEq)]
pub struct APoint {
    pub coord : [f64; 5],
    /// Sum of the values in the measurement box.
    pub integral : f64,
    pub max : f64,
    pub min : f64,
    /// `integral` minus the box minimum times the box volume.
    pub integral_above_min : f64,
    pub tagged : bool,
    /// `0x00RRGGBB`
    pub color : u32,
}

impl Default for APoint {
    fn default() -> Self {
        APoint {
            coord : [0.0; 5],
            integral : 0.0,
            max : 0.0,
            min : 0.0,
            integral_above_min : 0.0,
            tagged : false,
            color : 0,
        }
    }
}

impl APoint {
    pub fn new(x : f64, y : f64, z : f64, e : f64, t : f64) -> Self {
        APoint { coord : [x, y, z, e, t], ..Default::default() }
    }

    pub fn from_coords(coord : [f64; 5]) -> Self {
        APoint { coord, ..Default::default() }
    }

    /// Nearest element index.
    pub fn element(&self) -> usize { (self.coord[3] + 0.5).max(0.0) as usize }

    /// Nearest time index.
    pub fn time(&self) -> usize { (self.coord[4] + 0.5).max(0.0) as usize }

    /// Squared 3d distance, each axis multiplied by its scale.
    pub fn sqr_dist_to(&self, other : &APoint, scales : [f64; 3]) -> f64 {
        (0..3).map(|d| {
            let delta = (self.coord[d] - other.coord[d]) * scales[d];
            delta * delta
        }).sum()
    }

    /// Squared distance in the XY plane only.
    pub fn sqr_xy_dist_to(&self, other : &APoint, scale_x : f64, scale_y : f64) -> f64 {
        let dx = (self.coord[0] - other.coord[0]) * scale_x;
        let dy = (self.coord[1] - other.coord[1]) * scale_y;
        dx * dx + dy * dy
    }

    /// Hit test in a slice view: `(px, py)` is within `(dist_x, dist_y)`
    /// of this point's projection onto `plane`.
    pub fn in_range(&self, px : f64, py : f64, plane : Plane, dist_x : f64, dist_y : f64) -> bool {
        let (u, v) = plane.project(self.coord[0], self.coord[1], self.coord[2]);
        (u - px).abs() <= dist_x && (v - py).abs() <= dist_y
    }

    /// `None` flips the tag.
    pub fn tag(&mut self, value : Option<bool>) -> bool {
        self.tagged = value.unwrap_or(!self.tagged);
        self.tagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances_use_scales() {
        let a = APoint::new(0.0, 0.0, 0.0, 0.0, 0.0);
        let b = APoint::new(3.0, 4.0, 1.0, 0.0, 5.0);
        assert_eq!(a.sqr_dist_to(&b, [1.0; 3]), 26.0);
        assert_eq!(a.sqr_dist_to(&b, [1.0, 1.0, 2.0]), 29.0);
        assert_eq!(a.sqr_xy_dist_to(&b, 2.0, 1.0), 52.0);
    }

    #[test]
    fn hit_test_per_plane() {
        let p = APoint::new(10.0, 20.0, 3.0, 0.0, 0.0);
        assert!(p.in_range(11.0, 19.0, Plane::XY, 2.0, 2.0));
        assert!(!p.in_range(3.0, 20.0, Plane::XY, 2.0, 2.0));
        // ZY view: horizontal axis is z
        assert!(p.in_range(3.0, 20.0, Plane::ZY, 1.0, 1.0));
        assert!(p.in_range(10.0, 3.0, Plane::XZ, 0.5, 0.5));
    }

    #[test]
    fn tagging() {
        let mut p = APoint::default();
        assert!(p.tag(None));
        assert!(!p.tag(None));
        assert!(p.tag(Some(true)));
        assert!(p.tag(Some(true)));
    }
}
