use crate::markers::APoint;

/// Stable identity of a list inside a `MarkerLists` arena. Survives
/// removal of other lists, unlike the list's display position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListKey(pub(crate) usize);

/// One of the two parent or child slots of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Slot {
    #[default]
    First,
    Second,
}

impl Slot {
    pub const BOTH : [Slot; 2] = [Slot::First, Slot::Second];

    #[inline]
    pub(crate) fn index(self) -> usize {
        match self {
            Slot::First => 0,
            Slot::Second => 1,
        }
    }
}

/// An ordered track of markers with up to two parents and two children
/// in the lineage graph.
#[derive(Debug, Clone)]
pub struct MarkerList {
    points : Vec<APoint>,
    pub name : String,
    color : u32,
    active : usize,
    pub(crate) parents : [Option<ListKey>; 2],
    pub(crate) children : [Option<ListKey>; 2],
    pub(crate) preferred_child : Slot,
}

impl MarkerList {
    pub fn new(name : &str, color : u32) -> Self {
        MarkerList {
            points : Vec::new(),
            name : name.to_string(),
            color,
            active : 0,
            parents : [None; 2],
            children : [None; 2],
            preferred_child : Slot::First,
        }
    }

    pub fn points(&self) -> &[APoint] { &self.points }

    pub fn point(&self, index : usize) -> Option<&APoint> { self.points.get(index) }

    pub fn point_mut(&mut self, index : usize) -> Option<&mut APoint> { self.points.get_mut(index) }

    pub fn len(&self) -> usize { self.points.len() }

    pub fn is_empty(&self) -> bool { self.points.is_empty() }

    pub fn color(&self) -> u32 { self.color }

    /// Recolors the list and every point in it.
    pub fn set_color(&mut self, color : u32) {
        self.color = color;
        self.points.iter_mut().for_each(|p| p.color = color);
    }

    pub fn parent(&self, slot : Slot) -> Option<ListKey> { self.parents[slot.index()] }

    pub fn child(&self, slot : Slot) -> Option<ListKey> { self.children[slot.index()] }

    pub fn preferred_child(&self) -> Slot { self.preferred_child }

    pub fn has_parent(&self) -> bool { self.parents.iter().any(Option::is_some) }

    /// Appends a point and makes it the active marker.
    pub fn add_point(&mut self, point : APoint) {
        self.points.push(point);
        self.active = self.points.len() - 1;
    }

    /// Drops the last point.
    pub fn remove_point(&mut self) -> Option<APoint> {
        let removed = self.points.pop();
        self.clamp_active();
        removed
    }

    /// Drops every point after the active marker.
    pub fn remove_trailing_points(&mut self) {
        if !self.points.is_empty() {
            self.points.truncate(self.active + 1);
        }
    }

    pub fn active_index(&self) -> usize { self.active }

    pub fn active_point(&self) -> Option<&APoint> { self.points.get(self.active) }

    pub fn active_point_mut(&mut self) -> Option<&mut APoint> { self.points.get_mut(self.active) }

    /// Clamped to the list.
    pub fn set_active(&mut self, index : usize) {
        self.active = index;
        self.clamp_active();
    }

    /// Moves the cursor by `n` if the result stays inside the list.
    pub fn advance(&mut self, n : i64) -> bool {
        let target = self.active as i64 + n;
        if target < 0 || target >= self.points.len() as i64 {
            return false;
        }
        self.active = target as usize;
        true
    }

    /// Index of the point equal to `point`, if any.
    pub fn index_of(&self, point : &APoint) -> Option<usize> {
        self.points.iter().position(|p| p == point)
    }

    /// Moves the cursor to the point whose `track_direction` coordinate
    /// is closest to `point`'s.
    pub fn set_active_closest(&mut self, point : &APoint, track_direction : usize) {
        let target = point.coord[track_direction];
        let closest = self.points.iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = (a.coord[track_direction] - target).abs();
                let db = (b.coord[track_direction] - target).abs();
                da.total_cmp(&db)
            })
            .map(|(i, _)| i);
        if let Some(i) = closest {
            self.active = i;
        }
    }

    fn clamp_active(&mut self) {
        self.active = self.active.min(self.points.len().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(n : usize) -> MarkerList {
        let mut list = MarkerList::new("t", 0xff0000);
        for t in 0..n {
            list.add_point(APoint::new(t as f64, 0.0, 0.0, 0.0, t as f64));
        }
        list
    }

    #[test]
    fn cursor_moves() {
        let mut list = track(4);
        assert_eq!(list.active_index(), 3);
        assert!(list.advance(-2));
        assert_eq!(list.active_index(), 1);
        assert!(!list.advance(5));
        assert!(!list.advance(-2));
        assert_eq!(list.active_index(), 1);

        list.remove_trailing_points();
        assert_eq!(list.len(), 2);
        list.remove_point();
        list.remove_point();
        assert!(list.is_empty());
        assert_eq!(list.active_index(), 0);
        assert!(list.remove_point().is_none());
    }

    #[test]
    fn closest_along_track() {
        let mut list = track(5);
        list.set_active_closest(&APoint::new(0.0, 0.0, 0.0, 0.0, 2.2), 4);
        assert_eq!(list.active_index(), 2);
        list.set_active(100);
        assert_eq!(list.active_index(), 4);
    }

    #[test]
    fn recolor_reaches_points() {
        let mut list = track(3);
        list.set_color(0x00ff00);
        assert!(list.points().iter().all(|p| p.color == 0x00ff00));
        assert_eq!(list.index_of(&list.points()[1].clone()), Some(1));
    }
}
