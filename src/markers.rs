//! Marker tracks and their lineage graph.
//!
//! A `MarkerLists` owns every `MarkerList` in an arena addressed by
//! `ListKey`; the user-visible order is a separate vector of keys, so
//! removing a list never invalidates the links held by the others.
//! Every lineage edge is stored on both ends: if list A names B as a
//! child, B names A as a parent, and the edge helpers below are the
//! only code that writes either side.

mod point;
mod list;
mod io;
mod stats;

use std::collections::HashSet;

use crate::data::calibration::AxisMetadata;
use crate::data::roi::Plane;
use crate::VoxelViewError;

pub use point::APoint;
pub use list::{ListKey, MarkerList, Slot};
pub use stats::TrackSummary;
pub use io::ROW_COLUMNS;

/// Display colors handed to new lists in turn, `0x00RRGGBB`.
pub const LIST_COLORS : [u32; 8] = [
    0xff0000, 0x00ff00, 0x4080ff, 0xffff00,
    0xff00ff, 0x00ffff, 0xff8000, 0xffffff,
];

/// Axis and value calibration needed to report markers in physical
/// units. Axes are `x, y, z, element, time`.
pub trait CalibrationSource {
    fn axis_scale(&self, element : usize, axis : usize) -> f64;
    fn axis_offset(&self, element : usize, axis : usize) -> f64;
    fn value_scale(&self, element : usize) -> f64;
    fn value_offset(&self, element : usize) -> f64;
    fn axis_name(&self, axis : usize) -> String;
    fn axis_unit(&self, axis : usize) -> String;
    fn value_name(&self, element : usize) -> String;
    fn value_unit(&self, element : usize) -> String;
    /// Number of samples along each of the five axes.
    fn sizes(&self) -> [usize; 5];
    /// Axis along which tracks advance.
    fn track_direction(&self) -> usize;
}

/// Unit calibration for marker files read without their data.
#[derive(Debug, Clone)]
pub struct PixelCalibration {
    pub sizes : [usize; 5],
    pub track_direction : usize,
}

impl PixelCalibration {
    /// Sizes just large enough to hold every marker of `lists`.
    pub fn covering(lists : &MarkerLists, track_direction : usize) -> Self {
        let mut sizes = [1usize; 5];
        for p in lists.lists().flat_map(|l| l.points()) {
            for (size, &c) in sizes.iter_mut().zip(&p.coord) {
                *size = (*size).max(c.max(0.0) as usize + 1);
            }
        }
        PixelCalibration { sizes, track_direction }
    }
}

impl CalibrationSource for PixelCalibration {
    fn axis_scale(&self, _element : usize, _axis : usize) -> f64 { 1.0 }
    fn axis_offset(&self, _element : usize, _axis : usize) -> f64 { 0.0 }
    fn value_scale(&self, _element : usize) -> f64 { 1.0 }
    fn value_offset(&self, _element : usize) -> f64 { 0.0 }
    fn axis_name(&self, axis : usize) -> String { AxisMetadata::default().names[axis].clone() }
    fn axis_unit(&self, axis : usize) -> String { AxisMetadata::default().units[axis].clone() }
    fn value_name(&self, _element : usize) -> String { "intensity".to_string() }
    fn value_unit(&self, _element : usize) -> String { "a.u.".to_string() }
    fn sizes(&self) -> [usize; 5] { self.sizes }
    fn track_direction(&self) -> usize { self.track_direction }
}

/// Which markers `marker_from_position` may pick.
#[derive(Debug, Clone, Copy)]
pub struct SearchScope {
    /// Search every list rather than only the active one.
    pub all_lists : bool,
    /// `(axis, position)`: only markers at this position along the
    /// track axis. `None` accepts every position.
    pub along_track : Option<(usize, f64)>,
}

#[derive(Debug, Clone)]
pub struct MarkerLists {
    nodes : Vec<Option<MarkerList>>,
    order : Vec<ListKey>,
    active : usize,
    name_counter : usize,
    /// Added to list indices of imported rows.
    pub(crate) list_offset : usize,
}

impl Default for MarkerLists {
    fn default() -> Self { MarkerLists::new() }
}

impl MarkerLists {
    /// Starts with one empty list named "1".
    pub fn new() -> Self {
        let mut lists = MarkerLists {
            nodes : Vec::new(),
            order : Vec::new(),
            active : 0,
            name_counter : 1,
            list_offset : 0,
        };
        lists.new_list();
        lists
    }

    /////////////////////
    // Arena
    /////////////////////

    fn create(&mut self, name : &str) -> ListKey {
        let key = ListKey(self.nodes.len());
        let color = LIST_COLORS[self.order.len() % LIST_COLORS.len()];
        self.nodes.push(Some(MarkerList::new(name, color)));
        key
    }

    pub(crate) fn node(&self, key : ListKey) -> Option<&MarkerList> {
        self.nodes.get(key.0).and_then(Option::as_ref)
    }

    pub(crate) fn node_mut(&mut self, key : ListKey) -> Option<&mut MarkerList> {
        self.nodes.get_mut(key.0).and_then(Option::as_mut)
    }

    fn key_or_err(&self, pos : usize) -> Result<ListKey, VoxelViewError> {
        self.key_of(pos).ok_or(VoxelViewError::NoSuchList(pos))
    }

    fn name_of(&self, key : ListKey) -> &str {
        self.node(key).map_or("", |l| l.name.as_str())
    }

    pub(crate) fn bump_name_counter(&mut self, name : &str) {
        if let Ok(n) = name.trim().parse::<usize>() {
            if n >= self.name_counter {
                self.name_counter = n + 1;
            }
        }
    }

    /////////////////////
    // Lineage edges
    /////////////////////

    fn refuse(reason : String) -> VoxelViewError {
        log::warn!("Refusing lineage link: {}", reason);
        VoxelViewError::SlotOccupied(reason)
    }

    /// Links `parent -> child` on both ends. `child_slot` picks the slot
    /// in the parent's children, `parent_slot` the slot in the child's
    /// parents; `None` takes the first free one. An existing link is
    /// left alone. Refuses to overwrite an occupied slot.
    pub(crate) fn connect(
        &mut self,
        parent : ListKey,
        child : ListKey,
        child_slot : Option<Slot>,
        parent_slot : Option<Slot>,
    ) -> Result<(), VoxelViewError> {
        if parent == child {
            return Err(Self::refuse(format!("list {} cannot be its own parent", self.name_of(parent))));
        }
        let p = self.node(parent).ok_or(VoxelViewError::NoSuchList(parent.0))?;
        let c = self.node(child).ok_or(VoxelViewError::NoSuchList(child.0))?;

        let existing_down = Slot::BOTH.into_iter().find(|s| p.child(*s) == Some(child));
        let existing_up = Slot::BOTH.into_iter().find(|s| c.parent(*s) == Some(parent));
        if existing_down.is_some() && existing_up.is_some() {
            return Ok(());
        }

        let pick = |slots : &[Option<ListKey>; 2], wanted : Option<Slot>, existing : Option<Slot>, what : &str| {
            if let Some(slot) = existing {
                return Ok(slot);
            }
            match wanted {
                Some(slot) if slots[slot.index()].is_some() => {
                    Err(format!("{} slot {:?} is taken", what, slot))
                },
                Some(slot) => Ok(slot),
                None => Slot::BOTH.into_iter()
                    .find(|s| slots[s.index()].is_none())
                    .ok_or(format!("no free {} slot", what)),
            }
        };
        let down = pick(&p.children, child_slot, existing_down, "child")
            .map_err(|e| Self::refuse(format!("{} -> {}: {}", p.name, c.name, e)))?;
        let up = pick(&c.parents, parent_slot, existing_up, "parent")
            .map_err(|e| Self::refuse(format!("{} -> {}: {}", p.name, c.name, e)))?;

        if let Some(p) = self.node_mut(parent) { p.children[down.index()] = Some(child); }
        if let Some(c) = self.node_mut(child) { c.parents[up.index()] = Some(parent); }
        Ok(())
    }

    /// Removes every `parent -> child` edge, both ends.
    pub(crate) fn disconnect(&mut self, parent : ListKey, child : ListKey) {
        if let Some(p) = self.node_mut(parent) {
            p.children.iter_mut().filter(|s| **s == Some(child)).for_each(|s| *s = None);
        }
        if let Some(c) = self.node_mut(child) {
            c.parents.iter_mut().filter(|s| **s == Some(parent)).for_each(|s| *s = None);
        }
    }

    fn detach(&mut self, key : ListKey) {
        let Some(list) = self.node(key) else { return; };
        let parents = list.parents;
        let children = list.children;
        parents.into_iter().flatten().for_each(|p| self.disconnect(p, key));
        children.into_iter().flatten().for_each(|c| self.disconnect(key, c));
    }

    /// Links two lists by position through their first free slots.
    pub fn link(&mut self, parent : usize, child : usize) -> Result<(), VoxelViewError> {
        let (p, c) = (self.key_or_err(parent)?, self.key_or_err(child)?);
        self.connect(p, c, None, None)
    }

    pub fn unlink(&mut self, parent : usize, child : usize) -> Result<(), VoxelViewError> {
        let (p, c) = (self.key_or_err(parent)?, self.key_or_err(child)?);
        self.disconnect(p, c);
        Ok(())
    }

    /// Replaces the parent in `slot` of list `child`. `None` clears it.
    pub fn set_parent(&mut self, child : usize, slot : Slot, parent : Option<usize>) -> Result<(), VoxelViewError> {
        let c = self.key_or_err(child)?;
        let new_parent = parent.map(|p| self.key_or_err(p)).transpose()?;
        if let Some(old) = self.node(c).and_then(|l| l.parent(slot)) {
            self.disconnect(old, c);
        }
        match new_parent {
            Some(p) => self.connect(p, c, None, Some(slot)),
            None => Ok(()),
        }
    }

    /// Replaces the child in `slot` of list `parent`. `None` clears it.
    pub fn set_child(&mut self, parent : usize, slot : Slot, child : Option<usize>) -> Result<(), VoxelViewError> {
        let p = self.key_or_err(parent)?;
        let new_child = child.map(|c| self.key_or_err(c)).transpose()?;
        if let Some(old) = self.node(p).and_then(|l| l.child(slot)) {
            self.disconnect(p, old);
        }
        match new_child {
            Some(c) => self.connect(p, c, Some(slot), None),
            None => Ok(()),
        }
    }

    pub fn parent_index(&self, pos : usize, slot : Slot) -> Option<usize> {
        self.list(pos)?.parent(slot).and_then(|k| self.position_of(k))
    }

    pub fn child_index(&self, pos : usize, slot : Slot) -> Option<usize> {
        self.list(pos)?.child(slot).and_then(|k| self.position_of(k))
    }

    /// Last point of the parent in `slot`, where this track branched off.
    pub fn parent_end_of_track(&self, pos : usize, slot : Slot) -> Option<&APoint> {
        let parent = self.list(pos)?.parent(slot)?;
        self.node(parent)?.points().last()
    }

    /// Child to follow forward: the first one unless only the second
    /// exists or the second was last navigated from.
    pub fn preferred_child(&self, pos : usize) -> Option<usize> {
        let list = self.list(pos)?;
        self.preferred_child_key(list).and_then(|k| self.position_of(k))
    }

    fn preferred_child_key(&self, list : &MarkerList) -> Option<ListKey> {
        match (list.child(Slot::First), list.child(Slot::Second)) {
            (Some(c1), None) => Some(c1),
            (None, Some(c2)) => Some(c2),
            (Some(c1), Some(c2)) => match list.preferred_child() {
                Slot::First => Some(c1),
                Slot::Second => Some(c2),
            },
            (None, None) => None,
        }
    }

    /// Follows first parents to the root, marking the path as the
    /// preferred children on the way. Stops on a cycle.
    pub fn first_ancestor(&mut self, pos : usize) -> Option<usize> {
        let mut key = self.key_of(pos)?;
        let mut visited = HashSet::new();
        while visited.insert(key) {
            let Some(parent) = self.node(key).and_then(|l| l.parent(Slot::First)) else { break; };
            if let Some(p) = self.node_mut(parent) {
                if let Some(slot) = Slot::BOTH.into_iter().find(|s| p.child(*s) == Some(key)) {
                    p.preferred_child = slot;
                }
            }
            key = parent;
        }
        self.position_of(key)
    }

    /// `key` and its first-parent ancestors, each once.
    fn first_parent_chain(&self, mut key : ListKey) -> Vec<ListKey> {
        let mut chain = Vec::new();
        while !chain.contains(&key) {
            chain.push(key);
            match self.node(key).and_then(|l| l.parent(Slot::First)) {
                Some(parent) => key = parent,
                None => break,
            }
        }
        chain
    }

    /// Both lists descend from the same first-parent root (or, on a
    /// cycle, share an ancestor).
    pub fn common_root(&self, a : usize, b : usize) -> bool {
        match (self.key_of(a), self.key_of(b)) {
            (Some(a), Some(b)) => {
                let ancestors = self.first_parent_chain(a);
                self.first_parent_chain(b).iter().any(|k| ancestors.contains(k))
            },
            _ => false,
        }
    }

    /////////////////////
    // Lists
    /////////////////////

    pub fn num_lists(&self) -> usize { self.order.len() }

    pub fn key_of(&self, pos : usize) -> Option<ListKey> { self.order.get(pos).copied() }

    pub fn position_of(&self, key : ListKey) -> Option<usize> {
        self.order.iter().position(|&k| k == key)
    }

    pub fn list(&self, pos : usize) -> Option<&MarkerList> {
        self.key_of(pos).and_then(|k| self.node(k))
    }

    pub fn list_mut(&mut self, pos : usize) -> Option<&mut MarkerList> {
        let key = self.key_of(pos)?;
        self.node_mut(key)
    }

    /// Lists in display order.
    pub fn lists(&self) -> impl Iterator<Item = &MarkerList> + '_ {
        self.order.iter().filter_map(|&k| self.node(k))
    }

    pub fn active_list_pos(&self) -> usize { self.active }

    pub fn active_list(&self) -> Option<&MarkerList> { self.list(self.active) }

    pub fn active_list_mut(&mut self) -> Option<&mut MarkerList> { self.list_mut(self.active) }

    pub fn set_active_list(&mut self, pos : usize) -> bool {
        if pos >= self.order.len() {
            return false;
        }
        self.active = pos;
        true
    }

    pub fn find_by_name(&self, name : &str) -> Option<usize> {
        self.lists().position(|l| l.name == name)
    }

    /// Inserts an empty list after the active one, named by the running
    /// counter, and activates it.
    pub fn new_list(&mut self) -> usize {
        let name = self.name_counter.to_string();
        self.name_counter += 1;
        let key = self.create(&name);
        let pos = if self.order.is_empty() { 0 } else { self.active + 1 };
        self.order.insert(pos, key);
        self.active = pos;
        pos
    }

    /// New active list branching off `parent`, named after it plus
    /// `suffix`. Fails if the parent has no free child slot.
    pub fn new_list_linked(&mut self, parent : usize, suffix : &str) -> Result<usize, VoxelViewError> {
        let parent_key = self.key_or_err(parent)?;
        let parent_list = self.node(parent_key).ok_or(VoxelViewError::NoSuchList(parent))?;
        if parent_list.children.iter().all(Option::is_some) {
            return Err(Self::refuse(format!("{} already has two children", parent_list.name)));
        }
        let name = format!("{}{}", parent_list.name, suffix);
        self.set_active_list(parent);
        let pos = self.new_list();
        self.name_counter -= 1;
        let key = self.order[pos];
        if let Some(list) = self.node_mut(key) {
            list.name = name;
        }
        self.connect(parent_key, key, None, Some(Slot::First))?;
        Ok(pos)
    }

    /// Unnamed empty list at the end. The active list is unchanged.
    pub fn append_list(&mut self) -> usize {
        let key = self.create("");
        self.order.push(key);
        self.order.len() - 1
    }

    /// Removes the active list and every edge touching it. The last
    /// list is replaced by a fresh one.
    pub fn remove_list(&mut self) {
        let Some(key) = self.key_of(self.active) else { return; };
        self.detach(key);
        self.nodes[key.0] = None;
        self.order.remove(self.active);
        if self.order.is_empty() {
            self.new_list();
        } else {
            self.active = self.active.min(self.order.len() - 1);
        }
    }

    pub fn delete_all(&mut self) {
        self.nodes.clear();
        self.order.clear();
        self.active = 0;
        self.name_counter = 1;
        self.list_offset = 0;
        self.new_list();
    }

    /// Steps the active list by `n`, wrapping. An empty active list is
    /// dropped first. The cursor lands on the marker closest along the
    /// track to the one active before.
    pub fn advance_list(&mut self, n : i64, track_direction : usize) {
        if self.num_lists() <= 1 {
            return;
        }
        let current = self.active_point().cloned();
        let mut n = n;
        if self.active_list().map_or(false, MarkerList::is_empty) {
            self.remove_list();
            if n > 0 {
                n -= 1;
            }
        }
        let len = self.num_lists() as i64;
        self.active = (self.active as i64 + n).rem_euclid(len) as usize;
        if let (Some(point), Some(list)) = (current, self.active_list_mut()) {
            list.set_active_closest(&point, track_direction);
        }
    }

    /// Cycles the active list through `LIST_COLORS`.
    pub fn toggle_color(&mut self) {
        if let Some(list) = self.active_list_mut() {
            let next = LIST_COLORS.iter()
                .position(|&c| c == list.color())
                .map_or(0, |i| (i + 1) % LIST_COLORS.len());
            list.set_color(LIST_COLORS[next]);
        }
    }

    /////////////////////
    // Markers
    /////////////////////

    pub fn num_markers(&self, pos : usize) -> usize {
        self.list(pos).map_or(0, MarkerList::len)
    }

    pub fn total_markers(&self) -> usize {
        self.lists().map(MarkerList::len).sum()
    }

    pub fn point(&self, list : usize, index : usize) -> Option<&APoint> {
        self.list(list)?.point(index)
    }

    pub fn active_point(&self) -> Option<&APoint> {
        self.active_list()?.active_point()
    }

    pub fn active_point_mut(&mut self) -> Option<&mut APoint> {
        self.active_list_mut()?.active_point_mut()
    }

    pub fn active_marker_pos(&self) -> usize {
        self.active_list().map_or(0, MarkerList::active_index)
    }

    pub fn set_active_marker(&mut self, index : usize) {
        if let Some(list) = self.active_list_mut() {
            list.set_active(index);
        }
    }

    /// Activates the list and marker holding a point equal to `point`.
    pub fn set_active_marker_point(&mut self, point : &APoint) -> bool {
        let found = self.lists()
            .enumerate()
            .find_map(|(l, list)| list.index_of(point).map(|m| (l, m)));
        match found {
            Some((l, m)) => {
                self.active = l;
                self.set_active_marker(m);
                true
            },
            None => false,
        }
    }

    /// Appends to the active list in the list's color.
    pub fn add_point(&mut self, mut point : APoint) {
        if let Some(list) = self.active_list_mut() {
            point.color = list.color();
            list.add_point(point);
        }
    }

    pub fn remove_point(&mut self) -> Option<APoint> {
        self.active_list_mut()?.remove_point()
    }

    pub fn remove_trailing_points(&mut self) {
        if let Some(list) = self.active_list_mut() {
            list.remove_trailing_points();
        }
    }

    /// Adds one marker per position to the active list.
    pub fn import_positions(&mut self, positions : &[[f64; 5]]) {
        for &coord in positions {
            self.add_point(APoint::from_coords(coord));
        }
    }

    /// Moves the active-marker cursor by `n`. Past the end it continues
    /// at the start of the preferred child, before the start at the end
    /// of a parent (which then prefers this list when going forward).
    /// False if there is nowhere to go.
    pub fn advance_point(&mut self, n : i64) -> bool {
        let Some(key) = self.key_of(self.active) else { return false; };
        let Some(list) = self.node(key) else { return false; };
        let target = list.active_index() as i64 + n;
        let len = list.len() as i64;
        let parents = list.parents;
        let child = self.preferred_child_key(list);

        if target >= len {
            let Some(pos) = child.and_then(|c| self.position_of(c)) else { return false; };
            self.active = pos;
            self.set_active_marker(0);
            return true;
        }
        if target < 0 {
            for parent in parents.into_iter().flatten() {
                let Some(pos) = self.position_of(parent) else { continue; };
                if let Some(p) = self.node_mut(parent) {
                    if let Some(own) = Slot::BOTH.into_iter().find(|s| p.child(*s) == Some(key)) {
                        p.preferred_child = own;
                    }
                    let last = p.len().saturating_sub(1);
                    p.set_active(last);
                }
                self.active = pos;
                return true;
            }
            return false;
        }
        self.node_mut(key).map_or(false, |l| l.advance(n))
    }

    /// Picks the first marker whose projection onto `plane` lies within
    /// `dist` of `(px, py)` and makes it active.
    pub fn marker_from_position(
        &mut self,
        px : f64,
        py : f64,
        plane : Plane,
        dist : (f64, f64),
        scope : SearchScope,
    ) -> Option<(usize, usize)> {
        let on_track = |p : &APoint| match scope.along_track {
            Some((axis, position)) => (p.coord[axis] - position).abs() < 0.5,
            None => true,
        };
        let hit = self.lists()
            .enumerate()
            .filter(|(l, _)| scope.all_lists || *l == self.active)
            .find_map(|(l, list)| {
                list.points().iter()
                    .position(|p| on_track(p) && p.in_range(px, py, plane, dist.0, dist.1))
                    .map(|m| (l, m))
            })?;
        self.active = hit.0;
        self.set_active_marker(hit.1);
        Some(hit)
    }
}
