//! Marker rows in and out.
//!
//! One row per marker, 22 columns:
//!
//! | columns | content |
//! |---------|---------|
//! | 0, 1    | list, marker index |
//! | 2..=6   | x, y, z, element, time (pixels) |
//! | 7, 8    | integral, max (raw) |
//! | 9..=15  | the same seven, calibrated |
//! | 16      | tagged (0/1) |
//! | 17..=20 | parent1, parent2, child1, child2 list (-1 for none) |
//! | 21      | color, `0x00RRGGBB` |
//!
//! Calibrated columns are ignored on import. The text form prints the
//! same row with the tag also spelled out and the list name appended.

use std::path::Path;

use crate::markers::{APoint, CalibrationSource, ListKey, MarkerLists, Slot};
use crate::VoxelViewError;

pub const ROW_COLUMNS : usize = 22;

/// Rows with no more numbers than this carry no marker.
const MIN_TEXT_NUMBERS : usize = 7;

/// How far past the current list count a lineage column may reach.
/// References further out are dropped instead of padded.
const MAX_LIST_PADDING : usize = 4096;

/// `value` with at most `max_fraction` decimals, no trailing zeros and
/// no digit grouping.
pub(crate) fn format_number(value : f64, max_fraction : usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let mut s = format!("{:.*}", max_fraction, value);
    if s.contains('.') {
        s.truncate(s.trim_end_matches('0').trim_end_matches('.').len());
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

impl MarkerLists {
    /// Upserts the marker at `(row[0], row[1])`, creating lists up to the
    /// ones the row refers to and linking the lineage columns.
    ///
    /// The marker index must not exceed the list's length: equal appends,
    /// smaller overwrites. An empty `name` keeps an existing name or
    /// derives one from the parents (`"<p1>_<p2>"`, or `"<p>a"`/`"<p>b"`
    /// by child slot), else takes the running counter.
    pub fn insert_information_vector(&mut self, row : &[f64], name : &str) -> bool {
        if row.len() < MIN_TEXT_NUMBERS || row[0] < 0.0 || row[1] < 0.0 {
            log::warn!("Ignoring marker row with {} columns: {:?}", row.len(), row);
            return false;
        }
        let offset = self.list_offset;
        let limit = self.num_lists().saturating_add(MAX_LIST_PADDING);
        let field = |i : usize, default : f64| row.get(i).copied().unwrap_or(default);
        let lineage = |i : usize| {
            let v = field(i, -1.0);
            if !(v >= 0.0) {
                return None;
            }
            let pos = (v as usize).saturating_add(offset);
            if pos >= limit {
                log::warn!("Dropping lineage reference to list {} (only {} lists may be padded)", pos, limit);
                return None;
            }
            Some(pos)
        };

        let list_nr = (row[0] as usize).saturating_add(offset).min(self.num_lists());
        let marker_nr = row[1] as usize;
        let parents = [lineage(17), lineage(18)];
        let children = [lineage(19), lineage(20)];

        let needed = parents.iter().chain(children.iter()).flatten()
            .copied()
            .fold(list_nr, usize::max) + 1;
        while self.num_lists() < needed {
            self.append_list();
        }
        self.set_active_list(list_nr);
        let me = self.order[list_nr];

        for (slot, parent) in Slot::BOTH.into_iter().zip(parents) {
            if let Some(parent) = parent {
                let key = self.order[parent];
                if let Err(err) = self.connect(key, me, None, Some(slot)) {
                    log::debug!("Row for list {}: {}", list_nr, err);
                }
            }
        }
        for (slot, child) in Slot::BOTH.into_iter().zip(children) {
            if let Some(child) = child {
                let key = self.order[child];
                if let Err(err) = self.connect(me, key, Some(slot), None) {
                    log::debug!("Row for list {}: {}", list_nr, err);
                }
            }
        }

        if !name.is_empty() {
            self.bump_name_counter(name);
            if let Some(list) = self.node_mut(me) {
                list.name = name.to_string();
            }
        } else if let Some(derived) = self.derived_name(me) {
            if let Some(list) = self.node_mut(me) {
                list.name = derived;
            }
        } else if self.node(me).map_or(false, |l| l.name.is_empty()) {
            let numbered = self.name_counter.to_string();
            self.name_counter += 1;
            if let Some(list) = self.node_mut(me) {
                list.name = numbered;
            }
        }

        let Some(list) = self.node_mut(me) else { return false; };
        if marker_nr > list.len() {
            log::warn!("Marker {} of list {} skips past its end ({})", marker_nr, list_nr, list.len());
            return false;
        }
        let color = row.get(21).map(|&c| c as i64 as u32);
        if list.is_empty() {
            if let Some(color) = color {
                list.set_color(color);
            }
        }
        let mut point = APoint::from_coords([row[2], row[3], row[4], row[5], row[6]]);
        point.integral = field(7, 0.0);
        point.max = field(8, 0.0);
        point.tagged = field(16, 0.0) != 0.0;
        point.color = color.unwrap_or(list.color());

        if marker_nr == list.len() {
            list.add_point(point);
        } else if let Some(existing) = list.point_mut(marker_nr) {
            *existing = point;
            list.set_active(marker_nr);
        }
        true
    }

    fn derived_name(&self, key : ListKey) -> Option<String> {
        let list = self.node(key)?;
        match (list.parent(Slot::First), list.parent(Slot::Second)) {
            (Some(a), Some(b)) => Some(format!("{}_{}", self.name_of(a), self.name_of(b))),
            (Some(p), None) | (None, Some(p)) => {
                let parent = self.node(p)?;
                let suffix = if parent.child(Slot::First) == Some(key) { "a" } else { "b" };
                Some(format!("{}{}", parent.name, suffix))
            },
            (None, None) => None,
        }
    }

    /// Imports a block of rows as new lists after the existing ones, then
    /// drops imported lists whose name was already taken. A lone empty
    /// list is reused rather than kept in front of the import.
    pub fn import_marker_lists(&mut self, rows : &[Vec<f64>]) {
        let reuse = self.num_lists() == 1 && self.total_markers() == 0;
        self.list_offset = if reuse { 0 } else { self.num_lists() };
        let inserted = rows.iter()
            .filter(|row| self.insert_information_vector(row, ""))
            .count();
        log::info!("Imported {} of {} marker rows", inserted, rows.len());
        self.delete_duplicate_marker_lists();
    }

    /// Removes every list at or after the import offset whose name
    /// matches a list before it, then clears the offset.
    pub fn delete_duplicate_marker_lists(&mut self) {
        let offset = self.list_offset.min(self.num_lists());
        let existing : Vec<String> = self.order[..offset].iter()
            .map(|&k| self.name_of(k).to_string())
            .collect();
        let duplicates : Vec<_> = self.order[offset..].iter()
            .copied()
            .filter(|&k| {
                let name = self.name_of(k);
                !name.is_empty() && existing.iter().any(|e| e == name)
            })
            .collect();
        for key in duplicates {
            if let Some(pos) = self.position_of(key) {
                log::info!("Dropping imported duplicate of list {}", self.name_of(key));
                self.set_active_list(pos);
                self.remove_list();
            }
        }
        self.list_offset = 0;
        let names : Vec<String> = self.lists().map(|l| l.name.clone()).collect();
        names.iter().for_each(|n| self.bump_name_counter(n));
        self.set_active_list(self.num_lists().saturating_sub(1));
        self.set_active_marker(0);
    }

    /// Rows for the markers of one list, without the two leading index
    /// columns.
    pub fn export_markers<C : CalibrationSource + ?Sized>(&self, pos : usize, cal : &C) -> Vec<Vec<f64>> {
        let Some(list) = self.list(pos) else { return Vec::new(); };
        let lineage = [
            self.parent_index(pos, Slot::First),
            self.parent_index(pos, Slot::Second),
            self.child_index(pos, Slot::First),
            self.child_index(pos, Slot::Second),
        ].map(|i| i.map_or(-1.0, |i| i as f64));

        list.points().iter().map(|p| {
            let elem = p.element();
            let mut row = Vec::with_capacity(ROW_COLUMNS - 2);
            row.extend_from_slice(&p.coord);
            row.push(p.integral);
            row.push(p.max);
            row.extend((0..5).map(|a| p.coord[a] * cal.axis_scale(elem, a) + cal.axis_offset(elem, a)));
            row.push(p.integral * cal.value_scale(elem) + cal.value_offset(elem));
            row.push(p.max * cal.value_scale(elem) + cal.value_offset(elem));
            row.push(if p.tagged { 1.0 } else { 0.0 });
            row.extend_from_slice(&lineage);
            row.push(p.color as f64);
            row
        }).collect()
    }

    /// Every marker of every list as a full 22-column row.
    pub fn export_marker_lists<C : CalibrationSource + ?Sized>(&self, cal : &C) -> Vec<Vec<f64>> {
        (0..self.num_lists()).flat_map(|l| {
            self.export_markers(l, cal).into_iter().enumerate().map(move |(m, rest)| {
                let mut row = Vec::with_capacity(ROW_COLUMNS);
                row.push(l as f64);
                row.push(m as f64);
                row.extend(rest);
                row
            })
        }).collect()
    }

    /// Tab-separated listing of every marker, readable by `read_text`.
    pub fn print_list<C : CalibrationSource + ?Sized>(&self, cal : &C) -> String {
        let mut text = String::from("# List Nr.,\tMarker Nr,\tPosX [pixels],\tY [pixels],\tZ [pixels],\tElements [element],\tTime [time],\tIntegral (no BG sub) [Units],\tMax (no BG sub) [Units]");
        for axis in 0..5 {
            text += &format!(",\t{} [{}]", cal.axis_name(axis), cal.axis_unit(axis));
        }
        text += &format!(
            ",\t{name} integral [{unit}],\t{name} max [{unit}],\tTagText,\tTagInteger,\tParent1,\tParent2,\tChild1,\tChild2,\tListColor,\tListName\n",
            name = cal.value_name(0),
            unit = cal.value_unit(0),
        );

        for (l, row_block) in (0..self.num_lists()).map(|l| (l, self.export_markers(l, cal))) {
            text.push('\n');
            let name = self.list(l).map_or("", |list| list.name.as_str());
            for (m, row) in row_block.iter().enumerate() {
                let cells : Vec<String> = [l as f64, m as f64].iter()
                    .chain(row[..15].iter())
                    .map(|&v| format_number(v, 2))
                    .collect();
                let tagged = row[14] != 0.0;
                text += &cells[..16].join("\t");
                text += &format!("\t{}\t{}", tagged, cells[16]);
                for &v in &row[15..] {
                    text += &format!("\t{}", format_number(v, 2));
                }
                text += &format!("\t{}\n", name);
            }
        }
        text
    }

    /// Parses text rows as written by `print_list`. Lines starting with
    /// `#` are comments. The first 22 numbers of a line form the row
    /// (words among them are skipped), the rest of the line is the list
    /// name. Lines with 7 or fewer numbers are ignored.
    pub fn read_text(&mut self, text : &str) -> usize {
        let mut inserted = 0;
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut numbers = Vec::with_capacity(ROW_COLUMNS);
            let mut name = Vec::new();
            for token in line.split_whitespace() {
                if numbers.len() < ROW_COLUMNS {
                    if let Ok(v) = token.parse::<f64>() {
                        numbers.push(v);
                    }
                } else {
                    name.push(token);
                }
            }
            if numbers.len() <= MIN_TEXT_NUMBERS {
                log::debug!("Skipping line {}: {} numbers", line_no + 1, numbers.len());
                continue;
            }
            if self.insert_information_vector(&numbers, &name.join(" ")) {
                inserted += 1;
            }
        }
        log::info!("Read {} marker rows", inserted);
        inserted
    }

    pub fn read_file<P : AsRef<Path>>(&mut self, path : P) -> Result<usize, VoxelViewError> {
        let text = std::fs::read_to_string(path)?;
        Ok(self.read_text(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::PixelCalibration;

    fn row(list : f64, marker : f64, t : f64, parent1 : f64) -> Vec<f64> {
        let mut r = vec![0.0; ROW_COLUMNS];
        r[0] = list;
        r[1] = marker;
        r[2] = 5.0 + t;
        r[6] = t;
        r[7] = 100.0;
        r[17] = parent1;
        r[18] = -1.0;
        r[19] = -1.0;
        r[20] = -1.0;
        r[21] = 0x123456 as f64;
        r
    }

    fn cal() -> PixelCalibration {
        PixelCalibration { sizes : [10, 10, 1, 1, 10], track_direction : 4 }
    }

    #[test]
    fn numbers_print_compactly() {
        assert_eq!(format_number(3.0, 2), "3");
        assert_eq!(format_number(3.456, 2), "3.46");
        assert_eq!(format_number(-0.001, 2), "0");
        assert_eq!(format_number(1234567.5, 2), "1234567.5");
        assert_eq!(format_number(-1.0, 2), "-1");
    }

    #[test]
    fn upsert_appends_then_overwrites() {
        let mut lists = MarkerLists::new();
        assert!(lists.insert_information_vector(&row(0.0, 0.0, 0.0, -1.0), ""));
        assert!(lists.insert_information_vector(&row(0.0, 1.0, 1.0, -1.0), ""));
        assert!(!lists.insert_information_vector(&row(0.0, 5.0, 2.0, -1.0), ""));
        let mut changed = row(0.0, 0.0, 0.0, -1.0);
        changed[2] = 42.0;
        assert!(lists.insert_information_vector(&changed, ""));

        let list = lists.list(0).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.points()[0].coord[0], 42.0);
        assert_eq!(list.color(), 0x123456);
        assert_eq!(list.name, "1");
    }

    #[test]
    fn lineage_columns_name_children() {
        let mut lists = MarkerLists::new();
        lists.insert_information_vector(&row(0.0, 0.0, 0.0, -1.0), "");
        lists.insert_information_vector(&row(1.0, 0.0, 1.0, 0.0), "");
        lists.insert_information_vector(&row(2.0, 0.0, 1.0, 0.0), "");
        let mut merged = row(3.0, 0.0, 2.0, 1.0);
        merged[18] = 2.0;
        lists.insert_information_vector(&merged, "");

        let names : Vec<_> = lists.lists().map(|l| l.name.clone()).collect();
        assert_eq!(names, vec!["1", "1a", "1b", "1a_1b"]);
        assert_eq!(lists.child_index(1, Slot::First), Some(3));
        assert_eq!(lists.child_index(2, Slot::First), Some(3));
    }

    #[test]
    fn forward_references_pad_lists() {
        let mut lists = MarkerLists::new();
        let mut r = row(0.0, 0.0, 0.0, -1.0);
        r[19] = 3.0;
        lists.insert_information_vector(&r, "");
        assert_eq!(lists.num_lists(), 4);
        assert_eq!(lists.parent_index(3, Slot::First), Some(0));
        assert_eq!(lists.list(3).unwrap().name, "");
    }

    #[test]
    fn far_lineage_references_are_dropped() {
        let mut lists = MarkerLists::new();
        let mut r = row(0.0, 0.0, 0.0, -1.0);
        r[17] = 1e300;
        r[19] = f64::NAN;
        r[20] = (MAX_LIST_PADDING + 5) as f64;
        assert!(lists.insert_information_vector(&r, ""));
        assert_eq!(lists.num_lists(), 1);
        assert_eq!(lists.parent_index(0, Slot::First), None);
        assert_eq!(lists.child_index(0, Slot::Second), None);

        lists.list_offset = usize::MAX - 1;
        assert!(lists.insert_information_vector(&row(3.0, 0.0, 1.0, 2.0), ""));
        assert_eq!(lists.num_lists(), 2);
    }

    #[test]
    fn printed_lists_read_back() {
        let mut lists = MarkerLists::new();
        lists.insert_information_vector(&row(0.0, 0.0, 0.0, -1.0), "");
        lists.insert_information_vector(&row(0.0, 1.0, 1.0, -1.0), "");
        lists.insert_information_vector(&row(1.0, 0.0, 2.0, 0.0), "");
        lists.active_point_mut().unwrap().tag(Some(true));
        let text = lists.print_list(&cal());
        assert!(text.starts_with("# List Nr."));

        let mut read = MarkerLists::new();
        assert_eq!(read.read_text(&text), 3);
        assert_eq!(read.num_lists(), 2);
        assert_eq!(read.list(1).unwrap().name, "1a");
        assert_eq!(read.parent_index(1, Slot::First), Some(0));
        assert!(read.point(1, 0).unwrap().tagged);
        assert_eq!(read.point(0, 1).unwrap().coord, lists.point(0, 1).unwrap().coord);
        assert_eq!(read.point(0, 1).unwrap().color, 0x123456);
        assert_eq!(
            read.export_marker_lists(&cal()),
            lists.export_marker_lists(&cal()),
        );
    }

    #[test]
    fn text_names_keep_spaces_and_bump_counter() {
        let mut lists = MarkerLists::new();
        let numbers : Vec<String> = row(0.0, 0.0, 0.0, -1.0).iter().map(|v| v.to_string()).collect();
        let line = format!("{}\tcell nine", numbers.join("\t"));
        assert_eq!(lists.read_text(&format!("# header\n\n{}\n1 2 3\n", line)), 1);
        assert_eq!(lists.list(0).unwrap().name, "cell nine");

        let numbers : Vec<String> = row(1.0, 0.0, 0.0, -1.0).iter().map(|v| v.to_string()).collect();
        lists.read_text(&format!("{}\t9", numbers.join("\t")));
        assert_eq!(lists.list(1).unwrap().name, "9");
        lists.new_list();
        assert_eq!(lists.active_list().unwrap().name, "10");
    }

    #[test]
    fn import_skips_known_names() {
        let mut lists = MarkerLists::new();
        lists.import_marker_lists(&[row(0.0, 0.0, 0.0, -1.0), row(1.0, 0.0, 1.0, 0.0)]);
        assert_eq!(lists.num_lists(), 2);
        let names : Vec<_> = lists.lists().map(|l| l.name.clone()).collect();
        assert_eq!(names, vec!["1", "1a"]);

        // a second import of the same rows gets fresh names, nothing to drop
        lists.import_marker_lists(&[row(0.0, 0.0, 0.0, -1.0)]);
        assert_eq!(lists.num_lists(), 3);
        assert_eq!(lists.list(2).unwrap().name, "2");

        lists.list_offset = 1;
        lists.delete_duplicate_marker_lists();
        assert_eq!(lists.num_lists(), 3);
        lists.list_mut(2).unwrap().name = "1".to_string();
        lists.list_offset = 1;
        lists.delete_duplicate_marker_lists();
        assert_eq!(lists.num_lists(), 2);
    }
}
