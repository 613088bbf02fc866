//! Track statistics: mean square displacement, repulsion between
//! tracks and per-track summaries.

use crate::data::voxel::fitting::sigma_squared;
use crate::markers::io::format_number;
use crate::markers::{APoint, CalibrationSource, MarkerList, MarkerLists};

/// Distances and speeds along one track, in calibrated units.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSummary {
    pub list : usize,
    /// Start-to-end distance in XY.
    pub total_xy : f64,
    /// Start-to-end distance in XYZ.
    pub total_xyz : f64,
    /// Start-to-end extent along the track axis.
    pub duration : f64,
    pub segments : usize,
    /// Mean of the per-segment speeds.
    pub avg_xy_speed : f64,
    pub avg_xyz_speed : f64,
}

impl TrackSummary {
    pub fn total_xy_speed(&self) -> f64 { self.total_xy / self.duration }

    pub fn total_xyz_speed(&self) -> f64 { self.total_xyz / self.duration }

    /// 1 for a straight track, smaller the more it meanders.
    pub fn directionality_xy(&self) -> f64 { self.total_xy_speed() / self.avg_xy_speed }

    pub fn directionality_xyz(&self) -> f64 { self.total_xyz_speed() / self.avg_xyz_speed }
}

fn axis_scales<C : CalibrationSource + ?Sized>(cal : &C, elem : usize) -> [f64; 3] {
    [cal.axis_scale(elem, 0), cal.axis_scale(elem, 1), cal.axis_scale(elem, 2)]
}

/// Squared distance over the four axes other than `direction`, if the
/// two points share the same position along `direction`.
fn hyperplane_sqr_dist(a : &APoint, b : &APoint, direction : usize) -> Option<f64> {
    if a.coord[direction] != b.coord[direction] {
        return None;
    }
    Some((0..5).filter(|&d| d != direction).map(|d| (a.coord[d] - b.coord[d]).powi(2)).sum())
}

impl MarkerLists {
    fn other_lists(&self) -> impl Iterator<Item = &MarkerList> + '_ {
        let active = self.active_list_pos();
        self.lists().enumerate().filter(move |(l, _)| *l != active).map(|(_, list)| list)
    }

    /// Adds the squared displacements of one list into per-gap bins,
    /// indexed by the integer gap along the track axis.
    fn accumulate_msd(&self, list : &MarkerList, track_direction : usize, sums : &mut [f64], counts : &mut [f64]) {
        let max_gap = sums.len() as i64 - 1;
        let points = list.points();
        for n in 0..points.len() {
            for t in 0..points.len() - n {
                let (from, to) = (&points[t], &points[t + n]);
                let gap = ((to.coord[track_direction] - from.coord[track_direction]) as i64).clamp(0, max_gap) as usize;
                let d2 = if track_direction == 2 {
                    from.sqr_xy_dist_to(to, 1.0, 1.0)
                } else {
                    from.sqr_dist_to(to, [1.0; 3])
                };
                sums[gap] += d2;
                counts[gap] += 1.0;
            }
        }
    }

    fn finish_msd(sums : Vec<f64>, counts : &[f64]) -> Vec<f64> {
        sums.into_iter().zip(counts).map(|(s, &c)| s / c).collect()
    }

    fn msd_bins<C : CalibrationSource + ?Sized>(cal : &C) -> usize {
        cal.sizes()[cal.track_direction()].max(1)
    }

    /// Mean square displacement of one list in pixels, one bin per gap
    /// along the track axis. Empty bins are NaN.
    pub fn msd<C : CalibrationSource + ?Sized>(&self, pos : usize, cal : &C) -> Vec<f64> {
        let bins = Self::msd_bins(cal);
        let (mut sums, mut counts) = (vec![0.0; bins], vec![0.0; bins]);
        if let Some(list) = self.list(pos) {
            self.accumulate_msd(list, cal.track_direction(), &mut sums, &mut counts);
        }
        Self::finish_msd(sums, &counts)
    }

    /// `msd` pooled over every list.
    pub fn all_msd<C : CalibrationSource + ?Sized>(&self, cal : &C) -> Vec<f64> {
        let bins = Self::msd_bins(cal);
        let (mut sums, mut counts) = (vec![0.0; bins], vec![0.0; bins]);
        for list in self.lists() {
            self.accumulate_msd(list, cal.track_direction(), &mut sums, &mut counts);
        }
        Self::finish_msd(sums, &counts)
    }

    /// Calibrated mean square displacement of one list. Bin `i` holds
    /// gap `i + 1`; there are `sqrt(len + 1)` bins. Empty bins stay 0.
    pub fn msd_from_list<C : CalibrationSource + ?Sized>(&self, cal : &C, pos : usize, do_3d : bool) -> Vec<f64> {
        let Some(list) = self.list(pos) else { return Vec::new(); };
        let points = list.points();
        let bins = ((points.len() + 1) as f64).sqrt() as usize;
        let (mut sums, mut counts) = (vec![0.0; bins], vec![0.0; bins]);
        let track = cal.track_direction();

        for (i, from) in points.iter().enumerate() {
            for to in &points[i + 1..] {
                let gap = (to.coord[track] - from.coord[track]) as i64;
                let gap = gap.unsigned_abs() as usize;
                if gap >= bins + 1 {
                    break;
                }
                if gap == 0 {
                    continue;
                }
                let scales = axis_scales(cal, from.coord[3] as usize);
                sums[gap - 1] += if do_3d {
                    from.sqr_dist_to(to, scales)
                } else {
                    from.sqr_xy_dist_to(to, scales[0], scales[1])
                };
                counts[gap - 1] += 1.0;
            }
        }
        sums.iter_mut().zip(&counts).filter(|(_, &c)| c > 0.0).for_each(|(s, &c)| *s /= c);
        sums
    }

    /// Repulsion felt by `point` from the markers of every other list in
    /// the same hyperplane along `direction`: each contributes
    /// `scale * integral_above_min * exp(-r^2 / sigma^2)`.
    pub fn penalty(&self, point : &APoint, direction : usize, fwhm : f64, scale : f64) -> f64 {
        let sigma2 = sigma_squared(fwhm);
        self.other_lists()
            .flat_map(|list| list.points())
            .filter_map(|p| hyperplane_sqr_dist(p, point, direction).map(|r2| (p, r2)))
            .map(|(p, r2)| scale * p.integral_above_min * (-r2 / sigma2).exp())
            .sum()
    }

    /// Pushes `point` away from the markers of every other list in the
    /// same hyperplane, by up to `fwhm` each. Stops at an exact overlap.
    pub fn penalize(&self, point : &mut APoint, direction : usize, fwhm : f64) {
        let sigma2 = sigma_squared(fwhm);
        for p in self.other_lists().flat_map(|list| list.points()) {
            let Some(r2) = hyperplane_sqr_dist(p, point, direction) else { continue; };
            if r2 <= 0.0 {
                log::debug!("Marker sits on a claimed position, not moving it");
                return;
            }
            let weight = fwhm * (-r2 / sigma2).exp();
            let r = r2.sqrt();
            for d in (0..5).filter(|&d| d != direction) {
                point.coord[d] -= (p.coord[d] - point.coord[d]) / r * weight;
            }
        }
    }

    /// Summary of one list, `None` if it is empty.
    pub fn track_summary<C : CalibrationSource + ?Sized>(&self, cal : &C, pos : usize) -> Option<TrackSummary> {
        let points = self.list(pos)?.points();
        let (first, last) = (points.first()?, points.last()?);
        let track = cal.track_direction();
        let elem = first.coord[3] as usize;
        let scales = axis_scales(cal, elem);

        let (mut xy_speed, mut xyz_speed) = (0.0, 0.0);
        for pair in points.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            let e = to.coord[3] as usize;
            let s = axis_scales(cal, e);
            let dt = (to.coord[track] - from.coord[track]) * cal.axis_scale(e, track);
            xy_speed += to.sqr_xy_dist_to(from, s[0], s[1]).sqrt() / dt;
            xyz_speed += to.sqr_dist_to(from, s).sqrt() / dt;
        }
        let segments = points.len() - 1;
        Some(TrackSummary {
            list : pos,
            total_xy : first.sqr_xy_dist_to(last, scales[0], scales[1]).sqrt(),
            total_xyz : first.sqr_dist_to(last, scales).sqrt(),
            duration : (last.coord[track] - first.coord[track]) * cal.axis_scale(elem, track),
            segments,
            avg_xy_speed : xy_speed / segments as f64,
            avg_xyz_speed : xyz_speed / segments as f64,
        })
    }

    /// Per-list summaries followed by each list's MSD table
    /// (`#\tlist\tgap\tmsd`).
    pub fn print_summary<C : CalibrationSource + ?Sized>(&self, cal : &C) -> String {
        let f = |v : f64| format_number(v, 3);
        let track = cal.track_direction();
        let unit = cal.axis_unit(0);
        let speed_unit = format!("{}/{}", unit, cal.axis_unit(track));
        let xy = format!("{}{}", cal.axis_name(0), cal.axis_name(1));
        let xyz = format!("{}{}", xy, cal.axis_name(2));
        let planar = track == 2 || cal.sizes()[2] == 1;

        let mut text = String::from("# Statistics Summary\n#\t");
        for l in 0..self.num_lists() {
            if let Some(s) = self.track_summary(cal, l) {
                text += &format!("\n# Summary for List \t{}\n", l);
                if track == 2 {
                    text += &format!("\n# Total {} Distance traveled: \t{} [{}]\n", xy, f(s.total_xy), unit);
                } else {
                    text += &format!("\n# Total {} Distance traveled: \t{} [{}]\n", xyz, f(s.total_xyz), unit);
                }
                text += &format!("# Length of Trace: \t{} [{}]\n", f(s.duration), cal.axis_unit(track));
                text += &format!("# Segments in Trace: \t{}\n", s.segments);
                text += &format!("# Total {} speed: \t{} [{}]\n", xy, f(s.total_xy_speed()), speed_unit);
                if track != 2 {
                    text += &format!("# Total {} speed: \t{} [{}]\n", xyz, f(s.total_xyz_speed()), speed_unit);
                }
                text += &format!("# Average {} speed: \t{} [{}]\n", xy, f(s.avg_xy_speed), speed_unit);
                if track == 2 {
                    text += &format!("# Directionality Index: \t{}\n", f(s.directionality_xy()));
                } else {
                    text += &format!("# Average {} speed: \t{} [{}]\n", xyz, f(s.avg_xyz_speed), speed_unit);
                    text += &format!("# Directionality {} Index: \t{}\n", xy, f(s.directionality_xy()));
                    text += &format!("# Directionality {} Index: \t{}\n", xyz, f(s.directionality_xyz()));
                }
            }

            if self.num_markers(l) > 1 {
                let label = if planar { &xy } else { &xyz };
                text += &format!("\n# {}-MSD summary list : \t{}\n", label, l);
                let elem = self.point(l, 0).map_or(0, |p| p.coord[3] as usize);
                let step = cal.axis_scale(elem, track);
                for (gap, msd) in self.msd_from_list(cal, l, !planar).iter().enumerate() {
                    text += &format!("#\t{}\t{}\t{}\n", l, (gap + 1) as f64 * step, msd);
                }
            }
        }
        text
    }
}
