//! Joint histograms of up to three buffers.
//!
//! A histogram is itself a voxel buffer: its X, Y and Z axes are the
//! binned values of the X, Y and Z source buffers, and each voxel counts
//! the source voxels that fell into that bin. The histogram's own axis
//! calibration maps values to bins: value `v` goes into bin
//! `(v - offset[a]) / scale[a]` along axis `a`, clamped to the histogram
//! extent.

use crate::data::roi::Roi;
use crate::data::voxel::{DimensionsError, Element};
use crate::VoxelViewError;

/// Resolved source buffers. `x` is mandatory for any output.
#[derive(Clone, Copy, Default)]
pub struct SourceBuffers<'a> {
    pub x : Option<&'a dyn Element>,
    pub y : Option<&'a dyn Element>,
    pub z : Option<&'a dyn Element>,
}

/// Bin of `value` along one histogram axis, truncated and clamped.
#[inline]
fn bin_of(value : f64, scale : f64, offset : f64, size : usize) -> usize {
    let bin = ((value - offset) / scale) as i64;
    bin.clamp(0, size.max(1) as i64 - 1) as usize
}

/// Calls `visit(x, y, z, [bx, by, bz])` for every voxel of the X
/// source that is inside `roi` and passes `gate`.
fn for_each_binned<F>(
    hist : &dyn Element,
    sources : &SourceBuffers,
    xref : &dyn Element,
    gate : Option<&dyn Element>,
    roi : &dyn Roi,
    mut visit : F,
) where F : FnMut(usize, usize, usize, [usize; 3]) {
    let axes = hist.header().calibration.axes();
    let extent = hist.extent();
    let [sx, sy, sz] = xref.extent();

    for z in 0..sz {
        for y in 0..sy {
            for x in 0..sx {
                let (xi, yi, zi) = (x as i64, y as i64, z as i64);
                if !xref.in_roi_range(xi, yi, zi, roi) {
                    continue;
                }
                if let Some(gate) = gate {
                    if !gate.gate_above_zero(xi, yi, zi, xref) {
                        continue;
                    }
                }
                let mut bins = [0usize; 3];
                bins[0] = bin_of(xref.calibrated_at(x, y, z), axes.scales[0], axes.offsets[0], extent[0]);
                if let Some(ysrc) = sources.y {
                    let v = ysrc.calibrated_at_offset(xi, yi, zi, xref);
                    bins[1] = bin_of(v, axes.scales[1], axes.offsets[1], extent[1]);
                }
                if let Some(zsrc) = sources.z {
                    let v = zsrc.calibrated_at_offset(xi, yi, zi, xref);
                    bins[2] = bin_of(v, axes.scales[2], axes.offsets[2], extent[2]);
                }
                visit(x, y, z, bins);
            }
        }
    }
}

/// Clears `hist` and fills it with counts. Returns the peak count.
///
/// Without an X source, or with a histogram that has no bins, this
/// logs and returns 0, leaving `hist` untouched.
pub fn compute_histogram(
    hist : &mut dyn Element,
    sources : &SourceBuffers,
    gate : Option<&dyn Element>,
    roi : &dyn Roi,
) -> f64 {
    let Some(xref) = sources.x else {
        log::error!("Histogram requested without an X source");
        return 0.0;
    };
    if hist.is_empty() {
        log::warn!("Histogram of extent {:?} has no bins", hist.extent());
        return 0.0;
    }
    let [hx, hy, _] = hist.extent();
    let mut counts = vec![0.0f64; hist.len()];
    let mut peak = 0.0f64;

    for_each_binned(&*hist, sources, xref, gate, roi, |_, _, _, [bx, by, bz]| {
        let idx = bx + hx * by + hx * hy * bz;
        counts[idx] += 1.0;
        peak = peak.max(counts[idx]);
    });

    hist.clear();
    let [hx, hy, hz] = hist.extent();
    for bz in 0..hz {
        for by in 0..hy {
            for bx in 0..hx {
                let count = counts[bx + hx * by + hx * hy * bz];
                if count > 0.0 {
                    hist.set_value(bx, by, bz, count);
                }
            }
        }
    }

    label_axes(hist, sources);
    let header = hist.header_mut();
    header.max = peak;
    header.min = 0.0;
    header.max_value = peak;
    hist.set_scale_shift(0.0, peak);
    log::debug!("Histogram peak {} over extent {:?}", peak, hist.extent());
    peak
}

/// The histogram axes take the names and units of their sources'
/// values. The histogram's own value is a count.
fn label_axes(hist : &mut dyn Element, sources : &SourceBuffers) {
    let calibration = &hist.header().calibration;
    for (axis, source) in [sources.x, sources.y, sources.z].iter().enumerate() {
        if let Some(source) = source {
            let value = &source.header().calibration.value;
            calibration.set_axis_label(axis, &value.name, &value.unit);
        }
    }
    hist.header_mut().calibration.set_value_calibration(1.0, 0.0, "frequency", "cnts");
}

/// Writes 1 into `mask` wherever the histogram bin of a source voxel
/// is selected by `hist_roi`, and 0 elsewhere. The mask
/// must have the X source's extent and is aligned to it.
pub fn compute_hist_mask(
    hist : &dyn Element,
    sources : &SourceBuffers,
    mask : &mut dyn Element,
    hist_roi : &dyn Roi,
) -> Result<(), VoxelViewError> {
    let Some(xref) = sources.x else {
        log::error!("Histogram mask requested without an X source");
        return Ok(());
    };
    if mask.extent() != xref.extent() {
        return Err(DimensionsError::MismatchedDimensions {
            required : xref.extent(),
            requested : mask.extent(),
        }.into());
    }
    mask.clear();
    mask.align_display_to(xref);

    let axes = hist.header().calibration.axes();
    let extent = hist.extent();
    let [sx, sy, sz] = xref.extent();
    for z in 0..sz {
        for y in 0..sy {
            for x in 0..sx {
                let (xi, yi, zi) = (x as i64, y as i64, z as i64);
                // nearest bin rather than truncation
                let mut bins = [0i64; 3];
                bins[0] = rounded_bin(xref.calibrated_at(x, y, z), axes.scales[0], axes.offsets[0], extent[0]);
                if let Some(ysrc) = sources.y {
                    let v = ysrc.calibrated_at_offset(xi, yi, zi, xref);
                    bins[1] = rounded_bin(v, axes.scales[1], axes.offsets[1], extent[1]);
                }
                if let Some(zsrc) = sources.z {
                    let v = zsrc.calibrated_at_offset(xi, yi, zi, xref);
                    bins[2] = rounded_bin(v, axes.scales[2], axes.offsets[2], extent[2]);
                }
                if hist_roi.in_range(bins[0], bins[1], bins[2]) {
                    mask.set_value(x, y, z, 1.0);
                }
            }
        }
    }
    let header = mask.header_mut();
    header.max = 1.0;
    header.min = 0.0;
    header.max_value = 5.0;
    Ok(())
}

#[inline]
fn rounded_bin(value : f64, scale : f64, offset : f64, size : usize) -> i64 {
    let bin = ((value - offset) / scale + 0.5) as i64;
    bin.clamp(0, size.max(1) as i64 - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::roi::{FullRoi, RectRoi};
    use crate::data::voxel::{DataType, VoxelBuffer};

    fn ramp(extent : [usize; 3]) -> VoxelBuffer {
        let mut buffer = VoxelBuffer::new(DataType::Float, extent, 1.0);
        let [sx, sy, sz] = extent;
        for z in 0..sz {
            for y in 0..sy {
                for x in 0..sx {
                    buffer.set_value(x, y, z, ((x + y + z) % 5) as f64);
                }
            }
        }
        buffer
    }

    #[test]
    fn peak_matches_brute_force() {
        let data = ramp([6, 5, 3]);
        let mut hist = VoxelBuffer::new(DataType::Integer, [8, 1, 1], 1.0);
        let sources = SourceBuffers { x : Some(&data), ..Default::default() };
        let peak = compute_histogram(&mut hist, &sources, None, &FullRoi);

        let mut brute = [0usize; 8];
        for z in 0..3 {
            for y in 0..5 {
                for x in 0..6 {
                    brute[(x + y + z) % 5] += 1;
                }
            }
        }
        let expected_peak = *brute.iter().max().unwrap() as f64;
        assert_eq!(peak, expected_peak);
        for (bin, count) in brute.iter().enumerate() {
            assert_eq!(hist.raw_at(bin, 0, 0), *count as f64);
        }
        assert_eq!(hist.header().max, expected_peak);
        assert_eq!(hist.header().calibration.value.name, "frequency");
        assert_eq!(hist.header().calibration.axes().names[0], "intensity");
    }

    #[test]
    fn missing_x_source_is_a_no_op() {
        let mut hist = VoxelBuffer::new(DataType::Integer, [4, 1, 1], 1.0);
        hist.set_value(0, 0, 0, 3.0);
        assert_eq!(compute_histogram(&mut hist, &SourceBuffers::default(), None, &FullRoi), 0.0);
        assert_eq!(hist.raw_at(0, 0, 0), 3.0);
    }

    #[test]
    fn gate_and_roi_restrict_counts() {
        let data = ramp([4, 4, 1]);
        let mut gate = VoxelBuffer::new(DataType::Byte, [4, 4, 1], 255.0);
        gate.set_value(0, 0, 0, 1.0);
        gate.set_value(1, 0, 0, 1.0);
        gate.set_value(3, 3, 0, 1.0);
        let roi = RectRoi::new([0, 0, 0], [1, 3, 0]);

        let mut hist = VoxelBuffer::new(DataType::Integer, [5, 1, 1], 1.0);
        let sources = SourceBuffers { x : Some(&data), ..Default::default() };
        compute_histogram(&mut hist, &sources, Some(&gate), &roi);
        // (0,0) -> 0 and (1,0) -> 1 pass; (3,3) is outside the ROI
        assert_eq!(hist.raw_at(0, 0, 0), 1.0);
        assert_eq!(hist.raw_at(1, 0, 0), 1.0);
        assert_eq!((2..5).map(|b| hist.raw_at(b, 0, 0)).sum::<f64>(), 0.0);
    }

    #[test]
    fn two_dimensional_histogram_and_mask() {
        let data = ramp([4, 4, 1]);
        let mut other = VoxelBuffer::new(DataType::Float, [4, 4, 1], 1.0);
        for y in 0..4 {
            for x in 0..4 {
                other.set_value(x, y, 0, y as f64);
            }
        }
        let mut hist = VoxelBuffer::new(DataType::Integer, [5, 4, 1], 1.0);
        let sources = SourceBuffers { x : Some(&data), y : Some(&other), z : None };
        compute_histogram(&mut hist, &sources, None, &FullRoi);
        // value (x + y) % 5 against y: every (x, y) lands in its own bin
        let total : f64 = (0..4).flat_map(|by| (0..5).map(move |bx| (bx, by)))
            .map(|(bx, by)| hist.raw_at(bx, by, 0)).sum();
        assert_eq!(total, 16.0);
        assert_eq!(hist.raw_at(0, 0, 0), 1.0);

        // Select bins with x-value 0..1 and y-value 0
        let mut mask = VoxelBuffer::new(DataType::Byte, [4, 4, 1], 255.0);
        let hist_roi = RectRoi::new([0, 0, 0], [1, 0, 0]);
        compute_hist_mask(&hist, &sources, &mut mask, &hist_roi).unwrap();
        assert_eq!(mask.raw_at(0, 0, 0), 1.0);
        assert_eq!(mask.raw_at(1, 0, 0), 1.0);
        assert_eq!(mask.raw_at(2, 0, 0), 0.0);
        assert_eq!(mask.raw_at(0, 1, 0), 0.0);
        assert_eq!(mask.header().max_value, 5.0);

        let mut wrong = VoxelBuffer::new(DataType::Byte, [2, 2, 1], 255.0);
        assert!(compute_hist_mask(&hist, &sources, &mut wrong, &hist_roi).is_err());
    }

    #[test]
    fn empty_histogram_or_source_counts_nothing() {
        let data = ramp([4, 4, 1]);
        let sources = SourceBuffers { x : Some(&data), ..Default::default() };
        let mut no_bins = VoxelBuffer::new(DataType::Integer, [0, 1, 1], 1.0);
        assert_eq!(compute_histogram(&mut no_bins, &sources, None, &FullRoi), 0.0);

        // a released Y source reads as 0 and lands in the first bin
        let mut gone = ramp([4, 4, 1]);
        gone.release();
        let sources = SourceBuffers { x : Some(&data), y : Some(&gone), z : None };
        let mut hist = VoxelBuffer::new(DataType::Integer, [5, 2, 1], 1.0);
        assert!(compute_histogram(&mut hist, &sources, None, &FullRoi) > 0.0);
        let second_row : f64 = (0..5).map(|bx| hist.raw_at(bx, 1, 0)).sum();
        assert_eq!(second_row, 0.0);
    }
}
