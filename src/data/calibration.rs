//! `Calibration`
//!
//! Maps raw stored values and voxel indices to physical units.
//!
//! Axis metadata (the five per-axis scales, offsets, names and units)
//! lives in an `AxisMetadata` record behind an `Arc<RwLock<_>>`. Buffers
//! that are copies of one another hold the SAME record: editing the axes
//! of one edits the axes of all of them. The value calibration (scale,
//! offset, name, unit of the stored quantity) is plain data owned by
//! each buffer and is copied, never shared.

use std::sync::Arc;

use parking_lot::RwLock;

/// Number of calibrated axes: X, Y, Z, Element, Time.
pub const NUM_AXES : usize = 5;

/// Axis names in storage order.
pub const AXIS_LABELS : [&str; NUM_AXES] = ["X", "Y", "Z", "Element", "Time"];

#[derive(Debug, Clone, PartialEq)]
pub struct AxisMetadata {
    pub scales : [f64; NUM_AXES],
    pub offsets : [f64; NUM_AXES],
    pub names : [String; NUM_AXES],
    pub units : [String; NUM_AXES],
}

impl Default for AxisMetadata {
    fn default() -> Self {
        AxisMetadata {
            scales : [1.0; NUM_AXES],
            offsets : [0.0; NUM_AXES],
            names : AXIS_LABELS.map(String::from),
            units : ["pixels", "pixels", "pixels", "elements", "steps"].map(String::from),
        }
    }
}

/// Calibration of the stored quantity itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueCalibration {
    pub scale : f64,
    pub offset : f64,
    pub name : String,
    pub unit : String,
}

impl Default for ValueCalibration {
    fn default() -> Self {
        ValueCalibration {
            scale : 1.0,
            offset : 0.0,
            name : "intensity".to_string(),
            unit : "a.u.".to_string(),
        }
    }
}

/// Per-buffer calibration: shared axes plus an owned value calibration.
#[derive(Debug, Clone, Default)]
pub struct Calibration {
    axes : Arc<RwLock<AxisMetadata>>,
    pub value : ValueCalibration,
}

impl Calibration {
    pub fn new() -> Self {
        Calibration::default()
    }

    /// `raw * scale + offset`
    #[inline]
    pub fn calibrate(&self, raw : f64) -> f64 {
        raw * self.value.scale + self.value.offset
    }

    /// Inverse of `calibrate`.
    #[inline]
    pub fn uncalibrate(&self, value : f64) -> f64 {
        (value - self.value.offset) / self.value.scale
    }

    /// Adopt another buffer's full calibration. The axis record
    /// becomes shared with `other` (and with everything `other`
    /// already shares it with); the value calibration is copied.
    pub fn adopt(&mut self, other : &Calibration) {
        self.axes = Arc::clone(&other.axes);
        self.value = other.value.clone();
    }

    /// Replace only the value calibration, leaving the axes coupled.
    pub fn set_value_calibration(&mut self, scale : f64, offset : f64, name : &str, unit : &str) {
        self.value = ValueCalibration {
            scale,
            offset,
            name : name.to_string(),
            unit : unit.to_string(),
        };
    }

    /// Gives this buffer a private copy of the axis record so that
    /// later edits stop propagating.
    pub fn decouple(&mut self) {
        let copy = self.axes.read().clone();
        self.axes = Arc::new(RwLock::new(copy));
    }

    /// Whether both calibrations point at the same axis record.
    pub fn is_coupled_with(&self, other : &Calibration) -> bool {
        Arc::ptr_eq(&self.axes, &other.axes)
    }

    /// Snapshot of the (shared) axis record.
    pub fn axes(&self) -> AxisMetadata {
        self.axes.read().clone()
    }

    pub fn axis_scale(&self, axis : usize) -> f64 {
        self.axes.read().scales[axis]
    }

    pub fn axis_offset(&self, axis : usize) -> f64 {
        self.axes.read().offsets[axis]
    }

    /// Edit the shared axis record in place. Visible through every
    /// coupled buffer.
    pub fn update_axes<F : FnOnce(&mut AxisMetadata)>(&self, edit : F) {
        edit(&mut self.axes.write());
    }

    pub fn set_axis_scales(&self, scales : [f64; NUM_AXES], offsets : [f64; NUM_AXES]) {
        self.update_axes(|axes| {
            axes.scales = scales;
            axes.offsets = offsets;
        });
    }

    pub fn set_axis_label(&self, axis : usize, name : &str, unit : &str) {
        self.update_axes(|axes| {
            axes.names[axis] = name.to_string();
            axes.units[axis] = unit.to_string();
        });
    }

    /// Physical coordinate of a voxel index along `axis`.
    pub fn axis_position(&self, axis : usize, index : f64) -> f64 {
        let axes = self.axes.read();
        index * axes.scales[axis] + axes.offsets[axis]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adopted_axes_propagate_edits() {
        let original = Calibration::new();
        let mut copy = Calibration::new();
        copy.adopt(&original);
        assert!(copy.is_coupled_with(&original));

        original.set_axis_scales([0.5, 0.5, 2.0, 1.0, 10.0], [1.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(copy.axis_scale(2), 2.0);
        assert_eq!(copy.axis_position(0, 4.0), 3.0);

        copy.set_axis_label(4, "Time", "s");
        assert_eq!(original.axes().units[4], "s");
    }

    #[test]
    fn value_calibration_is_independent() {
        let mut original = Calibration::new();
        let mut copy = Calibration::new();
        copy.adopt(&original);

        original.set_value_calibration(2.0, 1.0, "counts", "photons");
        assert_eq!(original.calibrate(3.0), 7.0);
        assert_eq!(copy.calibrate(3.0), 3.0);
        assert_eq!(copy.value.name, "intensity");
        assert_eq!(original.uncalibrate(7.0), 3.0);
    }

    #[test]
    fn decoupled_axes_stop_propagating() {
        let original = Calibration::new();
        let mut copy = Calibration::new();
        copy.adopt(&original);
        copy.decouple();
        original.set_axis_scales([3.0; NUM_AXES], [0.0; NUM_AXES]);
        assert_eq!(copy.axis_scale(0), 1.0);
        assert!(!copy.is_coupled_with(&original));
    }
}
