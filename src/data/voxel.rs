//! `Voxel`
//!
//! Typed 3d voxel buffers and the uniform `Element` contract over them.
//!
//! Every buffer stores `SizeX * SizeY * SizeZ` samples of one native type
//! in an `ndarray::Array3` of shape `(SizeZ, SizeY, SizeX)`, so that the
//! standard-layout linear index of `(x, y, z)` is
//! `x + SizeX * y + SizeX * SizeY * z`.
//!
//! Accessors come in two flavors:
//!
//! * `*_with_bounds` take signed coordinates and clamp them to the
//! nearest valid voxel. They never fail.
//! * `raw_at` / `calibrated_at` / `*_scaled` take `usize` coordinates and
//! require them to be in bounds. This is checked with `debug_assert!`
//! only; release builds index straight into the array.

mod sample;
mod typed;
mod buffer;
mod decode;
pub mod histogram;
pub mod fitting;

pub use sample::{Sample, Complex, ComplexReadMode};
pub use typed::TypedBuffer;
pub use buffer::VoxelBuffer;
pub use decode::SliceLayout;

use crate::data::calibration::Calibration;
use crate::data::roi::Roi;
use crate::data::colormap::TABLE_SIZE;
use crate::VoxelViewError;

/// `(SizeX, SizeY, SizeZ)`
pub type Extent = [usize; 3];

/// Storage type tags. The discriminants follow the order the
/// type tags are exchanged with host applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Byte = 0,
    Integer = 1,
    Float = 2,
    Double = 3,
    Complex = 4,
    Short = 5,
    Long = 6,
}

impl DataType {
    pub const ALL : [DataType; 7] = [
        DataType::Byte, DataType::Integer, DataType::Float, DataType::Double,
        DataType::Complex, DataType::Short, DataType::Long,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Byte => "Byte",
            DataType::Integer => "Integer",
            DataType::Float => "Float",
            DataType::Double => "Double",
            DataType::Complex => "Complex",
            DataType::Short => "Short",
            DataType::Long => "Long",
        }
    }

    /// Bytes per stored sample.
    pub fn std_bytes(&self) -> usize {
        match self {
            DataType::Byte => 1,
            DataType::Short => 2,
            DataType::Integer | DataType::Float => 4,
            DataType::Double | DataType::Long | DataType::Complex => 8,
        }
    }

    /// Whether 8-bit channels can be pulled out of packed RGB into this type.
    pub fn is_integer_family(&self) -> bool {
        matches!(self, DataType::Byte | DataType::Short | DataType::Integer | DataType::Long)
    }

    pub fn from_tag(tag : i32) -> Option<DataType> {
        DataType::ALL.iter().copied().find(|dt| *dt as i32 == tag)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Things that go wrong with extents and slice indices.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DimensionsError {
    #[error("Mismatched dimensions. Requested: {requested:?}, Required: {required:?}")]
    MismatchedDimensions { required : Extent, requested : Extent },
    #[error("Slice {slice} is out of bounds for a buffer with {depth} slices")]
    SliceOutOfBounds { slice : usize, depth : usize },
    #[error("Input slice too short: needs {needed} entries, got {got}")]
    ShortInput { needed : usize, got : usize },
}

/// Index of an element inside a `Dataset`, also the marker `e` coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

/// Non-owning references to the buffers a histogram is built from.
/// Only `x` is mandatory for a histogram to be computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistogramSources {
    pub x : Option<ElementId>,
    pub y : Option<ElementId>,
    pub z : Option<ElementId>,
}

/// Element-wise operations between two buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arithmetic {
    Add,
    Sub,
    Mul,
    Div,
    Copy,
}

/// Sentinel written by `Arithmetic::Div` for `x / 0` with `x != 0`.
pub const DIV_BY_ZERO_SENTINEL : f64 = 1e32;

impl Arithmetic {
    #[inline]
    pub fn apply(&self, own : f64, other : f64) -> f64 {
        match self {
            Arithmetic::Add => own + other,
            Arithmetic::Sub => own - other,
            Arithmetic::Mul => own * other,
            Arithmetic::Div => {
                if other != 0.0 { own / other }
                else if own == 0.0 { 0.0 }
                else { DIV_BY_ZERO_SENTINEL }
            },
            Arithmetic::Copy => other,
        }
    }
}

/// Aggregates of raw values inside a ROI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiStats {
    pub sum : f64,
    pub mean : f64,
    pub max : f64,
    pub min : f64,
    pub voxels : usize,
}

/// Metadata shared by all buffer variants.
#[derive(Debug, Clone)]
pub struct BufferHeader {
    pub (crate) extent : Extent,
    pub calibration : Calibration,
    /// Raw minimum, as of the last `set_min_max`.
    pub min : f64,
    /// Raw maximum, as of the last `set_min_max`.
    pub max : f64,
    /// Nominal capacity (e.g. 255 for 8-bit data).
    pub max_value : f64,
    /// Origin of this buffer in display coordinates.
    pub display_offset : [i64; 3],
    pub (crate) scale_b : f64,
    pub (crate) scale_i : f64,
    pub (crate) shift : f64,
    pub histogram_sources : HistogramSources,
}

impl BufferHeader {
    pub fn new(extent : Extent, max_value : f64) -> Self {
        BufferHeader {
            extent,
            calibration : Calibration::new(),
            min : 0.0,
            max : 0.0,
            max_value,
            display_offset : [0; 3],
            scale_b : 1.0,
            scale_i : 1.0,
            shift : 0.0,
            histogram_sources : HistogramSources::default(),
        }
    }

    pub fn extent(&self) -> Extent { self.extent }

    /// `(shift, byte scale, table scale)` of the contrast window.
    pub fn scale_shift(&self) -> (f64, f64, f64) {
        (self.shift, self.scale_b, self.scale_i)
    }
}

/// The uniform per-voxel contract of every buffer variant.
///
/// Required methods touch typed storage; everything else is built
/// on top of them and is identical for all variants.
pub trait Element : Send + Sync {
    fn header(&self) -> &BufferHeader;
    fn header_mut(&mut self) -> &mut BufferHeader;
    fn data_type(&self) -> DataType;

    /// Raw stored value. `(x, y, z)` must be in bounds.
    fn raw_at(&self, x : usize, y : usize, z : usize) -> f64;

    /// Stores `value` as the native type (with the variant's clamping).
    /// `(x, y, z)` must be in bounds.
    fn set_value(&mut self, x : usize, y : usize, z : usize, value : f64);

    /// Zero every voxel.
    fn clear(&mut self);

    /// Drop the storage now, independent of when the buffer itself goes.
    fn release(&mut self);

    fn is_released(&self) -> bool;

    /// One full-volume scan for the raw min/max.
    fn set_min_max(&mut self);

    /// Element-wise `self = op(self, other)` on calibrated values.
    /// Extents must match.
    fn combine(&mut self, op : Arithmetic, other : &dyn Element) -> Result<(), VoxelViewError>;

    /// Decode one z-slice from packed little-endian bytes.
    ///
    /// Every assembled sample goes through the same storage rule as
    /// `set_value`: 16-bit samples decoded into a `Short` buffer are
    /// clamped to `[0, 255]`. Use an `Integer` buffer to keep the full
    /// 16-bit range.
    fn convert_slice_from_bytes(&mut self, z : usize, bytes : &[u8], layout : SliceLayout)
        -> Result<(), VoxelViewError>;

    /// Copy one z-slice from host samples of this buffer's native type,
    /// given as raw bytes. Sample `i` is read at `i * step + offset`
    /// (in samples).
    fn convert_slice_from_similar(&mut self, z : usize, bytes : &[u8], step : usize, offset : usize)
        -> Result<(), VoxelViewError>;

    /// Pull one 8-bit channel out of packed `0x00RRGGBB` pixels.
    /// `channel` 0 = red, 1 = green, 2 = blue. Integer-family only.
    fn convert_slice_from_rgb(&mut self, z : usize, rgb : &[u32], step : usize, offset : usize, channel : usize)
        -> Result<(), VoxelViewError>;

    /// Native little-endian bytes of one z-slice.
    fn copy_slice_to_similar(&self, z : usize) -> Result<Vec<u8>, VoxelViewError>;

    /// Cycle how complex samples are read (no-op for real types).
    fn advance_read_mode(&mut self) {}

    fn extent(&self) -> Extent { self.header().extent }

    fn len(&self) -> usize {
        let [sx, sy, sz] = self.extent();
        sx * sy * sz
    }

    fn is_empty(&self) -> bool { self.len() == 0 }

    fn within_bounds(&self, x : i64, y : i64, z : i64) -> bool {
        let [sx, sy, sz] = self.extent();
        x >= 0 && y >= 0 && z >= 0
            && (x as usize) < sx && (y as usize) < sy && (z as usize) < sz
    }

    /// Nearest valid voxel, `None` for an empty (or released) buffer.
    fn clamp_coords(&self, x : i64, y : i64, z : i64) -> Option<(usize, usize, usize)> {
        let [sx, sy, sz] = self.extent();
        if sx == 0 || sy == 0 || sz == 0 {
            return None;
        }
        Some((
            x.clamp(0, sx as i64 - 1) as usize,
            y.clamp(0, sy as i64 - 1) as usize,
            z.clamp(0, sz as i64 - 1) as usize,
        ))
    }

    /// Clamped read. An empty buffer reads as 0.
    fn raw_with_bounds(&self, x : i64, y : i64, z : i64) -> f64 {
        self.clamp_coords(x, y, z).map_or(0.0, |(x, y, z)| self.raw_at(x, y, z))
    }

    /// `raw * ValueScale + ValueOffset`. Must be in bounds.
    fn calibrated_at(&self, x : usize, y : usize, z : usize) -> f64 {
        self.header().calibration.calibrate(self.raw_at(x, y, z))
    }

    fn calibrated_with_bounds(&self, x : i64, y : i64, z : i64) -> f64 {
        self.clamp_coords(x, y, z).map_or(0.0, |(x, y, z)| self.calibrated_at(x, y, z))
    }

    /// `(raw - shift) * table scale`, the colormap-table index.
    fn int_scaled(&self, x : usize, y : usize, z : usize) -> i32 {
        let header = self.header();
        ((self.raw_at(x, y, z) - header.shift) * header.scale_i) as i32
    }

    fn int_scaled_with_bounds(&self, x : i64, y : i64, z : i64) -> i32 {
        self.clamp_coords(x, y, z).map_or(0, |(x, y, z)| self.int_scaled(x, y, z))
    }

    /// `(raw - shift) * byte scale`, for 8-bit pseudocolor.
    fn byte_scaled(&self, x : usize, y : usize, z : usize) -> i32 {
        let header = self.header();
        ((self.raw_at(x, y, z) - header.shift) * header.scale_b) as i32
    }

    /// Map the contrast window `[min, max]` to `[0, 256)` for bytes and
    /// to `[0, TABLE_SIZE)` for table indices.
    fn set_scale_shift(&mut self, min : f64, max : f64) {
        let header = self.header_mut();
        header.scale_b = 256.0 / (max - min);
        header.scale_i = TABLE_SIZE as f64 / (max - min);
        header.shift = min;
    }

    /// Coordinates `(x, y, z)` of `reference` translated into this
    /// buffer's own coordinates through the display offsets.
    fn offset_coords(&self, x : i64, y : i64, z : i64, reference : &dyn Element) -> (i64, i64, i64) {
        let own = self.header().display_offset;
        let other = reference.header().display_offset;
        (x - own[0] + other[0], y - own[1] + other[1], z - own[2] + other[2])
    }

    fn raw_at_offset(&self, x : i64, y : i64, z : i64, reference : &dyn Element) -> f64 {
        let (x, y, z) = self.offset_coords(x, y, z, reference);
        self.raw_with_bounds(x, y, z)
    }

    fn calibrated_at_offset(&self, x : i64, y : i64, z : i64, reference : &dyn Element) -> f64 {
        let (x, y, z) = self.offset_coords(x, y, z, reference);
        self.calibrated_with_bounds(x, y, z)
    }

    /// Gate test: strictly positive calibrated value at the
    /// corresponding voxel.
    fn gate_above_zero(&self, x : i64, y : i64, z : i64, reference : &dyn Element) -> bool {
        self.calibrated_at_offset(x, y, z, reference) > 0.0
    }

    /// ROI test in display coordinates.
    fn in_roi_range(&self, x : i64, y : i64, z : i64, roi : &dyn Roi) -> bool {
        let offset = self.header().display_offset;
        roi.in_range(x + offset[0], y + offset[1], z + offset[2])
    }

    fn align_display_to(&mut self, other : &dyn Element) {
        self.header_mut().display_offset = other.header().display_offset;
    }

    /// Sum, mean, max and min of raw values over the voxels in `roi`.
    /// With no voxel inside, max/min stay at -1e30/1e30 and mean is NaN.
    fn roi_statistics(&self, roi : &dyn Roi) -> RoiStats {
        let [sx, sy, sz] = self.extent();
        let mut stats = RoiStats { sum : 0.0, mean : f64::NAN, max : -1e30, min : 1e30, voxels : 0 };
        for z in 0..sz {
            for y in 0..sy {
                for x in 0..sx {
                    if roi.in_range(x as i64, y as i64, z as i64) {
                        let val = self.raw_at(x, y, z);
                        stats.sum += val;
                        stats.max = stats.max.max(val);
                        stats.min = stats.min.min(val);
                        stats.voxels += 1;
                    }
                }
            }
        }
        if stats.voxels > 0 {
            stats.mean = stats.sum / stats.voxels as f64;
        }
        stats
    }

    /// Inside `roi`, writes 1 (or `from`'s raw value) where `gate`'s
    /// table index is positive and 0 elsewhere. Voxels outside the ROI
    /// are left untouched.
    fn generate_mask(&mut self, roi : &dyn Roi, gate : &dyn Element, from : Option<&dyn Element>) {
        let [sx, sy, sz] = self.extent();
        for z in 0..sz {
            for y in 0..sy {
                for x in 0..sx {
                    if !roi.in_range(x as i64, y as i64, z as i64) {
                        continue;
                    }
                    let value = if gate.int_scaled_with_bounds(x as i64, y as i64, z as i64) > 0 {
                        match from {
                            Some(source) => source.raw_with_bounds(x as i64, y as i64, z as i64),
                            None => 1.0,
                        }
                    } else {
                        0.0
                    };
                    self.set_value(x, y, z, value);
                }
            }
        }
    }
}
