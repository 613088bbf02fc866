use ndarray::prelude::*;
use rayon::prelude::*;

use crate::data::voxel::{
    Arithmetic, BufferHeader, ComplexReadMode, DataType, DimensionsError, Element, Extent, Sample,
    SliceLayout,
};
use crate::data::voxel::decode;
use crate::utils::{parallelize_op, parallelize_reduce};
use crate::VoxelViewError;

/// Storage of one native sample type. `Array3` of shape
/// `(SizeZ, SizeY, SizeX)`, standard layout.
#[derive(Debug, Clone)]
pub struct TypedBuffer<T : Sample> {
    data : Array3<T>,
    header : BufferHeader,
    read_mode : ComplexReadMode,
    released : bool,
}

impl<T : Sample> TypedBuffer<T> {
    /// Zero-filled buffer of `extent = [SizeX, SizeY, SizeZ]`.
    pub fn new(extent : Extent, max_value : f64) -> Self {
        let [sx, sy, sz] = extent;
        TypedBuffer {
            data : Array3::<T>::default((sz, sy, sx)),
            header : BufferHeader::new(extent, max_value),
            read_mode : ComplexReadMode::default(),
            released : false,
        }
    }

    /// Wraps an existing `(z, y, x)` array.
    pub fn from_array(data : Array3<T>, max_value : f64) -> Self {
        let (sz, sy, sx) = data.dim();
        let data = if data.is_standard_layout() { data } else { data.as_standard_layout().to_owned() };
        TypedBuffer {
            data,
            header : BufferHeader::new([sx, sy, sz], max_value),
            read_mode : ComplexReadMode::default(),
            released : false,
        }
    }

    pub fn data(&self) -> ArrayView3<T> { self.data.view() }

    pub fn data_mut(&mut self) -> ArrayViewMut3<T> { self.data.view_mut() }

    /// Samples in linear order `x + SizeX * y + SizeX * SizeY * z`.
    pub fn as_slice(&self) -> &[T] {
        self.data.as_slice().unwrap_or(&[])
    }

    /// Native sample. Must be in bounds.
    #[inline]
    pub fn get(&self, x : usize, y : usize, z : usize) -> T {
        debug_assert!(!self.released, "read from a released buffer");
        self.data[[z, y, x]]
    }

    #[inline]
    pub fn put(&mut self, x : usize, y : usize, z : usize, value : T) {
        self.data[[z, y, x]] = value;
    }

    pub fn read_mode(&self) -> ComplexReadMode { self.read_mode }

    pub fn set_read_mode(&mut self, mode : ComplexReadMode) { self.read_mode = mode; }

    /// Mutable 2d view of plane `z`, or an error if `z` is past the end.
    pub (crate) fn slice_mut(&mut self, z : usize) -> Result<ArrayViewMut2<T>, DimensionsError> {
        let depth = self.header.extent[2];
        if z >= depth || self.released {
            return Err(DimensionsError::SliceOutOfBounds { slice : z, depth });
        }
        Ok(self.data.index_axis_mut(Axis(0), z))
    }

    pub (crate) fn slice(&self, z : usize) -> Result<ArrayView2<T>, DimensionsError> {
        let depth = self.header.extent[2];
        if z >= depth || self.released {
            return Err(DimensionsError::SliceOutOfBounds { slice : z, depth });
        }
        Ok(self.data.index_axis(Axis(0), z))
    }
}

impl<T : Sample> Element for TypedBuffer<T> {
    fn header(&self) -> &BufferHeader { &self.header }

    fn header_mut(&mut self) -> &mut BufferHeader { &mut self.header }

    fn data_type(&self) -> DataType { T::DATA_TYPE }

    #[inline]
    fn raw_at(&self, x : usize, y : usize, z : usize) -> f64 {
        debug_assert!(
            x < self.header.extent[0] && y < self.header.extent[1] && z < self.header.extent[2],
            "({}, {}, {}) out of bounds for {:?}", x, y, z, self.header.extent
        );
        self.get(x, y, z).read_as(self.read_mode)
    }

    #[inline]
    fn set_value(&mut self, x : usize, y : usize, z : usize, value : f64) {
        self.data[[z, y, x]] = T::from_f64(value);
    }

    fn clear(&mut self) {
        self.data.fill(T::default());
    }

    /// Storage and extent both drop to zero, so clamped reads return 0
    /// and full-volume scans visit nothing.
    fn release(&mut self) {
        self.data = Array3::<T>::default((0, 0, 0));
        self.header.extent = [0, 0, 0];
        self.released = true;
    }

    fn is_released(&self) -> bool { self.released }

    fn set_min_max(&mut self) {
        if self.data.is_empty() {
            self.header.min = 0.0;
            self.header.max = 0.0;
            return;
        }
        let mode = self.read_mode;
        let (min, max) = parallelize_reduce!(
            self.data,
            1,
            (f64::INFINITY, f64::NEG_INFINITY),
            |_z_start : usize, chunk : &ArrayView3<T>| {
                chunk.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi) : (f64, f64), v : &T| {
                        let v = v.read_as(mode);
                        (lo.min(v), hi.max(v))
                    }
                )
            },
            |a : (f64, f64), b : (f64, f64)| (a.0.min(b.0), a.1.max(b.1))
        );
        self.header.min = min;
        self.header.max = max;
    }

    fn combine(&mut self, op : Arithmetic, other : &dyn Element) -> Result<(), VoxelViewError> {
        if other.extent() != self.header.extent || self.released || other.is_released() {
            return Err(DimensionsError::MismatchedDimensions {
                required : self.header.extent,
                requested : other.extent(),
            }.into());
        }
        let mode = self.read_mode;
        let scale = self.header.calibration.value.scale;
        let offset = self.header.calibration.value.offset;

        parallelize_op!(
            self.data,
            1,
            |z_start : usize, chunk : &mut ArrayViewMut3<T>| {
                for ((dz, y, x), v) in chunk.indexed_iter_mut() {
                    let own = v.read_as(mode) * scale + offset;
                    let theirs = other.calibrated_at(x, y, z_start + dz);
                    *v = T::from_f64(op.apply(own, theirs));
                }
            }
        );
        Ok(())
    }

    fn convert_slice_from_bytes(&mut self, z : usize, bytes : &[u8], layout : SliceLayout)
        -> Result<(), VoxelViewError> {
        let mut slice = self.slice_mut(z)?;
        decode::load_slice_from_bytes(&mut slice, bytes, layout)
    }

    fn convert_slice_from_similar(&mut self, z : usize, bytes : &[u8], step : usize, offset : usize)
        -> Result<(), VoxelViewError> {
        let mut slice = self.slice_mut(z)?;
        decode::load_slice_from_similar(&mut slice, bytes, step, offset)
    }

    fn convert_slice_from_rgb(&mut self, z : usize, rgb : &[u32], step : usize, offset : usize, channel : usize)
        -> Result<(), VoxelViewError> {
        if T::from_channel(0).is_none() {
            return Err(VoxelViewError::InapplicableConversion {
                operation : "extract an RGB channel",
                target : T::DATA_TYPE,
            });
        }
        let mut slice = self.slice_mut(z)?;
        decode::load_slice_from_rgb(&mut slice, rgb, step, offset, channel)
    }

    fn copy_slice_to_similar(&self, z : usize) -> Result<Vec<u8>, VoxelViewError> {
        let slice = self.slice(z)?;
        Ok(decode::slice_to_bytes(&slice))
    }

    fn advance_read_mode(&mut self) {
        self.read_mode = self.read_mode.next();
    }
}
