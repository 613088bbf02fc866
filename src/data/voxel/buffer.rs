use crate::data::voxel::{
    Arithmetic, BufferHeader, Complex, DataType, Element, Extent, Sample, SliceLayout, TypedBuffer,
};
use crate::VoxelViewError;

/// A buffer of any of the seven storage types.
#[derive(Debug, Clone)]
pub enum VoxelBuffer {
    Byte(TypedBuffer<u8>),
    Short(TypedBuffer<u16>),
    Integer(TypedBuffer<i32>),
    Long(TypedBuffer<i64>),
    Float(TypedBuffer<f32>),
    Double(TypedBuffer<f64>),
    Complex(TypedBuffer<Complex>),
}

/// Run `$body` with `$buf` bound to the inner `TypedBuffer`,
/// whatever its sample type.
macro_rules! dispatch {
    ($self : expr, $buf : ident => $body : expr) => {
        match $self {
            VoxelBuffer::Byte($buf) => $body,
            VoxelBuffer::Short($buf) => $body,
            VoxelBuffer::Integer($buf) => $body,
            VoxelBuffer::Long($buf) => $body,
            VoxelBuffer::Float($buf) => $body,
            VoxelBuffer::Double($buf) => $body,
            VoxelBuffer::Complex($buf) => $body,
        }
    };
}

impl VoxelBuffer {
    /// Zero-filled buffer of the given type.
    pub fn new(data_type : DataType, extent : Extent, max_value : f64) -> Self {
        match data_type {
            DataType::Byte => VoxelBuffer::Byte(TypedBuffer::new(extent, max_value)),
            DataType::Short => VoxelBuffer::Short(TypedBuffer::new(extent, max_value)),
            DataType::Integer => VoxelBuffer::Integer(TypedBuffer::new(extent, max_value)),
            DataType::Long => VoxelBuffer::Long(TypedBuffer::new(extent, max_value)),
            DataType::Float => VoxelBuffer::Float(TypedBuffer::new(extent, max_value)),
            DataType::Double => VoxelBuffer::Double(TypedBuffer::new(extent, max_value)),
            DataType::Complex => VoxelBuffer::Complex(TypedBuffer::new(extent, max_value)),
        }
    }

    /// Zero-filled buffer with the type's nominal `max_value`.
    pub fn with_default_max(data_type : DataType, extent : Extent) -> Self {
        let max_value = match data_type {
            DataType::Byte => u8::DEFAULT_MAX,
            DataType::Short => u16::DEFAULT_MAX,
            DataType::Integer => i32::DEFAULT_MAX,
            DataType::Long => i64::DEFAULT_MAX,
            DataType::Float => f32::DEFAULT_MAX,
            DataType::Double => f64::DEFAULT_MAX,
            DataType::Complex => Complex::DEFAULT_MAX,
        };
        VoxelBuffer::new(data_type, extent, max_value)
    }

    /// A zeroed buffer of the same type and extent whose calibration is
    /// coupled to this one: axis edits on either show up in both.
    pub fn coupled_copy(&self) -> Self {
        let mut copy = VoxelBuffer::new(self.data_type(), self.extent(), self.header().max_value);
        {
            let header = copy.header_mut();
            header.calibration.adopt(&self.header().calibration);
            header.display_offset = self.header().display_offset;
        }
        copy
    }

    pub fn as_element(&self) -> &dyn Element {
        dispatch!(self, buf => buf as &dyn Element)
    }

    pub fn as_element_mut(&mut self) -> &mut dyn Element {
        dispatch!(self, buf => buf as &mut dyn Element)
    }
}

impl From<TypedBuffer<u8>> for VoxelBuffer {
    fn from(buffer : TypedBuffer<u8>) -> Self { VoxelBuffer::Byte(buffer) }
}

impl From<TypedBuffer<u16>> for VoxelBuffer {
    fn from(buffer : TypedBuffer<u16>) -> Self { VoxelBuffer::Short(buffer) }
}

impl From<TypedBuffer<i32>> for VoxelBuffer {
    fn from(buffer : TypedBuffer<i32>) -> Self { VoxelBuffer::Integer(buffer) }
}

impl From<TypedBuffer<i64>> for VoxelBuffer {
    fn from(buffer : TypedBuffer<i64>) -> Self { VoxelBuffer::Long(buffer) }
}

impl From<TypedBuffer<f32>> for VoxelBuffer {
    fn from(buffer : TypedBuffer<f32>) -> Self { VoxelBuffer::Float(buffer) }
}

impl From<TypedBuffer<f64>> for VoxelBuffer {
    fn from(buffer : TypedBuffer<f64>) -> Self { VoxelBuffer::Double(buffer) }
}

impl From<TypedBuffer<Complex>> for VoxelBuffer {
    fn from(buffer : TypedBuffer<Complex>) -> Self { VoxelBuffer::Complex(buffer) }
}

impl Element for VoxelBuffer {
    fn header(&self) -> &BufferHeader { dispatch!(self, buf => buf.header()) }

    fn header_mut(&mut self) -> &mut BufferHeader { dispatch!(self, buf => buf.header_mut()) }

    fn data_type(&self) -> DataType { dispatch!(self, buf => buf.data_type()) }

    #[inline]
    fn raw_at(&self, x : usize, y : usize, z : usize) -> f64 {
        dispatch!(self, buf => buf.raw_at(x, y, z))
    }

    #[inline]
    fn set_value(&mut self, x : usize, y : usize, z : usize, value : f64) {
        dispatch!(self, buf => buf.set_value(x, y, z, value))
    }

    fn clear(&mut self) { dispatch!(self, buf => buf.clear()) }

    fn release(&mut self) { dispatch!(self, buf => buf.release()) }

    fn is_released(&self) -> bool { dispatch!(self, buf => buf.is_released()) }

    fn set_min_max(&mut self) { dispatch!(self, buf => buf.set_min_max()) }

    fn combine(&mut self, op : Arithmetic, other : &dyn Element) -> Result<(), VoxelViewError> {
        dispatch!(self, buf => buf.combine(op, other))
    }

    fn convert_slice_from_bytes(&mut self, z : usize, bytes : &[u8], layout : SliceLayout)
        -> Result<(), VoxelViewError> {
        dispatch!(self, buf => buf.convert_slice_from_bytes(z, bytes, layout))
    }

    fn convert_slice_from_similar(&mut self, z : usize, bytes : &[u8], step : usize, offset : usize)
        -> Result<(), VoxelViewError> {
        dispatch!(self, buf => buf.convert_slice_from_similar(z, bytes, step, offset))
    }

    fn convert_slice_from_rgb(&mut self, z : usize, rgb : &[u32], step : usize, offset : usize, channel : usize)
        -> Result<(), VoxelViewError> {
        dispatch!(self, buf => buf.convert_slice_from_rgb(z, rgb, step, offset, channel))
    }

    fn copy_slice_to_similar(&self, z : usize) -> Result<Vec<u8>, VoxelViewError> {
        dispatch!(self, buf => buf.copy_slice_to_similar(z))
    }

    fn advance_read_mode(&mut self) { dispatch!(self, buf => buf.advance_read_mode()) }
}
