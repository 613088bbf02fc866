mod parallelize_op;

pub (crate) use parallelize_op::parallelize_op as parallelize_op;
pub (crate) use parallelize_op::parallelize_reduce as parallelize_reduce;

use crate::data::voxel::{DataType, DimensionsError};

/// Errors that can occur while decoding, combining or
/// annotating voxel data. Clamped reads, division by zero
/// and a histogram with no source are not errors: they
/// have defined numeric results.
#[derive(Debug, thiserror::Error)]
pub enum VoxelViewError {
    #[error("DimensionsError: {0}")]
    Dimensions(#[from] DimensionsError),

    /// Programming error: the caller asked a buffer
    /// variant to do something it has no meaning for
    /// (e.g. pull an 8-bit RGB channel into a float buffer).
    #[error("Inapplicable conversion: cannot {operation} into a {target} buffer")]
    InapplicableConversion {
        operation : &'static str,
        target : DataType,
    },

    #[error("Lineage slot occupied: {0}")]
    SlotOccupied(String),

    #[error("No marker list at position {0}")]
    NoSuchList(usize),

    #[error("No element {element} at time {time}")]
    NoSuchElement { element : usize, time : usize },

    #[error("Invalid colormap: {0}")]
    InvalidColormap(String),

    #[error("ParseError: {0}")]
    Parse(String),

    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),

    #[error("DecodeError: {0}")]
    Decode(#[from] binrw::Error),

    #[error("ConfigError: {0}")]
    Config(#[from] serde_json::Error),
}
