//! Numeric image types: voxel buffers, their calibration,
//! regions of interest and the colormap engine.

pub mod voxel;
pub mod calibration;
pub mod roi;
pub mod colormap;
