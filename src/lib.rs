//! Core of a multi-dimensional microscopy viewer: typed voxel
//! buffers with value calibration, colormap tables, ROIs and joint
//! histograms, and marker tracks linked into a lineage graph.
//!
//! Most users start from a [`Dataset`], which owns the buffers of every
//! element and time point together with their colormap [`Bundle`]s and
//! the [`MarkerLists`].
//!
//! [`Bundle`]: data::colormap::Bundle

use std::path::Path;

pub mod config;
pub mod data;
pub mod dataset;
pub mod markers;
mod utils;

pub use utils::VoxelViewError;
pub use config::{TrackMode, ViewerConfig};
pub use data::voxel::{Arithmetic, DataType, Element, ElementId, VoxelBuffer};
pub use dataset::Dataset;
pub use markers::{APoint, MarkerLists};

use markers::PixelCalibration;

/// `open_markers(filename)` reads a marker text file, as written
/// by `MarkerLists::print_list`, into a fresh set of lists.
///
/// ## Arguments
///
/// * `filename` - Path of the text file
///
/// ## Example
///
/// ```no_run
/// let lists = voxelview::open_markers("tracks.txt").unwrap();
/// println!("{} tracks", lists.num_lists());
/// ```
pub fn open_markers<P : AsRef<Path>>(filename : P) -> Result<MarkerLists, VoxelViewError> {
    let mut lists = MarkerLists::new();
    let rows = lists.read_file(filename)?;
    log::debug!("Opened {} markers in {} lists", rows, lists.num_lists());
    Ok(lists)
}

/// `marker_summary(filename, track_direction)` reads a marker
/// text file and returns its per-track statistics and MSD tables
/// in pixel units.
///
/// ## Arguments
///
/// * `filename` - Path of the text file
/// * `track_direction` - Axis the tracks advance along
/// (0..=4 for x, y, z, element, time)
///
/// ## Example
///
/// ```no_run
/// // tracks over time
/// let text = voxelview::marker_summary("tracks.txt", 4).unwrap();
/// print!("{}", text);
/// ```
pub fn marker_summary<P : AsRef<Path>>(filename : P, track_direction : usize) -> Result<String, VoxelViewError> {
    let lists = open_markers(filename)?;
    let calibration = PixelCalibration::covering(&lists, track_direction.min(4));
    Ok(lists.print_summary(&calibration))
}
