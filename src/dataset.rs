//! `Dataset`
//!
//! The owner of everything a viewer shows: `elements x time points`
//! voxel buffers of one extent, one colormap `Bundle` per element, the
//! marker lists and the configuration. Views never own any of these;
//! they refer to an element by its `ElementId` and borrow through the
//! dataset, so there is exactly one authoritative `Bundle` per element.

use std::sync::Arc;

use crate::config::ViewerConfig;
use crate::data::colormap::models::BUILTIN_MODELS;
use crate::data::colormap::{Bundle, ColormapRegistry, TABLE_SIZE};
use crate::data::roi::Roi;
use crate::data::voxel::fitting::{int_max_scale, SpotFitting};
use crate::data::voxel::histogram::{self, SourceBuffers};
use crate::data::voxel::{
    Arithmetic, DataType, Element, ElementId, Extent, HistogramSources, RoiStats, SliceLayout, VoxelBuffer,
};
use crate::markers::{APoint, CalibrationSource, MarkerLists};
use crate::VoxelViewError;

pub struct Dataset {
    extent : Extent,
    /// `elements[e][t]`
    elements : Vec<Vec<VoxelBuffer>>,
    bundles : Vec<Bundle>,
    markers : MarkerLists,
    config : ViewerConfig,
    registry : Arc<ColormapRegistry>,
}

impl Dataset {
    /// `num_elements` zeroed elements of `data_type`, each with
    /// `num_times` time points. The time points of one element share
    /// their axis calibration.
    pub fn new(
        extent : Extent,
        data_type : DataType,
        num_elements : usize,
        num_times : usize,
        config : ViewerConfig,
        registry : Arc<ColormapRegistry>,
    ) -> Self {
        let mut dataset = Dataset {
            extent,
            elements : Vec::with_capacity(num_elements),
            bundles : Vec::with_capacity(num_elements),
            markers : MarkerLists::new(),
            config,
            registry,
        };
        for _ in 0..num_elements {
            dataset.push_element(data_type, num_times.max(1));
        }
        log::debug!(
            "New dataset {:?} with {} elements of {} time points",
            extent, num_elements, num_times
        );
        dataset
    }

    fn new_bundle(&self) -> Bundle {
        let mut bundle = Bundle::new(Arc::clone(&self.registry), self.extent, self.config.random_seed);
        bundle.set_model(self.config.default_model);
        bundle.set_gamma(self.config.default_gamma);
        bundle.toggle_over_under(Some(self.config.show_over_under));
        bundle
    }

    fn push_element(&mut self, data_type : DataType, num_times : usize) -> ElementId {
        let first = VoxelBuffer::with_default_max(data_type, self.extent);
        let mut times = Vec::with_capacity(num_times);
        for _ in 1..num_times {
            times.push(first.coupled_copy());
        }
        times.insert(0, first);
        let bundle = self.new_bundle();
        self.elements.push(times);
        self.bundles.push(bundle);
        ElementId(self.elements.len() - 1)
    }

    pub fn extent(&self) -> Extent { self.extent }

    pub fn num_elements(&self) -> usize { self.elements.len() }

    pub fn num_times(&self) -> usize { self.elements.first().map_or(0, Vec::len) }

    pub fn config(&self) -> &ViewerConfig { &self.config }

    pub fn config_mut(&mut self) -> &mut ViewerConfig { &mut self.config }

    pub fn markers(&self) -> &MarkerLists { &self.markers }

    pub fn markers_mut(&mut self) -> &mut MarkerLists { &mut self.markers }

    pub fn registry(&self) -> &Arc<ColormapRegistry> { &self.registry }

    pub fn element(&self, id : ElementId, time : usize) -> Result<&VoxelBuffer, VoxelViewError> {
        self.elements.get(id.0)
            .and_then(|times| times.get(time))
            .ok_or(VoxelViewError::NoSuchElement { element : id.0, time })
    }

    pub fn element_mut(&mut self, id : ElementId, time : usize) -> Result<&mut VoxelBuffer, VoxelViewError> {
        self.elements.get_mut(id.0)
            .and_then(|times| times.get_mut(time))
            .ok_or(VoxelViewError::NoSuchElement { element : id.0, time })
    }

    fn times(&self, id : ElementId) -> Result<&Vec<VoxelBuffer>, VoxelViewError> {
        self.elements.get(id.0).ok_or(VoxelViewError::NoSuchElement { element : id.0, time : 0 })
    }

    pub fn bundle(&self, id : ElementId) -> Result<&Bundle, VoxelViewError> {
        self.bundles.get(id.0).ok_or(VoxelViewError::NoSuchElement { element : id.0, time : 0 })
    }

    pub fn bundle_mut(&mut self, id : ElementId) -> Result<&mut Bundle, VoxelViewError> {
        self.bundles.get_mut(id.0).ok_or(VoxelViewError::NoSuchElement { element : id.0, time : 0 })
    }

    /// Decodes one Z slice of host data into an element.
    pub fn load_slice(
        &mut self,
        id : ElementId,
        time : usize,
        z : usize,
        bytes : &[u8],
        layout : SliceLayout,
    ) -> Result<(), VoxelViewError> {
        self.element_mut(id, time)?.convert_slice_from_bytes(z, bytes, layout)
    }

    /// Rescans the raw min/max of every time point of an element.
    pub fn update_min_max(&mut self, id : ElementId) -> Result<(), VoxelViewError> {
        let times = self.elements.get_mut(id.0)
            .ok_or(VoxelViewError::NoSuchElement { element : id.0, time : 0 })?;
        times.iter_mut().for_each(|buffer| buffer.set_min_max());
        Ok(())
    }

    /// Appends a zeroed element with its own bundle.
    pub fn add_element(&mut self, data_type : DataType) -> ElementId {
        let id = self.push_element(data_type, self.num_times().max(1));
        log::info!("Added {} element {}", data_type, id.0);
        id
    }

    /// Copies an element with its data, its bundle settings and its axis
    /// calibration, which stays coupled to the original.
    pub fn clone_element(&mut self, id : ElementId) -> Result<ElementId, VoxelViewError> {
        let source = self.times(id)?;
        let mut times = Vec::with_capacity(source.len());
        for buffer in source {
            let mut copy = buffer.coupled_copy();
            for z in 0..self.extent[2] {
                let bytes = buffer.copy_slice_to_similar(z)?;
                copy.convert_slice_from_similar(z, &bytes, 1, 0)?;
            }
            let header = buffer.header();
            copy.header_mut().histogram_sources = header.histogram_sources;
            copy.set_min_max();
            let (shift, _, scale_i) = header.scale_shift();
            copy.set_scale_shift(shift, shift + TABLE_SIZE as f64 / scale_i);
            times.push(copy);
        }
        let bundle = self.bundle(id)?.clone();
        self.elements.push(times);
        self.bundles.push(bundle);
        log::info!("Cloned element {} into {}", id.0, self.elements.len() - 1);
        Ok(ElementId(self.elements.len() - 1))
    }

    /// Removes an element. The last remaining element is kept (returns
    /// false). Histogram source references are renumbered.
    pub fn delete_element(&mut self, id : ElementId) -> Result<bool, VoxelViewError> {
        self.times(id)?;
        if self.elements.len() <= 1 {
            log::warn!("Refusing to delete the only element");
            return Ok(false);
        }
        self.elements.remove(id.0);
        self.bundles.remove(id.0);

        let renumber = |source : &mut Option<ElementId>| {
            *source = match *source {
                Some(s) if s == id => None,
                Some(s) if s.0 > id.0 => Some(ElementId(s.0 - 1)),
                other => other,
            };
        };
        for buffer in self.elements.iter_mut().flatten() {
            let sources = &mut buffer.header_mut().histogram_sources;
            renumber(&mut sources.x);
            renumber(&mut sources.y);
            renumber(&mut sources.z);
        }
        log::info!("Deleted element {}", id.0);
        Ok(true)
    }

    /// Releases the storage of every buffer.
    pub fn cleanup(&mut self) {
        self.elements.iter_mut().flatten().for_each(|buffer| buffer.release());
        log::debug!("Released all voxel storage");
    }

    /// Registers a user colormap and returns its model number.
    pub fn add_lookup_table(&self, red : &[u8], green : &[u8], blue : &[u8]) -> Result<usize, VoxelViewError> {
        Ok(BUILTIN_MODELS + self.registry.register(red, green, blue)?)
    }

    /// Sets the contrast window of an element on its bundle and on every
    /// time point.
    pub fn set_threshold(&mut self, id : ElementId, min : f64, max : f64) -> Result<(), VoxelViewError> {
        self.bundle_mut(id)?.set_window(min, max);
        let times = self.elements.get_mut(id.0)
            .ok_or(VoxelViewError::NoSuchElement { element : id.0, time : 0 })?;
        times.iter_mut().for_each(|buffer| buffer.set_scale_shift(min, max));
        Ok(())
    }

    /// Resets the table clip and fits the contrast window to the raw
    /// range of the element inside its ROI at `time`.
    pub fn adjust_threshold_to_roi(&mut self, id : ElementId, time : usize) -> Result<RoiStats, VoxelViewError> {
        let bundle = self.bundle(id)?;
        let stats = self.element(id, time)?.roi_statistics(bundle.roi().as_roi());
        if stats.voxels == 0 {
            log::warn!("ROI of element {} selects no voxels, threshold unchanged", id.0);
            return Ok(stats);
        }
        self.bundle_mut(id)?.reset_clip();
        self.set_threshold(id, stats.min, stats.max)?;
        Ok(stats)
    }

    /// `target = target op partner` voxel by voxel, for every time point.
    pub fn combine(&mut self, op : Arithmetic, target : ElementId, partner : ElementId) -> Result<(), VoxelViewError> {
        self.times(target)?;
        self.times(partner)?;
        if target == partner {
            let copies = self.elements[partner.0].clone();
            for (buffer, other) in self.elements[target.0].iter_mut().zip(&copies) {
                buffer.combine(op, other.as_element())?;
                buffer.set_min_max();
            }
        } else {
            let (target_times, partner_times) = if target.0 < partner.0 {
                let (low, high) = self.elements.split_at_mut(partner.0);
                (&mut low[target.0], &high[0])
            } else {
                let (low, high) = self.elements.split_at_mut(target.0);
                (&mut high[0], &low[partner.0])
            };
            for (buffer, other) in target_times.iter_mut().zip(partner_times.iter()) {
                buffer.combine(op, other.as_element())?;
                buffer.set_min_max();
            }
        }
        log::debug!("Combined element {} {:?} element {}", target.0, op, partner.0);
        Ok(())
    }

    fn resolve<'a>(&'a self, sources : &HistogramSources, time : usize) -> Result<SourceBuffers<'a>, VoxelViewError> {
        let pick = |id : Option<ElementId>| -> Result<Option<&'a dyn Element>, VoxelViewError> {
            id.map(|id| self.element(id, time).map(VoxelBuffer::as_element)).transpose()
        };
        Ok(SourceBuffers { x : pick(sources.x)?, y : pick(sources.y)?, z : pick(sources.z)? })
    }

    /// A zeroed histogram buffer with `bins` bins per axis whose axes map
    /// each source's current calibrated value range onto the bins.
    /// Sources should have had their min/max updated.
    pub fn histogram_buffer(
        &self,
        sources : &HistogramSources,
        bins : [usize; 3],
        time : usize,
    ) -> Result<VoxelBuffer, VoxelViewError> {
        let resolved = self.resolve(sources, time)?;
        let extent = [
            bins[0].max(1),
            if resolved.y.is_some() { bins[1].max(1) } else { 1 },
            if resolved.z.is_some() { bins[2].max(1) } else { 1 },
        ];
        let mut hist = VoxelBuffer::with_default_max(DataType::Float, extent);
        let mut scales = [1.0; 5];
        let mut offsets = [0.0; 5];
        for (axis, source) in [resolved.x, resolved.y, resolved.z].iter().enumerate() {
            if let Some(source) = source {
                let header = source.header();
                let low = header.calibration.calibrate(header.min);
                let high = header.calibration.calibrate(header.max);
                let span = if high > low { high - low } else { 1.0 };
                scales[axis] = span / extent[axis] as f64;
                offsets[axis] = low;
            }
        }
        let header = hist.header_mut();
        header.calibration.set_axis_scales(scales, offsets);
        header.histogram_sources = *sources;
        Ok(hist)
    }

    /// Fills `hist` from the given sources at `time`, counting only voxels
    /// inside the X source's ROI and, with a `gate`, where the gate is
    /// positive. Returns the peak count.
    pub fn compute_histogram(
        &self,
        hist : &mut dyn Element,
        sources : &HistogramSources,
        gate : Option<ElementId>,
        time : usize,
    ) -> Result<f64, VoxelViewError> {
        let resolved = self.resolve(sources, time)?;
        let gate = gate.map(|g| self.element(g, time).map(VoxelBuffer::as_element)).transpose()?;
        let roi : &dyn Roi = match sources.x {
            Some(x) => self.bundle(x)?.roi().as_roi(),
            None => &crate::data::roi::FullRoi,
        };
        hist.header_mut().histogram_sources = *sources;
        Ok(histogram::compute_histogram(hist, &resolved, gate, roi))
    }

    /// Writes into element `mask` which voxels fall into the histogram
    /// region `hist_roi`. `mask` may be one of the histogram's own
    /// sources: the sources are then read from a copy taken before
    /// the mask is written.
    pub fn compute_hist_mask(
        &mut self,
        hist : &dyn Element,
        mask : ElementId,
        time : usize,
        hist_roi : &dyn Roi,
    ) -> Result<(), VoxelViewError> {
        let sources = hist.header().histogram_sources;
        let aliased = [sources.x, sources.y, sources.z].contains(&Some(mask));
        let mut target = if aliased {
            self.element(mask, time)?.clone()
        } else {
            let placeholder = VoxelBuffer::new(DataType::Byte, [0, 0, 0], 0.0);
            std::mem::replace(self.element_mut(mask, time)?, placeholder)
        };
        let result = self.resolve(&sources, time)
            .and_then(|resolved| histogram::compute_hist_mask(hist, &resolved, target.as_element_mut(), hist_roi));
        if let Ok(slot) = self.element_mut(mask, time) {
            *slot = target;
        }
        result
    }

    /// Places a marker in the active list at `coord`, climbing to the
    /// closest maximum and moving to the centre of intensity as the
    /// configuration asks, and measures it.
    pub fn set_marker(&mut self, coord : [f64; 5]) -> Result<APoint, VoxelViewError> {
        let mut point = APoint::from_coords(coord);
        let (elem, time) = (point.element(), point.time());
        let config = &self.config;
        let buffer = self.element(ElementId(elem), time)?;

        if config.marker_to_max {
            let scale = int_max_scale(config.coi_box, config.fwhm);
            let penalty = |p : &APoint| {
                if config.repulsion {
                    self.markers.penalty(p, config.track_direction, config.fwhm, scale)
                } else {
                    0.0
                }
            };
            point = buffer.iterative_closest_max(&point, config.search_box, penalty, config.track_mode);
        }
        buffer.clipped_coi(&mut point, config.coi_box, None, config.track_mode, config.use_coi);
        if config.repulsion {
            self.markers.penalize(&mut point, config.track_direction, config.fwhm);
        }
        log::debug!("Marker placed at {:?} (integral {})", point.coord, point.integral);
        self.markers.add_point(point.clone());
        Ok(point)
    }

    /// Subtracts a Gaussian spot at the active marker from the element it
    /// sits in. Returns the fitted intensity, `None` without a marker.
    pub fn subtract_tracked_spot(&mut self) -> Result<Option<f64>, VoxelViewError> {
        let Some(point) = self.markers.active_point().cloned() else { return Ok(None); };
        let (coi_box, fwhm) = (self.config.coi_box, self.config.fwhm);
        let buffer = self.element_mut(ElementId(point.element()), point.time())?;
        let position = [point.coord[0], point.coord[1], point.coord[2]];
        let intensity = buffer.subtract_gaussian(position, point.integral_above_min, coi_box, fwhm);
        buffer.set_min_max();
        Ok(Some(intensity))
    }

    /// Repulsion of other tracks at `point`; 0 with repulsion off.
    pub fn penalty(&self, point : &APoint) -> f64 {
        let config = &self.config;
        if !config.repulsion {
            return 0.0;
        }
        let scale = int_max_scale(config.coi_box, config.fwhm);
        self.markers.penalty(point, config.track_direction, config.fwhm, scale)
    }

    pub fn msd(&self, list : usize) -> Vec<f64> { self.markers.msd(list, self) }

    pub fn all_msd(&self) -> Vec<f64> { self.markers.all_msd(self) }

    pub fn export_markers(&self, list : usize) -> Vec<Vec<f64>> { self.markers.export_markers(list, self) }

    pub fn export_marker_lists(&self) -> Vec<Vec<f64>> { self.markers.export_marker_lists(self) }

    pub fn import_marker_lists(&mut self, rows : &[Vec<f64>]) { self.markers.import_marker_lists(rows) }

    pub fn print_markers(&self) -> String { self.markers.print_list(self) }

    pub fn print_summary(&self) -> String { self.markers.print_summary(self) }
}

impl Dataset {
    /// Buffer whose calibration stands for element `e`; unknown elements
    /// fall back to the first one.
    fn calibration_buffer(&self, element : usize) -> Option<&VoxelBuffer> {
        self.elements.get(element)
            .or_else(|| self.elements.first())
            .and_then(|times| times.first())
    }
}

impl CalibrationSource for Dataset {
    fn axis_scale(&self, element : usize, axis : usize) -> f64 {
        self.calibration_buffer(element).map_or(1.0, |b| b.header().calibration.axis_scale(axis))
    }

    fn axis_offset(&self, element : usize, axis : usize) -> f64 {
        self.calibration_buffer(element).map_or(0.0, |b| b.header().calibration.axis_offset(axis))
    }

    fn value_scale(&self, element : usize) -> f64 {
        self.calibration_buffer(element).map_or(1.0, |b| b.header().calibration.value.scale)
    }

    fn value_offset(&self, element : usize) -> f64 {
        self.calibration_buffer(element).map_or(0.0, |b| b.header().calibration.value.offset)
    }

    fn axis_name(&self, axis : usize) -> String {
        self.calibration_buffer(0).map(|b| b.header().calibration.axes().names[axis].clone()).unwrap_or_default()
    }

    fn axis_unit(&self, axis : usize) -> String {
        self.calibration_buffer(0).map(|b| b.header().calibration.axes().units[axis].clone()).unwrap_or_default()
    }

    fn value_name(&self, element : usize) -> String {
        self.calibration_buffer(element).map(|b| b.header().calibration.value.name.clone()).unwrap_or_default()
    }

    fn value_unit(&self, element : usize) -> String {
        self.calibration_buffer(element).map(|b| b.header().calibration.value.unit.clone()).unwrap_or_default()
    }

    fn sizes(&self) -> [usize; 5] {
        [self.extent[0], self.extent[1], self.extent[2], self.num_elements(), self.num_times()]
    }

    fn track_direction(&self) -> usize { self.config.track_direction }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::roi::{ActiveRoi, RectRoi};

    fn dataset(elements : usize, times : usize) -> Dataset {
        Dataset::new(
            [8, 8, 2],
            DataType::Float,
            elements,
            times,
            ViewerConfig::default(),
            Arc::new(ColormapRegistry::new()),
        )
    }

    fn fill(ds : &mut Dataset, id : ElementId, time : usize, f : impl Fn(usize, usize, usize) -> f64) {
        let buffer = ds.element_mut(id, time).unwrap();
        let [sx, sy, sz] = buffer.extent();
        for z in 0..sz {
            for y in 0..sy {
                for x in 0..sx {
                    buffer.set_value(x, y, z, f(x, y, z));
                }
            }
        }
        buffer.set_min_max();
    }

    #[test]
    fn elements_and_times() {
        let mut ds = dataset(2, 3);
        assert_eq!(ds.num_elements(), 2);
        assert_eq!(ds.num_times(), 3);
        assert!(ds.element(ElementId(2), 0).is_err());
        assert!(matches!(
            ds.element(ElementId(0), 3),
            Err(VoxelViewError::NoSuchElement { element : 0, time : 3 })
        ));
        // time points of one element share their axes
        let t0 = ds.element(ElementId(0), 0).unwrap().header().calibration.clone();
        assert!(t0.is_coupled_with(&ds.element(ElementId(0), 2).unwrap().header().calibration));
        assert!(!t0.is_coupled_with(&ds.element(ElementId(1), 0).unwrap().header().calibration));

        let added = ds.add_element(DataType::Short);
        assert_eq!(added, ElementId(2));
        assert_eq!(ds.element(added, 2).unwrap().data_type(), DataType::Short);
        assert_eq!(ds.sizes(), [8, 8, 2, 3, 3]);
    }

    #[test]
    fn clone_copies_data_and_couples_axes() {
        let mut ds = dataset(1, 1);
        fill(&mut ds, ElementId(0), 0, |x, y, z| (x + 10 * y + 100 * z) as f64);
        let copy = ds.clone_element(ElementId(0)).unwrap();
        let (a, b) = (ds.element(ElementId(0), 0).unwrap(), ds.element(copy, 0).unwrap());
        assert_eq!(b.raw_at(3, 4, 1), 143.0);
        assert_eq!(b.header().max, a.header().max);
        b.header().calibration.set_axis_scales([2.0; 5], [0.0; 5]);
        assert_eq!(a.header().calibration.axis_scale(0), 2.0);
    }

    #[test]
    fn delete_renumbers_histogram_sources() {
        let mut ds = dataset(3, 1);
        ds.element_mut(ElementId(2), 0).unwrap().header_mut().histogram_sources =
            HistogramSources { x : Some(ElementId(0)), y : Some(ElementId(1)), z : Some(ElementId(2)) };
        assert!(ds.delete_element(ElementId(0)).unwrap());
        let sources = ds.element(ElementId(1), 0).unwrap().header().histogram_sources;
        assert_eq!(sources, HistogramSources { x : None, y : Some(ElementId(0)), z : Some(ElementId(1)) });
        assert!(ds.delete_element(ElementId(0)).unwrap());
        assert!(!ds.delete_element(ElementId(0)).unwrap());
        assert!(ds.delete_element(ElementId(4)).is_err());
    }

    #[test]
    fn combine_between_and_within_elements() {
        let mut ds = dataset(2, 2);
        fill(&mut ds, ElementId(0), 1, |x, _, _| x as f64);
        fill(&mut ds, ElementId(1), 1, |_, _, _| 2.0);
        ds.combine(Arithmetic::Mul, ElementId(0), ElementId(1)).unwrap();
        assert_eq!(ds.element(ElementId(0), 1).unwrap().raw_at(3, 0, 0), 6.0);
        ds.combine(Arithmetic::Add, ElementId(1), ElementId(1)).unwrap();
        assert_eq!(ds.element(ElementId(1), 1).unwrap().raw_at(0, 0, 0), 4.0);
        ds.combine(Arithmetic::Div, ElementId(1), ElementId(0)).unwrap();
        let sentinel = crate::data::voxel::DIV_BY_ZERO_SENTINEL as f32 as f64;
        assert_eq!(ds.element(ElementId(1), 1).unwrap().raw_at(0, 0, 0), sentinel);
        assert_eq!(ds.element(ElementId(1), 1).unwrap().raw_at(2, 0, 0), 1.0);
    }

    #[test]
    fn threshold_follows_roi() {
        let mut ds = dataset(1, 1);
        fill(&mut ds, ElementId(0), 0, |x, y, _| (x * y) as f64);
        ds.bundle_mut(ElementId(0)).unwrap().set_roi(ActiveRoi::Rect(RectRoi::new([1, 1, 0], [2, 3, 1])));
        let stats = ds.adjust_threshold_to_roi(ElementId(0), 0).unwrap();
        assert_eq!((stats.min, stats.max), (1.0, 6.0));
        let window = ds.bundle(ElementId(0)).unwrap().window();
        assert_eq!((window.min, window.max), (1.0, 6.0));
        assert_eq!(ds.element(ElementId(0), 0).unwrap().header().scale_shift().0, 1.0);
    }

    #[test]
    fn user_tables_get_model_numbers() {
        let ds = dataset(1, 1);
        assert_eq!(ds.add_lookup_table(&[0, 255], &[0, 255], &[0, 0]).unwrap(), BUILTIN_MODELS);
        assert!(ds.add_lookup_table(&[0], &[], &[0]).is_err());
    }

    #[test]
    fn histogram_of_two_elements_and_its_mask() {
        let mut ds = dataset(3, 1);
        fill(&mut ds, ElementId(0), 0, |x, _, _| x as f64);
        fill(&mut ds, ElementId(1), 0, |_, y, _| y as f64);
        let sources = HistogramSources { x : Some(ElementId(0)), y : Some(ElementId(1)), z : None };
        let mut hist = ds.histogram_buffer(&sources, [7, 7, 1], 0).unwrap();
        assert_eq!(hist.extent(), [7, 7, 1]);
        let peak = ds.compute_histogram(hist.as_element_mut(), &sources, None, 0).unwrap();
        // values 6 and 7 share the top bin on both axes, in both slices
        assert_eq!(peak, 8.0);
        assert_eq!(hist.raw_at(2, 3, 0), 2.0);

        let selection = RectRoi::new([0, 0, 0], [0, 6, 0]);
        ds.compute_hist_mask(hist.as_element(), ElementId(2), 0, &selection).unwrap();
        let mask = ds.element(ElementId(2), 0).unwrap();
        assert_eq!(mask.raw_at(0, 5, 1), 1.0);
        assert_eq!(mask.raw_at(4, 5, 1), 0.0);
    }

    #[test]
    fn mask_may_overwrite_a_histogram_source() {
        let mut ds = dataset(2, 1);
        fill(&mut ds, ElementId(0), 0, |x, _, _| x as f64);
        fill(&mut ds, ElementId(1), 0, |_, y, _| y as f64);
        let sources = HistogramSources { x : Some(ElementId(0)), y : Some(ElementId(1)), z : None };
        let mut hist = ds.histogram_buffer(&sources, [7, 7, 1], 0).unwrap();
        ds.compute_histogram(hist.as_element_mut(), &sources, None, 0).unwrap();

        // x in bin 0, y in bins 0..=2
        let selection = RectRoi::new([0, 0, 0], [0, 2, 0]);
        ds.compute_hist_mask(hist.as_element(), ElementId(1), 0, &selection).unwrap();
        let mask = ds.element(ElementId(1), 0).unwrap();
        assert_eq!(mask.raw_at(0, 1, 0), 1.0);
        assert_eq!(mask.raw_at(0, 5, 0), 0.0);
        assert_eq!(mask.raw_at(3, 1, 1), 0.0);
        assert_eq!(mask.extent(), [8, 8, 2]);
    }

    #[test]
    fn released_elements_read_as_empty() {
        let mut ds = dataset(2, 2);
        fill(&mut ds, ElementId(0), 0, |x, _, _| x as f64 + 1.0);
        let sources = HistogramSources { x : Some(ElementId(0)), y : Some(ElementId(1)), z : None };
        let mut hist = ds.histogram_buffer(&sources, [4, 4, 1], 0).unwrap();
        ds.cleanup();

        let buffer = ds.element(ElementId(0), 0).unwrap();
        assert!(buffer.is_released());
        assert_eq!(buffer.extent(), [0, 0, 0]);
        assert_eq!(buffer.raw_with_bounds(1, 1, 0), 0.0);
        assert_eq!(buffer.calibrated_with_bounds(-1, 20, 3), 0.0);
        assert_eq!(ds.compute_histogram(hist.as_element_mut(), &sources, None, 0).unwrap(), 0.0);
        assert_eq!(ds.adjust_threshold_to_roi(ElementId(0), 1).unwrap().voxels, 0);
    }

    #[test]
    fn markers_snap_to_maxima() {
        let mut ds = dataset(1, 1);
        ds.config_mut().marker_to_max = true;
        ds.config_mut().search_box = [2, 2, 0];
        ds.config_mut().coi_box = [1, 1, 0];
        fill(&mut ds, ElementId(0), 0, |x, y, z| if (x, y, z) == (5, 4, 0) { 10.0 } else { 1.0 });

        let p = ds.set_marker([3.0, 3.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(&p.coord[..3], &[5.0, 4.0, 0.0]);
        assert_eq!(p.max, 10.0);
        assert_eq!(p.integral, 18.0);
        assert_eq!(ds.markers().num_markers(0), 1);
        assert_eq!(p.integral_above_min, 9.0);
        assert_eq!(ds.penalty(&p), 0.0);
        let intensity = ds.subtract_tracked_spot().unwrap().unwrap();
        assert!(intensity > 0.0);
        assert!(ds.element(ElementId(0), 0).unwrap().raw_at(5, 4, 0) < 10.0);
    }

    #[test]
    fn markers_export_with_dataset_calibration() {
        let mut ds = dataset(1, 1);
        ds.element(ElementId(0), 0).unwrap().header().calibration
            .set_axis_scales([0.5, 0.5, 2.0, 1.0, 1.0], [0.0; 5]);
        ds.markers_mut().add_point(APoint::new(4.0, 2.0, 1.0, 0.0, 0.0));
        let rows = ds.export_marker_lists();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][9..12], &[2.0, 1.0, 2.0]);
        assert!(ds.print_markers().contains("X [pixels]"));

        let mut other = dataset(1, 1);
        other.import_marker_lists(&rows);
        assert_eq!(other.markers().total_markers(), 1);
        ds.cleanup();
        assert!(ds.element(ElementId(0), 0).unwrap().is_released());
    }
}
