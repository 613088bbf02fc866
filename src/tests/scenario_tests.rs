use std::sync::Arc;

use voxelview::data::colormap::{models, ColormapRegistry};
use voxelview::data::roi::{ActiveRoi, RectRoi};
use voxelview::data::voxel::{HistogramSources, DIV_BY_ZERO_SENTINEL};
use voxelview::markers::Slot;
use voxelview::{Arithmetic, DataType, Dataset, Element, ElementId, MarkerLists, ViewerConfig};

fn dataset(data_type : DataType, extent : [usize; 3], elements : usize) -> Dataset {
    Dataset::new(extent, data_type, elements, 1, ViewerConfig::default(), Arc::new(ColormapRegistry::new()))
}

fn fill(ds : &mut Dataset, id : ElementId, f : impl Fn(usize, usize, usize) -> f64) {
    let buffer = ds.element_mut(id, 0).unwrap();
    let [sx, sy, sz] = buffer.extent();
    for z in 0..sz {
        for y in 0..sy {
            for x in 0..sx {
                buffer.set_value(x, y, z, f(x, y, z));
            }
        }
    }
    ds.update_min_max(id).unwrap();
}

/// 16-bit data still clamps into the 8-bit range when written.
#[test]
fn short_elements_clamp_on_write() {
    let mut ds = dataset(DataType::Short, [4, 4, 1], 1);
    fill(&mut ds, ElementId(0), |x, _, _| if x == 0 { 1000.0 } else { -5.0 });
    let buffer = ds.element(ElementId(0), 0).unwrap();
    assert_eq!(buffer.raw_at(0, 0, 0), 255.0);
    assert_eq!(buffer.raw_at(1, 0, 0), 0.0);
    assert_eq!(buffer.header().max, 255.0);
    // reads outside the volume clamp onto the border
    assert_eq!(buffer.raw_with_bounds(-3, 0, 0), 255.0);
}

#[test]
fn imported_rows_link_in_both_directions() {
    let mut lists = MarkerLists::new();
    let mut parent = vec![0.0; 22];
    parent[..7].copy_from_slice(&[0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    parent[17..21].copy_from_slice(&[-1.0; 4]);
    let mut child = vec![0.0; 22];
    child[..7].copy_from_slice(&[1.0, 0.0, 2.0, 2.0, 0.0, 0.0, 1.0]);
    child[17..21].copy_from_slice(&[0.0, -1.0, -1.0, -1.0]);

    lists.import_marker_lists(&[parent, child]);

    assert_eq!(lists.num_lists(), 2);
    assert_eq!(lists.parent_index(1, Slot::First), Some(0));
    assert_eq!(lists.child_index(0, Slot::First), Some(1));
    assert_eq!(lists.parent_index(0, Slot::First), None);

    let mut ds = dataset(DataType::Byte, [4, 4, 2], 1);
    *ds.markers_mut() = lists;
    let rows = ds.export_marker_lists();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][17], 0.0);
    assert_eq!(rows[0][19], 1.0);
    assert_eq!(rows[0][20], -1.0);
}

#[test]
fn rect_roi_selects_inclusive_box() {
    let mut ds = dataset(DataType::Float, [10, 10, 3], 1);
    fill(&mut ds, ElementId(0), |x, y, z| (x + y + z) as f64);
    ds.bundle_mut(ElementId(0)).unwrap()
        .set_roi(ActiveRoi::Rect(RectRoi::new([2, 3, 1], [4, 5, 1])));

    let stats = ds.adjust_threshold_to_roi(ElementId(0), 0).unwrap();
    assert_eq!(stats.voxels, 9);
    assert_eq!(stats.min, 6.0);
    assert_eq!(stats.max, 10.0);
    assert_eq!(ds.bundle(ElementId(0)).unwrap().window().min, 6.0);
    // the window maps [min, max) onto the table
    assert_eq!(ds.element(ElementId(0), 0).unwrap().int_scaled(6, 0, 0), 0);
}

#[test]
fn division_by_zero_leaves_sentinel() {
    let mut ds = dataset(DataType::Float, [3, 1, 1], 2);
    fill(&mut ds, ElementId(0), |x, _, _| x as f64);
    fill(&mut ds, ElementId(1), |x, _, _| if x == 2 { 4.0 } else { 0.0 });
    ds.combine(Arithmetic::Div, ElementId(0), ElementId(1)).unwrap();

    let quotient = ds.element(ElementId(0), 0).unwrap();
    assert_eq!(quotient.raw_at(0, 0, 0), 0.0);
    assert_eq!(quotient.raw_at(1, 0, 0), DIV_BY_ZERO_SENTINEL as f32 as f64);
    assert_eq!(quotient.raw_at(2, 0, 0), 0.5);
}

#[test]
fn toggling_inverse_twice_restores_colors() {
    let mut ds = dataset(DataType::Byte, [2, 2, 1], 1);
    let bundle = ds.bundle_mut(ElementId(0)).unwrap();
    bundle.set_model(models::GLOW_GREEN);
    bundle.toggle_log(Some(true));
    let before = bundle.table().to_vec();
    bundle.toggle_inverse(None);
    bundle.toggle_inverse(None);
    assert_eq!(bundle.table(), &before[..]);
}

/// The histogram peak agrees with a direct count over the volume.
#[test]
fn histogram_matches_brute_force_count() {
    let mut ds = dataset(DataType::Byte, [16, 8, 2], 2);
    fill(&mut ds, ElementId(0), |x, _, _| (x % 4) as f64);
    fill(&mut ds, ElementId(1), |_, y, z| (y % 2 + z) as f64);
    let sources = HistogramSources { x : Some(ElementId(0)), y : Some(ElementId(1)), z : None };

    let mut hist = ds.histogram_buffer(&sources, [4, 3, 1], 0).unwrap();
    let peak = ds.compute_histogram(hist.as_element_mut(), &sources, None, 0).unwrap();

    let mut counts = [[0usize; 3]; 4];
    for z in 0..2 {
        for y in 0..8 {
            for x in 0..16 {
                counts[x % 4][(y % 2 + z).min(2)] += 1;
            }
        }
    }
    let brute = counts.iter().flatten().copied().max().unwrap();
    assert_eq!(peak, brute as f64);

    let mut total = 0.0;
    for by in 0..3 {
        for bx in 0..4 {
            total += hist.raw_at(bx, by, 0);
        }
    }
    assert_eq!(total, (16 * 8 * 2) as f64);
    assert_eq!(hist.header().histogram_sources, sources);
}

fn assert_bidirectional(lists : &MarkerLists) {
    for pos in 0..lists.num_lists() {
        for slot in Slot::BOTH {
            if let Some(child) = lists.child_index(pos, slot) {
                assert!(Slot::BOTH.iter().any(|&s| lists.parent_index(child, s) == Some(pos)));
            }
            if let Some(parent) = lists.parent_index(pos, slot) {
                assert!(Slot::BOTH.iter().any(|&s| lists.child_index(parent, s) == Some(pos)));
            }
        }
    }
}

#[test]
fn lineage_edges_stay_bidirectional() {
    let mut lists = MarkerLists::new();
    lists.new_list_linked(0, "a").unwrap();
    lists.new_list_linked(0, "b").unwrap();
    assert!(lists.new_list_linked(0, "c").is_err());
    assert_bidirectional(&lists);

    let a = lists.find_by_name("1a").unwrap();
    lists.set_active_list(a);
    lists.remove_list();
    assert_bidirectional(&lists);

    let root = lists.find_by_name("1").unwrap();
    let b = lists.find_by_name("1b").unwrap();
    let children : Vec<_> = Slot::BOTH.iter().filter_map(|&s| lists.child_index(root, s)).collect();
    assert_eq!(children, vec![b]);
    assert!(lists.common_root(root, b));

    lists.unlink(root, b).unwrap();
    assert_bidirectional(&lists);
    assert!(!lists.common_root(root, b));
}

#[test]
fn configuration_loads_from_disk() {
    let path = std::env::temp_dir().join("voxelview_scenario_config.json");
    std::fs::write(&path, r#"{ "track_direction": 2, "default_model": 10, "repulsion": true }"#).unwrap();
    let config = ViewerConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.track_direction, 2);
    assert!(config.repulsion);
    assert_eq!(config.fwhm, 2.0);

    let ds = Dataset::new([2, 2, 1], DataType::Byte, 1, 1, config, Arc::new(ColormapRegistry::new()));
    assert_eq!(ds.bundle(ElementId(0)).unwrap().model(), models::RAINBOW);
}

#[test]
fn reads_after_cleanup_stay_defined() {
    let mut ds = dataset(DataType::Short, [4, 4, 1], 2);
    fill(&mut ds, ElementId(0), |x, y, _| (x * y) as f64);
    fill(&mut ds, ElementId(1), |x, _, _| x as f64);
    let sources = HistogramSources { x : Some(ElementId(0)), y : Some(ElementId(1)), z : None };
    let mut hist = ds.histogram_buffer(&sources, [4, 4, 1], 0).unwrap();
    ds.cleanup();

    let buffer = ds.element(ElementId(0), 0).unwrap();
    assert_eq!(buffer.raw_with_bounds(1, 1, 0), 0.0);
    assert_eq!(buffer.int_scaled_with_bounds(7, -7, 0), 0);
    assert_eq!(ds.compute_histogram(hist.as_element_mut(), &sources, None, 0).unwrap(), 0.0);
    ds.compute_hist_mask(hist.as_element(), ElementId(1), 0, &RectRoi::new([0, 0, 0], [3, 3, 0])).unwrap();
}
