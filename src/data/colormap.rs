//! `Colormap`
//!
//! A `Bundle` holds everything that decides how one element is
//! displayed: the contrast windows, the active ROI, and a 32768-entry
//! RGB lookup table built from one of the tone-curve models.
//!
//! The table is regenerated eagerly whenever a setting that affects it
//! changes, so `table()` and `get_color` are always current.

pub mod models;
pub mod registry;

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use crate::data::roi::{ActiveRoi, RectRoi, Roi};

pub use models::BUILTIN_MODELS;
pub use registry::{ColormapRegistry, UserTable};

/// Entries of every colormap table.
pub const TABLE_SIZE : usize = 32768;

/// Gain of the log compression `ln(G t + 1) / ln(G + 1)`.
const LOG_GAIN : f64 = TABLE_SIZE as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rgb {
    pub r : u8,
    pub g : u8,
    pub b : u8,
}

impl Rgb {
    pub const BLACK : Rgb = Rgb { r : 0, g : 0, b : 0 };
    /// Marks entries at or below the low clip.
    pub const UNDERFLOW : Rgb = Rgb { r : 0, g : 255, b : 0 };
    /// Marks entries at or above the high clip.
    pub const OVERFLOW : Rgb = Rgb { r : 0, g : 0, b : 255 };

    pub const fn new(r : u8, g : u8, b : u8) -> Self { Rgb { r, g, b } }

    pub fn inverted(&self) -> Rgb {
        Rgb { r : 255 - self.r, g : 255 - self.g, b : 255 - self.b }
    }

    /// `0x00RRGGBB`
    pub fn packed(&self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }
}

/// Data values the table's first and last entries point to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContrastWindow {
    pub min : f64,
    pub max : f64,
}

impl Default for ContrastWindow {
    fn default() -> Self { ContrastWindow { min : 0.0, max : 1.0 } }
}

/// Apply a tri-state toggle: `None` flips, `Some(v)` sets.
#[inline]
fn apply_toggle(flag : &mut bool, value : Option<bool>) -> bool {
    *flag = value.unwrap_or(!*flag);
    *flag
}

/// Display state of one element.
#[derive(Debug, Clone)]
pub struct Bundle {
    model : usize,
    low_clip : usize,
    high_clip : usize,
    show_over_under : bool,
    log_scale : bool,
    inverse : bool,
    gamma : f64,
    overlay : bool,
    multiplicative : bool,
    window : ContrastWindow,
    mip_window : ContrastWindow,
    avg_window : ContrastWindow,
    roi : ActiveRoi,
    table : Vec<Rgb>,
    registry : Arc<ColormapRegistry>,
    seed : u64,
}

impl Bundle {
    /// Grayscale, no clipping, gamma 1, covering `extent` with a
    /// rectangular ROI.
    pub fn new(registry : Arc<ColormapRegistry>, extent : [usize; 3], seed : u64) -> Self {
        let mut bundle = Bundle {
            model : models::GRAY,
            low_clip : 0,
            high_clip : TABLE_SIZE - 1,
            show_over_under : false,
            log_scale : false,
            inverse : false,
            gamma : 1.0,
            overlay : false,
            multiplicative : false,
            window : ContrastWindow::default(),
            mip_window : ContrastWindow::default(),
            avg_window : ContrastWindow::default(),
            roi : ActiveRoi::Rect(RectRoi::covering(extent)),
            table : vec![Rgb::BLACK; TABLE_SIZE],
            registry,
            seed,
        };
        bundle.regenerate();
        bundle
    }

    /// Rebuilds all `TABLE_SIZE` entries from the current settings.
    pub fn regenerate(&mut self) {
        let low = self.low_clip;
        let high = self.high_clip;
        let user_table = if self.model >= BUILTIN_MODELS {
            let table = self.registry.get(self.model - BUILTIN_MODELS);
            if table.is_none() {
                log::warn!("User colormap {} is not registered, using grayscale", self.model - BUILTIN_MODELS);
            }
            table
        } else {
            None
        };
        let mut rng = StdRng::seed_from_u64(self.seed);

        for i in 0..TABLE_SIZE {
            // drawn for every entry so each index keeps its color
            // independent of the clip settings
            let random = if self.model == models::RANDOM {
                Some(Rgb::new(rng.gen(), rng.gen(), rng.gen()))
            } else {
                None
            };

            let mut t = if i <= low {
                if self.show_over_under {
                    self.table[i] = Rgb::UNDERFLOW;
                    continue;
                }
                0.0
            } else if i >= high {
                if self.show_over_under {
                    self.table[i] = Rgb::OVERFLOW;
                    continue;
                }
                1.0
            } else {
                (i - low) as f64 / (high - low) as f64
            };

            if self.gamma != 1.0 {
                t = t.powf(self.gamma);
            }
            if self.log_scale {
                t = (LOG_GAIN * t + 1.0).ln() / (LOG_GAIN + 1.0).ln();
            }

            let color = match (&user_table, random) {
                (_, Some(color)) => if i == 0 { Rgb::BLACK } else { color },
                (Some(table), None) => models::from_table(table, t),
                (None, None) => models::builtin(self.model, i, t),
            };
            self.table[i] = if self.inverse { color.inverted() } else { color };
        }
    }

    pub fn table(&self) -> &[Rgb] { &self.table }

    /// Entry at `index`, clamped to the table.
    pub fn color_at(&self, index : i64) -> Rgb {
        self.table[index.clamp(0, TABLE_SIZE as i64 - 1) as usize]
    }

    /// Color for position `pos` on an external scale of `size` steps,
    /// mapped linearly onto the clip range `[low, high]`.
    pub fn get_color(&self, pos : f64, size : f64) -> Rgb {
        let span = (self.high_clip - self.low_clip) as f64;
        let index = if size > 0.0 {
            self.low_clip as f64 + pos * span / size
        } else {
            self.low_clip as f64
        };
        self.color_at(index as i64)
    }

    pub fn model(&self) -> usize { self.model }

    /// Built-in models plus registered user tables.
    pub fn num_models(&self) -> usize { BUILTIN_MODELS + self.registry.len() }

    pub fn model_name(&self) -> String {
        match models::MODEL_NAMES.get(self.model) {
            Some(name) => name.to_string(),
            None => format!("User defined {}", self.model - BUILTIN_MODELS + 1),
        }
    }

    /// Select a model, wrapping around the available ones.
    pub fn set_model(&mut self, model : usize) {
        self.model = model % self.num_models();
        self.regenerate();
    }

    /// Step to the next model, wrapping around.
    pub fn advance_model(&mut self) {
        self.set_model(self.model + 1);
    }

    pub fn registry(&self) -> &Arc<ColormapRegistry> { &self.registry }

    pub fn gamma(&self) -> f64 { self.gamma }

    pub fn set_gamma(&mut self, gamma : f64) {
        self.gamma = gamma;
        self.regenerate();
    }

    pub fn is_log_scale(&self) -> bool { self.log_scale }

    pub fn toggle_log(&mut self, value : Option<bool>) -> bool {
        let on = apply_toggle(&mut self.log_scale, value);
        self.regenerate();
        on
    }

    pub fn shows_over_under(&self) -> bool { self.show_over_under }

    pub fn toggle_over_under(&mut self, value : Option<bool>) -> bool {
        let on = apply_toggle(&mut self.show_over_under, value);
        self.regenerate();
        on
    }

    pub fn is_inverse(&self) -> bool { self.inverse }

    pub fn toggle_inverse(&mut self, value : Option<bool>) -> bool {
        let on = apply_toggle(&mut self.inverse, value);
        self.regenerate();
        on
    }

    pub fn is_overlay(&self) -> bool { self.overlay }

    /// Overlay and multiplicative display exclude each other.
    pub fn set_overlay(&mut self, overlay : bool) {
        self.overlay = overlay;
        if overlay {
            self.multiplicative = false;
        }
    }

    pub fn is_multiplicative(&self) -> bool { self.multiplicative }

    pub fn set_multiplicative(&mut self, multiplicative : bool) {
        self.multiplicative = multiplicative;
        if multiplicative {
            self.overlay = false;
        }
    }

    pub fn clip(&self) -> (usize, usize) { (self.low_clip, self.high_clip) }

    /// Table indices at which the ramp starts and ends.
    pub fn set_clip(&mut self, low : usize, high : usize) {
        let (low, high) = (low.min(high), low.max(high));
        self.low_clip = low.min(TABLE_SIZE - 1);
        self.high_clip = high.min(TABLE_SIZE - 1);
        self.regenerate();
    }

    /// Full-range clip indices.
    pub fn reset_clip(&mut self) {
        self.set_clip(0, TABLE_SIZE - 1);
    }

    pub fn window(&self) -> ContrastWindow { self.window }

    /// Returns whether the window actually changed.
    pub fn set_window(&mut self, min : f64, max : f64) -> bool {
        let changed = self.window.min != min || self.window.max != max;
        self.window = ContrastWindow { min, max };
        changed
    }

    pub fn mip_window(&self) -> ContrastWindow { self.mip_window }

    pub fn set_mip_window(&mut self, min : f64, max : f64) {
        self.mip_window = ContrastWindow { min, max };
    }

    pub fn avg_window(&self) -> ContrastWindow { self.avg_window }

    pub fn set_avg_window(&mut self, min : f64, max : f64) {
        self.avg_window = ContrastWindow { min, max };
    }

    pub fn roi(&self) -> &ActiveRoi { &self.roi }

    pub fn roi_mut(&mut self) -> &mut ActiveRoi { &mut self.roi }

    pub fn set_roi(&mut self, roi : ActiveRoi) { self.roi = roi; }

    pub fn in_roi(&self, x : i64, y : i64, z : i64) -> bool { self.roi.in_range(x, y, z) }

    /// Data value the low clip index actually points to.
    pub fn min_threshold(&self) -> f64 {
        let ContrastWindow { min, max } = self.window;
        min + (max - min) / TABLE_SIZE as f64 * self.low_clip as f64
    }

    /// Data value the high clip index actually points to.
    pub fn max_threshold(&self) -> f64 {
        let ContrastWindow { min, max } = self.window;
        min + (max - min) * self.high_clip as f64 / TABLE_SIZE as f64
    }

    /// `value` normalized against the effective thresholds, with gamma
    /// or log applied the same way the table does. Log mode returns
    /// -10 for non-positive values.
    pub fn normalized_value(&self, value : f64) -> f64 {
        let min = self.min_threshold();
        let max = self.max_threshold();
        if !self.log_scale {
            let linear = (value - min) / (max - min);
            if self.gamma == 1.0 { linear } else { linear.powf(self.gamma) }
        } else if value > 0.0 {
            let vl = if min > 0.0 { min } else { 0.1 };
            let vh = if max > 0.0 { max } else { 1.0 };
            (value.ln() - vl.ln()) / (vh.ln() - vl.ln())
        } else {
            -10.0
        }
    }

    /// Folds the table clip back into the contrast window: afterwards the
    /// clip indices sit at `fac_min` and `fac_max` of the table and the
    /// window is widened or narrowed so the same data values keep the
    /// same colors.
    pub fn table_to_value_threshold(&mut self, fac_min : f64, fac_max : f64) {
        let ContrastWindow { min, max } = self.window;
        let top = (TABLE_SIZE - 1) as f64;
        let cmin = self.low_clip as f64;
        let cmax = self.high_clip as f64;
        let cmin_new = (top * fac_min) as i64 as f64;
        let cmax_new = (top * fac_max) as i64 as f64;
        let scale = (max - min) / TABLE_SIZE as f64;
        let scale2 = (cmax - cmin) / (cmax_new - cmin_new);

        let new_max = max - scale * (TABLE_SIZE as f64 - (cmax + scale2 * (top - cmax_new)));
        let new_min = min + scale * (cmin - scale2 * cmin_new);
        self.window = ContrastWindow { min : new_min, max : new_max };
        self.low_clip = cmin_new.max(0.0) as usize;
        self.high_clip = (cmax_new as usize).min(TABLE_SIZE - 1);
        self.regenerate();
    }
}
