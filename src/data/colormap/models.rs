//! The built-in tone curves. Each maps a normalized `t` in `[0, 1]`
//! to an RGB triple.

use crate::data::colormap::Rgb;
use crate::data::colormap::registry::UserTable;

pub const GRAY : usize = 0;
pub const RED : usize = 1;
pub const GREEN : usize = 2;
pub const BLUE : usize = 3;
pub const VIOLET : usize = 4;
pub const GLOW_RED : usize = 5;
pub const GLOW_GREEN : usize = 6;
pub const GLOW_BLUE : usize = 7;
pub const GLOW_YELLOW : usize = 8;
pub const GLOW_CYAN : usize = 9;
pub const RAINBOW : usize = 10;
pub const RANDOM : usize = 11;
pub const CYCLIC : usize = 12;

/// Number of built-in models. Model numbers at or above this select
/// user tables.
pub const BUILTIN_MODELS : usize = 13;

pub const MODEL_NAMES : [&str; BUILTIN_MODELS] = [
    "Gray", "Red", "Green", "Blue", "Violet",
    "Glow red", "Glow green", "Glow blue", "Glow yellow", "Glow cyan",
    "Rainbow", "Random", "Cyclic",
];

#[inline]
fn clip(v : f64) -> f64 { v.clamp(0.0, 1.0) }

#[inline]
fn channel(v : f64) -> u8 { (clip(v) * 255.0) as u8 }

/// `clip((t - start) * slope)` per channel.
#[inline]
fn glow(t : f64, start : [f64; 3], slope : f64) -> Rgb {
    Rgb::new(
        channel((t - start[0]) * slope),
        channel((t - start[1]) * slope),
        channel((t - start[2]) * slope),
    )
}

/// Color of a built-in model other than `RANDOM`. `index` is the table
/// entry, used for the models that force entry 0 to black.
pub fn builtin(model : usize, index : usize, t : f64) -> Rgb {
    let third = 1.0 / 3.0;
    match model {
        GRAY => { let v = channel(t); Rgb::new(v, v, v) },
        RED => Rgb::new(channel(t), 0, 0),
        GREEN => Rgb::new(0, channel(t), 0),
        BLUE => Rgb::new(0, 0, channel(t)),
        VIOLET => Rgb::new(channel(t), 0, channel(t)),
        GLOW_RED => glow(t, [0.0, third, 2.0 * third], 3.0),
        GLOW_GREEN => glow(t, [2.0 * third, 0.0, third], 3.0),
        GLOW_BLUE => glow(t, [2.0 * third, third, 0.0], 3.0),
        GLOW_YELLOW => glow(t, [0.0, 0.0, 0.5], 2.0),
        GLOW_CYAN => glow(t, [0.5, 0.0, 0.0], 2.0),
        RAINBOW => {
            if index == 0 { return Rgb::BLACK; }
            Rgb::new(
                channel(1.5 - (4.0 * t - 3.0).abs()),
                channel(1.5 - (4.0 * t - 2.0).abs()),
                channel(1.5 - (4.0 * t - 1.0).abs()),
            )
        },
        CYCLIC => {
            if index == 0 { return Rgb::BLACK; }
            let s = 3.0 * t;
            if s < 1.0 {
                Rgb::new(channel(1.0 - s), channel(s), 0)
            } else if s < 2.0 {
                Rgb::new(0, channel(2.0 - s), channel(s - 1.0))
            } else {
                Rgb::new(channel(s - 2.0), 0, channel(3.0 - s))
            }
        },
        _ => { let v = channel(t); Rgb::new(v, v, v) },
    }
}

/// Nearest-neighbour lookup of `t` in a user table.
pub fn from_table(table : &UserTable, t : f64) -> Rgb {
    if table.is_empty() {
        return Rgb::BLACK;
    }
    let idx = (clip(t) * (table.len() - 1) as f64 + 0.5) as usize;
    let idx = idx.min(table.len() - 1);
    Rgb::new(table.red[idx], table.green[idx], table.blue[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_hit_their_ends() {
        assert_eq!(builtin(GRAY, 5, 0.0), Rgb::new(0, 0, 0));
        assert_eq!(builtin(GRAY, 5, 1.0), Rgb::new(255, 255, 255));
        assert_eq!(builtin(VIOLET, 5, 1.0), Rgb::new(255, 0, 255));
        assert_eq!(builtin(GLOW_RED, 5, 1.0), Rgb::new(255, 255, 255));
        assert_eq!(builtin(GLOW_RED, 5, 0.3), Rgb::new(channel(0.9), 0, 0));
    }

    #[test]
    fn rainbow_and_cycle_black_at_zero() {
        assert_eq!(builtin(RAINBOW, 0, 0.5), Rgb::BLACK);
        assert_eq!(builtin(CYCLIC, 0, 0.5), Rgb::BLACK);
        // rainbow at the middle is green-dominated
        let mid = builtin(RAINBOW, 100, 0.5);
        assert_eq!(mid.g, 255);
        assert_eq!(mid.r, 127);
        assert_eq!(builtin(CYCLIC, 1, 0.0), Rgb::new(255, 0, 0));
    }

    #[test]
    fn user_table_nearest_neighbour() {
        let table = UserTable { red : vec![0, 100, 200], green : vec![1, 2, 3], blue : vec![9, 9, 9] };
        assert_eq!(from_table(&table, 0.0), Rgb::new(0, 1, 9));
        assert_eq!(from_table(&table, 0.3), Rgb::new(100, 2, 9));
        assert_eq!(from_table(&table, 1.0), Rgb::new(200, 3, 9));
    }
}
