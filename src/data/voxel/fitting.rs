//! Local spot fitting on a single buffer: maximum search, clipped
//! centre of intensity and Gaussian spot subtraction.
//!
//! Everything here is written against `Element` and is available on
//! every buffer (and on `dyn Element`) through `SpotFitting`.

use crate::config::TrackMode;
use crate::data::voxel::Element;
use crate::markers::APoint;

/// Iteration cap for `iterative_closest_max`.
const MAX_CLIMB_STEPS : usize = 256;

/// `sigma^2` of a Gaussian with the given full width at half maximum,
/// in the `exp(-r^2 / sigma^2)` convention.
#[inline]
pub fn sigma_squared(fwhm : f64) -> f64 {
    (fwhm / 2.0) * (fwhm / 2.0) / std::f64::consts::LN_2
}

/// Reciprocal of the unnormalized Gaussian integral over the box of
/// half-widths `half_box`, centred on a voxel. 0 if the integral is 0.
pub fn int_max_scale(half_box : [i64; 3], fwhm : f64) -> f64 {
    let sigma2 = sigma_squared(fwhm);
    let [dx, dy, dz] = half_box;
    let mut integral = 0.0;
    for zz in -dz..=dz {
        for yy in -dy..=dy {
            for xx in -dx..=dx {
                let r2 = (xx * xx + yy * yy + zz * zz) as f64;
                integral += (-r2 / sigma2).exp();
            }
        }
    }
    if integral > 0.0 { 1.0 / integral } else { 0.0 }
}

#[inline]
fn round_coord(c : f64) -> i64 { (c + 0.5) as i64 }

pub trait SpotFitting : Element {
    /// Estimates the intensity of a Gaussian spot at the sub-pixel
    /// `position` and subtracts it from the box around it.
    ///
    /// Background is the minimum of the box; the intensity is
    /// `(box sum - background * box volume) / gaussian integral`.
    /// Reads clamp at the buffer edges, writes outside are dropped.
    /// Returns the fitted intensity.
    fn subtract_gaussian(
        &mut self,
        position : [f64; 3],
        target_integral : f64,
        half_box : [i64; 3],
        fwhm : f64,
    ) -> f64 {
        let [px, py, pz] = position;
        let (x, y, z) = (round_coord(px), round_coord(py), round_coord(pz));
        let [dx, dy, dz] = half_box;
        let sigma2 = sigma_squared(fwhm);

        let gauss = |xx : i64, yy : i64, zz : i64| {
            let r2 = (xx as f64 - px).powi(2) + (yy as f64 - py).powi(2) + (zz as f64 - pz).powi(2);
            (-r2 / sigma2).exp()
        };

        let mut gauss_integral = 0.0;
        let mut value_integral = 0.0;
        let mut background = self.calibrated_with_bounds(x, y, z);
        for zz in z - dz..=z + dz {
            for yy in y - dy..=y + dy {
                for xx in x - dx..=x + dx {
                    gauss_integral += gauss(xx, yy, zz);
                    let val = self.calibrated_with_bounds(xx, yy, zz);
                    value_integral += val;
                    background = background.min(val);
                }
            }
        }
        let volume = ((2 * dx + 1) * (2 * dy + 1) * (2 * dz + 1)) as f64;
        let intensity = (value_integral - background * volume) / gauss_integral;
        log::debug!(
            "Gaussian fit at {:?}: intensity {} (tracked integral {})",
            position, intensity, target_integral
        );

        for zz in z - dz..=z + dz {
            for yy in y - dy..=y + dy {
                for xx in x - dx..=x + dx {
                    if !self.within_bounds(xx, yy, zz) {
                        continue;
                    }
                    let (ux, uy, uz) = (xx as usize, yy as usize, zz as usize);
                    let val = self.calibrated_at(ux, uy, uz) - intensity * gauss(xx, yy, zz);
                    self.set_value(ux, uy, uz, val);
                }
            }
        }
        intensity
    }

    /// Highest (or, in `TrackMode::Minimum`, lowest) calibrated value
    /// within `half_box` of `pt`, after subtracting `penalty` at each
    /// candidate. Ties keep the starting voxel. The returned point
    /// carries the winning value in `max`.
    fn closest_max<P>(&self, pt : &APoint, half_box : [i64; 3], penalty : P, mode : TrackMode) -> APoint
    where P : Fn(&APoint) -> f64 {
        let sign = mode.sign();
        let (x, y, z) = (round_coord(pt.coord[0]), round_coord(pt.coord[1]), round_coord(pt.coord[2]));
        let [dx, dy, dz] = half_box;

        let mut p = pt.clone();
        let mut best = sign * self.calibrated_with_bounds(x, y, z) - penalty(&p);
        let (mut bx, mut by, mut bz) = (x, y, z);
        for zz in z - dz..=z + dz {
            p.coord[2] = zz as f64;
            for yy in y - dy..=y + dy {
                p.coord[1] = yy as f64;
                for xx in x - dx..=x + dx {
                    p.coord[0] = xx as f64;
                    let val = sign * self.calibrated_with_bounds(xx, yy, zz);
                    // penalty only ever lowers a value: skip it when it cannot win
                    if val > best {
                        let val = val - penalty(&p);
                        if val > best {
                            best = val;
                            (bx, by, bz) = (xx, yy, zz);
                        }
                    }
                }
            }
        }
        p.coord[0] = bx as f64;
        p.coord[1] = by as f64;
        p.coord[2] = bz as f64;
        p.max = best;
        p
    }

    /// Repeats `closest_max` from its own result until the position
    /// settles (moves by less than `sqrt(0.1)` voxels).
    fn iterative_closest_max<P>(&self, pt : &APoint, half_box : [i64; 3], penalty : P, mode : TrackMode) -> APoint
    where P : Fn(&APoint) -> f64 {
        let mut previous = pt.clone();
        let mut current = self.closest_max(pt, half_box, &penalty, mode);
        let mut steps = 0;
        while previous.sqr_dist_to(&current, [1.0; 3]) > 0.1 {
            if steps >= MAX_CLIMB_STEPS {
                log::warn!("Maximum search did not settle after {} steps", steps);
                break;
            }
            previous = current;
            current = self.closest_max(&previous, half_box, &penalty, mode);
            steps += 1;
        }
        current.color = pt.color;
        current
    }

    /// Centre of intensity within `half_box` of `p`, over voxels that are
    /// inside the buffer and where `gate` (if any) is positive, with the
    /// box minimum subtracted as background.
    ///
    /// Always fills `integral`, `max`, `min` and `integral_above_min`.
    /// Moves `p` to the centre only when `move_point` is set and the box
    /// is not flat. Coordinates are clipped at 0.
    fn clipped_coi(
        &self,
        p : &mut APoint,
        half_box : [i64; 3],
        gate : Option<&dyn Element>,
        mode : TrackMode,
        move_point : bool,
    ) {
        let sign = mode.sign();
        let (x, y, z) = (round_coord(p.coord[0]), round_coord(p.coord[1]), round_coord(p.coord[2]));
        let [dx, dy, dz] = half_box;

        let mut maxv = sign * self.calibrated_with_bounds(x, y, z);
        let mut minv = maxv;
        let (mut sum, mut sx, mut sy, mut sz, mut count) = (0.0, 0.0, 0.0, 0.0, 0.0);

        for zz in z - dz..=z + dz {
            for yy in y - dy..=y + dy {
                for xx in x - dx..=x + dx {
                    if let Some(gate) = gate {
                        if gate.calibrated_with_bounds(xx, yy, zz) <= 0.0 {
                            continue;
                        }
                    }
                    if !self.within_bounds(xx, yy, zz) {
                        continue;
                    }
                    let val = sign * self.calibrated_at(xx as usize, yy as usize, zz as usize);
                    sx += val * xx as f64;
                    sy += val * yy as f64;
                    sz += val * zz as f64;
                    sum += val;
                    minv = minv.min(val);
                    maxv = maxv.max(val);
                    count += 1.0;
                }
            }
        }
        if minv >= maxv {
            minv = 0.0;
        }
        p.integral = sum;
        p.max = maxv;
        p.min = minv;
        let mut above = sum - count * minv;
        p.integral_above_min = above;
        if above == 0.0 {
            above = 1.0;
        }
        if count == 0.0 {
            return;
        }
        let px = ((sx - minv * count * x as f64) / above).max(0.0);
        let py = ((sy - minv * count * y as f64) / above).max(0.0);
        let pz = ((sz - minv * count * z as f64) / above).max(0.0);
        if move_point && maxv > minv {
            p.coord[0] = px;
            p.coord[1] = py;
            p.coord[2] = pz;
            p.coord[3] = round_coord(p.coord[3]) as f64;
            p.coord[4] = round_coord(p.coord[4]) as f64;
        }
    }
}

impl<E : Element + ?Sized> SpotFitting for E {}
