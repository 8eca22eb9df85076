//! 16.16 fixed-point and binary-angle helpers with their lookup tables.

use std::sync::LazyLock;

pub type Fixed = i32;
/// Binary angle: the full circle spans the whole `u32` range.
pub type Angle = u32;

pub const FRACBITS: i32 = 16;
pub const FRACUNIT: Fixed = 1 << FRACBITS;

pub const ANG45: Angle = 0x2000_0000;
pub const ANG90: Angle = 0x4000_0000;
pub const ANG180: Angle = 0x8000_0000;
pub const ANG270: Angle = 0xc000_0000;

pub const FINEANGLES: usize = 8192;
pub const FINEMASK: usize = FINEANGLES - 1;
pub const ANGLETOFINESHIFT: u32 = 19;

pub const SLOPERANGE: usize = 2048;
const SLOPEBITS: i32 = 11;
const DBITS: i32 = FRACBITS - SLOPEBITS;

/// Sine over 5/4 of a circle so cosine is `FINESINE[i + FINEANGLES / 4]`.
static FINESINE: LazyLock<Vec<Fixed>> = LazyLock::new(|| {
    (0..5 * FINEANGLES / 4)
        .map(|i| {
            let a = (i as f64 + 0.5) * std::f64::consts::TAU / FINEANGLES as f64;
            (a.sin() * FRACUNIT as f64) as Fixed
        })
        .collect()
});

/// `atan(i / SLOPERANGE)` as a binary angle, for i in 0..=SLOPERANGE.
static TANTOANGLE: LazyLock<Vec<Angle>> = LazyLock::new(|| {
    (0..=SLOPERANGE)
        .map(|i| {
            let a = (i as f64 / SLOPERANGE as f64).atan();
            (a / std::f64::consts::TAU * 4_294_967_296.0) as Angle
        })
        .collect()
});

pub fn finesine(index: usize) -> Fixed {
    FINESINE[index & FINEMASK]
}

pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    ((a as i64 * b as i64) >> FRACBITS) as Fixed
}

pub fn to_fixed(units: i32) -> Fixed {
    units.saturating_mul(FRACUNIT)
}

fn slope_div(num: u64, den: u64) -> usize {
    if den < 512 {
        return SLOPERANGE;
    }
    (((num << 3) / (den >> 8)) as usize).min(SLOPERANGE)
}

/// Angle of the vector from (x1, y1) to (x2, y2), counter-clockwise from +x.
pub fn point_to_angle(x1: Fixed, y1: Fixed, x2: Fixed, y2: Fixed) -> Angle {
    let x = x2 as i64 - x1 as i64;
    let y = y2 as i64 - y1 as i64;
    if x == 0 && y == 0 {
        return 0;
    }
    let t = |num: i64, den: i64| TANTOANGLE[slope_div(num as u64, den as u64)];

    if x >= 0 {
        if y >= 0 {
            if x > y { t(y, x) } else { (ANG90 - 1).wrapping_sub(t(x, y)) }
        } else {
            let y = -y;
            if x > y { 0u32.wrapping_sub(t(y, x)) } else { ANG270.wrapping_add(t(x, y)) }
        }
    } else {
        let x = -x;
        if y >= 0 {
            if x > y { (ANG180 - 1).wrapping_sub(t(y, x)) } else { ANG90.wrapping_add(t(x, y)) }
        } else {
            let y = -y;
            if x > y { ANG180.wrapping_add(t(y, x)) } else { (ANG270 - 1).wrapping_sub(t(x, y)) }
        }
    }
}

/// Exact 2D distance without a square root.
///
/// Octant-reduce so `dx >= dy`, look up the angle of the slope, and divide the
/// long leg by that angle's cosine.
pub fn point_to_dist(x1: Fixed, y1: Fixed, x2: Fixed, y2: Fixed) -> Fixed {
    let mut dx = (x2 as i64 - x1 as i64).abs();
    let mut dy = (y2 as i64 - y1 as i64).abs();
    if dy > dx {
        std::mem::swap(&mut dx, &mut dy);
    }
    if dx == 0 {
        return 0;
    }
    let slope = (((dy << FRACBITS) / dx) >> DBITS) as usize;
    let angle = TANTOANGLE[slope.min(SLOPERANGE)].wrapping_add(ANG90) >> ANGLETOFINESHIFT;
    let dist = (dx << FRACBITS) / FINESINE[angle as usize] as i64;
    dist.min(i32::MAX as i64) as Fixed
}
