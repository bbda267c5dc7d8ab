//! CIE 1931 xy <-> RGB conversion
//!
//! The resource API describes color as a chromaticity pair plus a 0-100
//! brightness, while fixtures and the entertainment stream speak RGB. The
//! forward conversion here is the one the bridge simulator uses when a light
//! is driven through the resource API; [`rgb_to_xy`] is only an approximate
//! inverse (truncation and gamut scaling both lose information).

/// XYZ -> linear RGB, wide gamut.
const XYZ_TO_RGB: [[f64; 3]; 3] = [
    [1.612, -0.203, -0.302],
    [-0.509, 1.412, 0.066],
    [0.026, -0.072, 0.962],
];

/// Inverse of [`XYZ_TO_RGB`].
const RGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.649842, 0.103467, 0.196906],
    [0.234257, 0.743044, 0.022562],
    [-0.000031, 0.052816, 1.035868],
];

fn mul(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Convert CIE xy coordinates and a 0-100 brightness to 8-bit RGB.
///
/// Returns black when `brightness <= 0` or `y == 0`. Negative components are
/// clamped to zero; if the largest component exceeds 1.0 all three are scaled
/// down by it so the hue survives. Components are truncated, not rounded.
pub fn xy_to_rgb(x: f64, y: f64, brightness: i32) -> (u8, u8, u8) {
    if brightness <= 0 || y == 0.0 {
        return (0, 0, 0);
    }

    let z = 1.0 - x - y;
    let big_y = f64::from(brightness) / 100.0;
    let big_x = (big_y / y) * x;
    let big_z = (big_y / y) * z;

    let mut rgb = mul(&XYZ_TO_RGB, [big_x, big_y, big_z]).map(|c| c.max(0.0));

    let max = rgb[0].max(rgb[1]).max(rgb[2]);
    if max > 1.0 {
        rgb = rgb.map(|c| c / max);
    }

    // `as` saturates, and every component is already within 0.0..=1.0
    let [r, g, b] = rgb.map(|c| (c * 255.0) as u8);
    (r, g, b)
}

/// Approximate inverse of [`xy_to_rgb`].
///
/// Returns `(x, y, brightness)` with brightness on the 0-100 scale. Black maps
/// to `(0.0, 0.0, 0.0)`. Colors that were gamut-scaled on the way in come back
/// with the right chromaticity but a lower brightness.
pub fn rgb_to_xy(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let linear = [r, g, b].map(|c| f64::from(c) / 255.0);
    let [big_x, big_y, big_z] = mul(&RGB_TO_XYZ, linear);

    let sum = big_x + big_y + big_z;
    if sum <= 0.0 {
        return (0.0, 0.0, 0.0);
    }

    (big_x / sum, big_y / sum, (big_y * 100.0).clamp(0.0, 100.0))
}
