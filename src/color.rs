//! Color space utilities shared by the grading and bloom stages.

use glam::Vec3;

/// Convert a single sRGB-encoded channel to linear space.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Convert a single linear channel to sRGB encoding.
pub fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Convert an sRGB color to linear space componentwise.
pub fn srgb_to_linear_vec(c: Vec3) -> Vec3 {
    Vec3::new(srgb_to_linear(c.x), srgb_to_linear(c.y), srgb_to_linear(c.z))
}

/// Convert a linear color to sRGB encoding componentwise.
pub fn linear_to_srgb_vec(c: Vec3) -> Vec3 {
    Vec3::new(linear_to_srgb(c.x), linear_to_srgb(c.y), linear_to_srgb(c.z))
}

/// Rec. 709 luminance of a linear color.
pub fn luminance(c: Vec3) -> f32 {
    c.dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

// CAT02 LMS coordinates of the D65 white point.
const D65_LMS: Vec3 = Vec3::new(0.949_237, 1.035_42, 1.087_28);

fn standard_illuminant_y(x: f32) -> f32 {
    2.87 * x - 3.0 * x * x - 0.275_095_07
}

fn cie_xy_to_lms(x: f32, y: f32) -> Vec3 {
    let big_y = 1.0;
    let big_x = big_y * x / y;
    let big_z = big_y * (1.0 - x - y) / y;
    Vec3::new(
        0.7328 * big_x + 0.4296 * big_y - 0.1624 * big_z,
        -0.7036 * big_x + 1.6975 * big_y + 0.0061 * big_z,
        0.0030 * big_x + 0.0136 * big_y + 0.9834 * big_z,
    )
}

/// Per-channel LMS multipliers for a white-balance adjustment.
///
/// `temperature` and `tint` are user-range values in [-100, 100]; the result
/// divides the D65 white point by the shifted illuminant so that a neutral
/// setting yields unit coefficients.
pub fn white_balance_coeffs(temperature: f32, tint: f32) -> Vec3 {
    let t1 = temperature / 65.0;
    let t2 = tint / 65.0;

    // Shift the planckian locus along temperature, then off it along tint.
    let x = 0.31271 - t1 * if t1 < 0.0 { 0.1 } else { 0.05 };
    let y = standard_illuminant_y(x) + t2 * 0.05;

    let w = cie_xy_to_lms(x, y);
    D65_LMS / w
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_srgb_round_trip() {
        for c in [0.0, 0.01, 0.2, 0.5, 0.73, 1.0] {
            assert_relative_eq!(linear_to_srgb(srgb_to_linear(c)), c, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_srgb_linear_toe() {
        // Below the sRGB toe the curve is a simple divide.
        assert_relative_eq!(srgb_to_linear(0.04), 0.04 / 12.92);
    }

    #[test]
    fn test_neutral_white_balance_is_unit() {
        let coeffs = white_balance_coeffs(0.0, 0.0);
        assert_relative_eq!(coeffs.x, 1.0, epsilon = 1e-2);
        assert_relative_eq!(coeffs.y, 1.0, epsilon = 1e-2);
        assert_relative_eq!(coeffs.z, 1.0, epsilon = 1e-2);
    }

    #[test]
    fn test_warm_balance_boosts_long_wavelengths() {
        let warm = white_balance_coeffs(50.0, 0.0);
        assert!(warm.x > warm.z);
    }

    #[test]
    fn test_luminance_weights() {
        assert_relative_eq!(luminance(Vec3::ONE), 1.0, epsilon = 1e-6);
        assert!(luminance(Vec3::new(0.0, 1.0, 0.0)) > luminance(Vec3::new(1.0, 0.0, 0.0)));
    }
}
