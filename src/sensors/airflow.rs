/// Airflow sensor calibration: pulse frequency (Hz) to air velocity (m/s)
///
/// Below 3.5 Hz the vane is considered stalled. From 3.5 Hz up to 20 Hz the
/// fine table (0.1 Hz steps) is interpolated, from 20 Hz up to 100 Hz the
/// coarse table (2 Hz steps). Above 100 Hz a linear fit is extrapolated.

const FINE_START_HZ: f64 = 3.5;
const FINE_END_HZ: f64 = 20.0;
const FINE_STEP_HZ: f64 = 0.1;
const COARSE_END_HZ: f64 = 100.0;
const COARSE_STEP_HZ: f64 = 2.0;

// Linear fit above the coarse table
const EXTRAPOLATION_SLOPE: f64 = 0.0532;
const EXTRAPOLATION_OFFSET: f64 = 0.3714;

/// Velocity (m/s) at 3.5, 3.6, ... 20.0 Hz
#[rustfmt::skip]
const FINE_TABLE: [f64; 166] = [
    0.3, 0.31, 0.31, 0.32, 0.33, 0.34, 0.35, 0.36, 0.37, 0.37,
    0.38, 0.39, 0.4, 0.41, 0.42, 0.43, 0.43, 0.44, 0.5, 0.51,
    0.52, 0.53, 0.54, 0.55, 0.56, 0.57, 0.58, 0.59, 0.6, 0.61,
    0.62, 0.62, 0.63, 0.65, 0.66, 0.8, 0.81, 0.82, 0.83, 0.84,
    0.86, 0.87, 0.88, 0.89, 0.9, 0.91, 0.93, 0.94, 0.95, 0.96,
    0.97, 0.98, 0.99, 1.0, 1.02, 1.03, 1.04, 1.05, 1.06, 1.07,
    1.09, 1.1, 1.1, 1.12, 1.13, 1.14, 1.15, 1.17, 1.18, 1.19,
    1.1, 1.12, 1.12, 1.13, 1.14, 1.15, 1.16, 1.17, 1.19, 1.2,
    1.21, 1.22, 1.22, 1.23, 1.24, 1.25, 1.27, 1.24, 1.2, 1.21,
    1.22, 1.24, 1.25, 1.26, 1.27, 1.28, 1.29, 1.3, 1.31, 1.32,
    1.33, 1.34, 1.34, 1.35, 1.36, 1.2, 1.21, 1.22, 1.23, 1.24,
    1.24, 1.26, 1.27, 1.27, 1.29, 1.29, 1.3, 1.31, 1.32, 1.32,
    1.33, 1.34, 1.32, 1.3, 1.31, 1.32, 1.33, 1.33, 1.34, 1.35,
    1.36, 1.37, 1.38, 1.38, 1.39, 1.4, 1.42, 1.42, 1.43, 1.45,
    1.4, 1.41, 1.42, 1.43, 1.44, 1.45, 1.46, 1.46, 1.47, 1.47,
    1.48, 1.49, 1.5, 1.5, 1.51, 1.52, 1.53, 1.43, 1.41, 1.42,
    1.42, 1.43, 1.44, 1.45, 1.45, 1.46,
];

/// Velocity (m/s) at 20, 22, ... 100 Hz
#[rustfmt::skip]
const COARSE_TABLE: [f64; 41] = [
    1.46, 1.57, 1.6, 1.7, 1.81, 1.92, 2.04, 2.16, 2.26, 2.4,
    2.5, 2.61, 2.72, 2.85, 2.86, 2.97, 3.09, 3.21, 3.32, 3.43,
    3.55, 3.66, 3.77, 3.88, 4.01, 4.12, 4.22, 4.36, 4.49, 4.58,
    4.59, 4.71, 4.83, 4.94, 5.07, 5.17, 5.29, 5.4, 5.53, 5.63,
    5.76,
];

fn interpolate(table: &[f64], index: usize, base_hz: f64, step_hz: f64, freq: f64) -> f64 {
    // The top sample has no successor; interpolate into it from below instead
    let index = index.min(table.len() - 2);
    let low_hz = base_hz + index as f64 * step_hz;
    let (low, high) = (table[index], table[index + 1]);
    (high - low) * (freq - low_hz) / step_hz + low
}

pub fn frequency_to_velocity(freq: f64) -> f64 {
    if freq.is_nan() || freq < FINE_START_HZ {
        return 0.0;
    }
    if freq < FINE_END_HZ {
        // Index in tenths of a hertz, floored
        let tenths = (freq * 10.0).floor() as usize;
        return interpolate(&FINE_TABLE, tenths - 35, FINE_START_HZ, FINE_STEP_HZ, freq);
    }
    if freq <= COARSE_END_HZ {
        let index = (freq / COARSE_STEP_HZ).floor() as usize - 10;
        return interpolate(&COARSE_TABLE, index, FINE_END_HZ, COARSE_STEP_HZ, freq);
    }
    EXTRAPOLATION_SLOPE * freq + EXTRAPOLATION_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const EPS: f64 = 1e-9;

    #[test]
    fn stalled_below_threshold() {
        assert_eq!(frequency_to_velocity(0.0), 0.0);
        assert_eq!(frequency_to_velocity(-4.0), 0.0);
        assert_eq!(frequency_to_velocity(3.4999), 0.0);
        assert_eq!(frequency_to_velocity(f64::NAN), 0.0);
    }

    #[test]
    fn fine_table_samples_and_interpolation() {
        assert_abs_diff_eq!(frequency_to_velocity(3.5), 0.3, epsilon = EPS);
        assert_abs_diff_eq!(frequency_to_velocity(4.05), 0.345, epsilon = EPS);
        assert_abs_diff_eq!(frequency_to_velocity(7.0), 0.8, epsilon = EPS);
        // Table dips between 12.2 and 12.3 Hz
        assert_abs_diff_eq!(frequency_to_velocity(12.25), 1.22, epsilon = EPS);
        assert_abs_diff_eq!(frequency_to_velocity(19.95), 1.455, epsilon = EPS);
    }

    #[test]
    fn fine_and_coarse_tables_meet_at_20hz() {
        assert_abs_diff_eq!(FINE_TABLE[FINE_TABLE.len() - 1], COARSE_TABLE[0], epsilon = EPS);
        assert_abs_diff_eq!(frequency_to_velocity(20.0), 1.46, epsilon = EPS);
        assert_abs_diff_eq!(frequency_to_velocity(19.9999), 1.46, epsilon = 1e-4);
    }

    #[test]
    fn coarse_table_samples_and_interpolation() {
        assert_abs_diff_eq!(frequency_to_velocity(21.0), 1.515, epsilon = EPS);
        assert_abs_diff_eq!(frequency_to_velocity(50.0), 2.97, epsilon = EPS);
        assert_abs_diff_eq!(frequency_to_velocity(99.0), 5.695, epsilon = EPS);
        assert_abs_diff_eq!(frequency_to_velocity(100.0), 5.76, epsilon = EPS);
    }

    #[test]
    fn extrapolates_above_100hz() {
        assert_abs_diff_eq!(frequency_to_velocity(150.0), 8.3814, epsilon = EPS);
        assert_abs_diff_eq!(frequency_to_velocity(100.5), 0.0532 * 100.5 + 0.3714, epsilon = EPS);
    }
}
