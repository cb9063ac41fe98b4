//! Oxygen optode compensation.
//!
//! Salinity and pressure corrections for Aanderaa 4831 optode readings, using
//! the coefficients published in the Aanderaa TD 269 operating manual
//! (June 2017). The optode reports oxygen as if in fresh water at surface
//! pressure; both corrections scale that reading multiplicatively.

/// Salinity compensation coefficients.
pub const B0: f64 = -6.24097e-3;
pub const B1: f64 = -6.93498e-3;
pub const B2: f64 = -6.90358e-3;
pub const B3: f64 = -4.29155e-3;
pub const C0: f64 = -3.11680e-7;

/// Pressure compensation, per mille per dBar.
pub const PRESSURE_COEFF: f64 = 0.032;

/// Convert practical salinity to reference salinity (g/kg).
pub fn psu_to_reference_salinity(psu: f64) -> f64 {
    psu * (35.16504 / 35.0)
}

/// Scaled temperature `ln((298.15 - T) / (273.15 + T))`. NaN outside the
/// physical range.
pub fn scaled_temperature(temp: f64) -> f64 {
    ((298.15 - temp) / (273.15 + temp)).ln()
}

/// Salinity-compensate a raw optode reading relative to `ref_salinity`
/// (0 when the sensor was configured for fresh water).
pub fn salinity_compensation(raw_o2: f64, temp: f64, salinity: f64, ref_salinity: f64) -> f64 {
    let ts = scaled_temperature(temp);
    let poly = B0 + B1 * ts + B2 * ts.powi(2) + B3 * ts.powi(3);
    raw_o2
        * ((salinity - ref_salinity) * poly
            + C0 * (salinity.powi(2) - ref_salinity.powi(2)))
        .exp()
}

/// Multiplier applied for hydrostatic pressure in dBar.
pub fn pressure_factor(pressure: f64) -> f64 {
    1.0 + (PRESSURE_COEFF * pressure) / 1000.0
}

/// Fully compensated oxygen: salinity correction followed by pressure
/// correction. Returns NaN for a temperature outside (-273.15, 298.15) °C.
pub fn compensate_oxygen(
    raw_o2: f64,
    temp: f64,
    pressure: f64,
    salinity: f64,
    ref_salinity: f64,
) -> f64 {
    salinity_compensation(raw_o2, temp, salinity, ref_salinity) * pressure_factor(pressure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_water_surface_is_identity() {
        let o2 = compensate_oxygen(250.0, 10.0, 0.0, 0.0, 0.0);
        assert!((o2 - 250.0).abs() < 1e-12);
    }

    #[test]
    fn test_salinity_lowers_reading() {
        // Oxygen solubility falls with salinity, so the correction is < 1.
        let o2 = salinity_compensation(250.0, 10.0, 35.0, 0.0);
        assert!(o2 < 250.0);
        assert!(o2 > 200.0);
    }

    #[test]
    fn test_known_value() {
        let ts = scaled_temperature(10.0);
        let expected_factor = (35.0 * (B0 + B1 * ts + B2 * ts * ts + B3 * ts * ts * ts)
            + C0 * 35.0 * 35.0)
            .exp()
            * (1.0 + 0.032 * 100.0 / 1000.0);
        let o2 = compensate_oxygen(200.0, 10.0, 100.0, 35.0, 0.0);
        assert!((o2 - 200.0 * expected_factor).abs() < 1e-9);
    }

    #[test]
    fn test_reference_salinity_equal_to_sample_is_neutral() {
        let o2 = salinity_compensation(250.0, 8.0, 33.0, 33.0);
        assert!((o2 - 250.0).abs() < 1e-12);
    }

    #[test]
    fn test_monotonic_in_pressure() {
        let mut prev = f64::NEG_INFINITY;
        for i in 0..50 {
            let p = i as f64 * 10.0;
            let o2 = compensate_oxygen(240.0, 11.0, p, 31.0, 0.0);
            assert!(o2 > prev);
            prev = o2;
        }
    }

    #[test]
    fn test_out_of_range_temperature_is_nan() {
        assert!(compensate_oxygen(250.0, 300.0, 10.0, 30.0, 0.0).is_nan());
    }

    #[test]
    fn test_psu_to_reference_salinity() {
        assert!((psu_to_reference_salinity(35.0) - 35.16504).abs() < 1e-12);
    }
}
