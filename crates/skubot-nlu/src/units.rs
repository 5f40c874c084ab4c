//! Length unit conversion. All comparisons happen in millimeters; display
//! strings are dual-unit ("imperial [metric]").

/// Convert a value in the given unit to millimeters. The unit defaults to
/// feet when absent (cable lengths are quoted in feet more often than not);
/// an unrecognized unit is taken as already-millimeters.
pub fn to_millimeters(value: f64, unit: Option<&str>) -> f64 {
    match unit.unwrap_or("ft").to_lowercase().as_str() {
        "ft" | "feet" | "foot" => value * 304.8,
        "in" | "inch" | "inches" => value * 25.4,
        "cm" | "centimeter" | "centimeters" | "centimetre" | "centimetres" => value * 10.0,
        "m" | "meter" | "meters" | "metre" | "metres" => value * 1000.0,
        _ => value,
    }
}

fn trim_decimal(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// Render millimeters as a friendly dual-unit string. Short lengths read in
/// inches and centimeters, longer ones in feet and meters.
pub fn pretty_mm(mm: f64) -> String {
    if mm <= 300.0 {
        let inches = (mm / 25.4 * 10.0).round() / 10.0;
        let cm = (mm / 10.0).round() as i64;
        format!("{} in [{cm} cm]", trim_decimal(inches))
    } else {
        let feet = (mm / 304.8 * 10.0).round() / 10.0;
        let meters = (mm / 1000.0 * 10.0).round() / 10.0;
        format!("{} ft [{} m]", trim_decimal(feet), trim_decimal(meters))
    }
}

/// Matching window for a bare length mention: the larger of 25mm or 2%.
pub fn length_tolerance(mm: f64) -> f64 {
    25.0_f64.max(mm * 0.02)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_millimeters() {
        assert!((to_millimeters(3.0, Some("ft")) - 914.4).abs() < 1e-9);
        assert_eq!(to_millimeters(10.0, Some("in")), 254.0);
        assert_eq!(to_millimeters(30.0, Some("cm")), 300.0);
        assert_eq!(to_millimeters(2.0, Some("m")), 2000.0);
        // no unit defaults to feet
        assert_eq!(to_millimeters(1.0, None), 304.8);
        // unknown unit passes through as mm
        assert_eq!(to_millimeters(500.0, Some("furlongs")), 500.0);
    }

    #[test]
    fn test_pretty_mm_round_trip() {
        assert_eq!(pretty_mm(254.0), "10 in [25 cm]");
        assert_eq!(pretty_mm(1828.8), "6 ft [1.8 m]");
        assert_eq!(pretty_mm(1000.0), "3.3 ft [1 m]");
    }

    #[test]
    fn test_length_tolerance() {
        assert_eq!(length_tolerance(100.0), 25.0);
        assert_eq!(length_tolerance(2000.0), 40.0);
    }
}
