//! Unit conversion between the three supported unit systems.
//!
//! Everything that is cached or persisted is stored in the canonical
//! ("standard") system: temperature in Kelvin, wind speed in m/s. Values are
//! converted only at the boundaries of the cache and historical tiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WeatherError;

const KELVIN_OFFSET: f64 = 273.15;
const MPS_PER_MPH: f64 = 2.237;

/// Unit system of a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Kelvin, m/s
    #[default]
    Standard,
    /// Celsius, m/s
    Metric,
    /// Fahrenheit, mph
    Imperial,
}

impl Units {
    pub const CANONICAL: Units = Units::Standard;

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Units::Standard => "standard",
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    #[must_use]
    pub fn is_canonical(self) -> bool {
        self == Self::CANONICAL
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Units::Standard),
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            other => Err(WeatherError::validation_with_code(
                "INVALID_UNITS",
                format!("Unknown unit system '{other}'. Must be one of: standard, metric, imperial"),
            )),
        }
    }
}

/// Physical quantity being converted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Temperature,
    WindSpeed,
}

/// Round to two decimal places
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn raw_to_canonical(value: f64, from: Units, quantity: Quantity) -> f64 {
    match (quantity, from) {
        (_, Units::Standard) => value,
        (Quantity::Temperature, Units::Metric) => value + KELVIN_OFFSET,
        (Quantity::Temperature, Units::Imperial) => (value - 32.0) * 5.0 / 9.0 + KELVIN_OFFSET,
        (Quantity::WindSpeed, Units::Metric) => value,
        (Quantity::WindSpeed, Units::Imperial) => value / MPS_PER_MPH,
    }
}

fn raw_from_canonical(value: f64, to: Units, quantity: Quantity) -> f64 {
    match (quantity, to) {
        (_, Units::Standard) => value,
        (Quantity::Temperature, Units::Metric) => value - KELVIN_OFFSET,
        (Quantity::Temperature, Units::Imperial) => (value - KELVIN_OFFSET) * 9.0 / 5.0 + 32.0,
        (Quantity::WindSpeed, Units::Metric) => value,
        (Quantity::WindSpeed, Units::Imperial) => value * MPS_PER_MPH,
    }
}

/// Convert a value expressed in `from` into canonical units.
#[must_use]
pub fn to_canonical(value: f64, from: Units, quantity: Quantity) -> f64 {
    if from.is_canonical() {
        return value;
    }
    round2(raw_to_canonical(value, from, quantity))
}

/// Convert a canonical value into `to`.
#[must_use]
pub fn from_canonical(value: f64, to: Units, quantity: Quantity) -> f64 {
    if to.is_canonical() {
        return value;
    }
    round2(raw_from_canonical(value, to, quantity))
}

/// Convert between two arbitrary unit systems, rounding once at the end.
/// Converting to the same system returns the value untouched.
#[must_use]
pub fn convert(value: f64, from: Units, to: Units, quantity: Quantity) -> f64 {
    if from == to {
        return value;
    }
    round2(raw_from_canonical(
        raw_to_canonical(value, from, quantity),
        to,
        quantity,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const TOLERANCE: f64 = 0.01 + 1e-9;

    #[rstest]
    #[case(0.0, Units::Metric, 273.15)]
    #[case(20.0, Units::Metric, 293.15)]
    #[case(32.0, Units::Imperial, 273.15)]
    #[case(212.0, Units::Imperial, 373.15)]
    #[case(280.5, Units::Standard, 280.5)]
    fn test_temperature_to_canonical(#[case] value: f64, #[case] from: Units, #[case] expected: f64) {
        let got = to_canonical(value, from, Quantity::Temperature);
        assert!((got - expected).abs() < 1e-9, "{got} != {expected}");
    }

    #[rstest]
    #[case(10.0, Units::Metric, 10.0)]
    #[case(10.0, Units::Imperial, 22.37)]
    #[case(10.0, Units::Standard, 10.0)]
    fn test_wind_from_canonical(#[case] value: f64, #[case] to: Units, #[case] expected: f64) {
        let got = from_canonical(value, to, Quantity::WindSpeed);
        assert!((got - expected).abs() < 1e-9, "{got} != {expected}");
    }

    #[test]
    fn test_kelvin_to_fahrenheit_composes_through_celsius() {
        let f = from_canonical(300.0, Units::Imperial, Quantity::Temperature);
        assert!((f - 80.33).abs() < 1e-9);
    }

    #[rstest]
    fn test_identity_conversion(
        #[values(Units::Standard, Units::Metric, Units::Imperial)] units: Units,
        #[values(Quantity::Temperature, Quantity::WindSpeed)] quantity: Quantity,
    ) {
        let value = 12.345_678;
        assert_eq!(convert(value, units, units, quantity), value);
    }

    #[rstest]
    fn test_round_trip_within_tolerance(
        #[values(Units::Standard, Units::Metric, Units::Imperial)] a: Units,
        #[values(Units::Standard, Units::Metric, Units::Imperial)] b: Units,
        #[values(Quantity::Temperature, Quantity::WindSpeed)] quantity: Quantity,
    ) {
        for value in [-40.0, -12.37, 0.0, 0.01, 3.5, 18.04, 50.01, 99.99, 291.17] {
            let there = from_canonical(to_canonical(value, a, quantity), b, quantity);
            let back = convert(there, b, a, quantity);
            assert!(
                (back - value).abs() <= TOLERANCE,
                "{value} {a}->{b}->{a} gave {back}"
            );
        }
    }

    #[test]
    fn test_units_parse() {
        assert_eq!("Metric".parse::<Units>().unwrap(), Units::Metric);
        assert_eq!("imperial".parse::<Units>().unwrap(), Units::Imperial);
        assert!("kelvin".parse::<Units>().is_err());
    }
}
