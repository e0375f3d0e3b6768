//! Geographic coordinates and gazetteer entries

use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal-degree position of a city
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// A gazetteer entry
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct City {
    /// Lowercase `name,country` identifier, e.g. `london,gb`
    pub key: String,
    pub name: String,
    /// ISO 3166-1 alpha-2, upper case
    pub country: String,
    pub coordinates: Coordinates,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_display() {
        let coordinates = Coordinates::new(52.2297, -0.127_756);
        assert_eq!(coordinates.to_string(), "52.2297, -0.1278");
    }
}
