//! City identifiers and their coordinates

use crate::models::{City, Coordinates};

/// Translates a city identifier into coordinates
pub trait Gazetteer: Send + Sync {
    /// Resolve a `name,country` key or a city name, case-insensitively
    fn lookup(&self, city: &str) -> Option<City>;

    /// Every known city, ordered by key
    fn all(&self) -> Vec<City>;

    /// Search by two-letter country code, exact `name,country` key or a
    /// fragment of the city name. Results are ordered by name.
    fn search(&self, query: &str, limit: usize) -> Vec<City> {
        let query = query.trim().to_lowercase();
        let mut results: Vec<City> = if query.len() == 2 {
            self.all()
                .into_iter()
                .filter(|c| c.country.eq_ignore_ascii_case(&query))
                .collect()
        } else if query.contains(',') {
            self.lookup(&query).into_iter().collect()
        } else {
            self.all()
                .into_iter()
                .filter(|c| c.name.to_lowercase().contains(&query))
                .collect()
        };
        results.sort_by(|a, b| a.name.cmp(&b.name));
        results.truncate(limit);
        results
    }
}

// (key, name, country, lat, lon)
const CITIES: &[(&str, &str, &str, f64, f64)] = &[
    ("london,gb", "London", "GB", 51.5074, -0.1278),
    ("paris,fr", "Paris", "FR", 48.8566, 2.3522),
    ("new york,us", "New York", "US", 40.7128, -74.006),
    ("tokyo,jp", "Tokyo", "JP", 35.6762, 139.6503),
    ("sydney,au", "Sydney", "AU", -33.8688, 151.2093),
    ("dubai,ae", "Dubai", "AE", 25.2048, 55.2708),
    ("singapore,sg", "Singapore", "SG", 1.3521, 103.8198),
    ("mumbai,in", "Mumbai", "IN", 19.076, 72.8777),
    ("istanbul,tr", "Istanbul", "TR", 41.0082, 28.9784),
    ("moscow,ru", "Moscow", "RU", 55.7558, 37.6173),
    ("berlin,de", "Berlin", "DE", 52.52, 13.405),
    ("rome,it", "Rome", "IT", 41.9028, 12.4964),
    ("beijing,cn", "Beijing", "CN", 39.9042, 116.4074),
    ("shanghai,cn", "Shanghai", "CN", 31.2304, 121.4737),
    ("sao paulo,br", "São Paulo", "BR", -23.5505, -46.6333),
    ("mexico city,mx", "Mexico City", "MX", 19.4326, -99.1332),
    ("los angeles,us", "Los Angeles", "US", 34.0522, -118.2437),
    ("chicago,us", "Chicago", "US", 41.8781, -87.6298),
    ("toronto,ca", "Toronto", "CA", 43.6532, -79.3832),
    ("cairo,eg", "Cairo", "EG", 30.0444, 31.2357),
    ("johannesburg,za", "Johannesburg", "ZA", -26.2041, 28.0473),
    ("seoul,kr", "Seoul", "KR", 37.5665, 126.978),
    ("bangkok,th", "Bangkok", "TH", 13.7563, 100.5018),
    ("amsterdam,nl", "Amsterdam", "NL", 52.3676, 4.9041),
    ("vienna,at", "Vienna", "AT", 48.2082, 16.3738),
    ("madrid,es", "Madrid", "ES", 40.4168, -3.7038),
    ("barcelona,es", "Barcelona", "ES", 41.3851, 2.1734),
    ("milan,it", "Milan", "IT", 45.4642, 9.19),
    ("munich,de", "Munich", "DE", 48.1351, 11.582),
    ("hamburg,de", "Hamburg", "DE", 53.5511, 9.9937),
    ("frankfurt,de", "Frankfurt", "DE", 50.1109, 8.6821),
    ("warsaw,pl", "Warsaw", "PL", 52.2297, 21.0122),
    ("krakow,pl", "Kraków", "PL", 50.0647, 19.945),
    ("prague,cz", "Prague", "CZ", 50.0755, 14.4378),
    ("budapest,hu", "Budapest", "HU", 47.4979, 19.0402),
    ("stockholm,se", "Stockholm", "SE", 59.3293, 18.0686),
    ("oslo,no", "Oslo", "NO", 59.9139, 10.7522),
    ("copenhagen,dk", "Copenhagen", "DK", 55.6761, 12.5683),
    ("dublin,ie", "Dublin", "IE", 53.3498, -6.2603),
    ("brussels,be", "Brussels", "BE", 50.8503, 4.3517),
    ("lisbon,pt", "Lisbon", "PT", 38.7223, -9.1393),
    ("athens,gr", "Athens", "GR", 37.9838, 23.7275),
    ("bucharest,ro", "Bucharest", "RO", 44.4268, 26.1025),
    ("helsinki,fi", "Helsinki", "FI", 60.1699, 24.9384),
    ("zurich,ch", "Zurich", "CH", 47.3769, 8.5417),
    ("geneva,ch", "Geneva", "CH", 46.2044, 6.1432),
    ("wroclaw,pl", "Wrocław", "PL", 51.1079, 17.0385),
    ("poznan,pl", "Poznań", "PL", 52.4064, 16.9252),
    ("gdansk,pl", "Gdańsk", "PL", 54.352, 18.6466),
    ("szczecin,pl", "Szczecin", "PL", 53.4285, 14.5528),
    ("lodz,pl", "Łódź", "PL", 51.7592, 19.4559),
    ("lublin,pl", "Lublin", "PL", 51.2465, 22.5684),
    ("katowice,pl", "Katowice", "PL", 50.2649, 19.0238),
    ("bialystok,pl", "Białystok", "PL", 53.1325, 23.1688),
    ("gdynia,pl", "Gdynia", "PL", 54.5189, 18.5305),
    ("czestochowa,pl", "Częstochowa", "PL", 50.8118, 19.1203),
];

/// Built-in table of major world and Polish cities
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticGazetteer;

fn to_city(&(key, name, country, lat, lon): &(&str, &str, &str, f64, f64)) -> City {
    City {
        key: key.to_string(),
        name: name.to_string(),
        country: country.to_string(),
        coordinates: Coordinates::new(lat, lon),
    }
}

impl Gazetteer for StaticGazetteer {
    fn lookup(&self, city: &str) -> Option<City> {
        let wanted = city.trim().to_lowercase();
        CITIES
            .iter()
            .find(|(key, ..)| *key == wanted)
            .or_else(|| {
                CITIES
                    .iter()
                    .find(|(_, name, ..)| name.to_lowercase() == wanted)
            })
            .map(to_city)
    }

    fn all(&self) -> Vec<City> {
        let mut cities: Vec<City> = CITIES.iter().map(to_city).collect();
        cities.sort_by(|a, b| a.key.cmp(&b.key));
        cities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("london,gb", "london,gb")]
    #[case("  London,GB ", "london,gb")]
    #[case("Lublin", "lublin,pl")]
    #[case("new york", "new york,us")]
    #[case("kraków", "krakow,pl")]
    fn test_lookup(#[case] input: &str, #[case] expected_key: &str) {
        let city = StaticGazetteer.lookup(input).unwrap();
        assert_eq!(city.key, expected_key);
    }

    #[test]
    fn test_unknown_city() {
        assert!(StaticGazetteer.lookup("atlantis,xx").is_none());
    }

    #[test]
    fn test_keys_are_lowercase_and_unique() {
        let cities = StaticGazetteer.all();
        let mut keys: Vec<&str> = cities.iter().map(|c| c.key.as_str()).collect();
        assert!(keys.iter().all(|k| *k == k.to_lowercase()));
        keys.dedup();
        assert_eq!(keys.len(), CITIES.len());
    }

    #[test]
    fn test_search_by_country_code() {
        let results = StaticGazetteer.search("pl", 100);
        assert!(results.len() >= 10);
        assert!(results.iter().all(|c| c.country == "PL"));
        assert!(results.windows(2).all(|w| w[0].name <= w[1].name));
    }

    #[test]
    fn test_search_by_name_fragment() {
        let results = StaticGazetteer.search("burg", 10);
        let keys: Vec<&str> = results.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, ["hamburg,de", "johannesburg,za"]);
        assert_eq!(StaticGazetteer.search("burg", 1).len(), 1);
    }
}
