//! The crawl route: twelve fixed stops, each with a house rule.
//!
//! A [`Route`] is immutable once built. The stop ordinal is its index in the
//! route, so nothing stores it separately.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ValidationError;

/// Number of stops on every route.
pub const ROUTE_LEN: usize = 12;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// One waypoint on the crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rule: String,
}

impl Stop {
    pub fn new(name: &str, latitude: f64, longitude: f64, rule: &str) -> Self {
        Self {
            name: name.to_string(),
            latitude,
            longitude,
            rule: rule.to_string(),
        }
    }

    /// Great-circle distance to another stop.
    pub fn distance_km(&self, other: &Stop) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// An ordered, fixed-length sequence of stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    stops: Vec<Stop>,
}

impl Route {
    /// Build a route, rejecting anything but exactly [`ROUTE_LEN`] uniquely named stops.
    pub fn new(stops: Vec<Stop>) -> Result<Self, ValidationError> {
        if stops.len() != ROUTE_LEN {
            return Err(ValidationError::InvalidRoute(format!(
                "expected {ROUTE_LEN} stops, got {}",
                stops.len()
            )));
        }
        for (i, stop) in stops.iter().enumerate() {
            if stop.name.trim().is_empty() {
                return Err(ValidationError::InvalidRoute(format!("stop {i} has no name")));
            }
            if stops[..i].iter().any(|s| s.name == stop.name) {
                return Err(ValidationError::InvalidRoute(format!(
                    "duplicate stop name '{}'",
                    stop.name
                )));
            }
        }
        Ok(Self { stops })
    }

    /// The Belfast "12 pubs of Christmas" route.
    pub fn belfast() -> Self {
        let stops = vec![
            Stop::new("Lavery's", 54.589539, -5.934469, "Christmas Jumpers Required"),
            Stop::new("The Points", 54.591556, -5.933333, "Last Names Only"),
            Stop::new("Sweet Afton", 54.595067, -5.932894, "No Swearing Challenge"),
            Stop::new(
                "Kelly's Cellars",
                54.599553,
                -5.932236,
                "Power Hour (Down Drink in 2-3 Gulps)",
            ),
            Stop::new(
                "Whites Tavern",
                54.600033,
                -5.928497,
                "No Phones & Drink with Left Hand Only",
            ),
            Stop::new("The Deer's Head", 54.601439, -5.930294, "Must Speak in Different Accents"),
            Stop::new("The John Hewitt", 54.601928, -5.928617, "Different Drink Type Required"),
            Stop::new("Duke of York", 54.601803, -5.927442, "Must Bow Before Taking a Drink"),
            Stop::new("The Harp Bar", 54.602000, -5.927058, "Double Parked"),
            Stop::new(
                "The Dirty Onion",
                54.601556,
                -5.926673,
                "The Arm Pub - Drink from Someone Else's Arm",
            ),
            Stop::new("Thirsty Goat", 54.601308, -5.926417, "No First Names & Photo Challenge"),
            Stop::new(
                "Ulster Sports Club",
                54.600733,
                -5.925219,
                "Buddy System - Final Challenge",
            ),
        ];
        Self { stops }
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn stop(&self, index: usize) -> Option<&Stop> {
        self.stops.get(index)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stops.iter().map(|s| s.name.as_str())
    }

    /// Walking length of the route, stop to stop.
    pub fn total_distance_km(&self) -> f64 {
        self.stops
            .windows(2)
            .map(|pair| pair[0].distance_km(&pair[1]))
            .sum()
    }

    /// Mean position of all stops, used to centre a map.
    pub fn centre(&self) -> (f64, f64) {
        let n = self.stops.len().max(1) as f64;
        let lat = self.stops.iter().map(|s| s.latitude).sum::<f64>() / n;
        let lon = self.stops.iter().map(|s| s.longitude).sum::<f64>() / n;
        (lat, lon)
    }

    /// GeoJSON rendering of the route: a Point per stop plus the connecting line.
    ///
    /// `completed` marks which stops a participant has ticked off.
    pub fn geojson(&self, completed: &[String]) -> Value {
        let mut features: Vec<Value> = self
            .stops
            .iter()
            .enumerate()
            .map(|(i, stop)| {
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Point",
                        "coordinates": [stop.longitude, stop.latitude],
                    },
                    "properties": {
                        "order": i + 1,
                        "name": stop.name,
                        "rule": stop.rule,
                        "completed": completed.iter().any(|c| c == &stop.name),
                    },
                })
            })
            .collect();

        let line: Vec<Value> = self
            .stops
            .iter()
            .map(|s| json!([s.longitude, s.latitude]))
            .collect();
        features.push(json!({
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": line },
            "properties": { "name": "route" },
        }));

        json!({ "type": "FeatureCollection", "features": features })
    }
}

impl Default for Route {
    fn default() -> Self {
        Self::belfast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn belfast_route_has_twelve_unique_stops() {
        let route = Route::belfast();
        assert_eq!(route.len(), ROUTE_LEN);
        assert!(Route::new(route.stops().to_vec()).is_ok());
        assert_eq!(route.stop(0).unwrap().name, "Lavery's");
        assert_eq!(route.stop(11).unwrap().name, "Ulster Sports Club");
        assert!(route.stop(12).is_none());
    }

    #[test]
    fn new_rejects_wrong_length() {
        let stops = Route::belfast().stops()[..11].to_vec();
        assert!(matches!(Route::new(stops), Err(ValidationError::InvalidRoute(_))));
    }

    #[test]
    fn new_rejects_duplicate_names() {
        let mut stops = Route::belfast().stops().to_vec();
        stops[5].name = "Lavery's".to_string();
        assert!(Route::new(stops).is_err());
    }

    #[test]
    fn route_is_roughly_two_and_a_half_km() {
        let km = Route::belfast().total_distance_km();
        assert!(km > 1.5 && km < 3.5, "unexpected route length {km}");
    }

    #[test]
    fn geojson_marks_completed_stops() {
        let route = Route::belfast();
        let geo = route.geojson(&["Lavery's".to_string()]);
        let features = geo["features"].as_array().unwrap();
        assert_eq!(features.len(), ROUTE_LEN + 1);
        assert_eq!(features[0]["properties"]["completed"], true);
        assert_eq!(features[1]["properties"]["completed"], false);
        assert_eq!(features[ROUTE_LEN]["geometry"]["type"], "LineString");
    }
}
