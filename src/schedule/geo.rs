//! Geo-fence parsing and containment
//!
//! Geo-aware layouts carry a `"lat,lng[,radiusMeters]"` string; the fence
//! admits the player when its reported coordinates fall within the radius
//! (great-circle distance). An unknown player location admits the layout.

/// Default fence radius when the CMS omits one.
const DEFAULT_RADIUS_M: f64 = 500.0;

/// Mean Earth radius, meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A circular geo fence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFence {
    pub lat: f64,
    pub lng: f64,
    pub radius_m: f64,
}

impl GeoFence {
    /// Parse `"lat,lng[,radiusMeters]"`; `None` on malformed input.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(',').map(str::trim);
        let lat = parts.next()?.parse::<f64>().ok()?;
        let lng = parts.next()?.parse::<f64>().ok()?;
        let radius_m = match parts.next() {
            Some(r) => r.parse::<f64>().ok().filter(|r| *r > 0.0)?,
            None => DEFAULT_RADIUS_M,
        };
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return None;
        }
        Some(Self { lat, lng, radius_m })
    }

    /// Whether a point lies inside the fence.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        haversine_m(self.lat, self.lng, lat, lng) <= self.radius_m
    }
}

/// Great-circle distance between two coordinates, meters.
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}
