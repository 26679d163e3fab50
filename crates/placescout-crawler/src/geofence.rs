//! Point-in-region filter for decoded records.

use crate::error::{CrawlError, Result};
use placescout_core::LatLng;
use serde_json::Value;

/// One polygon ring set: an exterior boundary and optional holes.
///
/// Rings are lists of `LatLng` vertices; closing the ring is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Vec<LatLng>,
    pub holes: Vec<Vec<LatLng>>,
}

impl Polygon {
    pub fn new(exterior: Vec<LatLng>) -> Self {
        Self {
            exterior,
            holes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_hole(mut self, hole: Vec<LatLng>) -> Self {
        self.holes.push(hole);
        self
    }

    /// Inside the exterior and outside every hole.
    pub fn contains(&self, point: &LatLng) -> bool {
        ring_contains(&self.exterior, point) && !self.holes.iter().any(|h| ring_contains(h, point))
    }
}

/// A multi-polygon search region.
#[derive(Debug, Clone, PartialEq)]
pub struct Geofence {
    polygons: Vec<Polygon>,
}

impl Geofence {
    /// Build a geofence, rejecting polygons with fewer than three vertices.
    pub fn new(polygons: Vec<Polygon>) -> Result<Self> {
        if polygons.is_empty() {
            return Err(CrawlError::InvalidGeofence("no polygons".to_string()));
        }
        if let Some(bad) = polygons.iter().position(|p| p.exterior.len() < 3) {
            return Err(CrawlError::InvalidGeofence(format!(
                "polygon {bad} has fewer than 3 vertices"
            )));
        }
        Ok(Self { polygons })
    }

    /// Parse a GeoJSON `Polygon` or `MultiPolygon` geometry (or a `Feature`
    /// wrapping one). Positions are `[lng, lat]`.
    pub fn from_geojson(geojson: &Value) -> Result<Self> {
        let geometry = match geojson.get("type").and_then(Value::as_str) {
            Some("Feature") => geojson
                .get("geometry")
                .ok_or_else(|| invalid("feature without geometry"))?,
            _ => geojson,
        };
        let coordinates = geometry
            .get("coordinates")
            .ok_or_else(|| invalid("missing coordinates"))?;

        let polygons = match geometry.get("type").and_then(Value::as_str) {
            Some("Polygon") => vec![parse_polygon(coordinates)?],
            Some("MultiPolygon") => coordinates
                .as_array()
                .ok_or_else(|| invalid("MultiPolygon coordinates must be an array"))?
                .iter()
                .map(parse_polygon)
                .collect::<Result<Vec<_>>>()?,
            Some(other) => return Err(invalid(&format!("unsupported geometry type {other}"))),
            None => return Err(invalid("missing geometry type")),
        };
        Self::new(polygons)
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// True iff `point` lies within any constituent polygon.
    pub fn contains(&self, point: &LatLng) -> bool {
        self.polygons.iter().any(|p| p.contains(point))
    }
}

/// Geofence check that fails open: no geofence or no coordinates passes.
pub fn passes(geofence: Option<&Geofence>, coordinates: Option<&LatLng>) -> bool {
    match (geofence, coordinates) {
        (Some(fence), Some(point)) => fence.contains(point),
        _ => true,
    }
}

fn invalid(reason: &str) -> CrawlError {
    CrawlError::InvalidGeofence(reason.to_string())
}

fn parse_polygon(rings: &Value) -> Result<Polygon> {
    let rings = rings
        .as_array()
        .ok_or_else(|| invalid("polygon must be an array of rings"))?;
    let mut parsed = rings.iter().map(parse_ring);
    let exterior = parsed
        .next()
        .ok_or_else(|| invalid("polygon without exterior ring"))??;
    let holes = parsed.collect::<Result<Vec<_>>>()?;
    Ok(Polygon { exterior, holes })
}

fn parse_ring(ring: &Value) -> Result<Vec<LatLng>> {
    ring.as_array()
        .ok_or_else(|| invalid("ring must be an array of positions"))?
        .iter()
        .map(|position| {
            let lng = position.get(0).and_then(Value::as_f64);
            let lat = position.get(1).and_then(Value::as_f64);
            match (lat, lng) {
                (Some(lat), Some(lng)) => {
                    LatLng::new(lat, lng).map_err(|e| invalid(&e.to_string()))
                }
                _ => Err(invalid("position must be [lng, lat]")),
            }
        })
        .collect()
}

/// Even-odd ray casting with longitude as x and latitude as y.
fn ring_contains(ring: &[LatLng], point: &LatLng) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (&ring[i], &ring[j]);
        if (a.lat > point.lat) != (b.lat > point.lat)
            && point.lng < (b.lng - a.lng) * (point.lat - a.lat) / (b.lat - a.lat) + a.lng
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pt(lat: f64, lng: f64) -> LatLng {
        LatLng::new(lat, lng).unwrap()
    }

    fn square(min: f64, max: f64) -> Vec<LatLng> {
        vec![pt(min, min), pt(min, max), pt(max, max), pt(max, min)]
    }

    #[test]
    fn test_fail_open() {
        let fence = Geofence::new(vec![Polygon::new(square(0.0, 1.0))]).unwrap();
        assert!(passes(None, Some(&pt(50.0, 50.0))));
        assert!(passes(Some(&fence), None));
        assert!(passes(None, None));
    }

    #[test]
    fn test_point_in_polygon() {
        let fence = Geofence::new(vec![Polygon::new(square(0.0, 1.0))]).unwrap();
        assert!(passes(Some(&fence), Some(&pt(0.5, 0.5))));
        assert!(!passes(Some(&fence), Some(&pt(1.5, 0.5))));
        assert!(!passes(Some(&fence), Some(&pt(0.5, -0.1))));
    }

    #[test]
    fn test_any_polygon_matches() {
        let fence = Geofence::new(vec![
            Polygon::new(square(0.0, 1.0)),
            Polygon::new(square(10.0, 11.0)),
        ])
        .unwrap();
        assert!(fence.contains(&pt(10.5, 10.5)));
        assert!(!fence.contains(&pt(5.0, 5.0)));
    }

    #[test]
    fn test_hole_excluded() {
        let polygon = Polygon::new(square(0.0, 10.0)).with_hole(square(4.0, 6.0));
        let fence = Geofence::new(vec![polygon]).unwrap();
        assert!(fence.contains(&pt(2.0, 2.0)));
        assert!(!fence.contains(&pt(5.0, 5.0)));
    }

    #[test]
    fn test_rejects_degenerate_polygon() {
        assert!(Geofence::new(vec![]).is_err());
        assert!(Geofence::new(vec![Polygon::new(vec![pt(0.0, 0.0), pt(1.0, 1.0)])]).is_err());
    }

    #[test]
    fn test_from_geojson_polygon() {
        // Minneapolis-ish box, positions are [lng, lat]
        let geojson = json!({
            "type": "Polygon",
            "coordinates": [[[-93.4, 44.9], [-93.1, 44.9], [-93.1, 45.1], [-93.4, 45.1], [-93.4, 44.9]]]
        });
        let fence = Geofence::from_geojson(&geojson).unwrap();
        assert!(fence.contains(&pt(44.98, -93.27)));
        assert!(!fence.contains(&pt(44.95, -92.0)));
    }

    #[test]
    fn test_from_geojson_multipolygon_feature() {
        let geojson = json!({
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [
                    [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]],
                    [
                        [[10.0, 10.0], [20.0, 10.0], [20.0, 20.0], [10.0, 20.0]],
                        [[14.0, 14.0], [16.0, 14.0], [16.0, 16.0], [14.0, 16.0]]
                    ]
                ]
            }
        });
        let fence = Geofence::from_geojson(&geojson).unwrap();
        assert_eq!(fence.polygons().len(), 2);
        assert_eq!(fence.polygons()[1].holes.len(), 1);
        assert!(fence.contains(&pt(0.5, 0.5)));
        assert!(fence.contains(&pt(12.0, 12.0)));
        assert!(!fence.contains(&pt(15.0, 15.0)));
    }

    #[test]
    fn test_from_geojson_errors() {
        assert!(Geofence::from_geojson(&json!({"type": "Point", "coordinates": [1.0, 2.0]})).is_err());
        assert!(Geofence::from_geojson(&json!({"type": "Polygon"})).is_err());
        assert!(Geofence::from_geojson(&json!({"type": "Polygon", "coordinates": [[[0.0, 95.0]]]})).is_err());
    }
}
