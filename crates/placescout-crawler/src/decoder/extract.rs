//! Defensive positional field extraction from place-shaped arrays.
//!
//! Every read tolerates a missing or null slot by yielding `None`.

use placescout_core::{Address, CoordinateEncoding, LatLng, PlaceId, WireLayout};
use serde_json::Value;

/// Fields read from one candidate, before rank assignment.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlaceFields {
    pub id: Option<PlaceId>,
    pub title: Option<String>,
    pub coordinates: Option<LatLng>,
    pub address: Option<Address>,
    pub categories: Vec<String>,
    pub website: Option<String>,
}

/// Walk `path` through nested arrays. Null counts as absent.
pub(crate) fn value_at<'a>(root: &'a Value, path: &[usize]) -> Option<&'a Value> {
    let mut current = root;
    for &index in path {
        current = current.as_array()?.get(index)?;
    }
    (!current.is_null()).then_some(current)
}

fn text(value: Option<&Value>) -> Option<String> {
    let s = value?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Convert one coordinate component to degrees.
///
/// Floats are always degrees. Integers follow the layout's encoding.
pub(crate) fn degrees(value: &Value, layout: &WireLayout) -> Option<f64> {
    if let Some(fixed) = value.as_i64() {
        #[allow(clippy::cast_precision_loss)]
        let fixed = fixed as f64;
        return Some(match layout.coordinate_encoding {
            CoordinateEncoding::FixedPoint => fixed / layout.coordinate_scale,
            CoordinateEncoding::Degrees => fixed,
        });
    }
    value.as_f64()
}

pub(crate) fn extract_fields(candidate: &[Value], layout: &WireLayout) -> PlaceFields {
    PlaceFields {
        id: extract_id(candidate, layout),
        title: text(candidate.get(layout.title_slot)),
        coordinates: extract_coordinates(candidate, layout),
        address: extract_address(candidate, layout),
        categories: extract_categories(candidate, layout),
        website: extract_website(candidate, layout),
    }
}

fn extract_id(candidate: &[Value], layout: &WireLayout) -> Option<PlaceId> {
    layout
        .id_slots
        .iter()
        .filter_map(|&slot| text(candidate.get(slot)))
        .find_map(|raw| PlaceId::new(raw).ok())
}

fn extract_coordinates(candidate: &[Value], layout: &WireLayout) -> Option<LatLng> {
    let block = candidate.get(layout.coordinate_slot)?.as_array()?;
    let lat = degrees(block.get(layout.lat_index)?, layout)?;
    let lng = degrees(block.get(layout.lng_index)?, layout)?;
    match LatLng::new(lat, lng) {
        Ok(coordinates) => Some(coordinates),
        Err(e) => {
            tracing::debug!(error = %e, "discarding out-of-range coordinates");
            None
        }
    }
}

fn extract_categories(candidate: &[Value], layout: &WireLayout) -> Vec<String> {
    match candidate.get(layout.category_slot) {
        Some(Value::Array(items)) => items.iter().filter_map(|v| text(Some(v))).collect(),
        Some(single @ Value::String(_)) => text(Some(single)).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn extract_website(candidate: &[Value], layout: &WireLayout) -> Option<String> {
    let (&first, rest) = layout.website_path.split_first()?;
    let raw = text(value_at(candidate.get(first)?, rest))?;
    Some(unwrap_redirect(&raw))
}

/// Producer redirect links look like `/url?q=<target>&...`.
fn unwrap_redirect(raw: &str) -> String {
    raw.strip_prefix("/url?q=")
        .and_then(|rest| rest.split('&').next())
        .filter(|target| !target.is_empty())
        .unwrap_or(raw)
        .to_string()
}

fn extract_address(candidate: &[Value], layout: &WireLayout) -> Option<Address> {
    let (&first, rest) = layout.address_path.split_first()?;
    let block = value_at(candidate.get(first)?, rest)?;
    let offsets = &layout.address_offsets;
    let field = |offset: usize| text(block.as_array()?.get(offset));

    let address = Address {
        neighborhood: field(offsets.neighborhood),
        street: field(offsets.street),
        city: field(offsets.city),
        postal_code: field(offsets.postal_code),
        state: field(offsets.state),
        country_code: field(offsets.country_code),
    };
    (!address.is_empty()).then_some(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blank(len: usize) -> Vec<Value> {
        vec![Value::Null; len]
    }

    #[test]
    fn test_value_at_tolerates_short_arrays() {
        let root = json!([[1, [2, null]]]);
        assert_eq!(value_at(&root, &[0, 1, 0]), Some(&json!(2)));
        assert_eq!(value_at(&root, &[0, 1, 1]), None);
        assert_eq!(value_at(&root, &[0, 5]), None);
        assert_eq!(value_at(&root, &[0, 0, 0]), None);
    }

    #[test]
    fn test_degrees_scale_correction() {
        let layout = WireLayout::default();
        assert_eq!(degrees(&json!(449_778_000), &layout), Some(44.9778));
        assert_eq!(degrees(&json!(-932_650_000), &layout), Some(-93.265));
        assert_eq!(degrees(&json!(44.9778), &layout), Some(44.9778));
        assert_eq!(degrees(&json!("45"), &layout), None);
    }

    #[test]
    fn test_degrees_near_null_island() {
        let layout = WireLayout::default();
        // a few metres from the prime meridian
        assert_eq!(degrees(&json!(150), &layout), Some(0.000_015));
        assert_eq!(degrees(&json!(-90), &layout), Some(-0.000_009));

        let whole = WireLayout {
            coordinate_encoding: CoordinateEncoding::Degrees,
            ..WireLayout::default()
        };
        assert_eq!(degrees(&json!(45), &whole), Some(45.0));
    }

    #[test]
    fn test_extract_full_candidate() {
        let layout = WireLayout::default();
        let mut candidate = blank(190);
        candidate[7] = json!(["/url?q=https://joes.example/&opi=1", "joes.example"]);
        candidate[9] = json!([null, null, 449_778_000, -932_650_000]);
        candidate[10] = json!("0x52b333:0x1a2b");
        candidate[11] = json!("Joe's Pizza");
        candidate[13] = json!(["Pizza restaurant", "", 12]);
        candidate[78] = json!("ChIJjoes");
        candidate[183] = json!([null, [null, "Loring Park", "1 Main St", "Minneapolis", "55401", "MN", "US"]]);

        let fields = extract_fields(&candidate, &layout);
        assert_eq!(fields.id.expect("id extracted").as_str(), "ChIJjoes");
        assert_eq!(fields.title.as_deref(), Some("Joe's Pizza"));
        let coordinates = fields.coordinates.expect("coordinates extracted");
        assert!((coordinates.lat - 44.9778).abs() < 1e-9);
        assert!((coordinates.lng + 93.265).abs() < 1e-9);
        assert_eq!(fields.categories, vec!["Pizza restaurant".to_string()]);
        assert_eq!(fields.website.as_deref(), Some("https://joes.example/"));
        let address = fields.address.expect("address extracted");
        assert_eq!(address.city.as_deref(), Some("Minneapolis"));
        assert_eq!(address.country_code.as_deref(), Some("US"));
    }

    #[test]
    fn test_extract_falls_back_to_secondary_id_slot() {
        let layout = WireLayout::default();
        let mut candidate = blank(40);
        candidate[9] = json!([null, null]);
        candidate[10] = json!("0x52b333:0x1a2b");

        let fields = extract_fields(&candidate, &layout);
        assert_eq!(fields.id.expect("fallback id").as_str(), "0x52b333:0x1a2b");
        assert_eq!(fields.coordinates, None);
        assert_eq!(fields.address, None);
        assert!(fields.categories.is_empty());
    }

    #[test]
    fn test_extract_missing_everything() {
        let layout = WireLayout::default();
        let fields = extract_fields(&blank(5), &layout);
        assert_eq!(fields.id, None);
        assert_eq!(fields.title, None);
        assert_eq!(fields.website, None);
    }

    #[test]
    fn test_out_of_range_coordinates_dropped() {
        let layout = WireLayout::default();
        let mut candidate = blank(40);
        candidate[9] = json!([null, null, 95.0, 10.0]);
        assert_eq!(extract_fields(&candidate, &layout).coordinates, None);
    }
}
