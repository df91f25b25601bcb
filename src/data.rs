use crate::config::JoinConfig;
use crate::types::{Facility, PumaArea};
use anyhow::{anyhow, Context, Result};
use geo::{MultiPolygon, Point};
use geojson::GeoJson;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Facility rows as the open-data endpoint returns them: every field is a
/// string, coordinates included.
#[derive(Debug, Deserialize)]
pub struct RawFacility {
    #[serde(default)]
    pub facility_name: String,
    #[serde(default, alias = "address1")]
    pub address: String,
    #[serde(default, alias = "facility_county")]
    pub borough: String,
    #[serde(default, alias = "operator_name")]
    pub system: String,
    #[serde(default)]
    pub latitude: String,
    #[serde(default)]
    pub longitude: String,
}

// Plausibility window for the NYC extract. The upstream feed carries a handful
// of ungeocoded rows at (0, 0) plus a few landing in other states entirely;
// anything outside this window is dropped rather than corrected. Tuned against
// the observed bad rows, not a general validation rule.
pub const MIN_LATITUDE: f64 = 39.0;
pub const MAX_LATITUDE: f64 = 45.0;
pub const MIN_LONGITUDE: f64 = -80.0;
pub const MAX_LONGITUDE: f64 = -70.0;

pub fn parse_facilities(json: &str) -> Result<Vec<RawFacility>> {
    serde_json::from_str(json).context("Failed to parse facility listing JSON")
}

/// Convert the textual coordinates and drop rows that are unparsable, zeroed,
/// or outside the plausibility window.
pub fn clean_facilities(raw: Vec<RawFacility>) -> Vec<Facility> {
    let total = raw.len();
    let mut kept = Vec::new();

    for row in raw {
        let lat = match row.latitude.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => continue,
        };
        let lon = match row.longitude.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => continue,
        };
        if lat == 0.0 || lon == 0.0 {
            continue;
        }
        if !(MIN_LATITUDE..=MAX_LATITUDE).contains(&lat) {
            continue;
        }
        if !(MIN_LONGITUDE..=MAX_LONGITUDE).contains(&lon) {
            continue;
        }

        kept.push(Facility {
            name: row.facility_name,
            address: row.address,
            borough: row.borough,
            system: row.system,
            location: Point::new(lon, lat),
        });
    }

    println!("Cleaned facilities: kept {} of {} rows", kept.len(), total);
    kept
}

/// Canonical form of an area identifier. The feeds disagree on how they spell
/// a PUMA id ("3701", "03701", 3701, "3701.0"), so reduce to bare digits
/// before any key comparison.
pub fn normalize_area_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    let stripped = trimmed.trim_start_matches('0');
    if stripped.is_empty() && !trimmed.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

pub fn load_puma_geojson(raw: &str, join: &JoinConfig) -> Result<Vec<PumaArea>> {
    let geojson: GeoJson = raw.parse().context("Failed to parse PUMA GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("PUMA GeoJSON must be a FeatureCollection")),
    };

    let mut areas = Vec::new();

    for feature in collection.features {
        let id_val = feature
            .properties
            .as_ref()
            .and_then(|props| props.get(&join.id_property));

        let id = match id_val {
            Some(serde_json::Value::String(s)) => normalize_area_id(s),
            Some(serde_json::Value::Number(n)) => normalize_area_id(&n.to_string()),
            _ => continue, // Skip features without a usable id
        };

        let name = join
            .name_property
            .as_ref()
            .and_then(|key| feature.properties.as_ref().and_then(|props| props.get(key)))
            .and_then(|v| v.as_str().map(|s| s.trim().to_string()))
            .unwrap_or_else(|| format!("PUMA {}", id));

        let geometry = match feature.geometry {
            Some(geom) => {
                let valid_geo: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geojson geometry: {:?}", e))?;
                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // Skip points/lines
                }
            }
            None => continue,
        };

        areas.push(PumaArea {
            id,
            name,
            geometry,
            broadband_pct: None,
            median_income: None,
        });
    }

    Ok(areas)
}

pub fn load_puma_shapefile(path: &Path, join: &JoinConfig) -> Result<Vec<PumaArea>> {
    let mut reader = shapefile::Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {:?}", path))?;

    let mut areas = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let id_value = record
            .get(&join.id_field)
            .ok_or_else(|| anyhow!("Id field '{}' not found in shapefile", join.id_field))?;

        let id = match id_value {
            shapefile::dbase::FieldValue::Character(Some(s)) => normalize_area_id(s),
            shapefile::dbase::FieldValue::Numeric(Some(n)) => normalize_area_id(&n.to_string()),
            shapefile::dbase::FieldValue::Character(None)
            | shapefile::dbase::FieldValue::Numeric(None) => continue,
            _ => return Err(anyhow!("Shapefile id field must be character or numeric")),
        };

        let name = match join
            .name_property
            .as_ref()
            .and_then(|field| record.get(field))
        {
            Some(shapefile::dbase::FieldValue::Character(Some(s))) => s.trim().to_string(),
            _ => format!("PUMA {}", id),
        };

        let geometry = match shape {
            shapefile::Shape::Polygon(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?;
                geo_polygon
            }
            shapefile::Shape::PolygonM(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?;
                geo_polygon
            }
            shapefile::Shape::PolygonZ(polygon) => {
                let geo_polygon: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?;
                geo_polygon
            }
            _ => continue, // Skip non-polygon shapes
        };

        areas.push(PumaArea {
            id,
            name,
            geometry,
            broadband_pct: None,
            median_income: None,
        });
    }

    Ok(areas)
}

/// Parse an attribute feed (id column + value column) into a map keyed by
/// canonical area id. Rows with an empty id or an unparsable value are
/// skipped; duplicate ids keep the last row, plain left-join semantics.
pub fn parse_attribute_csv(
    raw: &[u8],
    id_column: &str,
    value_column: &str,
) -> Result<HashMap<String, f64>> {
    let mut rdr = csv::ReaderBuilder::new().from_reader(raw);
    let headers = rdr.headers()?.clone();

    let id_idx = headers
        .iter()
        .position(|h| h == id_column)
        .ok_or_else(|| anyhow!("Column '{}' not found in attribute table", id_column))?;
    let value_idx = headers
        .iter()
        .position(|h| h == value_column)
        .ok_or_else(|| anyhow!("Column '{}' not found in attribute table", value_column))?;

    let mut map = HashMap::new();

    for result in rdr.records() {
        let record = result?;
        let id = normalize_area_id(record.get(id_idx).unwrap_or(""));
        if id.is_empty() {
            continue;
        }
        let value = match parse_numeric(record.get(value_idx).unwrap_or("")) {
            Some(v) => v,
            None => continue,
        };
        map.insert(id, value);
    }

    Ok(map)
}

/// Strip the formatting the feeds actually use ("$68,302", "78.1%") before
/// parsing.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let cleaned = raw
        .trim()
        .trim_start_matches('$')
        .trim_end_matches('%')
        .replace(',', "");
    cleaned.parse().ok()
}

/// Left-join the attribute maps onto the areas by canonical id. Unmatched
/// areas get `None`. The adoption feed reports fractions of households, so
/// values at or below 1 are scaled to percent.
pub fn join_attributes(
    areas: &mut [PumaArea],
    broadband: &HashMap<String, f64>,
    income: &HashMap<String, f64>,
) {
    let mut matched_broadband = 0;
    let mut matched_income = 0;

    for area in areas.iter_mut() {
        area.broadband_pct = broadband
            .get(&area.id)
            .map(|&v| if v <= 1.0 { v * 100.0 } else { v });
        if area.broadband_pct.is_some() {
            matched_broadband += 1;
        }

        area.median_income = income.get(&area.id).copied();
        if area.median_income.is_some() {
            matched_income += 1;
        }
    }

    println!(
        "Joined attributes: broadband {}/{} areas, income {}/{} areas",
        matched_broadband,
        areas.len(),
        matched_income,
        areas.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn raw(lat: &str, lon: &str) -> RawFacility {
        RawFacility {
            facility_name: "Test Facility".to_string(),
            address: "1 Main St".to_string(),
            borough: "Manhattan".to_string(),
            system: "Independent".to_string(),
            latitude: lat.to_string(),
            longitude: lon.to_string(),
        }
    }

    fn join_config() -> JoinConfig {
        JoinConfig {
            id_property: "puma".to_string(),
            id_field: "PUMA".to_string(),
            name_property: Some("puma_name".to_string()),
            broadband_id_column: "PUMA".to_string(),
            broadband_value_column: "adoption".to_string(),
            income_id_column: "PUMA".to_string(),
            income_value_column: "income".to_string(),
        }
    }

    fn square_area(id: &str) -> PumaArea {
        PumaArea {
            id: id.to_string(),
            name: format!("PUMA {}", id),
            geometry: MultiPolygon::new(vec![polygon![
                (x: -74.0, y: 40.7),
                (x: -73.9, y: 40.7),
                (x: -73.9, y: 40.8),
                (x: -74.0, y: 40.8),
            ]]),
            broadband_pct: None,
            median_income: None,
        }
    }

    #[test]
    fn zero_coordinates_are_dropped() {
        let cleaned = clean_facilities(vec![raw("0", "0"), raw("40.75", "-73.98")]);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].location.y(), 40.75);
        assert_eq!(cleaned[0].location.x(), -73.98);
    }

    #[test]
    fn retained_rows_are_nonzero_and_in_window() {
        let cleaned = clean_facilities(vec![
            raw("40.75", "-73.98"),
            raw("0", "-73.98"),
            raw("40.75", "0"),
            raw("38.9", "-77.0"),  // DC
            raw("40.75", "-69.9"), // out in the Atlantic
            raw("45.5", "-73.6"),  // Montreal
            raw("40.61", "-74.03"),
        ]);
        assert_eq!(cleaned.len(), 2);
        for facility in &cleaned {
            let lat = facility.location.y();
            let lon = facility.location.x();
            assert!(lat != 0.0 && lon != 0.0);
            assert!((MIN_LATITUDE..=MAX_LATITUDE).contains(&lat));
            assert!((MIN_LONGITUDE..=MAX_LONGITUDE).contains(&lon));
        }
    }

    #[test]
    fn unparsable_coordinates_are_dropped() {
        let cleaned = clean_facilities(vec![raw("", ""), raw("n/a", "-73.98")]);
        assert!(cleaned.is_empty());
    }

    #[test]
    fn area_ids_normalize_across_spellings() {
        assert_eq!(normalize_area_id("3701"), "3701");
        assert_eq!(normalize_area_id("03701"), "3701");
        assert_eq!(normalize_area_id(" 3701.0 "), "3701");
        assert_eq!(normalize_area_id("0"), "0");
        assert_eq!(normalize_area_id(""), "");
    }

    #[test]
    fn numeric_parsing_strips_feed_formatting() {
        assert_eq!(parse_numeric("68302"), Some(68302.0));
        assert_eq!(parse_numeric("$68,302"), Some(68302.0));
        assert_eq!(parse_numeric("78.1%"), Some(78.1));
        assert_eq!(parse_numeric(" 0.781 "), Some(0.781));
        assert_eq!(parse_numeric("no data"), None);
        assert_eq!(parse_numeric(""), None);
    }

    #[test]
    fn geojson_features_become_areas() {
        let raw = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"puma": "03701", "puma_name": "Riverdale"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[-74.0, 40.7], [-73.9, 40.7], [-73.9, 40.8], [-74.0, 40.8], [-74.0, 40.7]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {"puma": 3702},
                    "geometry": {
                        "type": "Point",
                        "coordinates": [-73.95, 40.75]
                    }
                }
            ]
        }"#;

        let areas = load_puma_geojson(raw, &join_config()).unwrap();
        assert_eq!(areas.len(), 1);
        assert_eq!(areas[0].id, "3701");
        assert_eq!(areas[0].name, "Riverdale");
        assert!(areas[0].broadband_pct.is_none());
    }

    #[test]
    fn attribute_csv_is_keyed_by_canonical_id() {
        let csv = b"PUMA,adoption\n03701,0.78\n3702,81.5%\n,0.5\n3703,n/a\n";
        let map = parse_attribute_csv(csv, "PUMA", "adoption").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("3701"), Some(&0.78));
        assert_eq!(map.get("3702"), Some(&81.5));
    }

    #[test]
    fn join_is_left_and_idempotent() {
        let mut areas = vec![square_area("3701"), square_area("3702")];
        let broadband = HashMap::from([("3701".to_string(), 0.78)]);
        let income = HashMap::from([
            ("3701".to_string(), 68302.0),
            ("9999".to_string(), 12345.0),
        ]);

        join_attributes(&mut areas, &broadband, &income);
        let first = areas.clone();

        // Fractional adoption is scaled to percent.
        assert_eq!(areas[0].broadband_pct, Some(78.0));
        assert_eq!(areas[0].median_income, Some(68302.0));
        // Unmatched area keeps missing attributes.
        assert_eq!(areas[1].broadband_pct, None);
        assert_eq!(areas[1].median_income, None);

        join_attributes(&mut areas, &broadband, &income);
        assert_eq!(areas, first);
    }
}
