use crate::processing::{self, BroadbandBracket, IncomeBracket, NO_DATA_COLOR};
use crate::types::{Facility, PumaArea};
use anyhow::{Context, Result};
use geo::algorithm::bounding_rect::BoundingRect;
use geojson::{Feature, FeatureCollection, JsonObject};
use std::fs;
use std::path::{Path, PathBuf};

// Default view if there is nothing to center on.
const NYC_CENTER: (f64, f64) = (40.7128, -74.0060);

/// The exported document: Leaflet from CDN, all vector data inlined, so the
/// file works when opened straight from disk.
const TEMPLATE: &str = r##"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8" />
<meta name="viewport" content="width=device-width, initial-scale=1.0" />
<title>NYC health facilities</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
  html, body { height: 100%; margin: 0; }
  #map { height: 100%; width: 100%; }
  .legend {
    background: rgba(255, 255, 255, 0.9);
    padding: 8px 10px;
    border-radius: 4px;
    box-shadow: 0 1px 4px rgba(0, 0, 0, 0.3);
    font: 12px/1.6 sans-serif;
  }
  .legend h4 { margin: 0 0 4px; font-size: 12px; }
  .legend i {
    width: 14px;
    height: 14px;
    display: inline-block;
    margin-right: 6px;
    vertical-align: middle;
  }
</style>
</head>
<body>
<div id="map"></div>
<script>
  const facilities = __FACILITIES__;
  const pumas = __PUMAS__;

  const map = L.map("map").setView([__CENTER_LAT__, __CENTER_LON__], 11);
  const osm = L.tileLayer("https://tile.openstreetmap.org/{z}/{x}/{y}.png", {
    maxZoom: 19,
    attribution: "&copy; OpenStreetMap contributors",
  }).addTo(map);

  const facilityLayer = L.layerGroup();
  for (const f of facilities) {
    const marker = L.circleMarker([f.lat, f.lon], {
      radius: 6,
      color: "#ffffff",
      weight: 1,
      fillColor: f.color,
      fillOpacity: 0.9,
    });
    marker.bindPopup(`<b>${f.name}</b><br>${f.address}, ${f.borough}<br>${f.system}`);
    marker.bindTooltip(f.name);
    facilityLayer.addLayer(marker);
  }
  facilityLayer.addTo(map);

  function overlay(colorProp) {
    return L.geoJSON(pumas, {
      style: (feature) => ({
        color: "#555555",
        weight: 1,
        fillColor: feature.properties[colorProp],
        fillOpacity: 0.6,
      }),
      onEachFeature: (feature, layer) => {
        const p = feature.properties;
        layer.bindPopup(
          `<b>${p.name}</b><br>Broadband adoption: ${p.broadband}<br>Median income: ${p.income}`
        );
      },
    });
  }
  const broadbandLayer = overlay("broadband_color");
  const incomeLayer = overlay("income_color").addTo(map);

  L.control
    .layers(
      { OpenStreetMap: osm },
      {
        Facilities: facilityLayer,
        "Broadband adoption": broadbandLayer,
        "Median household income": incomeLayer,
      }
    )
    .addTo(map);

  function legend(title, rows) {
    const control = L.control({ position: "bottomright" });
    control.onAdd = () => {
      const div = L.DomUtil.create("div", "legend");
      div.innerHTML =
        `<h4>${title}</h4>` +
        rows.map((r) => `<i style="background:${r[1]}"></i>${r[0]}`).join("<br>");
      return div;
    };
    return control;
  }
  legend("Median household income", __INCOME_LEGEND__).addTo(map);
  legend("Broadband adoption", __BROADBAND_LEGEND__).addTo(map);
</script>
</body>
</html>
"##;

pub fn build_document(facilities: &[Facility], areas: &[PumaArea]) -> Result<String> {
    let table = processing::system_color_table(facilities);
    let color_for = |system: &str| -> &'static str {
        table
            .iter()
            .find(|(s, _)| s == system)
            .map(|(_, color)| *color)
            .unwrap_or(processing::SYSTEM_PALETTE[0])
    };

    let facility_values: Vec<serde_json::Value> = facilities
        .iter()
        .map(|f| {
            serde_json::json!({
                "name": f.name,
                "address": f.address,
                "borough": f.borough,
                "system": f.system,
                "lat": f.location.y(),
                "lon": f.location.x(),
                "color": color_for(&f.system),
            })
        })
        .collect();
    let facility_json =
        serde_json::to_string(&facility_values).context("Failed to serialize facilities")?;

    let features: Vec<Feature> = areas.iter().map(area_feature).collect();
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    let puma_json =
        serde_json::to_string(&collection).context("Failed to serialize area features")?;

    let income_rows: Vec<(&str, &str)> = IncomeBracket::ALL
        .iter()
        .map(|b| (b.label(), b.color()))
        .collect();
    let broadband_rows: Vec<(&str, &str)> = BroadbandBracket::ALL
        .iter()
        .map(|b| (b.label(), b.color()))
        .collect();

    let (center_lat, center_lon) = map_center(facilities, areas);

    Ok(TEMPLATE
        .replace("__FACILITIES__", &facility_json)
        .replace("__PUMAS__", &puma_json)
        .replace("__CENTER_LAT__", &format!("{:.5}", center_lat))
        .replace("__CENTER_LON__", &format!("{:.5}", center_lon))
        .replace("__INCOME_LEGEND__", &serde_json::to_string(&income_rows)?)
        .replace(
            "__BROADBAND_LEGEND__",
            &serde_json::to_string(&broadband_rows)?,
        ))
}

pub fn write_document(document: &str, dir: &Path, file_name: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output dir: {:?}", dir))?;
    let path = dir.join(file_name);
    fs::write(&path, document).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

fn area_feature(area: &PumaArea) -> Feature {
    let mut props = JsonObject::new();
    props.insert("id".to_string(), area.id.clone().into());
    props.insert("name".to_string(), area.name.clone().into());
    props.insert(
        "broadband".to_string(),
        area.broadband_pct
            .map(|v| format!("{:.1}%", v))
            .unwrap_or_else(|| "no data".to_string())
            .into(),
    );
    props.insert(
        "income".to_string(),
        area.median_income
            .map(|v| format!("${:.0}", v))
            .unwrap_or_else(|| "no data".to_string())
            .into(),
    );
    props.insert(
        "broadband_color".to_string(),
        area.broadband_pct
            .map(|v| BroadbandBracket::from_pct(v).color())
            .unwrap_or(NO_DATA_COLOR)
            .into(),
    );
    props.insert(
        "income_color".to_string(),
        area.median_income
            .map(|v| IncomeBracket::from_income(v).color())
            .unwrap_or(NO_DATA_COLOR)
            .into(),
    );

    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&area.geometry))),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn map_center(facilities: &[Facility], areas: &[PumaArea]) -> (f64, f64) {
    if !facilities.is_empty() {
        let (sum_lat, sum_lon) = facilities.iter().fold((0.0, 0.0), |(lat, lon), f| {
            (lat + f.location.y(), lon + f.location.x())
        });
        let n = facilities.len() as f64;
        return (sum_lat / n, sum_lon / n);
    }

    for area in areas {
        if let Some(rect) = area.geometry.bounding_rect() {
            return (
                (rect.min().y + rect.max().y) / 2.0,
                (rect.min().x + rect.max().x) / 2.0,
            );
        }
    }

    NYC_CENTER
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon, Point};

    fn sample_facility() -> Facility {
        Facility {
            name: "Bellevue Hospital Center".to_string(),
            address: "462 First Avenue".to_string(),
            borough: "Manhattan".to_string(),
            system: "NYC Health + Hospitals".to_string(),
            location: Point::new(-73.9754, 40.7392),
        }
    }

    fn sample_area() -> PumaArea {
        PumaArea {
            id: "3808".to_string(),
            name: "Murray Hill & Gramercy".to_string(),
            geometry: MultiPolygon::new(vec![polygon![
                (x: -74.0, y: 40.7),
                (x: -73.9, y: 40.7),
                (x: -73.9, y: 40.8),
                (x: -74.0, y: 40.8),
            ]]),
            broadband_pct: Some(81.5),
            median_income: Some(50_000.0),
        }
    }

    #[test]
    fn document_replaces_every_placeholder() {
        let doc = build_document(&[sample_facility()], &[sample_area()]).unwrap();
        assert!(!doc.contains("__FACILITIES__"));
        assert!(!doc.contains("__PUMAS__"));
        assert!(!doc.contains("__CENTER_LAT__"));
        assert!(!doc.contains("__CENTER_LON__"));
        assert!(!doc.contains("__INCOME_LEGEND__"));
        assert!(!doc.contains("__BROADBAND_LEGEND__"));
    }

    #[test]
    fn document_carries_layers_and_legends() {
        let doc = build_document(&[sample_facility()], &[sample_area()]).unwrap();
        assert!(doc.contains("L.control"));
        assert!(doc.contains("Bellevue Hospital Center"));
        assert!(doc.contains("Murray Hill &amp; Gramercy") || doc.contains("Murray Hill & Gramercy"));
        // 50_000 sits in the $50-75K bracket; its fill color must be embedded.
        assert!(doc.contains("#feb24c"));
        assert!(doc.contains("81.5%"));
    }

    #[test]
    fn missing_attributes_render_as_no_data() {
        let mut area = sample_area();
        area.broadband_pct = None;
        area.median_income = None;
        let doc = build_document(&[], &[area]).unwrap();
        assert!(doc.contains("no data"));
        assert!(doc.contains(NO_DATA_COLOR));
    }

    #[test]
    fn center_falls_back_to_area_bbox_then_default() {
        let (lat, lon) = map_center(&[], &[sample_area()]);
        assert!((lat - 40.75).abs() < 1e-9);
        assert!((lon - -73.95).abs() < 1e-9);

        let (lat, lon) = map_center(&[], &[]);
        assert_eq!((lat, lon), NYC_CENTER);
    }
}
