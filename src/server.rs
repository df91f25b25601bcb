use crate::config::AppConfig;
use crate::processing::{BroadbandBracket, IncomeBracket};
use crate::types::PumaArea;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::Point;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

// Wrapper for RTree indexing over area bounding boxes.
struct AreaEnvelope {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for AreaEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub struct AppState {
    areas: Vec<PumaArea>,
    tree: RTree<AreaEnvelope>,
}

impl AppState {
    pub fn new(areas: Vec<PumaArea>) -> Self {
        let tree_items: Vec<AreaEnvelope> = areas
            .iter()
            .enumerate()
            .filter_map(|(index, area)| {
                area.geometry.bounding_rect().map(|rect| AreaEnvelope {
                    index,
                    aabb: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        Self {
            areas,
            tree: RTree::bulk_load(tree_items),
        }
    }
}

#[derive(Deserialize)]
pub struct LookupParams {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LookupResponse {
    id: String,
    name: String,
    broadband_pct: Option<f64>,
    median_income: Option<f64>,
    broadband_bracket: Option<&'static str>,
    income_bracket: Option<&'static str>,
}

pub async fn start_server(config: AppConfig, areas: Vec<PumaArea>) -> Result<()> {
    println!("Building spatial index for {} areas...", areas.len());
    let state = Arc::new(AppState::new(areas));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    println!("Serving {:?} on http://{}", config.output.dir, addr);

    let app = Router::new()
        .route("/api/area", get(lookup_handler))
        .nest_service("/", ServeDir::new(&config.output.dir))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn lookup_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> Json<Option<LookupResponse>> {
    Json(lookup(&state, params.lat, params.lon))
}

/// Find the area containing the point: bounding-box candidates from the
/// R-tree, then an exact containment check.
fn lookup(state: &AppState, lat: f64, lon: f64) -> Option<LookupResponse> {
    let point = Point::new(lon, lat);
    let envelope = AABB::from_point([lon, lat]);

    for candidate in state.tree.locate_in_envelope_intersecting(&envelope) {
        if let Some(area) = state.areas.get(candidate.index) {
            if area.geometry.contains(&point) {
                return Some(LookupResponse {
                    id: area.id.clone(),
                    name: area.name.clone(),
                    broadband_pct: area.broadband_pct,
                    median_income: area.median_income,
                    broadband_bracket: area
                        .broadband_pct
                        .map(|v| BroadbandBracket::from_pct(v).label()),
                    income_bracket: area
                        .median_income
                        .map(|v| IncomeBracket::from_income(v).label()),
                });
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn area(id: &str, x0: f64, x1: f64) -> PumaArea {
        PumaArea {
            id: id.to_string(),
            name: format!("PUMA {}", id),
            geometry: MultiPolygon::new(vec![polygon![
                (x: x0, y: 40.7),
                (x: x1, y: 40.7),
                (x: x1, y: 40.8),
                (x: x0, y: 40.8),
            ]]),
            broadband_pct: Some(81.5),
            median_income: Some(50_000.0),
        }
    }

    #[test]
    fn lookup_returns_containing_area_with_brackets() {
        let state = AppState::new(vec![area("3701", -74.0, -73.9), area("3702", -73.9, -73.8)]);

        let hit = lookup(&state, 40.75, -73.85).unwrap();
        assert_eq!(hit.id, "3702");
        assert_eq!(hit.income_bracket, Some("$50-75K"));
        assert_eq!(hit.broadband_bracket, Some("80-90%"));
    }

    #[test]
    fn lookup_misses_outside_every_area() {
        let state = AppState::new(vec![area("3701", -74.0, -73.9)]);
        assert!(lookup(&state, 41.5, -73.95).is_none());
        assert!(lookup(&state, 40.75, -73.5).is_none());
    }
}
