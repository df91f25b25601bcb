use geo::{MultiPolygon, Point};

/// A health facility after coordinate cleanup. Coordinates are WGS84 degrees
/// with the point stored as (longitude, latitude).
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    pub name: String,
    pub address: String,
    pub borough: String,
    /// Operating-network label, e.g. "NYC Health + Hospitals".
    pub system: String,
    pub location: Point<f64>,
}

/// A PUMA polygon plus whatever the attribute joins have filled in.
/// Unmatched areas keep `None` values.
#[derive(Debug, Clone, PartialEq)]
pub struct PumaArea {
    pub id: String,
    pub name: String,
    pub geometry: MultiPolygon<f64>,
    /// Share of households with home broadband, in percent (0..100).
    pub broadband_pct: Option<f64>,
    /// Median household income in dollars.
    pub median_income: Option<f64>,
}
