use crate::processing::{self, BroadbandBracket, IncomeBracket, NO_DATA_COLOR};
use crate::types::{Facility, PumaArea};
use anyhow::{anyhow, Context, Result};
use geo::algorithm::bounding_rect::BoundingRect;
use plotters::prelude::*;
use std::path::Path;

const MAP_WIDTH: u32 = 1024;
const MAP_HEIGHT: u32 = 1024;

/// Which joined attribute a choropleth colors by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Broadband,
    Income,
}

/// Plain scatter of facility coordinates with mesh and axis labels, the first
/// look at the cleaned data.
pub fn render_scatter(facilities: &[Facility], path: &Path) -> Result<()> {
    let (x_range, y_range) = facility_extent(facilities)?;

    let root = BitMapBackend::new(path, (MAP_WIDTH, MAP_HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption("Health facility locations", ("sans-serif", 30))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc("Longitude")
        .y_desc("Latitude")
        .draw()?;

    chart.draw_series(
        facilities
            .iter()
            .map(|f| Circle::new((f.location.x(), f.location.y()), 3, BLUE.filled())),
    )?;

    root.present()
        .with_context(|| format!("Failed to write {:?}", path))?;
    println!("Wrote {:?}", path);
    Ok(())
}

/// Map-styled rendering of the same points: no mesh, one color per
/// system-affiliation category, legend in the corner.
pub fn render_styled_points(facilities: &[Facility], path: &Path) -> Result<()> {
    let (x_range, y_range) = facility_extent(facilities)?;
    let table = processing::system_color_table(facilities);

    let root = BitMapBackend::new(path, (MAP_WIDTH, MAP_HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption("Facilities by operating network", ("sans-serif", 30))
        .build_cartesian_2d(x_range, y_range)?;

    for (system, hex) in &table {
        let color = hex_to_rgb(hex);
        chart
            .draw_series(
                facilities
                    .iter()
                    .filter(|f| &f.system == system)
                    .map(|f| Circle::new((f.location.x(), f.location.y()), 4, color.filled())),
            )?
            .label(system.as_str())
            .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.85))
        .border_style(&BLACK)
        .draw()?;

    root.present()
        .with_context(|| format!("Failed to write {:?}", path))?;
    println!("Wrote {:?}", path);
    Ok(())
}

/// Choropleth of the joined areas with the facility points overlaid. Areas the
/// join left empty are drawn in the no-data gray.
pub fn render_choropleth(
    areas: &[PumaArea],
    facilities: &[Facility],
    metric: Metric,
    path: &Path,
) -> Result<()> {
    let (x_range, y_range) = area_extent(areas)?;

    let root = BitMapBackend::new(path, (MAP_WIDTH, MAP_HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let caption = match metric {
        Metric::Broadband => "Home broadband adoption by PUMA",
        Metric::Income => "Median household income by PUMA",
    };

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(caption, ("sans-serif", 28))
        .build_cartesian_2d(x_range, y_range)?;

    for area in areas {
        let hex = match metric {
            Metric::Broadband => area
                .broadband_pct
                .map(|v| BroadbandBracket::from_pct(v).color())
                .unwrap_or(NO_DATA_COLOR),
            Metric::Income => area
                .median_income
                .map(|v| IncomeBracket::from_income(v).color())
                .unwrap_or(NO_DATA_COLOR),
        };
        let fill = hex_to_rgb(hex);

        // Exterior rings only; the PUMA polygons have no holes worth drawing
        // at this scale.
        for polygon in &area.geometry {
            let ring: Vec<(f64, f64)> = polygon.exterior().coords().map(|c| (c.x, c.y)).collect();
            chart.draw_series(std::iter::once(Polygon::new(ring.clone(), fill.filled())))?;
            chart.draw_series(std::iter::once(PathElement::new(ring, &BLACK.mix(0.4))))?;
        }
    }

    chart.draw_series(
        facilities
            .iter()
            .map(|f| Circle::new((f.location.x(), f.location.y()), 3, BLACK.filled())),
    )?;

    let legend: Vec<(&'static str, &'static str)> = match metric {
        Metric::Broadband => BroadbandBracket::ALL
            .iter()
            .map(|b| (b.label(), b.color()))
            .collect(),
        Metric::Income => IncomeBracket::ALL
            .iter()
            .map(|b| (b.label(), b.color()))
            .collect(),
    };
    for (label, hex) in legend {
        let color = hex_to_rgb(hex);
        chart
            .draw_series(std::iter::empty::<Circle<(f64, f64), i32>>())?
            .label(label)
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 6), (x + 16, y + 6)], color.filled())
            });
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.85))
        .border_style(&BLACK)
        .draw()?;

    root.present()
        .with_context(|| format!("Failed to write {:?}", path))?;
    println!("Wrote {:?}", path);
    Ok(())
}

fn hex_to_rgb(hex: &str) -> RGBColor {
    let hex = hex.trim_start_matches('#');
    let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
    RGBColor(r, g, b)
}

fn facility_extent(
    facilities: &[Facility],
) -> Result<(std::ops::Range<f64>, std::ops::Range<f64>)> {
    if facilities.is_empty() {
        return Err(anyhow!("No facilities to render"));
    }

    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for facility in facilities {
        min_x = min_x.min(facility.location.x());
        max_x = max_x.max(facility.location.x());
        min_y = min_y.min(facility.location.y());
        max_y = max_y.max(facility.location.y());
    }

    Ok(padded_ranges(min_x, max_x, min_y, max_y))
}

fn area_extent(areas: &[PumaArea]) -> Result<(std::ops::Range<f64>, std::ops::Range<f64>)> {
    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for area in areas {
        if let Some(rect) = area.geometry.bounding_rect() {
            min_x = min_x.min(rect.min().x);
            max_x = max_x.max(rect.max().x);
            min_y = min_y.min(rect.min().y);
            max_y = max_y.max(rect.max().y);
        }
    }

    if !min_x.is_finite() {
        return Err(anyhow!("No area geometry to render"));
    }

    Ok(padded_ranges(min_x, max_x, min_y, max_y))
}

fn padded_ranges(
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    let pad_x = ((max_x - min_x) * 0.05).max(0.01);
    let pad_y = ((max_y - min_y) * 0.05).max(0.01);
    (
        (min_x - pad_x)..(max_x + pad_x),
        (min_y - pad_y)..(max_y + pad_y),
    )
}
