pub mod config;
pub mod data;
pub mod fetch;
pub mod processing;
pub mod render;
pub mod server;
pub mod types;
pub mod webmap;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{AppConfig, GeometrySource};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the facility listing, clean it, and render the static point maps
    Points {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Fetch geometry and attribute tables, join them, and render choropleths
    Choropleth {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Build the standalone interactive Leaflet map
    Interactive {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the output directory with an area lookup API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Points { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            let facilities = load_facilities(&app_config).await?;

            std::fs::create_dir_all(&app_config.output.dir)?;
            render::render_scatter(
                &facilities,
                &app_config.output.dir.join("facilities_scatter.png"),
            )?;
            render::render_styled_points(
                &facilities,
                &app_config.output.dir.join("facilities_map.png"),
            )?;
        }
        Commands::Choropleth { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            let facilities = load_facilities(&app_config).await?;
            let areas = load_joined_areas(&app_config).await?;

            std::fs::create_dir_all(&app_config.output.dir)?;
            render::render_choropleth(
                &areas,
                &facilities,
                render::Metric::Broadband,
                &app_config.output.dir.join("broadband_choropleth.png"),
            )?;
            render::render_choropleth(
                &areas,
                &facilities,
                render::Metric::Income,
                &app_config.output.dir.join("income_choropleth.png"),
            )?;
        }
        Commands::Interactive { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            let facilities = load_facilities(&app_config).await?;
            let areas = load_joined_areas(&app_config).await?;

            let document = webmap::build_document(&facilities, &areas)?;
            let path =
                webmap::write_document(&document, &app_config.output.dir, &app_config.output.map_file)?;
            println!("Interactive map written to {:?}", path);
        }
        Commands::Serve { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            println!("Loading area data for the lookup API...");
            let areas = load_joined_areas(&app_config).await?;
            server::start_server(app_config, areas).await?;
        }
    }

    Ok(())
}

async fn load_facilities(config: &AppConfig) -> Result<Vec<types::Facility>> {
    let client = fetch::client()?;

    let url = match &config.sources.facilities_filter {
        Some(filter) if !filter.is_empty() => {
            format!("{}?{}", config.sources.facilities_url, filter)
        }
        _ => config.sources.facilities_url.clone(),
    };

    let body = fetch::fetch_text(&client, &url).await?;
    let raw = data::parse_facilities(&body)?;
    println!("Fetched {} facility rows", raw.len());

    let facilities = data::clean_facilities(raw);
    processing::print_summary(&facilities);
    Ok(facilities)
}

async fn load_joined_areas(config: &AppConfig) -> Result<Vec<types::PumaArea>> {
    let client = fetch::client()?;

    let mut areas = match config.sources.geometry_source {
        GeometrySource::Geojson => {
            let body = fetch::fetch_text(&client, &config.sources.puma_geojson_url).await?;
            data::load_puma_geojson(&body, &config.join)?
        }
        GeometrySource::Shapefile => {
            let shp = fetch::download_shapefile_zip(
                &client,
                &config.sources.puma_zip_url,
                &config.sources.work_dir,
            )
            .await?;
            data::load_puma_shapefile(&shp, &config.join)?
        }
    };
    println!("Loaded {} area polygons", areas.len());

    let broadband_bytes = fetch::fetch_bytes(&client, &config.sources.broadband_csv_url).await?;
    let broadband = data::parse_attribute_csv(
        &broadband_bytes,
        &config.join.broadband_id_column,
        &config.join.broadband_value_column,
    )?;

    let income_bytes = fetch::fetch_bytes(&client, &config.sources.income_csv_url).await?;
    let income = data::parse_attribute_csv(
        &income_bytes,
        &config.join.income_id_column,
        &config.join.income_value_column,
    )?;

    data::join_attributes(&mut areas, &broadband, &income);
    Ok(areas)
}
