use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub sources: SourcesConfig,
    pub join: JoinConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    pub facilities_url: String,
    /// Appended verbatim as the query string of the facilities request.
    pub facilities_filter: Option<String>,
    pub geometry_source: GeometrySource,
    pub puma_geojson_url: String,
    pub puma_zip_url: String,
    pub broadband_csv_url: String,
    pub income_csv_url: String,
    /// Where downloaded archives are expanded.
    pub work_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeometrySource {
    Geojson,
    Shapefile,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JoinConfig {
    /// Feature property holding the PUMA id in the GeoJSON source.
    pub id_property: String,
    /// dbase field holding the PUMA id in the shapefile source.
    pub id_field: String,
    /// Property/field with a human-readable area name, if the source has one.
    pub name_property: Option<String>,
    pub broadband_id_column: String,
    pub broadband_value_column: String,
    pub income_id_column: String,
    pub income_value_column: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub map_file: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}
