use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

// A dead endpoint should fail the run, not hang it.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub fn client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("facility-atlas/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    println!("Fetching {}...", url);
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Request failed: {}", url))?
        .error_for_status()
        .with_context(|| format!("Bad response status from {}", url))?;
    resp.text()
        .await
        .with_context(|| format!("Failed to read response body from {}", url))
}

pub async fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>> {
    println!("Fetching {}...", url);
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Request failed: {}", url))?
        .error_for_status()
        .with_context(|| format!("Bad response status from {}", url))?;
    let bytes = resp
        .bytes()
        .await
        .with_context(|| format!("Failed to read response body from {}", url))?;
    Ok(bytes.to_vec())
}

/// Download a ZIP archive, expand it under `work_dir`, and return the path of
/// the `.shp` inside. The sidecar files (`.dbf`, `.shx`, ...) land next to it,
/// which is what the shapefile reader expects.
pub async fn download_shapefile_zip(client: &Client, url: &str, work_dir: &Path) -> Result<PathBuf> {
    let bytes = fetch_bytes(client, url).await?;
    fs::create_dir_all(work_dir)
        .with_context(|| format!("Failed to create work dir: {:?}", work_dir))?;

    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("Failed to open ZIP archive")?;
    archive
        .extract(work_dir)
        .with_context(|| format!("Failed to expand ZIP archive into {:?}", work_dir))?;
    println!("Expanded archive into {:?}", work_dir);

    find_shapefile(work_dir)
}

/// Walk `dir` looking for the first `.shp`. Boundary archives usually nest the
/// shapefile one directory down.
fn find_shapefile(dir: &Path) -> Result<PathBuf> {
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)
            .with_context(|| format!("Failed to read directory: {:?}", current))?
        {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("shp"))
                .unwrap_or(false)
            {
                return Ok(path);
            }
        }
    }
    Err(anyhow!("No .shp file found under {:?}", dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("facility-atlas-tests")
            .join(name)
            .join(format!("{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn finds_nested_shapefile() {
        let dir = scratch_dir("find-shp");
        let nested = dir.join("nypuma2010");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("nypuma2010.dbf"), b"").unwrap();
        fs::write(nested.join("nypuma2010.shp"), b"").unwrap();

        let found = find_shapefile(&dir).unwrap();
        assert_eq!(found.file_name().unwrap(), "nypuma2010.shp");
    }

    #[test]
    fn missing_shapefile_is_an_error() {
        let dir = scratch_dir("no-shp");
        fs::write(dir.join("readme.txt"), b"").unwrap();
        assert!(find_shapefile(&dir).is_err());
    }
}
