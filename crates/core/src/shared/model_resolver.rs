use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model {0} not found locally and no download URL configured")]
    NotFound(String),
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where to look for a model file, in priority order.
pub struct ModelLocation<'a> {
    pub name: &'a str,
    pub cache_dir: PathBuf,
    pub bundled_dir: Option<&'a Path>,
    pub url: Option<&'a str>,
}

impl<'a> ModelLocation<'a> {
    /// Location rooted at the platform cache directory.
    pub fn cached(name: &'a str) -> Result<Self, ModelResolveError> {
        Ok(Self {
            name,
            cache_dir: model_cache_dir()?,
            bundled_dir: None,
            url: None,
        })
    }

    pub fn with_bundled_dir(mut self, dir: Option<&'a Path>) -> Self {
        self.bundled_dir = dir;
        self
    }

    pub fn with_url(mut self, url: Option<&'a str>) -> Self {
        self.url = url;
        self
    }
}

/// Resolve a model file by name, checking local locations before downloading.
///
/// Resolution order: cache directory, bundled directory, download into the
/// cache. Without a URL a missing model is reported as `NotFound`.
pub fn resolve(
    location: &ModelLocation<'_>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = location.cache_dir.join(location.name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    if let Some(dir) = location.bundled_dir {
        let bundled_path = dir.join(location.name);
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    let Some(url) = location.url else {
        return Err(ModelResolveError::NotFound(location.name.to_string()));
    };

    fs::create_dir_all(&location.cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading {} from {url}", location.name);
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Attention Tracker/models/`
/// - Linux: `$XDG_CACHE_HOME/Attention Tracker/models/` or `~/.cache/Attention Tracker/models/`
/// - Windows: `%LOCALAPPDATA%/Attention Tracker/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("Attention Tracker").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("Attention Tracker").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let download_err = |e| ModelResolveError::Download {
        url: url.to_string(),
        source: e,
    };
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;

    let total = response.content_length().unwrap_or(0);
    let bytes = response.bytes().map_err(download_err)?;

    // Written to a .part file and renamed so a failed download never leaves a
    // truncated model behind.
    let temp_path = dest.with_extension("part");
    let write_err = |e| ModelResolveError::Write {
        path: temp_path.clone(),
        source: e,
    };
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;

    let mut downloaded: u64 = 0;
    for chunk in bytes.chunks(1024 * 1024) {
        file.write_all(chunk).map_err(write_err)?;
        downloaded += chunk.len() as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
