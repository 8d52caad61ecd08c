//! Fetching remote CSV files into the local data folder.

use super::DataError;
use dwldutil::{DLFile, Downloader};
use indicatif::ProgressStyle;
use std::fs;
use std::path::{Path, PathBuf};

/// The local file name a URL is cached under: its last path segment.
pub fn cache_file_name(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("download.csv")
        .to_string()
}

/// Makes the file behind `url` available inside `target_dir`.
///
/// A file that is already cached is reused without touching the network.
/// Returns the local path of the file.
pub fn fetch(url: &str, target_dir: &Path) -> Result<PathBuf, DataError> {
    fs::create_dir_all(target_dir)?;
    let local_path = target_dir.join(cache_file_name(url));
    if local_path.exists() {
        log::info!("Using cached copy of {url} at {}", local_path.display());
        return Ok(local_path);
    }

    println!("Downloading {url}");
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let file_to_download = DLFile::new()
            .with_url(url)
            .with_path(&local_path.to_string_lossy());

        // Use a progress bar style that does not require the total file size.
        let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")?
            .progress_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        let configured_downloader = Downloader::new()
            .add_file(file_to_download)
            .with_style(style)
            .with_max_concurrent_downloads(1)
            .with_max_redirections(5);

        configured_downloader.start();
        Ok::<(), DataError>(())
    })?;

    if !local_path.exists() {
        return Err(DataError::DownloadFailed(url.to_string()));
    }
    Ok(local_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_name_is_the_last_url_segment() {
        assert_eq!(
            cache_file_name("https://example.org/data/warpbreaks.csv"),
            "warpbreaks.csv"
        );
        assert_eq!(cache_file_name("https://example.org/x.csv/"), "x.csv");
    }

    #[test]
    fn cached_file_skips_the_download() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("local.csv");
        fs::write(&cached, "a\n1\n").unwrap();
        let resolved = fetch("https://invalid.invalid/local.csv", dir.path()).unwrap();
        assert_eq!(resolved, cached);
    }
}
