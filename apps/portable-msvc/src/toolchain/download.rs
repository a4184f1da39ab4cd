//! Payload downloads with progress reporting and atomic placement.
//!
//! ## Features
//!
//! - Streaming downloads with progress callbacks
//! - Optional retry with exponential backoff (off by default)
//! - Downloads to a uniquely named `.part` file next to the destination,
//!   verifies it, then renames it into place
//! - `file://` URLs are copied from the local filesystem
//!
//! A failed or interrupted download never leaves a file at the destination
//! path, so the cache only ever contains complete payloads.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures_util::StreamExt;
use rand::Rng;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::manifest::USER_AGENT;
use super::verify::verify_checksum;
use crate::errors::MsvcError;

/// Progress event emitted during downloads.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Download has started.
    Started {
        /// The URL being downloaded.
        url: String,
        /// Total file size in bytes, 0 if unknown.
        total: u64,
    },
    /// Download progress update.
    Progress {
        /// Bytes downloaded so far.
        downloaded: u64,
        /// Current download speed in bytes per second.
        speed: u64,
    },
    /// Download completed and the file is in place.
    Completed,
    /// Download failed with an error.
    Failed {
        /// Error description.
        error: String,
    },
}

/// Callback type for receiving progress updates during downloads.
///
/// Wrapped in `Arc` so it can be shared across concurrent downloads.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Base delay between retries in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Connection timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Minimum interval between progress callback invocations in milliseconds.
const PROGRESS_CALLBACK_INTERVAL_MS: u128 = 100;

/// Returns the local path named by a `file://` URL.
///
/// `file:///C:/dir/x` maps to `C:/dir/x` so Windows drive paths work.
#[must_use]
pub fn local_path(url: &str) -> Option<PathBuf> {
    let rest = url
        .get(..7)
        .filter(|scheme| scheme.eq_ignore_ascii_case("file://"))
        .map(|_| &url[7..])?;
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);
    let bytes = rest.as_bytes();
    let is_drive_path =
        bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':';
    let path = if is_drive_path { &rest[1..] } else { rest };
    (!path.is_empty()).then(|| PathBuf::from(path))
}

/// Downloads `url` to `dest`, reporting progress through `callback`.
///
/// The file is written to a temporary `.part` path in the destination
/// directory. When `expected_sha256` is given the temporary file is verified
/// before it is renamed to `dest`. Failed attempts are retried `retries`
/// times with exponential backoff; checksum mismatches are not retried.
///
/// # Arguments
///
/// * `url` - The URL to download from (`http(s)://` or `file://`)
/// * `dest` - The final file path
/// * `expected_sha256` - Optional hex digest the file must match
/// * `retries` - Number of additional attempts after a failure
/// * `callback` - Progress callback that receives [`ProgressEvent`]s
///
/// # Returns
///
/// The number of bytes transferred.
///
/// # Errors
///
/// Returns an error if:
/// - The request fails on every attempt ([`MsvcError::Download`])
/// - The content does not match `expected_sha256` ([`MsvcError::ChecksumMismatch`])
/// - The destination cannot be written ([`MsvcError::Filesystem`])
pub async fn download_file(
    url: &str,
    dest: &Path,
    expected_sha256: Option<&str>,
    retries: u32,
    callback: ProgressCallback,
) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| MsvcError::filesystem(parent, "cannot create directory", e))?;
    }

    let temp_path = temp_path_for(dest);
    let mut last_error = None;

    for attempt in 0..=retries {
        if attempt > 0 {
            let delay = calculate_retry_delay(attempt - 1);
            debug!(%url, attempt, delay_ms = delay, "retrying download");
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let result = match fetch_to(url, &temp_path, &callback).await {
            Ok(bytes) => match expected_sha256 {
                Some(expected) => verify_checksum(&temp_path, expected).map(|()| bytes),
                None => Ok(bytes),
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(bytes) => {
                tokio::fs::rename(&temp_path, dest).await.map_err(|e| {
                    MsvcError::filesystem(dest, "cannot move download into place", e)
                })?;
                callback(ProgressEvent::Completed);
                return Ok(bytes);
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                let fatal = matches!(
                    e.downcast_ref::<MsvcError>(),
                    Some(MsvcError::ChecksumMismatch { .. } | MsvcError::Filesystem { .. })
                );
                last_error = Some(e);
                if fatal {
                    break;
                }
            }
        }
    }

    let error = last_error.unwrap_or_else(|| MsvcError::download(url, "download failed").into());
    callback(ProgressEvent::Failed {
        error: error.to_string(),
    });
    Err(error)
}

/// Returns a unique temporary path next to `dest`.
fn temp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map_or_else(|| "download".into(), |n| n.to_string_lossy().into_owned());
    dest.with_file_name(format!("{name}.{:016x}.part", rand::random::<u64>()))
}

/// Performs one transfer attempt into `dest`.
async fn fetch_to(url: &str, dest: &Path, callback: &ProgressCallback) -> Result<u64> {
    if let Some(source) = local_path(url) {
        return copy_local(url, &source, dest, callback).await;
    }

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| MsvcError::download_with_source(url, "cannot create HTTP client", Box::new(e)))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| MsvcError::download_with_source(url, "request failed", Box::new(e)))?;

    if !response.status().is_success() {
        return Err(MsvcError::download(url, format!("HTTP error {}", response.status())).into());
    }

    let total_size = response.content_length().unwrap_or(0);
    callback(ProgressEvent::Started {
        url: url.to_string(),
        total: total_size,
    });

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| MsvcError::filesystem(dest, "cannot create file", e))?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let start_time = Instant::now();
    let mut last_callback_time = Instant::now();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| MsvcError::download_with_source(url, "transfer interrupted", Box::new(e)))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| MsvcError::filesystem(dest, "cannot write download", e))?;
        downloaded += chunk.len() as u64;

        let now = Instant::now();
        if now.duration_since(last_callback_time).as_millis() >= PROGRESS_CALLBACK_INTERVAL_MS {
            callback(ProgressEvent::Progress {
                downloaded,
                speed: speed(downloaded, start_time),
            });
            last_callback_time = now;
        }
    }

    file.flush()
        .await
        .map_err(|e| MsvcError::filesystem(dest, "cannot flush download", e))?;

    callback(ProgressEvent::Progress {
        downloaded,
        speed: speed(downloaded, start_time),
    });

    Ok(downloaded)
}

async fn copy_local(
    url: &str,
    source: &Path,
    dest: &Path,
    callback: &ProgressCallback,
) -> Result<u64> {
    let total = tokio::fs::metadata(source)
        .await
        .map_err(|e| MsvcError::download_with_source(url, "cannot read local payload", Box::new(e)))?
        .len();
    callback(ProgressEvent::Started {
        url: url.to_string(),
        total,
    });
    let start_time = Instant::now();
    let copied = tokio::fs::copy(source, dest)
        .await
        .map_err(|e| MsvcError::download_with_source(url, "cannot copy local payload", Box::new(e)))?;
    callback(ProgressEvent::Progress {
        downloaded: copied,
        speed: speed(copied, start_time),
    });
    Ok(copied)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn speed(downloaded: u64, start_time: Instant) -> u64 {
    let elapsed_secs = start_time.elapsed().as_secs_f64();
    if elapsed_secs > 0.0 {
        (downloaded as f64 / elapsed_secs) as u64
    } else {
        0
    }
}

/// Formats bytes into a human-readable string (KB, MB, GB).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Formats speed (bytes/sec) into a human-readable string.
#[must_use]
pub fn format_speed(speed: u64) -> String {
    format!("{}/s", format_bytes(speed))
}

/// Calculates the retry delay with exponential backoff and jitter.
///
/// The delay doubles with each attempt (1s, 2s, 4s) with +/- 25% jitter.
fn calculate_retry_delay(attempt: u32) -> u64 {
    let base_delay = BASE_RETRY_DELAY_MS * 2u64.pow(attempt.min(16));
    let jitter_range = base_delay / 4;
    let jitter = rand::rng().random_range(0..=jitter_range * 2);
    base_delay - jitter_range + jitter
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pmsvc_test_{}_{}", name, rand::random::<u64>()));
        std::fs::create_dir_all(&dir).expect("Should create temp dir");
        dir
    }

    fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let callback: ProgressCallback = Arc::new(move |event| sink.lock().unwrap().push(event));
        (callback, events)
    }

    #[test]
    fn retry_delay_increases_exponentially() {
        let delay_0 = calculate_retry_delay(0);
        let delay_1 = calculate_retry_delay(1);
        let delay_2 = calculate_retry_delay(2);

        assert!((750..=1250).contains(&delay_0), "Attempt 0 delay should be ~1000ms");
        assert!((1500..=2500).contains(&delay_1), "Attempt 1 delay should be ~2000ms");
        assert!((3000..=5000).contains(&delay_2), "Attempt 2 delay should be ~4000ms");
    }

    #[test]
    fn local_path_parses_file_urls() {
        assert_eq!(local_path("file:///tmp/a.json"), Some(PathBuf::from("/tmp/a.json")));
        assert_eq!(local_path("FILE:///tmp/a.json"), Some(PathBuf::from("/tmp/a.json")));
        assert_eq!(
            local_path("file://localhost/tmp/a.json"),
            Some(PathBuf::from("/tmp/a.json"))
        );
        assert_eq!(local_path("file:///C:/mirror/a.json"), Some(PathBuf::from("C:/mirror/a.json")));
        assert_eq!(local_path("https://example.invalid/a.json"), None);
        assert_eq!(local_path("file://"), None);
    }

    #[test]
    fn temp_path_is_unique_and_beside_dest() {
        let dest = Path::new("/cache/abc/tools.vsix");
        let a = temp_path_for(dest);
        let b = temp_path_for(dest);
        assert_ne!(a, b);
        assert_eq!(a.parent(), dest.parent());
        assert!(a.to_string_lossy().ends_with(".part"));
    }

    #[test]
    fn format_bytes_uses_binary_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
        assert_eq!(format_speed(1024), "1.00 KB/s");
    }

    #[tokio::test]
    async fn download_copies_file_url_and_verifies() {
        let dir = temp_dir("download_ok");
        let source = dir.join("source.bin");
        std::fs::write(&source, b"hello world\n").unwrap();
        let dest = dir.join("cache").join("dest.bin");
        let (callback, events) = recorder();

        let bytes = download_file(
            &format!("file://{}", source.display()),
            &dest,
            Some("a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447"),
            0,
            callback,
        )
        .await
        .expect("Should copy local file");

        assert_eq!(bytes, 12);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello world\n");
        let events = events.lock().unwrap();
        assert!(matches!(events.first(), Some(ProgressEvent::Started { total: 12, .. })));
        assert!(matches!(events.last(), Some(ProgressEvent::Completed)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn checksum_mismatch_leaves_no_file_behind() {
        let dir = temp_dir("download_mismatch");
        let source = dir.join("source.bin");
        std::fs::write(&source, b"tampered").unwrap();
        let dest = dir.join("cache").join("dest.bin");
        let (callback, events) = recorder();

        let err = download_file(
            &format!("file://{}", source.display()),
            &dest,
            Some(&"0".repeat(64)),
            3,
            callback,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MsvcError>(),
            Some(MsvcError::ChecksumMismatch { .. })
        ));
        assert!(!dest.exists());
        let leftovers: Vec<_> = std::fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .collect();
        assert!(leftovers.is_empty(), "partial files must be removed");
        assert!(matches!(
            events.lock().unwrap().last(),
            Some(ProgressEvent::Failed { .. })
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_local_source_is_download_error() {
        let dir = temp_dir("download_missing");
        let dest = dir.join("dest.bin");
        let (callback, _) = recorder();

        let err = download_file("file:///nonexistent/portable-msvc.vsix", &dest, None, 0, callback)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MsvcError>(),
            Some(MsvcError::Download { .. })
        ));
        assert!(!dest.exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
