//! Fetch stage: stream a manual's PDF to `<data>/raw/<slug>.pdf`.
//!
//! ## Why check the content type?
//!
//! Vendor download endpoints answer an expired session with `200 OK` and an
//! HTML login page. Without the check that page would be saved as a "PDF"
//! and only fail much later inside pdfium. The body is streamed to a
//! `.tmp` sibling and renamed into place only once complete, so an
//! interrupted run never leaves a truncated PDF that the next run would
//! skip as already downloaded.

use crate::config::PipelineConfig;
use crate::error::CorpusError;
use crate::manifest::ManualConfig;
use crate::output::FetchOutcome;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// JSON object of extra request headers, merged over the defaults.
pub const HEADERS_ENV_VAR: &str = "TESLA_DOWNLOAD_HEADERS";

const DEFAULT_HEADERS: [(&str, &str); 5] = [
    (
        "user-agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36",
    ),
    ("accept-language", "es-MX,es;q=0.9,en;q=0.8"),
    ("accept", "application/pdf"),
    ("accept-encoding", "identity"),
    ("referer", "https://www.tesla.com/ownersmanual"),
];

/// Build the request header set.
///
/// Precedence, highest first: `headers_file`, `env_value`
/// (the contents of [`HEADERS_ENV_VAR`]), built-in defaults. Header names
/// compare case-insensitively, so `{"user-agent": …}` replaces the default
/// `User-Agent`.
pub fn resolve_headers(
    env_value: Option<&str>,
    headers_file: Option<&Path>,
) -> Result<HeaderMap, CorpusError> {
    let mut headers = HeaderMap::new();

    if let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) {
        merge_json_headers(&mut headers, raw, HEADERS_ENV_VAR)?;
    }

    if let Some(path) = headers_file {
        if !path.exists() {
            return Err(CorpusError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|e| CorpusError::io(path, e))?;
        merge_json_headers(&mut headers, &raw, &path.display().to_string())?;
    }

    for (name, value) in DEFAULT_HEADERS {
        if !headers.contains_key(name) {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
    }

    Ok(headers)
}

/// [`resolve_headers`] with the environment variable read from the process.
pub fn headers_from_env_or_file(headers_file: Option<&Path>) -> Result<HeaderMap, CorpusError> {
    let env_value = std::env::var(HEADERS_ENV_VAR).ok();
    resolve_headers(env_value.as_deref(), headers_file)
}

fn merge_json_headers(headers: &mut HeaderMap, raw: &str, origin: &str) -> Result<(), CorpusError> {
    let invalid = |detail: String| CorpusError::InvalidHeaders {
        origin: origin.to_string(),
        detail,
    };

    let value: Value = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
    let Value::Object(entries) = value else {
        return Err(invalid("expected a JSON object of header names to values".into()));
    };

    for (name, value) in entries {
        let value = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| invalid(format!("header name '{name}': {e}")))?;
        let header_value = HeaderValue::from_str(&value)
            .map_err(|e| invalid(format!("value of '{name}': {e}")))?;
        headers.insert(header_name, header_value);
    }
    Ok(())
}

/// Create the HTTP client used for every download in a run.
///
/// `timeout_secs` bounds connecting and each read of the body, not the whole
/// transfer, so large manuals on slow links still complete.
pub fn build_client(headers: HeaderMap, timeout_secs: u64) -> Result<reqwest::Client, CorpusError> {
    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(timeout_secs))
        .read_timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| CorpusError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Download one manual's PDF, unless it is already present.
pub async fn fetch_manual(
    client: &reqwest::Client,
    manual: &ManualConfig,
    config: &PipelineConfig,
) -> Result<FetchOutcome, CorpusError> {
    let destination = manual.raw_pdf_path(&config.layout());

    if destination.exists() && !config.force {
        info!(
            "[SKIP] {} already present at {}",
            manual.display_name,
            destination.display()
        );
        return Ok(FetchOutcome::Skipped { path: destination });
    }

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CorpusError::io(parent, e))?;
    }

    info!("Downloading {} from {}", manual.display_name, manual.pdf_url);
    let url = manual.pdf_url.as_str();
    let secs = config.timeout_secs;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| transport_error(url, secs, e))?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(CorpusError::AccessDenied {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Err(CorpusError::Http {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    if !content_type.contains("pdf") {
        return Err(CorpusError::ContentTypeMismatch {
            content_type: if content_type.is_empty() {
                "unknown".to_string()
            } else {
                content_type
            },
        });
    }

    let total = response.content_length().filter(|n| *n > 0);
    let label = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| manual.pdf_file_name());
    if let Some(ref cb) = config.progress_callback {
        cb.on_download_start(&label, total);
    }

    let tmp_path = destination.with_extension("tmp");
    let written = match stream_to_file(response, &tmp_path, url, secs, config).await {
        Ok(n) => n,
        Err(e) => {
            // Never leave a partial body behind.
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }
    };

    tokio::fs::rename(&tmp_path, &destination)
        .await
        .map_err(|e| CorpusError::io(&destination, e))?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_download_complete(written);
    }
    info!("[OK] Saved {} ({} bytes)", destination.display(), written);

    Ok(FetchOutcome::Downloaded {
        path: destination,
        bytes: written,
    })
}

async fn stream_to_file(
    response: reqwest::Response,
    tmp_path: &Path,
    url: &str,
    secs: u64,
    config: &PipelineConfig,
) -> Result<u64, CorpusError> {
    let mut file = tokio::fs::File::create(tmp_path)
        .await
        .map_err(|e| CorpusError::io(tmp_path, e))?;

    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| transport_error(url, secs, e))?;
        if chunk.is_empty() {
            continue;
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| CorpusError::io(tmp_path, e))?;
        written += chunk.len() as u64;
        if let Some(ref cb) = config.progress_callback {
            cb.on_download_progress(written);
        }
    }

    file.flush().await.map_err(|e| CorpusError::io(tmp_path, e))?;
    debug!("Streamed {} bytes to {}", written, tmp_path.display());
    Ok(written)
}

fn transport_error(url: &str, secs: u64, e: reqwest::Error) -> CorpusError {
    if e.is_timeout() {
        CorpusError::DownloadTimeout {
            url: url.to_string(),
            secs,
        }
    } else {
        CorpusError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_fill_every_required_header() {
        let h = resolve_headers(None, None).unwrap();
        assert!(h["user-agent"].to_str().unwrap().starts_with("Mozilla/5.0"));
        assert_eq!(h["accept"], "application/pdf");
        assert_eq!(h["accept-encoding"], "identity");
        assert_eq!(h["accept-language"], "es-MX,es;q=0.9,en;q=0.8");
        assert_eq!(h["referer"], "https://www.tesla.com/ownersmanual");
    }

    #[test]
    fn env_overrides_defaults_case_insensitively() {
        let h = resolve_headers(Some(r#"{"User-Agent": "curl/8", "Cookie": "a=1"}"#), None).unwrap();
        assert_eq!(h["user-agent"], "curl/8");
        assert_eq!(h["cookie"], "a=1");
        assert_eq!(h.get_all("user-agent").iter().count(), 1);
    }

    #[test]
    fn file_overrides_env() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"cookie": "session=file", "Referer": "https://example.com"}}"#).unwrap();

        let h = resolve_headers(Some(r#"{"Cookie": "session=env"}"#), Some(f.path())).unwrap();
        assert_eq!(h["cookie"], "session=file");
        assert_eq!(h["referer"], "https://example.com");
    }

    #[test]
    fn missing_headers_file_is_not_found() {
        let err = resolve_headers(None, Some(Path::new("/nonexistent/headers.json"))).unwrap_err();
        assert!(matches!(err, CorpusError::FileNotFound { .. }));
    }

    #[test]
    fn non_object_headers_rejected() {
        let err = resolve_headers(Some(r#"["Cookie"]"#), None).unwrap_err();
        assert!(matches!(err, CorpusError::InvalidHeaders { .. }));

        let err = resolve_headers(Some("not json"), None).unwrap_err();
        assert!(matches!(err, CorpusError::InvalidHeaders { .. }));
    }

    #[test]
    fn blank_env_value_is_ignored() {
        assert!(resolve_headers(Some("   "), None).is_ok());
    }
}
