use std::error::Error as StdError;
use std::time::Duration;

use log::{debug, error, info};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::redirect::Policy;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{FetchFailure, PipelineError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Bounds applied to every single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    pub timeout_ms: u64,
    pub max_redirects: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_redirects: 5,
        }
    }
}

impl FetchOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Text payload of one successful fetch. Dropped once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub locator: String,
    pub text: String,
    pub byte_len: usize,
}

impl RawDocument {
    pub fn new(locator: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            locator: locator.into(),
            byte_len: text.len(),
            text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetching {locator} failed ({kind}): {message}")]
pub struct FetchError {
    pub locator: String,
    pub kind: FetchFailure,
    pub status: Option<u16>,
    pub message: String,
}

impl FetchError {
    pub fn new(locator: &str, kind: FetchFailure, message: impl Into<String>) -> Self {
        Self {
            locator: locator.to_string(),
            kind,
            status: None,
            message: message.into(),
        }
    }
}

impl From<FetchError> for PipelineError {
    fn from(e: FetchError) -> Self {
        PipelineError::FetchFailed {
            locator: e.locator,
            kind: e.kind,
            status: e.status,
            message: e.message,
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch seam
// ---------------------------------------------------------------------------

/// Retrieves a remote document as text. One attempt, no retry.
///
/// Implementations are shared across the per-source worker threads.
pub trait Fetch: Send + Sync {
    fn fetch(&self, locator: &str) -> Result<RawDocument, FetchError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Blocking HTTP fetcher with a per-request timeout and redirect cap.
///
/// Idle connections are not kept, so every fetch is an independent call.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(options: &FetchOptions) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(options.timeout())
            .redirect(Policy::limited(options.max_redirects))
            .pool_max_idle_per_host(0)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, locator: &str) -> Result<RawDocument, FetchError> {
        let url = Url::parse(locator)
            .map_err(|e| FetchError::new(locator, FetchFailure::InvalidLocator, e.to_string()))?;

        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "*/*")
            .send()
            .map_err(|e| classify(locator, e))?;

        let status = response.status();
        if !status.is_success() {
            let err = FetchError {
                status: Some(status.as_u16()),
                ..FetchError::new(locator, FetchFailure::Status, format!("HTTP {status}"))
            };
            error!("{err}");
            return Err(err);
        }

        let text = response.text().map_err(|e| classify(locator, e))?;
        let doc = RawDocument::new(locator, text);
        info!("downloaded {locator}, size: {} bytes", doc.byte_len);
        Ok(doc)
    }
}

/// Map a transport error onto the failure taxonomy.
fn classify(locator: &str, e: reqwest::Error) -> FetchError {
    let kind = if e.is_timeout() {
        FetchFailure::Timeout
    } else if e.is_redirect() {
        FetchFailure::TooManyRedirects
    } else if e.is_connect() {
        FetchFailure::Unreachable
    } else if e.is_body() || e.is_decode() {
        FetchFailure::Body
    } else {
        FetchFailure::Unreachable
    };

    let mut message = e.to_string();
    let mut source = StdError::source(&e);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    let err = FetchError {
        status: e.status().map(|s| s.as_u16()),
        ..FetchError::new(locator, kind, message)
    };
    error!("{err}");
    err
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    /// Serve every incoming connection with `respond(n)` on a detached thread.
    fn serve<F>(respond: F) -> String
    where
        F: Fn(usize) -> Vec<u8> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for (n, stream) in listener.incoming().enumerate() {
                let Ok(mut stream) = stream else { break };
                let mut request_buf = [0u8; 2048];
                let _ = stream.read(&mut request_buf);
                let _ = stream.write_all(&respond(n));
                let _ = stream.flush();
            }
        });
        format!("http://{addr}")
    }

    fn response(status_line: &str, extra_headers: &str, body: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n{extra_headers}\r\n{body}",
            body.len()
        )
        .into_bytes()
    }

    fn fetcher(timeout_ms: u64, max_redirects: usize) -> HttpFetcher {
        HttpFetcher::new(&FetchOptions {
            timeout_ms,
            max_redirects,
        })
        .unwrap()
    }

    #[test]
    fn returns_body_and_byte_length() {
        let body = "quarter,urate\n2020Q1,3.5\n";
        let base = serve(move |_| response("200 OK", "", body));
        let locator = format!("{base}/data.csv");

        let doc = fetcher(5_000, 5).fetch(&locator).unwrap();
        assert_eq!(doc.text, body);
        assert_eq!(doc.byte_len, body.len());
        assert_eq!(doc.locator, locator);
    }

    #[test]
    fn non_success_status_is_reported_with_status() {
        let base = serve(|_| response("404 Not Found", "", "404: Not Found"));
        let locator = format!("{base}/plucking_ugap_quarterly_atlantis.csv");

        let err = fetcher(5_000, 5).fetch(&locator).unwrap_err();
        assert_eq!(err.kind, FetchFailure::Status);
        assert_eq!(err.status, Some(404));
        assert_eq!(err.locator, locator);
    }

    #[test]
    fn endless_redirects_are_capped() {
        let base = serve(|n| {
            response(
                "302 Found",
                &format!("Location: /hop-{}\r\n", n + 1),
                "",
            )
        });

        let err = fetcher(5_000, 2).fetch(&format!("{base}/start")).unwrap_err();
        assert_eq!(err.kind, FetchFailure::TooManyRedirects);
    }

    #[test]
    fn slow_server_times_out() {
        let base = serve(|_| {
            thread::sleep(Duration::from_millis(1_500));
            response("200 OK", "", "late")
        });

        let err = fetcher(200, 5).fetch(&format!("{base}/slow.csv")).unwrap_err();
        assert_eq!(err.kind, FetchFailure::Timeout);
    }

    #[test]
    fn refused_connection_is_unreachable() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let err = fetcher(2_000, 5).fetch(&format!("http://{addr}/x.csv")).unwrap_err();
        assert_eq!(err.kind, FetchFailure::Unreachable);
        assert_eq!(err.status, None);
    }

    #[test]
    fn relative_locator_is_invalid() {
        let err = fetcher(2_000, 5).fetch("data/x.csv").unwrap_err();
        assert_eq!(err.kind, FetchFailure::InvalidLocator);
    }
}
