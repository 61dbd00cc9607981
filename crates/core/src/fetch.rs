//! Page fetching with a narrow retry policy.
//!
//! [`fetch_with_fallback`] makes at most two attempts per URL:
//!
//! - a certificate verification failure is retried once with verification
//!   disabled (and only that error class ever reaches the insecure path);
//! - a transient failure (timeout, connect) is retried once as-is;
//! - anything else propagates after the first attempt.
//!
//! Transports implement [`Transport`]; [`HttpTransport`] is the `reqwest`
//! implementation used by the CLI.

use std::fs;
use std::future::Future;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::FetchError;
use crate::VaultlineError;

/// Default oEmbed endpoint for social posts.
pub const OEMBED_ENDPOINT: &str = "https://publish.twitter.com/oembed";

/// Default arXiv export API endpoint.
pub const ABSTRACTS_ENDPOINT: &str = "https://export.arxiv.org/api/query";

/// HTTP client configuration.
///
/// # Example
///
/// ```rust
/// use vaultline_core::FetchConfig;
///
/// let config = FetchConfig::builder().timeout(10).user_agent("my-agent/1.0").build();
/// assert_eq!(config.timeout, 10);
/// ```
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-attempt timeout in seconds.
    pub timeout: u64,
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Embed-metadata endpoint, queried with `?url=<source>`.
    pub oembed_endpoint: String,
    /// Abstracts endpoint, queried with `?id_list=<identifier>`.
    pub abstracts_endpoint: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            user_agent: "Mozilla/5.0 (compatible; Vaultline/1.0; knowledge-ingestor)".to_string(),
            oembed_endpoint: OEMBED_ENDPOINT.to_string(),
            abstracts_endpoint: ABSTRACTS_ENDPOINT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn builder() -> FetchConfigBuilder {
        FetchConfigBuilder::default()
    }
}

/// Builder for [`FetchConfig`].
#[derive(Debug, Default)]
pub struct FetchConfigBuilder {
    config: FetchConfig,
}

impl FetchConfigBuilder {
    /// Sets the per-attempt timeout in seconds.
    pub fn timeout(mut self, secs: u64) -> Self {
        self.config.timeout = secs;
        self
    }

    /// Sets the User-Agent header.
    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.config.user_agent = value.into();
        self
    }

    pub fn oembed_endpoint(mut self, value: impl Into<String>) -> Self {
        self.config.oembed_endpoint = value.into();
        self
    }

    pub fn abstracts_endpoint(mut self, value: impl Into<String>) -> Self {
        self.config.abstracts_endpoint = value.into();
        self
    }

    pub fn build(self) -> FetchConfig {
        self.config
    }
}

/// Certificate handling for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    Verified,
    /// Certificate and hostname checks disabled.
    Insecure,
}

/// A single-attempt GET returning the decoded body.
pub trait Transport {
    fn get(&self, url: &str, tls: TlsMode) -> impl Future<Output = Result<String, FetchError>>;
}

/// Serves a fixed body for one URL and defers everything else to `inner`.
///
/// Used when the page body is supplied locally (a saved copy of a
/// paywalled or JavaScript-rendered page) while secondary metadata still
/// goes over the network.
#[derive(Debug, Clone)]
pub struct PinnedTransport<T> {
    url: String,
    body: String,
    inner: T,
}

impl<T: Transport> PinnedTransport<T> {
    pub fn new(url: impl Into<String>, body: impl Into<String>, inner: T) -> Self {
        Self { url: url.into(), body: body.into(), inner }
    }
}

impl<T: Transport> Transport for PinnedTransport<T> {
    async fn get(&self, url: &str, tls: TlsMode) -> Result<String, FetchError> {
        if url == self.url {
            return Ok(self.body.clone());
        }
        self.inner.get(url, tls).await
    }
}

/// Read a saved HTML page from disk.
pub fn fetch_file(path: &str) -> crate::Result<String> {
    let path_buf = PathBuf::from(path);

    if !path_buf.exists() {
        Err(VaultlineError::FileNotFound(path_buf))
    } else {
        fs::read_to_string(&path_buf).map_err(VaultlineError::from)
    }
}

/// Read an HTML page from standard input until EOF.
pub fn fetch_stdin() -> crate::Result<String> {
    use std::io::{self, Read};

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

/// Fetch `url`, applying the retry policy described in the module docs.
pub async fn fetch_with_fallback<T: Transport>(transport: &T, url: &str) -> Result<String, FetchError> {
    debug!(%url, "fetching");
    match transport.get(url, TlsMode::Verified).await {
        Ok(body) => Ok(body),
        Err(err) if err.is_certificate() => {
            warn!(%url, error = %err, "certificate verification failed; retrying once without verification");
            transport.get(url, TlsMode::Insecure).await
        }
        Err(err) if err.is_transient() => {
            warn!(%url, error = %err, "transient failure; retrying once");
            transport.get(url, TlsMode::Verified).await
        }
        Err(err) => Err(err),
    }
}

/// True when an error chain describes a certificate verification failure.
///
/// Covers rustls (`invalid peer certificate: UnknownIssuer`), OpenSSL
/// (`certificate verify failed`) and platform verifier wording.
pub fn is_certificate_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("certificate") || lower.contains("unknownissuer") || lower.contains("self signed")
}

/// Join an error and all of its sources into one message.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// `reqwest`-backed transport.
#[cfg(feature = "fetch")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: FetchConfig,
    verified: reqwest::Client,
}

#[cfg(feature = "fetch")]
impl HttpTransport {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let verified = build_client(&config, TlsMode::Verified)?;
        Ok(Self { config, verified })
    }
}

#[cfg(feature = "fetch")]
fn build_client(config: &FetchConfig, tls: TlsMode) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout))
        .user_agent(config.user_agent.clone())
        .danger_accept_invalid_certs(tls == TlsMode::Insecure)
        .danger_accept_invalid_hostnames(tls == TlsMode::Insecure)
        .build()
        .map_err(|err| FetchError::Request(error_chain(&err)))
}

#[cfg(feature = "fetch")]
fn classify(err: reqwest::Error) -> FetchError {
    let message = error_chain(&err);
    if is_certificate_failure(&message) {
        FetchError::Certificate(message)
    } else if err.is_timeout() || err.is_connect() {
        FetchError::Transient(message)
    } else {
        FetchError::Request(message)
    }
}

#[cfg(feature = "fetch")]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, tls: TlsMode) -> Result<String, FetchError> {
        let insecure;
        let client = match tls {
            TlsMode::Verified => &self.verified,
            TlsMode::Insecure => {
                insecure = build_client(&self.config, TlsMode::Insecure)?;
                &insecure
            }
        };

        let response = client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16() });
        }

        response.text().await.map_err(classify)
    }
}
