//! Hiscore lookups.
//!
//! A name that has a hiscore entry is taken; a name the hiscores answer
//! with "not found" for is potentially available. Both game variants expose
//! the same `index_lite.ws` endpoint under different paths, so one client
//! type serves both, parameterized by [`Source`].
//!
//! This is the only place that interprets provider responses and error
//! text. Callers see a three-way [`Outcome`].

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::checker::AvailabilityChecker;
use crate::error::NameCheckError;
use crate::types::{Outcome, Source};

const OSRS_ENDPOINT: &str = "https://secure.runescape.com/m=hiscore_oldschool/index_lite.ws";
const RS3_ENDPOINT: &str = "https://secure.runescape.com/m=hiscore/index_lite.ws";

/// Default endpoint for a hiscore variant.
pub fn default_endpoint(source: Source) -> &'static str {
    match source {
        Source::Osrs => OSRS_ENDPOINT,
        Source::Rs3 => RS3_ENDPOINT,
    }
}

/// HTTP client for one hiscore variant.
#[derive(Clone, Debug)]
pub struct HiscoreClient {
    http_client: reqwest::Client,
    source: Source,
    endpoint: String,
}

impl HiscoreClient {
    /// Create a client with a 10 second request timeout.
    pub fn new(source: Source) -> Result<Self, NameCheckError> {
        Self::with_timeout(source, Duration::from_secs(10))
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(source: Source, timeout: Duration) -> Result<Self, NameCheckError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("name-check/{}", crate::VERSION))
            .build()
            .map_err(|e| {
                NameCheckError::network(format!("Failed to create hiscore HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            source,
            endpoint: default_endpoint(source).to_string(),
        })
    }

    /// Point the client at a different `index_lite.ws` endpoint (mirrors, proxies).
    pub fn with_endpoint<E: Into<String>>(mut self, endpoint: E) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Full lookup URL for `name`, with the name query-encoded.
    pub fn lookup_url(&self, name: &str) -> Result<Url, NameCheckError> {
        Url::parse_with_params(&self.endpoint, &[("player", name)]).map_err(|e| {
            NameCheckError::config(format!("Invalid hiscore endpoint '{}': {}", self.endpoint, e))
        })
    }

    /// Perform the lookup without cancellation.
    pub async fn lookup(&self, name: &str) -> Outcome {
        let url = match self.lookup_url(name) {
            Ok(url) => url,
            Err(e) => return Outcome::error(e.to_string()),
        };

        let start = Instant::now();
        let outcome = match self.http_client.get(url).send().await {
            Ok(response) if response.status() == StatusCode::OK => match response.text().await {
                Ok(body) => classify_body(&body),
                Err(e) => Outcome::error(format!("failed to read response: {}", e.without_url())),
            },
            Ok(response) => classify_status(response.status()),
            // The URL carries the name, keep it out of the matched text
            Err(e) => classify_failure(&e.without_url().to_string()),
        };

        debug!(
            source = self.source.key(),
            name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ?outcome,
            "hiscore lookup"
        );
        outcome
    }
}

#[async_trait]
impl AvailabilityChecker for HiscoreClient {
    fn source(&self) -> &str {
        self.source.display_name()
    }

    async fn check(&self, name: &str, cancel: &CancellationToken) -> Outcome {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Outcome::error("cancelled"),
            outcome = self.lookup(name) => outcome,
        }
    }
}

/// A 200 answer only means "taken" when the body is an `index_lite` table:
/// lines of comma-separated integers (`rank,level,xp` or `rank,score`).
/// Anything else (maintenance or challenge pages) is not an answer.
pub(crate) fn classify_body(body: &str) -> Outcome {
    if is_index_lite(body) {
        Outcome::Taken
    } else {
        Outcome::error("malformed hiscore response")
    }
}

fn is_index_lite(body: &str) -> bool {
    let mut lines = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .peekable();

    lines.peek().is_some()
        && lines.all(|line| {
            line.split(',')
                .all(|field| field.trim().parse::<i64>().is_ok())
        })
}

/// Map a non-200 HTTP status from `index_lite.ws` to an outcome.
pub(crate) fn classify_status(status: StatusCode) -> Outcome {
    match status {
        StatusCode::NOT_FOUND => Outcome::Available,
        StatusCode::TOO_MANY_REQUESTS => Outcome::error("rate limited (HTTP 429)"),
        code => Outcome::error(format!("unexpected response: HTTP {}", code.as_u16())),
    }
}

/// Map failure text to an outcome. Messages in the "not found" class mean
/// the hiscores have no such player.
pub(crate) fn classify_failure(message: &str) -> Outcome {
    let lower = message.to_lowercase();
    if lower.contains("not found") || lower.contains("404") {
        Outcome::Available
    } else {
        Outcome::error(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MAX_ERROR_LEN;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response on a local port and return the
    /// endpoint URL pointing at it.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}/index_lite.ws", addr)
    }

    #[test]
    fn test_client_creation() {
        let client = HiscoreClient::new(Source::Rs3).unwrap();
        assert_eq!(client.source(), "RS3 Hiscores");
    }

    #[test]
    fn test_classify_body() {
        assert_eq!(
            classify_body("1,2277,4600000000\n-1,-1,-1\n25,99,13034431\n-1,-1\n"),
            Outcome::Taken
        );
        assert_eq!(
            classify_body("<html><body>Service temporarily unavailable</body></html>"),
            Outcome::error("malformed hiscore response")
        );
        assert_eq!(
            classify_body("  \n"),
            Outcome::error("malformed hiscore response")
        );
        assert_eq!(
            classify_body("1,2,3\nnot,a,number\n"),
            Outcome::error("malformed hiscore response")
        );
    }

    #[tokio::test]
    async fn test_html_page_with_200_is_an_error() {
        let endpoint = serve_once(
            "200 OK",
            "<html><body>Service temporarily unavailable</body></html>",
        )
        .await;
        let client = HiscoreClient::new(Source::Osrs)
            .unwrap()
            .with_endpoint(endpoint);

        let outcome = client.check("Zezima", &CancellationToken::new()).await;
        assert_eq!(outcome, Outcome::error("malformed hiscore response"));
    }

    #[tokio::test]
    async fn test_local_hiscore_answers() {
        let endpoint = serve_once("200 OK", "1,2277,4600000000\n-1,-1\n").await;
        let client = HiscoreClient::new(Source::Osrs)
            .unwrap()
            .with_endpoint(endpoint);
        assert_eq!(
            client.check("Zezima", &CancellationToken::new()).await,
            Outcome::Taken
        );

        let endpoint = serve_once("404 Not Found", "").await;
        let client = client.with_endpoint(endpoint);
        assert_eq!(
            client.check("ab", &CancellationToken::new()).await,
            Outcome::Available
        );
    }

    #[test]
    fn test_lookup_url_encodes_name() {
        let client = HiscoreClient::new(Source::Osrs).unwrap();
        let url = client.lookup_url("john doe").unwrap();
        assert!(url.as_str().starts_with(OSRS_ENDPOINT));
        assert!(url.as_str().ends_with("player=john+doe"));
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::NOT_FOUND), Outcome::Available);
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            Outcome::ProviderError("unexpected response: HTTP 503".to_string())
        );
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(classify_failure("Player Not Found"), Outcome::Available);
        assert_eq!(classify_failure("HTTP status 404"), Outcome::Available);

        let long = format!("connection reset {}", "x".repeat(100));
        match classify_failure(&long) {
            Outcome::ProviderError(message) => assert_eq!(message.len(), MAX_ERROR_LEN),
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_before_request() {
        let client = HiscoreClient::new(Source::Osrs)
            .unwrap()
            .with_endpoint("http://10.255.255.1/index_lite.ws");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = tokio_test::block_on(client.check("ab", &cancel));
        assert_eq!(outcome, Outcome::ProviderError("cancelled".to_string()));
    }

    /// Hits the live hiscores, so it only runs on request.
    #[tokio::test]
    #[ignore]
    async fn test_known_taken_name() {
        let client = HiscoreClient::new(Source::Osrs).unwrap();
        assert_eq!(client.lookup("Lynx Titan").await, Outcome::Taken);
    }
}
