//! reqwest-backed [`HttpTransport`].

use std::time::Duration;

use futures::StreamExt;
use reqwest::{header, Client};

use crate::manager::error::{InstallError, InstallerResult};
use crate::manager::traits::{BoxFuture, HttpResponse, HttpTransport};

/// HTTP transport built on an async reqwest client.
///
/// Only a connect timeout is applied; packs can be several gigabytes so the
/// total transfer time is not bounded.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with the given connect timeout and user agent.
    pub fn new(connect_timeout: Duration, user_agent: &str) -> InstallerResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                InstallError::InvalidConfig(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get<'a>(
        &'a self,
        url: &'a str,
        range_start: Option<u64>,
    ) -> BoxFuture<'a, InstallerResult<HttpResponse>> {
        Box::pin(async move {
            let mut request = self.client.get(url);
            if let Some(start) = range_start {
                request = request.header(header::RANGE, format!("bytes={}-", start));
            }

            let response = request.send().await.map_err(|e| InstallError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

            let status = response.status().as_u16();
            let owned_url = url.to_string();
            let body = response
                .bytes_stream()
                .map(move |chunk| {
                    chunk.map_err(|e| InstallError::Transport {
                        url: owned_url.clone(),
                        reason: format!("read error: {}", e),
                    })
                })
                .boxed();

            Ok(HttpResponse { status, body })
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use bytes::Bytes;

    /// A request observed by [`MockTransport`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedRequest {
        pub url: String,
        pub range_start: Option<u64>,
    }

    /// How the mock answers range requests for a URL.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum RangeSupport {
        /// Answer 206 with the requested suffix.
        Honour,
        /// Ignore the range and answer 200 with the full body.
        Ignore,
    }

    #[derive(Debug, Clone)]
    struct MockResource {
        body: Vec<u8>,
        status: u16,
        ranges: RangeSupport,
    }

    /// In-memory transport for tests.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        resources: Mutex<HashMap<String, MockResource>>,
        requests: Mutex<Vec<RecordedRequest>>,
        chunk_size: usize,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                chunk_size: 64,
                ..Default::default()
            }
        }

        pub fn serve(self, url: &str, body: Vec<u8>, ranges: RangeSupport) -> Self {
            self.resources.lock().unwrap().insert(
                url.to_string(),
                MockResource {
                    body,
                    status: 200,
                    ranges,
                },
            );
            self
        }

        pub fn fail(self, url: &str, status: u16) -> Self {
            self.resources.lock().unwrap().insert(
                url.to_string(),
                MockResource {
                    body: Vec::new(),
                    status,
                    ranges: RangeSupport::Ignore,
                },
            );
            self
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl HttpTransport for MockTransport {
        fn get<'a>(
            &'a self,
            url: &'a str,
            range_start: Option<u64>,
        ) -> BoxFuture<'a, InstallerResult<HttpResponse>> {
            Box::pin(async move {
                self.requests.lock().unwrap().push(RecordedRequest {
                    url: url.to_string(),
                    range_start,
                });

                let resource = self
                    .resources
                    .lock()
                    .unwrap()
                    .get(url)
                    .cloned()
                    .ok_or_else(|| InstallError::Transport {
                        url: url.to_string(),
                        reason: "connection refused".to_string(),
                    })?;

                let (status, body) = match (range_start, resource.ranges) {
                    _ if resource.status != 200 => (resource.status, Vec::new()),
                    (Some(start), RangeSupport::Honour) => {
                        let start = (start as usize).min(resource.body.len());
                        (206, resource.body[start..].to_vec())
                    }
                    _ => (200, resource.body),
                };

                let chunks: Vec<InstallerResult<Bytes>> = body
                    .chunks(self.chunk_size.max(1))
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect();

                Ok(HttpResponse {
                    status,
                    body: futures::stream::iter(chunks).boxed(),
                })
            })
        }
    }

    #[test]
    fn test_reqwest_transport_new() {
        assert!(ReqwestTransport::new(Duration::from_secs(10), "test-agent").is_ok());
    }

    #[tokio::test]
    async fn test_mock_transport_records_requests() {
        let mock = MockTransport::new().serve("http://a/x", vec![1, 2, 3], RangeSupport::Honour);

        let response = mock.get("http://a/x", Some(1)).await.unwrap();
        assert_eq!(response.status, 206);

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].range_start, Some(1));
    }

    #[tokio::test]
    async fn test_mock_transport_unknown_url() {
        let mock = MockTransport::new();
        let result = mock.get("http://a/missing", None).await;
        assert!(matches!(result, Err(InstallError::Transport { .. })));
    }
}
