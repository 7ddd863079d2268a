//! Production transport over `reqwest`.

use bytes::Bytes;
use reqwest::Client;

use super::{
    BoxFuture, Method, Transport, TransportError, TransportRequest, TransportResponse,
    DEFAULT_TIMEOUT,
};

/// HTTP transport backed by a shared `reqwest` client.
///
/// The client carries connection pooling and TLS state; clone the wrapper
/// freely, clones share the pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the default client configuration.
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (e.g. one with custom TLS or proxy setup).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn to_reqwest_method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    fn map_error(e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

impl Transport for HttpTransport {
    fn execute(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let mut builder =
                client.request(Self::to_reqwest_method(request.method), &request.url);

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(Self::map_error)?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body: Bytes = response.bytes().await.map_err(Self::map_error)?;

            Ok(TransportResponse {
                status,
                headers,
                body,
            })
        })
    }
}
