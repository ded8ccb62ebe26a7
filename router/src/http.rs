//! Request routing and the remote read/write envelope codec.

use generated_types::prompb::{QueryResult, ReadRequest, ReadResponse, WriteRequest};
use hyper::header::{HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use observability_deps::tracing::{debug, warn};
use prost::Message;
use std::sync::Arc;
use store::SeriesStore;
use thiserror::Error;

/// Errors from handling one HTTP request.
#[derive(Debug, Error)]
pub enum Error {
    /// The request body could not be read in full.
    #[error("failed to read request body: {0}")]
    ClientHangup(hyper::Error),

    /// The body was not valid Snappy data.
    #[error("failed to decompress request body: {0}")]
    Decompress(snap::Error),

    /// The decompressed body was not a valid protobuf message.
    #[error("failed to decode protobuf payload: {0}")]
    Decode(prost::DecodeError),

    /// Compressing the response failed.
    #[error("failed to compress response body: {0}")]
    Compress(snap::Error),

    /// The store rejected or failed the operation.
    #[error(transparent)]
    Store(#[from] store::Error),

    /// No route for this method/path pair.
    #[error("not found")]
    NotFound,
}

impl Error {
    /// The status code the client should see for this error.
    pub fn as_status_code(&self) -> StatusCode {
        match self {
            Self::ClientHangup(_) | Self::Compress(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Decompress(_) | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Store(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

/// Routes requests to the write/read handlers.
#[derive(Debug)]
pub struct HttpDelegate {
    store: Arc<SeriesStore>,
}

impl HttpDelegate {
    /// Creates a delegate dispatching into `store`.
    pub fn new(store: Arc<SeriesStore>) -> Self {
        Self { store }
    }

    /// Handles one request, mapping any failure to its status code.
    pub async fn route(&self, req: Request<Body>) -> Response<Body> {
        let result = match (req.method(), req.uri().path()) {
            (&Method::POST, "/write") => self.handle_write(req).await,
            (&Method::POST, "/read") => self.handle_read(req).await,
            _ => Err(Error::NotFound),
        };

        result.unwrap_or_else(|e| {
            warn!(error = %e, status = %e.as_status_code(), "request failed");
            let mut resp = Response::new(Body::empty());
            *resp.status_mut() = e.as_status_code();
            resp
        })
    }

    async fn handle_write(&self, req: Request<Body>) -> Result<Response<Body>, Error> {
        let payload = decode_body::<WriteRequest>(req).await?;
        debug!(series = payload.timeseries.len(), "write request");

        // Series are processed in order; the first failure fails the whole
        // request, there is no partial-success contract.
        for series in &payload.timeseries {
            self.store.ensure_schema(series).await?;
            self.store.write_samples(series).await?;
        }

        let mut resp = Response::new(Body::empty());
        *resp.status_mut() = StatusCode::NO_CONTENT;
        Ok(resp)
    }

    async fn handle_read(&self, req: Request<Body>) -> Result<Response<Body>, Error> {
        let payload = decode_body::<ReadRequest>(req).await?;
        debug!(queries = payload.queries.len(), "read request");

        let mut results = Vec::with_capacity(payload.queries.len());
        for query in &payload.queries {
            results.push(QueryResult {
                timeseries: self.store.read_samples(query).await?,
            });
        }

        let response = ReadResponse { results };
        let body = snap::raw::Encoder::new()
            .compress_vec(&response.encode_to_vec())
            .map_err(Error::Compress)?;

        let mut resp = Response::new(Body::from(body));
        resp.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-protobuf"),
        );
        resp.headers_mut()
            .insert(CONTENT_ENCODING, HeaderValue::from_static("snappy"));
        Ok(resp)
    }
}

/// Reads, decompresses and decodes one request body.
async fn decode_body<T: Message + Default>(req: Request<Body>) -> Result<T, Error> {
    let compressed = hyper::body::to_bytes(req.into_body())
        .await
        .map_err(Error::ClientHangup)?;
    let raw = snap::raw::Decoder::new()
        .decompress_vec(&compressed)
        .map_err(Error::Decompress)?;
    T::decode(raw.as_slice()).map_err(Error::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoff::RetryConfig;
    use generated_types::prompb::{label_matcher, Label, LabelMatcher, Query, Sample, TimeSeries};
    use std::time::Duration;
    use store::mem::MemDatabase;

    fn delegate() -> HttpDelegate {
        let store = SeriesStore::new(
            Arc::new(MemDatabase::new()),
            RetryConfig {
                max_attempts: 3,
                retry_delay: Duration::from_millis(10),
            },
        );
        HttpDelegate::new(Arc::new(store))
    }

    fn compress(payload: &impl Message) -> Vec<u8> {
        snap::raw::Encoder::new()
            .compress_vec(&payload.encode_to_vec())
            .unwrap()
    }

    fn post(path: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .body(Body::from(body))
            .unwrap()
    }

    fn write_request(metric: &str, labels: &[(&str, &str)], samples: &[(i64, f64)]) -> WriteRequest {
        let mut all_labels = vec![Label {
            name: "__name__".to_string(),
            value: metric.to_string(),
        }];
        all_labels.extend(labels.iter().map(|(name, value)| Label {
            name: name.to_string(),
            value: value.to_string(),
        }));
        WriteRequest {
            timeseries: vec![TimeSeries {
                labels: all_labels,
                samples: samples
                    .iter()
                    .map(|(timestamp, value)| Sample {
                        timestamp: *timestamp,
                        value: *value,
                    })
                    .collect(),
            }],
        }
    }

    fn read_request(metric: &str, start: i64, end: i64) -> ReadRequest {
        ReadRequest {
            queries: vec![Query {
                start_timestamp_ms: start,
                end_timestamp_ms: end,
                matchers: vec![LabelMatcher {
                    r#type: label_matcher::Type::Eq as i32,
                    name: "__name__".to_string(),
                    value: metric.to_string(),
                }],
            }],
        }
    }

    async fn decode_read_response(resp: Response<Body>) -> ReadResponse {
        assert_eq!(
            resp.headers().get(CONTENT_TYPE).unwrap(),
            "application/x-protobuf"
        );
        assert_eq!(resp.headers().get(CONTENT_ENCODING).unwrap(), "snappy");
        let compressed = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        let raw = snap::raw::Decoder::new()
            .decompress_vec(&compressed)
            .unwrap();
        ReadResponse::decode(raw.as_slice()).unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read() {
        test_helpers::maybe_start_logging();
        let delegate = delegate();

        let write = write_request("test_metric_1", &[("foo", "bar")], &[(200, 1.5)]);
        let resp = delegate.route(post("/write", compress(&write))).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let read = read_request("test_metric_1", 100, 300);
        let resp = delegate.route(post("/read", compress(&read))).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let decoded = decode_read_response(resp).await;
        assert_eq!(decoded.results.len(), 1);
        let series = &decoded.results[0].timeseries;
        assert_eq!(series.len(), 1);
        assert_eq!(
            series[0].samples,
            vec![Sample {
                value: 1.5,
                timestamp: 200
            }]
        );
        assert_eq!(
            series[0]
                .labels
                .iter()
                .map(|l| (l.name.as_str(), l.value.as_str()))
                .collect::<Vec<_>>(),
            vec![("__name__", "test_metric_1"), ("foo", "bar")]
        );
    }

    #[tokio::test]
    async fn test_garbage_body_is_bad_request() {
        let delegate = delegate();
        let resp = delegate
            .route(post("/write", b"not snappy at all".to_vec()))
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_snappy_but_not_protobuf_is_bad_request() {
        let delegate = delegate();
        let body = snap::raw::Encoder::new()
            .compress_vec(b"these are not the bytes you are looking for")
            .unwrap();
        let resp = delegate.route(post("/write", body)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_series_is_bad_request() {
        let delegate = delegate();
        // A series without `__name__`.
        let write = WriteRequest {
            timeseries: vec![TimeSeries {
                labels: vec![Label {
                    name: "job".to_string(),
                    value: "node".to_string(),
                }],
                samples: vec![],
            }],
        };
        let resp = delegate.route(post("/write", compress(&write))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unsupported_matcher_is_bad_request() {
        let delegate = delegate();
        let mut read = read_request("up", 0, 100);
        read.queries[0].matchers[0].r#type = label_matcher::Type::Re as i32;
        let resp = delegate.route(post("/read", compress(&read))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_read_unknown_metric_is_server_error() {
        let delegate = delegate();
        let resp = delegate
            .route(post("/read", compress(&read_request("up", 0, 100))))
            .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let delegate = delegate();
        let resp = delegate.route(post("/flush", vec![])).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = Request::builder()
            .method(Method::GET)
            .uri("/write")
            .body(Body::empty())
            .unwrap();
        assert_eq!(delegate.route(req).await.status(), StatusCode::NOT_FOUND);
    }
}
