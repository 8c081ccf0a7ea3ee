//! HTTP surface of the ingress.

use crate::{
    error::Error,
    wire::{CancelOrderRequest, OpenOrderRequest},
};
use axum::{
    body::Bytes,
    extract::Query,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use commonware_runtime::{Clock, Metrics, Spawner};
use darkpool_ingress::{
    Ingress, OrderFragmentMappings, OrderId, Orderbook, Registry, Signature, Swarmer,
};
use futures::Future;
use serde_json::json;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tracing::{debug, warn};

/// Order operations exposed over HTTP.
pub trait Orders: Clone + Send + Sync + 'static {
    fn open_order(
        &self,
        signature: Signature,
        order_id: OrderId,
        mappings: OrderFragmentMappings,
    ) -> impl Future<Output = Result<(), darkpool_ingress::Error>> + Send;

    fn cancel_order(
        &self,
        signature: Signature,
        order_id: OrderId,
    ) -> impl Future<Output = Result<(), darkpool_ingress::Error>> + Send;
}

impl<E, R, S, O> Orders for Ingress<E, R, S, O>
where
    E: Clock + Spawner + Metrics,
    R: Registry,
    S: Swarmer,
    O: Orderbook,
{
    async fn open_order(
        &self,
        signature: Signature,
        order_id: OrderId,
        mappings: OrderFragmentMappings,
    ) -> Result<(), darkpool_ingress::Error> {
        Ingress::open_order(self, signature, order_id, mappings).await
    }

    async fn cancel_order(
        &self,
        signature: Signature,
        order_id: OrderId,
    ) -> Result<(), darkpool_ingress::Error> {
        Ingress::cancel_order(self, signature, order_id).await
    }
}

/// Routes for `orders`, with metrics encoded from `context`.
pub fn router<I: Orders, M: Metrics>(orders: I, context: M) -> Router {
    // Mirroring the origin rather than answering `*` lets browsers send credentials
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(AllowHeaders::mirror_request());
    Router::new()
        .route("/orders", post(open_order::<I>).delete(cancel_order::<I>))
        .route("/health", get(health))
        .route("/metrics", get(metrics::<M>))
        .layer(Extension(orders))
        .layer(Extension(context))
        .layer(cors)
}

fn status(err: &Error) -> StatusCode {
    if err.is_invalid_request() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn failure(err: Error) -> (StatusCode, String) {
    let code = status(&err);
    if code == StatusCode::BAD_REQUEST {
        debug!(?err, "rejected request");
    } else {
        warn!(?err, "failed request");
    }
    (code, err.to_string())
}

pub async fn open_order<I: Orders>(
    Extension(orders): Extension<I>,
    body: Bytes,
) -> (StatusCode, String) {
    let submitted = async {
        let request: OpenOrderRequest = serde_json::from_slice(&body)?;
        let (signature, order_id, mappings) = request.decode()?;
        orders.open_order(signature, order_id, mappings).await?;
        Ok::<_, Error>(order_id)
    };
    match submitted.await {
        Ok(order_id) => (StatusCode::CREATED, order_id.to_string()),
        Err(err) => failure(err),
    }
}

pub async fn cancel_order<I: Orders>(
    Extension(orders): Extension<I>,
    Query(request): Query<CancelOrderRequest>,
) -> (StatusCode, String) {
    let cancelled = async {
        let (signature, order_id) = request.decode()?;
        orders.cancel_order(signature, order_id).await?;
        Ok::<_, Error>(order_id)
    };
    match cancelled.await {
        Ok(order_id) => (StatusCode::OK, order_id.to_string()),
        Err(err) => failure(err),
    }
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn metrics<M: Metrics>(Extension(context): Extension<M>) -> Response {
    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        context.encode(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use commonware_macros::test_traced;
    use commonware_runtime::{deterministic, Runner};
    use darkpool_ingress::{
        epoch::Snapshot,
        mocks,
        queue::Request,
        types::{index, Pods},
        Config, Pod,
    };
    use std::time::Duration;

    const ORDER: OrderId = OrderId::new([6; 32]);

    type Mocked =
        Ingress<deterministic::Context, mocks::Registry, mocks::Swarmer, mocks::Orderbook>;

    fn ingress(context: deterministic::Context, pods: Vec<Pod>) -> Mocked {
        let mut cfg = Config::new(
            mocks::Registry::default(),
            mocks::Swarmer::default(),
            mocks::Orderbook::default(),
        );
        cfg.workers = 1;
        let ingress = Ingress::new(context.with_label("ingress"), cfg);
        ingress.view().seed(Snapshot::new(index(pods), Pods::new()));
        ingress
    }

    fn body(mappings: &[darkpool_ingress::OrderFragmentMapping]) -> Bytes {
        let request = OpenOrderRequest::new(&Signature::new([1; 65]), mappings);
        Bytes::from(serde_json::to_vec(&request).unwrap())
    }

    #[test_traced]
    fn test_open_order_created() {
        let executor = deterministic::Runner::timed(Duration::from_secs(10));
        executor.start(|context| async move {
            let pod = mocks::pod(1, 6);
            let ingress = ingress(context, vec![pod.clone()]);

            let body = body(&[mocks::mapping(ORDER, &pod, 6, 0)]);
            let (code, _) = open_order(Extension(ingress.clone()), body).await;
            assert_eq!(code, StatusCode::CREATED);

            let requests = ingress.requests();
            assert!(matches!(
                requests.try_next(),
                Some(Request::OpenOrder { order_id: ORDER, .. })
            ));
            assert!(matches!(
                requests.try_next(),
                Some(Request::OpenOrderFragmentMapping { depth: 0, .. })
            ));
            assert_eq!(requests.try_next(), None);
        });
    }

    #[test_traced]
    fn test_open_order_rejected() {
        let executor = deterministic::Runner::timed(Duration::from_secs(10));
        executor.start(|context| async move {
            let pod = mocks::pod(1, 6);
            let ingress = ingress(context, vec![pod.clone()]);

            // Below threshold
            let below = body(&[mocks::mapping(ORDER, &pod, 4, 0)]);
            let (code, message) = open_order(Extension(ingress.clone()), below).await;
            assert_eq!(code, StatusCode::BAD_REQUEST);
            assert!(message.contains("invalid number of order fragments"));

            // Mismatched depth
            let depth = body(&[mocks::mapping(ORDER, &pod, 6, 1)]);
            let (code, _) = open_order(Extension(ingress.clone()), depth).await;
            assert_eq!(code, StatusCode::BAD_REQUEST);

            // Unknown pod
            let unknown = body(&[mocks::mapping(ORDER, &mocks::pod(2, 6), 6, 0)]);
            let (code, message) = open_order(Extension(ingress.clone()), unknown).await;
            assert_eq!(code, StatusCode::BAD_REQUEST);
            assert!(message.contains("unknown pod"));

            // No mappings
            let (code, _) = open_order(Extension(ingress.clone()), body(&[])).await;
            assert_eq!(code, StatusCode::BAD_REQUEST);

            // Pod without fragments
            let empty = body(&[[(pod.hash, Vec::new())].into()]);
            let (code, message) = open_order(Extension(ingress.clone()), empty).await;
            assert_eq!(code, StatusCode::BAD_REQUEST);
            assert!(message.contains("invalid number of order fragments"));

            // Malformed
            let malformed = Bytes::from_static(b"{\"signature\": 5}");
            let (code, _) = open_order(Extension(ingress.clone()), malformed).await;
            assert_eq!(code, StatusCode::BAD_REQUEST);

            assert_eq!(ingress.requests().try_next(), None);
        });
    }

    #[test_traced]
    fn test_cancel_order() {
        let executor = deterministic::Runner::timed(Duration::from_secs(10));
        executor.start(|context| async move {
            let ingress = ingress(context, vec![mocks::pod(1, 6)]);

            let request = CancelOrderRequest {
                id: STANDARD.encode(ORDER),
                signature: STANDARD.encode([1u8; 65]),
            };
            let (code, _) = cancel_order(Extension(ingress.clone()), Query(request)).await;
            assert_eq!(code, StatusCode::OK);
            assert!(matches!(
                ingress.requests().try_next(),
                Some(Request::CancelOrder { order_id: ORDER, .. })
            ));

            let request = CancelOrderRequest {
                id: STANDARD.encode([1u8; 16]),
                signature: STANDARD.encode([1u8; 65]),
            };
            let (code, _) = cancel_order(Extension(ingress.clone()), Query(request)).await;
            assert_eq!(code, StatusCode::BAD_REQUEST);
            assert_eq!(ingress.requests().try_next(), None);
        });
    }

    #[test]
    fn test_status() {
        assert_eq!(
            status(&Error::Base64("signature")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(&Error::Ingress(darkpool_ingress::Error::UnsupportedEpochDepth(2))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(&Error::Ingress(darkpool_ingress::Error::Closed)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status(&Error::Decrypt), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
