pub mod dispatch;

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Method, Request};
use axum::response::Response;
use tower::util::BoxCloneService;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::state::AppState;

pub use dispatch::{dispatch_request, normalize_base_path, REQUEST_ID_HEADER};

/// The relay as a cloneable tower service, ready to hand to hyper.
pub type RelayService = BoxCloneService<Request<Body>, Response, Infallible>;

/// Wrap [`dispatch_request`] with the CORS policy from `server.cors_allowed_origins`.
#[must_use]
pub fn build_service(state: Arc<AppState>) -> RelayService {
    let base_path: Arc<str> = Arc::from(normalize_base_path(&state.config.server.base_path));
    let cors = cors_layer(&state.config.server.cors_allowed_origins);
    let dispatch = tower::service_fn(move |request: Request<Body>| {
        dispatch_request(Arc::clone(&state), Arc::clone(&base_path), request)
    });

    BoxCloneService::new(ServiceBuilder::new().layer(cors).service(dispatch))
}

/// An empty origin list keeps browsers unrestricted.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin.trim_end_matches('/')).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
}
