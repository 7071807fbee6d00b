//! HTTP handlers exposed by the coordinator.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    routing::post,
    Json, Router,
};

use super::protocol::{
    RegisterRequest, RegisterResponse, RpcFailure, RpcRequest, RpcResponse, ENDPOINT_REGISTER,
    ENDPOINT_RPC,
};
use super::registry::StorageRegistry;

/// Build the coordinator router. All state travels as an [`Extension`].
pub fn router(registry: Arc<StorageRegistry>) -> Router {
    Router::new()
        .route(ENDPOINT_REGISTER, post(handle_register))
        .route(ENDPOINT_RPC, post(handle_rpc))
        .layer(Extension(registry))
}

/// Registration protocol endpoint.
///
/// Idempotent: racing registrants for one name all succeed, the first
/// backend instance wins. The typed body is authoritative; the status code
/// mirrors it.
pub async fn handle_register(
    Extension(registry): Extension<Arc<StorageRegistry>>,
    Json(req): Json<RegisterRequest>,
) -> (StatusCode, Json<RegisterResponse>) {
    match registry.register(&req.name, req.descriptor.as_deref()) {
        Ok(created) => (
            StatusCode::OK,
            Json(RegisterResponse {
                result: Ok(created),
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to register storage {:?}: {}", req.name, e);
            (
                StatusCode::BAD_REQUEST,
                Json(RegisterResponse { result: Err(e) }),
            )
        }
    }
}

/// Storage operation endpoint.
///
/// Backend conditions are encoded verbatim into the response body so the
/// caller can branch on the exact condition; only the status code hints at
/// the failure class.
pub async fn handle_rpc(
    Extension(registry): Extension<Arc<StorageRegistry>>,
    Json(req): Json<RpcRequest>,
) -> (StatusCode, Json<RpcResponse>) {
    match registry.dispatch(&req) {
        Ok(value) => (StatusCode::OK, Json(RpcResponse { result: Ok(value) })),
        Err(failure) => {
            let status = match &failure {
                RpcFailure::Storage { error } => {
                    tracing::debug!(
                        "Storage operation on {:?} failed: {}",
                        req.storage_name,
                        error
                    );
                    StatusCode::CONFLICT
                }
                RpcFailure::BadArgument { message } => {
                    tracing::error!(
                        "Undecodable argument for storage {:?}: {}",
                        req.storage_name,
                        message
                    );
                    StatusCode::BAD_REQUEST
                }
            };
            (status, Json(RpcResponse {
                result: Err(failure),
            }))
        }
    }
}
