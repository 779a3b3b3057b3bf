use axum::{
    Router, error_handling::HandleErrorLayer, extract::Request, http::StatusCode,
    response::IntoResponse, routing::get,
};
use slot_limit::NonBlocking;
use std::sync::Arc;
use std::time::Duration;
use tower::BoxError;
use tower::ServiceBuilder;
use tower_slot::{ManagedConcurrencyLayer, SlotError};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 1. At most 10 requests in flight
    let limiter = Arc::new(NonBlocking::new(10)?);

    // 2. Setup Managed Layer
    let managed_layer =
        ManagedConcurrencyLayer::<Request>::new(limiter, Duration::from_millis(500));

    // 3. Build the Router
    let app = Router::new()
        .route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                "Hello, Slot!"
            }),
        )
        .layer(
            ServiceBuilder::new()
                // The outermost layer: catches BoxError and returns Response
                .layer(HandleErrorLayer::new(handle_slot_error))
                .layer(managed_layer)
                // Converts the Route's Infallible to BoxError for the managed layer.
                .map_err(BoxError::from),
        );

    // 4. Serve
    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    println!("📡 Listening on http://127.0.0.1:3000");

    axum::serve(listener, app).await?;
    Ok(())
}

/// The signature must match BoxError -> IntoResponse
async fn handle_slot_error(err: BoxError) -> impl IntoResponse {
    if let Some(slot_err) = err.downcast_ref::<SlotError>() {
        slot_err.clone().into_response()
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Service Error").into_response()
    }
}
