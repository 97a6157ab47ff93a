use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    matching::{geo::calculate_fare, DispatchRepository, MatchOutcome, MatchingEngine},
    settlement::{CompletedRideLedger, PaymentGatewayClient},
};

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<DispatchRepository>,
    pub matching_engine: Arc<MatchingEngine<DispatchRepository>>,
    pub payment_client: Arc<PaymentGatewayClient>,
    pub payment_gateway_url: String,
}

/// GET /health
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// One match attempt, triggered by the external poller.
/// POST /api/internal/matching
///
/// Matched, no-ride and no-chair all collapse to an empty 204 on the
/// wire; only storage errors produce an error body. The distinction
/// survives in the outcome enum and the log line.
pub async fn internal_post_matching(State(state): State<AppState>) -> AppResult<StatusCode> {
    let outcome = state.matching_engine.attempt_match().await?;

    match outcome {
        MatchOutcome::Matched => info!("matching attempt: ride matched"),
        MatchOutcome::NoRideAvailable => info!("matching attempt: no unmatched ride"),
        MatchOutcome::NoChairAvailable => info!("matching attempt: no eligible chair"),
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Settle a completed ride's fare through the payment gateway.
/// POST /api/internal/rides/:ride_id/settlement
///
/// Marking the ride as settled afterwards belongs to the trip-lifecycle
/// caller; this endpoint only reports the gateway outcome.
pub async fn internal_post_settlement(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let ride = state
        .repository
        .ride_by_id(ride_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ride {}", ride_id)))?;

    let status = state.repository.latest_ride_status(ride_id).await?;
    if status.as_deref() != Some("COMPLETED") {
        return Err(AppError::BadRequest(format!(
            "ride {} is not completed",
            ride_id
        )));
    }

    let token = state
        .repository
        .payment_token(ride.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("payment token for user {}", ride.user_id)))?;

    let fare = calculate_fare(ride.pickup(), ride.destination());
    let ledger = CompletedRideLedger::new(state.repository.clone(), ride.user_id);

    if let Err(err) = state
        .payment_client
        .request_post_payment(&state.payment_gateway_url, &token, fare, &ledger)
        .await
    {
        // Genuine unresolved payment ambiguity; the operator must see it.
        error!(ride_id = %ride_id, fare, error = %err, "settlement failed");
        return Err(AppError::Payment(err));
    }

    info!(ride_id = %ride_id, fare, "ride settled");
    Ok(StatusCode::NO_CONTENT)
}
