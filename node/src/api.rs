//! # REST API
//!
//! Builds the axum router that exposes the approval workflow over HTTP.
//! All handlers share state through axum's `State` extractor and map the
//! core's error taxonomy onto status codes in one place.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                      |
//! |--------|-------------------------------|----------------------------------|
//! | GET    | `/health`                     | Liveness probe                   |
//! | POST   | `/auth/enroll`                | Issue a TOTP secret + URI        |
//! | POST   | `/auth/verify`                | Confirm enrollment with a code   |
//! | POST   | `/transactions`               | Create a transaction             |
//! | GET    | `/transactions/pending`       | Pending transactions, oldest first |
//! | GET    | `/transactions/:id`           | One transaction                  |
//! | POST   | `/transactions/:id/signatures`| Submit a signer decision         |
//! | GET    | `/transactions/:id/audit`     | The transaction's audit trail    |
//!
//! ## Error mapping
//!
//! validation → 400, invalid code → 401, unauthorized → 403, not found →
//! 404, already-decided / closed / conflicts → 409, storage backend →
//! 500 (logged in full, reported generically).

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use countersign_protocol::coordinator::{ApprovalCoordinator, SignerShare};
use countersign_protocol::crypto::totp;
use countersign_protocol::error::ApprovalError;
use countersign_protocol::identity::{EnrollmentTicket, Identity, Role};
use countersign_protocol::store::{SledStores, StoreError, TransactionStore};
use countersign_protocol::transaction::{
    Amount, Currency, SignerDecision, Transaction, TransactionRequest, TransactionStatus,
};

use crate::metrics::SharedMetrics;

/// The coordinator concretized over sled — one database, three store
/// roles.
pub type Coordinator = ApprovalCoordinator<SledStores, SledStores, SledStores>;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state for all request handlers. Cheap to clone — everything
/// is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Service version string reported by `/health`.
    pub version: String,
    /// The approval workflow itself.
    pub coordinator: Arc<Coordinator>,
    /// Direct store handle for read endpoints (pending list, audit).
    pub stores: Arc<SledStores>,
    /// Prometheus handles for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/enroll", post(enroll_handler))
        .route("/auth/verify", post(verify_enrollment_handler))
        .route("/transactions", post(create_transaction_handler))
        .route("/transactions/pending", get(list_pending_handler))
        .route("/transactions/:id", get(get_transaction_handler))
        .route("/transactions/:id/signatures", post(submit_decision_handler))
        .route("/transactions/:id/audit", get(audit_trail_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// Generic error body for failed requests.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn status_for(err: &ApprovalError) -> StatusCode {
    match err {
        ApprovalError::Validation(_) => StatusCode::BAD_REQUEST,
        ApprovalError::InvalidCode => StatusCode::UNAUTHORIZED,
        ApprovalError::Unauthorized(_) => StatusCode::FORBIDDEN,
        ApprovalError::NotFound(_) => StatusCode::NOT_FOUND,
        ApprovalError::AlreadyDecided { .. } | ApprovalError::TransactionClosed { .. } => {
            StatusCode::CONFLICT
        }
        // Share preconditions are the caller's inputs being wrong.
        ApprovalError::Share(_) => StatusCode::BAD_REQUEST,
        ApprovalError::Store(store) => match store {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::VersionConflict { .. }
            | StoreError::DuplicateNonce(_)
            | StoreError::DuplicateUsername(_) => StatusCode::CONFLICT,
            StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

/// Render an error as its mapped status. Internal failures are logged
/// with full context and reported generically — callers get actionable
/// messages only for their own mistakes.
fn error_response(err: ApprovalError) -> Response {
    let status = status_for(&err);
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed internally: {err}");
        "internal error".to_string()
    } else {
        err.to_string()
    };
    (status, Json(ErrorResponse { error: message })).into_response()
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/enroll`.
#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub username: String,
    pub role: Role,
}

/// Response body for `POST /auth/enroll`.
#[derive(Debug, Serialize, Deserialize)]
pub struct EnrollResponse {
    pub username: String,
    pub role: Role,
    pub secret_base32: String,
    pub provisioning_uri: String,
}

/// Request body for `POST /auth/verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyEnrollmentRequest {
    pub username: String,
    pub role: Role,
    pub secret_base32: String,
    pub code: String,
}

/// Identity as exposed over the API — everything except the TOTP secret
/// and the share fingerprint, which stay server-side.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Identity> for IdentityResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            username: identity.username.clone(),
            role: identity.role,
            status: identity.status.to_string(),
            created_at: identity.created_at,
        }
    }
}

/// Request body for `POST /transactions`.
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    /// Amount in minor units (cents).
    pub amount_minor_units: u64,
    /// Currency ticker; defaults to USD.
    #[serde(default)]
    pub currency: Option<String>,
    pub beneficiary: String,
    #[serde(default)]
    pub purpose: String,
    pub creator_id: String,
    pub signer_ids: Vec<String>,
    pub required_signatures: u32,
    /// Explicit deadline; defaults to the protocol's standard expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// One signer's signature slot, in API form.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignatureView {
    pub signer_id: String,
    pub state: String,
    pub decided_at: Option<DateTime<Utc>>,
}

/// Transaction as exposed over the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: String,
    pub amount_minor_units: u64,
    pub currency: String,
    pub amount_display: String,
    pub beneficiary: String,
    pub purpose: String,
    pub creator_id: String,
    pub required_signatures: u32,
    pub signed_count: usize,
    pub selected_signers: Vec<String>,
    pub signatures: Vec<SignatureView>,
    pub nonce: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        // Signature slots in selection order, not map order.
        let signatures = tx
            .selected_signers
            .iter()
            .filter_map(|id| tx.signatures.get(id))
            .map(|record| SignatureView {
                signer_id: record.signer_id.clone(),
                state: record.state.to_string(),
                decided_at: record.decided_at,
            })
            .collect();

        Self {
            id: tx.id.clone(),
            amount_minor_units: tx.amount.minor_units,
            currency: tx.amount.currency.to_string(),
            amount_display: tx.amount.display_decimal(),
            beneficiary: tx.beneficiary.clone(),
            purpose: tx.purpose.clone(),
            creator_id: tx.creator_id.clone(),
            required_signatures: tx.required_signatures,
            signed_count: tx.signed_count(),
            selected_signers: tx.selected_signers.clone(),
            signatures,
            nonce: tx.nonce.clone(),
            status: tx.status.to_string(),
            created_at: tx.created_at,
            expires_at: tx.expires_at,
        }
    }
}

/// One share, hex-encoded for transport. The service returns these once,
/// at creation; it keeps only fingerprints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShareResponse {
    pub signer_id: String,
    pub index: u8,
    pub threshold: u8,
    pub split_id: String,
    pub data_hex: String,
}

impl From<&SignerShare> for ShareResponse {
    fn from(share: &SignerShare) -> Self {
        Self {
            signer_id: share.signer_id.clone(),
            index: share.share.index,
            threshold: share.share.threshold,
            split_id: share.share.split_id.clone(),
            data_hex: hex::encode(&share.share.data),
        }
    }
}

/// Response body for `POST /transactions`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTransactionResponse {
    pub transaction: TransactionResponse,
    pub shares: Vec<ShareResponse>,
}

/// Request body for `POST /transactions/:id/signatures`.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub signer_id: String,
    pub code: String,
    pub decision: SignerDecision,
}

/// Response body for `POST /transactions/:id/signatures`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub transaction: TransactionResponse,
    /// True exactly when this decision completed the quorum.
    pub quorum_reached: bool,
}

fn parse_currency(ticker: Option<&str>) -> Currency {
    match ticker.map(|t| t.to_ascii_uppercase()).as_deref() {
        None | Some("USD") => Currency::USD,
        Some("EUR") => Currency::EUR,
        Some("GBP") => Currency::GBP,
        Some(other) => Currency::Custom(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — liveness probe for orchestrators.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "version": state.version }))
}

/// `POST /auth/enroll` — issue a TOTP secret and provisioning URI for a
/// prospective participant.
async fn enroll_handler(
    State(state): State<AppState>,
    Json(req): Json<EnrollRequest>,
) -> Response {
    match state.coordinator.enroll(&req.username, req.role) {
        Ok(ticket) => (
            StatusCode::OK,
            Json(EnrollResponse {
                username: ticket.username,
                role: ticket.role,
                secret_base32: ticket.secret.base32,
                provisioning_uri: ticket.secret.provisioning_uri,
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// `POST /auth/verify` — prove the authenticator works; only then does
/// the identity come into existence.
async fn verify_enrollment_handler(
    State(state): State<AppState>,
    Json(req): Json<VerifyEnrollmentRequest>,
) -> Response {
    let ticket = EnrollmentTicket {
        username: req.username.clone(),
        role: req.role,
        secret: totp::EnrolledSecret {
            provisioning_uri: totp::provisioning_uri(&req.secret_base32, &req.username),
            base32: req.secret_base32,
        },
    };

    match state
        .coordinator
        .confirm_enrollment(&ticket, &req.code, Utc::now())
    {
        Ok(identity) => {
            (StatusCode::CREATED, Json(IdentityResponse::from(&identity))).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `POST /transactions` — create a transaction and hand back the shares
/// for distribution. This response is the only time the share material
/// exists outside the signers' hands.
async fn create_transaction_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateTransactionRequest>,
) -> Response {
    let amount = Amount::new(req.amount_minor_units, parse_currency(req.currency.as_deref()));
    let mut request = TransactionRequest::new(amount, req.beneficiary, req.creator_id)
        .purpose(req.purpose)
        .signers(req.signer_ids)
        .required_signatures(req.required_signatures);
    if let Some(deadline) = req.expires_at {
        request = request.expires_at(deadline);
    }

    match state.coordinator.create_transaction(request, Utc::now()) {
        Ok(created) => {
            state.metrics.transactions_created_total.inc();
            (
                StatusCode::CREATED,
                Json(CreateTransactionResponse {
                    transaction: TransactionResponse::from(&created.transaction),
                    shares: created.shares.iter().map(ShareResponse::from).collect(),
                }),
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `GET /transactions/pending` — the open approval queue, oldest first.
async fn list_pending_handler(State(state): State<AppState>) -> Response {
    match state.stores.list_pending() {
        Ok(pending) => {
            state.metrics.pending_transactions.set(pending.len() as i64);
            let views: Vec<TransactionResponse> =
                pending.iter().map(TransactionResponse::from).collect();
            Json(views).into_response()
        }
        Err(err) => error_response(err.into()),
    }
}

/// `GET /transactions/:id` — one transaction, 404 when unknown.
async fn get_transaction_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match state.stores.load(&id) {
        Ok(Some(tx)) => Json(TransactionResponse::from(&tx)).into_response(),
        Ok(None) => error_response(ApprovalError::NotFound(format!("transaction {id}"))),
        Err(err) => error_response(err.into()),
    }
}

/// `POST /transactions/:id/signatures` — submit one signer's decision.
async fn submit_decision_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<DecisionRequest>,
) -> Response {
    let timer = state.metrics.decision_latency_seconds.start_timer();
    let result = state.coordinator.submit_decision(
        &id,
        &req.signer_id,
        &req.code,
        req.decision,
        Utc::now(),
    );
    timer.observe_duration();

    match result {
        Ok(outcome) => {
            state.metrics.decisions_recorded_total.inc();
            if outcome.quorum_reached {
                state.metrics.approvals_total.inc();
            }
            if outcome.transaction.status == TransactionStatus::Rejected {
                state.metrics.rejections_total.inc();
            }
            Json(DecisionResponse {
                transaction: TransactionResponse::from(&outcome.transaction),
                quorum_reached: outcome.quorum_reached,
            })
            .into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `GET /transactions/:id/audit` — the append-only trail for one
/// transaction, in order.
async fn audit_trail_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match state.stores.audit_for(&id) {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => error_response(err.into()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
