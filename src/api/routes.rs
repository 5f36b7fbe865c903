//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::domain::Currency;
use crate::error::AppError;
use crate::handlers::{
    CreateUserCommand, CreateUserHandler, ListAccountsCommand, TransferCommand, TransferHandler,
    VerifyEmailCommand, VerifyEmailHandler, VerifyEmailResult,
};
use crate::jobs::TaskDispatcher;
use crate::ledger::{Ledger, TransferTxResult};
use crate::store::{Account, Store, Transactional, User};

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState<B> {
    pub ledger: Ledger<B>,
    pub dispatcher: TaskDispatcher,
}

impl<B: Transactional> AppState<B> {
    pub fn new(ledger: Ledger<B>, dispatcher: TaskDispatcher) -> Self {
        Self { ledger, dispatcher }
    }
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub owner: String,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct ListAccountsQuery {
    pub owner: String,
    pub page_id: i32,
    pub page_size: i32,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    /// Hashed by the caller; this service never sees the plain password
    pub hashed_password: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    #[serde(flatten)]
    pub user: User,
    pub verify_email_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub email_id: i64,
    pub secret_code: String,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router<B: Transactional>() -> Router<AppState<B>> {
    Router::new()
        .route(
            "/accounts",
            post(create_account::<B>).get(list_accounts::<B>),
        )
        .route("/accounts/:id", get(get_account::<B>))
        .route("/transfers", post(transfer::<B>))
        .route("/users", post(create_user::<B>))
        .route("/users/verify_email", get(verify_email::<B>))
}

// =========================================================================
// Accounts
// =========================================================================

/// Open a zero-balance account
async fn create_account<B: Transactional>(
    State(state): State<AppState<B>>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let currency: Currency = request
        .currency
        .parse()
        .map_err(|e: crate::domain::UnsupportedCurrency| AppError::InvalidRequest(e.to_string()))?;

    let account = state.ledger.open_account(&request.owner, currency).await?;

    Ok((StatusCode::CREATED, Json(account)))
}

async fn get_account<B: Transactional>(
    State(state): State<AppState<B>>,
    Path(id): Path<i64>,
) -> Result<Json<Account>, AppError> {
    let account = state.ledger.store().get_account(id).await?;
    Ok(Json(account))
}

async fn list_accounts<B: Transactional>(
    State(state): State<AppState<B>>,
    Query(query): Query<ListAccountsQuery>,
) -> Result<Json<Vec<Account>>, AppError> {
    let params = ListAccountsCommand::new(query.owner, query.page_id, query.page_size).validate()?;
    let accounts = state.ledger.store().list_accounts(params).await?;
    Ok(Json(accounts))
}

// =========================================================================
// Transfers
// =========================================================================

/// Move money between two accounts of the same currency
async fn transfer<B: Transactional>(
    State(state): State<AppState<B>>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferTxResult>, AppError> {
    let handler = TransferHandler::new(state.ledger);

    let command = TransferCommand::new(
        request.from_account_id,
        request.to_account_id,
        request.amount,
        request.currency,
    );

    let result = handler.execute(command).await?;
    Ok(Json(result))
}

// =========================================================================
// Users
// =========================================================================

/// Register a user and send the verification email
async fn create_user<B: Transactional>(
    State(state): State<AppState<B>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), AppError> {
    let handler = CreateUserHandler::new(state.ledger, state.dispatcher);

    let command = CreateUserCommand::new(
        request.username,
        request.hashed_password,
        request.full_name,
        request.email,
    );

    // The email job keeps running on its own task
    let result = handler.execute(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            user: result.user,
            verify_email_id: result.verify_email_id,
        }),
    ))
}

/// Target of the link in the verification email
async fn verify_email<B: Transactional>(
    State(state): State<AppState<B>>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<VerifyEmailResult>, AppError> {
    let handler = VerifyEmailHandler::new(state.ledger);

    let result = handler
        .execute(VerifyEmailCommand::new(query.email_id, query.secret_code))
        .await?;

    Ok(Json(result))
}
