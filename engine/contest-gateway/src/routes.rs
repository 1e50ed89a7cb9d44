//! REST API endpoints
//!
//! Amounts are integer cents. The caller is identified by the `x-user-id`
//! header, set by the authenticating proxy in front of this service.

use crate::state::AppState;
use contest_engine::model::{ContestId, ContestStatus, TeamId};
use contest_engine::{ContestError, ErrorKind, PaymentMethod, PayoutDetails, PlayerSelection};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};
use wallet_ledger::{Money, TransactionId, UserId};

pub const USER_HEADER: &str = "x-user-id";

const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Failure raised by a handler, rendered by [`handle_rejection`]
#[derive(Debug)]
pub enum ApiError {
    Contest(ContestError),
    /// No usable caller identity on the request
    Unauthenticated,
}

impl warp::reject::Reject for ApiError {}

fn reject(err: impl Into<ContestError>) -> Rejection {
    warp::reject::custom(ApiError::Contest(err.into()))
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    pub timestamp: String,
}

/// Error detail
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub kind: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub team_id: TeamId,
}

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub team_name: String,
    #[serde(default)]
    pub players: Vec<PlayerSelection>,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: Money,
    pub method: String,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount: Money,
    pub method: String,
    #[serde(default)]
    pub payout_details: PayoutDetails,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPayoutRequest {
    pub succeeded: bool,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: UserId,
    pub balance: Money,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub contest_id: ContestId,
    pub status: ContestStatus,
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InputValidation => "input_validation",
        ErrorKind::StateConflict => "state_conflict",
        ErrorKind::Funds => "funds",
        ErrorKind::NotFound => "not_found",
        ErrorKind::ExternalDependency => "external_dependency",
        ErrorKind::Compensation => "compensation",
        ErrorKind::Internal => "internal",
    }
}

/// HTTP status for a domain error; malformed fields are 400, rule
/// violations 422
pub fn status_for(err: &ContestError) -> StatusCode {
    match err.kind() {
        ErrorKind::InputValidation => match err {
            ContestError::MissingField { .. } | ContestError::InvalidField { .. } => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        },
        ErrorKind::StateConflict => StatusCode::CONFLICT,
        ErrorKind::Funds => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ExternalDependency => StatusCode::BAD_GATEWAY,
        ErrorKind::Compensation | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_reply(status: StatusCode, detail: ErrorDetail) -> warp::reply::WithStatus<warp::reply::Json> {
    metrics::increment_counter!("api_errors_total", "code" => detail.code);
    let body = ErrorResponse { error: detail, timestamp: chrono::Utc::now().to_rfc3339() };
    warp::reply::with_status(warp::reply::json(&body), status)
}

fn contest_error_reply(err: &ContestError) -> warp::reply::WithStatus<warp::reply::Json> {
    let status = status_for(err);
    // Server-side failures keep their internals in the log
    let message = match err.kind() {
        ErrorKind::Compensation | ErrorKind::Internal => {
            tracing::error!("Request failed: {}", err);
            "The request could not be completed".to_string()
        }
        _ => err.to_string(),
    };

    error_reply(
        status,
        ErrorDetail { code: err.code(), kind: kind_label(err.kind()), message, details: err.details() },
    )
}

/// Turn rejections into the JSON error envelope
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    if let Some(api_error) = err.find::<ApiError>() {
        return Ok(match api_error {
            ApiError::Contest(e) => contest_error_reply(e),
            ApiError::Unauthenticated => error_reply(
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "UNAUTHENTICATED",
                    kind: "authentication",
                    message: format!("Missing or invalid {USER_HEADER} header"),
                    details: None,
                },
            ),
        });
    }

    let (status, code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "ROUTE_NOT_FOUND", "No such endpoint".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "INVALID_BODY", e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", "Request body too large".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED", "Method not allowed".to_string())
    } else {
        tracing::error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal error".to_string())
    };

    let kind = if status.is_server_error() { "internal" } else { "input_validation" };
    Ok(error_reply(status, ErrorDetail { code, kind, message, details: None }))
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// The calling user, from [`USER_HEADER`]
fn with_caller() -> impl Filter<Extract = (UserId,), Error = Rejection> + Clone {
    warp::header::optional::<String>(USER_HEADER).and_then(|raw: Option<String>| async move {
        raw.and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| warp::reject::custom(ApiError::Unauthenticated))
    })
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Enter a team into a contest, paying the entry fee
pub async fn join_contest(
    contest_id: ContestId,
    user_id: UserId,
    request: JoinRequest,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let confirmation =
        state.entries.join_contest(user_id, contest_id, request.team_id).await.map_err(reject)?;
    Ok(warp::reply::with_status(warp::reply::json(&confirmation), StatusCode::CREATED))
}

/// Validate and save a fantasy team
pub async fn create_team(
    contest_id: ContestId,
    user_id: UserId,
    request: CreateTeamRequest,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let created = state
        .teams
        .create_team(user_id, contest_id, &request.team_name, &request.players)
        .await
        .map_err(reject)?;
    Ok(warp::reply::with_status(warp::reply::json(&created), StatusCode::CREATED))
}

pub async fn deposit(
    user_id: UserId,
    request: DepositRequest,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let method: PaymentMethod = request.method.parse().map_err(reject)?;
    let receipt = state.funding.deposit(user_id, request.amount, method).await.map_err(reject)?;
    Ok(warp::reply::json(&receipt))
}

pub async fn withdraw(
    user_id: UserId,
    request: WithdrawRequest,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let method: PaymentMethod = request.method.parse().map_err(reject)?;
    let receipt = state
        .funding
        .withdraw(user_id, request.amount, method, &request.payout_details)
        .await
        .map_err(reject)?;
    // Accepted: the payout is still pending at the provider
    Ok(warp::reply::with_status(warp::reply::json(&receipt), StatusCode::ACCEPTED))
}

pub async fn balance(user_id: UserId, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let balance = state.ledger.balance(user_id).await.map_err(reject)?;
    Ok(warp::reply::json(&BalanceResponse { user_id, balance }))
}

pub async fn transactions(user_id: UserId, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let log = state.ledger.transactions(user_id).await.map_err(reject)?;
    Ok(warp::reply::json(&log))
}

pub async fn settle_contest(
    contest_id: ContestId,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let summary = state.settlement.settle(contest_id).await.map_err(reject)?;
    Ok(warp::reply::json(&summary))
}

pub async fn advance_status(
    contest_id: ContestId,
    request: StatusRequest,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let next: ContestStatus = request
        .status
        .parse()
        .map_err(|reason| reject(ContestError::InvalidField { field: "status", reason }))?;
    let status = state.settlement.advance_status(contest_id, next).await.map_err(reject)?;
    Ok(warp::reply::json(&StatusResponse { contest_id, status }))
}

pub async fn confirm_payout(
    transaction_id: Uuid,
    request: ConfirmPayoutRequest,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let resolution = state
        .funding
        .confirm_payout(TransactionId(transaction_id), request.succeeded)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&resolution))
}

/// Create REST API routes
pub fn create_routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let join = warp::path("api")
        .and(warp::path("contests"))
        .and(warp::path::param::<ContestId>())
        .and(warp::path("join"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_caller())
        .and(json_body::<JoinRequest>())
        .and(with_state(state.clone()))
        .and_then(join_contest);

    let teams = warp::path("api")
        .and(warp::path("contests"))
        .and(warp::path::param::<ContestId>())
        .and(warp::path("teams"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_caller())
        .and(json_body::<CreateTeamRequest>())
        .and(with_state(state.clone()))
        .and_then(create_team);

    let deposit_route = warp::path("api")
        .and(warp::path("wallet"))
        .and(warp::path("deposit"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_caller())
        .and(json_body::<DepositRequest>())
        .and(with_state(state.clone()))
        .and_then(deposit);

    let withdraw_route = warp::path("api")
        .and(warp::path("wallet"))
        .and(warp::path("withdraw"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_caller())
        .and(json_body::<WithdrawRequest>())
        .and(with_state(state.clone()))
        .and_then(withdraw);

    let balance_route = warp::path("api")
        .and(warp::path("wallet"))
        .and(warp::path("balance"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_caller())
        .and(with_state(state.clone()))
        .and_then(balance);

    let transactions_route = warp::path("api")
        .and(warp::path("wallet"))
        .and(warp::path("transactions"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_caller())
        .and(with_state(state.clone()))
        .and_then(transactions);

    let settle = warp::path("api")
        .and(warp::path("admin"))
        .and(warp::path("contests"))
        .and(warp::path::param::<ContestId>())
        .and(warp::path("settle"))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(settle_contest);

    let status = warp::path("api")
        .and(warp::path("admin"))
        .and(warp::path("contests"))
        .and(warp::path::param::<ContestId>())
        .and(warp::path("status"))
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body::<StatusRequest>())
        .and(with_state(state.clone()))
        .and_then(advance_status);

    let confirm = warp::path("api")
        .and(warp::path("admin"))
        .and(warp::path("payouts"))
        .and(warp::path::param::<Uuid>())
        .and(warp::path("confirm"))
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body::<ConfirmPayoutRequest>())
        .and(with_state(state))
        .and_then(confirm_payout);

    // Health check endpoint
    let health = warp::path("health").and(warp::path::end()).and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    });

    join.or(teams)
        .or(deposit_route)
        .or(withdraw_route)
        .or(balance_route)
        .or(transactions_route)
        .or(settle)
        .or(status)
        .or(confirm)
        .or(health)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contest_engine::model::{
        Contest, ContestType, Difficulty, Player, PlayerStatus, Position, UserProfile,
    };
    use contest_engine::{Ruleset, WalletLimits};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use wallet_ledger::{Delta, TransactionKind};

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::for_tests(WalletLimits::default()))
    }

    async fn user(state: &AppState, verified: bool, balance: Money) -> UserId {
        let user_id = Uuid::new_v4();
        state
            .catalog
            .upsert_profile(&UserProfile { user_id, username: None, verified })
            .await
            .unwrap();
        if balance.is_positive() {
            state
                .ledger
                .apply_delta(user_id, Delta::credit(balance, TransactionKind::Deposit))
                .await
                .unwrap();
        }
        user_id
    }

    async fn open_contest(state: &AppState, entry_fee: Money) -> ContestId {
        let contest = Contest {
            id: Uuid::new_v4(),
            game_id: Uuid::new_v4(),
            name: "Spring Split".to_string(),
            entry_fee,
            prize_pool: Money::ZERO,
            max_participants: 10,
            current_participants: 0,
            status: ContestStatus::Open,
            contest_type: ContestType::MultiEntry,
            difficulty: Difficulty::Beginner,
            ruleset: Ruleset::default(),
            deadline: chrono::Utc::now() + chrono::Duration::hours(1),
        };
        state.catalog.upsert_contest(&contest).await.unwrap();
        contest.id
    }

    /// A legal 1-4-4-2 squad as request JSON
    async fn squad_picks(state: &AppState) -> Value {
        let positions = [
            Position::Goalkeeper,
            Position::Defender,
            Position::Defender,
            Position::Defender,
            Position::Defender,
            Position::Midfielder,
            Position::Midfielder,
            Position::Midfielder,
            Position::Midfielder,
            Position::Forward,
            Position::Forward,
        ];
        let affiliations = ["NAVI", "G2", "FAZE", "VIT"];

        let mut picks = Vec::new();
        for (i, position) in positions.into_iter().enumerate() {
            let player = Player {
                id: Uuid::new_v4(),
                name: format!("pro-{i}"),
                position,
                team: affiliations[i % affiliations.len()].to_string(),
                price: Decimal::from(9),
                status: PlayerStatus::Active,
                points: Decimal::ZERO,
            };
            state.catalog.upsert_player(&player).await.unwrap();
            picks.push(json!({
                "player_id": player.id,
                "is_captain": i == 0,
                "is_vice_captain": i == 1,
            }));
        }
        Value::Array(picks)
    }

    fn body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let api = create_routes(test_state());
        let response = warp::test::request().method("GET").path("/health").reply(&api).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["status"], "healthy");
    }

    #[tokio::test]
    async fn test_wallet_routes_need_a_caller() {
        let api = create_routes(test_state());

        let missing =
            warp::test::request().method("GET").path("/api/wallet/balance").reply(&api).await;
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body(&missing)["error"]["code"], "UNAUTHENTICATED");

        let garbled = warp::test::request()
            .method("GET")
            .path("/api/wallet/balance")
            .header(USER_HEADER, "not-a-uuid")
            .reply(&api)
            .await;
        assert_eq!(garbled.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_deposit_then_balance_and_history() {
        let state = test_state();
        let api = create_routes(state.clone());
        let user_id = user(&state, false, Money::ZERO).await;

        let response = warp::test::request()
            .method("POST")
            .path("/api/wallet/deposit")
            .header(USER_HEADER, user_id.to_string())
            .json(&json!({ "amount": 5_000, "method": "card" }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["new_balance"], 5_000);

        let response = warp::test::request()
            .method("GET")
            .path("/api/wallet/balance")
            .header(USER_HEADER, user_id.to_string())
            .reply(&api)
            .await;
        assert_eq!(body(&response)["balance"], 5_000);

        let response = warp::test::request()
            .method("GET")
            .path("/api/wallet/transactions")
            .header(USER_HEADER, user_id.to_string())
            .reply(&api)
            .await;
        let log = body(&response);
        assert_eq!(log.as_array().unwrap().len(), 1);
        assert_eq!(log[0]["kind"], "deposit");
    }

    #[tokio::test]
    async fn test_validation_errors_render_code_and_details() {
        let state = test_state();
        let api = create_routes(state.clone());
        let user_id = user(&state, true, Money::from_dollars(100)).await;

        let response = warp::test::request()
            .method("POST")
            .path("/api/wallet/withdraw")
            .header(USER_HEADER, user_id.to_string())
            .json(&json!({ "amount": 5_000, "method": "bank_transfer" }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let error = &body(&response)["error"];
        assert_eq!(error["code"], "MISSING_PAYOUT_DETAILS");
        assert_eq!(error["kind"], "input_validation");
        assert_eq!(error["details"]["missing"], json!(["bank_account", "routing_number"]));

        let response = warp::test::request()
            .method("POST")
            .path("/api/wallet/deposit")
            .header(USER_HEADER, user_id.to_string())
            .json(&json!({ "amount": 5_000, "method": "bitcoin" }))
            .reply(&api)
            .await;
        assert_eq!(body(&response)["error"]["code"], "UNSUPPORTED_PAYMENT_METHOD");

        assert_eq!(state.ledger.balance(user_id).await.unwrap(), Money::from_dollars(100));
    }

    #[tokio::test]
    async fn test_insufficient_funds_is_payment_required() {
        let state = test_state();
        let api = create_routes(state.clone());
        let user_id = user(&state, true, Money::from_dollars(30)).await;

        let response = warp::test::request()
            .method("POST")
            .path("/api/wallet/withdraw")
            .header(USER_HEADER, user_id.to_string())
            .json(&json!({
                "amount": 3_000,
                "method": "paypal",
                "payout_details": { "paypal_email": "pro@example.com" }
            }))
            .reply(&api)
            .await;

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let error = &body(&response)["error"];
        assert_eq!(error["code"], "INSUFFICIENT_FUNDS");
        assert_eq!(error["details"]["required"], 3_200);
        assert_eq!(error["details"]["available"], 3_000);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let state = test_state();
        let api = create_routes(state.clone());
        let user_id = user(&state, true, Money::ZERO).await;

        let response = warp::test::request()
            .method("POST")
            .path("/api/wallet/deposit")
            .header(USER_HEADER, user_id.to_string())
            .header("content-type", "application/json")
            .body("{\"amount\": \"lots\"}")
            .reply(&api)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["error"]["code"], "INVALID_BODY");
    }

    #[tokio::test]
    async fn test_unknown_contest_is_not_found() {
        let state = test_state();
        let api = create_routes(state.clone());
        let user_id = user(&state, true, Money::from_dollars(50)).await;

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/api/contests/{}/join", Uuid::new_v4()))
            .header(USER_HEADER, user_id.to_string())
            .json(&json!({ "team_id": Uuid::new_v4() }))
            .reply(&api)
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&response)["error"]["code"], "CONTEST_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_contest_lifecycle_over_http() {
        let state = test_state();
        let api = create_routes(state.clone());
        let user_id = user(&state, true, Money::from_dollars(100)).await;
        let contest_id = open_contest(&state, Money::from_dollars(10)).await;
        let picks = squad_picks(&state).await;

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/api/contests/{contest_id}/teams"))
            .header(USER_HEADER, user_id.to_string())
            .json(&json!({ "team_name": "Night Owls", "players": picks }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body(&response);
        assert_eq!(created["can_afford_entry"], true);
        let team_id: TeamId = serde_json::from_value(created["team_id"].clone()).unwrap();

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/api/contests/{contest_id}/join"))
            .header(USER_HEADER, user_id.to_string())
            .json(&json!({ "team_id": team_id }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body(&response)["new_balance"], 9_000);

        // Joining twice is a conflict and charges nothing
        let response = warp::test::request()
            .method("POST")
            .path(&format!("/api/contests/{contest_id}/join"))
            .header(USER_HEADER, user_id.to_string())
            .json(&json!({ "team_id": team_id }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body(&response)["error"]["code"], "DUPLICATE_ENTRY");

        // Settling an open contest is refused
        let response = warp::test::request()
            .method("POST")
            .path(&format!("/api/admin/contests/{contest_id}/settle"))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body(&response)["error"]["code"], "CONTEST_NOT_COMPLETED");

        for next in ["closed", "completed"] {
            let response = warp::test::request()
                .method("POST")
                .path(&format!("/api/admin/contests/{contest_id}/status"))
                .json(&json!({ "status": next }))
                .reply(&api)
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body(&response)["status"], next);
        }
        state.catalog.set_team_points(team_id, Decimal::from(77)).await.unwrap();

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/api/admin/contests/{contest_id}/settle"))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let summary = body(&response);
        assert_eq!(summary["total_participants"], 1);
        assert_eq!(summary["distributions"][0]["rank"], 1);
        assert_eq!(summary["distributions"][0]["prize_amount"], 1_000);
        assert_eq!(state.ledger.balance(user_id).await.unwrap(), Money::from_dollars(100));
    }

    #[tokio::test]
    async fn test_bad_status_value_is_bad_request() {
        let state = test_state();
        let api = create_routes(state.clone());
        let contest_id = open_contest(&state, Money::ZERO).await;

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/api/admin/contests/{contest_id}/status"))
            .json(&json!({ "status": "archived" }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["error"]["code"], "INVALID_FIELD");

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/api/admin/contests/{contest_id}/status"))
            .json(&json!({ "status": "completed" }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body(&response)["error"]["code"], "INVALID_CONTEST_TRANSITION");
    }

    #[tokio::test]
    async fn test_failed_payout_confirmation_refunds() {
        let state = test_state();
        let api = create_routes(state.clone());
        let user_id = user(&state, true, Money::from_dollars(100)).await;

        let response = warp::test::request()
            .method("POST")
            .path("/api/wallet/withdraw")
            .header(USER_HEADER, user_id.to_string())
            .json(&json!({
                "amount": 5_000,
                "method": "bank_transfer",
                "payout_details": { "bank_account": "000123456789", "routing_number": "021000021" }
            }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let receipt = body(&response);
        assert_eq!(receipt["status"], "pending");
        assert_eq!(receipt["fee"], 200);
        assert_eq!(receipt["new_balance"], 4_800);
        let transaction_id = receipt["transaction_id"].as_str().unwrap().to_string();

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/api/admin/payouts/{transaction_id}/confirm"))
            .json(&json!({ "succeeded": false }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let resolution = body(&response);
        assert_eq!(resolution["status"], "failed");
        assert_eq!(resolution["new_balance"], 10_000);

        // A resolved payout cannot be resolved again
        let response = warp::test::request()
            .method("POST")
            .path(&format!("/api/admin/payouts/{transaction_id}/confirm"))
            .json(&json!({ "succeeded": true }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body(&response)["error"]["code"], "PAYOUT_ALREADY_RESOLVED");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let api = create_routes(test_state());
        let response = warp::test::request().method("GET").path("/api/nope").reply(&api).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&response)["error"]["code"], "ROUTE_NOT_FOUND");
    }
}
