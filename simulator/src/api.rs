use crate::{Simulator, SimulatorError};
use anyhow::Context;
use axum::{
    extract::{Path, State as AxumState},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{Any, CorsLayer};

/// Sustained requests per second allowed for each client.
const RATE_LIMIT_PER_SECOND: u64 = 1_000;

/// Requests a client may burst above the sustained rate.
const RATE_LIMIT_BURST: u32 = 10_000;

impl SimulatorError {
    fn status(&self) -> StatusCode {
        match self {
            SimulatorError::UnknownAccount(_)
            | SimulatorError::NotQueued(_)
            | SimulatorError::UnknownBlock(_) => StatusCode::NOT_FOUND,
            SimulatorError::InvalidId(_)
            | SimulatorError::Bet(_)
            | SimulatorError::Queue(_)
            | SimulatorError::InsufficientFunds { .. }
            | SimulatorError::InvalidHeight { .. }
            | SimulatorError::TooManyBlocks { .. } => StatusCode::BAD_REQUEST,
            SimulatorError::Halted(_) => StatusCode::SERVICE_UNAVAILABLE,
            SimulatorError::Rejected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SimulatorError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Deserialize)]
struct MakeBet {
    account: String,
    bet: String,
    range: Option<u32>,
}

#[derive(Deserialize)]
struct Generate {
    #[serde(default = "default_blocks")]
    blocks: u64,
}

fn default_blocks() -> u64 {
    1
}

pub struct Api {
    simulator: Arc<Simulator>,
}

impl Api {
    pub fn new(simulator: Arc<Simulator>) -> Self {
        Self { simulator }
    }

    pub fn router(&self) -> anyhow::Result<Router> {
        // Configure CORS
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);

        // Configure Rate Limiting
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_millisecond(1_000 / RATE_LIMIT_PER_SECOND)
                .burst_size(RATE_LIMIT_BURST)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .context("invalid rate limit configuration")?,
        );

        Ok(Router::new()
            .route("/makebet", post(make_bet))
            .route("/generate", post(generate))
            .route("/queue", get(queued))
            .route("/queue/:id", delete(cancel))
            .route("/balance/:account", get(balance))
            .route("/ledger", get(ledger))
            .route("/block/:height", get(block))
            .route("/rollback/:height", post(rollback))
            .route("/replay", post(replay))
            .layer(cors)
            .layer(GovernorLayer {
                config: governor_conf,
            })
            .with_state(self.simulator.clone()))
    }
}

async fn make_bet(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Json(request): Json<MakeBet>,
) -> Result<impl IntoResponse, SimulatorError> {
    let placed = simulator
        .make_bet(&request.account, &request.bet, request.range)
        .await?;
    Ok(Json(placed))
}

async fn generate(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Json(request): Json<Generate>,
) -> Result<impl IntoResponse, SimulatorError> {
    Ok(Json(simulator.generate(request.blocks).await?))
}

async fn queued(AxumState(simulator): AxumState<Arc<Simulator>>) -> impl IntoResponse {
    Json(simulator.queued().await)
}

async fn cancel(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SimulatorError> {
    Ok(Json(simulator.cancel(&id).await?))
}

async fn balance(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Path(account): Path<String>,
) -> Result<impl IntoResponse, SimulatorError> {
    Ok(Json(simulator.balance(&account).await?))
}

async fn ledger(AxumState(simulator): AxumState<Arc<Simulator>>) -> impl IntoResponse {
    Json(simulator.pending().await)
}

async fn block(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Path(height): Path<u64>,
) -> Result<impl IntoResponse, SimulatorError> {
    Ok(Json(simulator.block(height).await?))
}

async fn rollback(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Path(height): Path<u64>,
) -> Result<impl IntoResponse, SimulatorError> {
    Ok(Json(simulator.rollback(height).await?))
}

async fn replay(
    AxumState(simulator): AxumState<Arc<Simulator>>,
) -> Result<impl IntoResponse, SimulatorError> {
    Ok(Json(simulator.replay().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tests::config, Placed};
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use betchain_types::COIN;
    use commonware_runtime::{deterministic::Runner, Runner as _};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    async fn call<T: DeserializeOwned>(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, T) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "127.0.0.1");
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_routes() {
        let executor = Runner::default();
        executor.start(|context| async move {
            let simulator = Arc::new(Simulator::new(context, &config(50 * COIN, 1)).await);
            let router = Api::new(simulator).router().unwrap();

            let (status, placed): (_, Placed) = call(
                &router,
                Method::POST,
                "/makebet",
                Some(json!({ "account": "user1", "bet": "1@1+2@1", "range": 2 })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(placed.stake, 2 * COIN);

            let (status, blocks): (_, Vec<crate::BlockSummary>) = call(
                &router,
                Method::POST,
                "/generate",
                Some(json!({ "blocks": 2 })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(blocks.len(), 2);
            assert_eq!(blocks[1].settlements[0].payout, 2 * COIN);

            let (status, block): (_, crate::BlockSummary) =
                call(&router, Method::GET, "/block/2", None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(block, blocks[1]);

            let (status, balance): (_, crate::BalanceView) =
                call(&router, Method::GET, "/balance/user1", None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(balance.confirmed, 100 * COIN);

            let (status, ledger): (_, crate::LedgerView) =
                call(&router, Method::GET, "/ledger", None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(ledger.pending, 0);

            let (status, rollback): (_, crate::RollbackView) =
                call(&router, Method::POST, "/rollback/1", None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(rollback.abandoned, 1);
        });
    }

    #[test]
    fn test_error_statuses() {
        let executor = Runner::default();
        executor.start(|context| async move {
            let simulator = Arc::new(Simulator::new(context, &config(50 * COIN, 1)).await);
            let router = Api::new(simulator).router().unwrap();

            let (status, body): (_, serde_json::Value) = call(
                &router,
                Method::POST,
                "/makebet",
                Some(json!({ "account": "user1", "bet": "red@1+7@1" })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].as_str().unwrap().contains("roulette"));

            let (status, body): (_, serde_json::Value) = call(
                &router,
                Method::POST,
                "/generate",
                Some(json!({ "blocks": 1_000 })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].as_str().unwrap().contains("max 100"));

            let (status, _): (_, serde_json::Value) =
                call(&router, Method::GET, "/balance/nobody", None).await;
            assert_eq!(status, StatusCode::NOT_FOUND);

            let (status, _): (_, serde_json::Value) =
                call(&router, Method::GET, "/block/1", None).await;
            assert_eq!(status, StatusCode::NOT_FOUND);

            let id = "00".repeat(32);
            let (status, _): (_, serde_json::Value) =
                call(&router, Method::DELETE, &format!("/queue/{id}"), None).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
        });
    }
}
