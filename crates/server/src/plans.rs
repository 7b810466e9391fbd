use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use restock_agent::{PlanOrchestrator, PlanOutcome};
use restock_core::canonical::check_caller_horizon;
use restock_core::domain::plan::CallerId;
use restock_core::errors::{InterfaceError, PlanError};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

pub const CALLER_HEADER: &str = "x-caller-id";
pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct PlansState {
    orchestrator: Arc<PlanOrchestrator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub inventory_text: String,
    #[serde(default)]
    pub instruction_text: String,
    pub horizon_days: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanApiError {
    pub error: String,
    pub message: String,
    pub detail: String,
    pub correlation_id: String,
}

type ApiFailure = (StatusCode, Json<PlanApiError>);

pub fn router(orchestrator: Arc<PlanOrchestrator>) -> Router {
    Router::new().route("/api/v1/plans", post(create_plan)).with_state(PlansState { orchestrator })
}

async fn create_plan(
    State(state): State<PlansState>,
    headers: HeaderMap,
    body: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<PlanOutcome>, ApiFailure> {
    let correlation_id = header_value(&headers, CORRELATION_HEADER)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let caller = header_value(&headers, CALLER_HEADER).ok_or_else(|| {
        failure(
            PlanError::InvalidInput(format!("missing `{CALLER_HEADER}` header")),
            &correlation_id,
        )
    })?;
    let Json(request) = body.map_err(|rejection| {
        failure(PlanError::InvalidInput(rejection.body_text()), &correlation_id)
    })?;
    check_caller_horizon(request.horizon_days)
        .map_err(|error| failure(error, &correlation_id))?;

    info!(
        event_name = "http.plan.requested",
        correlation_id = %correlation_id,
        caller_id = %caller,
        horizon_days = request.horizon_days,
        "plan requested"
    );

    let outcome = state
        .orchestrator
        .produce_plan_with_correlation(
            &CallerId(caller),
            &request.inventory_text,
            &request.instruction_text,
            request.horizon_days,
            &correlation_id,
        )
        .await
        .map_err(|error| failure(error, &correlation_id))?;

    Ok(Json(outcome))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn failure(error: PlanError, correlation_id: &str) -> ApiFailure {
    let class = error.class().to_string();
    let detail = error.to_string();
    let interface = error.into_interface(correlation_id);
    let status = match interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(PlanApiError {
            error: class,
            message: interface.user_message().to_string(),
            detail,
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use chrono::{FixedOffset, TimeZone};
    use restock_agent::{
        GatewayError, GatewayRequest, PlanOrchestrator, ReasoningGateway, StructuredInvocation,
    };
    use restock_core::calendar::FixedClock;
    use restock_db::InMemoryPlanCache;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::router;

    struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<Value, GatewayError>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReasoningGateway for ScriptedGateway {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn submit(
            &self,
            request: &GatewayRequest,
        ) -> Result<StructuredInvocation, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::Transport("script exhausted".to_string())));
            reply.map(|arguments| StructuredInvocation {
                tool_name: request.tool.name.clone(),
                arguments,
            })
        }
    }

    fn app(replies: Vec<Result<Value, GatewayError>>) -> (Router, Arc<ScriptedGateway>) {
        let gateway = Arc::new(ScriptedGateway {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        });
        let saturday = FixedOffset::east_opt(0)
            .and_then(|offset| offset.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).single())
            .expect("timestamp");
        let orchestrator =
            PlanOrchestrator::new(gateway.clone(), Arc::new(InMemoryPlanCache::default()))
                .with_clock(Arc::new(FixedClock(saturday)));
        (router(Arc::new(orchestrator)), gateway)
    }

    fn plan_reply() -> Value {
        json!({
            "status": "SUCCESS",
            "summary": "Top up oil before the weekend rush",
            "totalCost": 1500,
            "items": [{
                "itemName": "Oil",
                "currentStock": 0.5,
                "recommendedOrder": 10,
                "unit": "liters",
                "unitPrice": 150,
                "estimatedCost": 1500,
                "riskLevel": "High",
                "appliedPolicy": "LOW_STOCK_CRITICAL",
                "reasoning": "Half a liter against five liters a day"
            }]
        })
    }

    fn request(caller: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/plans")
            .header("content-type", "application/json")
            .header("x-correlation-id", "corr-test-1");
        if let Some(caller) = caller {
            builder = builder.header("x-caller-id", caller);
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    fn body(horizon_days: u32) -> Value {
        json!({
            "inventoryText": "Oil,0.5,liters,5,150\nPaneer,2,kg,3,380",
            "instructionText": "weekend prep",
            "horizonDays": horizon_days,
        })
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn repeated_request_is_served_from_cache() {
        let (app, gateway) = app(vec![Ok(plan_reply())]);

        let (status, first) = send(&app, request(Some("kitchen-7"), body(3))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["origin"], "fresh");
        assert_eq!(first["plan"]["status"], "SUCCESS");
        assert_eq!(first["correlationId"], "corr-test-1");

        let (status, second) = send(&app, request(Some("kitchen-7"), body(3))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["origin"], "cache");
        assert_eq!(second["fingerprint"], first["fingerprint"]);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_caller_header_is_bad_request() {
        let (app, gateway) = app(vec![Ok(plan_reply())]);

        let (status, payload) = send(&app, request(None, body(3))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["error"], "invalid_input");
        assert_eq!(payload["correlationId"], "corr-test-1");
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn horizon_outside_caller_bounds_is_bad_request() {
        let (app, _gateway) = app(Vec::new());

        let (status, payload) = send(&app, request(Some("kitchen-7"), body(45))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(payload["detail"].as_str().is_some_and(|detail| detail.contains("between 1 and 30")));
    }

    #[tokio::test]
    async fn unreadable_body_is_bad_request() {
        let (app, _gateway) = app(Vec::new());

        let (status, payload) =
            send(&app, request(Some("kitchen-7"), json!({ "inventoryText": 42 }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["error"], "invalid_input");
    }

    #[tokio::test]
    async fn malformed_plan_maps_to_bad_gateway() {
        let mut reply = plan_reply();
        reply["items"][0]["riskLevel"] = json!("Low");
        let (app, _gateway) = app(vec![Ok(reply)]);

        let (status, payload) = send(&app, request(Some("kitchen-7"), body(3))).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(payload["error"], "malformed_plan");
        assert!(payload["detail"].as_str().is_some_and(|detail| detail.contains("low_stock_risk")));
    }

    #[tokio::test]
    async fn transport_failure_maps_to_service_unavailable() {
        let (app, _gateway) =
            app(vec![Err(GatewayError::Transport("connection refused".to_string()))]);

        let (status, payload) = send(&app, request(Some("kitchen-7"), body(3))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload["error"], "transport");
    }
}
