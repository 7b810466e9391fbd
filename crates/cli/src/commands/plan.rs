use std::sync::Arc;

use crate::commands::{read_inventory, CommandResult};
use restock_agent::{build_gateway, PlanOrchestrator, PlanOutcome};
use restock_core::canonical::check_caller_horizon;
use restock_core::config::{AppConfig, LoadOptions};
use restock_core::domain::plan::{CallerId, PlanOrigin};
use restock_core::errors::PlanError;
use restock_db::{connect_with_config, migrations, SqlPlanCache};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PlanArgs {
    pub caller: String,
    pub inventory: String,
    pub instruction: String,
    pub horizon_days: u32,
}

pub fn run(args: PlanArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "plan",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    if args.caller.trim().is_empty() {
        return CommandResult::failure("plan", "invalid_input", "caller id must not be empty", 6);
    }
    if let Err(error) = check_caller_horizon(args.horizon_days) {
        return CommandResult::failure("plan", error.class(), error.to_string(), 6);
    }
    let inventory_text = match read_inventory(&args.inventory) {
        Ok(text) => text,
        Err(message) => return CommandResult::failure("plan", "input_read", message, 6),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "plan",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let correlation_id = Uuid::new_v4().to_string();
    let result =
        runtime.block_on(execute(&config, &args, &inventory_text, &correlation_id));

    match result {
        Ok(outcome) => {
            let message = format!(
                "{} plan ({:?}) for fingerprint {}",
                origin_label(outcome.origin),
                outcome.plan.status(),
                outcome.fingerprint.short()
            );
            let data = json!({
                "origin": outcome.origin,
                "fingerprint": outcome.fingerprint,
                "correlationId": outcome.correlation_id,
                "calendarContext": outcome.calendar_context,
                "plan": outcome.plan,
            });
            CommandResult::success_with_data("plan", message, data)
        }
        Err((error_class, message, exit_code)) => CommandResult::failure_with_correlation(
            "plan",
            error_class,
            message,
            exit_code,
            Some(correlation_id),
        ),
    }
}

async fn execute(
    config: &AppConfig,
    args: &PlanArgs,
    inventory_text: &str,
    correlation_id: &str,
) -> Result<PlanOutcome, (&'static str, String, u8)> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), 5u8))?;

    let gateway =
        build_gateway(&config.llm).map_err(|error| ("gateway_init", error.to_string(), 3u8))?;
    let orchestrator = PlanOrchestrator::from_config(
        config,
        Arc::from(gateway),
        Arc::new(SqlPlanCache::new(pool.clone())),
    );

    let outcome = orchestrator
        .produce_plan_with_correlation(
            &CallerId(args.caller.trim().to_string()),
            inventory_text,
            &args.instruction,
            args.horizon_days,
            correlation_id,
        )
        .await;
    pool.close().await;

    outcome.map_err(|error| (error.class(), error.to_string(), exit_code_for(&error)))
}

fn exit_code_for(error: &PlanError) -> u8 {
    match error {
        PlanError::InvalidInput(_) => 6,
        PlanError::Transport(_) => 7,
        PlanError::NoStructuredOutput(_)
        | PlanError::MalformedPlan(_)
        | PlanError::PolicyInconsistency(_) => 8,
        PlanError::Cache(_) => 9,
    }
}

fn origin_label(origin: PlanOrigin) -> &'static str {
    match origin {
        PlanOrigin::Cache => "cached",
        PlanOrigin::Fresh => "fresh",
    }
}
