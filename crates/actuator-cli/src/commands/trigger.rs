//! Trigger actions for a client's latest workflow document

use crate::{
    cli::OutputFormat,
    commands::execute::ExecuteCommand,
    error::{CliError, CliResult},
    utils::{print_json, ColoredOutput},
    workspace::Workspace,
};
use actuator_runtime::{TriggerPlan, TriggerReport};

pub struct TriggerCommand;

impl TriggerCommand {
    pub async fn run(workspace: &Workspace, client_id: &str, dry_run: bool, format: OutputFormat) -> CliResult<()> {
        let workflow = workspace.latest_workflow(client_id).await?;

        if dry_run {
            let plan = workspace
                .engine
                .plan_triggers(client_id, &workflow.version_id, &workflow.source_text, &workspace.environment)
                .await?;
            match format {
                OutputFormat::Text => Self::display_plan(&plan),
                OutputFormat::Json => print_json(&plan)?,
            }
            return Ok(());
        }

        let report = workspace
            .engine
            .trigger_actions_for_workflow_change(
                client_id,
                &workflow.version_id,
                &workflow.source_text,
                &workspace.environment,
            )
            .await?;
        match format {
            OutputFormat::Text => Self::display_report(&report),
            OutputFormat::Json => print_json(&report)?,
        }

        let failed = report.executed.iter().filter(|r| !r.success).count() + report.errors.len();
        if failed > 0 {
            return Err(CliError::ExecutionFailed(format!("{} triggered action(s) did not complete", failed)));
        }
        Ok(())
    }

    fn display_plan(plan: &TriggerPlan) {
        println!("Verbs: {}", plan.verbs.join(", "));
        if plan.planned.is_empty() {
            println!("{}", ColoredOutput::info("No actions would run"));
        }
        for planned in &plan.planned {
            println!("  {} {} ({})", ColoredOutput::success("would run"), planned.action_id, planned.verb);
        }
        for skipped in &plan.skipped {
            println!("  {} {} ({}): {}", ColoredOutput::dim("skip"), skipped.action_id, skipped.verb, skipped.reason);
        }
    }

    fn display_report(report: &TriggerReport) {
        println!("Verbs: {}", report.verbs.join(", "));
        if report.executed.is_empty() && report.errors.is_empty() {
            println!("{}", ColoredOutput::info("No actions triggered"));
        }
        for result in &report.executed {
            println!();
            ExecuteCommand::display_result(result);
        }
        for skipped in &report.skipped {
            println!("{} {} ({}): {}", ColoredOutput::dim("skipped"), skipped.action_id, skipped.verb, skipped.reason);
        }
        for failure in &report.errors {
            println!("{} {} ({}): {}", ColoredOutput::error("error"), failure.action_id, failure.verb, failure.message);
        }
    }
}
