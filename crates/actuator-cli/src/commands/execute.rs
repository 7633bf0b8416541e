//! Action execution command

use crate::{
    cli::OutputFormat,
    error::{CliError, CliResult},
    utils::{format_duration_ms, print_json, ColoredOutput},
    workspace::Workspace,
};
use actuator_runtime::{ExecutionRequest, ExecutionResult};
use tracing::info;

pub struct ExecuteCommand;

impl ExecuteCommand {
    pub async fn run(
        workspace: &Workspace,
        action_id: &str,
        client_id: &str,
        version_id: Option<String>,
        format: OutputFormat,
    ) -> CliResult<()> {
        let workflow = match version_id {
            Some(version) => workspace.workflow_version(client_id, &version).await?,
            None => workspace.latest_workflow(client_id).await?,
        };
        let request = ExecutionRequest::new(action_id, client_id, &workflow.version_id, &workspace.environment)
            .with_workflow_text(workflow.source_text);

        info!(
            action_id = %action_id,
            client_id = %client_id,
            version_id = %request.workflow_version_id,
            "Executing action"
        );
        let result = workspace.engine.execute_action(request).await?;

        match format {
            OutputFormat::Text => Self::display_result(&result),
            OutputFormat::Json => print_json(&result)?,
        }

        if result.success {
            Ok(())
        } else {
            let message = result
                .error_details
                .as_ref()
                .map(|d| format!("{} ({})", d.message, d.kind))
                .unwrap_or_else(|| result.status.to_string());
            Err(CliError::ExecutionFailed(message))
        }
    }

    pub fn display_result(result: &ExecutionResult) {
        let status = result.status.to_string();
        let status = if result.success { ColoredOutput::success(&status) } else { ColoredOutput::error(&status) };

        println!("Execution ID: {}", ColoredOutput::highlight(&result.execution_id));
        println!("Action:       {}", result.action_id);
        println!("Status:       {}", status);
        if result.replayed {
            println!("              {}", ColoredOutput::dim("(replayed from a completed execution)"));
        }
        if let Some(code) = result.http_status {
            println!("HTTP status:  {}", code);
        }
        if let Some(ms) = result.duration_ms {
            println!("Duration:     {}", ColoredOutput::info(&format_duration_ms(ms)));
        }
        println!("Retries:      {}", result.retry_count);
        println!("Correlation:  {}", ColoredOutput::dim(&result.correlation_id));

        if !result.result_attributes.is_empty() {
            println!();
            println!("{}", ColoredOutput::highlight("Result attributes:"));
            for (attribute_id, value) in &result.result_attributes {
                println!("  {} = {}", attribute_id, value.render());
            }
        }

        for warning in &result.warnings {
            println!("{} {}", ColoredOutput::warning("warning:"), warning);
        }

        if let Some(details) = &result.error_details {
            println!();
            println!("{} {}", ColoredOutput::error(details.kind.as_str()), details.message);
            for (key, value) in &details.context {
                println!("  {}: {}", ColoredOutput::dim(key), value);
            }
        }
    }
}
