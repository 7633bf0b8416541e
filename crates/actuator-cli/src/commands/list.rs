//! List command for resource types and actions

use crate::{
    cli::{ListResource, OutputFormat},
    error::{CliError, CliResult},
    utils::{print_json, truncate_text, ColoredOutput},
    workspace::Workspace,
};
use actuator_core::{ActionCatalog, ActionDefinition, ResourceType};
use tracing::debug;

pub struct ListCommand;

#[derive(Debug, Default, Clone, Copy)]
pub struct ActionFilter<'a> {
    pub verb: Option<&'a str>,
    pub resource_type_id: Option<&'a str>,
    pub all: bool,
}

impl ListCommand {
    pub async fn run(workspace: &Workspace, resource: ListResource) -> CliResult<()> {
        match resource {
            ListResource::ResourceTypes { format } => Self::list_resource_types(workspace, format).await,
            ListResource::Actions { verb, resource_type, all, format } => {
                Self::list_actions(workspace, verb.as_deref(), resource_type.as_deref(), all, format).await
            }
        }
    }

    async fn list_resource_types(workspace: &Workspace, format: OutputFormat) -> CliResult<()> {
        let mut resource_types = workspace.store.list_resource_types().await?;
        resource_types.sort_by(|a, b| a.name.cmp(&b.name));

        match format {
            OutputFormat::Text => Self::display_resource_types(&resource_types),
            OutputFormat::Json => print_json(&resource_types)?,
        }
        Ok(())
    }

    async fn list_actions(
        workspace: &Workspace,
        verb: Option<&str>,
        resource_type: Option<&str>,
        all: bool,
        format: OutputFormat,
    ) -> CliResult<()> {
        debug!(
            verb = ?verb,
            resource_type = ?resource_type,
            all,
            environment = %workspace.environment,
            "Listing actions"
        );

        let resource_type_id = match resource_type {
            Some(name) => Some(
                workspace
                    .store
                    .find_resource_type_by_name(name)
                    .await?
                    .ok_or_else(|| CliError::InvalidArgument(format!("Unknown resource type '{}'", name)))?
                    .resource_type_id,
            ),
            None => None,
        };
        let filter = ActionFilter { verb, resource_type_id: resource_type_id.as_deref(), all };
        let actions = Self::select_actions(workspace.store.list_actions().await?, &filter, &workspace.environment);
        match format {
            OutputFormat::Text => Self::display_actions(&actions),
            OutputFormat::Json => print_json(&actions)?,
        }
        Ok(())
    }

    /// Active actions in `environment` unless `all`, narrowed by verb and resource type.
    pub fn select_actions(
        actions: Vec<ActionDefinition>,
        filter: &ActionFilter<'_>,
        environment: &str,
    ) -> Vec<ActionDefinition> {
        let mut selected: Vec<ActionDefinition> = actions
            .into_iter()
            .filter(|a| filter.all || (a.active && a.environment == environment))
            .filter(|a| filter.verb.map_or(true, |v| a.verb_pattern == v))
            .filter(|a| filter.resource_type_id.map_or(true, |id| a.resource_type_id.as_deref() == Some(id)))
            .collect();
        selected.sort_by(|a, b| a.verb_pattern.cmp(&b.verb_pattern).then_with(|| a.action_id.cmp(&b.action_id)));
        selected
    }

    fn display_resource_types(resource_types: &[ResourceType]) {
        if resource_types.is_empty() {
            println!("{}", ColoredOutput::info("No resource types found"));
            return;
        }

        println!("{}", ColoredOutput::success(&format!("Found {} resource type(s):", resource_types.len())));
        println!();
        println!(
            "{:<24} {:<28} {:<14} {:<8} {}",
            ColoredOutput::highlight("ID"),
            ColoredOutput::highlight("Name"),
            ColoredOutput::highlight("Environment"),
            ColoredOutput::highlight("Version"),
            ColoredOutput::highlight("Lifecycle")
        );
        println!("{}", "-".repeat(96));

        for rt in resource_types {
            let lifecycle: Vec<&str> = rt.lifecycle_endpoints.keys().map(String::as_str).collect();
            println!(
                "{:<24} {:<28} {:<14} {:<8} {}",
                truncate_text(&rt.resource_type_id, 24),
                truncate_text(&rt.name, 28),
                rt.environment,
                rt.version,
                lifecycle.join(",")
            );
        }
    }

    fn display_actions(actions: &[ActionDefinition]) {
        if actions.is_empty() {
            println!("{}", ColoredOutput::info("No actions found"));
            return;
        }

        println!("{}", ColoredOutput::success(&format!("Found {} action(s):", actions.len())));
        println!();
        println!(
            "{:<24} {:<24} {:<8} {:<40} {:<12} {}",
            ColoredOutput::highlight("Action"),
            ColoredOutput::highlight("Verb"),
            ColoredOutput::highlight("Method"),
            ColoredOutput::highlight("Endpoint"),
            ColoredOutput::highlight("Environment"),
            ColoredOutput::highlight("Active")
        );
        println!("{}", "-".repeat(120));

        for action in actions {
            let active = if action.active { "yes" } else { "-" };
            println!(
                "{:<24} {:<24} {:<8} {:<40} {:<12} {}",
                truncate_text(&action.action_id, 24),
                truncate_text(&action.verb_pattern, 24),
                action.execution_config.method.to_uppercase(),
                truncate_text(&action.execution_config.endpoint_url, 40),
                action.environment,
                active
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(id: &str, verb: &str, env: &str, active: bool) -> ActionDefinition {
        let mut action: ActionDefinition = serde_json::from_value(serde_json::json!({
            "action_id": id,
            "action_name": id,
            "verb_pattern": verb,
            "environment": env,
            "execution_config": {"endpoint_url": "https://svc.test"}
        }))
        .unwrap();
        action.active = active;
        action
    }

    #[test]
    fn test_select_actions_filters_environment_and_verb() {
        let actions = vec![
            action("b", "resources.create", "test", true),
            action("a", "resources.create", "test", true),
            action("c", "resources.create", "prod", true),
            action("d", "case.close", "test", false),
        ];

        let ids = |selected: Vec<ActionDefinition>| selected.into_iter().map(|a| a.action_id).collect::<Vec<_>>();
        let active = ActionFilter::default();
        let close = ActionFilter { verb: Some("case.close"), all: true, ..ActionFilter::default() };
        let every = ActionFilter { all: true, ..ActionFilter::default() };
        assert_eq!(ids(ListCommand::select_actions(actions.clone(), &active, "test")), vec!["a", "b"]);
        assert_eq!(ids(ListCommand::select_actions(actions.clone(), &close, "test")), vec!["d"]);
        assert_eq!(ids(ListCommand::select_actions(actions, &every, "test")).len(), 4);
    }

    #[test]
    fn test_select_actions_by_resource_type() {
        let mut custody = action("a", "resources.create", "test", true);
        custody.resource_type_id = Some("rt-custody".into());
        let actions = vec![custody, action("b", "resources.create", "test", true)];

        let filter = ActionFilter { resource_type_id: Some("rt-custody"), ..ActionFilter::default() };
        let selected = ListCommand::select_actions(actions, &filter, "test");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].action_id, "a");
    }
}
