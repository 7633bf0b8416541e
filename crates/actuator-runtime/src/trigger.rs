//! Verb scanning of workflow text and best-effort fan-out to matching actions.

use actuator_core::{ActionDefinition, TriggerConditions};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::{ExecutionEngine, ExecutionRequest, ExecutionResult};
use crate::error::RuntimeResult;

static VERB: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*([a-z][a-z0-9_]*\.[a-z][a-z0-9_\-]*)").unwrap());

/// `domain.verb` tokens in first-seen order, without duplicates.
pub fn extract_verbs(text: &str) -> Vec<String> {
    let mut verbs: Vec<String> = Vec::new();
    for capture in VERB.captures_iter(text) {
        let verb = &capture[1];
        if !verbs.iter().any(|v| v == verb) {
            verbs.push(verb.to_string());
        }
    }
    verbs
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedAction {
    pub action_id: String,
    pub verb: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerFailure {
    pub action_id: String,
    pub verb: String,
    pub message: String,
}

/// A matched action whose trigger conditions hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedAction {
    pub action_id: String,
    pub verb: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TriggerPlan {
    pub verbs: Vec<String>,
    pub planned: Vec<PlannedAction>,
    pub skipped: Vec<SkippedAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TriggerReport {
    pub verbs: Vec<String>,
    pub executed: Vec<ExecutionResult>,
    pub skipped: Vec<SkippedAction>,
    pub errors: Vec<TriggerFailure>,
}

impl ExecutionEngine {
    /// Evaluate which actions a workflow change would fire, without executing them.
    pub async fn plan_triggers(
        &self,
        client_id: &str,
        version_id: &str,
        text: &str,
        environment: &str,
    ) -> RuntimeResult<TriggerPlan> {
        let verbs = extract_verbs(text);
        let mut plan = TriggerPlan { verbs: verbs.clone(), ..Default::default() };

        for verb in &verbs {
            let actions = self.catalog.find_active_actions(verb, environment).await?;
            for action in actions {
                match self.unmet_condition(&action, client_id, version_id, text).await? {
                    None => plan.planned.push(PlannedAction { action_id: action.action_id, verb: verb.clone() }),
                    Some(reason) => {
                        warn!(
                            action_id = %action.action_id,
                            verb = %verb,
                            reason = %reason,
                            "Trigger conditions not met"
                        );
                        plan.skipped.push(SkippedAction { action_id: action.action_id, verb: verb.clone(), reason });
                    }
                }
            }
        }
        Ok(plan)
    }

    /// Execute every action whose verb appears in `text` and whose trigger
    /// conditions hold. One action failing does not stop the others.
    pub async fn trigger_actions_for_workflow_change(
        &self,
        client_id: &str,
        version_id: &str,
        text: &str,
        environment: &str,
    ) -> RuntimeResult<TriggerReport> {
        let plan = self.plan_triggers(client_id, version_id, text, environment).await?;
        info!(
            client_id = %client_id,
            version_id = %version_id,
            verbs = plan.verbs.len(),
            planned = plan.planned.len(),
            "Triggering actions for workflow change"
        );

        let mut report = TriggerReport { verbs: plan.verbs, skipped: plan.skipped, ..Default::default() };
        for planned in plan.planned {
            let request = ExecutionRequest::new(&planned.action_id, client_id, version_id, environment)
                .with_workflow_text(text)
                .with_context("verb", planned.verb.as_str());
            match self.execute_action(request).await {
                Ok(result) => report.executed.push(result),
                Err(err) => {
                    warn!(action_id = %planned.action_id, error = %err, "Triggered action could not run");
                    report.errors.push(TriggerFailure {
                        action_id: planned.action_id,
                        verb: planned.verb,
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    async fn unmet_condition(
        &self,
        action: &ActionDefinition,
        client_id: &str,
        version_id: &str,
        text: &str,
    ) -> RuntimeResult<Option<String>> {
        let TriggerConditions { domain: _, state, required_attributes } = &action.trigger_conditions;

        if let Some(state) = state.as_deref().filter(|s| !s.is_empty()) {
            if !text.contains(state) {
                return Ok(Some(format!("state '{}' not present in workflow", state)));
            }
        }

        for attribute_id in required_attributes {
            if text.contains(attribute_id.as_str()) {
                continue;
            }
            if self.attributes.get_value(client_id, version_id, attribute_id).await?.is_none() {
                return Ok(Some(format!("required attribute '{}' not available", attribute_id)));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_are_deduplicated_in_order() {
        let text = r#"(case.create (cbu-id "c1"))
            (resources.create (kind "custody"))
            (  case.create (again true))
            (values.bind (bind (attr-id "x") (value "y")))"#;
        assert_eq!(extract_verbs(text), vec!["case.create", "resources.create", "values.bind"]);
    }

    #[test]
    fn verbs_need_an_opening_paren_and_a_dot() {
        assert!(extract_verbs("case.create without paren").is_empty());
        assert!(extract_verbs("(create)").is_empty());
        assert_eq!(extract_verbs("(kyc.start-review)"), vec!["kyc.start-review"]);
    }
}
