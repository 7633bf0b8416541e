//! Attribute resolution: workflow text, persisted values, source systems and
//! defaults, tried in that order.

use actuator_core::{
    AttrValue, AttributeMap, AttributeMetadata, AttributeStore, CoreError, Payload, ResolutionSource,
    ResolvedAttribute, ValueStatus,
};
use chrono::Utc;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::config::DEFAULT_CONFIDENCE_FLOOR;
use crate::error::{RuntimeError, RuntimeResult};
use crate::transform::transform;

const CONFIDENCE_BOUND: f64 = 1.0;
const CONFIDENCE_INFERRED: f64 = 0.8;
const CONFIDENCE_STORED: f64 = 0.9;
const CONFIDENCE_PROVISIONAL: f64 = 0.7;
const CONFIDENCE_GENERATED: f64 = 0.6;
const CONFIDENCE_DEFAULT: f64 = 0.5;

/// Inputs available while resolving attributes for one execution.
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    pub client_id: String,
    pub workflow_version_id: String,
    pub environment: String,
    /// Workflow source; the client's latest stored document is used when absent
    pub workflow_text: Option<String>,
    /// Extra values keyed by attribute name or id
    pub extra: BTreeMap<String, AttrValue>,
}

impl ResolutionContext {
    pub fn new(
        client_id: impl Into<String>,
        workflow_version_id: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            workflow_version_id: workflow_version_id.into(),
            environment: environment.into(),
            workflow_text: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_workflow_text(mut self, text: impl Into<String>) -> Self {
        self.workflow_text = Some(text.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Outcome of resolving every input mapping of an action.
#[derive(Debug, Default)]
pub struct ResolvedInputs {
    pub resolved: BTreeMap<String, ResolvedAttribute>,
    /// (attribute id, required, error) for mappings that failed
    pub failures: Vec<(String, bool, RuntimeError)>,
}

impl ResolvedInputs {
    pub fn required_failures(&self) -> impl Iterator<Item = &(String, bool, RuntimeError)> {
        self.failures.iter().filter(|(_, required, _)| *required)
    }
}

enum Strategy {
    Found(ResolvedAttribute),
    Skipped(String),
}

pub struct AttributeResolver {
    store: Arc<dyn AttributeStore>,
    confidence_floor: f64,
}

impl AttributeResolver {
    pub fn new(store: Arc<dyn AttributeStore>) -> Self {
        Self { store, confidence_floor: DEFAULT_CONFIDENCE_FLOOR }
    }

    pub fn with_confidence_floor(mut self, floor: f64) -> Self {
        self.confidence_floor = floor.clamp(0.0, 1.0);
        self
    }

    pub fn confidence_floor(&self) -> f64 {
        self.confidence_floor
    }

    /// Resolve one attribute, returning the first strategy that succeeds.
    pub async fn resolve_attribute(
        &self,
        attribute_id: &str,
        ctx: &ResolutionContext,
    ) -> RuntimeResult<ResolvedAttribute> {
        let metadata = self.store.get_metadata(attribute_id).await?;
        let mut reasons = Vec::new();

        let outcome = self.from_workflow(attribute_id, metadata.as_ref(), ctx).await?;
        if let Some(attr) = settle(attribute_id, "workflow_state", outcome, &mut reasons) {
            return Ok(attr);
        }
        let outcome = self.from_store(attribute_id, ctx).await?;
        if let Some(attr) = settle(attribute_id, "attribute_store", outcome, &mut reasons) {
            return Ok(attr);
        }
        let outcome = from_source_system(attribute_id, metadata.as_ref());
        if let Some(attr) = settle(attribute_id, "source_system", outcome, &mut reasons) {
            return Ok(attr);
        }
        let outcome = from_default(attribute_id, metadata.as_ref());
        if let Some(attr) = settle(attribute_id, "default", outcome, &mut reasons) {
            return Ok(attr);
        }

        Err(RuntimeError::Unresolved { attribute_id: attribute_id.to_string(), reasons })
    }

    /// Resolve an attribute and apply the mapping's transformation, if any.
    pub async fn resolve_mapping(
        &self,
        mapping: &AttributeMap,
        ctx: &ResolutionContext,
    ) -> RuntimeResult<ResolvedAttribute> {
        let mut attr = self.resolve_attribute(&mapping.attribute_id, ctx).await?;
        if let Some(kind) = mapping.transformation.as_deref().filter(|k| !k.trim().is_empty()) {
            attr.transformed_value = Some(transform(&attr.value, kind)?);
        }
        Ok(attr)
    }

    /// Resolve every mapping, collecting failures instead of stopping at the first.
    pub async fn resolve_inputs(
        &self,
        mappings: &[AttributeMap],
        ctx: &ResolutionContext,
    ) -> RuntimeResult<ResolvedInputs> {
        let mut inputs = ResolvedInputs::default();
        for mapping in mappings {
            match self.resolve_mapping(mapping, ctx).await {
                Ok(attr) => {
                    inputs.resolved.insert(mapping.attribute_id.clone(), attr);
                }
                // Store outages are not a property of the attribute
                Err(RuntimeError::Core(err)) => return Err(RuntimeError::Core(err)),
                Err(err) => inputs.failures.push((mapping.attribute_id.clone(), mapping.required, err)),
            }
        }
        Ok(inputs)
    }

    /// Fail if any required mapping is unresolved or below the confidence floor.
    pub fn validate_required_attributes(
        &self,
        mappings: &[AttributeMap],
        resolved: &BTreeMap<String, ResolvedAttribute>,
    ) -> RuntimeResult<()> {
        let problems: Vec<String> = mappings
            .iter()
            .filter(|m| m.required)
            .filter_map(|m| match resolved.get(&m.attribute_id) {
                None => Some(format!("{} (missing)", m.attribute_id)),
                Some(attr) if attr.confidence.value() < self.confidence_floor => {
                    Some(format!("{} (confidence {:.2})", m.attribute_id, attr.confidence.value()))
                }
                Some(_) => None,
            })
            .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(RuntimeError::LowConfidence(problems))
        }
    }

    async fn from_workflow(
        &self,
        attribute_id: &str,
        metadata: Option<&AttributeMetadata>,
        ctx: &ResolutionContext,
    ) -> RuntimeResult<Strategy> {
        let text = match &ctx.workflow_text {
            Some(text) => text.clone(),
            None => match self.store.latest_workflow(&ctx.client_id).await? {
                Some(doc) => doc.source_text,
                None => return Ok(Strategy::Skipped("no workflow document".to_string())),
            },
        };

        if let Some(value) = find_binding(&text, attribute_id) {
            return Ok(Strategy::Found(ResolvedAttribute::new(
                attribute_id,
                AttrValue::Text(value),
                ResolutionSource::WorkflowState,
                CONFIDENCE_BOUND,
            )));
        }

        if !is_declared(&text, attribute_id) {
            return Ok(Strategy::Skipped("no binding or declaration in workflow".to_string()));
        }

        let name = metadata.map(|m| m.name.as_str()).unwrap_or(attribute_id);
        match infer_from_context(attribute_id, name, ctx) {
            Some(value) => Ok(Strategy::Found(ResolvedAttribute::new(
                attribute_id,
                value,
                ResolutionSource::WorkflowInference,
                CONFIDENCE_INFERRED,
            ))),
            None => Ok(Strategy::Skipped("declared in workflow but not inferable from context".to_string())),
        }
    }

    async fn from_store(&self, attribute_id: &str, ctx: &ResolutionContext) -> RuntimeResult<Strategy> {
        let stored = self.store.get_value(&ctx.client_id, &ctx.workflow_version_id, attribute_id).await?;
        Ok(match stored {
            Some(stored) => {
                let confidence = match stored.status {
                    ValueStatus::Resolved => CONFIDENCE_STORED,
                    ValueStatus::Provisional => CONFIDENCE_PROVISIONAL,
                };
                Strategy::Found(ResolvedAttribute::new(
                    attribute_id,
                    stored.value,
                    ResolutionSource::AttributeStore,
                    confidence,
                ))
            }
            None => Strategy::Skipped("no stored value".to_string()),
        })
    }
}

fn settle(
    attribute_id: &str,
    strategy: &'static str,
    outcome: Strategy,
    reasons: &mut Vec<String>,
) -> Option<ResolvedAttribute> {
    match outcome {
        Strategy::Found(attr) => {
            debug!(
                attribute_id = %attribute_id,
                strategy = strategy,
                confidence = attr.confidence.value(),
                "attribute resolved"
            );
            Some(attr)
        }
        Strategy::Skipped(reason) => {
            debug!(attribute_id = %attribute_id, strategy = strategy, reason = %reason, "strategy skipped");
            reasons.push(format!("{}: {}", strategy, reason));
            None
        }
    }
}

fn from_source_system(attribute_id: &str, metadata: Option<&AttributeMetadata>) -> Strategy {
    match metadata.and_then(|m| m.primary_source.as_deref()) {
        Some(source) => {
            let err = CoreError::Unsupported(format!(
                "source-system resolution of '{}' from '{}' is not available",
                attribute_id, source
            ));
            Strategy::Skipped(err.to_string())
        }
        None => Strategy::Skipped("no primary source".to_string()),
    }
}

fn from_default(attribute_id: &str, metadata: Option<&AttributeMetadata>) -> Strategy {
    let Some(metadata) = metadata else {
        return Strategy::Skipped("no attribute metadata".to_string());
    };
    if let Some(default) = &metadata.default_value {
        return Strategy::Found(ResolvedAttribute::new(
            attribute_id,
            default.clone(),
            ResolutionSource::Default,
            CONFIDENCE_DEFAULT,
        ));
    }
    let generated = match metadata.mask.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("timestamp") => Some(Utc::now().to_rfc3339()),
        Some("uuid") => Some(Uuid::new_v4().to_string()),
        _ => None,
    };
    match generated {
        Some(value) => Strategy::Found(ResolvedAttribute::new(
            attribute_id,
            AttrValue::Text(value),
            ResolutionSource::Generated,
            CONFIDENCE_GENERATED,
        )),
        None => Strategy::Skipped("no default value or generating mask".to_string()),
    }
}

/// `(values.bind (bind (attr-id "ID") (value "V")))`
fn find_binding(text: &str, attribute_id: &str) -> Option<String> {
    let pattern = format!(
        r#"\(\s*values\.bind\s+\(\s*bind\s+\(\s*attr-id\s+"{}"\s*\)\s+\(\s*value\s+"([^"]*)"\s*\)\s*\)\s*\)"#,
        regex::escape(attribute_id)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

/// `(var (attr-id "ID"))`
fn is_declared(text: &str, attribute_id: &str) -> bool {
    let pattern = format!(r#"\(\s*var\s+\(\s*attr-id\s+"{}"\s*\)\s*\)"#, regex::escape(attribute_id));
    Regex::new(&pattern).map(|re| re.is_match(text)).unwrap_or(false)
}

fn infer_from_context(attribute_id: &str, name: &str, ctx: &ResolutionContext) -> Option<AttrValue> {
    if let Some(value) = ctx.extra.get(name).or_else(|| ctx.extra.get(attribute_id)) {
        return Some(value.clone());
    }
    let lowered = name.to_lowercase();
    if lowered.contains("environment") && !ctx.environment.is_empty() {
        Some(AttrValue::text(&ctx.environment))
    } else if lowered.contains("client") && !ctx.client_id.is_empty() {
        Some(AttrValue::text(&ctx.client_id))
    } else if lowered.contains("version") && !ctx.workflow_version_id.is_empty() {
        Some(AttrValue::text(&ctx.workflow_version_id))
    } else if lowered.contains("timestamp") {
        Some(AttrValue::Text(Utc::now().to_rfc3339()))
    } else {
        None
    }
}

/// Place each resolved input under its API parameter name. Every required
/// mapping must be resolved; optional ones that did not resolve are left out.
pub fn build_api_request_payload(
    mappings: &[AttributeMap],
    resolved: &BTreeMap<String, ResolvedAttribute>,
) -> RuntimeResult<Payload> {
    let mut payload = Payload::new();
    let mut missing = Vec::new();
    for mapping in mappings {
        match resolved.get(&mapping.attribute_id) {
            Some(attr) => {
                payload.insert(mapping.api_parameter.clone(), attr.effective_value().clone());
            }
            None if mapping.required => missing.push(format!("{} -> {}", mapping.attribute_id, mapping.api_parameter)),
            None => {}
        }
    }
    if missing.is_empty() {
        Ok(payload)
    } else {
        Err(RuntimeError::PayloadBuild(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_tolerates_whitespace() {
        let text = r#"(values.bind
            (bind (attr-id "ccy")   (value "US Dollar")))"#;
        assert_eq!(find_binding(text, "ccy"), Some("US Dollar".to_string()));
        assert_eq!(find_binding(text, "cc"), None);
    }

    #[test]
    fn attribute_ids_are_matched_literally() {
        let text = r#"(values.bind (bind (attr-id "a.b") (value "1")))"#;
        assert_eq!(find_binding(text, "a.b"), Some("1".to_string()));
        assert_eq!(find_binding(text, "a?b"), None);
    }

    #[test]
    fn declaration_is_detected() {
        assert!(is_declared(r#"(var (attr-id "env"))"#, "env"));
        assert!(!is_declared(r#"(var (attr-id "envx"))"#, "env"));
    }

    #[test]
    fn inference_prefers_extra_context() {
        let ctx = ResolutionContext::new("cbu-1", "v2", "prod").with_extra("Client Name", "Acme");
        assert_eq!(infer_from_context("name", "Client Name", &ctx), Some(AttrValue::text("Acme")));
        assert_eq!(infer_from_context("x", "client identifier", &ctx), Some(AttrValue::text("cbu-1")));
        assert_eq!(infer_from_context("x", "Target Environment", &ctx), Some(AttrValue::text("prod")));
        assert_eq!(infer_from_context("x", "dsl version", &ctx), Some(AttrValue::text("v2")));
        assert_eq!(infer_from_context("x", "colour", &ctx), None);
    }

    #[test]
    fn payload_uses_transformed_value() {
        let mut attr =
            ResolvedAttribute::new("ccy", AttrValue::text("US Dollar"), ResolutionSource::WorkflowState, 1.0);
        attr.transformed_value = Some(AttrValue::text("USD"));
        let resolved = BTreeMap::from([("ccy".to_string(), attr)]);
        let mappings = vec![AttributeMap::new("ccy", "currency")];

        let payload = build_api_request_payload(&mappings, &resolved).unwrap();
        assert_eq!(payload.get("currency"), Some(&AttrValue::text("USD")));
    }

    #[test]
    fn payload_build_fails_on_missing_required() {
        let mut optional = AttributeMap::new("nickname", "alias");
        optional.required = false;
        let mappings = vec![AttributeMap::new("ccy", "currency"), optional];

        let err = build_api_request_payload(&mappings, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, RuntimeError::PayloadBuild(ref missing) if missing.len() == 1));
    }
}
