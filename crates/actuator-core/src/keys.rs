//! Deterministic key generation for idempotency and correlation.

use sha2::{Digest, Sha256};

pub const DEFAULT_KEY_TEMPLATE: &str =
    "{{resource_type}}:{{environment}}:{{client_id}}:{{action_id}}:{{workflow_version_id}}";
pub const DEFAULT_CORRELATION_TEMPLATE: &str = "{{client_id}}:{{action_id}}:{{resource_type}}";

/// Values substituted into key templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyContext {
    pub resource_type: String,
    pub environment: String,
    pub client_id: String,
    pub action_id: String,
    pub workflow_version_id: String,
}

impl KeyContext {
    fn placeholders(&self) -> [(&'static str, &str); 5] {
        [
            ("{{resource_type}}", &self.resource_type),
            ("{{environment}}", &self.environment),
            ("{{client_id}}", &self.client_id),
            ("{{action_id}}", &self.action_id),
            ("{{workflow_version_id}}", &self.workflow_version_id),
        ]
    }
}

/// Substitute every known placeholder; unknown `{{...}}` tokens are left as-is.
pub fn render_template(template: &str, ctx: &KeyContext) -> String {
    ctx.placeholders()
        .iter()
        .fold(template.to_string(), |acc, (placeholder, value)| acc.replace(placeholder, value))
}

/// Hex SHA-256 of the rendered key template.
pub fn idempotency_key(template: Option<&str>, ctx: &KeyContext) -> String {
    let rendered = render_template(template.unwrap_or(DEFAULT_KEY_TEMPLATE), ctx);
    hex::encode(Sha256::digest(rendered.as_bytes()))
}

pub fn correlation_id(template: Option<&str>, ctx: &KeyContext) -> String {
    render_template(template.unwrap_or(DEFAULT_CORRELATION_TEMPLATE), ctx)
}
