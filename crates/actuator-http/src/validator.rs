use actuator_core::SuccessCriteria;
use serde::Serialize;
use std::fmt;

use crate::client::HttpResponse;

/// One unmet success condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationFailure {
    TransportError { message: String },
    UnexpectedStatus { status: u16, expected: Vec<u16> },
    ExpressionMismatch { expression: String, actual: Option<String> },
    InvalidExpression { expression: String },
    MissingOutput { path: String },
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::TransportError { message } => write!(f, "transport error: {}", message),
            ValidationFailure::UnexpectedStatus { status, expected } if expected.is_empty() => {
                write!(f, "unexpected status {} (expected 2xx)", status)
            }
            ValidationFailure::UnexpectedStatus { status, expected } => {
                write!(f, "unexpected status {} (expected one of {:?})", status, expected)
            }
            ValidationFailure::ExpressionMismatch { expression, actual } => match actual {
                Some(actual) => write!(f, "'{}' not satisfied (actual '{}')", expression, actual),
                None => write!(f, "'{}' not satisfied (field missing)", expression),
            },
            ValidationFailure::InvalidExpression { expression } => {
                write!(f, "unsupported validation expression '{}'", expression)
            }
            ValidationFailure::MissingOutput { path } => write!(f, "required output '{}' missing", path),
        }
    }
}

/// Check a response against success criteria. An empty result means success.
pub fn validate_response(response: &HttpResponse, criteria: &SuccessCriteria) -> Vec<ValidationFailure> {
    if let Some(error) = &response.error {
        return vec![ValidationFailure::TransportError { message: error.to_string() }];
    }

    let mut failures = Vec::new();

    let status_ok = if criteria.http_status_codes.is_empty() {
        (200..300).contains(&response.status)
    } else {
        criteria.http_status_codes.contains(&response.status)
    };
    if !status_ok {
        failures.push(ValidationFailure::UnexpectedStatus {
            status: response.status,
            expected: criteria.http_status_codes.clone(),
        });
    }

    if let Some(expression) = criteria.response_validation.as_deref().filter(|e| !e.trim().is_empty()) {
        if let Some(failure) = check_expression(response, expression) {
            failures.push(failure);
        }
    }

    for path in &criteria.required_outputs {
        if response.body.get_path(path).is_none() {
            failures.push(ValidationFailure::MissingOutput { path: path.clone() });
        }
    }

    failures
}

/// `path == literal`; the path may carry a `response.` or `$.` prefix.
fn check_expression(response: &HttpResponse, expression: &str) -> Option<ValidationFailure> {
    let Some((lhs, rhs)) = expression.split_once("==") else {
        return Some(ValidationFailure::InvalidExpression { expression: expression.to_string() });
    };
    let path = lhs.trim();
    let path = path.strip_prefix("response.").or_else(|| path.strip_prefix("$.")).unwrap_or(path);
    if path.is_empty() {
        return Some(ValidationFailure::InvalidExpression { expression: expression.to_string() });
    }
    let expected = strip_quotes(rhs.trim());

    match response.body.get_path(path) {
        Some(actual) if actual.render() == expected => None,
        actual => Some(ValidationFailure::ExpressionMismatch {
            expression: expression.to_string(),
            actual: actual.map(|v| v.render()),
        }),
    }
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|rest| rest.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TransportError;
    use std::collections::BTreeMap;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse::from_parts(status, BTreeMap::new(), body.to_string(), 5)
    }

    #[test]
    fn default_criteria_accept_any_2xx() {
        assert!(validate_response(&response(204, ""), &SuccessCriteria::default()).is_empty());
        let failures = validate_response(&response(302, ""), &SuccessCriteria::default());
        assert!(matches!(failures[0], ValidationFailure::UnexpectedStatus { status: 302, .. }));
    }

    #[test]
    fn allow_list_is_exact() {
        let criteria = SuccessCriteria { http_status_codes: vec![201], ..Default::default() };
        assert!(validate_response(&response(201, "{}"), &criteria).is_empty());
        assert_eq!(validate_response(&response(200, "{}"), &criteria).len(), 1);
    }

    #[test]
    fn expression_checks_literal_equality() {
        let criteria = SuccessCriteria {
            response_validation: Some("response.status == 'CREATED'".into()),
            ..Default::default()
        };
        assert!(validate_response(&response(200, r#"{"status":"CREATED"}"#), &criteria).is_empty());

        let failures = validate_response(&response(200, r#"{"status":"PENDING"}"#), &criteria);
        assert_eq!(
            failures,
            vec![ValidationFailure::ExpressionMismatch {
                expression: "response.status == 'CREATED'".into(),
                actual: Some("PENDING".into()),
            }]
        );
    }

    #[test]
    fn malformed_expression_is_named() {
        let criteria = SuccessCriteria { response_validation: Some("status != 1".into()), ..Default::default() };
        let failures = validate_response(&response(200, "{}"), &criteria);
        assert!(matches!(failures[0], ValidationFailure::InvalidExpression { .. }));
    }

    #[test]
    fn each_missing_output_is_reported() {
        let criteria = SuccessCriteria {
            required_outputs: vec!["account.id".into(), "account.iban".into(), "status".into()],
            ..Default::default()
        };
        let failures = validate_response(&response(200, r#"{"account":{"id":"A1"}}"#), &criteria);
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| matches!(f, ValidationFailure::MissingOutput { .. })));
    }

    #[test]
    fn transport_error_short_circuits() {
        let resp = HttpResponse::transport_failure(TransportError::Connect("refused".into()), 3);
        let failures = validate_response(&resp, &SuccessCriteria::default());
        assert_eq!(failures.len(), 1);
        assert!(failures[0].to_string().contains("refused"));
    }
}
