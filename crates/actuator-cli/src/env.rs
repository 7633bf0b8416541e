//! `${VAR}` / `${VAR:default}` expansion for catalog files

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

static VAR_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}").unwrap());

#[derive(Debug, Error, PartialEq)]
pub enum EnvResolverError {
    #[error("Environment variable '{0}' not found and no default provided")]
    VarNotFound(String),
    #[error("Environment variable '{0}' is not allowed. Allowed prefixes: {1:?}")]
    VarNotAllowed(String, Vec<String>),
}

/// Expands variable references, optionally limited to a set of name prefixes.
#[derive(Debug, Clone)]
pub struct EnvResolver {
    /// Empty means no restrictions
    allowed_prefixes: Vec<String>,
}

impl Default for EnvResolver {
    fn default() -> Self {
        Self { allowed_prefixes: vec!["ACTUATOR_".to_string()] }
    }
}

impl EnvResolver {
    pub fn new(allowed_prefixes: Vec<String>) -> Self {
        Self { allowed_prefixes }
    }

    /// Allow every variable
    pub fn unrestricted() -> Self {
        Self { allowed_prefixes: vec![] }
    }

    pub fn expand(&self, input: &str) -> Result<String, EnvResolverError> {
        self.expand_with(input, |name| std::env::var(name).ok())
    }

    /// Single pass; substituted values are not expanded again.
    pub fn expand_with<F>(&self, input: &str, lookup: F) -> Result<String, EnvResolverError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !input.contains("${") {
            return Ok(input.to_string());
        }

        let mut failure = None;
        let expanded = VAR_REF.replace_all(input, |caps: &Captures| {
            let name = caps[1].trim();
            match self.value_for(name, caps.get(2).map(|m| m.as_str()), &lookup) {
                Ok(value) => value,
                Err(err) => {
                    failure.get_or_insert(err);
                    String::new()
                }
            }
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(expanded.into_owned()),
        }
    }

    fn value_for<F>(&self, name: &str, default: Option<&str>, lookup: &F) -> Result<String, EnvResolverError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !self.allowed_prefixes.is_empty() && !self.allowed_prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            return Err(EnvResolverError::VarNotAllowed(name.to_string(), self.allowed_prefixes.clone()));
        }
        match (lookup(name), default) {
            (Some(value), _) => Ok(value),
            (None, Some(default)) => Ok(default.to_string()),
            (None, None) => Err(EnvResolverError::VarNotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(name: &str) -> Option<String> {
        match name {
            "ACTUATOR_CUSTODY_URL" => Some("https://custody.test".to_string()),
            "HOME" => Some("/root".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_expands_known_and_default_values() {
        let resolver = EnvResolver::default();
        let out = resolver
            .expand_with("url: ${ACTUATOR_CUSTODY_URL}/accounts\nenv: ${ACTUATOR_ENV:test}", vars)
            .unwrap();
        assert_eq!(out, "url: https://custody.test/accounts\nenv: test");
    }

    #[test]
    fn test_missing_variable_without_default_fails() {
        let err = EnvResolver::default().expand_with("${ACTUATOR_MISSING}", vars).unwrap_err();
        assert_eq!(err, EnvResolverError::VarNotFound("ACTUATOR_MISSING".to_string()));
    }

    #[test]
    fn test_prefix_restriction() {
        let err = EnvResolver::default().expand_with("${HOME}", vars).unwrap_err();
        assert!(matches!(err, EnvResolverError::VarNotAllowed(ref name, _) if name == "HOME"));
        assert_eq!(EnvResolver::unrestricted().expand_with("${HOME}", vars).unwrap(), "/root");
    }

    #[test]
    fn test_text_without_references_is_untouched() {
        assert_eq!(EnvResolver::default().expand_with("plain $HOME", vars).unwrap(), "plain $HOME");
    }
}
