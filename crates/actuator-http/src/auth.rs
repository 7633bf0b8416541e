//! Authentication material derived from an action's auth config and the
//! decrypted secrets of its credential.

use actuator_core::{ApiKeyLocation, AuthConfig, CredentialType, SecretMap};
use base64::{engine::general_purpose, Engine as _};

use crate::error::{HttpError, HttpResult};

pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";
pub const DEFAULT_API_KEY_PARAM: &str = "api_key";

/// Headers and query parameters to add to the outbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedAuth {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

fn secret<'a>(secrets: &'a SecretMap, field: &str, auth: &AuthConfig) -> HttpResult<&'a str> {
    secrets.get(field).map(String::as_str).filter(|v| !v.is_empty()).ok_or_else(|| {
        HttpError::Authentication(format!(
            "credential '{}' has no '{}' field for {} authentication",
            auth.credential_name, field, auth.auth_type
        ))
    })
}

pub fn apply_authentication(auth: &AuthConfig, secrets: &SecretMap) -> HttpResult<AppliedAuth> {
    let mut applied = AppliedAuth::default();
    match auth.auth_type {
        CredentialType::ApiKey => {
            let key = secret(secrets, "api_key", auth)?.to_string();
            match auth.location {
                ApiKeyLocation::Header => {
                    let name = auth.key_name.clone().unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string());
                    applied.headers.push((name, key));
                }
                ApiKeyLocation::Query => {
                    let name = auth.key_name.clone().unwrap_or_else(|| DEFAULT_API_KEY_PARAM.to_string());
                    applied.query.push((name, key));
                }
            }
        }
        CredentialType::Bearer => {
            let token = secret(secrets, "token", auth)?;
            applied.headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        CredentialType::OAuth2 => {
            let token = secret(secrets, "access_token", auth)?;
            applied.headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        CredentialType::Basic => {
            let username = secret(secrets, "username", auth)?;
            let password = secrets.get("password").map(String::as_str).unwrap_or_default();
            let encoded = general_purpose::STANDARD.encode(format!("{}:{}", username, password));
            applied.headers.push(("Authorization".to_string(), format!("Basic {}", encoded)));
        }
        CredentialType::Custom => {
            if secrets.is_empty() {
                return Err(HttpError::Authentication(format!(
                    "credential '{}' has no custom headers",
                    auth.credential_name
                )));
            }
            applied.headers.extend(secrets.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(auth_type: CredentialType) -> AuthConfig {
        AuthConfig {
            auth_type,
            credential_name: "svc".into(),
            location: ApiKeyLocation::Header,
            key_name: None,
        }
    }

    fn secrets(pairs: &[(&str, &str)]) -> SecretMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn api_key_defaults_to_x_api_key_header() {
        let applied = apply_authentication(&auth(CredentialType::ApiKey), &secrets(&[("api_key", "k1")])).unwrap();
        assert_eq!(applied.headers, vec![("X-API-Key".to_string(), "k1".to_string())]);
        assert!(applied.query.is_empty());
    }

    #[test]
    fn api_key_can_go_in_query() {
        let mut cfg = auth(CredentialType::ApiKey);
        cfg.location = ApiKeyLocation::Query;
        cfg.key_name = Some("key".into());
        let applied = apply_authentication(&cfg, &secrets(&[("api_key", "k1")])).unwrap();
        assert_eq!(applied.query, vec![("key".to_string(), "k1".to_string())]);
    }

    #[test]
    fn basic_auth_is_base64_encoded() {
        let applied = apply_authentication(
            &auth(CredentialType::Basic),
            &secrets(&[("username", "alice"), ("password", "pw")]),
        )
        .unwrap();
        assert_eq!(applied.headers[0].1, "Basic YWxpY2U6cHc=");
    }

    #[test]
    fn oauth2_uses_access_token_as_bearer() {
        let applied =
            apply_authentication(&auth(CredentialType::OAuth2), &secrets(&[("access_token", "at")])).unwrap();
        assert_eq!(applied.headers[0], ("Authorization".to_string(), "Bearer at".to_string()));
    }

    #[test]
    fn missing_fields_are_reported() {
        let err = apply_authentication(&auth(CredentialType::Bearer), &secrets(&[])).unwrap_err();
        assert!(err.to_string().contains("token"));
        assert!(apply_authentication(&auth(CredentialType::Custom), &secrets(&[])).is_err());
    }
}
