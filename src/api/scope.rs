use std::fmt;

use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tracing::warn;

use crate::{MailflowError, Result};

#[derive(Deserialize)]
struct ScopeClaims {
    #[serde(default)]
    company_id: Option<String>,
}

/// Tenant a request is made for; the first path segment after `/api`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CompanyScope {
    company_id: String,
}

impl CompanyScope {
    pub fn new(company_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
        }
    }

    /// Reads the `company_id` claim of a JWT access token.
    ///
    /// The signature is not checked; the backend verifies the token on every
    /// request. A token that cannot be decoded yields an empty scope.
    pub fn from_token(token: &str) -> Self {
        match Self::try_from_token(token) {
            Ok(scope) => scope,
            Err(e) => {
                warn!("failed to decode access token: {}", e);
                Self::default()
            }
        }
    }

    /// Like [`CompanyScope::from_token`] but reports why decoding failed.
    pub fn try_from_token(token: &str) -> Result<Self> {
        let token = token.trim();
        let header = decode_header(token)?;

        let mut validation = Validation::new(header.alg);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let claims = decode::<ScopeClaims>(token, &DecodingKey::from_secret(&[]), &validation)?.claims;
        let company_id = claims.company_id.ok_or_else(|| MailflowError::Auth("token has no company_id claim".to_string()))?;
        Ok(Self::new(company_id))
    }

    pub fn company_id(&self) -> &str {
        &self.company_id
    }

    pub fn is_empty(&self) -> bool {
        self.company_id.is_empty()
    }
}

impl fmt::Display for CompanyScope {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.company_id)
    }
}

#[cfg(test)]
pub(crate) fn test_token(claims: &serde_json::Value) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};

    encode(&Header::default(), claims, &EncodingKey::from_secret(b"not-the-backend-secret")).unwrap()
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_company_id_from_token() {
        let token = test_token(&json!({
            "company_id": "b27ee77c-9043-4000-b7e0-f1a920da2c2f",
            "user_id": "8382ec6d-259e-4413-8622-aba1eec737e9",
            "exp": 1719966018
        }));
        let scope = CompanyScope::from_token(&token);
        assert_eq!(scope.company_id(), "b27ee77c-9043-4000-b7e0-f1a920da2c2f");
        assert!(!scope.is_empty());
    }

    #[test]
    fn test_signature_and_expiry_are_not_checked() {
        let token = test_token(&json!({"company_id": "c1", "exp": 1}));
        assert_eq!(CompanyScope::from_token(&token).company_id(), "c1");

        let mut parts: Vec<&str> = token.split('.').collect();
        parts[2] = "c2lnbmF0dXJl";
        assert_eq!(CompanyScope::from_token(&parts.join(".")).company_id(), "c1");
    }

    #[test]
    fn test_bad_tokens_yield_empty_scope() {
        assert!(CompanyScope::from_token("").is_empty());
        assert!(CompanyScope::from_token("not-a-jwt").is_empty());
        assert!(CompanyScope::from_token("a.!!!.c").is_empty());
        assert!(CompanyScope::from_token(&test_token(&json!({"user_id": "u1"}))).is_empty());
    }

    #[test]
    fn test_try_from_token_reports_reason() {
        let err = CompanyScope::try_from_token(&test_token(&json!({"user_id": "u1"}))).unwrap_err();
        assert!(matches!(err, MailflowError::Auth(_)));
        assert!(err.to_string().contains("company_id"));
        assert!(matches!(CompanyScope::try_from_token("a.b"), Err(MailflowError::Auth(_))));
    }
}
