//! Shared-credential check for admin API calls.
//!
//! Callers send `x-admin-auth: base64(email:password)`. There is one
//! configured credential pair and no per-admin identity.

use axum::http::HeaderMap;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::AdminCredentials;

/// The HTTP header carrying admin credentials.
pub const ADMIN_AUTH_HEADER: &str = "x-admin-auth";

/// Why an admin request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdminAuthError {
    #[error("missing admin auth header")]
    MissingHeader,
    #[error("malformed admin auth header")]
    Malformed,
    #[error("admin credentials do not match")]
    Mismatch,
}

/// Check the admin header against the configured credentials.
///
/// A leading `Basic ` scheme is tolerated so standard HTTP clients work.
///
/// # Errors
///
/// Returns an [`AdminAuthError`] describing the failure.
pub fn verify_admin(
    headers: &HeaderMap,
    credentials: &AdminCredentials,
) -> Result<(), AdminAuthError> {
    let raw = headers
        .get(ADMIN_AUTH_HEADER)
        .ok_or(AdminAuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AdminAuthError::Malformed)?
        .trim();
    let encoded = raw.strip_prefix("Basic ").unwrap_or(raw).trim();

    let decoded = STANDARD
        .decode(encoded)
        .map_err(|_| AdminAuthError::Malformed)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AdminAuthError::Malformed)?;
    let (email, password) = decoded.split_once(':').ok_or(AdminAuthError::Malformed)?;

    // Both comparisons always run.
    let email_ok = constant_time_eq(email.as_bytes(), credentials.email.as_bytes());
    let password_ok = constant_time_eq(
        password.as_bytes(),
        credentials.password.expose_secret().as_bytes(),
    );

    if email_ok & password_ok {
        Ok(())
    } else {
        Err(AdminAuthError::Mismatch)
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use secrecy::SecretString;

    use super::*;

    fn credentials() -> AdminCredentials {
        AdminCredentials {
            email: "ops@partsbin.store".to_string(),
            password: SecretString::from("Kq7!vR2#pLm9xZ4w"),
        }
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_AUTH_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn encode(pair: &str) -> String {
        STANDARD.encode(pair)
    }

    #[test]
    fn test_accepts_matching_credentials() {
        let headers = headers_with(&encode("ops@partsbin.store:Kq7!vR2#pLm9xZ4w"));
        assert_eq!(verify_admin(&headers, &credentials()), Ok(()));
    }

    #[test]
    fn test_accepts_basic_prefix() {
        let value = format!("Basic {}", encode("ops@partsbin.store:Kq7!vR2#pLm9xZ4w"));
        let headers = headers_with(&value);
        assert_eq!(verify_admin(&headers, &credentials()), Ok(()));
    }

    #[test]
    fn test_password_may_contain_colons() {
        let creds = AdminCredentials {
            email: "ops@partsbin.store".to_string(),
            password: SecretString::from("a:b:c"),
        };
        let headers = headers_with(&encode("ops@partsbin.store:a:b:c"));
        assert_eq!(verify_admin(&headers, &creds), Ok(()));
    }

    #[test]
    fn test_rejects_missing_header() {
        assert_eq!(
            verify_admin(&HeaderMap::new(), &credentials()),
            Err(AdminAuthError::MissingHeader)
        );
    }

    #[test]
    fn test_rejects_malformed_values() {
        for value in ["%%%not-base64%%%", encode("no-colon-here").as_str()] {
            assert_eq!(
                verify_admin(&headers_with(value), &credentials()),
                Err(AdminAuthError::Malformed),
                "{value}"
            );
        }
    }

    #[test]
    fn test_rejects_non_utf8_payload() {
        let headers = headers_with(&STANDARD.encode([0xff, 0xfe, b':', b'x']));
        assert_eq!(
            verify_admin(&headers, &credentials()),
            Err(AdminAuthError::Malformed)
        );
    }

    #[test]
    fn test_rejects_wrong_password_and_email() {
        for pair in [
            "ops@partsbin.store:wrong",
            "other@partsbin.store:Kq7!vR2#pLm9xZ4w",
            "OPS@partsbin.store:Kq7!vR2#pLm9xZ4w",
        ] {
            assert_eq!(
                verify_admin(&headers_with(&encode(pair)), &credentials()),
                Err(AdminAuthError::Mismatch),
                "{pair}"
            );
        }
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"hellp"));
        assert!(!constant_time_eq(b"hello", b"hell"));
    }
}
