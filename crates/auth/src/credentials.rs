//! Secure venue credential management.
//!
//! Uses the `secrecy` crate to prevent accidental logging of the password and
//! authentication code and ensures memory is zeroed on drop.

use crate::error::AuthError;
use secrecy::{ExposeSecret, SecretString};

/// Identity used to authenticate and log in to a venue.
///
/// `auth_code` and `product_info` are only sent when the venue requires
/// client authentication before login.
#[derive(Clone)]
pub struct VenueCredentials {
    user_id: String,
    broker_id: String,
    password: SecretString,
    auth_code: Option<SecretString>,
    product_info: Option<String>,
}

impl VenueCredentials {
    /// Load credentials from environment variables.
    ///
    /// Looks for:
    /// - `VENUE_USER_ID` - Investor/user id (required)
    /// - `VENUE_BROKER_ID` - Broker id (required)
    /// - `VENUE_PASSWORD` - Login password (required)
    /// - `VENUE_AUTH_CODE` - Client authentication code (optional)
    /// - `VENUE_PRODUCT_INFO` - Client product info (optional)
    ///
    /// # Errors
    /// Returns `AuthError::MissingEnvVar` if a required variable is not set.
    pub fn from_env() -> Result<Self, AuthError> {
        // Load .env file if present (ignores errors if file doesn't exist)
        dotenvy::dotenv().ok();

        let user_id = required_var("VENUE_USER_ID")?;
        let broker_id = required_var("VENUE_BROKER_ID")?;
        let password = required_var("VENUE_PASSWORD")?;

        let credentials = Self::new(user_id, broker_id, password)?;
        Ok(credentials.with_authentication(
            std::env::var("VENUE_AUTH_CODE").ok(),
            std::env::var("VENUE_PRODUCT_INFO").ok(),
        ))
    }

    /// Create credentials from explicit values.
    ///
    /// # Errors
    /// Returns `AuthError::EmptyField` if the user id or broker id is empty.
    pub fn new(user_id: String, broker_id: String, password: String) -> Result<Self, AuthError> {
        if user_id.is_empty() {
            return Err(AuthError::EmptyField("user_id"));
        }
        if broker_id.is_empty() {
            return Err(AuthError::EmptyField("broker_id"));
        }

        Ok(Self {
            user_id,
            broker_id,
            password: SecretString::from(password),
            auth_code: None,
            product_info: None,
        })
    }

    /// Attach the optional client-authentication pair.
    pub fn with_authentication(
        mut self,
        auth_code: Option<String>,
        product_info: Option<String>,
    ) -> Self {
        self.auth_code = auth_code.filter(|c| !c.is_empty()).map(SecretString::from);
        self.product_info = product_info.filter(|p| !p.is_empty());
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn broker_id(&self) -> &str {
        &self.broker_id
    }

    pub fn product_info(&self) -> Option<&str> {
        self.product_info.as_deref()
    }

    /// Whether an authentication code was supplied.
    pub fn has_auth_code(&self) -> bool {
        self.auth_code.is_some()
    }

    /// Expose the password for building a login request.
    ///
    /// **WARNING**: Never log or display the return value.
    pub fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Expose the authentication code for building an authenticate request.
    pub fn expose_auth_code(&self) -> Option<&str> {
        self.auth_code.as_ref().map(|c| c.expose_secret())
    }
}

fn required_var(name: &str) -> Result<String, AuthError> {
    std::env::var(name).map_err(|_| AuthError::MissingEnvVar(name.into()))
}

impl std::fmt::Debug for VenueCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueCredentials")
            .field("user_id", &self.user_id)
            .field("broker_id", &self.broker_id)
            .field("password", &"[REDACTED]")
            .field("auth_code", &self.auth_code.as_ref().map(|_| "[REDACTED]"))
            .field("product_info", &self.product_info)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_new() {
        let creds = VenueCredentials::new("10001".into(), "9999".into(), "pw".into()).unwrap();
        assert_eq!(creds.user_id(), "10001");
        assert_eq!(creds.broker_id(), "9999");
        assert_eq!(creds.expose_password(), "pw");
        assert!(!creds.has_auth_code());
    }

    #[test]
    fn test_empty_user_rejected() {
        let err = VenueCredentials::new(String::new(), "9999".into(), "pw".into()).unwrap_err();
        assert!(matches!(err, AuthError::EmptyField("user_id")));
    }

    #[test]
    fn test_with_authentication() {
        let creds = VenueCredentials::new("10001".into(), "9999".into(), "pw".into())
            .unwrap()
            .with_authentication(Some("0000000000000000".into()), Some("gateway".into()));

        assert!(creds.has_auth_code());
        assert_eq!(creds.expose_auth_code(), Some("0000000000000000"));
        assert_eq!(creds.product_info(), Some("gateway"));
    }

    #[test]
    fn test_empty_auth_code_ignored() {
        let creds = VenueCredentials::new("10001".into(), "9999".into(), "pw".into())
            .unwrap()
            .with_authentication(Some(String::new()), None);
        assert!(!creds.has_auth_code());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = VenueCredentials::new("10001".into(), "9999".into(), "super_secret".into())
            .unwrap()
            .with_authentication(Some("auth_secret".into()), None);
        let debug_str = format!("{:?}", creds);

        assert!(debug_str.contains("10001"));
        assert!(!debug_str.contains("super_secret"));
        assert!(!debug_str.contains("auth_secret"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
