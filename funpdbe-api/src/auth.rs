//! Authentication Module
//!
//! Callers identify themselves in one of two ways:
//! 1. API key (via `X-API-Key` header), mapped to a principal by configuration
//! 2. JWT token (via `Authorization: Bearer` header), principal in `sub`
//!
//! Authentication only establishes *who* is calling. Whether that principal
//! may write a resource is decided by the authorization gate.

use crate::config::is_production_environment;
use crate::error::{ApiError, ApiResult};
use funpdbe_core::{check_principal, ConfigError, PrincipalId};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const INSECURE_DEFAULT_SECRET: &str = "INSECURE_DEFAULT_SECRET_CHANGE_IN_PRODUCTION";

// ============================================================================
// CLOCK ABSTRACTION
// ============================================================================

/// Clock used for JWT time validation.
///
/// Token times are checked against this clock rather than inside
/// `jsonwebtoken`, so tests can pin time.
pub trait JwtClock: Send + Sync {
    /// Current time as Unix epoch seconds. May be negative on a broken host.
    fn now_epoch_secs(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Always returns the same timestamp.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

#[cfg(test)]
impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}


// ============================================================================
// JWT SECRET
// ============================================================================

/// JWT signing secret. `Debug` never prints the value.
#[derive(Clone)]
pub struct JwtSecret(SecretString);

impl JwtSecret {
    /// # Errors
    /// Returns error if the secret is empty.
    pub fn new(secret: String) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "jwt_secret".to_string(),
            });
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// Expose the secret value for signing and verification only.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    pub fn is_insecure_default(&self) -> bool {
        self.0.expose_secret() == INSECURE_DEFAULT_SECRET
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JwtSecret([REDACTED, {} chars])", self.len())
    }
}

fn build_jwt_secret(secret_str: String) -> JwtSecret {
    let normalized = if secret_str.trim().is_empty() {
        INSECURE_DEFAULT_SECRET.to_string()
    } else {
        secret_str
    };

    match JwtSecret::new(normalized) {
        Ok(secret) => secret,
        Err(_) => JwtSecret(SecretString::new(INSECURE_DEFAULT_SECRET.to_string().into())),
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// API key -> principal id
    pub api_keys: HashMap<String, PrincipalId>,

    pub jwt_secret: JwtSecret,

    /// JWT algorithm (default: HS256)
    pub jwt_algorithm: Algorithm,

    /// Lifetime of tokens issued by this server, in seconds
    pub jwt_expiration_secs: i64,

    /// Tolerated clock drift when checking `exp`, in seconds
    pub jwt_clock_skew_secs: i64,

    pub clock: Arc<dyn JwtClock>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_keys", &format!("[{} keys]", self.api_keys.len()))
            .field("jwt_secret", &self.jwt_secret)
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field("jwt_expiration_secs", &self.jwt_expiration_secs)
            .field("jwt_clock_skew_secs", &self.jwt_clock_skew_secs)
            .field("clock", &"<JwtClock>")
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        let secret_str = std::env::var("FUNPDBE_JWT_SECRET")
            .unwrap_or_else(|_| INSECURE_DEFAULT_SECRET.to_string());

        Self {
            api_keys: HashMap::new(),
            jwt_secret: build_jwt_secret(secret_str),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: 3600,
            jwt_clock_skew_secs: 60,
            clock: Arc::new(SystemClock),
        }
    }
}

impl AuthConfig {
    /// Create authentication configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `FUNPDBE_API_KEYS`: Comma-separated `key:principal` pairs
    /// - `FUNPDBE_JWT_SECRET`: JWT signing secret
    /// - `FUNPDBE_JWT_EXPIRATION_SECS`: Token lifetime (default: 3600)
    /// - `FUNPDBE_JWT_CLOCK_SKEW_SECS`: Clock skew tolerance (default: 60)
    pub fn from_env() -> Self {
        let api_keys = std::env::var("FUNPDBE_API_KEYS")
            .map(|raw| parse_api_keys(&raw))
            .unwrap_or_default();

        let secret_str = std::env::var("FUNPDBE_JWT_SECRET")
            .unwrap_or_else(|_| INSECURE_DEFAULT_SECRET.to_string());

        Self {
            api_keys,
            jwt_secret: build_jwt_secret(secret_str),
            jwt_algorithm: Algorithm::HS256,
            jwt_expiration_secs: std::env::var("FUNPDBE_JWT_EXPIRATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            jwt_clock_skew_secs: std::env::var("FUNPDBE_JWT_CLOCK_SKEW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            clock: Arc::new(SystemClock),
        }
    }

    /// Refuse insecure secrets in production; warn about them elsewhere.
    pub fn validate_for_production(&self) -> ApiResult<()> {
        let is_production = is_production_environment();

        if self.jwt_secret.is_insecure_default() {
            if is_production {
                return Err(ApiError::invalid_input(
                    "Cannot start server in production with insecure JWT secret. \
                     Set FUNPDBE_JWT_SECRET to a secure value.",
                ));
            }
            tracing::warn!(
                "Using insecure default JWT secret. Set FUNPDBE_JWT_SECRET \
                 to a random value of at least 32 characters before deploying."
            );
        }

        if self.jwt_secret.len() < 32 {
            if is_production {
                return Err(ApiError::invalid_input(format!(
                    "JWT secret is too short for production use ({} chars). \
                     It must be at least 32 characters long.",
                    self.jwt_secret.len()
                )));
            } else if !self.jwt_secret.is_insecure_default() {
                tracing::warn!(
                    secret_len = self.jwt_secret.len(),
                    "JWT secret is shorter than 32 characters"
                );
            }
        }

        Ok(())
    }

    pub fn add_api_key(&mut self, key: impl Into<String>, principal: impl Into<PrincipalId>) {
        self.api_keys.insert(key.into(), principal.into());
    }

    /// Principal bound to `key`, if the key is known.
    pub fn principal_for_key(&self, key: &str) -> Option<&PrincipalId> {
        self.api_keys.get(key)
    }
}

/// Parse `key:principal,key2:principal2`. Malformed pairs are skipped with a
/// warning.
pub fn parse_api_keys(raw: &str) -> HashMap<String, PrincipalId> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| match pair.split_once(':') {
            Some((key, principal)) if !key.trim().is_empty() && !principal.trim().is_empty() => {
                Some((key.trim().to_string(), principal.trim().to_string()))
            }
            _ => {
                tracing::warn!("Ignoring malformed FUNPDBE_API_KEYS entry (expected key:principal)");
                None
            }
        })
        .collect()
}

// ============================================================================
// JWT CLAIMS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the principal id
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

#[cfg(test)]
impl Claims {
    pub fn new(principal: String, expiration_secs: i64, clock: &dyn JwtClock) -> Self {
        let now = clock.now_epoch_secs();
        Self {
            sub: principal,
            iat: now,
            exp: now + expiration_secs,
        }
    }

    pub fn is_expired(&self, clock: &dyn JwtClock) -> bool {
        self.exp < clock.now_epoch_secs()
    }
}

// ============================================================================
// AUTHENTICATION CONTEXT
// ============================================================================

/// Authenticated caller, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub principal: PrincipalId,
    pub auth_method: AuthMethod,
}

impl AuthContext {
    pub fn new(principal: impl Into<PrincipalId>, auth_method: AuthMethod) -> Self {
        Self {
            principal: principal.into(),
            auth_method,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ApiKey,
    Jwt,
}

// ============================================================================
// AUTHENTICATION FUNCTIONS
// ============================================================================

fn validate_claim_times(now: i64, exp: i64, leeway_secs: i64) -> ApiResult<()> {
    if exp < now - leeway_secs {
        return Err(ApiError::token_expired());
    }
    Ok(())
}

/// Verify a token's signature, then its expiry against the configured clock.
pub fn validate_jwt_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.expose().as_bytes());

    let mut validation = Validation::new(config.jwt_algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.required_spec_claims = std::collections::HashSet::from(["exp".to_string()]);

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidToken => {
                ApiError::invalid_token("Token is invalid")
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            _ => ApiError::invalid_token(format!("Token validation failed: {}", e)),
        })?;

    let claims = token_data.claims;
    let now = config.clock.now_epoch_secs();

    if now < 0 {
        tracing::error!(
            timestamp = now,
            "System clock returned pre-epoch time - server time is broken"
        );
        return Err(ApiError::internal_error("Server time configuration error"));
    }

    validate_claim_times(now, claims.exp, config.jwt_clock_skew_secs)?;

    if claims.sub.trim().is_empty() {
        return Err(ApiError::invalid_token("Token has an empty subject"));
    }
    if check_principal(&claims.sub).is_err() {
        return Err(ApiError::invalid_token("Token subject is not a valid principal"));
    }

    Ok(claims)
}

/// Sign a token for `principal` with the configured key.
#[cfg(test)]
pub fn generate_jwt_token(config: &AuthConfig, principal: impl Into<String>) -> ApiResult<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims::new(principal.into(), config.jwt_expiration_secs, &*config.clock);

    let encoding_key = EncodingKey::from_secret(config.jwt_secret.expose().as_bytes());
    let header = Header::new(config.jwt_algorithm);

    encode(&header, &claims, &encoding_key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate token: {}", e)))
}

pub fn authenticate_api_key(config: &AuthConfig, api_key: &str) -> ApiResult<AuthContext> {
    config
        .principal_for_key(api_key)
        .map(|principal| AuthContext::new(principal.clone(), AuthMethod::ApiKey))
        .ok_or_else(|| ApiError::unauthorized("Invalid API key"))
}

pub fn authenticate_jwt(config: &AuthConfig, token: &str) -> ApiResult<AuthContext> {
    let claims = validate_jwt_token(config, token)?;
    Ok(AuthContext::new(claims.sub, AuthMethod::Jwt))
}

/// Authenticate from the raw header values.
///
/// Returns `Ok(None)` when no credentials are presented: the caller is
/// anonymous. Presented but invalid credentials are an error.
pub fn authenticate(
    config: &AuthConfig,
    api_key_header: Option<&str>,
    auth_header: Option<&str>,
) -> ApiResult<Option<AuthContext>> {
    if let Some(api_key) = api_key_header {
        return authenticate_api_key(config, api_key).map(Some);
    }

    if let Some(auth_value) = auth_header {
        return match auth_value.strip_prefix("Bearer ") {
            Some(token) => authenticate_jwt(config, token.trim()).map(Some),
            None => Err(ApiError::invalid_token(
                "Authorization header must use Bearer scheme",
            )),
        };
    }

    Ok(None)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::config::test_env::{EnvVarGuard, ENV_MUTEX};

    fn test_config() -> AuthConfig {
        let mut config = AuthConfig {
            jwt_secret: JwtSecret::new("test_secret".to_string())
                .expect("Test secret should be valid"),
            clock: Arc::new(test_clocks::valid()),
            ..AuthConfig::default()
        };
        config.add_api_key("test_key_123", "alice");
        config
    }

    #[test]
    fn test_parse_api_keys() {
        let keys = parse_api_keys(" k1:alice , broken, :nobody, k2:bob,");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.get("k1").map(String::as_str), Some("alice"));
        assert_eq!(keys.get("k2").map(String::as_str), Some("bob"));
    }

    #[test]
    fn test_api_key_maps_to_principal() -> ApiResult<()> {
        let config = test_config();
        let ctx = authenticate_api_key(&config, "test_key_123")?;
        assert_eq!(ctx, AuthContext::new("alice", AuthMethod::ApiKey));

        let err = authenticate_api_key(&config, "nope").unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
        Ok(())
    }

    #[test]
    fn test_jwt_generation_and_validation() -> ApiResult<()> {
        let config = test_config();
        let token = generate_jwt_token(&config, "bob")?;
        let claims = validate_jwt_token(&config, &token)?;

        assert_eq!(claims.sub, "bob");
        assert!(!claims.is_expired(&test_clocks::valid()));
        Ok(())
    }

    #[test]
    fn test_expired_token() -> ApiResult<()> {
        let mut config = test_config();
        let token = generate_jwt_token(&config, "bob")?;

        config.clock = Arc::new(test_clocks::future());
        let err = validate_jwt_token(&config, &token).unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenExpired);
        Ok(())
    }

    #[test]
    fn test_clock_skew_tolerated() -> ApiResult<()> {
        let mut config = test_config();
        config.jwt_expiration_secs = 10;
        let token = generate_jwt_token(&config, "bob")?;

        config.clock = Arc::new(FixedClock(test_clocks::valid().0 + 10 + 30));
        assert!(validate_jwt_token(&config, &token).is_ok());
        Ok(())
    }

    #[test]
    fn test_wrong_secret_rejected() -> ApiResult<()> {
        let config = test_config();
        let token = generate_jwt_token(&config, "bob")?;

        let other = AuthConfig {
            jwt_secret: JwtSecret::new("another_secret".to_string())
                .expect("Test secret should be valid"),
            ..test_config()
        };
        let err = validate_jwt_token(&other, &token).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);
        Ok(())
    }

    #[test]
    fn test_oversized_subject_rejected() -> ApiResult<()> {
        let config = test_config();
        let token = generate_jwt_token(&config, "x".repeat(256))?;
        let err = validate_jwt_token(&config, &token).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);

        let token = generate_jwt_token(&config, "x".repeat(255))?;
        assert!(validate_jwt_token(&config, &token).is_ok());
        Ok(())
    }

    #[test]
    fn test_authenticate_paths() -> ApiResult<()> {
        let config = test_config();

        assert_eq!(authenticate(&config, None, None)?, None);

        let ctx = authenticate(&config, Some("test_key_123"), None)?;
        assert_eq!(ctx.map(|c| c.principal), Some("alice".to_string()));

        let token = generate_jwt_token(&config, "bob")?;
        let header = format!("Bearer {}", token);
        let ctx = authenticate(&config, None, Some(&header))?;
        assert_eq!(ctx.map(|c| c.auth_method), Some(AuthMethod::Jwt));

        let err = authenticate(&config, None, Some("Basic abc")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);

        let err = authenticate(&config, None, Some("Bearer garbage")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidToken);
        Ok(())
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = JwtSecret::new("super-secret-value".to_string()).expect("valid");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_production_validation_allows_secure_secret() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _env_guard = EnvVarGuard::set("FUNPDBE_ENVIRONMENT", Some("production"));
        let config = AuthConfig {
            jwt_secret: JwtSecret::new(
                "this-is-a-very-secure-secret-that-is-at-least-32-characters-long".to_string(),
            )
            .expect("test secret should be valid"),
            ..Default::default()
        };
        assert!(config.validate_for_production().is_ok());
    }

    #[test]
    fn test_production_validation_rejects_insecure_default() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _env_guard = EnvVarGuard::set("FUNPDBE_ENVIRONMENT", Some("production"));
        let _secret_guard = EnvVarGuard::set("FUNPDBE_JWT_SECRET", None);
        let config = AuthConfig::default();
        assert!(config.validate_for_production().is_err());
    }

    #[test]
    fn test_production_validation_rejects_short_secret() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _env_guard = EnvVarGuard::set("FUNPDBE_ENVIRONMENT", Some("production"));
        let config = AuthConfig {
            jwt_secret: JwtSecret::new("short".to_string()).expect("test secret should be valid"),
            ..Default::default()
        };
        assert!(config.validate_for_production().is_err());
    }

    #[test]
    fn test_production_validation_allows_development() {
        let _env_lock = ENV_MUTEX.lock().expect("env mutex should not be poisoned");
        let _env_guard = EnvVarGuard::set("FUNPDBE_ENVIRONMENT", Some("development"));
        let _secret_guard = EnvVarGuard::set("FUNPDBE_JWT_SECRET", None);
        let config = AuthConfig::default();
        assert!(config.validate_for_production().is_ok());
    }
}
