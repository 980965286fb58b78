use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tenantnotes_api::crypto::DEFAULT_PBKDF2_ITERATIONS;
use tenantnotes_api::service::NoteLimitScope;

/// Server configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub web_dir: PathBuf,
    pub seed_on_start: bool,
    pub seed_password: String,
    /// Return reset tokens in API responses instead of only logging them.
    pub expose_reset_tokens: bool,
    pub note_limit_scope: NoteLimitScope,
    pub password_iterations: u32,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_default();

        let port = match get("PORT") {
            Some(v) => v.trim().parse().with_context(|| format!("invalid PORT '{v}'"))?,
            None => 5000,
        };

        let note_limit_scope = match get("NOTE_LIMIT_SCOPE") {
            Some(v) => v.parse::<NoteLimitScope>()?,
            None => NoteLimitScope::default(),
        };

        let password_iterations = match get("PASSWORD_HASH_ITERATIONS") {
            Some(v) => v
                .trim()
                .parse()
                .with_context(|| format!("invalid PASSWORD_HASH_ITERATIONS '{v}'"))?,
            None => DEFAULT_PBKDF2_ITERATIONS,
        };
        if password_iterations == 0 {
            bail!("PASSWORD_HASH_ITERATIONS must be positive");
        }

        Ok(Self {
            jwt_secret,
            port,
            data_dir: get("TENANTNOTES_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            web_dir: get("TENANTNOTES_WEB_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("dist/public")),
            seed_on_start: get("SEED_DB").is_some_and(|v| parse_flag(&v)),
            seed_password: get("SEED_PASSWORD").unwrap_or_else(|| "password".into()),
            expose_reset_tokens: get("EXPOSE_RESET_TOKENS").is_some_and(|v| parse_flag(&v)),
            note_limit_scope,
            password_iterations,
        })
    }

    /// Serving requires a signing key; seeding does not.
    pub fn require_jwt_secret(&self) -> Result<()> {
        if self.jwt_secret.is_empty() {
            bail!("JWT_SECRET environment variable is required");
        }
        Ok(())
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn jwt_secret_is_required_to_serve() {
        let config = load(&[]).unwrap();
        let err = config.require_jwt_secret().unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
        assert!(load(&[("JWT_SECRET", "  ")]).unwrap().require_jwt_secret().is_err());
        assert!(load(&[("JWT_SECRET", "s3cret")]).unwrap().require_jwt_secret().is_ok());
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.web_dir, PathBuf::from("dist/public"));
        assert!(!config.seed_on_start);
        assert_eq!(config.seed_password, "password");
        assert!(!config.expose_reset_tokens);
        assert_eq!(config.note_limit_scope, NoteLimitScope::User);
        assert_eq!(config.password_iterations, DEFAULT_PBKDF2_ITERATIONS);
    }

    #[test]
    fn overrides_apply() {
        let config = load(&[
            ("JWT_SECRET", "s3cret"),
            ("PORT", "8080"),
            ("SEED_DB", "true"),
            ("EXPOSE_RESET_TOKENS", "1"),
            ("NOTE_LIMIT_SCOPE", "tenant"),
            ("PASSWORD_HASH_ITERATIONS", "1000"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.seed_on_start);
        assert!(config.expose_reset_tokens);
        assert_eq!(config.note_limit_scope, NoteLimitScope::Tenant);
        assert_eq!(config.password_iterations, 1000);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(load(&[("JWT_SECRET", "s"), ("PORT", "http")]).is_err());
        assert!(load(&[("JWT_SECRET", "s"), ("NOTE_LIMIT_SCOPE", "org")]).is_err());
        assert!(load(&[("JWT_SECRET", "s"), ("PASSWORD_HASH_ITERATIONS", "0")]).is_err());
    }
}
