use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub gate: GateConfig,
    pub database: DatabaseConfig,
    pub extraction: ExtractionConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Request gate classification. The allow-list is configuration, not logic:
/// exact page paths plus API path prefixes, compared case-sensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    pub public_pages: Vec<String>,
    pub public_api_prefixes: Vec<String>,
    pub api_prefix: String,
    pub login_path: String,
    pub setup_error_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub max_pdf_bytes: usize,
    pub min_text_chars: usize,
    pub subprocess_timeout_secs: u64,
    pub pdftotext_bin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub session_cookie: String,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Gate overrides
        if let Ok(v) = env::var("GATE_PUBLIC_PAGES") {
            self.gate.public_pages = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("GATE_PUBLIC_API_PREFIXES") {
            self.gate.public_api_prefixes = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("GATE_LOGIN_PATH") {
            self.gate.login_path = v;
        }
        if let Ok(v) = env::var("GATE_SETUP_ERROR_PATH") {
            self.gate.setup_error_path = v;
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout =
                v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Extraction overrides
        if let Ok(v) = env::var("EXTRACTION_MAX_PDF_BYTES") {
            self.extraction.max_pdf_bytes = v.parse().unwrap_or(self.extraction.max_pdf_bytes);
        }
        if let Ok(v) = env::var("EXTRACTION_SUBPROCESS_TIMEOUT_SECS") {
            self.extraction.subprocess_timeout_secs = v
                .parse()
                .unwrap_or(self.extraction.subprocess_timeout_secs);
        }
        if let Ok(v) = env::var("EXTRACTION_PDFTOTEXT_BIN") {
            self.extraction.pdftotext_bin = v;
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_SESSION_COOKIE") {
            self.security.session_cookie = v;
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        self
    }

    fn base_gate() -> GateConfig {
        GateConfig {
            public_pages: vec![
                "/".to_string(),
                "/health".to_string(),
                "/login".to_string(),
                "/signup".to_string(),
                "/setup-error".to_string(),
            ],
            public_api_prefixes: vec!["/api/auth/".to_string()],
            api_prefix: "/api/".to_string(),
            login_path: "/login".to_string(),
            setup_error_path: "/setup-error".to_string(),
        }
    }

    fn base_extraction() -> ExtractionConfig {
        ExtractionConfig {
            max_pdf_bytes: 25 * 1024 * 1024,
            min_text_chars: 10,
            subprocess_timeout_secs: 30,
            pdftotext_bin: "pdftotext".to_string(),
        }
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            gate: Self::base_gate(),
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
            },
            extraction: Self::base_extraction(),
            security: SecurityConfig {
                jwt_secret: "copronomie-dev-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                session_cookie: "copronomie_session".to_string(),
                enable_cors: true,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            gate: Self::base_gate(),
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
            },
            extraction: Self::base_extraction(),
            security: SecurityConfig {
                jwt_secret: String::new(), // must come from JWT_SECRET
                jwt_expiry_hours: 24,
                session_cookie: "copronomie_session".to_string(),
                enable_cors: true,
                cors_origins: vec!["https://staging.copronomie.fr".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            gate: Self::base_gate(),
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
            },
            extraction: Self::base_extraction(),
            security: SecurityConfig {
                jwt_secret: String::new(), // must come from JWT_SECRET
                jwt_expiry_hours: 4,
                session_cookie: "copronomie_session".to_string(),
                enable_cors: true,
                cors_origins: vec!["https://app.copronomie.fr".to_string()],
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.extraction.max_pdf_bytes, 25 * 1024 * 1024);
        assert_eq!(config.extraction.subprocess_timeout_secs, 30);
        assert_eq!(config.gate.login_path, "/login");
        assert!(config.gate.public_pages.contains(&"/health".to_string()));
    }

    #[test]
    fn production_requires_external_secret() {
        let config = AppConfig::production();
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.security.jwt_expiry_hours, 4);
    }

    #[test]
    fn public_api_prefixes_cover_auth_namespace() {
        let config = AppConfig::development();
        assert!(config
            .gate
            .public_api_prefixes
            .iter()
            .any(|p| "/api/auth/signup".starts_with(p.as_str())));
    }
}
