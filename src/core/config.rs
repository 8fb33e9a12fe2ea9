use crate::core::errors::ConfigError;
use std::env;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// Fragment admission policy applied on top of raw OCR output
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Candidates are kept only when confidence is strictly greater than
    /// this. The default of 1.0 treats <=1 as "no signal" from the OCR
    /// capability rather than a real detection.
    pub min_confidence: f32,
    /// Minimum trimmed character count; shorter candidates are noise
    pub min_text_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 1.0,
            min_text_chars: 2,
        }
    }
}

/// OCR capability endpoint configuration
#[derive(Debug, Clone)]
pub struct OcrApiConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

/// Translation capability endpoint configuration
#[derive(Debug, Clone)]
pub struct TranslationApiConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Target language used when the request does not specify one
    pub default_target: String,
    /// Upper bound on in-flight translation calls per request
    pub max_concurrency: usize,
}

/// Overlay composition configuration
#[derive(Debug, Clone)]
pub struct ComposeConfig {
    /// Background rectangle expansion around each bounding box, in pixels
    pub margin: u32,
    /// Overlay text size in pixels
    pub font_size: f32,
    /// Preferred scalable font file; resolution falls back to well-known
    /// system paths and finally a built-in bitmap font
    pub font_path: Option<String>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            margin: 2,
            font_size: 20.0,
            font_path: None,
        }
    }
}

/// History store configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub db_path: String,
}

/// Upload acceptance policy enforced at the HTTP surface
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_bytes: usize,
    pub allowed_extensions: Vec<String>,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub extraction: ExtractionConfig,
    pub ocr: OcrApiConfig,
    pub translation: TranslationApiConfig,
    pub compose: ComposeConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env();
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Self {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        Self {
            server: ServerConfig {
                port: env_parse("SERVER_PORT", 5000),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
            },
            extraction: ExtractionConfig {
                min_confidence: env_parse(
                    "SIGNBOARD_MIN_CONFIDENCE",
                    ExtractionConfig::default().min_confidence,
                ),
                min_text_chars: env_parse(
                    "SIGNBOARD_MIN_TEXT_CHARS",
                    ExtractionConfig::default().min_text_chars,
                ),
            },
            ocr: OcrApiConfig {
                endpoint: env::var("OCR_ENDPOINT")
                    .unwrap_or_else(|_| "http://127.0.0.1:8884/ocr".to_string()),
                timeout_secs: env_parse("OCR_TIMEOUT_SECONDS", 30),
            },
            translation: TranslationApiConfig {
                endpoint: env::var("TRANSLATE_ENDPOINT")
                    .unwrap_or_else(|_| "http://127.0.0.1:8885/translate".to_string()),
                timeout_secs: env_parse("TRANSLATE_TIMEOUT_SECONDS", 20),
                default_target: env::var("DEFAULT_TARGET_LANGUAGE")
                    .unwrap_or_else(|_| "en".to_string()),
                max_concurrency: env_parse("TRANSLATE_MAX_CONCURRENCY", {
                    // Half the cores, floor of 4: enough overlap to hide
                    // network latency without hammering the capability
                    std::cmp::max(num_cpus::get() / 2, 4)
                }),
            },
            compose: ComposeConfig {
                margin: env_parse("COMPOSE_MARGIN_PX", ComposeConfig::default().margin),
                font_size: env_parse("COMPOSE_FONT_SIZE", ComposeConfig::default().font_size),
                font_path: env::var("COMPOSE_FONT_PATH").ok().filter(|s| !s.is_empty()),
            },
            storage: StorageConfig {
                db_path: env::var("DATABASE_PATH")
                    .unwrap_or_else(|_| "signboard_translator.db".to_string()),
            },
            upload: UploadConfig {
                max_bytes: env_parse("MAX_UPLOAD_BYTES", 16 * 1024 * 1024),
                allowed_extensions: env::var("ALLOWED_EXTENSIONS")
                    .map(|s| {
                        s.split(',')
                            .map(|e| e.trim().to_lowercase())
                            .filter(|e| !e.is_empty())
                            .collect()
                    })
                    .unwrap_or_else(|_| {
                        vec![
                            "png".to_string(),
                            "jpg".to_string(),
                            "jpeg".to_string(),
                            "gif".to_string(),
                        ]
                    }),
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.extraction.min_confidence.is_finite() || self.extraction.min_confidence < 0.0 {
            return Err(ConfigError::InvalidConfidenceThreshold(
                self.extraction.min_confidence,
            ));
        }

        if self.extraction.min_text_chars == 0 {
            return Err(ConfigError::InvalidExtractionConfig(
                "min_text_chars must be > 0".to_string(),
            ));
        }

        if self.ocr.endpoint.is_empty() {
            return Err(ConfigError::InvalidEndpoint(
                "OCR_ENDPOINT must not be empty".to_string(),
            ));
        }

        if self.translation.endpoint.is_empty() {
            return Err(ConfigError::InvalidEndpoint(
                "TRANSLATE_ENDPOINT must not be empty".to_string(),
            ));
        }

        if self.translation.max_concurrency == 0 {
            return Err(ConfigError::InvalidTranslationConfig(
                "max_concurrency must be > 0".to_string(),
            ));
        }

        if self.translation.default_target.is_empty() {
            return Err(ConfigError::InvalidTranslationConfig(
                "default target language must not be empty".to_string(),
            ));
        }

        if !(4.0..=128.0).contains(&self.compose.font_size) {
            return Err(ConfigError::InvalidComposeConfig(format!(
                "font_size must be between 4 and 128, got {}",
                self.compose.font_size
            )));
        }

        if self.compose.margin > 64 {
            return Err(ConfigError::InvalidComposeConfig(format!(
                "margin must be at most 64px, got {}",
                self.compose.margin
            )));
        }

        if self.upload.max_bytes == 0 {
            return Err(ConfigError::InvalidUploadConfig(
                "max_bytes must be > 0".to_string(),
            ));
        }

        if self.upload.allowed_extensions.is_empty() {
            return Err(ConfigError::InvalidUploadConfig(
                "at least one allowed extension is required".to_string(),
            ));
        }

        Ok(())
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server: ServerConfig {
                port: 5000,
                host: "0.0.0.0".to_string(),
                log_level: Level::INFO,
            },
            extraction: ExtractionConfig::default(),
            ocr: OcrApiConfig {
                endpoint: "http://localhost/ocr".to_string(),
                timeout_secs: 30,
            },
            translation: TranslationApiConfig {
                endpoint: "http://localhost/translate".to_string(),
                timeout_secs: 20,
                default_target: "en".to_string(),
                max_concurrency: 4,
            },
            compose: ComposeConfig::default(),
            storage: StorageConfig {
                db_path: ":memory:".to_string(),
            },
            upload: UploadConfig {
                max_bytes: 16 * 1024 * 1024,
                allowed_extensions: vec!["png".to_string()],
            },
        }
    }

    #[test]
    fn default_policy_values() {
        let extraction = ExtractionConfig::default();
        assert_eq!(extraction.min_confidence, 1.0);
        assert_eq!(extraction.min_text_chars, 2);

        let compose = ComposeConfig::default();
        assert_eq!(compose.margin, 2);
        assert_eq!(compose.font_size, 20.0);
    }

    #[test]
    fn validate_rejects_negative_confidence() {
        let mut config = base_config();
        config.extraction.min_confidence = -0.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfidenceThreshold(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = base_config();
        config.translation.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_extensions() {
        let mut config = base_config();
        config.upload.allowed_extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }
}
