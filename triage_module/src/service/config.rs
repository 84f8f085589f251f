use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::context::{DEFAULT_PERSONA_NAME, DEFAULT_VISIBLE_EXCHANGES};
use crate::history_store::DEFAULT_HISTORY_CAP;

/// Whether a generated reply is left as a draft or sent outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Draft,
    Send,
}

/// Backing used for conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryBackend {
    File,
    Firestore,
}

/// Backing used for the property catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogBackend {
    File,
    Firestore,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub gcp_project: String,
    pub gcp_location: String,
    pub model: String,
    pub gmail_label: String,
    pub delivery_mode: DeliveryMode,
    pub history_backend: HistoryBackend,
    pub history_path: PathBuf,
    pub history_collection: String,
    pub catalog_backend: CatalogBackend,
    pub catalog_path: PathBuf,
    pub catalog_collection: String,
    pub history_cap: usize,
    pub visible_exchanges: usize,
    pub poll_interval: Duration,
    pub run_once: bool,
    pub persona_name: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let gcp_project = env::var("GCP_PROJECT")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingVar("GCP_PROJECT"))?;
        let gcp_location =
            env::var("GCP_LOCATION").unwrap_or_else(|_| "us-central1".to_string());
        let model =
            env::var("GEMINI_MODEL").unwrap_or_else(|_| vertex_module::DEFAULT_MODEL.to_string());
        let gmail_label = env::var("GMAIL_LABEL").unwrap_or_else(|_| "INBOX".to_string());

        let delivery_mode = match env::var("TRIAGE_DELIVERY_MODE") {
            Ok(value) => match value.trim().to_lowercase().as_str() {
                "draft" => DeliveryMode::Draft,
                "send" => DeliveryMode::Send,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "TRIAGE_DELIVERY_MODE",
                        value,
                    })
                }
            },
            Err(_) => DeliveryMode::Draft,
        };

        let history_backend = match env::var("TRIAGE_HISTORY_BACKEND") {
            Ok(value) => match value.trim().to_lowercase().as_str() {
                "file" => HistoryBackend::File,
                "firestore" => HistoryBackend::Firestore,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "TRIAGE_HISTORY_BACKEND",
                        value,
                    })
                }
            },
            Err(_) => HistoryBackend::File,
        };
        let history_path = env::var("TRIAGE_HISTORY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("conversation_history.json"));
        let history_collection =
            env::var("TRIAGE_HISTORY_COLLECTION").unwrap_or_else(|_| "conversations".to_string());

        let catalog_backend = match env::var("TRIAGE_CATALOG_BACKEND") {
            Ok(value) => match value.trim().to_lowercase().as_str() {
                "file" => CatalogBackend::File,
                "firestore" => CatalogBackend::Firestore,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "TRIAGE_CATALOG_BACKEND",
                        value,
                    })
                }
            },
            Err(_) => CatalogBackend::File,
        };
        let catalog_path = env::var("TRIAGE_CATALOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("properties.json"));
        let catalog_collection =
            env::var("TRIAGE_CATALOG_COLLECTION").unwrap_or_else(|_| "properties".to_string());

        let history_cap = env::var("TRIAGE_HISTORY_CAP")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_HISTORY_CAP);
        let visible_exchanges = env::var("TRIAGE_VISIBLE_EXCHANGES")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_VISIBLE_EXCHANGES);
        let poll_interval = env::var("TRIAGE_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));
        let run_once = env_flag("TRIAGE_RUN_ONCE", false);
        let persona_name =
            env::var("TRIAGE_PERSONA").unwrap_or_else(|_| DEFAULT_PERSONA_NAME.to_string());

        Ok(Self {
            gcp_project,
            gcp_location,
            model,
            gmail_label,
            delivery_mode,
            history_backend,
            history_path,
            history_collection,
            catalog_backend,
            catalog_path,
            catalog_collection,
            history_cap,
            visible_exchanges,
            poll_interval,
            run_once,
            persona_name,
        })
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y"
        ),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvGuard {
        key: String,
        previous: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let previous = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                previous,
            }
        }

        fn unset(key: &str) -> Self {
            let previous = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                previous,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.previous {
                Some(value) => env::set_var(&self.key, value),
                None => env::remove_var(&self.key),
            }
        }
    }

    #[test]
    fn defaults_applied_when_only_project_set() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard_project = EnvGuard::set("GCP_PROJECT", "test-project");
        let _guard_location = EnvGuard::unset("GCP_LOCATION");
        let _guard_label = EnvGuard::unset("GMAIL_LABEL");
        let _guard_mode = EnvGuard::unset("TRIAGE_DELIVERY_MODE");
        let _guard_history = EnvGuard::unset("TRIAGE_HISTORY_BACKEND");
        let _guard_catalog = EnvGuard::unset("TRIAGE_CATALOG_BACKEND");
        let _guard_cap = EnvGuard::unset("TRIAGE_HISTORY_CAP");
        let _guard_visible = EnvGuard::unset("TRIAGE_VISIBLE_EXCHANGES");
        let _guard_once = EnvGuard::unset("TRIAGE_RUN_ONCE");
        let _guard_persona = EnvGuard::unset("TRIAGE_PERSONA");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.gcp_project, "test-project");
        assert_eq!(config.gcp_location, "us-central1");
        assert_eq!(config.gmail_label, "INBOX");
        assert_eq!(config.delivery_mode, DeliveryMode::Draft);
        assert_eq!(config.history_backend, HistoryBackend::File);
        assert_eq!(config.catalog_backend, CatalogBackend::File);
        assert_eq!(config.history_cap, DEFAULT_HISTORY_CAP);
        assert_eq!(config.visible_exchanges, DEFAULT_VISIBLE_EXCHANGES);
        assert_eq!(config.persona_name, "Pandora");
        assert!(!config.run_once);
    }

    #[test]
    fn missing_project_is_an_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard_project = EnvGuard::unset("GCP_PROJECT");

        let err = ServiceConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("GCP_PROJECT")));
    }

    #[test]
    fn backends_and_mode_parse_case_insensitively() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard_project = EnvGuard::set("GCP_PROJECT", "test-project");
        let _guard_mode = EnvGuard::set("TRIAGE_DELIVERY_MODE", "Send");
        let _guard_history = EnvGuard::set("TRIAGE_HISTORY_BACKEND", "FIRESTORE");
        let _guard_catalog = EnvGuard::set("TRIAGE_CATALOG_BACKEND", "firestore");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.delivery_mode, DeliveryMode::Send);
        assert_eq!(config.history_backend, HistoryBackend::Firestore);
        assert_eq!(config.catalog_backend, CatalogBackend::Firestore);
    }

    #[test]
    fn unknown_delivery_mode_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard_project = EnvGuard::set("GCP_PROJECT", "test-project");
        let _guard_mode = EnvGuard::set("TRIAGE_DELIVERY_MODE", "broadcast");

        let err = ServiceConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: "TRIAGE_DELIVERY_MODE",
                ..
            }
        ));
    }
}
