//! End-to-end triage pass and poll loop.
//!
//! One pass processes at most one unread message, synchronously: poll the
//! inbox, assemble the conversational context, generate a reply, record the
//! exchange, deliver as draft or sent mail, mark the message read.
//! Authentication failures are fatal; other external failures degrade per
//! step (empty listing, canned reply) and the loop keeps polling.

pub mod config;

use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use gmail_module::{extract_sender_address, GmailClient, GmailError};
use google_auth_module::GoogleAuth;
use vertex_module::{VertexClient, VertexError};

use crate::catalog::{CatalogSource, FirestoreCatalog, JsonFileCatalog};
use crate::context::{persona_instructions, render_catalog, ContextBuilder, DEFAULT_REPLY};
use crate::firestore::{FirestoreClient, FirestoreError};
use crate::history_store::{
    FirestoreHistoryStore, HistoryStore, JsonFileHistoryStore, StoreError,
};

pub use config::{
    CatalogBackend, ConfigError, DeliveryMode, HistoryBackend, ServiceConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("auth error: {0}")]
    Auth(#[from] google_auth_module::GoogleAuthError),
    #[error("invalid sender address: {0}")]
    InvalidSender(String),
    #[error("gmail error: {0}")]
    Gmail(#[from] GmailError),
    #[error("history store error: {0}")]
    Store(#[from] StoreError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl TriageError {
    /// Authentication failures abort the run; everything else is a pass
    /// failure the poll loop logs and survives.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TriageError::Auth(_)
                | TriageError::Gmail(GmailError::Auth(_))
                | TriageError::Store(StoreError::Firestore(FirestoreError::Auth(_)))
        )
    }
}

/// Result of one triage pass.
#[derive(Debug)]
pub enum PassOutcome {
    NoUnread,
    Processed {
        correspondent: String,
        /// Draft id in draft mode; `None` when the reply was sent outright.
        draft_id: Option<String>,
    },
}

pub struct TriageService {
    config: ServiceConfig,
    gmail: GmailClient,
    vertex: VertexClient,
    store: Box<dyn HistoryStore>,
    catalog: Box<dyn CatalogSource>,
}

impl TriageService {
    /// Wire the service from configuration and ambient Google credentials.
    pub fn from_config(config: ServiceConfig) -> Result<Self, TriageError> {
        let auth = GoogleAuth::from_env()?;
        let gmail = GmailClient::new(auth.clone());
        let vertex = VertexClient::new(
            auth.clone(),
            &config.gcp_project,
            &config.gcp_location,
            &config.model,
        );

        let store: Box<dyn HistoryStore> = match config.history_backend {
            HistoryBackend::File => Box::new(
                JsonFileHistoryStore::new(&config.history_path).with_cap(config.history_cap),
            ),
            HistoryBackend::Firestore => Box::new(
                FirestoreHistoryStore::new(
                    FirestoreClient::new(auth.clone(), &config.gcp_project),
                    &config.history_collection,
                )
                .with_cap(config.history_cap),
            ),
        };

        let catalog: Box<dyn CatalogSource> = match config.catalog_backend {
            CatalogBackend::File => Box::new(JsonFileCatalog::new(&config.catalog_path)),
            CatalogBackend::Firestore => Box::new(FirestoreCatalog::new(
                FirestoreClient::new(auth, &config.gcp_project),
                &config.catalog_collection,
            )),
        };

        Ok(Self::new(config, gmail, vertex, store, catalog))
    }

    /// Assemble the service from explicit parts.
    pub fn new(
        config: ServiceConfig,
        gmail: GmailClient,
        vertex: VertexClient,
        store: Box<dyn HistoryStore>,
        catalog: Box<dyn CatalogSource>,
    ) -> Self {
        Self {
            config,
            gmail,
            vertex,
            store,
            catalog,
        }
    }

    /// Run one triage pass over the first unread message, if any.
    pub fn process_next_unread(&self) -> Result<PassOutcome, TriageError> {
        let emails = match self.gmail.list_unread(&self.config.gmail_label) {
            Ok(emails) => emails,
            Err(GmailError::Auth(err)) => return Err(TriageError::Auth(err)),
            Err(err) => {
                error!("failed to list unread emails: {}", err);
                Vec::new()
            }
        };

        let email = match emails.into_iter().next() {
            Some(email) => email,
            None => {
                info!("no unread emails found");
                return Ok(PassOutcome::NoUnread);
            }
        };

        info!(
            "processing email from {} with subject '{}'",
            email.sender, email.subject
        );

        let correspondent = extract_sender_address(&email.sender)
            .ok_or_else(|| TriageError::InvalidSender(email.sender.clone()))?;

        let builder = ContextBuilder::new(self.store.as_ref())
            .with_persona_name(&self.config.persona_name)
            .with_visible_exchanges(self.config.visible_exchanges);

        let history = builder.load_history(&correspondent);
        let records = match self.catalog.load() {
            Ok(records) => records,
            Err(err) => {
                warn!("catalog unavailable, continuing without property context: {}", err);
                Vec::new()
            }
        };

        let catalog_str = render_catalog(&records);
        let history_str = builder.render_history(&history);
        let prompt = builder.build_prompt(
            &persona_instructions(&self.config.persona_name),
            &catalog_str,
            &history_str,
            &email.body,
        );

        let reply = match self.vertex.generate(&prompt) {
            Ok(reply) => reply,
            Err(VertexError::Auth(err)) => return Err(TriageError::Auth(err)),
            Err(err) => {
                error!("reply generation failed, falling back to default reply: {}", err);
                DEFAULT_REPLY.to_string()
            }
        };

        builder.record_exchange(&correspondent, &email.body, &reply)?;

        let draft_id = match self.config.delivery_mode {
            DeliveryMode::Draft => {
                Some(self.gmail.create_draft(&email.sender, &email.subject, &reply)?)
            }
            DeliveryMode::Send => {
                self.gmail.send(&email.sender, &email.subject, &reply)?;
                None
            }
        };

        self.gmail.mark_read(&email.id)?;
        info!("replied to {}", email.sender);

        Ok(PassOutcome::Processed {
            correspondent,
            draft_id,
        })
    }
}

/// Blocking poll loop: one triage pass per interval.
pub struct TriagePoller {
    service: TriageService,
    interval: Duration,
}

impl TriagePoller {
    pub fn new(service: TriageService, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Poll until a fatal error occurs. Non-fatal pass failures are logged
    /// and the loop keeps going.
    pub fn run(&self) -> Result<(), TriageError> {
        info!("starting triage poller, interval {:?}", self.interval);
        loop {
            match self.service.process_next_unread() {
                Ok(PassOutcome::Processed { correspondent, .. }) => {
                    info!("processed message from {}", correspondent);
                }
                Ok(PassOutcome::NoUnread) => {}
                Err(err) if err.is_fatal() => {
                    error!("fatal error, stopping poller: {}", err);
                    return Err(err);
                }
                Err(err) => {
                    error!("triage pass failed: {}", err);
                }
            }
            thread::sleep(self.interval);
        }
    }
}
