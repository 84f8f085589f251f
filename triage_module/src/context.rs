//! Conversation context assembly for reply generation.
//!
//! The builder merges per-correspondent history with the property catalog
//! into a single bounded prompt. History is loaded through an injected
//! [`HistoryStore`]; an unreachable store degrades the turn to stateless mode
//! (empty history) instead of failing it.

use chrono::Utc;
use tracing::warn;

use crate::catalog::CatalogRecord;
use crate::history_store::{Exchange, HistoryStore, StoreError};

/// Character budget applied to each side of a rendered exchange.
const HISTORY_CHAR_BUDGET: usize = 200;

/// Marker appended when a rendered message was cut at the budget.
const TRUNCATION_MARKER: &str = "...";

/// Default number of exchange pairs rendered into the prompt.
pub const DEFAULT_VISIBLE_EXCHANGES: usize = 3;

/// Sentinel rendered when the catalog is empty, so the prompt never silently
/// omits the section.
pub const EMPTY_CATALOG_PLACEHOLDER: &str = "No property information available.";

/// Canned reply delivered when the generation service fails.
pub const DEFAULT_REPLY: &str = "Thank you for your email. I'll get back to you shortly.";

/// Default assistant persona name, used to label outgoing history lines.
pub const DEFAULT_PERSONA_NAME: &str = "Pandora";

/// Persona and task instructions for the generation service.
///
/// The reply subject is applied by the delivery step, so the model is told
/// to produce body text only.
pub fn persona_instructions(persona_name: &str) -> String {
    format!(
        r#"You are {persona_name}, an experienced and professional property manager. You have in-depth knowledge of each property you oversee, including amenities, lease terms, neighborhood features, and application procedures. Your tone is friendly, clear, and helpful. When composing replies, you:
- Greet the sender by name (if provided)
- Thank them for their interest
- Answer each of their questions thoroughly and accurately
- Provide any additional relevant details (availability, next steps, showing times)
- Invite further questions and offer your contact information
- Reference previous conversations when relevant to provide continuity

Below is an email from a prospective tenant asking questions about one of your listings. Read the message carefully and draft a warm, informative reply that addresses each question and guides them toward the next steps. Write only the body of the email; do not include a subject line and do not start the reply with "Re:"."#,
    )
}

/// Builder for the conversational context of one triage turn.
pub struct ContextBuilder<'a> {
    store: &'a dyn HistoryStore,
    persona_name: String,
    visible_exchanges: usize,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(store: &'a dyn HistoryStore) -> Self {
        Self {
            store,
            persona_name: DEFAULT_PERSONA_NAME.to_string(),
            visible_exchanges: DEFAULT_VISIBLE_EXCHANGES,
        }
    }

    /// Sets the persona name used to label outgoing history lines.
    pub fn with_persona_name(mut self, name: &str) -> Self {
        self.persona_name = name.to_string();
        self
    }

    /// Sets how many exchange pairs are rendered into the prompt.
    pub fn with_visible_exchanges(mut self, count: usize) -> Self {
        self.visible_exchanges = count;
        self
    }

    /// Load prior history for a correspondent.
    ///
    /// Fails soft: a missing record or an unreachable store yields an empty
    /// history, never an error.
    pub fn load_history(&self, correspondent: &str) -> Vec<Exchange> {
        match self.store.load(correspondent) {
            Ok(history) => history,
            Err(err) => {
                warn!(
                    "history unavailable for {}, continuing stateless: {}",
                    correspondent, err
                );
                Vec::new()
            }
        }
    }

    /// Record one full exchange pair. The store trims to its cap (oldest
    /// first) before persisting.
    pub fn record_exchange(
        &self,
        correspondent: &str,
        incoming: &str,
        outgoing: &str,
    ) -> Result<(), StoreError> {
        self.store.append(
            correspondent,
            Exchange {
                timestamp: Utc::now(),
                incoming: incoming.to_string(),
                outgoing: outgoing.to_string(),
            },
        )
    }

    /// Drop all recorded history for a correspondent.
    pub fn clear_history(&self, correspondent: &str) -> Result<(), StoreError> {
        self.store.clear(correspondent)
    }

    /// Render the last `visible_exchanges` pairs, each side truncated to the
    /// character budget. Empty history renders to an empty string so callers
    /// omit the section.
    pub fn render_history(&self, history: &[Exchange]) -> String {
        if history.is_empty() {
            return String::new();
        }

        let start = history.len().saturating_sub(self.visible_exchanges);
        let mut rendered = String::from("PREVIOUS CONVERSATION HISTORY:\n");
        for exchange in &history[start..] {
            rendered.push('\n');
            rendered.push_str("Tenant: ");
            rendered.push_str(&truncate(&exchange.incoming));
            rendered.push('\n');
            rendered.push_str(&self.persona_name);
            rendered.push_str(": ");
            rendered.push_str(&truncate(&exchange.outgoing));
            rendered.push('\n');
        }
        rendered
    }

    /// Assemble the final prompt: persona instructions, catalog, history,
    /// incoming message — always in that order. An empty history section is
    /// omitted; the catalog section always carries at least the sentinel.
    pub fn build_prompt(
        &self,
        persona_instructions: &str,
        catalog_str: &str,
        history_str: &str,
        incoming_text: &str,
    ) -> String {
        let mut sections = vec![
            persona_instructions.trim_end().to_string(),
            catalog_str.trim_end().to_string(),
        ];
        if !history_str.trim().is_empty() {
            sections.push(history_str.trim_end().to_string());
        }
        sections.push(format!("Email from prospective tenant:\n{}", incoming_text));
        sections.join("\n\n")
    }
}

/// Render the property catalog for the prompt. An empty catalog produces the
/// explicit placeholder, never an empty string.
pub fn render_catalog(records: &[CatalogRecord]) -> String {
    if records.is_empty() {
        return EMPTY_CATALOG_PLACEHOLDER.to_string();
    }

    let mut rendered = String::from("PROPERTY INFORMATION:\n");
    for (index, record) in records.iter().enumerate() {
        rendered.push_str(&format!("\nProperty {}:\n", index + 1));
        for (field, value) in record {
            rendered.push_str(&format!("  {}: {}\n", field, value));
        }
    }
    rendered
}

fn truncate(text: &str) -> String {
    if text.chars().count() > HISTORY_CHAR_BUDGET {
        let cut: String = text.chars().take(HISTORY_CHAR_BUDGET).collect();
        format!("{}{}", cut, TRUNCATION_MARKER)
    } else {
        text.to_string()
    }
}
