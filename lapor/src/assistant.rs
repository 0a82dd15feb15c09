//! Turn orchestration.
//!
//! Per inbound message: advisory cache lookup, authoritative extraction,
//! slot-map merge and turn append (both before any streaming starts), prompt
//! enhancement from the missing-field state, generation, then completeness
//! and next-action recompute. Cache and log writes are best-effort and never
//! roll back session state.

use std::sync::Arc;

use serde::Serialize;

use crate::cache::SimilarityCache;
use crate::config::AssistantConfig;
use crate::dialogue::{
    InMemorySessionStore, NextAction, Role, Session, SessionError, SessionStore, SlotKey, SlotMap,
};
use crate::extractor::EntityExtractor;
use crate::history::{FileTurnLog, NoopTurnLog, TurnLog};
use crate::llm::{
    ChatMessage, ChatRole, ChunkStream, LlmError, LlmProvider, LlmProviderFactory,
};
use crate::locale::Locale;
use crate::payload::{
    next_run_preview, HttpScheduleSink, PayloadBuilder, SchedulePayload, ScheduleReceipt,
    ScheduleSink,
};
use crate::prompts::system_prompt;
use crate::schedule::ScheduleTranslator;
use crate::summary::SummaryBuilder;

/// Errors from turn processing
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("no schedule sink configured")]
    NoSink,
    #[error("failed to build generation provider: {0}")]
    Provider(#[from] LlmError),
}

/// One inbound chat message.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub user_id: String,
    pub locale: Locale,
    pub allowed_merchants: Option<Vec<String>>,
}

impl TurnRequest {
    pub fn new(message: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: None,
            user_id: user_id.into(),
            locale: Locale::default(),
            allowed_merchants: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_allow_list(mut self, allowed: Vec<String>) -> Self {
        self.allowed_merchants = Some(allowed);
        self
    }
}

/// Result of one processed turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub session_id: String,
    pub reply: String,
    pub slots: SlotMap,
    pub missing_fields: Vec<SlotKey>,
    pub next_action: NextAction,
    pub is_complete: bool,
    /// Similarity of the closest cached conversation, when one was found.
    pub cache_hit: Option<f64>,
}

/// A streamed turn: either short-circuited with a ready outcome, or a chunk
/// stream the caller must drain and then hand back via
/// [`Assistant::finish_turn`].
pub enum StreamedTurn {
    Immediate(TurnOutcome),
    Streaming {
        session_id: String,
        cache_hit: Option<f64>,
        chunks: ChunkStream,
    },
}

/// Result of the confirm flow.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmOutcome {
    pub success: bool,
    pub message: String,
    pub schedule_id: Option<i64>,
    pub config_id: Option<i64>,
    pub payload: Option<SchedulePayload>,
    pub next_run: Option<chrono::DateTime<chrono::Utc>>,
}

enum Prepared {
    /// A control path produced the reply without generation.
    Control(TurnOutcome),
    /// Ready for generation.
    Generate {
        session_id: String,
        system_prompt: String,
        messages: Vec<ChatMessage>,
        cache_hit: Option<f64>,
        locale: Locale,
    },
}

pub struct Assistant {
    store: Arc<dyn SessionStore>,
    extractor: EntityExtractor,
    translator: ScheduleTranslator,
    summary: SummaryBuilder,
    payload_builder: PayloadBuilder,
    provider: Arc<dyn LlmProvider>,
    cache: Option<Arc<SimilarityCache>>,
    sink: Option<Arc<dyn ScheduleSink>>,
    turn_log: Arc<dyn TurnLog>,
    history_window: usize,
}

impl Assistant {
    pub fn new(config: &AssistantConfig, provider: Arc<dyn LlmProvider>) -> Self {
        let translator = ScheduleTranslator::new(config.default_schedule_hour);
        Self {
            store: Arc::new(InMemorySessionStore::new()),
            extractor: EntityExtractor::new(translator.clone(), config.default_timezone.clone()),
            summary: SummaryBuilder::new(translator.clone()),
            payload_builder: PayloadBuilder::new(config.payload.clone()),
            translator,
            provider,
            cache: None,
            sink: None,
            turn_log: Arc::new(NoopTurnLog),
            history_window: config.history_window,
        }
    }

    /// Wire every collaborator from configuration: generation provider by
    /// factory, similarity cache over the embedding endpoint, HTTP schedule
    /// sink and the optional file turn log.
    pub fn from_config(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let provider = LlmProviderFactory::create(config.llm.clone())?;
        let mut assistant = Self::new(config, provider);

        if config.embedding.enabled {
            let embedder = Arc::new(crate::cache::OllamaEmbeddingProvider::new(
                config.embedding.base_url.clone(),
                config.embedding.model.clone(),
            ));
            assistant = assistant.with_cache(Arc::new(
                SimilarityCache::new(embedder)
                    .with_threshold(config.cache.similarity_threshold)
                    .with_dedup_threshold(config.cache.dedup_threshold),
            ));
        }
        assistant = assistant.with_sink(Arc::new(HttpScheduleSink::new(
            &config.schedule_api.base_url,
            &config.schedule_api.complete_path,
        )));
        if let Some(dir) = &config.turn_log_dir {
            assistant = assistant.with_turn_log(Arc::new(FileTurnLog::new(dir.clone())));
        }
        Ok(assistant)
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_cache(mut self, cache: Arc<SimilarityCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ScheduleSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_turn_log(mut self, turn_log: Arc<dyn TurnLog>) -> Self {
        self.turn_log = turn_log;
        self
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn provider_info(&self) -> crate::llm::ProviderInfo {
        self.provider.info()
    }

    /// Process one turn and generate the full reply before returning.
    pub async fn process_turn(&self, request: TurnRequest) -> Result<TurnOutcome, AssistantError> {
        match self.prepare(request).await? {
            Prepared::Control(outcome) => Ok(outcome),
            Prepared::Generate {
                session_id,
                system_prompt,
                messages,
                cache_hit,
                locale,
            } => {
                let reply = match self.provider.generate(&system_prompt, &messages).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        tracing::error!("generation failed, using fallback reply: {}", e);
                        fallback_reply(locale).to_string()
                    }
                };
                self.finish_turn(&session_id, &reply, cache_hit).await
            }
        }
    }

    /// Process one turn, returning reply chunks as generation executes.
    ///
    /// Extraction and the slot-map merge complete before this returns, so a
    /// client cancelling mid-stream never leaves the session half-applied.
    /// After draining the chunks the caller must call [`Self::finish_turn`]
    /// with the assembled reply.
    pub async fn process_turn_stream(
        &self,
        request: TurnRequest,
    ) -> Result<StreamedTurn, AssistantError> {
        match self.prepare(request).await? {
            Prepared::Control(outcome) => Ok(StreamedTurn::Immediate(outcome)),
            Prepared::Generate {
                session_id,
                system_prompt,
                messages,
                cache_hit,
                locale,
            } => match self.provider.generate_stream(&system_prompt, &messages).await {
                Ok(chunks) => Ok(StreamedTurn::Streaming {
                    session_id,
                    cache_hit,
                    chunks,
                }),
                Err(e) => {
                    tracing::error!("generation failed, using fallback reply: {}", e);
                    let outcome = self
                        .finish_turn(&session_id, fallback_reply(locale), cache_hit)
                        .await?;
                    Ok(StreamedTurn::Immediate(outcome))
                }
            },
        }
    }

    /// Record the assistant reply and recompute session progress. This is the
    /// second half of a streamed turn.
    pub async fn finish_turn(
        &self,
        session_id: &str,
        reply: &str,
        cache_hit: Option<f64>,
    ) -> Result<TurnOutcome, AssistantError> {
        self.store.append_turn(session_id, Role::Assistant, reply)?;
        self.turn_log.turn(session_id, Role::Assistant, reply).await;

        // Completeness first: it fills optional-field defaults into the live
        // slot map, which is what makes the next action come out as confirm.
        let is_complete = self.store.check_complete(session_id)?;
        let next_action = self.store.compute_next_action(session_id)?;
        self.store.set_progress(session_id, next_action, is_complete)?;

        let session = self
            .store
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        Ok(TurnOutcome {
            session_id: session.id,
            reply: reply.to_string(),
            slots: session.slots,
            missing_fields: session.missing_fields,
            next_action,
            is_complete,
            cache_hit,
        })
    }

    /// Build the execution request from a completed session and submit it.
    pub async fn confirm(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<ConfirmOutcome, AssistantError> {
        let session = self
            .store
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if !session.is_complete {
            return Ok(ConfirmOutcome {
                success: false,
                message: "Data collection not complete yet".to_string(),
                schedule_id: None,
                config_id: None,
                payload: None,
                next_run: None,
            });
        }

        let payload = self.payload_builder.build(&session.slots, user_id);
        let sink = self.sink.as_ref().ok_or(AssistantError::NoSink)?;

        match sink.submit(&payload).await {
            Ok(receipt) => {
                self.record_success(&session, &receipt).await;
                Ok(ConfirmOutcome {
                    success: true,
                    message: "Schedule created successfully!".to_string(),
                    schedule_id: Some(receipt.schedule_id),
                    config_id: receipt.config_id,
                    next_run: next_run_preview(&payload.cron_expression),
                    payload: Some(payload),
                })
            }
            Err(e) => Ok(ConfirmOutcome {
                success: false,
                message: format!("Failed to create schedule: {}", e),
                schedule_id: None,
                config_id: None,
                next_run: None,
                payload: Some(payload),
            }),
        }
    }

    async fn prepare(&self, request: TurnRequest) -> Result<Prepared, AssistantError> {
        let locale = request.locale;
        let session = match &request.session_id {
            Some(id) => self
                .store
                .get(id)
                .ok_or_else(|| SessionError::NotFound(id.clone()))?,
            None => {
                let session = self.store.create(&request.user_id, locale);
                self.turn_log.session_started(&session).await;
                session
            }
        };

        if request.message.trim().eq_ignore_ascii_case("/verify") {
            return Ok(Prepared::Control(self.verify_reply(&session, locale).await));
        }

        // Advisory lookup: a hit is reported for observability, but the
        // current message is always parsed fresh so corrections land.
        let cache_hit = match &self.cache {
            Some(cache) => match cache.search(&request.message, 1).await {
                Ok(hits) => hits.first().map(|hit| hit.similarity),
                Err(e) => {
                    tracing::warn!("similarity lookup failed, continuing without: {}", e);
                    None
                }
            },
            None => None,
        };
        if let Some(similarity) = cache_hit {
            tracing::info!(session_id = session.id.as_str(), similarity, "cache hit");
        }

        let delta = match self.extractor.parse(
            &request.message,
            locale,
            request.allowed_merchants.as_deref(),
        ) {
            Ok(delta) => delta,
            Err(auth) => {
                let reply = authorization_reply(&auth.merchant_id, &auth.allowed, locale);
                self.turn_log
                    .turn(&session.id, Role::User, &request.message)
                    .await;
                self.turn_log.turn(&session.id, Role::Assistant, &reply).await;
                // Partial state is never committed for an unauthorized
                // request: the session stays exactly as it was.
                return Ok(Prepared::Control(TurnOutcome {
                    session_id: session.id.clone(),
                    reply,
                    slots: session.slots.clone(),
                    missing_fields: session.missing_fields.clone(),
                    next_action: session.next_action,
                    is_complete: session.is_complete,
                    cache_hit,
                }));
            }
        };

        if !delta.is_empty() {
            self.store.apply_delta(&session.id, &delta)?;
        }
        self.store
            .append_turn(&session.id, Role::User, &request.message)?;
        self.turn_log
            .turn(&session.id, Role::User, &request.message)
            .await;

        let session = self
            .store
            .get(&session.id)
            .ok_or_else(|| SessionError::NotFound(session.id.clone()))?;

        let enhanced = self.enhance_message(&request.message, &session, locale);
        let recent = session.recent_turns(self.history_window);
        // The just-appended raw user message is carried inside the enhanced
        // one, so it is dropped from the history slice.
        let mut messages: Vec<ChatMessage> = recent[..recent.len().saturating_sub(1)]
            .iter()
            .map(|turn| ChatMessage {
                role: match turn.role {
                    Role::User => ChatRole::User,
                    Role::Assistant => ChatRole::Assistant,
                },
                content: turn.content.clone(),
            })
            .collect();
        messages.push(ChatMessage::user(enhanced));

        Ok(Prepared::Generate {
            session_id: session.id,
            system_prompt: system_prompt(locale, request.allowed_merchants.as_deref()),
            messages,
            cache_hit,
            locale,
        })
    }

    async fn verify_reply(&self, session: &Session, locale: Locale) -> TurnOutcome {
        let reply = if session.slots.is_empty() {
            match locale {
                Locale::Id => "Belum ada data yang terkumpul.".to_string(),
                Locale::En => "No data collected yet.".to_string(),
            }
        } else {
            let summary = self.summary.build(&session.slots, locale);
            let status = match (session.is_complete, locale) {
                (true, Locale::Id) => "Data lengkap! Ketik /confirm untuk eksekusi.",
                (false, Locale::Id) => "Masih ada yang kurang.",
                (true, Locale::En) => "Data complete! Type /confirm to execute.",
                (false, Locale::En) => "Still missing some data.",
            };
            match locale {
                Locale::Id => format!("Data yang sudah terkumpul:\n\n{}\n\n{}", summary, status),
                Locale::En => format!("Collected data:\n\n{}\n\n{}", summary, status),
            }
        };

        self.turn_log.turn(&session.id, Role::User, "/verify").await;
        self.turn_log.turn(&session.id, Role::Assistant, &reply).await;

        TurnOutcome {
            session_id: session.id.clone(),
            reply,
            slots: session.slots.clone(),
            missing_fields: session.missing_fields.clone(),
            next_action: session.next_action,
            is_complete: session.is_complete,
            cache_hit: None,
        }
    }

    /// Append the collected-data context and the missing-field instruction to
    /// the user message, so the model asks for exactly one missing field and
    /// never re-asks for known ones.
    fn enhance_message(&self, message: &str, session: &Session, locale: Locale) -> String {
        let collected = self.collected_context(&session.slots, locale);
        let lower = message.to_lowercase();
        let wants_to_proceed = ["proses", "proceed", "lanjut", "buatkan", "create"]
            .iter()
            .any(|kw| lower.contains(kw));
        let asks_whats_missing = ["kurang", "missing", "apa lagi", "butuh apa", "informasi apa"]
            .iter()
            .any(|kw| lower.contains(kw));

        let missing = &session.missing_fields;
        let instruction = if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
            if wants_to_proceed {
                format!(
                    "\n\n[SYSTEM: User wants to proceed but data incomplete! Missing: {}. \
                     You MUST ask for ONE missing field. DO NOT say 'will process'.]",
                    names.join(", ")
                )
            } else if asks_whats_missing {
                let known: Vec<&str> = session.slots.iter().map(|(k, _)| k.as_str()).collect();
                format!(
                    "\n\n[CONTEXT: Collected: {}. Missing: {}. Explain simply what each \
                     missing field is with examples.]",
                    known.join(", "),
                    names.join(", ")
                )
            } else {
                format!(
                    "\n\n[SYSTEM: Missing fields: {}. Continue asking for ONE field at a time.]",
                    names.join(", ")
                )
            }
        } else if wants_to_proceed {
            "\n\n[SYSTEM: All data complete! Tell user to type /confirm to execute.]".to_string()
        } else {
            String::new()
        };

        format!("{}{}{}", message, collected, instruction)
    }

    fn collected_context(&self, slots: &SlotMap, locale: Locale) -> String {
        let mut parts = Vec::new();

        if let Some(merchant) = slots.get_text(SlotKey::MerchantId) {
            parts.push(format!("Merchant: {}", merchant));
        }
        if let Some(report_type) = slots.get_text(SlotKey::ReportType) {
            parts.push(match locale {
                Locale::Id => format!(
                    "Jenis: {}",
                    match report_type {
                        "transaction" => "Transaksi",
                        "settlement" => "Settlement",
                        other => other,
                    }
                ),
                Locale::En => format!("Type: {}", report_type),
            });
        }
        if let Some(statuses) = slots.get_list(SlotKey::StatusFilter) {
            parts.push(format!("Status: {}", statuses.join(", ")));
        }
        if let Some(range) = slots.get_text(SlotKey::DateRange) {
            parts.push(match locale {
                Locale::Id => format!("Periode: {}", range),
                Locale::En => format!("Period: {}", range),
            });
        }
        if let Some(format) = slots.get_text(SlotKey::OutputFormat) {
            parts.push(format!("Format: {}", format.to_uppercase()));
        }
        if let Some(cron) = slots.get_text(SlotKey::CronSchedule) {
            parts.push(match locale {
                Locale::Id => format!("Jadwal: {}", self.translator.render_raw(cron, locale)),
                Locale::En => format!("Schedule: {}", self.translator.render_raw(cron, locale)),
            });
        }
        if let Some(recipients) = slots.get_list(SlotKey::EmailRecipients) {
            parts.push(format!("Email: {}", recipients.join(", ")));
        }

        if parts.is_empty() {
            return String::new();
        }
        match locale {
            Locale::Id => format!("\n[DATA TERKUMPUL: {}]", parts.join(" | ")),
            Locale::En => format!("\n[COLLECTED DATA: {}]", parts.join(" | ")),
        }
    }

    async fn record_success(&self, session: &Session, receipt: &ScheduleReceipt) {
        if let Some(cache) = &self.cache {
            let message = session.first_user_message().unwrap_or_default();
            if let Err(e) = cache
                .store(
                    &session.id,
                    message,
                    &session.slots,
                    &receipt.schedule_id.to_string(),
                    true,
                )
                .await
            {
                tracing::warn!("similarity cache store failed: {}", e);
            }
        }
        self.turn_log
            .completed(&session.id, &receipt.schedule_id.to_string())
            .await;
    }
}

fn fallback_reply(locale: Locale) -> &'static str {
    match locale {
        Locale::Id => "Maaf, terjadi kesalahan. Bisa coba lagi?",
        Locale::En => "Sorry, an error occurred. Could you try again?",
    }
}

fn authorization_reply(merchant_id: &str, allowed: &[String], locale: Locale) -> String {
    match locale {
        Locale::Id => {
            let list = if allowed.is_empty() {
                "tidak ada".to_string()
            } else {
                allowed.join(", ")
            };
            format!(
                "Maaf, {} ga ada di akses kamu. Merchant yang tersedia: {}",
                merchant_id, list
            )
        }
        Locale::En => {
            let list = if allowed.is_empty() {
                "none".to_string()
            } else {
                allowed.join(", ")
            };
            format!(
                "Sorry, you don't have access to {}. Available merchants: {}",
                merchant_id, list
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmProviderConfig, LlmProviderType, StubLlmProvider};
    use crate::payload::SinkError;
    use futures::StreamExt;
    use std::sync::Mutex;

    fn stub_assistant() -> Assistant {
        let provider = Arc::new(StubLlmProvider::new(LlmProviderConfig {
            provider_type: LlmProviderType::Stub,
            ..Default::default()
        }));
        Assistant::new(&AssistantConfig::default(), provider)
    }

    struct RecordingSink {
        submissions: Mutex<Vec<SchedulePayload>>,
        receipt: ScheduleReceipt,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                submissions: Mutex::new(Vec::new()),
                receipt: ScheduleReceipt {
                    schedule_id: 42,
                    config_id: Some(7),
                },
            })
        }
    }

    #[async_trait::async_trait]
    impl ScheduleSink for RecordingSink {
        async fn submit(&self, payload: &SchedulePayload) -> Result<ScheduleReceipt, SinkError> {
            self.submissions.lock().unwrap().push(payload.clone());
            Ok(self.receipt.clone())
        }
    }

    #[tokio::test]
    async fn first_turn_creates_session_and_captures_fields() {
        let assistant = stub_assistant();
        let outcome = assistant
            .process_turn(TurnRequest::new(
                "buatkan report transaksi sukses untuk mid finpay770",
                "user@example.com",
            ))
            .await
            .unwrap();

        assert!(!outcome.reply.is_empty());
        assert_eq!(outcome.slots.get_text(SlotKey::MerchantId), Some("FINPAY770"));
        assert!(!outcome.is_complete);
        assert!(outcome.missing_fields.contains(&SlotKey::OutputFormat));
        // One missing field is prompted for at a time even though several
        // fields were captured in one turn.
        assert_eq!(outcome.next_action, NextAction::AskFormat);
    }

    #[tokio::test]
    async fn conversation_reaches_confirm() {
        let assistant = stub_assistant();
        let first = assistant
            .process_turn(TurnRequest::new(
                "report transaksi sukses mid finpay770",
                "u",
            ))
            .await
            .unwrap();

        let second = assistant
            .process_turn(
                TurnRequest::new(
                    "format excel, setiap hari jam 8, kirim ke finance@finpay.com",
                    "u",
                )
                .with_session(first.session_id.clone()),
            )
            .await
            .unwrap();

        assert!(second.is_complete);
        assert_eq!(second.next_action, NextAction::Confirm);
        assert!(second.missing_fields.is_empty());
        assert_eq!(second.session_id, first.session_id);
    }

    #[tokio::test]
    async fn authorization_failure_commits_nothing() {
        let assistant = stub_assistant();
        let first = assistant
            .process_turn(TurnRequest::new("halo", "u"))
            .await
            .unwrap();

        let outcome = assistant
            .process_turn(
                TurnRequest::new("mid finpay770 format excel 7 hari terakhir", "u")
                    .with_session(first.session_id.clone())
                    .with_allow_list(vec!["MERCHANT001".to_string()]),
            )
            .await
            .unwrap();

        assert!(outcome.reply.contains("FINPAY770"));
        assert!(outcome.reply.contains("MERCHANT001"));
        // Nothing from the refused message landed in the session, not even
        // the fields that were recognizable.
        let session = assistant.sessions().get(&first.session_id).unwrap();
        assert!(!session.slots.is_filled(SlotKey::MerchantId));
        assert!(!session.slots.is_filled(SlotKey::OutputFormat));
        assert!(!session.slots.is_filled(SlotKey::DateRange));
    }

    #[tokio::test]
    async fn verify_command_summarizes_without_generation() {
        let assistant = stub_assistant();
        let first = assistant
            .process_turn(TurnRequest::new("mid finpay770", "u"))
            .await
            .unwrap();

        let outcome = assistant
            .process_turn(TurnRequest::new("/verify", "u").with_session(first.session_id))
            .await
            .unwrap();
        assert!(outcome.reply.contains("✓ Merchant: FINPAY770"));
        assert!(outcome.reply.contains("Masih ada yang kurang"));
    }

    #[tokio::test]
    async fn streamed_turn_applies_slots_before_chunks() {
        let assistant = stub_assistant();
        let streamed = assistant
            .process_turn_stream(TurnRequest::new("mid finpay770 format excel", "u"))
            .await
            .unwrap();

        let (session_id, cache_hit, mut chunks) = match streamed {
            StreamedTurn::Streaming {
                session_id,
                cache_hit,
                chunks,
            } => (session_id, cache_hit, chunks),
            StreamedTurn::Immediate(_) => panic!("expected a streaming turn"),
        };

        // Slot merge happened before the first chunk was read.
        let session = assistant.sessions().get(&session_id).unwrap();
        assert_eq!(session.slots.get_text(SlotKey::MerchantId), Some("FINPAY770"));

        let mut reply = String::new();
        while let Some(chunk) = chunks.next().await {
            reply.push_str(&chunk.unwrap());
        }
        let outcome = assistant
            .finish_turn(&session_id, &reply, cache_hit)
            .await
            .unwrap();
        assert_eq!(outcome.reply, reply);
        let session = assistant.sessions().get(&session_id).unwrap();
        assert_eq!(session.turns.last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn confirm_requires_completeness() {
        let assistant = stub_assistant().with_sink(RecordingSink::new());
        let first = assistant
            .process_turn(TurnRequest::new("mid finpay770", "u"))
            .await
            .unwrap();

        let outcome = assistant.confirm(&first.session_id, "u").await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.payload.is_none());
    }

    #[tokio::test]
    async fn confirm_submits_payload_and_reports_receipt() {
        let sink = RecordingSink::new();
        let assistant = stub_assistant().with_sink(sink.clone());

        let first = assistant
            .process_turn(TurnRequest::new(
                "report transaksi sukses mid finpay770 format excel setiap hari jam 8 \
                 kirim ke finance@finpay.com",
                "user@example.com",
            ))
            .await
            .unwrap();
        assert!(first.is_complete);

        let outcome = assistant.confirm(&first.session_id, "user@example.com").await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.schedule_id, Some(42));
        assert_eq!(outcome.config_id, Some(7));
        assert!(outcome.next_run.is_some());

        let submissions = sink.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].cron_expression, "0 8 * * *");
        assert_eq!(submissions[0].configs.output_format, "xlsx");
    }

    #[tokio::test]
    async fn unknown_session_is_an_error() {
        let assistant = stub_assistant();
        let err = assistant
            .process_turn(TurnRequest::new("halo", "u").with_session("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::Session(SessionError::NotFound(_))));
    }
}
