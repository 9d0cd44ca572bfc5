//! The orchestrator: one actor that owns session state and routes every
//! user action to the browser, the assistant client and the UI.
//!
//! Assistant calls run as detached tasks so the mailbox keeps moving while a
//! request is outstanding. Each call is stamped with the session generation
//! it was issued under; results from an older generation are dropped when
//! they come back as [`OrchestratorMsg::Completed`].
use crate::actor::{Actor, Addr, Context};
use crate::delivery::{Notifier, NotifierMsg};
use crate::ports::BrowserPort;
use crate::session::{PopupTracker, SessionState};
use crate::settings::SettingsStore;
use crate::{DeepSearch, OrchestratorMsg, Outcome, UiMessage};
use anyhow::Result;
use precis_common::{Article, ConversationHistory, PrecisError, TabRef};
use precis_extract::{article_from_selection, select_plan, ExtractorReport};
use precis_llm::prompts;
use precis_llm::{AssistantClient, KnowledgeMode, ModelAccess};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const CHAT_CONTEXT_MISSING: &str = "Article context not found. Please summarize a page first.";
pub const ARTICLE_CONTEXT_MISSING: &str =
    "Article content not found. Please summarize a page first.";
pub const DEEP_SEARCH_CONTEXT_MISSING: &str = "Article content/URL not found.";
pub const CHAT_BUSY: &str = "Please wait for the current reply to finish.";
pub const API_KEY_MISSING: &str = "Gemini API key is not set. Add it in the settings.";

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Knowledge mode used for fact-checks.
    pub fact_check_mode: KnowledgeMode,
    /// Page opened by the deep search flow.
    pub gemini_web_url: String,
}

#[derive(Debug, Clone, Copy)]
enum ModelRole {
    General,
    FactCheck,
}

pub struct Orchestrator {
    browser: Arc<dyn BrowserPort>,
    notifier: Addr<Notifier>,
    assistant: Arc<dyn AssistantClient>,
    settings: SettingsStore,
    session: SessionState,
    popup: PopupTracker,
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(
        browser: Arc<dyn BrowserPort>,
        notifier: Addr<Notifier>,
        assistant: Arc<dyn AssistantClient>,
        settings: SettingsStore,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            browser,
            notifier,
            assistant,
            settings,
            session: SessionState::default(),
            popup: PopupTracker::default(),
            options,
        }
    }

    async fn notify(&self, message: UiMessage) {
        let action = message.action();
        if self
            .notifier
            .send(NotifierMsg::Deliver(message))
            .await
            .is_err()
        {
            tracing::error!(action, "orchestrator.notifier_gone");
        }
    }

    async fn start_extraction(&mut self, tab: TabRef) {
        let generation = self.session.begin(tab.clone());
        info!(tab = %tab.id, generation, url = %tab.url, "orchestrator.start_extraction");

        self.ensure_surface(&tab).await;
        self.notify(UiMessage::ShowLoading).await;

        match self.settings.api_key().await {
            Ok(Some(_)) => {}
            Ok(None) => {
                info!(generation, "orchestrator.api_key_missing");
                self.notify(UiMessage::ApiKeyRequired).await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "orchestrator.settings_unreadable");
                self.notify(UiMessage::error(&e)).await;
                return;
            }
        }

        match self.browser.read_selection(tab.id).await {
            Ok(Some(selection)) => {
                if let Some(article) = article_from_selection(&tab, &selection) {
                    info!(chars = article.content.len(), "orchestrator.selection_found");
                    self.notify(UiMessage::ShowSelectionPrompt { article }).await;
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "orchestrator.selection_unavailable"),
        }

        let plan = select_plan(&tab.url);
        self.session.set_reason(plan.reason);
        match self.browser.inject(tab.id, &plan.files).await {
            Ok(()) => info!(tab = %tab.id, reason = ?plan.reason, "orchestrator.injected"),
            Err(failure) => {
                let err = failure.into_error();
                if err.is_benign() {
                    info!(tab = %tab.id, detail = %err, "orchestrator.injection_tab_closed");
                } else {
                    warn!(tab = %tab.id, error = %err, "orchestrator.injection_failed");
                    self.notify(UiMessage::error(&err)).await;
                }
            }
        }
    }

    /// Focus the tracked popup, adopt an open one, or open a new one.
    /// Failures are logged; the UI may still come up on its own.
    async fn ensure_surface(&mut self, tab: &TabRef) {
        if let Some(window) = self.popup.current() {
            match self.browser.focus_surface(window).await {
                Ok(true) => {
                    debug!(%window, "orchestrator.surface_focused");
                    return;
                }
                Ok(false) => debug!(%window, "orchestrator.tracked_surface_gone"),
                Err(e) => warn!(%window, error = %e, "orchestrator.surface_focus_failed"),
            }
            self.popup.clear();
        }

        match self.browser.find_surface().await {
            Ok(Some(window)) => {
                self.popup.track(window);
                if let Err(e) = self.browser.focus_surface(window).await {
                    warn!(%window, error = %e, "orchestrator.surface_focus_failed");
                }
                debug!(%window, "orchestrator.surface_adopted");
                return;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "orchestrator.surface_lookup_failed"),
        }

        match self.browser.open_surface(tab).await {
            Ok(Some(window)) => {
                info!(%window, "orchestrator.surface_opened");
                self.popup.track(window);
            }
            Ok(None) => debug!("orchestrator.surface_docked"),
            Err(e) => warn!(error = %e, "orchestrator.surface_open_failed"),
        }
    }

    async fn receive_report(&mut self, report: ExtractorReport, ctx: &Context<Self>) {
        let article = match report.resolve(self.session.reason()) {
            Ok(article) => article,
            Err(e) => {
                warn!(title = e.title(), error = %e, "orchestrator.extraction_failed");
                self.notify(UiMessage::error(&e)).await;
                return;
            }
        };

        info!(
            title = %article.title,
            chars = article.content.len(),
            generation = self.session.generation(),
            "orchestrator.article_stored"
        );
        self.session.store(article.clone());

        let access = match self.access(ModelRole::General).await {
            Ok(access) => access,
            Err(e) => {
                self.notify(UiMessage::error(&e)).await;
                return;
            }
        };
        self.spawn_call(ctx, move |client| async move {
            let result = client.summarize(&access, &article).await;
            Outcome::Summary {
                title: article.title,
                result,
            }
        });
    }

    async fn chat(
        &mut self,
        history: ConversationHistory,
        use_general_knowledge: bool,
        ctx: &Context<Self>,
    ) {
        let Some(article) = self.current_article(CHAT_CONTEXT_MISSING) else {
            info!("orchestrator.chat_without_article");
            self.notify(UiMessage::DisplayChatError {
                message: CHAT_CONTEXT_MISSING.to_string(),
            })
            .await;
            return;
        };
        if self.session.chat_in_flight() {
            info!("orchestrator.chat_rejected_busy");
            self.notify(UiMessage::DisplayChatError {
                message: CHAT_BUSY.to_string(),
            })
            .await;
            return;
        }
        let access = match self.access(ModelRole::General).await {
            Ok(access) => access,
            Err(e) => {
                self.notify(UiMessage::DisplayChatError {
                    message: e.to_string(),
                })
                .await;
                return;
            }
        };

        let mode = KnowledgeMode::from_flag(use_general_knowledge);
        debug!(turns = history.len(), ?mode, "orchestrator.chat");
        self.session.set_chat_in_flight(true);
        let dispatched = self.spawn_call(ctx, move |client| async move {
            Outcome::Chat(client.chat(&access, &history, &article, mode).await)
        });
        if !dispatched {
            self.session.set_chat_in_flight(false);
        }
    }

    async fn fact_check(&mut self, ctx: &Context<Self>) {
        let Some(article) = self.current_article(ARTICLE_CONTEXT_MISSING) else {
            self.notify(UiMessage::DisplayFactCheckError {
                message: ARTICLE_CONTEXT_MISSING.to_string(),
            })
            .await;
            return;
        };
        let access = match self.access(ModelRole::FactCheck).await {
            Ok(access) => access,
            Err(e) => {
                self.notify(UiMessage::DisplayFactCheckError {
                    message: e.to_string(),
                })
                .await;
                return;
            }
        };
        let mode = self.options.fact_check_mode;
        self.spawn_call(ctx, move |client| async move {
            Outcome::FactCheck(client.fact_check(&access, &article, mode).await)
        });
    }

    async fn extract_claims(&mut self, ctx: &Context<Self>) {
        let Some(article) = self.current_article(ARTICLE_CONTEXT_MISSING) else {
            self.notify(UiMessage::DisplayClaimsError {
                message: ARTICLE_CONTEXT_MISSING.to_string(),
            })
            .await;
            return;
        };
        let access = match self.access(ModelRole::General).await {
            Ok(access) => access,
            Err(e) => {
                self.notify(UiMessage::DisplayClaimsError {
                    message: e.to_string(),
                })
                .await;
                return;
            }
        };
        self.spawn_call(ctx, move |client| async move {
            Outcome::Claims(client.extract_claims(&access, &article).await)
        });
    }

    fn current_article(&self, missing: &str) -> Option<Article> {
        let article = self.session.article().cloned();
        if article.is_none() {
            debug!(reason = missing, "orchestrator.context_missing");
        }
        article
    }

    /// Credentials and model for one call, read fresh from settings.
    async fn access(&self, role: ModelRole) -> precis_common::Result<ModelAccess> {
        let settings = self.settings.load().await?;
        let api_key = settings
            .gemini_api_key
            .ok_or_else(|| PrecisError::Configuration(API_KEY_MISSING.to_string()))?;
        let model = match role {
            ModelRole::General => settings.gemini_model,
            ModelRole::FactCheck => settings.gemini_fact_check_model,
        };
        Ok(ModelAccess::new(api_key, model))
    }

    /// Run an assistant call off the mailbox; the outcome comes back as
    /// `Completed` stamped with the current generation. Returns `false` when
    /// the orchestrator is shutting down and nothing was started.
    fn spawn_call<F, Fut>(&self, ctx: &Context<Self>, call: F) -> bool
    where
        F: FnOnce(Arc<dyn AssistantClient>) -> Fut,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let Some(me) = ctx.addr() else {
            debug!("orchestrator.shutting_down");
            return false;
        };
        let generation = self.session.generation();
        let fut = call(self.assistant.clone());
        tokio::spawn(async move {
            let outcome = fut.await;
            if me
                .send(OrchestratorMsg::Completed {
                    generation,
                    outcome,
                })
                .await
                .is_err()
            {
                debug!(generation, "orchestrator.result_after_shutdown");
            }
        });
        true
    }

    async fn completed(&mut self, generation: u64, outcome: Outcome) {
        if !self.session.is_current(generation) {
            debug!(
                generation,
                current = self.session.generation(),
                "orchestrator.stale_result_dropped"
            );
            return;
        }

        let message = match outcome {
            Outcome::Summary {
                title,
                result: Ok(summary),
            } => UiMessage::DisplaySummary { title, summary },
            Outcome::Summary { result: Err(e), .. } => {
                warn!(kind = e.title(), error = %e, "orchestrator.summary_failed");
                UiMessage::error(&e)
            }
            Outcome::Chat(result) => {
                self.session.set_chat_in_flight(false);
                match result {
                    Ok(message) => UiMessage::DisplayChatResponse { message },
                    Err(e) => {
                        warn!(kind = e.title(), error = %e, "orchestrator.chat_failed");
                        UiMessage::DisplayChatError {
                            message: e.to_string(),
                        }
                    }
                }
            }
            Outcome::FactCheck(Ok(report)) => UiMessage::DisplayFactCheckReport { report },
            Outcome::FactCheck(Err(e)) => {
                warn!(kind = e.title(), error = %e, "orchestrator.fact_check_failed");
                UiMessage::DisplayFactCheckError {
                    message: e.to_string(),
                }
            }
            Outcome::Claims(Ok(claims)) => {
                info!(count = claims.len(), "orchestrator.claims_extracted");
                UiMessage::DisplayClaims { claims }
            }
            Outcome::Claims(Err(e)) => {
                warn!(kind = e.title(), error = %e, "orchestrator.claims_failed");
                UiMessage::DisplayClaimsError {
                    message: e.to_string(),
                }
            }
        };
        self.notify(message).await;
    }

    fn prepare_deep_search(&self) -> precis_common::Result<DeepSearch> {
        match self.session.article() {
            Some(article) if !article.url.trim().is_empty() => Ok(DeepSearch {
                prompt: prompts::general_fact_check(article),
                url: self.options.gemini_web_url.clone(),
            }),
            _ => Err(PrecisError::ContextMissing(
                DEEP_SEARCH_CONTEXT_MISSING.to_string(),
            )),
        }
    }
}

fn reply<T>(tx: tokio::sync::oneshot::Sender<T>, value: T, kind: &'static str) {
    if tx.send(value).is_err() {
        debug!(kind, "orchestrator.reply_dropped");
    }
}

#[async_trait::async_trait]
impl Actor for Orchestrator {
    type Msg = OrchestratorMsg;

    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
        debug!(kind = msg.kind(), "orchestrator.message");
        match msg {
            OrchestratorMsg::StartExtraction { tab } => self.start_extraction(tab).await,
            OrchestratorMsg::ExtractorReported(report) => self.receive_report(report, ctx).await,
            OrchestratorMsg::Chat {
                history,
                use_general_knowledge,
            } => self.chat(history, use_general_knowledge, ctx).await,
            OrchestratorMsg::FactCheck => self.fact_check(ctx).await,
            OrchestratorMsg::ExtractClaims => self.extract_claims(ctx).await,
            OrchestratorMsg::WindowClosed { window } => {
                if self.popup.clear_if(window) {
                    info!(%window, "orchestrator.popup_closed");
                }
            }
            OrchestratorMsg::EndSession => {
                let generation = self.session.end();
                self.popup.clear();
                info!(generation, "orchestrator.session_ended");
            }
            OrchestratorMsg::GetCurrentArticle { reply: tx } => {
                reply(tx, self.session.article().cloned(), "get_current_article")
            }
            OrchestratorMsg::GetSettings { reply: tx } => {
                let settings = self.settings.load().await;
                reply(tx, settings, "get_settings");
            }
            OrchestratorMsg::UpdateSettings { patch, reply: tx } => {
                let result = self.settings.apply(patch).await;
                if let Err(e) = &result {
                    warn!(error = %e, "orchestrator.settings_update_failed");
                }
                reply(tx, result, "update_settings");
            }
            OrchestratorMsg::PrepareDeepSearch { reply: tx } => {
                reply(tx, self.prepare_deep_search(), "prepare_deep_search")
            }
            OrchestratorMsg::Completed {
                generation,
                outcome,
            } => self.completed(generation, outcome).await,
        }
        Ok(())
    }
}
