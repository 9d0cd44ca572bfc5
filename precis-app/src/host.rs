//! Wires the actors to the native messaging pipe and pumps frames both ways.
use crate::bridge::NativeBridge;
use crate::protocol::{CommandReply, Inbound, QueryResponse, Rejected, SUMMARIZE_MENU_ID};
use crate::wire;
use anyhow::{anyhow, Context, Result};
use precis_actors::actor::Addr;
use precis_actors::builder::Builder;
use precis_actors::delivery::{DeliveryPolicy, Notifier, NotifierMsg};
use precis_actors::orchestrator::{Orchestrator, OrchestratorOptions};
use precis_actors::settings::{Settings, SettingsStore};
use precis_actors::{DeepSearch, OrchestratorMsg, UiMessage};
use precis_common::{Article, PrecisError};
use precis_config::PrecisConfig;
use precis_extract::ExtractorReport;
use precis_llm::{GeminiClient, KnowledgeMode};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const OUTBOUND_QUEUE: usize = 256;
const WRITER_DRAIN: Duration = Duration::from_secs(2);

pub struct Host {
    builder: Builder,
    bridge: Arc<NativeBridge>,
    orchestrator: Addr<Orchestrator>,
    notifier: Addr<Notifier>,
    outbound: mpsc::Receiver<Vec<u8>>,
}

impl Host {
    pub fn build(cfg: &PrecisConfig, settings: SettingsStore) -> Result<Self> {
        let (out_tx, outbound) = mpsc::channel(OUTBOUND_QUEUE);
        let bridge = Arc::new(NativeBridge::new(out_tx, cfg.bridge.command_timeout()));
        let client = GeminiClient::new(&cfg.gemini.endpoint, cfg.gemini.timeout())
            .with_context(|| format!("invalid Gemini endpoint: {}", cfg.gemini.endpoint))?;

        let mut builder = Builder::new();
        let policy = DeliveryPolicy::new(cfg.delivery.attempts, cfg.delivery.interval())
            .with_attempt_timeout(cfg.delivery.attempt_timeout());
        let notifier = builder.spawn(
            "notifier",
            cfg.orchestrator.mailbox,
            Notifier::new(bridge.clone(), policy),
        );
        let options = OrchestratorOptions {
            fact_check_mode: KnowledgeMode::from_flag(cfg.orchestrator.fact_check_web_search),
            gemini_web_url: cfg.gemini.web_url.clone(),
        };
        let orchestrator = builder.spawn(
            "orchestrator",
            cfg.orchestrator.mailbox,
            Orchestrator::new(
                bridge.clone(),
                notifier.clone(),
                Arc::new(client),
                settings,
                options,
            ),
        );
        info!(
            model = %cfg.gemini.model,
            fact_check_model = %cfg.gemini.fact_check_model,
            attempts = policy.attempts,
            "host.built"
        );

        Ok(Self {
            builder,
            bridge,
            orchestrator,
            notifier,
            outbound,
        })
    }

    /// Serve until `input` closes (the browser disconnected) or shutdown.
    pub async fn serve<R, W>(self, input: R, output: W) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Host {
            builder,
            bridge,
            orchestrator,
            notifier,
            outbound,
        } = self;
        let writer = tokio::spawn(pump_outbound(output, outbound));

        let result = builder
            .run_until(pump_inbound(input, bridge, orchestrator, notifier))
            .await;

        match tokio::time::timeout(WRITER_DRAIN, writer).await {
            Ok(Ok(Ok(()))) => debug!("host.writer_drained"),
            Ok(Ok(Err(e))) => warn!(error = %e, "host.writer_failed"),
            Ok(Err(e)) => warn!(error = %e, "host.writer_panicked"),
            Err(_) => warn!("host.writer_drain_timeout"),
        }
        info!(ok = result.is_ok(), "host.stopped");
        result
    }
}

pub async fn pump_outbound<W: AsyncWrite + Unpin>(
    mut output: W,
    mut frames: mpsc::Receiver<Vec<u8>>,
) -> Result<()> {
    while let Some(frame) = frames.recv().await {
        wire::write_frame(&mut output, &frame).await?;
    }
    Ok(())
}

pub async fn pump_inbound<R: AsyncRead + Unpin>(
    mut input: R,
    bridge: Arc<NativeBridge>,
    orchestrator: Addr<Orchestrator>,
    notifier: Addr<Notifier>,
) -> Result<()> {
    loop {
        let frame = match wire::read_frame(&mut input).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("host.input_closed");
                bridge.close();
                return Ok(());
            }
            Err(e) => {
                bridge.close();
                return Err(e.into());
            }
        };
        match serde_json::from_slice::<Inbound>(&frame) {
            Ok(msg) => dispatch(msg, &bridge, &orchestrator).await?,
            Err(e) => reject(&frame, &e, &bridge, &notifier).await?,
        }
    }
}

/// A frame that did not parse still gets an answer when the UI waits on one:
/// queries get an error response, chat and report requests an error message.
async fn reject(
    frame: &[u8],
    error: &serde_json::Error,
    bridge: &NativeBridge,
    notifier: &Addr<Notifier>,
) -> Result<()> {
    let rejected = Rejected::classify(frame);
    warn!(%error, bytes = frame.len(), ?rejected, "host.unrecognized_frame");
    let message = format!("Invalid request: {error}");
    let ui = match rejected {
        Rejected::Query { id } => {
            let response = QueryResponse::err(id, &PrecisError::Configuration(message));
            if let Err(e) = bridge.respond(response).await {
                warn!(id, error = %e, "host.response_failed");
            }
            return Ok(());
        }
        Rejected::Chat => UiMessage::DisplayChatError { message },
        Rejected::FactCheck => UiMessage::DisplayFactCheckError { message },
        Rejected::Claims => UiMessage::DisplayClaimsError { message },
        Rejected::Unanswerable => return Ok(()),
    };
    notifier
        .send(NotifierMsg::Deliver(ui))
        .await
        .map_err(|_| anyhow!("notifier stopped before a rejection notice"))
}

/// Route one inbound message. Queries are answered from a spawned task so
/// the reader never waits on the orchestrator.
async fn dispatch(
    msg: Inbound,
    bridge: &Arc<NativeBridge>,
    orchestrator: &Addr<Orchestrator>,
) -> Result<()> {
    let forward = match msg {
        Inbound::ActionClicked { tab } => OrchestratorMsg::StartExtraction { tab },
        Inbound::ContextMenuClicked { menu_item_id, tab } => {
            if menu_item_id != SUMMARIZE_MENU_ID {
                debug!(%menu_item_id, "host.menu_ignored");
                return Ok(());
            }
            OrchestratorMsg::StartExtraction { tab }
        }
        Inbound::WindowRemoved { window_id } => OrchestratorMsg::WindowClosed { window: window_id },
        Inbound::SessionEnded => OrchestratorMsg::EndSession,
        Inbound::Summarize { article } => {
            OrchestratorMsg::ExtractorReported(ExtractorReport::Extracted(article))
        }
        Inbound::DisplayError { title, message } => {
            OrchestratorMsg::ExtractorReported(ExtractorReport::Failed { title, message })
        }
        Inbound::ChatWithPage {
            history,
            internet_access,
        } => OrchestratorMsg::Chat {
            history,
            use_general_knowledge: internet_access,
        },
        Inbound::FactCheckArticle => OrchestratorMsg::FactCheck,
        Inbound::ExtractClaims => OrchestratorMsg::ExtractClaims,
        Inbound::GetSettings { id } => {
            let (tx, rx) = oneshot::channel::<precis_common::Result<Settings>>();
            answer(bridge.clone(), id, async move { rx.await.ok() });
            OrchestratorMsg::GetSettings { reply: tx }
        }
        Inbound::UpdateSettings { id, patch } => {
            let (tx, rx) = oneshot::channel::<precis_common::Result<Settings>>();
            answer(bridge.clone(), id, async move { rx.await.ok() });
            OrchestratorMsg::UpdateSettings { patch, reply: tx }
        }
        Inbound::GetCurrentArticle { id } => {
            let (tx, rx) = oneshot::channel::<Option<Article>>();
            answer(bridge.clone(), id, async move { rx.await.ok().map(Ok) });
            OrchestratorMsg::GetCurrentArticle { reply: tx }
        }
        Inbound::PrepareDeepSearch { id } => {
            let (tx, rx) = oneshot::channel::<precis_common::Result<DeepSearch>>();
            answer(bridge.clone(), id, async move { rx.await.ok() });
            OrchestratorMsg::PrepareDeepSearch { reply: tx }
        }
        Inbound::Reply {
            reply_to,
            ok,
            value,
            error,
            code,
        } => {
            bridge.resolve(
                reply_to,
                CommandReply {
                    ok,
                    value,
                    error,
                    code,
                },
            );
            return Ok(());
        }
    };

    orchestrator
        .send(forward)
        .await
        .map_err(|m| anyhow!("orchestrator stopped before {}", m.kind()))
}

fn answer<T, F>(bridge: Arc<NativeBridge>, id: u64, result: F)
where
    T: Serialize + Send + 'static,
    F: Future<Output = Option<precis_common::Result<T>>> + Send + 'static,
{
    tokio::spawn(async move {
        let response = match result.await {
            Some(Ok(value)) => match serde_json::to_value(value) {
                Ok(v) => QueryResponse::ok(id, v),
                Err(e) => QueryResponse::err(id, &PrecisError::Parse(e.to_string())),
            },
            Some(Err(e)) => QueryResponse::err(id, &e),
            None => {
                debug!(id, "host.query_abandoned");
                return;
            }
        };
        if let Err(e) = bridge.respond(response).await {
            warn!(id, error = %e, "host.response_failed");
        }
    });
}
