//! Request/reply correlation over the native messaging pipe.
//!
//! Every [`HostCommand`] gets a fresh id and a pending slot; the reader hands
//! `reply` frames to [`NativeBridge::resolve`]. A command without an answer
//! inside the timeout fails; its slot is removed however the wait ends.
use crate::protocol::{CommandEnvelope, CommandReply, HostCommand, QueryResponse};
use crate::wire;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use precis_actors::delivery::UiSink;
use precis_actors::ports::{BrowserPort, InjectionFailure};
use precis_actors::UiMessage;
use precis_common::{TabId, TabRef, WindowId};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Reply code the shim uses when no UI surface is listening.
pub const NO_LISTENER: &str = "noListener";
const TAB_CLOSED: &str = "tabClosed";
const TAB_CLOSED_TEXT: &str = "No tab with id";

pub struct NativeBridge {
    out: mpsc::Sender<Vec<u8>>,
    pending: DashMap<u64, oneshot::Sender<CommandReply>>,
    next_id: AtomicU64,
    timeout: Duration,
    closed: AtomicBool,
}

impl NativeBridge {
    pub fn new(out: mpsc::Sender<Vec<u8>>, timeout: Duration) -> Self {
        Self {
            out,
            pending: DashMap::new(),
            next_id: AtomicU64::new(0),
            timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// The browser went away: fail waiting commands and refuse new ones.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let abandoned = self.pending();
        self.pending.clear();
        tracing::debug!(abandoned, "bridge.closed");
    }

    /// Send `command` and wait for the shim's reply.
    pub async fn command(&self, command: HostCommand) -> Result<CommandReply> {
        if self.closed.load(Ordering::SeqCst) {
            bail!("browser disconnected");
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = wire::encode(&CommandEnvelope {
            id,
            command: &command,
        })?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        let _slot = PendingSlot {
            pending: &self.pending,
            id,
        };
        if self.out.send(frame).await.is_err() {
            bail!("host output closed");
        }
        tracing::debug!(id, command = command.name(), "bridge.sent");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(anyhow!("{} abandoned", command.name())),
            Err(_) => {
                tracing::warn!(id, command = command.name(), timeout = ?self.timeout, "bridge.timeout");
                Err(anyhow!(
                    "{} timed out after {:?}",
                    command.name(),
                    self.timeout
                ))
            }
        }
    }

    /// Hand a reply to whoever is waiting for `reply_to`.
    pub fn resolve(&self, reply_to: u64, reply: CommandReply) -> bool {
        match self.pending.remove(&reply_to) {
            Some((_, tx)) => tx.send(reply).is_ok(),
            None => {
                tracing::debug!(reply_to, "bridge.unexpected_reply");
                false
            }
        }
    }

    pub async fn respond(&self, response: QueryResponse) -> Result<()> {
        let frame = wire::encode(&response)?;
        self.out
            .send(frame)
            .await
            .map_err(|_| anyhow!("host output closed"))
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    async fn value(&self, command: HostCommand) -> Result<Value> {
        let name = command.name();
        let reply = self.command(command).await?;
        if !reply.ok {
            bail!("{name} failed: {}", reply.failure());
        }
        Ok(reply.value.unwrap_or(Value::Null))
    }
}

/// Frees a pending id however the waiting command ends, including when the
/// caller drops it mid-wait (e.g. a delivery attempt timing out).
struct PendingSlot<'a> {
    pending: &'a DashMap<u64, oneshot::Sender<CommandReply>>,
    id: u64,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

fn is_tab_closed(reply: &CommandReply) -> bool {
    reply.code.as_deref() == Some(TAB_CLOSED)
        || reply
            .error
            .as_deref()
            .is_some_and(|e| e.contains(TAB_CLOSED_TEXT))
}

#[async_trait]
impl BrowserPort for NativeBridge {
    async fn find_surface(&self) -> Result<Option<WindowId>> {
        let value = self.value(HostCommand::FindSurface).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn open_surface(&self, tab: &TabRef) -> Result<Option<WindowId>> {
        let value = self
            .value(HostCommand::OpenSurface { tab: tab.clone() })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn focus_surface(&self, window: WindowId) -> Result<bool> {
        let reply = self
            .command(HostCommand::FocusSurface { window_id: window })
            .await?;
        if !reply.ok {
            tracing::debug!(%window, reason = %reply.failure(), "bridge.focus_failed");
            return Ok(false);
        }
        Ok(reply.value.and_then(|v| v.as_bool()).unwrap_or(true))
    }

    async fn inject(&self, tab: TabId, files: &[String]) -> Result<(), InjectionFailure> {
        let reply = self
            .command(HostCommand::Inject {
                tab_id: tab,
                files: files.to_vec(),
            })
            .await
            .map_err(|e| InjectionFailure::Other(e.to_string()))?;
        if reply.ok {
            return Ok(());
        }
        if is_tab_closed(&reply) {
            Err(InjectionFailure::TabClosed(reply.failure()))
        } else {
            Err(InjectionFailure::Other(reply.failure()))
        }
    }

    async fn read_selection(&self, tab: TabId) -> Result<Option<String>> {
        let value = self.value(HostCommand::ReadSelection { tab_id: tab }).await?;
        Ok(value.as_str().map(str::to_string))
    }
}

#[async_trait]
impl UiSink for NativeBridge {
    async fn deliver(&self, message: &UiMessage) -> Result<()> {
        let reply = self
            .command(HostCommand::Deliver {
                message: message.clone(),
            })
            .await?;
        if reply.ok {
            Ok(())
        } else if reply.code.as_deref() == Some(NO_LISTENER) {
            bail!("no UI listening")
        } else {
            bail!("deliver failed: {}", reply.failure())
        }
    }
}
