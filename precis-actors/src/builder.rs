use crate::actor::{spawn_actor_with_shutdown, Actor, Addr};
use crate::system::ActorSystem;
use anyhow::Result;
use std::future::Future;

/// Spawns the host's actors under one shutdown signal.
#[derive(Default)]
pub struct Builder {
    sys: ActorSystem,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `actor` with a mailbox of `mailbox` messages and track its task
    /// under `name`.
    pub fn spawn<A: Actor>(&mut self, name: &str, mailbox: usize, actor: A) -> Addr<A> {
        let handle = spawn_actor_with_shutdown(actor, mailbox, Some(self.sys.subscribe()));
        self.sys.track(name, async move { handle.task.await? });
        tracing::debug!(actor = name, mailbox, "builder.spawned");
        handle.addr
    }

    pub fn running(&self) -> usize {
        self.sys.len()
    }

    pub async fn graceful_shutdown(self) -> Result<()> {
        self.sys.graceful_shutdown().await
    }

    /// Drive `work` (e.g. the stdin reader) until it finishes or CTRL-C
    /// arrives, then stop every actor. A failure of `work` wins over actor
    /// failures.
    pub async fn run_until<F>(self, work: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        let outcome = tokio::select! {
            res = work => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("builder.ctrl_c");
                Ok(())
            }
        };
        let stopped = self.graceful_shutdown().await;
        outcome.and(stopped)
    }
}
