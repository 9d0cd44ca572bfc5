//! Shutdown signal plus the set of running actor tasks.
//!
//! Detached assistant calls are not tracked here; their results are dropped
//! once the receiving actor has stopped.
use anyhow::{anyhow, Result};
use std::future::Future;
use tokio::{sync::broadcast, task::JoinSet};

pub struct ActorSystem {
    tasks: JoinSet<(String, Result<()>)>,
    shutdown: broadcast::Sender<()>,
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorSystem {
    pub fn new() -> Self {
        let (shutdown, _) = broadcast::channel(4);
        Self {
            tasks: JoinSet::new(),
            shutdown,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Run `task` under `name` until it ends or the system is shut down.
    pub fn track<F>(&mut self, name: &str, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.to_string();
        self.tasks.spawn(async move { (name, task.await) });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Signal every subscriber, then join all tracked tasks. Reports the
    /// first failure, naming the task, once everything has stopped.
    pub async fn graceful_shutdown(mut self) -> Result<()> {
        let _ = self.shutdown.send(());
        let mut failed = None;
        while let Some(joined) = self.tasks.join_next().await {
            let err = match joined {
                Ok((_, Ok(()))) => continue,
                Ok((name, Err(e))) => e.context(format!("{name} failed")),
                Err(e) => anyhow!("actor task aborted: {e}"),
            };
            tracing::warn!(error = ?err, "actor_system.task_failed");
            failed.get_or_insert(err);
        }
        failed.map_or(Ok(()), Err)
    }
}
