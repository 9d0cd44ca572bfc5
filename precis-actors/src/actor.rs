use anyhow::{anyhow, bail, Result};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
};

/// A mailbox-driven actor. Messages are handled one at a time, in order.
#[async_trait::async_trait]
pub trait Actor: Send + Sized + 'static {
    type Msg: Send + 'static;

    /// Returning `Err` stops the actor and surfaces the error from its task.
    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()>;
}

/// Per-actor context passed to every `handle` call.
///
/// Keeps a weak sender only: once every outside `Addr` is gone the mailbox
/// closes and the actor winds down.
pub struct Context<A: Actor> {
    mailbox: mpsc::WeakSender<A::Msg>,
    stop: bool,
}

impl<A: Actor> Context<A> {
    /// Address of this actor for work that reports back later, e.g. a
    /// spawned network call. `None` when the actor is already orphaned.
    pub fn addr(&self) -> Option<Addr<A>> {
        self.mailbox.upgrade().map(Addr)
    }

    /// Stop after the current message.
    pub fn stop(&mut self) {
        self.stop = true;
    }
}

pub struct Addr<A: Actor>(mpsc::Sender<A::Msg>);

impl<A: Actor> Clone for Addr<A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<A: Actor> Addr<A> {
    /// Waits for mailbox space. Hands the message back if the actor is gone.
    pub async fn send(&self, msg: A::Msg) -> std::result::Result<(), A::Msg> {
        self.0.send(msg).await.map_err(|e| e.0)
    }

    pub fn try_send(&self, msg: A::Msg) -> std::result::Result<(), A::Msg> {
        self.0.try_send(msg).map_err(|e| e.into_inner())
    }

    /// Request/response: build a message around a reply channel and wait
    /// for the answer.
    ///
    /// ```
    /// # use anyhow::Result;
    /// # use async_trait::async_trait;
    /// # use precis_actors::actor::{spawn_actor, Actor, Context};
    /// # use tokio::sync::oneshot;
    /// struct Doubler;
    ///
    /// #[async_trait]
    /// impl Actor for Doubler {
    ///     type Msg = (u32, oneshot::Sender<u32>);
    ///     async fn handle(&mut self, (n, reply): Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
    ///         let _ = reply.send(n * 2);
    ///         Ok(())
    ///     }
    /// }
    ///
    /// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
    /// let doubler = spawn_actor(Doubler, 4).addr;
    /// assert_eq!(doubler.ask(|reply| (21, reply)).await.unwrap(), 42);
    /// # });
    /// ```
    pub async fn ask<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> A::Msg) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        if self.0.send(make(tx)).await.is_err() {
            bail!("{} mailbox closed", actor_name::<A>());
        }
        rx.await
            .map_err(|_| anyhow!("{} dropped the reply", actor_name::<A>()))
    }

    pub fn capacity(&self) -> usize {
        self.0.max_capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

pub struct ActorHandle<A: Actor> {
    pub addr: Addr<A>,
    pub task: JoinHandle<Result<()>>,
}

/// Spawn `actor` on the current runtime with a mailbox of `capacity`.
///
/// The actor stops when `handle` fails, when `ctx.stop()` is called, or
/// when every `Addr` has been dropped.
pub fn spawn_actor<A: Actor>(actor: A, capacity: usize) -> ActorHandle<A> {
    spawn_actor_with_shutdown(actor, capacity, None)
}

/// Like [`spawn_actor`], additionally stopping when `shutdown` fires. A
/// pending shutdown wins over queued messages.
pub fn spawn_actor_with_shutdown<A: Actor>(
    actor: A,
    capacity: usize,
    shutdown: Option<broadcast::Receiver<()>>,
) -> ActorHandle<A> {
    let (tx, rx) = mpsc::channel::<A::Msg>(capacity.max(1));
    let ctx = Context {
        mailbox: tx.downgrade(),
        stop: false,
    };
    let task = tokio::spawn(run(actor, rx, ctx, shutdown));
    ActorHandle {
        addr: Addr(tx),
        task,
    }
}

fn actor_name<A>() -> &'static str {
    let full = std::any::type_name::<A>();
    full.rsplit("::").next().unwrap_or(full)
}

async fn run<A: Actor>(
    mut actor: A,
    mut mailbox: mpsc::Receiver<A::Msg>,
    mut ctx: Context<A>,
    mut shutdown: Option<broadcast::Receiver<()>>,
) -> Result<()> {
    let name = actor_name::<A>();
    let mut handled: u64 = 0;

    let reason = loop {
        let next = match shutdown.as_mut() {
            Some(signal) => tokio::select! {
                biased;
                _ = signal.recv() => break "shutdown",
                msg = mailbox.recv() => msg,
            },
            None => mailbox.recv().await,
        };
        let Some(msg) = next else {
            break "mailbox closed";
        };

        if let Err(e) = actor.handle(msg, &mut ctx).await {
            tracing::error!(actor = name, handled, error = ?e, "actor.failed");
            return Err(e);
        }
        handled += 1;
        if ctx.stop {
            break "stop requested";
        }
    };

    tracing::debug!(actor = name, handled, reason, "actor.stopped");
    Ok(())
}
