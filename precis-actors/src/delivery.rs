//! Best-effort delivery of UI messages with a bounded retry.
//!
//! A UI surface may still be loading when the orchestrator wants to talk to
//! it, so each message is retried a fixed number of times at a fixed
//! interval. Running out of attempts is logged and the message dropped; the
//! next message gets its own full set of attempts. Each attempt is also capped
//! by `attempt_timeout`, so a sink that never answers costs at most
//! `attempts * (attempt_timeout + interval)` before later messages move on.
use crate::actor::{Actor, Context};
use crate::UiMessage;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Where UI messages go. An `Err` means "nobody took it yet" and is retried.
#[async_trait]
pub trait UiSink: Send + Sync {
    async fn deliver(&self, message: &UiMessage) -> Result<()>;
}

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub attempts: u32,
    pub interval: Duration,
    /// Longest wait for the sink to accept one attempt.
    pub attempt_timeout: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(100))
    }
}

impl DeliveryPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            interval,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Exhausted { attempts: u32 },
}

/// Try `message` until it is accepted or the policy runs out.
pub async fn deliver_with_retry(
    sink: &dyn UiSink,
    message: &UiMessage,
    policy: DeliveryPolicy,
) -> DeliveryOutcome {
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        let result = tokio::time::timeout(policy.attempt_timeout, sink.deliver(message))
            .await
            .unwrap_or_else(|_| Err(anyhow::anyhow!("no answer within {:?}", policy.attempt_timeout)));
        match result {
            Ok(()) => return DeliveryOutcome::Delivered { attempts: attempt },
            Err(e) => {
                tracing::debug!(
                    action = message.action(),
                    attempt,
                    attempts,
                    error = %e,
                    "delivery.attempt_failed"
                );
                if attempt < attempts {
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }
    }
    DeliveryOutcome::Exhausted { attempts }
}

pub enum NotifierMsg {
    Deliver(UiMessage),
    /// Replies once every message queued before it has been handled.
    Flush { reply: oneshot::Sender<()> },
}

/// Delivers UI messages one at a time in arrival order.
pub struct Notifier {
    sink: Arc<dyn UiSink>,
    policy: DeliveryPolicy,
    delivered: u64,
    dropped: u64,
}

impl Notifier {
    pub fn new(sink: Arc<dyn UiSink>, policy: DeliveryPolicy) -> Self {
        Self {
            sink,
            policy,
            delivered: 0,
            dropped: 0,
        }
    }
}

#[async_trait]
impl Actor for Notifier {
    type Msg = NotifierMsg;

    async fn handle(&mut self, msg: Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            NotifierMsg::Deliver(message) => {
                match deliver_with_retry(self.sink.as_ref(), &message, self.policy).await {
                    DeliveryOutcome::Delivered { attempts } => {
                        self.delivered += 1;
                        tracing::debug!(
                            action = message.action(),
                            attempts,
                            delivered = self.delivered,
                            "notifier.delivered"
                        );
                    }
                    DeliveryOutcome::Exhausted { attempts } => {
                        self.dropped += 1;
                        tracing::warn!(
                            action = message.action(),
                            attempts,
                            dropped = self.dropped,
                            "notifier.dropped"
                        );
                    }
                }
            }
            NotifierMsg::Flush { reply } => {
                let _ = reply.send(());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::spawn_actor;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Rejects the first `fail_first` attempts, then records deliveries.
    struct FlakyUi {
        fail_first: u32,
        calls: AtomicU32,
        received: Mutex<Vec<UiMessage>>,
    }

    impl FlakyUi {
        fn new(fail_first: u32) -> Self {
            Self {
                fail_first,
                calls: AtomicU32::new(0),
                received: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl UiSink for FlakyUi {
        async fn deliver(&self, message: &UiMessage) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_first {
                anyhow::bail!("no listener");
            }
            self.received.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn fast(attempts: u32) -> DeliveryPolicy {
        DeliveryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn delivers_exactly_once_after_failures() {
        let ui = FlakyUi::new(4);
        let outcome = deliver_with_retry(&ui, &UiMessage::ShowLoading, fast(5)).await;
        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 5 });
        assert_eq!(*ui.received.lock().unwrap(), vec![UiMessage::ShowLoading]);
    }

    #[tokio::test]
    async fn exhaustion_returns_without_delivering() {
        let ui = FlakyUi::new(u32::MAX);
        let outcome = deliver_with_retry(&ui, &UiMessage::ShowLoading, fast(3)).await;
        assert_eq!(outcome, DeliveryOutcome::Exhausted { attempts: 3 });
        assert_eq!(ui.calls.load(Ordering::SeqCst), 3);
        assert!(ui.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let ui = FlakyUi::new(0);
        let outcome = deliver_with_retry(
            &ui,
            &UiMessage::ApiKeyRequired,
            DeliveryPolicy {
                attempts: 0,
                interval: Duration::ZERO,
                attempt_timeout: Duration::from_secs(1),
            },
        )
        .await;
        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 1 });
    }

    /// Never answers, like a shim that stopped replying.
    struct SilentUi {
        calls: AtomicU32,
    }

    #[async_trait]
    impl UiSink for SilentUi {
        async fn deliver(&self, _message: &UiMessage) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn silent_sink_costs_one_attempt_timeout_per_try() {
        let ui = SilentUi {
            calls: AtomicU32::new(0),
        };
        let policy = DeliveryPolicy::new(3, Duration::from_millis(10))
            .with_attempt_timeout(Duration::from_millis(20));
        let started = std::time::Instant::now();
        let outcome = deliver_with_retry(&ui, &UiMessage::ShowLoading, policy).await;

        assert_eq!(outcome, DeliveryOutcome::Exhausted { attempts: 3 });
        assert_eq!(ui.calls.load(Ordering::SeqCst), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3 * 20 + 2 * 10), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
    }

    #[tokio::test]
    async fn notifier_survives_exhaustion_and_keeps_order() {
        // Three attempts for the first message, all rejected.
        let ui = Arc::new(FlakyUi::new(3));
        let handle = spawn_actor(Notifier::new(ui.clone(), fast(3)), 8);

        let summary = UiMessage::DisplaySummary {
            title: "T".into(),
            summary: "S".into(),
        };
        for msg in [
            UiMessage::ShowLoading,
            summary.clone(),
            UiMessage::ApiKeyRequired,
        ] {
            handle.addr.send(NotifierMsg::Deliver(msg)).await.ok().unwrap();
        }
        handle
            .addr
            .ask(|reply| NotifierMsg::Flush { reply })
            .await
            .unwrap();

        assert_eq!(
            *ui.received.lock().unwrap(),
            vec![summary, UiMessage::ApiKeyRequired]
        );
    }
}
