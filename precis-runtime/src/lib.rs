//! Tokio runtime ownership for the host process.
//!
//! The browser starts one host per connection and the host does little CPU
//! work, so the default is a current-thread runtime. A worker count switches
//! to the multi-threaded scheduler.
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

pub struct HostRuntime {
    runtime: Runtime,
    flavor: &'static str,
}

impl HostRuntime {
    /// Build the runtime. `None` gives a current-thread scheduler.
    ///
    /// ```
    /// use precis_runtime::HostRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = HostRuntime::build("doctest-host", None).expect("runtime builds");
    /// assert_eq!(runtime.block_on(async { 2 + 2 }), 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let (mut builder, flavor) = match worker_threads {
            None => (Builder::new_current_thread(), "current_thread"),
            Some(n) => {
                let mut multi = Builder::new_multi_thread();
                multi.worker_threads(n.max(1));
                (multi, "multi_thread")
            }
        };
        let runtime = builder
            .enable_all()
            .thread_name(thread_name)
            .build()
            .with_context(|| format!("failed to build {flavor} runtime '{thread_name}'"))?;
        tracing::debug!(thread_name, flavor, ?worker_threads, "runtime.built");
        Ok(Self { runtime, flavor })
    }

    pub fn flavor(&self) -> &'static str {
        self.flavor
    }

    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Give tasks still running (detached assistant calls, the writer)
    /// `graceful` to finish, then drop them.
    pub fn shutdown(self, graceful: Duration) {
        tracing::debug!(flavor = self.flavor, ?graceful, "runtime.shutdown");
        self.runtime.shutdown_timeout(graceful);
    }
}
