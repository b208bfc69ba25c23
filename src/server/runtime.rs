//! Runtime control for [`GatewayServer`].

mod accept;
mod backoff;

use std::sync::Arc;

#[cfg(test)]
pub(super) use accept::MockAcceptListener;
pub(super) use accept::{AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use futures::Future;
use tokio::{select, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{Bound, GatewayServer, ServerError};

impl GatewayServer<Bound> {
    /// Run the server until Ctrl+C is received.
    ///
    /// # Errors
    ///
    /// Accept failures are retried with exponential back-off and do not
    /// surface as errors; the `Result` is reserved for start-up failures.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the server until the `shutdown` future resolves.
    ///
    /// Once `shutdown` resolves no new connections are accepted; connections
    /// already in flight run to completion before this returns.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tokio::sync::oneshot;
    /// use trackwire::{
    ///     config::GatewayConfig,
    ///     pipeline::{Collaborators, Pipeline},
    ///     server::GatewayServer,
    /// };
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = GatewayConfig::default();
    /// let pipeline = Pipeline::new(&config, Collaborators::http(&config)?);
    /// let server = GatewayServer::new(&config, pipeline).bind(config.listen_addr)?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let handle = tokio::spawn(server.run_with_shutdown(async {
    ///     let _ = rx.await;
    /// }));
    /// let _ = tx.send(());
    /// handle.await??;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Accept failures are retried with exponential back-off and do not
    /// surface as errors.
    pub async fn run_with_shutdown<S>(self, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send,
    {
        let GatewayServer {
            pipeline,
            settings,
            backoff_config,
            ready_tx,
            state: Bound { listener },
        } = self;
        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                %addr,
                buffer_size = settings.buffer_size,
                read_timeout = ?settings.read_timeout,
                read_mode = %settings.read_mode,
                "TCP server started"
            );
        }

        tracker.spawn(accept_loop(
            Arc::clone(&listener),
            pipeline,
            AcceptLoopOptions {
                settings,
                shutdown: shutdown_token.clone(),
                tracker: tracker.clone(),
                backoff: backoff_config,
            },
        ));

        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            tracing::warn!("failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => shutdown_token.cancel(),
            () = tracker.wait() => {},
        }

        tracker.close();
        tracker.wait().await;
        tracing::info!("TCP server stopped");
        Ok(())
    }
}
