//! Accept loop for the server runtime.

use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::sleep,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::backoff::BackoffConfig;
use crate::{
    pipeline::Pipeline,
    server::{ConnectionSettings, connection::spawn_connection_task},
};

/// Source of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

#[derive(Debug)]
pub(in crate::server) struct AcceptLoopOptions {
    pub settings: ConnectionSettings,
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
    pub backoff: BackoffConfig,
}

/// Accept connections until `shutdown` is cancelled.
///
/// Each accepted stream is handed to its own task, tracked by `tracker` so
/// shutdown can wait for in-flight connections. Accept failures sleep for the
/// current back-off delay, which doubles up to `backoff.max_delay` and resets
/// after the next successful accept.
pub(in crate::server) async fn accept_loop<L>(
    listener: Arc<L>,
    pipeline: Arc<Pipeline>,
    options: AcceptLoopOptions,
) where
    L: AcceptListener + 'static,
{
    let AcceptLoopOptions {
        settings,
        shutdown,
        tracker,
        backoff,
    } = options;
    let backoff = backoff.normalized();
    let mut delay = backoff.initial_delay;

    loop {
        select! {
            biased;

            () = shutdown.cancelled() => break,
            res = listener.accept() => match res {
                Ok((stream, _)) => {
                    spawn_connection_task(stream, Arc::clone(&pipeline), settings, &tracker);
                    delay = backoff.initial_delay;
                }
                Err(error) => {
                    let local_addr = listener.local_addr().ok();
                    tracing::error!(%error, ?local_addr, "TCP accept error");
                    crate::metrics::inc_errors();
                    sleep(delay).await;
                    delay = backoff.next_delay(delay);
                }
            },
        }
    }
}

