pub mod pool;
pub mod shutdown;
mod worker;

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinSet,
};
use tracing::Instrument;

use crate::{
    config::ServerConfig,
    dispatcher::Dispatcher,
    inventory::{Inventory, InventoryError},
    protocol::{Connection, Response},
};

pub use pool::{Pool, Slot, SlotState};
pub use shutdown::{Shutdown, ShutdownListener, ShutdownReason};
pub use worker::{REASON_IDLE, REASON_TOO_LONG};

pub const REASON_SERVER_FULL: &str = "Server full";

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("failed to accept a connection: {0}")]
    Accept(#[source] io::Error),

    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

/// The listening half of the ticket server
///
/// owns the inventory, the connection pool and the shutdown signal that
/// every worker spawned by [`Server::run`] shares.
pub struct Server {
    listener: TcpListener,
    inventory: Arc<Inventory>,
    pool: Arc<Pool>,
    shutdown: Shutdown,
    idle_timeout: Option<Duration>,
    drain_timeout: Duration,
}

impl Server {
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let inventory = Arc::new(Inventory::create(config.rows, config.cols)?);

        let addr = config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            inventory,
            pool: Pool::new(config.max_connections),
            shutdown: Shutdown::new(),
            idle_timeout: config.idle_timeout(),
            drain_timeout: config.drain_timeout(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn inventory(&self) -> Arc<Inventory> {
        self.inventory.clone()
    }

    pub fn pool(&self) -> Arc<Pool> {
        self.pool.clone()
    }

    /// A handle that can stop the server from the outside
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Accepts connections until the shutdown signal fires
    ///
    /// once it does, every worker is given `drain_timeout` to say goodbye
    /// before being aborted.
    pub async fn run(self) -> Result<(), ServerError> {
        let span = tracing::info_span!("host");
        self.serve().instrument(span).await
    }

    async fn serve(self) -> Result<(), ServerError> {
        let (rows, cols) = self.inventory.dimensions();
        match self.listener.local_addr() {
            Ok(addr) => tracing::info!(
                "listening on {} with {} slots, selling a {}x{} seat map",
                addr,
                self.pool.capacity(),
                rows,
                cols
            ),
            Err(err) => tracing::warn!("failed to resolve the local address: {}", err),
        }

        let dispatcher = Dispatcher::new(self.inventory.clone());
        let mut signal = self.shutdown.subscribe();
        let mut workers = JoinSet::new();
        let mut failure = None;

        let reason = loop {
            tokio::select! {
                biased;

                reason = signal.recv() => break reason,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.admit(stream, addr, &dispatcher, &mut workers).await,
                    Err(err) => {
                        tracing::error!("failed to accept a connection: {}", err);
                        failure = Some(err);
                        self.shutdown.trigger(ShutdownReason::AcceptFailed);
                    }
                },
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(err) = joined {
                        tracing::warn!("worker terminated abnormally: {}", err);
                    }
                }
            }
        };

        tracing::info!("shutting down: {:?}", reason);
        drop(self.listener);

        let drained = tokio::time::timeout(self.drain_timeout, async {
            while let Some(joined) = workers.join_next().await {
                if let Err(err) = joined {
                    tracing::warn!("worker terminated abnormally: {}", err);
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!("aborting {} workers that didn't finish in time", workers.len());
            workers.abort_all();
            while workers.join_next().await.is_some() {}
        }

        tracing::info!(
            "sold {} out of {} seats",
            self.inventory.sold_count(),
            self.inventory.total()
        );

        match failure {
            Some(err) => Err(ServerError::Accept(err)),
            None => Ok(()),
        }
    }

    // hands the connection to a new worker, or turns it away when every slot is taken
    async fn admit(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        dispatcher: &Dispatcher,
        workers: &mut JoinSet<()>,
    ) {
        let conn = match Connection::new(stream) {
            Ok(conn) => conn,
            Err(err) => {
                tracing::warn!("dropping connection from {}: {}", addr, err);
                return;
            }
        };

        let Some(slot) = self.pool.try_acquire() else {
            tracing::warn!("server is full, turning away {}", addr);
            reject(conn).await;
            return;
        };

        tracing::info!("assigning slot #{} to {}", slot.index(), addr);
        let span = tracing::info_span!("client", id = slot.index(), peer = %addr);
        workers.spawn(
            worker::serve(
                conn,
                slot,
                dispatcher.clone(),
                self.shutdown.clone(),
                self.idle_timeout,
            )
            .instrument(span),
        );
    }
}

async fn reject(mut conn: Connection) {
    if let Err(err) = conn.send(&Response::disconnect(REASON_SERVER_FULL)).await {
        tracing::debug!("failed to notify {}: {}", conn.peer_addr(), err);
    }

    if let Err(err) = conn.shutdown().await {
        tracing::debug!("failed to shutdown the connection: {}", err);
    }
}
