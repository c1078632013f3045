use std::{future, time::Duration};

use crate::{
    dispatcher::{Dispatcher, Next},
    protocol::{Connection, ConnectionError, Request, Response},
};

use super::{
    pool::Slot,
    shutdown::{Shutdown, ShutdownReason},
};

pub const REASON_IDLE: &str = "Idle timeout";
pub const REASON_TOO_LONG: &str = "Message too long";

/// Why a connection left the active state
#[derive(Debug)]
enum Drain {
    PeerClosed,
    Requested,
    Shutdown(ShutdownReason),
    Idle,
    TooLong,
    Transport(ConnectionError),
}

impl Drain {
    // the last message the client gets before the connection closes
    fn farewell(&self) -> Option<Response> {
        match self {
            Drain::Shutdown(reason) => Some(Response::disconnect(reason.message())),
            Drain::Idle => Some(Response::disconnect(REASON_IDLE)),
            Drain::TooLong => Some(Response::msg_invalid(REASON_TOO_LONG)),
            // the disconnect reply has already been sent
            Drain::Requested => None,
            Drain::PeerClosed | Drain::Transport(_) => None,
        }
    }
}

async fn idle(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => future::pending().await,
    }
}

/// Serves a single client until it leaves or the server shuts down
///
/// the slot is held for the whole lifetime of the connection and released
/// once the socket has been closed.
pub async fn serve(
    mut conn: Connection,
    slot: Slot,
    dispatcher: Dispatcher,
    shutdown: Shutdown,
    idle_timeout: Option<Duration>,
) {
    let mut listener = shutdown.subscribe();
    tracing::info!("begin handling requests");

    let cause = loop {
        let read = tokio::select! {
            // a request that is already waiting still gets its answer
            biased;

            read = conn.read_line() => read,
            reason = listener.recv() => break Drain::Shutdown(reason),
            _ = idle(idle_timeout) => break Drain::Idle,
        };

        let line = match read {
            Ok(Some(line)) => line,
            Ok(None) => break Drain::PeerClosed,
            Err(ConnectionError::TooLong) => break Drain::TooLong,
            Err(err) => break Drain::Transport(err),
        };
        tracing::debug!("received: {:?}", line);

        let outcome = match line.parse::<Request>() {
            Ok(request) => dispatcher.dispatch(request),
            Err(err) => {
                tracing::debug!("invalid message: {}", err);
                dispatcher.reject(&err)
            }
        };

        // other clients are told to leave while this one gets its receipt
        if outcome.next == Next::SoldOut && shutdown.trigger(ShutdownReason::SoldOut) {
            tracing::info!("all seats have been sold, shutting down");
        }

        tracing::debug!("responded: {}", outcome.response);
        if let Err(err) = conn.send(&outcome.response).await {
            break Drain::Transport(err);
        }

        if outcome.next == Next::Disconnect {
            break Drain::Requested;
        }

        if let Some(reason) = listener.triggered() {
            break Drain::Shutdown(reason);
        }
    };

    slot.drain();
    match &cause {
        Drain::Transport(err) => tracing::warn!("connection failed: {}", err),
        cause => tracing::info!("closing connection: {:?}", cause),
    }

    if let Some(farewell) = cause.farewell() {
        tracing::debug!("responded: {}", farewell);
        if let Err(err) = conn.send(&farewell).await {
            tracing::debug!("failed to say goodbye: {}", err);
        }
    }

    if let Err(err) = conn.shutdown().await {
        tracing::debug!("failed to shutdown the connection: {}", err);
    }

    drop(slot);
}
