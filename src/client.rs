use std::{
    io::{self, Write},
    net::SocketAddr,
    time::Duration,
};

use rand::Rng;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    config::ClientSettings,
    protocol::{Connection, ConnectionError, DecodeError, Request, Response, Seat},
};

pub const RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect { addr: SocketAddr, source: io::Error },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("the server sent an invalid message: {0}")]
    Decode(#[from] DecodeError),

    #[error("unexpected response: {0}")]
    Unexpected(Response),

    #[error("the server closed the connection")]
    Closed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ClientError {
    // the server went away, which ends a session rather than failing it
    fn is_hangup(&self) -> bool {
        match self {
            ClientError::Closed => true,
            ClientError::Connection(ConnectionError::Io(err)) => matches!(
                err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// A connection to the ticket server
pub struct Client {
    conn: Connection,
}

impl Client {
    /// Connects to the server, retrying once per second up to `settings.retries` times
    pub async fn connect(settings: &ClientSettings) -> Result<Self, ClientError> {
        let addr = settings.server_addr();
        let mut retries = settings.retries;

        loop {
            match Connection::connect(addr).await {
                Ok(conn) => {
                    tracing::info!("connected to {}", addr);
                    return Ok(Self { conn });
                }
                Err(source) if retries == 0 => return Err(ClientError::Connect { addr, source }),
                Err(err) => {
                    tracing::warn!("failed to connect to {} ({}), retrying in 1 second", addr, err);
                    retries -= 1;
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    pub async fn send(&mut self, request: &Request) -> Result<(), ClientError> {
        tracing::debug!("sending: {}", request);
        Ok(self.conn.send(request).await?)
    }

    /// Waits for the next message from the server, None once it has hung up
    pub async fn recv(&mut self) -> Result<Option<Response>, ClientError> {
        let response = self.conn.read_message::<Response>().await?.transpose()?;
        if let Some(response) = &response {
            tracing::debug!("received: {}", response);
        }

        Ok(response)
    }

    pub async fn request(&mut self, request: &Request) -> Result<Response, ClientError> {
        self.send(request).await?;
        self.recv().await?.ok_or(ClientError::Closed)
    }

    pub async fn close(self) -> Result<(), ClientError> {
        Ok(self.conn.shutdown().await?)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AutomaticReport {
    pub attempts: usize,
    pub purchased: usize,
    pub failed: usize,
}

/// Buys random seats until the server sends us away
pub async fn run_automatic<R: Rng>(
    client: &mut Client,
    interval: Duration,
    rng: &mut R,
) -> Result<AutomaticReport, ClientError> {
    let mut report = AutomaticReport::default();

    let (rows, cols) = match client.request(&Request::Availability).await {
        Ok(Response::TicketRange {
            rows,
            cols,
            available,
        }) => {
            tracing::info!("{}x{} seat map with {} seats left", rows, cols, available);
            (rows, cols)
        }
        Ok(Response::Disconnect { reason }) => {
            tracing::info!("server requested us to disconnect: {}", reason);
            return Ok(report);
        }
        Ok(other) => return Err(ClientError::Unexpected(other)),
        Err(err) if err.is_hangup() => {
            tracing::info!("server closed the connection");
            return Ok(report);
        }
        Err(err) => return Err(err),
    };

    if rows == 0 || cols == 0 {
        return Ok(report);
    }

    loop {
        let seat = Seat::new(rng.gen_range(0..rows) as i64, rng.gen_range(0..cols) as i64);
        tracing::info!("buying ticket {}", seat);
        report.attempts += 1;

        match client.request(&Request::Purchase(seat)).await {
            Ok(Response::TxSuccess { reason }) => {
                report.purchased += 1;
                tracing::info!("purchase succeeded: {}", reason);
            }
            Ok(Response::TxFailed { reason }) | Ok(Response::TicketInvalid { reason }) => {
                report.failed += 1;
                tracing::info!("purchase failed: {}", reason);
            }
            Ok(Response::Disconnect { reason }) => {
                tracing::info!("server requested us to disconnect: {}", reason);
                break;
            }
            Ok(other) => tracing::warn!("unexpected response: {}", other),
            Err(err) if err.is_hangup() => {
                tracing::info!("server closed the connection");
                break;
            }
            Err(err) => return Err(err),
        }

        tokio::time::sleep(interval).await;
    }

    Ok(report)
}

/// Renders a server message for a person at the terminal
pub fn describe(response: &Response) -> String {
    match response {
        Response::Disconnect { reason } => format!("Server requested us to disconnect: {}", reason),
        Response::MsgInvalid { reason } => format!("Server could not read our message: {}", reason),
        Response::TicketRange {
            rows,
            cols,
            available,
        } => format!(
            "Seat map is {} rows by {} columns, {} seats available",
            rows, cols, available
        ),
        Response::TicketInvalid { reason } => format!("Invalid ticket: {}", reason),
        Response::TicketAvailable => "Ticket is available".to_owned(),
        Response::TicketNotAvailable => "Ticket is not available".to_owned(),
        Response::TxFailed { reason } => format!("Purchase failed: {}", reason),
        Response::TxSuccess { reason } => format!("Purchase succeeded: {}", reason),
    }
}

const MENU: &str = "\n\
    1. Seating information\n\
    2. Check a seat\n\
    3. Purchase a seat\n\
    4. Disconnect\n\
    > ";

fn prompt(text: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()
}

fn parse_seat(line: &str) -> Option<Seat> {
    let mut parts = line.split_whitespace().map(str::parse::<i64>);
    match (parts.next(), parts.next()) {
        (Some(Ok(row)), Some(Ok(col))) => Some(Seat::new(row, col)),
        _ => None,
    }
}

/// Drives the client from a menu on the terminal
///
/// the session ends on request, on end of input, or when the server
/// disconnects us on its own.
pub async fn run_manual(client: &mut Client) -> Result<(), ClientError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt(MENU)?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            pushed = client.recv() => match pushed {
                Ok(Some(response)) => {
                    println!("\n{}", describe(&response));
                    if matches!(response, Response::Disconnect { .. }) {
                        return Ok(());
                    }
                    continue;
                }
                Ok(None) => {
                    println!("\nServer closed the connection");
                    return Ok(());
                }
                Err(err) if err.is_hangup() => return Ok(()),
                Err(err) => return Err(err),
            },
        };

        let Some(line) = line else {
            // stdin is gone, leave politely
            client.send(&Request::Disconnect).await?;
            return Ok(());
        };

        let request = match line.trim() {
            "1" => Request::Availability,
            choice @ ("2" | "3") => {
                prompt("Enter the row and column: ")?;
                let Some(line) = lines.next_line().await? else {
                    continue;
                };
                let Some(seat) = parse_seat(&line) else {
                    println!("Expected two numbers, e.g. `2 3`");
                    continue;
                };

                match choice {
                    "2" => Request::Status(seat),
                    _ => Request::Purchase(seat),
                }
            }
            "4" => Request::Disconnect,
            other => {
                println!("Unknown option: {:?}", other);
                continue;
            }
        };

        let response = match client.request(&request).await {
            Ok(response) => response,
            Err(err) if err.is_hangup() => {
                println!("Server closed the connection");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        println!("{}", describe(&response));
        if matches!(response, Response::Disconnect { .. }) {
            return Ok(());
        }
    }
}
