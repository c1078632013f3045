use std::sync::Arc;

use crate::{
    inventory::{Inventory, PurchaseResult},
    protocol::{DecodeError, Request, Response, Seat},
};

pub const REASON_CLIENT_DISCONNECT: &str = "Client requested disconnection.";
pub const REASON_UNKNOWN_REQUEST: &str = "Unknown request id";
pub const REASON_MALFORMED: &str = "Malformed message";
pub const REASON_INVALID_SEAT: &str = "Invalid row or column";
pub const REASON_ALREADY_SOLD: &str = "Ticket already purchased";
pub const REASON_PURCHASED: &str = "Ticket purchased";

/// What the connection should do once the response has been sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Continue,
    // the client asked to leave
    Disconnect,
    // the last seat was just sold
    SoldOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub response: Response,
    pub next: Next,
}

impl Outcome {
    fn reply(response: Response) -> Self {
        Self {
            response,
            next: Next::Continue,
        }
    }
}

/// Executes client requests against the shared inventory
///
/// holds no per-connection state, cloning it only clones the inventory handle.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    inventory: Arc<Inventory>,
}

impl Dispatcher {
    pub fn new(inventory: Arc<Inventory>) -> Self {
        Self { inventory }
    }

    pub fn dispatch(&self, request: Request) -> Outcome {
        match request {
            Request::Disconnect => Outcome {
                response: Response::disconnect(REASON_CLIENT_DISCONNECT),
                next: Next::Disconnect,
            },
            Request::Availability => {
                let (rows, cols) = self.inventory.dimensions();
                Outcome::reply(Response::TicketRange {
                    rows,
                    cols,
                    available: self.inventory.available(),
                })
            }
            Request::Status(Seat { row, col }) => match self.inventory.is_sold(row, col) {
                Ok(false) => Outcome::reply(Response::TicketAvailable),
                Ok(true) => Outcome::reply(Response::TicketNotAvailable),
                Err(err) => {
                    tracing::debug!("{}", err);
                    Outcome::reply(Response::ticket_invalid(REASON_INVALID_SEAT))
                }
            },
            Request::Purchase(seat) => self.purchase(seat),
        }
    }

    /// Builds the reply for a message that could not be decoded
    ///
    /// the connection always stays open after a decoding failure.
    pub fn reject(&self, err: &DecodeError) -> Outcome {
        let response = match err {
            DecodeError::MissingIdentifier | DecodeError::NonNumericIdentifier(_) => {
                Response::msg_invalid(REASON_MALFORMED)
            }
            DecodeError::UnknownIdentifier(_) => Response::msg_invalid(REASON_UNKNOWN_REQUEST),
            DecodeError::MissingArgument(name) => {
                Response::ticket_invalid(format!("Missing {} argument", name))
            }
            DecodeError::InvalidArgument { .. } => Response::ticket_invalid(REASON_INVALID_SEAT),
        };

        Outcome::reply(response)
    }

    fn purchase(&self, seat: Seat) -> Outcome {
        match self.inventory.purchase(seat.row, seat.col) {
            PurchaseResult::OutOfRange => {
                tracing::debug!("seat {} is out of range", seat);
                Outcome::reply(Response::ticket_invalid(REASON_INVALID_SEAT))
            }
            PurchaseResult::AlreadySold => {
                tracing::debug!("seat {} is already taken", seat);
                Outcome::reply(Response::tx_failed(REASON_ALREADY_SOLD))
            }
            PurchaseResult::Success => {
                tracing::info!("seat {} has been purchased", seat);
                tracing::debug!("\n{}", self.inventory.snapshot());

                // several final purchases may all observe zero, triggering shutdown is idempotent
                let next = match self.inventory.available() {
                    0 => Next::SoldOut,
                    _ => Next::Continue,
                };

                Outcome {
                    response: Response::tx_success(REASON_PURCHASED),
                    next,
                }
            }
        }
    }
}
