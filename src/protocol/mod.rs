pub mod connection;
pub mod message;

pub use connection::{Connection, ConnectionError, MAX_MESSAGE_SIZE};
pub use message::{message_id, DecodeError, Request, Response, Seat, DELIMITER};
