//! A concurrent seat reservation server and its client
//!
//! clients speak a line based, `|` delimited protocol over TCP. every
//! connection is served by its own worker out of a bounded pool, and all
//! workers share a single seat map. the server shuts itself down once the
//! last seat has been sold.

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod inventory;
pub mod protocol;
pub mod server;
