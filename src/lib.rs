//! Filtering DNS relay: blacklisted names are answered locally, everything
//! else is forwarded to a single upstream resolver over UDP.

pub mod blacklist;
pub mod config;
pub mod dns_header;
pub mod dns_message;
pub mod dns_question;
pub mod error;
pub mod forwarder;
pub mod local;
pub mod server;
