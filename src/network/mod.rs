//! Peer-to-peer networking
//!
//! JSON envelopes over TCP: block and transaction gossip, chain sync by
//! height and peer exchange.

pub mod message;
pub mod node;
pub mod peers;

pub use message::{BlocksRequest, Envelope, MessageType, PROTOCOL_VERSION};
pub use node::{send_envelope, Node};
pub use peers::Peers;
