use crate::core::{Block, Transaction};
use crate::error::{BlockchainError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    NewBlock,
    NewTransaction,
    GetBlocks,
    Blocks,
    GetPeers,
    Peers,
}

/// Body of a GET_BLOCKS request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocksRequest {
    /// Send every block with an index above this
    pub from_height: i64,
}

/// Wire envelope; `data` is decoded according to `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub data: Value,
    pub from: String,
    pub version: String,
}

impl Envelope {
    fn new<T: Serialize>(message_type: MessageType, data: &T, from: &str) -> Result<Envelope> {
        Ok(Envelope {
            message_type,
            data: serde_json::to_value(data)?,
            from: from.to_string(),
            version: PROTOCOL_VERSION.to_string(),
        })
    }

    pub fn new_block(block: &Block, from: &str) -> Result<Envelope> {
        Self::new(MessageType::NewBlock, block, from)
    }

    pub fn new_transaction(tx: &Transaction, from: &str) -> Result<Envelope> {
        Self::new(MessageType::NewTransaction, tx, from)
    }

    pub fn get_blocks(from_height: i64, from: &str) -> Result<Envelope> {
        Self::new(MessageType::GetBlocks, &BlocksRequest { from_height }, from)
    }

    pub fn blocks(blocks: &[Block], from: &str) -> Result<Envelope> {
        Self::new(MessageType::Blocks, &blocks, from)
    }

    pub fn get_peers(from: &str) -> Result<Envelope> {
        Self::new(MessageType::GetPeers, &Value::Null, from)
    }

    pub fn peers(peers: &[String], from: &str) -> Result<Envelope> {
        Self::new(MessageType::Peers, &peers, from)
    }

    /// Decode `data` into the payload type expected for this message
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            BlockchainError::Serialization(format!(
                "Malformed {:?} payload from {}: {e}",
                self.message_type, self.from
            ))
        })
    }
}
