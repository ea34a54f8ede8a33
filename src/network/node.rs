// A node speaks JSON envelopes over short-lived TCP connections: every send
// opens a connection, writes one or more envelopes and closes it. Replies go
// back the same way to the address in the envelope's `from` field.

use crate::context::ChainContext;
use crate::core::{Block, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::message::{BlocksRequest, Envelope, MessageType};
use crate::network::peers::{parse_socket_addr, Peers};
use log::{debug, error, info, warn};
use serde_json::Deserializer;
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TCP_WRITE_TIMEOUT: u64 = 5000;
const TCP_READ_TIMEOUT_SECS: u64 = 60;

pub struct Node {
    addr: String,
    context: ChainContext,
    peers: Peers,
}

impl Node {
    pub fn new(addr: &str, context: ChainContext) -> Node {
        Node {
            addr: addr.to_string(),
            context,
            peers: Peers::new(),
        }
    }

    pub fn get_addr(&self) -> &str {
        self.addr.as_str()
    }

    pub fn context(&self) -> &ChainContext {
        &self.context
    }

    pub fn peers(&self) -> &Peers {
        &self.peers
    }

    pub fn add_peer(&self, addr: &str) -> bool {
        if addr.is_empty() || addr == self.addr {
            return false;
        }
        let added = self.peers.add_peer(addr);
        if added {
            info!("Added peer {addr}");
        }
        added
    }

    /// Introduce ourselves to `peers`: ask for their peers and missing blocks
    pub fn bootstrap(&self, peers: &[String]) {
        let height = self.context.ledger().get_last_block().get_index();
        for peer in peers {
            self.add_peer(peer);
            let requests = [
                Envelope::get_peers(&self.addr),
                Envelope::get_blocks(height, &self.addr),
            ];
            for request in requests {
                match request.and_then(|envelope| send_envelope(peer, &envelope)) {
                    Ok(()) => {}
                    Err(e) => warn!("Bootstrap with {peer} failed: {e}"),
                }
            }
        }
    }

    /// Dispatch one inbound envelope; returns the reply, if any
    pub fn handle_message(&self, envelope: &Envelope) -> Result<Option<Envelope>> {
        debug!(
            "Received {:?} from {}",
            envelope.message_type, envelope.from
        );
        self.add_peer(&envelope.from);

        match envelope.message_type {
            MessageType::NewBlock => {
                let block: Block = envelope.payload()?;
                self.handle_new_block(block, &envelope.from)
            }
            MessageType::NewTransaction => {
                let tx: Transaction = envelope.payload()?;
                self.handle_new_transaction(tx, &envelope.from)?;
                Ok(None)
            }
            MessageType::GetBlocks => {
                let request: BlocksRequest = envelope.payload()?;
                let blocks = self.context.ledger().blocks_after(request.from_height);
                info!(
                    "Sending {} blocks above {} to {}",
                    blocks.len(),
                    request.from_height,
                    envelope.from
                );
                Ok(Some(Envelope::blocks(&blocks, &self.addr)?))
            }
            MessageType::Blocks => {
                let blocks: Vec<Block> = envelope.payload()?;
                self.handle_blocks(blocks)?;
                Ok(None)
            }
            MessageType::GetPeers => {
                let mut known = self.peers.get_peers();
                known.push(self.addr.clone());
                Ok(Some(Envelope::peers(&known, &self.addr)?))
            }
            MessageType::Peers => {
                let addrs: Vec<String> = envelope.payload()?;
                for addr in addrs {
                    self.add_peer(&addr);
                }
                Ok(None)
            }
        }
    }

    fn handle_new_block(&self, block: Block, from: &str) -> Result<Option<Envelope>> {
        let tip = self.context.ledger().get_last_block().get_index();
        if block.get_index() <= tip {
            debug!("Ignoring known block {}", block.get_index());
            return Ok(None);
        }
        if block.get_index() > tip + 1 {
            info!(
                "Block {} is ahead of tip {tip}, requesting missing blocks",
                block.get_index()
            );
            return Ok(Some(Envelope::get_blocks(tip, &self.addr)?));
        }

        self.context.receive_block(block.clone())?;
        self.relay(&Envelope::new_block(&block, &self.addr)?, from);
        Ok(None)
    }

    fn handle_new_transaction(&self, tx: Transaction, from: &str) -> Result<()> {
        // Pending or already in a block
        if self.context.ledger().contains_transaction(tx.get_id()) {
            debug!("Ignoring known transaction {}", tx.get_id());
            return Ok(());
        }
        self.context.submit_transaction(tx.clone())?;
        self.relay(&Envelope::new_transaction(&tx, &self.addr)?, from);
        Ok(())
    }

    // Append blocks in order, skipping ones we hold and stopping at the first gap
    fn handle_blocks(&self, mut blocks: Vec<Block>) -> Result<()> {
        blocks.sort_by_key(Block::get_index);
        for block in blocks {
            let tip = self.context.ledger().get_last_block().get_index();
            if block.get_index() <= tip {
                continue;
            }
            if block.get_index() != tip + 1 {
                warn!("Gap before block {}, stopping sync", block.get_index());
                break;
            }
            self.context.receive_block(block)?;
        }
        Ok(())
    }

    // Forward to every peer except the one we heard it from
    fn relay(&self, envelope: &Envelope, except: &str) {
        for peer in self.peers.get_peers().iter().filter(|p| p.as_str() != except) {
            if let Err(e) = send_envelope(peer, envelope) {
                warn!("Relay to {peer} failed: {e}");
            }
        }
    }

    fn broadcast(&self, envelope: &Envelope) -> usize {
        let mut delivered = 0;
        for peer in self.peers.get_peers() {
            match send_envelope(&peer, envelope) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Broadcast to {peer} failed: {e}"),
            }
        }
        delivered
    }

    /// Send a block to every known peer once; returns how many accepted the connection
    pub fn broadcast_block(&self, block: &Block) -> Result<usize> {
        Ok(self.broadcast(&Envelope::new_block(block, &self.addr)?))
    }

    pub fn broadcast_transaction(&self, tx: &Transaction) -> Result<usize> {
        Ok(self.broadcast(&Envelope::new_transaction(tx, &self.addr)?))
    }

    /// Bind the configured address and serve until the listener fails
    pub fn run(self: Arc<Self>) -> Result<()> {
        let listener = TcpListener::bind(&self.addr).map_err(|e| {
            BlockchainError::Network(format!("Failed to bind to {}: {e}", self.addr))
        })?;
        self.serve(listener)
    }

    /// Accept connections on `listener`, one handler thread per connection
    pub fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        info!("Node listening on {}", self.addr);
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let peer_addr = match stream.peer_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            error!("Failed to get peer address: {e}");
                            continue;
                        }
                    };
                    let node = Arc::clone(&self);
                    thread::spawn(move || {
                        if let Err(e) = node.handle_connection(stream, peer_addr) {
                            error!("Error handling connection from {peer_addr}: {e}");
                        }
                    });
                }
                Err(e) => error!("Error accepting connection: {e}"),
            }
        }
        Ok(())
    }

    fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr) -> Result<()> {
        stream
            .set_read_timeout(Some(Duration::from_secs(TCP_READ_TIMEOUT_SECS)))
            .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;

        let reader = BufReader::new(&stream);
        for envelope in Deserializer::from_reader(reader).into_iter::<Envelope>() {
            let envelope = envelope.map_err(|e| {
                BlockchainError::Network(format!("Failed to decode envelope: {e}"))
            })?;

            match self.handle_message(&envelope) {
                Ok(Some(reply)) => {
                    if let Err(e) = send_envelope(&envelope.from, &reply) {
                        warn!("Reply to {} failed: {e}", envelope.from);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Rejected {:?} from {peer_addr}: {e}", envelope.message_type),
            }
        }

        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }
}

/// Open a connection to `addr` and write one envelope
pub fn send_envelope(addr: &str, envelope: &Envelope) -> Result<()> {
    let socket_addr = parse_socket_addr(addr)?;
    debug!("Sending {:?} to {addr}", envelope.message_type);

    let stream =
        TcpStream::connect_timeout(&socket_addr, Duration::from_millis(TCP_WRITE_TIMEOUT))
            .map_err(|e| BlockchainError::Network(format!("Failed to connect to {addr}: {e}")))?;
    stream
        .set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))
        .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;

    serde_json::to_writer(&stream, envelope)
        .map_err(|e| BlockchainError::Network(format!("Failed to send data: {e}")))?;
    let _ = stream.shutdown(Shutdown::Write);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::wallet::Wallet;

    fn node_funding(addr: &str, wallet: &Wallet) -> Node {
        let context = ChainContext::new(Config::default());
        context.ledger().set_difficulty(1);
        context.initialize_genesis(&[wallet.get_address()]).unwrap();
        Node::new(addr, context)
    }

    fn node_with_wallet(addr: &str) -> (Node, Wallet) {
        let wallet = Wallet::new().unwrap();
        (node_funding(addr, &wallet), wallet)
    }

    #[test]
    fn test_get_blocks_replies_with_blocks_above_height() {
        let (node, wallet) = node_with_wallet("127.0.0.1:4001");
        node.context()
            .submit_transaction(Transaction::new_data("x", 1, &wallet).unwrap())
            .unwrap();
        node.context().mine("miner").unwrap();

        let request = Envelope::get_blocks(0, "127.0.0.1:4002").unwrap();
        let reply = node.handle_message(&request).unwrap().unwrap();
        assert_eq!(reply.message_type, MessageType::Blocks);
        let blocks: Vec<Block> = reply.payload().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].get_index(), 1);
        // Sender becomes a peer
        assert!(node.peers().is_known("127.0.0.1:4002"));
    }

    #[test]
    fn test_peer_exchange() {
        let (node, _) = node_with_wallet("127.0.0.1:4001");
        let peers = Envelope::peers(
            &["127.0.0.1:4003".to_string(), "127.0.0.1:4001".to_string()],
            "",
        )
        .unwrap();
        node.handle_message(&peers).unwrap();
        // Own address is never a peer
        assert_eq!(node.peers().get_peers(), vec!["127.0.0.1:4003".to_string()]);

        let reply = node
            .handle_message(&Envelope::get_peers("").unwrap())
            .unwrap()
            .unwrap();
        let listed: Vec<String> = reply.payload().unwrap();
        assert!(listed.contains(&"127.0.0.1:4001".to_string()));
        assert!(listed.contains(&"127.0.0.1:4003".to_string()));
    }

    #[test]
    fn test_blocks_sync_and_invalid_block_rejection() {
        let (origin, wallet) = node_with_wallet("127.0.0.1:4001");
        origin
            .context()
            .submit_transaction(Transaction::new_data("x", 1, &wallet).unwrap())
            .unwrap();
        let block = origin.context().mine("miner").unwrap();

        let follower = node_funding("127.0.0.1:4005", &wallet);
        let mut forged = serde_json::to_value(&block).unwrap();
        forged["transactions"][1]["data"] = serde_json::json!("forged");
        let forged_envelope = Envelope {
            message_type: MessageType::NewBlock,
            data: forged,
            from: String::new(),
            version: crate::network::PROTOCOL_VERSION.to_string(),
        };
        assert!(follower.handle_message(&forged_envelope).is_err());
        assert_eq!(follower.context().ledger().get_block_count(), 1);

        let blocks = Envelope::blocks(&origin.context().ledger().blocks(), "").unwrap();
        follower.handle_message(&blocks).unwrap();
        assert_eq!(follower.context().ledger().get_block_count(), 2);
        assert_eq!(follower.context().ledger().tip_hash(), block.get_hash());
    }

    #[test]
    fn test_block_ahead_of_tip_requests_sync() {
        let (node, _) = node_with_wallet("127.0.0.1:4001");
        let ahead = Block::new_candidate(5, 1, vec![], "x", 1, "miner");
        let reply = node
            .handle_message(&Envelope::new_block(&ahead, "").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(reply.message_type, MessageType::GetBlocks);
    }

    #[test]
    fn test_new_transaction_is_validated_and_queued_once() {
        let (node, wallet) = node_with_wallet("127.0.0.1:4001");
        let tx = Transaction::new_data("sensor", 2, &wallet).unwrap();
        let envelope = Envelope::new_transaction(&tx, "").unwrap();
        node.handle_message(&envelope).unwrap();
        node.handle_message(&envelope).unwrap();
        assert_eq!(node.context().ledger().pending_len(), 1);
    }

    #[test]
    fn test_mined_transaction_gossip_is_not_replayed() {
        let (node, wallet) = node_with_wallet("127.0.0.1:4001");
        let tx = Transaction::new_transfer("bob", 200, 2, &wallet).unwrap();
        let envelope = Envelope::new_transaction(&tx, "").unwrap();
        node.handle_message(&envelope).unwrap();
        node.context().mine("miner").unwrap();

        assert_eq!(node.handle_message(&envelope).unwrap(), None);
        assert_eq!(node.context().ledger().pending_len(), 0);
        assert_eq!(node.context().balance("bob"), 200);
        assert_eq!(node.context().balance(&wallet.get_address()), 798);
    }

    #[test]
    fn test_send_envelope_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let envelope = Envelope::get_peers("127.0.0.1:4009").unwrap();

        let sender = {
            let addr = addr.clone();
            let envelope = envelope.clone();
            thread::spawn(move || send_envelope(&addr, &envelope))
        };
        let (stream, _) = listener.accept().unwrap();
        let received: Envelope = serde_json::from_reader(BufReader::new(stream)).unwrap();
        sender.join().unwrap().unwrap();

        assert_eq!(received, envelope);
    }

    #[test]
    fn test_broadcast_is_best_effort() {
        let (node, _) = node_with_wallet("127.0.0.1:4001");
        // Nothing listens on the discard port
        node.add_peer("127.0.0.1:9");
        let delivered = node.broadcast_block(&Block::generate_genesis_block()).unwrap();
        assert_eq!(delivered, 0);
    }
}
