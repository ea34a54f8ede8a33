use crate::error::{BlockchainError, Result};
use std::net::SocketAddr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Known peer addresses in discovery order
#[derive(Default)]
pub struct Peers {
    inner: RwLock<Vec<String>>,
}

impl Peers {
    pub fn new() -> Peers {
        Peers::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<String>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<String>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `addr` unless already known; returns whether it was new
    pub fn add_peer(&self, addr: &str) -> bool {
        let mut inner = self.write();
        if inner.iter().any(|known| known == addr) {
            return false;
        }
        inner.push(addr.to_string());
        true
    }

    pub fn evict_peer(&self, addr: &str) {
        self.write().retain(|known| known != addr);
    }

    /// Copy of the peer list, safe to iterate while others mutate it
    pub fn get_peers(&self) -> Vec<String> {
        self.read().clone()
    }

    pub fn is_known(&self, addr: &str) -> bool {
        self.read().iter().any(|known| known == addr)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

pub fn parse_socket_addr(addr: &str) -> Result<SocketAddr> {
    addr.parse()
        .map_err(|e| BlockchainError::Network(format!("Invalid peer address {addr}: {e}")))
}
