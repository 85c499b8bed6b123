//! Client records keyed by peer identity.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

use tracing::debug;
use uuid::Uuid;

use crate::error::{constants, ProtocolError, Result};
use crate::protocol::handshake::{redact, HelloRequest};

/// A client that completed the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub peer_key: String,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
    pub level: u32,
    pub signature: String,
    pub game_id: Option<Uuid>,
    pub connected_at: Instant,
}

impl ClientRecord {
    pub fn from_hello(peer_key: impl Into<String>, hello: HelloRequest, signature: String) -> Self {
        Self {
            peer_key: peer_key.into(),
            first_name: hello.first_name,
            last_name: hello.last_name,
            status: hello.status,
            level: hello.level,
            signature,
            game_id: None,
            connected_at: Instant::now(),
        }
    }
}

/// Peer key to client record. Records are handed out as clones.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    clients: RwLock<HashMap<String, ClientRecord>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record, returning the one it replaced.
    pub fn insert(&self, record: ClientRecord) -> Result<Option<ClientRecord>> {
        debug!(
            peer = %record.peer_key,
            signature = redact(&record.signature),
            "client registered"
        );
        let mut clients = self.clients.write()?;
        Ok(clients.insert(record.peer_key.clone(), record))
    }

    pub fn get(&self, peer_key: &str) -> Result<Option<ClientRecord>> {
        Ok(self.clients.read()?.get(peer_key).cloned())
    }

    /// The signature issued to `peer_key`; an unknown peer is an integrity failure.
    pub fn signature(&self, peer_key: &str) -> Result<String> {
        self.clients
            .read()?
            .get(peer_key)
            .map(|record| record.signature.clone())
            .ok_or_else(|| ProtocolError::IntegrityError(constants::ERR_UNKNOWN_PEER.into()))
    }

    pub fn set_game_id(&self, peer_key: &str, game_id: Uuid) -> Result<()> {
        let mut clients = self.clients.write()?;
        match clients.get_mut(peer_key) {
            Some(record) => {
                record.game_id = Some(game_id);
                Ok(())
            }
            None => Err(ProtocolError::IntegrityError(
                constants::ERR_UNKNOWN_PEER.into(),
            )),
        }
    }

    pub fn remove(&self, peer_key: &str) -> Result<Option<ClientRecord>> {
        Ok(self.clients.write()?.remove(peer_key))
    }

    pub fn len(&self) -> usize {
        self.clients.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(peer: &str, signature: &str) -> ClientRecord {
        let hello = HelloRequest {
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
            status: "online".into(),
            level: 3,
        };
        ClientRecord::from_hello(peer, hello, signature.into())
    }

    #[test]
    fn test_insert_and_lookup() {
        let registry = SessionRegistry::new();
        assert!(registry.insert(record("tcp://1", "aaaa")).unwrap().is_none());
        assert_eq!(registry.signature("tcp://1").unwrap(), "aaaa");
        assert_eq!(registry.get("tcp://1").unwrap().unwrap().level, 3);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_repeated_hello_replaces() {
        let registry = SessionRegistry::new();
        registry.insert(record("tcp://1", "aaaa")).unwrap();
        let old = registry.insert(record("tcp://1", "bbbb")).unwrap().unwrap();
        assert_eq!(old.signature, "aaaa");
        assert_eq!(registry.signature("tcp://1").unwrap(), "bbbb");
    }

    #[test]
    fn test_unknown_peer_is_integrity_error() {
        let registry = SessionRegistry::new();
        assert!(matches!(
            registry.signature("udp://9"),
            Err(ProtocolError::IntegrityError(_))
        ));
        assert!(registry.set_game_id("udp://9", Uuid::nil()).is_err());
    }

    #[test]
    fn test_game_id_and_remove() {
        let registry = SessionRegistry::new();
        registry.insert(record("tcp://1", "aaaa")).unwrap();
        let id = Uuid::new_v4();
        registry.set_game_id("tcp://1", id).unwrap();
        assert_eq!(registry.get("tcp://1").unwrap().unwrap().game_id, Some(id));

        assert!(registry.remove("tcp://1").unwrap().is_some());
        assert!(registry.is_empty());
    }
}
