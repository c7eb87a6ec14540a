use std::sync::Arc;

use axum::extract::ws::Message;
use peer_signal_protocol::PeerId;
use tokio::sync::{mpsc, RwLock};

use crate::error::{RelayError, Result};

/// Sending half of a connection's outbox. The connection's writer task is the only
/// one touching the socket, so everything written to a peer goes through here.
pub type Outbox = mpsc::UnboundedSender<Message>;

#[derive(Debug)]
struct ConnectionRecord {
    identity: PeerId,
    outbox: Outbox,
}

impl ConnectionRecord {
    fn is_alive(&self) -> bool {
        !self.outbox.is_closed()
    }
}

/// Currently connected peers, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    records: Arc<RwLock<Vec<ConnectionRecord>>>,
}

impl Registry {
    pub async fn register(&self, identity: PeerId, outbox: Outbox) -> Result<()> {
        self.insert(identity, outbox, None).await
    }

    /// Register unless `capacity` connections are already present.
    /// The capacity check and the insert happen under the same lock.
    pub async fn register_bounded(
        &self,
        identity: PeerId,
        outbox: Outbox,
        capacity: usize,
    ) -> Result<()> {
        self.insert(identity, outbox, Some(capacity)).await
    }

    async fn insert(
        &self,
        identity: PeerId,
        outbox: Outbox,
        capacity: Option<usize>,
    ) -> Result<()> {
        let mut records = self.records.write().await;
        if records.iter().any(|record| record.identity == identity) {
            return Err(RelayError::DuplicateIdentity(identity));
        }
        if let Some(capacity) = capacity {
            if records.len() >= capacity {
                return Err(RelayError::SessionFull { capacity });
            }
        }
        records.push(ConnectionRecord { identity, outbox });
        Ok(())
    }

    /// Remove a peer. Returns whether it was registered, absent peers are not an error.
    pub async fn unregister(&self, identity: &PeerId) -> bool {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| record.identity != *identity);
        records.len() != before
    }

    /// Remove a peer only if it is still registered with this very outbox,
    /// so a failed delivery never evicts a newer connection reusing the identity.
    pub async fn evict(&self, identity: &PeerId, outbox: &Outbox) -> bool {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| {
            record.identity != *identity || !record.outbox.same_channel(outbox)
        });
        records.len() != before
    }

    /// Live connections other than `excluding`, in registration order.
    pub async fn others(&self, excluding: &PeerId) -> Vec<(PeerId, Outbox)> {
        self.records
            .read()
            .await
            .iter()
            .filter(|record| record.identity != *excluding && record.is_alive())
            .map(|record| (record.identity.clone(), record.outbox.clone()))
            .collect()
    }

    /// Like [`Registry::others`] but including connections whose writer has stopped,
    /// so routing notices them and evicts them.
    pub(crate) async fn targets(&self, excluding: &PeerId) -> Vec<(PeerId, Outbox)> {
        self.records
            .read()
            .await
            .iter()
            .filter(|record| record.identity != *excluding)
            .map(|record| (record.identity.clone(), record.outbox.clone()))
            .collect()
    }

    pub async fn get(&self, identity: &PeerId) -> Result<Outbox> {
        self.records
            .read()
            .await
            .iter()
            .find(|record| record.identity == *identity)
            .map(|record| record.outbox.clone())
            .ok_or_else(|| RelayError::NotFound(identity.clone()))
    }

    pub async fn identities(&self) -> Vec<PeerId> {
        self.records
            .read()
            .await
            .iter()
            .map(|record| record.identity.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
