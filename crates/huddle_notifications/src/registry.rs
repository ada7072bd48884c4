use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};

use huddle_common::Notification;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::Stream;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Buffered notifications per live connection before it counts as stalled.
const CONNECTION_BUFFER: usize = 32;

type Connections = HashMap<i64, HashMap<Uuid, mpsc::Sender<Notification>>>;

/// Owns every live notification connection, keyed by receiver.
///
/// Cheap to clone; all clones share the same map. Locks are never held across
/// an await point, so a plain `RwLock` is enough and lets [`ConnectionHandle`]
/// deregister from `Drop`.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<Connections>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection for `receiver_id`.
    ///
    /// The returned [`Subscription`] yields every notification pushed to the
    /// receiver and deregisters itself when dropped.
    pub fn register(&self, receiver_id: i64) -> Subscription {
        let connection_id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(CONNECTION_BUFFER);

        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(receiver_id)
            .or_default()
            .insert(connection_id, sender);

        info!(
            "Registered connection {} for receiver {}",
            connection_id, receiver_id
        );

        Subscription {
            receiver,
            handle: ConnectionHandle {
                registry: self.clone(),
                receiver_id,
                connection_id,
            },
        }
    }

    /// Removes one connection; returns whether it was registered.
    pub fn remove(&self, receiver_id: i64, connection_id: Uuid) -> bool {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(receiver_connections) = connections.get_mut(&receiver_id) else {
            return false;
        };
        let removed = receiver_connections.remove(&connection_id).is_some();
        if receiver_connections.is_empty() {
            connections.remove(&receiver_id);
        }
        if removed {
            debug!(
                "Removed connection {} for receiver {}",
                connection_id, receiver_id
            );
        }
        removed
    }

    /// Drops every connection. Open streams end once their buffered
    /// notifications are consumed.
    pub fn close_all(&self) -> usize {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let closed = connections.values().map(HashMap::len).sum();
        connections.clear();
        info!("Closed {} live connection(s)", closed);
        closed
    }

    /// Live connections across all receivers.
    pub fn total_connections(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashMap::len)
            .sum()
    }

    pub fn connection_count(&self, receiver_id: i64) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&receiver_id)
            .map_or(0, HashMap::len)
    }

    /// Sends the notification to every live connection of its receiver.
    ///
    /// Connections that are closed or whose buffer is full are pruned.
    /// Returns the number of connections that accepted the notification.
    pub fn push(&self, notification: &Notification) -> usize {
        let receiver_id = notification.receiver_id;
        let mut delivered = 0;
        let mut stale = Vec::new();

        {
            let connections = self
                .connections
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(receiver_connections) = connections.get(&receiver_id) else {
                debug!("No live connection for receiver {}", receiver_id);
                return 0;
            };

            for (connection_id, sender) in receiver_connections {
                match sender.try_send(notification.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(
                            "Connection {} of receiver {} is not keeping up, dropping it",
                            connection_id, receiver_id
                        );
                        stale.push(*connection_id);
                    }
                    Err(TrySendError::Closed(_)) => stale.push(*connection_id),
                }
            }
        }

        for connection_id in stale {
            self.remove(receiver_id, connection_id);
        }

        debug!(
            "Pushed notification {} to {} connection(s) of receiver {}",
            notification.notification_id, delivered, receiver_id
        );
        delivered
    }
}

/// Deregisters its connection when dropped.
pub struct ConnectionHandle {
    registry: ConnectionRegistry,
    receiver_id: i64,
    connection_id: Uuid,
}

impl ConnectionHandle {
    pub fn receiver_id(&self) -> i64 {
        self.receiver_id
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.registry.remove(self.receiver_id, self.connection_id);
    }
}

/// Stream of notifications for one registered connection.
pub struct Subscription {
    receiver: mpsc::Receiver<Notification>,
    handle: ConnectionHandle,
}

impl Subscription {
    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Waits for the next notification; `None` once the connection was pruned.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    /// Splits into the deregistration handle and the raw receiver.
    pub fn into_parts(self) -> (ConnectionHandle, mpsc::Receiver<Notification>) {
        (self.handle, self.receiver)
    }
}

impl Stream for Subscription {
    type Item = Notification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Notification>> {
        self.receiver.poll_recv(cx)
    }
}
