use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::DecodePolicy;

use super::message::{self, ChatMessage};
use super::{CloseReason, ConnectionHandle, RoomDirectory, RoomError, SessionRegistry};

/// Interprets inbound frames, drives the room directory and the session
/// registry, and fans frames out to the resolved ConnectionHandles.
///
/// Transport-agnostic: the WebSocket route layer feeds frames in, the
/// ConnectionHandle contract carries frames out. Registry locks are never
/// held across a send; targets are resolved into a snapshot first.
pub struct MessageRouter {
    sessions: SessionRegistry,
    rooms: RoomDirectory,
    decode_policy: DecodePolicy,
}

impl MessageRouter {
    pub fn new(
        sessions: SessionRegistry,
        rooms: RoomDirectory,
        decode_policy: DecodePolicy,
    ) -> Self {
        Self {
            sessions,
            rooms,
            decode_policy,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn rooms(&self) -> &RoomDirectory {
        &self.rooms
    }

    /// Assign a participant key for a new connection. The display name is
    /// expected to be normalized already (whitespace stripped, lowercased);
    /// an empty name still yields a unique key.
    pub fn assign_key(&self, display_name: &str) -> String {
        if display_name.is_empty() {
            super::random_suffix()
        } else {
            format!("{}-{}", display_name, super::random_suffix())
        }
    }

    /// Register a freshly established connection and acknowledge the
    /// assigned key to the peer as an out-of-band text frame.
    pub async fn establish(&self, key: String, handle: Arc<dyn ConnectionHandle>) {
        self.sessions.register(key.clone(), handle.clone()).await;
        if let Err(e) = handle.send_text(format!("Your uniqueKey: {key}")) {
            warn!(%key, error = %e, "failed to send key acknowledgement");
        }
        info!(%key, "connection established");
    }

    /// Liveness response from the transport layer. Not propagated further.
    pub async fn record_pong(&self, key: &str) {
        self.sessions.touch(key).await;
    }

    /// One inbound text frame from `sender_key`. Callers invoke this
    /// sequentially per connection, which preserves per-sender ordering.
    pub async fn handle_frame(&self, sender_key: &str, raw: &str) {
        let msg = match ChatMessage::from_json(raw) {
            Ok(msg) => msg,
            Err(e) => {
                match self.decode_policy {
                    DecodePolicy::BroadcastVerbatim => {
                        debug!(%sender_key, error = %e, "undecodable frame, rebroadcasting verbatim");
                        self.broadcast_raw(sender_key, raw).await;
                    }
                    DecodePolicy::Drop => {
                        warn!(%sender_key, error = %e, "undecodable frame dropped");
                    }
                }
                return;
            }
        };

        let message_type = msg.message_type.clone();
        match message_type.as_deref() {
            Some(message::TYPE_CREATE_ROOM) => self.create_room(sender_key, msg).await,
            Some(message::TYPE_JOIN_ROOM) => self.join_room(sender_key, msg).await,
            Some(message::TYPE_GROUP_CHAT) => self.group_chat(&msg).await,
            _ => match msg.receiver_id.as_deref() {
                Some(receiver) if !receiver.is_empty() && receiver != sender_key => {
                    self.direct(sender_key, receiver, &msg).await;
                }
                _ => {
                    if let Ok(encoded) = msg.to_json() {
                        self.broadcast_raw(sender_key, &encoded).await;
                    }
                }
            },
        }
    }

    /// One inbound binary frame from `sender_key`. Binary payloads carry no
    /// envelope; they are always relayed verbatim to every other open
    /// connection.
    pub async fn handle_binary(&self, sender_key: &str, payload: &[u8]) {
        let targets = self.sessions.all_handles().await;
        for (key, handle) in targets {
            if key == sender_key || !handle.is_open() {
                continue;
            }
            if let Err(e) = handle.send_binary(payload.to_vec()) {
                warn!(%key, error = %e, "binary broadcast send failed, tearing down session");
                self.disconnect(&key).await;
            }
        }
    }

    /// Shared teardown path for explicit close, transport error and
    /// heartbeat eviction: drop the session and its room memberships.
    pub async fn disconnect(&self, key: &str) {
        self.sessions.remove(key).await;
        self.rooms.prune_from_all(key).await;
        info!(%key, "connection closed");
    }

    /// Close every open connection and drop all relay state. In-flight
    /// sends complete or fail naturally.
    pub async fn shutdown(&self) {
        let handles = self.sessions.drain().await;
        info!(count = handles.len(), "closing all connections");
        for handle in handles {
            handle.close(CloseReason::Normal);
        }
        self.rooms.clear().await;
    }

    async fn create_room(&self, sender_key: &str, mut msg: ChatMessage) {
        let label = msg.content.clone().unwrap_or_default();
        let creator = msg
            .sender_id
            .clone()
            .unwrap_or_else(|| sender_key.to_string());

        let room_id = self.rooms.create_room(&label, &creator).await;
        info!(%creator, %room_id, "room created");

        msg.room_id = Some(room_id);
        self.reply(sender_key, &msg).await;
    }

    async fn join_room(&self, sender_key: &str, mut msg: ChatMessage) {
        let room_id = msg.room_id.clone().unwrap_or_default();
        let member = msg
            .sender_id
            .clone()
            .unwrap_or_else(|| sender_key.to_string());

        match self.rooms.join(&room_id, &member).await {
            Ok(members) => {
                info!(%member, %room_id, "joined room");
                msg.content = serde_json::to_string(&members).ok();
                self.reply(sender_key, &msg).await;
            }
            Err(RoomError::NotFound(_)) => {
                warn!(%member, %room_id, "join requested for unknown room");
                let err = ChatMessage {
                    message_type: Some(message::TYPE_ERROR.into()),
                    room_id: Some(room_id.clone()),
                    content: Some(format!("room not found: {room_id}")),
                    timestamp: Some(Utc::now().to_rfc3339()),
                    ..Default::default()
                };
                self.reply(sender_key, &err).await;
            }
        }
    }

    async fn group_chat(&self, msg: &ChatMessage) {
        let Some(room_id) = msg.room_id.as_deref() else {
            warn!("group chat frame without a room id dropped");
            return;
        };

        let members = match self.rooms.members_of(room_id).await {
            Ok(members) => members,
            Err(RoomError::NotFound(_)) => {
                warn!(%room_id, sender = ?msg.sender_id, "group chat for unknown room dropped");
                return;
            }
        };

        let Ok(encoded) = msg.to_json() else {
            warn!(%room_id, "failed to encode group chat frame");
            return;
        };

        // Resolve every recipient before sending anything, so no registry
        // lock spans the fan-out.
        let mut resolved = Vec::with_capacity(members.len());
        for member in members {
            let handle = self.sessions.lookup(&member).await;
            resolved.push((member, handle));
        }

        for (member, handle) in resolved {
            match handle {
                Some(handle) if handle.is_open() => {
                    if let Err(e) = handle.send_text(encoded.clone()) {
                        warn!(%member, error = %e, "group chat send failed, pruning member");
                        self.sessions.remove(&member).await;
                        self.rooms.prune_member(room_id, &member).await;
                    }
                }
                _ => {
                    // Handle absent or closed: stale membership.
                    self.sessions.remove(&member).await;
                    self.rooms.prune_member(room_id, &member).await;
                }
            }
        }
    }

    async fn direct(&self, sender_key: &str, receiver: &str, msg: &ChatMessage) {
        let Some(handle) = self.sessions.lookup(receiver).await else {
            warn!(%sender_key, %receiver, "direct message to unknown receiver dropped");
            return;
        };
        if !handle.is_open() {
            warn!(%sender_key, %receiver, "direct message to closed receiver dropped");
            return;
        }

        let Ok(encoded) = msg.to_json() else {
            return;
        };
        if let Err(e) = handle.send_text(encoded) {
            warn!(%receiver, error = %e, "direct send failed, tearing down receiver");
            self.disconnect(receiver).await;
        }
    }

    /// Echo a frame back to the requester only.
    async fn reply(&self, key: &str, msg: &ChatMessage) {
        let Some(handle) = self.sessions.lookup(key).await else {
            warn!(%key, "reply target vanished");
            return;
        };
        let Ok(encoded) = msg.to_json() else {
            return;
        };
        if let Err(e) = handle.send_text(encoded) {
            warn!(%key, error = %e, "reply send failed");
        }
    }

    /// Send a raw payload to every other open connection. A failed send
    /// tears down the offending session without aborting the broadcast.
    async fn broadcast_raw(&self, sender_key: &str, frame: &str) {
        let targets = self.sessions.all_handles().await;
        for (key, handle) in targets {
            if key == sender_key || !handle.is_open() {
                continue;
            }
            if let Err(e) = handle.send_text(frame.to_string()) {
                warn!(%key, error = %e, "broadcast send failed, tearing down session");
                self.disconnect(&key).await;
            }
        }
    }
}
