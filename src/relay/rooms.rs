use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("room not found: {0}")]
    NotFound(String),
}

/// Directory of rooms: room id -> member participant keys.
///
/// Holds keys only, never handles; recipients are resolved through the
/// SessionRegistry at send time. Every read-modify-write happens under a
/// single write-lock acquisition, so membership updates are atomic and
/// fan-out callers always see a consistent snapshot.
#[derive(Default, Clone)]
pub struct RoomDirectory {
    inner: Arc<RwLock<HashMap<String, HashSet<String>>>>,
}

/// Room labels keep only their non-whitespace characters.
fn sanitize_label(label: &str) -> String {
    label.chars().filter(|c| !c.is_whitespace()).collect()
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room from a user-supplied label, seeded with the creator.
    /// Returns the generated room id (sanitized label plus random suffix).
    pub async fn create_room(&self, label: &str, creator_key: &str) -> String {
        let room_id = format!("{}-{}", sanitize_label(label), super::random_suffix());
        let mut guard = self.inner.write().await;
        guard.insert(room_id.clone(), HashSet::from([creator_key.to_string()]));
        room_id
    }

    /// Add a member and return the updated membership snapshot. Never
    /// creates the room implicitly; joining twice is a no-op under the set
    /// semantics.
    pub async fn join(&self, room_id: &str, key: &str) -> Result<Vec<String>, RoomError> {
        let mut guard = self.inner.write().await;
        let members = guard
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
        members.insert(key.to_string());
        Ok(sorted(members))
    }

    pub async fn members_of(&self, room_id: &str) -> Result<Vec<String>, RoomError> {
        let guard = self.inner.read().await;
        let members = guard
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.to_string()))?;
        Ok(sorted(members))
    }

    /// Remove a key from one room's membership. No-op when the room or the
    /// member is already absent; a room whose last member leaves is deleted.
    pub async fn prune_member(&self, room_id: &str, key: &str) {
        let mut guard = self.inner.write().await;
        if let Some(members) = guard.get_mut(room_id) {
            members.remove(key);
            if members.is_empty() {
                guard.remove(room_id);
            }
        }
    }

    /// Remove a key from every room it belongs to. Part of the shared
    /// session teardown path.
    pub async fn prune_from_all(&self, key: &str) {
        let mut guard = self.inner.write().await;
        guard.retain(|_, members| {
            members.remove(key);
            !members.is_empty()
        });
    }

    pub async fn contains(&self, room_id: &str) -> bool {
        self.inner.read().await.contains_key(room_id)
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Drop all rooms. Used on shutdown.
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

fn sorted(members: &HashSet<String>) -> Vec<String> {
    let mut snapshot: Vec<String> = members.iter().cloned().collect();
    snapshot.sort();
    snapshot
}
