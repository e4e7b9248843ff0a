//! Deferred actions awaiting email confirmation or administrator approval.
//!
//! Records are created by the mutation workflows and stored with the list;
//! the confirmation and moderation subsystems consume them.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// What a pending request will do once it is confirmed or approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingKind {
    /// Unsubscription held for the list administrator.
    UnsubscriptionApproval { address: String },
    /// Unsubscription awaiting the member's email confirmation.
    UnsubscriptionConfirmation { address: String, language: String },
    /// Address change awaiting confirmation from the new address.
    AddressChange {
        old_address: String,
        new_address: String,
        globally: bool,
    },
}

/// A single pending request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Random confirmation cookie.
    pub cookie: String,
    /// Internal name of the originating list.
    pub list: String,
    #[serde(flatten)]
    pub kind: PendingKind,
    pub created: DateTime<Utc>,
}

impl PendingRequest {
    pub fn new(list: &str, kind: PendingKind) -> Self {
        let mut raw = [0u8; 20];
        rand::thread_rng().fill_bytes(&mut raw);
        Self {
            cookie: hex::encode(raw),
            list: list.to_string(),
            kind,
            created: Utc::now(),
        }
    }

    /// The address this request concerns.
    pub fn address(&self) -> &str {
        match &self.kind {
            PendingKind::UnsubscriptionApproval { address }
            | PendingKind::UnsubscriptionConfirmation { address, .. } => address,
            PendingKind::AddressChange { old_address, .. } => old_address,
        }
    }
}
