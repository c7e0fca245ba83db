use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::models::AccountId;

/// What a chat user's next plain message means. Multi-step commands park the
/// user in one of these until an amount arrives or `/cancel` is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Conversation {
    AwaitingDepositAmount { account: AccountId },
    AwaitingWithdrawAmount { account: AccountId },
    AwaitingTransferAmount { from: AccountId, to: AccountId },
}

/// Pending conversation per chat user id. Lives in memory only.
#[derive(Default)]
pub struct SessionStore {
    pending: Mutex<HashMap<i64, Conversation>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, chat_id: i64, state: Conversation) {
        self.lock().insert(chat_id, state);
    }

    pub fn take(&self, chat_id: i64) -> Option<Conversation> {
        self.lock().remove(&chat_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Conversation>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
