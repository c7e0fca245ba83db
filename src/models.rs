use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Sequence-backed string ids (`u000001`, `a000001`, `t000001`). Ordering is
/// numeric, so `t1000000` sorts after `t999999`.
macro_rules! seq_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn from_seq(seq: u64) -> Self {
                Self(format!("{}{:06}", $prefix, seq))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.trim().to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                self.0
                    .len()
                    .cmp(&other.0.len())
                    .then_with(|| self.0.cmp(&other.0))
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }
    };
}

seq_id!(UserId, "u");
seq_id!(AccountId, "a");
seq_id!(TxId, "t");

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    /// Unique login name. Chat players have none; their `display_name` comes
    /// from the transport and is never used for lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub display_name: String,
    /// Empty for users that arrived through chat and never set a password.
    #[serde(default)]
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub accounts: Vec<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<GameProfile>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// ---------------------------------------------------------------------------
// Accrual game state
// ---------------------------------------------------------------------------

/// Play-money instruments. Balances in these are `f64` on purpose: they never
/// settle against anything real. Fiat accounts use `i64` minor units instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Instrument {
    #[serde(rename = "MNT")]
    Mnt,
    #[serde(rename = "BTC")]
    Btc,
    #[serde(rename = "USD")]
    Usd,
}

impl Instrument {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Mnt => "MNT",
            Self::Btc => "BTC",
            Self::Usd => "USD",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameProfile {
    #[serde(default)]
    pub balances: BTreeMap<Instrument, f64>,
    /// Catalog item id -> units owned.
    #[serde(default)]
    pub owned_items: BTreeMap<u32, u32>,
    pub last_accrual_at: DateTime<Utc>,
    pub accrual_window_end: DateTime<Utc>,
}

impl GameProfile {
    pub fn new(now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            balances: BTreeMap::new(),
            owned_items: BTreeMap::new(),
            last_accrual_at: now,
            accrual_window_end: now + window,
        }
    }

    pub fn balance(&self, instrument: Instrument) -> f64 {
        self.balances.get(&instrument).copied().unwrap_or(0.0)
    }

    pub fn credit(&mut self, instrument: Instrument, amount: f64) {
        *self.balances.entry(instrument).or_insert(0.0) += amount;
    }

    pub fn item_count(&self) -> usize {
        self.owned_items.values().map(|n| *n as usize).sum()
    }

    pub fn add_item(&mut self, item_id: u32) {
        *self.owned_items.entry(item_id).or_insert(0) += 1;
    }

    /// Removes one unit; returns false when none are owned.
    pub fn remove_item(&mut self, item_id: u32) -> bool {
        match self.owned_items.get_mut(&item_id) {
            Some(n) if *n > 1 => {
                *n -= 1;
                true
            }
            Some(_) => {
                self.owned_items.remove(&item_id);
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts and transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub owner: UserId,
    pub currency: String,
    /// Minor units (cents).
    pub balance: i64,
    #[serde(default)]
    pub closed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Deposit,
    Withdraw,
    Transfer,
    Purchase,
    Sale,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Transfer => "transfer",
            Self::Purchase => "purchase",
            Self::Sale => "sale",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TxId,
    pub kind: TxKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<u32>,
    /// Minor units of `currency`. For transfers this is the debited amount.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn touches(&self, account: &AccountId) -> bool {
        self.from.as_ref() == Some(account) || self.to.as_ref() == Some(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_zero_padded() {
        assert_eq!(UserId::from_seq(1).as_str(), "u000001");
        assert_eq!(AccountId::from_seq(42).as_str(), "a000042");
        assert_eq!(TxId::from_seq(7).to_string(), "t000007");
    }

    #[test]
    fn test_id_order_is_numeric_past_padding() {
        assert!(TxId::from_seq(999_999) < TxId::from_seq(1_000_000));
        assert!(TxId::from_seq(2) < TxId::from_seq(10));
    }

    #[test]
    fn test_remove_item_drops_empty_entries() {
        let mut profile = GameProfile::new(Utc::now(), Duration::hours(3));
        profile.add_item(3);
        profile.add_item(3);
        assert_eq!(profile.item_count(), 2);
        assert!(profile.remove_item(3));
        assert_eq!(profile.owned_items.get(&3), Some(&1));
        assert!(profile.remove_item(3));
        assert!(profile.owned_items.is_empty());
        assert!(!profile.remove_item(3));
    }

    #[test]
    fn test_profile_balances_serialize_by_code() {
        let mut profile = GameProfile::new(Utc::now(), Duration::minutes(10));
        profile.credit(Instrument::Mnt, 1.5);
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["balances"]["MNT"], 1.5);
        assert!(json.get("accrualWindowEnd").is_some());
    }
}
