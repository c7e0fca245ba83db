use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::clock::Clock;
use crate::error::{PennyError, Result};
use crate::models::{Account, AccountId, Transaction, TxId, User, UserId};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqKind {
    User,
    Account,
    Tx,
}

/// The whole persisted ledger. Only reachable through [`LedgerStore`] access
/// closures; fields stay private so callers go through the checked methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    version: u32,
    users: BTreeMap<UserId, User>,
    accounts: BTreeMap<AccountId, Account>,
    txs: BTreeMap<TxId, Transaction>,
    next_user: u64,
    next_acc: u64,
    next_tx: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            users: BTreeMap::new(),
            accounts: BTreeMap::new(),
            txs: BTreeMap::new(),
            next_user: 0,
            next_acc: 0,
            next_tx: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Bump and return a counter. Needs `&mut`, so it only runs inside
    /// exclusive access, in the same critical section that uses the id.
    pub fn next_sequence(&mut self, kind: SeqKind) -> u64 {
        let counter = match kind {
            SeqKind::User => &mut self.next_user,
            SeqKind::Account => &mut self.next_acc,
            SeqKind::Tx => &mut self.next_tx,
        };
        *counter += 1;
        *counter
    }

    pub fn next_user_id(&mut self) -> UserId {
        UserId::from_seq(self.next_sequence(SeqKind::User))
    }

    pub fn next_account_id(&mut self) -> AccountId {
        AccountId::from_seq(self.next_sequence(SeqKind::Account))
    }

    pub fn next_tx_id(&mut self) -> TxId {
        TxId::from_seq(self.next_sequence(SeqKind::Tx))
    }

    // -- users --------------------------------------------------------------

    pub fn user(&self, id: &UserId) -> Result<&User> {
        self.users
            .get(id)
            .ok_or_else(|| PennyError::NotFound(format!("user {id}")))
    }

    pub fn user_mut(&mut self, id: &UserId) -> Result<&mut User> {
        self.users
            .get_mut(id)
            .ok_or_else(|| PennyError::NotFound(format!("user {id}")))
    }

    /// Lookup by login name only; chat display names never match.
    pub fn user_by_name(&self, name: &str) -> Option<&User> {
        self.users.values().find(|u| u.username.as_deref() == Some(name))
    }

    pub fn admins(&self) -> impl Iterator<Item = &User> {
        self.users.values().filter(|u| u.is_admin())
    }

    pub fn user_by_chat(&self, chat_id: i64) -> Option<&User> {
        self.users.values().find(|u| u.chat_id == Some(chat_id))
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn insert_user(&mut self, user: User) -> Result<()> {
        if self.users.contains_key(&user.id) {
            return Err(PennyError::AlreadyExists(format!("user {}", user.id)));
        }
        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    // -- accounts -----------------------------------------------------------

    pub fn account(&self, id: &AccountId) -> Result<&Account> {
        self.accounts
            .get(id)
            .ok_or_else(|| PennyError::NotFound(format!("account {id}")))
    }

    pub fn account_mut(&mut self, id: &AccountId) -> Result<&mut Account> {
        self.accounts
            .get_mut(id)
            .ok_or_else(|| PennyError::NotFound(format!("account {id}")))
    }

    /// Insert and link to the owner's account list. The owner must exist.
    pub fn insert_account(&mut self, account: Account) -> Result<()> {
        if self.accounts.contains_key(&account.id) {
            return Err(PennyError::AlreadyExists(format!("account {}", account.id)));
        }
        let owner = self.user_mut(&account.owner)?;
        owner.accounts.push(account.id.clone());
        self.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    pub fn accounts_of(&self, owner: &UserId) -> Vec<&Account> {
        self.accounts.values().filter(|a| &a.owner == owner).collect()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    // -- transactions -------------------------------------------------------

    pub fn insert_transaction(&mut self, tx: Transaction) -> Result<()> {
        if self.txs.contains_key(&tx.id) {
            return Err(PennyError::AlreadyExists(format!("transaction {}", tx.id)));
        }
        self.txs.insert(tx.id.clone(), tx);
        Ok(())
    }

    pub fn transaction_count(&self) -> usize {
        self.txs.len()
    }

    /// Entries where the account is sender or receiver, ascending by
    /// `(created_at, id)`. A positive `limit` keeps the most recent tail.
    pub fn history(&self, account: &AccountId, limit: usize) -> Result<Vec<&Transaction>> {
        self.account(account)?;
        Ok(tail_sorted(
            self.txs.values().filter(|t| t.touches(account)).collect(),
            limit,
        ))
    }

    /// Game purchases and sales recorded against a user.
    pub fn user_history(&self, user: &UserId, limit: usize) -> Result<Vec<&Transaction>> {
        self.user(user)?;
        Ok(tail_sorted(
            self.txs
                .values()
                .filter(|t| t.user.as_ref() == Some(user))
                .collect(),
            limit,
        ))
    }
}

fn tail_sorted(mut out: Vec<&Transaction>, limit: usize) -> Vec<&Transaction> {
    out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    if limit > 0 && out.len() > limit {
        out.drain(..out.len() - limit);
    }
    out
}

// ---------------------------------------------------------------------------
// File persistence
// ---------------------------------------------------------------------------

/// Replace `path` with `bytes` via a sibling temp file and rename, so a crash
/// never leaves a truncated file behind.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn encode(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(snapshot)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> Result<Snapshot> {
    Ok(serde_json::from_slice(bytes)?)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Sole owner of the snapshot. One reader/writer lock covers everything.
///
/// Writers mutate a staged copy and only swap it in once the file rewrite
/// succeeded, so the in-memory state never runs ahead of the file and a
/// failed validation leaves nothing half-applied.
pub struct LedgerStore {
    path: PathBuf,
    snapshot: RwLock<Snapshot>,
    clock: Arc<dyn Clock>,
}

impl LedgerStore {
    /// Load `path`, or create an empty ledger there if it is missing or empty.
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.into();
        let existing = match std::fs::read(&path) {
            Ok(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => Some(bytes),
            Ok(_) => None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        let snapshot = match existing {
            Some(bytes) => decode(&bytes)?,
            None => {
                let fresh = Snapshot::new(clock.now());
                write_atomic(&path, &encode(&fresh)?)?;
                debug!(path = %path.display(), "created empty ledger");
                fresh
            }
        };
        Ok(Self {
            path,
            snapshot: RwLock::new(snapshot),
            clock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Validate, mutate, stamp `updatedAt`, persist, then publish.
    pub fn with_exclusive<T>(&self, mutator: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        // A poisoned lock still guards a consistent snapshot: mutators only
        // ever touch the staged copy.
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let mut staged = guard.clone();
        let out = mutator(&mut staged)?;
        staged.updated_at = self.clock.now();
        let bytes = encode(&staged)?;
        if let Err(e) = write_atomic(&self.path, &bytes) {
            error!(path = %self.path.display(), error = %e, "ledger write failed; change discarded");
            return Err(e);
        }
        *guard = staged;
        Ok(out)
    }

    pub fn with_shared<T>(&self, reader: impl FnOnce(&Snapshot) -> T) -> T {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        reader(&guard)
    }

    // -- CRUD helpers -------------------------------------------------------

    pub fn get_user(&self, id: &UserId) -> Result<User> {
        self.with_shared(|s| s.user(id).cloned())
    }

    pub fn get_user_by_name(&self, name: &str) -> Result<User> {
        self.with_shared(|s| {
            s.user_by_name(name)
                .cloned()
                .ok_or_else(|| PennyError::NotFound(format!("user {name}")))
        })
    }

    pub fn list_users(&self) -> Vec<User> {
        self.with_shared(|s| s.users().cloned().collect())
    }

    /// Atomic read-modify-write of one user.
    pub fn update_user(&self, id: &UserId, f: impl FnOnce(&mut User) -> Result<()>) -> Result<User> {
        self.with_exclusive(|s| {
            let user = s.user_mut(id)?;
            f(user)?;
            Ok(user.clone())
        })
    }

    pub fn create_account(&self, owner: &UserId, currency: &str) -> Result<Account> {
        let now = self.clock.now();
        self.with_exclusive(|s| {
            s.user(owner)?;
            let account = Account {
                id: s.next_account_id(),
                owner: owner.clone(),
                currency: currency.to_string(),
                balance: 0,
                closed: false,
                created_at: now,
            };
            s.insert_account(account.clone())?;
            Ok(account)
        })
    }

    pub fn get_account(&self, id: &AccountId) -> Result<Account> {
        self.with_shared(|s| s.account(id).cloned())
    }

    pub fn update_account(
        &self,
        id: &AccountId,
        f: impl FnOnce(&mut Account) -> Result<()>,
    ) -> Result<Account> {
        self.with_exclusive(|s| {
            let account = s.account_mut(id)?;
            f(account)?;
            Ok(account.clone())
        })
    }

    pub fn list_accounts_by_owner(&self, owner: &UserId) -> Result<Vec<Account>> {
        self.with_shared(|s| {
            s.user(owner)?;
            Ok(s.accounts_of(owner).into_iter().cloned().collect())
        })
    }

    pub fn list_transactions_by_account(&self, id: &AccountId, limit: usize) -> Result<Vec<Transaction>> {
        self.with_shared(|s| Ok(s.history(id, limit)?.into_iter().cloned().collect()))
    }

    pub fn list_transactions_by_user(&self, id: &UserId, limit: usize) -> Result<Vec<Transaction>> {
        self.with_shared(|s| Ok(s.user_history(id, limit)?.into_iter().cloned().collect()))
    }

    pub fn snapshot(&self) -> Snapshot {
        self.with_shared(Snapshot::clone)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{Role, TxKind};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    fn test_store() -> (tempfile::TempDir, Arc<ManualClock>, LedgerStore) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let store = LedgerStore::open(dir.path().join("ledger.json"), clock.clone()).unwrap();
        (dir, clock, store)
    }

    fn add_user(store: &LedgerStore, name: &str) -> UserId {
        let now = store.clock().now();
        store
            .with_exclusive(|s| {
                let id = s.next_user_id();
                s.insert_user(User {
                    id: id.clone(),
                    username: Some(name.to_string()),
                    display_name: name.to_string(),
                    password_hash: String::new(),
                    role: Role::User,
                    accounts: vec![],
                    chat_id: None,
                    game: None,
                    created_at: now,
                })?;
                Ok(id)
            })
            .unwrap()
    }

    fn add_deposit(store: &LedgerStore, account: &AccountId, amount: i64) -> TxId {
        let now = store.clock().now();
        store
            .with_exclusive(|s| {
                let id = s.next_tx_id();
                s.insert_transaction(Transaction {
                    id: id.clone(),
                    kind: TxKind::Deposit,
                    from: None,
                    to: Some(account.clone()),
                    user: None,
                    item: None,
                    amount,
                    currency: "RUB".into(),
                    note: String::new(),
                    created_at: now,
                })?;
                Ok(id)
            })
            .unwrap()
    }

    #[test]
    fn test_open_creates_file_with_stable_keys() {
        let (dir, _clock, _store) = test_store();
        let raw = std::fs::read_to_string(dir.path().join("ledger.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        for key in ["version", "users", "accounts", "txs", "nextUser", "nextAcc", "nextTx", "createdAt", "updatedAt"] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert!(raw.contains("\n  \"users\""), "snapshot should be indented");
    }

    #[test]
    fn test_sequences_are_monotonic_and_per_kind() {
        let (_dir, _clock, store) = test_store();
        let a = add_user(&store, "alice");
        let b = add_user(&store, "bob");
        assert_eq!(a.as_str(), "u000001");
        assert_eq!(b.as_str(), "u000002");
        let acc = store.create_account(&a, "RUB").unwrap();
        assert_eq!(acc.id.as_str(), "a000001");
    }

    #[test]
    fn test_reopen_round_trips_snapshot() {
        let (dir, clock, store) = test_store();
        let alice = add_user(&store, "alice");
        let acc = store.create_account(&alice, "RUB").unwrap();
        add_deposit(&store, &acc.id, 500);
        let before = store.snapshot();
        drop(store);

        let reopened = LedgerStore::open(dir.path().join("ledger.json"), clock).unwrap();
        assert_eq!(reopened.snapshot(), before);
        // counters survive, so the next id continues the sequence
        let carol = add_user(&reopened, "carol");
        assert_eq!(carol.as_str(), "u000002");
    }

    #[test]
    fn test_failed_mutator_leaves_state_untouched() {
        let (_dir, _clock, store) = test_store();
        let alice = add_user(&store, "alice");
        let before = store.snapshot();
        let result: Result<()> = store.with_exclusive(|s| {
            s.next_user_id();
            s.user_mut(&alice)?.display_name = "mallory".into();
            Err(PennyError::Invalid("nope".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_failed_write_discards_change() {
        let (dir, _clock, store) = test_store();
        let alice = add_user(&store, "alice");
        let before = store.snapshot();
        // Swap the ledger file for a directory so the rename fails.
        let path = dir.path().join("ledger.json");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let result = store.update_user(&alice, |u| {
            u.display_name = "renamed".into();
            Ok(())
        });
        assert!(matches!(result, Err(PennyError::Io(_))));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_updated_at_tracks_clock() {
        let (_dir, clock, store) = test_store();
        clock.advance(Duration::minutes(5));
        add_user(&store, "alice");
        assert_eq!(store.snapshot().updated_at(), start() + Duration::minutes(5));
    }

    #[test]
    fn test_not_found_and_duplicate() {
        let (_dir, _clock, store) = test_store();
        assert!(matches!(store.get_user(&UserId::from("u000009")), Err(PennyError::NotFound(_))));
        assert!(matches!(store.get_account(&AccountId::from("a000009")), Err(PennyError::NotFound(_))));
        assert!(matches!(
            store.create_account(&UserId::from("u000009"), "RUB"),
            Err(PennyError::NotFound(_))
        ));

        let alice = add_user(&store, "alice");
        let dup: Result<()> = store.with_exclusive(|s| {
            let user = s.user(&alice)?.clone();
            s.insert_user(user)
        });
        assert!(matches!(dup, Err(PennyError::AlreadyExists(_))));
    }

    #[test]
    fn test_history_keeps_most_recent_tail() {
        let (_dir, clock, store) = test_store();
        let alice = add_user(&store, "alice");
        let acc = store.create_account(&alice, "RUB").unwrap();
        let mut ids = Vec::new();
        for amount in 1..=5 {
            clock.advance(Duration::seconds(1));
            ids.push(add_deposit(&store, &acc.id, amount));
        }
        let last_two = store.list_transactions_by_account(&acc.id, 2).unwrap();
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].id, ids[3]);
        assert_eq!(last_two[1].id, ids[4]);

        let all = store.list_transactions_by_account(&acc.id, 0).unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn test_history_orders_by_created_at_then_id() {
        let (_dir, clock, store) = test_store();
        let alice = add_user(&store, "alice");
        let acc = store.create_account(&alice, "RUB").unwrap();
        clock.advance(Duration::seconds(10));
        let late = add_deposit(&store, &acc.id, 1);
        // clock skew: a later id stamped earlier
        clock.advance(Duration::seconds(-5));
        let early = add_deposit(&store, &acc.id, 2);
        let same_instant = add_deposit(&store, &acc.id, 3);

        let all = store.list_transactions_by_account(&acc.id, 0).unwrap();
        let order: Vec<_> = all.iter().map(|t| t.id.clone()).collect();
        assert_eq!(order, vec![early, same_instant, late]);
    }

    #[test]
    fn test_history_unknown_account() {
        let (_dir, _clock, store) = test_store();
        let err = store.list_transactions_by_account(&AccountId::from("a000001"), 0).unwrap_err();
        assert!(matches!(err, PennyError::NotFound(_)));
    }

    #[test]
    fn test_concurrent_writers_never_share_ids() {
        let (_dir, _clock, store) = test_store();
        std::thread::scope(|scope| {
            for t in 0..4 {
                let store = &store;
                scope.spawn(move || {
                    for i in 0..10 {
                        add_user(store, &format!("user-{t}-{i}"));
                    }
                });
            }
        });
        let users = store.list_users();
        assert_eq!(users.len(), 40);
        let mut ids: Vec<_> = users.iter().map(|u| u.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 40);
        assert_eq!(ids.last().unwrap().as_str(), "u000040");
    }

    #[test]
    fn test_open_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{ not json").unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        assert!(matches!(LedgerStore::open(&path, clock), Err(PennyError::Json(_))));
    }
}
