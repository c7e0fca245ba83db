use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password};
use crate::backup;
use crate::error::{PennyError, Result};
use crate::fmt::money;
use crate::models::{Account, AccountId, Role, Transaction, TxKind, User, UserId};
use crate::money::ensure_positive;
use crate::rates::{ensure_rates_file, load_rates, save_rates, Rates};
use crate::store::{LedgerStore, Snapshot};

pub struct BankOptions {
    pub rates_path: PathBuf,
    pub backups_dir: PathBuf,
    pub default_currency: String,
    pub auto_backup: bool,
}

/// Fiat side of the ledger: users, accounts and balance-moving operations.
/// Every operation validates and applies inside one exclusive-access call.
pub struct Bank {
    store: Arc<LedgerStore>,
    opts: BankOptions,
    // serializes read-modify-write of the rates file
    rates_lock: Mutex<()>,
}

fn live_account_mut<'a>(s: &'a mut Snapshot, id: &AccountId) -> Result<&'a mut Account> {
    let account = s.account_mut(id)?;
    if account.closed {
        return Err(PennyError::AccountClosed(id.to_string()));
    }
    Ok(account)
}

fn overflow(amount: i64) -> PennyError {
    PennyError::InvalidAmount(format!("{amount} overflows the balance"))
}

impl Bank {
    pub fn open(store: Arc<LedgerStore>, opts: BankOptions) -> Result<Self> {
        ensure_rates_file(&opts.rates_path, store.clock().now())?;
        Ok(Self {
            store,
            opts,
            rates_lock: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    fn now(&self) -> DateTime<Utc> {
        self.store.clock().now()
    }

    fn after_commit(&self) {
        if !self.opts.auto_backup {
            return;
        }
        if let Err(e) = self.backup_now() {
            warn!(error = %e, "auto-backup failed");
        }
    }

    /// Checks the actor's current role in the ledger, not the copy passed in.
    fn require_admin(&self, actor: &User, action: &str) -> Result<()> {
        let current = self.store.get_user(&actor.id)?;
        if !current.is_admin() {
            warn!(user = %actor.id, action, "admin action refused");
            return Err(PennyError::Forbidden(action.to_string()));
        }
        Ok(())
    }

    // -- users --------------------------------------------------------------

    /// New users start with one account in the default currency.
    pub fn register(&self, username: &str, password: &str) -> Result<User> {
        self.create_user(username, password, Role::User)
    }

    fn create_user(&self, username: &str, password: &str, role: Role) -> Result<User> {
        let username = username.trim();
        if username.chars().count() < 3 {
            return Err(PennyError::Invalid(
                "username must be at least 3 characters".to_string(),
            ));
        }
        if password.chars().count() < 4 {
            return Err(PennyError::Invalid(
                "password must be at least 4 characters".to_string(),
            ));
        }
        let password_hash = hash_password(password)?;
        let now = self.now();
        let currency = self.opts.default_currency.to_uppercase();
        let user = self.store.with_exclusive(|s| {
            if role == Role::Admin && s.admins().next().is_some() {
                return Err(PennyError::AlreadyExists("an admin user".to_string()));
            }
            if s.user_by_name(username).is_some() {
                return Err(PennyError::AlreadyExists(format!("user {username}")));
            }
            let id = s.next_user_id();
            s.insert_user(User {
                id: id.clone(),
                username: Some(username.to_string()),
                display_name: username.to_string(),
                password_hash,
                role,
                accounts: Vec::new(),
                chat_id: None,
                game: None,
                created_at: now,
            })?;
            if role == Role::User {
                let account = Account {
                    id: s.next_account_id(),
                    owner: id.clone(),
                    currency,
                    balance: 0,
                    closed: false,
                    created_at: now,
                };
                s.insert_account(account)?;
            }
            Ok(s.user(&id)?.clone())
        })?;
        info!(user = %user.id, name = %user.display_name, role = %user.role, "registered user");
        if role == Role::User {
            self.after_commit();
        }
        Ok(user)
    }

    pub fn has_admin(&self) -> bool {
        self.store.with_shared(|s| s.admins().next().is_some())
    }

    /// Create `admin` on first start. Returns the new user, or `None` when
    /// some admin already exists.
    pub fn ensure_default_admin(&self, password: &str) -> Result<Option<User>> {
        match self.create_user("admin", password, Role::Admin) {
            Ok(user) => Ok(Some(user)),
            Err(PennyError::AlreadyExists(_)) if self.has_admin() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Unknown user and wrong password are indistinguishable to the caller.
    pub fn login(&self, username: &str, password: &str) -> Result<User> {
        let user = self
            .store
            .get_user_by_name(username.trim())
            .map_err(|_| PennyError::Auth)?;
        if !verify_password(password, &user.password_hash) {
            return Err(PennyError::Auth);
        }
        Ok(user)
    }

    pub fn users(&self) -> Vec<User> {
        self.store.list_users()
    }

    pub fn set_role(&self, actor: &User, id: &UserId, role: Role) -> Result<User> {
        self.require_admin(actor, "change roles")?;
        let user = self.store.update_user(id, |u| {
            u.role = role;
            Ok(())
        })?;
        info!(user = %id, role = %role, "changed role");
        Ok(user)
    }

    // -- accounts -----------------------------------------------------------

    pub fn open_account(&self, owner: &UserId, currency: Option<&str>) -> Result<Account> {
        let currency = currency
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.opts.default_currency.to_uppercase());
        let account = self.store.create_account(owner, &currency)?;
        info!(account = %account.id, owner = %owner, currency = %account.currency, "opened account");
        self.after_commit();
        Ok(account)
    }

    /// Closing twice is fine; a closed account refuses every later mutation.
    pub fn close_account(&self, actor: &User, id: &AccountId) -> Result<Account> {
        self.require_admin(actor, "close accounts")?;
        let account = self.store.update_account(id, |a| {
            a.closed = true;
            Ok(())
        })?;
        info!(account = %id, balance = account.balance, "closed account");
        self.after_commit();
        Ok(account)
    }

    pub fn account(&self, id: &AccountId) -> Result<Account> {
        self.store.get_account(id)
    }

    pub fn accounts(&self, owner: &UserId) -> Result<Vec<Account>> {
        self.store.list_accounts_by_owner(owner)
    }

    /// The account, provided `owner` holds it. Someone else's account looks
    /// exactly like a missing one.
    pub fn owned_account(&self, owner: &UserId, id: &AccountId) -> Result<Account> {
        let account = self.store.get_account(id)?;
        if &account.owner != owner {
            return Err(PennyError::NotFound(format!("account {id}")));
        }
        Ok(account)
    }

    // -- money movement -----------------------------------------------------

    pub fn deposit(&self, account: &AccountId, amount: i64, note: &str) -> Result<Transaction> {
        ensure_positive(amount)?;
        let now = self.now();
        let tx = self.store.with_exclusive(|s| {
            let acc = live_account_mut(s, account)?;
            acc.balance = acc.balance.checked_add(amount).ok_or_else(|| overflow(amount))?;
            let currency = acc.currency.clone();
            let tx = Transaction {
                id: s.next_tx_id(),
                kind: TxKind::Deposit,
                from: None,
                to: Some(account.clone()),
                user: None,
                item: None,
                amount,
                currency,
                note: note.trim().to_string(),
                created_at: now,
            };
            s.insert_transaction(tx.clone())?;
            Ok(tx)
        })?;
        info!(tx = %tx.id, account = %account, amount, "deposit");
        self.after_commit();
        Ok(tx)
    }

    pub fn withdraw(&self, account: &AccountId, amount: i64, note: &str) -> Result<Transaction> {
        ensure_positive(amount)?;
        let now = self.now();
        let tx = self.store.with_exclusive(|s| {
            let acc = live_account_mut(s, account)?;
            if acc.balance < amount {
                return Err(PennyError::InsufficientFunds {
                    needed: money(amount),
                    available: money(acc.balance),
                });
            }
            acc.balance -= amount;
            let currency = acc.currency.clone();
            let tx = Transaction {
                id: s.next_tx_id(),
                kind: TxKind::Withdraw,
                from: Some(account.clone()),
                to: None,
                user: None,
                item: None,
                amount,
                currency,
                note: note.trim().to_string(),
                created_at: now,
            };
            s.insert_transaction(tx.clone())?;
            Ok(tx)
        })?;
        info!(tx = %tx.id, account = %account, amount, "withdraw");
        self.after_commit();
        Ok(tx)
    }

    /// Debit `amount` from `from`; credit the same amount, or its converted
    /// value when the currencies differ. The record carries the debited side.
    pub fn transfer(&self, from: &AccountId, to: &AccountId, amount: i64, note: &str) -> Result<Transaction> {
        ensure_positive(amount)?;
        if from == to {
            return Err(PennyError::Invalid(
                "cannot transfer to the same account".to_string(),
            ));
        }
        let now = self.now();
        let tx = self.store.with_exclusive(|s| {
            let src = s.account(from)?.clone();
            let dst = s.account(to)?.clone();
            for acc in [&src, &dst] {
                if acc.closed {
                    return Err(PennyError::AccountClosed(acc.id.to_string()));
                }
            }
            if src.balance < amount {
                return Err(PennyError::InsufficientFunds {
                    needed: money(amount),
                    available: money(src.balance),
                });
            }
            let mut note = note.trim().to_string();
            let credit = if src.currency.eq_ignore_ascii_case(&dst.currency) {
                amount
            } else {
                let rates = load_rates(&self.opts.rates_path)?;
                let credit = rates.convert(&src.currency, &dst.currency, amount)?;
                note = format!("{note} (FX {}\u{2192}{})", src.currency, dst.currency)
                    .trim()
                    .to_string();
                credit
            };
            let new_dst = dst.balance.checked_add(credit).ok_or_else(|| overflow(credit))?;
            s.account_mut(from)?.balance = src.balance - amount;
            s.account_mut(to)?.balance = new_dst;
            let tx = Transaction {
                id: s.next_tx_id(),
                kind: TxKind::Transfer,
                from: Some(from.clone()),
                to: Some(to.clone()),
                user: None,
                item: None,
                amount,
                currency: src.currency.clone(),
                note,
                created_at: now,
            };
            s.insert_transaction(tx.clone())?;
            Ok(tx)
        })?;
        info!(tx = %tx.id, from = %from, to = %to, amount, "transfer");
        self.after_commit();
        Ok(tx)
    }

    pub fn history(&self, account: &AccountId, limit: usize) -> Result<Vec<Transaction>> {
        self.store.list_transactions_by_account(account, limit)
    }

    // -- exchange rates -----------------------------------------------------

    pub fn rates(&self) -> Result<Rates> {
        load_rates(&self.opts.rates_path)
    }

    pub fn set_rate(&self, actor: &User, currency: &str, rate: f64) -> Result<Rates> {
        self.require_admin(actor, "set exchange rates")?;
        let _guard = self.rates_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rates = self.rates()?;
        rates.set(currency, rate, self.now())?;
        save_rates(&self.opts.rates_path, &rates)?;
        info!(currency = %currency.trim().to_uppercase(), rate, "set exchange rate");
        Ok(rates)
    }

    pub fn convert(&self, from: &str, to: &str, amount: i64) -> Result<i64> {
        ensure_positive(amount)?;
        self.rates()?.convert(from, to, amount)
    }

    // -- backups ------------------------------------------------------------

    pub fn backup_now(&self) -> Result<PathBuf> {
        backup::backup_now(&self.store, &self.opts.backups_dir)
    }

    pub fn list_backups(&self) -> Result<Vec<String>> {
        backup::list_backups(&self.opts.backups_dir)
    }

    /// Overwrites the live file only; the running process keeps its state
    /// until restarted.
    pub fn restore_backup(&self, actor: &User, name: &str) -> Result<()> {
        self.require_admin(actor, "restore backups")?;
        backup::restore_backup(self.store.path(), &self.opts.backups_dir, name)
    }
}
