use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::accrual::{accrue, window_remaining};
use crate::catalog::{Catalog, CatalogItem, ShopPage, SHOP_PAGE_SIZE};
use crate::error::{PennyError, Result};
use crate::fmt::play;
use crate::models::{GameProfile, Instrument, Role, Transaction, TxKind, User, UserId};
use crate::money::play_to_minor;
use crate::settings::Settings;
use crate::store::{LedgerStore, Snapshot};

#[derive(Debug, Clone)]
pub struct GameOptions {
    pub window: Duration,
    /// Share of the unit price paid back on sale, within 0..=1.
    pub refund_factor: f64,
    pub max_items: usize,
    pub price_instrument: Instrument,
    pub accrual_instrument: Instrument,
}

impl GameOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            window: settings.accrual_window(),
            refund_factor: settings.refund_factor,
            max_items: settings.max_items,
            price_instrument: settings.price_instrument,
            accrual_instrument: settings.accrual_instrument,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
    pub user: UserId,
    pub display_name: String,
    pub balances: BTreeMap<Instrument, f64>,
    pub items: usize,
    pub capacity: usize,
    pub income_per_sec: f64,
    /// Income folded in by this interaction.
    pub earned: f64,
    pub window_remaining_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub tx: Transaction,
    pub item: CatalogItem,
    /// Price-instrument balance after the trade.
    pub balance: f64,
    pub items: usize,
    pub income_per_sec: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLine {
    pub id: u32,
    pub name: String,
    pub units: u32,
    pub income_per_sec: f64,
}

/// The mining game: chat users buy items that earn play money over time.
///
/// Each call resolves the player (creating them on first contact), runs
/// accrual, then applies its own change, all in one exclusive section. A
/// failed call therefore leaves no trace, accrual included.
pub struct Game {
    store: Arc<LedgerStore>,
    catalog: Catalog,
    opts: GameOptions,
}

fn profile_mut<'a>(s: &'a mut Snapshot, id: &UserId) -> Result<&'a mut GameProfile> {
    s.user_mut(id)?
        .game
        .as_mut()
        .ok_or_else(|| PennyError::NotFound(format!("game profile for {id}")))
}

impl Game {
    pub fn new(store: Arc<LedgerStore>, catalog: Catalog, opts: GameOptions) -> Self {
        Self { store, catalog, opts }
    }

    fn now(&self) -> DateTime<Utc> {
        self.store.clock().now()
    }

    fn with_player<T>(
        &self,
        chat_id: i64,
        display_name: &str,
        apply: impl FnOnce(&mut Snapshot, &UserId, f64, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let now = self.now();
        let window = self.opts.window;
        self.store.with_exclusive(|s| {
            let existing = s.user_by_chat(chat_id).map(|u| u.id.clone());
            let id = match existing {
                Some(id) => id,
                None => {
                    let id = s.next_user_id();
                    s.insert_user(User {
                        id: id.clone(),
                        username: None,
                        display_name: display_name.trim().to_string(),
                        password_hash: String::new(),
                        role: Role::User,
                        accounts: Vec::new(),
                        chat_id: Some(chat_id),
                        game: Some(GameProfile::new(now, window)),
                        created_at: now,
                    })?;
                    info!(user = %id, chat_id, "new player");
                    id
                }
            };
            let profile = s
                .user_mut(&id)?
                .game
                .get_or_insert_with(|| GameProfile::new(now, window));
            let rate = self.catalog.income_rate(&profile.owned_items);
            let earned = accrue(profile, self.opts.accrual_instrument, rate, now, window);
            apply(s, &id, earned, now)
        })
    }

    fn status_of(&self, s: &Snapshot, id: &UserId, earned: f64, now: DateTime<Utc>) -> Result<PlayerStatus> {
        let user = s.user(id)?;
        let profile = user
            .game
            .as_ref()
            .ok_or_else(|| PennyError::NotFound(format!("game profile for {id}")))?;
        Ok(PlayerStatus {
            user: id.clone(),
            display_name: user.display_name.clone(),
            balances: profile.balances.clone(),
            items: profile.item_count(),
            capacity: self.opts.max_items,
            income_per_sec: self.catalog.income_rate(&profile.owned_items),
            earned,
            window_remaining_secs: window_remaining(profile, now).num_seconds(),
        })
    }

    /// Bring the player up to date and report where they stand.
    pub fn touch(&self, chat_id: i64, display_name: &str) -> Result<PlayerStatus> {
        self.with_player(chat_id, display_name, |s, id, earned, now| {
            self.status_of(s, id, earned, now)
        })
    }

    pub fn inventory(&self, chat_id: i64, display_name: &str) -> Result<Vec<InventoryLine>> {
        self.with_player(chat_id, display_name, |s, id, _, _| {
            let profile = profile_mut(s, id)?;
            Ok(profile
                .owned_items
                .iter()
                .map(|(&item_id, &units)| {
                    let (name, rate) = match self.catalog.get(item_id) {
                        Some(item) => (item.name.clone(), item.income_rate),
                        None => (format!("#{item_id}"), 0.0),
                    };
                    InventoryLine {
                        id: item_id,
                        name,
                        units,
                        income_per_sec: rate * units as f64,
                    }
                })
                .collect())
        })
    }

    pub fn shop(&self, page: usize) -> ShopPage<'_> {
        self.catalog.page(page, SHOP_PAGE_SIZE)
    }

    pub fn buy(&self, chat_id: i64, display_name: &str, item_id: u32) -> Result<Receipt> {
        let item = self.catalog.require(item_id)?.clone();
        let instrument = self.opts.price_instrument;
        let receipt = self.with_player(chat_id, display_name, |s, id, _, now| {
            let profile = profile_mut(s, id)?;
            if profile.item_count() >= self.opts.max_items {
                return Err(PennyError::CapacityExceeded(self.opts.max_items));
            }
            let balance = profile.balance(instrument);
            if balance < item.unit_price {
                return Err(PennyError::InsufficientFunds {
                    needed: format!("{} {instrument}", play(item.unit_price)),
                    available: format!("{} {instrument}", play(balance)),
                });
            }
            profile.credit(instrument, -item.unit_price);
            profile.add_item(item.id);
            let balance = profile.balance(instrument);
            let items = profile.item_count();
            let income_per_sec = self.catalog.income_rate(&profile.owned_items);
            let tx = Transaction {
                id: s.next_tx_id(),
                kind: TxKind::Purchase,
                from: None,
                to: None,
                user: Some(id.clone()),
                item: Some(item.id),
                amount: play_to_minor(item.unit_price),
                currency: instrument.code().to_string(),
                note: item.name.clone(),
                created_at: now,
            };
            s.insert_transaction(tx.clone())?;
            Ok(Receipt {
                tx,
                item: item.clone(),
                balance,
                items,
                income_per_sec,
            })
        })?;
        info!(item = item_id, tx = %receipt.tx.id, price = item.unit_price, "purchase");
        Ok(receipt)
    }

    pub fn sell(&self, chat_id: i64, display_name: &str, item_id: u32) -> Result<Receipt> {
        let item = self.catalog.require(item_id)?.clone();
        let instrument = self.opts.price_instrument;
        let refund = item.unit_price * self.opts.refund_factor;
        let receipt = self.with_player(chat_id, display_name, |s, id, _, now| {
            let profile = profile_mut(s, id)?;
            if !profile.remove_item(item.id) {
                return Err(PennyError::NotOwned(item.id));
            }
            profile.credit(instrument, refund);
            let balance = profile.balance(instrument);
            let items = profile.item_count();
            let income_per_sec = self.catalog.income_rate(&profile.owned_items);
            let tx = Transaction {
                id: s.next_tx_id(),
                kind: TxKind::Sale,
                from: None,
                to: None,
                user: Some(id.clone()),
                item: Some(item.id),
                amount: play_to_minor(refund),
                currency: instrument.code().to_string(),
                note: item.name.clone(),
                created_at: now,
            };
            s.insert_transaction(tx.clone())?;
            Ok(Receipt {
                tx,
                item: item.clone(),
                balance,
                items,
                income_per_sec,
            })
        })?;
        info!(item = item_id, tx = %receipt.tx.id, refund, "sale");
        Ok(receipt)
    }

    /// Wipe balances and inventory and open a fresh window.
    pub fn reset(&self, chat_id: i64, display_name: &str) -> Result<PlayerStatus> {
        let window = self.opts.window;
        let status = self.with_player(chat_id, display_name, |s, id, _, now| {
            *profile_mut(s, id)? = GameProfile::new(now, window);
            self.status_of(s, id, 0.0, now)
        })?;
        info!(user = %status.user, "game reset");
        Ok(status)
    }

    /// Purchases and sales recorded for a player, oldest first.
    pub fn trades(&self, chat_id: i64, limit: usize) -> Result<Vec<Transaction>> {
        let id = self
            .store
            .with_shared(|s| s.user_by_chat(chat_id).map(|u| u.id.clone()))
            .ok_or_else(|| PennyError::NotFound(format!("player {chat_id}")))?;
        self.store.list_transactions_by_user(&id, limit)
    }
}
