use serde::Serialize;
use tracing::debug;

use crate::bank::Bank;
use crate::catalog::CatalogItem;
use crate::error::{ErrorKind, PennyError, Result};
use crate::game::{Game, InventoryLine, PlayerStatus, Receipt};
use crate::models::{Account, AccountId, Transaction, UserId};
use crate::money::parse_amount;
use crate::session::{Conversation, SessionStore};

/// One message from the chat transport.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub user_id: i64,
    pub display_name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Start,
    Help,
    Balance,
    Mine,
    Inventory,
    Shop { page: usize },
    Buy { item: u32 },
    Sell { item: u32 },
    Reset,
    Open { currency: Option<String> },
    Accounts,
    Deposit { account: AccountId, amount: Option<i64> },
    Withdraw { account: AccountId, amount: Option<i64> },
    Transfer { from: AccountId, to: AccountId, amount: Option<i64> },
    History { account: AccountId, limit: Option<usize> },
    Cancel,
    /// Anything that is not a command; only meaningful mid-conversation.
    Text(String),
}

pub const HELP: &[&str] = &[
    "/balance - balances and income",
    "/mine - mining window status",
    "/shop [page] - browse the shop",
    "/buy <id> - buy an item",
    "/sell <id> - sell an item",
    "/inventory - owned items",
    "/reset - start over",
    "/open [CUR] - open a bank account",
    "/accounts - your bank accounts",
    "/deposit <acc> [amount]",
    "/withdraw <acc> [amount]",
    "/transfer <from> <to> [amount]",
    "/history <acc> [limit]",
    "/cancel - abandon the current step",
];

fn usage(text: &str) -> PennyError {
    PennyError::Invalid(format!("usage: {text}"))
}

fn arg<'a>(args: &[&'a str], idx: usize, text: &str) -> Result<&'a str> {
    args.get(idx).copied().ok_or_else(|| usage(text))
}

fn item_arg(args: &[&str], text: &str) -> Result<u32> {
    arg(args, 0, text)?.parse().map_err(|_| usage(text))
}

fn amount_arg(args: &[&str], idx: usize) -> Result<Option<i64>> {
    args.get(idx).map(|raw| parse_amount(raw)).transpose()
}

/// Parse one line of chat input. `/cmd@botname` is accepted like `/cmd`.
pub fn parse(text: &str) -> Result<Action> {
    let text = text.trim();
    let Some(body) = text.strip_prefix('/') else {
        return Ok(Action::Text(text.to_string()));
    };
    let mut words = body.split_whitespace();
    let command = words
        .next()
        .unwrap_or_default()
        .split('@')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let args: Vec<&str> = words.collect();

    let action = match command.as_str() {
        "start" => Action::Start,
        "help" => Action::Help,
        "balance" => Action::Balance,
        "mine" => Action::Mine,
        "inventory" => Action::Inventory,
        "shop" => Action::Shop {
            page: match args.first() {
                Some(raw) => raw.parse().map_err(|_| usage("/shop [page]"))?,
                None => 1,
            },
        },
        "buy" => Action::Buy {
            item: item_arg(&args, "/buy <id>")?,
        },
        "sell" => Action::Sell {
            item: item_arg(&args, "/sell <id>")?,
        },
        "reset" => Action::Reset,
        "open" => Action::Open {
            currency: args.first().map(|c| c.to_uppercase()),
        },
        "accounts" => Action::Accounts,
        "deposit" => Action::Deposit {
            account: arg(&args, 0, "/deposit <acc> [amount]")?.into(),
            amount: amount_arg(&args, 1)?,
        },
        "withdraw" => Action::Withdraw {
            account: arg(&args, 0, "/withdraw <acc> [amount]")?.into(),
            amount: amount_arg(&args, 1)?,
        },
        "transfer" => Action::Transfer {
            from: arg(&args, 0, "/transfer <from> <to> [amount]")?.into(),
            to: arg(&args, 1, "/transfer <from> <to> [amount]")?.into(),
            amount: amount_arg(&args, 2)?,
        },
        "history" => Action::History {
            account: arg(&args, 0, "/history <acc> [limit]")?.into(),
            limit: match args.get(1) {
                Some(raw) => Some(raw.parse().map_err(|_| usage("/history <acc> [limit]"))?),
                None => None,
            },
        },
        "cancel" => Action::Cancel,
        other => return Err(PennyError::Invalid(format!("unknown command /{other}; try /help"))),
    };
    Ok(action)
}

/// Structured answer for the transport to render however it likes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Help {
        commands: Vec<&'static str>,
    },
    Status(PlayerStatus),
    Mining {
        income_per_sec: f64,
        earned: f64,
        window_remaining_secs: i64,
    },
    Inventory {
        items: Vec<InventoryLine>,
    },
    Shop {
        page: usize,
        pages: usize,
        items: Vec<CatalogItem>,
    },
    Trade(Receipt),
    AccountOpened(Account),
    Accounts {
        accounts: Vec<Account>,
    },
    Transaction(Transaction),
    History {
        account: AccountId,
        transactions: Vec<Transaction>,
    },
    Prompt {
        pending: Conversation,
        message: String,
    },
    Cancelled {
        had_pending: bool,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl From<&PennyError> for Reply {
    fn from(e: &PennyError) -> Self {
        Reply::Error {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Routes inbound chat messages to the bank and the game.
pub struct ChatService {
    bank: Bank,
    game: Game,
    sessions: SessionStore,
    history_limit: usize,
}

impl ChatService {
    pub fn new(bank: Bank, game: Game, history_limit: usize) -> Self {
        Self {
            bank,
            game,
            sessions: SessionStore::new(),
            history_limit,
        }
    }

    /// Never fails: errors come back as [`Reply::Error`].
    pub fn handle(&self, msg: &Inbound) -> Reply {
        match self.try_handle(msg) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(chat_id = msg.user_id, error = %e, "chat command failed");
                Reply::from(&e)
            }
        }
    }

    fn try_handle(&self, msg: &Inbound) -> Result<Reply> {
        let chat = msg.user_id;
        let name = msg.display_name.as_str();
        let action = parse(&msg.text)?;
        if !matches!(action, Action::Text(_) | Action::Cancel) {
            // a new command abandons whatever was pending
            self.sessions.take(chat);
        }

        match action {
            Action::Text(raw) => match self.sessions.take(chat) {
                Some(state) => self.resume(chat, name, state, &raw),
                None => Err(PennyError::Invalid("not a command; try /help".to_string())),
            },
            Action::Cancel => Ok(Reply::Cancelled {
                had_pending: self.sessions.take(chat).is_some(),
            }),
            Action::Start | Action::Balance => Ok(Reply::Status(self.game.touch(chat, name)?)),
            Action::Help => Ok(Reply::Help {
                commands: HELP.to_vec(),
            }),
            Action::Mine => {
                let status = self.game.touch(chat, name)?;
                Ok(Reply::Mining {
                    income_per_sec: status.income_per_sec,
                    earned: status.earned,
                    window_remaining_secs: status.window_remaining_secs,
                })
            }
            Action::Inventory => Ok(Reply::Inventory {
                items: self.game.inventory(chat, name)?,
            }),
            Action::Shop { page } => {
                let shop = self.game.shop(page);
                Ok(Reply::Shop {
                    page: shop.page,
                    pages: shop.pages,
                    items: shop.items.to_vec(),
                })
            }
            Action::Buy { item } => Ok(Reply::Trade(self.game.buy(chat, name, item)?)),
            Action::Sell { item } => Ok(Reply::Trade(self.game.sell(chat, name, item)?)),
            Action::Reset => Ok(Reply::Status(self.game.reset(chat, name)?)),
            Action::Open { currency } => {
                let user = self.player(chat, name)?;
                Ok(Reply::AccountOpened(
                    self.bank.open_account(&user, currency.as_deref())?,
                ))
            }
            Action::Accounts => {
                let user = self.player(chat, name)?;
                Ok(Reply::Accounts {
                    accounts: self.bank.accounts(&user)?,
                })
            }
            Action::Deposit { account, amount } => {
                self.player(chat, name)?;
                self.bank.account(&account)?;
                match amount {
                    Some(amount) => Ok(Reply::Transaction(self.bank.deposit(&account, amount, "chat")?)),
                    None => Ok(self.prompt(chat, Conversation::AwaitingDepositAmount { account })),
                }
            }
            Action::Withdraw { account, amount } => {
                let user = self.player(chat, name)?;
                self.bank.owned_account(&user, &account)?;
                match amount {
                    Some(amount) => Ok(Reply::Transaction(self.bank.withdraw(&account, amount, "chat")?)),
                    None => Ok(self.prompt(chat, Conversation::AwaitingWithdrawAmount { account })),
                }
            }
            Action::Transfer { from, to, amount } => {
                let user = self.player(chat, name)?;
                self.bank.owned_account(&user, &from)?;
                self.bank.account(&to)?;
                match amount {
                    Some(amount) => Ok(Reply::Transaction(self.bank.transfer(&from, &to, amount, "chat")?)),
                    None => Ok(self.prompt(chat, Conversation::AwaitingTransferAmount { from, to })),
                }
            }
            Action::History { account, limit } => {
                let user = self.player(chat, name)?;
                self.bank.owned_account(&user, &account)?;
                let transactions = self.bank.history(&account, limit.unwrap_or(self.history_limit))?;
                Ok(Reply::History { account, transactions })
            }
        }
    }

    /// Resolve (and bring up to date) the chat user's ledger entry.
    fn player(&self, chat: i64, name: &str) -> Result<UserId> {
        Ok(self.game.touch(chat, name)?.user)
    }

    fn prompt(&self, chat: i64, state: Conversation) -> Reply {
        self.sessions.set(chat, state.clone());
        Reply::Prompt {
            pending: state,
            message: "Send the amount, or /cancel".to_string(),
        }
    }

    fn resume(&self, chat: i64, name: &str, state: Conversation, raw: &str) -> Result<Reply> {
        let amount = match parse_amount(raw) {
            Ok(amount) => amount,
            Err(e) => {
                // still waiting for a usable amount
                self.sessions.set(chat, state);
                return Err(e);
            }
        };
        let user = self.player(chat, name)?;
        let tx = match state {
            Conversation::AwaitingDepositAmount { account } => self.bank.deposit(&account, amount, "chat")?,
            Conversation::AwaitingWithdrawAmount { account } => {
                self.bank.owned_account(&user, &account)?;
                self.bank.withdraw(&account, amount, "chat")?
            }
            Conversation::AwaitingTransferAmount { from, to } => {
                self.bank.owned_account(&user, &from)?;
                self.bank.transfer(&from, &to, amount, "chat")?
            }
        };
        Ok(Reply::Transaction(tx))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::bank::BankOptions;
    use crate::catalog::Catalog;
    use crate::clock::ManualClock;
    use crate::game::GameOptions;
    use crate::models::Instrument;
    use crate::store::LedgerStore;

    fn service() -> (tempfile::TempDir, ChatService) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 5, 5, 5, 5).unwrap()));
        let store = Arc::new(LedgerStore::open(dir.path().join("ledger.json"), clock).unwrap());
        let bank = Bank::open(
            store.clone(),
            BankOptions {
                rates_path: dir.path().join("rates.json"),
                backups_dir: dir.path().join("backups"),
                default_currency: "RUB".to_string(),
                auto_backup: false,
            },
        )
        .unwrap();
        let game = Game::new(
            store,
            Catalog::builtin(),
            GameOptions {
                window: Duration::hours(3),
                refund_factor: 0.8,
                max_items: 100,
                price_instrument: Instrument::Mnt,
                accrual_instrument: Instrument::Mnt,
            },
        );
        (dir, ChatService::new(bank, game, 10))
    }

    fn say(svc: &ChatService, user_id: i64, text: &str) -> Reply {
        svc.handle(&Inbound {
            user_id,
            display_name: format!("user{user_id}"),
            text: text.to_string(),
        })
    }

    fn error_kind(reply: &Reply) -> Option<ErrorKind> {
        match reply {
            Reply::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("/start").unwrap(), Action::Start);
        assert_eq!(parse("/BUY@penny_bot 14").unwrap(), Action::Buy { item: 14 });
        assert_eq!(parse("/shop").unwrap(), Action::Shop { page: 1 });
        assert_eq!(
            parse("/transfer a000001 a000002 12.50").unwrap(),
            Action::Transfer {
                from: "a000001".into(),
                to: "a000002".into(),
                amount: Some(1250),
            }
        );
        assert_eq!(
            parse("/deposit a000001").unwrap(),
            Action::Deposit {
                account: "a000001".into(),
                amount: None,
            }
        );
        assert_eq!(parse("  12.5 ").unwrap(), Action::Text("12.5".into()));
        assert_eq!(parse("/open usd").unwrap(), Action::Open { currency: Some("USD".into()) });
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(parse("/buy"), Err(PennyError::Invalid(_))));
        assert!(matches!(parse("/buy gpu"), Err(PennyError::Invalid(_))));
        assert!(matches!(parse("/deposit a000001 -5"), Err(PennyError::InvalidAmount(_))));
        assert!(matches!(parse("/fly"), Err(PennyError::Invalid(_))));
    }

    #[test]
    fn test_start_creates_player() {
        let (_dir, svc) = service();
        let Reply::Status(status) = say(&svc, 7, "/start") else {
            panic!("expected status");
        };
        assert_eq!(status.user.as_str(), "u000001");
        assert_eq!(status.items, 0);
        assert_eq!(status.capacity, 100);
    }

    #[test]
    fn test_buy_without_funds_reports_kind() {
        let (_dir, svc) = service();
        let reply = say(&svc, 7, "/buy 1");
        assert_eq!(error_kind(&reply), Some(ErrorKind::InsufficientFunds));
        let reply = say(&svc, 7, "/sell 1");
        assert_eq!(error_kind(&reply), Some(ErrorKind::NotOwned));
        let reply = say(&svc, 7, "/buy 1000");
        assert_eq!(error_kind(&reply), Some(ErrorKind::NotFound));
    }

    #[test]
    fn test_shop_page_is_clamped() {
        let (_dir, svc) = service();
        let Reply::Shop { page, pages, items } = say(&svc, 7, "/shop 99") else {
            panic!("expected shop");
        };
        assert_eq!(page, pages);
        assert_eq!(items.last().unwrap().id, 59);
    }

    #[test]
    fn test_deposit_conversation() {
        let (_dir, svc) = service();
        let Reply::AccountOpened(acc) = say(&svc, 7, "/open") else {
            panic!("expected account");
        };
        assert_eq!(acc.currency, "RUB");

        let reply = say(&svc, 7, &format!("/deposit {}", acc.id));
        assert!(matches!(
            reply,
            Reply::Prompt {
                pending: Conversation::AwaitingDepositAmount { .. },
                ..
            }
        ));
        // a bad amount keeps the conversation open
        assert_eq!(error_kind(&say(&svc, 7, "lots")), Some(ErrorKind::InvalidAmount));
        let Reply::Transaction(tx) = say(&svc, 7, "12.50") else {
            panic!("expected transaction");
        };
        assert_eq!(tx.amount, 1250);
        assert_eq!(error_kind(&say(&svc, 7, "5")), Some(ErrorKind::Invalid));
    }

    #[test]
    fn test_cancel_clears_pending() {
        let (_dir, svc) = service();
        let Reply::AccountOpened(acc) = say(&svc, 7, "/open") else {
            panic!("expected account");
        };
        say(&svc, 7, &format!("/withdraw {}", acc.id));
        assert!(matches!(say(&svc, 7, "/cancel"), Reply::Cancelled { had_pending: true }));
        assert!(matches!(say(&svc, 7, "/cancel"), Reply::Cancelled { had_pending: false }));
    }

    #[test]
    fn test_foreign_accounts_are_hidden() {
        let (_dir, svc) = service();
        let Reply::AccountOpened(mine) = say(&svc, 1, "/open") else {
            panic!("expected account");
        };
        say(&svc, 1, &format!("/deposit {} 100", mine.id));
        let Reply::AccountOpened(theirs) = say(&svc, 2, "/open") else {
            panic!("expected account");
        };

        let reply = say(&svc, 2, &format!("/withdraw {} 1", mine.id));
        assert_eq!(error_kind(&reply), Some(ErrorKind::NotFound));
        let reply = say(&svc, 2, &format!("/history {}", mine.id));
        assert_eq!(error_kind(&reply), Some(ErrorKind::NotFound));

        let Reply::Transaction(tx) = say(&svc, 1, &format!("/transfer {} {} 40", mine.id, theirs.id)) else {
            panic!("expected transfer");
        };
        assert_eq!(tx.amount, 4000);
        let Reply::History { transactions, .. } = say(&svc, 2, &format!("/history {}", theirs.id)) else {
            panic!("expected history");
        };
        assert_eq!(transactions.len(), 1);
    }

    #[test]
    fn test_chat_names_never_shadow_logins() {
        let (_dir, svc) = service();
        for chat_id in [1, 2] {
            let reply = svc.handle(&Inbound {
                user_id: chat_id,
                display_name: "admin".to_string(),
                text: "/start".to_string(),
            });
            assert!(matches!(reply, Reply::Status(_)));
        }
        assert!(svc.bank.store().get_user_by_name("admin").is_err());

        let admin = svc.bank.ensure_default_admin("pw1234").unwrap().unwrap();
        let admins: Vec<_> = svc.bank.users().into_iter().filter(|u| u.is_admin()).collect();
        assert_eq!(admins.len(), 1);
        assert_eq!(svc.bank.login("admin", "pw1234").unwrap().id, admin.id);

        svc.handle(&Inbound {
            user_id: 3,
            display_name: "alice".to_string(),
            text: "/start".to_string(),
        });
        let alice = svc.bank.register("alice", "secret").unwrap();
        assert_eq!(svc.bank.store().get_user_by_name("alice").unwrap().id, alice.id);
    }

    #[test]
    fn test_error_reply_serializes_code() {
        let (_dir, svc) = service();
        let json = serde_json::to_value(say(&svc, 7, "/withdraw a000404 1")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "not_found");
    }
}
