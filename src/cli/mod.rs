pub mod accounts;
pub mod backup;
pub mod chat;
pub mod export;
pub mod game;
pub mod init;
pub mod rates;
pub mod status;
pub mod txn;
pub mod users;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use zeroize::Zeroize;

use crate::bank::{Bank, BankOptions};
use crate::catalog::Catalog;
use crate::chat::ChatService;
use crate::clock::SystemClock;
use crate::error::{PennyError, Result};
use crate::game::{Game, GameOptions};
use crate::models::User;
use crate::settings::{load_settings, shellexpand_path, Settings};
use crate::store::LedgerStore;

#[derive(Parser)]
#[command(name = "penny", version, about = "Accrual ledger for toy-bank and mining-game chat bots.")]
pub struct Cli {
    /// Data directory (overrides the one in settings)
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory, ledger, rates table and default admin.
    Init {
        /// Password for the `admin` user (prompted if omitted)
        #[arg(long = "admin-password")]
        admin_password: Option<String>,
    },
    /// Show data directory and ledger statistics.
    Status,
    /// Manage users.
    Users {
        #[command(subcommand)]
        command: UsersCommands,
    },
    /// Manage bank accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Deposit into an account.
    Deposit {
        /// Account id, e.g. a000001
        account: String,
        /// Amount in major units, e.g. 12.50
        amount: String,
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Withdraw from an account.
    Withdraw {
        account: String,
        amount: String,
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Move money between accounts, converting if currencies differ.
    Transfer {
        from: String,
        to: String,
        amount: String,
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Show an account's most recent transactions.
    History {
        account: String,
        /// Number of entries (0 = all; default from settings)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Exchange rates.
    Rates {
        #[command(subcommand)]
        command: RatesCommands,
    },
    /// Back up or restore the ledger file.
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
    /// Export CSV reports.
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Play the mining game as a chat user.
    Game {
        #[command(subcommand)]
        command: GameCommands,
    },
    /// Read chat messages from stdin, one per line; write JSON replies.
    Chat {
        #[arg(long = "user-id")]
        user_id: i64,
        #[arg(long, default_value = "player")]
        name: String,
    },
    /// Print shell completions.
    Completions { shell: Shell },
}

#[derive(Subcommand)]
pub enum UsersCommands {
    /// Register a new user.
    Register {
        username: String,
        /// Password (prompted if omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Check a username and password.
    Login {
        username: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// List all users.
    List,
    /// Give a user the admin role.
    Promote {
        username: String,
        #[command(flatten)]
        login: AdminLogin,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Open an account for a user.
    Open {
        /// Owner username
        #[arg(long)]
        user: String,
        /// Currency code (default from settings)
        #[arg(long)]
        currency: Option<String>,
    },
    /// List a user's accounts.
    List {
        #[arg(long)]
        user: String,
    },
    /// Close an account. Closed accounts refuse all movements.
    Close {
        account: String,
        #[command(flatten)]
        login: AdminLogin,
    },
}

#[derive(Subcommand)]
pub enum RatesCommands {
    /// Show the rate table.
    Show,
    /// Set one currency's rate against the base.
    Set {
        currency: String,
        rate: f64,
        #[command(flatten)]
        login: AdminLogin,
    },
    /// Convert an amount at the current rates.
    Convert { from: String, to: String, amount: String },
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Copy the ledger to backups/penny-YYYYMMDD-HHMMSS.json.
    Now,
    /// List backups, oldest first.
    List,
    /// Replace the ledger with a backup. Takes effect on next start.
    Restore {
        name: String,
        #[command(flatten)]
        login: AdminLogin,
    },
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Account statement as CSV.
    Statement {
        account: String,
        /// First day, YYYY-MM-DD (default: account opening)
        #[arg(long = "from")]
        from_date: Option<String>,
        /// Last day, YYYY-MM-DD (default: today)
        #[arg(long = "to")]
        to_date: Option<String>,
        #[arg(long)]
        output: Option<String>,
    },
    /// One line per account of a user, as CSV.
    Summary {
        #[arg(long)]
        user: String,
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum GameCommands {
    /// Browse the shop.
    Shop {
        #[arg(long, default_value = "1")]
        page: usize,
    },
    /// Buy an item.
    Buy {
        #[arg(long = "user-id")]
        user_id: i64,
        item: u32,
    },
    /// Sell an item.
    Sell {
        #[arg(long = "user-id")]
        user_id: i64,
        item: u32,
    },
    /// Balances, income and window.
    Status {
        #[arg(long = "user-id")]
        user_id: i64,
        #[arg(long, default_value = "player")]
        name: String,
    },
    /// Owned items.
    Inventory {
        #[arg(long = "user-id")]
        user_id: i64,
    },
    /// Wipe a player's game state.
    Reset {
        #[arg(long = "user-id")]
        user_id: i64,
    },
    /// A player's purchases and sales.
    Trades {
        #[arg(long = "user-id")]
        user_id: i64,
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Credentials for commands that only an admin may run.
#[derive(Args)]
pub struct AdminLogin {
    /// Username to act as
    #[arg(long = "as", default_value = "admin")]
    pub actor: String,
    /// That user's password (prompted if omitted)
    #[arg(long = "admin-password")]
    pub password: Option<String>,
}

/// Settings plus an open ledger; the services are built on demand.
pub(crate) struct Context {
    pub settings: Settings,
    pub store: Arc<LedgerStore>,
}

impl Context {
    pub fn open(data_dir: Option<&str>) -> Result<Self> {
        let mut settings = load_settings();
        if let Some(dir) = data_dir {
            settings.data_dir = shellexpand_path(dir);
        }
        settings.validate()?;
        let store = Arc::new(LedgerStore::open(settings.ledger_path(), Arc::new(SystemClock))?);
        Ok(Self { settings, store })
    }

    pub fn bank(&self) -> Result<Bank> {
        Bank::open(
            self.store.clone(),
            BankOptions {
                rates_path: self.settings.rates_path(),
                backups_dir: self.settings.backups_dir(),
                default_currency: self.settings.default_currency.clone(),
                auto_backup: self.settings.auto_backup,
            },
        )
    }

    pub fn game(&self) -> Result<Game> {
        let catalog = match &self.settings.catalog_path {
            Some(path) => Catalog::load(&PathBuf::from(shellexpand_path(path)))?,
            None => Catalog::builtin(),
        };
        Ok(Game::new(
            self.store.clone(),
            catalog,
            GameOptions::from_settings(&self.settings),
        ))
    }

    pub fn chat(&self) -> Result<ChatService> {
        Ok(ChatService::new(self.bank()?, self.game()?, self.settings.history_limit))
    }

    pub fn user_by_name(&self, name: &str) -> Result<User> {
        self.store.get_user_by_name(name.trim())
    }
}

/// Use the flag if given, otherwise prompt without echo.
pub(crate) fn read_password(flag: Option<String>, prompt: &str) -> Result<String> {
    match flag {
        Some(pw) => Ok(pw),
        None => Ok(rpassword::prompt_password(prompt)?),
    }
}

/// Run `f` with the password, then wipe it.
pub(crate) fn with_password<T>(
    flag: Option<String>,
    prompt: &str,
    f: impl FnOnce(&str) -> Result<T>,
) -> Result<T> {
    let mut password = read_password(flag, prompt)?;
    let out = f(&password);
    password.zeroize();
    out
}

/// Log in as the acting user. The role is checked by the bank operation itself.
pub(crate) fn login_admin(bank: &Bank, login: AdminLogin) -> Result<User> {
    let AdminLogin { actor, password } = login;
    with_password(password, &format!("Password for {actor}: "), |pw| bank.login(&actor, pw))
}

/// Parse `YYYY-MM-DD`.
pub(crate) fn parse_date(raw: &str) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| PennyError::Invalid(format!("bad date {raw:?}, expected YYYY-MM-DD")))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2025-03-09").unwrap(),
            chrono::NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
        );
        assert!(parse_date("03/09/2025").is_err());
    }

    #[test]
    fn test_global_data_dir_after_subcommand() {
        let cli = Cli::try_parse_from(["penny", "status", "--data-dir", "/tmp/x"]).unwrap();
        assert_eq!(cli.data_dir.as_deref(), Some("/tmp/x"));
    }

    #[test]
    fn test_admin_login_defaults_to_admin() {
        let cli = Cli::try_parse_from(["penny", "rates", "set", "usd", "0.011"]).unwrap();
        let Commands::Rates { command: RatesCommands::Set { login, .. } } = cli.command else {
            panic!("expected rates set");
        };
        assert_eq!(login.actor, "admin");
        assert!(login.password.is_none());

        let cli = Cli::try_parse_from([
            "penny", "backup", "restore", "x.json", "--as", "bob", "--admin-password", "pw",
        ])
        .unwrap();
        let Commands::Backup { command: BackupCommands::Restore { login, .. } } = cli.command else {
            panic!("expected backup restore");
        };
        assert_eq!(login.actor, "bob");
        assert_eq!(login.password.as_deref(), Some("pw"));
    }
}
