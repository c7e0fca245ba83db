mod accrual;
mod auth;
mod backup;
mod bank;
mod catalog;
mod chat;
mod cli;
mod clock;
mod error;
mod export;
mod fmt;
mod game;
mod models;
mod money;
mod rates;
mod session;
mod settings;
mod store;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{
    AccountsCommands, BackupCommands, Cli, Commands, ExportCommands, GameCommands, RatesCommands,
    UsersCommands,
};

fn init_logging() {
    let filter = EnvFilter::try_from_env("PENNY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let dir = cli.data_dir.as_deref();

    let result = match cli.command {
        Commands::Init { admin_password } => cli::init::run(dir, admin_password),
        Commands::Status => cli::status::run(dir),
        Commands::Users { command } => match command {
            UsersCommands::Register { username, password } => cli::users::register(dir, &username, password),
            UsersCommands::Login { username, password } => cli::users::login(dir, &username, password),
            UsersCommands::List => cli::users::list(dir),
            UsersCommands::Promote { username, login } => cli::users::promote(dir, &username, login),
        },
        Commands::Accounts { command } => match command {
            AccountsCommands::Open { user, currency } => cli::accounts::open(dir, &user, currency.as_deref()),
            AccountsCommands::List { user } => cli::accounts::list(dir, &user),
            AccountsCommands::Close { account, login } => cli::accounts::close(dir, &account, login),
        },
        Commands::Deposit { account, amount, note } => cli::txn::deposit(dir, &account, &amount, &note),
        Commands::Withdraw { account, amount, note } => cli::txn::withdraw(dir, &account, &amount, &note),
        Commands::Transfer {
            from,
            to,
            amount,
            note,
        } => cli::txn::transfer(dir, &from, &to, &amount, &note),
        Commands::History { account, limit } => cli::txn::history(dir, &account, limit),
        Commands::Rates { command } => match command {
            RatesCommands::Show => cli::rates::show(dir),
            RatesCommands::Set { currency, rate, login } => {
                cli::rates::set(dir, &currency, rate, login)
            }
            RatesCommands::Convert { from, to, amount } => cli::rates::convert(dir, &from, &to, &amount),
        },
        Commands::Backup { command } => match command {
            BackupCommands::Now => cli::backup::now(dir),
            BackupCommands::List => cli::backup::list(dir),
            BackupCommands::Restore { name, login } => cli::backup::restore(dir, &name, login),
        },
        Commands::Export { command } => match command {
            ExportCommands::Statement {
                account,
                from_date,
                to_date,
                output,
            } => cli::export::statement(dir, &account, from_date.as_deref(), to_date.as_deref(), output),
            ExportCommands::Summary { user, output } => cli::export::summary(dir, &user, output),
        },
        Commands::Game { command } => match command {
            GameCommands::Shop { page } => cli::game::shop(dir, page),
            GameCommands::Buy { user_id, item } => cli::game::buy(dir, user_id, item),
            GameCommands::Sell { user_id, item } => cli::game::sell(dir, user_id, item),
            GameCommands::Status { user_id, name } => cli::game::status(dir, user_id, &name),
            GameCommands::Inventory { user_id } => cli::game::inventory(dir, user_id),
            GameCommands::Reset { user_id } => cli::game::reset(dir, user_id),
            GameCommands::Trades { user_id, limit } => cli::game::trades(dir, user_id, limit),
        },
        Commands::Chat { user_id, name } => cli::chat::run(dir, user_id, &name),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "penny", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::debug!(kind = e.kind().code(), "command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
