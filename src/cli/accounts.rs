use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{login_admin, AdminLogin, Context};
use crate::error::Result;
use crate::fmt::money;
use crate::models::AccountId;

pub fn open(data_dir: Option<&str>, user: &str, currency: Option<&str>) -> Result<()> {
    let ctx = Context::open(data_dir)?;
    let owner = ctx.user_by_name(user)?;
    let account = ctx.bank()?.open_account(&owner.id, currency)?;
    println!("Opened {} ({}) for {}", account.id, account.currency, owner.display_name);
    Ok(())
}

pub fn list(data_dir: Option<&str>, user: &str) -> Result<()> {
    let ctx = Context::open(data_dir)?;
    let owner = ctx.user_by_name(user)?;
    let accounts = ctx.bank()?.accounts(&owner.id)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Currency", "Balance", "Status", "Opened"]);
    for acc in accounts {
        let status = if acc.closed {
            "closed".dimmed().to_string()
        } else {
            "open".to_string()
        };
        table.add_row(vec![
            Cell::new(&acc.id),
            Cell::new(&acc.currency),
            Cell::new(money(acc.balance)),
            Cell::new(status),
            Cell::new(acc.created_at.format("%Y-%m-%d")),
        ]);
    }
    println!("Accounts of {}\n{table}", owner.display_name);
    Ok(())
}

pub fn close(data_dir: Option<&str>, account: &str, login: AdminLogin) -> Result<()> {
    let bank = Context::open(data_dir)?.bank()?;
    let actor = login_admin(&bank, login)?;
    let account = bank.close_account(&actor, &AccountId::from(account))?;
    println!("Closed {} (balance {} {})", account.id, money(account.balance), account.currency);
    Ok(())
}
