use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::Context;
use crate::error::Result;
use crate::fmt::money;
use crate::models::{AccountId, Transaction};
use crate::money::parse_amount;

fn print_tx(tx: &Transaction) {
    let route = match (&tx.from, &tx.to) {
        (Some(from), Some(to)) => format!("{from} -> {to}"),
        (Some(from), None) => from.to_string(),
        (None, Some(to)) => to.to_string(),
        (None, None) => String::new(),
    };
    println!(
        "{} {} {} {} {}",
        tx.id,
        tx.kind.to_string().bold(),
        route,
        money(tx.amount),
        tx.currency
    );
}

pub fn deposit(data_dir: Option<&str>, account: &str, amount: &str, note: &str) -> Result<()> {
    let amount = parse_amount(amount)?;
    let tx = Context::open(data_dir)?
        .bank()?
        .deposit(&AccountId::from(account), amount, note)?;
    print_tx(&tx);
    Ok(())
}

pub fn withdraw(data_dir: Option<&str>, account: &str, amount: &str, note: &str) -> Result<()> {
    let amount = parse_amount(amount)?;
    let tx = Context::open(data_dir)?
        .bank()?
        .withdraw(&AccountId::from(account), amount, note)?;
    print_tx(&tx);
    Ok(())
}

pub fn transfer(data_dir: Option<&str>, from: &str, to: &str, amount: &str, note: &str) -> Result<()> {
    let amount = parse_amount(amount)?;
    let bank = Context::open(data_dir)?.bank()?;
    let to = AccountId::from(to);
    let tx = bank.transfer(&AccountId::from(from), &to, amount, note)?;
    print_tx(&tx);
    if !tx.note.is_empty() {
        println!("  {}", tx.note.dimmed());
    }
    Ok(())
}

pub fn history(data_dir: Option<&str>, account: &str, limit: Option<usize>) -> Result<()> {
    let ctx = Context::open(data_dir)?;
    let account = AccountId::from(account);
    let limit = limit.unwrap_or(ctx.settings.history_limit);
    let txs = ctx.bank()?.history(&account, limit)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Type", "From", "To", "Amount", "Note"]);
    for tx in &txs {
        let outgoing = tx.from.as_ref() == Some(&account);
        let amount = if outgoing {
            format!("-{}", money(tx.amount)).red().to_string()
        } else {
            money(tx.amount).green().to_string()
        };
        table.add_row(vec![
            Cell::new(&tx.id),
            Cell::new(tx.created_at.format("%Y-%m-%d %H:%M")),
            Cell::new(tx.kind),
            Cell::new(tx.from.as_ref().map(ToString::to_string).unwrap_or_default()),
            Cell::new(tx.to.as_ref().map(ToString::to_string).unwrap_or_default()),
            Cell::new(format!("{amount} {}", tx.currency)).set_alignment(CellAlignment::Right),
            Cell::new(&tx.note),
        ]);
    }
    println!("History of {account}\n{table}");
    Ok(())
}
