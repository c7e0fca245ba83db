use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::Context;
use crate::error::Result;
use crate::fmt::{play, short_duration};
use crate::game::{PlayerStatus, Receipt};

// Players reached through the CLI keep whatever name chat gave them.
const CLI_NAME: &str = "player";

fn print_status(status: &PlayerStatus) {
    println!("{} ({})", status.display_name.bold(), status.user);
    for (instrument, amount) in &status.balances {
        println!("  {:<4} {}", instrument.code(), play(*amount));
    }
    println!("  Items:   {}/{}", status.items, status.capacity);
    println!("  Income:  {}/s", play(status.income_per_sec));
    if status.earned > 0.0 {
        println!("  Earned:  {}", format!("+{}", play(status.earned)).green());
    }
    let remaining = chrono::Duration::seconds(status.window_remaining_secs);
    println!("  Window:  {}", short_duration(remaining));
}

fn print_receipt(verb: &str, receipt: &Receipt) {
    println!(
        "{verb} {} for {} {}",
        receipt.item.name.bold(),
        play(receipt.tx.amount as f64 / 100.0),
        receipt.tx.currency
    );
    println!(
        "  Balance: {}  Items: {}  Income: {}/s",
        play(receipt.balance),
        receipt.items,
        play(receipt.income_per_sec)
    );
}

pub fn shop(data_dir: Option<&str>, page: usize) -> Result<()> {
    let game = Context::open(data_dir)?.game()?;
    let shop = game.shop(page);
    let mut table = Table::new();
    table.set_header(vec!["ID", "Item", "Price", "Income/s"]);
    for item in shop.items {
        table.add_row(vec![
            Cell::new(item.id),
            Cell::new(&item.name),
            Cell::new(play(item.unit_price)).set_alignment(CellAlignment::Right),
            Cell::new(play(item.income_rate)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("Shop page {}/{}\n{table}", shop.page, shop.pages);
    Ok(())
}

pub fn buy(data_dir: Option<&str>, user_id: i64, item: u32) -> Result<()> {
    let receipt = Context::open(data_dir)?.game()?.buy(user_id, CLI_NAME, item)?;
    print_receipt("Bought", &receipt);
    Ok(())
}

pub fn sell(data_dir: Option<&str>, user_id: i64, item: u32) -> Result<()> {
    let receipt = Context::open(data_dir)?.game()?.sell(user_id, CLI_NAME, item)?;
    print_receipt("Sold", &receipt);
    Ok(())
}

pub fn status(data_dir: Option<&str>, user_id: i64, name: &str) -> Result<()> {
    let status = Context::open(data_dir)?.game()?.touch(user_id, name)?;
    print_status(&status);
    Ok(())
}

pub fn inventory(data_dir: Option<&str>, user_id: i64) -> Result<()> {
    let lines = Context::open(data_dir)?.game()?.inventory(user_id, CLI_NAME)?;
    if lines.is_empty() {
        println!("Inventory is empty. Browse with `penny game shop`.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Item", "Units", "Income/s"]);
    for line in lines {
        table.add_row(vec![
            Cell::new(line.id),
            Cell::new(line.name),
            Cell::new(line.units),
            Cell::new(play(line.income_per_sec)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn reset(data_dir: Option<&str>, user_id: i64) -> Result<()> {
    let status = Context::open(data_dir)?.game()?.reset(user_id, CLI_NAME)?;
    println!("Game reset.");
    print_status(&status);
    Ok(())
}

pub fn trades(data_dir: Option<&str>, user_id: i64, limit: Option<usize>) -> Result<()> {
    let ctx = Context::open(data_dir)?;
    let limit = limit.unwrap_or(ctx.settings.history_limit);
    let txs = ctx.game()?.trades(user_id, limit)?;
    if txs.is_empty() {
        println!("No trades yet.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Type", "Item", "Amount"]);
    for tx in txs {
        table.add_row(vec![
            Cell::new(&tx.id),
            Cell::new(tx.created_at.format("%Y-%m-%d %H:%M")),
            Cell::new(tx.kind),
            Cell::new(&tx.note),
            Cell::new(format!("{} {}", play(tx.amount as f64 / 100.0), tx.currency))
                .set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
    Ok(())
}
