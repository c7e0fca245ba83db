use comfy_table::{Cell, Table};

use crate::cli::{login_admin, AdminLogin, Context};
use crate::error::Result;
use crate::fmt::money;
use crate::money::parse_amount;

pub fn show(data_dir: Option<&str>) -> Result<()> {
    let rates = Context::open(data_dir)?.bank()?.rates()?;
    let mut table = Table::new();
    table.set_header(vec!["Currency".to_string(), format!("Per 1 {}", rates.base)]);
    for (currency, rate) in &rates.pairs {
        table.add_row(vec![Cell::new(currency), Cell::new(rate)]);
    }
    println!("Exchange rates (base {})\n{table}", rates.base);
    println!("Updated {}", rates.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}

pub fn set(data_dir: Option<&str>, currency: &str, rate: f64, login: AdminLogin) -> Result<()> {
    let bank = Context::open(data_dir)?.bank()?;
    let actor = login_admin(&bank, login)?;
    let rates = bank.set_rate(&actor, currency, rate)?;
    let code = currency.trim().to_uppercase();
    println!("{code} = {rate} per 1 {}", rates.base);
    Ok(())
}

pub fn convert(data_dir: Option<&str>, from: &str, to: &str, amount: &str) -> Result<()> {
    let amount = parse_amount(amount)?;
    let converted = Context::open(data_dir)?.bank()?.convert(from, to, amount)?;
    println!(
        "{} {} = {} {}",
        money(amount),
        from.trim().to_uppercase(),
        money(converted),
        to.trim().to_uppercase()
    );
    Ok(())
}
