use std::path::PathBuf;

use chrono::{NaiveTime, Utc};

use crate::cli::{parse_date, Context};
use crate::error::Result;
use crate::export::{export_account_statement, export_user_summary};
use crate::models::AccountId;

pub fn statement(
    data_dir: Option<&str>,
    account: &str,
    from_date: Option<&str>,
    to_date: Option<&str>,
    output: Option<String>,
) -> Result<()> {
    let ctx = Context::open(data_dir)?;
    let bank = ctx.bank()?;
    let account = AccountId::from(account);
    let opened = bank.account(&account)?.created_at;

    let from = match from_date {
        Some(raw) => parse_date(raw)?.and_time(NaiveTime::MIN).and_utc(),
        None => opened,
    };
    let to = match to_date {
        Some(raw) => parse_date(raw)?
            .and_hms_opt(23, 59, 59)
            .map(|t| t.and_utc())
            .unwrap_or_else(Utc::now),
        None => Utc::now(),
    };
    let path = export_account_statement(
        bank.store(),
        &account,
        from,
        to,
        &ctx.settings.reports_dir(),
        output.map(PathBuf::from),
    )?;
    println!("Exported to {}", path.display());
    Ok(())
}

pub fn summary(data_dir: Option<&str>, user: &str, output: Option<String>) -> Result<()> {
    let ctx = Context::open(data_dir)?;
    let owner = ctx.user_by_name(user)?;
    let path = export_user_summary(
        ctx.bank()?.store(),
        &owner.id,
        &ctx.settings.reports_dir(),
        output.map(PathBuf::from),
    )?;
    println!("Exported to {}", path.display());
    Ok(())
}
