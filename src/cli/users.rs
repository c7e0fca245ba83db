use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{login_admin, with_password, AdminLogin, Context};
use crate::error::Result;
use crate::models::Role;

pub fn register(data_dir: Option<&str>, username: &str, password: Option<String>) -> Result<()> {
    let bank = Context::open(data_dir)?.bank()?;
    let user = with_password(password, "Password: ", |pw| bank.register(username, pw))?;
    println!("Registered {} as {}", user.display_name, user.id);
    for account in bank.accounts(&user.id)? {
        println!("Opened {} ({})", account.id, account.currency);
    }
    Ok(())
}

pub fn login(data_dir: Option<&str>, username: &str, password: Option<String>) -> Result<()> {
    let bank = Context::open(data_dir)?.bank()?;
    let user = with_password(password, "Password: ", |pw| bank.login(username, pw))?;
    println!("Welcome, {} ({}, {})", user.display_name, user.id, user.role);
    Ok(())
}

pub fn list(data_dir: Option<&str>) -> Result<()> {
    let bank = Context::open(data_dir)?.bank()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Role", "Accounts", "Chat", "Created"]);
    for user in bank.users() {
        table.add_row(vec![
            Cell::new(&user.id),
            Cell::new(if user.is_admin() {
                user.display_name.bold().to_string()
            } else {
                user.display_name.clone()
            }),
            Cell::new(user.role),
            Cell::new(user.accounts.len()),
            Cell::new(user.chat_id.map(|id| id.to_string()).unwrap_or_default()),
            Cell::new(user.created_at.format("%Y-%m-%d")),
        ]);
    }
    println!("Users\n{table}");
    Ok(())
}

pub fn promote(data_dir: Option<&str>, username: &str, login: AdminLogin) -> Result<()> {
    let ctx = Context::open(data_dir)?;
    let bank = ctx.bank()?;
    let actor = login_admin(&bank, login)?;
    let user = ctx.user_by_name(username)?;
    if user.is_admin() {
        println!("{} is already an admin.", user.display_name);
        return Ok(());
    }
    let user = bank.set_role(&actor, &user.id, Role::Admin)?;
    println!("{} is now {}", user.display_name, user.role);
    Ok(())
}
