use crate::cli::{login_admin, AdminLogin, Context};
use crate::error::Result;
use crate::fmt::format_bytes;

pub fn now(data_dir: Option<&str>) -> Result<()> {
    let dest = Context::open(data_dir)?.bank()?.backup_now()?;
    let size = std::fs::metadata(&dest)?.len();
    println!("Backup saved to {}", dest.display());
    println!("Size: {}", format_bytes(size));
    Ok(())
}

pub fn list(data_dir: Option<&str>) -> Result<()> {
    let names = Context::open(data_dir)?.bank()?.list_backups()?;
    if names.is_empty() {
        println!("No backups yet. Run `penny backup now`.");
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

pub fn restore(data_dir: Option<&str>, name: &str, login: AdminLogin) -> Result<()> {
    let bank = Context::open(data_dir)?.bank()?;
    let actor = login_admin(&bank, login)?;
    bank.restore_backup(&actor, name)?;
    println!("Restored {name}. Restart any running penny process to pick it up.");
    Ok(())
}
