use std::path::PathBuf;

use colored::Colorize;

use crate::cli::{with_password, Context};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<&str>, admin_password: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(dir);
    }
    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    std::fs::create_dir_all(settings.backups_dir())?;
    std::fs::create_dir_all(settings.reports_dir())?;
    save_settings(&settings)?;

    let bank = Context::open(Some(settings.data_dir.as_str()))?.bank()?;
    if bank.has_admin() {
        println!("Admin user already exists.");
    } else {
        let created = with_password(admin_password, "Admin password: ", |pw| {
            bank.ensure_default_admin(pw)
        })?;
        if let Some(admin) = created {
            println!("Created admin user {} ({})", admin.display_name.bold(), admin.id);
        }
    }

    println!("Initialized penny at {}", resolved.display());
    Ok(())
}
