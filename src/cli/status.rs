use crate::backup::list_backups;
use crate::cli::Context;
use crate::error::Result;
use crate::fmt::format_bytes;

pub fn run(data_dir: Option<&str>) -> Result<()> {
    let ctx = Context::open(data_dir)?;
    let settings = &ctx.settings;
    let ledger = settings.ledger_path();

    println!("Data dir:   {}", settings.data_path().display());
    println!("Ledger:     {}", ledger.display());
    let size = std::fs::metadata(&ledger)?.len();
    println!("Size:       {}", format_bytes(size));

    let (users, players, accounts, closed, txs, updated) = ctx.store.with_shared(|s| {
        (
            s.users().count(),
            s.users().filter(|u| u.game.is_some()).count(),
            s.accounts().count(),
            s.accounts().filter(|a| a.closed).count(),
            s.transaction_count(),
            s.updated_at(),
        )
    });
    let backups = list_backups(&settings.backups_dir())?.len();

    println!();
    println!("Users:         {users} ({players} players)");
    println!("Accounts:      {accounts} ({closed} closed)");
    println!("Transactions:  {txs}");
    println!("Backups:       {backups}");
    println!("Last write:    {}", updated.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}
