use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{PennyError, Result};
use crate::store::{decode, write_atomic, LedgerStore};

/// Copy the live ledger file to `backups/penny-YYYYMMDD-HHMMSS.json`.
///
/// The file is read under shared access, so no writer can be halfway
/// through replacing it.
pub fn backup_now(store: &LedgerStore, backups_dir: &Path) -> Result<PathBuf> {
    let bytes = store.with_shared(|_| std::fs::read(store.path()))?;
    let stamp = store.clock().now().format("%Y%m%d-%H%M%S");
    let dest = backups_dir.join(format!("penny-{stamp}.json"));
    write_atomic(&dest, &bytes)?;
    info!(path = %dest.display(), bytes = bytes.len(), "backup written");
    Ok(dest)
}

/// Backup file names, oldest first.
pub fn list_backups(backups_dir: &Path) -> Result<Vec<String>> {
    if !backups_dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(backups_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".json") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Overwrite `ledger_path` with a named backup after checking it decodes.
pub fn restore_backup(ledger_path: &Path, backups_dir: &Path, name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(PennyError::Invalid(format!("bad backup name {name:?}")));
    }
    let source = backups_dir.join(name);
    if !source.is_file() {
        return Err(PennyError::NotFound(format!("backup {name}")));
    }
    let bytes = std::fs::read(&source)?;
    decode(&bytes)?;
    write_atomic(ledger_path, &bytes)?;
    info!(backup = %name, path = %ledger_path.display(), "ledger restored from backup");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::clock::{Clock, ManualClock};

    fn setup() -> (tempfile::TempDir, Arc<ManualClock>, LedgerStore) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap()));
        let store = LedgerStore::open(dir.path().join("ledger.json"), clock.clone()).unwrap();
        (dir, clock, store)
    }

    #[test]
    fn test_backup_is_named_by_timestamp() {
        let (dir, _clock, store) = setup();
        let path = backup_now(&store, &dir.path().join("backups")).unwrap();
        assert_eq!(path.file_name().unwrap(), "penny-20250601-083000.json");
        assert_eq!(std::fs::read(&path).unwrap(), std::fs::read(store.path()).unwrap());
    }

    #[test]
    fn test_list_sorted_and_filtered() {
        let (dir, clock, store) = setup();
        let backups = dir.path().join("backups");
        assert!(list_backups(&backups).unwrap().is_empty());
        backup_now(&store, &backups).unwrap();
        clock.advance(Duration::days(1));
        backup_now(&store, &backups).unwrap();
        std::fs::write(backups.join("notes.txt"), "x").unwrap();
        assert_eq!(
            list_backups(&backups).unwrap(),
            vec!["penny-20250601-083000.json", "penny-20250602-083000.json"]
        );
    }

    #[test]
    fn test_restore_replaces_live_file() {
        let (dir, clock, store) = setup();
        let backups = dir.path().join("backups");
        let saved = backup_now(&store, &backups).unwrap();
        clock.advance(Duration::minutes(1));
        store
            .with_exclusive(|s| {
                s.next_user_id();
                Ok(())
            })
            .unwrap();
        assert_ne!(std::fs::read(store.path()).unwrap(), std::fs::read(&saved).unwrap());

        restore_backup(store.path(), &backups, "penny-20250601-083000.json").unwrap();
        assert_eq!(std::fs::read(store.path()).unwrap(), std::fs::read(&saved).unwrap());
        let reopened = LedgerStore::open(store.path(), clock.clone() as Arc<dyn Clock>).unwrap();
        assert_eq!(reopened.snapshot().updated_at(), clock.now() - Duration::minutes(1));
    }

    #[test]
    fn test_restore_rejects_bad_input() {
        let (dir, _clock, store) = setup();
        let backups = dir.path().join("backups");
        std::fs::create_dir_all(&backups).unwrap();
        std::fs::write(backups.join("broken.json"), "{").unwrap();
        let live = std::fs::read(store.path()).unwrap();

        assert!(matches!(restore_backup(store.path(), &backups, "../ledger.json"), Err(PennyError::Invalid(_))));
        assert!(matches!(restore_backup(store.path(), &backups, "nope.json"), Err(PennyError::NotFound(_))));
        assert!(matches!(restore_backup(store.path(), &backups, "broken.json"), Err(PennyError::Json(_))));
        assert_eq!(std::fs::read(store.path()).unwrap(), live);
    }
}
