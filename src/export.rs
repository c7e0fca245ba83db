use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{PennyError, Result};
use crate::models::{AccountId, TxKind, UserId};
use crate::store::LedgerStore;

#[derive(Debug, Serialize)]
struct StatementRow {
    tx_id: String,
    #[serde(rename = "type")]
    kind: TxKind,
    from: String,
    to: String,
    amount_minor: i64,
    currency: String,
    created_at: String,
    note: String,
}

#[derive(Debug, Serialize)]
struct SummaryRow {
    account_id: String,
    currency: String,
    balance_minor: i64,
    closed: bool,
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Every transaction touching `account` with `from <= createdAt <= to`, in
/// history order. Defaults to `reports/statement_<acc>_<from>_<to>.csv`.
pub fn export_account_statement(
    store: &LedgerStore,
    account: &AccountId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    reports_dir: &Path,
    output: Option<PathBuf>,
) -> Result<PathBuf> {
    if from > to {
        return Err(PennyError::Invalid(format!("empty range {from} .. {to}")));
    }
    let rows: Vec<StatementRow> = store.with_shared(|s| {
        Ok::<_, PennyError>(
            s.history(account, 0)?
                .into_iter()
                .filter(|t| t.created_at >= from && t.created_at <= to)
                .map(|t| StatementRow {
                    tx_id: t.id.to_string(),
                    kind: t.kind,
                    from: t.from.as_ref().map(ToString::to_string).unwrap_or_default(),
                    to: t.to.as_ref().map(ToString::to_string).unwrap_or_default(),
                    amount_minor: t.amount,
                    currency: t.currency.clone(),
                    created_at: t.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                    note: t.note.clone(),
                })
                .collect(),
        )
    })?;

    let path = output.unwrap_or_else(|| {
        reports_dir.join(format!(
            "statement_{account}_{}_{}.csv",
            from.format("%Y%m%d"),
            to.format("%Y%m%d")
        ))
    });
    write_rows(&path, &rows)?;
    info!(account = %account, rows = rows.len(), path = %path.display(), "exported statement");
    Ok(path)
}

/// One row per account the user holds. Defaults to `reports/summary_<user>.csv`.
pub fn export_user_summary(
    store: &LedgerStore,
    user: &UserId,
    reports_dir: &Path,
    output: Option<PathBuf>,
) -> Result<PathBuf> {
    let rows: Vec<SummaryRow> = store
        .list_accounts_by_owner(user)?
        .into_iter()
        .map(|a| SummaryRow {
            account_id: a.id.to_string(),
            currency: a.currency,
            balance_minor: a.balance,
            closed: a.closed,
        })
        .collect();
    let path = output.unwrap_or_else(|| reports_dir.join(format!("summary_{user}.csv")));
    write_rows(&path, &rows)?;
    info!(user = %user, rows = rows.len(), path = %path.display(), "exported summary");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::bank::{Bank, BankOptions};
    use crate::clock::{Clock, ManualClock};

    fn setup() -> (tempfile::TempDir, Arc<ManualClock>, Bank) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap()));
        let store = Arc::new(LedgerStore::open(dir.path().join("ledger.json"), clock.clone()).unwrap());
        let bank = Bank::open(
            store,
            BankOptions {
                rates_path: dir.path().join("rates.json"),
                backups_dir: dir.path().join("backups"),
                default_currency: "RUB".to_string(),
                auto_backup: false,
            },
        )
        .unwrap();
        (dir, clock, bank)
    }

    #[test]
    fn test_statement_filters_by_inclusive_range() {
        let (dir, clock, bank) = setup();
        let alice = bank.register("alice", "secret").unwrap();
        let acc = bank.accounts(&alice.id).unwrap().remove(0);
        let start = clock.now();
        bank.deposit(&acc.id, 100, "first").unwrap();
        clock.advance(Duration::days(1));
        bank.deposit(&acc.id, 200, "second, with comma").unwrap();
        clock.advance(Duration::days(1));
        bank.withdraw(&acc.id, 50, "").unwrap();

        let reports = dir.path().join("reports");
        let path = export_account_statement(
            bank.store(),
            &acc.id,
            start,
            start + Duration::days(1),
            &reports,
            None,
        )
        .unwrap();
        assert_eq!(path.file_name().unwrap(), "statement_a000001_20250201_20250202.csv");

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["tx_id", "type", "from", "to", "amount_minor", "currency", "created_at", "note"]
        );
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "deposit");
        assert_eq!(&rows[0][4], "100");
        assert_eq!(&rows[0][6], "2025-02-01T10:00:00Z");
        assert_eq!(&rows[1][7], "second, with comma");
    }

    #[test]
    fn test_statement_unknown_account_and_bad_range() {
        let (dir, clock, bank) = setup();
        let now = clock.now();
        let reports = dir.path().join("reports");
        let missing = AccountId::from("a000042");
        assert!(matches!(
            export_account_statement(bank.store(), &missing, now, now, &reports, None),
            Err(PennyError::NotFound(_))
        ));
        let alice = bank.register("alice", "secret").unwrap();
        let acc = bank.accounts(&alice.id).unwrap().remove(0);
        assert!(matches!(
            export_account_statement(bank.store(), &acc.id, now, now - Duration::seconds(1), &reports, None),
            Err(PennyError::Invalid(_))
        ));
    }

    #[test]
    fn test_user_summary_lists_accounts() {
        let (dir, _clock, bank) = setup();
        let alice = bank.register("alice", "secret").unwrap();
        let rub = bank.accounts(&alice.id).unwrap().remove(0);
        bank.open_account(&alice.id, Some("usd")).unwrap();
        bank.deposit(&rub.id, 12_345, "").unwrap();

        let out = dir.path().join("custom.csv");
        let path = export_user_summary(bank.store(), &alice.id, &dir.path().join("reports"), Some(out.clone())).unwrap();
        assert_eq!(path, out);
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "account_id,currency,balance_minor,closed");
        assert_eq!(lines[1], "a000001,RUB,12345,false");
        assert_eq!(lines[2], "a000002,USD,0,false");
    }
}
