//! SQLite-backed stores: users, cards, append-only login events, append-only
//! transfer records. Timestamps are stored as integer unix milliseconds.

use crate::error::StoreError;
use crate::models::{Card, CardStatus, LoginEvent, Transfer, User, UserStatus};
use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::bootstrap(Connection::open(path)?)
    }

    /// Fresh in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                status TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS cards (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                number TEXT NOT NULL UNIQUE,
                balance REAL NOT NULL,
                status TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_cards_user ON cards(user_id);
            CREATE TABLE IF NOT EXISTS login_events (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                when_ms INTEGER NOT NULL,
                phone_model TEXT NOT NULL,
                os TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_login_events_user_ts ON login_events(user_id, when_ms);
            CREATE TABLE IF NOT EXISTS transfers (
                id TEXT PRIMARY KEY,
                from_user_id TEXT NOT NULL,
                from_card_id TEXT NOT NULL,
                to_card_id TEXT NOT NULL,
                amount REAL NOT NULL,
                when_ms INTEGER NOT NULL,
                fraud_score REAL NOT NULL,
                is_blocked INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_transfers_user_ts ON transfers(from_user_id, when_ms);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // --- users ---

    pub fn user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock().expect("lock");
        Ok(conn
            .query_row(
                "SELECT id, first_name, last_name, status FROM users WHERE id = ?1",
                params![id],
                read_user,
            )
            .optional()?)
    }

    pub fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        self.conn.lock().expect("lock").execute(
            "INSERT INTO users (id, first_name, last_name, status) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 first_name = excluded.first_name,
                 last_name = excluded.last_name,
                 status = excluded.status",
            params![
                user.id,
                user.first_name,
                user.last_name,
                user.status.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.conn.lock().expect("lock");
        let mut stmt =
            conn.prepare("SELECT id, first_name, last_name, status FROM users ORDER BY id")?;
        let rows = stmt.query_map([], read_user)?;
        collect(rows)
    }

    pub fn count_users(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().expect("lock");
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    // --- cards ---

    pub fn insert_card(&self, card: &Card) -> Result<(), StoreError> {
        self.conn.lock().expect("lock").execute(
            "INSERT INTO cards (id, user_id, number, balance, status) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                card.id.to_string(),
                card.user_id,
                card.number,
                card.balance,
                card.status.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn cards_for_user(&self, user_id: &str) -> Result<Vec<Card>, StoreError> {
        let conn = self.conn.lock().expect("lock");
        let mut stmt = conn.prepare(
            "SELECT id, user_id, number, balance, status FROM cards WHERE user_id = ?1",
        )?;
        let rows = stmt.query_map(params![user_id], read_card)?;
        collect(rows)
    }

    pub fn card_by_number(&self, number: &str) -> Result<Option<Card>, StoreError> {
        let conn = self.conn.lock().expect("lock");
        Ok(conn
            .query_row(
                "SELECT id, user_id, number, balance, status FROM cards WHERE number = ?1",
                params![number],
                read_card,
            )
            .optional()?)
    }

    // --- login events (append-only) ---

    pub fn append_login_event(&self, event: &LoginEvent) -> Result<(), StoreError> {
        self.conn.lock().expect("lock").execute(
            "INSERT INTO login_events (id, user_id, when_ms, phone_model, os)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id.to_string(),
                event.user_id,
                event.when.timestamp_millis(),
                event.phone_model,
                event.os
            ],
        )?;
        Ok(())
    }

    /// Full history, ascending by timestamp; no pagination.
    pub fn login_events_for_user(&self, user_id: &str) -> Result<Vec<LoginEvent>, StoreError> {
        let conn = self.conn.lock().expect("lock");
        let mut stmt = conn.prepare(
            "SELECT id, user_id, when_ms, phone_model, os FROM login_events
             WHERE user_id = ?1 ORDER BY when_ms ASC",
        )?;
        let rows = stmt.query_map(params![user_id], read_login_event)?;
        collect(rows)
    }

    // --- transfers (append-only) ---

    pub fn append_transfer(&self, transfer: &Transfer) -> Result<(), StoreError> {
        self.conn.lock().expect("lock").execute(
            "INSERT INTO transfers
                 (id, from_user_id, from_card_id, to_card_id, amount, when_ms, fraud_score, is_blocked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                transfer.id.to_string(),
                transfer.from_user_id,
                transfer.from_card_id.to_string(),
                transfer.to_card_id.to_string(),
                transfer.amount,
                transfer.when.timestamp_millis(),
                transfer.fraud_score,
                transfer.is_blocked
            ],
        )?;
        Ok(())
    }

    /// Most recent first.
    pub fn transfers_for_user(&self, user_id: &str) -> Result<Vec<Transfer>, StoreError> {
        let conn = self.conn.lock().expect("lock");
        let mut stmt = conn.prepare(
            "SELECT id, from_user_id, from_card_id, to_card_id, amount, when_ms, fraud_score, is_blocked
             FROM transfers WHERE from_user_id = ?1 ORDER BY when_ms DESC",
        )?;
        let rows = stmt.query_map(params![user_id], read_transfer)?;
        collect(rows)
    }

    /// Daily blocked/total counts, optionally bounded to `[start, end)`.
    pub fn transfer_analytics(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<TransferAnalytics, StoreError> {
        let start_ms = start.map(|t| t.timestamp_millis());
        let end_ms = end.map(|t| t.timestamp_millis());
        let conn = self.conn.lock().expect("lock");
        let mut stmt = conn.prepare(
            "SELECT date(when_ms / 1000, 'unixepoch') AS day,
                    COUNT(*) AS total,
                    COALESCE(SUM(is_blocked), 0) AS blocked
             FROM transfers
             WHERE (?1 IS NULL OR when_ms >= ?1)
               AND (?2 IS NULL OR when_ms < ?2)
             GROUP BY day
             ORDER BY day ASC",
        )?;
        let rows = stmt.query_map(params![start_ms, end_ms], |row| {
            let total: i64 = row.get(1)?;
            let blocked: i64 = row.get(2)?;
            Ok(DailyTransferStats {
                date: row.get(0)?,
                total,
                blocked,
                successful: total - blocked,
            })
        })?;

        let mut analytics = TransferAnalytics {
            total_transfers: 0,
            blocked_transfers: 0,
            daily: Vec::new(),
        };
        for row in rows {
            let day = row?;
            analytics.total_transfers += day.total;
            analytics.blocked_transfers += day.blocked;
            analytics.daily.push(day);
        }
        Ok(analytics)
    }

    // --- demo seeding ---

    /// Populate a fresh database with a small demo population so the service
    /// is usable out of the box. Returns the number of users created.
    pub fn seed_demo_users(&self) -> Result<usize, StoreError> {
        let users = [
            ("alice", "Alice", "Anderson"),
            ("bob", "Bob", "Baker"),
            ("admin", "Ada", "Minsk"),
        ];
        for (id, first, last) in users {
            self.upsert_user(&User {
                id: id.to_string(),
                first_name: first.to_string(),
                last_name: last.to_string(),
                status: UserStatus::Active,
            })?;
        }

        let mut rng = rand::thread_rng();
        for (user_id, balance) in [("alice", 2500.0), ("alice", 740.0), ("bob", 1200.0)] {
            self.insert_card(&Card {
                id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                number: random_card_number(&mut rng),
                balance,
                status: CardStatus::Active,
            })?;
        }
        Ok(users.len())
    }
}

/// Daily slice of the admin transfer analytics.
#[derive(Debug, Clone, Serialize)]
pub struct DailyTransferStats {
    pub date: String,
    pub total: i64,
    pub blocked: i64,
    pub successful: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferAnalytics {
    pub total_transfers: i64,
    pub blocked_transfers: i64,
    pub daily: Vec<DailyTransferStats>,
}

fn random_card_number(rng: &mut impl Rng) -> String {
    format!("4{:015}", rng.gen_range(0..1_000_000_000_000_000u64))
}

fn collect<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, StoreError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn read_user(row: &Row) -> rusqlite::Result<User> {
    let status: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        status: UserStatus::parse(&status).ok_or_else(|| bad_column(3, &status))?,
    })
}

fn read_card(row: &Row) -> rusqlite::Result<Card> {
    let status: String = row.get(4)?;
    Ok(Card {
        id: read_uuid(row, 0)?,
        user_id: row.get(1)?,
        number: row.get(2)?,
        balance: row.get(3)?,
        status: CardStatus::parse(&status).ok_or_else(|| bad_column(4, &status))?,
    })
}

fn read_login_event(row: &Row) -> rusqlite::Result<LoginEvent> {
    Ok(LoginEvent {
        id: read_uuid(row, 0)?,
        user_id: row.get(1)?,
        when: read_time(row, 2)?,
        phone_model: row.get(3)?,
        os: row.get(4)?,
    })
}

fn read_transfer(row: &Row) -> rusqlite::Result<Transfer> {
    Ok(Transfer {
        id: read_uuid(row, 0)?,
        from_user_id: row.get(1)?,
        from_card_id: read_uuid(row, 2)?,
        to_card_id: read_uuid(row, 3)?,
        amount: row.get(4)?,
        when: read_time(row, 5)?,
        fraud_score: row.get(6)?,
        is_blocked: row.get(7)?,
    })
}

fn read_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn read_time(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    Ok(Utc.timestamp_millis_opt(ms).single().unwrap_or_default())
}

fn bad_column(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unrecognized value '{}'", value).into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn login_event(user: &str, when: DateTime<Utc>) -> LoginEvent {
        LoginEvent {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            when,
            phone_model: "pixel-8".to_string(),
            os: "android".to_string(),
        }
    }

    fn transfer(user: &str, when: DateTime<Utc>, blocked: bool) -> Transfer {
        Transfer {
            id: Uuid::new_v4(),
            from_user_id: user.to_string(),
            from_card_id: Uuid::new_v4(),
            to_card_id: Uuid::new_v4(),
            amount: 50.0,
            when,
            fraud_score: if blocked { 0.9 } else { 0.1 },
            is_blocked: blocked,
        }
    }

    #[test]
    fn user_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_user(&User {
                id: "u1".to_string(),
                first_name: "Ann".to_string(),
                last_name: "Lee".to_string(),
                status: UserStatus::Active,
            })
            .unwrap();
        let user = store.user_by_id("u1").unwrap().unwrap();
        assert_eq!(user.first_name, "Ann");
        assert!(store.user_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn login_events_come_back_ascending() {
        let store = Store::open_in_memory().unwrap();
        let base = Utc::now();
        store.append_login_event(&login_event("u1", base)).unwrap();
        store
            .append_login_event(&login_event("u1", base - Duration::days(2)))
            .unwrap();
        store
            .append_login_event(&login_event("u1", base - Duration::days(1)))
            .unwrap();
        store
            .append_login_event(&login_event("other", base))
            .unwrap();

        let events = store.login_events_for_user("u1").unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|w| w[0].when <= w[1].when));
    }

    #[test]
    fn transfers_come_back_descending() {
        let store = Store::open_in_memory().unwrap();
        let base = Utc::now();
        for days_ago in [3, 1, 2] {
            store
                .append_transfer(&transfer("u1", base - Duration::days(days_ago), false))
                .unwrap();
        }
        let transfers = store.transfers_for_user("u1").unwrap();
        assert_eq!(transfers.len(), 3);
        assert!(transfers.windows(2).all(|w| w[0].when >= w[1].when));
    }

    #[test]
    fn transfer_roundtrip_preserves_verdict() {
        let store = Store::open_in_memory().unwrap();
        let original = transfer("u1", Utc::now(), true);
        store.append_transfer(&original).unwrap();
        let fetched = &store.transfers_for_user("u1").unwrap()[0];
        assert_eq!(fetched.id, original.id);
        assert_eq!(fetched.fraud_score, 0.9);
        assert!(fetched.is_blocked);
    }

    #[test]
    fn analytics_counts_blocked_and_total() {
        let store = Store::open_in_memory().unwrap();
        let day1 = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2024, 6, 2, 10, 0, 0).unwrap();
        store.append_transfer(&transfer("u1", day1, false)).unwrap();
        store.append_transfer(&transfer("u1", day1, true)).unwrap();
        store.append_transfer(&transfer("u2", day2, false)).unwrap();

        let analytics = store.transfer_analytics(None, None).unwrap();
        assert_eq!(analytics.total_transfers, 3);
        assert_eq!(analytics.blocked_transfers, 1);
        assert_eq!(analytics.daily.len(), 2);
        assert_eq!(analytics.daily[0].date, "2024-06-01");
        assert_eq!(analytics.daily[0].blocked, 1);
        assert_eq!(analytics.daily[0].successful, 1);

        let bounded = store
            .transfer_analytics(Some(day2 - Duration::hours(12)), None)
            .unwrap();
        assert_eq!(bounded.total_transfers, 1);
    }

    #[test]
    fn seeding_creates_users_and_cards() {
        let store = Store::open_in_memory().unwrap();
        let seeded = store.seed_demo_users().unwrap();
        assert_eq!(seeded as i64, store.count_users().unwrap());
        let cards = store.cards_for_user("alice").unwrap();
        assert_eq!(cards.len(), 2);
        assert!(cards.iter().all(|c| c.number.len() == 16));
    }
}
