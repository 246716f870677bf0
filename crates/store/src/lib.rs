//! SQLite persistence for users, sessions, the encrypted credential blob,
//! monitor configurations and their category definitions.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use models::{CategoryDefinition, CategoryKind, FieldMapping, MonitorConfig, User};

mod crypto;

pub use crypto::CredentialCipher;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("opening database at {}", path.as_ref().display()))?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("store mutex poisoned"))
    }

    fn migrate(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );
                CREATE TABLE IF NOT EXISTS sessions (
                    token TEXT PRIMARY KEY,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );
                CREATE TABLE IF NOT EXISTS credentials (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    encrypted TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );
                CREATE TABLE IF NOT EXISTS monitor_configs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    spreadsheet_url TEXT NOT NULL,
                    worksheets TEXT NOT NULL DEFAULT '',
                    col_date TEXT NOT NULL DEFAULT 'Timestamp',
                    col_income TEXT NOT NULL DEFAULT 'Nominal Pemasukan',
                    col_expense TEXT NOT NULL DEFAULT 'Nominal Pengeluaran',
                    col_source_income TEXT,
                    col_source_expense TEXT,
                    debt_keywords TEXT,
                    kpi_income_cell TEXT,
                    kpi_expense_cell TEXT,
                    kpi_balance_cell TEXT,
                    clean_income_cells TEXT,
                    clean_expense_cells TEXT
                );
                CREATE TABLE IF NOT EXISTS categories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    config_id INTEGER NOT NULL REFERENCES monitor_configs(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    cell TEXT NOT NULL,
                    kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
                    is_clean INTEGER NOT NULL DEFAULT 0,
                    position INTEGER NOT NULL DEFAULT 0
                );",
            )
            .context("running migrations")
    }

    // Users

    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
            params![username, password_hash],
        )
        .with_context(|| format!("creating user '{}'", username))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_user(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, username, password_hash FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    // Sessions

    pub fn create_session(&self, token: &str, user_id: i64) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO sessions (token, user_id) VALUES (?1, ?2)",
            params![token, user_id],
        )?;
        Ok(())
    }

    pub fn session_user(&self, token: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT u.id, u.username, u.password_hash
                 FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token = ?1",
                params![token],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn delete_session(&self, token: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
    }

    // Credentials (one global record)

    pub fn set_credentials(&self, encrypted: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO credentials (id, encrypted, updated_at)
             VALUES (1, ?1, datetime('now'))
             ON CONFLICT(id) DO UPDATE SET encrypted = ?1, updated_at = datetime('now')",
            params![encrypted],
        )?;
        Ok(())
    }

    pub fn credentials(&self) -> Result<Option<String>> {
        let conn = self.conn()?;
        let encrypted = conn
            .query_row(
                "SELECT encrypted FROM credentials WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(encrypted)
    }

    // Monitor configurations

    pub fn create_config(&self, cfg: &MonitorConfig) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO monitor_configs (
                user_id, name, spreadsheet_url, worksheets,
                col_date, col_income, col_expense, col_source_income, col_source_expense,
                debt_keywords, kpi_income_cell, kpi_expense_cell, kpi_balance_cell,
                clean_income_cells, clean_expense_cells
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                cfg.user_id,
                cfg.name,
                cfg.spreadsheet_url,
                cfg.worksheets,
                cfg.mapping.col_date,
                cfg.mapping.col_income,
                cfg.mapping.col_expense,
                cfg.mapping.col_source_income,
                cfg.mapping.col_source_expense,
                cfg.mapping.debt_keywords,
                cfg.mapping.kpi_income_cell,
                cfg.mapping.kpi_expense_cell,
                cfg.mapping.kpi_balance_cell,
                cfg.mapping.clean_income_cells,
                cfg.mapping.clean_expense_cells,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Updates a configuration owned by `user_id`. Returns false when no
    /// such row exists (unknown id or foreign owner).
    pub fn update_config(&self, cfg: &MonitorConfig) -> Result<bool> {
        let changed = self.conn()?.execute(
            "UPDATE monitor_configs SET
                name = ?1, spreadsheet_url = ?2, worksheets = ?3,
                col_date = ?4, col_income = ?5, col_expense = ?6,
                col_source_income = ?7, col_source_expense = ?8, debt_keywords = ?9,
                kpi_income_cell = ?10, kpi_expense_cell = ?11, kpi_balance_cell = ?12,
                clean_income_cells = ?13, clean_expense_cells = ?14
             WHERE id = ?15 AND user_id = ?16",
            params![
                cfg.name,
                cfg.spreadsheet_url,
                cfg.worksheets,
                cfg.mapping.col_date,
                cfg.mapping.col_income,
                cfg.mapping.col_expense,
                cfg.mapping.col_source_income,
                cfg.mapping.col_source_expense,
                cfg.mapping.debt_keywords,
                cfg.mapping.kpi_income_cell,
                cfg.mapping.kpi_expense_cell,
                cfg.mapping.kpi_balance_cell,
                cfg.mapping.clean_income_cells,
                cfg.mapping.clean_expense_cells,
                cfg.id,
                cfg.user_id,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn get_config(&self, id: i64, user_id: i64) -> Result<Option<MonitorConfig>> {
        let conn = self.conn()?;
        let cfg = conn
            .query_row(
                &format!(
                    "SELECT {} FROM monitor_configs WHERE id = ?1 AND user_id = ?2",
                    CONFIG_COLUMNS
                ),
                params![id, user_id],
                config_from_row,
            )
            .optional()?;
        Ok(cfg)
    }

    pub fn list_configs(&self, user_id: i64) -> Result<Vec<MonitorConfig>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM monitor_configs WHERE user_id = ?1 ORDER BY id",
            CONFIG_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id], config_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Deletes a configuration and, via FK cascade, its categories.
    pub fn delete_config(&self, id: i64, user_id: i64) -> Result<bool> {
        let changed = self.conn()?.execute(
            "DELETE FROM monitor_configs WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(changed > 0)
    }

    // Category definitions

    pub fn add_category(&self, cat: &CategoryDefinition) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (config_id, name, cell, kind, is_clean, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                cat.config_id,
                cat.name,
                cat.cell,
                cat.kind.as_str(),
                cat.is_clean,
                cat.position,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_category(&self, cat: &CategoryDefinition) -> Result<bool> {
        let changed = self.conn()?.execute(
            "UPDATE categories SET name = ?1, cell = ?2, kind = ?3, is_clean = ?4, position = ?5
             WHERE id = ?6 AND config_id = ?7",
            params![
                cat.name,
                cat.cell,
                cat.kind.as_str(),
                cat.is_clean,
                cat.position,
                cat.id,
                cat.config_id,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_category(&self, id: i64, config_id: i64) -> Result<bool> {
        let changed = self.conn()?.execute(
            "DELETE FROM categories WHERE id = ?1 AND config_id = ?2",
            params![id, config_id],
        )?;
        Ok(changed > 0)
    }

    /// Categories in their stored order; the pie series follow it.
    pub fn list_categories(&self, config_id: i64) -> Result<Vec<CategoryDefinition>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, config_id, name, cell, kind, is_clean, position
             FROM categories WHERE config_id = ?1 ORDER BY position, id",
        )?;
        let rows = stmt.query_map(params![config_id], category_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

const CONFIG_COLUMNS: &str = "id, user_id, name, spreadsheet_url, worksheets, \
    col_date, col_income, col_expense, col_source_income, col_source_expense, \
    debt_keywords, kpi_income_cell, kpi_expense_cell, kpi_balance_cell, \
    clean_income_cells, clean_expense_cells";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
    })
}

fn config_from_row(row: &Row) -> rusqlite::Result<MonitorConfig> {
    Ok(MonitorConfig {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        spreadsheet_url: row.get(3)?,
        worksheets: row.get(4)?,
        mapping: FieldMapping {
            col_date: row.get(5)?,
            col_income: row.get(6)?,
            col_expense: row.get(7)?,
            col_source_income: row.get(8)?,
            col_source_expense: row.get(9)?,
            debt_keywords: row.get(10)?,
            kpi_income_cell: row.get(11)?,
            kpi_expense_cell: row.get(12)?,
            kpi_balance_cell: row.get(13)?,
            clean_income_cells: row.get(14)?,
            clean_expense_cells: row.get(15)?,
        },
    })
}

fn category_from_row(row: &Row) -> rusqlite::Result<CategoryDefinition> {
    let kind: String = row.get(4)?;
    Ok(CategoryDefinition {
        id: row.get(0)?,
        config_id: row.get(1)?,
        name: row.get(2)?,
        cell: row.get(3)?,
        // The CHECK constraint keeps unknown kinds out of the table
        kind: CategoryKind::parse(&kind).unwrap_or(CategoryKind::Expense),
        is_clean: row.get(5)?,
        position: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_user() -> (Store, i64) {
        let store = Store::open_in_memory().unwrap();
        let user_id = store.create_user("budi", "hash").unwrap();
        (store, user_id)
    }

    fn sample_config(user_id: i64) -> MonitorConfig {
        MonitorConfig {
            id: 0,
            user_id,
            name: "Keuangan 2025".to_string(),
            spreadsheet_url: "https://docs.google.com/spreadsheets/d/abc/edit".to_string(),
            worksheets: "Januari,Februari".to_string(),
            mapping: FieldMapping {
                col_date: "Timestamp".to_string(),
                col_income: "Nominal Pemasukan".to_string(),
                col_expense: "Nominal Pengeluaran".to_string(),
                debt_keywords: Some("hutang".to_string()),
                kpi_income_cell: Some("K1".to_string()),
                ..FieldMapping::default()
            },
        }
    }

    #[test]
    fn test_users_and_sessions() {
        let (store, user_id) = store_with_user();
        assert!(store.find_user("siti").unwrap().is_none());
        assert!(store.create_user("budi", "other").is_err()); // unique username

        store.create_session("token-1", user_id).unwrap();
        let user = store.session_user("token-1").unwrap().unwrap();
        assert_eq!(user.username, "budi");

        store.delete_session("token-1").unwrap();
        assert!(store.session_user("token-1").unwrap().is_none());
    }

    #[test]
    fn test_config_crud_scoped_to_owner() {
        let (store, user_id) = store_with_user();
        let other_id = store.create_user("siti", "hash").unwrap();

        let id = store.create_config(&sample_config(user_id)).unwrap();
        assert!(store.get_config(id, other_id).unwrap().is_none());

        let mut cfg = store.get_config(id, user_id).unwrap().unwrap();
        assert_eq!(cfg.mapping.kpi_income_cell.as_deref(), Some("K1"));

        cfg.name = "Keuangan 2026".to_string();
        cfg.mapping.kpi_income_cell = Some("L1".to_string());
        assert!(store.update_config(&cfg).unwrap());

        let reloaded = store.get_config(id, user_id).unwrap().unwrap();
        assert_eq!(reloaded.name, "Keuangan 2026");
        assert_eq!(reloaded.mapping.kpi_income_cell.as_deref(), Some("L1"));

        assert_eq!(store.list_configs(user_id).unwrap().len(), 1);
        assert!(store.list_configs(other_id).unwrap().is_empty());

        assert!(!store.delete_config(id, other_id).unwrap());
        assert!(store.delete_config(id, user_id).unwrap());
        assert!(store.get_config(id, user_id).unwrap().is_none());
    }

    #[test]
    fn test_categories_ordered_and_cascade_deleted() {
        let (store, user_id) = store_with_user();
        let config_id = store.create_config(&sample_config(user_id)).unwrap();

        let cat = |name: &str, position: i64| CategoryDefinition {
            id: 0,
            config_id,
            name: name.to_string(),
            cell: "K5".to_string(),
            kind: CategoryKind::Expense,
            is_clean: true,
            position,
        };
        store.add_category(&cat("Transport", 2)).unwrap();
        store.add_category(&cat("Makan", 1)).unwrap();

        let names: Vec<String> = store
            .list_categories(config_id)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Makan", "Transport"]);

        store.delete_config(config_id, user_id).unwrap();
        assert!(store.list_categories(config_id).unwrap().is_empty());
    }

    #[test]
    fn test_category_update_and_delete() {
        let (store, user_id) = store_with_user();
        let config_id = store.create_config(&sample_config(user_id)).unwrap();

        let mut cat = CategoryDefinition {
            id: 0,
            config_id,
            name: "Makan".to_string(),
            cell: "K5".to_string(),
            kind: CategoryKind::Expense,
            is_clean: false,
            position: 0,
        };
        cat.id = store.add_category(&cat).unwrap();

        cat.is_clean = true;
        cat.cell = "K6".to_string();
        assert!(store.update_category(&cat).unwrap());

        let stored = &store.list_categories(config_id).unwrap()[0];
        assert!(stored.is_clean);
        assert_eq!(stored.cell, "K6");

        assert!(!store.delete_category(cat.id, config_id + 1).unwrap());
        assert!(store.delete_category(cat.id, config_id).unwrap());
    }

    #[test]
    fn test_credentials_upsert() {
        let (store, _) = store_with_user();
        assert!(store.credentials().unwrap().is_none());

        store.set_credentials("enc:first").unwrap();
        assert_eq!(store.credentials().unwrap().as_deref(), Some("enc:first"));

        store.set_credentials("enc:second").unwrap();
        assert_eq!(store.credentials().unwrap().as_deref(), Some("enc:second"));
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledgerboard.db");
        {
            let store = Store::open(&path).unwrap();
            store.create_user("budi", "hash").unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert!(store.find_user("budi").unwrap().is_some());
    }
}
