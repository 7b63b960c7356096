// ==========================================
// 课程排课与选课核心 - 学期日历仓储
// ==========================================
// 学期日历是外部事实: 由学期准备/导入写入，选课生命周期只读
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::calendar::TermDeadlines;
use crate::engine::calendar::TermCalendarProvider;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_codec::{date_col, fmt_date};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct TermCalendarRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TermCalendarRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn upsert_tx(conn: &Connection, deadlines: &TermDeadlines) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO term_calendar (term_id, add_drop_deadline, withdrawal_deadline, term_end_date)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(term_id) DO UPDATE SET
                add_drop_deadline = excluded.add_drop_deadline,
                withdrawal_deadline = excluded.withdrawal_deadline,
                term_end_date = excluded.term_end_date
            "#,
            params![
                deadlines.term_id,
                fmt_date(deadlines.add_drop_deadline),
                fmt_date(deadlines.withdrawal_deadline),
                fmt_date(deadlines.term_end_date),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_term(&self, term_id: &str) -> RepositoryResult<Option<TermDeadlines>> {
        let conn = self.get_conn()?;
        let deadlines = conn
            .query_row(
                r#"
                SELECT term_id, add_drop_deadline, withdrawal_deadline, term_end_date
                FROM term_calendar
                WHERE term_id = ?1
                "#,
                params![term_id],
                |row| {
                    Ok(TermDeadlines {
                        term_id: row.get(0)?,
                        add_drop_deadline: date_col(row, 1)?,
                        withdrawal_deadline: date_col(row, 2)?,
                        term_end_date: date_col(row, 3)?,
                    })
                },
            )
            .optional()?;
        Ok(deadlines)
    }
}

impl TermCalendarProvider for TermCalendarRepository {
    fn deadlines_for(&self, term_id: &str) -> RepositoryResult<Option<TermDeadlines>> {
        self.find_by_term(term_id)
    }
}
