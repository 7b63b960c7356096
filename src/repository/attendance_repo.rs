// ==========================================
// 课程排课与选课核心 - 考勤仓储
// ==========================================
// 红线: 只追加，不覆盖
// 红线: (enrollment_id, assignment_id, session_date) 唯一（表约束兜底）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::attendance::AttendanceRecord;
use crate::domain::types::AttendanceStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_codec::{date_col, fmt_date, fmt_ts, parsed_col, ts_col};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct AttendanceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AttendanceRepository {
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

    pub fn insert_tx(conn: &Connection, record: &AttendanceRecord) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO attendance_record (
                record_id, enrollment_id, assignment_id, session_date, status, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.record_id,
                record.enrollment_id,
                record.assignment_id,
                fmt_date(record.session_date),
                record.status.to_db_str(),
                fmt_ts(record.recorded_at),
            ],
        )?;
        Ok(())
    }

    pub fn exists_tx(
        conn: &Connection,
        enrollment_id: &str,
        assignment_id: &str,
        session_date: NaiveDate,
    ) -> RepositoryResult<bool> {
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM attendance_record
            WHERE enrollment_id = ?1 AND assignment_id = ?2 AND session_date = ?3
            "#,
            params![enrollment_id, assignment_id, fmt_date(session_date)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// 选课的全部考勤记录（按上课日期）
    pub fn list_by_enrollment(&self, enrollment_id: &str) -> RepositoryResult<Vec<AttendanceRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT record_id, enrollment_id, assignment_id, session_date, status, recorded_at
            FROM attendance_record
            WHERE enrollment_id = ?1
            ORDER BY session_date, assignment_id
            "#,
        )?;
        let records = stmt
            .query_map(params![enrollment_id], map_attendance_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }
}

fn map_attendance_row(row: &Row) -> SqliteResult<AttendanceRecord> {
    Ok(AttendanceRecord {
        record_id: row.get(0)?,
        enrollment_id: row.get(1)?,
        assignment_id: row.get(2)?,
        session_date: date_col(row, 3)?,
        status: parsed_col(row, 4, AttendanceStatus::from_db_str)?,
        recorded_at: ts_col(row, 5)?,
    })
}
