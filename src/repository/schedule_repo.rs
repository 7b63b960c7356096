// ==========================================
// 课程排课与选课核心 - 排课仓储
// ==========================================
// 红线: Repository 不做冲突判定，只提供冲突检查所需的视图
// 红线: 排课不物理删除，停用即 is_active = 0
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::catalog::TimeSlot;
use crate::domain::schedule::{BookedAssignment, DateRange, ScheduleAssignment};
use crate::domain::types::{AssignmentKind, DayOfWeek};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_codec::{
    date_col, fmt_date, fmt_opt_date, fmt_ts, opt_date_col, parsed_col, time_col, ts_col,
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const ASSIGNMENT_COLUMNS: &str = r#"
    assignment_id, section_id, time_slot_id, room_id,
    effective_from, effective_to, kind, is_active, created_at, updated_at
"#;

const BOOKED_SELECT: &str = r#"
    SELECT a.assignment_id, a.section_id, s.instructor_id, a.room_id,
           t.time_slot_id, t.day_of_week, t.start_time, t.end_time,
           a.effective_from, a.effective_to
    FROM schedule_assignment a
    JOIN section s ON s.section_id = a.section_id
    JOIN time_slot t ON t.time_slot_id = a.time_slot_id
"#;

// ==========================================
// ScheduleAssignmentRepository - 排课仓储
// ==========================================
pub struct ScheduleAssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ScheduleAssignmentRepository {
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

    // ==========================================
    // 写入操作（事务内）
    // ==========================================

    pub fn insert_tx(conn: &Connection, assignment: &ScheduleAssignment) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO schedule_assignment (
                assignment_id, section_id, time_slot_id, room_id,
                effective_from, effective_to, kind, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                assignment.assignment_id,
                assignment.section_id,
                assignment.time_slot_id,
                assignment.room_id,
                fmt_date(assignment.effective.from),
                fmt_opt_date(assignment.effective.to),
                assignment.kind.to_db_str(),
                assignment.is_active,
                fmt_ts(assignment.created_at),
                fmt_ts(assignment.updated_at),
            ],
        )?;
        Ok(())
    }

    /// 修改有效排课的日期区间
    pub fn update_range_tx(
        conn: &Connection,
        assignment_id: &str,
        range: &DateRange,
        updated_at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE schedule_assignment
            SET effective_from = ?2, effective_to = ?3, updated_at = ?4
            WHERE assignment_id = ?1 AND is_active = 1
            "#,
            params![
                assignment_id,
                fmt_date(range.from),
                fmt_opt_date(range.to),
                fmt_ts(updated_at),
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("ActiveScheduleAssignment", assignment_id));
        }
        Ok(())
    }

    /// 停用排课
    pub fn deactivate_tx(
        conn: &Connection,
        assignment_id: &str,
        updated_at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE schedule_assignment
            SET is_active = 0, updated_at = ?2
            WHERE assignment_id = ?1 AND is_active = 1
            "#,
            params![assignment_id, fmt_ts(updated_at)],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("ActiveScheduleAssignment", assignment_id));
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, assignment_id: &str) -> RepositoryResult<Option<ScheduleAssignment>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, assignment_id)
    }

    pub fn find_by_id_tx(
        conn: &Connection,
        assignment_id: &str,
    ) -> RepositoryResult<Option<ScheduleAssignment>> {
        let sql = format!(
            "SELECT {} FROM schedule_assignment WHERE assignment_id = ?1",
            ASSIGNMENT_COLUMNS
        );
        let assignment = conn
            .query_row(&sql, params![assignment_id], map_assignment_row)
            .optional()?;
        Ok(assignment)
    }

    /// 班级的全部排课（含已停用），按生效日期排序
    pub fn list_by_section(&self, section_id: &str) -> RepositoryResult<Vec<ScheduleAssignment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM schedule_assignment
            WHERE section_id = ?1
            ORDER BY effective_from, assignment_id
            "#,
            ASSIGNMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let assignments = stmt
            .query_map(params![section_id], map_assignment_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(assignments)
    }

    /// 某星期几上的全部有效排课（冲突检查视图）
    pub fn list_active_booked_on_day_tx(
        conn: &Connection,
        day: DayOfWeek,
    ) -> RepositoryResult<Vec<BookedAssignment>> {
        let sql = format!(
            "{} WHERE a.is_active = 1 AND t.day_of_week = ?1 ORDER BY a.assignment_id",
            BOOKED_SELECT
        );
        let mut stmt = conn.prepare(&sql)?;
        let booked = stmt
            .query_map(params![day.to_db_str()], map_booked_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(booked)
    }

    /// 一个班级的有效排课（冲突检查视图）
    pub fn list_active_booked_for_section_tx(
        conn: &Connection,
        section_id: &str,
    ) -> RepositoryResult<Vec<BookedAssignment>> {
        let sql = format!(
            "{} WHERE a.is_active = 1 AND a.section_id = ?1 ORDER BY a.assignment_id",
            BOOKED_SELECT
        );
        let mut stmt = conn.prepare(&sql)?;
        let booked = stmt
            .query_map(params![section_id], map_booked_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(booked)
    }

    /// 学生当前已选上（ENROLLED）的其他班级的有效排课
    pub fn list_active_booked_for_student_tx(
        conn: &Connection,
        student_id: &str,
        excluding_section_id: &str,
    ) -> RepositoryResult<Vec<BookedAssignment>> {
        let sql = format!(
            r#"
            {}
            WHERE a.is_active = 1
              AND a.section_id <> ?2
              AND a.section_id IN (
                  SELECT e.section_id FROM enrollment e
                  WHERE e.student_id = ?1 AND e.status = 'ENROLLED'
              )
            ORDER BY a.assignment_id
            "#,
            BOOKED_SELECT
        );
        let mut stmt = conn.prepare(&sql)?;
        let booked = stmt
            .query_map(params![student_id, excluding_section_id], map_booked_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(booked)
    }
}

fn map_assignment_row(row: &Row) -> SqliteResult<ScheduleAssignment> {
    Ok(ScheduleAssignment {
        assignment_id: row.get(0)?,
        section_id: row.get(1)?,
        time_slot_id: row.get(2)?,
        room_id: row.get(3)?,
        effective: DateRange {
            from: date_col(row, 4)?,
            to: opt_date_col(row, 5)?,
        },
        kind: parsed_col(row, 6, AssignmentKind::from_db_str)?,
        is_active: row.get(7)?,
        created_at: ts_col(row, 8)?,
        updated_at: ts_col(row, 9)?,
    })
}

fn map_booked_row(row: &Row) -> SqliteResult<BookedAssignment> {
    Ok(BookedAssignment {
        assignment_id: row.get(0)?,
        section_id: row.get(1)?,
        instructor_id: row.get(2)?,
        room_id: row.get(3)?,
        time_slot: TimeSlot {
            time_slot_id: row.get(4)?,
            day_of_week: parsed_col(row, 5, DayOfWeek::from_db_str)?,
            start_time: time_col(row, 6)?,
            end_time: time_col(row, 7)?,
        },
        effective: DateRange {
            from: date_col(row, 8)?,
            to: opt_date_col(row, 9)?,
        },
    })
}
