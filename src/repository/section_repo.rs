// ==========================================
// 课程排课与选课核心 - 开课班级仓储
// ==========================================
// 红线: current_enrollment 只通过 try_claim_seat_tx / release_seat_tx 变更
// 红线: 占座是一条带条件的 UPDATE，不做"先读后写"
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::section::{EnrollmentCounterAudit, Section, SectionOccupancy};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const SECTION_COLUMNS: &str = r#"
    section_id, course_id, term_id, instructor_id, credit_hours,
    max_enrollment, current_enrollment,
    waitlist_enabled, waitlist_capacity,
    prerequisites_enforced, is_cancelled
"#;

// ==========================================
// SectionRepository - 班级仓储
// ==========================================
pub struct SectionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SectionRepository {
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
    // 写入操作（学期准备）
    // ==========================================

    /// 新建班级；current_enrollment 一律从 0 开始，忽略传入值
    pub fn insert(&self, section: &Section) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, section)
    }

    pub fn insert_tx(conn: &Connection, section: &Section) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO section (
                section_id, course_id, term_id, instructor_id, credit_hours,
                max_enrollment, current_enrollment,
                waitlist_enabled, waitlist_capacity,
                prerequisites_enforced, is_cancelled
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?10)
            "#,
            params![
                section.section_id,
                section.course_id,
                section.term_id,
                section.instructor_id,
                section.credit_hours,
                section.max_enrollment,
                section.waitlist_enabled,
                section.waitlist_capacity,
                section.prerequisites_enforced,
                section.is_cancelled,
            ],
        )?;
        Ok(())
    }

    /// 设置取消标记（学期准备流程使用）
    pub fn set_cancelled(&self, section_id: &str, cancelled: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE section SET is_cancelled = ?2 WHERE section_id = ?1",
            params![section_id, cancelled],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Section", section_id));
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, section_id: &str) -> RepositoryResult<Option<Section>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, section_id)
    }

    pub fn find_by_id_tx(conn: &Connection, section_id: &str) -> RepositoryResult<Option<Section>> {
        let sql = format!("SELECT {} FROM section WHERE section_id = ?1", SECTION_COLUMNS);
        let section = conn
            .query_row(&sql, params![section_id], map_section_row)
            .optional()?;
        Ok(section)
    }

    // ==========================================
    // 座位计数（仅供选课生命周期在事务内调用）
    // ==========================================

    /// 尝试占用一个座位
    ///
    /// # 返回
    /// - Ok(true): 已占座（current_enrollment + 1）
    /// - Ok(false): 已满或班级已取消
    pub fn try_claim_seat_tx(conn: &Connection, section_id: &str) -> RepositoryResult<bool> {
        let rows = conn.execute(
            r#"
            UPDATE section
            SET current_enrollment = current_enrollment + 1
            WHERE section_id = ?1
              AND is_cancelled = 0
              AND current_enrollment < max_enrollment
            "#,
            params![section_id],
        )?;
        Ok(rows == 1)
    }

    /// 释放一个座位
    ///
    /// # 返回
    /// - Ok(true): 已释放
    /// - Ok(false): 计数已为 0（计数漂移，由调用方记录）
    pub fn release_seat_tx(conn: &Connection, section_id: &str) -> RepositoryResult<bool> {
        let rows = conn.execute(
            r#"
            UPDATE section
            SET current_enrollment = current_enrollment - 1
            WHERE section_id = ?1 AND current_enrollment > 0
            "#,
            params![section_id],
        )?;
        Ok(rows == 1)
    }

    // ==========================================
    // 只读投影
    // ==========================================

    pub fn occupancy(&self, section_id: &str) -> RepositoryResult<Option<SectionOccupancy>> {
        let conn = self.get_conn()?;
        let occupancy = conn
            .query_row(
                r#"
                SELECT s.section_id, s.max_enrollment, s.current_enrollment,
                       (SELECT COUNT(*) FROM enrollment e
                        WHERE e.section_id = s.section_id AND e.status = 'WAITLISTED')
                FROM section s
                WHERE s.section_id = ?1
                "#,
                params![section_id],
                |row| {
                    let max_enrollment: i32 = row.get(1)?;
                    let current_enrollment: i32 = row.get(2)?;
                    Ok(SectionOccupancy {
                        section_id: row.get(0)?,
                        max_enrollment,
                        current_enrollment,
                        waitlisted: row.get(3)?,
                        available: (max_enrollment - current_enrollment).max(0),
                    })
                },
            )
            .optional()?;
        Ok(occupancy)
    }

    /// 核对计数器与选课状态（只读，不修复）
    pub fn audit_enrollment_counter(&self, section_id: &str) -> RepositoryResult<EnrollmentCounterAudit> {
        let conn = self.get_conn()?;
        conn.query_row(
            r#"
            SELECT s.section_id, s.current_enrollment,
                   (SELECT COUNT(*) FROM enrollment e
                    WHERE e.section_id = s.section_id
                      AND e.status IN ('ENROLLED', 'COMPLETED'))
            FROM section s
            WHERE s.section_id = ?1
            "#,
            params![section_id],
            map_audit_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::not_found("Section", section_id))
    }

    /// 核对全部班级
    pub fn audit_all_counters(&self) -> RepositoryResult<Vec<EnrollmentCounterAudit>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT s.section_id, s.current_enrollment,
                   (SELECT COUNT(*) FROM enrollment e
                    WHERE e.section_id = s.section_id
                      AND e.status IN ('ENROLLED', 'COMPLETED'))
            FROM section s
            ORDER BY s.section_id
            "#,
        )?;
        let audits = stmt
            .query_map([], map_audit_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(audits)
    }
}

fn map_section_row(row: &Row) -> SqliteResult<Section> {
    Ok(Section {
        section_id: row.get(0)?,
        course_id: row.get(1)?,
        term_id: row.get(2)?,
        instructor_id: row.get(3)?,
        credit_hours: row.get(4)?,
        max_enrollment: row.get(5)?,
        current_enrollment: row.get(6)?,
        waitlist_enabled: row.get(7)?,
        waitlist_capacity: row.get(8)?,
        prerequisites_enforced: row.get(9)?,
        is_cancelled: row.get(10)?,
    })
}

fn map_audit_row(row: &Row) -> SqliteResult<EnrollmentCounterAudit> {
    Ok(EnrollmentCounterAudit {
        section_id: row.get(0)?,
        stored: row.get(1)?,
        derived: row.get(2)?,
    })
}
