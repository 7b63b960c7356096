// ==========================================
// 课程排课与选课核心 - 先修关系仓储
// ==========================================
// 红线: 环检测由先修图引擎完成，仓储只负责整组替换
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::course::CoursePrerequisite;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct PrerequisiteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PrerequisiteRepository {
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

    /// 全部先修边（构建先修图）
    pub fn list_all_tx(conn: &Connection) -> RepositoryResult<Vec<CoursePrerequisite>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT course_id, prerequisite_course_id, min_total_score
            FROM course_prerequisite
            ORDER BY course_id, prerequisite_course_id
            "#,
        )?;
        let rules = stmt
            .query_map([], map_prerequisite_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rules)
    }

    pub fn list_for_course(&self, course_id: &str) -> RepositoryResult<Vec<CoursePrerequisite>> {
        let conn = self.get_conn()?;
        Self::list_for_course_tx(&conn, course_id)
    }

    pub fn list_for_course_tx(conn: &Connection, course_id: &str) -> RepositoryResult<Vec<CoursePrerequisite>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT course_id, prerequisite_course_id, min_total_score
            FROM course_prerequisite
            WHERE course_id = ?1
            ORDER BY prerequisite_course_id
            "#,
        )?;
        let rules = stmt
            .query_map(params![course_id], map_prerequisite_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rules)
    }

    /// 整组替换某课程的先修规则
    pub fn replace_for_course_tx(
        conn: &Connection,
        course_id: &str,
        rules: &[CoursePrerequisite],
    ) -> RepositoryResult<()> {
        conn.execute(
            "DELETE FROM course_prerequisite WHERE course_id = ?1",
            params![course_id],
        )?;
        let mut stmt = conn.prepare(
            r#"
            INSERT INTO course_prerequisite (course_id, prerequisite_course_id, min_total_score)
            VALUES (?1, ?2, ?3)
            "#,
        )?;
        for rule in rules {
            stmt.execute(params![course_id, rule.prerequisite_course_id, rule.min_total_score])?;
        }
        Ok(())
    }
}

fn map_prerequisite_row(row: &Row) -> SqliteResult<CoursePrerequisite> {
    Ok(CoursePrerequisite {
        course_id: row.get(0)?,
        prerequisite_course_id: row.get(1)?,
        min_total_score: row.get(2)?,
    })
}
