// ==========================================
// 课程排课与选课核心 - 选课仓储
// ==========================================
// 红线: Repository 不含业务逻辑（状态转换合法性由生命周期引擎判定）
// 红线: 状态更新带 from_status 条件，防止并发覆盖
// 红线: 选课记录不物理删除
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::enrollment::{ComponentScores, Enrollment, GradeOutcome};
use crate::domain::types::{EnrollmentStatus, LetterGrade};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_codec::{fmt_opt_date, fmt_ts, opt_date_col, opt_parsed_col, parsed_col, ts_col};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

const ENROLLMENT_COLUMNS: &str = r#"
    enrollment_id, student_id, section_id, status,
    midterm_score, final_score, assignment_score, participation_score,
    total_score, letter_grade, grade_points,
    total_classes, attended_classes,
    enrolled_at, status_changed_at, drop_date, completion_date
"#;

/// 状态变更写入参数
#[derive(Debug, Clone)]
pub struct StatusChange<'a> {
    pub enrollment_id: &'a str,
    pub from: EnrollmentStatus,
    pub to: EnrollmentStatus,
    pub changed_at: NaiveDateTime,
    pub drop_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
}

/// GPA 计算输入行: (grade_points, credit_hours)
pub type GradedCredit = (f64, i32);

// ==========================================
// EnrollmentRepository - 选课仓储
// ==========================================
pub struct EnrollmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EnrollmentRepository {
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

    pub fn insert_tx(conn: &Connection, enrollment: &Enrollment) -> RepositoryResult<()> {
        let grade = enrollment.grade.as_ref();
        conn.execute(
            r#"
            INSERT INTO enrollment (
                enrollment_id, student_id, section_id, status,
                midterm_score, final_score, assignment_score, participation_score,
                total_score, letter_grade, grade_points,
                total_classes, attended_classes,
                enrolled_at, status_changed_at, drop_date, completion_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                enrollment.enrollment_id,
                enrollment.student_id,
                enrollment.section_id,
                enrollment.status.to_db_str(),
                enrollment.scores.midterm,
                enrollment.scores.final_exam,
                enrollment.scores.assignment,
                enrollment.scores.participation,
                grade.map(|g| g.total_score),
                grade.map(|g| g.letter_grade.as_str()),
                grade.map(|g| g.grade_points),
                enrollment.total_classes,
                enrollment.attended_classes,
                fmt_ts(enrollment.enrolled_at),
                fmt_ts(enrollment.status_changed_at),
                fmt_opt_date(enrollment.drop_date),
                fmt_opt_date(enrollment.completion_date),
            ],
        )?;
        Ok(())
    }

    /// 按 from_status 条件更新状态
    ///
    /// # 返回
    /// - Ok(true): 已更新
    /// - Ok(false): 当前状态已不是 from_status（被并发修改）
    pub fn update_status_tx(conn: &Connection, change: &StatusChange) -> RepositoryResult<bool> {
        let rows = conn.execute(
            r#"
            UPDATE enrollment
            SET status = ?3,
                status_changed_at = ?4,
                drop_date = COALESCE(?5, drop_date),
                completion_date = COALESCE(?6, completion_date)
            WHERE enrollment_id = ?1 AND status = ?2
            "#,
            params![
                change.enrollment_id,
                change.from.to_db_str(),
                change.to.to_db_str(),
                fmt_ts(change.changed_at),
                fmt_opt_date(change.drop_date),
                fmt_opt_date(change.completion_date),
            ],
        )?;
        Ok(rows == 1)
    }

    /// 分项成绩与派生字段一起写入
    pub fn update_scores_tx(
        conn: &Connection,
        enrollment_id: &str,
        scores: &ComponentScores,
        grade: Option<&GradeOutcome>,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE enrollment
            SET midterm_score = ?2, final_score = ?3,
                assignment_score = ?4, participation_score = ?5,
                total_score = ?6, letter_grade = ?7, grade_points = ?8
            WHERE enrollment_id = ?1
            "#,
            params![
                enrollment_id,
                scores.midterm,
                scores.final_exam,
                scores.assignment,
                scores.participation,
                grade.map(|g| g.total_score),
                grade.map(|g| g.letter_grade.as_str()),
                grade.map(|g| g.grade_points),
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Enrollment", enrollment_id));
        }
        Ok(())
    }

    /// 考勤计数 +1（attended 为 true 时出勤数同时 +1）
    pub fn increment_attendance_tx(
        conn: &Connection,
        enrollment_id: &str,
        attended: bool,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE enrollment
            SET total_classes = total_classes + 1,
                attended_classes = attended_classes + ?2
            WHERE enrollment_id = ?1
            "#,
            params![enrollment_id, if attended { 1 } else { 0 }],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Enrollment", enrollment_id));
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, enrollment_id: &str) -> RepositoryResult<Option<Enrollment>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, enrollment_id)
    }

    pub fn find_by_id_tx(conn: &Connection, enrollment_id: &str) -> RepositoryResult<Option<Enrollment>> {
        let sql = format!("SELECT {} FROM enrollment WHERE enrollment_id = ?1", ENROLLMENT_COLUMNS);
        let enrollment = conn
            .query_row(&sql, params![enrollment_id], map_enrollment_row)
            .optional()?;
        Ok(enrollment)
    }

    pub fn find_by_student_section_tx(
        conn: &Connection,
        student_id: &str,
        section_id: &str,
    ) -> RepositoryResult<Option<Enrollment>> {
        let sql = format!(
            "SELECT {} FROM enrollment WHERE student_id = ?1 AND section_id = ?2",
            ENROLLMENT_COLUMNS
        );
        let enrollment = conn
            .query_row(&sql, params![student_id, section_id], map_enrollment_row)
            .optional()?;
        Ok(enrollment)
    }

    /// 等待最久的候补（enrolled_at 最早，同时刻按插入顺序）
    pub fn oldest_waitlisted_tx(conn: &Connection, section_id: &str) -> RepositoryResult<Option<Enrollment>> {
        let sql = format!(
            r#"
            SELECT {} FROM enrollment
            WHERE section_id = ?1 AND status = 'WAITLISTED'
            ORDER BY enrolled_at, rowid
            LIMIT 1
            "#,
            ENROLLMENT_COLUMNS
        );
        let enrollment = conn
            .query_row(&sql, params![section_id], map_enrollment_row)
            .optional()?;
        Ok(enrollment)
    }

    pub fn count_by_status_tx(
        conn: &Connection,
        section_id: &str,
        status: EnrollmentStatus,
    ) -> RepositoryResult<i32> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM enrollment WHERE section_id = ?1 AND status = ?2",
            params![section_id, status.to_db_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 候补队列（按等待先后）
    pub fn list_waitlist(&self, section_id: &str) -> RepositoryResult<Vec<Enrollment>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM enrollment
            WHERE section_id = ?1 AND status = 'WAITLISTED'
            ORDER BY enrolled_at, rowid
            "#,
            ENROLLMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let list = stmt
            .query_map(params![section_id], map_enrollment_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(list)
    }

    /// GPA 输入: 学生 ENROLLED / COMPLETED 且已有绩点的选课
    pub fn list_graded_credits(&self, student_id: &str) -> RepositoryResult<Vec<GradedCredit>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT e.grade_points, s.credit_hours
            FROM enrollment e
            JOIN section s ON s.section_id = e.section_id
            WHERE e.student_id = ?1
              AND e.status IN ('ENROLLED', 'COMPLETED')
              AND e.grade_points IS NOT NULL
            "#,
        )?;
        let rows = stmt
            .query_map(params![student_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 学生在某课程（任一班级）已结课的最好总评
    pub fn best_completed_score_for_course_tx(
        conn: &Connection,
        student_id: &str,
        course_id: &str,
    ) -> RepositoryResult<Option<f64>> {
        let best = conn.query_row(
            r#"
            SELECT MAX(e.total_score)
            FROM enrollment e
            JOIN section s ON s.section_id = e.section_id
            WHERE e.student_id = ?1
              AND s.course_id = ?2
              AND e.status = 'COMPLETED'
            "#,
            params![student_id, course_id],
            |row| row.get::<_, Option<f64>>(0),
        )?;
        Ok(best)
    }
}

fn map_enrollment_row(row: &Row) -> SqliteResult<Enrollment> {
    let total_score: Option<f64> = row.get(8)?;
    let letter_grade = opt_parsed_col(row, 9, LetterGrade::from_db_str)?;
    let grade_points: Option<f64> = row.get(10)?;
    let grade = match (total_score, letter_grade, grade_points) {
        (Some(total_score), Some(letter_grade), Some(grade_points)) => Some(GradeOutcome {
            total_score,
            letter_grade,
            grade_points,
        }),
        _ => None,
    };

    Ok(Enrollment {
        enrollment_id: row.get(0)?,
        student_id: row.get(1)?,
        section_id: row.get(2)?,
        status: parsed_col(row, 3, EnrollmentStatus::from_db_str)?,
        scores: ComponentScores {
            midterm: row.get(4)?,
            final_exam: row.get(5)?,
            assignment: row.get(6)?,
            participation: row.get(7)?,
        },
        grade,
        total_classes: row.get(11)?,
        attended_classes: row.get(12)?,
        enrolled_at: ts_col(row, 13)?,
        status_changed_at: ts_col(row, 14)?,
        drop_date: opt_date_col(row, 15)?,
        completion_date: opt_date_col(row, 16)?,
    })
}
