// ==========================================
// 课程排课与选课核心 - 成绩 API
// ==========================================
// 职责: 分项成绩录入与派生成绩重算，学生 GPA 查询
// 红线: 分项与派生字段（总评/等级/绩点）在同一条 UPDATE 中写入，调用方看不到中间态
// 规则: 未传入的分项保持原值；只允许 ENROLLED / COMPLETED 的选课录入
// ==========================================

use crate::api::context::ApiContext;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::enrollment::ScoreUpdate;
use crate::domain::types::{EnrollmentStatus, LetterGrade};
use crate::engine::events::{AcademicEvent, AcademicEventType};
use crate::engine::grade_calculator::{weighted_gpa, GradeCalculator};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::enrollment_repo::EnrollmentRepository;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// 成绩录入结果；期中或期末未录入时派生字段为空
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRecordOutcome {
    pub enrollment_id: String,
    pub total_score: Option<f64>,
    pub letter_grade: Option<LetterGrade>,
    pub grade_points: Option<f64>,
}

pub struct GradeApi {
    ctx: ApiContext,
    enrollment_repo: Arc<EnrollmentRepository>,
    calculator: GradeCalculator,
}

impl GradeApi {
    pub fn new(ctx: ApiContext, enrollment_repo: Arc<EnrollmentRepository>) -> Self {
        Self {
            ctx,
            enrollment_repo,
            calculator: GradeCalculator::new(),
        }
    }

    /// 录入分项成绩并重算派生成绩
    ///
    /// # 返回
    /// - Err(InvalidGradeRange): 任一传入分项超出 [0,100]，不写入任何字段
    /// - Err(EnrollmentNotActive): 选课不是 ENROLLED / COMPLETED
    pub fn record_scores(&self, enrollment_id: &str, update: &ScoreUpdate) -> ApiResult<GradeRecordOutcome> {
        self.calculator
            .validate(update)
            .map_err(|v| ApiError::InvalidGradeRange {
                component: v.component.to_string(),
                value: v.value,
            })?;
        let now = self.ctx.clock().now();

        let (section_id, student_id, grade) = self.ctx.run_write_tx(|tx| {
            let enrollment = EnrollmentRepository::find_by_id_tx(tx, enrollment_id)?
                .ok_or_else(|| ApiError::NotFound(format!("Enrollment(id={})不存在", enrollment_id)))?;
            if !matches!(
                enrollment.status,
                EnrollmentStatus::Enrolled | EnrollmentStatus::Completed
            ) {
                return Err(ApiError::EnrollmentNotActive {
                    enrollment_id: enrollment_id.to_string(),
                    status: enrollment.status,
                });
            }

            let merged = enrollment.scores.merged_with(update);
            let grade = self.calculator.compute(&merged);
            EnrollmentRepository::update_scores_tx(tx, enrollment_id, &merged, grade.as_ref())?;

            ActionLogRepository::insert_tx(
                tx,
                &ActionLog::new(ActionType::RecordScores, enrollment_id, now)
                    .with_section(enrollment.section_id.as_str())
                    .with_payload(&json!({ "scores": merged, "grade": grade })),
            )?;

            Ok((enrollment.section_id, enrollment.student_id, grade))
        })?;

        info!(
            enrollment_id,
            total_score = ?grade.map(|g| g.total_score),
            "成绩已录入"
        );
        if let Some(g) = &grade {
            self.ctx.events().publish_after_commit(
                AcademicEvent::new(AcademicEventType::GradeRecorded, enrollment_id)
                    .with_section(section_id)
                    .with_student(student_id)
                    .with_payload(json!({
                        "total_score": g.total_score,
                        "letter_grade": g.letter_grade,
                        "grade_points": g.grade_points,
                    })),
            );
        }

        Ok(GradeRecordOutcome {
            enrollment_id: enrollment_id.to_string(),
            total_score: grade.map(|g| g.total_score),
            letter_grade: grade.map(|g| g.letter_grade),
            grade_points: grade.map(|g| g.grade_points),
        })
    }

    /// 学分加权 GPA；没有已评分学分时为 None
    pub fn student_gpa(&self, student_id: &str) -> ApiResult<Option<f64>> {
        if student_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("学生ID不能为空".to_string()));
        }
        let graded = self.enrollment_repo.list_graded_credits(student_id)?;
        Ok(weighted_gpa(&graded))
    }
}
