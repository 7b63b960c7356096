// ==========================================
// 课程排课与选课核心 - 考勤 API
// ==========================================
// 职责: 考勤记录（只追加），出勤率与考勤评级
// 红线: (选课, 排课, 上课日期) 唯一；记录与计数在同一事务内写入
// 规则: 仅 ENROLLED 选课可记考勤；上课日期须落在排课有效区间内且星期与时段一致
// ==========================================

use crate::api::context::ApiContext;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::attendance::{AttendanceRecord, AttendanceSummary, AttendanceTally};
use crate::domain::types::{AttendanceStanding, AttendanceStatus, DayOfWeek, EnrollmentStatus};
use crate::engine::attendance_tracker::{AttendancePolicy, AttendanceTracker};
use crate::engine::events::{AcademicEvent, AcademicEventType};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::attendance_repo::AttendanceRepository;
use crate::repository::catalog_repo::TimeSlotRepository;
use crate::repository::enrollment_repo::EnrollmentRepository;
use crate::repository::schedule_repo::ScheduleAssignmentRepository;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceOutcome {
    pub record_id: String,
    pub attendance_percentage: f64,
    pub standing: AttendanceStanding,
    pub total_classes: i32,
    pub attended_classes: i32,
}

pub struct AttendanceApi {
    ctx: ApiContext,
    attendance_repo: Arc<AttendanceRepository>,
    enrollment_repo: Arc<EnrollmentRepository>,
    tracker: AttendanceTracker,
}

impl AttendanceApi {
    pub fn new(
        ctx: ApiContext,
        attendance_repo: Arc<AttendanceRepository>,
        enrollment_repo: Arc<EnrollmentRepository>,
        policy: AttendancePolicy,
    ) -> Self {
        Self {
            ctx,
            attendance_repo,
            enrollment_repo,
            tracker: AttendanceTracker::new(policy),
        }
    }

    /// 记录一次考勤
    ///
    /// # 返回
    /// - Ok(AttendanceOutcome): 记录ID与更新后的出勤率、评级
    /// - Err(DuplicateAttendanceRecord): 同一选课同一排课同一天已有记录
    pub fn record_attendance(
        &self,
        enrollment_id: &str,
        assignment_id: &str,
        session_date: NaiveDate,
        status: AttendanceStatus,
    ) -> ApiResult<AttendanceOutcome> {
        let record_id = uuid::Uuid::new_v4().to_string();
        let now = self.ctx.clock().now();

        let (enrollment, before, summary) = self.ctx.run_write_tx(|tx| {
            let enrollment = EnrollmentRepository::find_by_id_tx(tx, enrollment_id)?
                .ok_or_else(|| ApiError::NotFound(format!("Enrollment(id={})不存在", enrollment_id)))?;
            if enrollment.status != EnrollmentStatus::Enrolled {
                return Err(ApiError::EnrollmentNotActive {
                    enrollment_id: enrollment_id.to_string(),
                    status: enrollment.status,
                });
            }

            let assignment = ScheduleAssignmentRepository::find_by_id_tx(tx, assignment_id)?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("ScheduleAssignment(id={})不存在", assignment_id))
                })?;
            if !assignment.is_active || assignment.section_id != enrollment.section_id {
                return Err(ApiError::InvalidInput(format!(
                    "排课 {} 不是班级 {} 的有效排课",
                    assignment_id, enrollment.section_id
                )));
            }
            if !assignment.effective.contains(session_date) {
                return Err(ApiError::InvalidInput(format!(
                    "上课日期 {} 不在排课有效区间内",
                    session_date
                )));
            }
            let slot = TimeSlotRepository::find_by_id_tx(tx, &assignment.time_slot_id)?.ok_or_else(|| {
                ApiError::NotFound(format!("TimeSlot(id={})不存在", assignment.time_slot_id))
            })?;
            let weekday = DayOfWeek::from(session_date.weekday());
            if weekday != slot.day_of_week {
                return Err(ApiError::InvalidInput(format!(
                    "上课日期 {} 是 {}，与时段的 {} 不符",
                    session_date, weekday, slot.day_of_week
                )));
            }

            if AttendanceRepository::exists_tx(tx, enrollment_id, assignment_id, session_date)? {
                return Err(ApiError::DuplicateAttendanceRecord {
                    enrollment_id: enrollment_id.to_string(),
                    assignment_id: assignment_id.to_string(),
                    session_date: session_date.to_string(),
                });
            }

            AttendanceRepository::insert_tx(
                tx,
                &AttendanceRecord {
                    record_id: record_id.clone(),
                    enrollment_id: enrollment_id.to_string(),
                    assignment_id: assignment_id.to_string(),
                    session_date,
                    status,
                    recorded_at: now,
                },
            )?;
            EnrollmentRepository::increment_attendance_tx(tx, enrollment_id, status.counts_as_attended())?;

            let before = AttendanceTally {
                total_classes: enrollment.total_classes,
                attended_classes: enrollment.attended_classes,
            };
            let summary = self.tracker.summarize(self.tracker.apply(before, status));

            ActionLogRepository::insert_tx(
                tx,
                &ActionLog::new(ActionType::RecordAttendance, record_id.as_str(), now)
                    .with_section(enrollment.section_id.as_str())
                    .with_payload(&json!({
                        "enrollment_id": enrollment_id,
                        "assignment_id": assignment_id,
                        "session_date": session_date,
                        "status": status,
                    })),
            )?;

            Ok((enrollment, before, summary))
        })?;

        info!(
            enrollment_id,
            %session_date,
            status = %status,
            attendance_percentage = summary.attendance_percentage,
            "考勤已记录"
        );

        if self.tracker.entered_warning(before, summary.tally) {
            warn!(
                enrollment_id,
                student_id = %enrollment.student_id,
                attendance_percentage = summary.attendance_percentage,
                "出勤率低于预警线"
            );
            self.ctx.events().publish_after_commit(
                AcademicEvent::new(AcademicEventType::AttendanceWarning, enrollment_id)
                    .with_section(enrollment.section_id.clone())
                    .with_student(enrollment.student_id.clone())
                    .with_payload(json!({ "attendance_percentage": summary.attendance_percentage })),
            );
        }

        Ok(AttendanceOutcome {
            record_id,
            attendance_percentage: summary.attendance_percentage,
            standing: summary.standing,
            total_classes: summary.tally.total_classes,
            attended_classes: summary.tally.attended_classes,
        })
    }

    /// 选课的考勤记录（按上课日期）
    pub fn list_attendance(&self, enrollment_id: &str) -> ApiResult<Vec<AttendanceRecord>> {
        if self.enrollment_repo.find_by_id(enrollment_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Enrollment(id={})不存在", enrollment_id)));
        }
        Ok(self.attendance_repo.list_by_enrollment(enrollment_id)?)
    }

    /// 当前考勤汇总
    pub fn attendance_summary(&self, enrollment_id: &str) -> ApiResult<AttendanceSummary> {
        let enrollment = self
            .enrollment_repo
            .find_by_id(enrollment_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Enrollment(id={})不存在", enrollment_id)))?;
        Ok(self.tracker.summarize(AttendanceTally {
            total_classes: enrollment.total_classes,
            attended_classes: enrollment.attended_classes,
        }))
    }
}
