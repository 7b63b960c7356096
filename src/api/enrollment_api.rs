// ==========================================
// 课程排课与选课核心 - 选课 API
// ==========================================
// 职责: 选课、退课、中途退出、结课，候补转正，选课查询
// 红线: current_enrollment 只在改变选课状态的同一事务内增减，恒等于 ENROLLED + COMPLETED 人数
// 红线: 占座为条件更新 (current < max)，并发下不会超员
// 红线: ENROLLED 退课释放座位后，在同一事务内转正等待最久的候补
// 规则: 学期日历与"今天"在事务外读取（日历只读，且日历仓储与事务共用连接）
// ==========================================

use crate::api::context::ApiContext;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::calendar::TermDeadlines;
use crate::domain::course::MissingPrerequisite;
use crate::domain::enrollment::{ComponentScores, Enrollment};
use crate::domain::section::{Section, SectionOccupancy};
use crate::domain::types::EnrollmentStatus;
use crate::engine::calendar::TermCalendarProvider;
use crate::engine::conflict_checker::{ConflictCheckOptions, ScheduleConflictChecker};
use crate::engine::enrollment_lifecycle::{
    EnrollmentLifecycle, LifecycleAction, SeatEffect, TransitionPlan, TransitionRejection,
};
use crate::engine::events::{AcademicEvent, AcademicEventType};
use crate::engine::prerequisite_graph::missing_prerequisites;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::course_repo::PrerequisiteRepository;
use crate::repository::enrollment_repo::{EnrollmentRepository, StatusChange};
use crate::repository::schedule_repo::ScheduleAssignmentRepository;
use crate::repository::section_repo::SectionRepository;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ==========================================
// 返回结构
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollOutcome {
    pub enrollment_id: String,
    pub status: EnrollmentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropOutcome {
    pub enrollment_id: String,
    pub status: EnrollmentStatus,
    /// 同一事务内被转正的候补
    pub promoted_enrollment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub enrollment_id: String,
    pub status: EnrollmentStatus,
}

// ==========================================
// EnrollmentApi - 选课 API
// ==========================================
pub struct EnrollmentApi {
    ctx: ApiContext,
    section_repo: Arc<SectionRepository>,
    enrollment_repo: Arc<EnrollmentRepository>,
    calendar: Arc<dyn TermCalendarProvider>,
    lifecycle: EnrollmentLifecycle,
    checker: ScheduleConflictChecker,
    enforce_student_timetable: bool,
}

impl EnrollmentApi {
    pub fn new(
        ctx: ApiContext,
        section_repo: Arc<SectionRepository>,
        enrollment_repo: Arc<EnrollmentRepository>,
        calendar: Arc<dyn TermCalendarProvider>,
        conflict_options: ConflictCheckOptions,
        enforce_student_timetable: bool,
    ) -> Self {
        Self {
            ctx,
            section_repo,
            enrollment_repo,
            calendar,
            lifecycle: EnrollmentLifecycle::new(),
            checker: ScheduleConflictChecker::new(conflict_options),
            enforce_student_timetable,
        }
    }

    /// 选课
    ///
    /// # 返回
    /// - ENROLLED: 占到座位
    /// - WAITLISTED: 班级已满，进入候补
    /// - Err(CapacityExceeded): 班级已满且候补关闭或候补已满
    pub fn enroll(&self, student_id: &str, section_id: &str) -> ApiResult<EnrollOutcome> {
        if student_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("学生ID不能为空".to_string()));
        }
        let section = self.load_section(section_id)?;
        let deadlines = self.calendar.deadlines_for(&section.term_id)?;
        let today = self.ctx.clock().today();
        let now = self.ctx.clock().now();

        if !self.lifecycle.registration_open(deadlines.as_ref(), today) {
            let add_drop_deadline = deadlines
                .as_ref()
                .map(|d| d.add_drop_deadline.to_string())
                .unwrap_or_default();
            warn!(student_id, section_id, %today, "选课登记已截止");
            return Err(ApiError::RegistrationClosed {
                term_id: section.term_id,
                add_drop_deadline,
            });
        }

        let enrollment_id = uuid::Uuid::new_v4().to_string();

        let outcome = self.ctx.run_write_tx(|tx| {
            // 事务内重读，拿到最新的取消标记与计数
            let section = SectionRepository::find_by_id_tx(tx, section_id)?
                .ok_or_else(|| ApiError::NotFound(format!("Section(id={})不存在", section_id)))?;
            if section.is_cancelled {
                return Err(ApiError::SectionCancelled(section_id.to_string()));
            }

            if EnrollmentRepository::find_by_student_section_tx(tx, student_id, section_id)?.is_some() {
                return Err(ApiError::DuplicateEnrollment {
                    student_id: student_id.to_string(),
                    section_id: section_id.to_string(),
                });
            }

            if section.prerequisites_enforced {
                let missing = Self::missing_prerequisites_tx(tx, student_id, &section.course_id)?;
                if !missing.is_empty() {
                    return Err(ApiError::PrerequisitesNotMet { missing });
                }
            }

            if self.enforce_student_timetable {
                self.check_student_timetable_tx(tx, student_id, section_id)?;
            }

            let status = if SectionRepository::try_claim_seat_tx(tx, section_id)? {
                EnrollmentStatus::Enrolled
            } else {
                let waitlisted =
                    EnrollmentRepository::count_by_status_tx(tx, section_id, EnrollmentStatus::Waitlisted)?;
                if !self.lifecycle.can_waitlist(&section, waitlisted) {
                    return Err(ApiError::CapacityExceeded {
                        section_id: section_id.to_string(),
                        max_enrollment: section.max_enrollment,
                    });
                }
                EnrollmentStatus::Waitlisted
            };

            let enrollment = Enrollment {
                enrollment_id: enrollment_id.clone(),
                student_id: student_id.to_string(),
                section_id: section_id.to_string(),
                status,
                scores: ComponentScores::default(),
                grade: None,
                total_classes: 0,
                attended_classes: 0,
                enrolled_at: now,
                status_changed_at: now,
                drop_date: None,
                completion_date: None,
            };
            EnrollmentRepository::insert_tx(tx, &enrollment)?;

            let action_type = match status {
                EnrollmentStatus::Waitlisted => ActionType::Waitlist,
                _ => ActionType::Enroll,
            };
            ActionLogRepository::insert_tx(
                tx,
                &ActionLog::new(action_type, enrollment_id.as_str(), now)
                    .with_section(section_id)
                    .with_payload(&json!({ "student_id": student_id, "status": status })),
            )?;

            Ok(EnrollOutcome {
                enrollment_id: enrollment_id.clone(),
                status,
            })
        })?;

        info!(
            student_id,
            section_id,
            enrollment_id = %outcome.enrollment_id,
            status = %outcome.status,
            "选课已提交"
        );
        self.publish_status(&outcome.enrollment_id, section_id, student_id, outcome.status);
        Ok(outcome)
    }

    /// 退课（加退选期内；WAITLISTED 任意时间）
    pub fn drop_enrollment(&self, enrollment_id: &str) -> ApiResult<DropOutcome> {
        let (current, outcome, promoted) = self.transition(enrollment_id, LifecycleAction::Drop)?;

        if let Some(promoted) = &promoted {
            info!(
                section_id = %current.section_id,
                promoted_enrollment_id = %promoted.enrollment_id,
                "候补已转正"
            );
            self.ctx.events().publish_after_commit(
                AcademicEvent::new(AcademicEventType::WaitlistPromoted, promoted.enrollment_id.clone())
                    .with_section(promoted.section_id.clone())
                    .with_student(promoted.student_id.clone()),
            );
        }

        Ok(DropOutcome {
            enrollment_id: outcome.enrollment_id,
            status: outcome.status,
            promoted_enrollment_id: promoted.map(|p| p.enrollment_id),
        })
    }

    /// 中途退出（加退选截止日之后、退出截止日之前）；释放座位，不转正候补
    pub fn withdraw(&self, enrollment_id: &str) -> ApiResult<TransitionOutcome> {
        let (_, outcome, _) = self.transition(enrollment_id, LifecycleAction::Withdraw)?;
        Ok(outcome)
    }

    /// 结课（学期结束且总评已产生）；座位计数不变
    pub fn complete(&self, enrollment_id: &str) -> ApiResult<TransitionOutcome> {
        let (_, outcome, _) = self.transition(enrollment_id, LifecycleAction::Complete)?;
        Ok(outcome)
    }

    pub fn get_enrollment(&self, enrollment_id: &str) -> ApiResult<Enrollment> {
        self.enrollment_repo
            .find_by_id(enrollment_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Enrollment(id={})不存在", enrollment_id)))
    }

    /// 候补队列（按等待先后）
    pub fn list_waitlist(&self, section_id: &str) -> ApiResult<Vec<Enrollment>> {
        self.load_section(section_id)?;
        Ok(self.enrollment_repo.list_waitlist(section_id)?)
    }

    pub fn section_occupancy(&self, section_id: &str) -> ApiResult<SectionOccupancy> {
        self.section_repo
            .occupancy(section_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Section(id={})不存在", section_id)))
    }

    // ==========================================
    // 状态转换
    // ==========================================

    /// 执行一次生命周期转换
    ///
    /// # 返回
    /// (转换前记录, 转换结果, 被转正的候补)
    fn transition(
        &self,
        enrollment_id: &str,
        action: LifecycleAction,
    ) -> ApiResult<(Enrollment, TransitionOutcome, Option<Enrollment>)> {
        let snapshot = self.get_enrollment(enrollment_id)?;
        let section = self.load_section(&snapshot.section_id)?;
        let deadlines = self.calendar.deadlines_for(&section.term_id)?;
        let today = self.ctx.clock().today();
        let now = self.ctx.clock().now();

        let (current, promoted) = self.ctx.run_write_tx(|tx| {
            let current = EnrollmentRepository::find_by_id_tx(tx, enrollment_id)?
                .ok_or_else(|| ApiError::NotFound(format!("Enrollment(id={})不存在", enrollment_id)))?;

            let plan = self
                .lifecycle
                .plan(current.status, action, deadlines.as_ref(), today, current.grade.is_some())
                .map_err(|rejection| {
                    Self::rejection_to_error(rejection, current.status, &section.term_id)
                })?;

            Self::apply_plan_tx(tx, &current, &plan, today, now)?;

            let action_type = match action {
                LifecycleAction::Drop => ActionType::Drop,
                LifecycleAction::Withdraw => ActionType::Withdraw,
                LifecycleAction::Complete => ActionType::Complete,
                LifecycleAction::Promote => ActionType::WaitlistPromote,
            };
            ActionLogRepository::insert_tx(
                tx,
                &ActionLog::new(action_type, enrollment_id, now)
                    .with_section(current.section_id.as_str())
                    .with_payload(&json!({ "from": plan.from, "to": plan.to })),
            )?;

            let promoted = if plan.promote_waitlist {
                self.promote_oldest_tx(tx, &current.section_id, deadlines.as_ref(), today, now)?
            } else {
                None
            };

            Ok((current, promoted))
        })?;

        let status = match action {
            LifecycleAction::Drop => EnrollmentStatus::Dropped,
            LifecycleAction::Withdraw => EnrollmentStatus::Withdrawn,
            LifecycleAction::Complete => EnrollmentStatus::Completed,
            LifecycleAction::Promote => EnrollmentStatus::Enrolled,
        };
        info!(
            enrollment_id,
            section_id = %current.section_id,
            from = %current.status,
            to = %status,
            "选课状态转换已提交"
        );
        self.publish_status(enrollment_id, &current.section_id, &current.student_id, status);

        Ok((
            current,
            TransitionOutcome {
                enrollment_id: enrollment_id.to_string(),
                status,
            },
            promoted,
        ))
    }

    /// 按计划写入状态与座位计数
    fn apply_plan_tx(
        conn: &Connection,
        current: &Enrollment,
        plan: &TransitionPlan,
        today: NaiveDate,
        now: NaiveDateTime,
    ) -> ApiResult<bool> {
        match plan.seat {
            SeatEffect::Claim => {
                if !SectionRepository::try_claim_seat_tx(conn, &current.section_id)? {
                    return Ok(false);
                }
            }
            SeatEffect::Release => {
                // 计数已为 0 说明与选课记录不一致，回滚而不是在漂移之上提交
                if !SectionRepository::release_seat_tx(conn, &current.section_id)? {
                    warn!(section_id = %current.section_id, "释放座位时计数已为 0");
                    return Err(ApiError::InternalError(format!(
                        "班级 {} 座位计数与选课记录不一致，无法释放座位",
                        current.section_id
                    )));
                }
            }
            SeatEffect::None => {}
        }

        let updated = EnrollmentRepository::update_status_tx(
            conn,
            &StatusChange {
                enrollment_id: &current.enrollment_id,
                from: plan.from,
                to: plan.to,
                changed_at: now,
                drop_date: if plan.sets_drop_date { Some(today) } else { None },
                completion_date: if plan.sets_completion_date { Some(today) } else { None },
            },
        )?;
        if !updated {
            // IMMEDIATE 事务内状态不应被并发修改
            return Err(ApiError::InternalError(format!(
                "选课 {} 状态已不是 {}",
                current.enrollment_id, plan.from
            )));
        }
        Ok(true)
    }

    /// 转正等待最久的候补；没有空位或没有候补时返回 None
    fn promote_oldest_tx(
        &self,
        conn: &Connection,
        section_id: &str,
        deadlines: Option<&TermDeadlines>,
        today: NaiveDate,
        now: NaiveDateTime,
    ) -> ApiResult<Option<Enrollment>> {
        let candidate = match EnrollmentRepository::oldest_waitlisted_tx(conn, section_id)? {
            Some(c) => c,
            None => return Ok(None),
        };
        let plan = self
            .lifecycle
            .plan(candidate.status, LifecycleAction::Promote, deadlines, today, false)
            .map_err(|rejection| Self::rejection_to_error(rejection, candidate.status, section_id))?;

        if !Self::apply_plan_tx(conn, &candidate, &plan, today, now)? {
            debug!(section_id, "释放座位后仍无空位，跳过候补转正");
            return Ok(None);
        }
        ActionLogRepository::insert_tx(
            conn,
            &ActionLog::new(ActionType::WaitlistPromote, candidate.enrollment_id.as_str(), now)
                .with_section(section_id)
                .with_payload(&json!({ "student_id": candidate.student_id })),
        )?;
        Ok(Some(Enrollment {
            status: EnrollmentStatus::Enrolled,
            status_changed_at: now,
            ..candidate
        }))
    }

    // ==========================================
    // 选课校验
    // ==========================================

    fn missing_prerequisites_tx(
        conn: &Connection,
        student_id: &str,
        course_id: &str,
    ) -> ApiResult<Vec<MissingPrerequisite>> {
        let rules = PrerequisiteRepository::list_for_course_tx(conn, course_id)?;
        let mut best: HashMap<String, Option<f64>> = HashMap::new();
        for rule in &rules {
            let score = EnrollmentRepository::best_completed_score_for_course_tx(
                conn,
                student_id,
                &rule.prerequisite_course_id,
            )?;
            best.insert(rule.prerequisite_course_id.clone(), score);
        }
        Ok(missing_prerequisites(&rules, |course| best.get(course).copied().flatten()))
    }

    fn check_student_timetable_tx(
        &self,
        conn: &Connection,
        student_id: &str,
        section_id: &str,
    ) -> ApiResult<()> {
        let target = ScheduleAssignmentRepository::list_active_booked_for_section_tx(conn, section_id)?;
        let seated =
            ScheduleAssignmentRepository::list_active_booked_for_student_tx(conn, student_id, section_id)?;
        if let Some((t, s)) = self.checker.timetable_clash(&target, &seated) {
            warn!(student_id, section_id, clashing_section = %s.section_id, "学生课表冲突");
            return Err(ApiError::BusinessRuleViolation(format!(
                "学生课表冲突: 排课 {} 与已选班级 {} 的排课 {} 时间重叠",
                t.assignment_id, s.section_id, s.assignment_id
            )));
        }
        Ok(())
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn load_section(&self, section_id: &str) -> ApiResult<Section> {
        if section_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("班级ID不能为空".to_string()));
        }
        self.section_repo
            .find_by_id(section_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Section(id={})不存在", section_id)))
    }

    fn rejection_to_error(
        rejection: TransitionRejection,
        from: EnrollmentStatus,
        term_id: &str,
    ) -> ApiError {
        match rejection {
            TransitionRejection::NotPermitted { from, action } => ApiError::InvalidTransition {
                from,
                action,
                reason: "状态机不允许该转换".to_string(),
            },
            TransitionRejection::OutsideWindow { action, reason, .. } => {
                ApiError::InvalidTransition { from, action, reason }
            }
            TransitionRejection::CalendarMissing => {
                ApiError::NotFound(format!("TermCalendar(id={})不存在", term_id))
            }
            TransitionRejection::GradesMissing => ApiError::InvalidTransition {
                from,
                action: LifecycleAction::Complete,
                reason: "期中或期末成绩尚未录入".to_string(),
            },
        }
    }

    fn publish_status(&self, enrollment_id: &str, section_id: &str, student_id: &str, status: EnrollmentStatus) {
        self.ctx.events().publish_after_commit(
            AcademicEvent::new(AcademicEventType::EnrollmentChanged, enrollment_id)
                .with_section(section_id)
                .with_student(student_id)
                .with_payload(json!({ "status": status })),
        );
    }
}
