// ==========================================
// 课程排课与选课核心 - 排课 API
// ==========================================
// 职责: 排课创建/修改/停用，时段修改，排课查询
// 红线: 同一教室(或同一教师)、同一/重叠时段的有效排课日期区间不得重叠
// 红线: 读取-校验-写入在同一个 IMMEDIATE 事务内完成
// 规则: 批量修改按"全部待定修改生效后的状态"整体校验，与顺序无关
// ==========================================

use crate::api::context::ApiContext;
use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::catalog::TimeSlot;
use crate::domain::schedule::{
    BookedAssignment, DateRange, ScheduleAssignment, ScheduleChange, ScheduleChangeOutcome,
};
use crate::domain::types::{AssignmentKind, DayOfWeek};
use crate::engine::conflict_checker::{
    ConflictCheckOptions, OverlayChange, OverlayRejection, ScheduleConflictChecker,
};
use crate::engine::events::{AcademicEvent, AcademicEventType};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::catalog_repo::{RoomRepository, TimeSlotRepository};
use crate::repository::schedule_repo::ScheduleAssignmentRepository;
use crate::repository::section_repo::SectionRepository;
use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;
use serde_json::json;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// 排课写入计划（校验通过后执行）
enum PlannedWrite {
    Create(ScheduleAssignment),
    UpdateRange { assignment_id: String, section_id: String, effective: DateRange },
    Deactivate { assignment_id: String, section_id: String },
}

// ==========================================
// ScheduleApi - 排课 API
// ==========================================
pub struct ScheduleApi {
    ctx: ApiContext,
    schedule_repo: Arc<ScheduleAssignmentRepository>,
    checker: ScheduleConflictChecker,
    enforce_room_capacity: bool,
}

impl ScheduleApi {
    pub fn new(
        ctx: ApiContext,
        schedule_repo: Arc<ScheduleAssignmentRepository>,
        conflict_options: ConflictCheckOptions,
        enforce_room_capacity: bool,
    ) -> Self {
        Self {
            ctx,
            schedule_repo,
            checker: ScheduleConflictChecker::new(conflict_options),
            enforce_room_capacity,
        }
    }

    /// 新建排课
    ///
    /// # 返回
    /// - Ok(assignment_id)
    /// - Err(ScheduleConflict): 与现有有效排课冲突（携带冲突排课ID）
    pub fn create_assignment(
        &self,
        section_id: &str,
        time_slot_id: &str,
        room_id: &str,
        effective_from: NaiveDate,
        effective_to: Option<NaiveDate>,
        kind: AssignmentKind,
    ) -> ApiResult<String> {
        let outcome = self.apply_changes(&[ScheduleChange::Create {
            section_id: section_id.to_string(),
            time_slot_id: time_slot_id.to_string(),
            room_id: room_id.to_string(),
            effective_from,
            effective_to,
            kind,
        }])?;
        outcome
            .created_ids
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::InternalError("排课创建后未返回ID".to_string()))
    }

    /// 修改排课日期区间
    pub fn update_effective_range(
        &self,
        assignment_id: &str,
        effective_from: NaiveDate,
        effective_to: Option<NaiveDate>,
    ) -> ApiResult<()> {
        self.apply_changes(&[ScheduleChange::UpdateRange {
            assignment_id: assignment_id.to_string(),
            effective_from,
            effective_to,
        }])?;
        Ok(())
    }

    /// 停用排课
    pub fn deactivate_assignment(&self, assignment_id: &str) -> ApiResult<()> {
        self.apply_changes(&[ScheduleChange::Deactivate {
            assignment_id: assignment_id.to_string(),
        }])?;
        Ok(())
    }

    /// 批量应用排课修改（一个事务，要么全部生效要么全部不生效）
    pub fn apply_changes(&self, changes: &[ScheduleChange]) -> ApiResult<ScheduleChangeOutcome> {
        if changes.is_empty() {
            return Err(ApiError::InvalidInput("排课修改列表为空".to_string()));
        }

        // 新建排课的ID在事务外生成，重试时保持不变
        let new_ids: Vec<String> = changes
            .iter()
            .map(|_| uuid::Uuid::new_v4().to_string())
            .collect();
        let now = self.ctx.clock().now();

        let outcome = self.ctx.run_write_tx(|tx| {
            let mut overlay = Vec::with_capacity(changes.len());
            let mut planned = Vec::with_capacity(changes.len());
            let mut days: BTreeSet<DayOfWeek> = BTreeSet::new();

            for (change, new_id) in changes.iter().zip(&new_ids) {
                match change {
                    ScheduleChange::Create {
                        section_id,
                        time_slot_id,
                        room_id,
                        effective_from,
                        effective_to,
                        kind,
                    } => {
                        let effective = DateRange::new(*effective_from, *effective_to)
                            .map_err(ApiError::InvalidInput)?;
                        let booked =
                            self.resolve_candidate(tx, new_id, section_id, time_slot_id, room_id, effective)?;
                        days.insert(booked.time_slot.day_of_week);
                        overlay.push(OverlayChange::Create(booked));
                        planned.push(PlannedWrite::Create(ScheduleAssignment {
                            assignment_id: new_id.clone(),
                            section_id: section_id.clone(),
                            time_slot_id: time_slot_id.clone(),
                            room_id: room_id.clone(),
                            effective,
                            kind: *kind,
                            is_active: true,
                            created_at: now,
                            updated_at: now,
                        }));
                    }
                    ScheduleChange::UpdateRange {
                        assignment_id,
                        effective_from,
                        effective_to,
                    } => {
                        let effective = DateRange::new(*effective_from, *effective_to)
                            .map_err(ApiError::InvalidInput)?;
                        let (existing, slot) = Self::load_active(tx, assignment_id)?;
                        days.insert(slot.day_of_week);
                        overlay.push(OverlayChange::UpdateRange {
                            assignment_id: assignment_id.clone(),
                            effective,
                        });
                        planned.push(PlannedWrite::UpdateRange {
                            assignment_id: assignment_id.clone(),
                            section_id: existing.section_id,
                            effective,
                        });
                    }
                    ScheduleChange::Deactivate { assignment_id } => {
                        let (existing, slot) = Self::load_active(tx, assignment_id)?;
                        days.insert(slot.day_of_week);
                        overlay.push(OverlayChange::Deactivate {
                            assignment_id: assignment_id.clone(),
                        });
                        planned.push(PlannedWrite::Deactivate {
                            assignment_id: assignment_id.clone(),
                            section_id: existing.section_id,
                        });
                    }
                }
            }

            // 只有同一星期几的时段可能冲突
            let mut baseline: Vec<BookedAssignment> = Vec::new();
            for day in &days {
                baseline.extend(ScheduleAssignmentRepository::list_active_booked_on_day_tx(tx, *day)?);
            }

            self.checker
                .validate_overlay(&baseline, &overlay)
                .map_err(|rejection| match rejection {
                    OverlayRejection::Conflict(conflict) => {
                        warn!(
                            candidate = %conflict.candidate_assignment_id,
                            conflicting = %conflict.conflicting_assignment_id,
                            dimension = %conflict.dimension,
                            "排课冲突，拒绝写入"
                        );
                        ApiError::ScheduleConflict(conflict)
                    }
                    OverlayRejection::UnknownAssignment(id) => {
                        ApiError::NotFound(format!("ActiveScheduleAssignment(id={})不存在", id))
                    }
                })?;

            Self::execute_planned(tx, &planned, now)
        })?;

        info!(
            created = outcome.created_ids.len(),
            updated = outcome.updated_ids.len(),
            deactivated = outcome.deactivated_ids.len(),
            "排课修改已提交"
        );
        for id in outcome
            .created_ids
            .iter()
            .chain(&outcome.updated_ids)
            .chain(&outcome.deactivated_ids)
        {
            self.ctx
                .events()
                .publish_after_commit(AcademicEvent::new(AcademicEventType::ScheduleChanged, id.clone()));
        }

        Ok(outcome)
    }

    /// 修改时段起止时间（被有效排课引用时拒绝）
    pub fn update_time_slot(
        &self,
        time_slot_id: &str,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> ApiResult<()> {
        if start_time >= end_time {
            return Err(ApiError::InvalidInput(format!(
                "时段开始时间必须早于结束时间: start={}, end={}",
                start_time, end_time
            )));
        }
        let now = self.ctx.clock().now();

        self.ctx.run_write_tx(|tx| {
            TimeSlotRepository::update_times_tx(tx, time_slot_id, start_time, end_time)?;
            ActionLogRepository::insert_tx(
                tx,
                &ActionLog::new(ActionType::TimeSlotUpdate, time_slot_id, now).with_payload(&json!({
                    "start_time": start_time.to_string(),
                    "end_time": end_time.to_string(),
                })),
            )?;
            Ok(())
        })?;

        info!(time_slot_id, %start_time, %end_time, "时段已修改");
        Ok(())
    }

    pub fn get_assignment(&self, assignment_id: &str) -> ApiResult<ScheduleAssignment> {
        self.schedule_repo
            .find_by_id(assignment_id)?
            .ok_or_else(|| ApiError::NotFound(format!("ScheduleAssignment(id={})不存在", assignment_id)))
    }

    pub fn list_assignments_for_section(&self, section_id: &str) -> ApiResult<Vec<ScheduleAssignment>> {
        if section_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("班级ID不能为空".to_string()));
        }
        Ok(self.schedule_repo.list_by_section(section_id)?)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 校验新建排课的引用对象并组装冲突检查视图
    fn resolve_candidate(
        &self,
        conn: &Connection,
        assignment_id: &str,
        section_id: &str,
        time_slot_id: &str,
        room_id: &str,
        effective: DateRange,
    ) -> ApiResult<BookedAssignment> {
        let section = SectionRepository::find_by_id_tx(conn, section_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Section(id={})不存在", section_id)))?;
        if section.is_cancelled {
            return Err(ApiError::SectionCancelled(section_id.to_string()));
        }
        let slot = TimeSlotRepository::find_by_id_tx(conn, time_slot_id)?
            .ok_or_else(|| ApiError::NotFound(format!("TimeSlot(id={})不存在", time_slot_id)))?;
        let room = RoomRepository::find_by_id_tx(conn, room_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Room(id={})不存在", room_id)))?;
        if !room.bookable {
            return Err(ApiError::RoomNotBookable(room_id.to_string()));
        }
        if room.capacity < section.max_enrollment {
            if self.enforce_room_capacity {
                return Err(ApiError::BusinessRuleViolation(format!(
                    "教室 {} 容量 {} 小于班级 {} 人数上限 {}",
                    room_id, room.capacity, section_id, section.max_enrollment
                )));
            }
            warn!(
                room_id,
                room_capacity = room.capacity,
                section_id,
                max_enrollment = section.max_enrollment,
                "教室容量小于班级人数上限"
            );
        }

        Ok(BookedAssignment {
            assignment_id: assignment_id.to_string(),
            section_id: section_id.to_string(),
            instructor_id: section.instructor_id,
            room_id: room_id.to_string(),
            time_slot: slot,
            effective,
        })
    }

    fn load_active(conn: &Connection, assignment_id: &str) -> ApiResult<(ScheduleAssignment, TimeSlot)> {
        let existing = ScheduleAssignmentRepository::find_by_id_tx(conn, assignment_id)?
            .filter(|a| a.is_active)
            .ok_or_else(|| {
                ApiError::NotFound(format!("ActiveScheduleAssignment(id={})不存在", assignment_id))
            })?;
        let slot = TimeSlotRepository::find_by_id_tx(conn, &existing.time_slot_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("TimeSlot(id={})不存在", existing.time_slot_id))
        })?;
        Ok((existing, slot))
    }

    /// 执行写入: 先停用、再改区间、最后新建，避免与 (教室,时段,起始日) 唯一索引的中间态冲突
    fn execute_planned(
        conn: &Connection,
        planned: &[PlannedWrite],
        now: chrono::NaiveDateTime,
    ) -> ApiResult<ScheduleChangeOutcome> {
        let mut outcome = ScheduleChangeOutcome::default();
        let deactivated: HashSet<&str> = planned
            .iter()
            .filter_map(|p| match p {
                PlannedWrite::Deactivate { assignment_id, .. } => Some(assignment_id.as_str()),
                _ => None,
            })
            .collect();

        for p in planned {
            if let PlannedWrite::Deactivate {
                assignment_id,
                section_id,
            } = p
            {
                if outcome.deactivated_ids.contains(assignment_id) {
                    continue;
                }
                ScheduleAssignmentRepository::deactivate_tx(conn, assignment_id, now)?;
                ActionLogRepository::insert_tx(
                    conn,
                    &ActionLog::new(ActionType::ScheduleDeactivate, assignment_id.as_str(), now)
                        .with_section(section_id.as_str()),
                )?;
                outcome.deactivated_ids.push(assignment_id.clone());
            }
        }

        for p in planned {
            if let PlannedWrite::UpdateRange {
                assignment_id,
                section_id,
                effective,
            } = p
            {
                if deactivated.contains(assignment_id.as_str()) {
                    continue;
                }
                ScheduleAssignmentRepository::update_range_tx(conn, assignment_id, effective, now)?;
                ActionLogRepository::insert_tx(
                    conn,
                    &ActionLog::new(ActionType::ScheduleUpdateRange, assignment_id.as_str(), now)
                        .with_section(section_id.as_str())
                        .with_payload(effective),
                )?;
                if !outcome.updated_ids.contains(assignment_id) {
                    outcome.updated_ids.push(assignment_id.clone());
                }
            }
        }

        for p in planned {
            if let PlannedWrite::Create(assignment) = p {
                ScheduleAssignmentRepository::insert_tx(conn, assignment)?;
                ActionLogRepository::insert_tx(
                    conn,
                    &ActionLog::new(ActionType::ScheduleCreate, assignment.assignment_id.as_str(), now)
                        .with_section(assignment.section_id.as_str())
                        .with_payload(assignment),
                )?;
                outcome.created_ids.push(assignment.assignment_id.clone());
            }
        }

        Ok(outcome)
    }
}
