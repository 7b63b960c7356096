// ==========================================
// 课程排课与选课核心 - 排课冲突检查引擎
// ==========================================
// 红线: 任意两条有效排课，若时段冲突且共用教室（或共用教师），日期区间不得重叠
// 红线: 检查过程无副作用；写入由 API 在同一事务内完成
// 规则: 日期区间闭区间重叠 a1 <= b2 AND b1 <= a2，缺省结束日为 +∞
// 规则: 时段冲突 = 同一 time_slot_id，或（开启时）同一星期内时间相交
// 规则: 批量变更以"全部变更生效后的状态"为准进行检查
// ==========================================

use crate::domain::catalog::TimeSlot;
use crate::domain::schedule::{BookedAssignment, DateRange, ScheduleConflict};
use crate::domain::types::ConflictDimension;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// 检查选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictCheckOptions {
    /// 不同时段但同日时间相交也视为冲突
    pub check_overlapping_time_slots: bool,
}

impl Default for ConflictCheckOptions {
    fn default() -> Self {
        Self {
            check_overlapping_time_slots: true,
        }
    }
}

/// 叠加到现有排课上的待提交变更
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayChange {
    Create(BookedAssignment),
    UpdateRange {
        assignment_id: String,
        effective: DateRange,
    },
    Deactivate {
        assignment_id: String,
    },
}

/// 批量校验失败原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayRejection {
    Conflict(ScheduleConflict),
    /// 变更引用的排课不存在或已停用（含同批次先前已停用）
    UnknownAssignment(String),
}

// ==========================================
// ScheduleConflictChecker - 冲突检查引擎
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleConflictChecker {
    options: ConflictCheckOptions,
}

impl ScheduleConflictChecker {
    pub fn new(options: ConflictCheckOptions) -> Self {
        Self { options }
    }

    /// 两个时段是否视为同一时间
    pub fn slots_collide(&self, a: &TimeSlot, b: &TimeSlot) -> bool {
        if a.time_slot_id == b.time_slot_id {
            return true;
        }
        self.options.check_overlapping_time_slots && a.overlaps_with(b)
    }

    /// 候选排课与既有排课之间的全部冲突
    ///
    /// 同一 assignment_id 自身不参与比较；每条既有排课至多报告一次（教室优先于教师）
    #[instrument(skip(self, existing), fields(candidate = %candidate.assignment_id, existing = existing.len()))]
    pub fn find_conflicts(
        &self,
        candidate: &BookedAssignment,
        existing: &[BookedAssignment],
    ) -> Vec<ScheduleConflict> {
        let mut conflicts = Vec::new();

        for other in existing {
            if other.assignment_id == candidate.assignment_id {
                continue;
            }
            if !self.slots_collide(&candidate.time_slot, &other.time_slot) {
                continue;
            }
            let overlap = match candidate.effective.intersection(&other.effective) {
                Some(range) => range,
                None => continue,
            };

            let dimension = if other.room_id == candidate.room_id {
                Some(ConflictDimension::Room)
            } else if shares_instructor(candidate, other) {
                Some(ConflictDimension::Instructor)
            } else {
                None
            };

            if let Some(dimension) = dimension {
                debug!(
                    candidate = %candidate.assignment_id,
                    conflicting = %other.assignment_id,
                    dimension = %dimension,
                    "发现排课冲突"
                );
                conflicts.push(ScheduleConflict {
                    conflicting_assignment_id: other.assignment_id.clone(),
                    conflicting_section_id: other.section_id.clone(),
                    dimension,
                    candidate_assignment_id: candidate.assignment_id.clone(),
                    overlap,
                });
            }
        }

        conflicts
    }

    pub fn first_conflict(
        &self,
        candidate: &BookedAssignment,
        existing: &[BookedAssignment],
    ) -> Option<ScheduleConflict> {
        self.find_conflicts(candidate, existing).into_iter().next()
    }

    /// 学生课表冲突: 目标班级的排课与学生已选班级的排课同时上课
    ///
    /// # 返回
    /// - Some((目标排课, 已选排课)): 第一对冲突
    pub fn timetable_clash<'a>(
        &self,
        target: &'a [BookedAssignment],
        seated: &'a [BookedAssignment],
    ) -> Option<(&'a BookedAssignment, &'a BookedAssignment)> {
        target.iter().find_map(|t| {
            seated
                .iter()
                .find(|s| self.slots_collide(&t.time_slot, &s.time_slot) && t.effective.overlaps(&s.effective))
                .map(|s| (t, s))
        })
    }

    /// 批量变更校验
    ///
    /// 先把全部变更叠加到 `baseline`（有效排课）上，再逐条检查新建或改期的排课
    /// 与叠加后其余有效排课之间是否冲突。被缩短或停用的排课以新形态参与比较。
    ///
    /// # 返回
    /// - Ok(final_state): 叠加后的有效排课
    /// - Err(OverlayRejection): 第一个冲突或无效引用
    #[instrument(skip(self, baseline, changes), fields(baseline = baseline.len(), changes = changes.len()))]
    pub fn validate_overlay(
        &self,
        baseline: &[BookedAssignment],
        changes: &[OverlayChange],
    ) -> Result<Vec<BookedAssignment>, OverlayRejection> {
        let mut state: BTreeMap<String, BookedAssignment> = baseline
            .iter()
            .map(|a| (a.assignment_id.clone(), a.clone()))
            .collect();
        let mut touched: Vec<String> = Vec::new();

        for change in changes {
            match change {
                OverlayChange::Create(candidate) => {
                    state.insert(candidate.assignment_id.clone(), candidate.clone());
                    touched.push(candidate.assignment_id.clone());
                }
                OverlayChange::UpdateRange {
                    assignment_id,
                    effective,
                } => {
                    let entry = state
                        .get_mut(assignment_id)
                        .ok_or_else(|| OverlayRejection::UnknownAssignment(assignment_id.clone()))?;
                    entry.effective = *effective;
                    touched.push(assignment_id.clone());
                }
                OverlayChange::Deactivate { assignment_id } => {
                    if state.remove(assignment_id).is_none() {
                        return Err(OverlayRejection::UnknownAssignment(assignment_id.clone()));
                    }
                    touched.retain(|id| id != assignment_id);
                }
            }
        }

        let final_state: Vec<BookedAssignment> = state.into_values().collect();
        for id in &touched {
            if let Some(candidate) = final_state.iter().find(|a| &a.assignment_id == id) {
                if let Some(conflict) = self.first_conflict(candidate, &final_state) {
                    return Err(OverlayRejection::Conflict(conflict));
                }
            }
        }

        Ok(final_state)
    }
}

fn shares_instructor(a: &BookedAssignment, b: &BookedAssignment) -> bool {
    match (&a.instructor_id, &b.instructor_id) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
