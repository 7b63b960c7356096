// ==========================================
// 课程排课与选课核心 - 选课生命周期引擎
// ==========================================
// 红线: 只允许下列转换，其余一律拒绝
//   ENROLLED   -> DROPPED    (today <= 加退选截止日；释放座位并触发候补转正)
//   ENROLLED   -> WITHDRAWN  (加退选截止日 < today <= 退出截止日；释放座位，不触发转正)
//   ENROLLED   -> COMPLETED  (today >= 学期结束日且总评已产生；座位计数不变，不记退课日期)
//   WAITLISTED -> ENROLLED   (仅自动转正)
//   WAITLISTED -> DROPPED    (任意时间)
// 红线: Engine 不拼 SQL，只输出转换计划，由 API 在事务内执行
// ==========================================

use crate::domain::calendar::TermDeadlines;
use crate::domain::section::Section;
use crate::domain::types::EnrollmentStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;

// ==========================================
// 生命周期动作
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleAction {
    Drop,
    Withdraw,
    Complete,
    /// 候补转正（系统内部动作）
    Promote,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleAction::Drop => "drop",
            LifecycleAction::Withdraw => "withdraw",
            LifecycleAction::Complete => "complete",
            LifecycleAction::Promote => "promote",
        };
        write!(f, "{}", s)
    }
}

/// 座位计数影响
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatEffect {
    None,
    Claim,
    Release,
}

/// 转换计划
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub from: EnrollmentStatus,
    pub to: EnrollmentStatus,
    pub seat: SeatEffect,
    /// 同一事务内尝试候补转正
    pub promote_waitlist: bool,
    /// 离开 ENROLLED 时记录退课日期
    pub sets_drop_date: bool,
    pub sets_completion_date: bool,
}

/// 拒绝原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionRejection {
    /// 状态机不允许
    NotPermitted {
        from: EnrollmentStatus,
        action: LifecycleAction,
    },
    /// 当前日期不在允许的窗口内
    OutsideWindow {
        action: LifecycleAction,
        today: NaiveDate,
        reason: String,
    },
    /// 学期日历缺失
    CalendarMissing,
    /// 结课时总评尚未产生
    GradesMissing,
}

// ==========================================
// EnrollmentLifecycle - 生命周期引擎（无状态）
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrollmentLifecycle;

impl EnrollmentLifecycle {
    pub fn new() -> Self {
        Self
    }

    /// 选课登记是否开放；日历未登记时放行
    pub fn registration_open(&self, deadlines: Option<&TermDeadlines>, today: NaiveDate) -> bool {
        deadlines.map_or(true, |d| today <= d.add_drop_deadline)
    }

    /// 班级已满时能否进入候补
    pub fn can_waitlist(&self, section: &Section, waitlisted: i32) -> bool {
        section.waitlist_enabled && waitlisted < section.waitlist_capacity
    }

    /// 生成转换计划
    ///
    /// # 参数
    /// - `current`: 当前状态
    /// - `action`: 请求的动作
    /// - `deadlines`: 学期截止日（WAITLISTED 退课与转正不需要）
    /// - `today`: 注入时钟给出的日期
    /// - `graded`: 总评是否已产生
    #[instrument(skip(self, deadlines))]
    pub fn plan(
        &self,
        current: EnrollmentStatus,
        action: LifecycleAction,
        deadlines: Option<&TermDeadlines>,
        today: NaiveDate,
        graded: bool,
    ) -> Result<TransitionPlan, TransitionRejection> {
        use EnrollmentStatus::*;

        match (current, action) {
            (Waitlisted, LifecycleAction::Drop) => Ok(TransitionPlan {
                from: Waitlisted,
                to: Dropped,
                seat: SeatEffect::None,
                promote_waitlist: false,
                sets_drop_date: false,
                sets_completion_date: false,
            }),
            (Waitlisted, LifecycleAction::Promote) => Ok(TransitionPlan {
                from: Waitlisted,
                to: Enrolled,
                seat: SeatEffect::Claim,
                promote_waitlist: false,
                sets_drop_date: false,
                sets_completion_date: false,
            }),
            (Enrolled, LifecycleAction::Drop) => {
                let d = deadlines.ok_or(TransitionRejection::CalendarMissing)?;
                if !d.in_add_drop_window(today) {
                    return Err(TransitionRejection::OutsideWindow {
                        action,
                        today,
                        reason: format!("已过加退选截止日 {}", d.add_drop_deadline),
                    });
                }
                Ok(TransitionPlan {
                    from: Enrolled,
                    to: Dropped,
                    seat: SeatEffect::Release,
                    promote_waitlist: true,
                    sets_drop_date: true,
                    sets_completion_date: false,
                })
            }
            (Enrolled, LifecycleAction::Withdraw) => {
                let d = deadlines.ok_or(TransitionRejection::CalendarMissing)?;
                if !d.in_withdrawal_window(today) {
                    return Err(TransitionRejection::OutsideWindow {
                        action,
                        today,
                        reason: format!(
                            "中途退出窗口为 ({}, {}]",
                            d.add_drop_deadline, d.withdrawal_deadline
                        ),
                    });
                }
                Ok(TransitionPlan {
                    from: Enrolled,
                    to: Withdrawn,
                    seat: SeatEffect::Release,
                    promote_waitlist: false,
                    sets_drop_date: true,
                    sets_completion_date: false,
                })
            }
            (Enrolled, LifecycleAction::Complete) => {
                let d = deadlines.ok_or(TransitionRejection::CalendarMissing)?;
                if !d.term_closed(today) {
                    return Err(TransitionRejection::OutsideWindow {
                        action,
                        today,
                        reason: format!("学期结束日 {} 之前不能结课", d.term_end_date),
                    });
                }
                if !graded {
                    return Err(TransitionRejection::GradesMissing);
                }
                Ok(TransitionPlan {
                    from: Enrolled,
                    to: Completed,
                    seat: SeatEffect::None,
                    promote_waitlist: false,
                    sets_drop_date: false,
                    sets_completion_date: true,
                })
            }
            (from, action) => Err(TransitionRejection::NotPermitted { from, action }),
        }
    }
}
