// ==========================================
// 课程排课与选课核心 - 考勤统计引擎
// ==========================================
// 规则: 每条记录 total_classes + 1；PRESENT / LATE 时 attended_classes + 1
// 规则: 出勤率 = attended / total * 100，total 为 0 时为 0
// 规则: 课次不足 min_sessions 时不评判；低于阈值为 Warning
// ==========================================

use crate::domain::attendance::{AttendanceSummary, AttendanceTally};
use crate::domain::types::{AttendanceStanding, AttendanceStatus};
use crate::engine::grade_calculator::round2;
use tracing::instrument;

/// 出勤率（百分比，两位小数）
pub fn attendance_percentage(attended_classes: i32, total_classes: i32) -> f64 {
    if total_classes <= 0 {
        return 0.0;
    }
    round2(f64::from(attended_classes) / f64::from(total_classes) * 100.0)
}

/// 预警规则参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttendancePolicy {
    pub warning_threshold_pct: f64,
    pub min_sessions: i32,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            warning_threshold_pct: 75.0,
            min_sessions: 5,
        }
    }
}

// ==========================================
// AttendanceTracker - 考勤统计引擎（无状态）
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct AttendanceTracker {
    policy: AttendancePolicy,
}

impl AttendanceTracker {
    pub fn new(policy: AttendancePolicy) -> Self {
        Self { policy }
    }

    /// 追加一条记录后的计数
    pub fn apply(&self, tally: AttendanceTally, status: AttendanceStatus) -> AttendanceTally {
        AttendanceTally {
            total_classes: tally.total_classes + 1,
            attended_classes: tally.attended_classes
                + if status.counts_as_attended() { 1 } else { 0 },
        }
    }

    pub fn standing(&self, tally: AttendanceTally) -> AttendanceStanding {
        if tally.total_classes < self.policy.min_sessions {
            return AttendanceStanding::Insufficient;
        }
        let pct = attendance_percentage(tally.attended_classes, tally.total_classes);
        if pct < self.policy.warning_threshold_pct {
            AttendanceStanding::Warning
        } else {
            AttendanceStanding::Good
        }
    }

    #[instrument(skip(self))]
    pub fn summarize(&self, tally: AttendanceTally) -> AttendanceSummary {
        AttendanceSummary {
            tally,
            attendance_percentage: attendance_percentage(tally.attended_classes, tally.total_classes),
            standing: self.standing(tally),
        }
    }

    /// 本次记录是否使状态进入 Warning（用于只在跨越时发事件）
    pub fn entered_warning(&self, before: AttendanceTally, after: AttendanceTally) -> bool {
        self.standing(before) != AttendanceStanding::Warning
            && self.standing(after) == AttendanceStanding::Warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(total: i32, attended: i32) -> AttendanceTally {
        AttendanceTally {
            total_classes: total,
            attended_classes: attended,
        }
    }

    #[test]
    fn test_percentage_zero_when_no_sessions() {
        assert_eq!(attendance_percentage(0, 0), 0.0);
        assert_eq!(attendance_percentage(3, 4), 75.0);
        assert_eq!(attendance_percentage(1, 3), 33.33);
    }

    #[test]
    fn test_percentage_monotonic_in_attended() {
        for total in 1..=20 {
            let mut last = -1.0;
            for attended in 0..=total {
                let pct = attendance_percentage(attended, total);
                assert!(pct >= last, "total={} attended={}", total, attended);
                last = pct;
            }
        }
    }

    #[test]
    fn test_apply_counts_present_and_late_only() {
        let tracker = AttendanceTracker::default();
        let mut t = AttendanceTally::default();
        for status in [
            AttendanceStatus::Present,
            AttendanceStatus::Late,
            AttendanceStatus::Absent,
            AttendanceStatus::Excused,
        ] {
            t = tracker.apply(t, status);
        }
        assert_eq!(t, tally(4, 2));
    }

    #[test]
    fn test_standing() {
        let tracker = AttendanceTracker::default();
        assert_eq!(tracker.standing(tally(4, 0)), AttendanceStanding::Insufficient);
        assert_eq!(tracker.standing(tally(5, 4)), AttendanceStanding::Good);
        assert_eq!(tracker.standing(tally(4, 3)), AttendanceStanding::Insufficient);
        assert_eq!(tracker.standing(tally(8, 6)), AttendanceStanding::Good);
        assert_eq!(tracker.standing(tally(8, 5)), AttendanceStanding::Warning);

        assert!(tracker.entered_warning(tally(4, 2), tally(5, 2)));
        assert!(!tracker.entered_warning(tally(5, 2), tally(6, 2)));
    }
}
