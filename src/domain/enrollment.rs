// ==========================================
// 课程排课与选课核心 - 选课领域模型
// ==========================================
// 红线: (student_id, section_id) 唯一
// 红线: 选课记录不物理删除，终态保留历史
// 红线: total_score / letter_grade / grade_points 必须一起重算
// ==========================================

use crate::domain::types::{EnrollmentStatus, LetterGrade};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// ComponentScores - 分项成绩（每项 0..=100 或缺省）
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub midterm: Option<f64>,
    pub final_exam: Option<f64>,
    pub assignment: Option<f64>,
    pub participation: Option<f64>,
}

impl ComponentScores {
    /// 合并更新: 更新中给出的分项覆盖原值，缺省项保持不变
    pub fn merged_with(&self, update: &ScoreUpdate) -> ComponentScores {
        ComponentScores {
            midterm: update.midterm.or(self.midterm),
            final_exam: update.final_exam.or(self.final_exam),
            assignment: update.assignment.or(self.assignment),
            participation: update.participation.or(self.participation),
        }
    }

    /// 按 (分项名, 值) 遍历已给出的分项
    pub fn present_components(&self) -> Vec<(&'static str, f64)> {
        [
            ("midterm", self.midterm),
            ("final", self.final_exam),
            ("assignment", self.assignment),
            ("participation", self.participation),
        ]
        .into_iter()
        .filter_map(|(name, v)| v.map(|value| (name, value)))
        .collect()
    }
}

/// 成绩录入请求（缺省项表示不修改）
pub type ScoreUpdate = ComponentScores;

// ==========================================
// GradeOutcome - 成绩派生结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeOutcome {
    pub total_score: f64, // 保留两位小数
    pub letter_grade: LetterGrade,
    pub grade_points: f64,
}

// ==========================================
// Enrollment - 选课记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    // ===== 标识 =====
    pub enrollment_id: String,
    pub student_id: String,
    pub section_id: String,

    // ===== 状态 =====
    pub status: EnrollmentStatus,

    // ===== 成绩 =====
    pub scores: ComponentScores,
    pub grade: Option<GradeOutcome>, // 仅在期中、期末均已录入时存在

    // ===== 考勤聚合 =====
    pub total_classes: i32,
    pub attended_classes: i32, // <= total_classes

    // ===== 时间 =====
    pub enrolled_at: NaiveDateTime,
    pub status_changed_at: NaiveDateTime,
    pub drop_date: Option<NaiveDate>, // 仅在离开 ENROLLED 时设置
    pub completion_date: Option<NaiveDate>,
}

impl Enrollment {
    /// 出勤率（百分比）；total_classes 为 0 时为 0
    pub fn attendance_percentage(&self) -> f64 {
        crate::engine::attendance_tracker::attendance_percentage(
            self.attended_classes,
            self.total_classes,
        )
    }
}
