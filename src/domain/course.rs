// ==========================================
// 课程排课与选课核心 - 先修课程领域模型
// ==========================================
// 红线: 先修关系图必须无环（课程定义时校验，而非选课时）
// ==========================================

use serde::{Deserialize, Serialize};

/// 默认先修及格线
pub const DEFAULT_PREREQUISITE_MIN_SCORE: f64 = 60.0;

/// 先修规则: course_id 要求先完成 prerequisite_course_id 且总评不低于 min_total_score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoursePrerequisite {
    pub course_id: String,
    pub prerequisite_course_id: String,
    pub min_total_score: f64,
}

impl CoursePrerequisite {
    pub fn new(course_id: impl Into<String>, prerequisite_course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            prerequisite_course_id: prerequisite_course_id.into(),
            min_total_score: DEFAULT_PREREQUISITE_MIN_SCORE,
        }
    }

    pub fn with_min_score(mut self, min_total_score: f64) -> Self {
        self.min_total_score = min_total_score;
        self
    }
}

/// 未满足的先修要求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingPrerequisite {
    pub prerequisite_course_id: String,
    pub min_total_score: f64,
    /// 学生在该课程上的最好已结课成绩（没有则为 None）
    pub best_total_score: Option<f64>,
}
