// ==========================================
// 课程排课与选课核心 - 成绩计算引擎
// ==========================================
// 红线: 纯函数，相同输入永远得到相同输出
// 红线: 期中、期末均已录入才计算；否则派生字段保持为空
// 规则: total = 0.30·期中 + 0.50·期末 + 0.15·作业 + 0.05·平时，缺省分项按 0 计
// ==========================================

use crate::domain::enrollment::{ComponentScores, GradeOutcome};
use crate::domain::types::LetterGrade;
use tracing::instrument;

pub const MIDTERM_WEIGHT: f64 = 0.30;
pub const FINAL_WEIGHT: f64 = 0.50;
pub const ASSIGNMENT_WEIGHT: f64 = 0.15;
pub const PARTICIPATION_WEIGHT: f64 = 0.05;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// 等级阈值（降序）: (下限, 等级)
const GRADE_THRESHOLDS: [(f64, LetterGrade); 8] = [
    (90.0, LetterGrade::APlus),
    (85.0, LetterGrade::A),
    (80.0, LetterGrade::BPlus),
    (75.0, LetterGrade::B),
    (70.0, LetterGrade::CPlus),
    (65.0, LetterGrade::C),
    (60.0, LetterGrade::DPlus),
    (50.0, LetterGrade::D),
];

/// 超出 [0, 100] 的分项
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRangeViolation {
    pub component: &'static str,
    pub value: f64,
}

// ==========================================
// GradeCalculator - 成绩计算引擎（无状态）
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct GradeCalculator;

impl GradeCalculator {
    pub fn new() -> Self {
        Self
    }

    /// 校验分项取值范围（NaN 视为越界）
    pub fn validate(&self, scores: &ComponentScores) -> Result<(), ScoreRangeViolation> {
        for (component, value) in scores.present_components() {
            if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
                return Err(ScoreRangeViolation { component, value });
            }
        }
        Ok(())
    }

    /// 由分项计算派生成绩
    ///
    /// # 返回
    /// - Some(outcome): 期中、期末均已录入
    /// - None: 尚不满足计算条件
    #[instrument(skip(self))]
    pub fn compute(&self, scores: &ComponentScores) -> Option<GradeOutcome> {
        let (midterm, final_exam) = match (scores.midterm, scores.final_exam) {
            (Some(m), Some(f)) => (m, f),
            _ => return None,
        };

        let raw = MIDTERM_WEIGHT * midterm
            + FINAL_WEIGHT * final_exam
            + ASSIGNMENT_WEIGHT * scores.assignment.unwrap_or(0.0)
            + PARTICIPATION_WEIGHT * scores.participation.unwrap_or(0.0);
        let total_score = round2(raw);
        let letter_grade = letter_for(total_score);

        Some(GradeOutcome {
            total_score,
            letter_grade,
            grade_points: letter_grade.grade_points(),
        })
    }
}

/// 四舍五入到两位小数
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 总评对应的等级
pub fn letter_for(total_score: f64) -> LetterGrade {
    GRADE_THRESHOLDS
        .iter()
        .find(|(floor, _)| total_score >= *floor)
        .map(|(_, letter)| *letter)
        .unwrap_or(LetterGrade::F)
}

/// 学分加权 GPA（两位小数）；没有已评分学分时为 None
pub fn weighted_gpa(graded: &[(f64, i32)]) -> Option<f64> {
    let credits: i32 = graded.iter().map(|(_, c)| *c).filter(|c| *c > 0).sum();
    if credits == 0 {
        return None;
    }
    let weighted: f64 = graded
        .iter()
        .filter(|(_, c)| *c > 0)
        .map(|(points, c)| points * f64::from(*c))
        .sum();
    Some(round2(weighted / f64::from(credits)))
}
