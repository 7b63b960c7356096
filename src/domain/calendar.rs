// ==========================================
// 课程排课与选课核心 - 学期日历事实
// ==========================================
// 来源: 外部课程/学期注册表（本核心只读）
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 学期关键截止日（均为闭区间上界）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermDeadlines {
    pub term_id: String,
    /// 加退选截止日: today <= 该日允许退课
    pub add_drop_deadline: NaiveDate,
    /// 退出截止日: add_drop_deadline < today <= 该日允许中途退出
    pub withdrawal_deadline: NaiveDate,
    /// 学期结束日: today >= 该日允许结课
    pub term_end_date: NaiveDate,
}

impl TermDeadlines {
    pub fn new(
        term_id: impl Into<String>,
        add_drop_deadline: NaiveDate,
        withdrawal_deadline: NaiveDate,
        term_end_date: NaiveDate,
    ) -> Result<Self, String> {
        if withdrawal_deadline < add_drop_deadline {
            return Err(format!(
                "退出截止日早于加退选截止日: add_drop={}, withdrawal={}",
                add_drop_deadline, withdrawal_deadline
            ));
        }
        Ok(Self {
            term_id: term_id.into(),
            add_drop_deadline,
            withdrawal_deadline,
            term_end_date,
        })
    }

    pub fn in_add_drop_window(&self, today: NaiveDate) -> bool {
        today <= self.add_drop_deadline
    }

    pub fn in_withdrawal_window(&self, today: NaiveDate) -> bool {
        today > self.add_drop_deadline && today <= self.withdrawal_deadline
    }

    pub fn term_closed(&self, today: NaiveDate) -> bool {
        today >= self.term_end_date
    }
}
