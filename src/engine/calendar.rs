// ==========================================
// 课程排课与选课核心 - 学期日历提供者
// ==========================================
// 学期截止日属于外部课程/学期注册表，本核心只读
// ==========================================

use crate::domain::calendar::TermDeadlines;
use crate::repository::error::RepositoryResult;
use std::collections::HashMap;
use std::sync::RwLock;

pub trait TermCalendarProvider: Send + Sync {
    /// 学期截止日；未登记的学期返回 None
    fn deadlines_for(&self, term_id: &str) -> RepositoryResult<Option<TermDeadlines>>;
}

/// 内存中的静态日历
#[derive(Debug, Default)]
pub struct StaticTermCalendar {
    terms: RwLock<HashMap<String, TermDeadlines>>,
}

impl StaticTermCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_term(self, deadlines: TermDeadlines) -> Self {
        self.insert(deadlines);
        self
    }

    pub fn insert(&self, deadlines: TermDeadlines) {
        if let Ok(mut terms) = self.terms.write() {
            terms.insert(deadlines.term_id.clone(), deadlines);
        }
    }
}

impl TermCalendarProvider for StaticTermCalendar {
    fn deadlines_for(&self, term_id: &str) -> RepositoryResult<Option<TermDeadlines>> {
        let terms = self
            .terms
            .read()
            .map_err(|e| crate::repository::RepositoryError::LockError(e.to_string()))?;
        Ok(terms.get(term_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_static_calendar_lookup_and_replace() {
        let calendar = StaticTermCalendar::new()
            .with_term(TermDeadlines::new("2025S", date(1, 31), date(3, 31), date(5, 20)).unwrap());

        let deadlines = calendar.deadlines_for("2025S").unwrap().unwrap();
        assert!(deadlines.in_add_drop_window(date(1, 31)));
        assert!(calendar.deadlines_for("2025F").unwrap().is_none());

        calendar.insert(TermDeadlines::new("2025S", date(2, 7), date(3, 31), date(5, 20)).unwrap());
        let deadlines = calendar.deadlines_for("2025S").unwrap().unwrap();
        assert_eq!(deadlines.add_drop_deadline, date(2, 7));
    }
}
