// ==========================================
// 课程排课与选课核心 - 导入层
// ==========================================
// 职责: 学期准备数据（教室、时段、班级、学期日历）批量导入
// 支持: CSV
// ==========================================

pub mod catalog_importer;
pub mod error;

// 重导出核心类型
pub use catalog_importer::{CatalogImporter, CatalogKind, ImportReport, RowRejection};
pub use error::{ImportError, ImportResult};
