//! 健康检测模块
//!
//! 提供HTTP探测、状态分类、到期选择和检测周期调度功能

pub mod checker;
pub mod due;
pub mod result;
pub mod scheduler;

// 重新导出主要类型
pub use checker::{HttpProber, Prober};
pub use due::{is_due, select_due};
pub use result::{classify, HealthCheckRecord, HealthStatus, ProbeOutcome, RecordId};
pub use scheduler::{CheckResult, CycleReport, CycleRunner};
