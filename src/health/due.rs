//! 到期端点选择
//!
//! 纯函数，根据最后检测时间和检测间隔挑出本轮需要检测的端点

use crate::endpoint::Endpoint;
use chrono::{DateTime, Duration, Utc};

/// 判断单个端点是否到期
///
/// - 未启用的端点永远不到期
/// - 从未检测过的端点总是到期
/// - 间隔 `<= 0` 的存储数据按总是到期处理
/// - 最后检测时间在未来时经过时间为负，不到期
/// - 间隔超出时间范围可表示的上限时永远不到期
pub fn is_due(endpoint: &Endpoint, now: DateTime<Utc>) -> bool {
    if !endpoint.active {
        return false;
    }

    let Some(last_checked_at) = endpoint.last_checked_at else {
        return true;
    };

    if endpoint.check_interval_seconds <= 0 {
        return true;
    }

    let Some(interval) = Duration::try_seconds(endpoint.check_interval_seconds) else {
        return false;
    };

    now.signed_duration_since(last_checked_at) >= interval
}

/// 选出本轮需要检测的端点，保持输入顺序
pub fn select_due(endpoints: &[Endpoint], now: DateTime<Utc>) -> Vec<Endpoint> {
    endpoints
        .iter()
        .filter(|endpoint| is_due(endpoint, now))
        .cloned()
        .collect()
}
