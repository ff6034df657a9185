use chrono::{DateTime, TimeZone, Utc};

/// 全局统一的时间工具
///
/// 整个调度核心只认一种时间：Unix 毫秒 (i64)。
/// 有序集合的 score、`schedule` 的 due time、定时器的 fire 时间都是它。
pub struct TimeUtils;

impl TimeUtils {
    /// 获取当前 Unix 时间戳 (毫秒)
    pub fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// 毫秒时间戳转 `DateTime`，超出范围返回 None
    pub fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(ms).single()
    }

    /// 计算定时器延迟
    ///
    /// `min(due - now, horizon)`，已到期时为 0。
    pub fn timer_delay_ms(due_ms: i64, now_ms: i64, horizon_ms: u64) -> u64 {
        let remaining = due_ms.saturating_sub(now_ms).max(0) as u64;
        remaining.min(horizon_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_capped_by_horizon() {
        let now = 1_000;
        assert_eq!(TimeUtils::timer_delay_ms(now + 500, now, 86_400_000), 500);
        assert_eq!(
            TimeUtils::timer_delay_ms(now + 3 * 86_400_000, now, 86_400_000),
            86_400_000
        );
    }

    #[test]
    fn overdue_delay_is_zero() {
        assert_eq!(TimeUtils::timer_delay_ms(10, 20, 1000), 0);
    }

    #[test]
    fn millis_roundtrip_through_datetime() {
        let ms = 1_700_000_000_123;
        let dt = TimeUtils::millis_to_datetime(ms).unwrap();
        assert_eq!(dt.timestamp_millis(), ms);
    }
}
