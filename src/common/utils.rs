use nanoid::nanoid;
use rand::Rng;
use std::time::Duration;

// ==========================================
// 1. 身份工具 (Identity Utilities)
// ==========================================

const NODE_SUFFIX_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// 获取当前机器的主机名
pub fn get_hostname() -> String {
    hostname::get()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "node".to_string())
}

/// 生成默认节点 ID: `hostname-随机串` (如 `server01-a1b2c`)
///
/// 同一台机器上起多个进程时靠随机后缀区分日志。
pub fn default_node_id() -> String {
    format!("{}-{}", get_hostname(), nanoid!(5, &NODE_SUFFIX_ALPHABET))
}

// ==========================================
// 2. 算法工具 (Algorithmic Utilities)
// ==========================================

/// 计算指数退避时间 (Exponential Backoff with Jitter)
///
/// - attempt: 当前重试次数 (1, 2, 3...)
/// - base_delay: 基础延迟 (毫秒)
/// - max_delay: 最大延迟 (毫秒)
///
/// 返回值在 `[backoff / 2, backoff]` 之间 (Equal Jitter)，保证重试不会被抖动成 0。
pub fn calculate_backoff(attempt: u32, base_delay: u64, max_delay: u64) -> Duration {
    // 1. 指数部分: base * 2^(attempt-1)
    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let backoff = base_delay.saturating_mul(exponent).min(max_delay);
    if backoff == 0 {
        return Duration::ZERO;
    }

    // 2. 抖动
    let half = backoff / 2;
    let jittered = rand::rng().random_range(half..=backoff);
    Duration::from_millis(jittered)
}
