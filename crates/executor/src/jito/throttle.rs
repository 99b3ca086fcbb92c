//! 中继调用节流与 429 退避

use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// 全局中继节流器
///
/// 中继的限流按账户计算，所以所有端点共用同一个"上次调用时间"。
/// 锁在等待期间一直持有，并发调用者会被串行化。
#[derive(Debug)]
pub struct RelayThrottle {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RelayThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// 等到距离上次调用至少 `min_interval`，然后记录本次调用时间
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                sleep_until(ready_at).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

/// 429 退避策略
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// 起始退避
    pub base: Duration,
    /// 退避上限
    pub cap: Duration,
    /// 每次 429 后的增长倍数
    pub factor: f64,
    /// 随机抖动窗口
    pub jitter_min: Duration,
    pub jitter_max: Duration,
    /// 最多重试次数
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(600),
            cap: Duration::from_millis(3000),
            factor: 1.7,
            jitter_min: Duration::from_millis(150),
            jitter_max: Duration::from_millis(400),
            max_retries: 3,
        }
    }
}

impl BackoffPolicy {
    /// 在抖动窗口内均匀取值
    pub fn jitter(&self) -> Duration {
        if self.jitter_max <= self.jitter_min {
            return self.jitter_min;
        }
        let min = self.jitter_min.as_millis() as u64;
        let max = self.jitter_max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// 单次调用的退避状态
    pub fn start(&self, floor: Duration) -> Backoff {
        Backoff {
            policy: self.clone(),
            floor,
            delay: self.base.min(self.cap),
            retries: 0,
        }
    }
}

/// 一次中继调用内的退避进度
#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    floor: Duration,
    delay: Duration,
    retries: u32,
}

impl Backoff {
    /// 已经做过的重试次数
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// 收到 429 后调用
    ///
    /// 返回本次等待的基础时长 `max(floor, delay)`（不含抖动）；
    /// 重试次数用尽时返回 `None`。
    pub fn on_rate_limited(&mut self) -> Option<Duration> {
        if self.retries >= self.policy.max_retries {
            return None;
        }
        self.retries += 1;

        let wait = self.delay.max(self.floor);
        let grown_ms = (self.delay.as_millis() as f64 * self.policy.factor).floor() as u64;
        self.delay = Duration::from_millis(grown_ms).min(self.policy.cap);
        Some(wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_throttle_spacing() {
        let throttle = RelayThrottle::new(Duration::from_millis(800));
        let start = Instant::now();

        throttle.acquire().await;
        assert_eq!(Instant::now(), start);

        throttle.acquire().await;
        assert_eq!(Instant::now() - start, Duration::from_millis(800));

        tokio::time::advance(Duration::from_millis(2000)).await;
        let before = Instant::now();
        throttle.acquire().await;
        assert_eq!(Instant::now(), before);
    }

    #[test]
    fn test_backoff_sequence() {
        let policy = BackoffPolicy::default();
        let mut backoff = policy.start(Duration::from_millis(800));

        let waits: Vec<Duration> = std::iter::from_fn(|| backoff.on_rate_limited()).collect();
        assert_eq!(waits.len(), 3);
        assert_eq!(backoff.retries(), 3);

        // max(800, 600) -> 800, max(800, 1020) -> 1020, max(800, 1734) -> 1734
        assert_eq!(waits[0], Duration::from_millis(800));
        assert_eq!(waits[1], Duration::from_millis(1020));
        assert!(waits.windows(2).all(|w| w[0] <= w[1]));
        assert!(waits.iter().all(|w| *w <= policy.cap.max(Duration::from_millis(800))));
    }

    #[test]
    fn test_backoff_capped() {
        let policy = BackoffPolicy {
            max_retries: 10,
            ..BackoffPolicy::default()
        };
        let mut backoff = policy.start(Duration::ZERO);
        let waits: Vec<Duration> = std::iter::from_fn(|| backoff.on_rate_limited()).collect();
        assert_eq!(waits.len(), 10);
        assert_eq!(*waits.last().unwrap(), policy.cap);
        assert!(waits.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_backoff_base_above_cap_clamped() {
        let policy = BackoffPolicy {
            base: Duration::from_millis(5000),
            cap: Duration::from_millis(3000),
            ..BackoffPolicy::default()
        };
        let mut backoff = policy.start(Duration::from_millis(800));
        let waits: Vec<Duration> = std::iter::from_fn(|| backoff.on_rate_limited()).collect();

        assert_eq!(waits, vec![policy.cap; 3]);
        assert!(waits.windows(2).all(|w| w[0] <= w[1]));
        assert!(waits.iter().all(|w| *w <= policy.cap));
    }

    #[test]
    fn test_jitter_window() {
        let policy = BackoffPolicy::default();
        for _ in 0..200 {
            let jitter = policy.jitter();
            assert!(jitter >= policy.jitter_min && jitter <= policy.jitter_max);
        }
    }
}
