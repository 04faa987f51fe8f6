//! 滚动终止判定
//!
//! 截图内容连续若干帧不变，就认为列表已经滚到底。

/// 整帧识别文本的摘要：按阅读顺序逐行拼接，不做任何归一化
pub fn frame_digest<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .map(|line| line.as_ref())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Continue,
    Stop,
}

#[derive(Debug, Clone)]
pub struct TerminationDetector {
    last_digest: Option<String>,
    consecutive_stable: u32,
    stability_threshold: u32,
}

impl TerminationDetector {
    pub fn new() -> Self {
        Self::with_threshold(3)
    }

    /// 阈值表示“连续多少帧内容相同”才停止；0 由 `HarvestConfig::validate` 拦下，这里兜底为 1
    pub fn with_threshold(stability_threshold: u32) -> Self {
        Self {
            last_digest: None,
            consecutive_stable: 0,
            stability_threshold: stability_threshold.max(1),
        }
    }

    pub fn observe(&mut self, digest: &str) -> TerminationSignal {
        let unchanged = self.last_digest.as_deref() == Some(digest);

        self.consecutive_stable = if unchanged {
            (self.consecutive_stable + 1).min(self.stability_threshold)
        } else {
            0
        };
        self.last_digest = Some(digest.to_string());

        // consecutive_stable 数的是重复次数，加上第一次出现才是相同帧的总数
        if self.consecutive_stable + 1 >= self.stability_threshold {
            TerminationSignal::Stop
        } else {
            TerminationSignal::Continue
        }
    }

    pub fn consecutive_stable(&self) -> u32 {
        self.consecutive_stable
    }

    pub fn last_digest(&self) -> Option<&str> {
        self.last_digest.as_deref()
    }
}

impl Default for TerminationDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_joins_lines() {
        assert_eq!(frame_digest(&["张三", "李四", " 12:30 "]), "张三\n李四\n 12:30 ");
        assert_eq!(frame_digest::<&str>(&[]), "");
    }

    #[test]
    fn test_stops_at_third_identical_frame() {
        let mut detector = TerminationDetector::new();

        assert_eq!(detector.observe("d"), TerminationSignal::Continue);
        assert_eq!(detector.observe("d"), TerminationSignal::Continue);
        assert_eq!(detector.observe("d"), TerminationSignal::Stop);
    }

    #[test]
    fn test_change_resets_run() {
        let mut detector = TerminationDetector::new();

        assert_eq!(detector.observe("d"), TerminationSignal::Continue);
        assert_eq!(detector.observe("d"), TerminationSignal::Continue);
        assert_eq!(detector.observe("e"), TerminationSignal::Continue);
        assert_eq!(detector.consecutive_stable(), 0);
        assert_eq!(detector.last_digest(), Some("e"));
    }

    #[test]
    fn test_first_empty_frame_does_not_count_as_repeat() {
        let mut detector = TerminationDetector::new();

        assert_eq!(detector.observe(""), TerminationSignal::Continue);
        assert_eq!(detector.consecutive_stable(), 0);
    }

    #[test]
    fn test_counter_stays_within_threshold() {
        let mut detector = TerminationDetector::with_threshold(2);

        for _ in 0..10 {
            detector.observe("same");
            assert!(detector.consecutive_stable() <= 2);
        }
        assert_eq!(detector.observe("same"), TerminationSignal::Stop);
    }
}
