use super::error::HarvestError;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub min_chars: usize,
    pub max_chars: usize,
    /// 区域顶部不得超过帧高的比例（排除底部导航栏）
    pub max_top_ratio: f64,
    /// 区域高度不得超过帧高的比例（排除大标题）
    pub max_height_ratio: f64,
    /// 追加到内置 UI 文案排除表的词
    pub extra_excluded: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_chars: 2,
            max_chars: 20,
            max_top_ratio: 0.85,
            max_height_ratio: 0.10,
            extra_excluded: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrollConfig {
    /// 起点所在高度比例，终点对称取 1 - ratio
    pub scroll_ratio: f64,
    pub swipe_duration_ms: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            scroll_ratio: 0.7,
            swipe_duration_ms: 300,
        }
    }
}

/// 一次上滑手势
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwipeGesture {
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
    pub duration_ms: u64,
}

impl ScrollConfig {
    /// ratio 必须在 (0.5, 1.0] 内：起点在屏幕中线以下，终点不越出屏幕顶部
    pub fn validate(&self) -> Result<(), HarvestError> {
        if !(self.scroll_ratio > 0.5 && self.scroll_ratio <= 1.0) {
            return Err(HarvestError::InvalidConfig(format!(
                "scroll_ratio {} outside (0.5, 1.0]",
                self.scroll_ratio
            )));
        }
        if self.swipe_duration_ms == 0 {
            return Err(HarvestError::InvalidConfig(
                "swipe_duration_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn gesture_for(&self, width: u32, height: u32) -> Result<SwipeGesture, HarvestError> {
        if width == 0 || height == 0 {
            return Err(HarvestError::InvalidBounds { width, height });
        }
        self.validate()?;

        let h = f64::from(height);
        let x = (width / 2) as i32;

        Ok(SwipeGesture {
            start_x: x,
            start_y: (h * self.scroll_ratio).round() as i32,
            end_x: x,
            end_y: (h * (1.0 - self.scroll_ratio)).round() as i32,
            duration_ms: self.swipe_duration_ms,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub classifier: ClassifierConfig,
    pub scroll: ScrollConfig,
    pub stability_threshold: u32,
    pub settle_delay: Duration,
    pub overall_timeout: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            scroll: ScrollConfig::default(),
            stability_threshold: 3,
            settle_delay: Duration::from_millis(800),
            overall_timeout: Duration::from_secs(120),
        }
    }
}

impl HarvestConfig {
    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.stability_threshold == 0 {
            return Err(HarvestError::InvalidConfig(
                "stability_threshold must be at least 1".to_string(),
            ));
        }
        if self.overall_timeout.is_zero() {
            return Err(HarvestError::InvalidConfig(
                "overall_timeout must be positive".to_string(),
            ));
        }
        self.scroll.validate()
    }

    /// 低端机：列表动画和加载更慢，多等一会儿
    pub fn for_slow_device() -> Self {
        Self {
            settle_delay: Duration::from_millis(1500),
            overall_timeout: Duration::from_secs(240),
            scroll: ScrollConfig {
                swipe_duration_ms: 450,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn for_fast_device() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            overall_timeout: Duration::from_secs(90),
            scroll: ScrollConfig {
                swipe_duration_ms: 250,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_gesture_covers_middle_forty_percent() {
        let gesture = ScrollConfig::default().gesture_for(1080, 2000).unwrap();

        assert_eq!(
            gesture,
            SwipeGesture {
                start_x: 540,
                start_y: 1400,
                end_x: 540,
                end_y: 600,
                duration_ms: 300,
            }
        );
    }

    #[test]
    fn test_gesture_rejects_zero_bounds() {
        let result = ScrollConfig::default().gesture_for(1080, 0);
        assert!(matches!(result, Err(HarvestError::InvalidBounds { .. })));
    }

    #[test]
    fn test_gesture_rejects_ratio_outside_screen() {
        let scroll = ScrollConfig {
            scroll_ratio: 1.5,
            ..Default::default()
        };

        let result = scroll.gesture_for(1080, 2000);
        assert!(matches!(result, Err(HarvestError::InvalidConfig(_))));
    }

    #[test]
    fn test_ratio_bounds() {
        let with_ratio = |scroll_ratio| ScrollConfig {
            scroll_ratio,
            ..Default::default()
        };

        assert!(with_ratio(1.0).validate().is_ok());
        assert!(with_ratio(0.51).validate().is_ok());
        // 0.5 会让起点和终点重合
        assert!(with_ratio(0.5).validate().is_err());
        assert!(with_ratio(0.3).validate().is_err());
        assert!(with_ratio(f64::NAN).validate().is_err());

        let full = with_ratio(1.0).gesture_for(1080, 2000).unwrap();
        assert_eq!((full.start_y, full.end_y), (2000, 0));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let config = HarvestConfig {
            stability_threshold: 0,
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("stability_threshold"));
        assert!(HarvestConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = HarvestConfig {
            overall_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_presets_keep_detection_defaults() {
        let slow = HarvestConfig::for_slow_device();
        let fast = HarvestConfig::for_fast_device();

        assert!(slow.settle_delay > fast.settle_delay);
        assert_eq!(slow.stability_threshold, 3);
        assert_eq!(fast.classifier.max_chars, 20);
        assert!(slow.validate().is_ok());
        assert!(fast.validate().is_ok());
    }
}
