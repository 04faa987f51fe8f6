use crate::core::harvest::{
    BoundingBox, HarvestConfig, HarvestError, HarvestReport, HarvestStats, Outcome, RecognizedPage,
    StopReason, SwipeGesture, TextRegion,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 识别端返回的一个文字区域（像素坐标）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrRegion {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// 一张截图的识别结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrPage {
    pub regions: Vec<OcrRegion>,
    /// 识别端的整页文本；为空时按区域顺序拼接
    #[serde(rename = "fullText", default)]
    pub full_text: Option<String>,
}

impl From<OcrPage> for RecognizedPage {
    fn from(page: OcrPage) -> Self {
        let regions = page
            .regions
            .into_iter()
            .map(|r| TextRegion::new(r.text, BoundingBox::new(r.left, r.top, r.right, r.bottom)))
            .collect();

        match page.full_text {
            Some(full_text) => RecognizedPage::new(regions, full_text),
            None => RecognizedPage::from_regions(regions),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwipeRequest {
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
    pub duration_ms: u64,
}

impl From<SwipeGesture> for SwipeRequest {
    fn from(g: SwipeGesture) -> Self {
        Self {
            start_x: g.start_x,
            start_y: g.start_y,
            end_x: g.end_x,
            end_y: g.end_y,
            duration_ms: g.duration_ms,
        }
    }
}

/// Dart 侧可调的采集参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestOptions {
    pub stability_threshold: u32,
    pub settle_delay_ms: u64,
    pub overall_timeout_ms: u64,
    pub swipe_duration_ms: u64,
    pub scroll_ratio: f64,
    /// 额外排除的界面文案，如 "文件传输助手"
    pub extra_excluded: Vec<String>,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        HarvestConfig::default().into()
    }
}

impl From<HarvestConfig> for HarvestOptions {
    fn from(config: HarvestConfig) -> Self {
        Self {
            stability_threshold: config.stability_threshold,
            settle_delay_ms: config.settle_delay.as_millis() as u64,
            overall_timeout_ms: config.overall_timeout.as_millis() as u64,
            swipe_duration_ms: config.scroll.swipe_duration_ms,
            scroll_ratio: config.scroll.scroll_ratio,
            extra_excluded: config.classifier.extra_excluded,
        }
    }
}

impl TryFrom<HarvestOptions> for HarvestConfig {
    type Error = HarvestError;

    fn try_from(options: HarvestOptions) -> Result<Self, Self::Error> {
        let mut config = HarvestConfig::default();
        config.stability_threshold = options.stability_threshold;
        config.settle_delay = Duration::from_millis(options.settle_delay_ms);
        config.overall_timeout = Duration::from_millis(options.overall_timeout_ms);
        config.scroll.swipe_duration_ms = options.swipe_duration_ms;
        config.scroll.scroll_ratio = options.scroll_ratio;
        config.classifier.extra_excluded = options.extra_excluded;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarvestStatus {
    /// 至少收集到一条
    Success,
    /// 正常结束但一条都没有，或出现意外错误
    Empty,
    /// 超时，contacts 中是超时前已收集的部分
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestSummary {
    pub iterations: u32,
    pub scroll_count: u32,
    pub total_regions: u64,
    pub total_candidates: u64,
    pub elapsed_ms: u64,
    pub stop_reason: String,
}

impl From<HarvestStats> for HarvestSummary {
    fn from(stats: HarvestStats) -> Self {
        let stop_reason = match stats.stop_reason {
            StopReason::Stable => "stable",
            StopReason::CaptureFailed => "capture_failed",
            StopReason::RecognitionFailed => "recognition_failed",
            StopReason::ScrollFailed => "scroll_failed",
            StopReason::Timeout => "timeout",
            StopReason::Fault => "fault",
        };

        Self {
            iterations: stats.iterations,
            scroll_count: stats.scroll_count,
            total_regions: stats.total_regions as u64,
            total_candidates: stats.total_candidates as u64,
            elapsed_ms: stats.elapsed_ms,
            stop_reason: stop_reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestResult {
    pub status: HarvestStatus,
    pub contacts: Vec<String>,
    pub message: String,
    pub summary: HarvestSummary,
}

impl HarvestResult {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl From<HarvestReport> for HarvestResult {
    fn from(report: HarvestReport) -> Self {
        let (status, entries, message) = match report.outcome {
            Outcome::Success(entries) => {
                let message = format!("共找到 {} 个联系人", entries.len());
                (HarvestStatus::Success, entries, message)
            }
            Outcome::Empty { reason } => (HarvestStatus::Empty, Vec::new(), reason),
            Outcome::Timeout { partial } => {
                let message = format!("采集超时，已找到 {} 个联系人", partial.len());
                (HarvestStatus::Timeout, partial, message)
            }
        };

        Self {
            status,
            contacts: entries.into_iter().map(|e| e.name).collect(),
            message,
            summary: report.stats.into(),
        }
    }
}
