//! 外部协作者：截屏、文字识别、屏幕手势
//!
//! 引擎只通过这些 trait 调用平台能力，实例由调用方创建并管理生命周期。

use super::classifier::{BoundingBox, TextRegion};
use super::config::SwipeGesture;
use super::error::HarvestError;
use super::frame::Frame;
use super::termination::frame_digest;
use async_trait::async_trait;
use std::sync::Mutex;

/// 一帧的识别结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizedPage {
    pub regions: Vec<TextRegion>,
    /// 按阅读顺序逐行拼接的全文，用作帧摘要
    pub full_text: String,
}

impl RecognizedPage {
    pub fn new(regions: Vec<TextRegion>, full_text: String) -> Self {
        Self { regions, full_text }
    }

    /// 识别端不提供全文时，用区域文字按顺序拼出来
    pub fn from_regions(regions: Vec<TextRegion>) -> Self {
        let lines: Vec<&str> = regions.iter().map(|r| r.text.as_str()).collect();
        let full_text = frame_digest(&lines);
        Self { regions, full_text }
    }
}

#[async_trait]
pub trait FrameCapture: Send + Sync {
    async fn capture(&self) -> Result<Frame, HarvestError>;
}

#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, frame: &Frame) -> Result<RecognizedPage, HarvestError>;
}

#[async_trait]
pub trait ScreenDriver: Send + Sync {
    /// 可交互区域的 (宽, 高)
    async fn bounds(&self) -> Result<(u32, u32), HarvestError>;

    /// 发出手势即可，不关心列表实际滚动了多少
    async fn swipe(&self, gesture: SwipeGesture) -> Result<(), HarvestError>;
}

/// 脚本中的一屏
#[derive(Debug, Clone)]
pub enum ScriptedView {
    Page(Vec<TextRegion>),
    CaptureFails,
    RecognitionFails,
}

impl ScriptedView {
    /// 把名字从上到下排成一列，位置都落在内容区内
    pub fn names(names: &[&str]) -> Self {
        let regions = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let top = 200 + i as i32 * 120;
                TextRegion::new(*name, BoundingBox::new(160, top, 600, top + 48))
            })
            .collect();
        ScriptedView::Page(regions)
    }
}

/// 按脚本回放的屏幕，同时充当三个协作者（用于测试和演示）
pub struct ScriptedScreen {
    width: u32,
    height: u32,
    views: Vec<ScriptedView>,
    cursor: Mutex<usize>,
    swipes: Mutex<Vec<SwipeGesture>>,
}

impl ScriptedScreen {
    pub fn new(width: u32, height: u32, views: Vec<ScriptedView>) -> Self {
        Self {
            width,
            height,
            views,
            cursor: Mutex::new(0),
            swipes: Mutex::new(Vec::new()),
        }
    }

    pub fn swipes(&self) -> Vec<SwipeGesture> {
        self.swipes
            .lock()
            .map(|swipes| swipes.clone())
            .unwrap_or_default()
    }

    pub fn captured_count(&self) -> usize {
        self.cursor.lock().map(|c| *c).unwrap_or(0)
    }

    fn view(&self, frame_number: u64) -> Option<&ScriptedView> {
        self.views.get(frame_number as usize)
    }
}

#[async_trait]
impl FrameCapture for ScriptedScreen {
    async fn capture(&self) -> Result<Frame, HarvestError> {
        let index = {
            let mut cursor = self
                .cursor
                .lock()
                .map_err(|e| HarvestError::Unexpected(format!("cursor lock poisoned: {}", e)))?;
            let index = *cursor;
            *cursor += 1;
            index
        };

        match self.views.get(index) {
            None => Err(HarvestError::Capture("script exhausted".to_string())),
            Some(ScriptedView::CaptureFails) => {
                Err(HarvestError::Capture(format!("scripted failure at frame {}", index)))
            }
            Some(_) => Frame::new(self.width, self.height, Vec::new(), 0, index as u64),
        }
    }
}

#[async_trait]
impl TextRecognizer for ScriptedScreen {
    async fn recognize(&self, frame: &Frame) -> Result<RecognizedPage, HarvestError> {
        match self.view(frame.frame_number) {
            Some(ScriptedView::Page(regions)) => Ok(RecognizedPage::from_regions(regions.clone())),
            _ => Err(HarvestError::Recognition(format!(
                "no text for frame {}",
                frame.frame_number
            ))),
        }
    }
}

#[async_trait]
impl ScreenDriver for ScriptedScreen {
    async fn bounds(&self) -> Result<(u32, u32), HarvestError> {
        Ok((self.width, self.height))
    }

    async fn swipe(&self, gesture: SwipeGesture) -> Result<(), HarvestError> {
        if let Ok(mut swipes) = self.swipes.lock() {
            swipes.push(gesture);
        }
        Ok(())
    }
}
