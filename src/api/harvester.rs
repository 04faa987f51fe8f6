//! 通讯录采集器

use crate::api::models::harvest::{HarvestOptions, HarvestResult, OcrPage, ScreenSize, SwipeRequest};
use crate::core::harvest::{
    Frame, FrameCapture, HarvestConfig, HarvestController, HarvestError, HarvestReport,
    RecognizedPage, ScreenDriver, SwipeGesture, TextRecognizer,
};
use async_trait::async_trait;
use flutter_rust_bridge::{frb, DartFnFuture};
use log::{error, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

type CaptureFn = Box<dyn Fn() -> DartFnFuture<Option<Vec<u8>>> + Send + Sync>;
type RecognizeFn = Box<dyn Fn(Vec<u8>) -> DartFnFuture<Option<OcrPage>> + Send + Sync>;
type ScreenSizeFn = Box<dyn Fn() -> DartFnFuture<ScreenSize> + Send + Sync>;
type SwipeFn = Box<dyn Fn(SwipeRequest) -> DartFnFuture<bool> + Send + Sync>;

/// 通讯录采集器 - 截屏/识别/手势由 Dart 侧提供，Rust 侧负责循环与判定
///
/// ```dart
/// final harvester = ContactHarvester.create();
/// final result = await harvester.harvest(
///   capture: () => screenshotService.capturePng(),
///   recognize: (png) => ocr.recognize(png),
///   screenSize: () => accessibility.screenSize(),
///   swipe: (req) => accessibility.swipe(req),
/// );
/// ```
#[frb(opaque)]
pub struct ContactHarvester {
    options: HarvestOptions,
}

impl ContactHarvester {
    #[frb(sync)]
    pub fn create() -> Self {
        Self::with_options(HarvestOptions::default())
    }

    #[frb(sync)]
    pub fn with_options(options: HarvestOptions) -> Self {
        crate::init_logging();
        info!("📇 ContactHarvester: created with {:?}", options);
        Self { options }
    }

    #[frb(sync, getter)]
    pub fn options(&self) -> HarvestOptions {
        self.options.clone()
    }

    /// 开始采集，直到列表到底、截屏/识别失败或超时
    #[frb(dart_async)]
    pub async fn harvest(
        &self,
        capture: impl Fn() -> DartFnFuture<Option<Vec<u8>>> + Send + Sync + 'static,
        recognize: impl Fn(Vec<u8>) -> DartFnFuture<Option<OcrPage>> + Send + Sync + 'static,
        screen_size: impl Fn() -> DartFnFuture<ScreenSize> + Send + Sync + 'static,
        swipe: impl Fn(SwipeRequest) -> DartFnFuture<bool> + Send + Sync + 'static,
    ) -> HarvestResult {
        let config = match HarvestConfig::try_from(self.options.clone()) {
            Ok(config) => config,
            Err(e) => {
                error!("📇 ContactHarvester: rejected options: {}", e);
                return HarvestReport::fault(&e, 0).into();
            }
        };
        let controller = HarvestController::with_config(
            Arc::new(DartCapture {
                callback: Box::new(capture),
                frame_counter: AtomicU64::new(0),
            }),
            Arc::new(DartRecognizer {
                callback: Box::new(recognize),
            }),
            Arc::new(DartScreen {
                screen_size: Box::new(screen_size),
                swipe: Box::new(swipe),
            }),
            config,
        );

        let result: HarvestResult = controller.harvest_with_stats().await.into();
        info!("📇 ContactHarvester: {:?} - {}", result.status, result.message);
        result
    }
}

impl Drop for ContactHarvester {
    fn drop(&mut self) {
        info!("🗑️ ContactHarvester: released");
    }
}

struct DartCapture {
    callback: CaptureFn,
    frame_counter: AtomicU64,
}

#[async_trait]
impl FrameCapture for DartCapture {
    async fn capture(&self) -> Result<Frame, HarvestError> {
        let bytes = (self.callback)()
            .await
            .ok_or_else(|| HarvestError::Capture("screenshot unavailable".to_string()))?;
        let frame_number = self.frame_counter.fetch_add(1, Ordering::Relaxed);

        Frame::from_encoded(bytes, now_ms(), frame_number)
            .map_err(|e| HarvestError::Capture(e.to_string()))
    }
}

struct DartRecognizer {
    callback: RecognizeFn,
}

#[async_trait]
impl TextRecognizer for DartRecognizer {
    async fn recognize(&self, frame: &Frame) -> Result<RecognizedPage, HarvestError> {
        (self.callback)(frame.data.as_ref().clone())
            .await
            .map(RecognizedPage::from)
            .ok_or_else(|| {
                HarvestError::Recognition(format!("no text for frame {}", frame.frame_number))
            })
    }
}

struct DartScreen {
    screen_size: ScreenSizeFn,
    swipe: SwipeFn,
}

#[async_trait]
impl ScreenDriver for DartScreen {
    async fn bounds(&self) -> Result<(u32, u32), HarvestError> {
        let size = (self.screen_size)().await;
        Ok((size.width, size.height))
    }

    async fn swipe(&self, gesture: SwipeGesture) -> Result<(), HarvestError> {
        if (self.swipe)(gesture.into()).await {
            Ok(())
        } else {
            Err(HarvestError::Unexpected("gesture was not dispatched".to_string()))
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
