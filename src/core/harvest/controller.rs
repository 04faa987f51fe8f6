//! 滚动采集主循环
//!
//! 截屏 → 识别 → 筛选候选 → 去重累积 → 判断是否到底 → 上滑 → 等待稳定，
//! 直到内容连续不变、协作者失败或全局超时。

use super::accumulator::{Entry, EntryAccumulator};
use super::classifier::CandidateClassifier;
use super::collaborators::{FrameCapture, ScreenDriver, TextRecognizer};
use super::config::HarvestConfig;
use super::error::HarvestError;
use super::frame::FrameInfo;
use super::termination::{TerminationDetector, TerminationSignal};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestPhase {
    Init,
    Capturing,
    Recognizing,
    Extracting,
    CheckingTermination,
    Scrolling,
    Stabilizing,
}

/// 循环结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Stable,
    CaptureFailed,
    RecognitionFailed,
    /// 取屏幕尺寸或计算手势失败，已收集的条目保留
    ScrollFailed,
    Timeout,
    Fault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 按发现顺序排列，至少一条
    Success(Vec<Entry>),
    Empty { reason: String },
    /// 超时前已收集到的条目保留在 partial 中
    Timeout { partial: Vec<Entry> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestStats {
    pub iterations: u32,
    pub scroll_count: u32,
    pub total_regions: usize,
    pub total_candidates: usize,
    pub total_added: usize,
    pub elapsed_ms: u64,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub outcome: Outcome,
    pub stats: HarvestStats,
}

impl HarvestReport {
    /// 循环之外的失败（配置无效、采集任务 panic），没有可保留的条目
    pub fn fault(fault: &HarvestError, elapsed_ms: u64) -> Self {
        Self {
            outcome: Outcome::Empty {
                reason: fault.to_string(),
            },
            stats: HarvestStats {
                iterations: 0,
                scroll_count: 0,
                total_regions: 0,
                total_candidates: 0,
                total_added: 0,
                elapsed_ms,
                stop_reason: StopReason::Fault,
            },
        }
    }
}

/// 单次采集的会话状态，调用结束即丢弃
struct Session {
    accumulator: EntryAccumulator,
    detector: TerminationDetector,
    phase: HarvestPhase,
    iterations: u32,
    scroll_count: u32,
    total_regions: usize,
    total_candidates: usize,
    last_failure: Option<String>,
}

impl Session {
    fn new(stability_threshold: u32) -> Self {
        Self {
            accumulator: EntryAccumulator::new(),
            detector: TerminationDetector::with_threshold(stability_threshold),
            phase: HarvestPhase::Init,
            iterations: 0,
            scroll_count: 0,
            total_regions: 0,
            total_candidates: 0,
            last_failure: None,
        }
    }

    fn enter(&mut self, phase: HarvestPhase) {
        debug!("➡️ iteration {}: {:?}", self.iterations, phase);
        self.phase = phase;
    }
}

#[derive(Clone)]
pub struct HarvestController {
    capture: Arc<dyn FrameCapture>,
    recognizer: Arc<dyn TextRecognizer>,
    screen: Arc<dyn ScreenDriver>,
    classifier: Arc<CandidateClassifier>,
    config: HarvestConfig,
}

impl HarvestController {
    pub fn new(
        capture: Arc<dyn FrameCapture>,
        recognizer: Arc<dyn TextRecognizer>,
        screen: Arc<dyn ScreenDriver>,
    ) -> Self {
        Self::with_config(capture, recognizer, screen, HarvestConfig::default())
    }

    pub fn with_config(
        capture: Arc<dyn FrameCapture>,
        recognizer: Arc<dyn TextRecognizer>,
        screen: Arc<dyn ScreenDriver>,
        config: HarvestConfig,
    ) -> Self {
        Self {
            capture,
            recognizer,
            screen,
            classifier: Arc::new(CandidateClassifier::with_config(config.classifier.clone())),
            config,
        }
    }

    pub async fn harvest(&self) -> Outcome {
        self.harvest_with_stats().await.outcome
    }

    /// 在独立任务中运行，协作者 panic 也只会变成失败结果
    pub async fn harvest_with_stats(&self) -> HarvestReport {
        let started = Instant::now();
        if let Err(e) = self.config.validate() {
            error!("💥 {}", e);
            return HarvestReport::fault(&e, 0);
        }
        let this = self.clone();

        match tokio::spawn(async move { this.run_session().await }).await {
            Ok(report) => report,
            Err(join_error) => {
                let fault = if join_error.is_panic() {
                    HarvestError::Unexpected(format!("harvest task panicked: {}", join_error))
                } else {
                    HarvestError::Unexpected(format!("harvest task aborted: {}", join_error))
                };
                error!("💥 {}", fault);
                HarvestReport::fault(&fault, started.elapsed().as_millis() as u64)
            }
        }
    }

    async fn run_session(&self) -> HarvestReport {
        let started = Instant::now();
        let deadline = started + self.config.overall_timeout;
        let cancel = CancellationToken::new();
        // 会话结束（包括 panic 展开）时取消令牌，看门狗随之退出
        let _stop_watchdog = cancel.clone().drop_guard();
        tokio::spawn(cancel_at(deadline, cancel.clone()));

        info!(
            "📜 Harvest started (timeout {:?}, settle {:?}, stability {})",
            self.config.overall_timeout, self.config.settle_delay, self.config.stability_threshold
        );

        let mut session = Session::new(self.config.stability_threshold);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(StopReason::Timeout),
            result = self.run_loop(&mut session, &cancel) => result,
        };

        let stop_reason = match &result {
            Ok(reason) => *reason,
            Err(_) => StopReason::Fault,
        };
        if stop_reason == StopReason::Timeout {
            warn!(
                "⏰ Deadline hit during {:?} after {} iterations",
                session.phase, session.iterations
            );
        }

        let stats = HarvestStats {
            iterations: session.iterations,
            scroll_count: session.scroll_count,
            total_regions: session.total_regions,
            total_candidates: session.total_candidates,
            total_added: session.accumulator.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            stop_reason,
        };

        let entries = session.accumulator.into_entries();
        let outcome = match result {
            Err(fault) => {
                error!(
                    "💥 Harvest failed: {} ({} entries discarded)",
                    fault,
                    entries.len()
                );
                Outcome::Empty {
                    reason: fault.to_string(),
                }
            }
            Ok(StopReason::Timeout) => Outcome::Timeout { partial: entries },
            Ok(_) if entries.is_empty() => Outcome::Empty {
                reason: match session.last_failure {
                    Some(failure) => format!("no entries found ({})", failure),
                    None => "no entries found".to_string(),
                },
            },
            Ok(_) => Outcome::Success(entries),
        };

        info!(
            "✅ Harvest finished: {:?}, {} entries, {} scrolls, {}ms",
            stats.stop_reason, stats.total_added, stats.scroll_count, stats.elapsed_ms
        );

        HarvestReport { outcome, stats }
    }

    async fn run_loop(
        &self,
        session: &mut Session,
        cancel: &CancellationToken,
    ) -> Result<StopReason, HarvestError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(StopReason::Timeout);
            }
            session.iterations += 1;

            session.enter(HarvestPhase::Capturing);
            let frame = match self.capture.capture().await {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("📷 {} at iteration {}, keeping partial results", e, session.iterations);
                    session.last_failure = Some(e.to_string());
                    return Ok(StopReason::CaptureFailed);
                }
            };
            debug!("📷 {:?}", FrameInfo::from_frame(&frame));

            session.enter(HarvestPhase::Recognizing);
            let page = match self.recognizer.recognize(&frame).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("🔤 {} at iteration {}, keeping partial results", e, session.iterations);
                    session.last_failure = Some(e.to_string());
                    return Ok(StopReason::RecognitionFailed);
                }
            };

            session.enter(HarvestPhase::Extracting);
            let candidates = self
                .classifier
                .extract(&page.regions, frame.width, frame.height);
            let candidate_count = candidates.len();
            let added = session.accumulator.add(candidates);
            if !session.accumulator.is_consistent() {
                return Err(HarvestError::Unexpected(
                    "accumulated entries and seen names diverged".to_string(),
                ));
            }
            session.total_regions += page.regions.len();
            session.total_candidates += candidate_count;

            info!(
                "🧾 Iteration {}: {} regions, {} candidates, {} new, {} total",
                session.iterations,
                page.regions.len(),
                candidate_count,
                added.len(),
                session.accumulator.len()
            );

            session.enter(HarvestPhase::CheckingTermination);
            let signal = session.detector.observe(&page.full_text);
            debug!("🔁 stable run: {}", session.detector.consecutive_stable());
            if signal == TerminationSignal::Stop {
                info!(
                    "🛑 View unchanged for {} frames, list fully traversed",
                    self.config.stability_threshold
                );
                return Ok(StopReason::Stable);
            }

            session.enter(HarvestPhase::Scrolling);
            if let Err(e) = self.scroll_once(session).await {
                warn!("👆 {} at iteration {}, keeping partial results", e, session.iterations);
                session.last_failure = Some(e.to_string());
                return Ok(StopReason::ScrollFailed);
            }

            session.enter(HarvestPhase::Stabilizing);
            tokio::select! {
                _ = sleep(self.config.settle_delay) => {}
                _ = cancel.cancelled() => return Ok(StopReason::Timeout),
            }
        }
    }

    async fn scroll_once(&self, session: &mut Session) -> Result<(), HarvestError> {
        let (width, height) = self.screen.bounds().await?;
        let gesture = self.config.scroll.gesture_for(width, height)?;

        if let Err(e) = self.screen.swipe(gesture).await {
            warn!("👆 Swipe dispatch failed: {}", e);
        }
        session.scroll_count += 1;
        debug!("👆 Scroll #{}: {:?}", session.scroll_count, gesture);
        Ok(())
    }
}

async fn cancel_at(deadline: Instant, cancel: CancellationToken) {
    tokio::select! {
        _ = sleep_until(deadline) => cancel.cancel(),
        _ = cancel.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::harvest::collaborators::{RecognizedPage, ScriptedScreen, ScriptedView};
    use crate::core::harvest::config::SwipeGesture;
    use crate::core::harvest::frame::Frame;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn controller_for(screen: &Arc<ScriptedScreen>, config: HarvestConfig) -> HarvestController {
        HarvestController::with_config(screen.clone(), screen.clone(), screen.clone(), config)
    }

    fn names(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_frame_script_collects_six_entries() {
        let last = ScriptedView::names(&["通讯录", "王五", "12:30", "赵六"]);
        let screen = Arc::new(ScriptedScreen::new(
            1080,
            2000,
            vec![
                ScriptedView::names(&["通讯录", "张三", "李四"]),
                ScriptedView::names(&["通讯录", "李四", "Alice", "Bob"]),
                last.clone(),
                last.clone(),
                last,
            ],
        ));

        let report = controller_for(&screen, HarvestConfig::default())
            .harvest_with_stats()
            .await;

        match &report.outcome {
            Outcome::Success(entries) => assert_eq!(
                names(entries),
                vec!["张三", "李四", "Alice", "Bob", "王五", "赵六"]
            ),
            other => panic!("expected success, got {:?}", other),
        }

        assert_eq!(report.stats.stop_reason, StopReason::Stable);
        assert_eq!(report.stats.iterations, 5);
        assert_eq!(report.stats.scroll_count, 4);
        assert_eq!(screen.swipes().len(), 4);
        assert_eq!(screen.captured_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_swipe_uses_screen_bounds() {
        let screen = Arc::new(ScriptedScreen::new(
            1080,
            2000,
            vec![
                ScriptedView::names(&["张三"]),
                ScriptedView::names(&["张三"]),
                ScriptedView::names(&["张三"]),
            ],
        ));

        controller_for(&screen, HarvestConfig::default()).harvest().await;

        let swipes = screen.swipes();
        assert_eq!(swipes.len(), 2);
        assert_eq!(
            swipes[0],
            SwipeGesture {
                start_x: 540,
                start_y: 1400,
                end_x: 540,
                end_y: 600,
                duration_ms: 300,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_captures_fail_is_empty() {
        let screen = Arc::new(ScriptedScreen::new(
            1080,
            2000,
            vec![ScriptedView::CaptureFails, ScriptedView::CaptureFails],
        ));

        let report = controller_for(&screen, HarvestConfig::default())
            .harvest_with_stats()
            .await;

        match report.outcome {
            Outcome::Empty { reason } => assert!(reason.contains("Capture failed")),
            other => panic!("expected empty, got {:?}", other),
        }
        assert_eq!(report.stats.stop_reason, StopReason::CaptureFailed);
        assert!(screen.swipes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_failure_keeps_partial_results() {
        let screen = Arc::new(ScriptedScreen::new(
            1080,
            2000,
            vec![
                ScriptedView::names(&["张三", "李四"]),
                ScriptedView::names(&["王五"]),
                ScriptedView::CaptureFails,
            ],
        ));

        let report = controller_for(&screen, HarvestConfig::default())
            .harvest_with_stats()
            .await;

        assert_eq!(
            report.outcome,
            Outcome::Success(vec![
                Entry::new("张三"),
                Entry::new("李四"),
                Entry::new("王五")
            ])
        );
        assert_eq!(report.stats.stop_reason, StopReason::CaptureFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recognition_failure_keeps_partial_results() {
        let screen = Arc::new(ScriptedScreen::new(
            1080,
            2000,
            vec![
                ScriptedView::names(&["张三"]),
                ScriptedView::RecognitionFails,
            ],
        ));

        let report = controller_for(&screen, HarvestConfig::default())
            .harvest_with_stats()
            .await;

        assert_eq!(report.outcome, Outcome::Success(vec![Entry::new("张三")]));
        assert_eq!(report.stats.stop_reason, StopReason::RecognitionFailed);
        assert_eq!(report.stats.scroll_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stable_screen_without_names_is_empty() {
        let noise = ScriptedView::names(&["通讯录", "12:30", "123456"]);
        let screen = Arc::new(ScriptedScreen::new(
            1080,
            2000,
            vec![noise.clone(), noise.clone(), noise],
        ));

        let outcome = controller_for(&screen, HarvestConfig::default())
            .harvest()
            .await;

        assert_eq!(
            outcome,
            Outcome::Empty {
                reason: "no entries found".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_shorter_than_iteration_times_out() {
        let screen = Arc::new(ScriptedScreen::new(
            1080,
            2000,
            vec![
                ScriptedView::names(&["张三", "李四"]),
                ScriptedView::names(&["王五"]),
            ],
        ));
        let config = HarvestConfig {
            overall_timeout: Duration::from_millis(100),
            ..Default::default()
        };

        let report = controller_for(&screen, config).harvest_with_stats().await;

        match report.outcome {
            Outcome::Timeout { partial } => {
                assert_eq!(names(&partial), vec!["张三", "李四"]);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(report.stats.stop_reason, StopReason::Timeout);
        assert_eq!(screen.captured_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_entries_is_still_timeout() {
        let screen = Arc::new(ScriptedScreen::new(
            1080,
            2000,
            vec![ScriptedView::names(&["设置"]), ScriptedView::names(&["搜索"])],
        ));
        let config = HarvestConfig {
            overall_timeout: Duration::from_millis(50),
            ..Default::default()
        };

        let outcome = controller_for(&screen, config).harvest().await;
        assert_eq!(outcome, Outcome::Timeout { partial: vec![] });
    }

    struct PanickingRecognizer;

    #[async_trait]
    impl TextRecognizer for PanickingRecognizer {
        async fn recognize(&self, _frame: &Frame) -> Result<RecognizedPage, HarvestError> {
            panic!("recognizer exploded");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_collaborator_panic_becomes_failure_outcome() {
        let screen = Arc::new(ScriptedScreen::new(
            1080,
            2000,
            vec![ScriptedView::names(&["张三"])],
        ));
        let controller =
            HarvestController::new(screen.clone(), Arc::new(PanickingRecognizer), screen.clone());

        let report = controller.harvest_with_stats().await;

        match report.outcome {
            Outcome::Empty { reason } => assert!(reason.contains("panicked")),
            other => panic!("expected empty, got {:?}", other),
        }
        assert_eq!(report.stats.stop_reason, StopReason::Fault);
    }

    struct ZeroSizedScreen;

    #[async_trait]
    impl ScreenDriver for ZeroSizedScreen {
        async fn bounds(&self) -> Result<(u32, u32), HarvestError> {
            Ok((0, 0))
        }

        async fn swipe(&self, _gesture: SwipeGesture) -> Result<(), HarvestError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_bounds_keeps_collected_entries() {
        let screen = Arc::new(ScriptedScreen::new(
            1080,
            2000,
            vec![ScriptedView::names(&["张三"]), ScriptedView::names(&["李四"])],
        ));
        let controller =
            HarvestController::new(screen.clone(), screen.clone(), Arc::new(ZeroSizedScreen));

        let report = controller.harvest_with_stats().await;

        assert_eq!(report.outcome, Outcome::Success(vec![Entry::new("张三")]));
        assert_eq!(report.stats.stop_reason, StopReason::ScrollFailed);
        assert_eq!(report.stats.scroll_count, 0);
        assert_eq!(screen.captured_count(), 1);
    }

    /// 第一次能取到尺寸，之后取尺寸失败
    struct FlakyBoundsScreen {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ScreenDriver for FlakyBoundsScreen {
        async fn bounds(&self) -> Result<(u32, u32), HarvestError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok((1080, 2000))
            } else {
                Err(HarvestError::Unexpected("screen size unavailable".to_string()))
            }
        }

        async fn swipe(&self, _gesture: SwipeGesture) -> Result<(), HarvestError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounds_failure_mid_run_keeps_partial_results() {
        let screen = Arc::new(ScriptedScreen::new(
            1080,
            2000,
            vec![
                ScriptedView::names(&["张三", "李四"]),
                ScriptedView::names(&["王五"]),
                ScriptedView::names(&["赵六"]),
            ],
        ));
        let controller = HarvestController::new(
            screen.clone(),
            screen.clone(),
            Arc::new(FlakyBoundsScreen {
                calls: AtomicU32::new(0),
            }),
        );

        let report = controller.harvest_with_stats().await;

        assert_eq!(
            report.outcome,
            Outcome::Success(vec![
                Entry::new("张三"),
                Entry::new("李四"),
                Entry::new("王五")
            ])
        );
        assert_eq!(report.stats.stop_reason, StopReason::ScrollFailed);
        assert_eq!(report.stats.scroll_count, 1);
        assert_eq!(report.stats.iterations, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounds_failure_before_any_entry_is_empty() {
        let screen = Arc::new(ScriptedScreen::new(
            1080,
            2000,
            vec![ScriptedView::names(&["通讯录"])],
        ));
        let controller =
            HarvestController::new(screen.clone(), screen.clone(), Arc::new(ZeroSizedScreen));

        match controller.harvest().await {
            Outcome::Empty { reason } => assert!(reason.contains("Invalid screen bounds")),
            other => panic!("expected empty, got {:?}", other),
        }
    }

    /// 尺寸正常，但手势始终派发失败
    struct RejectingSwipeScreen {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl ScreenDriver for RejectingSwipeScreen {
        async fn bounds(&self) -> Result<(u32, u32), HarvestError> {
            Ok((1080, 2000))
        }

        async fn swipe(&self, _gesture: SwipeGesture) -> Result<(), HarvestError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(HarvestError::Unexpected("gesture was not dispatched".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_swipe_does_not_stop_the_loop() {
        let screen = Arc::new(ScriptedScreen::new(
            1080,
            2000,
            vec![
                ScriptedView::names(&["张三"]),
                ScriptedView::names(&["张三"]),
                ScriptedView::names(&["张三"]),
            ],
        ));
        let driver = Arc::new(RejectingSwipeScreen {
            attempts: AtomicU32::new(0),
        });
        let controller = HarvestController::new(screen.clone(), screen.clone(), driver.clone());

        let report = controller.harvest_with_stats().await;

        assert_eq!(report.outcome, Outcome::Success(vec![Entry::new("张三")]));
        assert_eq!(report.stats.stop_reason, StopReason::Stable);
        assert_eq!(report.stats.iterations, 3);
        assert_eq!(report.stats.scroll_count, 2);
        assert_eq!(driver.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_fails_before_capturing() {
        let screen = Arc::new(ScriptedScreen::new(
            1080,
            2000,
            vec![ScriptedView::names(&["张三"])],
        ));
        let mut config = HarvestConfig::default();
        config.scroll.scroll_ratio = 1.5;

        let report = controller_for(&screen, config).harvest_with_stats().await;

        match report.outcome {
            Outcome::Empty { reason } => assert!(reason.contains("scroll_ratio")),
            other => panic!("expected empty, got {:?}", other),
        }
        assert_eq!(report.stats.stop_reason, StopReason::Fault);
        assert_eq!(screen.captured_count(), 0);
        assert!(screen.swipes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_exits_when_token_dropped() {
        let started = Instant::now();
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();
        let watchdog = tokio::spawn(cancel_at(started + Duration::from_secs(120), cancel.clone()));

        drop(guard);
        watchdog.await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_cancels_at_deadline() {
        let started = Instant::now();
        let cancel = CancellationToken::new();

        cancel_at(started + Duration::from_millis(300), cancel.clone()).await;

        assert!(cancel.is_cancelled());
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
