//! 滚动采集引擎 - 从只能看到一屏的长列表（如通讯录）中收集全部条目
//!
//! 核心策略：
//! 1. 候选筛选 - 按长度、界面文案、时间日期、位置等规则过滤识别文字
//! 2. 去重累积 - 同名条目只收一次，保持发现顺序
//! 3. 到底判定 - 整屏文字连续 3 帧不变即停止滚动
//! 4. 全局超时 - 整个过程有时间上限，超时也保留已收集的条目

pub mod accumulator;
pub mod classifier;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame;
pub mod termination;

pub use accumulator::{Entry, EntryAccumulator};
pub use classifier::{BoundingBox, CandidateClassifier, Rule, TextRegion};
pub use collaborators::{
    FrameCapture, RecognizedPage, ScreenDriver, ScriptedScreen, ScriptedView, TextRecognizer,
};
pub use config::{ClassifierConfig, HarvestConfig, ScrollConfig, SwipeGesture};
pub use controller::{
    HarvestController, HarvestPhase, HarvestReport, HarvestStats, Outcome, StopReason,
};
pub use error::HarvestError;
pub use frame::{Frame, FrameInfo};
pub use termination::{frame_digest, TerminationDetector, TerminationSignal};
