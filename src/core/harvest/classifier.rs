//! 候选联系人判定
//!
//! 每条规则都是独立的谓词，全部通过才算候选。规则顺序只决定 `first_failed_rule`
//! 报告哪一条，不影响结果。

use super::accumulator::Entry;
use super::config::ClassifierConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// 识别出的文字区域的外接框（帧像素坐标）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// 坐标来自识别端，极端值下饱和而不溢出
    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_inverted(&self) -> bool {
        self.bottom < self.top || self.right < self.left
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRegion {
    pub text: String,
    pub bounding_box: BoundingBox,
}

impl TextRegion {
    pub fn new(text: impl Into<String>, bounding_box: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bounding_box,
        }
    }
}

/// 通讯录页面上固定出现的界面文案
static UI_LABELS: &[&str] = &[
    "微信",
    "通讯录",
    "发现",
    "设置",
    "搜索",
    "取消",
    "确定",
    "返回",
    "更多",
    "完成",
    "新的朋友",
    "仅聊天的朋友",
    "群聊",
    "标签",
    "公众号",
    "服务号",
    "订阅号",
    "朋友圈",
    "视频号",
    "添加朋友",
    "星标朋友",
    "我的企业",
    "企业微信联系人",
    "wechat",
    "chats",
    "contacts",
    "discover",
    "settings",
    "search",
    "cancel",
    "confirm",
    "new friends",
    "group chats",
    "tags",
    "official accounts",
];

static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}[:：]\d{2}$").unwrap());

static RELATIVE_DAY_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(昨天|前天|今天|星期[一二三四五六日天]|周[一二三四五六日天]|yesterday)\s*\d{1,2}[:：]\d{2}$")
        .unwrap()
});

static ABSOLUTE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}[-/.年]\d{1,2}[-/.月]\d{1,2}日?$").unwrap());

/// 判定失败的规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Length,
    UiLabel,
    AllDigits,
    ClockTime,
    RelativeDayTime,
    AbsoluteDate,
    /// 外接框上下或左右颠倒
    InvertedBox,
    BelowContentArea,
    OversizedHeight,
    NoReadableChar,
}

pub fn is_all_digits(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

pub fn is_clock_time(text: &str) -> bool {
    CLOCK_TIME.is_match(text)
}

pub fn is_relative_day_time(text: &str) -> bool {
    RELATIVE_DAY_TIME.is_match(text)
}

pub fn is_absolute_date(text: &str) -> bool {
    ABSOLUTE_DATE.is_match(text)
}

/// 粗略的 emoji 区段判断，只用于放行纯 emoji 昵称
pub fn is_pictographic(c: char) -> bool {
    matches!(
        c as u32,
        0x1F300..=0x1FAFF | 0x1F1E6..=0x1F1FF | 0x2600..=0x27BF
    )
}

/// 至少含一个字母/汉字；否则至少含一个 emoji
pub fn has_readable_char(text: &str) -> bool {
    text.chars().any(char::is_alphabetic) || text.chars().any(is_pictographic)
}

pub struct CandidateClassifier {
    config: ClassifierConfig,
    excluded: HashSet<String>,
}

impl CandidateClassifier {
    pub fn new() -> Self {
        Self::with_config(ClassifierConfig::default())
    }

    pub fn with_config(config: ClassifierConfig) -> Self {
        let excluded = UI_LABELS
            .iter()
            .map(|label| label.to_string())
            .chain(config.extra_excluded.iter().map(|l| l.trim().to_lowercase()))
            .collect();

        Self { config, excluded }
    }

    pub fn is_candidate(&self, region: &TextRegion, frame_width: u32, frame_height: u32) -> bool {
        self.first_failed_rule(region, frame_width, frame_height)
            .is_none()
    }

    /// 返回第一条不满足的规则，全部满足时返回 None
    pub fn first_failed_rule(
        &self,
        region: &TextRegion,
        _frame_width: u32,
        frame_height: u32,
    ) -> Option<Rule> {
        let text = region.text.trim();
        let bbox = &region.bounding_box;
        let frame_h = f64::from(frame_height);

        let char_count = text.chars().count();
        let checks = [
            (
                Rule::Length,
                (self.config.min_chars..=self.config.max_chars).contains(&char_count),
            ),
            (Rule::UiLabel, !self.excluded.contains(&text.to_lowercase())),
            (Rule::AllDigits, !is_all_digits(text)),
            (Rule::ClockTime, !is_clock_time(text)),
            (Rule::RelativeDayTime, !is_relative_day_time(text)),
            (Rule::AbsoluteDate, !is_absolute_date(text)),
            (Rule::InvertedBox, !bbox.is_inverted()),
            (
                Rule::BelowContentArea,
                f64::from(bbox.top) <= frame_h * self.config.max_top_ratio,
            ),
            (
                Rule::OversizedHeight,
                f64::from(bbox.height()) <= frame_h * self.config.max_height_ratio,
            ),
            (Rule::NoReadableChar, has_readable_char(text)),
        ];

        checks
            .into_iter()
            .find(|(_, passed)| !passed)
            .map(|(rule, _)| rule)
    }

    /// 过滤一帧的全部区域，返回按识别顺序排列的候选
    pub fn extract(&self, regions: &[TextRegion], frame_width: u32, frame_height: u32) -> Vec<Entry> {
        regions
            .iter()
            .filter(|region| self.is_candidate(region, frame_width, frame_height))
            .map(|region| Entry::new(region.text.as_str()))
            .collect()
    }
}

impl Default for CandidateClassifier {
    fn default() -> Self {
        Self::new()
    }
}
