//! Display helpers shared by chart and table layers

use chrono::{Datelike, NaiveDate};
use strum_macros::EnumIter;

use crate::dispatch::CategoryTag;
use crate::model::NumberRange;

const ZODIACS: [&str; 12] = [
    "鼠", "牛", "虎", "兔", "龙", "蛇", "马", "羊", "猴", "鸡", "狗", "猪",
];
const ELEMENTS: [&str; 5] = ["金", "木", "水", "火", "土"];
const COLORS: [&str; 3] = ["红", "绿", "蓝"];
const COLOR_PARITIES: [&str; 6] = ["红单", "红双", "绿单", "绿双", "蓝单", "蓝双"];

/// Axis values for a category tag, in display order.
///
/// The `num` selector and unknown tags give the raw numbers `01..=N`.
pub fn axis_labels(tag: &str, range: NumberRange) -> Vec<String> {
    let Some(tag) = CategoryTag::parse(tag) else {
        return numbered(1, range.max_number(), |n| format!("{n:02}"));
    };
    let wide = range == NumberRange::R60;
    match tag {
        CategoryTag::Animal => owned(&ZODIACS),
        CategoryTag::Wuxin => owned(&ELEMENTS),
        CategoryTag::Color => owned(&COLORS),
        CategoryTag::TenDigit => numbered(0, if wide { 6 } else { 4 }, |n| format!("{n}头")),
        CategoryTag::OnesDigit => numbered(0, 9, |n| format!("{n}尾")),
        CategoryTag::MergeType => numbered(1, if wide { 14 } else { 13 }, |n| format!("{n:02}合")),
        CategoryTag::SizeByNumber => owned(&["大", "小"]),
        CategoryTag::IsEven => owned(&["单", "双"]),
        CategoryTag::Door => numbered(1, if wide { 6 } else { 5 }, |n| format!("{n}门")),
        CategoryTag::Segment => numbered(1, if wide { 10 } else { 7 }, |n| format!("{n}段")),
        CategoryTag::ColorAndParity => owned(&COLOR_PARITIES),
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

fn numbered(first: u32, last: u32, render: impl Fn(u32) -> String) -> Vec<String> {
    (first..=last).map(render).collect()
}

/// Column title for a category tag
pub fn title(tag: CategoryTag) -> &'static str {
    match tag {
        CategoryTag::Animal => "生肖",
        CategoryTag::Wuxin => "五行",
        CategoryTag::Color => "波色",
        CategoryTag::TenDigit => "头数",
        CategoryTag::OnesDigit => "尾数",
        CategoryTag::MergeType => "合数",
        CategoryTag::SizeByNumber => "大小",
        CategoryTag::IsEven => "单双",
        CategoryTag::Door => "五门",
        CategoryTag::Segment => "七段",
        CategoryTag::ColorAndParity => "半波",
    }
}

fn css_color(color: &str) -> Option<&'static str> {
    match color {
        "红" => Some("red"),
        "绿" => Some("green"),
        "蓝" => Some("blue"),
        _ => None,
    }
}

/// CSS class for a wave color; anything unrecognized renders red.
pub fn color_class(color: &str) -> &'static str {
    css_color(color).unwrap_or("red")
}

/// CSS color name for a wave color, empty (with a warning) when unknown.
///
/// Used where a missing color must stay visible instead of turning red.
pub fn color_name(color: &str) -> &'static str {
    css_color(color).unwrap_or_else(|| {
        tracing::warn!(color, "undefined wave color");
        ""
    })
}

/// Draw product a history series belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum LotteryKind {
    Macau649,
    HongKong649,
    Macau60,
    HongKong60,
}

impl LotteryKind {
    /// Selector id used by the history API ("1".."4")
    pub fn id(self) -> u8 {
        match self {
            Self::Macau649 => 1,
            Self::HongKong649 => 2,
            Self::Macau60 => 3,
            Self::HongKong60 => 4,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim() {
            "1" => Some(Self::Macau649),
            "2" => Some(Self::HongKong649),
            "3" => Some(Self::Macau60),
            "4" => Some(Self::HongKong60),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Macau649 => "澳門六合彩",
            Self::HongKong649 => "香港六合彩",
            Self::Macau60 => "澳門六十彩",
            Self::HongKong60 => "香港六十彩",
        }
    }

    pub fn range(self) -> NumberRange {
        match self {
            Self::Macau649 | Self::HongKong649 => NumberRange::R49,
            Self::Macau60 | Self::HongKong60 => NumberRange::R60,
        }
    }
}

/// Chinese New Year (month, day) for the years the draw history covers.
fn new_year_day(year: i32) -> (u32, u32) {
    match year {
        2024 => (2, 10),
        2025 => (1, 29),
        2026 => (2, 17),
        2027 => (2, 6),
        2028 => (1, 26),
        2029 => (2, 13),
        2030 => (2, 3),
        2031 => (1, 23),
        2032 => (2, 11),
        2033 => (1, 31),
        2034 => (2, 19),
        2035 => (2, 8),
        2036 => (1, 28),
        _ => (2, 1),
    }
}

/// Lunar year a Gregorian date falls in: dates before that year's Chinese
/// New Year belong to the previous lunar year.
pub fn lunar_year(date: NaiveDate) -> i32 {
    let year = date.year();
    let (month, day) = new_year_day(year);
    if (date.month(), date.day()) < (month, day) {
        year - 1
    } else {
        year
    }
}
