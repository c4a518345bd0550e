//! Tag-based dispatch over the classifiers
//!
//! Chart and table layers name categories with free-form tags taken from
//! their own configuration. Strings are parsed into [`CategoryTag`] at the
//! boundary; past that point dispatch is an exhaustive match.

use strum_macros::{AsRefStr, EnumIter, EnumString, IntoStaticStr};

use crate::Engine;
use crate::classify::{ones_digit, parity, size_by_number, tens_digit};
use crate::model::NumberRange;

/// Result for tags that do not name a category and digits without a value.
pub const UNKNOWN: &str = "未知";

/// Category a caller can ask [`Engine::classify`] for.
///
/// Enum order is the presentation order used by chart selectors.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "camelCase")]
pub enum CategoryTag {
    Animal,
    Wuxin,
    Color,
    TenDigit,
    OnesDigit,
    MergeType,
    SizeByNumber,
    IsEven,
    Door,
    Segment,
    ColorAndParity,
}

impl CategoryTag {
    /// Tag as written in caller configuration ("tenDigit")
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn parse(value: &str) -> Option<Self> {
        value.trim().parse().ok()
    }
}

impl Engine {
    /// Classify `number` along the category named by `tag`.
    pub fn classify(
        &self,
        tag: CategoryTag,
        number: impl ToString,
        range: NumberRange,
        year: i32,
    ) -> String {
        let number = number.to_string();
        match tag {
            CategoryTag::Animal => self.zodiac(number, range, year),
            CategoryTag::Wuxin => self.element(number, range, year),
            CategoryTag::Color => self.color(number, range, year),
            CategoryTag::TenDigit => tens_digit(&number)
                .map(|d| format!("{d}头"))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            CategoryTag::OnesDigit => ones_digit(&number)
                .map(|d| format!("{d}尾"))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            CategoryTag::MergeType => self.sum_value(number, range, year),
            CategoryTag::SizeByNumber => size_by_number(&number, range).to_string(),
            CategoryTag::IsEven => parity(&number).to_string(),
            CategoryTag::Door => self.door(number, range, year),
            CategoryTag::Segment => self.segment(number, range, year),
            CategoryTag::ColorAndParity => self.color_parity(number, range, year),
        }
    }

    /// Same as [`Engine::classify`] for a free-form tag; unknown tags yield
    /// [`UNKNOWN`].
    pub fn classify_tag(
        &self,
        tag: &str,
        number: impl ToString,
        range: NumberRange,
        year: i32,
    ) -> String {
        match CategoryTag::parse(tag) {
            Some(tag) => self.classify(tag, number, range, year),
            None => {
                tracing::debug!(tag, "unknown category tag");
                UNKNOWN.to_string()
            }
        }
    }
}
