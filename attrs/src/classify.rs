//! Classification of draw numbers into attribute values
//!
//! Table-driven categories resolve through the reference store and are
//! memoized in the query cache; size, parity and digit categories are
//! closed-form and never touch either. Every function has a defined value
//! for every input, so nothing here returns an error.

use chrono::Datelike;

use crate::Engine;
use crate::cache::{ListKey, ListKind, QueryKey, QueryTag};
use crate::model::{AttributeEntry, AttributeTable, Category, NumberRange, TypeCode};
use crate::number::{pad_zero, positive_number};

pub const DEFAULT_COLOR: &str = "红";
pub const DEFAULT_ZODIAC: &str = "鼠";
pub const DEFAULT_ELEMENT: &str = "金";
pub const DEFAULT_SUM_PARITY: &str = "合数单";
pub const DEFAULT_DOOR: &str = "1门";
pub const DEFAULT_SEGMENT: &str = "1段";
pub const DEFAULT_COLOR_PARITY: &str = "红单";
pub const DEFAULT_SUM_VALUE: &str = "01合";

/// Qualifier some callers prefix zodiac names with ("肖鼠").
const ZODIAC_QUALIFIER: &str = "肖";

/// Current calendar year in local time
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

// ─────────────────────────────────────────────────────────────────────────────
// Closed-form categories
// ─────────────────────────────────────────────────────────────────────────────

/// 大 when the number is in the upper half of its range, else 小.
///
/// The threshold is 25 for the 49 range and 31 for the 60 range; invalid
/// input and numbers below 1 are 小.
pub fn size_by_number(number: impl ToString, range: NumberRange) -> &'static str {
    let Some(n) = positive_number(&number.to_string()) else {
        return "小";
    };
    let midpoint = match range {
        NumberRange::R49 => 25.0,
        NumberRange::R60 => 31.0,
    };
    if n >= midpoint { "大" } else { "小" }
}

/// 双 for even numbers, 单 for odd, invalid and sub-1 input.
pub fn parity(number: impl ToString) -> &'static str {
    match positive_number(&number.to_string()) {
        Some(n) if n % 2.0 == 0.0 => "双",
        _ => "单",
    }
}

/// Tens digit (`floor(n / 10)`), `None` for invalid or sub-1 input.
pub fn tens_digit(number: impl ToString) -> Option<u32> {
    positive_number(&number.to_string()).map(|n| (n / 10.0).floor() as u32)
}

/// Ones digit (`n mod 10`), `None` for invalid or sub-1 input.
pub fn ones_digit(number: impl ToString) -> Option<u32> {
    positive_number(&number.to_string()).map(|n| (n.trunc() as u64 % 10) as u32)
}

// ─────────────────────────────────────────────────────────────────────────────
// Table scans
// ─────────────────────────────────────────────────────────────────────────────

/// First entry under `code` whose key passes `filter` and lists `number`.
fn scan<'t>(
    table: &'t AttributeTable,
    code: TypeCode,
    number: &str,
    filter: impl Fn(&str, &AttributeEntry) -> bool,
) -> Option<&'t AttributeEntry> {
    table
        .bucket(code)?
        .iter()
        .find(|&(key, entry)| filter(key, entry) && entry.contains(number))
        .map(|(_, entry)| entry)
}

fn is_sum_value_band(key: &str) -> bool {
    key.contains('合') && !key.contains("合数") && !key.contains("合尾")
}

fn segment_prefix(range: NumberRange) -> &'static str {
    match range {
        NumberRange::R49 => "7段",
        NumberRange::R60 => "10段",
    }
}

fn strip_zodiac_qualifier(zodiac: &str) -> String {
    zodiac.replacen(ZODIAC_QUALIFIER, "", 1)
}

impl Engine {
    /// Raw table lookup: display name of the first entry of `category` that
    /// lists `number`, or an empty string.
    pub fn classify_by_category(
        &self,
        number: impl ToString,
        category: Category,
        range: NumberRange,
        year: i32,
    ) -> String {
        let raw = number.to_string();
        let Some(padded) = pad_zero(&raw) else {
            return String::new();
        };
        let key = QueryKey::new(raw, QueryTag::Lookup(category), range, year);
        self.inner.cache.attribute_or_insert_with(key, || {
            let table = self.inner.store.table(range, year);
            scan(&table, category.type_code(), &padded, |_, entry| {
                entry.category == category.label()
            })
            .map(|entry| entry.name.clone())
            .unwrap_or_default()
        })
    }

    /// Lookup with a fallback, cached under its own tag.
    fn lookup_or(
        &self,
        raw: String,
        tag: QueryTag,
        category: Category,
        range: NumberRange,
        year: i32,
        default: &str,
    ) -> String {
        let key = QueryKey::new(raw.clone(), tag, range, year);
        self.inner.cache.attribute_or_insert_with(key, || {
            let found = self.classify_by_category(raw, category, range, year);
            if found.is_empty() {
                default.to_string()
            } else {
                found
            }
        })
    }

    /// Scan the composite (code 11) bucket, cached under `tag`.
    fn number_attribute_or(
        &self,
        raw: String,
        tag: QueryTag,
        range: NumberRange,
        year: i32,
        default: &str,
        resolve: impl FnOnce(&AttributeTable, &str) -> Option<String>,
    ) -> String {
        let key = QueryKey::new(raw.clone(), tag, range, year);
        self.inner.cache.attribute_or_insert_with(key, || {
            let Some(padded) = pad_zero(&raw) else {
                return default.to_string();
            };
            let table = self.inner.store.table(range, year);
            resolve(&table, &padded).unwrap_or_else(|| default.to_string())
        })
    }

    /// Wave color (波色); 红 on a miss and for any year after the current one.
    pub fn color(&self, number: impl ToString, range: NumberRange, year: i32) -> String {
        if year > current_year() {
            return DEFAULT_COLOR.to_string();
        }
        self.lookup_or(
            number.to_string(),
            QueryTag::Color,
            Category::Color,
            range,
            year,
            DEFAULT_COLOR,
        )
    }

    /// Zodiac animal (生肖对应号码); 鼠 on a miss.
    pub fn zodiac(&self, number: impl ToString, range: NumberRange, year: i32) -> String {
        self.lookup_or(
            number.to_string(),
            QueryTag::Zodiac,
            Category::Zodiac,
            range,
            year,
            DEFAULT_ZODIAC,
        )
    }

    /// Five-element attribute (五行对照); 金 on a miss.
    pub fn element(&self, number: impl ToString, range: NumberRange, year: i32) -> String {
        self.lookup_or(
            number.to_string(),
            QueryTag::Element,
            Category::Element,
            range,
            year,
            DEFAULT_ELEMENT,
        )
    }

    /// Digit-sum parity (合数单双); 合数单 on a miss.
    pub fn sum_parity(&self, number: impl ToString, range: NumberRange, year: i32) -> String {
        self.lookup_or(
            number.to_string(),
            QueryTag::SumParity,
            Category::SumParity,
            range,
            year,
            DEFAULT_SUM_PARITY,
        )
    }

    /// Door band (1门..); 1门 on a miss.
    pub fn door(&self, number: impl ToString, range: NumberRange, year: i32) -> String {
        self.number_attribute_or(
            number.to_string(),
            QueryTag::Door,
            range,
            year,
            DEFAULT_DOOR,
            |table, padded| {
                scan(table, TypeCode::NumberAttribute, padded, |key, _| {
                    key.contains('门')
                })
                .map(|entry| entry.name.clone())
            },
        )
    }

    /// Segment band; entries are named `7段N` (49) or `10段N` (60) and the
    /// result is `N段`. 1段 on a miss.
    pub fn segment(&self, number: impl ToString, range: NumberRange, year: i32) -> String {
        let prefix = segment_prefix(range);
        self.number_attribute_or(
            number.to_string(),
            QueryTag::Segment,
            range,
            year,
            DEFAULT_SEGMENT,
            |table, padded| {
                scan(table, TypeCode::NumberAttribute, padded, |key, _| {
                    key.starts_with(prefix)
                })
                .map(|entry| {
                    let suffix: String =
                        entry.name.chars().skip(prefix.chars().count()).collect();
                    format!("{suffix}段")
                })
            },
        )
    }

    /// Color and parity combined (红单, 蓝双, ..); 红单 on a miss.
    pub fn color_parity(&self, number: impl ToString, range: NumberRange, year: i32) -> String {
        let raw = number.to_string();
        let wanted = format!("{}{}", self.color(&raw, range, year), parity(&raw));
        self.number_attribute_or(
            raw,
            QueryTag::ColorParity,
            range,
            year,
            DEFAULT_COLOR_PARITY,
            |table, padded| {
                scan(table, TypeCode::NumberAttribute, padded, |key, _| {
                    key == wanted
                })
                .map(|entry| entry.name.clone())
            },
        )
    }

    /// Digit-sum value band (01合..14合); 01合 on a miss.
    pub fn sum_value(&self, number: impl ToString, range: NumberRange, year: i32) -> String {
        self.number_attribute_or(
            number.to_string(),
            QueryTag::SumValue,
            range,
            year,
            DEFAULT_SUM_VALUE,
            |table, padded| {
                scan(table, TypeCode::NumberAttribute, padded, |key, _| {
                    is_sum_value_band(key)
                })
                .map(|entry| entry.name.clone())
            },
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived sets
    // ─────────────────────────────────────────────────────────────────────────

    /// Member numbers of a color, in table order; empty when unknown.
    pub fn numbers_in_color(&self, color: &str, range: NumberRange, year: i32) -> Vec<String> {
        let key = ListKey::new(ListKind::Color, color, range, year);
        self.inner.cache.list_or_insert_with(key, || {
            self.inner
                .store
                .table(range, year)
                .bucket(TypeCode::Color)
                .and_then(|bucket| bucket.get(color))
                .map(|entry| entry.members.clone())
                .unwrap_or_default()
        })
    }

    /// Member numbers of a zodiac animal; accepts the qualified form (肖鼠).
    pub fn numbers_in_zodiac(&self, zodiac: &str, range: NumberRange, year: i32) -> Vec<String> {
        let name = strip_zodiac_qualifier(zodiac);
        let key = ListKey::new(ListKind::Zodiac, zodiac, range, year);
        self.inner.cache.list_or_insert_with(key, || {
            self.inner
                .store
                .table(range, year)
                .bucket(TypeCode::Zodiac)
                .and_then(|bucket| bucket.get(&name))
                .map(|entry| entry.members.clone())
                .unwrap_or_default()
        })
    }

    /// Secondary content recorded on a zodiac entry; empty when unknown.
    pub fn zodiac_pair_value(&self, zodiac: &str, range: NumberRange, year: i32) -> String {
        let name = strip_zodiac_qualifier(zodiac);
        let key = QueryKey::new(zodiac, QueryTag::ZodiacPair, range, year);
        self.inner.cache.attribute_or_insert_with(key, || {
            self.inner
                .store
                .table(range, year)
                .bucket(TypeCode::Zodiac)
                .and_then(|bucket| bucket.get(&name))
                .map(|entry| entry.secondary.clone())
                .unwrap_or_default()
        })
    }

    pub fn is_matching_color(
        &self,
        number: impl ToString,
        color: &str,
        range: NumberRange,
        year: i32,
    ) -> bool {
        self.color(number, range, year) == color
    }

    /// Compares against the unqualified zodiac name.
    pub fn is_matching_zodiac(
        &self,
        number: impl ToString,
        zodiac: &str,
        range: NumberRange,
        year: i32,
    ) -> bool {
        strip_zodiac_qualifier(&self.zodiac(number, range, year)) == zodiac
    }
}
