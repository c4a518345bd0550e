//! Reference table model
//!
//! A reference table holds every attribute bucket for one `(year, range)`
//! pair. The decoded document is a JSON object keyed by category code, each
//! value an object of named entries:
//!
//! ```json
//! { "3": { "红": { "type": "波色", "type_code": 3, "name": "红",
//!                  "content1": "01,02,07", "content2": "" } } }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;

use crate::errors::{AttrsError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Number range
// ─────────────────────────────────────────────────────────────────────────────

/// Size of the number universe for a draw type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum NumberRange {
    /// Numbers 01..=49
    #[default]
    R49,
    /// Numbers 01..=60
    R60,
}

impl NumberRange {
    /// Digits used in store keys ("49" / "60")
    pub fn digits(self) -> &'static str {
        match self {
            Self::R49 => "49",
            Self::R60 => "60",
        }
    }

    /// Largest number in the universe
    pub fn max_number(self) -> u32 {
        match self {
            Self::R49 => 49,
            Self::R60 => 60,
        }
    }

    /// Resolve a range selector: lottery kind ids `1`/`2` and `49` map to the
    /// 49-number universe, `3`/`4` and `60` to the 60-number universe.
    pub fn from_selector(selector: &str) -> Option<Self> {
        match selector.trim() {
            "1" | "2" | "49" => Some(Self::R49),
            "3" | "4" | "60" => Some(Self::R60),
            _ => None,
        }
    }
}

impl fmt::Display for NumberRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.digits())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Table key
// ─────────────────────────────────────────────────────────────────────────────

/// Composite key of one loaded reference table.
///
/// Renders as `"{year}{range}"`, e.g. `"202449"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey {
    pub year: i32,
    pub range: NumberRange,
}

impl TableKey {
    pub fn new(year: i32, range: NumberRange) -> Self {
        Self { year, range }
    }

    /// The four tables a year depends on: its own and the previous year's,
    /// for both ranges. At `i32::MIN` there is no previous year and the
    /// window repeats the year's own keys.
    pub fn window_for_year(year: i32) -> [TableKey; 4] {
        let previous = year.saturating_sub(1);
        [
            TableKey::new(year, NumberRange::R49),
            TableKey::new(previous, NumberRange::R60),
            TableKey::new(previous, NumberRange::R49),
            TableKey::new(year, NumberRange::R60),
        ]
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.year, self.range)
    }
}

impl FromStr for TableKey {
    type Err = AttrsError;

    fn from_str(s: &str) -> Result<Self> {
        let split = s
            .len()
            .checked_sub(2)
            .filter(|at| *at > 0 && s.is_char_boundary(*at))
            .ok_or_else(|| AttrsError::internal(format!("malformed table key: {s:?}")))?;
        let (year, range) = s.split_at(split);
        let year = year
            .parse::<i32>()
            .map_err(|_| AttrsError::internal(format!("malformed table key year: {s:?}")))?;
        let range = match range {
            "49" => NumberRange::R49,
            "60" => NumberRange::R60,
            _ => {
                return Err(AttrsError::internal(format!(
                    "malformed table key range: {s:?}"
                )));
            }
        };
        Ok(Self { year, range })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Categories
// ─────────────────────────────────────────────────────────────────────────────

/// Category code identifying one classification dimension in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeCode {
    Zodiac,
    Element,
    Color,
    SumParity,
    ZodiacAttribute,
    NumberAttribute,
}

impl TypeCode {
    /// Wire code of this category
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zodiac => "1",
            Self::Element => "2",
            Self::Color => "3",
            Self::SumParity => "4",
            Self::ZodiacAttribute => "5",
            Self::NumberAttribute => "11",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "1" => Some(Self::Zodiac),
            "2" => Some(Self::Element),
            "3" => Some(Self::Color),
            "4" => Some(Self::SumParity),
            "5" => Some(Self::ZodiacAttribute),
            "11" => Some(Self::NumberAttribute),
            _ => None,
        }
    }
}

/// Attribute category as recorded in an entry's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// 波色
    Color,
    /// 生肖对应号码
    Zodiac,
    /// 五行对照
    Element,
    /// 合数单双
    SumParity,
    /// 生肖属性
    ZodiacAttribute,
    /// 号码属性
    NumberAttribute,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Color,
        Category::Zodiac,
        Category::Element,
        Category::SumParity,
        Category::ZodiacAttribute,
        Category::NumberAttribute,
    ];

    /// Name used in the reference data
    pub fn label(self) -> &'static str {
        match self {
            Self::Color => "波色",
            Self::Zodiac => "生肖对应号码",
            Self::Element => "五行对照",
            Self::SumParity => "合数单双",
            Self::ZodiacAttribute => "生肖属性",
            Self::NumberAttribute => "号码属性",
        }
    }

    pub fn type_code(self) -> TypeCode {
        match self {
            Self::Color => TypeCode::Color,
            Self::Zodiac => TypeCode::Zodiac,
            Self::Element => TypeCode::Element,
            Self::SumParity => TypeCode::SumParity,
            Self::ZodiacAttribute => TypeCode::ZodiacAttribute,
            Self::NumberAttribute => TypeCode::NumberAttribute,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entries
// ─────────────────────────────────────────────────────────────────────────────

/// One row of a reference table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeEntry {
    pub id: i64,
    pub range: Option<NumberRange>,
    pub year: i32,
    /// Recorded category name (the `type` field)
    pub category: String,
    pub type_code: String,
    pub name: String,
    /// Zero-padded member numbers, in document order
    pub members: Vec<String>,
    /// Secondary content (`content2`)
    pub secondary: String,
}

impl AttributeEntry {
    /// Build an entry from its category, name and comma-separated members.
    pub fn new(category: Category, name: impl Into<String>, members: &str) -> Self {
        Self {
            id: 0,
            range: None,
            year: 0,
            category: category.label().to_string(),
            type_code: category.type_code().as_str().to_string(),
            name: name.into(),
            members: split_members(members),
            secondary: String::new(),
        }
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary = secondary.into();
        self
    }

    pub fn contains(&self, number: &str) -> bool {
        self.members.iter().any(|m| m == number)
    }
}

fn split_members(content: &str) -> Vec<String> {
    content
        .split(',')
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// Wire representation of an entry; numeric fields may arrive as strings.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default, deserialize_with = "lenient_i64")]
    id: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    number_type: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    year: i64,
    #[serde(default, rename = "type")]
    category: String,
    #[serde(default, deserialize_with = "lenient_string")]
    type_code: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    content1: String,
    #[serde(default)]
    content2: String,
}

impl From<RawEntry> for AttributeEntry {
    fn from(raw: RawEntry) -> Self {
        Self {
            id: raw.id,
            range: NumberRange::from_selector(&raw.number_type),
            year: i32::try_from(raw.year).unwrap_or_default(),
            category: raw.category,
            type_code: raw.type_code,
            name: raw.name,
            members: split_members(&raw.content1),
            secondary: raw.content2,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Int(i64),
    Float(f64),
    Null,
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Str(s) => s,
        StringOrNumber::Int(i) => i.to_string(),
        StringOrNumber::Float(f) => f.to_string(),
        StringOrNumber::Null => String::new(),
    })
}

pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Str(s) => s.trim().parse().unwrap_or_default(),
        StringOrNumber::Int(i) => i,
        StringOrNumber::Float(f) => f as i64,
        StringOrNumber::Null => 0,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tables
// ─────────────────────────────────────────────────────────────────────────────

/// Named entries under one category code, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryBucket {
    entries: Vec<(String, AttributeEntry)>,
    by_name: HashMap<String, usize>,
}

impl CategoryBucket {
    /// Insert or replace an entry under `key`, keeping its original position.
    pub fn insert(&mut self, key: impl Into<String>, entry: AttributeEntry) {
        let key = key.into();
        match self.by_name.get(&key) {
            Some(&index) => self.entries[index].1 = entry,
            None => {
                self.by_name.insert(key.clone(), self.entries.len());
                self.entries.push((key, entry));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttributeEntry> {
        self.by_name.get(key).map(|&index| &self.entries[index].1)
    }

    /// Entries with their keys, in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All attribute buckets for one `(year, range)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeTable {
    buckets: HashMap<TypeCode, CategoryBucket>,
}

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a decoded reference document.
    ///
    /// Unknown category codes are skipped; a document that is not an object
    /// of objects is a parse error.
    pub fn from_json(text: &str) -> Result<Self> {
        let document: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)
            .map_err(|e| AttrsError::parse_with_source("reference document is not an object", e))?;

        let mut table = Self::new();
        for (code, entries) in document {
            let Some(type_code) = TypeCode::from_code(&code) else {
                tracing::debug!(code = %code, "skipping unknown category code");
                continue;
            };
            let entries: serde_json::Map<String, serde_json::Value> =
                serde_json::from_value(entries).map_err(|e| {
                    AttrsError::parse_with_source(format!("category {code} is not an object"), e)
                })?;
            let bucket = table.buckets.entry(type_code).or_default();
            for (key, value) in entries {
                let raw: RawEntry = serde_json::from_value(value).map_err(|e| {
                    AttrsError::parse_with_source(format!("malformed entry {code}/{key}"), e)
                })?;
                bucket.insert(key, AttributeEntry::from(raw));
            }
        }
        Ok(table)
    }

    /// Add an entry keyed by its name under the category's code.
    pub fn insert(&mut self, category: Category, entry: AttributeEntry) {
        let key = entry.name.clone();
        self.insert_keyed(category.type_code(), key, entry);
    }

    /// Add an entry under an explicit code and key.
    pub fn insert_keyed(&mut self, code: TypeCode, key: impl Into<String>, entry: AttributeEntry) {
        self.buckets.entry(code).or_default().insert(key, entry);
    }

    pub fn bucket(&self, code: TypeCode) -> Option<&CategoryBucket> {
        self.buckets.get(&code)
    }

    /// Total number of entries across all categories
    pub fn len(&self) -> usize {
        self.buckets.values().map(CategoryBucket::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
