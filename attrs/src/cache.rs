//! Query cache for classification results
//!
//! Read-through memoization of per-number classifications and derived
//! number lists. The whole cache is dropped whenever a reference table is
//! stored; there is no TTL and no size bound, the key space is finite.
//!
//! A generation counter guards the read-through path: a value computed
//! while a clear happened is returned to its caller but never inserted.

// RwLock poisoning is exceptional (requires panic in critical section) - allow expect for internal locks
#![allow(clippy::expect_used)]

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use crate::model::{Category, NumberRange};

/// What a cached classification answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryTag {
    /// Raw table lookup for a category (empty string on miss)
    Lookup(Category),
    Color,
    Zodiac,
    Element,
    SumParity,
    Door,
    Segment,
    ColorParity,
    SumValue,
    /// Secondary content of a zodiac entry; `number` holds the zodiac name
    ZodiacPair,
}

impl QueryTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lookup(category) => category.label(),
            Self::Color => "color",
            Self::Zodiac => "zodiac",
            Self::Element => "element",
            Self::SumParity => "sumParity",
            Self::Door => "door",
            Self::Segment => "segment",
            Self::ColorParity => "colorParity",
            Self::SumValue => "sumValue",
            Self::ZodiacPair => "pair",
        }
    }
}

/// Key of one cached classification.
///
/// Renders as `"{number}:{category}:{range}:{year}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub number: String,
    pub tag: QueryTag,
    pub range: NumberRange,
    pub year: i32,
}

impl QueryKey {
    pub fn new(number: impl Into<String>, tag: QueryTag, range: NumberRange, year: i32) -> Self {
        Self {
            number: number.into(),
            tag,
            range,
            year,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag {
            QueryTag::ZodiacPair => {
                write!(f, "pair:{}:{}:{}", self.number, self.range, self.year)
            }
            tag => write!(
                f,
                "{}:{}:{}:{}",
                self.number,
                tag.as_str(),
                self.range,
                self.year
            ),
        }
    }
}

/// Which derived number list a [`ListKey`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Color,
    Zodiac,
}

/// Key of one cached number list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListKey {
    pub kind: ListKind,
    pub selector: String,
    pub range: NumberRange,
    pub year: i32,
}

impl ListKey {
    pub fn new(kind: ListKind, selector: impl Into<String>, range: NumberRange, year: i32) -> Self {
        Self {
            kind,
            selector: selector.into(),
            range,
            year,
        }
    }
}

impl fmt::Display for ListKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ListKind::Color => write!(f, "numbers:{}:{}:{}", self.selector, self.range, self.year),
            ListKind::Zodiac => write!(
                f,
                "numbers:zodiac:{}:{}:{}",
                self.selector, self.range, self.year
            ),
        }
    }
}

/// Snapshot of cache occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub attributes: usize,
    pub lists: usize,
    /// Number of clears since creation
    pub generation: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    generation: u64,
    attributes: HashMap<QueryKey, String>,
    lists: HashMap<ListKey, Vec<String>>,
}

/// Shared memoization layer for classification queries.
#[derive(Debug, Default)]
pub struct QueryCache {
    inner: RwLock<CacheInner>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached classification for `key`, computing it on a miss.
    pub fn attribute_or_insert_with(&self, key: QueryKey, compute: impl FnOnce() -> String) -> String {
        let generation = {
            let inner = self.inner.read().expect("lock");
            if let Some(hit) = inner.attributes.get(&key) {
                return hit.clone();
            }
            inner.generation
        };

        let value = compute();

        let mut inner = self.inner.write().expect("lock");
        if inner.generation == generation {
            inner.attributes.insert(key, value.clone());
        }
        value
    }

    /// Return a copy of the cached list for `key`, computing it on a miss.
    ///
    /// Callers always receive their own `Vec`; the cached one is never lent out.
    pub fn list_or_insert_with(
        &self,
        key: ListKey,
        compute: impl FnOnce() -> Vec<String>,
    ) -> Vec<String> {
        let generation = {
            let inner = self.inner.read().expect("lock");
            if let Some(hit) = inner.lists.get(&key) {
                return hit.clone();
            }
            inner.generation
        };

        let value = compute();

        let mut inner = self.inner.write().expect("lock");
        if inner.generation == generation {
            inner.lists.insert(key, value.clone());
        }
        value
    }

    /// Drop every cached value.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("lock");
        inner.attributes.clear();
        inner.lists.clear();
        inner.generation += 1;
        tracing::debug!(generation = inner.generation, "attribute cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read().expect("lock");
        CacheStats {
            attributes: inner.attributes.len(),
            lists: inner.lists.len(),
            generation: inner.generation,
        }
    }
}
