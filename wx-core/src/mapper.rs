//! Lookup tables from provider condition codes to canonical icons and phrases.

use std::borrow::Cow;

use crate::translate::Translator;

/// Icon id used whenever a provider code is unknown.
pub const NOT_AVAILABLE: &str = "na";

type Pairs = &'static [(&'static str, &'static str)];

/// Day table plus night overrides.
///
/// A code missing from the night table falls back to its day entry.
#[derive(Debug, Clone, Copy)]
pub struct CodeTable {
    day: Pairs,
    night: Pairs,
}

impl CodeTable {
    pub const fn new(day: Pairs, night: Pairs) -> Self {
        Self { day, night }
    }

    pub fn lookup(&self, code: &str, is_daytime: bool) -> Option<&'static str> {
        if !is_daytime {
            if let Some(value) = find(self.night, code) {
                return Some(value);
            }
        }
        find(self.day, code)
    }

    /// Canonical icon id, `"na"` for anything unknown.
    pub fn icon(&self, code: &str, is_daytime: bool) -> &'static str {
        self.lookup(code, is_daytime).unwrap_or(NOT_AVAILABLE)
    }

    /// Canonical English phrase; unmapped text passes through unchanged.
    pub fn phrase<'a>(&self, text: &'a str, is_daytime: bool) -> Cow<'a, str> {
        match self.lookup(text, is_daytime) {
            Some(mapped) => Cow::Borrowed(mapped),
            None => Cow::Borrowed(text),
        }
    }

    /// Phrase rendered through the translator. Empty input stays empty.
    pub fn describe(&self, text: &str, is_daytime: bool, translator: &dyn Translator) -> String {
        if text.is_empty() {
            return String::new();
        }
        translator.translate(&self.phrase(text, is_daytime))
    }
}

fn find(pairs: Pairs, code: &str) -> Option<&'static str> {
    pairs.iter().find(|(key, _)| *key == code).map(|(_, value)| *value)
}

/// Severity ranking used to pick a representative condition for a day.
#[derive(Debug, Clone, Copy)]
pub struct PriorityTable(&'static [(&'static str, u8)]);

impl PriorityTable {
    pub const fn new(ranks: &'static [(&'static str, u8)]) -> Self {
        Self(ranks)
    }

    pub fn rank(&self, code: &str) -> Option<u8> {
        self.0.iter().find(|(key, _)| *key == code).map(|(_, rank)| *rank)
    }
}
