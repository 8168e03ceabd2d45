//! Localization seam.
//!
//! Drivers only ever produce canonical English phrases and hand them to the
//! injected [`Translator`]. A translator must never fail: when it has nothing
//! better it returns the text it was given.

use std::{collections::HashMap, fmt::Debug};

use serde::Deserialize;

pub trait Translator: Send + Sync + Debug {
    fn translate(&self, text: &str) -> String;
}

/// Returns every phrase unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTranslation;

impl Translator for NoTranslation {
    fn translate(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Exact-phrase lookup table.
///
/// ```toml
/// [phrases]
/// "Light Rain Shower" = "Aguaceiro fraco"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogTranslator {
    #[serde(default)]
    phrases: HashMap<String, String>,
}

impl CatalogTranslator {
    pub fn new(phrases: HashMap<String, String>) -> Self {
        Self { phrases }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

impl Translator for CatalogTranslator {
    fn translate(&self, text: &str) -> String {
        self.phrases.get(text).cloned().unwrap_or_else(|| text.to_string())
    }
}
