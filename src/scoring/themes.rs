//! Theme membership table: which long-horizon themes a symbol belongs to.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

/// Mapping of theme name to member symbols, in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeTable {
    themes: Vec<(String, BTreeSet<String>)>,
}

impl ThemeTable {
    /// Build a table from `(theme, symbols)` pairs.
    pub fn from_pairs<'a, I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, S)>,
        S: IntoIterator<Item = &'a str>,
    {
        let themes = pairs
            .into_iter()
            .map(|(theme, symbols)| {
                let members = symbols.into_iter().map(|s| s.to_uppercase()).collect();
                (theme.to_string(), members)
            })
            .collect();
        Self { themes }
    }

    /// Load a table from a JSON object of `theme -> [symbols]`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read theme table {}", path.display()))?;
        let table: ThemeTable = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse theme table {}", path.display()))?;

        info!(path = %path.display(), themes = table.themes.len(), "Loaded theme table");
        Ok(table)
    }

    /// Themes containing `symbol`, in table order.
    pub fn themes_for(&self, symbol: &str) -> Vec<&str> {
        let symbol = symbol.to_uppercase();
        self.themes
            .iter()
            .filter(|(_, members)| members.contains(&symbol))
            .map(|(theme, _)| theme.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }
}

impl Serialize for ThemeTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.themes.iter().map(|(theme, members)| (theme, members)))
    }
}

impl<'de> Deserialize<'de> for ThemeTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = ThemeTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of theme -> [symbols]")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut themes: Vec<(String, BTreeSet<String>)> = Vec::new();
                while let Some((theme, members)) = map.next_entry::<String, Vec<String>>()? {
                    // Symbols are matched case-insensitively.
                    let members: BTreeSet<String> =
                        members.into_iter().map(|s| s.to_uppercase()).collect();
                    match themes.iter_mut().find(|(t, _)| *t == theme) {
                        Some((_, existing)) => *existing = members,
                        None => themes.push((theme, members)),
                    }
                }
                Ok(ThemeTable { themes })
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

impl Default for ThemeTable {
    fn default() -> Self {
        Self::from_pairs([
            ("quantum_computing", vec!["IONQ", "RGTI", "QUBT", "IBM", "GOOGL", "MSFT"]),
            ("ai_revolution", vec!["NVDA", "AMD", "MSFT", "GOOGL", "META", "PLTR", "AI", "UPST"]),
            ("clean_energy", vec!["ENPH", "SEDG", "RUN", "PLUG", "BLDP", "FCEL", "BE"]),
            ("space_economy", vec!["RKLB", "ASTR", "SPCE", "LMT", "NOC", "BA"]),
            ("biotech_breakthrough", vec!["MRNA", "BNTX", "CRSP", "EDIT", "NTLA", "BEAM"]),
            ("metaverse", vec!["META", "RBLX", "U", "NVDA", "MSFT", "AAPL"]),
            ("cybersecurity", vec!["CRWD", "ZS", "NET", "S", "PANW", "FTNT"]),
            ("fintech", vec!["SQ", "PYPL", "SOFI", "AFRM", "UPST", "COIN"]),
        ])
    }
}

/// "ai_revolution" -> "Ai Revolution"
pub fn display_theme(theme: &str) -> String {
    theme
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
