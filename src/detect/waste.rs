use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Disposal category derived from an object label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WasteType {
    Biodegradable,
    NonBiodegradable,
}

impl WasteType {
    /// Title used in history rows and badges.
    pub fn display_name(self) -> &'static str {
        match self {
            WasteType::Biodegradable => "Biodegradable",
            WasteType::NonBiodegradable => "Non-Biodegradable",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WasteType::Biodegradable => "biodegradable",
            WasteType::NonBiodegradable => "non-biodegradable",
        }
    }
}

impl fmt::Display for WasteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels the detector model is known to emit.
const BUILTIN_WASTE_TYPES: &[(&str, WasteType)] = &[
    ("bottle", WasteType::NonBiodegradable),
    ("carrybag", WasteType::NonBiodegradable),
    ("carry bag", WasteType::NonBiodegradable),
    ("carry_bag", WasteType::NonBiodegradable),
];

/// Label lookup. Keys are lowercase; unmapped labels are non-biodegradable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WasteTypeTable {
    entries: HashMap<String, WasteType>,
}

impl WasteTypeTable {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_WASTE_TYPES
                .iter()
                .map(|(label, waste_type)| (label.to_string(), *waste_type))
                .collect(),
        }
    }

    /// Extend or replace builtin entries.
    pub fn with_overrides<I, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (S, WasteType)>,
        S: AsRef<str>,
    {
        for (label, waste_type) in overrides {
            self.entries
                .insert(label.as_ref().trim().to_lowercase(), waste_type);
        }
        self
    }

    pub fn lookup(&self, label: &str) -> WasteType {
        self.entries
            .get(&label.to_lowercase())
            .copied()
            .unwrap_or(WasteType::NonBiodegradable)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for WasteTypeTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Lookup against the builtin table.
pub fn waste_type_for(label: &str) -> WasteType {
    static TABLE: OnceLock<WasteTypeTable> = OnceLock::new();
    TABLE.get_or_init(WasteTypeTable::builtin).lookup(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_label_defaults_to_non_biodegradable() {
        assert_eq!(waste_type_for("wrapper"), WasteType::NonBiodegradable);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(waste_type_for("Carry_Bag"), WasteType::NonBiodegradable);
        assert_eq!(waste_type_for("BOTTLE"), WasteType::NonBiodegradable);
    }

    #[test]
    fn overrides_extend_the_builtin_table() {
        let table = WasteTypeTable::builtin()
            .with_overrides([(" Banana_Peel ", WasteType::Biodegradable)]);
        assert_eq!(table.lookup("banana_peel"), WasteType::Biodegradable);
        assert_eq!(table.lookup("bottle"), WasteType::NonBiodegradable);
        assert_eq!(table.len(), BUILTIN_WASTE_TYPES.len() + 1);
    }

    #[test]
    fn serializes_with_wire_names() {
        let json = serde_json::to_string(&WasteType::NonBiodegradable).unwrap();
        assert_eq!(json, "\"non-biodegradable\"");
        let parsed: WasteType = serde_json::from_str("\"biodegradable\"").unwrap();
        assert_eq!(parsed, WasteType::Biodegradable);
    }
}
