//! Flag set model: named entries and bit decomposition

use serde::Serialize;
use std::fmt;

/// One named constant of a flag set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagEntry {
    pub name: String,
    pub value: i64,
    /// Set when `value` is a positive power of two
    pub bit: Option<u32>,
}

impl FlagEntry {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        let bit = (value > 0 && value.count_ones() == 1).then(|| value.trailing_zeros());
        Self {
            name: name.into(),
            value,
            bit,
        }
    }
}

/// Result of mapping an integer back onto flag entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decomposition<'a> {
    /// The value equals one entry verbatim
    Exact(&'a FlagEntry),
    /// One entry per set bit, ascending bit order
    Composite(Vec<&'a FlagEntry>),
    /// Some set bits have no entry; `resolved` holds the ones that do
    Unresolved {
        resolved: Vec<&'a FlagEntry>,
        missing_bits: Vec<u32>,
    },
}

impl<'a> Decomposition<'a> {
    pub fn is_resolved(&self) -> bool {
        match self {
            Decomposition::Exact(_) => true,
            Decomposition::Composite(entries) => !entries.is_empty(),
            Decomposition::Unresolved { .. } => false,
        }
    }

    pub fn entries(&self) -> Vec<&'a FlagEntry> {
        match self {
            Decomposition::Exact(entry) => vec![*entry],
            Decomposition::Composite(entries) => entries.clone(),
            Decomposition::Unresolved { resolved, .. } => resolved.clone(),
        }
    }

    /// Number of entries that the rendered text names
    pub fn entry_count(&self) -> usize {
        match self {
            Decomposition::Exact(_) => 1,
            Decomposition::Composite(entries) => entries.len(),
            Decomposition::Unresolved { resolved, .. } => resolved.len(),
        }
    }
}

/// Where a flag set was found in the input documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagSetIdentity {
    pub document: String,
    pub metadata_name: String,
    pub line: usize,
}

/// A named, ordered collection of flag entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagSet {
    name: String,
    /// Enclosing namespaces and types, outermost first
    path: Vec<String>,
    /// Enclosing types only, used for the default qualifier
    type_path: Vec<String>,
    metadata_name: String,
    entries: Vec<FlagEntry>,
    qualifier: String,
    has_flags_attribute: bool,
    identity: Option<FlagSetIdentity>,
}

impl FlagSet {
    /// Create a flag set without any enclosing scope
    ///
    /// Entries are taken as given; `build` is the validating constructor.
    pub fn new(name: impl Into<String>, entries: Vec<FlagEntry>) -> Self {
        let name = name.into();
        Self {
            qualifier: format!("{}.", name),
            metadata_name: name.clone(),
            name,
            path: Vec::new(),
            type_path: Vec::new(),
            entries,
            has_flags_attribute: false,
            identity: None,
        }
    }

    pub(crate) fn with_scope(
        mut self,
        path: Vec<String>,
        type_path: Vec<String>,
        metadata_name: String,
        has_flags_attribute: bool,
    ) -> Self {
        self.path = path;
        self.type_path = type_path;
        self.metadata_name = metadata_name;
        self.has_flags_attribute = has_flags_attribute;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[FlagEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enclosing namespaces and types, outermost first
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Enclosing scopes followed by the enum name
    pub fn full_path(&self) -> Vec<&str> {
        self.path
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.name.as_str()))
            .collect()
    }

    pub fn metadata_name(&self) -> &str {
        &self.metadata_name
    }

    pub fn has_flags_attribute(&self) -> bool {
        self.has_flags_attribute
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    pub fn set_qualifier(&mut self, qualifier: impl Into<String>) {
        self.qualifier = qualifier.into();
    }

    /// Containing types plus the enum name, e.g. `Outer.Flags.`
    pub fn type_qualifier(&self) -> String {
        let mut qualifier = String::new();
        for segment in &self.type_path {
            qualifier.push_str(segment);
            qualifier.push('.');
        }
        qualifier.push_str(&self.name);
        qualifier.push('.');
        qualifier
    }

    pub fn identity(&self) -> Option<&FlagSetIdentity> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, identity: FlagSetIdentity) {
        self.identity = Some(identity);
    }

    pub fn entry(&self, name: &str) -> Option<&FlagEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn zero_entry(&self) -> Option<&FlagEntry> {
        self.entries.iter().find(|e| e.value == 0)
    }

    pub fn has_zero_entry(&self) -> bool {
        self.zero_entry().is_some()
    }

    fn entry_for_bit(&self, bit: u32) -> Option<&FlagEntry> {
        self.entries.iter().find(|e| e.bit == Some(bit))
    }

    /// Element-for-element comparison of names and values
    pub fn compare_entries(&self, other: &FlagSet) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|(a, b)| a.name == b.name && a.value == b.value)
    }

    /// Map an integer onto entries; an exact value match wins over bit synthesis
    pub fn resolve(&self, number: i64) -> Decomposition<'_> {
        if let Some(entry) = self.entries.iter().find(|e| e.value == number) {
            return Decomposition::Exact(entry);
        }

        let bits = number as u64;
        let mut resolved = Vec::new();
        let mut missing_bits = Vec::new();
        for bit in 0..64u32 {
            if bits & (1u64 << bit) == 0 {
                continue;
            }
            match self.entry_for_bit(bit) {
                Some(entry) => resolved.push(entry),
                None => missing_bits.push(bit),
            }
        }

        if missing_bits.is_empty() && !resolved.is_empty() {
            Decomposition::Composite(resolved)
        } else {
            Decomposition::Unresolved {
                resolved,
                missing_bits,
            }
        }
    }

    /// Qualified names joined by ` | `
    pub fn render(&self, decomposition: &Decomposition<'_>) -> String {
        decomposition
            .entries()
            .iter()
            .map(|entry| format!("{}{}", self.qualifier, entry.name))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// `render(resolve(n))` together with the entry count, or `None` if unresolved
    pub fn resolve_text(&self, number: i64) -> Option<(String, usize)> {
        let decomposition = self.resolve(number);
        decomposition
            .is_resolved()
            .then(|| (self.render(&decomposition), decomposition.entry_count()))
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} entries)", self.metadata_name, self.entries.len())?;
        for entry in &self.entries {
            match entry.bit {
                Some(bit) => writeln!(f, "  {} = {} (bit {})", entry.name, entry.value, bit)?,
                None => writeln!(f, "  {} = {}", entry.name, entry.value)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag_type() -> FlagSet {
        FlagSet::new(
            "FlagType",
            vec![
                FlagEntry::new("NONE", 0),
                FlagEntry::new("A", 1),
                FlagEntry::new("B", 2),
                FlagEntry::new("C", 4),
            ],
        )
    }

    #[test]
    fn test_entry_bits() {
        assert_eq!(FlagEntry::new("NONE", 0).bit, None);
        assert_eq!(FlagEntry::new("A", 1).bit, Some(0));
        assert_eq!(FlagEntry::new("H", 128).bit, Some(7));
        assert_eq!(FlagEntry::new("AB", 3).bit, None);
    }

    #[test]
    fn test_resolve_composite_in_bit_order() {
        let set = flag_type();
        let decomposition = set.resolve(6);
        assert!(matches!(decomposition, Decomposition::Composite(ref e) if e.len() == 2));
        assert_eq!(set.render(&decomposition), "FlagType.B | FlagType.C");
    }

    #[test]
    fn test_zero_uses_exact_entry() {
        let set = flag_type();
        let decomposition = set.resolve(0);
        assert!(matches!(decomposition, Decomposition::Exact(e) if e.name == "NONE"));
        assert_eq!(set.render(&decomposition), "FlagType.NONE");
    }

    #[test]
    fn test_zero_without_zero_entry_is_unresolved() {
        let set = FlagSet::new("F", vec![FlagEntry::new("A", 1)]);
        let decomposition = set.resolve(0);
        assert!(!decomposition.is_resolved());
        assert_eq!(set.render(&decomposition), "");
    }

    #[test]
    fn test_exact_alias_wins_over_bits() {
        let mut entries = flag_type().entries().to_vec();
        entries.push(FlagEntry::new("AB", 3));
        let set = FlagSet::new("FlagType", entries);
        assert!(matches!(set.resolve(3), Decomposition::Exact(e) if e.name == "AB"));
    }

    #[test]
    fn test_missing_bit_keeps_partial_entries() {
        let set = FlagSet::new("F", vec![FlagEntry::new("A", 1), FlagEntry::new("B", 2)]);
        match set.resolve(5) {
            Decomposition::Unresolved {
                resolved,
                missing_bits,
            } => {
                assert_eq!(resolved.len(), 1);
                assert_eq!(resolved[0].name, "A");
                assert_eq!(missing_bits, vec![2]);
            }
            other => panic!("expected unresolved, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_set_resolves_nothing() {
        let set = FlagSet::new("F", Vec::new());
        assert!(!set.resolve(1).is_resolved());
        assert!(set.resolve_text(0).is_none());
    }

    #[test]
    fn test_qualifier() {
        let mut set = flag_type();
        set.set_qualifier("Outer.FlagType.");
        assert_eq!(set.resolve_text(1), Some(("Outer.FlagType.A".to_string(), 1)));
    }
}
