//! Building a `FlagSet` from declaration text

use super::flag_set::{FlagEntry, FlagSet};
use crate::analysis::constant_folding::{ConstantFolder, NameResolver};
use crate::error::{Error, Result};
use crate::syntax::outline::{metadata_name, EnumDecl, ScopeKind, ScopeSegment};
use crate::syntax::tree::{SyntaxTree, TypeRef};
use crate::syntax::parse_source;

/// Resolves references to members declared earlier in the same enum
struct MemberResolver<'a> {
    enum_name: &'a str,
    entries: &'a [FlagEntry],
}

impl<'a> NameResolver for MemberResolver<'a> {
    fn resolve_path(&self, path: &[&str]) -> Option<i64> {
        let (member, qualifier) = path.split_last()?;
        if let Some(owner) = qualifier.last() {
            if *owner != self.enum_name {
                return None;
            }
        }
        self.entries.iter().find(|e| e.name == *member).map(|e| e.value)
    }

    fn is_flag_type(&self, ty: &TypeRef) -> bool {
        ty.last_segment() == self.enum_name
    }
}

impl FlagSet {
    /// Parse declaration text and build a flag set from its first enum
    pub fn build(declaration: &str) -> Result<FlagSet> {
        let file = parse_source(declaration)?;
        let enums = file.enums();
        let (scope, decl) = enums.first().ok_or(Error::NoFlagSet)?;
        let flag_set = Self::from_declaration(&file.tree, decl, scope)?;
        log::debug!(
            "Built flag set {} with {} entries",
            flag_set.metadata_name(),
            flag_set.len()
        );
        Ok(flag_set)
    }

    /// Build a flag set from a parsed enum declaration
    pub fn from_declaration(tree: &SyntaxTree, decl: &EnumDecl, scope: &[ScopeSegment]) -> Result<FlagSet> {
        if decl.members.is_empty() {
            return Err(Error::EmptyFlagSet {
                name: decl.name.clone(),
            });
        }

        let mut entries: Vec<FlagEntry> = Vec::with_capacity(decl.members.len());
        let mut next_value = 0i64;
        for member in &decl.members {
            if entries.iter().any(|e| e.name == member.name) {
                return Err(Error::invalid_entry(&member.name, "duplicate member name"));
            }

            let value = match member.value {
                Some(expr) => {
                    let resolver = MemberResolver {
                        enum_name: &decl.name,
                        entries: &entries,
                    };
                    ConstantFolder::evaluate(tree, expr, &resolver)
                        .and_then(|v| v.as_number())
                        .ok_or_else(|| {
                            Error::invalid_entry(
                                &member.name,
                                format!("`{}` is not a constant integer", tree.text(expr)),
                            )
                        })?
                }
                None => next_value,
            };

            if value < 0 {
                return Err(Error::invalid_entry(
                    &member.name,
                    format!("negative value {} is not supported", value),
                ));
            }
            if value == 0 && entries.iter().any(|e| e.value == 0) {
                return Err(Error::invalid_entry(&member.name, "only one zero-valued member is allowed"));
            }

            entries.push(FlagEntry::new(&member.name, value));
            next_value = value.wrapping_add(1);
        }

        let path = scope.iter().map(|s| s.name.clone()).collect();
        let type_path = scope
            .iter()
            .filter(|s| s.kind == ScopeKind::Type)
            .map(|s| s.name.clone())
            .collect();

        Ok(FlagSet::new(&decl.name, entries).with_scope(
            path,
            type_path,
            metadata_name(scope, &decl.name),
            decl.has_flags_attribute(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_values_follow_previous() {
        let set = FlagSet::build("enum E { A, B, C = 8, D }").unwrap();
        let values: Vec<i64> = set.entries().iter().map(|e| e.value).collect();
        assert_eq!(values, vec![0, 1, 8, 9]);
    }

    #[test]
    fn test_initialisers_reference_earlier_members() {
        let set = FlagSet::build("enum E { A = 1, B = 1 << 1, AB = A | B, C = E.B * 2 }").unwrap();
        assert_eq!(set.entry("AB").map(|e| e.value), Some(3));
        assert_eq!(set.entry("C").map(|e| e.value), Some(4));
    }

    #[test]
    fn test_nested_scope_and_qualifier() {
        let set = FlagSet::build(
            "namespace App { public class Outer { [Flags] public enum Mode { None = 0, A = 1 } } }",
        )
        .unwrap();
        assert_eq!(set.metadata_name(), "App.Outer+Mode");
        assert_eq!(set.type_qualifier(), "Outer.Mode.");
        assert_eq!(set.qualifier(), "Mode.");
        assert!(set.has_flags_attribute());
        assert_eq!(set.full_path(), vec!["App", "Outer", "Mode"]);
    }

    #[test]
    fn test_missing_enum() {
        assert_eq!(FlagSet::build("class C { }"), Err(Error::NoFlagSet));
    }

    #[test]
    fn test_empty_enum() {
        assert!(matches!(FlagSet::build("enum E { }"), Err(Error::EmptyFlagSet { .. })));
    }

    #[test]
    fn test_invalid_entries() {
        assert!(matches!(FlagSet::build("enum E { A = -1 }"), Err(Error::InvalidEntry { .. })));
        assert!(matches!(FlagSet::build("enum E { A = 1, A = 2 }"), Err(Error::InvalidEntry { .. })));
        assert!(matches!(FlagSet::build("enum E { A = 0, B = 0 }"), Err(Error::InvalidEntry { .. })));
        assert!(matches!(FlagSet::build("enum E { A = Foo() }"), Err(Error::InvalidEntry { .. })));
    }
}
