//! Declaration-level symbols gathered before any method body is walked

use crate::analysis::oracle::{classify_type, TypeHandle};
use crate::flags::FlagSet;
use crate::syntax::outline::Item;
use crate::syntax::SourceFile;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub params: Vec<TypeHandle>,
    pub returns: TypeHandle,
}

/// Fields, properties, methods and static classes of all input documents
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    globals: HashMap<String, TypeHandle>,
    methods: HashMap<String, Vec<MethodSignature>>,
    static_types: HashSet<String>,
}

impl SymbolTable {
    pub fn collect<'a>(files: impl IntoIterator<Item = &'a SourceFile>, flag_set: &FlagSet) -> Self {
        let mut table = Self::default();
        for file in files {
            table.collect_items(&file.items, flag_set);
        }
        log::debug!(
            "Collected {} globals, {} methods, {} static types",
            table.globals.len(),
            table.methods.len(),
            table.static_types.len()
        );
        table
    }

    fn collect_items(&mut self, items: &[Item], flag_set: &FlagSet) {
        for item in items {
            match item {
                Item::Namespace(ns) => self.collect_items(&ns.items, flag_set),
                Item::Type(ty) => {
                    if ty.is_static {
                        self.static_types.insert(ty.name.clone());
                    }
                    self.collect_items(&ty.items, flag_set);
                }
                Item::Field(field) => {
                    let handle = classify_type(&field.ty, flag_set);
                    for declarator in &field.declarators {
                        self.add_global(&declarator.name, handle);
                    }
                }
                Item::Property(property) => {
                    self.add_global(&property.name, classify_type(&property.ty, flag_set));
                }
                Item::Method(method) => {
                    let signature = MethodSignature {
                        params: method.params.iter().map(|p| classify_type(&p.ty, flag_set)).collect(),
                        returns: method
                            .return_type
                            .as_ref()
                            .map_or(TypeHandle::Unknown, |ty| classify_type(ty, flag_set)),
                    };
                    self.methods.entry(method.name.clone()).or_default().push(signature);
                }
                Item::Enum(_) => {}
            }
        }
    }

    /// A flag-typed declaration wins over a same-named one of another type
    fn add_global(&mut self, name: &str, handle: TypeHandle) {
        let slot = self.globals.entry(name.to_string()).or_insert(handle);
        if handle == TypeHandle::FlagSet {
            *slot = handle;
        }
    }

    pub fn global(&self, name: &str) -> Option<TypeHandle> {
        self.globals.get(name).copied()
    }

    pub fn returns_flag_set(&self, method: &str) -> bool {
        self.methods
            .get(method)
            .map_or(false, |overloads| overloads.iter().any(|s| s.returns == TypeHandle::FlagSet))
    }

    /// Whether any overload of `method` takes the flag set at `index`
    pub fn flag_parameter(&self, method: &str, index: usize) -> bool {
        self.methods.get(method).map_or(false, |overloads| {
            overloads
                .iter()
                .any(|s| s.params.get(index) == Some(&TypeHandle::FlagSet))
        })
    }

    pub fn is_static_type(&self, name: &str) -> bool {
        self.static_types.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_source;

    #[test]
    fn test_collects_flag_typed_members() {
        let flag_set = FlagSet::build("enum Mode { None = 0, Read = 1 }").unwrap();
        let file = parse_source(
            "static class Util { public static Mode Current; static int count; \
             static Mode Pick(int a, Mode m) { return m; } }",
        )
        .unwrap();
        let table = SymbolTable::collect([&file], &flag_set);
        assert_eq!(table.global("Current"), Some(TypeHandle::FlagSet));
        assert_eq!(table.global("count"), Some(TypeHandle::Integral));
        assert!(table.returns_flag_set("Pick"));
        assert!(table.flag_parameter("Pick", 1));
        assert!(!table.flag_parameter("Pick", 0));
        assert!(table.is_static_type("Util"));
    }
}
