//! Identifier bindings produced by the locator

use super::oracle::TypeHandle;
use crate::syntax::tree::NodeId;
use std::collections::HashMap;

/// Static types of identifier nodes, resolved against their declaration scope
#[derive(Debug, Clone, Default)]
pub struct SemanticModel {
    identifier_types: HashMap<NodeId, TypeHandle>,
}

impl SemanticModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, node: NodeId, handle: TypeHandle) {
        self.identifier_types.insert(node, handle);
    }

    pub fn type_of(&self, node: NodeId) -> TypeHandle {
        self.identifier_types
            .get(&node)
            .copied()
            .unwrap_or(TypeHandle::Unknown)
    }

    pub fn is_flag_typed(&self, node: NodeId) -> bool {
        self.type_of(node) == TypeHandle::FlagSet
    }

    pub fn len(&self) -> usize {
        self.identifier_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifier_types.is_empty()
    }
}
