//! Mapping Registry: a pre-validated, immutable lookup with two indices,
//! built once from configuration at startup (spec §4.4).

use std::collections::HashMap;

use crate::errors::BridgeError;
use crate::model::{ElementRef, Mapping, NodeRef};

/// Read-only after construction; no mutation path exists by design (spec §3
/// invariant).
pub struct MappingRegistry {
    by_node_ref: HashMap<NodeRef, usize>,
    by_element_ref: HashMap<ElementRef, usize>,
    mappings: Vec<Mapping>,
}

impl MappingRegistry {
    /// Validates that neither index has duplicate keys. The Type Codec's
    /// `ValueType::parse` already rejects unsupported value types before a
    /// `Mapping` can be constructed, so this constructor only needs to
    /// check the two uniqueness invariants.
    pub fn build(mappings: Vec<Mapping>) -> Result<Self, BridgeError> {
        let mut by_node_ref = HashMap::with_capacity(mappings.len());
        let mut by_element_ref = HashMap::with_capacity(mappings.len());

        for (idx, mapping) in mappings.iter().enumerate() {
            if by_node_ref
                .insert(mapping.node_ref.clone(), idx)
                .is_some()
            {
                return Err(BridgeError::Config(format!(
                    "duplicate mapping for node ref {}",
                    mapping.node_ref
                )));
            }
            if by_element_ref
                .insert(mapping.element_ref.clone(), idx)
                .is_some()
            {
                return Err(BridgeError::Config(format!(
                    "duplicate mapping for element ref {}",
                    mapping.element_ref
                )));
            }
        }

        Ok(Self {
            by_node_ref,
            by_element_ref,
            mappings,
        })
    }

    pub fn by_node_ref(&self, node_ref: &NodeRef) -> Option<&Mapping> {
        self.by_node_ref.get(node_ref).map(|idx| &self.mappings[*idx])
    }

    pub fn by_element_ref(&self, element_ref: &ElementRef) -> Option<&Mapping> {
        self.by_element_ref
            .get(element_ref)
            .map(|idx| &self.mappings[*idx])
    }

    pub fn all(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, ValueType, DEFAULT_QUEUE_SIZE, DEFAULT_SAMPLING_INTERVAL_MS};

    fn mapping(node_id: &str, id_short: &str) -> Mapping {
        Mapping {
            node_ref: NodeRef::new("plc1", node_id),
            element_ref: ElementRef::new("urn:sm", id_short),
            value_type: ValueType::Double,
            range: None,
            direction: Direction::Both,
            sampling_interval_ms: DEFAULT_SAMPLING_INTERVAL_MS,
            queue_size: DEFAULT_QUEUE_SIZE,
            nullable: false,
        }
    }

    #[test]
    fn builds_and_looks_up_both_indices() {
        let registry = MappingRegistry::build(vec![mapping("ns=2;s=Temperature", "Temperature")]).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry
            .by_node_ref(&NodeRef::new("plc1", "ns=2;s=Temperature"))
            .is_some());
        assert!(registry
            .by_element_ref(&ElementRef::new("urn:sm", "Temperature"))
            .is_some());
    }

    #[test]
    fn rejects_duplicate_node_ref() {
        let result = MappingRegistry::build(vec![
            mapping("ns=2;s=Temperature", "Temperature"),
            mapping("ns=2;s=Temperature", "OtherPath"),
        ]);
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[test]
    fn rejects_duplicate_element_ref() {
        let result = MappingRegistry::build(vec![
            mapping("ns=2;s=A", "Shared"),
            mapping("ns=2;s=B", "Shared"),
        ]);
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }
}
