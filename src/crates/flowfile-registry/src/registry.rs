//! The built-in node kind registry: a lookup from kind name to descriptor,
//! the table `GET /node_kinds` serializes for the UI (spec §4.2, §6).

use crate::descriptor::NodeDescriptor;
use crate::kinds::{aggregate, code, combine, input, output, transform};
use flowfile_types::{FlowfileError, NodeKind};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps kind names to their descriptor. Construction happens once at
/// startup via [`NodeRegistry::built_in`]; lookups are then read-only for
/// the lifetime of the process.
pub struct NodeRegistry {
    by_kind: HashMap<String, Arc<dyn NodeDescriptor>>,
}

impl NodeRegistry {
    /// Every node kind spec §4.2's table names, wired to its descriptor.
    pub fn built_in() -> Self {
        let descriptors: Vec<Arc<dyn NodeDescriptor>> = vec![
            Arc::new(input::ManualInputNode),
            Arc::new(input::ReadCsvNode),
            Arc::new(input::ReadParquetNode),
            Arc::new(input::ReadExcelNode),
            Arc::new(input::ReadJsonNode),
            Arc::new(input::CloudStorageReaderNode),
            Arc::new(input::DatabaseReaderNode),
            Arc::new(transform::SelectNode),
            Arc::new(transform::FilterNode),
            Arc::new(transform::SortNode),
            Arc::new(transform::UniqueNode),
            Arc::new(transform::HeadNode),
            Arc::new(transform::SampleNode),
            Arc::new(transform::RecordIdNode),
            Arc::new(transform::FormulaNode),
            Arc::new(aggregate::GroupByNode),
            Arc::new(aggregate::PivotNode),
            Arc::new(aggregate::UnpivotNode),
            Arc::new(combine::JoinNode),
            Arc::new(combine::CrossJoinNode),
            Arc::new(combine::UnionNode),
            Arc::new(output::OutputNode),
            Arc::new(output::CloudStorageWriterNode),
            Arc::new(output::DatabaseWriterNode),
            Arc::new(code::PolarsCodeNode),
        ];
        let mut by_kind = HashMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            by_kind.insert(descriptor.kind_name().to_string(), descriptor);
        }
        Self { by_kind }
    }

    pub fn get(&self, kind: &NodeKind) -> Result<&Arc<dyn NodeDescriptor>, FlowfileError> {
        self.by_kind
            .get(kind.as_str())
            .ok_or_else(|| FlowfileError::validation(format!("unknown node kind '{}'", kind.as_str())))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.by_kind.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::built_in()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_registers_every_spec_kind() {
        let registry = NodeRegistry::built_in();
        let expected = [
            "manual_input",
            "read_csv",
            "read_parquet",
            "read_excel",
            "read_json",
            "cloud_storage_reader",
            "database_reader",
            "select",
            "filter",
            "sort",
            "unique",
            "head",
            "sample",
            "record_id",
            "formula",
            "group_by",
            "pivot",
            "unpivot",
            "join",
            "cross_join",
            "union",
            "output",
            "cloud_storage_writer",
            "database_writer",
            "polars_code",
        ];
        for kind in expected {
            assert!(
                registry.get(&NodeKind::from(kind)).is_ok(),
                "missing descriptor for {kind}"
            );
        }
        assert_eq!(registry.len(), expected.len());
    }

    #[test]
    fn unknown_kind_is_a_validation_error() {
        let registry = NodeRegistry::built_in();
        let err = registry.get(&NodeKind::from("not_a_kind")).unwrap_err();
        assert!(matches!(err, FlowfileError::Validation { .. }));
    }
}
