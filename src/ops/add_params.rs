//! ops::add_params
//!
//! Document-scoped operation creating parameters a document lacks.

use crate::core::params::ParamSpec;
use crate::doc::{DocError, Document};
use crate::engine::group::SharedContext;
use crate::engine::log::{LogEntry, OperationLog};
use crate::engine::op::{DocOp, Operation};

/// Adds each spec'd parameter unless the document already has it.
pub struct AddMissingParams {
    specs: Vec<ParamSpec>,
}

impl DocOp for AddMissingParams {
    fn apply(
        &self,
        doc: &mut dyn Document,
        log: &mut OperationLog,
        _group: Option<&SharedContext>,
    ) -> Result<(), DocError> {
        for spec in &self.specs {
            let mut entry = LogEntry::new(spec.name.as_str());
            if doc.has_parameter(&spec.name) {
                let _ = entry.skip("already present");
            } else {
                doc.add_parameter(spec)?;
                let _ = entry.succeed(format!("added ({} storage)", spec.storage));
            }
            log.push(entry);
        }
        Ok(())
    }
}

/// Build the add-missing-parameters operation.
pub fn add_missing_params(specs: Vec<ParamSpec>) -> Operation {
    Operation::document(
        "add-missing-parameters",
        "create parameters the document does not yet have",
        AddMissingParams { specs },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ParameterName, Quantity, StorageKind, VariantName};
    use crate::doc::MemoryDocument;
    use crate::engine::log::EntryStatus;
    use crate::engine::RunContext;

    fn pname(s: &str) -> ParameterName {
        ParameterName::new(s).unwrap()
    }

    fn doc() -> MemoryDocument {
        MemoryDocument::new("Fixture", vec![VariantName::new("Only").unwrap()])
            .with_parameter(ParamSpec::plain(pname("Existing"), StorageKind::Text))
    }

    fn run(doc: &mut MemoryDocument, specs: Vec<ParamSpec>) -> OperationLog {
        doc.begin_transaction("test").unwrap();
        let log = add_missing_params(specs).execute(doc, &RunContext::default());
        doc.commit().unwrap();
        log
    }

    #[test]
    fn adds_missing_and_skips_present() {
        let mut doc = doc();
        let log = run(
            &mut doc,
            vec![
                ParamSpec::plain(pname("Existing"), StorageKind::Text),
                ParamSpec::measurable(pname("Weight"), Quantity::Mass),
            ],
        );

        assert_eq!(log.skipped_count(), 1);
        assert_eq!(log.success_count(), 1);
        assert!(doc.has_parameter(&pname("Weight")));
        assert_eq!(
            doc.parameter_info(&pname("Weight")).unwrap().quantity,
            Quantity::Mass
        );
    }

    #[test]
    fn empty_spec_list_is_a_no_op() {
        let mut doc = doc();
        let log = run(&mut doc, vec![]);
        assert!(log.entries.is_empty());
        assert!(!log.has_errors());
    }

    #[test]
    fn entries_named_after_parameters() {
        let mut doc = doc();
        let log = run(
            &mut doc,
            vec![ParamSpec::plain(pname("Depth"), StorageKind::Double)],
        );
        assert_eq!(log.entries[0].name, "Depth");
        assert_eq!(log.entries[0].status(), EntryStatus::Success);
    }
}
