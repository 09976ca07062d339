use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::dataset::DatasetUpload;
use crate::error::{BuilderError, IngestError};
use crate::models::{
    ConstraintRow, DatasetBundle, DatasetKind, DatasetTable, DecisionVariable, Objective,
    ProblemDocument, ProblemMeta,
};

/// Collects the user's rows and uploaded datasets and turns them into a
/// [`ProblemDocument`].
#[derive(Debug, Clone, Default)]
pub struct ProblemDefinitionBuilder {
    decision_variables: Vec<DecisionVariable>,
    objectives: Vec<Objective>,
    constraints: Vec<ConstraintRow>,
    salas: Option<DatasetTable>,
    horarios: Option<DatasetTable>,
}

/// Snapshot of every row, in display order.
#[derive(Debug, Clone, Serialize)]
pub struct Rows<'a> {
    pub decision_variables: &'a [DecisionVariable],
    pub objectives: &'a [Objective],
    pub constraints: &'a [ConstraintRow],
}

/// Something the solver will probably reject or misread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    EmptyLabel { row: usize },
    DuplicateLabel { row: usize, label: String },
    EmptyRange { row: usize },
    EmptyObjective { row: usize },
    EmptyConstraint { row: usize },
    DatasetMissing { kind: DatasetKind },
    DatasetEmpty { kind: DatasetKind },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyLabel { row } => {
                write!(f, "decision variable {} has no label", row)
            }
            ValidationIssue::DuplicateLabel { row, label } => {
                write!(f, "decision variable {} repeats label {:?}", row, label)
            }
            ValidationIssue::EmptyRange { row } => {
                write!(f, "decision variable {} has no range", row)
            }
            ValidationIssue::EmptyObjective { row } => {
                write!(f, "objective {} has no expression", row)
            }
            ValidationIssue::EmptyConstraint { row } => {
                write!(f, "constraint {} is empty", row)
            }
            ValidationIssue::DatasetMissing { kind } => {
                write!(f, "no {} dataset has been uploaded", kind)
            }
            ValidationIssue::DatasetEmpty { kind } => {
                write!(f, "the {} dataset has no records", kind)
            }
        }
    }
}

fn row_not_found(collection: &'static str, index: usize) -> BuilderError {
    BuilderError::RowNotFound { collection, index }
}

impl ProblemDefinitionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------- rows ----------

    /// Append a blank decision variable row and return its index.
    pub fn add_decision_variable_row(&mut self) -> usize {
        self.decision_variables.push(DecisionVariable::default());
        self.decision_variables.len() - 1
    }

    /// Append a blank objective row (minimize, empty expression).
    pub fn add_objective_row(&mut self) -> usize {
        self.objectives.push(Objective::default());
        self.objectives.len() - 1
    }

    pub fn add_constraint_row(&mut self) -> usize {
        self.constraints.push(ConstraintRow::default());
        self.constraints.len() - 1
    }

    pub fn decision_variable_mut(
        &mut self,
        index: usize,
    ) -> Result<&mut DecisionVariable, BuilderError> {
        self.decision_variables
            .get_mut(index)
            .ok_or_else(|| row_not_found("decision variable", index))
    }

    pub fn objective_mut(&mut self, index: usize) -> Result<&mut Objective, BuilderError> {
        self.objectives
            .get_mut(index)
            .ok_or_else(|| row_not_found("objective", index))
    }

    pub fn constraint_mut(&mut self, index: usize) -> Result<&mut ConstraintRow, BuilderError> {
        self.constraints
            .get_mut(index)
            .ok_or_else(|| row_not_found("constraint", index))
    }

    pub fn remove_decision_variable_row(
        &mut self,
        index: usize,
    ) -> Result<DecisionVariable, BuilderError> {
        if index >= self.decision_variables.len() {
            return Err(row_not_found("decision variable", index));
        }
        Ok(self.decision_variables.remove(index))
    }

    pub fn remove_objective_row(&mut self, index: usize) -> Result<Objective, BuilderError> {
        if index >= self.objectives.len() {
            return Err(row_not_found("objective", index));
        }
        Ok(self.objectives.remove(index))
    }

    pub fn remove_constraint_row(&mut self, index: usize) -> Result<ConstraintRow, BuilderError> {
        if index >= self.constraints.len() {
            return Err(row_not_found("constraint", index));
        }
        Ok(self.constraints.remove(index))
    }

    pub fn rows(&self) -> Rows<'_> {
        Rows {
            decision_variables: &self.decision_variables,
            objectives: &self.objectives,
            constraints: &self.constraints,
        }
    }

    // ---------- datasets ----------

    /// Parse both uploads and replace the stored tables. On any error the
    /// previously ingested tables are left as they were.
    pub fn ingest_datasets(&mut self, upload: &DatasetUpload) -> Result<(), IngestError> {
        let (salas, horarios) = upload.parse()?;
        self.set_datasets(salas, horarios);
        Ok(())
    }

    /// Store an already parsed pair, e.g. one produced off-thread.
    pub fn set_datasets(&mut self, salas: DatasetTable, horarios: DatasetTable) {
        self.salas = Some(salas);
        self.horarios = Some(horarios);
    }

    pub fn dataset(&self, kind: DatasetKind) -> Option<&DatasetTable> {
        match kind {
            DatasetKind::Salas => self.salas.as_ref(),
            DatasetKind::Horarios => self.horarios.as_ref(),
        }
    }

    // ---------- document ----------

    /// Assemble the document from the current rows and the latest tables.
    /// A dataset that was never ingested is sent as an empty sequence.
    pub fn build_document(&self, meta: &ProblemMeta) -> ProblemDocument {
        ProblemDocument {
            problem_name: meta.name.clone(),
            description: meta.description.clone(),
            dataset: DatasetBundle {
                salas: self.salas.clone().unwrap_or_default(),
                horarios: self.horarios.clone().unwrap_or_default(),
            },
            decision_variables: self.decision_variables.clone(),
            objectives: self.objectives.clone(),
            constraints: self
                .constraints
                .iter()
                .map(|c| c.expression.clone())
                .collect(),
        }
    }

    /// List everything that looks malformed. An empty list means the
    /// definition is well-formed; expression syntax is left to the solver.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for kind in DatasetKind::ALL {
            match self.dataset(kind) {
                None => issues.push(ValidationIssue::DatasetMissing { kind }),
                Some(table) if table.is_empty() => {
                    issues.push(ValidationIssue::DatasetEmpty { kind })
                }
                Some(_) => {}
            }
        }

        let mut labels: HashSet<&str> = HashSet::new();
        for (row, var) in self.decision_variables.iter().enumerate() {
            let label = var.label.trim();
            if label.is_empty() {
                issues.push(ValidationIssue::EmptyLabel { row });
            } else if !labels.insert(label) {
                issues.push(ValidationIssue::DuplicateLabel {
                    row,
                    label: label.to_string(),
                });
            }
            if var.range.trim().is_empty() {
                issues.push(ValidationIssue::EmptyRange { row });
            }
        }

        for (row, objective) in self.objectives.iter().enumerate() {
            if objective.expression.trim().is_empty() {
                issues.push(ValidationIssue::EmptyObjective { row });
            }
        }

        for (row, constraint) in self.constraints.iter().enumerate() {
            if constraint.expression.trim().is_empty() {
                issues.push(ValidationIssue::EmptyConstraint { row });
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Sense, VariableType};

    fn builder_with_datasets() -> ProblemDefinitionBuilder {
        let mut builder = ProblemDefinitionBuilder::new();
        builder
            .ingest_datasets(&DatasetUpload::new(
                "Nome_sala,Capacidade\nA1,30\n",
                "Unidade de execução,Dia\nMat,Seg\n",
            ))
            .unwrap();
        builder
    }

    #[test]
    fn test_add_rows_appends_in_call_order() {
        let mut builder = ProblemDefinitionBuilder::new();
        for n in 0..5 {
            assert_eq!(builder.add_decision_variable_row(), n);
            builder.decision_variable_mut(n).unwrap().label = format!("x{}", n);
        }
        builder.add_objective_row();
        builder.add_objective_row();
        builder.add_constraint_row();

        let rows = builder.rows();
        assert_eq!(rows.decision_variables.len(), 5);
        assert_eq!(rows.objectives.len(), 2);
        assert_eq!(rows.constraints.len(), 1);
        let labels: Vec<&str> = rows
            .decision_variables
            .iter()
            .map(|v| v.label.as_str())
            .collect();
        assert_eq!(labels, ["x0", "x1", "x2", "x3", "x4"]);
    }

    #[test]
    fn test_new_rows_are_blank() {
        let mut builder = ProblemDefinitionBuilder::new();
        builder.add_decision_variable_row();
        builder.add_objective_row();
        builder.add_constraint_row();

        let doc = builder.build_document(&ProblemMeta::default());
        assert_eq!(doc.decision_variables[0].kind, VariableType::Discrete);
        assert_eq!(doc.decision_variables[0].label, "");
        assert_eq!(doc.objectives[0].sense, Sense::Minimize);
        assert_eq!(doc.constraints, [""]);
    }

    #[test]
    fn test_build_document_is_deterministic() {
        let mut builder = builder_with_datasets();
        builder.add_objective_row();
        builder.objective_mut(0).unwrap().expression = "abs(lotacao - inscritos)".to_string();

        let meta = ProblemMeta::default();
        assert_eq!(builder.build_document(&meta), builder.build_document(&meta));
    }

    #[test]
    fn test_build_document_without_datasets_sends_empty_tables() {
        let doc = ProblemDefinitionBuilder::new().build_document(&ProblemMeta::default());
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["dataset"]["salas"], serde_json::json!([]));
        assert_eq!(json["dataset"]["horarios"], serde_json::json!([]));
        assert_eq!(json["problem_name"], "UCTP - Atribuição de Salas a Aulas");
    }

    #[test]
    fn test_failed_ingest_keeps_previous_tables() {
        let mut builder = builder_with_datasets();
        let upload = DatasetUpload {
            salas: Some("a\n1\n".to_string()),
            horarios: None,
        };

        assert!(builder.ingest_datasets(&upload).is_err());
        let salas = builder.dataset(DatasetKind::Salas).unwrap();
        assert_eq!(salas.columns(), ["Nome_sala", "Capacidade"]);
    }

    #[test]
    fn test_missing_input_produces_no_tables() {
        let mut builder = ProblemDefinitionBuilder::new();
        let upload = DatasetUpload {
            salas: None,
            horarios: Some("a\n1\n".to_string()),
        };

        assert!(matches!(
            builder.ingest_datasets(&upload),
            Err(IngestError::MissingInput(_))
        ));
        assert!(builder.dataset(DatasetKind::Salas).is_none());
        assert!(builder.dataset(DatasetKind::Horarios).is_none());
    }

    #[test]
    fn test_remove_row_out_of_range() {
        let mut builder = ProblemDefinitionBuilder::new();
        builder.add_constraint_row();

        assert!(builder.remove_constraint_row(1).is_err());
        assert!(builder.remove_constraint_row(0).is_ok());
        assert!(builder.rows().constraints.is_empty());
    }

    #[test]
    fn test_validate_reports_blank_and_duplicate_rows() {
        let mut builder = builder_with_datasets();
        builder.add_decision_variable_row();
        builder.add_decision_variable_row();
        builder.add_decision_variable_row();
        for i in 1..3 {
            let var = builder.decision_variable_mut(i).unwrap();
            var.label = "sala".to_string();
            var.range = "0..10".to_string();
        }
        builder.add_constraint_row();

        assert_eq!(
            builder.validate(),
            vec![
                ValidationIssue::EmptyLabel { row: 0 },
                ValidationIssue::EmptyRange { row: 0 },
                ValidationIssue::DuplicateLabel {
                    row: 2,
                    label: "sala".to_string()
                },
                ValidationIssue::EmptyConstraint { row: 0 },
            ]
        );
    }

    #[test]
    fn test_validate_without_datasets() {
        let issues = ProblemDefinitionBuilder::new().validate();
        assert_eq!(
            issues,
            vec![
                ValidationIssue::DatasetMissing {
                    kind: DatasetKind::Salas
                },
                ValidationIssue::DatasetMissing {
                    kind: DatasetKind::Horarios
                },
            ]
        );
    }

    #[test]
    fn test_validate_flags_header_only_dataset() {
        let mut builder = ProblemDefinitionBuilder::new();
        builder
            .ingest_datasets(&DatasetUpload::new(
                "Nome_sala,Capacidade\n",
                "Unidade de execução,Dia\nMat,Seg\n",
            ))
            .unwrap();

        let issues = builder.validate();
        assert_eq!(
            issues,
            vec![ValidationIssue::DatasetEmpty {
                kind: DatasetKind::Salas
            }]
        );
        assert_eq!(issues[0].to_string(), "the salas dataset has no records");
    }
}
