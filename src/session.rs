use log::{info, warn};
use std::collections::HashMap;

use crate::builder::{ProblemDefinitionBuilder, ValidationIssue};
use crate::client::SolverClient;
use crate::config::ValidationPolicy;
use crate::dataset::DatasetUpload;
use crate::error::{BuilderError, IngestError, StudioError};
use crate::models::{DatasetKind, DatasetTable, ProblemAck, ProblemDocument, ProblemMeta};
use crate::render::{GridView, SolveView};

/// Identifies one solve request; later tickets supersede earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SolveTicket(u64);

/// Everything one user edits during a visit: the builder, the grids drawn
/// from the uploaded datasets and the latest solve result.
///
/// The async methods take `&mut self` for callers that own the session
/// outright. Shared owners should use the split steps
/// ([`Session::prepare_submission`], [`Session::begin_solve`],
/// [`Session::finish_solve`]) so no lock is held while waiting on the
/// solver.
#[derive(Debug, Default)]
pub struct Session {
    builder: ProblemDefinitionBuilder,
    meta: ProblemMeta,
    policy: ValidationPolicy,
    grids: HashMap<DatasetKind, GridView>,
    last_ack: Option<ProblemAck>,
    last_solve: Option<SolveView>,
    issued: u64,
    settled: u64,
}

impl Session {
    pub fn new(meta: ProblemMeta, policy: ValidationPolicy) -> Self {
        Self {
            meta,
            policy,
            ..Self::default()
        }
    }

    pub fn builder(&self) -> &ProblemDefinitionBuilder {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut ProblemDefinitionBuilder {
        &mut self.builder
    }

    // ---------- datasets ----------

    pub fn ingest(&mut self, upload: &DatasetUpload) -> Result<(), IngestError> {
        self.builder.ingest_datasets(upload)?;
        self.refresh_grids();
        Ok(())
    }

    /// Install a pair that was parsed elsewhere and redraw both grids.
    pub fn publish_datasets(&mut self, salas: DatasetTable, horarios: DatasetTable) {
        self.builder.set_datasets(salas, horarios);
        self.refresh_grids();
    }

    fn refresh_grids(&mut self) {
        for kind in DatasetKind::ALL {
            match self.builder.dataset(kind).and_then(GridView::from_dataset) {
                Some(grid) => {
                    self.grids.insert(kind, grid);
                }
                None => {
                    self.grids.remove(&kind);
                }
            }
        }
    }

    /// The grid for `kind`, absent until a non-empty table was ingested.
    pub fn grid(&self, kind: DatasetKind) -> Option<&GridView> {
        self.grids.get(&kind)
    }

    // ---------- submission ----------

    pub fn document(&self) -> ProblemDocument {
        self.builder.build_document(&self.meta)
    }

    pub fn validation_issues(&self) -> Vec<ValidationIssue> {
        self.builder.validate()
    }

    /// Build the document and apply the validation policy to it.
    pub fn prepare_submission(&self) -> Result<ProblemDocument, BuilderError> {
        let issues = self.builder.validate();
        if !issues.is_empty() {
            match self.policy {
                ValidationPolicy::Reject => {
                    return Err(BuilderError::Rejected(
                        issues.iter().map(ToString::to_string).collect(),
                    ));
                }
                ValidationPolicy::Warn => {
                    for issue in &issues {
                        warn!("submitting despite: {}", issue);
                    }
                }
            }
        }
        Ok(self.document())
    }

    pub fn record_ack(&mut self, ack: ProblemAck) {
        self.last_ack = Some(ack);
    }

    pub fn last_ack(&self) -> Option<&ProblemAck> {
        self.last_ack.as_ref()
    }

    /// Build, validate and send the problem. Rows and datasets are left
    /// untouched whatever happens, so a failed submit can simply be retried.
    pub async fn submit(&mut self, client: &SolverClient) -> Result<ProblemAck, StudioError> {
        let document = self.prepare_submission()?;
        let ack = client.submit_problem(&document).await?;
        self.record_ack(ack.clone());
        Ok(ack)
    }

    // ---------- solving ----------

    pub fn begin_solve(&mut self) -> SolveTicket {
        self.issued += 1;
        SolveTicket(self.issued)
    }

    /// Store the view for `ticket` unless a newer request has already
    /// settled. Returns whether the view was kept.
    pub fn finish_solve(&mut self, ticket: SolveTicket, view: SolveView) -> bool {
        if ticket.0 < self.settled {
            info!(
                "discarding solve result {} (already showing {})",
                ticket.0, self.settled
            );
            return false;
        }
        self.settled = ticket.0;
        self.last_solve = Some(view);
        true
    }

    pub fn last_solve(&self) -> Option<&SolveView> {
        self.last_solve.as_ref()
    }

    pub async fn request_solve(&mut self, client: &SolverClient) -> Result<SolveView, StudioError> {
        let ticket = self.begin_solve();
        let outcome = client.solve().await?;
        let view = SolveView::from_outcome(&outcome);
        self.finish_solve(ticket, view.clone());
        Ok(view)
    }
}
