//! # UCTP Studio
//!
//! Compose university course timetabling problems from two CSV datasets
//! and a set of user-defined rows, send them to a remote solver and render
//! the room assignments it returns.
//!
//! ## Example
//!
//! ```no_run
//! use uctp_studio::{DatasetUpload, Session, SolverClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SolverClient::new("http://localhost:8080")?;
//!     let mut session = Session::default();
//!
//!     session.ingest(&DatasetUpload::new(
//!         "Nome_sala;Capacidade Normal\nAud 1;120\n",
//!         "Unidade de execução;Dia;Início;Fim\nMatemática;Seg;08:00;09:30\n",
//!     ))?;
//!     let row = session.builder_mut().add_constraint_row();
//!     session.builder_mut().constraint_mut(row)?.expression =
//!         "lotacao >= inscritos".to_string();
//!
//!     session.submit(&client).await?;
//!     println!("{}", session.request_solve(&client).await?);
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod models;
pub mod render;
pub mod routes;
pub mod session;

pub use builder::{ProblemDefinitionBuilder, ValidationIssue};
pub use client::SolverClient;
pub use config::{Config, ValidationPolicy};
pub use dataset::{parse_dataset, DatasetUpload};
pub use error::{BuilderError, IngestError, Result, StudioError, TransportError};
pub use models::{
    Assignment, ConstraintRow, DatasetKind, DatasetTable, DecisionVariable, Metrics, Objective,
    ProblemAck, ProblemDocument, ProblemMeta, Sense, SolveOutcome, SolveReport, VariableType,
};
pub use render::{GridView, SolveView};
pub use session::Session;
