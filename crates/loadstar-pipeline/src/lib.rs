//! Warehouse-loading operators for star-schema pipelines.
//!
//! This crate provides:
//! - **Operators**: staging, fact, dimension and quality tasks that author SQL
//!   and issue it through an injected [`Warehouse`] connection
//! - **Execution context**: per-run logical timestamps and source path templates
//! - **Definitions**: TOML pipeline files validated into acyclic task graphs
//! - **Runner**: a sequential local runner that skips downstream tasks on failure
//! - **Sparkify**: the canonical song-play pipeline and its SQL

pub mod context;
pub mod credentials;
pub mod definition;
pub mod error;
pub mod operators;
pub mod pipeline;
pub mod queries;
pub mod runner;
pub mod sparkify;
pub mod statement;
pub mod warehouse;

pub use context::{RunContext, TemplateResolver};
pub use credentials::{ConfigCredentials, CredentialProvider, Credentials, StaticCredentials};
pub use definition::{OperatorSpec, PipelineDefinition, PipelineFile, TaskDefinition};
pub use error::{PipelineError, Result};
pub use operators::{
    DimensionLoader, ExternalDataLocation, FactLoader, JsonFormat, LoadMode, Marker, Operator,
    OperatorKind, QualityChecker, QualitySpec, SqlTask, StagingLoader, TaskContext,
};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineTask};
pub use runner::{LocalRunner, RunReport, TaskObserver, TaskOutcome, TaskState};
pub use sparkify::{sparkify_pipeline, sparkify_pipeline_with};
pub use statement::Statement;
pub use warehouse::{Record, RecordingWarehouse, Warehouse, WarehouseError};
