//! Staging loader: replace a staging table with raw files from object storage.

use std::fmt;

use tracing::{debug, info};

use super::{Operator, OperatorKind, TaskContext, validate_identifier, validate_task_id};
use crate::context::RunContext;
use crate::credentials::Credentials;
use crate::error::{PipelineError, Result};
use crate::statement::{Statement, quote_literal};

/// How JSON source fields map onto table columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum JsonFormat {
    /// Match JSON keys to column names.
    #[default]
    Auto,
    /// Use a JSONPaths mapping file at this location.
    JsonPaths(String),
}

impl JsonFormat {
    /// Parse a format option: `"auto"` or a JSONPaths file location.
    ///
    /// The bare `","` accepted by older pipeline definitions is rejected;
    /// it is neither `auto` nor a mapping file.
    pub fn parse(value: &str) -> std::result::Result<Self, String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("format cannot be empty; use 'auto' or a JSONPaths file".to_string());
        }
        if trimmed == "," {
            return Err(
                "format ',' is not a valid JSON format; use 'auto' or a JSONPaths file"
                    .to_string(),
            );
        }
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(JsonFormat::Auto);
        }
        Ok(JsonFormat::JsonPaths(trimmed.to_string()))
    }

    /// Value for the `FORMAT AS JSON` clause.
    pub fn as_str(&self) -> &str {
        match self {
            JsonFormat::Auto => "auto",
            JsonFormat::JsonPaths(path) => path,
        }
    }
}

impl fmt::Display for JsonFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where raw files live: a bucket plus a key template resolved per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDataLocation {
    bucket: String,
    key_template: String,
}

impl ExternalDataLocation {
    pub fn new(bucket: impl Into<String>, key_template: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key_template: key_template.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key_template(&self) -> &str {
        &self.key_template
    }

    /// Full `s3://` path for a run.
    pub fn resolve(&self, run: &RunContext) -> Result<String> {
        let key = run.render(&self.key_template)?;
        Ok(format!("s3://{}/{}", self.bucket, key))
    }
}

/// Replaces a staging table with a bulk load from object storage.
///
/// Execution deletes every row of the destination, then issues a `COPY`
/// from the run's resolved source path. Errors from either statement
/// propagate unchanged.
#[derive(Debug, Clone)]
pub struct StagingLoader {
    task_id: String,
    table: String,
    location: ExternalDataLocation,
    credentials_id: String,
    format: JsonFormat,
    region: Option<String>,
}

impl StagingLoader {
    pub fn new(
        task_id: impl Into<String>,
        table: impl Into<String>,
        location: ExternalDataLocation,
        credentials_id: impl Into<String>,
        format: JsonFormat,
    ) -> Result<Self> {
        let task_id = task_id.into();
        let table = table.into();
        let credentials_id = credentials_id.into();

        validate_task_id(&task_id)?;
        validate_identifier(&task_id, "table", &table)?;
        if location.bucket.trim().is_empty() {
            return Err(PipelineError::invalid_config(&task_id, "bucket cannot be empty"));
        }
        if location.bucket.contains("://") || location.bucket.contains('/') {
            return Err(PipelineError::invalid_config(
                &task_id,
                format!("bucket '{}' must be a bare bucket name", location.bucket),
            ));
        }
        if credentials_id.trim().is_empty() {
            return Err(PipelineError::invalid_config(
                &task_id,
                "credentials id cannot be empty",
            ));
        }

        Ok(Self {
            task_id,
            table,
            location,
            credentials_id,
            format,
            region: None,
        })
    }

    /// Emit a `REGION` clause for buckets outside the warehouse's region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        let region = region.into();
        self.region = (!region.trim().is_empty()).then_some(region);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn location(&self) -> &ExternalDataLocation {
        &self.location
    }

    pub fn format(&self) -> &JsonFormat {
        &self.format
    }

    /// Statement clearing the destination.
    pub fn clear_statement(&self) -> Statement {
        Statement::new(format!("DELETE FROM {}", self.table))
    }

    /// Bulk-load statement for a resolved source path.
    pub fn copy_statement(&self, source_path: &str, credentials: &Credentials) -> Statement {
        let access_literal = quote_literal(&credentials.access_key);
        let secret_literal = quote_literal(&credentials.secret_key);

        let mut sql = format!(
            "COPY {}\nFROM {}\nACCESS_KEY_ID {}\nSECRET_ACCESS_KEY {}\nFORMAT AS JSON {}\nTIMEFORMAT AS 'epochmillisecs'\n",
            self.table,
            quote_literal(source_path),
            access_literal,
            secret_literal,
            quote_literal(self.format.as_str()),
        );
        if let Some(ref region) = self.region {
            sql.push_str(&format!("REGION {}\n", quote_literal(region)));
        }
        sql.push_str("COMPUPDATE OFF");

        // Mask the literal bodies exactly as they appear in the text.
        Statement::new(sql)
            .with_secret(unquote(&access_literal))
            .with_secret(unquote(&secret_literal))
    }
}

fn unquote(literal: &str) -> String {
    literal[1..literal.len() - 1].to_string()
}

impl Operator for StagingLoader {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::Stage
    }

    fn execute(&self, ctx: &TaskContext<'_>) -> Result<()> {
        // Resolve everything fallible before touching the table.
        let source_path = self.location.resolve(ctx.run)?;
        let credentials = ctx.credentials.credentials(&self.credentials_id)?;

        info!(task = %self.task_id, table = %self.table, "Clearing data from destination table");
        let clear = self.clear_statement();
        debug!(task = %self.task_id, statement = %clear, "running");
        ctx.warehouse.run(&clear)?;

        info!(task = %self.task_id, table = %self.table, source = %source_path, "Copying data from object storage");
        let copy = self.copy_statement(&source_path, &credentials);
        debug!(task = %self.task_id, statement = %copy, "running");
        ctx.warehouse.run(&copy)?;

        Ok(())
    }
}
