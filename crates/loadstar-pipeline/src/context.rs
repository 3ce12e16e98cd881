//! Run context and source path templates.
//!
//! Every run carries a logical timestamp. Source path templates such as
//! `log_data/{year}/{month}` are resolved against it when a task executes, so
//! the partition a task reads is a function of the run, not of wall-clock time.
//!
//! # Template Syntax
//!
//! - `{year}`, `{month}`, `{day}`, `{hour}` — zero-padded date parts
//! - `{ds}` / `{ds_nodash}` — `2019-01-12` / `20190112`
//! - `{ts}` — RFC 3339 logical timestamp
//! - `{run_id}` — run identifier
//! - `{execution_date.year}` — unpadded numeric date parts
//! - `{params.key}` or `{key}` — run parameters, dot/index navigation
//! - `{{` and `}}` — literal braces

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde_json::{Value, json};

use crate::error::{PipelineError, Result};

/// Per-run execution context supplied by whoever triggers the run.
#[derive(Debug, Clone)]
pub struct RunContext {
    logical_date: DateTime<Utc>,
    run_id: String,
    params: HashMap<String, Value>,
}

impl RunContext {
    /// Context for a run at `logical_date` with a fresh run id.
    pub fn new(logical_date: DateTime<Utc>) -> Self {
        Self {
            logical_date,
            run_id: format!("manual__{}", uuid::Uuid::new_v4()),
            params: HashMap::new(),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Add a run parameter available to templates.
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn logical_date(&self) -> DateTime<Utc> {
        self.logical_date
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn params(&self) -> &HashMap<String, Value> {
        &self.params
    }

    /// Template variables for this run.
    ///
    /// Built-in names win over parameters of the same name; parameters stay
    /// reachable under `params.<key>`.
    pub fn template_data(&self) -> HashMap<String, Value> {
        let d = self.logical_date;
        let mut data = HashMap::new();
        for (key, value) in &self.params {
            data.insert(key.clone(), value.clone());
        }

        data.insert("year".into(), json!(format!("{:04}", d.year())));
        data.insert("month".into(), json!(format!("{:02}", d.month())));
        data.insert("day".into(), json!(format!("{:02}", d.day())));
        data.insert("hour".into(), json!(format!("{:02}", d.hour())));
        data.insert("ds".into(), json!(d.format("%Y-%m-%d").to_string()));
        data.insert("ds_nodash".into(), json!(d.format("%Y%m%d").to_string()));
        data.insert("ts".into(), json!(d.to_rfc3339()));
        data.insert("run_id".into(), json!(self.run_id));
        data.insert(
            "execution_date".into(),
            json!({
                "year": d.year(),
                "month": d.month(),
                "day": d.day(),
                "hour": d.hour(),
            }),
        );
        data.insert("params".into(), json!(self.params));
        data
    }

    /// Resolve a path template against this run.
    pub fn render(&self, template: &str) -> Result<String> {
        let data = self.template_data();
        TemplateResolver::new(&data).render(template)
    }
}

/// Resolves `{expression}` placeholders against a data map.
pub struct TemplateResolver<'a> {
    data: &'a HashMap<String, Value>,
}

impl<'a> TemplateResolver<'a> {
    pub fn new(data: &'a HashMap<String, Value>) -> Self {
        Self { data }
    }

    /// Render a template, substituting every placeholder.
    pub fn render(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().is_some_and(|&(_, n)| n == '{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek().is_some_and(|&(_, n)| n == '}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let rest = &template[pos + 1..];
                    let end = rest.find('}').ok_or_else(|| {
                        PipelineError::Template(format!(
                            "unclosed '{{' at offset {} in '{}'",
                            pos, template
                        ))
                    })?;
                    let expression = &rest[..end];
                    let value = self.resolve_expression(expression, template)?;
                    out.push_str(&value_to_string(&value));
                    // skip the expression and its closing brace
                    for _ in 0..expression.chars().count() + 1 {
                        chars.next();
                    }
                }
                '}' => {
                    return Err(PipelineError::Template(format!(
                        "unmatched '}}' at offset {} in '{}'",
                        pos, template
                    )));
                }
                other => out.push(other),
            }
        }

        Ok(out)
    }

    /// Resolve a single dot-separated path expression.
    fn resolve_expression(&self, expression: &str, template: &str) -> Result<Value> {
        let path = expression.trim();
        if path.is_empty() {
            return Err(PipelineError::Template(format!(
                "empty placeholder in '{}'",
                template
            )));
        }

        let segments = parse_path_segments(path);
        let root = &segments[0];
        let root_value = self.data.get(root.name.as_str()).ok_or_else(|| {
            PipelineError::Template(format!(
                "unknown placeholder '{}' in '{}'",
                root.name, template
            ))
        })?;

        let mut current = match root.index {
            Some(i) => root_value.get(i),
            None => Some(root_value),
        }
        .ok_or_else(|| cannot_resolve(path, root, template))?;

        for segment in &segments[1..] {
            current =
                navigate_segment(current, segment).ok_or_else(|| cannot_resolve(path, segment, template))?;
        }

        Ok(current.clone())
    }
}

fn cannot_resolve(path: &str, segment: &PathSegment, template: &str) -> PipelineError {
    PipelineError::Template(format!(
        "cannot resolve segment '{}' of '{}' in '{}'",
        segment, path, template
    ))
}

// ---------------------------------------------------------------------------
// Path navigation
// ---------------------------------------------------------------------------

/// A segment of a dot-separated path, optionally with an array index.
#[derive(Debug)]
struct PathSegment {
    name: String,
    index: Option<usize>,
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}[{}]", self.name, i),
            None => write!(f, "{}", self.name),
        }
    }
}

/// `"params.tables[0].name"` → `[("params", None), ("tables", Some(0)), ("name", None)]`
fn parse_path_segments(path: &str) -> Vec<PathSegment> {
    path.split('.')
        .map(|part| {
            if let Some(bracket_start) = part.find('[')
                && let Some(bracket_end) = part.find(']')
                && bracket_end > bracket_start
            {
                return PathSegment {
                    name: part[..bracket_start].to_string(),
                    index: part[bracket_start + 1..bracket_end].parse::<usize>().ok(),
                };
            }
            PathSegment {
                name: part.to_string(),
                index: None,
            }
        })
        .collect()
}

fn navigate_segment<'v>(value: &'v Value, segment: &PathSegment) -> Option<&'v Value> {
    let field = if segment.name.is_empty() {
        value
    } else {
        value.get(&segment.name)?
    };

    match segment.index {
        Some(i) => field.get(i),
        None => Some(field),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "null".to_string()),
    }
}
