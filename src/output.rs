use std::io::{self, Write};

use serde::Serialize;

use crate::api::{
    ApproveResponse, CreateOutcome, ImportResponse, ManifestsResponse, RunsResponse,
    SearchResponse,
};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Pretty-printed JSON for scripting; the interactive shell renders the same
/// data through the view functions instead.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print_search(result: &SearchResponse) -> io::Result<()> {
        #[derive(Serialize)]
        struct Out<'a> {
            total_found: u64,
            resolved_query: Option<&'a str>,
            studies: &'a [crate::domain::Study],
        }
        Self::print_json(&Out {
            total_found: result.total_found,
            resolved_query: result.resolved_query.as_deref(),
            studies: &result.studies,
        })
    }

    pub fn print_runs(result: &RunsResponse) -> io::Result<()> {
        #[derive(Serialize)]
        struct Out<'a> {
            runs: &'a [crate::domain::Run],
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<&'a str>,
        }
        Self::print_json(&Out {
            runs: &result.runs,
            error: result.error.as_deref(),
        })
    }

    pub fn print_manifests(result: &ManifestsResponse) -> io::Result<()> {
        #[derive(Serialize)]
        struct Out<'a> {
            manifests: &'a [crate::domain::ManifestRecord],
        }
        Self::print_json(&Out {
            manifests: &result.manifests,
        })
    }

    pub fn print_create(result: &CreateOutcome) -> io::Result<()> {
        match result {
            CreateOutcome::Created(response) => Self::print_json(&serde_json::json!({
                "created": response.created,
                "total_runs": response.total_runs,
            })),
            CreateOutcome::Rejected { error } => {
                Self::print_json(&serde_json::json!({ "error": error }))
            }
        }
    }

    pub fn print_approve(result: &ApproveResponse) -> io::Result<()> {
        match &result.error {
            Some(error) => Self::print_json(&serde_json::json!({ "error": error })),
            None => Self::print_json(&serde_json::json!({
                "runs_to_import": result.runs_to_import,
            })),
        }
    }

    pub fn print_import(result: &ImportResponse) -> io::Result<()> {
        match &result.error {
            Some(error) => Self::print_json(&serde_json::json!({ "error": error })),
            None => Self::print_json(&serde_json::json!({
                "started": result.started,
                "failed": result.failed,
            })),
        }
    }

    pub fn print_value(value: &serde_json::Value) -> io::Result<()> {
        Self::print_json(value)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
