use serde::Serialize;

use linktrack_core::config::Settings;
use linktrack_sdk::{FileState, LinkId, MarkerCount, Outcome, SyncContext};

use super::OutputFormat;

pub fn format_settings(settings: &Settings, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "path": settings.path,
            "ssl": settings.ssl,
            "project": settings.project,
            "package": settings.package,
            "endpoint": settings.endpoint(),
        }))
        .unwrap_or_default(),
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str(&format!("Path:     {}\n", settings.path));
            out.push_str(&format!("SSL:      {}\n", settings.ssl));
            out.push_str(&format!(
                "Project:  {}\n",
                settings.project.as_deref().unwrap_or("(working directory)")
            ));
            out.push_str(&format!("Package:  {}\n", settings.package));
            out.push_str(&format!("Endpoint: {}", settings.endpoint()));
            out
        }
    }
}

pub fn format_agent(agent: LinkId, endpoint: &str, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => {
            serde_json::json!({ "agent": agent, "endpoint": endpoint }).to_string()
        }
        OutputFormat::Text => format!("Authorized at {endpoint} as agent #{agent}"),
    }
}

pub fn format_started(ctx: &SyncContext) -> String {
    format!(
        "Tracking project {} (#{}) as agent #{}",
        ctx.project_name,
        ctx.project,
        ctx.agent_root()
    )
}

/// One line per outcome, so `watch` output stays newline-delimited.
pub fn format_outcome(outcome: &Outcome, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string(outcome).unwrap_or_default(),
        OutputFormat::Text => match outcome {
            Outcome::Ignored { path } => format!("ignored {path}"),
            Outcome::Applied(t) => {
                let marker = match t.marker {
                    Some(id) => format!("marker #{id}"),
                    None => "already marked".to_string(),
                };
                format!(
                    "{} {} (file #{}, {marker}, removed {})",
                    t.state, t.path, t.file, t.removed
                )
            }
        },
    }
}

#[derive(Debug, Serialize)]
pub struct FileStatus {
    pub path: String,
    pub state: &'static str,
    #[serde(flatten)]
    pub markers: MarkerCount,
}

impl FileStatus {
    pub fn new(path: &str, markers: MarkerCount) -> Self {
        let state = match markers.state() {
            Some(FileState::Opened) => "opened",
            Some(FileState::Closed) => "closed",
            None if markers.total() == 0 => "untracked",
            None => "conflicting",
        };
        Self {
            path: path.to_string(),
            state,
            markers,
        }
    }
}

pub fn format_status(statuses: &[FileStatus], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(statuses).unwrap_or_default(),
        OutputFormat::Text => statuses
            .iter()
            .map(|s| format!("{:<11} {}", s.state, s.path))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
