pub mod catalog;
pub mod giftcodes;
pub mod sitemap;
pub mod status;

use crate::sync::reconcile::{Change, ReconcileReport};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

fn join_names(names: &[&str]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(",")
    }
}

/// Shared per-entity summary lines for both sheet pipelines.
pub fn reconcile_details(report: &mut CommandReport, outcome: &ReconcileReport) {
    report.detail(format!("inserted={}", join_names(&outcome.inserted())));
    report.detail(format!("updated={}", join_names(&outcome.updated())));
    report.detail(format!("unchanged={}", outcome.unchanged().len()));
    let carried: Vec<&str> = outcome.carried_forward.iter().map(String::as_str).collect();
    report.detail(format!("carried_forward={}", join_names(&carried)));
    for (name, change) in &outcome.outcomes {
        if let Change::Updated(fields) = change {
            report.detail(format!("changed {name}: {}", fields.join(",")));
        }
    }
    if !outcome.duplicates.is_empty() {
        let dups: Vec<&str> = outcome.duplicates.iter().map(String::as_str).collect();
        report.detail(format!("duplicate_rows={}", join_names(&dups)));
    }
}
