use anyhow::Result;

use crate::commands::{CommandReport, reconcile_details};
use crate::sync::audit;
use crate::sync::catalog::{self, CatalogOptions};
use crate::sync::config::{ExistingPolicy, load_config};
use crate::sync::paths::resolve_paths;

#[derive(Debug, Clone)]
pub struct CatalogCommandOptions {
    pub dry_run: bool,
    pub policy: Option<ExistingPolicy>,
}

pub fn run(opts: &CatalogCommandOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let mut report = CommandReport::new("catalog");

    let policy = opts.policy.unwrap_or(cfg.catalog.existing_policy);
    report.detail(format!("existing_policy={}", policy.label()));
    report.detail(format!(
        "search={}",
        if cfg.search.has_credentials() {
            "enabled"
        } else {
            "disabled"
        }
    ));

    let sync_opts = CatalogOptions {
        dry_run: opts.dry_run,
        policy,
    };
    let outcome = match catalog::sync(
        paths.catalog_sheet.clone(),
        paths.catalog_json.clone(),
        &cfg.search,
        &sync_opts,
    ) {
        Ok(outcome) => outcome,
        Err(err) => {
            let _ = audit::append_event(&paths, "catalog", "failed", &format!("{err:#}"));
            return Err(err);
        }
    };

    report.detail(format!("sheet={}", outcome.sheet_path.display()));
    report.detail(format!("prior={}", outcome.prior_status));
    report.detail(format!("rows={}", outcome.rows));
    reconcile_details(&mut report, &outcome.report);
    report.detail(format!("entities={}", outcome.entity_count));
    report.detail(format!("row_warnings={}", outcome.row_issues));
    report.detail(format!(
        "search_calls={} search_failures={} search_skipped={}",
        outcome.search_calls, outcome.search_failures, outcome.search_skipped
    ));

    if outcome.written {
        report.detail(format!("wrote {}", outcome.output_path.display()));
    } else {
        report.detail("dry-run: output not written");
    }

    audit::append_event(
        &paths,
        "catalog",
        if outcome.written { "ok" } else { "dry-run" },
        &format!(
            "rows={} entities={} inserted={} updated={} searches={}",
            outcome.rows,
            outcome.entity_count,
            outcome.report.inserted().len(),
            outcome.report.updated().len(),
            outcome.search_calls
        ),
    )?;

    Ok(report)
}
