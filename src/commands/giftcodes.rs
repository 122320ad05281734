use anyhow::Result;

use crate::commands::{CommandReport, reconcile_details};
use crate::sync::audit;
use crate::sync::giftcodes::{self, GiftCodesOptions};
use crate::sync::paths::resolve_paths;

pub fn run(opts: &GiftCodesOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("giftcodes");

    let outcome = match giftcodes::sync(
        paths.giftcodes_sheet.clone(),
        paths.giftcodes_json.clone(),
        opts,
    ) {
        Ok(outcome) => outcome,
        Err(err) => {
            let _ = audit::append_event(&paths, "giftcodes", "failed", &format!("{err:#}"));
            return Err(err);
        }
    };

    report.detail(format!("sheet={}", outcome.sheet_path.display()));
    report.detail(format!("prior={}", outcome.prior_status));
    report.detail(format!("rows={}", outcome.rows));
    reconcile_details(&mut report, &outcome.report);
    report.detail(format!("entities={}", outcome.entity_count));

    if outcome.written {
        report.detail(format!("wrote {}", outcome.output_path.display()));
    } else {
        report.detail("dry-run: output not written");
    }

    audit::append_event(
        &paths,
        "giftcodes",
        if outcome.written { "ok" } else { "dry-run" },
        &format!(
            "rows={} entities={} inserted={} updated={}",
            outcome.rows,
            outcome.entity_count,
            outcome.report.inserted().len(),
            outcome.report.updated().len()
        ),
    )?;

    Ok(report)
}
