use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::sync::config::load_config;
use crate::sync::paths::resolve_paths;
use crate::sync::util::mask_secret;

mod generated {
    include!(concat!(env!("OUT_DIR"), "/env_allowlist.rs"));
}

/// Allowlisted environment keys that are currently set.
pub fn configured_env_keys() -> Vec<&'static str> {
    generated::GENERATED_ENV_ALLOWLIST
        .iter()
        .copied()
        .filter(|key| env::var_os(key).is_some_and(|v| !v.is_empty()))
        .collect()
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("build_uuid={}", env!("BUILD_UUID")));
    report.detail(format!("site_root={}", paths.site_root.display()));
    report.detail(format!("giftcodes_sheet={}", paths.giftcodes_sheet.display()));
    report.detail(format!("giftcodes_json={}", paths.giftcodes_json.display()));
    report.detail(format!("catalog_sheet={}", paths.catalog_sheet.display()));
    report.detail(format!("catalog_json={}", paths.catalog_json.display()));
    report.detail(format!("sitemap={}", paths.sitemap_file.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!(
        "config_file={}{}",
        paths.config_file.display(),
        if paths.config_file.exists() {
            ""
        } else {
            " (absent, using defaults)"
        }
    ));

    match load_config(&paths) {
        Ok(cfg) => {
            report.detail(format!("search.api_key={}", mask_secret(&cfg.search.api_key)));
            report.detail(format!(
                "search.search_engine_id={}",
                mask_secret(&cfg.search.search_engine_id)
            ));
            report.detail(format!("search.endpoint={}", cfg.search.endpoint));
            report.detail(format!(
                "search.rate_limit_delay_ms={}",
                cfg.search.rate_limit_delay_ms
            ));
            report.detail(format!("search.retries={}", cfg.search.retries));
            report.detail(format!(
                "catalog.existing_policy={}",
                cfg.catalog.existing_policy.label()
            ));
            report.detail(format!("site.base_url={}", cfg.site.base_url));
            report.detail(format!("site.timezone={}", cfg.site.timezone));
            if !cfg.search.has_credentials() {
                report.detail("search disabled: new games get \"N\" for looked-up links");
            }
        }
        Err(err) => report.issue(format!("config invalid: {err:#}")),
    }

    let keys = configured_env_keys();
    report.detail(format!(
        "env_overrides={}",
        if keys.is_empty() {
            "-".to_string()
        } else {
            keys.join(",")
        }
    ));

    if !paths.giftcodes_sheet.exists() {
        report.issue(format!(
            "missing gift-code sheet ({})",
            paths.giftcodes_sheet.display()
        ));
    }
    if !paths.catalog_sheet.exists() {
        report.issue(format!(
            "missing catalog sheet ({})",
            paths.catalog_sheet.display()
        ));
    }

    Ok(report)
}
