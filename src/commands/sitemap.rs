use anyhow::Result;

use crate::commands::CommandReport;
use crate::sync::audit;
use crate::sync::config::load_config;
use crate::sync::paths::resolve_paths;
use crate::sync::sitemap::{self, SitemapInput};

pub fn run(dry_run: bool) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let mut report = CommandReport::new("sitemap");

    report.detail(format!("site_root={}", paths.site_root.display()));
    report.detail(format!("base_url={}", cfg.site.base_url));

    let outcome = sitemap::generate(&SitemapInput {
        site_root: &paths.site_root,
        games_json: &paths.catalog_json,
        sitemap_path: &paths.sitemap_file,
        base_url: &cfg.site.base_url,
        timezone: &cfg.site.timezone,
        dry_run,
    })?;

    report.detail(format!("static_pages={}", outcome.static_pages));
    report.detail(format!("game_pages={}", outcome.game_pages));
    if outcome.games_unreadable {
        report.detail(format!(
            "games data unreadable: {}",
            paths.catalog_json.display()
        ));
    }
    if outcome.written {
        report.detail(format!("wrote {}", outcome.sitemap_path.display()));
    } else {
        report.detail("dry-run: sitemap not written");
    }

    audit::append_event(
        &paths,
        "sitemap",
        if outcome.written { "ok" } else { "dry-run" },
        &format!(
            "static_pages={} game_pages={}",
            outcome.static_pages, outcome.game_pages
        ),
    )?;

    Ok(report)
}
