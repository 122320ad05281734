use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SyncPaths {
    pub site_root: PathBuf,
    pub giftcodes_sheet: PathBuf,
    pub giftcodes_json: PathBuf,
    pub catalog_sheet: PathBuf,
    pub catalog_json: PathBuf,
    pub sitemap_file: PathBuf,
    pub logs_dir: PathBuf,
    pub config_file: PathBuf,
}

fn env_or_site_path(var: &str, site_root: &Path, fallback: &str) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => {
            let candidate = PathBuf::from(v.trim());
            if candidate.is_absolute() {
                candidate
            } else {
                site_root.join(candidate)
            }
        }
        _ => site_root.join(fallback),
    }
}

pub fn resolve_paths() -> Result<SyncPaths> {
    let site_root = match env::var("SSBUY_SITE_ROOT") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => env::current_dir().context("current directory could not be resolved")?,
    };
    Ok(paths_for_root(site_root))
}

pub fn paths_for_root(site_root: PathBuf) -> SyncPaths {
    let giftcodes_sheet = env_or_site_path("SSBUY_GIFTCODES_SHEET", &site_root, "giftcodes.csv");
    let giftcodes_json =
        env_or_site_path("SSBUY_GIFTCODES_JSON", &site_root, "gift-codes-data.json");
    let catalog_sheet = env_or_site_path("SSBUY_CATALOG_SHEET", &site_root, "games.csv");
    let catalog_json = env_or_site_path("SSBUY_CATALOG_JSON", &site_root, "games.json");
    let sitemap_file = env_or_site_path("SSBUY_SITEMAP_PATH", &site_root, "sitemap.xml");
    let logs_dir = env_or_site_path("SSBUY_LOGS_DIR", &site_root, "logs");
    let config_file = env_or_site_path("SSBUY_CONFIG_PATH", &site_root, "ssbuy.toml");

    SyncPaths {
        site_root,
        giftcodes_sheet,
        giftcodes_json,
        catalog_sheet,
        catalog_json,
        sitemap_file,
        logs_dir,
        config_file,
    }
}
