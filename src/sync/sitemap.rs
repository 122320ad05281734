use crate::error::WarnCode;
use crate::sync::warn;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
const EXCLUDED_NAMES: [&str; 5] = ["404.html", "node_modules", ".git", ".github", "target"];
const GAME_PAGE: &str = "game-detail.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: String,
    pub changefreq: &'static str,
    pub priority: &'static str,
}

#[derive(Debug, Clone)]
pub struct SitemapOutcome {
    pub sitemap_path: PathBuf,
    pub static_pages: usize,
    pub game_pages: usize,
    pub games_unreadable: bool,
    pub written: bool,
}

/// Base URL with exactly one trailing slash.
pub fn normalize_base(base_url: &str) -> String {
    format!("{}/", base_url.trim().trim_end_matches('/'))
}

fn date_in(tz: Tz, at: DateTime<Utc>) -> String {
    at.with_timezone(&tz).format("%Y-%m-%d").to_string()
}

fn mtime_date(path: &Path, tz: Tz) -> Result<String> {
    let modified: SystemTime = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("failed to stat {}", path.display()))?;
    Ok(date_in(tz, DateTime::<Utc>::from(modified)))
}

/// URL path for an html file relative to the site root.
pub fn page_url_path(relative: &Path) -> String {
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    let joined = segments.join("/");
    if joined == "index.html" {
        return String::new();
    }
    let trimmed = joined.strip_suffix("/index.html").unwrap_or(&joined);
    trimmed
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn walk_html(dir: &Path, excluded: &[PathBuf], out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if EXCLUDED_NAMES.contains(&name.as_str()) || excluded.contains(&path) {
            continue;
        }
        // Symlinked directories are not followed.
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if file_type.is_dir() {
            walk_html(&path, excluded, out)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
        {
            out.push(path);
        }
    }
    Ok(())
}

pub fn static_pages(
    root: &Path,
    base_url: &str,
    excluded: &[PathBuf],
    tz: Tz,
) -> Result<Vec<SitemapEntry>> {
    let mut files = Vec::new();
    walk_html(root, excluded, &mut files)?;

    let base = normalize_base(base_url);
    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        let relative = file.strip_prefix(root).unwrap_or(&file);
        let url_path = page_url_path(relative);
        let priority = if relative.starts_with("games") {
            "0.8"
        } else {
            "0.7"
        };
        entries.push(SitemapEntry {
            loc: format!("{base}{url_path}"),
            lastmod: mtime_date(&file, tz)?,
            changefreq: "weekly",
            priority,
        });
    }
    Ok(entries)
}

fn parse_last_updated(raw: &str, tz: Tz) -> Option<String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(date_in(tz, at.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// One entry per game in `games`, in stored order.
pub fn game_pages(
    games: &IndexMap<String, Value>,
    base_url: &str,
    today: &str,
    tz: Tz,
) -> Vec<SitemapEntry> {
    let base = normalize_base(base_url);
    games
        .iter()
        .map(|(name, details)| {
            let lastmod = details
                .get("last_updated")
                .and_then(Value::as_str)
                .and_then(|raw| parse_last_updated(raw, tz))
                .unwrap_or_else(|| today.to_string());
            SitemapEntry {
                loc: format!("{base}{GAME_PAGE}?game={}", urlencoding::encode(name)),
                lastmod,
                changefreq: "daily",
                priority: "0.9",
            }
        })
        .collect()
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn render(entries: &[SitemapEntry]) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!("<urlset xmlns=\"{SITEMAP_NS}\">\n"));
    for entry in entries {
        xml.push_str("    <url>\n");
        xml.push_str(&format!("        <loc>{}</loc>\n", escape_xml(&entry.loc)));
        xml.push_str(&format!("        <lastmod>{}</lastmod>\n", entry.lastmod));
        xml.push_str(&format!(
            "        <changefreq>{}</changefreq>\n",
            entry.changefreq
        ));
        xml.push_str(&format!("        <priority>{}</priority>\n", entry.priority));
        xml.push_str("    </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

fn load_games(path: &Path) -> Result<IndexMap<String, Value>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub struct SitemapInput<'a> {
    pub site_root: &'a Path,
    pub games_json: &'a Path,
    pub sitemap_path: &'a Path,
    pub base_url: &'a str,
    pub timezone: &'a str,
    pub dry_run: bool,
}

pub fn generate(input: &SitemapInput<'_>) -> Result<SitemapOutcome> {
    let tz: Tz = input
        .timezone
        .parse()
        .map_err(|err| anyhow::anyhow!("invalid timezone `{}`: {err}", input.timezone))?;

    let excluded = vec![input.sitemap_path.to_path_buf()];
    let mut entries = static_pages(input.site_root, input.base_url, &excluded, tz)?;
    let static_count = entries.len();

    let today = date_in(tz, Utc::now());
    let mut games_unreadable = false;
    let games = match load_games(input.games_json) {
        Ok(games) => games,
        Err(err) => {
            games_unreadable = true;
            warn::emit(
                WarnCode::W007GamesUnreadable,
                "sitemap",
                &input.games_json.display().to_string(),
                "game pages left out of the sitemap",
                &format!("{err:#}"),
            );
            IndexMap::new()
        }
    };
    let game_entries = game_pages(&games, input.base_url, &today, tz);
    let game_count = game_entries.len();
    entries.extend(game_entries);

    let written = if input.dry_run {
        false
    } else {
        fs::write(input.sitemap_path, render(&entries))
            .with_context(|| format!("failed to write {}", input.sitemap_path.display()))?;
        true
    };

    Ok(SitemapOutcome {
        sitemap_path: input.sitemap_path.to_path_buf(),
        static_pages: static_count,
        game_pages: game_count,
        games_unreadable,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn index_pages_map_to_directory_urls() {
        assert_eq!(page_url_path(Path::new("index.html")), "");
        assert_eq!(page_url_path(Path::new("games/index.html")), "games");
        assert_eq!(page_url_path(Path::new("about.html")), "about.html");
        assert_eq!(
            page_url_path(Path::new("guides/新手.html")),
            "guides/%E6%96%B0%E6%89%8B.html"
        );
    }

    #[test]
    fn base_url_gets_one_trailing_slash() {
        assert_eq!(normalize_base("https://a.example"), "https://a.example/");
        assert_eq!(normalize_base("https://a.example//"), "https://a.example/");
    }

    #[test]
    fn game_pages_follow_stored_order_and_encode_names() {
        let games: IndexMap<String, Value> = serde_json::from_str(
            r#"{"原神": {"logo": "images/原神.jpg"}, "A&B": {"last_updated": "2025-03-04"}}"#,
        )
        .expect("parse");
        let entries = game_pages(&games, "https://www.ssbuy.tw/", "2026-01-01", Tz::Asia__Taipei);
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].loc,
            "https://www.ssbuy.tw/game-detail.html?game=%E5%8E%9F%E7%A5%9E"
        );
        assert_eq!(entries[0].lastmod, "2026-01-01");
        assert_eq!(entries[1].loc, "https://www.ssbuy.tw/game-detail.html?game=A%26B");
        assert_eq!(entries[1].lastmod, "2025-03-04");
        assert_eq!(entries[1].priority, "0.9");
    }

    #[test]
    fn rfc3339_last_updated_uses_site_timezone() {
        assert_eq!(
            parse_last_updated("2025-03-04T20:00:00Z", Tz::Asia__Taipei),
            Some("2025-03-05".to_string())
        );
        assert_eq!(parse_last_updated("soon", Tz::Asia__Taipei), None);
    }

    #[test]
    fn render_escapes_text() {
        let xml = render(&[SitemapEntry {
            loc: "https://a.example/?a=1&b=2".to_string(),
            lastmod: "2026-01-01".to_string(),
            changefreq: "daily",
            priority: "0.9",
        }]);
        assert!(xml.contains("<loc>https://a.example/?a=1&amp;b=2</loc>"));
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">"));
    }

    #[test]
    fn static_walk_skips_excluded_paths() {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path();
        fs::create_dir_all(root.join("games")).expect("mkdir games");
        fs::create_dir_all(root.join("node_modules/pkg")).expect("mkdir node_modules");
        fs::write(root.join("index.html"), "<html></html>").expect("write");
        fs::write(root.join("404.html"), "<html></html>").expect("write");
        fs::write(root.join("games/index.html"), "<html></html>").expect("write");
        fs::write(root.join("games/list.html"), "<html></html>").expect("write");
        fs::write(root.join("node_modules/pkg/readme.html"), "x").expect("write");
        fs::write(root.join("games.json"), "{}").expect("write");

        let entries =
            static_pages(root, "https://www.ssbuy.tw", &[], Tz::Asia__Taipei).expect("walk");
        let locs: Vec<&str> = entries.iter().map(|e| e.loc.as_str()).collect();
        assert_eq!(
            locs,
            vec![
                "https://www.ssbuy.tw/games",
                "https://www.ssbuy.tw/games/list.html",
                "https://www.ssbuy.tw/",
            ]
        );
        assert_eq!(entries[0].priority, "0.8");
        assert_eq!(entries[1].priority, "0.8");
        assert_eq!(entries[2].priority, "0.7");
        assert!(entries.iter().all(|e| e.changefreq == "weekly"));
    }

    #[cfg(unix)]
    #[test]
    fn static_walk_does_not_follow_directory_symlinks() {
        let tmp = tempdir().expect("tempdir");
        let root = tmp.path();
        fs::create_dir_all(root.join("guides")).expect("mkdir guides");
        fs::write(root.join("guides/start.html"), "<html></html>").expect("write");
        std::os::unix::fs::symlink(root, root.join("guides/loop")).expect("symlink to root");

        let entries =
            static_pages(root, "https://www.ssbuy.tw", &[], Tz::Asia__Taipei).expect("walk");
        let locs: Vec<&str> = entries.iter().map(|e| e.loc.as_str()).collect();
        assert_eq!(locs, vec!["https://www.ssbuy.tw/guides/start.html"]);
    }
}
