use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const KEY_PREFIX: &str = "\"SSBUY_";

fn rust_sources(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(next) = pending.pop() {
        for entry in fs::read_dir(&next)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                found.push(path);
            }
        }
    }
    Ok(found)
}

/// Env keys are read through whole string literals such as `"SSBUY_SITE_ROOT"`;
/// text that merely starts with the prefix (log lines, docs) is not a key.
fn literal_keys(source: &str) -> impl Iterator<Item = &str> {
    source.match_indices(KEY_PREFIX).filter_map(|(at, _)| {
        let rest = &source[at + 1..];
        let end = rest.find('"')?;
        let key = &rest[..end];
        key.bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
            .then_some(key)
    })
}

fn main() -> std::io::Result<()> {
    let mut keys = BTreeSet::new();
    for file in rust_sources(Path::new("src"))? {
        let source = fs::read_to_string(&file)?;
        keys.extend(literal_keys(&source).map(str::to_owned));
    }

    let body: String = keys.iter().map(|key| format!("    \"{key}\",\n")).collect();
    let out_dir = env::var("OUT_DIR").map_err(std::io::Error::other)?;
    fs::write(
        Path::new(&out_dir).join("env_allowlist.rs"),
        format!("pub const GENERATED_ENV_ALLOWLIST: &[&str] = &[\n{body}];\n"),
    )?;

    let built = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    println!(
        "cargo:rustc-env=BUILD_UUID={:x}-{:x}",
        built.as_secs(),
        built.subsec_nanos()
    );
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
