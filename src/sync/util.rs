use anyhow::Result;
use std::time::{SystemTime, UNIX_EPOCH};

const FILENAME_ILLEGAL: [char; 12] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|', '!', '：', '！'];

pub fn now_epoch_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Strip characters that are not allowed (or not wanted) in image file names.
pub fn clean_filename(name: &str) -> String {
    name.chars().filter(|ch| !FILENAME_ILLEGAL.contains(ch)).collect()
}

/// Keep the first and last two characters of a secret, hide the rest.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.is_empty() {
        return "(unset)".to_string();
    }
    if chars.len() <= 6 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}…{tail}")
}
