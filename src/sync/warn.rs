use crate::error::WarnCode;

fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if !ch.is_control() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

fn format_line(code: WarnCode, stage: &str, entity: &str, reason: &str, err: &str) -> String {
    format!(
        "SSBUY_WARN code={} stage={} entity={} reason={} err={}",
        code.as_str(),
        sanitize_value(stage),
        sanitize_value(entity),
        sanitize_value(reason),
        sanitize_value(err),
    )
}

pub fn emit(code: WarnCode, stage: &str, entity: &str, reason: &str, err: &str) {
    eprintln!("{}", format_line(code, stage, entity, reason, err));
}
