use crate::error::SyncError;
use crate::sync::reconcile::{self, Change, Merged, ReconcileReport};
use crate::sync::sheet::{Sheet, SheetRow, entity_name, load_sheet};
use crate::sync::store::{self, PriorStatus, Stored};
use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

pub const NAME_COLUMN: &str = "遊戲名稱";
pub const BANNER_COLUMN: &str = "橫幅圖片檔名";
pub const DESCRIPTION_COLUMN: &str = "介紹";
pub const HOW_TO_PREFIX: &str = "兌換方式";
pub const CODE_PREFIX: &str = "禮包碼";
pub const REWARD_PREFIX: &str = "內容物";
pub const CODE_SLOTS: usize = 19;

const STAGE: &str = "giftcodes";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GiftCode {
    pub code: String,
    pub reward: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GiftCodeRecord {
    pub banner: String,
    pub description: String,
    #[serde(rename = "howTo")]
    pub how_to: Vec<String>,
    pub codes: Vec<GiftCode>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// A gift-code row as read from the sheet, before merging with stored state.
#[derive(Debug, Clone, PartialEq)]
pub struct GiftCodeCandidate {
    pub banner: String,
    pub description: String,
    pub how_to: Vec<String>,
    pub codes: Vec<GiftCode>,
}

#[derive(Debug, Clone)]
pub struct GiftCodeColumns {
    name: usize,
    banner: Option<usize>,
    description: Option<usize>,
    how_to: Vec<usize>,
    codes: Vec<(Option<usize>, Option<usize>)>,
}

impl GiftCodeColumns {
    pub fn resolve(sheet: &Sheet) -> Result<Self> {
        let name = sheet.column(NAME_COLUMN).ok_or_else(|| {
            SyncError::InvalidSheet(format!("gift-code sheet has no `{NAME_COLUMN}` column"))
        })?;
        let codes = (1..=CODE_SLOTS)
            .map(|i| {
                (
                    sheet.column(&format!("{CODE_PREFIX}{i}")),
                    sheet.column(&format!("{REWARD_PREFIX}{i}")),
                )
            })
            .collect();
        Ok(Self {
            name,
            banner: sheet.column(BANNER_COLUMN),
            description: sheet.column(DESCRIPTION_COLUMN),
            how_to: sheet.columns_with_prefix(HOW_TO_PREFIX),
            codes,
        })
    }
}

pub fn default_banner(name: &str) -> String {
    format!("giftcodesbanner/{name}-禮包碼.jpg")
}

/// Build the candidate for one row; `None` when the row has no usable name.
pub fn build_candidate(
    columns: &GiftCodeColumns,
    row: &SheetRow,
) -> Option<(String, GiftCodeCandidate)> {
    let name = entity_name(row.cell(columns.name))?;

    let how_to = columns
        .how_to
        .iter()
        .map(|&col| row.cell(col))
        .filter(|cell| !cell.is_empty())
        .map(ToOwned::to_owned)
        .collect();

    // Every slot is checked; a gap does not end the scan.
    let codes = columns
        .codes
        .iter()
        .filter_map(|&(code_col, reward_col)| {
            let code = row.cell_at(code_col);
            let reward = row.cell_at(reward_col);
            if code.is_empty() || reward.is_empty() {
                return None;
            }
            Some(GiftCode {
                code: code.to_string(),
                reward: reward.to_string(),
            })
        })
        .collect();

    Some((
        name,
        GiftCodeCandidate {
            banner: row.cell_at(columns.banner).to_string(),
            description: row.cell_at(columns.description).to_string(),
            how_to,
            codes,
        },
    ))
}

/// Codes compare as a set of `(code, reward)` pairs.
pub fn same_codes(a: &[GiftCode], b: &[GiftCode]) -> bool {
    let mut left = a.to_vec();
    let mut right = b.to_vec();
    left.sort();
    right.sort();
    left == right
}

pub fn merge(
    name: &str,
    prior: Option<&GiftCodeRecord>,
    candidate: GiftCodeCandidate,
) -> Merged<GiftCodeRecord> {
    let banner = if !candidate.banner.is_empty() {
        candidate.banner
    } else {
        match prior {
            Some(existing) if !existing.banner.is_empty() => existing.banner.clone(),
            _ => default_banner(name),
        }
    };

    let mut record = prior.cloned().unwrap_or_default();
    record.banner = banner;
    record.description = candidate.description;
    record.how_to = candidate.how_to;
    record.codes = candidate.codes;

    let change = match prior {
        None => Change::Inserted,
        Some(existing) => Change::from_fields(changed_fields(existing, &record)),
    };
    Merged { record, change }
}

fn codes_value(codes: &[GiftCode]) -> Value {
    Value::Array(
        codes
            .iter()
            .map(|c| serde_json::json!({"code": c.code, "reward": c.reward}))
            .collect(),
    )
}

/// `merge` over stored state. A raw stored object is patched in place so its
/// other keys survive; any other raw value is replaced as if absent.
pub fn merge_stored(
    name: &str,
    prior: Option<&Stored<GiftCodeRecord>>,
    candidate: GiftCodeCandidate,
) -> Merged<Stored<GiftCodeRecord>> {
    let raw = match prior {
        Some(Stored::Typed(record)) => {
            return merge(name, Some(record), candidate).map(Stored::Typed);
        }
        Some(Stored::Raw(raw)) if raw.is_object() => raw,
        _ => return merge(name, None, candidate).map(Stored::Typed),
    };

    let stored_banner = raw
        .get("banner")
        .and_then(Value::as_str)
        .filter(|banner| !banner.is_empty());
    let banner = match (candidate.banner.as_str(), stored_banner) {
        ("", Some(stored)) => stored.to_string(),
        ("", None) => default_banner(name),
        (sheet, _) => sheet.to_string(),
    };
    let how_to = candidate.how_to.into_iter().map(Value::String).collect();

    let (patched, fields) = store::patch_fields(
        raw,
        vec![
            ("banner", Value::String(banner)),
            ("description", Value::String(candidate.description)),
            ("howTo", Value::Array(how_to)),
            ("codes", codes_value(&candidate.codes)),
        ],
    );
    Merged {
        record: Stored::from_value(patched).0,
        change: Change::from_fields(fields),
    }
}

fn changed_fields(old: &GiftCodeRecord, new: &GiftCodeRecord) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if old.banner != new.banner {
        fields.push("banner");
    }
    if old.description != new.description {
        fields.push("description");
    }
    if old.how_to != new.how_to {
        fields.push("howTo");
    }
    if !same_codes(&old.codes, &new.codes) {
        fields.push("codes");
    }
    fields
}

#[derive(Debug, Clone)]
pub struct GiftCodesOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct GiftCodesOutcome {
    pub sheet_path: PathBuf,
    pub output_path: PathBuf,
    pub rows: usize,
    pub prior_status: PriorStatus,
    pub report: ReconcileReport,
    pub entity_count: usize,
    pub written: bool,
}

pub fn sync(
    sheet_path: PathBuf,
    output_path: PathBuf,
    opts: &GiftCodesOptions,
) -> Result<GiftCodesOutcome> {
    let sheet = load_sheet(&sheet_path)?;
    let columns = GiftCodeColumns::resolve(&sheet)?;

    let (prior, prior_status) = store::load_prior::<GiftCodeRecord>(&output_path, STAGE)?;

    let candidates: Vec<(String, GiftCodeCandidate)> = sheet
        .rows
        .iter()
        .filter_map(|row| build_candidate(&columns, row))
        .collect();
    let rows = candidates.len();

    let reconciled = reconcile::reconcile(STAGE, &prior, candidates, merge_stored);

    let written = if opts.dry_run {
        false
    } else {
        store::save(&output_path, &reconciled.entities)?;
        true
    };

    Ok(GiftCodesOutcome {
        sheet_path,
        output_path,
        rows,
        prior_status,
        entity_count: reconciled.entities.len(),
        report: reconciled.report,
        written,
    })
}
