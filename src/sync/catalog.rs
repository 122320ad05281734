use crate::error::WarnCode;
use crate::sync::config::{ExistingPolicy, SearchConfig};
use crate::sync::reconcile::{self, Change, Merged, ReconcileReport};
use crate::sync::search::{DisabledSearch, GoogleSearch, LinkSearch, Lookup, RateLimitedClient};
use crate::sync::sheet::{SheetRow, entity_name, load_sheet};
use crate::sync::store::{self, PriorStatus, Stored};
use crate::sync::util::clean_filename;
use crate::sync::warn;
use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

pub const NAME_COL: usize = 0;
pub const GIFT_URL_COL: usize = 5;
pub const DESCRIPTION_COL: usize = 7;
pub const PRODUCTS_START_COL: usize = 8;

pub const GIFT_LINK_LABEL: &str = "禮包碼";

const STAGE: &str = "catalog";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogRecord {
    pub logo: String,
    pub products: Vec<Product>,
    pub social: IndexMap<String, String>,
    pub description: String,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowIssue {
    InvalidPrice {
        column: usize,
        product: String,
        price: String,
    },
    PriceWithoutName {
        column: usize,
        price: String,
    },
}

/// A catalog row as read from the sheet, before merging with stored state.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogCandidate {
    pub logo: String,
    pub gift_link: String,
    pub description: String,
    pub products: Vec<Product>,
    pub issues: Vec<RowIssue>,
    pub line: u64,
}

pub fn logo_path(name: &str) -> String {
    format!("images/{}.jpg", clean_filename(name))
}

pub fn default_gift_link(name: &str) -> String {
    format!("gift-codes.html?game={name}")
}

/// Product name/price pairs from `PRODUCTS_START_COL`, two columns at a time.
///
/// The list is contiguous: the first pair with both cells empty ends it, as
/// does a trailing name column with no price column after it.
pub fn parse_products(row: &SheetRow) -> (Vec<Product>, Vec<RowIssue>) {
    let mut products = Vec::new();
    let mut issues = Vec::new();

    let mut col = PRODUCTS_START_COL;
    while col + 1 < row.len() {
        let name = row.cell(col);
        let price = row.cell(col + 1);
        if name.is_empty() && price.is_empty() {
            break;
        }

        if name.is_empty() {
            issues.push(RowIssue::PriceWithoutName {
                column: col,
                price: price.to_string(),
            });
        } else {
            match price.parse::<i64>() {
                Ok(price) => products.push(Product {
                    name: name.to_string(),
                    price,
                }),
                Err(_) => issues.push(RowIssue::InvalidPrice {
                    column: col,
                    product: name.to_string(),
                    price: price.to_string(),
                }),
            }
        }
        col += 2;
    }

    (products, issues)
}

pub fn build_candidate(row: &SheetRow) -> Option<(String, CatalogCandidate)> {
    let name = entity_name(row.cell(NAME_COL))?;

    let gift_link = match row.cell(GIFT_URL_COL) {
        "" => default_gift_link(&name),
        url => url.to_string(),
    };
    let (products, issues) = parse_products(row);

    let candidate = CatalogCandidate {
        logo: logo_path(&name),
        gift_link,
        description: row.cell(DESCRIPTION_COL).to_string(),
        products,
        issues,
        line: row.line,
    };
    Some((name, candidate))
}

fn report_issues(name: &str, candidate: &CatalogCandidate) {
    for issue in &candidate.issues {
        match issue {
            RowIssue::InvalidPrice {
                column,
                product,
                price,
            } => warn::emit(
                WarnCode::W002PriceInvalid,
                STAGE,
                name,
                &format!(
                    "line {} column {}: product `{product}` has price `{price}`; product skipped",
                    candidate.line,
                    column + 2
                ),
                "",
            ),
            RowIssue::PriceWithoutName { column, price } => warn::emit(
                WarnCode::W003PriceWithoutName,
                STAGE,
                name,
                &format!(
                    "line {} column {}: price `{price}` has no product name; pair skipped",
                    candidate.line,
                    column + 1
                ),
                "",
            ),
        }
    }
}

fn sorted_pairs(list: &[Product]) -> Vec<(&str, i64)> {
    let mut pairs: Vec<(&str, i64)> = list.iter().map(|p| (p.name.as_str(), p.price)).collect();
    pairs.sort();
    pairs
}

/// Products compare as sorted `(name, price)` pairs.
pub fn same_products(a: &[Product], b: &[Product]) -> bool {
    sorted_pairs(a) == sorted_pairs(b)
}

/// Look up the four searched links and slot the gift link in between.
pub fn enrich_social<L: Lookup>(
    name: &str,
    gift_link: String,
    lookup: &mut L,
) -> IndexMap<String, String> {
    let facebook = lookup.lookup(&format!("{name} FB"));
    let website = lookup.lookup(&format!("{name} 官方"));
    let app_store = lookup.lookup(&format!("{name} site:apps.apple.com/tw"));
    let bahamut = lookup.lookup(&format!("{name} 巴哈"));

    let mut social = IndexMap::new();
    social.insert("Facebook".to_string(), facebook);
    social.insert("官方網站".to_string(), website);
    social.insert(GIFT_LINK_LABEL.to_string(), gift_link);
    social.insert("App Store".to_string(), app_store);
    social.insert("巴哈姆特".to_string(), bahamut);
    social
}

/// Existing games are refreshed per `policy` and never searched; new games
/// get every field computed, including searched social links.
pub fn merge<L: Lookup>(
    name: &str,
    prior: Option<&CatalogRecord>,
    candidate: CatalogCandidate,
    policy: ExistingPolicy,
    lookup: &mut L,
) -> Merged<CatalogRecord> {
    let Some(existing) = prior else {
        let social = enrich_social(name, candidate.gift_link, lookup);
        return Merged {
            record: CatalogRecord {
                logo: candidate.logo,
                products: candidate.products,
                social,
                description: candidate.description,
                extra: IndexMap::new(),
            },
            change: Change::Inserted,
        };
    };

    let mut record = existing.clone();
    let mut fields = Vec::new();
    if policy == ExistingPolicy::RefreshProducts {
        if !same_products(&existing.products, &candidate.products) {
            fields.push("products");
        }
        record.products = candidate.products;
    }
    if existing.description != candidate.description {
        fields.push("description");
    }
    record.description = candidate.description;

    Merged {
        record,
        change: Change::from_fields(fields),
    }
}

fn products_value(products: &[Product]) -> Value {
    Value::Array(
        products
            .iter()
            .map(|p| serde_json::json!({"name": p.name, "price": p.price}))
            .collect(),
    )
}

/// `merge` over stored state. A raw stored object counts as an existing game:
/// the refreshed fields are patched in and nothing is searched.
pub fn merge_stored<L: Lookup>(
    name: &str,
    prior: Option<&Stored<CatalogRecord>>,
    candidate: CatalogCandidate,
    policy: ExistingPolicy,
    lookup: &mut L,
) -> Merged<Stored<CatalogRecord>> {
    let raw = match prior {
        Some(Stored::Typed(record)) => {
            return merge(name, Some(record), candidate, policy, lookup).map(Stored::Typed);
        }
        Some(Stored::Raw(raw)) if raw.is_object() => raw,
        _ => return merge(name, None, candidate, policy, lookup).map(Stored::Typed),
    };

    let mut updates = Vec::new();
    if policy == ExistingPolicy::RefreshProducts {
        updates.push(("products", products_value(&candidate.products)));
    }
    updates.push(("description", Value::String(candidate.description)));
    let (patched, fields) = store::patch_fields(raw, updates);
    Merged {
        record: Stored::from_value(patched).0,
        change: Change::from_fields(fields),
    }
}

#[derive(Debug, Clone)]
pub struct CatalogOptions {
    pub dry_run: bool,
    pub policy: ExistingPolicy,
}

#[derive(Debug, Clone)]
pub struct CatalogOutcome {
    pub sheet_path: PathBuf,
    pub output_path: PathBuf,
    pub rows: usize,
    pub prior_status: PriorStatus,
    pub report: ReconcileReport,
    pub entity_count: usize,
    pub row_issues: usize,
    pub search_calls: usize,
    pub search_failures: usize,
    pub search_skipped: usize,
    pub written: bool,
}

pub fn sync(
    sheet_path: PathBuf,
    output_path: PathBuf,
    search_cfg: &SearchConfig,
    opts: &CatalogOptions,
) -> Result<CatalogOutcome> {
    if search_cfg.has_credentials() {
        let client = RateLimitedClient::from_config(GoogleSearch::new(search_cfg)?, search_cfg);
        sync_with(sheet_path, output_path, client, opts)
    } else {
        let client = RateLimitedClient::from_config(DisabledSearch, search_cfg);
        sync_with(sheet_path, output_path, client, opts)
    }
}

fn sync_with<S: LinkSearch>(
    sheet_path: PathBuf,
    output_path: PathBuf,
    mut client: RateLimitedClient<S>,
    opts: &CatalogOptions,
) -> Result<CatalogOutcome> {
    let sheet = load_sheet(&sheet_path)?;
    let (prior, prior_status) = store::load_prior::<CatalogRecord>(&output_path, STAGE)?;

    let candidates: Vec<(String, CatalogCandidate)> =
        sheet.rows.iter().filter_map(build_candidate).collect();
    let rows = candidates.len();
    let mut row_issues = 0usize;

    let reconciled = reconcile::reconcile(STAGE, &prior, candidates, |name, existing, candidate| {
        report_issues(name, &candidate);
        row_issues += candidate.issues.len();
        merge_stored(name, existing, candidate, opts.policy, &mut client)
    });

    let written = if opts.dry_run {
        false
    } else {
        store::save(&output_path, &reconciled.entities)?;
        true
    };

    Ok(CatalogOutcome {
        sheet_path,
        output_path,
        rows,
        prior_status,
        entity_count: reconciled.entities.len(),
        report: reconciled.report,
        row_issues,
        search_calls: client.calls,
        search_failures: client.failures,
        search_skipped: client.skipped,
        written,
    })
}
