use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const HEADER: &str = "遊戲名稱,橫幅圖片檔名,介紹,兌換方式1,兌換方式2,禮包碼1,內容物1,禮包碼2,內容物2";

fn sync_cmd(root: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ssbuy-sync");
    cmd.current_dir(root)
        .env("SSBUY_SITE_ROOT", root)
        .env("SSBUY_HOME", root)
        .env_remove("SSBUY_GIFTCODES_SHEET")
        .env_remove("SSBUY_GIFTCODES_JSON")
        .env_remove("SSBUY_LOGS_DIR");
    cmd
}

fn read_json(path: &Path) -> Value {
    let raw = fs::read_to_string(path).expect("read json");
    serde_json::from_str(&raw).expect("parse json")
}

#[test]
fn giftcodes_builds_new_entities_and_carries_absent_ones() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    fs::write(
        root.join("giftcodes.csv"),
        format!("{HEADER}\nGameA,,desc,,,X1,Gold,,\n"),
    )
    .expect("write sheet");
    fs::write(
        root.join("gift-codes-data.json"),
        r#"{"Old Game": {"banner": "b.jpg", "description": "kept", "howTo": [], "codes": []}}"#,
    )
    .expect("write prior");

    sync_cmd(root)
        .arg("giftcodes")
        .assert()
        .success()
        .stdout(predicate::str::contains("inserted=GameA"))
        .stdout(predicate::str::contains("carried_forward=Old Game"));

    let raw = fs::read_to_string(root.join("gift-codes-data.json")).expect("read output");
    assert!(raw.contains("giftcodesbanner/GameA-禮包碼.jpg"));
    assert!(!raw.contains("\\u"));

    let json = read_json(&root.join("gift-codes-data.json"));
    let keys: Vec<&String> = json.as_object().expect("object").keys().collect();
    assert_eq!(keys, vec!["Old Game", "GameA"]);
    assert_eq!(json["Old Game"]["description"], "kept");
    assert_eq!(
        json["GameA"]["codes"],
        serde_json::json!([{"code": "X1", "reward": "Gold"}])
    );
    assert_eq!(json["GameA"]["howTo"], serde_json::json!([]));

    let audit = fs::read_to_string(root.join("logs/audit.log")).expect("audit log");
    assert!(audit.contains("\"pipeline\":\"giftcodes\""));
}

#[test]
fn giftcodes_keeps_prior_banner_and_reports_reordered_codes_unchanged() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    fs::write(
        root.join("giftcodes.csv"),
        format!("{HEADER}\nGameA,,desc,Step 1,,B2,Gems,A1,Gold\n"),
    )
    .expect("write sheet");
    fs::write(
        root.join("gift-codes-data.json"),
        r#"{"GameA": {"banner": "custom.jpg", "description": "desc", "howTo": ["Step 1"],
            "codes": [{"code": "A1", "reward": "Gold"}, {"code": "B2", "reward": "Gems"}],
            "featured": true}}"#,
    )
    .expect("write prior");

    sync_cmd(root)
        .arg("giftcodes")
        .assert()
        .success()
        .stdout(predicate::str::contains("updated=-"))
        .stdout(predicate::str::contains("unchanged=1"));

    let json = read_json(&root.join("gift-codes-data.json"));
    assert_eq!(json["GameA"]["banner"], "custom.jpg");
    assert_eq!(json["GameA"]["codes"][0]["code"], "B2");
    assert_eq!(json["GameA"]["featured"], true);
}

#[test]
fn giftcodes_missing_sheet_fails_without_writing() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();

    sync_cmd(root)
        .arg("giftcodes")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required input sheet not found"));

    assert!(!root.join("gift-codes-data.json").exists());
}

#[test]
fn giftcodes_corrupt_state_starts_empty_with_warning() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    fs::write(
        root.join("giftcodes.csv"),
        format!("{HEADER}\nGameA,a.jpg,d,,,,,,\n"),
    )
    .expect("write sheet");
    fs::write(root.join("gift-codes-data.json"), "{not json").expect("write prior");

    sync_cmd(root)
        .arg("giftcodes")
        .assert()
        .success()
        .stderr(predicate::str::contains("SSBUY_WARN code=W001_STATE_CORRUPT"));

    let json = read_json(&root.join("gift-codes-data.json"));
    assert_eq!(json.as_object().expect("object").len(), 1);
    assert_eq!(json["GameA"]["banner"], "a.jpg");
}

#[test]
fn giftcodes_dry_run_leaves_output_untouched() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    fs::write(
        root.join("giftcodes.csv"),
        format!("{HEADER}\nGameA,,desc,,,X1,Gold,,\n"),
    )
    .expect("write sheet");

    sync_cmd(root)
        .args(["giftcodes", "--dry-run", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"command\": \"giftcodes\""))
        .stdout(predicate::str::contains("dry-run: output not written"));

    assert!(!root.join("gift-codes-data.json").exists());
}

#[test]
fn giftcodes_off_shape_entry_does_not_drop_the_file() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    fs::write(
        root.join("giftcodes.csv"),
        format!("{HEADER}\nGameC,,desc,,,C1,Gold,,\n"),
    )
    .expect("write sheet");
    fs::write(
        root.join("gift-codes-data.json"),
        r#"{"GameA": {"banner": "a.jpg", "description": null, "howTo": [], "codes": []},
            "GameB": {"banner": "b.jpg", "description": "kept", "howTo": [], "codes": []}}"#,
    )
    .expect("write prior");

    sync_cmd(root)
        .arg("giftcodes")
        .assert()
        .success()
        .stderr(predicate::str::contains("SSBUY_WARN code=W008_RECORD_KEPT_RAW"))
        .stdout(predicate::str::contains("prior=loaded(2, 1 kept raw)"));

    let json = read_json(&root.join("gift-codes-data.json"));
    let keys: Vec<&String> = json.as_object().expect("object").keys().collect();
    assert_eq!(keys, vec!["GameA", "GameB", "GameC"]);
    assert!(json["GameA"]["description"].is_null());
    assert_eq!(json["GameB"]["description"], "kept");
}
