use assert_cmd::prelude::*;
use serde_json::Value;
use std::path::Path;
use std::process::Command;

fn hidebox(store: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hidebox").expect("binary built");
    cmd.env("HIDEBOX_STORE", store)
        .env("RUST_LOG", "off")
        .args(["--config", "does-not-exist.yaml", "--output", "json"]);
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let assert = cmd.assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    serde_json::from_str(&stdout).expect("valid JSON payload")
}

#[test]
fn rules_round_trip_through_the_store_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");

    let added = json_stdout(hidebox(&store).args([
        "rules",
        "add",
        "--domain",
        "example.com",
        "--selector",
        ".ad-slot",
        "--note",
        "sidebar ads",
    ]));
    assert_eq!(added["added"], true);
    let id = added["rule"]["id"].as_str().unwrap().to_string();

    let toggled = json_stdout(hidebox(&store).args([
        "rules",
        "toggle",
        "--domain",
        "example.com",
        "--id",
        id.as_str(),
        "--disable",
    ]));
    assert_eq!(toggled["rule"]["enabled"], false);

    let listed = json_stdout(hidebox(&store).args(["rules", "list"]));
    assert_eq!(listed["example.com"]["rules"][0]["note"], "sidebar ads");

    let stats = json_stdout(hidebox(&store).args(["stats", "--domain", "example.com"]));
    assert_eq!(stats["rulesCount"], 1);
    assert_eq!(stats["enabledRulesCount"], 0);
}

#[test]
fn invalid_selectors_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");
    hidebox(&store)
        .args(["rules", "add", "--domain", "example.com", "--selector", "div["])
        .assert()
        .failure();
}

#[test]
fn export_and_import_between_stores() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");
    let bundle = dir.path().join("bundle.json");

    hidebox(&first)
        .args(["rules", "add", "--domain", "news.example.org", "--selector", "#paywall"])
        .assert()
        .success();
    hidebox(&first)
        .args(["export", "--output"])
        .arg(&bundle)
        .assert()
        .success();

    let summary = json_stdout(hidebox(&second).arg("import").arg(&bundle));
    assert_eq!(summary["domainsImported"], 1);

    let listed = json_stdout(hidebox(&second).args(["rules", "list", "--domain", "news.example.org"]));
    assert_eq!(listed["news.example.org"]["rules"][0]["selector"], "#paywall");
}

#[test]
fn inspect_reports_a_selector_for_a_fixture_element() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.json");
    let fixture = dir.path().join("page.json");
    std::fs::write(
        &fixture,
        r#"{
            "url": "https://shop.example.com/",
            "body": [
                {"tag": "div", "id": "promo-banner", "text": "Sale"},
                {"tag": "ul", "children": [
                    {"tag": "li", "classes": ["item"]},
                    {"tag": "li", "classes": ["item"]}
                ]}
            ]
        }"#,
    )
    .unwrap();

    let report = json_stdout(
        hidebox(&store)
            .args(["inspect", "--target", "#promo-banner", "--page"])
            .arg(&fixture),
    );
    assert_eq!(report["generated"]["selector"], "#promo-banner");
    assert_eq!(report["generated"]["strategy"], "unique-id");
    assert_eq!(report["description"]["tag"], "div");
}
