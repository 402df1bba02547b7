use std::sync::Arc;
use std::time::Duration;

use hidebox_cli::{Config, PageRuntime};
use hidebox_core_types::markers::HIDDEN_CLASS;
use hidebox_core_types::Rule;
use hidebox_dom::{DocumentHandle, ElementSpec, PageFixture, SyntheticDocument};
use hidebox_rule_store::{InMemoryStore, RuleRepository};
use hidebox_selection_session::TracingSink;
use tokio::time::Instant;

async fn feed_runtime(config: &Config) -> PageRuntime<SyntheticDocument> {
    let doc = SyntheticDocument::from_fixture(
        &PageFixture::new("https://feed.example.com/")
            .element(ElementSpec::new("main").id("feed"))
            .element(ElementSpec::new("div").class("ad-slot")),
    )
    .expect("fixture builds");
    let repo = RuleRepository::new(Arc::new(InMemoryStore::new()), "1.0.0");
    repo.append_rule("feed.example.com", Rule::new(".ad-slot", 0.7, 1))
        .await
        .unwrap();
    let mut runtime = PageRuntime::new(doc, repo, Arc::new(TracingSink), config);
    runtime.initialize(0).await.unwrap();
    runtime
}

fn insert_slots(runtime: &mut PageRuntime<SyntheticDocument>, count: usize) {
    let doc = runtime.doc_mut();
    let feed = doc.query_selector("#feed").unwrap().unwrap();
    for _ in 0..count {
        doc.append_spec(feed, &ElementSpec::new("div").class("ad-slot"))
            .unwrap();
    }
}

fn hidden(runtime: &PageRuntime<SyntheticDocument>) -> usize {
    let doc = runtime.doc();
    doc.query_selector_all(".ad-slot")
        .unwrap()
        .into_iter()
        .filter(|node| doc.has_class(*node, HIDDEN_CLASS))
        .count()
}

#[tokio::test(start_paused = true)]
async fn late_insertions_are_hidden_once_the_page_settles() {
    let mut runtime = feed_runtime(&Config::default()).await;
    assert_eq!(hidden(&runtime), 1);

    insert_slots(&mut runtime, 4);
    assert_eq!(hidden(&runtime), 1);

    assert_eq!(runtime.settle().await, 1);
    assert_eq!(hidden(&runtime), 5);
    assert_eq!(runtime.hider().stats().total_elements, 5);
}

#[tokio::test(start_paused = true)]
async fn configured_debounce_window_is_honored() {
    let config = Config {
        debounce_ms: 250,
        ..Config::default()
    };
    let mut runtime = feed_runtime(&config).await;

    let t0 = Instant::now();
    insert_slots(&mut runtime, 2);
    assert!(!runtime.pump_mutations(t0));
    assert!(!runtime.pump_mutations(t0 + Duration::from_millis(100)));
    assert_eq!(hidden(&runtime), 1);
    assert!(runtime.pump_mutations(t0 + Duration::from_millis(250)));
    assert_eq!(hidden(&runtime), 3);
}

#[tokio::test(start_paused = true)]
async fn snoozed_pages_do_not_react_to_insertions() {
    let mut runtime = feed_runtime(&Config::default()).await;
    let reply = runtime.handle_json(serde_json::json!({"action": "snoozeDomain", "minutes": 5}));
    assert!(reply.ok);
    assert_eq!(hidden(&runtime), 0);

    insert_slots(&mut runtime, 3);
    assert_eq!(runtime.settle().await, 0);
    assert_eq!(hidden(&runtime), 0);
    assert!(!runtime.hider().stats().is_active);
}
