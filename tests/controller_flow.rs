use std::sync::Arc;

use hidebox_bridge::{BridgeConfig, PageEndpoint, TabHost, TabId, TabInfo, TabRegistry};
use hidebox_cli::content::SharedPage;
use hidebox_cli::{Config, Controller, InstallReason, PageRuntime, TabStatus};
use hidebox_core_types::markers::HIDDEN_CLASS;
use hidebox_core_types::{now_millis, Rule};
use hidebox_dom::{DocumentHandle, ElementSpec, PageFixture, SyntheticDocument};
use hidebox_rule_store::{InMemoryStore, RuleRepository};
use hidebox_selection_session::TracingSink;
use parking_lot::Mutex;
use serde_json::json;
use tokio_util::sync::CancellationToken;

type Pages = Arc<Mutex<Vec<(TabId, SharedPage<SyntheticDocument>)>>>;

struct Harness {
    repo: RuleRepository,
    registry: Arc<TabRegistry>,
    controller: Arc<Controller>,
    pages: Pages,
}

fn harness() -> Harness {
    let repo = RuleRepository::new(Arc::new(InMemoryStore::new()), "1.0.0");
    let pages: Pages = Arc::default();

    let injector_repo = repo.clone();
    let injector_pages = pages.clone();
    let registry = TabRegistry::new(&BridgeConfig::default()).with_injector(Arc::new(
        move |tab: &TabInfo| -> Result<Arc<dyn PageEndpoint>, String> {
            let doc = SyntheticDocument::from_fixture(
                &PageFixture::new(tab.url.clone())
                    .element(ElementSpec::new("div").class("ad-slot").text("Sponsored"))
                    .element(ElementSpec::new("article").text("Story")),
            )
            .map_err(|err| err.to_string())?;
            let mut runtime = PageRuntime::new(
                doc,
                injector_repo.clone(),
                Arc::new(TracingSink),
                &Config::default(),
            );
            runtime.attach();
            let page = SharedPage::new(runtime);
            injector_pages.lock().push((tab.id, page.clone()));
            Ok(Arc::new(page))
        },
    ));
    let registry = Arc::new(registry);
    let host: Arc<dyn TabHost> = registry.clone();
    let controller = Arc::new(Controller::new(repo.clone(), host, &Config::default()));
    Harness {
        repo,
        registry,
        controller,
        pages,
    }
}

fn page(pages: &Pages, tab: TabId) -> SharedPage<SyntheticDocument> {
    pages
        .lock()
        .iter()
        .rev()
        .find(|(id, _)| *id == tab)
        .map(|(_, page)| page.clone())
        .expect("page injected")
}

async fn hidden_slots(page: &SharedPage<SyntheticDocument>) -> usize {
    let runtime = page.0.lock().await;
    let doc = runtime.doc();
    doc.query_selector_all(".ad-slot")
        .unwrap()
        .into_iter()
        .filter(|node| doc.has_class(*node, HIDDEN_CLASS))
        .count()
}

#[tokio::test]
async fn completed_load_injects_and_pushes_rules() {
    let h = harness();
    h.controller.on_installed(InstallReason::Install).await.unwrap();
    h.repo
        .append_rule("example.com", Rule::new(".ad-slot", 0.7, 1))
        .await
        .unwrap();

    let tab = TabInfo::new(1, "https://example.com/article");
    h.registry.open_tab(tab.clone());

    assert!(!h.controller.on_tab_updated(&tab, TabStatus::Loading).await.unwrap());
    assert!(!h.registry.is_attached(tab.id));

    assert!(h.controller.on_tab_updated(&tab, TabStatus::Complete).await.unwrap());
    assert!(h.registry.is_attached(tab.id));
    assert_eq!(hidden_slots(&page(&h.pages, tab.id)).await, 1);
}

#[tokio::test]
async fn pages_without_rules_or_outside_the_web_are_skipped() {
    let h = harness();
    let internal = TabInfo::new(1, "chrome://settings");
    let bare = TabInfo::new(2, "https://empty.example.org/");
    h.registry.open_tab(internal.clone());
    h.registry.open_tab(bare.clone());

    assert!(!h.controller.on_tab_updated(&internal, TabStatus::Complete).await.unwrap());
    assert!(!h.controller.on_tab_updated(&bare, TabStatus::Complete).await.unwrap());
    assert!(!h.registry.is_attached(bare.id));
}

#[tokio::test]
async fn snoozed_domains_are_left_alone_until_the_alarm_fires() {
    let h = harness();
    h.repo
        .append_rule("example.com", Rule::new(".ad-slot", 0.7, 1))
        .await
        .unwrap();
    let tab = TabInfo::new(3, "https://example.com/");
    h.registry.open_tab(tab.clone());

    let now = now_millis();
    let until = h.controller.snooze_domain(&tab, 10, now).await.unwrap();
    assert_eq!(until, now + 10 * 60_000);
    let alarms = h.controller.scheduled_alarms();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].name, "snooze-example.com");

    assert!(!h.controller.on_tab_updated(&tab, TabStatus::Complete).await.unwrap());

    assert!(h.controller.fire_due_alarms(now).await.unwrap().is_empty());
    let fired = h.controller.fire_due_alarms(until).await.unwrap();
    assert_eq!(fired, vec!["snooze-example.com".to_string()]);
    assert_eq!(h.repo.snooze_until("example.com").await.unwrap(), None);
    assert!(h.controller.on_tab_updated(&tab, TabStatus::Complete).await.unwrap());
}

#[tokio::test]
async fn storage_changes_reach_open_tabs() {
    let h = harness();
    let tab = TabInfo::new(4, "https://example.com/");
    h.registry.open_tab(tab.clone());
    h.repo
        .append_rule("example.com", Rule::new("article", 0.5, 1))
        .await
        .unwrap();
    assert!(h.controller.on_tab_updated(&tab, TabStatus::Complete).await.unwrap());
    let page = page(&h.pages, tab.id);
    assert_eq!(hidden_slots(&page).await, 0);

    let cancel = CancellationToken::new();
    let watcher = h.controller.clone().spawn_storage_watcher(cancel.clone());

    h.repo
        .append_rule("example.com", Rule::new(".ad-slot", 0.7, 2))
        .await
        .unwrap();

    let mut hidden = 0;
    for _ in 0..50 {
        hidden = hidden_slots(&page).await;
        if hidden == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(hidden, 1);

    cancel.cancel();
    watcher.await.unwrap();
}

#[tokio::test]
async fn saving_selected_elements_needs_a_sender_tab() {
    let h = harness();
    let tab = TabInfo::new(5, "https://shop.example.com/cart");
    let rule = Rule::new("#upsell", 0.95, 1);
    let message = json!({"action": "saveSelectedElements", "rules": [rule, rule.clone()]});

    let rejected = h.controller.handle_json(message.clone(), None).await;
    assert!(!rejected.ok);
    assert_eq!(rejected.error.as_deref(), Some("Invalid tab"));

    let saved = h.controller.handle_json(message, Some(&tab)).await;
    assert!(saved.ok);
    let rules = h.repo.rules_for_domain("shop.example.com").await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].selector, "#upsell");
}

#[tokio::test]
async fn export_then_import_through_messages() {
    let h = harness();
    h.repo
        .append_rule("example.com", Rule::new(".ad-slot", 0.7, 1))
        .await
        .unwrap();

    let exported = h
        .controller
        .handle_json(json!({"action": "exportAllData"}), None)
        .await;
    let bundle = exported.data.expect("bundle");
    assert!(bundle["domains"]["example.com"].is_object());

    let other = harness();
    let imported = other
        .controller
        .handle_json(json!({"action": "importData", "data": bundle}), None)
        .await;
    assert!(imported.ok);
    assert_eq!(
        other.repo.rules_for_domain("example.com").await.unwrap().len(),
        1
    );

    let broken = other
        .controller
        .handle_json(json!({"action": "importData", "data": {"domains": 7}}), None)
        .await;
    assert!(!broken.ok);

    let stats = other
        .controller
        .handle_json(json!({"action": "getDomainStats", "domain": "example.com"}), None)
        .await;
    assert_eq!(stats.data.unwrap()["rulesCount"], 1);
}

#[tokio::test]
async fn unknown_messages_and_ping() {
    let h = harness();
    assert!(h.controller.handle_json(json!({"action": "ping"}), None).await.is_pong());
    let reply = h.controller.handle_json(json!({"action": "reboot"}), None).await;
    assert_eq!(reply.error.as_deref(), Some("Unknown action"));
}
