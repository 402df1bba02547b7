use hidebox_dom::{DocumentHandle, ElementSpec, PageFixture, SyntheticDocument};
use hidebox_selector_generator::{SelectorGenerator, StrategyTag};

fn page(fixture: PageFixture) -> SyntheticDocument {
    SyntheticDocument::from_fixture(&fixture).expect("fixture builds")
}

fn news_page() -> SyntheticDocument {
    page(
        PageFixture::new("https://news.example.com/today")
            .element(
                ElementSpec::new("header").id("masthead").child(
                    ElementSpec::new("nav")
                        .class("nav")
                        .child(ElementSpec::new("a").class("nav-item").text("Home"))
                        .child(ElementSpec::new("a").class("nav-item").class("active").text("World")),
                ),
            )
            .element(
                ElementSpec::new("div")
                    .id("ad-banner-1700000123")
                    .class("ad-banner")
                    .class("js-tracker")
                    .text("Sponsored"),
            )
            .element(
                ElementSpec::new("ul")
                    .child(ElementSpec::new("li").class("item").text("first"))
                    .child(ElementSpec::new("li").class("item").text("second")),
            )
            .element(
                ElementSpec::new("aside")
                    .child(ElementSpec::new("div").attr("data-slot", "sidebar-top"))
                    .child(ElementSpec::new("div").attr("role", "complementary")),
            ),
    )
}

#[test]
fn unique_id_wins_with_high_confidence() {
    let doc = news_page();
    let header = doc.query_selector("header").unwrap().unwrap();

    let generated = SelectorGenerator::new().generate(&doc, header);
    assert_eq!(generated.selector.as_deref(), Some("#masthead"));
    assert_eq!(generated.confidence, 0.9);
    assert_eq!(generated.strategy, Some(StrategyTag::UniqueId));
    assert!(generated.fallbacks.len() <= 3);
}

#[test]
fn dynamic_id_falls_through_to_classes() {
    let doc = news_page();
    let banner = doc.query_selector("div.ad-banner").unwrap().unwrap();

    let generated = SelectorGenerator::new().generate(&doc, banner);
    assert_eq!(generated.selector.as_deref(), Some("div.ad-banner"));
    assert_eq!(generated.strategy, Some(StrategyTag::StableClasses));
    assert_eq!(generated.confidence, 0.7);
    assert!(generated
        .fallbacks
        .iter()
        .all(|selector| !selector.contains("1700000123")));
}

#[test]
fn second_list_item_is_reachable_by_position() {
    let doc = news_page();
    let items = doc.query_selector_all("li").unwrap();
    let generator = SelectorGenerator::new();

    let generated = generator.generate(&doc, items[1]);
    assert_eq!(generated.selector.as_deref(), Some("li.item"));
    assert_eq!(generated.confidence, 0.6);
    assert!(generated.fallbacks.contains(&"li:nth-of-type(2)".to_string()));

    let by_position = doc.query_selector_all("li:nth-of-type(2)").unwrap();
    assert_eq!(by_position, vec![items[1]]);
}

#[test]
fn attribute_selectors_must_be_unique() {
    let doc = news_page();
    let slot = doc.query_selector("aside > div").unwrap().unwrap();

    let generated = SelectorGenerator::new().generate(&doc, slot);
    assert_eq!(generated.selector.as_deref(), Some("div[data-slot=\"sidebar-top\"]"));
    assert_eq!(generated.confidence, 0.8);
}

#[test]
fn state_classes_are_ignored() {
    let doc = news_page();
    let links = doc.query_selector_all("a.nav-item").unwrap();

    let generated = SelectorGenerator::new().generate(&doc, links[1]);
    let selector = generated.selector.unwrap();
    assert!(!selector.contains("active"));
    assert_eq!(selector, "a.nav-item");
}

#[test]
fn every_candidate_resolves_to_its_element() {
    let doc = news_page();
    let generator = SelectorGenerator::new();

    for element in doc.query_selector_all("body *").unwrap() {
        let generated = generator.generate(&doc, element);
        let selector = generated.selector.expect("every element gets a selector");
        for candidate in std::iter::once(&selector).chain(generated.fallbacks.iter()) {
            let matches = doc.query_selector_all(candidate).unwrap();
            assert!(matches.contains(&element), "{candidate} lost its element");
        }
        assert!(generator
            .check_fallbacks(&doc, element)
            .iter()
            .all(|check| check.valid));
    }
}
