#![allow(missing_docs)]

use starter::hooks::COUNT_KEY;
use starter::routes::Home;
use starter::{APP_TITLE, BUNDLE_NAME};
use tally::init_data::generate_init_data_script;
use tally::server::render_document;
use tally::{ServerConfig, Store, StoreConfig, mount};

#[tokio::test]
async fn home_is_served_with_loaded_count() {
    let store = Store::new();
    let config = ServerConfig::default().title(APP_TITLE).bundle(BUNDLE_NAME);

    let document = render_document(&store, &Home::default(), &config).await;

    assert!(document.contains(r#"<span class="count">0</span>"#));
    assert!(!document.contains(r#"data-state="loading""#));
    assert!(document.contains(r#"data-action="count-up""#));
    assert!(document.contains(r#"window.INIT_DATA = {"count":0};"#));
    assert!(document.contains("<title>Tally Starter Kit</title>"));
    assert!(document.contains(r#"import init from "/pkg/starter.js""#));
}

#[tokio::test]
async fn client_store_seeded_from_snapshot_matches_server() {
    let server = Store::new();
    let config = ServerConfig::default();
    let document = render_document(&server, &Home::default(), &config).await;
    let snapshot = server.snapshot();

    assert!(document.contains(&generate_init_data_script(&snapshot)));

    let client = Store::with_config(StoreConfig::default().with_snapshot(snapshot));
    let page = mount(&client, Home::default());

    assert!(page.html().text_content().contains("Count: 0"));
    assert!(!client.is_validating(COUNT_KEY));
}
