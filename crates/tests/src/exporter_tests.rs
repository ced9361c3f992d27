//! Configuration-to-Scrape Flow Tests
//!
//! These tests drive the same path the server binary does: build an
//! `AppConfig`, load the collector for the configured chain, and render a
//! scrape page against mock node endpoints.

use mockito::Server;
use vigil_core::collector;
use vigil_core::config::{AppConfig, ChainKind};

fn config_for(chain: ChainKind, api_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.target.chain = chain;
    config.target.api_url = api_url.to_string();
    config
}

#[tokio::test]
async fn test_collector_loads_per_configured_chain() {
    let tendermint = config_for(ChainKind::Tendermint, "http://localhost:1317");
    let solana = config_for(ChainKind::Solana, "http://localhost:8899");
    let evm = config_for(ChainKind::Evm, "http://localhost:8545");

    assert_eq!(collector::load(&tendermint).unwrap().chain(), "tendermint");
    assert_eq!(collector::load(&solana).unwrap().chain(), "solana");
    assert_eq!(collector::load(&evm).unwrap().chain(), "evm");
}

#[tokio::test]
async fn test_tendermint_scrape_renders_balances() {
    let mut server = Server::new_async().await;
    let _balances = server
        .mock("GET", "/bank/balances/cosmos1abc")
        .with_status(200)
        .with_body(r#"{"result": [{"denom": "uatom", "amount": "2000000"}]}"#)
        .create_async()
        .await;

    let mut config = config_for(ChainKind::Tendermint, &server.url());
    config.target.addresses = "cosmos1abc".to_string();

    let collector = collector::load(&config).unwrap();
    let page = collector.collect().await;

    assert!(page.contains("# HELP tendermint_address_available"));
    assert!(page.contains(r#"tendermint_address_available{address="cosmos1abc"} 2"#));
}

#[tokio::test]
async fn test_partial_node_outage_still_produces_a_page() {
    let mut server = Server::new_async().await;
    // Every endpoint answers 500; the scrape must still render, with the
    // affected gauges absent rather than zeroed.
    let _broken = server
        .mock("GET", mockito::Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let mut config = config_for(ChainKind::Tendermint, &server.url());
    config.target.addresses = "cosmos1abc".to_string();

    let collector = collector::load(&config).unwrap();
    let page = collector.collect().await;

    assert!(page.contains("# HELP"));
    assert!(!page.contains(r#"tendermint_address_available{address="cosmos1abc"}"#));
}

#[tokio::test]
async fn test_existing_metrics_page_is_appended() {
    let mut server = Server::new_async().await;
    let _exist = server
        .mock("GET", "/node-exporter/metrics")
        .with_status(200)
        .with_body("node_cpu_seconds_total 99\n")
        .create_async()
        .await;

    let mut config = config_for(ChainKind::Evm, &server.url());
    config.target.exist_metrics_url = Some(format!("{}/node-exporter/metrics", server.url()));

    let collector = collector::load(&config).unwrap();
    let page = collector.collect().await;

    assert!(page.ends_with("node_cpu_seconds_total 99\n"));
}

#[tokio::test]
async fn test_unreachable_existing_page_is_omitted() {
    let server = Server::new_async().await;

    let mut config = config_for(ChainKind::Evm, &server.url());
    config.target.exist_metrics_url = Some(format!("{}/node-exporter/metrics", server.url()));

    let collector = collector::load(&config).unwrap();
    let page = collector.collect().await;

    // The exporter's own families still render.
    assert!(page.contains("# HELP evm_block_number"));
    assert!(!page.contains("node_cpu_seconds_total"));
}
