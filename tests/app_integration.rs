use fxsync::core::dates::{days_ago, format_date, today};
use fxsync::core::{ExchangeSnapshot, FxError, RateSource};
use fxsync::providers::FastForexProvider;
use fxsync::repository::RateRepository;
use fxsync::store::PersistentStore;
use fxsync::sync::{RefreshWorker, run_refresh_cycle};
use std::fs;
use std::sync::Arc;
use tracing::info;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod test_utils {
    use super::*;

    pub async fn mount_fetch_all(server: &MockServer, base: &str, body: &str, expected: u64) {
        Mock::given(method("GET"))
            .and(path("/fetch-all"))
            .and(query_param("from", base))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(expected)
            .mount(server)
            .await;
    }

    pub fn write_config(dir: &std::path::Path, base_url: &str) -> std::path::PathBuf {
        let config_path = dir.join("config.yaml");
        let config_content = format!(
            r#"
            provider:
              base_url: {base_url}
              api_key: "test-key"
            base_currency: "MYR"
            data_path: {}
        "#,
            dir.join("store").display()
        );
        fs::write(&config_path, config_content).expect("Failed to write config file");
        config_path
    }
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let mock_server = MockServer::start().await;
    test_utils::mount_fetch_all(
        &mock_server,
        "MYR",
        r#"{"base": "MYR", "results": {"USD": 0.23, "EUR": 0.19}}"#,
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/currencies"))
        .and(query_param("api_key", "test-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"currencies": {"USD": "US Dollar", "EUR": "Euro"}}"#),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = test_utils::write_config(dir.path(), &mock_server.uri());

    // The second run is served from the on-disk store
    for _ in 0..2 {
        let result = fxsync::run_command(
            fxsync::AppCommand::Rates {
                base: None,
                filter: None,
            },
            Some(config_path.to_str().unwrap()),
        )
        .await;
        assert!(
            result.is_ok(),
            "Rates command failed with: {:?}",
            result.err()
        );
    }
}

#[test_log::test(tokio::test)]
async fn test_rates_command_fails_when_offline_without_cache() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = test_utils::write_config(dir.path(), "http://127.0.0.1:9");

    let result = fxsync::run_command(
        fxsync::AppCommand::Rates {
            base: Some("EUR".to_string()),
            filter: None,
        },
        Some(config_path.to_str().unwrap()),
    )
    .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("No cached rates for EUR"));
    assert!(err.downcast_ref::<FxError>().is_some_and(FxError::is_network));
}

#[test_log::test(tokio::test)]
async fn test_offline_serves_cached_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(PersistentStore::on_disk(dir.path()));
    let cached = ExchangeSnapshot::new("MYR", [("USD", 0.23), ("EUR", 0.19)]).unwrap();
    store.upsert_snapshot(&cached).await.unwrap();

    let source: Arc<dyn RateSource> =
        Arc::new(FastForexProvider::new("http://127.0.0.1:9", "").unwrap());
    let repository = RateRepository::new(Arc::clone(&store), source);

    assert_eq!(repository.get_rate("MYR").await.unwrap(), cached);

    let err = repository.get_rate("USD").await.unwrap_err();
    info!(%err, "Uncached lookup while offline");
    assert!(err.is_network());
}

#[test_log::test(tokio::test)]
async fn test_refresh_cycle_against_provider() {
    let mock_server = MockServer::start().await;
    test_utils::mount_fetch_all(
        &mock_server,
        "MYR",
        r#"{"base": "MYR", "results": {"USD": 0.24, "EUR": 0.2}}"#,
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/fetch-all"))
        .and(query_param("from", "EUR"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(PersistentStore::on_disk(dir.path()));
    let stale_eur = ExchangeSnapshot::new("EUR", [("USD", 1.05)]).unwrap();
    store
        .upsert_snapshot(&ExchangeSnapshot::new("MYR", [("USD", 0.23)]).unwrap())
        .await
        .unwrap();
    store.upsert_snapshot(&stale_eur).await.unwrap();

    let worker = RefreshWorker::spawn(Arc::new(
        FastForexProvider::new(&mock_server.uri(), "test-key").unwrap(),
    ));
    let report = run_refresh_cycle(&store, &worker).await.unwrap();

    assert_eq!(report.refreshed.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].base_currency, "EUR");

    let myr = store.get_snapshot("MYR").await.unwrap().unwrap();
    assert_eq!(myr.rate("USD"), Some(0.24));
    assert_eq!(myr.rate("EUR"), Some(0.2));
    assert_eq!(store.get_snapshot("EUR").await.unwrap(), Some(stale_eur));
}

#[test_log::test(tokio::test)]
async fn test_trend_requests_trailing_window() {
    let now = today();
    let start = format_date(days_ago(now, 14).unwrap());
    let end = format_date(days_ago(now, 1).unwrap());

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/time-series"))
        .and(query_param("from", "EUR"))
        .and(query_param("to", "USD"))
        .and(query_param("start", start.as_str()))
        .and(query_param("end", end.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"{{"results": {{"USD": {{"{start}": 1.08, "{end}": 1.1}}}}}}"#
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(PersistentStore::in_memory());
    let source: Arc<dyn RateSource> =
        Arc::new(FastForexProvider::new(&mock_server.uri(), "").unwrap());
    let repository = RateRepository::new(store, source);

    let series = repository.get_time_series("EUR", 14).await.unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(
        series.get(&days_ago(now, 1).unwrap()),
        Some(1.1),
        "end of window should be yesterday"
    );
}

#[test_log::test(tokio::test)]
async fn test_convert_and_currencies_commands() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/convert"))
        .and(query_param("from", "USD"))
        .and(query_param("to", "EUR"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"result": {"EUR": 92.1}}"#))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/currencies"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"currencies": {"EUR": "Euro"}}"#),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = test_utils::write_config(dir.path(), &mock_server.uri());
    let config_path = config_path.to_str().unwrap();

    let commands = [
        fxsync::AppCommand::Convert {
            from: "usd".to_string(),
            to: "eur".to_string(),
            amount: 100.0,
        },
        fxsync::AppCommand::Currencies { refresh: false },
        fxsync::AppCommand::Currencies { refresh: false },
        fxsync::AppCommand::Currencies { refresh: true },
    ];
    for command in commands {
        let result = fxsync::run_command(command.clone(), Some(config_path)).await;
        assert!(result.is_ok(), "{command:?} failed with: {:?}", result.err());
    }
}
