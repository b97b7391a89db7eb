//! End-to-end report pipeline tests against a mock HTTP listing source.

use listing_report::{Config, ReportRunner};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_primary_engine(server: &MockServer) {
    // Known-length source: 3 pages, page 1 always fails
    Mock::given(method("GET"))
        .and(path("/primary"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"total_pages": 3},
            "results": [
                {"nome": "Posto Beta", "uf": "ES",
                 "latitude": "-20.646434548320997, -40.52329658650793",
                 "longitude": "-20.646434548320997, -40.52329658650793"},
                {"nome": "Posto Beta", "uf": "ES",
                 "latitude": "-20.646434548320997, -40.52329658650793",
                 "longitude": "-20.646434548320997, -40.52329658650793"},
                {"nome": "Posto Alfa", "uf": "ES",
                 "latitude": "19°33'19.5\"S", "longitude": "40°31'23.9\"W"},
            ],
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/primary"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/primary"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"total_pages": 3},
            "results": [
                {"nome": "Posto Fora", "uf": "RJ", "latitude": "-22.9", "longitude": "-43.2"},
            ],
        })))
        .mount(server)
        .await;
}

async fn mount_secondary_engine(server: &MockServer) {
    // Unknown-length source: one non-empty page, then exhaustion
    Mock::given(method("GET"))
        .and(path("/secondary"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        {"nome": "Posto Zeta", "uf": " es ",
         "latitude": "-2064643454832099", "longitude": "-4052329658650793"},
        ])))
        .mount(server)
        .await;

    // Every other page is empty
    Mock::given(method("GET"))
        .and(path("/secondary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

fn test_config(server: &MockServer, dir: &std::path::Path) -> Config {
    serde_json::from_value(json!({
        "report": {
            "concurrency": 4,
            "report_dir": dir.join("reports"),
            "raw_dir": dir.join("reports/raws"),
            "region_filter": "ES",
        },
        "engines": [
            {
                "name": "primary",
                "base_url": format!("{}/primary", server.uri()),
                "records_pointer": "/results",
                "total": {"kind": "pages", "pointer": "/meta/total_pages"},
            },
            {
                "name": "secondary",
                "base_url": format!("{}/secondary", server.uri()),
            },
        ],
    }))
    .expect("config should deserialize")
}

async fn files_with_suffix(dir: &std::path::Path, suffix: &str) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.expect("read_dir failed");
    while let Some(entry) = entries.next_entry().await.expect("next_entry failed") {
        let path = entry.path();
        if path.is_file() && path.to_string_lossy().ends_with(suffix) {
            found.push(path);
        }
    }
    found
}

#[tokio::test]
async fn full_pipeline_produces_report_and_error_log() {
    let server = MockServer::start().await;
    mount_primary_engine(&server).await;
    mount_secondary_engine(&server).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let runner = ReportRunner::from_config(test_config(&server, dir.path())).expect("runner");
    let cancel = CancellationToken::new();

    let summary = runner.run(&cancel, |_| {}).await.expect("run failed");

    // 4 records from primary (page 1 failed), 1 from secondary
    assert_eq!(summary.total, 5);
    // RJ record filtered out
    assert_eq!(summary.normalized, 4);
    // In-page duplicate collapsed
    assert_eq!(summary.unique, 3);
    assert_eq!(summary.errors, 1);

    let report_dir = dir.path().join("reports");
    let csvs = files_with_suffix(&report_dir, ".csv").await;
    assert_eq!(csvs.len(), 1, "expected exactly one CSV report");

    let body = tokio::fs::read_to_string(&csvs[0]).await.expect("read csv");
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines[0], "_page,_source,latitude,longitude,nome,uf");
    assert_eq!(lines.len(), 1 + 3);

    // Sorted by source, page, name
    assert!(lines[1].contains("Posto Alfa") && lines[1].contains("primary"));
    assert!(lines[2].contains("Posto Beta") && lines[2].contains("primary"));
    assert!(lines[3].contains("Posto Zeta") && lines[3].contains("secondary"));

    // Combined lat/lon string split into its two components
    assert!(lines[2].contains("-20.646434548320997"));
    assert!(lines[2].contains("-40.52329658650793"));
    // DMS converted to signed decimal degrees
    assert!(lines[1].contains("-19.5554166"));
    // Fixed-point integers recovered their decimal point
    assert!(lines[3].contains("-20.64643454832099"));
    assert!(lines[3].contains("-40.52329658650793"));

    // One failed page => error log exists and names the page
    let error_logs = files_with_suffix(&report_dir, "-errors.json").await;
    assert_eq!(error_logs.len(), 1);
    let errors: Vec<serde_json::Value> = serde_json::from_str(
        &tokio::fs::read_to_string(&error_logs[0]).await.expect("read errors"),
    )
    .expect("parse errors");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["engine"], json!("primary"));
    assert_eq!(errors[0]["page"], json!(1));
    assert!(errors[0]["message"].as_str().expect("message").contains("500"));

    // Raw snapshots: primary raw + primary errors + secondary raw
    let raws = files_with_suffix(&report_dir.join("raws"), ".json").await;
    assert_eq!(raws.len(), 3, "unexpected raw snapshots: {raws:?}");
}

#[tokio::test]
async fn clean_run_writes_no_error_log() {
    let server = MockServer::start().await;
    mount_secondary_engine(&server).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let config: Config = serde_json::from_value(json!({
        "report": {
            "concurrency": 2,
            "report_dir": dir.path().join("reports"),
            "raw_dir": dir.path().join("reports/raws"),
            "region_filter": "ES",
        },
        "engines": [
            {"name": "secondary", "base_url": format!("{}/secondary", server.uri())},
        ],
    }))
    .expect("config");

    let runner = ReportRunner::from_config(config).expect("runner");
    let summary = runner
        .run(&CancellationToken::new(), |_| {})
        .await
        .expect("run failed");

    assert_eq!(summary.errors, 0);
    assert_eq!(summary.unique, 1);

    let report_dir = dir.path().join("reports");
    assert_eq!(files_with_suffix(&report_dir, ".csv").await.len(), 1);
    assert!(files_with_suffix(&report_dir, "-errors.json").await.is_empty());
}
