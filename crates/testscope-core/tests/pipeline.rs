//! End-to-end selection: git diff → HTTP artifact → title pattern.

use std::net::SocketAddr;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::Router;

use testscope_core::{
    changed_files, find_related_tests, impacted_tests_pattern, select_tests, ConnectorOptions,
    EndpointOptions, ImpactConfig, NoImpactPolicy, RelationshipGraph, Selection, TestRef,
};
use testscope_transport::{Connector, EndpointConnector, RelationshipKind};

type Stored = Arc<Mutex<Option<Vec<u8>>>>;

async fn serve_artifact(State(stored): State<Stored>, UrlPath(file): UrlPath<String>) -> Response {
    if file != "relationships.tar.gz" {
        return StatusCode::NOT_FOUND.into_response();
    }
    match stored.lock().unwrap().clone() {
        Some(bytes) => bytes.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn store_artifact(State(stored): State<Stored>, body: Bytes) -> Response {
    *stored.lock().unwrap() = Some(body.to_vec());
    StatusCode::CREATED.into_response()
}

async fn spawn_store() -> (SocketAddr, Stored) {
    let stored: Stored = Arc::default();
    let router = Router::new()
        .route("/artifacts", put(store_artifact))
        .route("/artifacts/{file}", get(serve_artifact))
        .with_state(stored.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, stored)
}

fn endpoint(addr: SocketAddr) -> EndpointOptions {
    EndpointOptions::new(&format!("http://{addr}/artifacts")).with_header("Authorization", "Bearer ci")
}

fn run_git(repo_dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Repository with two committed sources, then `src/a.ts` modified.
fn repo_with_change() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    run_git(dir.path(), &["init"]);
    run_git(dir.path(), &["config", "user.name", "test-user"]);
    run_git(dir.path(), &["config", "user.email", "test@example.com"]);
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/a.ts"), "export const a = 1;\n").unwrap();
    std::fs::write(dir.path().join("src/b.ts"), "export const b = 1;\n").unwrap();
    run_git(dir.path(), &["add", "."]);
    run_git(dir.path(), &["commit", "-m", "initial"]);
    std::fs::write(dir.path().join("src/a.ts"), "export const a = 2;\n").unwrap();
    dir
}

/// Record a graph for `root` and publish it through the endpoint.
async fn publish_graph(addr: SocketAddr, root: &Path) {
    let config = ImpactConfig::default().with_project_root(root);
    let normalizer = config.normalizer();
    let mut graph = RelationshipGraph::new();
    graph.insert(
        normalizer.to_canonical(&root.join("src/a.ts").to_string_lossy()),
        TestRef::new("Button > renders", normalizer.to_canonical("tests/a.test.ts")),
    );
    graph.insert(
        normalizer.to_canonical("src/b.ts"),
        TestRef::new("b works", normalizer.to_canonical("tests/b.test.ts")),
    );

    let recorded = tempfile::tempdir().unwrap();
    graph.write_to_dir(recorded.path()).unwrap();

    let connector = EndpointConnector::new(endpoint(addr)).unwrap();
    let status = connector
        .upload(&RelationshipKind::default(), recorded.path())
        .await;
    assert!(status.is_uploaded(), "upload failed: {status:?}");
}

#[tokio::test]
async fn changed_file_selects_its_tests() {
    let repo = repo_with_change();
    let (addr, _stored) = spawn_store().await;
    publish_graph(addr, repo.path()).await;

    let config = ImpactConfig::default().with_project_root(repo.path());
    let changed = changed_files(repo.path(), &config.base_ref).unwrap();
    assert_eq!(changed, vec!["src/a.ts".to_string()]);

    let options = ConnectorOptions::from(endpoint(addr));
    let selection = select_tests(&changed, &options, &config).await.unwrap();
    match selection {
        Selection::Tests { pattern, impact } => {
            assert!(pattern.is_match("Button > renders"));
            assert!(!pattern.is_match("b works"));
            let files: Vec<_> = impact.impacted_test_files.iter().map(|f| f.as_str()).collect();
            assert_eq!(files, vec!["tests/a.test.ts"]);
        }
        other => panic!("expected a selection, got {other:?}"),
    }
}

#[tokio::test]
async fn clean_tree_returns_no_impact_policy() {
    let repo = repo_with_change();
    run_git(repo.path(), &["commit", "-am", "second"]);
    let (addr, stored) = spawn_store().await;

    let config = ImpactConfig::default()
        .with_project_root(repo.path())
        .with_exit_on_no_impact(false);
    let changed = changed_files(repo.path(), "HEAD").unwrap();
    assert!(changed.is_empty());

    let options = ConnectorOptions::from(endpoint(addr));
    let selection = select_tests(&changed, &options, &config).await.unwrap();
    assert!(matches!(
        selection,
        Selection::NoImpact {
            policy: NoImpactPolicy::RunDefault
        }
    ));
    assert!(stored.lock().unwrap().is_none());
}

#[tokio::test]
async fn missing_headers_degrade_to_empty_impact() {
    let repo = repo_with_change();
    let (addr, _stored) = spawn_store().await;
    publish_graph(addr, repo.path()).await;

    let config = ImpactConfig::default().with_project_root(repo.path());
    let options = ConnectorOptions::from(EndpointOptions::new(&format!("http://{addr}/artifacts")));

    let impact = find_related_tests(&["src/a.ts"], &options, &config)
        .await
        .unwrap();
    assert!(impact.is_empty());

    let pattern = impacted_tests_pattern(&["src/a.ts"], &options, &config)
        .await
        .unwrap();
    assert!(pattern.is_none());
}

#[tokio::test]
async fn unreachable_store_degrades_to_empty_impact() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ImpactConfig::default().with_project_root("/repo");
    let options = ConnectorOptions::from(endpoint(addr));
    let impact = find_related_tests(&["src/a.ts"], &options, &config)
        .await
        .unwrap();
    assert!(impact.is_empty());
}
