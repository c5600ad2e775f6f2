//! Indexing runs end to end over local checkouts.

use std::fs;
use std::path::Path;

use airflow_docs::config::Config;
use airflow_docs::error::{Error, Result};
use airflow_docs::fetch::{Checkout, LocalFetcher, RepositoryFetcher};
use airflow_docs::ingest::Indexer;
use airflow_docs::models::Source;
use airflow_docs::sources::{spec_for, SourceSpec};
use airflow_docs::store::DocumentStore;
use async_trait::async_trait;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn local_spec(source: Source, root: &Path) -> SourceSpec {
    let mut spec = spec_for(&Config::default(), source);
    spec.local_path = Some(root.to_path_buf());
    spec
}

/// Serves local checkouts but fails to fetch one source.
struct FailingFor(Source);

#[async_trait]
impl RepositoryFetcher for FailingFor {
    async fn fetch(&self, spec: &SourceSpec, branch: &str) -> Result<Checkout> {
        if spec.source == self.0 {
            Err(Error::fetch(spec.source, "could not resolve host: github.com"))
        } else {
            LocalFetcher.fetch(spec, branch).await
        }
    }
}

fn core_fixture(root: &Path) {
    write(
        root,
        "core-concepts/dags.rst",
        "DAGs\n====\n\nA DAG is a collection of tasks with dependencies.\n",
    );
    write(
        root,
        "core-concepts/tasks.rst",
        "Tasks\n=====\n\n:description: Units of work\n\nA Task is the basic unit of execution.\n",
    );
    write(
        root,
        "core-concepts/empty.rst",
        ".. only a comment\n\n.. _and-a-target: https://example.org\n",
    );
}

#[tokio::test]
async fn empty_file_is_skipped_and_absent() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    core_fixture(&docs);

    let store = DocumentStore::open(&tmp.path().join("docs.db")).await.unwrap();
    let indexer = Indexer::new(&store, &LocalFetcher);
    let report = indexer
        .index_source(&local_spec(Source::Core, &docs), "main", false)
        .await
        .unwrap();

    assert_eq!(report.indexed, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.error, None);

    let stats = store.statistics().await.unwrap();
    assert_eq!(stats.count(Source::Core), 2);
    assert_eq!(stats.total, 2);
    assert!(store
        .get(Source::Core, "core-concepts/empty.rst")
        .await
        .unwrap()
        .is_none());

    let tasks = store
        .get(Source::Core, "core-concepts/tasks.rst")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tasks.title, "Tasks");
    assert_eq!(tasks.description.as_deref(), Some("Units of work"));
    assert_eq!(tasks.section.as_deref(), Some("Core Concepts"));
    assert_eq!(
        tasks.url,
        "https://airflow.apache.org/docs/apache-airflow/stable/core-concepts/tasks.html"
    );
    store.close().await;
}

#[tokio::test]
async fn rerun_is_idempotent_and_reports_unchanged() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    core_fixture(&docs);
    let spec = local_spec(Source::Core, &docs);

    let store = DocumentStore::open(&tmp.path().join("docs.db")).await.unwrap();
    let indexer = Indexer::new(&store, &LocalFetcher);

    indexer.index_source(&spec, "main", false).await.unwrap();
    let before = store.get(Source::Core, "core-concepts/dags.rst").await.unwrap();

    let second = indexer.index_source(&spec, "main", false).await.unwrap();
    assert_eq!(second.indexed, 2);
    assert_eq!(second.unchanged, 2);
    assert_eq!(store.count(None).await.unwrap(), 2);
    assert_eq!(
        store.get(Source::Core, "core-concepts/dags.rst").await.unwrap(),
        before
    );

    write(
        &docs,
        "core-concepts/dags.rst",
        "DAGs\n====\n\nA DAG now has a new paragraph.\n",
    );
    let third = indexer.index_source(&spec, "main", false).await.unwrap();
    assert_eq!(third.unchanged, 1);
    let dags = store
        .get(Source::Core, "core-concepts/dags.rst")
        .await
        .unwrap()
        .unwrap();
    assert!(dags.content.contains("new paragraph"));
    store.close().await;
}

#[tokio::test]
async fn rebuild_drops_deleted_files_and_is_repeatable() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    core_fixture(&docs);
    let spec = local_spec(Source::Core, &docs);

    let store = DocumentStore::open(&tmp.path().join("docs.db")).await.unwrap();
    let indexer = Indexer::new(&store, &LocalFetcher);
    indexer.index_source(&spec, "main", false).await.unwrap();

    fs::remove_file(docs.join("core-concepts/tasks.rst")).unwrap();

    // Without a rebuild the deleted file's row stays behind.
    indexer.index_source(&spec, "main", false).await.unwrap();
    assert_eq!(store.count(Some(Source::Core)).await.unwrap(), 2);

    let first = indexer.index_source(&spec, "main", true).await.unwrap();
    assert_eq!(first.cleared, 2);
    assert_eq!(first.indexed, 1);
    let snapshot = store.get(Source::Core, "core-concepts/dags.rst").await.unwrap();

    let second = indexer.index_source(&spec, "main", true).await.unwrap();
    assert_eq!(second.cleared, 1);
    assert_eq!(second.indexed, 1);
    assert_eq!(store.count(None).await.unwrap(), 1);
    assert_eq!(
        store.get(Source::Core, "core-concepts/dags.rst").await.unwrap(),
        snapshot
    );
    assert!(store
        .get(Source::Core, "core-concepts/tasks.rst")
        .await
        .unwrap()
        .is_none());
    store.close().await;
}

#[tokio::test]
async fn fetch_failure_skips_only_that_source() {
    let tmp = TempDir::new().unwrap();
    let core = tmp.path().join("core");
    let client = tmp.path().join("client");
    core_fixture(&core);
    write(&client, "README.md", "# Client\n\nOld client page.\n");

    let store = DocumentStore::open(&tmp.path().join("docs.db")).await.unwrap();
    let specs = vec![
        local_spec(Source::Core, &core),
        local_spec(Source::Client, &client),
    ];

    Indexer::new(&store, &LocalFetcher)
        .index_all(&specs, "main", false)
        .await
        .unwrap();
    assert_eq!(store.count(Some(Source::Client)).await.unwrap(), 1);

    let report = Indexer::new(&store, &FailingFor(Source::Client))
        .index_all(&specs, "main", true)
        .await
        .unwrap();

    assert_eq!(report.sources.len(), 2);
    assert_eq!(report.sources[0].source, Some(Source::Core));
    assert!(!report.sources[0].failed());
    assert_eq!(report.sources[0].indexed, 2);
    assert!(report.sources[1].failed());
    assert!(report.sources[1]
        .error
        .as_deref()
        .unwrap()
        .contains("could not resolve host"));
    assert!(!report.all_failed());

    // The failed source's previous rows survive and are reported.
    assert_eq!(report.sources[1].retained, 1);
    assert_eq!(report.sources[0].retained, 0);
    assert_eq!(store.count(Some(Source::Client)).await.unwrap(), 1);

    let plain = Indexer::new(&store, &FailingFor(Source::Client))
        .index_source(&specs[1], "main", false)
        .await
        .unwrap();
    assert!(plain.failed());
    assert_eq!(plain.retained, 0);
    store.close().await;
}

#[tokio::test]
async fn markdown_source_uses_frontmatter() {
    let tmp = TempDir::new().unwrap();
    let client = tmp.path().join("client");
    write(
        &client,
        "api/dag_api.md",
        "---\ntitle: DAG API\ndescription: Manage DAGs over REST\n---\n\n\
         # Ignored Heading\n\n{% include note.md %}\n\nList <b>DAGs</b> with `list_dags`.\n",
    );
    write(&client, "notes.txt", "not documentation");
    write(&client, ".github/TEMPLATE.md", "# Hidden\n\nNever indexed.\n");

    let store = DocumentStore::open(&tmp.path().join("docs.db")).await.unwrap();
    let report = Indexer::new(&store, &LocalFetcher)
        .index_source(&local_spec(Source::Client, &client), "main", false)
        .await
        .unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(report.skipped, 0);

    let doc = store
        .get(Source::Client, "api/dag_api.md")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.title, "DAG API");
    assert_eq!(doc.description.as_deref(), Some("Manage DAGs over REST"));
    assert_eq!(doc.section.as_deref(), Some("Api"));
    assert_eq!(
        doc.url,
        "https://airflow.apache.org/docs/apache-airflow-client/api/dag_api.html"
    );
    assert_eq!(doc.content, "Ignored Heading List DAGs with list_dags.");
    store.close().await;
}
