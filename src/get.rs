//! Document retrieval by `(source, path)`.
//!
//! Used by both the `airflow-docs get` command and the
//! `read_documentation` tool.

use anyhow::Result;

use crate::config::Config;
use crate::models::{Document, Source};
use crate::store;

/// Look up one document. A missing document is `Ok(None)`.
pub async fn get_document(config: &Config, source: Source, path: &str) -> Result<Option<Document>> {
    let store = store::open_reader(config).await?;
    let doc = store.get(source, path.trim_start_matches('/')).await;
    store.close().await;
    Ok(doc?)
}

/// CLI entry point: print the document or a not-found notice.
pub async fn run_get(config: &Config, source: Source, path: &str) -> Result<()> {
    let Some(doc) = get_document(config, source, path).await? else {
        println!("No document {}:{}", source, path);
        return Ok(());
    };

    println!("--- Document ---");
    println!("title:       {}", doc.title);
    println!("source:      {}", doc.source);
    println!("path:        {}", doc.path);
    if let Some(ref section) = doc.section {
        println!("section:     {}", section);
    }
    if let Some(ref description) = doc.description {
        println!("description: {}", description);
    }
    println!("url:         {}", doc.url);
    println!();

    println!("--- Content ---");
    println!("{}", doc.content);
    println!();

    Ok(())
}
