//! Aggregate views of the index: per-source counts and sections.
//!
//! Backs `airflow-docs stats` and `airflow-docs sections`, and the
//! `get_statistics` / `get_sections` tools.

use anyhow::Result;

use crate::config::Config;
use crate::models::{Source, Statistics};
use crate::store;

/// Document counts per source and in total.
pub async fn get_statistics(config: &Config) -> Result<Statistics> {
    let store = store::open_reader(config).await?;
    let stats = store.statistics().await;
    store.close().await;
    Ok(stats?)
}

/// Distinct sections, alphabetically, optionally for one source.
pub async fn list_sections(config: &Config, source: Option<Source>) -> Result<Vec<String>> {
    let store = store::open_reader(config).await?;
    let sections = store.list_sections(source).await;
    store.close().await;
    Ok(sections?)
}

/// Run the stats command: query the store and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let stats = get_statistics(config).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Airflow Docs Index");
    println!("==================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Documents:   {}", stats.total);
    println!();
    println!("  By source:");
    println!("  {:<24} {:<16} {:>6}", "SOURCE", "NAME", "DOCS");
    println!("  {}", "-".repeat(48));
    for (source, count) in &stats.per_source {
        println!(
            "  {:<24} {:<16} {:>6}",
            source.as_str(),
            source.display_name(),
            count
        );
    }
    println!();

    Ok(())
}

/// Run the sections command: one section per line.
pub async fn run_sections(config: &Config, source: Option<Source>) -> Result<()> {
    let sections = list_sections(config, source).await?;
    if sections.is_empty() {
        println!("No sections.");
    }
    for section in sections {
        println!("{}", section);
    }
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanised() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
    }
}
