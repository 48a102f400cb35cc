//! Streaming processor behaviour under concurrency.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use sqlmorph::prelude::*;
use sqlmorph::stream::{process_in_chunks, ChunkProgress};
use sqlmorph::convert;

fn script(count: usize) -> String {
    (1..=count)
        .map(|i| format!("SELECT NVL(c{}, 0) FROM t{};", i, i))
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn test_order_preserved_when_chunks_finish_out_of_order() {
    let sql = script(6);
    let processor = StreamProcessor::new(BatchConfig {
        max_workers: Some(4),
        ..Default::default()
    });
    // Earlier statements take longer, so later chunks finish first.
    let converter = |stmt: &str, source: Dialect, target: Dialect| {
        let n: u64 = stmt
            .trim_start_matches("SELECT NVL(c")
            .split(',')
            .next()
            .and_then(|d| d.parse().ok())
            .unwrap_or(0);
        thread::sleep(Duration::from_millis((7 - n) * 15));
        convert(stmt, source, target, &ConversionOptions::default())
    };
    let result = processor
        .process_in_chunks(&sql, Dialect::Oracle, Dialect::PostgreSql, converter, 1, None)
        .await
        .unwrap();

    let expected = (1..=6)
        .map(|i| format!("SELECT COALESCE(c{}, 0) FROM t{};", i, i))
        .collect::<Vec<_>>()
        .join("\n\n");
    assert_eq!(result.converted_sql, expected);
    assert_eq!(result.total_statements, 6);
    assert_eq!(result.successful_statements, 6);
    assert_eq!(result.chunks_processed, 6);
    assert_eq!(result.applied_rules, vec!["NVL → COALESCE".to_string()]);
}

#[tokio::test]
async fn test_failed_statement_is_isolated() {
    let sql = "SELECT 1 FROM dual;\nSELECT boom FROM t;\nSELECT SYSDATE FROM dual;";
    let converter = |stmt: &str, source: Dialect, target: Dialect| {
        if stmt.contains("boom") {
            panic!("unexpected token");
        }
        convert(stmt, source, target, &ConversionOptions::default())
    };
    let result = process_in_chunks(sql, Dialect::Oracle, Dialect::PostgreSql, converter, 2, None)
        .await
        .unwrap();

    assert_eq!(result.total_statements, 3);
    assert_eq!(result.successful_statements, 2);
    assert_eq!(result.failed_statements, 1);
    assert_eq!(result.chunks_processed, 2);
    assert!(result
        .converted_sql
        .contains("-- CONVERSION FAILED (statement 2): unexpected token\n-- SELECT boom FROM t"));
    assert!(result.converted_sql.starts_with("SELECT 1;"));
    assert!(result.converted_sql.ends_with("SELECT CURRENT_TIMESTAMP;"));
    assert!(result.warnings.iter().any(|w| w.severity == Severity::Error));
}

#[tokio::test]
async fn test_progress_reports_every_chunk() {
    let sql = script(5);
    let seen = AtomicUsize::new(0);
    let last = Mutex::new(None);
    let progress: &(dyn Fn(ChunkProgress) + Sync) = &|p: ChunkProgress| {
        seen.fetch_add(1, Ordering::SeqCst);
        *last.lock().unwrap() = Some(p);
    };
    let result = StreamProcessor::default()
        .process_in_chunks(
            &sql,
            Dialect::Oracle,
            Dialect::MySql,
            |stmt: &str, s: Dialect, t: Dialect| convert(stmt, s, t, &ConversionOptions::default()),
            2,
            Some(progress),
        )
        .await
        .unwrap();

    assert_eq!(result.chunks_processed, 3);
    assert_eq!(seen.load(Ordering::SeqCst), 3);
    let last = last.lock().unwrap().expect("progress reported");
    assert_eq!(last.completed_chunks, 3);
    assert_eq!(last.total_chunks, 3);
    assert_eq!(last.processed_statements, 5);
}

#[tokio::test]
async fn test_slow_chunk_times_out() {
    let processor = StreamProcessor::new(BatchConfig {
        chunk_timeout_ms: Some(50),
        ..Default::default()
    });
    let converter = |stmt: &str, source: Dialect, target: Dialect| {
        thread::sleep(Duration::from_millis(500));
        convert(stmt, source, target, &ConversionOptions::default())
    };
    let result = processor
        .process_in_chunks(&script(2), Dialect::Oracle, Dialect::PostgreSql, converter, 1, None)
        .await;

    match result {
        Err(ConvertError::ChunkTimeout { timeout, .. }) => {
            assert_eq!(timeout, Duration::from_millis(50));
        }
        other => panic!("expected a chunk timeout, got {:?}", other.map(|r| r.converted_sql)),
    }
}

#[tokio::test]
async fn test_small_input_runs_sequentially() {
    let processor = StreamProcessor::default();
    let sql = "SELECT NVL(a, 1) FROM t";
    assert_eq!(processor.strategy(sql), sqlmorph::stream::ProcessingStrategy::Sequential);
    let result = processor
        .process(
            sql,
            Dialect::Oracle,
            Dialect::MySql,
            |stmt: &str, s: Dialect, t: Dialect| convert(stmt, s, t, &ConversionOptions::default()),
            None,
        )
        .await
        .unwrap();
    assert_eq!(result.converted_sql, "SELECT IFNULL(a, 1) FROM t");
    assert_eq!(result.chunks_processed, 1);
}
