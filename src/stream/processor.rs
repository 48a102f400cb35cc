//! Chunked, bounded-parallel conversion of large scripts.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::splitter::{estimate_statement_count, StatementSplitter};
use crate::config::BatchConfig;
use crate::dialect::Dialect;
use crate::dispatcher::join_statements;
use crate::error::{ConvertError, ConvertResult};
use crate::result::{dedup_preserving_order, ConversionResult, ConversionWarning, Severity, WarningKind};
use crate::scan::comment_out;

/// How a script will be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStrategy {
    Sequential,
    Parallel { workers: usize, chunk_size: usize },
}

/// Small inputs run inline; large ones are chunked over a worker pool.
pub fn choose_strategy(input_bytes: usize, estimated_statements: usize, config: &BatchConfig) -> ProcessingStrategy {
    if input_bytes < config.parallel_threshold_bytes && estimated_statements < config.parallel_threshold_statements {
        ProcessingStrategy::Sequential
    } else {
        ProcessingStrategy::Parallel {
            workers: config.workers(),
            chunk_size: config.chunk_size.max(1),
        }
    }
}

/// Output of one chunk, tagged with its position in the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    pub index: usize,
    pub statements: Vec<String>,
    pub successful: usize,
    pub failed: usize,
    pub warnings: Vec<ConversionWarning>,
    pub applied_rules: Vec<String>,
}

/// Reported to the progress callback after every finished chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkProgress {
    pub completed_chunks: usize,
    pub total_chunks: usize,
    pub processed_statements: usize,
    pub total_statements: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub converted_sql: String,
    pub total_statements: usize,
    pub successful_statements: usize,
    pub failed_statements: usize,
    pub warnings: Vec<ConversionWarning>,
    pub applied_rules: Vec<String>,
    pub processing_time_ms: u64,
    pub chunks_processed: usize,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "converter panicked".to_string()
    }
}

/// Convert one chunk. A panicking statement becomes a commented marker and
/// an error-severity warning; its siblings are unaffected.
fn convert_chunk<F>(index: usize, first_statement: usize, statements: &[String], source: Dialect, target: Dialect, converter: &F) -> ChunkResult
where
    F: Fn(&str, Dialect, Dialect) -> ConversionResult,
{
    let mut chunk = ChunkResult {
        index,
        statements: Vec::with_capacity(statements.len()),
        successful: 0,
        failed: 0,
        warnings: Vec::new(),
        applied_rules: Vec::new(),
    };
    for (offset, statement) in statements.iter().enumerate() {
        let number = first_statement + offset + 1;
        match panic::catch_unwind(AssertUnwindSafe(|| converter(statement, source, target))) {
            Ok(result) => {
                chunk.statements.push(result.converted_sql.trim_end().trim_end_matches(';').to_string());
                chunk.warnings.extend(result.warnings);
                chunk.applied_rules.extend(result.applied_rules);
                chunk.successful += 1;
            }
            Err(payload) => {
                let error = ConvertError::statement(number, panic_message(payload.as_ref()));
                warn!(chunk = index, statement = number, %error, "statement conversion failed");
                chunk.statements.push(format!(
                    "-- CONVERSION FAILED (statement {}): {}\n{}",
                    number,
                    panic_message(payload.as_ref()),
                    comment_out(statement)
                ));
                chunk.warnings.push(
                    ConversionWarning::new(WarningKind::ManualReviewNeeded, Severity::Error, error.to_string())
                        .with_suggestion("Convert this statement by hand"),
                );
                chunk.failed += 1;
            }
        }
    }
    chunk
}

/// Streams a script through a converter in chunks.
#[derive(Debug, Clone, Default)]
pub struct StreamProcessor {
    config: BatchConfig,
}

impl StreamProcessor {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn strategy(&self, sql: &str) -> ProcessingStrategy {
        choose_strategy(sql.len(), estimate_statement_count(sql), &self.config)
    }

    /// Pick a strategy for `sql` and run it.
    pub async fn process<F>(
        &self,
        sql: &str,
        source: Dialect,
        target: Dialect,
        converter: F,
        progress: Option<&(dyn Fn(ChunkProgress) + Sync)>,
    ) -> ConvertResult<ProcessingResult>
    where
        F: Fn(&str, Dialect, Dialect) -> ConversionResult + Send + Sync + 'static,
    {
        match self.strategy(sql) {
            ProcessingStrategy::Sequential => {
                debug!("processing sequentially");
                Ok(self.process_sequential(sql, source, target, &converter, progress))
            }
            ProcessingStrategy::Parallel { chunk_size, .. } => {
                self.process_in_chunks(sql, source, target, converter, chunk_size, progress)
                    .await
            }
        }
    }

    fn process_sequential<F>(
        &self,
        sql: &str,
        source: Dialect,
        target: Dialect,
        converter: &F,
        progress: Option<&(dyn Fn(ChunkProgress) + Sync)>,
    ) -> ProcessingResult
    where
        F: Fn(&str, Dialect, Dialect) -> ConversionResult,
    {
        let started = Instant::now();
        let statements: Vec<String> = StatementSplitter::new(sql).map(str::to_string).collect();
        let chunk = convert_chunk(0, 0, &statements, source, target, converter);
        if let Some(report) = progress {
            report(ChunkProgress {
                completed_chunks: 1,
                total_chunks: 1,
                processed_statements: statements.len(),
                total_statements: statements.len(),
            });
        }
        assemble(sql, vec![chunk], statements.len(), started)
    }

    /// Split `sql`, convert chunks of `chunk_size` statements concurrently
    /// and reassemble them in input order.
    ///
    /// Fails only when a chunk outlives the configured timeout or a worker
    /// task dies; statement-level failures are reported in the result.
    pub async fn process_in_chunks<F>(
        &self,
        sql: &str,
        source: Dialect,
        target: Dialect,
        converter: F,
        chunk_size: usize,
        progress: Option<&(dyn Fn(ChunkProgress) + Sync)>,
    ) -> ConvertResult<ProcessingResult>
    where
        F: Fn(&str, Dialect, Dialect) -> ConversionResult + Send + Sync + 'static,
    {
        let started = Instant::now();
        let chunk_size = chunk_size.max(1);
        let statements: Vec<String> = StatementSplitter::new(sql).map(str::to_string).collect();
        let total_statements = statements.len();
        let chunks: Vec<Vec<String>> = statements.chunks(chunk_size).map(<[String]>::to_vec).collect();
        let total_chunks = chunks.len();
        let workers = self.config.workers();
        let chunk_timeout = self.config.chunk_timeout();

        info!(
            statements = total_statements,
            chunks = total_chunks,
            workers,
            %source,
            %target,
            "processing script in chunks"
        );

        let converter = Arc::new(converter);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        for (index, chunk) in chunks.into_iter().enumerate() {
            let converter = Arc::clone(&converter);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| ConvertError::worker("worker pool closed"))?;
                tokio::task::spawn_blocking(move || {
                    convert_chunk(index, index * chunk_size, &chunk, source, target, converter.as_ref())
                })
                .await
                .map_err(|e| ConvertError::worker(format!("chunk {} task failed: {}", index, e)))
            });
        }

        let mut results: Vec<ChunkResult> = Vec::with_capacity(total_chunks);
        let mut processed = 0;
        while !tasks.is_empty() {
            let joined = match timeout(chunk_timeout, tasks.join_next()).await {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_) => {
                    tasks.abort_all();
                    let index = (0..total_chunks)
                        .find(|i| !results.iter().any(|r| r.index == *i))
                        .unwrap_or(0);
                    return Err(ConvertError::ChunkTimeout {
                        index,
                        timeout: chunk_timeout,
                    });
                }
            };
            let chunk = joined.map_err(|e| ConvertError::worker(e.to_string()))??;
            processed += chunk.statements.len();
            debug!(chunk = chunk.index, failed = chunk.failed, "chunk finished");
            results.push(chunk);
            if let Some(report) = progress {
                report(ChunkProgress {
                    completed_chunks: results.len(),
                    total_chunks,
                    processed_statements: processed,
                    total_statements,
                });
            }
        }

        results.sort_by_key(|chunk| chunk.index);
        let result = assemble(sql, results, total_statements, started);
        info!(
            successful = result.successful_statements,
            failed = result.failed_statements,
            elapsed_ms = result.processing_time_ms,
            "script processed"
        );
        Ok(result)
    }
}

/// Concatenate sorted chunks into the final result.
fn assemble(sql: &str, chunks: Vec<ChunkResult>, total_statements: usize, started: Instant) -> ProcessingResult {
    let chunks_processed = chunks.len();
    let mut statements = Vec::with_capacity(total_statements);
    let mut warnings = Vec::new();
    let mut applied_rules = Vec::new();
    let mut successful = 0;
    let mut failed = 0;
    for chunk in chunks {
        statements.extend(chunk.statements);
        warnings.extend(chunk.warnings);
        applied_rules.extend(chunk.applied_rules);
        successful += chunk.successful;
        failed += chunk.failed;
    }
    ProcessingResult {
        converted_sql: join_statements(&statements, sql.trim_end().ends_with(';')),
        total_statements,
        successful_statements: successful,
        failed_statements: failed,
        warnings,
        applied_rules: dedup_preserving_order(applied_rules),
        processing_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        chunks_processed,
    }
}

/// [`StreamProcessor::process_in_chunks`] with default batch settings.
pub async fn process_in_chunks<F>(
    sql: &str,
    source: Dialect,
    target: Dialect,
    converter: F,
    chunk_size: usize,
    progress: Option<&(dyn Fn(ChunkProgress) + Sync)>,
) -> ConvertResult<ProcessingResult>
where
    F: Fn(&str, Dialect, Dialect) -> ConversionResult + Send + Sync + 'static,
{
    StreamProcessor::default()
        .process_in_chunks(sql, source, target, converter, chunk_size, progress)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ConversionContext;

    fn upper(sql: &str, source: Dialect, target: Dialect) -> ConversionResult {
        let mut ctx = ConversionContext::default();
        ctx.rule("uppercase");
        ctx.into_result(sql.to_uppercase(), source, target)
    }

    #[test]
    fn test_choose_strategy() {
        let config = BatchConfig::default();
        assert_eq!(choose_strategy(100, 3, &config), ProcessingStrategy::Sequential);
        assert!(matches!(
            choose_strategy(1024 * 1024, 3, &config),
            ProcessingStrategy::Parallel { chunk_size: 50, .. }
        ));
        match choose_strategy(100, 500, &config) {
            ProcessingStrategy::Parallel { workers, .. } => assert!((2..=8).contains(&workers)),
            other => panic!("expected parallel, got {:?}", other),
        }
    }

    #[test]
    fn test_chunk_isolates_panics() {
        let statements = vec!["select 1".to_string(), "boom".to_string(), "select 3".to_string()];
        let chunk = convert_chunk(0, 0, &statements, Dialect::Oracle, Dialect::MySql, &|sql: &str, s: Dialect, t: Dialect| {
            if sql == "boom" {
                panic!("cannot convert");
            }
            upper(sql, s, t)
        });
        assert_eq!(chunk.successful, 2);
        assert_eq!(chunk.failed, 1);
        assert_eq!(chunk.statements[0], "SELECT 1");
        assert!(chunk.statements[1].starts_with("-- CONVERSION FAILED (statement 2): cannot convert"));
        assert!(chunk.statements[1].ends_with("-- boom"));
        assert_eq!(chunk.warnings[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_sequential_process() {
        let processor = StreamProcessor::default();
        let result = processor
            .process("select 1; select 2;", Dialect::Oracle, Dialect::MySql, upper, None)
            .await
            .unwrap();
        assert_eq!(result.converted_sql, "SELECT 1;\n\nSELECT 2;");
        assert_eq!(result.total_statements, 2);
        assert_eq!(result.chunks_processed, 1);
        assert_eq!(result.applied_rules, vec!["uppercase".to_string()]);
    }
}
