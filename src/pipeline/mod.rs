//! Pipeline orchestrator: ties fetch → parse → normalize together.
//!
//! `process()` runs one ticker end to end. `Pipeline::run()` fans every ticker
//! out onto a bounded pool and hands back a [`ScrapeRun`] that yields records
//! in completion order. A failing ticker is logged and skipped; it never stops
//! the others.

use crate::config::{AppConfig, PipelineConfig};
use crate::models::{AggregatedTable, WideRecord};
use crate::scraper::cleaner::pivot_pairs;
use crate::scraper::error::PipelineError;
use crate::scraper::parsers::{MissingLabel, parse_detail_page};
use crate::scraper::{FundamentusScraper, PageSource};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{error, info};

// ── Per-ticker pipeline ───────────────────────────────────────────────────────

/// Fetch, extract and normalize one ticker.
pub async fn process(
    source: &dyn PageSource,
    ticker: &str,
    on_missing: MissingLabel,
) -> Result<WideRecord, PipelineError> {
    info!("Starting stock scraper for {}", ticker);
    let html = source.fetch_page(ticker).await?;
    let record = parse_page(ticker, &html, on_missing)?;
    info!("Extraction and normalization complete for {} ({} fields)", ticker, record.len());
    Ok(record)
}

/// Extract + normalize an already fetched page.
pub fn parse_page(
    ticker: &str,
    html: &str,
    on_missing: MissingLabel,
) -> Result<WideRecord, PipelineError> {
    let pairs = parse_detail_page(html, on_missing)?;
    Ok(pivot_pairs(ticker, pairs)?)
}

pub fn missing_label_policy(config: &PipelineConfig) -> MissingLabel {
    if config.skip_malformed_rows {
        MissingLabel::Skip
    } else {
        MissingLabel::Fail
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct Pipeline {
    source: Arc<dyn PageSource>,
    concurrency: usize,
    on_missing: MissingLabel,
    progress: bool,
}

impl Pipeline {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let scraper = FundamentusScraper::new(&config.scraper)
            .context("Failed to build scraper")?;
        Ok(Self::with_source(Arc::new(scraper), &config.pipeline))
    }

    pub fn with_source(source: Arc<dyn PageSource>, config: &PipelineConfig) -> Self {
        Self {
            source,
            concurrency: config.concurrency.max(1),
            on_missing: missing_label_policy(config),
            progress: config.progress,
        }
    }

    /// Dispatch every ticker. Must be called from inside a tokio runtime.
    pub fn run(&self, tickers: Vec<String>) -> ScrapeRun {
        let total = tickers.len();
        info!("Dispatching {} tickers on {} workers", total, self.concurrency);

        let sem = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut tickers_by_task = HashMap::with_capacity(total);

        for ticker in tickers {
            let source = Arc::clone(&self.source);
            let sem = Arc::clone(&sem);
            let on_missing = self.on_missing;
            let name = ticker.clone();

            let handle = tasks.spawn(async move {
                // the semaphore is never closed, so this only waits
                let _permit = sem.acquire_owned().await.ok();
                process(source.as_ref(), &name, on_missing).await
            });
            tickers_by_task.insert(handle.id(), ticker);
        }

        ScrapeRun {
            tasks,
            tickers_by_task,
            total,
            completed: 0,
            failed: 0,
            progress: progress_bar(total, self.progress),
        }
    }
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] |{bar:40.cyan/blue}| {pos}/{len} [ETA: {eta}]")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb
}

// ── Scrape run ────────────────────────────────────────────────────────────────

/// In-flight scrape. Yields one record per successful ticker, first finished
/// first. Exhausted once every dispatched ticker has reported.
pub struct ScrapeRun {
    tasks: JoinSet<Result<WideRecord, PipelineError>>,
    tickers_by_task: HashMap<Id, String>,
    total: usize,
    completed: usize,
    failed: usize,
    progress: ProgressBar,
}

impl ScrapeRun {
    pub async fn next(&mut self) -> Option<WideRecord> {
        while let Some(joined) = self.tasks.join_next_with_id().await {
            self.completed += 1;
            self.progress.inc(1);

            let id = match &joined {
                Ok((id, _)) => *id,
                Err(e) => e.id(),
            };
            let ticker = self.tickers_by_task.remove(&id).unwrap_or_default();

            match joined {
                Ok((_, Ok(record))) => {
                    info!("{}/{}: {} scraped", self.completed, self.total, ticker);
                    return Some(record);
                }
                Ok((_, Err(e))) => {
                    error!("{}: {}: {}", ticker, e.kind(), e);
                    self.failed += 1;
                }
                Err(e) => {
                    error!("{}: scrape task panicked: {}", ticker, e);
                    self.failed += 1;
                }
            }
            info!("{}/{} tickers done", self.completed, self.total);
        }

        self.progress.finish();
        None
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            tickers_requested: self.total,
            tickers_scraped: self.completed - self.failed,
            errors: self.failed,
        }
    }

    /// Drain the run into one table.
    pub async fn collect(mut self) -> (AggregatedTable, PipelineStats) {
        let mut table = AggregatedTable::new();
        while let Some(record) = self.next().await {
            table.push(record);
        }
        (table, self.stats())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub tickers_requested: usize,
    pub tickers_scraped: usize,
    pub errors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::error::FetchError;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn detail_html(pairs: &[(&str, &str)]) -> String {
        let rows: String = pairs
            .iter()
            .map(|(l, v)| {
                format!(
                    "<tr><td class=\"label\"><span class=\"txt\">{}</span></td>\
                     <td class=\"data\"><span class=\"txt\">{}</span></td></tr>",
                    l, v
                )
            })
            .collect();
        format!(
            "<html><body><table class=\"w728\">{}</table>\
             <table class=\"w728\"><tr><td>footer</td><td>x</td></tr></table></body></html>",
            rows
        )
    }

    enum Page {
        Html(String),
        Status(StatusCode),
        Panic,
    }

    #[derive(Default)]
    struct FakeSource {
        pages: HashMap<String, (Page, Duration)>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeSource {
        fn page(mut self, ticker: &str, pairs: &[(&str, &str)]) -> Self {
            self.pages.insert(ticker.into(), (Page::Html(detail_html(pairs)), Duration::ZERO));
            self
        }

        fn raw(mut self, ticker: &str, html: &str) -> Self {
            self.pages.insert(ticker.into(), (Page::Html(html.into()), Duration::ZERO));
            self
        }

        fn status(mut self, ticker: &str, status: StatusCode) -> Self {
            self.pages.insert(ticker.into(), (Page::Status(status), Duration::ZERO));
            self
        }

        fn panics(mut self, ticker: &str) -> Self {
            self.pages.insert(ticker.into(), (Page::Panic, Duration::ZERO));
            self
        }

        fn delayed(mut self, ticker: &str, delay: Duration) -> Self {
            if let Some(entry) = self.pages.get_mut(ticker) {
                entry.1 = delay;
            }
            self
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn fetch_page(&self, ticker: &str) -> Result<String, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let url = format!("https://example.test/detalhes.php?papel={}", ticker);
            let result = match self.pages.get(ticker) {
                Some((page, delay)) => {
                    tokio::time::sleep(*delay).await;
                    match page {
                        Page::Html(html) => Ok(html.clone()),
                        Page::Status(status) => Err(FetchError::Status { url, status: *status }),
                        Page::Panic => panic!("page source blew up for {}", ticker),
                    }
                }
                None => Err(FetchError::Status { url, status: StatusCode::NOT_FOUND }),
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn pipeline(source: FakeSource, concurrency: usize) -> (Pipeline, Arc<FakeSource>) {
        let source = Arc::new(source);
        let config = PipelineConfig {
            concurrency,
            skip_malformed_rows: false,
            progress: false,
        };
        (Pipeline::with_source(source.clone(), &config), source)
    }

    fn tickers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_process_single_ticker() {
        let source = FakeSource::default().page("PETR4", &[("Papel", "PETR4"), ("Cotação", "38,10")]);
        let record = tokio_test::assert_ok!(process(&source, "PETR4", MissingLabel::Fail).await);

        assert_eq!(record.ticker, "PETR4");
        assert_eq!(record.columns().collect::<Vec<_>>(), ["Cotacao", "Papel"]);
        assert_eq!(record.get("Cotacao"), Some("38,10"));
    }

    #[tokio::test]
    async fn test_process_error_kinds() {
        let source = FakeSource::default()
            .status("XXXX9", StatusCode::NOT_FOUND)
            .raw("EMPTY3", "<html><body><p>Nenhum papel encontrado</p></body></html>")
            .raw(
                "BROKE3",
                "<table class=\"w728\"><tr><td>no span</td><td>v</td></tr></table>\
                 <table class=\"w728\"></table>",
            );

        let err = tokio_test::assert_err!(process(&source, "XXXX9", MissingLabel::Fail).await);
        assert_eq!(err.kind(), "FetchError");

        let err = tokio_test::assert_err!(process(&source, "EMPTY3", MissingLabel::Fail).await);
        assert_eq!(err.kind(), "NormalizationError");

        let err = tokio_test::assert_err!(process(&source, "BROKE3", MissingLabel::Fail).await);
        assert_eq!(err.kind(), "ParseError");

        // skipping the only malformed pair leaves nothing to pivot
        let err = tokio_test::assert_err!(process(&source, "BROKE3", MissingLabel::Skip).await);
        assert_eq!(err.kind(), "NormalizationError");
    }

    #[tokio::test]
    async fn test_run_skips_failed_tickers_and_logs_them() {
        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let source = FakeSource::default()
            .page("PETR4", &[("Papel", "PETR4"), ("Empresa", "PETROBRAS")])
            .page("VALE3", &[("Papel", "VALE3"), ("Setor", "Mineração")])
            .status("XXXX9", StatusCode::NOT_FOUND);
        let (pipeline, _) = pipeline(source, 4);

        let (table, stats) = pipeline.run(tickers(&["PETR4", "VALE3", "XXXX9"])).collect().await;

        assert_eq!(table.len(), 2);
        let mut scraped: Vec<&str> = table.rows().iter().map(|r| r.ticker.as_str()).collect();
        scraped.sort();
        assert_eq!(scraped, ["PETR4", "VALE3"]);
        assert_eq!(
            stats,
            PipelineStats { tickers_requested: 3, tickers_scraped: 2, errors: 1 }
        );

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let fetch_errors: Vec<&str> = text.lines().filter(|l| l.contains("FetchError")).collect();
        assert_eq!(fetch_errors.len(), 1);
        assert!(fetch_errors[0].contains("XXXX9"));
        assert!(fetch_errors[0].contains("ERROR"));
    }

    #[tokio::test]
    async fn test_run_names_ticker_of_panicked_task() {
        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let source = FakeSource::default()
            .page("PETR4", &[("Papel", "PETR4")])
            .panics("BOOM3");
        let (pipeline, _) = pipeline(source, 2);

        let (table, stats) = pipeline.run(tickers(&["PETR4", "BOOM3"])).collect().await;

        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].ticker, "PETR4");
        assert_eq!(stats.errors, 1);

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let panics: Vec<&str> = text.lines().filter(|l| l.contains("panicked")).collect();
        assert_eq!(panics.len(), 1);
        assert!(panics[0].contains("BOOM3: scrape task panicked"));
    }

    #[tokio::test]
    async fn test_run_n_minus_m_rows() {
        let mut source = FakeSource::default();
        let mut all = Vec::new();
        for i in 0..10 {
            let t = format!("TICK{}", i);
            source = if i % 3 == 0 {
                source.status(&t, StatusCode::INTERNAL_SERVER_ERROR)
            } else {
                source.page(&t, &[("Papel", t.as_str())])
            };
            all.push(t);
        }
        let (pipeline, _) = pipeline(source, 3);

        let (table, stats) = pipeline.run(all).collect().await;
        // 0, 3, 6, 9 fail
        assert_eq!(table.len(), 6);
        assert_eq!(stats.errors, 4);
        assert_eq!(table.columns(), ["Papel"]);
    }

    #[tokio::test]
    async fn test_run_yields_in_completion_order() {
        let source = FakeSource::default()
            .page("SLOW3", &[("Papel", "SLOW3")])
            .delayed("SLOW3", Duration::from_millis(300))
            .page("FAST3", &[("Papel", "FAST3")]);
        let (pipeline, _) = pipeline(source, 2);

        let mut run = pipeline.run(tickers(&["SLOW3", "FAST3"]));
        assert_eq!(run.next().await.map(|r| r.ticker), Some("FAST3".to_string()));
        assert_eq!(run.next().await.map(|r| r.ticker), Some("SLOW3".to_string()));
        assert!(run.next().await.is_none());
        assert_eq!(run.stats().tickers_scraped, 2);
    }

    #[tokio::test]
    async fn test_run_respects_concurrency_bound() {
        let mut source = FakeSource::default();
        let mut all = Vec::new();
        for i in 0..8 {
            let t = format!("BND{}", i);
            source = source
                .page(&t, &[("Papel", t.as_str())])
                .delayed(&t, Duration::from_millis(20));
            all.push(t);
        }
        let (pipeline, source) = pipeline(source, 2);

        let (table, _) = pipeline.run(all).collect().await;
        assert_eq!(table.len(), 8);
        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_run_empty_ticker_list() {
        let (pipeline, _) = pipeline(FakeSource::default(), 4);
        let mut run = pipeline.run(Vec::new());
        assert!(run.next().await.is_none());
        assert_eq!(
            run.stats(),
            PipelineStats { tickers_requested: 0, tickers_scraped: 0, errors: 0 }
        );
    }
}
