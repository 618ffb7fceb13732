use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, Timelike, Utc};
use tracing::{debug, error, info, warn};

use crate::digest;
use crate::error::diagnose;
use crate::mailer::DigestMailer;
use crate::model::{QuestionExtractor, Researcher};
use crate::pipeline::ResearchPipeline;
use crate::store::DataStore;
use crate::types::QueueRecord;
use crate::workspace::Workspace;

/// Default target for the pre-cycle connectivity probe.
pub const CONNECTIVITY_PROBE: &str = "8.8.8.8:53";

const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(3);

/// How many past pages a reminder digest samples when the queue is empty.
const PAST_DIGEST_PAGES: usize = 3;

/// Sleep between scheduling checks, sliced into 1 s increments so the loop
/// stays responsive to signals.
const SLEEP_SLICES: u32 = 60;

// --- Control flags ---

/// Shutdown and immediate-cycle flags, set by OS signal handlers and polled
/// by the loop. Passed into the daemon explicitly rather than living as
/// module globals.
#[derive(Clone, Default)]
pub struct DaemonControl {
    shutdown: Arc<AtomicBool>,
    immediate: Arc<AtomicBool>,
}

impl DaemonControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register SIGTERM/SIGINT to request shutdown and SIGUSR1 to request an
    /// immediate out-of-schedule cycle. Call once at startup.
    pub fn install_signal_handlers(&self) -> Result<(), String> {
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&self.shutdown))
            .map_err(|e| format!("Failed to register SIGTERM handler: {}", e))?;
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&self.shutdown))
            .map_err(|e| format!("Failed to register SIGINT handler: {}", e))?;
        signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&self.immediate))
            .map_err(|e| format!("Failed to register SIGUSR1 handler: {}", e))?;
        Ok(())
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn immediate_requested(&self) -> bool {
        self.immediate.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn request_immediate(&self) {
        self.immediate.store(true, Ordering::Relaxed);
    }

    fn clear_immediate(&self) {
        self.immediate.store(false, Ordering::Relaxed);
    }
}

// --- Pure scheduling decisions ---

/// Whether the digest should be dispatched now. Both checks make dispatch
/// idempotent per calendar day no matter how often the loop passes the hour
/// threshold.
pub fn digest_due(current_hour: u32, email_hour: u32, today: &str, last_digest_date: Option<&str>) -> bool {
    current_hour >= email_hour && last_digest_date != Some(today)
}

/// True if a TCP connection to `addr` succeeds within the timeout.
pub fn check_connectivity(addr: &str, timeout: Duration) -> bool {
    let Ok(mut addrs) = addr.to_socket_addrs() else {
        return false;
    };
    addrs.any(|a| TcpStream::connect_timeout(&a, timeout).is_ok())
}

// --- Daemon ---

/// Result of one processing cycle, for logging and the `cycle` subcommand.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub processed: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// The daemon: one control loop over injected collaborators, so tests can
/// drive it with fakes end to end.
pub struct Daemon<W, E, R, M> {
    pub store: DataStore,
    pub workspace: W,
    pub extractor: E,
    pub researcher: R,
    /// `None` when mail credentials are not configured; digests are skipped
    /// with a warning.
    pub mailer: Option<M>,
    pub control: DaemonControl,
    pub probe_addr: String,
}

impl<W, E, R, M> Daemon<W, E, R, M>
where
    W: Workspace,
    E: QuestionExtractor,
    R: Researcher,
    M: DigestMailer,
{
    /// Main loop. Reloads config every iteration so edits to interval or
    /// email hour take effect without a restart. Runs until shutdown is
    /// requested; an in-flight cycle always completes first.
    pub async fn run_loop(&self) {
        let mut last_run: Option<Instant> = None;

        while !self.control.shutdown_requested() {
            let config = self.store.load_config();
            let interval = Duration::from_secs(config.interval_hours.saturating_mul(3600));

            let due = match last_run {
                None => true,
                Some(t) => t.elapsed() >= interval,
            };

            if due || self.control.immediate_requested() {
                self.control.clear_immediate();
                last_run = Some(Instant::now());
                self.run_cycle().await;
                self.maybe_send_digest().await;
            }

            for _ in 0..SLEEP_SLICES {
                if self.control.shutdown_requested() || self.control.immediate_requested() {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }

        info!("daemon shutting down cleanly");
    }

    /// One processing cycle: every flagged page without a results marker goes
    /// through the pipeline, oldest first, and yields exactly one queue
    /// record whatever the outcome.
    pub async fn run_cycle(&self) -> CycleSummary {
        info!("starting research cycle");

        if !check_connectivity(&self.probe_addr, CONNECTIVITY_TIMEOUT) {
            warn!("no network connectivity, skipping cycle");
            return CycleSummary::default();
        }

        let mut pages = match self.workspace.fetch_flagged_pages().await {
            Ok(pages) => pages,
            Err(e) => {
                error!("failed to fetch flagged pages: {}", e);
                return CycleSummary::default();
            }
        };

        // Oldest first, so the queue and the digest read chronologically.
        pages.sort_by(|a, b| a.created_time.cmp(&b.created_time));

        let mut summary = CycleSummary::default();
        let mut unprocessed = Vec::new();
        for page in pages {
            match self.workspace.has_results_marker(&page.id).await {
                Ok(true) => summary.skipped += 1,
                Ok(false) => unprocessed.push(page),
                Err(e) => warn!("could not check page {}: {}", page.id, e),
            }
        }

        info!("found {} unprocessed page(s)", unprocessed.len());
        if unprocessed.is_empty() {
            info!("no unprocessed pages, cycle complete");
            return summary;
        }

        let pipeline = ResearchPipeline::new(&self.extractor, &self.researcher, &self.workspace);

        for page in &unprocessed {
            info!("processing page: {}", page.title);

            let mut record = QueueRecord {
                id: page.id.clone(),
                title: page.title.clone(),
                url: page.url.clone(),
                research_text: None,
                cost: 0.0,
                processed_at: Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
                any_error: None,
            };

            let outcome = match self.workspace.fetch_page_text(&page.id).await {
                Ok(text) => pipeline.run(page, &text).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(outcome) => {
                    record.research_text = outcome.research_text;
                    record.cost = outcome.cost;
                    record.processed_at = outcome.processed_at;
                    summary.processed += 1;
                    info!("completed: {} (cost: ${:.4})", page.title, record.cost);
                }
                Err(e) => {
                    let message = diagnose(&e);
                    error!("error processing '{}': {}", page.title, message);
                    record.any_error = Some(message);
                    summary.failed += 1;
                }
            }

            if let Err(e) = self.store.append_to_queue(&record) {
                error!("failed to append queue record for {}: {}", page.id, e);
            }
        }

        info!("research cycle complete");
        summary
    }

    /// Dispatch the digest if the configured hour has passed and none was
    /// sent today.
    pub async fn maybe_send_digest(&self) {
        let now = Local::now();
        let today = now.format("%Y-%m-%d").to_string();
        let config = self.store.load_config();

        if !digest_due(
            now.hour(),
            config.email_hour,
            &today,
            config.last_digest_date.as_deref(),
        ) {
            debug!("digest not due");
            return;
        }

        self.dispatch_digest().await;
    }

    /// Send the digest now: the accumulated queue if non-empty, otherwise a
    /// reminder built from a sample of past researched pages. On success the
    /// queue is cleared (new-research path only) and today's date persisted;
    /// on failure both are left alone so the next eligible iteration retries.
    pub async fn dispatch_digest(&self) {
        let Some(mailer) = &self.mailer else {
            warn!("digest skipped: mail credentials not configured");
            return;
        };

        let today = Local::now().format("%Y-%m-%d").to_string();
        let queue = self.store.load_queue();

        if !queue.is_empty() {
            let plain = digest::build_digest_text(&queue);
            let html = digest::build_digest_html(&queue);
            match mailer.send(digest::DIGEST_SUBJECT, &plain, &html) {
                Ok(()) => {
                    if let Err(e) = self.store.clear_queue() {
                        error!("failed to clear queue after digest: {}", e);
                    }
                    self.persist_digest_date(&today);
                    info!("digest sent, queue cleared ({} records)", queue.len());
                }
                Err(e) => error!("failed to send digest: {}", e),
            }
            return;
        }

        // No new research today: send a reminder built from past pages.
        let past = match self.workspace.fetch_past_researched_pages().await {
            Ok(past) => past,
            Err(e) => {
                error!("failed to fetch past pages: {}", e);
                return;
            }
        };

        if past.is_empty() {
            debug!("past digest skipped: no researched pages available");
            return;
        }

        let selected =
            digest::select_past_pages(&past, PAST_DIGEST_PAGES, &mut rand::thread_rng());

        let mut records = Vec::new();
        for page in &selected {
            let research_text = match self.workspace.fetch_page_text(&page.id).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("could not fetch text for past page '{}': {}", page.title, e);
                    None
                }
            };
            records.push(QueueRecord {
                id: page.id.clone(),
                title: page.title.clone(),
                url: page.url.clone(),
                research_text,
                cost: 0.0,
                processed_at: page.created_time.chars().take(10).collect(),
                any_error: None,
            });
        }

        let plain = digest::build_digest_text(&records);
        let html = digest::build_digest_html(&records);
        match mailer.send(digest::PAST_DIGEST_SUBJECT, &plain, &html) {
            Ok(()) => {
                self.persist_digest_date(&today);
                info!("past digest sent ({} pages)", records.len());
            }
            Err(e) => error!("failed to send past digest: {}", e),
        }
    }

    fn persist_digest_date(&self, today: &str) {
        let mut config = self.store.load_config();
        config.last_digest_date = Some(today.to_string());
        if let Err(e) = self.store.write_config(&config) {
            error!("failed to persist digest date: {}", e);
        }
    }
}
