//! Cycle driver: one full sales + purchase pass, and the loop around it.

use std::future::Future;

use chrono::{Days, Local, NaiveDateTime, NaiveTime};
use tracing::{error, info};

use crate::archive::{clean_old_archives, ArchiveGeneration, PruneReport};
use crate::config::Config;
use crate::contract::{InvoiceApi, InvoiceKind, Pause};
use crate::error::SyncError;
use crate::layout::OutputLayout;
use crate::listing::{list_invoice_ids, ListQuery};
use crate::synchronise::{synchronise_invoices, InvoiceTarget, SyncContext, SynchroniseReport};

/// Listing window: `lookback_days` days back from today 23:59:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl DateWindow {
    pub fn ending_today(now: NaiveDateTime, lookback_days: i64) -> Self {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
        let to = now.date().and_time(end_of_day);
        let from = to
            .checked_sub_days(Days::new(lookback_days.max(0).unsigned_abs()))
            .unwrap_or(to);
        Self { from, to }
    }
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: NaiveDateTime,
    pub window: DateWindow,
    pub generation: ArchiveGeneration,
    pub kinds: Vec<SynchroniseReport>,
    pub pruned: PruneReport,
}

/// Owns the collaborators and runs cycles against them.
pub struct Scheduler<A, P> {
    config: Config,
    layout: OutputLayout,
    api: A,
    pause: P,
}

impl<A, P> Scheduler<A, P>
where
    A: InvoiceApi,
    P: Pause,
{
    pub fn new(config: Config, api: A, pause: P) -> Self {
        let layout = OutputLayout::new(config.output_dir_base.clone());
        Self {
            config,
            layout,
            api,
            pause,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Runs exactly one cycle as if started at `now` (local time).
    pub async fn run_cycle(&self, now: NaiveDateTime) -> Result<CycleReport, SyncError> {
        self.layout.ensure()?;

        let window = DateWindow::ending_today(now, self.config.schedule.lookback_days);
        info!(from = %window.from, to = %window.to, "[CYCLE] Starting cycle");

        let generation = ArchiveGeneration::create(&self.layout.archive_root(), now)?;
        let ctx = SyncContext {
            api: &self.api,
            pause: &self.pause,
            retry: self.config.retry,
            status_pause: self.config.status_pause,
        };

        let mut kinds = Vec::with_capacity(InvoiceKind::ALL.len());
        for kind in InvoiceKind::ALL {
            let endpoint = self.config.endpoint(kind);
            let query = ListQuery {
                status: endpoint.status_filter.clone(),
                date_from: Some(window.from),
                date_to: Some(window.to),
            };
            let ids = list_invoice_ids(&self.api, &endpoint.base_url, &query).await;
            info!(kind = %kind, count = ids.len(), "[CYCLE] Invoices found");

            let target = InvoiceTarget {
                kind,
                base_url: endpoint.base_url.clone(),
                output_dir: self.layout.output_dir(kind),
                archive_dir: generation.dir_for(kind),
            };
            kinds.push(synchronise_invoices(&ctx, &target, &ids).await?);
        }

        let pruned = clean_old_archives(&self.layout.archive_root(), self.config.max_archive_folders)?;

        Ok(CycleReport {
            started_at: now,
            window,
            generation,
            kinds,
            pruned,
        })
    }

    /// Runs cycles forever, pausing for the configured interval in between.
    ///
    /// Only returns when a cycle hits a filesystem fault.
    pub async fn run_forever(&self) -> Result<(), SyncError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Like [`Scheduler::run_forever`], but also returns `Ok(())` once
    /// `shutdown` resolves. A cycle in progress always runs to completion;
    /// `shutdown` only cuts the pause between cycles short.
    pub async fn run_until<S>(&self, shutdown: S) -> Result<(), SyncError>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let now = Local::now().naive_local();
            match self.run_cycle(now).await {
                Ok(report) => {
                    for kind in &report.kinds {
                        info!(
                            kind = %kind.kind,
                            finalised = kind.finalised(),
                            skipped = kind.skipped(),
                            "[CYCLE] Kind summary"
                        );
                    }
                    info!(
                        generation = %report.generation.path().display(),
                        pruned = report.pruned.removed.len(),
                        "[CYCLE] Cycle complete"
                    );
                }
                Err(e) => {
                    error!(error = %e, "[CYCLE][ERROR] Cycle aborted");
                    return Err(e);
                }
            }
            info!(
                interval_secs = self.config.schedule.interval.as_secs(),
                "[CYCLE] Waiting before next cycle"
            );
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("[CYCLE] Shutdown requested, not starting another cycle");
                    return Ok(());
                }
                _ = self.pause.pause(self.config.schedule.interval) => {}
            }
        }
    }
}
