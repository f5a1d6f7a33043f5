//! Per-invoice download-and-reconcile pipeline.
//!
//! For every listed id of one invoice kind, in listing order:
//!   1. look up the status,
//!   2. fetch the XML to a temporary file (failure skips the invoice),
//!   3. derive the invoice number from the XML, falling back to the id,
//!   4. build the final names `{number}_{status}_{id}.{xml,pdf}`,
//!   5. archive whatever currently sits at those names (XML first),
//!   6. fetch the PDF to its final name,
//!   7. move the temporary XML to its final name.
//!
//! A PDF that fails in step 6 does not stop step 7. The XML is finalised
//! without a PDF and the next cycle fetches it again.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::archive::archive_existing_file;
use crate::contract::{ApiRequest, InvoiceApi, InvoiceId, InvoiceKind, Pause};
use crate::download::{download_file, FetchOutcome, RetryPolicy};
use crate::error::SyncError;
use crate::invoice_number::{parse_invoice_number_from_xml, sanitize_filename};
use crate::status::fetch_invoice_status;

/// Shared collaborators for a synchronisation run.
pub struct SyncContext<'a, A: ?Sized, P: ?Sized> {
    pub api: &'a A,
    pub pause: &'a P,
    pub retry: RetryPolicy,
    pub status_pause: Duration,
}

/// Where one invoice kind is fetched from and written to.
#[derive(Debug, Clone)]
pub struct InvoiceTarget {
    pub kind: InvoiceKind,
    pub base_url: String,
    /// Live directory for PDFs; XMLs go to its `xml` subdirectory.
    pub output_dir: PathBuf,
    /// This cycle's archive directory for the kind.
    pub archive_dir: PathBuf,
}

impl InvoiceTarget {
    pub fn xml_dir(&self) -> PathBuf {
        self.output_dir.join(crate::layout::XML_DIR_NAME)
    }

    fn resource(&self, resource: &str, invoice_id: &InvoiceId) -> ApiRequest {
        ApiRequest::new(format!("{}/{resource}", self.base_url))
            .with_param("invoiceId", invoice_id.as_str())
    }
}

/// Final file stem `{number}_{status}_{id}`.
pub fn final_stem(number: &str, status: &str, invoice_id: &InvoiceId) -> String {
    format!("{number}_{status}_{}", sanitize_filename(invoice_id.as_str()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceOutcome {
    Finalised {
        invoice_id: InvoiceId,
        status: String,
        number: String,
        xml_path: PathBuf,
        /// `None` when the PDF fetch failed.
        pdf_path: Option<PathBuf>,
        archived: Vec<PathBuf>,
    },
    Skipped {
        invoice_id: InvoiceId,
        xml_fetch: FetchOutcome,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynchroniseReport {
    pub kind: InvoiceKind,
    pub invoices: Vec<InvoiceOutcome>,
}

impl SynchroniseReport {
    pub fn finalised(&self) -> usize {
        self.invoices
            .iter()
            .filter(|o| matches!(o, InvoiceOutcome::Finalised { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.invoices.len() - self.finalised()
    }
}

/// Runs the pipeline for each id in order.
pub async fn synchronise_invoices<A, P>(
    ctx: &SyncContext<'_, A, P>,
    target: &InvoiceTarget,
    invoice_ids: &[InvoiceId],
) -> Result<SynchroniseReport, SyncError>
where
    A: InvoiceApi + ?Sized,
    P: Pause + ?Sized,
{
    info!(kind = %target.kind, count = invoice_ids.len(), "[SYNC] Synchronising invoices");
    let mut invoices = Vec::with_capacity(invoice_ids.len());
    for invoice_id in invoice_ids {
        invoices.push(synchronise_invoice(ctx, target, invoice_id).await?);
    }
    let report = SynchroniseReport {
        kind: target.kind,
        invoices,
    };
    info!(
        kind = %target.kind,
        finalised = report.finalised(),
        skipped = report.skipped(),
        "[SYNC] Finished invoice kind"
    );
    Ok(report)
}

/// Runs the pipeline for a single invoice.
pub async fn synchronise_invoice<A, P>(
    ctx: &SyncContext<'_, A, P>,
    target: &InvoiceTarget,
    invoice_id: &InvoiceId,
) -> Result<InvoiceOutcome, SyncError>
where
    A: InvoiceApi + ?Sized,
    P: Pause + ?Sized,
{
    info!(kind = %target.kind, invoice_id = %invoice_id, "[SYNC] Fetching invoice status");
    let status = fetch_invoice_status(
        ctx.api,
        ctx.pause,
        ctx.status_pause,
        &target.base_url,
        invoice_id,
    )
    .await;
    info!(invoice_id = %invoice_id, status = %status, "[SYNC] Invoice status");

    let xml_dir = target.xml_dir();
    let temp_xml = xml_dir.join(format!(
        ".{}_{}.xml.part",
        target.kind,
        sanitize_filename(invoice_id.as_str())
    ));
    info!(kind = %target.kind, invoice_id = %invoice_id, "[SYNC] Downloading XML");
    let xml_fetch = download_file(
        ctx.api,
        ctx.pause,
        &ctx.retry,
        target.resource("xml", invoice_id),
        &temp_xml,
    )
    .await?;
    if !xml_fetch.is_saved() {
        error!(invoice_id = %invoice_id, outcome = ?xml_fetch, "[SYNC][ERROR] Skipping invoice, XML download failed");
        return Ok(InvoiceOutcome::Skipped {
            invoice_id: invoice_id.clone(),
            xml_fetch,
        });
    }

    let number = parse_invoice_number_from_xml(&temp_xml).unwrap_or_else(|| {
        warn!(invoice_id = %invoice_id, "[SYNC] No invoice number in XML, using id");
        sanitize_filename(invoice_id.as_str())
    });

    let stem = final_stem(&number, &status, invoice_id);
    let xml_path = xml_dir.join(format!("{stem}.xml"));
    let pdf_path = target.output_dir.join(format!("{stem}.pdf"));

    let mut archived = Vec::new();
    for existing in [&xml_path, &pdf_path] {
        if let Some(moved) = archive_existing_file(existing, &target.archive_dir)? {
            archived.push(moved);
        }
    }

    info!(kind = %target.kind, invoice_id = %invoice_id, "[SYNC] Downloading PDF");
    let pdf_fetch = download_file(
        ctx.api,
        ctx.pause,
        &ctx.retry,
        target.resource("pdf", invoice_id),
        &pdf_path,
    )
    .await?;
    if !pdf_fetch.is_saved() {
        error!(invoice_id = %invoice_id, outcome = ?pdf_fetch, "[SYNC][ERROR] PDF download failed, finalising XML only");
    }

    finalise_xml(&temp_xml, &xml_path)?;

    Ok(InvoiceOutcome::Finalised {
        invoice_id: invoice_id.clone(),
        status,
        number,
        xml_path,
        pdf_path: pdf_fetch.is_saved().then_some(pdf_path),
        archived,
    })
}

fn finalise_xml(temp_xml: &Path, xml_path: &Path) -> Result<(), SyncError> {
    fs::rename(temp_xml, xml_path).map_err(SyncError::io("rename", temp_xml))?;
    info!(from = %temp_xml.display(), to = %xml_path.display(), "[SYNC] Renamed XML");
    Ok(())
}
