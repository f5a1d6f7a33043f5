//! efakture-sync: mirrors sales and purchase e-invoices from the invoicing
//! API into a local folder tree.
//!
//! Each cycle lists invoice ids for a rolling window, downloads every
//! invoice's XML and PDF, names them `{number}_{status}_{id}` using the
//! number found in the XML, and moves any file it would overwrite into a
//! per-cycle archive generation. Old generations are pruned.
//!
//! Entry points: [`schedule::Scheduler::run_cycle`] for a single pass and
//! [`schedule::Scheduler::run_forever`] for the job itself.

pub mod archive;
pub mod client;
pub mod config;
pub mod contract;
pub mod download;
pub mod error;
pub mod invoice_number;
pub mod layout;
pub mod listing;
pub mod load_config;
pub mod logging;
pub mod schedule;
pub mod status;
pub mod synchronise;
