//! These structs provide the CLI interface for the lunch-ledger CLI.

use crate::model::CellRef;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tracing_subscriber::filter::LevelFilter;

/// lunch-ledger: leaderboard and spending totals for the office lunch-order sheet.
///
/// The lunch bills live in a shared Google sheet with one tab per order day. This program reads
/// those tabs, works out who ordered what and how much each period cost, and serves the results as
/// JSON for the leaderboard page. The same results can be printed from the command line.
///
/// Access to the sheet goes through a Google service account. Its email, private key and the id of
/// the sheet are read from the environment (or a `.env` file in the working directory).
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server that backs the leaderboard page.
    ///
    /// Routes:
    /// - GET /api/common: every bill entry from the order-day sheets
    /// - GET /api/sum: totals per period label
    /// - GET /api/monthly: totals per calendar month, for the spending chart
    /// - GET /health
    Serve(ServeArgs),
    /// Print every bill entry as JSON, the same data as GET /api/common.
    Common,
    /// Print the totals per period label as JSON, the same data as GET /api/sum.
    Sum,
    /// Print the totals per calendar month as JSON, the same data as GET /api/monthly.
    Monthly,
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    #[clap(flatten)]
    source: SourceArgs,
}

impl Common {
    pub fn new(log_level: LevelFilter, source: SourceArgs) -> Self {
        Self { log_level, source }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn source(&self) -> &SourceArgs {
        &self.source
    }
}

/// Where the bills are and how the sheets are laid out.
///
/// The credentials are optional here so that a missing value can be reported together with all
/// the other missing values when the `Config` is built, instead of one at a time by clap.
#[derive(Debug, Parser, Clone)]
pub struct SourceArgs {
    /// The email of the Google service account that has read access to the sheet.
    #[arg(long, env = "GOOGLE_SERVICE_ACCOUNT_EMAIL")]
    service_account_email: Option<String>,

    /// The service account's PEM private key. Literal `\n` sequences are turned into newlines.
    #[arg(long, env = "GOOGLE_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// The id of the spreadsheet, as found in its URL.
    #[arg(long, env = "GOOGLE_SHEET_ID")]
    sheet_id: Option<String>,

    /// The spreadsheet id to use when building links to sheets. Defaults to --sheet-id.
    #[arg(long, env = "LUNCH_LEDGER_LINK_DOCUMENT_ID")]
    link_document_id: Option<String>,

    /// Bill entries are read from sheets at this index and after. The sheets before it hold
    /// instructions and other metadata.
    #[arg(long, env = "LUNCH_LEDGER_ENTRY_SHEET_OFFSET", default_value_t = 3)]
    entry_sheet_offset: usize,

    /// Period totals are read from sheets at this index and after.
    #[arg(long, env = "LUNCH_LEDGER_SUMMARY_SHEET_OFFSET", default_value_t = 1)]
    summary_sheet_offset: usize,

    /// The cell holding a sheet's running total.
    #[arg(long, env = "LUNCH_LEDGER_SUMMARY_TOTAL_CELL", default_value = "F23")]
    summary_total_cell: CellRef,

    /// The cell holding a sheet's period label.
    #[arg(long, env = "LUNCH_LEDGER_SUMMARY_LABEL_CELL", default_value = "H1")]
    summary_label_cell: CellRef,
}

impl SourceArgs {
    pub fn new(
        service_account_email: Option<String>,
        private_key: Option<String>,
        sheet_id: Option<String>,
    ) -> Self {
        Self {
            service_account_email,
            private_key,
            sheet_id,
            link_document_id: None,
            entry_sheet_offset: 3,
            summary_sheet_offset: 1,
            summary_total_cell: CellRef::new(22, 5),
            summary_label_cell: CellRef::new(0, 7),
        }
    }

    pub fn with_link_document_id(mut self, id: impl Into<String>) -> Self {
        self.link_document_id = Some(id.into());
        self
    }

    pub fn with_offsets(mut self, entry_sheet_offset: usize, summary_sheet_offset: usize) -> Self {
        self.entry_sheet_offset = entry_sheet_offset;
        self.summary_sheet_offset = summary_sheet_offset;
        self
    }

    pub fn service_account_email(&self) -> Option<&str> {
        self.service_account_email.as_deref()
    }

    pub fn private_key(&self) -> Option<&str> {
        self.private_key.as_deref()
    }

    pub fn sheet_id(&self) -> Option<&str> {
        self.sheet_id.as_deref()
    }

    pub fn link_document_id(&self) -> Option<&str> {
        self.link_document_id.as_deref()
    }

    pub fn entry_sheet_offset(&self) -> usize {
        self.entry_sheet_offset
    }

    pub fn summary_sheet_offset(&self) -> usize {
        self.summary_sheet_offset
    }

    pub fn summary_total_cell(&self) -> CellRef {
        self.summary_total_cell
    }

    pub fn summary_label_cell(&self) -> CellRef {
        self.summary_label_cell
    }
}

/// Args for the `lunch-ledger serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The address to listen on.
    #[arg(long, env = "LUNCH_LEDGER_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,
}

impl ServeArgs {
    pub fn new(bind: SocketAddr) -> Self {
        Self { bind }
    }

    pub fn bind(&self) -> SocketAddr {
        self.bind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let args = Args::try_parse_from([
            "lunch-ledger",
            "--sheet-id",
            "abc",
            "--entry-sheet-offset",
            "4",
            "--summary-total-cell",
            "G30",
            "serve",
            "--bind",
            "0.0.0.0:8080",
        ])
        .unwrap();

        let source = args.common().source();
        assert_eq!(source.sheet_id(), Some("abc"));
        assert_eq!(source.entry_sheet_offset(), 4);
        assert_eq!(source.summary_sheet_offset(), 1);
        assert_eq!(source.summary_total_cell(), CellRef::new(29, 6));
        assert_eq!(source.summary_label_cell(), CellRef::new(0, 7));
        match args.command() {
            Command::Serve(serve) => assert_eq!(serve.bind().port(), 8080),
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_log_level() {
        let args = Args::try_parse_from(["lunch-ledger", "--log-level", "debug", "sum"]).unwrap();
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
        assert!(matches!(args.command(), Command::Sum));
    }

    #[test]
    fn test_bad_cell_is_rejected() {
        let result = Args::try_parse_from(["lunch-ledger", "--summary-label-cell", "1H", "sum"]);
        assert!(result.is_err());
    }
}
