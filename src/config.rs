//! Configuration for lunch-ledger.
//!
//! The `Config` is built once at startup from `SourceArgs` (flags and environment variables) and is
//! then passed by reference to everything that fetches. Missing credentials are caught here, before
//! any network call is made.

use crate::api::Mode;
use crate::args::SourceArgs;
use crate::model::CellRef;
use crate::{Error, Result};
use std::fmt::{Debug, Formatter};

/// Used in place of a real spreadsheet id when running in test mode without one.
const TEST_SHEET_ID: &str = "test-sheet";

const EMAIL_ENV: &str = "GOOGLE_SERVICE_ACCOUNT_EMAIL";
const PRIVATE_KEY_ENV: &str = "GOOGLE_PRIVATE_KEY";
const SHEET_ID_ENV: &str = "GOOGLE_SHEET_ID";

/// The validated configuration of the app.
#[derive(Debug, Clone)]
pub struct Config {
    credentials: Option<Credentials>,
    sheet_id: String,
    link_document_id: String,
    entry_sheet_offset: usize,
    summary_sheet_offset: usize,
    summary_total_cell: CellRef,
    summary_label_cell: CellRef,
}

impl Config {
    /// Validates `args` for `mode`.
    ///
    /// In `Mode::Google` the service account email, private key and sheet id must all be present
    /// and non-blank; every missing name is reported in a single `ErrorType::Config` error. In
    /// `Mode::Test` nothing is required.
    pub fn new(args: &SourceArgs, mode: Mode) -> Result<Self> {
        let email = present(args.service_account_email());
        let key = present(args.private_key());
        let sheet_id = present(args.sheet_id());

        let credentials = match (mode, email, key, sheet_id) {
            (_, Some(email), Some(key), Some(_)) => Some(Credentials::new(email, key)),
            (Mode::Test, _, _, _) => None,
            (Mode::Google, email, key, sheet_id) => {
                let missing: Vec<&str> = [
                    (EMAIL_ENV, email.is_none()),
                    (PRIVATE_KEY_ENV, key.is_none()),
                    (SHEET_ID_ENV, sheet_id.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, is_missing)| is_missing.then_some(name))
                .collect();
                return Err(Error::config(format!(
                    "Missing required environment variables: {}",
                    missing.join(", ")
                )));
            }
        };

        let sheet_id = sheet_id.unwrap_or(TEST_SHEET_ID).to_string();
        let link_document_id = present(args.link_document_id())
            .map(str::to_string)
            .unwrap_or_else(|| sheet_id.clone());

        Ok(Self {
            credentials,
            sheet_id,
            link_document_id,
            entry_sheet_offset: args.entry_sheet_offset(),
            summary_sheet_offset: args.summary_sheet_offset(),
            summary_total_cell: args.summary_total_cell(),
            summary_label_cell: args.summary_label_cell(),
        })
    }

    /// The service account credentials. Always present in `Mode::Google`.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// The id of the spreadsheet to read.
    pub fn sheet_id(&self) -> &str {
        &self.sheet_id
    }

    /// The spreadsheet id used when building links to individual sheets.
    pub fn link_document_id(&self) -> &str {
        &self.link_document_id
    }

    /// The index of the first sheet that holds bill entries.
    pub fn entry_sheet_offset(&self) -> usize {
        self.entry_sheet_offset
    }

    /// The index of the first sheet that holds a period total.
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

/// Service account credentials. The private key is kept out of `Debug` output.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    email: String,
    private_key: String,
}

impl Credentials {
    /// Environment variables cannot easily hold multi-line values, so PEM keys are usually stored
    /// with their newlines escaped as `\n`. Those are unescaped here.
    pub fn new(email: impl Into<String>, private_key: impl AsRef<str>) -> Self {
        Self {
            email: email.into(),
            private_key: private_key.as_ref().replace("\\n", "\n"),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Treats blank values the same as absent ones.
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
