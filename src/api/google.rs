//! Implements the `Connector` and `Document` traits against Google Sheets.
//!
//! The sheet listing comes from the Sheets REST API directly (a single `spreadsheets.get` with a
//! field mask), and displayed cell values are read with the `sheets::Client`. Unformatted values
//! are also read with the REST API because `sheets` types every cell as a string.

use crate::api::service_account::ServiceAccount;
use crate::api::{quote_title, Connector, Document, Load, LoadedSheet, SheetInfo};
use crate::error::{ErrorType, IntoResult, Res};
use crate::model::{Amount, CellRef};
use crate::{Config, Error, Result};
use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::Value;
use sheets::types::{DateTimeRenderOption, Dimension, ValueRenderOption};
use sheets::ClientError;
use tracing::{debug, trace};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Opens the configured spreadsheet using service account credentials.
pub struct GoogleConnector {
    account: ServiceAccount,
    spreadsheet_id: String,
    http: reqwest::Client,
}

impl GoogleConnector {
    /// Fails with `ErrorType::Config` if the config has no credentials or the key is unusable.
    pub fn new(config: &Config) -> Result<Self> {
        let credentials = config
            .credentials()
            .ok_or_else(|| Error::config("Service account credentials are required"))?;
        Ok(Self {
            account: ServiceAccount::new(credentials)?,
            spreadsheet_id: config.sheet_id().to_string(),
            http: reqwest::Client::new(),
        })
    }

    /// Lists the sheets of the spreadsheet, ordered by index.
    async fn list_sheets(&self, access_token: &str) -> Res<Vec<SheetInfo>> {
        let url = format!("{SHEETS_API}/{}", self.spreadsheet_id);
        let response = self
            .http
            .get(&url)
            .query(&[("fields", "sheets.properties(sheetId,title,index)")])
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to send the spreadsheet info request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("Loading the spreadsheet info failed with status {status}: {body}");
        }

        let listing: SpreadsheetListing = response
            .json()
            .await
            .context("Failed to parse the spreadsheet info response")?;
        let mut sheets: Vec<SheetInfo> = listing
            .sheets
            .into_iter()
            .map(|s| SheetInfo {
                index: s.properties.index,
                sheet_id: s.properties.sheet_id,
                title: s.properties.title,
            })
            .collect();
        sheets.sort_by_key(|s| s.index);
        Ok(sheets)
    }
}

#[async_trait::async_trait]
impl Connector for GoogleConnector {
    async fn open(&self) -> Result<Box<dyn Document + Send>> {
        let access_token = self.account.access_token(&self.http).await?;
        let sheets = self
            .list_sheets(&access_token)
            .await
            .pub_result(ErrorType::Source)?;
        debug!(
            "Opened spreadsheet {} as {} with {} sheets",
            self.spreadsheet_id,
            self.account.email(),
            sheets.len()
        );

        // The sheets crate requires client_id, client_secret, redirect_uri and refresh_token,
        // but we don't need them for API calls, only the access token.
        let client = sheets::Client::new(
            String::new(),
            String::new(),
            String::new(),
            access_token.clone(),
            String::new(),
        );

        Ok(Box::new(GoogleDocument {
            spreadsheet_id: self.spreadsheet_id.clone(),
            client,
            http: self.http.clone(),
            access_token,
            sheets,
        }))
    }
}

/// An opened Google spreadsheet.
struct GoogleDocument {
    spreadsheet_id: String,
    client: sheets::Client,
    http: reqwest::Client,
    access_token: String,
    sheets: Vec<SheetInfo>,
}

impl GoogleDocument {
    /// Reads displayed values.
    async fn formatted(&self, range: &str) -> Res<Vec<Vec<String>>> {
        let response = self
            .client
            .spreadsheets()
            .values_get(
                &self.spreadsheet_id,
                range,
                DateTimeRenderOption::FormattedString,
                Dimension::Rows,
                ValueRenderOption::FormattedValue,
            )
            .await
            .map_err(map_client_error)?;
        Ok(response.body.values)
    }

    /// Reads numbers as stored; dates are still rendered as formatted strings.
    async fn unformatted(&self, range: &str) -> Res<Vec<Vec<String>>> {
        let mut url = url::Url::parse(SHEETS_API).context("Invalid Sheets API URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("The Sheets API URL cannot take a path"))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(range);

        let response = self
            .http
            .get(url)
            .query(&[
                ("majorDimension", "ROWS"),
                ("valueRenderOption", "UNFORMATTED_VALUE"),
                ("dateTimeRenderOption", "FORMATTED_STRING"),
            ])
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to send the values request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("Loading values failed with status {status}: {body}");
        }

        let values: RawValueRange = response
            .json()
            .await
            .context("Failed to parse the values response")?;
        Ok(values.into_rows())
    }
}

#[async_trait::async_trait]
impl Document for GoogleDocument {
    fn sheets(&self) -> &[SheetInfo] {
        &self.sheets
    }

    async fn load(&mut self, sheet: &SheetInfo, load: Load) -> Result<LoadedSheet> {
        let title = quote_title(&sheet.title);
        let (range, origin) = match load {
            Load::All => (format!("{title}!A:ZZ"), CellRef::new(0, 0)),
            Load::Range(r) | Load::Values(r) => (format!("{title}!{r}"), r.start()),
        };
        trace!("load {range}");
        let rows = match load {
            Load::All | Load::Range(_) => self.formatted(&range).await,
            Load::Values(_) => self.unformatted(&range).await,
        }
        .with_context(|| format!("Failed to fetch {range}"))
        .pub_result(ErrorType::Source)?;
        Ok(LoadedSheet::new(sheet.clone(), origin, rows))
    }
}

/// The subset of the `spreadsheets.get` response selected by our field mask.
#[derive(Debug, Default, Deserialize)]
struct SpreadsheetListing {
    #[serde(default)]
    sheets: Vec<ListedSheet>,
}

#[derive(Debug, Default, Deserialize)]
struct ListedSheet {
    #[serde(default)]
    properties: ListedProperties,
}

/// Zero values are left out of the response, hence the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedProperties {
    #[serde(default)]
    sheet_id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    index: usize,
}

/// A `values.get` response read with `UNFORMATTED_VALUE`, where cells can be numbers or booleans.
#[derive(Debug, Default, Deserialize)]
struct RawValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl RawValueRange {
    fn into_rows(self) -> Vec<Vec<String>> {
        self.values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect()
    }
}

/// Renders an unformatted cell as plain text that `Amount` parses exactly: no separators, no
/// currency, and no exponent.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n
                .as_f64()
                .and_then(Amount::from_f64)
                .map(|a| a.value().to_string())
                .unwrap_or_default(),
        },
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn map_client_error(e: ClientError) -> anyhow::Error {
    let error_name = match &e {
        ClientError::EmptyRefreshToken => "EmptyRefreshToken".to_string(),
        ClientError::FromUtf8Error(inner) => format!("FromUtf8Error {inner}"),
        ClientError::UrlParserError(inner) => format!("UrlParserError {inner}"),
        ClientError::SerdeJsonError(inner) => format!("SerdeJsonError {inner}"),
        ClientError::ReqwestError(inner) => format!("ReqwestError {inner}"),
        ClientError::InvalidHeaderValue(inner) => format!("InvalidHeaderValue {inner}"),
        ClientError::ReqwestMiddleWareError(inner) => format!("ReqwestMiddleWareError {inner}"),
        ClientError::HttpError { .. } => "HttpError".to_string(),
        ClientError::Other(_) => "Other".to_string(),
    };
    anyhow::Error::new(e).context(error_name)
}
