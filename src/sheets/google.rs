//! Google Sheets v4 backend authenticated with a service account.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use moka::future::Cache;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::{SheetBackend, SheetError};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Access tokens live an hour; refresh well before that.
const TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct GoogleSheets {
    client: Client,
    spreadsheet_id: String,
    account: ServiceAccountKey,
    tokens: Cache<(), String>,
    sheet_ids: Cache<String, i64>,
}

fn cell_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl GoogleSheets {
    pub fn from_service_account_json(json: &str, spreadsheet_id: &str) -> Result<Self, SheetError> {
        let account: ServiceAccountKey = serde_json::from_str(json)?;
        // fail early on a key that cannot sign
        EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| SheetError::Auth(e.to_string()))?;

        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;

        Ok(Self {
            client,
            spreadsheet_id: spreadsheet_id.to_string(),
            account,
            tokens: Cache::builder()
                .max_capacity(1)
                .time_to_live(TOKEN_TTL)
                .build(),
            sheet_ids: Cache::builder().max_capacity(64).build(),
        })
    }

    async fn fetch_token(&self) -> Result<String, SheetError> {
        let token_uri = self
            .account
            .token_uri
            .as_deref()
            .unwrap_or(DEFAULT_TOKEN_URI);
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.account.client_email,
            scope: SCOPE,
            aud: token_uri,
            iat: now,
            exp: now + 3600,
        };
        let key = EncodingKey::from_rsa_pem(self.account.private_key.as_bytes())
            .map_err(|e| SheetError::Auth(e.to_string()))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| SheetError::Auth(e.to_string()))?;

        debug!(client_email = %self.account.client_email, "Requesting spreadsheet access token");
        let resp: TokenResponse = self
            .client
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    async fn token(&self) -> Result<String, SheetError> {
        self.tokens
            .try_get_with((), self.fetch_token())
            .await
            .map_err(|e| SheetError::Auth(e.to_string()))
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SheetError> {
        let mut url = Url::parse(SHEETS_API).map_err(|e| SheetError::Config(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetError::Config("invalid Sheets API base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Numeric id of a worksheet, needed for row deletion.
    async fn sheet_id(&self, sheet: &str) -> Result<i64, SheetError> {
        if let Some(id) = self.sheet_ids.get(sheet).await {
            return Ok(id);
        }

        let mut url = self.url(&[self.spreadsheet_id.as_str()])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let meta: Value = self
            .client
            .get(url)
            .bearer_auth(self.token().await?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let id = meta["sheets"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|s| &s["properties"])
            .find(|p| p["title"].as_str() == Some(sheet))
            .and_then(|p| p["sheetId"].as_i64())
            .ok_or_else(|| SheetError::NotFound(sheet.to_string()))?;

        self.sheet_ids.insert(sheet.to_string(), id).await;
        Ok(id)
    }
}

#[async_trait]
impl SheetBackend for GoogleSheets {
    async fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, SheetError> {
        let url = self.url(&[self.spreadsheet_id.as_str(), "values", sheet])?;
        let range: ValueRange = self
            .client
            .get(url)
            .bearer_auth(self.token().await?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn write_row(&self, sheet: &str, row: usize, values: &[String]) -> Result<(), SheetError> {
        let range = format!("{sheet}!A{row}");
        let mut url = self.url(&[self.spreadsheet_id.as_str(), "values", range.as_str()])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        self.client
            .put(url)
            .bearer_auth(self.token().await?)
            .json(&json!({ "majorDimension": "ROWS", "values": [values] }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn append_row(&self, sheet: &str, values: &[String]) -> Result<(), SheetError> {
        let range = format!("{sheet}!A1:append");
        let mut url = self.url(&[self.spreadsheet_id.as_str(), "values", range.as_str()])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        self.client
            .post(url)
            .bearer_auth(self.token().await?)
            .json(&json!({ "majorDimension": "ROWS", "values": [values] }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn delete_row(&self, sheet: &str, row: usize) -> Result<(), SheetError> {
        let sheet_id = self.sheet_id(sheet).await?;
        let target = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.url(&[target.as_str()])?;

        self.client
            .post(url)
            .bearer_auth(self.token().await?)
            .json(&json!({
                "requests": [{
                    "deleteDimension": {
                        "range": {
                            "sheetId": sheet_id,
                            "dimension": "ROWS",
                            "startIndex": row - 1,
                            "endIndex": row,
                        }
                    }
                }]
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_are_stringified() {
        assert_eq!(cell_text(&json!("a")), "a");
        assert_eq!(cell_text(&json!(12)), "12");
        assert_eq!(cell_text(&Value::Null), "");
    }

    #[test]
    fn bad_service_account_is_rejected() {
        assert!(GoogleSheets::from_service_account_json("{}", "sheet").is_err());
        let bad_key = r#"{"client_email":"a@b","private_key":"not a pem"}"#;
        assert!(matches!(
            GoogleSheets::from_service_account_json(bad_key, "sheet"),
            Err(SheetError::Auth(_))
        ));
    }
}
