use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// The one account that always holds every permission and can never be deleted.
pub const MASTER_USERNAME: &str = "adm-es";

/// Closed set of page keys a user can be granted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    AsRefStr,
    Display,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PermKey {
    Home,
    AccountingHome,
    #[serde(rename = "accounting_es1")]
    #[strum(serialize = "accounting_es1")]
    AccountingEs1,
    #[serde(rename = "accounting_es2")]
    #[strum(serialize = "accounting_es2")]
    AccountingEs2,
    #[serde(rename = "accounting_es3")]
    #[strum(serialize = "accounting_es3")]
    AccountingEs3,
    MonthlyCommission,
    FinancialCommitments,
    RecordsHome,
    #[serde(rename = "records_es1")]
    #[strum(serialize = "records_es1")]
    RecordsEs1,
    #[serde(rename = "records_es2")]
    #[strum(serialize = "records_es2")]
    RecordsEs2,
    #[serde(rename = "records_es3")]
    #[strum(serialize = "records_es3")]
    RecordsEs3,
    Employees,
    Tasks,
    Permissions,
}

impl PermKey {
    pub fn label(self) -> &'static str {
        match self {
            PermKey::Home => "Home",
            PermKey::AccountingHome => "Financial accounting",
            PermKey::AccountingEs1 => "Daily accounting ES1",
            PermKey::AccountingEs2 => "Daily accounting ES2",
            PermKey::AccountingEs3 => "Daily accounting ES3",
            PermKey::MonthlyCommission => "Sales commission",
            PermKey::FinancialCommitments => "Financial commitments",
            PermKey::RecordsHome => "Records",
            PermKey::RecordsEs1 => "Records ES1",
            PermKey::RecordsEs2 => "Records ES2",
            PermKey::RecordsEs3 => "Records ES3",
            PermKey::Employees => "Employees",
            PermKey::Tasks => "Tasks",
            PermKey::Permissions => "Permissions",
        }
    }
}

/// Permissions held by one user for the lifetime of a single request.
///
/// Built fresh from the `permissions` table on every request, never cached
/// across requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    allowed: BTreeSet<PermKey>,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            allowed: PermKey::iter().collect(),
        }
    }

    /// Builds the set from stored `(perm_key, allowed)` rows.
    /// Unknown keys are ignored and missing keys count as denied.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        let allowed = rows
            .into_iter()
            .filter(|(_, allowed)| *allowed)
            .filter_map(|(key, _)| key.parse::<PermKey>().ok())
            .collect();
        Self { allowed }
    }

    pub fn allows(&self, key: PermKey) -> bool {
        self.allowed.contains(&key)
    }

    pub fn keys(&self) -> Vec<PermKey> {
        self.allowed.iter().copied().collect()
    }
}
