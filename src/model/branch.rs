use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::model::permission::PermKey;

/// One of the three parallel business units. Path segments use the
/// lowercase form (`es1`), so an unknown branch fails extraction with a 404.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    AsRefStr,
    Display,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Branch {
    Es1,
    Es2,
    Es3,
}

impl Branch {
    pub fn accounting_perm(self) -> PermKey {
        match self {
            Branch::Es1 => PermKey::AccountingEs1,
            Branch::Es2 => PermKey::AccountingEs2,
            Branch::Es3 => PermKey::AccountingEs3,
        }
    }

    pub fn records_perm(self) -> PermKey {
        match self {
            Branch::Es1 => PermKey::RecordsEs1,
            Branch::Es2 => PermKey::RecordsEs2,
            Branch::Es3 => PermKey::RecordsEs3,
        }
    }

    /// Records live in one table per branch; the name doubles as the
    /// mirrored worksheet name.
    pub fn records_table(self) -> &'static str {
        match self {
            Branch::Es1 => "records_es1",
            Branch::Es2 => "records_es2",
            Branch::Es3 => "records_es3",
        }
    }
}
