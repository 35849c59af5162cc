use std::{fmt::Display, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{storage::Table, store::Record};

pub const SETTINGS_KEY: &str = "company";

/// Company parameters, including the accounts the sub-ledgers post to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanySettings {
    pub name: String,
    pub base_currency: String,
    pub retained_earnings_account: Option<String>,
    pub debtors_control_account: Option<String>,
    pub creditors_control_account: Option<String>,
    pub sales_account: Option<String>,
    pub purchases_account: Option<String>,
    pub vat_output_account: Option<String>,
    pub vat_input_account: Option<String>,
    pub bank_account: Option<String>,
    pub stock_account: Option<String>,
    pub stock_adjustment_account: Option<String>,
    pub allow_negative_stock: bool,
}

impl CompanySettings {
    /// All configured account references, labelled by setting name.
    pub fn account_references(&self) -> Vec<(&'static str, &str)> {
        [
            ("retained_earnings_account", &self.retained_earnings_account),
            ("debtors_control_account", &self.debtors_control_account),
            ("creditors_control_account", &self.creditors_control_account),
            ("sales_account", &self.sales_account),
            ("purchases_account", &self.purchases_account),
            ("vat_output_account", &self.vat_output_account),
            ("vat_input_account", &self.vat_input_account),
            ("bank_account", &self.bank_account),
            ("stock_account", &self.stock_account),
            ("stock_adjustment_account", &self.stock_adjustment_account),
        ]
        .into_iter()
        .filter_map(|(name, code)| code.as_deref().map(|c| (name, c)))
        .collect()
    }
}

impl Record for CompanySettings {
    const TABLE: Table = Table::Settings;

    fn key(&self) -> String {
        SETTINGS_KEY.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatCode {
    pub code: String,
    pub description: String,
    /// Percentage, e.g. `20` for 20%.
    pub rate: Decimal,
}

impl VatCode {
    pub fn vat_for(&self, net: Decimal) -> Decimal {
        super::round_money(net * self.rate / Decimal::ONE_HUNDRED)
    }
}

impl Record for VatCode {
    const TABLE: Table = Table::VatCodes;

    fn key(&self) -> String {
        self.code.clone()
    }
}

/// Ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Clerk,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Clerk => "clerk",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "viewer" | "reader" => Ok(Role::Viewer),
            "clerk" => Ok(Role::Clerk),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub password_hash: String,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Record for User {
    const TABLE: Table = Table::Users;

    fn key(&self) -> String {
        self.username.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_vat_rounding() {
        let standard = VatCode {
            code: "S".to_string(),
            description: "Standard".to_string(),
            rate: dec!(20),
        };
        assert_eq!(standard.vat_for(dec!(10.03)), dec!(2.01));
        assert_eq!(standard.vat_for(dec!(0)), dec!(0));
    }

    #[test]
    fn test_role_order() {
        assert!(Role::Admin > Role::Manager);
        assert!(Role::Manager > Role::Clerk);
        assert!(Role::Clerk > Role::Viewer);
        assert_eq!("reader".parse::<Role>().unwrap(), Role::Viewer);
    }

    #[test]
    fn test_settings_account_references() {
        let settings = CompanySettings {
            bank_account: Some("1200".to_string()),
            sales_account: Some("4000".to_string()),
            ..Default::default()
        };
        let refs = settings.account_references();
        assert_eq!(refs, vec![("sales_account", "4000"), ("bank_account", "1200")]);
    }
}
