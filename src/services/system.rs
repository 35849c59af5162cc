//! System administration: company settings, VAT codes and users.

use std::sync::Arc;

use acas_core::{
    Account, AccountType, CompanySettings, CreateUserCommand, Reader, Role, StockItem, Store,
    UpdateVatCodeCommand, User, VatCode,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rust_decimal::Decimal;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{fetch, require_code, require_text, settings};
use crate::error::{LedgerError, LedgerResult};

const MIN_PASSWORD_LEN: usize = 8;

fn hash_password(password: &str) -> LedgerResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LedgerError::validation(format!("cannot hash password: {}", e)))
}

fn check_rate(rate: Decimal) -> LedgerResult<()> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(LedgerError::validation("VAT rate must be between 0 and 100"));
    }
    Ok(())
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

pub struct SystemAdmin {
    store: Arc<Store>,
}

impl SystemAdmin {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn get_settings(&self) -> LedgerResult<CompanySettings> {
        settings(self.store.as_ref())
    }

    /// Replaces the company settings. Every referenced account must exist
    /// and accept postings; retained earnings must be a capital account.
    pub fn update_settings(&self, new: CompanySettings) -> LedgerResult<CompanySettings> {
        self.store.transaction(|tx| {
            for (setting, code) in new.account_references() {
                let account = tx.get::<Account>(code)?.ok_or_else(|| {
                    LedgerError::validation(format!("{}: account {} does not exist", setting, code))
                })?;
                if !account.postable || !account.active {
                    return Err(LedgerError::validation(format!(
                        "{}: account {} does not accept postings",
                        setting, code
                    )));
                }
                if setting == "retained_earnings_account"
                    && account.account_type != AccountType::Capital
                {
                    return Err(LedgerError::validation(format!(
                        "{}: account {} is not a capital account",
                        setting, code
                    )));
                }
            }
            tx.put(&new)?;
            tracing::info!(company = %new.name, "Company settings updated");
            Ok(new.clone())
        })
    }

    pub fn list_vat_codes(&self) -> LedgerResult<Vec<VatCode>> {
        Ok(self.store.list::<VatCode>()?)
    }

    pub fn get_vat_code(&self, code: &str) -> LedgerResult<VatCode> {
        fetch(self.store.as_ref(), "VAT code", code)
    }

    pub fn create_vat_code(&self, vat: VatCode) -> LedgerResult<VatCode> {
        require_code(&vat.code, "VAT code")?;
        require_text(&vat.description, "description")?;
        check_rate(vat.rate)?;

        self.store.transaction(|tx| {
            if tx.exists::<VatCode>(&vat.code)? {
                return Err(LedgerError::already_exists("VAT code", &vat.code));
            }
            tx.put(&vat)?;
            tracing::info!(vat_code = %vat.code, rate = %vat.rate, "VAT code created");
            Ok(vat.clone())
        })
    }

    pub fn update_vat_code(&self, code: &str, cmd: UpdateVatCodeCommand) -> LedgerResult<VatCode> {
        require_text(&cmd.description, "description")?;
        check_rate(cmd.rate)?;

        self.store.transaction(|tx| {
            let mut vat: VatCode = fetch(tx, "VAT code", code)?;
            vat.description = cmd.description.clone();
            vat.rate = cmd.rate;
            tx.put(&vat)?;
            tracing::info!(vat_code = code, rate = %vat.rate, "VAT code updated");
            Ok(vat)
        })
    }

    /// VAT on `net` at the rate of `code`.
    pub fn vat_for(&self, code: &str, net: Decimal) -> LedgerResult<Decimal> {
        Ok(self.get_vat_code(code)?.vat_for(net))
    }

    /// Deletes a VAT code no stock item uses.
    pub fn delete_vat_code(&self, code: &str) -> LedgerResult<()> {
        self.store.transaction(|tx| {
            fetch::<VatCode>(tx, "VAT code", code)?;
            if let Some(item) = tx
                .list::<StockItem>()?
                .into_iter()
                .find(|i| i.vat_code == code)
            {
                return Err(LedgerError::conflict(format!(
                    "VAT code {} is used by stock item {}",
                    code, item.code
                )));
            }
            tx.delete::<VatCode>(code)?;
            Ok(())
        })
    }

    pub fn create_user(&self, cmd: CreateUserCommand) -> LedgerResult<User> {
        require_code(&cmd.username, "username")?;
        if cmd.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(LedgerError::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let password_hash = hash_password(&cmd.password)?;

        self.store.transaction(|tx| {
            if tx.exists::<User>(&cmd.username)? {
                return Err(LedgerError::already_exists("user", &cmd.username));
            }
            let user = User {
                id: Uuid::new_v4(),
                username: cmd.username.clone(),
                role: cmd.role,
                password_hash: password_hash.clone(),
                active: true,
                created_at: OffsetDateTime::now_utc(),
            };
            tx.put(&user)?;
            tracing::info!(user = %user.username, role = %user.role, "User created");
            Ok(user)
        })
    }

    pub fn get_user(&self, username: &str) -> LedgerResult<User> {
        fetch(self.store.as_ref(), "user", username)
    }

    pub fn list_users(&self) -> LedgerResult<Vec<User>> {
        Ok(self.store.list::<User>()?)
    }

    pub fn set_user_active(&self, username: &str, active: bool) -> LedgerResult<User> {
        self.store.transaction(|tx| {
            let mut user: User = fetch(tx, "user", username)?;
            if !active && user.role == Role::Admin {
                let admins = tx
                    .list::<User>()?
                    .into_iter()
                    .filter(|u| u.active && u.role == Role::Admin)
                    .count();
                if user.active && admins == 1 {
                    return Err(LedgerError::conflict("cannot deactivate the last administrator"));
                }
            }
            user.active = active;
            tx.put(&user)?;
            tracing::info!(user = username, active, "User status changed");
            Ok(user)
        })
    }

    /// Checks a username and password. Unknown users, wrong passwords and
    /// inactive users all fail the same way.
    pub fn authenticate(&self, username: &str, password: &str) -> LedgerResult<User> {
        let user = self.store.get::<User>(username)?;
        match user {
            Some(user) if user.active && verify_password(password, &user.password_hash) => {
                metrics::increment_counter!("acas_logins_total", "outcome" => "success");
                Ok(user)
            }
            _ => {
                metrics::increment_counter!("acas_logins_total", "outcome" => "failure");
                tracing::warn!(user = username, "Failed login");
                Err(LedgerError::Unauthorized("invalid username or password".to_string()))
            }
        }
    }

    /// Creates the configured administrator when no users exist yet.
    pub fn ensure_bootstrap_admin(&self, username: &str, password: &str) -> LedgerResult<Option<User>> {
        if self.store.count::<User>()? > 0 {
            return Ok(None);
        }
        let user = self.create_user(CreateUserCommand {
            username: username.to_string(),
            password: password.to_string(),
            role: Role::Admin,
        })?;
        tracing::info!(user = %user.username, "Bootstrap administrator created");
        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }
}
