use acas_core::{
    Account, AccountBalance, AccountType, CreateAccountCommand, Reader, UpdateAccountCommand,
};

use super::GeneralLedger;
use crate::{
    error::{LedgerError, LedgerResult},
    services::{fetch, require_code, require_text, settings},
};

fn has_children(r: &impl Reader, code: &str) -> LedgerResult<bool> {
    Ok(r.list::<Account>()?
        .iter()
        .any(|a| a.parent.as_deref() == Some(code)))
}

fn has_postings(r: &impl Reader, code: &str) -> LedgerResult<bool> {
    Ok(r.list::<AccountBalance>()?
        .iter()
        .any(|b| b.account == code && !b.is_empty()))
}

/// A parent must exist, be a header account, and not be `code` or one of its descendants.
fn check_parent(r: &impl Reader, code: &str, parent: &str) -> LedgerResult<()> {
    let mut cursor: Account = fetch(r, "parent account", parent)?;
    if cursor.postable {
        return Err(LedgerError::validation(format!(
            "parent account {} is postable; only header accounts can have children",
            parent
        )));
    }
    loop {
        if cursor.code == code {
            return Err(LedgerError::validation(format!(
                "making {} the parent of {} would create a cycle",
                parent, code
            )));
        }
        match cursor.parent {
            Some(ref next) => cursor = fetch(r, "account", next)?,
            None => return Ok(()),
        }
    }
}

impl GeneralLedger {
    pub fn create_account(&self, cmd: CreateAccountCommand) -> LedgerResult<Account> {
        require_code(&cmd.code, "account code")?;
        require_text(&cmd.name, "account name")?;

        let default_balance = cmd.account_type.default_normal_balance();
        let normal_balance = match cmd.normal_balance {
            Some(nb) if nb != default_balance && cmd.account_type != AccountType::Control => {
                return Err(LedgerError::validation(format!(
                    "{} accounts have a {:?} normal balance",
                    cmd.account_type, default_balance
                )))
            }
            Some(nb) => nb,
            None => default_balance,
        };

        self.store.transaction(|tx| {
            if tx.exists::<Account>(&cmd.code)? {
                return Err(LedgerError::already_exists("account", &cmd.code));
            }
            if let Some(ref parent) = cmd.parent {
                check_parent(tx, &cmd.code, parent)?;
            }

            let account = Account {
                code: cmd.code.clone(),
                name: cmd.name.clone(),
                account_type: cmd.account_type,
                normal_balance,
                parent: cmd.parent.clone(),
                postable: cmd.postable,
                active: true,
            };
            tx.put(&account)?;
            tracing::info!(code = %account.code, account_type = %account.account_type, "Account created");
            Ok(account)
        })
    }

    pub fn update_account(&self, code: &str, cmd: UpdateAccountCommand) -> LedgerResult<Account> {
        self.store.transaction(|tx| {
            let mut account: Account = fetch(tx, "account", code)?;

            if let Some(name) = cmd.name {
                require_text(&name, "account name")?;
                account.name = name;
            }
            if let Some(parent) = cmd.parent {
                if parent.is_empty() {
                    account.parent = None;
                } else {
                    check_parent(tx, code, &parent)?;
                    account.parent = Some(parent);
                }
            }
            if let Some(postable) = cmd.postable {
                if account.postable && !postable && has_postings(tx, code)? {
                    return Err(LedgerError::conflict(format!(
                        "account {} has postings and cannot become a header account",
                        code
                    )));
                }
                if !account.postable && postable && has_children(tx, code)? {
                    return Err(LedgerError::conflict(format!(
                        "account {} has children and must stay a header account",
                        code
                    )));
                }
                account.postable = postable;
            }
            if let Some(active) = cmd.active {
                account.active = active;
            }

            tx.put(&account)?;
            Ok(account)
        })
    }

    pub fn get_account(&self, code: &str) -> LedgerResult<Account> {
        fetch(self.store.as_ref(), "account", code)
    }

    /// Accounts ordered by code, optionally restricted to one type.
    pub fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>> {
        Ok(self
            .store
            .list::<Account>()?
            .into_iter()
            .filter(|a| account_type.map_or(true, |t| a.account_type == t))
            .collect())
    }

    pub fn children(&self, code: &str) -> LedgerResult<Vec<Account>> {
        self.get_account(code)?;
        Ok(self
            .store
            .list::<Account>()?
            .into_iter()
            .filter(|a| a.parent.as_deref() == Some(code))
            .collect())
    }

    /// Removes an account that has never been used.
    pub fn delete_account(&self, code: &str) -> LedgerResult<()> {
        self.store.transaction(|tx| {
            fetch::<Account>(tx, "account", code)?;
            if has_children(tx, code)? {
                return Err(LedgerError::conflict(format!("account {} has children", code)));
            }
            if tx.list::<AccountBalance>()?.iter().any(|b| b.account == code) {
                return Err(LedgerError::conflict(format!("account {} has postings", code)));
            }
            if let Some((setting, _)) = settings(tx)?
                .account_references()
                .into_iter()
                .find(|(_, c)| *c == code)
            {
                return Err(LedgerError::conflict(format!(
                    "account {} is referenced by setting {}",
                    code, setting
                )));
            }
            tx.delete::<Account>(code)?;
            tracing::info!(code, "Account deleted");
            Ok(())
        })
    }
}
