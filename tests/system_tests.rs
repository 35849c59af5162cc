mod common;

use acas::{LedgerError, Services};
use acas_core::{CreateUserCommand, Role, UpdateVatCodeCommand, VatCode};
use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn user(services: &Services, username: &str, role: Role) {
    services
        .system
        .create_user(CreateUserCommand {
            username: username.to_string(),
            password: format!("{}-secret", username),
            role,
        })
        .expect("Failed to create user");
}

fn vat_code(code: &str, rate: Decimal) -> VatCode {
    VatCode {
        code: code.to_string(),
        description: format!("Rate {}", rate),
        rate,
    }
}

#[test]
fn test_settings_validate_account_references() {
    for (name, services) in backends() {
        company(&services);
        let saved = services.system.get_settings().unwrap();

        let mut missing = saved.clone();
        missing.retained_earnings_account = Some("9999".to_string());
        assert!(
            matches!(services.system.update_settings(missing), Err(LedgerError::Validation(_))),
            "{}",
            name
        );

        let mut not_capital = saved.clone();
        not_capital.retained_earnings_account = Some(SALES.to_string());
        assert!(
            matches!(services.system.update_settings(not_capital), Err(LedgerError::Validation(_))),
            "{}",
            name
        );

        let mut header = saved.clone();
        header.bank_account = Some("1000".to_string());
        assert!(
            matches!(services.system.update_settings(header), Err(LedgerError::Validation(_))),
            "{}",
            name
        );
        assert_eq!(services.system.get_settings().unwrap(), saved, "{}", name);

        let mut renamed = saved.clone();
        renamed.name = "Applewood Computers Ltd".to_string();
        renamed.retained_earnings_account = Some(CAPITAL.to_string());
        services.system.update_settings(renamed).unwrap();
        let settings = services.system.get_settings().unwrap();
        assert_eq!(settings.name, "Applewood Computers Ltd", "{}", name);
        assert_eq!(settings.retained_earnings_account.as_deref(), Some(CAPITAL), "{}", name);
    }
}

#[test]
fn test_vat_rates_are_bounded() {
    for (name, services) in backends() {
        company(&services);
        for rate in [dec!(-1), dec!(100.01)] {
            assert!(
                matches!(
                    services.system.create_vat_code(vat_code("X", rate)),
                    Err(LedgerError::Validation(_))
                ),
                "{}",
                name
            );
        }
        services.system.create_vat_code(vat_code("E", dec!(100))).unwrap();
        assert!(
            matches!(
                services.system.create_vat_code(vat_code("E", dec!(5))),
                Err(LedgerError::AlreadyExists { .. })
            ),
            "{}",
            name
        );
        assert!(
            matches!(
                services.system.update_vat_code(
                    "S",
                    UpdateVatCodeCommand {
                        description: "Standard".to_string(),
                        rate: dec!(120),
                    }
                ),
                Err(LedgerError::Validation(_))
            ),
            "{}",
            name
        );
        assert_eq!(services.system.get_vat_code("S").unwrap().rate, dec!(20), "{}", name);
    }
}

#[test]
fn test_vat_rounds_to_pennies() {
    let services = setup();
    services.system.create_vat_code(vat_code("R", dec!(17.5))).unwrap();
    services.system.create_vat_code(vat_code("L", dec!(5))).unwrap();

    assert_eq!(services.system.vat_for("R", dec!(10.01)).unwrap(), dec!(1.75));
    assert_eq!(services.system.vat_for("R", dec!(0.10)).unwrap(), dec!(0.02));
    assert_eq!(services.system.vat_for("L", dec!(0.10)).unwrap(), dec!(0.01));
    assert_eq!(services.system.vat_for("L", dec!(-0.10)).unwrap(), dec!(-0.01));
    assert_eq!(services.system.vat_for("Z", dec!(999.99)).unwrap(), Decimal::ZERO);
    assert!(matches!(
        services.system.vat_for("Q", dec!(1)),
        Err(LedgerError::NotFound { .. })
    ));
}

#[test]
fn test_user_accounts() {
    for (name, services) in backends() {
        user(&services, "alice", Role::Manager);
        assert!(
            matches!(
                services.system.create_user(CreateUserCommand {
                    username: "alice".to_string(),
                    password: "another-secret".to_string(),
                    role: Role::Viewer,
                }),
                Err(LedgerError::AlreadyExists { .. })
            ),
            "{}",
            name
        );
        assert!(
            matches!(
                services.system.create_user(CreateUserCommand {
                    username: "bob".to_string(),
                    password: "short".to_string(),
                    role: Role::Viewer,
                }),
                Err(LedgerError::Validation(_))
            ),
            "{}",
            name
        );

        let alice = services.system.authenticate("alice", "alice-secret").unwrap();
        assert_eq!(alice.role, Role::Manager, "{}", name);
        assert_ne!(alice.password_hash, "alice-secret", "{}", name);
        assert!(
            matches!(
                services.system.authenticate("alice", "wrong-secret"),
                Err(LedgerError::Unauthorized(_))
            ),
            "{}",
            name
        );
        assert!(
            matches!(
                services.system.authenticate("nobody", "alice-secret"),
                Err(LedgerError::Unauthorized(_))
            ),
            "{}",
            name
        );

        services.system.set_user_active("alice", false).unwrap();
        assert!(
            matches!(
                services.system.authenticate("alice", "alice-secret"),
                Err(LedgerError::Unauthorized(_))
            ),
            "{}",
            name
        );
        services.system.set_user_active("alice", true).unwrap();
        services.system.authenticate("alice", "alice-secret").unwrap();
    }
}

#[test]
fn test_last_admin_stays_active() {
    for (name, services) in backends() {
        user(&services, "root", Role::Admin);
        user(&services, "clerk", Role::Clerk);
        assert!(
            matches!(
                services.system.set_user_active("root", false),
                Err(LedgerError::Conflict(_))
            ),
            "{}",
            name
        );
        assert!(services.system.get_user("root").unwrap().active, "{}", name);

        services.system.set_user_active("clerk", false).unwrap();
        user(&services, "deputy", Role::Admin);
        services.system.set_user_active("root", false).unwrap();
        assert!(
            matches!(
                services.system.set_user_active("deputy", false),
                Err(LedgerError::Conflict(_))
            ),
            "{}",
            name
        );
    }
}

#[test]
fn test_bootstrap_admin_created_once() {
    for (name, services) in backends() {
        let created = services
            .system
            .ensure_bootstrap_admin("admin", "bootstrap-secret")
            .unwrap()
            .expect("Expected a bootstrap admin");
        assert_eq!(created.role, Role::Admin, "{}", name);

        let again = services
            .system
            .ensure_bootstrap_admin("admin2", "other-secret")
            .unwrap();
        assert!(again.is_none(), "{}", name);
        assert_eq!(services.system.list_users().unwrap().len(), 1, "{}", name);
        services.system.authenticate("admin", "bootstrap-secret").unwrap();
    }
}
