use anyhow::{Context, Result};
use authgate::store::{CreateOutcome, CredentialRecord, MfaRecord, PgUserStore, UserStore};
use std::{collections::BTreeSet, env};
use uuid::Uuid;

const DSN_ENV: &str = "AUTHGATE_TEST_DSN";

async fn store() -> Result<Option<PgUserStore>> {
    let Ok(dsn) = env::var(DSN_ENV) else {
        eprintln!("Skipping PostgreSQL store test: {DSN_ENV} is not set");
        return Ok(None);
    };
    Ok(Some(PgUserStore::connect(&dsn).await?))
}

fn record(username: &str) -> CredentialRecord {
    CredentialRecord::new(
        username.to_string(),
        "$argon2id$stub".to_string(),
        MfaRecord {
            enabled: false,
            encrypted_secret: vec![7; 40],
        },
    )
}

fn unique_username() -> String {
    format!("user-{}", Uuid::now_v7().simple())
}

#[tokio::test]
async fn create_find_and_confirm_mfa() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };

    let account = record(&unique_username());
    assert_eq!(store.create(&account).await?, CreateOutcome::Created);

    let by_name = store
        .find_by_username(&account.username)
        .await?
        .context("account not found by username")?;
    assert_eq!(by_name.id, account.id);
    assert_eq!(by_name.password_hash, account.password_hash);
    assert_eq!(by_name.authorities, BTreeSet::from(["USER".to_string()]));
    assert_eq!(by_name.mfa, account.mfa);
    assert!(!by_name.mfa_enabled());

    let mut by_id = store
        .find_by_id(account.id)
        .await?
        .context("account not found by id")?;
    assert_eq!(by_id.username, account.username);

    if let Some(mfa) = by_id.mfa.as_mut() {
        mfa.enabled = true;
    }
    by_id.authorities = BTreeSet::from(["ADMIN".to_string()]);
    store.save(&by_id).await?;

    let saved = store
        .find_by_id(account.id)
        .await?
        .context("account vanished after save")?;
    assert!(saved.mfa_enabled());
    assert_eq!(
        saved.mfa.map(|mfa| mfa.encrypted_secret),
        Some(vec![7; 40])
    );
    assert_eq!(saved.authorities, BTreeSet::from(["ADMIN".to_string()]));

    Ok(())
}

#[tokio::test]
async fn duplicate_username_is_reported() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };

    let username = unique_username();
    assert_eq!(store.create(&record(&username)).await?, CreateOutcome::Created);
    assert_eq!(
        store.create(&record(&username)).await?,
        CreateOutcome::UsernameTaken
    );

    Ok(())
}

#[tokio::test]
async fn accounts_without_roles_or_mfa_decode() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };

    let mut account = record(&unique_username());
    assert_eq!(store.create(&account).await?, CreateOutcome::Created);

    account.authorities.clear();
    account.mfa = None;
    store.save(&account).await?;

    let found = store
        .find_by_username(&account.username)
        .await?
        .context("account not found")?;
    assert!(found.authorities.is_empty());
    assert!(found.mfa.is_none());

    Ok(())
}

#[tokio::test]
async fn saving_unknown_account_fails() -> Result<()> {
    let Some(store) = store().await? else {
        return Ok(());
    };

    let ghost = record(&unique_username());
    assert!(store.save(&ghost).await.is_err());
    assert!(store.find_by_id(ghost.id).await?.is_none());

    Ok(())
}
