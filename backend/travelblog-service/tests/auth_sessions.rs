//! Account lifecycle against a document store that fails on demand.

mod common;

use chrono::Duration;
use common::{FlakyStore, Op};
use std::sync::Arc;
use travelblog_service::auth::{
    AuthError, AuthProvider, LocalAuthProvider, SignInRequest, SignUpRequest,
};

fn provider(store: Arc<FlakyStore>) -> LocalAuthProvider {
    LocalAuthProvider::new(store, "integration-test-secret", Duration::hours(1))
}

fn profile() -> SignUpRequest {
    SignUpRequest {
        email: "ana@travelblog.dev".into(),
        password: "island-hopper".into(),
        confirm_password: "island-hopper".into(),
        display_name: "Ana".into(),
        photo_url: "https://img.example/ana.png".into(),
    }
}

fn credentials() -> SignInRequest {
    SignInRequest {
        email: "ana@travelblog.dev".into(),
        password: "island-hopper".into(),
    }
}

#[tokio::test]
async fn failed_profile_write_releases_the_email() {
    let store = Arc::new(FlakyStore::new());
    let auth = provider(store.clone());

    store.fail_on(Op::Set, "users");
    let failed = auth.sign_up(profile()).await;
    assert!(matches!(failed, Err(AuthError::Store(_))));
    assert_eq!(store.len("accounts").await, 0);
    assert_eq!(store.len("users").await, 0);

    store.heal();
    let created = auth.sign_up(profile()).await.unwrap();
    let signed_in = auth.sign_in(credentials()).await.unwrap();
    assert_eq!(signed_in.user.uid, created.user.uid);
    assert_eq!(signed_in.user.display_name, "Ana");
}

#[tokio::test]
async fn failed_account_write_leaves_nothing_behind() {
    let store = Arc::new(FlakyStore::new());
    let auth = provider(store.clone());

    store.fail_on(Op::Modify, "accounts");
    assert!(matches!(
        auth.sign_up(profile()).await,
        Err(AuthError::Store(_))
    ));
    assert_eq!(store.len("users").await, 0);

    store.heal();
    assert!(matches!(
        auth.sign_in(credentials()).await,
        Err(AuthError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn verify_reports_store_outages_instead_of_signing_out() {
    let store = Arc::new(FlakyStore::new());
    let auth = provider(store.clone());
    let session = auth.sign_up(profile()).await.unwrap();

    store.fail_on(Op::Get, "users");
    assert!(matches!(
        auth.verify(&session.token).await,
        Err(AuthError::Store(_))
    ));

    store.heal();
    assert_eq!(auth.verify(&session.token).await.unwrap(), session.user);
}
