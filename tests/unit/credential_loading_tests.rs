//! Unit tests for cloud API key loading.
//!
//! Covers:
//! - env-var fallback when the keychain has no entry
//! - an empty env var counts as absent
//! - no key at all is not an error
//!
//! These tests mutate process-global env vars and run serially.

use acp_adapter::config::{GlobalConfig, CLOUD_API_KEY_ENV};

#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn env_var_supplies_api_key() {
    let mut config = GlobalConfig::default();

    // The keychain service is absent in test environments.
    unsafe {
        std::env::set_var(CLOUD_API_KEY_ENV, "key-from-env");
    }

    config
        .load_credentials()
        .await
        .expect("load_credentials should succeed with env var");
    assert_eq!(config.cloud.api_key.as_deref(), Some("key-from-env"));

    unsafe {
        std::env::remove_var(CLOUD_API_KEY_ENV);
    }
}

#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn empty_env_var_is_ignored() {
    let mut config = GlobalConfig::default();

    unsafe {
        std::env::set_var(CLOUD_API_KEY_ENV, "");
    }

    config.load_credentials().await.expect("load succeeds");
    assert!(config.cloud.api_key.is_none());

    unsafe {
        std::env::remove_var(CLOUD_API_KEY_ENV);
    }
}

#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn missing_key_is_not_an_error() {
    let mut config = GlobalConfig::default();

    unsafe {
        std::env::remove_var(CLOUD_API_KEY_ENV);
    }

    config
        .load_credentials()
        .await
        .expect("missing key is reported through auth, not config");
    assert!(config.cloud.api_key.is_none());
}
