//! End-to-end tests of the `strata` command line against temporary workspaces.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::path::Path;

use clap::Parser;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use strata::{Cli, CliError, run};
use strata_application::ResolutionError;
use strata_domain::auth::AuthConfig;
use strata_domain::collection::{CollectionSettings, FolderSettings};
use tempfile::tempdir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn strata(dir: &Path, args: &[&str]) -> Result<String, CliError> {
    let mut argv = vec!["strata", "--workspace", dir.to_str().expect("utf-8 temp path")];
    argv.extend_from_slice(args);
    let mut out = Vec::new();
    run(Cli::parse_from(argv), &mut out).await?;
    Ok(String::from_utf8(out).expect("utf-8 output"))
}

async fn ok(dir: &Path, args: &[&str]) -> String {
    strata(dir, args)
        .await
        .unwrap_or_else(|e| panic!("strata {args:?} failed: {e}"))
}

#[tokio::test]
async fn test_environment_overrides_globals() {
    let dir = tempdir().unwrap();
    let ws = dir.path();

    ok(ws, &["var", "set", "host", "api.example.com"]).await;
    ok(ws, &["env", "add", "Dev", "--default"]).await;
    ok(ws, &["env", "add", "Staging"]).await;
    ok(ws, &["-e", "Staging", "var", "set", "host", "staging.example.com"]).await;

    assert_eq!(ok(ws, &["resolve", "https://{{host}}/v1"]).await, "https://api.example.com/v1\n");
    assert_eq!(
        ok(ws, &["-e", "Staging", "resolve", "https://{{host}}/v1"]).await,
        "https://staging.example.com/v1\n"
    );
}

#[tokio::test]
async fn test_unknown_environment_is_reported() {
    let dir = tempdir().unwrap();
    let err = strata(dir.path(), &["-e", "Nope", "resolve", "x"]).await.unwrap_err();
    assert!(matches!(err, CliError::NotFound(_)));
}

#[tokio::test]
async fn test_unresolved_variables_are_left_in_place() {
    let dir = tempdir().unwrap();
    let ws = dir.path();
    ok(ws, &["var", "set", "a", "1"]).await;

    assert_eq!(ok(ws, &["resolve", "{{a}}-{{b}}"]).await, "1-{{b}}\n");
    assert_eq!(ok(ws, &["unresolved", "{{a}} {{b}} {{c}} {{b}}"]).await, "b\nc\n");

    let err = strata(ws, &["resolve", "--strict", "{{a}}-{{b}}"]).await.unwrap_err();
    match err {
        CliError::Resolution(ResolutionError::UnresolvedReference(names)) => {
            assert_eq!(names, vec!["b".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_template_functions() {
    let dir = tempdir().unwrap();
    let ws = dir.path();

    assert_eq!(
        ok(ws, &["resolve", "{{$hash.md5(x)}}"]).await,
        "9dd4e461268c8034f5c8564e155c67a6\n"
    );

    ok(ws, &["var", "set", "user", "alice"]).await;
    assert_eq!(ok(ws, &["resolve", "{{$base64.encode({{user}})}}"]).await, "YWxpY2U=\n");

    let listing = ok(ws, &["functions"]).await;
    assert!(listing.contains("hash.sha256"));
    assert!(listing.contains("random.int"));
}

#[tokio::test]
async fn test_disabled_variable_is_not_substituted() {
    let dir = tempdir().unwrap();
    let ws = dir.path();
    ok(ws, &["var", "set", "flag", "on"]).await;

    assert_eq!(ok(ws, &["var", "toggle", "flag"]).await, "flag disabled\n");
    assert_eq!(ok(ws, &["resolve", "{{flag}}"]).await, "{{flag}}\n");
}

#[tokio::test]
async fn test_secret_values_are_encrypted_at_rest() {
    let dir = tempdir().unwrap();
    let ws = dir.path();

    ok(ws, &["key", "init"]).await;
    ok(ws, &["var", "set", "token", "hunter2", "--secret"]).await;

    let stored = std::fs::read_to_string(ws.join("globals.json")).unwrap();
    assert!(!stored.contains("hunter2"));
    assert!(stored.contains("\"is_secret\": true"));

    assert_eq!(ok(ws, &["resolve", "Bearer {{token}}"]).await, "Bearer hunter2\n");

    let masked = ok(ws, &["vars"]).await;
    assert!(masked.contains("********"));
    assert!(!masked.contains("hunter2"));
    assert!(ok(ws, &["vars", "--reveal"]).await.contains("hunter2"));

    ok(ws, &["var", "secret", "token", "--off"]).await;
    let stored = std::fs::read_to_string(ws.join("globals.json")).unwrap();
    assert!(stored.contains("hunter2"));
}

#[tokio::test]
async fn test_secret_plaintext_never_reaches_environment_file() {
    let dir = tempdir().unwrap();
    let ws = dir.path();

    ok(ws, &["key", "init"]).await;
    ok(ws, &["env", "add", "Dev", "--default"]).await;
    ok(ws, &["-e", "Dev", "var", "set", "token", "plain-old"]).await;
    ok(ws, &["-e", "Dev", "var", "set", "token", "hunter2", "--secret"]).await;
    ok(ws, &["-e", "Dev", "var", "set", "api_key", "s3cr3t-key", "--secret"]).await;

    let env_file = std::fs::read_dir(ws.join("environments"))
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    let stored = std::fs::read_to_string(env_file).unwrap();
    assert!(!stored.contains("hunter2"));
    assert!(!stored.contains("plain-old"));
    assert!(!stored.contains("s3cr3t-key"));

    assert_eq!(
        ok(ws, &["-e", "Dev", "resolve", "{{token}}:{{api_key}}"]).await,
        "hunter2:s3cr3t-key\n"
    );
}

#[tokio::test]
async fn test_secret_without_key_writes_nothing() {
    let dir = tempdir().unwrap();
    let ws = dir.path();

    let err = strata(ws, &["var", "set", "token", "hunter2", "--secret"]).await.unwrap_err();
    assert!(matches!(err, CliError::Resolution(ResolutionError::VaultNotEnabled(_))));
    assert!(!ws.join("globals.json").exists());
}

#[tokio::test]
async fn test_key_init_refuses_to_overwrite() {
    let dir = tempdir().unwrap();
    let ws = dir.path();

    assert!(ok(ws, &["key", "status"]).await.contains("disabled"));
    ok(ws, &["key", "init"]).await;
    assert!(ok(ws, &["key", "status"]).await.contains("enabled"));

    let err = strata(ws, &["key", "init"]).await.unwrap_err();
    assert!(matches!(err, CliError::KeyExists(_)));
    ok(ws, &["key", "init", "--force"]).await;
}

#[tokio::test]
async fn test_provider_backed_variable_resolves_from_vault() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app"))
        .and(header("X-Vault-Token", "root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"data": {"password": "s3cret", "user": "svc"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let ws = dir.path();
    let provider_file = ws.join("vault.json");
    std::fs::write(
        &provider_file,
        json!({
            "id": "vault",
            "name": "Team Vault",
            "kind": {"type": "hashicorp_vault", "address": server.uri(), "token": "root"}
        })
        .to_string(),
    )
    .unwrap();

    ok(ws, &["provider", "add", provider_file.to_str().unwrap()]).await;
    assert!(ok(ws, &["provider", "list"]).await.contains("hashicorp_vault"));
    ok(ws, &["var", "link", "db_pass", "--provider", "vault", "--path", "app", "--field", "password"]).await;

    assert_eq!(ok(ws, &["resolve", "{{db_pass}}/{{db_pass}}"]).await, "s3cret/s3cret\n");
}

#[tokio::test]
async fn test_link_requires_known_provider() {
    let dir = tempdir().unwrap();
    let err = strata(dir.path(), &["var", "link", "x", "--provider", "nope", "--path", "p"])
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::NotFound(_)));
}

#[tokio::test]
async fn test_request_settings_inherit_and_interpolate() {
    let dir = tempdir().unwrap();
    let ws = dir.path();
    ok(ws, &["var", "set", "host", "api.example.com"]).await;
    ok(ws, &["var", "set", "token", "abc"]).await;

    let collection = CollectionSettings::new(
        FolderSettings::new("API")
            .with_id("root")
            .with_base_url("https://{{host}}")
            .with_header("X-Tenant", "{{tenant}}")
            .with_variable(strata_domain::environment::Variable::new("tenant", "acme")),
    )
    .with_folder(
        FolderSettings::new("Users")
            .with_id("users")
            .with_parent("root")
            .with_auth(AuthConfig::Bearer {
                token: "{{token}}".to_string(),
                prefix: "Bearer".to_string(),
            }),
    );
    let collection_file = ws.join("collection.json");
    std::fs::write(&collection_file, serde_json::to_string(&collection).unwrap()).unwrap();

    let output = ok(
        ws,
        &["request", "--collection", collection_file.to_str().unwrap(), "--folder", "users"],
    )
    .await;
    let resolved: Value = serde_json::from_str(&output).unwrap();

    assert_eq!(resolved["base_url"], "https://api.example.com");
    assert_eq!(resolved["auth"]["type"], "bearer");
    assert_eq!(resolved["auth"]["token"], "abc");
    assert_eq!(resolved["headers"][0]["value"], "acme");
}

#[tokio::test]
async fn test_environment_lifecycle() {
    let dir = tempdir().unwrap();
    let ws = dir.path();

    ok(ws, &["env", "add", "Dev"]).await;
    ok(ws, &["env", "add", "Prod"]).await;
    let listing = ok(ws, &["env", "list"]).await;
    assert!(listing.contains("Dev"));
    assert!(listing.contains("Prod"));

    ok(ws, &["env", "rm", "Dev"]).await;
    let listing = ok(ws, &["env", "list"]).await;
    assert!(!listing.contains("Dev"));
    assert_eq!(std::fs::read_dir(ws.join("environments")).unwrap().count(), 1);
}
