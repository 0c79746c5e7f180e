//! Config store, setters, internal patches and environment tests

mod support;

use std::path::PathBuf;

use serde_json::{json, Value};

use snova::apps::validate_app_removal;
use snova::config::installation::{set_mariadb_host, set_redis_cache_host};
use snova::config::site::{set_nginx_port, set_url_root};
use snova::config::store::{config_map, Scope};
use snova::env::{flush_redis_cache, migrate_env, CacheFlush};
use snova::errors::SnovaError;
use snova::patches;

use support::{RecordingSteps, TempBench};

// ================================ STORE ==================================== //

#[tokio::test]
async fn test_put_then_get_round_trips() {
    let bench = TempBench::new(json!({})).await;
    let config = config_map(json!({
        "db_name": "_1bd3e0294da19198",
        "domains": ["a.com", {"domain": "b.com", "ssl_certificate": "X"}],
        "limits": {"space": 1.5, "emails": null},
        "developer_mode": 1
    }));

    let store = bench.ctx.config();
    store.put(&Scope::site("site1.local"), &config).await.unwrap();
    assert_eq!(store.get(&Scope::site("site1.local")).await.unwrap(), config);
}

#[tokio::test]
async fn test_missing_configs() {
    let bench = TempBench::new(json!({})).await;
    let store = bench.ctx.config();

    assert!(store.get(&Scope::site("nowhere.local")).await.unwrap().is_empty());

    tokio::fs::remove_file(bench.ctx.layout().common_site_config_file().path())
        .await
        .unwrap();
    assert!(matches!(
        store.get(&Scope::Installation).await,
        Err(SnovaError::ConfigError(_))
    ));
}

#[tokio::test]
async fn test_update_merges_top_level_only() {
    let bench = TempBench::new(json!({
        "db_host": "localhost",
        "limits": {"a": 1, "b": 2}
    }))
    .await;

    let merged = bench
        .ctx
        .config()
        .update(&Scope::Installation, config_map(json!({"limits": {"a": 3}, "maintenance_mode": 1})))
        .await
        .unwrap();

    let expected = json!({
        "db_host": "localhost",
        "limits": {"a": 3},
        "maintenance_mode": 1
    });
    assert_eq!(Value::Object(merged), expected);
    assert_eq!(bench.installation_config().await, expected);
}

#[tokio::test]
async fn test_writes_are_deterministic() {
    let bench = TempBench::new(json!({"zeta": 1, "alpha": {"b": true, "a": [1, 2]}})).await;
    let first = bench.installation_bytes().await;
    assert_eq!(
        String::from_utf8(first.clone()).unwrap(),
        "{\n \"alpha\": {\n  \"a\": [\n   1,\n   2\n  ],\n  \"b\": true\n },\n \"zeta\": 1\n}\n"
    );

    // Re-writing unchanged data yields the same bytes
    let store = bench.ctx.config();
    let config = store.get(&Scope::Installation).await.unwrap();
    store.put(&Scope::Installation, &config).await.unwrap();
    assert_eq!(bench.installation_bytes().await, first);

    store.update(&Scope::Installation, config_map(json!({}))).await.unwrap();
    assert_eq!(bench.installation_bytes().await, first);
}

#[tokio::test]
async fn test_non_object_config_is_rejected() {
    let bench = TempBench::new(json!({})).await;
    bench
        .ctx
        .layout()
        .site_config_file("site1.local")
        .write_string("[1, 2]")
        .await
        .unwrap();

    assert!(matches!(
        bench.ctx.config().get(&Scope::site("site1.local")).await,
        Err(SnovaError::ConfigError(_))
    ));
}

#[tokio::test]
async fn test_settings_accept_boolean_flags() {
    let bench = TempBench::new(json!({
        "maintenance_mode": true,
        "pause_scheduler": 0,
        "shallow_clone": true,
        "custom_key": "kept"
    }))
    .await;

    let settings = bench.ctx.config().settings().await.unwrap();
    assert_eq!(settings.maintenance_mode, 1);
    assert!(settings.in_maintenance());
    assert_eq!(settings.pause_scheduler, 0);
    assert!(settings.shallow_clone);
    assert!(!settings.release_snova);
}

// ================================ SETTERS ==================================== //

#[tokio::test]
async fn test_host_setters_create_installation_config() {
    let bench = TempBench::new(json!({})).await;
    tokio::fs::remove_file(bench.ctx.layout().common_site_config_file().path())
        .await
        .unwrap();

    let store = bench.ctx.config();
    set_mariadb_host(store, "db.internal").await.unwrap();
    set_redis_cache_host(store, "localhost:13000").await.unwrap();

    assert_eq!(
        bench.installation_config().await,
        json!({"db_host": "db.internal", "redis_cache": "redis://localhost:13000"})
    );
}

#[tokio::test]
async fn test_nginx_setter_requires_existing_site() {
    let bench = TempBench::new(json!({})).await;
    let steps = RecordingSteps {
        sites: vec!["site1.local".into()],
        ..Default::default()
    };

    let result = set_nginx_port(&bench.ctx, &steps, "ghost.local", 8080, true).await;
    assert!(matches!(result, Err(SnovaError::NoSuchSite(site)) if site == "ghost.local"));
    assert!(!bench.ctx.layout().site_config_file("ghost.local").exists().await);
    assert!(steps.calls().is_empty());

    set_nginx_port(&bench.ctx, &steps, "site1.local", 8080, true)
        .await
        .unwrap();
    let config = bench.ctx.config().get(&Scope::site("site1.local")).await.unwrap();
    assert_eq!(config["nginx_port"], json!(8080));
    assert_eq!(steps.calls(), vec!["regenerate_reverse_proxy_config"]);
}

#[tokio::test]
async fn test_set_url_root() {
    let bench = TempBench::new(json!({})).await;
    bench.add_site("site1.local", json!({"db_name": "x"})).await;

    set_url_root(bench.ctx.config(), "site1.local", "https://erp.example.com")
        .await
        .unwrap();

    let config = bench.ctx.config().get(&Scope::site("site1.local")).await.unwrap();
    assert_eq!(Value::Object(config), json!({"db_name": "x", "host_name": "https://erp.example.com"}));
}

// ================================ PATCHES ==================================== //

#[tokio::test]
async fn test_internal_patch_coalesces_duplicate_domains_once() {
    let bench = TempBench::new(json!({})).await;
    bench
        .add_site(
            "site1.local",
            json!({"domains": ["a.com", {"domain": "a.com", "ssl_certificate": "X", "ssl_certificate_key": "Y"}, "b.com"]}),
        )
        .await;
    bench.add_site("site2.local", json!({"domains": ["c.com"]})).await;
    let untouched = tokio::fs::read(bench.ctx.layout().site_config_file("site2.local").path())
        .await
        .unwrap();

    let applied = patches::run_pending(&bench.ctx).await.unwrap();
    assert_eq!(applied, vec!["coalesce_site_domains"]);

    let config = bench.ctx.config().get(&Scope::site("site1.local")).await.unwrap();
    assert_eq!(
        config["domains"],
        json!([{"domain": "a.com", "ssl_certificate": "X", "ssl_certificate_key": "Y"}, "b.com"])
    );
    assert_eq!(
        tokio::fs::read(bench.ctx.layout().site_config_file("site2.local").path())
            .await
            .unwrap(),
        untouched
    );

    assert!(patches::run_pending(&bench.ctx).await.unwrap().is_empty());
}

// ================================ APPS ==================================== //

#[tokio::test]
async fn test_app_removal_blocked_by_installed_site() {
    let bench = TempBench::new(json!({})).await;
    bench.runner.on(
        "list-apps --format json",
        0,
        r#"{"site1.local": ["sparrow"], "site2.local": ["sparrow", "shopper"]}"#,
    );

    match validate_app_removal(&bench.ctx, "shopper").await {
        Err(SnovaError::ValidationError(message)) => {
            assert_eq!(message, "Cannot remove, app is installed on site: site2.local")
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
    validate_app_removal(&bench.ctx, "payments").await.unwrap();
}

#[tokio::test]
async fn test_app_removal_falls_back_to_per_site_listing() {
    let bench = TempBench::new(json!({})).await;
    bench.add_site("site1.local", json!({})).await;
    bench
        .runner
        .on("list-apps --format json", 2, "")
        .on("--site site1.local list-apps", 0, "sparrow\nshopper_extras\n");

    validate_app_removal(&bench.ctx, "shopper").await.unwrap();
    assert!(matches!(
        validate_app_removal(&bench.ctx, "shopper_extras").await,
        Err(SnovaError::ValidationError(_))
    ));
}

// ================================ ENV ==================================== //

#[tokio::test]
async fn test_cache_flush_outcomes() {
    let bench = TempBench::new(json!({})).await;
    assert_eq!(flush_redis_cache(&bench.ctx).await.unwrap(), CacheFlush::NotConfigured);

    let bench = TempBench::new(json!({"redis_cache": "redis://localhost:13000"})).await;
    assert_eq!(flush_redis_cache(&bench.ctx).await.unwrap(), CacheFlush::RedisCliMissing);

    bench
        .ctx
        .set_executable("redis-cli", Some(PathBuf::from("/usr/bin/redis-cli")));
    assert_eq!(
        flush_redis_cache(&bench.ctx).await.unwrap(),
        CacheFlush::Flushed { port: 13000 }
    );
    assert_eq!(
        bench.runner.calls(),
        vec![
            "/usr/bin/redis-cli -p 13000 FLUSHALL",
            "/usr/bin/redis-cli -p 13000 FLUSHDB"
        ]
    );
}

#[tokio::test]
async fn test_migrate_env_refuses_python_inside_env() {
    let bench = TempBench::new(json!({})).await;
    let python = bench.ctx.layout().env_dir().path().join("bin").join("python3");

    let result = migrate_env(&bench.ctx, &python.to_string_lossy(), false).await;

    assert!(matches!(result, Err(SnovaError::ValidationError(_))));
    assert!(bench.runner.calls().is_empty());
}

#[tokio::test]
async fn test_migrate_env_installs_primary_app_first() {
    let bench = TempBench::new(json!({})).await;
    bench
        .ctx
        .layout()
        .apps_txt_file()
        .write_string("shopper\nsparrow\n")
        .await
        .unwrap();
    bench.ctx.layout().env_dir().create().await.unwrap();

    migrate_env(&bench.ctx, "/opt/python3.11/bin/python3", true)
        .await
        .unwrap();

    let calls = bench.runner.calls();
    assert!(calls[0].starts_with("/opt/python3.11/bin/python3 -m venv "));
    assert!(calls[1].ends_with("apps/sparrow"));
    assert!(calls[2].ends_with("apps/shopper"));
    assert!(!bench.ctx.layout().env_dir().exists().await);
    assert_eq!(
        bench
            .ctx
            .layout()
            .archived_envs_dir()
            .list_dirs()
            .await
            .unwrap()
            .len(),
        1
    );
}
