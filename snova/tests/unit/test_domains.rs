//! Site domain reconciliation tests

mod support;

use serde_json::{json, Value};

use snova::config::store::Scope;
use snova::domains::{
    add_site_domain, get_domains, remove_site_domain, sync, sync_site_domains, AddDomain, DomainEntry,
};

use support::TempBench;

fn entries(value: Value) -> Vec<DomainEntry> {
    serde_json::from_value(value).unwrap()
}

async fn site_bytes(bench: &TempBench, site: &str) -> Vec<u8> {
    tokio::fs::read(bench.ctx.layout().site_config_file(site).path())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_dropping_record_fields_rewrites_site_config() {
    let bench = TempBench::new(json!({})).await;
    bench
        .add_site(
            "site1.local",
            json!({
                "db_name": "_abc",
                "domains": ["a.com", {"domain": "b.com", "ssl_certificate": "X", "ssl_certificate_key": "Y"}]
            }),
        )
        .await;

    let changed = sync_site_domains(bench.ctx.config(), "site1.local", &entries(json!(["a.com", "b.com"])))
        .await
        .unwrap();

    assert!(changed);
    let config = bench.ctx.config().get(&Scope::site("site1.local")).await.unwrap();
    assert_eq!(config["domains"], json!(["a.com", "b.com"]));
    assert_eq!(config["db_name"], json!("_abc"));
}

#[tokio::test]
async fn test_equivalent_proposal_does_not_write() {
    let bench = TempBench::new(json!({})).await;
    bench
        .add_site("site1.local", json!({"domains": ["a.com", {"domain": "b.com"}]}))
        .await;
    let before = site_bytes(&bench, "site1.local").await;

    let changed = sync_site_domains(
        bench.ctx.config(),
        "site1.local",
        &entries(json!([{"domain": "b.com"}, {"domain": "a.com"}])),
    )
    .await
    .unwrap();

    assert!(!changed);
    assert_eq!(site_bytes(&bench, "site1.local").await, before);
}

#[tokio::test]
async fn test_sync_on_site_without_domains() {
    let bench = TempBench::new(json!({})).await;
    bench.add_site("site1.local", json!({"domains": null})).await;

    assert!(!sync_site_domains(bench.ctx.config(), "site1.local", &[]).await.unwrap());
    assert!(
        sync_site_domains(bench.ctx.config(), "site1.local", &entries(json!(["a.com"])))
            .await
            .unwrap()
    );
    assert_eq!(
        get_domains(bench.ctx.config(), "site1.local").await.unwrap(),
        entries(json!(["a.com"]))
    );
}

#[test]
fn test_sync_is_symmetric() {
    // A field present only in the proposed list is a change, same as one
    // present only in the existing list.
    let bare = entries(json!(["a.com"]));
    let record = entries(json!([{"domain": "a.com", "ssl_certificate": "X", "ssl_certificate_key": "Y"}]));

    assert!(sync(&bare, &record).changed);
    assert!(sync(&record, &bare).changed);
}

#[test]
fn test_add_and_remove_persist() {
    tokio_test::block_on(async {
        let bench = TempBench::new(json!({})).await;
        bench.add_site("site1.local", json!({})).await;
        let store = bench.ctx.config();

        let added = add_site_domain(store, "site1.local", DomainEntry::new("a.com", Some("X"), Some("Y")))
            .await
            .unwrap();
        assert_eq!(added, AddDomain::Added);

        // Same name in the bare form is a duplicate
        let again = add_site_domain(store, "site1.local", DomainEntry::new("a.com", None, None))
            .await
            .unwrap();
        assert_eq!(again, AddDomain::AlreadyExists);

        add_site_domain(store, "site1.local", DomainEntry::new("b.com", None, None))
            .await
            .unwrap();
        assert_eq!(
            Value::Object(store.get(&Scope::site("site1.local")).await.unwrap()),
            json!({"domains": [
                {"domain": "a.com", "ssl_certificate": "X", "ssl_certificate_key": "Y"},
                "b.com"
            ]})
        );

        assert!(remove_site_domain(store, "site1.local", "a.com").await.unwrap());
        let before = site_bytes(&bench, "site1.local").await;
        assert!(!remove_site_domain(store, "site1.local", "a.com").await.unwrap());
        assert_eq!(site_bytes(&bench, "site1.local").await, before);

        assert_eq!(
            get_domains(store, "site1.local").await.unwrap(),
            entries(json!(["b.com"]))
        );
    });
}
