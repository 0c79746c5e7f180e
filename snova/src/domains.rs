//! Site domain reconciliation
//!
//! A site's `domains` list mixes two representations: a bare domain name
//! (legacy) and a record carrying TLS material. Entries are identified by
//! domain name only, so `"a.com"` and `{"domain": "a.com"}` are the same
//! logical entry. All comparisons go through [`DomainEntry::canonical`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::store::{ConfigMap, ConfigStore, Scope};
use crate::errors::SnovaError;

/// Domain entry with TLS material.
///
/// The TLS fields distinguish an absent key (`None`) from an explicit
/// `null` (`Some(None)`), so a record written with nulls compares unequal
/// to the bare name and is rewritten unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub domain: String,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub ssl_certificate: Option<Option<String>>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub ssl_certificate_key: Option<Option<String>>,

    /// Fields snova does not interpret, kept so they survive a rewrite
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DomainRecord {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ssl_certificate: None,
            ssl_certificate_key: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn certificate(&self) -> Option<&str> {
        self.ssl_certificate.as_ref()?.as_deref()
    }

    pub fn certificate_key(&self) -> Option<&str> {
        self.ssl_certificate_key.as_ref()?.as_deref()
    }
}

// Only called when the key is present, so `null` becomes `Some(None)`.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// One element of a site's `domains` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DomainEntry {
    Bare(String),
    Record(DomainRecord),
}

impl DomainEntry {
    /// Build an entry, using the record form only when both TLS paths are given
    pub fn new(domain: &str, ssl_certificate: Option<&str>, ssl_certificate_key: Option<&str>) -> Self {
        match (ssl_certificate, ssl_certificate_key) {
            (Some(cert), Some(key)) if !cert.is_empty() && !key.is_empty() => {
                DomainEntry::Record(DomainRecord {
                    ssl_certificate: Some(Some(cert.to_string())),
                    ssl_certificate_key: Some(Some(key.to_string())),
                    ..DomainRecord::new(domain)
                })
            }
            _ => DomainEntry::Bare(domain.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DomainEntry::Bare(name) => name,
            DomainEntry::Record(record) => &record.domain,
        }
    }

    /// Canonical record form: bare names become `{domain: name}`
    pub fn canonical(&self) -> DomainRecord {
        match self {
            DomainEntry::Bare(name) => DomainRecord::new(name.clone()),
            DomainEntry::Record(record) => record.clone(),
        }
    }
}

/// Map of domain name to canonical record. A later duplicate wins.
pub fn normalize(entries: &[DomainEntry]) -> HashMap<String, DomainRecord> {
    entries
        .iter()
        .map(|entry| (entry.name().to_string(), entry.canonical()))
        .collect()
}

/// Outcome of [`sync`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSync {
    /// The proposed list differs semantically from the existing one
    pub changed: bool,
    /// The list the site should hold afterwards
    pub domains: Vec<DomainEntry>,
}

/// Compare an existing domain list against a proposed one.
///
/// Lists holding the same names with the same canonical records are equal
/// regardless of order or representation. When they differ the proposed
/// list replaces the existing one verbatim.
pub fn sync(existing: &[DomainEntry], proposed: &[DomainEntry]) -> DomainSync {
    let current = normalize(existing);
    let next = normalize(proposed);

    // Same key sets with every record equal is exactly map equality, which
    // checks both sides.
    let changed = current != next;

    DomainSync {
        changed,
        domains: if changed {
            proposed.to_vec()
        } else {
            existing.to_vec()
        },
    }
}

/// Outcome of [`add_domain`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddDomain {
    Added,
    /// An entry with the same name exists, in either representation
    AlreadyExists,
}

/// Append `entry` unless an entry with the same name is present
pub fn add_domain(domains: &mut Vec<DomainEntry>, entry: DomainEntry) -> AddDomain {
    if domains.iter().any(|d| d.name() == entry.name()) {
        return AddDomain::AlreadyExists;
    }
    domains.push(entry);
    AddDomain::Added
}

/// Remove the first entry named `domain`. Returns whether one was removed.
pub fn remove_domain(domains: &mut Vec<DomainEntry>, domain: &str) -> bool {
    match domains.iter().position(|d| d.name() == domain) {
        Some(index) => {
            domains.remove(index);
            true
        }
        None => false,
    }
}

/// Collapse entries sharing a name into one, keeping list order.
///
/// The first occurrence keeps its position; a record form found later
/// replaces a bare form since it carries more information.
pub fn coalesce(domains: &[DomainEntry]) -> Vec<DomainEntry> {
    let mut result: Vec<DomainEntry> = Vec::with_capacity(domains.len());
    let mut seen: HashMap<String, usize> = HashMap::new();

    for entry in domains {
        match seen.get(entry.name()) {
            Some(&index) => {
                if matches!(result[index], DomainEntry::Bare(_))
                    && matches!(entry, DomainEntry::Record(_))
                {
                    result[index] = entry.clone();
                }
            }
            None => {
                seen.insert(entry.name().to_string(), result.len());
                result.push(entry.clone());
            }
        }
    }

    result
}

// ================================ SITE LEVEL ==================================== //

/// Read the `domains` list of a site. Absent or null reads as empty.
pub async fn get_domains(store: &ConfigStore, site: &str) -> Result<Vec<DomainEntry>, SnovaError> {
    let config = store.get(&Scope::site(site)).await?;
    domains_from_config(&config, site)
}

pub(crate) fn domains_from_config(config: &ConfigMap, site: &str) -> Result<Vec<DomainEntry>, SnovaError> {
    match config.get("domains") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            SnovaError::ConfigError(format!("Invalid domains list for site {site}: {e}"))
        }),
    }
}

async fn put_domains(store: &ConfigStore, site: &str, domains: &[DomainEntry]) -> Result<(), SnovaError> {
    let mut partial = ConfigMap::new();
    partial.insert("domains".to_string(), serde_json::to_value(domains)?);
    store.update(&Scope::site(site), partial).await?;
    Ok(())
}

/// Replace a site's domains with `proposed` if they differ semantically.
///
/// Returns whether the site config was rewritten.
pub async fn sync_site_domains(
    store: &ConfigStore,
    site: &str,
    proposed: &[DomainEntry],
) -> Result<bool, SnovaError> {
    let existing = get_domains(store, site).await?;
    let outcome = sync(&existing, proposed);

    if outcome.changed {
        info!("Domains of {} changed, updating site config", site);
        put_domains(store, site, &outcome.domains).await?;
    } else {
        debug!("Domains of {} unchanged", site);
    }

    Ok(outcome.changed)
}

/// Add a domain to a site
pub async fn add_site_domain(
    store: &ConfigStore,
    site: &str,
    entry: DomainEntry,
) -> Result<AddDomain, SnovaError> {
    let mut domains = get_domains(store, site).await?;
    let name = entry.name().to_string();

    let outcome = add_domain(&mut domains, entry);
    match outcome {
        AddDomain::Added => put_domains(store, site, &domains).await?,
        AddDomain::AlreadyExists => warn!("Domain {} already exists on {}", name, site),
    }
    Ok(outcome)
}

/// Remove a domain from a site. Returns whether it was present.
pub async fn remove_site_domain(store: &ConfigStore, site: &str, domain: &str) -> Result<bool, SnovaError> {
    let mut domains = get_domains(store, site).await?;

    if remove_domain(&mut domains, domain) {
        put_domains(store, site, &domains).await?;
        Ok(true)
    } else {
        warn!("Domain {} not found on {}", domain, site);
        Ok(false)
    }
}
