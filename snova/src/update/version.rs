//! Major version detection

use serde::Serialize;
use tracing::debug;

use crate::errors::SnovaError;
use crate::update::steps::BenchSteps;

/// Comparison of the primary app's installed and upstream major versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionUpgrade {
    pub is_major: bool,
    pub from: u64,
    pub to: u64,
}

impl VersionUpgrade {
    pub fn none(version: u64) -> Self {
        Self {
            is_major: false,
            from: version,
            to: version,
        }
    }

    /// Compare installed and upstream versions of `app`.
    ///
    /// Unknown or unparsable versions on either side count as no upgrade.
    pub async fn detect(steps: &dyn BenchSteps, app: &str) -> Result<Self, SnovaError> {
        let installed = steps.installed_version(app).await?;
        let upstream = steps.upstream_version(app).await?;
        debug!("{} installed {:?}, upstream {:?}", app, installed, upstream);

        let from = installed.as_deref().and_then(major_version);
        let to = upstream.as_deref().and_then(major_version);

        Ok(match (from, to) {
            (Some(from), Some(to)) => Self {
                is_major: to > from,
                from,
                to,
            },
            (Some(from), None) => Self::none(from),
            _ => Self::none(0),
        })
    }
}

/// Leading version component of a version string.
///
/// Accepts semver (`14.2.0`, `15.0.0-dev`) and the looser forms found on
/// development branches (`15.x.x-develop`, `14`).
pub fn major_version(version: &str) -> Option<u64> {
    let version = version.trim().trim_start_matches('v');
    if let Ok(parsed) = semver::Version::parse(version) {
        return Some(parsed.major);
    }

    let digits: String = version.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Extract `__version__` from a python module source
pub fn parse_module_version(source: &str) -> Option<String> {
    source.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("__version__")?;
        let value = rest.trim_start().strip_prefix('=')?.trim();
        let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let inner = &value[1..];
        inner.find(quote).map(|end| inner[..end].to_string())
    })
}
