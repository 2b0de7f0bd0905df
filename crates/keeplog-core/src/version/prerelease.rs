//! Prerelease identifier arithmetic.

use semver::Prerelease;

use super::{VersionError, VersionResult};

/// First prerelease of a new version: `<preid>.0`, or `0` without an id.
pub(super) fn start(preid: Option<&str>) -> VersionResult<Prerelease> {
    match non_empty(preid) {
        Some(id) => build(&format!("{id}.0"), id),
        None => build("0", ""),
    }
}

/// Next prerelease after `current`.
///
/// Switching to a different identifier restarts at `<preid>.0`. Otherwise
/// the right-most numeric identifier is incremented, or `.0` is appended
/// when there is none.
pub(super) fn advance(current: &Prerelease, preid: Option<&str>) -> VersionResult<Prerelease> {
    let mut parts: Vec<String> = current.as_str().split('.').map(str::to_owned).collect();

    if let Some(id) = non_empty(preid)
        && parts.first().map(String::as_str) != Some(id)
    {
        return build(&format!("{id}.0"), id);
    }

    let last_numeric = parts
        .iter()
        .enumerate()
        .rev()
        .find_map(|(i, part)| part.parse::<u64>().ok().map(|n| (i, n)));
    match last_numeric {
        Some((i, n)) => {
            let n = n
                .checked_add(1)
                .ok_or_else(|| VersionError::Overflow(current.to_string()))?;
            parts[i] = n.to_string();
        }
        None => parts.push("0".to_string()),
    }

    build(&parts.join("."), preid.unwrap_or_default())
}

fn non_empty(preid: Option<&str>) -> Option<&str> {
    preid.map(str::trim).filter(|id| !id.is_empty())
}

fn build(text: &str, identifier: &str) -> VersionResult<Prerelease> {
    Prerelease::new(text).map_err(|source| VersionError::InvalidPrerelease {
        identifier: identifier.to_string(),
        source,
    })
}
