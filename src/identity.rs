//! ARM resource id parsing.
//!
//! An ARM id is a slash-separated hierarchy of alternating keys and values:
//!
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{ns}/{type}/{name}[/{childType}/{childName}...]`
//!
//! Keys are matched case-insensitively; extracted values keep their original
//! casing. All functions here are pure and recompute from the id string on
//! demand.

use crate::error::{Error, Result};

const SUBSCRIPTIONS: &str = "subscriptions";
const RESOURCE_GROUPS: &str = "resourceGroups";
const PROVIDERS: &str = "providers";

fn parts(id: &str) -> impl Iterator<Item = &str> {
    id.split('/').filter(|p| !p.is_empty())
}

fn malformed(id: &str, reason: &'static str) -> Error {
    Error::MalformedIdentifier {
        id: id.to_string(),
        reason,
    }
}

/// Extract the value following a named container key, e.g.
/// `segment(id, "resourceGroups")`. The key match is case-insensitive;
/// the returned value is case-preserved.
pub fn segment<'a>(id: &'a str, key: &str) -> Result<&'a str> {
    let mut iter = parts(id);
    while let Some(part) = iter.next() {
        if part.eq_ignore_ascii_case(key) {
            return iter.next().ok_or_else(|| malformed(id, "segment key has no value"));
        }
    }
    Err(malformed(id, "segment key not present"))
}

/// The resource group an id belongs to.
pub fn resource_group(id: &str) -> Result<&str> {
    segment(id, RESOURCE_GROUPS)
}

/// The subscription an id belongs to.
pub fn subscription(id: &str) -> Result<&str> {
    segment(id, SUBSCRIPTIONS)
}

/// The provider namespace, e.g. `Microsoft.Compute`.
pub fn namespace(id: &str) -> Result<&str> {
    segment(id, PROVIDERS)
}

/// Segments after the provider namespace: `[type, name, type, name, ...]`.
fn provider_tail<'a>(id: &'a str) -> Result<Vec<&'a str>> {
    let mut iter = parts(id);
    while let Some(part) = iter.next() {
        if part.eq_ignore_ascii_case(PROVIDERS) {
            iter.next()
                .ok_or_else(|| malformed(id, "segment key has no value"))?;
            let tail: Vec<&str> = iter.collect();
            if tail.len() < 2 {
                return Err(malformed(id, "no resource type under provider namespace"));
            }
            return Ok(tail);
        }
    }
    Err(malformed(id, "segment key not present"))
}

/// The type path under the provider namespace, with instance names removed:
/// `servers/databases` for a database id.
pub fn resource_type(id: &str) -> Result<String> {
    let tail = provider_tail(id)?;
    Ok(tail.iter().step_by(2).copied().collect::<Vec<_>>().join("/"))
}

/// Qualified ARM type, e.g. `Microsoft.Sql/servers/databases`. Used to
/// resolve a per-type API version for an arbitrary id.
pub fn arm_type(id: &str) -> Result<String> {
    Ok(format!("{}/{}", namespace(id)?, resource_type(id)?))
}

/// The trailing instance name.
pub fn resource_name(id: &str) -> Result<&str> {
    parts(id).last().ok_or_else(|| malformed(id, "empty id"))
}

/// The id of the enclosing parent resource, for ids nested more than one
/// level under a provider namespace. `/...providers/Microsoft.Sql/servers/s1/databases/d1`
/// yields `/...providers/Microsoft.Sql/servers/s1`.
pub fn parent_id(id: &str) -> Result<String> {
    let tail = provider_tail(id)?;
    if tail.len() < 4 {
        return Err(malformed(id, "id has no parent resource"));
    }
    let collected: Vec<&str> = parts(id).collect();
    Ok(format!("/{}", collected[..collected.len() - 2].join("/")))
}
