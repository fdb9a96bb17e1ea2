use crate::domain::model::{Group, Project};
use crate::utils::error::{InventoryError, Result};

/// The part of `value` after a leading `host` segment (an optional
/// `scheme://` is skipped first). `None` when `value` does not start with the
/// host or the host is only a prefix of a longer name.
fn strip_host<'a>(value: &'a str, host: &str) -> Option<&'a str> {
    if host.is_empty() {
        return None;
    }
    let without_scheme = value
        .split_once("://")
        .map_or(value, |(_, rest)| rest);
    let rest = without_scheme.strip_prefix(host)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// Distinct top-level namespaces of `groups`, in first-seen order.
pub fn top_level_groups(groups: &[Group], host: &str) -> Vec<String> {
    let mut top_level: Vec<String> = Vec::new();

    for group in groups {
        // full_path is normally host-relative already
        let path = strip_host(&group.full_path, host).unwrap_or(&group.full_path);
        let Some(first) = path
            .split('/')
            .find(|segment| !segment.is_empty())
        else {
            continue;
        };

        if !top_level.iter().any(|seen| seen == first) {
            top_level.push(first.to_string());
        }
    }

    top_level
}

/// Namespace directly under the host in the project's `web_url`.
pub fn parent_group(project: &Project, host: &str) -> Result<String> {
    let url = &project.web_url;
    let Some(path) = strip_host(url, host) else {
        return Err(InventoryError::MalformedUrl {
            url: url.clone(),
            reason: format!("does not start with host '{}'", host),
        });
    };

    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    match segments.as_slice() {
        [group, _project, ..] => Ok((*group).to_string()),
        _ => Err(InventoryError::MalformedUrl {
            url: url.clone(),
            reason: "expected at least a group and a project segment after the host".to_string(),
        }),
    }
}
