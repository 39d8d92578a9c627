//! Path composition for the remote tree. Paths are `/`-separated strings and
//! are never normalized beyond joining.

/// Joins `relative` under `base`. A rooted `relative` is returned unchanged.
pub fn resolve(base: &str, relative: &str) -> String {
    if relative.starts_with('/') {
        return relative.to_string();
    }
    if relative.is_empty() {
        return base.to_string();
    }
    if base.is_empty() {
        return relative.to_string();
    }

    let trimmed = base.trim_end_matches('/');
    if trimmed.is_empty() {
        format!("/{relative}")
    } else {
        format!("{trimmed}/{relative}")
    }
}

/// Last segment of `path`, ignoring a trailing separator. Empty for the root.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

pub fn parent(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => trimmed[..i].to_string(),
        None if path.starts_with('/') => "/".to_string(),
        None => String::new(),
    }
}

/// Replaces only the final segment of `path` with `name`. Ancestor segments
/// are left untouched even when they contain the old name.
pub fn replace_basename(path: &str, name: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(i) => format!("{}{}", &trimmed[..=i], name),
        None => name.to_string(),
    }
}
