//! String algebra over paths and URLs.
//!
//! Nothing here fetches or validates reachability. References come in three
//! shapes: fully-qualified (`https://host/path`), origin-relative
//! (`/path`) and bare relative tokens (`bar`).

use std::sync::LazyLock;

use regex::Regex;

static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").unwrap());

/// True if `reference` carries a scheme (`https://...`).
pub fn is_absolute(reference: &str) -> bool {
    SCHEME_RE.is_match(reference)
}

/// Split a fully-qualified URL into `(origin, path)`.
///
/// The path keeps its leading `/` and drops any query or fragment. A bare
/// origin yields an empty path. Returns `None` for non-absolute input.
pub fn split_url(url: &str) -> Option<(&str, &str)> {
    let scheme_end = SCHEME_RE.find(url)?.end();
    let rest = &url[scheme_end..];
    let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let origin = &url[..scheme_end + host_end];
    let after_host = &rest[host_end..];
    let path_end = after_host.find(['?', '#']).unwrap_or(after_host.len());
    Some((origin, &after_host[..path_end]))
}

/// Path component of a reference. Absolute URLs lose their origin (`/` when
/// nothing follows it); other references only lose query and fragment.
pub fn path_of(reference: &str) -> String {
    match split_url(reference) {
        Some((_, "")) => "/".to_string(),
        Some((_, path)) => path.to_string(),
        None => {
            let end = reference.find(['?', '#']).unwrap_or(reference.len());
            reference[..end].to_string()
        }
    }
}

/// Final non-empty path segment of a reference (`/blocks/hero/` → `hero`).
pub fn last_segment(reference: &str) -> String {
    path_of(reference)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Join `path` onto `base` with exactly one `/` between them.
///
/// An empty base returns `path` unchanged, so relative tokens stay relative.
pub fn join_path(base: &str, path: &str) -> String {
    if base.is_empty() {
        return path.to_string();
    }
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Resolve a block override entry to the directory its assets load from.
///
/// - same-origin absolute URL → its path
/// - cross-origin bare origin → `<origin>/blocks/<block_name>`
/// - cross-origin URL with a path → origin + path
/// - relative token → the token itself
///
/// `code_base_path` is inserted between origin and path. Returns `None` when
/// the entry is empty.
pub fn resolve_override(
    reference: &str,
    page_origin: &str,
    code_base_path: &str,
    block_name: &str,
) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    let (origin, path) = match split_url(reference) {
        Some((origin, path)) => {
            let origin = if origin.eq_ignore_ascii_case(page_origin.trim_end_matches('/')) {
                ""
            } else {
                origin
            };
            let path = path.trim_end_matches('/');
            let path = if path.is_empty() {
                format!("/blocks/{block_name}")
            } else {
                path.to_string()
            };
            (origin, path)
        }
        None => {
            let path = path_of(reference);
            let trimmed = path.trim_end_matches('/');
            if trimmed.is_empty() {
                return None;
            }
            ("", trimmed.to_string())
        }
    };

    Some(format!("{origin}{}", join_path(code_base_path, &path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://main--site--org.hlx.page";

    #[test]
    fn split_url_separates_origin_and_path() {
        assert_eq!(
            split_url("https://bar.hlx.live/blocks/foo?x=1#top"),
            Some(("https://bar.hlx.live", "/blocks/foo"))
        );
        assert_eq!(
            split_url("https://bar.hlx.live"),
            Some(("https://bar.hlx.live", ""))
        );
        assert_eq!(split_url("/blocks/foo"), None);
        assert_eq!(split_url("bar"), None);
    }

    #[test]
    fn path_of_strips_origin_and_query() {
        assert_eq!(path_of("https://a.com/x/y?q=1"), "/x/y");
        assert_eq!(path_of("https://a.com"), "/");
        assert_eq!(path_of("/x/y#frag"), "/x/y");
        assert_eq!(path_of("token"), "token");
    }

    #[test]
    fn last_segment_ignores_trailing_slash() {
        assert_eq!(last_segment("/blocks/hero/"), "hero");
        assert_eq!(last_segment("https://a.com/blocks/cards"), "cards");
        assert_eq!(last_segment("hero"), "hero");
    }

    #[test]
    fn join_path_normalizes_slashes() {
        assert_eq!(join_path("", "bar"), "bar");
        assert_eq!(join_path("/code", "bar"), "/code/bar");
        assert_eq!(join_path("/code/", "/bar"), "/code/bar");
        assert_eq!(join_path("/code", ""), "/code");
    }

    #[test]
    fn same_origin_override_keeps_path_only() {
        let reference = format!("{ORIGIN}/experiments/foo/blocks/bar");
        assert_eq!(
            resolve_override(&reference, ORIGIN, "", "foo").as_deref(),
            Some("/experiments/foo/blocks/bar")
        );
    }

    #[test]
    fn bare_cross_origin_override_targets_default_block_dir() {
        assert_eq!(
            resolve_override("https://bar.hlx.live", ORIGIN, "", "foo").as_deref(),
            Some("https://bar.hlx.live/blocks/foo")
        );
        assert_eq!(
            resolve_override("https://bar.hlx.live/", ORIGIN, "", "foo").as_deref(),
            Some("https://bar.hlx.live/blocks/foo")
        );
    }

    #[test]
    fn cross_origin_override_with_path_is_kept() {
        assert_eq!(
            resolve_override("https://bar.hlx.live/custom/foo/", ORIGIN, "", "foo").as_deref(),
            Some("https://bar.hlx.live/custom/foo")
        );
    }

    #[test]
    fn relative_override_honors_code_base_path() {
        assert_eq!(
            resolve_override("bar", ORIGIN, "", "foo").as_deref(),
            Some("bar")
        );
        assert_eq!(
            resolve_override("bar", ORIGIN, "/code", "foo").as_deref(),
            Some("/code/bar")
        );
    }

    #[test]
    fn empty_override_resolves_to_nothing() {
        assert_eq!(resolve_override("  ", ORIGIN, "", "foo"), None);
        assert_eq!(resolve_override("/", ORIGIN, "", "foo"), None);
    }
}
