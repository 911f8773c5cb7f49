//! Name normalization for manifest headers and attribute rows.

/// Lowercase `name`, collapse every run of non-alphanumerics into a single
/// `-`, and strip leading/trailing dashes.
///
/// `"Challenger 1"` → `"challenger-1"`, `" Control "` → `"control"`.
pub fn to_class_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Class name with `-x` folded into `X` for alphabetic `x`.
///
/// `"Percentage Split"` → `"percentageSplit"`; digits keep their dash, so
/// `"challenger-1"` is unchanged.
pub fn to_camel_case(name: &str) -> String {
    let class = to_class_name(name);
    let mut out = String::with_capacity(class.len());
    let mut chars = class.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '-' {
            if let Some(next) = chars.peek().copied() {
                if next.is_alphabetic() {
                    chars.next();
                    out.extend(next.to_uppercase());
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}
