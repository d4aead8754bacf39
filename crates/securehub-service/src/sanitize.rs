/// Fallback when nothing usable survives sanitization.
const DEFAULT_FILE_NAME: &str = "file";

/// Reduce a client-supplied file name to a safe display name.
///
/// Only the last path component is kept, anything outside `[A-Za-z0-9._-]`
/// becomes `_`, and names longer than `max_len` are cut to exactly `max_len`
/// characters, keeping the extension where it fits.
pub fn sanitize_file_name(raw: &str, max_len: usize) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Dot-only names would become `.` or `..` path segments in the object key.
    let name = if cleaned.chars().all(|c| c == '.') {
        DEFAULT_FILE_NAME.to_string()
    } else {
        cleaned
    };

    // Every char is ASCII past this point, so byte and char lengths agree.
    if max_len == 0 || name.len() <= max_len {
        return name;
    }

    let cut = match name.rfind('.') {
        Some(dot) if dot > 0 && dot < name.len() - 1 && name.len() - dot < max_len => {
            let ext = &name[dot..];
            let stem_len = max_len - ext.len();
            format!("{}{}", &name[..stem_len], ext)
        }
        _ => name[..max_len].to_string(),
    };
    if cut.chars().all(|c| c == '.') {
        DEFAULT_FILE_NAME.to_string()
    } else {
        cut
    }
}

/// Parameters are dropped and the type lower-cased: `Text/Plain; charset=utf-8` -> `text/plain`.
pub fn normalize_content_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
