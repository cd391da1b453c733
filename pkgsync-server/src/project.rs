//! Package file names to project names.

/// PEP 503 normalisation: lowercase, with every run of `-`, `_` and `.`
/// collapsed to a single `-`.
pub fn normalize_project(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for ch in name.chars() {
        if matches!(ch, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.extend(ch.to_lowercase());
            in_separator = false;
        }
    }
    out
}

/// Best guess of the normalised project a distribution file belongs to.
///
/// Wheels escape dashes in the project name, so the name ends at the first
/// `-`. Source distributions end the name right before the first `-<digit>`.
pub fn guess_project(file_name: &str) -> Option<String> {
    let raw = if file_name.ends_with(".whl") {
        file_name.split_once('-').map(|(name, _)| name)?
    } else {
        let bytes = file_name.as_bytes();
        let end = bytes
            .windows(2)
            .position(|w| w[0] == b'-' && w[1].is_ascii_digit())?;
        &file_name[..end]
    };
    if raw.is_empty() {
        return None;
    }
    Some(normalize_project(raw))
}
