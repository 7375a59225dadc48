//! Entity resolution for tracker text fields.
//!
//! Bugzilla-family trackers routinely double-escape markup inside XML text
//! nodes (`&amp;quot;`), and some emit HTML-only named entities such as
//! `&nbsp;` that an XML parser rejects. Text is therefore taken raw and
//! resolved here repeatedly until no entity reference remains; unknown
//! names become `?`.

const MAX_DECODE_PASSES: usize = 8;
const MAX_ENTITY_NAME_LEN: usize = 32;

pub fn decode_entities(raw: &str) -> String {
    let mut current = raw.to_string();
    for _ in 0..MAX_DECODE_PASSES {
        let (next, replaced) = decode_entities_once(&current);
        current = next;
        if !replaced {
            break;
        }
    }
    current
}

fn decode_entities_once(raw: &str) -> (String, bool) {
    let mut output = String::with_capacity(raw.len());
    let mut replaced = false;
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        output.push_str(&rest[..start]);
        let candidate = &rest[start + 1..];
        match entity_name(candidate) {
            Some(name) => {
                output.push_str(&resolve_entity(name));
                rest = &candidate[name.len() + 1..];
                replaced = true;
            }
            None => {
                output.push('&');
                rest = candidate;
            }
        }
    }
    output.push_str(rest);
    (output, replaced)
}

/// Returns the entity name when `candidate` (text after `&`) starts with
/// a `;`-terminated run of non-whitespace characters.
fn entity_name(candidate: &str) -> Option<&str> {
    let end = candidate.find(|ch: char| ch == ';' || ch == '&' || ch.is_whitespace())?;
    if end > MAX_ENTITY_NAME_LEN || !candidate[end..].starts_with(';') {
        return None;
    }
    Some(&candidate[..end])
}

fn resolve_entity(name: &str) -> String {
    if let Some(numeric) = name.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => numeric.parse::<u32>().ok(),
        };
        return code
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| "?".to_string());
    }
    if name.is_empty() {
        return "?".to_string();
    }
    let reference = format!("&{name};");
    let decoded = html_escape::decode_html_entities(&reference);
    if decoded == reference {
        "?".to_string()
    } else {
        decoded.into_owned()
    }
}
