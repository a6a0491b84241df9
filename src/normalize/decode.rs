//! Lossless-where-possible decoders for URL and HTML encoded payloads
//!
//! Neither decoder fails: malformed escapes are kept literally.

use encoding_rs::WINDOWS_1252;
use html_escape::NAMED_ENTITIES;

/// Entities that also decode without a trailing `;`
const LEGACY_ENTITIES: &[&str] = &[
    "AElig", "AMP", "Aacute", "Acirc", "Agrave", "Aring", "Atilde", "Auml", "COPY", "Ccedil",
    "ETH", "Eacute", "Ecirc", "Egrave", "Euml", "GT", "Iacute", "Icirc", "Igrave", "Iuml", "LT",
    "Ntilde", "Oacute", "Ocirc", "Ograve", "Oslash", "Otilde", "Ouml", "QUOT", "REG", "THORN",
    "Uacute", "Ucirc", "Ugrave", "Uuml", "Yacute", "aacute", "acirc", "acute", "aelig",
    "agrave", "amp", "aring", "atilde", "auml", "brvbar", "ccedil", "cedil", "cent", "copy",
    "curren", "deg", "divide", "eacute", "ecirc", "egrave", "eth", "euml", "frac12", "frac14",
    "frac34", "gt", "iacute", "icirc", "iexcl", "igrave", "iquest", "iuml", "laquo", "lt",
    "macr", "micro", "middot", "nbsp", "not", "ntilde", "oacute", "ocirc", "ograve", "ordf",
    "ordm", "oslash", "otilde", "ouml", "para", "plusmn", "pound", "quot", "raquo", "reg",
    "sect", "shy", "sup1", "sup2", "sup3", "szlig", "thorn", "times", "uacute", "ucirc",
    "ugrave", "uml", "uuml", "yacute", "yen", "yuml",
];

/// Longest entity body considered before giving up on a `&`
const MAX_ENTITY_LEN: usize = 32;

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Form-style URL decoding: `+` becomes a space and `%XX` escapes are
/// decoded as UTF-8, with invalid sequences replaced by U+FFFD.
pub fn percent_decode_plus(input: &str) -> String {
    if !input.contains('%') && !input.contains('+') {
        return input.to_string();
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn windows_1252_char(byte: u8) -> char {
    let bytes = [byte];
    let (decoded, _) = WINDOWS_1252.decode_without_bom_handling(&bytes);
    decoded.chars().next().unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Character for a numeric reference, following the HTML5 replacement
/// rules. Returns `None` for code points that are dropped entirely.
fn numeric_reference(code: u32) -> Option<char> {
    match code {
        0 | 0xD800..=0xDFFF | 0x11_0000..=u32::MAX => Some(char::REPLACEMENT_CHARACTER),
        // C1 controls are read as Windows-1252 bytes
        0x80..=0x9F => Some(windows_1252_char(code as u8)),
        0x01..=0x08 | 0x0B | 0x0E..=0x1F | 0x7F | 0xFDD0..=0xFDEF => None,
        c if (c & 0xFFFE) == 0xFFFE => None,
        c => char::from_u32(c),
    }
}

fn named_entity(name: &str) -> Option<&'static str> {
    NAMED_ENTITIES
        .binary_search_by(|(known, _)| known.cmp(&name.as_bytes()))
        .ok()
        .map(|idx| NAMED_ENTITIES[idx].1)
}

fn is_entity_char(c: char) -> bool {
    !matches!(c, '\t' | '\n' | '\x0C' | ' ' | '<' | '&' | '#' | ';')
}

/// Decode one reference starting right after a `&`, appending the result
/// to `out`.
///
/// Returns the number of bytes consumed after the ampersand, or `None`
/// when no reference starts here.
fn decode_reference(rest: &str, out: &mut String) -> Option<usize> {
    if let Some(numeric) = rest.strip_prefix('#') {
        let (prefix, radix) = if numeric.starts_with(['x', 'X']) { (1, 16) } else { (0, 10) };
        let digits_len = numeric[prefix..]
            .bytes()
            .take_while(|b| if radix == 16 { b.is_ascii_hexdigit() } else { b.is_ascii_digit() })
            .count();
        if digits_len == 0 {
            return None;
        }
        let body_len = prefix + digits_len;
        // only overflow can fail here, and overflow is out of range anyway
        let code = u32::from_str_radix(&numeric[prefix..body_len], radix).unwrap_or(u32::MAX);
        out.extend(numeric_reference(code));
        let terminated = numeric[body_len..].starts_with(';');
        return Some(1 + body_len + usize::from(terminated));
    }

    let name_len: usize = rest
        .chars()
        .take_while(|c| is_entity_char(*c))
        .take(MAX_ENTITY_LEN)
        .map(char::len_utf8)
        .sum();
    if name_len == 0 {
        return None;
    }
    let name = &rest[..name_len];

    if rest[name_len..].starts_with(';') {
        if let Some(value) = named_entity(name) {
            out.push_str(value);
            return Some(name_len + 1);
        }
    }

    // Longest legacy entity prefix; whatever follows it stays literal
    let (consumed, value) = (2..=name_len)
        .rev()
        .filter(|len| name.is_char_boundary(*len))
        .map(|len| &name[..len])
        .filter(|prefix| LEGACY_ENTITIES.contains(prefix))
        .find_map(|prefix| named_entity(prefix).map(|value| (prefix.len(), value)))?;
    out.push_str(value);
    Some(consumed)
}

/// Decode HTML character references the way an HTML5 parser does in text:
/// the full named entity table, legacy names without `;`, and numeric
/// references with the standard replacements. Unknown entities stay as
/// written.
pub fn html_unescape(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match decode_reference(after, &mut out) {
            Some(consumed) => rest = &after[consumed..],
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
