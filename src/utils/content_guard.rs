use serde_json::{json, Value};

/// Result of binary detection based on magic bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryDetection {
    /// Content is considered binary; a short format name is provided when known
    Binary { format: Option<&'static str> },
    /// Content is considered textual (safe to decode)
    Text,
}

/// Detects whether file content should be treated as binary using magic signatures in the head bytes.
///
/// head: First bytes of the file (recommended ~512 bytes)
pub fn detect_binary(head: &[u8]) -> BinaryDetection {
    let h = head;

    let starts_with = |pat: &[u8]| h.len() >= pat.len() && &h[..pat.len()] == pat;
    let contains_within = |pat: &[u8], limit: usize| {
        let lim = limit.min(h.len());
        lim >= pat.len() && h[..lim].windows(pat.len()).any(|w| w == pat)
    };

    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"%PDF-", "pdf"),
        (&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A], "png"),
        (&[0xFF, 0xD8, 0xFF], "jpeg"),
        (b"GIF8", "gif"),
        (&[0x50, 0x4B, 0x03, 0x04], "zip"),
        (&[0x1F, 0x8B], "gzip"),
        (b"Rar!", "rar"),
        (&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C], "7z"),
    ];

    for &(magic, format) in SIGNATURES {
        if starts_with(magic) {
            return BinaryDetection::Binary {
                format: Some(format),
            };
        }
    }

    // RIFF...WEBP
    if starts_with(b"RIFF") && h.len() >= 12 && &h[8..12] == b"WEBP" {
        return BinaryDetection::Binary {
            format: Some("webp"),
        };
    }

    // MP4: `ftyp` often appears within first ~64 bytes
    if contains_within(b"ftyp", 64) {
        return BinaryDetection::Binary {
            format: Some("mp4"),
        };
    }

    // UTF-16 text carries NULs too, but always starts with a BOM
    let has_utf16_bom = starts_with(&[0xFF, 0xFE]) || starts_with(&[0xFE, 0xFF]);
    if !has_utf16_bom && h.contains(&0) {
        return BinaryDetection::Binary { format: None };
    }

    BinaryDetection::Text
}

/// Cuts `s` after `max_chars` characters without breaking a UTF-8 sequence.
/// Returns the prefix and whether anything was cut off.
pub fn truncate_chars(s: &str, max_chars: usize) -> (&str, bool) {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => (&s[..end], true),
        None => (s, false),
    }
}

/// Builds a standardized error payload string for tool errors.
/// First line: short human-readable message.
/// Then a JSON object with fields: code, message, details.
pub fn build_error_payload(code: &str, message: &str, details: Value) -> String {
    let obj = json!({
        "code": code,
        "message": message,
        "details": details,
    });
    let mut out = String::new();
    out.push_str(message);
    out.push('\n');
    out.push_str(&obj.to_string());
    out
}
