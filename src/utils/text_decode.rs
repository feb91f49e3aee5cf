use anyhow::Result;

/// Decode bytes into a UTF-8 String using a BOM when present, otherwise a chardetng guess.
/// Returns error if decoding performed replacements (considered data corruption for our purposes).
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String> {
    // 1) BOM sniff first (covers UTF-8/UTF-16 BOM)
    if let Some((enc, offset)) = encoding_rs::Encoding::for_bom(bytes) {
        let (cow, _used, had_errors) = enc.decode(&bytes[offset..]);
        if had_errors {
            anyhow::bail!("decoding with BOM-declared charset '{}' produced errors", enc.name());
        }
        return Ok(cow.into_owned());
    }

    // 2) Valid UTF-8 needs no guessing
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }

    // 3) chardetng guess for legacy encodings
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    let (cow, _used, had_errors) = enc.decode(bytes);
    if had_errors {
        anyhow::bail!(
            "decoding with detected charset '{}' produced errors",
            enc.name()
        );
    }
    Ok(cow.into_owned())
}
