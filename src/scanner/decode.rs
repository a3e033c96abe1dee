use encoding_rs::GBK;

/// Turns marker file bytes into a code: UTF-8 first, GBK as the fallback.
///
/// Returns `None` when neither decoding succeeds or nothing but whitespace is
/// left after trimming.
pub fn decode_marker_content(bytes: &[u8]) -> Option<String> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => GBK
            .decode_without_bom_handling_and_without_replacement(bytes)?
            .into_owned(),
    };

    let code = text.trim_start_matches('\u{feff}').trim();
    (!code.is_empty()).then(|| code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_content_is_trimmed() {
        assert_eq!(
            decode_marker_content(b"  6901234567892\r\n").as_deref(),
            Some("6901234567892")
        );
        assert_eq!(
            decode_marker_content("\u{feff}商品A\n".as_bytes()).as_deref(),
            Some("商品A")
        );
    }

    #[test]
    fn falls_back_to_gbk() {
        let (bytes, _, had_errors) = GBK.encode("可乐");
        assert!(!had_errors);
        assert!(std::str::from_utf8(&bytes).is_err());

        assert_eq!(decode_marker_content(&bytes).as_deref(), Some("可乐"));
    }

    #[test]
    fn blank_or_undecodable_yields_nothing() {
        assert_eq!(decode_marker_content(b""), None);
        assert_eq!(decode_marker_content(b" \n\t "), None);
        assert_eq!(decode_marker_content(b"\xff\xff\xff"), None);
    }
}
