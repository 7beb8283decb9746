use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};
use tracing::debug;

use crate::errors::{ImportExportError, ImportExportResult};

/// Turn an uploaded spreadsheet export into text.
///
/// A byte order mark decides the encoding when present. Otherwise the encoding
/// is guessed from the content. Bytes that are malformed under the chosen
/// encoding, and NUL bytes outside UTF-16, reject the whole upload.
pub fn decode_upload(bytes: &[u8]) -> ImportExportResult<String> {
    if bytes.is_empty() {
        return Err(ImportExportError::MissingData(
            "uploaded file is empty".to_string(),
        ));
    }

    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
        None => (guess_encoding(bytes), bytes),
    };
    debug!("Decoding upload as {}", encoding.name());

    let is_utf16 = encoding == UTF_16LE || encoding == UTF_16BE;
    if !is_utf16 && body.contains(&0) {
        return Err(ImportExportError::EncodingError(format!(
            "file contains NUL bytes and is not valid {} text",
            encoding.name()
        )));
    }

    let text = encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| {
            ImportExportError::EncodingError(format!(
                "file is not valid {} text",
                encoding.name()
            ))
        })?;

    Ok(text.trim_start_matches('\u{feff}').to_string())
}

fn guess_encoding(bytes: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_utf8() {
        let text = decode_upload("Hostname,Project\nweb-01,ops\n".as_bytes()).expect("decodes");
        assert!(text.starts_with("Hostname"));
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("Hostname\nweb-01\n".as_bytes());
        let text = decode_upload(&bytes).expect("decodes");
        assert_eq!(text, "Hostname\nweb-01\n");
    }

    #[test]
    fn test_utf16le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Hostname\nweb-01\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let text = decode_upload(&bytes).expect("decodes");
        assert_eq!(text, "Hostname\nweb-01\n");
    }

    #[test]
    fn test_non_utf8_text_is_detected() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1252
            .encode("Hostname,Remark\nweb-01,caf\u{e9} r\u{e9}serv\u{e9}\n");
        let text = decode_upload(&bytes).expect("decodes");
        assert!(text.contains("caf\u{e9}"));
    }

    #[test]
    fn test_binary_upload_is_rejected() {
        let bytes = [0x50, 0x4B, 0x03, 0x04, 0x00, 0x00, 0x08, 0x00];
        let err = decode_upload(&bytes).expect_err("binary should fail");
        assert!(matches!(err, ImportExportError::EncodingError(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_empty_upload() {
        assert!(matches!(
            decode_upload(&[]),
            Err(ImportExportError::MissingData(_))
        ));
    }
}
