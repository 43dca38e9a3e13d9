//! Text conversion at the engine boundary.
//!
//! The engine takes and returns narrow strings in the process's ANSI code
//! page. Arguments are encoded into it before the call, and callback strings
//! are decoded out of it before they reach subscribers.

use encoding_rs::{Encoding, UTF_8};
use std::ffi::OsStr;

/// The narrow-string encoding the engine speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextCodec {
    encoding: &'static Encoding,
}

impl TextCodec {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self { encoding }
    }

    pub fn utf8() -> Self {
        Self::new(UTF_8)
    }

    /// Codec for a Windows code page number such as 1251 or 932.
    pub fn for_code_page(code_page: u16) -> Option<Self> {
        codepage::to_encoding(code_page).map(Self::new)
    }

    /// The code page the engine uses in this process.
    ///
    /// On Windows this is the active ANSI code page; elsewhere UTF-8.
    pub fn system() -> Self {
        #[cfg(windows)]
        {
            // SAFETY: GetACP takes no arguments and cannot fail.
            let code_page = unsafe { windows_sys::Win32::Globalization::GetACP() };
            u16::try_from(code_page)
                .ok()
                .and_then(Self::for_code_page)
                .unwrap_or_else(Self::utf8)
        }
        #[cfg(not(windows))]
        {
            Self::utf8()
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Decode bytes received from the engine. Unmappable bytes become U+FFFD.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, _) = self.encoding.decode_without_bom_handling(bytes);
        text.into_owned()
    }

    /// Encode text for the engine, or `None` if a character has no
    /// representation in this code page.
    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        let (bytes, _, had_errors) = self.encoding.encode(text);
        if had_errors {
            None
        } else {
            Some(bytes.into_owned())
        }
    }

    /// Encode an OS string for the engine.
    ///
    /// On Unix a string that is not valid Unicode is passed through as its
    /// raw bytes.
    pub fn encode_os(&self, text: &OsStr) -> Option<Vec<u8>> {
        if let Some(text) = text.to_str() {
            return self.encode(text);
        }
        #[cfg(unix)]
        {
            use std::os::unix::ffi::OsStrExt;
            Some(text.as_bytes().to_vec())
        }
        #[cfg(not(unix))]
        {
            None
        }
    }
}

impl Default for TextCodec {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // "Привет.txt" in Windows-1251
    const PRIVET_1251: &[u8] = b"\xcf\xf0\xe8\xe2\xe5\xf2.txt";

    #[test]
    fn test_decode_ansi_file_name() {
        let codec = TextCodec::for_code_page(1251).unwrap();
        assert_eq!(codec.name(), "windows-1251");
        assert_eq!(codec.decode(PRIVET_1251), "Привет.txt");
    }

    #[test]
    fn test_encode_ansi_file_name() {
        let codec = TextCodec::for_code_page(1251).unwrap();
        assert_eq!(codec.encode("Привет.txt").unwrap(), PRIVET_1251);
        assert_eq!(codec.encode("plain").unwrap(), b"plain");
    }

    #[test]
    fn test_unrepresentable_text_is_refused() {
        let codec = TextCodec::for_code_page(1252).unwrap();
        assert_eq!(codec.encode("café").unwrap(), b"caf\xe9");
        assert_eq!(codec.encode("Привет"), None);
    }

    #[test]
    fn test_utf8_codec() {
        let codec = TextCodec::utf8();
        assert_eq!(codec.encode("Привет").unwrap(), "Привет".as_bytes());
        assert_eq!(codec.decode(b"a\xffb"), "a\u{fffd}b");
    }

    #[test]
    fn test_unknown_code_page() {
        assert!(TextCodec::for_code_page(1).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_os_string_passes_through() {
        use std::os::unix::ffi::OsStrExt;

        let raw = OsStr::from_bytes(PRIVET_1251);
        let codec = TextCodec::for_code_page(1251).unwrap();
        assert_eq!(codec.encode_os(raw).unwrap(), PRIVET_1251);
        assert_eq!(codec.encode_os(OsStr::new("Привет.txt")).unwrap(), PRIVET_1251);
    }
}
