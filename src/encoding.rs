//! Strict text decoding of uploaded files.
//!
//! Spreadsheet exports arrive in whatever encoding the client machine used. Each
//! candidate is tried in order and the first one that decodes the whole payload
//! without a malformed sequence wins. Nothing is ever decoded with replacement
//! characters.

use clap::ValueEnum;
use encoding_rs::{BIG5, Encoding, GBK, UTF_8, UTF_16BE, UTF_16LE, WINDOWS_1252};
use serde::Serialize;

use crate::error::IngestError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    Utf8,
    Gbk,
    Latin1,
    Ascii,
    Utf16,
    Utf32,
    Windows1252,
    Gb2312,
    Big5,
}

pub const DEFAULT_CANDIDATES: [TextEncoding; 9] = [
    TextEncoding::Utf8,
    TextEncoding::Gbk,
    TextEncoding::Latin1,
    TextEncoding::Ascii,
    TextEncoding::Utf16,
    TextEncoding::Utf32,
    TextEncoding::Windows1252,
    TextEncoding::Gb2312,
    TextEncoding::Big5,
];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];
const UTF32_LE_BOM: &[u8] = &[0xFF, 0xFE, 0x00, 0x00];
const UTF32_BE_BOM: &[u8] = &[0x00, 0x00, 0xFE, 0xFF];

// Bytes cp1252 leaves unassigned; WHATWG maps them to C1 controls instead of failing.
const WINDOWS_1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
}

impl TextEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Gbk => "gbk",
            Self::Latin1 => "latin-1",
            Self::Ascii => "ascii",
            Self::Utf16 => "utf-16",
            Self::Utf32 => "utf-32",
            Self::Windows1252 => "windows-1252",
            Self::Gb2312 => "gb2312",
            Self::Big5 => "big5",
        }
    }

    /// Decodes the entire payload or returns `None` on the first malformed sequence.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => decode_strict(UTF_8, bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)),
            Self::Gbk => {
                if is_two_byte_gbk(bytes) {
                    decode_strict(GBK, bytes)
                } else {
                    None
                }
            }
            Self::Gb2312 => {
                if is_euc_cn(bytes) {
                    decode_strict(GBK, bytes)
                } else {
                    None
                }
            }
            Self::Big5 => decode_strict(BIG5, bytes),
            Self::Windows1252 => {
                if bytes
                    .iter()
                    .any(|byte| WINDOWS_1252_UNDEFINED.contains(byte))
                {
                    None
                } else {
                    decode_strict(WINDOWS_1252, bytes)
                }
            }
            Self::Latin1 => Some(bytes.iter().map(|&byte| char::from(byte)).collect()),
            Self::Ascii => {
                if bytes.is_ascii() {
                    Some(bytes.iter().map(|&byte| char::from(byte)).collect())
                } else {
                    None
                }
            }
            Self::Utf16 => decode_utf16(bytes),
            Self::Utf32 => decode_utf32(bytes),
        }
    }
}

/// Returns the text from the first candidate that decodes `bytes` cleanly.
pub fn resolve(
    file_name: &str,
    bytes: &[u8],
    candidates: &[TextEncoding],
) -> Result<DecodedText, IngestError> {
    candidates
        .iter()
        .find_map(|&encoding| {
            encoding
                .decode(bytes)
                .map(|text| DecodedText { text, encoding })
        })
        .ok_or_else(|| IngestError::decode(file_name, candidates))
}

fn decode_strict(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

fn decode_utf16(bytes: &[u8]) -> Option<String> {
    if let Some(rest) = bytes.strip_prefix(UTF16_BE_BOM) {
        return decode_strict(UTF_16BE, rest);
    }
    let rest = bytes.strip_prefix(UTF16_LE_BOM).unwrap_or(bytes);
    decode_strict(UTF_16LE, rest)
}

// encoding_rs follows WHATWG, which has no UTF-32.
fn decode_utf32(bytes: &[u8]) -> Option<String> {
    let (body, big_endian) = if let Some(rest) = bytes.strip_prefix(UTF32_BE_BOM) {
        (rest, true)
    } else {
        (bytes.strip_prefix(UTF32_LE_BOM).unwrap_or(bytes), false)
    };

    if body.len() % 4 != 0 {
        return None;
    }

    body.chunks_exact(4)
        .map(|unit| {
            let quad = [unit[0], unit[1], unit[2], unit[3]];
            let code_point = if big_endian {
                u32::from_be_bytes(quad)
            } else {
                u32::from_le_bytes(quad)
            };
            char::from_u32(code_point)
        })
        .collect()
}

// encoding_rs decodes GBK as gb18030, which also takes a lone 0x80 (euro sign)
// and four-byte sequences whose second byte is an ASCII digit. Plain GBK has
// neither, so such payloads are left to the next candidate.
fn is_two_byte_gbk(bytes: &[u8]) -> bool {
    let mut index = 0;
    while index < bytes.len() {
        let lead = bytes[index];
        if lead < 0x80 {
            index += 1;
            continue;
        }
        if lead == 0x80 || lead == 0xFF {
            return false;
        }
        let Some(&trail) = bytes.get(index + 1) else {
            return false;
        };
        if trail.is_ascii_digit() {
            return false;
        }
        index += 2;
    }
    true
}

// GB2312 is the EUC-CN subset of GBK: lead bytes 0xA1..=0xF7, trail bytes 0xA1..=0xFE.
fn is_euc_cn(bytes: &[u8]) -> bool {
    let mut index = 0;
    while index < bytes.len() {
        let lead = bytes[index];
        if lead < 0x80 {
            index += 1;
            continue;
        }
        let Some(&trail) = bytes.get(index + 1) else {
            return false;
        };
        if !(0xA1..=0xF7).contains(&lead) || !(0xA1..=0xFE).contains(&trail) {
            return false;
        }
        index += 2;
    }
    true
}
