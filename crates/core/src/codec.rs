use std::borrow::Cow;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding as RsEncoding, BIG5, GBK, SHIFT_JIS, WINDOWS_1252};
use thiserror::Error;

/// 表示文字檔使用的行尾樣式。 / Line ending style detected on disk and restored on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    /// 回傳序列化時使用的行尾字串。 / Returns the literal used when serialising text.
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }
}

/// 支援的文字編碼。 / Supported text encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Legacy(LegacyEncoding),
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
            Encoding::Legacy(legacy) => legacy.name(),
        }
    }
}

/// 支援的傳統多位元編碼。 / Legacy multi-byte encodings picked up by detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyEncoding {
    Windows1252,
    ShiftJis,
    Gbk,
    Big5,
}

impl LegacyEncoding {
    pub fn name(self) -> &'static str {
        match self {
            LegacyEncoding::Windows1252 => "windows-1252",
            LegacyEncoding::ShiftJis => "shift-jis",
            LegacyEncoding::Gbk => "gbk",
            LegacyEncoding::Big5 => "big5",
        }
    }

    fn to_rs(self) -> &'static RsEncoding {
        match self {
            LegacyEncoding::Windows1252 => WINDOWS_1252,
            LegacyEncoding::ShiftJis => SHIFT_JIS,
            LegacyEncoding::Gbk => GBK,
            LegacyEncoding::Big5 => BIG5,
        }
    }
}

/// 檔案在磁碟上的格式，儲存時沿用。 / On-disk format of a file, reused when it is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextFormat {
    pub encoding: Encoding,
    pub line_ending: LineEnding,
    pub has_bom: bool,
}

/// 解碼後的文字與其格式。 / Decoded text (newlines normalised to `\n`) plus its format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub format: TextFormat,
}

/// 編解碼錯誤。 / Errors raised while decoding or encoding file contents.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("file encoding is not supported or data is invalid")]
    InvalidEncoding,
    #[error("text cannot be represented in target encoding {0}")]
    Unrepresentable(&'static str),
}

/// 偵測編碼並將行尾正規化為 `\n`。 / Detects the encoding and normalises newlines to `\n`.
pub fn decode(bytes: &[u8]) -> Result<DecodedText, CodecError> {
    let (raw, encoding, has_bom) = decode_raw(bytes)?;
    let line_ending = detect_line_ending(&raw);
    Ok(DecodedText {
        text: normalize_newlines(&raw),
        format: TextFormat {
            encoding,
            line_ending,
            has_bom,
        },
    })
}

/// 依照格式將記憶體文字轉回位元組。 / Serialises in-memory text back into bytes using `format`.
pub fn encode(text: &str, format: TextFormat) -> Result<Vec<u8>, CodecError> {
    let text = normalize_newlines(text).replace('\n', format.line_ending.as_str());
    let bytes = match format.encoding {
        Encoding::Utf8 => {
            if format.has_bom {
                let mut prefixed = Vec::with_capacity(3 + text.len());
                prefixed.extend_from_slice(b"\xEF\xBB\xBF");
                prefixed.extend_from_slice(text.as_bytes());
                prefixed
            } else {
                text.into_bytes()
            }
        }
        Encoding::Utf16Le => encode_utf16(&text, format.has_bom, false),
        Encoding::Utf16Be => encode_utf16(&text, format.has_bom, true),
        Encoding::Legacy(legacy) => encode_legacy(&text, legacy)?,
    };
    Ok(bytes)
}

fn decode_raw(bytes: &[u8]) -> Result<(String, Encoding, bool), CodecError> {
    if let Some(rest) = bytes.strip_prefix(b"\xEF\xBB\xBF") {
        let text = String::from_utf8(rest.to_vec()).map_err(|_| CodecError::InvalidEncoding)?;
        return Ok((text, Encoding::Utf8, true));
    }
    if let Some(rest) = bytes.strip_prefix(b"\xFF\xFE") {
        return Ok((decode_utf16(rest, false)?, Encoding::Utf16Le, true));
    }
    if let Some(rest) = bytes.strip_prefix(b"\xFE\xFF") {
        return Ok((decode_utf16(rest, true)?, Encoding::Utf16Be, true));
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok((text.to_owned(), Encoding::Utf8, false));
    }
    if looks_like_utf16(bytes, false) {
        return Ok((decode_utf16(bytes, false)?, Encoding::Utf16Le, false));
    }
    if looks_like_utf16(bytes, true) {
        return Ok((decode_utf16(bytes, true)?, Encoding::Utf16Be, false));
    }
    if let Some(legacy) = detect_legacy_encoding(bytes) {
        return Ok((
            decode_legacy(bytes, legacy)?,
            Encoding::Legacy(legacy),
            false,
        ));
    }
    Err(CodecError::InvalidEncoding)
}

fn decode_utf16(bytes: &[u8], big_endian: bool) -> Result<String, CodecError> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::InvalidEncoding);
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| {
            let pair = [chunk[0], chunk[1]];
            if big_endian {
                u16::from_be_bytes(pair)
            } else {
                u16::from_le_bytes(pair)
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|_| CodecError::InvalidEncoding)
}

fn encode_utf16(text: &str, include_bom: bool, big_endian: bool) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(text.len() * 2 + 2);
    if include_bom {
        buffer.extend_from_slice(if big_endian { b"\xFE\xFF" } else { b"\xFF\xFE" });
    }
    for unit in text.encode_utf16() {
        let bytes = if big_endian {
            unit.to_be_bytes()
        } else {
            unit.to_le_bytes()
        };
        buffer.extend_from_slice(&bytes);
    }
    buffer
}

fn encode_legacy(text: &str, legacy: LegacyEncoding) -> Result<Vec<u8>, CodecError> {
    let (cow, _, had_errors) = legacy.to_rs().encode(text);
    if had_errors {
        return Err(CodecError::Unrepresentable(legacy.name()));
    }
    Ok(match cow {
        Cow::Borrowed(slice) => slice.to_vec(),
        Cow::Owned(vec) => vec,
    })
}

fn decode_legacy(bytes: &[u8], legacy: LegacyEncoding) -> Result<String, CodecError> {
    let (cow, had_errors) = legacy.to_rs().decode_without_bom_handling(bytes);
    if had_errors {
        return Err(CodecError::InvalidEncoding);
    }
    Ok(cow.into_owned())
}

fn detect_legacy_encoding(bytes: &[u8]) -> Option<LegacyEncoding> {
    if bytes.is_empty() {
        return None;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let guess = detector.guess(None, true);
    if guess == WINDOWS_1252 {
        Some(LegacyEncoding::Windows1252)
    } else if guess == SHIFT_JIS {
        Some(LegacyEncoding::ShiftJis)
    } else if guess == GBK {
        Some(LegacyEncoding::Gbk)
    } else if guess == BIG5 {
        Some(LegacyEncoding::Big5)
    } else {
        None
    }
}

fn looks_like_utf16(bytes: &[u8], big_endian: bool) -> bool {
    if bytes.len() < 2 || bytes.len() % 2 != 0 {
        return false;
    }
    let sample_len = bytes.len().min(64);
    let mut zero_count = 0;
    let mut total = 0;
    for chunk in bytes[..sample_len].chunks_exact(2) {
        let zero_byte = if big_endian { chunk[0] } else { chunk[1] };
        if zero_byte == 0 {
            zero_count += 1;
        }
        total += 1;
    }
    total > 0 && zero_count * 2 >= total
}

/// 以第一個換行記號推斷行尾偏好。 / Infers the preferred line ending from the first newline sentinel.
fn detect_line_ending(text: &str) -> LineEnding {
    let bytes = text.as_bytes();
    for (idx, byte) in bytes.iter().enumerate() {
        match byte {
            b'\r' if bytes.get(idx + 1) == Some(&b'\n') => return LineEnding::CrLf,
            b'\r' => return LineEnding::Cr,
            b'\n' => return LineEnding::Lf,
            _ => {}
        }
    }
    LineEnding::Lf
}

fn normalize_newlines(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\r' {
            if matches!(chars.peek(), Some('\n')) {
                chars.next();
            }
            result.push('\n');
        } else {
            result.push(ch);
        }
    }
    result
}
