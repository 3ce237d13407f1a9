use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tokens treated as missing cells in addition to empty fields.
///
/// Mirrors the default NA set of common dataframe readers so that files exported from those tools
/// aggregate the same way.
pub const DEFAULT_MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Formatting conventions of a delimited source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleOptions {
    #[serde(with = "delimiter_char")]
    pub delimiter: u8,
    /// Grouping separator stripped from numeric cells (e.g. `.` in `1.234,56`).
    pub thousands_separator: Option<char>,
    /// Decimal separator used when parsing numbers.
    ///
    /// `.` matches inputs like `1234.56`. `,` matches inputs like `1234,56`.
    pub decimal_separator: char,
    /// How to decode raw bytes into text fields.
    pub encoding: TextEncoding,
    pub missing_tokens: Vec<String>,
}

impl Default for LocaleOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            thousands_separator: None,
            decimal_separator: '.',
            encoding: TextEncoding::Utf8,
            missing_tokens: DEFAULT_MISSING_TOKENS
                .iter()
                .map(|t| (*t).to_string())
                .collect(),
        }
    }
}

impl LocaleOptions {
    /// European-style numbers: `1.234,56` with `;` as field delimiter.
    pub fn european() -> Self {
        Self {
            delimiter: b';',
            thousands_separator: Some('.'),
            decimal_separator: ',',
            ..Self::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_thousands_separator(mut self, separator: Option<char>) -> Self {
        self.thousands_separator = separator;
        self
    }

    pub fn with_decimal_separator(mut self, separator: char) -> Self {
        self.decimal_separator = separator;
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(thousands) = self.thousands_separator {
            if thousands == self.decimal_separator {
                return Err(ConfigError::SeparatorConflict {
                    separator: thousands,
                });
            }
        }
        if !self.delimiter.is_ascii() || matches!(self.delimiter, b'\n' | b'\r' | b'"') {
            return Err(ConfigError::InvalidDelimiter(self.delimiter as char));
        }
        if self.delimiter as char == self.decimal_separator {
            return Err(ConfigError::SeparatorConflict {
                separator: self.decimal_separator,
            });
        }
        Ok(())
    }

    pub fn is_missing_token(&self, field: &str) -> bool {
        self.missing_tokens.iter().any(|t| t == field)
    }
}

/// Text encoding of a delimited source.
///
/// Only ASCII-compatible encodings are accepted: field splitting happens on raw bytes before
/// decoding, so the delimiter, quote and newline bytes must mean the same thing in every encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TextEncoding {
    /// Attempt to decode as UTF-8; if a field contains invalid UTF-8, fall back to Windows-1252.
    Auto,
    /// Decode as UTF-8 and reject invalid byte sequences.
    Utf8,
    /// Any other ASCII-compatible WHATWG encoding (`latin1`, `ISO-8859-1`, `cp1252`, ...).
    Legacy(&'static Encoding),
}

impl TextEncoding {
    pub fn from_label(label: &str) -> Result<Self, ConfigError> {
        let trimmed = label.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(TextEncoding::Auto);
        }
        let encoding = Encoding::for_label(trimmed.as_bytes())
            .ok_or_else(|| ConfigError::UnsupportedEncoding(label.to_string()))?;
        if encoding == UTF_8 {
            return Ok(TextEncoding::Utf8);
        }
        if !encoding.is_ascii_compatible() {
            return Err(ConfigError::UnsupportedEncoding(label.to_string()));
        }
        Ok(TextEncoding::Legacy(encoding))
    }

    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Auto => "auto",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Legacy(encoding) => encoding.name(),
        }
    }

    /// Decode one raw field. `None` means the bytes are not valid in this encoding.
    pub(crate) fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(Cow::Borrowed),
            TextEncoding::Auto => match std::str::from_utf8(bytes) {
                Ok(s) => Some(Cow::Borrowed(s)),
                Err(_) => {
                    let (cow, _, _) = WINDOWS_1252.decode(bytes);
                    Some(cow)
                }
            },
            TextEncoding::Legacy(encoding) => {
                encoding.decode_without_bom_handling_and_without_replacement(bytes)
            }
        }
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        TextEncoding::Utf8
    }
}

impl TryFrom<String> for TextEncoding {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TextEncoding::from_label(&value)
    }
}

impl From<TextEncoding> for String {
    fn from(value: TextEncoding) -> Self {
        value.label().to_string()
    }
}

/// Delimiters are written as one-character strings in config files rather than byte values.
mod delimiter_char {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(delimiter: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        let mut buf = [0u8; 4];
        serializer.serialize_str((*delimiter as char).encode_utf8(&mut buf))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let raw = if raw == "\\t" { "\t".to_string() } else { raw };
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii() => Ok(c as u8),
            _ => Err(de::Error::custom(format!(
                "delimiter must be a single ASCII character, got {raw:?}"
            ))),
        }
    }
}
