//! Settings file and command-line overrides.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colsum_core::{AggregationConfig, LocaleOptions, ProbeOptions, TextEncoding};
use serde::Deserialize;

/// Contents of a `--config` JSON file. Every section is optional.
///
/// ```json
/// {
///   "locale": { "delimiter": ";", "thousands_separator": ".", "decimal_separator": ",", "encoding": "latin1" },
///   "aggregation": { "target_columns": ["quantita"], "group_column": "categoria", "batch_size": 50000 },
///   "probe": { "sample_rows": 20 }
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub locale: LocaleOptions,
    pub aggregation: AggregationConfig,
    pub probe: ProbeOptions,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("read settings file {}", path.display()))?;
        let settings = serde_json::from_str(&text)
            .with_context(|| format!("parse settings file {}", path.display()))?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }
}

/// Flags describing how the input file is formatted.
#[derive(Args, Debug, Default)]
pub struct LocaleArgs {
    /// JSON settings file; flags given on the command line take precedence.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Field delimiter (a single ASCII character, or `tab`).
    #[arg(long, value_name = "CHAR")]
    pub delimiter: Option<String>,

    /// Thousands separator stripped from numbers, or `none`.
    #[arg(long, value_name = "CHAR")]
    pub thousands: Option<String>,

    /// Decimal separator.
    #[arg(long, value_name = "CHAR")]
    pub decimal: Option<char>,

    /// Text encoding label (`utf-8`, `latin1`, `cp1252`, `auto`, ...).
    #[arg(long, value_name = "LABEL")]
    pub encoding: Option<String>,

    /// Shortcut for `--delimiter ';' --thousands . --decimal ,`.
    #[arg(long)]
    pub european: bool,
}

impl LocaleArgs {
    /// Apply the flags on top of `base` and validate the result.
    pub fn resolve(&self, base: LocaleOptions) -> Result<LocaleOptions> {
        let mut locale = if self.european {
            LocaleOptions {
                missing_tokens: base.missing_tokens,
                encoding: base.encoding,
                ..LocaleOptions::european()
            }
        } else {
            base
        };

        if let Some(delimiter) = &self.delimiter {
            locale.delimiter = parse_delimiter(delimiter)?;
        }
        if let Some(thousands) = &self.thousands {
            locale.thousands_separator = parse_thousands(thousands)?;
        }
        if let Some(decimal) = self.decimal {
            locale.decimal_separator = decimal;
        }
        if let Some(label) = &self.encoding {
            locale.encoding = TextEncoding::from_label(label)?;
        }
        locale.validate()?;
        Ok(locale)
    }
}

fn parse_delimiter(input: &str) -> Result<u8> {
    match input {
        "tab" | "\\t" | "\t" => return Ok(b'\t'),
        _ => {}
    }
    let mut chars = input.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c as u8),
        _ => bail!("invalid delimiter {input:?} (expected a single ASCII character or `tab`)"),
    }
}

fn parse_thousands(input: &str) -> Result<Option<char>> {
    if input.eq_ignore_ascii_case("none") || input.is_empty() {
        return Ok(None);
    }
    let mut chars = input.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Some(c)),
        _ => bail!("invalid thousands separator {input:?} (expected one character or `none`)"),
    }
}
