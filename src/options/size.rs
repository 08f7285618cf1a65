use crate::OptionError;
use regex::Regex;
use std::sync::LazyLock;

pub const KILO: i64 = 1000;
pub const MEGA: i64 = KILO * 1000;
pub const GIGA: i64 = MEGA * 1000;

pub const KIBI: i64 = 1024;
pub const MEBI: i64 = KIBI * 1024;
pub const GIBI: i64 = MEBI * 1024;

// number, optional unit, optional trailing +1/-1 adjustment
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d*\.?\d*)([kmgb](?:i?b)?)?([+-]1)?$").unwrap()
});

fn unit_multiplier(unit: &str) -> Option<i64> {
    match unit.to_ascii_lowercase().as_str() {
        "b" | "bb" | "bib" => Some(1),
        "kb" => Some(KILO),
        "mb" => Some(MEGA),
        "gb" => Some(GIGA),
        "k" | "kib" => Some(KIBI),
        "m" | "mib" => Some(MEBI),
        "g" | "gib" => Some(GIBI),
        _ => None,
    }
}

/**
 Parses rsync's size syntax: a decimal number (fractions allowed), an
 optional unit suffix, and an optional `+1`/`-1` nudge.

 Bare single letters are binary (`2K` = 2048), two-letter forms are
 decimal (`2kb` = 2000), and `ib` spells the binary unit out (`2KiB` =
 2048). A missing suffix falls back to `default_suffix`: `'b'` for the
 size limits, `'K'` for `--bwlimit`.

 # Errors
 [`OptionError::InvalidSize`] when the text does not match the grammar or
 carries no digits.
*/
pub fn parse_size(text: &str, default_suffix: char) -> Result<i64, OptionError> {
    let bad = || OptionError::InvalidSize(text.to_owned());
    let caps = SIZE_RE.captures(text.trim()).ok_or_else(bad)?;

    let number = caps.get(1).map_or("", |m| m.as_str());
    if number.is_empty() || number == "." {
        return Err(bad());
    }
    let quantity: f64 = number.parse().map_err(|_| bad())?;

    let unit = caps.get(2).map_or_else(
        || default_suffix.to_string(),
        |m| m.as_str().to_owned(),
    );
    let multiplier = unit_multiplier(&unit).ok_or_else(bad)?;

    let adjust = match caps.get(3).map(|m| m.as_str()) {
        Some("+1") => 1,
        Some("-1") => -1,
        _ => 0,
    };

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    Ok((quantity * multiplier as f64).round() as i64 + adjust)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_mapping_with_byte_default() {
        let table: &[(&str, i64)] = &[
            ("10", 10),
            ("10b", 10),
            ("10kb", 10_000),
            ("10mb", 10_000_000),
            ("2gb", 2_000_000_000),
            ("2.13gb", 2_130_000_000),
            ("2K", 2048),
            ("2M", 2_097_152),
            ("2G", 2_147_483_648),
            ("2GiB", 2_147_483_648),
        ];
        for &(text, want) in table {
            assert_eq!(parse_size(text, 'b').unwrap(), want, "{text}");
        }
    }

    #[test]
    fn bwlimit_defaults_to_kibibytes() {
        assert_eq!(parse_size("500", 'K').unwrap(), 512_000);
        assert_eq!(parse_size("1.5", 'K').unwrap(), 1536);
    }

    #[test]
    fn plus_minus_one_adjustment() {
        assert_eq!(parse_size("1k+1", 'b').unwrap(), 1025);
        assert_eq!(parse_size("1k-1", 'b').unwrap(), 1023);
        assert_eq!(parse_size("2g-1", 'b').unwrap(), GIBI * 2 - 1);
    }

    #[test]
    fn rejects_garbage() {
        for text in ["", ".", "k", "10q", "10kbb", "1k+2", "ten"] {
            assert!(parse_size(text, 'b').is_err(), "{text}");
        }
    }
}
