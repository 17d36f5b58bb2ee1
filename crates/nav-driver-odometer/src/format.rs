//! Line classification and tokenization for the odometer wire formats.
//!
//! Record layouts after `,`, `*` and `;` are turned into spaces:
//!
//! | Format   | Tokens                                                               |
//! |----------|----------------------------------------------------------------------|
//! | Raw      | `<ign> <ign> <time> <7 × ign> <count> <ign> <flag>`                  |
//! | Pulse    | `<time> <count> <ign> <flag>`                                        |
//! | Velocity | `<time> <value>`                                                     |
//!
//! Tokens after the last field a format needs are ignored.

use std::str::SplitWhitespace;

use crate::calibration::WireFormat;

/// First byte of a comment line.
pub const COMMENT_MARKER: u8 = b'#';
/// First byte of a header echo line.
pub const HEADER_ECHO_MARKER: u8 = b'T';

/// Returns true for lines that carry no record.
#[must_use]
pub fn is_skippable(line: &[u8]) -> bool {
    matches!(line.first(), Some(&COMMENT_MARKER) | Some(&HEADER_ECHO_MARKER))
}

/// Replaces the field delimiters `,` `*` `;` with spaces.
#[must_use]
pub fn normalize_delimiters(line: &str) -> String {
    line.replace(|c: char| matches!(c, ',' | '*' | ';'), " ")
}

/// Fields of one record, filled in token order.
///
/// Fields not reached before a failure keep their zero defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RecordFields {
    /// Seconds of week.
    pub timestamp: f64,
    /// Raw pulse count, or the calibrated value for [`WireFormat::Velocity`].
    pub count: f64,
    /// Direction flag (0 = forward).
    pub flag: i64,
}

/// Tokenizes a normalized line into `fields`.
///
/// # Errors
///
/// Returns a short reason naming the first missing or unparsable field.
/// `fields` then holds everything parsed up to that point.
pub fn tokenize(
    format: WireFormat,
    line: &str,
    fields: &mut RecordFields,
) -> Result<(), String> {
    let mut tokens = line.split_whitespace();
    match format {
        WireFormat::Raw => {
            skip(&mut tokens, 2, "header")?;
            fields.timestamp = next_f64(&mut tokens, "timestamp")?;
            skip(&mut tokens, 7, "status")?;
            fields.count = next_f64(&mut tokens, "raw count")?;
            skip(&mut tokens, 1, "reserved")?;
            fields.flag = next_i64(&mut tokens, "direction flag")?;
        }
        WireFormat::Pulse => {
            fields.timestamp = next_f64(&mut tokens, "timestamp")?;
            fields.count = next_f64(&mut tokens, "raw count")?;
            skip(&mut tokens, 1, "reserved")?;
            fields.flag = next_i64(&mut tokens, "direction flag")?;
        }
        WireFormat::Velocity => {
            fields.timestamp = next_f64(&mut tokens, "timestamp")?;
            fields.count = next_f64(&mut tokens, "velocity")?;
        }
    }
    Ok(())
}

fn skip(tokens: &mut SplitWhitespace<'_>, n: usize, what: &str) -> Result<(), String> {
    for _ in 0..n {
        tokens
            .next()
            .ok_or_else(|| format!("missing {} field", what))?;
    }
    Ok(())
}

/// Parses a real number; `inf` and `nan` spellings are rejected.
fn next_f64(tokens: &mut SplitWhitespace<'_>, what: &str) -> Result<f64, String> {
    let token = tokens
        .next()
        .ok_or_else(|| format!("missing {}", what))?;
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid {} '{}'", what, token))
}

fn next_i64(tokens: &mut SplitWhitespace<'_>, what: &str) -> Result<i64, String> {
    let token = tokens
        .next()
        .ok_or_else(|| format!("missing {}", what))?;
    token
        .parse::<i64>()
        .map_err(|_| format!("invalid {} '{}'", what, token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(format: WireFormat, line: &str) -> Result<RecordFields, String> {
        let mut fields = RecordFields::default();
        tokenize(format, &normalize_delimiters(line), &mut fields).map(|()| fields)
    }

    #[test]
    fn skippable_markers() {
        assert!(is_skippable(b"# comment"));
        assert!(is_skippable(b"Time Count Flag"));
        assert!(!is_skippable(b"100.0 50 0 0"));
        assert!(!is_skippable(b""));
        assert!(!is_skippable(b" # indented"));
    }

    #[test]
    fn delimiters_become_spaces() {
        assert_eq!(normalize_delimiters("a,b*c;d"), "a b c d");
    }

    #[test]
    fn pulse_record() {
        let fields = parse(WireFormat::Pulse, "100.0 50 0 1").unwrap();
        assert_eq!(
            fields,
            RecordFields {
                timestamp: 100.0,
                count: 50.0,
                flag: 1
            }
        );
    }

    #[test]
    fn raw_record_with_delimiters() {
        let line = "$ODO,1234,345600.25,a,b,c,d,e,f,g,-12.5,x,0*7F";
        let fields = parse(WireFormat::Raw, line).unwrap();
        assert_eq!(fields.timestamp, 345600.25);
        assert_eq!(fields.count, -12.5);
        assert_eq!(fields.flag, 0);
    }

    #[test]
    fn raw_record_ignores_trailing_tokens() {
        let line = "h1 h2 10.0 s s s s s s s 3 r 2 extra tokens";
        let fields = parse(WireFormat::Raw, line).unwrap();
        assert_eq!(fields.count, 3.0);
        assert_eq!(fields.flag, 2);
    }

    #[test]
    fn velocity_record() {
        let fields = parse(WireFormat::Velocity, "200.5;-3.25").unwrap();
        assert_eq!(fields.timestamp, 200.5);
        assert_eq!(fields.count, -3.25);
    }

    #[test]
    fn failure_keeps_partial_fields() {
        let mut fields = RecordFields::default();
        let err = tokenize(WireFormat::Pulse, "100.0 50", &mut fields).unwrap_err();
        assert!(err.contains("reserved"));
        assert_eq!(fields.timestamp, 100.0);
        assert_eq!(fields.count, 50.0);
        assert_eq!(fields.flag, 0);
    }

    #[test]
    fn non_numeric_timestamp() {
        let err = parse(WireFormat::Velocity, "abc").unwrap_err();
        assert!(err.contains("timestamp"));
        assert!(err.contains("abc"));
    }

    #[test]
    fn non_finite_timestamp_is_invalid() {
        for token in ["inf", "-inf", "nan", "infinity", "NaN"] {
            let mut fields = RecordFields::default();
            let line = format!("{} 2.0", token);
            let err = tokenize(WireFormat::Velocity, &line, &mut fields).unwrap_err();
            assert_eq!(err, format!("invalid timestamp '{}'", token));
            assert_eq!(fields.timestamp, 0.0);
        }
    }

    #[test]
    fn non_finite_count_is_invalid() {
        for token in ["inf", "-inf", "nan"] {
            let err = parse(WireFormat::Pulse, &format!("100.0 {} 0 0", token)).unwrap_err();
            assert_eq!(err, format!("invalid raw count '{}'", token));

            let raw = format!("h1 h2 10.0 s s s s s s s {} r 0", token);
            assert!(parse(WireFormat::Raw, &raw).unwrap_err().contains("raw count"));
        }
        assert!(parse(WireFormat::Velocity, "1.0 nan").unwrap_err().contains("velocity"));
    }

    #[test]
    fn non_integer_flag() {
        assert!(parse(WireFormat::Pulse, "1.0 2 0 1.5").is_err());
    }

    #[test]
    fn raw_too_short() {
        assert!(parse(WireFormat::Raw, "a b 10.0 s s s").is_err());
    }
}
