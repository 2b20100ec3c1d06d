//! Property-based tests for trace_fanout_logger using proptest

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;
use trace_fanout_logger::core::record::RESERVED_KEYS;
use trace_fanout_logger::prelude::*;

fn named_level() -> impl Strategy<Value = LogLevel> {
    prop::sample::select(LogLevel::NAMED.to_vec())
}

fn field_key() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-zA-Z0-9_]{0,12}",
        prop::sample::select(RESERVED_KEYS.to_vec()).prop_map(str::to_string),
    ]
}

fn field_value() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        ".{0,20}".prop_map(FieldValue::String),
        any::<i64>().prop_map(FieldValue::Int),
        any::<bool>().prop_map(FieldValue::Bool),
        Just(FieldValue::Null),
    ]
}

// ============================================================================
// LogLevel Tests
// ============================================================================

proptest! {
    /// Level names round-trip through parsing
    #[test]
    fn test_log_level_str_roundtrip(level in named_level()) {
        let parsed: LogLevel = level.as_str().parse().unwrap();
        prop_assert_eq!(&level, &parsed);
        prop_assert_eq!(level.to_string(), level.as_str());
    }

    /// Filtering agrees with npm severity order
    #[test]
    fn test_filter_matches_severity(min in named_level(), level in named_level()) {
        let expected = level.severity().unwrap() <= min.severity().unwrap();
        prop_assert_eq!(min.permits(&level), expected);
    }

    /// Unknown level names are kept verbatim and pass every filter
    #[test]
    fn test_custom_levels_pass_filters(name in "[a-z]{3,10}", min in named_level()) {
        prop_assume!(LogLevel::NAMED.iter().all(|l| l.as_str() != name));
        let level = LogLevel::from(name.as_str());
        prop_assert!(level.is_custom());
        prop_assert_eq!(level.as_str(), name.as_str());
        prop_assert!(min.permits(&level));
    }
}

// ============================================================================
// Normalization Tests
// ============================================================================

proptest! {
    /// A record holds the call's level and message, every non-reserved payload
    /// key once, and trace ids exactly when a transaction was active
    #[test]
    fn test_message_normalization(
        level in named_level(),
        message in ".{0,40}",
        fields in prop::collection::vec((field_key(), field_value()), 0..8),
        traced in any::<bool>(),
    ) {
        let mut event = MessageEvent::new(level.clone(), message.clone());
        for (key, value) in &fields {
            event = event.with_field(key.clone(), value.clone());
        }
        let correlation = if traced {
            Correlation::new("trace", "tx")
        } else {
            Correlation::none()
        };

        let record = NormalizedRecord::from_event(event.into(), correlation);

        prop_assert_eq!(record.level(), &level);
        prop_assert_eq!(record.message(), message.as_str());
        prop_assert_eq!(record.trace_id().is_some(), traced);
        prop_assert_eq!(record.transaction_id().is_some(), traced);

        for key in record.extra().keys() {
            prop_assert!(!RESERVED_KEYS.contains(&key));
        }
        for (key, _) in fields.iter().filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str())) {
            let last = fields.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v);
            prop_assert_eq!(record.field(key), last);
        }
    }

    /// JSON output has no trace keys without a transaction, and never nulls them
    #[test]
    fn test_json_trace_keys_absent_not_null(message in ".{0,40}") {
        let record = NormalizedRecord::from_event(
            MessageEvent::new(LogLevel::Info, message).into(),
            Correlation::none(),
        );
        let payload = FormatPipeline::json().format(&record);
        let json = payload.as_json().unwrap().as_object().unwrap();

        prop_assert!(!json.contains_key("traceId"));
        prop_assert!(!json.contains_key("transactionId"));
    }

    /// Error records are always error level and carry name and stack trace
    #[test]
    fn test_error_normalization(name in "[A-Z][a-zA-Z]{0,15}", message in ".{0,40}", stack in ".{0,80}") {
        let record = NormalizedRecord::from_event(
            ErrorEvent::new(name.clone(), message.clone(), stack.clone()).into(),
            Correlation::none(),
        );

        prop_assert_eq!(record.level(), &LogLevel::Error);
        prop_assert_eq!(record.message(), message.as_str());
        prop_assert_eq!(record.field("name"), Some(&FieldValue::String(name)));
        prop_assert_eq!(record.field("stackTrace"), Some(&FieldValue::String(stack)));
    }
}

// ============================================================================
// Line Format Safety Tests
// ============================================================================

/// Read one logfmt token, either quoted (with escapes) or bare up to `end`
fn read_logfmt_token(chars: &mut Peekable<Chars<'_>>, end: char) -> String {
    let mut out = String::new();
    if chars.peek() == Some(&'"') {
        chars.next();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some(other) => out.push(other),
                    None => break,
                },
                '"' => break,
                c => out.push(c),
            }
        }
    } else {
        while let Some(&c) = chars.peek() {
            if c == end {
                break;
            }
            out.push(c);
            chars.next();
        }
    }
    out
}

fn parse_logfmt(line: &str) -> Vec<(String, String)> {
    let mut chars = line.chars().peekable();
    let mut pairs = Vec::new();
    loop {
        while chars.peek() == Some(&' ') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }
        let key = read_logfmt_token(&mut chars, '=');
        assert_eq!(chars.next(), Some('='), "missing '=' after key {:?} in {:?}", key, line);
        let value = read_logfmt_token(&mut chars, ' ');
        pairs.push((key, value));
    }
    pairs
}

proptest! {
    /// Line pipelines always produce exactly one line
    #[test]
    fn test_line_formats_single_line(message in ".*", value in ".*") {
        let record = NormalizedRecord::from_event(
            MessageEvent::new(LogLevel::Info, message).with_field("note", value).into(),
            Correlation::none(),
        );

        for pipeline in [FormatPipeline::cli().with_colors(false), FormatPipeline::file()] {
            let line = pipeline.format(&record).to_line();
            prop_assert!(!line.contains('\n'), "{:?}", line);
            prop_assert!(!line.contains('\r'), "{:?}", line);
        }
    }

    /// Every extra field survives the file pipeline under its own key
    #[test]
    fn test_logfmt_keeps_arbitrary_keys(
        fields in prop::collection::btree_map(".{0,10}", any::<i64>(), 1..6)
    ) {
        let fields: BTreeMap<String, i64> = fields
            .into_iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .collect();
        let mut event = MessageEvent::new(LogLevel::Info, "fields");
        for (key, value) in &fields {
            event = event.with_field(key.clone(), *value);
        }
        let record = NormalizedRecord::from_event(event.into(), Correlation::none());
        let line = FormatPipeline::file().format(&record).to_line();

        let parsed = parse_logfmt(&line);
        let extras: BTreeMap<String, String> = parsed.into_iter().skip(3).collect();
        let expected: BTreeMap<String, String> = fields
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string()))
            .collect();
        prop_assert_eq!(extras, expected, "line: {:?}", line);
    }

    /// JSON pipeline keeps the message verbatim
    #[test]
    fn test_json_message_verbatim(message in ".*") {
        let record = NormalizedRecord::from_event(
            MessageEvent::new(LogLevel::Info, message.clone()).into(),
            Correlation::none(),
        );
        let payload = FormatPipeline::json().format(&record);
        prop_assert_eq!(payload.as_json().unwrap()["message"].as_str(), Some(message.as_str()));
    }
}
