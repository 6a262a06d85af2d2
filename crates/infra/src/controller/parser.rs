//! Decoder for slot-detail replies.
//!
//! A reply is either the literal `nil` (empty slot) or a serialized table:
//!
//! ```text
//! {
//!   count = 10,
//!   displayName = "Redstone Dust",
//!   name = "minecraft:redstone",
//!   maxCount = 64,
//!   tags = {
//!     [ "forge:dusts" ] = true,
//!   },
//! }
//! ```
//!
//! One `key = value` pair per line, any order. Nested tables are skipped.

use std::collections::HashMap;

use thiserror::Error;

use warehouse_core::DomainError;
use warehouse_inventory::{Item, ItemStack};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("malformed field `{field}`: {value}")]
    MalformedField { field: String, value: String },

    #[error("duplicate field `{0}`")]
    DuplicateField(String),

    #[error("line is not a `key = value` pair: {0}")]
    InvalidLine(String),

    #[error("unterminated nested table")]
    UnterminatedTable,

    #[error("expected {expected}, got {reply:?}")]
    UnexpectedReply {
        expected: &'static str,
        reply: String,
    },

    #[error("reply describes an impossible stack: {0}")]
    InvalidStack(DomainError),
}

impl From<ParseError> for DomainError {
    fn from(value: ParseError) -> Self {
        DomainError::protocol(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Text(String),
    Number(String),
    Table,
    Other(String),
}

/// Decode one slot-detail reply into `None` (empty slot) or a stack.
pub fn parse_item_detail(reply: &str) -> Result<Option<ItemStack>, ParseError> {
    let body = reply.trim();
    if body == "nil" {
        return Ok(None);
    }

    let mut fields = parse_fields(strip_outer_braces(body))?;

    let display_name = take_text(&mut fields, "displayName")?;
    let id = take_text(&mut fields, "name")?;
    let max_count = take_count(&mut fields, "maxCount")?;
    let count = take_count(&mut fields, "count")?;
    let nbt = match fields.remove("nbt") {
        None => None,
        Some(Value::Text(s)) => Some(s),
        Some(other) => return Err(malformed("nbt", &other)),
    };

    let item = Item::new(display_name, id, max_count, nbt).map_err(ParseError::InvalidStack)?;
    let stack = ItemStack::new(item, count).map_err(ParseError::InvalidStack)?;
    Ok(Some(stack))
}

fn strip_outer_braces(body: &str) -> &str {
    match body.strip_prefix('{').and_then(|b| b.strip_suffix('}')) {
        Some(inner) => inner,
        None => body,
    }
}

fn parse_fields(body: &str) -> Result<HashMap<String, Value>, ParseError> {
    let mut fields = HashMap::new();
    let mut depth: i64 = 0;

    for raw in body.lines() {
        let line = raw.trim();
        if depth > 0 {
            depth += brace_balance(line);
            continue;
        }
        let line = line.strip_suffix(',').unwrap_or(line).trim_end();
        if line.is_empty() {
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| ParseError::InvalidLine(line.to_string()))?;
        let key = parse_key(key.trim())?;
        let value = value.trim();

        let parsed = if value.starts_with('"') {
            Value::Text(parse_quoted(&key, value)?)
        } else if value.starts_with('{') {
            depth = brace_balance(value);
            Value::Table
        } else if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            Value::Number(value.to_string())
        } else {
            Value::Other(value.to_string())
        };

        if fields.insert(key.clone(), parsed).is_some() {
            return Err(ParseError::DuplicateField(key));
        }
    }

    if depth > 0 {
        return Err(ParseError::UnterminatedTable);
    }
    Ok(fields)
}

/// Accepts `name` and `[ "name" ]` key forms.
fn parse_key(key: &str) -> Result<String, ParseError> {
    if let Some(inner) = key.strip_prefix('[').and_then(|k| k.strip_suffix(']')) {
        let inner = inner.trim();
        if inner.starts_with('"') {
            return parse_quoted("key", inner);
        }
        return Ok(inner.to_string());
    }
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(ParseError::InvalidLine(key.to_string()));
    }
    Ok(key.to_string())
}

fn parse_quoted(field: &str, value: &str) -> Result<String, ParseError> {
    let bad = || ParseError::MalformedField {
        field: field.to_string(),
        value: value.to_string(),
    };

    let mut chars = value.chars();
    if chars.next() != Some('"') {
        return Err(bad());
    }

    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(bad()),
            Some('"') => break,
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(c) => out.push(c),
                None => return Err(bad()),
            },
            Some(c) => out.push(c),
        }
    }

    if chars.next().is_some() {
        return Err(bad());
    }
    Ok(out)
}

/// Net `{` minus `}` outside string literals.
fn brace_balance(line: &str) -> i64 {
    let mut balance = 0;
    let mut in_string = false;
    let mut escaped = false;
    for c in line.chars() {
        if in_string {
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => balance += 1,
            '}' => balance -= 1,
            _ => {}
        }
    }
    balance
}

fn take_text(fields: &mut HashMap<String, Value>, name: &'static str) -> Result<String, ParseError> {
    match fields.remove(name) {
        Some(Value::Text(s)) => Ok(s),
        Some(other) => Err(malformed(name, &other)),
        None => Err(ParseError::MissingField(name)),
    }
}

fn take_count(fields: &mut HashMap<String, Value>, name: &'static str) -> Result<u32, ParseError> {
    match fields.remove(name) {
        Some(Value::Number(n)) => n.parse::<u32>().map_err(|_| ParseError::MalformedField {
            field: name.to_string(),
            value: n,
        }),
        Some(other) => Err(malformed(name, &other)),
        None => Err(ParseError::MissingField(name)),
    }
}

fn malformed(field: &str, value: &Value) -> ParseError {
    let value = match value {
        Value::Text(s) => format!("{s:?}"),
        Value::Number(s) | Value::Other(s) => s.clone(),
        Value::Table => "{...}".to_string(),
    };
    ParseError::MalformedField {
        field: field.to_string(),
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REDSTONE: &str = "{\n  count = 10,\n  displayName = \"Redstone Dust\",\n  name = \"minecraft:redstone\",\n  maxCount = 64,\n}";

    #[test]
    fn nil_is_empty_slot() {
        assert_eq!(parse_item_detail("nil").unwrap(), None);
        assert_eq!(parse_item_detail("  nil\n").unwrap(), None);
    }

    #[test]
    fn parses_serialized_table() {
        let stack = parse_item_detail(REDSTONE).unwrap().unwrap();
        assert_eq!(stack.count(), 10);
        assert_eq!(stack.item().display_name(), "Redstone Dust");
        assert_eq!(stack.item().id(), "minecraft:redstone");
        assert_eq!(stack.item().max_count(), 64);
        assert_eq!(stack.item().nbt(), None);
    }

    #[test]
    fn parses_bare_pairs_in_any_order() {
        let reply = "maxCount = 1\nnbt = \"a1b2c3\"\nname = \"minecraft:iron_sword\"\ncount = 1\ndisplayName = \"Iron Sword\"";
        let stack = parse_item_detail(reply).unwrap().unwrap();
        assert_eq!(stack.item().id(), "minecraft:iron_sword");
        assert_eq!(stack.item().nbt(), Some("a1b2c3"));
    }

    #[test]
    fn skips_nested_tables_and_unknown_keys() {
        let reply = r#"{
  count = 3,
  damage = 0,
  displayName = "Oak Log",
  itemGroups = {},
  maxCount = 64,
  name = "minecraft:oak_log",
  tags = {
    [ "minecraft:logs" ] = true,
    [ "minecraft:logs_that_burn" ] = true,
  },
}"#;
        let stack = parse_item_detail(reply).unwrap().unwrap();
        assert_eq!(stack.count(), 3);
        assert_eq!(stack.item().id(), "minecraft:oak_log");
    }

    #[test]
    fn unescapes_strings() {
        let reply = "count = 1\nmaxCount = 1\nname = \"minecraft:written_book\"\ndisplayName = \"The \\\"Book\\\" \\\\ I\"";
        let stack = parse_item_detail(reply).unwrap().unwrap();
        assert_eq!(stack.item().display_name(), r#"The "Book" \ I"#);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let reply = "count = 1\nmaxCount = 64\nname = \"minecraft:dirt\"";
        assert_eq!(
            parse_item_detail(reply).unwrap_err(),
            ParseError::MissingField("displayName")
        );
    }

    #[test]
    fn malformed_numbers_are_errors() {
        let reply = "count = many\nmaxCount = 64\nname = \"minecraft:dirt\"\ndisplayName = \"Dirt\"";
        assert!(matches!(
            parse_item_detail(reply).unwrap_err(),
            ParseError::MalformedField { field, .. } if field == "count"
        ));

        let reply = "count = 1\nmaxCount = \"64\"\nname = \"minecraft:dirt\"\ndisplayName = \"Dirt\"";
        assert!(matches!(
            parse_item_detail(reply).unwrap_err(),
            ParseError::MalformedField { field, .. } if field == "maxCount"
        ));

        let reply = "count = 99999999999\nmaxCount = 64\nname = \"minecraft:dirt\"\ndisplayName = \"Dirt\"";
        assert!(parse_item_detail(reply).is_err());
    }

    #[test]
    fn count_above_max_is_an_error() {
        let reply = "count = 65\nmaxCount = 64\nname = \"minecraft:dirt\"\ndisplayName = \"Dirt\"";
        assert!(matches!(
            parse_item_detail(reply).unwrap_err(),
            ParseError::InvalidStack(_)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            parse_item_detail("attempt to call nil").unwrap_err(),
            ParseError::InvalidLine(_)
        ));
        assert!(parse_item_detail("").is_err());
        assert!(matches!(
            parse_item_detail("count = 1\ntags = {\n  a = 1,").unwrap_err(),
            ParseError::UnterminatedTable
        ));
        assert!(matches!(
            parse_item_detail("name = \"unterminated").unwrap_err(),
            ParseError::MalformedField { .. }
        ));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let reply = "count = 1\ncount = 2\nmaxCount = 64\nname = \"minecraft:dirt\"\ndisplayName = \"Dirt\"";
        assert_eq!(
            parse_item_detail(reply).unwrap_err(),
            ParseError::DuplicateField("count".to_string())
        );
    }

    #[test]
    fn converts_to_protocol_error() {
        let err: DomainError = ParseError::MissingField("count").into();
        assert!(matches!(err, DomainError::Protocol(msg) if msg.contains("count")));
    }
}
