//! Typed constructors for the expressions sent to the controller.

use warehouse_core::LocationId;

use super::parser::ParseError;

/// The three queries the core ever sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerCommand {
    /// Is a peripheral with this id attached? Reply: `true` / `false`.
    IsPresent(LocationId),
    /// Slot count of an inventory peripheral. Reply: decimal integer.
    Size(LocationId),
    /// Contents of one slot (1-based). Reply: `nil` or a `key = value` block.
    ItemDetail { location: LocationId, slot: usize },
}

impl ControllerCommand {
    /// Lua expression evaluated by the controller.
    pub fn expression(&self) -> String {
        match self {
            ControllerCommand::IsPresent(id) => {
                format!("return peripheral.isPresent({})", lua_string(id.as_str()))
            }
            ControllerCommand::Size(id) => {
                format!("return peripheral.call({}, \"size\")", lua_string(id.as_str()))
            }
            ControllerCommand::ItemDetail { location, slot } => format!(
                "return textutils.serialize(peripheral.call({}, \"getItemDetail\", {slot}))",
                lua_string(location.as_str())
            ),
        }
    }
}

/// Interpret an existence-probe reply.
pub fn parse_presence(reply: &str) -> Result<bool, ParseError> {
    match reply.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ParseError::UnexpectedReply {
            expected: "true or false",
            reply: other.to_string(),
        }),
    }
}

/// Largest slot count a size reply may report. Real inventories stay far
/// below this; anything larger is treated as a malformed reply.
pub const MAX_SLOTS: usize = 4096;

/// Interpret a size-query reply.
pub fn parse_size(reply: &str) -> Result<usize, ParseError> {
    let trimmed = reply.trim();
    match trimmed.parse::<usize>() {
        Ok(size) if size <= MAX_SLOTS => Ok(size),
        Ok(_) => Err(ParseError::UnexpectedReply {
            expected: "a plausible slot count",
            reply: trimmed.to_string(),
        }),
        Err(_) => Err(ParseError::UnexpectedReply {
            expected: "a slot count",
            reply: trimmed.to_string(),
        }),
    }
}

fn lua_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
