//! Controller protocol: the ordered command channel, typed wire commands and
//! the reply parser.
//!
//! The wire format carries no correlation id. A reply belongs to whichever
//! command was sent last, so everything here is built around "one command in
//! flight per controller".

pub mod channel;
pub mod command;
pub mod parser;

use async_trait::async_trait;

pub use channel::{
    BindError, ChannelConfig, ChannelDriver, ChannelError, CommandChannel, ControllerTransport,
    DriverExit, OutboundFrame, CLOSE_ALREADY_BOUND, CLOSE_COMMAND_TIMEOUT, CLOSE_UNKNOWN_SYSTEM,
};
pub use command::{parse_presence, parse_size, ControllerCommand, MAX_SLOTS};
pub use parser::{parse_item_detail, ParseError};

/// Something that can evaluate controller-side expressions, one at a time.
///
/// Implemented by [`CommandChannel`]; tests substitute scripted controllers.
#[async_trait]
pub trait Controller: Send + Sync {
    async fn execute(&self, expression: String) -> Result<String, ChannelError>;
}

#[async_trait]
impl<C> Controller for std::sync::Arc<C>
where
    C: Controller + ?Sized,
{
    async fn execute(&self, expression: String) -> Result<String, ChannelError> {
        (**self).execute(expression).await
    }
}
