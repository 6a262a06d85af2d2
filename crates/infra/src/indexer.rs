//! Refreshes the recorded contents of one location from its live peripheral.

use thiserror::Error;
use tracing::debug;

use warehouse_core::{DomainError, LocationId};
use warehouse_inventory::{ItemStack, StorageLocation};

use crate::controller::{
    parse_item_detail, parse_presence, parse_size, ChannelError, Controller, ControllerCommand,
    ParseError, MAX_SLOTS,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("{location}: {source}")]
    Channel {
        location: LocationId,
        #[source]
        source: ChannelError,
    },

    #[error("{location}: bad reply: {source}")]
    Reply {
        location: LocationId,
        #[source]
        source: ParseError,
    },

    #[error("{location} slot {slot}: bad item detail: {source}")]
    Slot {
        location: LocationId,
        /// 1-based, as sent on the wire.
        slot: usize,
        #[source]
        source: ParseError,
    },
}

impl IndexError {
    pub fn location(&self) -> &LocationId {
        match self {
            IndexError::Channel { location, .. }
            | IndexError::Reply { location, .. }
            | IndexError::Slot { location, .. } => location,
        }
    }

    /// Nothing further can be sent on this controller.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, IndexError::Channel { .. })
    }
}

impl From<IndexError> for DomainError {
    fn from(value: IndexError) -> Self {
        DomainError::protocol(value.to_string())
    }
}

/// Issues probe and indexing queries through one controller, strictly one at
/// a time (each call awaits its reply before the next is sent).
pub struct StorageIndexer<'a, C: ?Sized> {
    controller: &'a C,
}

impl<'a, C> StorageIndexer<'a, C>
where
    C: Controller + ?Sized,
{
    pub fn new(controller: &'a C) -> Self {
        Self { controller }
    }

    async fn run(&self, location: &LocationId, command: ControllerCommand) -> Result<String, IndexError> {
        self.controller
            .execute(command.expression())
            .await
            .map_err(|source| IndexError::Channel {
                location: location.clone(),
                source,
            })
    }

    /// Is the peripheral currently attached?
    pub async fn probe(&self, location: &LocationId) -> Result<bool, IndexError> {
        let reply = self
            .run(location, ControllerCommand::IsPresent(location.clone()))
            .await?;
        parse_presence(&reply).map_err(|source| IndexError::Reply {
            location: location.clone(),
            source,
        })
    }

    /// Read every slot of the peripheral: one size query, then one detail
    /// query per slot.
    pub async fn snapshot(&self, location: &LocationId) -> Result<Vec<Option<ItemStack>>, IndexError> {
        let reply = self
            .run(location, ControllerCommand::Size(location.clone()))
            .await?;
        let size = parse_size(&reply).map_err(|source| IndexError::Reply {
            location: location.clone(),
            source,
        })?;

        // Grows with each reply rather than trusting the reported size up front.
        let mut items = Vec::with_capacity(size.min(MAX_SLOTS));
        for wire_slot in 1..=size {
            let reply = self
                .run(
                    location,
                    ControllerCommand::ItemDetail {
                        location: location.clone(),
                        slot: wire_slot,
                    },
                )
                .await?;
            let slot = parse_item_detail(&reply).map_err(|source| IndexError::Slot {
                location: location.clone(),
                slot: wire_slot,
                source,
            })?;
            items.push(slot);
        }

        debug!(
            location = %location,
            slots = size,
            occupied = items.iter().filter(|s| s.is_some()).count(),
            "indexed location"
        );
        Ok(items)
    }

    /// Replace `location`'s recorded contents with a fresh snapshot. On error
    /// the previous contents are kept.
    pub async fn index(&self, location: &mut StorageLocation) -> Result<(), IndexError> {
        let items = self.snapshot(location.id()).await?;
        location.replace_items(items);
        Ok(())
    }
}
