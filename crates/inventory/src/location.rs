use serde::{Deserialize, Serialize};

use warehouse_core::{DomainError, DomainResult, LocationId};

use crate::item::ItemStack;

/// One physically addressable container.
///
/// `items[i]` mirrors physical slot `i + 1`; `None` marks an empty slot. The
/// vector length is always the slot count last observed on the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    id: LocationId,
    items: Vec<Option<ItemStack>>,
}

impl StorageLocation {
    /// A location that has not been indexed yet (zero known slots).
    pub fn new(id: LocationId) -> Self {
        Self {
            id,
            items: Vec::new(),
        }
    }

    pub fn with_items(id: LocationId, items: Vec<Option<ItemStack>>) -> Self {
        Self { id, items }
    }

    pub fn id(&self) -> &LocationId {
        &self.id
    }

    pub fn items(&self) -> &[Option<ItemStack>] {
        &self.items
    }

    pub fn slot_count(&self) -> usize {
        self.items.len()
    }

    /// Replace the slot contents wholesale with a freshly indexed snapshot.
    pub fn replace_items(&mut self, items: Vec<Option<ItemStack>>) {
        self.items = items;
    }

    pub fn occupied(&self) -> impl Iterator<Item = &ItemStack> {
        self.items.iter().flatten()
    }

    /// Total number of items with `item_id` across all slots (any tag data).
    pub fn count_of(&self, item_id: &str) -> u64 {
        self.occupied()
            .filter(|s| s.item().id() == item_id)
            .map(|s| u64::from(s.count()))
            .sum()
    }
}

/// A conversion station with separate input and output staging buffers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ProcessorRepr")]
pub struct Processor {
    process: String,
    input_buffer: StorageLocation,
    output_buffer: StorageLocation,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessorRepr {
    process: String,
    input_buffer: StorageLocation,
    output_buffer: StorageLocation,
}

impl TryFrom<ProcessorRepr> for Processor {
    type Error = DomainError;

    fn try_from(repr: ProcessorRepr) -> Result<Self, Self::Error> {
        Processor::new(repr.process, repr.input_buffer, repr.output_buffer)
    }
}

impl Processor {
    pub fn new(
        process: impl Into<String>,
        input_buffer: StorageLocation,
        output_buffer: StorageLocation,
    ) -> DomainResult<Self> {
        let process = process.into();
        if process.trim().is_empty() {
            return Err(DomainError::malformed("process tag cannot be empty"));
        }
        if input_buffer.id() == output_buffer.id() {
            return Err(DomainError::malformed(format!(
                "processor buffers must be distinct locations, both are {}",
                input_buffer.id()
            )));
        }
        Ok(Self {
            process,
            input_buffer,
            output_buffer,
        })
    }

    pub fn process(&self) -> &str {
        &self.process
    }

    pub fn input_buffer(&self) -> &StorageLocation {
        &self.input_buffer
    }

    pub fn output_buffer(&self) -> &StorageLocation {
        &self.output_buffer
    }

    pub(crate) fn buffers_mut(&mut self) -> [&mut StorageLocation; 2] {
        [&mut self.input_buffer, &mut self.output_buffer]
    }
}

/// An access point bound to a staging location.
///
/// The staging location is never counted as bulk storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    name: String,
    storage: StorageLocation,
}

impl Terminal {
    pub fn new(name: impl Into<String>, storage: StorageLocation) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::malformed("terminal name cannot be empty"));
        }
        Ok(Self { name, storage })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> &StorageLocation {
        &self.storage
    }

    pub(crate) fn storage_mut(&mut self) -> &mut StorageLocation {
        &mut self.storage
    }
}
