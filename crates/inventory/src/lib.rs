//! Inventory model of a warehouse storage system.
//!
//! This crate contains the data model the controller core keeps in sync with
//! the physical world: items, storage locations, processors, terminals,
//! recipes, and the aisle/bin addressing shape. It is pure domain logic
//! (no IO, no async, no controller access).

pub mod addressing;
pub mod item;
pub mod location;
pub mod recipe;
pub mod system;

pub use addressing::{
    Aisle, Bin, BulkBin, MixedBin, Unit, Warehouse, BULK_SLOTS_PER_CONTAINER,
    MIXED_SLOTS_PER_CONTAINER,
};
pub use item::{Item, ItemStack};
pub use location::{Processor, StorageLocation, Terminal};
pub use recipe::{Recipe, RecipeItemSpecification, RecipeOutputSpecification};
pub use system::{InventoryEntry, OutputShortfall, Removals, RestockCandidate, StorageSystem};

#[cfg(test)]
pub(crate) mod test_support;
