//! Shared fixtures and proptest strategies for the model tests.

use proptest::prelude::*;
use warehouse_core::LocationId;

use crate::item::{Item, ItemStack};
use crate::location::{Processor, StorageLocation, Terminal};
use crate::recipe::{Recipe, RecipeItemSpecification, RecipeOutputSpecification};

pub fn location_id(s: &str) -> LocationId {
    LocationId::new(s).unwrap()
}

pub fn redstone() -> Item {
    Item::new("Redstone Dust", "minecraft:redstone", 64, None).unwrap()
}

pub fn iron_ingot() -> Item {
    Item::new("Iron Ingot", "minecraft:iron_ingot", 64, None).unwrap()
}

pub fn stack(item: Item, count: u32) -> ItemStack {
    ItemStack::new(item, count).unwrap()
}

/// A 27-slot chest holding `(slot_index, stack)` pairs.
pub fn chest(id: &str, contents: &[(usize, ItemStack)]) -> StorageLocation {
    let mut slots = vec![None; 27];
    for (idx, s) in contents {
        slots[*idx] = Some(s.clone());
    }
    StorageLocation::with_items(location_id(id), slots)
}

pub fn arb_item() -> impl Strategy<Value = Item> {
    (
        "[A-Z][a-z]{1,12}( [A-Z][a-z]{1,8})?",
        "minecraft:[a-z_]{1,16}",
        prop_oneof![Just(1u32), Just(16u32), Just(64u32)],
        proptest::option::of("[0-9a-f]{8,32}"),
    )
        .prop_map(|(name, id, max, nbt)| Item::new(name, id, max, nbt).unwrap())
}

pub fn arb_stack() -> impl Strategy<Value = ItemStack> {
    arb_item().prop_flat_map(|item| {
        let max = item.max_count();
        (Just(item), 1..=max).prop_map(|(item, count)| ItemStack::new(item, count).unwrap())
    })
}

/// Locations with interleaved empty and occupied slots.
pub fn arb_location() -> impl Strategy<Value = StorageLocation> {
    (
        "minecraft:(chest|barrel)_[0-9]{1,3}",
        prop::collection::vec(proptest::option::of(arb_stack()), 0..54),
    )
        .prop_map(|(id, slots)| StorageLocation::with_items(location_id(&id), slots))
}

pub fn arb_processor() -> impl Strategy<Value = Processor> {
    ("[a-z]{3,10}", arb_location(), arb_location())
        .prop_filter("buffers must be distinct", |(_, input, output)| input.id() != output.id())
        .prop_map(|(process, input, output)| Processor::new(process, input, output).unwrap())
}

pub fn arb_terminal() -> impl Strategy<Value = Terminal> {
    ("[a-z][a-z_]{0,9}", arb_location())
        .prop_map(|(name, storage)| Terminal::new(name, storage).unwrap())
}

fn arb_item_spec() -> impl Strategy<Value = RecipeItemSpecification> {
    ("minecraft:[a-z_]{1,16}", 1u32..=64)
        .prop_map(|(id, count)| RecipeItemSpecification::new(id, count).unwrap())
}

fn arb_output_spec() -> impl Strategy<Value = RecipeOutputSpecification> {
    (arb_item_spec(), 0u64..1_000, 0u64..1_000).prop_map(|(output, min, headroom)| {
        RecipeOutputSpecification::new(output, min, min + headroom).unwrap()
    })
}

pub fn arb_recipe() -> impl Strategy<Value = Recipe> {
    (
        "[a-z]{3,10}",
        prop::collection::vec(arb_item_spec(), 0..4),
        prop::collection::vec(arb_output_spec(), 0..4),
    )
        .prop_map(|(process, inputs, outputs)| Recipe::new(process, inputs, outputs).unwrap())
}
