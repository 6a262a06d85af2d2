use serde::{Deserialize, Serialize};

use warehouse_core::{DomainError, DomainResult};

/// An item kind as reported by the controller.
///
/// `id` is the stable equality key (e.g. `minecraft:iron_ingot`); `nbt` carries
/// opaque tag data that distinguishes otherwise-identical items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ItemRepr")]
pub struct Item {
    display_name: String,
    id: String,
    max_count: u32,
    nbt: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemRepr {
    display_name: String,
    id: String,
    max_count: u32,
    #[serde(default)]
    nbt: Option<String>,
}

impl TryFrom<ItemRepr> for Item {
    type Error = DomainError;

    fn try_from(repr: ItemRepr) -> Result<Self, Self::Error> {
        Item::new(repr.display_name, repr.id, repr.max_count, repr.nbt)
    }
}

impl Item {
    pub fn new(
        display_name: impl Into<String>,
        id: impl Into<String>,
        max_count: u32,
        nbt: Option<String>,
    ) -> DomainResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::malformed("item id cannot be empty"));
        }
        if max_count == 0 {
            return Err(DomainError::malformed(format!(
                "item {id}: maxCount must be positive"
            )));
        }
        Ok(Self {
            display_name: display_name.into(),
            id,
            max_count,
            nbt,
        })
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    pub fn nbt(&self) -> Option<&str> {
        self.nbt.as_deref()
    }
}

impl core::fmt::Display for Item {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// A stack of one item kind occupying one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ItemStackRepr")]
pub struct ItemStack {
    item: Item,
    count: u32,
}

#[derive(Deserialize)]
struct ItemStackRepr {
    item: Item,
    count: u32,
}

impl TryFrom<ItemStackRepr> for ItemStack {
    type Error = DomainError;

    fn try_from(repr: ItemStackRepr) -> Result<Self, Self::Error> {
        ItemStack::new(repr.item, repr.count)
    }
}

impl ItemStack {
    /// Invariant: `1 <= count <= item.max_count()`.
    pub fn new(item: Item, count: u32) -> DomainResult<Self> {
        check_count(&item, count)?;
        Ok(Self { item, count })
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn set_count(&mut self, count: u32) -> DomainResult<()> {
        check_count(&self.item, count)?;
        self.count = count;
        Ok(())
    }

    /// True when `other` can merge into this stack (same id and tag data).
    pub fn stacks_with(&self, other: &Item) -> bool {
        self.item.id == other.id && self.item.nbt == other.nbt
    }
}

fn check_count(item: &Item, count: u32) -> DomainResult<()> {
    if count == 0 || count > item.max_count {
        return Err(DomainError::invariant(format!(
            "stack of {} must hold 1..={} items, got {count}",
            item.id, item.max_count
        )));
    }
    Ok(())
}

impl core::fmt::Display for ItemStack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}x {}", self.count, self.item)
    }
}
