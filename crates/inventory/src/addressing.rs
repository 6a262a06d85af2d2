//! Physical addressing shape of a warehouse: aisles, units and bins.
//!
//! Only the shape and its invariants live here. Nothing in this crate decides
//! which bin an item goes to.

use serde::{Deserialize, Serialize};

use warehouse_core::{DomainError, DomainResult};

use crate::item::{Item, ItemStack};

/// Slots in a container backing one bulk bin.
pub const BULK_SLOTS_PER_CONTAINER: u32 = 27;

/// Slots in a container backing one mixed bin.
pub const MIXED_SLOTS_PER_CONTAINER: usize = 27;

/// A bin holding a single item kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BulkBinRepr")]
pub struct BulkBin {
    item: Item,
    count: u64,
}

#[derive(Deserialize)]
struct BulkBinRepr {
    item: Item,
    count: u64,
}

impl TryFrom<BulkBinRepr> for BulkBin {
    type Error = DomainError;

    fn try_from(repr: BulkBinRepr) -> Result<Self, Self::Error> {
        BulkBin::new(repr.item, repr.count)
    }
}

impl BulkBin {
    /// Invariant: `1 <= count <= capacity`.
    pub fn new(item: Item, count: u64) -> DomainResult<Self> {
        let capacity = Self::capacity_for(&item);
        if count == 0 || count > capacity {
            return Err(DomainError::invariant(format!(
                "bulk bin of {} must hold 1..={capacity} items, got {count}",
                item.id()
            )));
        }
        Ok(Self { item, count })
    }

    pub fn capacity_for(item: &Item) -> u64 {
        u64::from(BULK_SLOTS_PER_CONTAINER) * u64::from(item.max_count())
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn capacity(&self) -> u64 {
        Self::capacity_for(&self.item)
    }
}

/// A bin holding a fixed number of slots of arbitrary items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MixedBinRepr")]
pub struct MixedBin {
    slots: Vec<Option<ItemStack>>,
}

#[derive(Deserialize)]
struct MixedBinRepr {
    slots: Vec<Option<ItemStack>>,
}

impl TryFrom<MixedBinRepr> for MixedBin {
    type Error = DomainError;

    fn try_from(repr: MixedBinRepr) -> Result<Self, Self::Error> {
        MixedBin::new(repr.slots)
    }
}

impl MixedBin {
    /// Invariant: exactly `MIXED_SLOTS_PER_CONTAINER` slots, at least one occupied.
    pub fn new(slots: Vec<Option<ItemStack>>) -> DomainResult<Self> {
        if slots.len() != MIXED_SLOTS_PER_CONTAINER {
            return Err(DomainError::invariant(format!(
                "mixed bin must have {MIXED_SLOTS_PER_CONTAINER} slots, got {}",
                slots.len()
            )));
        }
        if slots.iter().all(Option::is_none) {
            return Err(DomainError::invariant(
                "mixed bin must hold at least one stack; use an empty bin instead",
            ));
        }
        Ok(Self { slots })
    }

    pub fn slots(&self) -> &[Option<ItemStack>] {
        &self.slots
    }
}

/// One address unit of the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Bin {
    Empty,
    Bulk(BulkBin),
    Mixed(MixedBin),
}

impl Bin {
    pub fn bulk(item: Item, count: u64) -> DomainResult<Self> {
        BulkBin::new(item, count).map(Bin::Bulk)
    }

    pub fn mixed(slots: Vec<Option<ItemStack>>) -> DomainResult<Self> {
        MixedBin::new(slots).map(Bin::Mixed)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Bin::Empty)
    }

    /// Add `n` items to a bulk bin. Fails without change if over capacity or
    /// the bin is not bulk.
    pub fn deposit_bulk(&mut self, n: u64) -> DomainResult<()> {
        match self {
            Bin::Bulk(bulk) => {
                let next = bulk.count.checked_add(n).unwrap_or(u64::MAX);
                if next > bulk.capacity() {
                    return Err(DomainError::invariant(format!(
                        "bulk bin of {} cannot hold {next} items (capacity {})",
                        bulk.item.id(),
                        bulk.capacity()
                    )));
                }
                bulk.count = next;
                Ok(())
            }
            Bin::Empty | Bin::Mixed(_) => {
                Err(DomainError::invariant("deposit_bulk requires a bulk bin"))
            }
        }
    }

    /// Remove `n` items from a bulk bin; emptying it turns it into `Bin::Empty`.
    pub fn withdraw_bulk(&mut self, n: u64) -> DomainResult<()> {
        match self {
            Bin::Bulk(bulk) => {
                if n > bulk.count {
                    return Err(DomainError::invariant(format!(
                        "bulk bin of {} holds {} items, cannot withdraw {n}",
                        bulk.item.id(),
                        bulk.count
                    )));
                }
                bulk.count -= n;
                if bulk.count == 0 {
                    *self = Bin::Empty;
                }
                Ok(())
            }
            Bin::Empty | Bin::Mixed(_) => {
                Err(DomainError::invariant("withdraw_bulk requires a bulk bin"))
            }
        }
    }
}

/// A shelf unit: a non-empty column of bins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UnitRepr")]
pub struct Unit {
    bins: Vec<Bin>,
}

#[derive(Deserialize)]
struct UnitRepr {
    bins: Vec<Bin>,
}

impl TryFrom<UnitRepr> for Unit {
    type Error = DomainError;

    fn try_from(repr: UnitRepr) -> Result<Self, Self::Error> {
        Unit::new(repr.bins)
    }
}

impl Unit {
    pub fn new(bins: Vec<Bin>) -> DomainResult<Self> {
        if bins.is_empty() {
            return Err(DomainError::invariant("unit must contain at least one bin"));
        }
        Ok(Self { bins })
    }

    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    pub fn bin_mut(&mut self, index: usize) -> Option<&mut Bin> {
        self.bins.get_mut(index)
    }

    /// Swap in a new bin at `index`, returning the old one.
    pub fn replace_bin(&mut self, index: usize, bin: Bin) -> DomainResult<Bin> {
        let len = self.bins.len();
        let slot = self.bins.get_mut(index).ok_or_else(|| {
            DomainError::not_found(format!("bin #{index} (unit has {len} bins)"))
        })?;
        Ok(std::mem::replace(slot, bin))
    }
}

/// An aisle with units on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AisleRepr")]
pub struct Aisle {
    left: Vec<Unit>,
    right: Vec<Unit>,
}

#[derive(Deserialize)]
struct AisleRepr {
    left: Vec<Unit>,
    right: Vec<Unit>,
}

impl TryFrom<AisleRepr> for Aisle {
    type Error = DomainError;

    fn try_from(repr: AisleRepr) -> Result<Self, Self::Error> {
        Aisle::new(repr.left, repr.right)
    }
}

impl Aisle {
    /// Invariant: both sides have the same, non-zero number of units.
    pub fn new(left: Vec<Unit>, right: Vec<Unit>) -> DomainResult<Self> {
        if left.is_empty() {
            return Err(DomainError::invariant("aisle must have at least one unit per side"));
        }
        if left.len() != right.len() {
            return Err(DomainError::invariant(format!(
                "aisle sides must match: left has {}, right has {}",
                left.len(),
                right.len()
            )));
        }
        Ok(Self { left, right })
    }

    pub fn left(&self) -> &[Unit] {
        &self.left
    }

    pub fn right(&self) -> &[Unit] {
        &self.right
    }

    pub fn left_mut(&mut self) -> &mut [Unit] {
        &mut self.left
    }

    pub fn right_mut(&mut self) -> &mut [Unit] {
        &mut self.right
    }

    pub fn depth(&self) -> usize {
        self.left.len()
    }
}

/// The whole addressing model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WarehouseRepr")]
pub struct Warehouse {
    aisles: Vec<Aisle>,
    home_aisle: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WarehouseRepr {
    aisles: Vec<Aisle>,
    home_aisle: usize,
}

impl TryFrom<WarehouseRepr> for Warehouse {
    type Error = DomainError;

    fn try_from(repr: WarehouseRepr) -> Result<Self, Self::Error> {
        Warehouse::new(repr.aisles, repr.home_aisle)
    }
}

impl Warehouse {
    /// Invariants: at least one aisle; `home_aisle` indexes an existing aisle.
    pub fn new(aisles: Vec<Aisle>, home_aisle: usize) -> DomainResult<Self> {
        if aisles.is_empty() {
            return Err(DomainError::invariant("warehouse must have at least one aisle"));
        }
        check_home(home_aisle, aisles.len())?;
        Ok(Self { aisles, home_aisle })
    }

    pub fn aisles(&self) -> &[Aisle] {
        &self.aisles
    }

    pub fn aisle_mut(&mut self, index: usize) -> Option<&mut Aisle> {
        self.aisles.get_mut(index)
    }

    pub fn home_aisle(&self) -> usize {
        self.home_aisle
    }

    pub fn set_home_aisle(&mut self, home_aisle: usize) -> DomainResult<()> {
        check_home(home_aisle, self.aisles.len())?;
        self.home_aisle = home_aisle;
        Ok(())
    }

    pub fn push_aisle(&mut self, aisle: Aisle) {
        self.aisles.push(aisle);
    }
}

fn check_home(home_aisle: usize, aisle_count: usize) -> DomainResult<()> {
    if home_aisle >= aisle_count {
        return Err(DomainError::invariant(format!(
            "home aisle {home_aisle} out of range (warehouse has {aisle_count} aisles)"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn unit() -> Unit {
        Unit::new(vec![Bin::Empty, Bin::Empty]).unwrap()
    }

    fn aisle() -> Aisle {
        Aisle::new(vec![unit()], vec![unit()]).unwrap()
    }

    #[test]
    fn mixed_bin_with_all_slots_empty_fails() {
        let err = Bin::mixed(vec![None; MIXED_SLOTS_PER_CONTAINER]).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn mixed_bin_requires_fixed_size() {
        assert!(Bin::mixed(vec![Some(stack(redstone(), 1))]).is_err());
        let mut slots = vec![None; MIXED_SLOTS_PER_CONTAINER];
        slots[4] = Some(stack(redstone(), 1));
        assert!(Bin::mixed(slots).is_ok());
    }

    #[test]
    fn bulk_bin_over_capacity_fails() {
        let capacity = 27 * 64;
        assert!(Bin::bulk(redstone(), capacity).is_ok());
        assert!(matches!(
            Bin::bulk(redstone(), capacity + 1),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(Bin::bulk(redstone(), 0).is_err());
    }

    #[test]
    fn bulk_deposit_and_withdraw_keep_invariants() {
        let mut bin = Bin::bulk(redstone(), 10).unwrap();
        bin.deposit_bulk(20).unwrap();
        assert!(bin.deposit_bulk(27 * 64).is_err());
        match &bin {
            Bin::Bulk(b) => assert_eq!(b.count(), 30),
            other => panic!("expected bulk bin, got {other:?}"),
        }
        assert!(bin.withdraw_bulk(31).is_err());
        bin.withdraw_bulk(30).unwrap();
        assert!(bin.is_empty());
        assert!(bin.withdraw_bulk(1).is_err());
    }

    #[test]
    fn warehouse_with_zero_aisles_fails() {
        assert!(matches!(
            Warehouse::new(vec![], 0),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn home_aisle_out_of_range_fails() {
        assert!(Warehouse::new(vec![aisle(), aisle()], 2).is_err());
        let mut wh = Warehouse::new(vec![aisle(), aisle()], 1).unwrap();
        assert!(wh.set_home_aisle(5).is_err());
        assert_eq!(wh.home_aisle(), 1);
        wh.push_aisle(aisle());
        wh.set_home_aisle(2).unwrap();
    }

    #[test]
    fn aisle_sides_must_match() {
        assert!(Aisle::new(vec![], vec![]).is_err());
        assert!(Aisle::new(vec![unit()], vec![unit(), unit()]).is_err());
    }

    #[test]
    fn unit_must_not_be_empty() {
        assert!(Unit::new(vec![]).is_err());
    }

    #[test]
    fn replace_bin_checks_index() {
        let mut u = unit();
        let old = u.replace_bin(1, Bin::bulk(iron_ingot(), 5).unwrap()).unwrap();
        assert!(old.is_empty());
        assert!(matches!(
            u.replace_bin(9, Bin::Empty),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn invalid_warehouse_json_is_rejected() {
        let json = serde_json::to_value(Warehouse::new(vec![aisle()], 0).unwrap()).unwrap();
        let mut bad = json.clone();
        bad["homeAisle"] = serde_json::json!(3);
        assert!(serde_json::from_value::<Warehouse>(bad).is_err());

        let back: Warehouse = serde_json::from_value(json).unwrap();
        assert_eq!(back.aisles().len(), 1);
    }
}
