use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use warehouse_core::{DomainError, DomainResult, LocationId, SystemName};

use crate::location::{Processor, StorageLocation, Terminal};
use crate::recipe::Recipe;

/// A named storage system: everything one controller can reach.
///
/// Invariant: every location id (bulk storage, processor buffers, terminal
/// storage) appears at most once across all roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StorageSystemRepr")]
pub struct StorageSystem {
    name: SystemName,
    storage: Vec<StorageLocation>,
    processors: Vec<Processor>,
    recipes: Vec<Recipe>,
    terminals: Vec<Terminal>,
}

#[derive(Deserialize)]
struct StorageSystemRepr {
    name: SystemName,
    #[serde(default)]
    storage: Vec<StorageLocation>,
    #[serde(default)]
    processors: Vec<Processor>,
    #[serde(default)]
    recipes: Vec<Recipe>,
    #[serde(default)]
    terminals: Vec<Terminal>,
}

impl TryFrom<StorageSystemRepr> for StorageSystem {
    type Error = DomainError;

    fn try_from(repr: StorageSystemRepr) -> Result<Self, Self::Error> {
        let mut system = StorageSystem::new(repr.name);
        for location in repr.storage {
            system.add_storage(location)?;
        }
        for processor in repr.processors {
            system.add_processor(processor)?;
        }
        for terminal in repr.terminals {
            system.add_terminal(terminal)?;
        }
        system.recipes = repr.recipes;
        Ok(system)
    }
}

/// Entries marked for deletion by a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removals {
    pub storage: HashSet<LocationId>,
    /// Processors keyed by their input buffer id.
    pub processors: HashSet<LocationId>,
    /// Terminals keyed by their storage id.
    pub terminals: HashSet<LocationId>,
}

impl Removals {
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty() && self.processors.is_empty() && self.terminals.is_empty()
    }
}

/// One line of the aggregated inventory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntry {
    pub item_id: String,
    pub display_name: String,
    pub nbt: Option<String>,
    pub count: u64,
}

/// One output of a recipe whose live stock is below its trigger level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputShortfall {
    pub item_id: String,
    pub stock: u64,
    pub min_output_stock: u64,
    pub max_output_stock: u64,
    pub deficit: u64,
}

/// A (processor, recipe) pair that is eligible for triggering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockCandidate {
    pub process: String,
    pub processor_input: LocationId,
    pub processor_output: LocationId,
    pub recipe_index: usize,
    pub shortfalls: Vec<OutputShortfall>,
}

impl StorageSystem {
    pub fn new(name: SystemName) -> Self {
        Self {
            name,
            storage: Vec::new(),
            processors: Vec::new(),
            recipes: Vec::new(),
            terminals: Vec::new(),
        }
    }

    pub fn name(&self) -> &SystemName {
        &self.name
    }

    pub fn storage(&self) -> &[StorageLocation] {
        &self.storage
    }

    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    /// Every location id in use, in every role.
    pub fn location_ids(&self) -> impl Iterator<Item = &LocationId> {
        self.storage
            .iter()
            .map(StorageLocation::id)
            .chain(
                self.processors
                    .iter()
                    .flat_map(|p| [p.input_buffer().id(), p.output_buffer().id()]),
            )
            .chain(self.terminals.iter().map(|t| t.storage().id()))
    }

    pub fn is_registered(&self, id: &LocationId) -> bool {
        self.location_ids().any(|known| known == id)
    }

    fn ensure_unregistered(&self, id: &LocationId) -> DomainResult<()> {
        if self.is_registered(id) {
            return Err(DomainError::conflict(format!(
                "location {id} is already registered in system {}",
                self.name
            )));
        }
        Ok(())
    }

    pub fn add_storage(&mut self, location: StorageLocation) -> DomainResult<()> {
        self.ensure_unregistered(location.id())?;
        self.storage.push(location);
        Ok(())
    }

    pub fn add_processor(&mut self, processor: Processor) -> DomainResult<()> {
        self.ensure_unregistered(processor.input_buffer().id())?;
        self.ensure_unregistered(processor.output_buffer().id())?;
        self.processors.push(processor);
        Ok(())
    }

    pub fn add_terminal(&mut self, terminal: Terminal) -> DomainResult<()> {
        self.ensure_unregistered(terminal.storage().id())?;
        if self.terminal(terminal.name()).is_some() {
            return Err(DomainError::conflict(format!(
                "terminal {} already exists in system {}",
                terminal.name(),
                self.name
            )));
        }
        self.terminals.push(terminal);
        Ok(())
    }

    pub fn add_recipe(&mut self, recipe: Recipe) {
        self.recipes.push(recipe);
    }

    pub fn remove_recipe(&mut self, index: usize) -> DomainResult<Recipe> {
        if index >= self.recipes.len() {
            return Err(DomainError::not_found(format!(
                "recipe #{index} in system {}",
                self.name
            )));
        }
        Ok(self.recipes.remove(index))
    }

    pub fn terminal(&self, name: &str) -> Option<&Terminal> {
        self.terminals.iter().find(|t| t.name() == name)
    }

    /// Mutable access to a location in any role.
    pub fn location_mut(&mut self, id: &LocationId) -> Option<&mut StorageLocation> {
        if let Some(loc) = self.storage.iter_mut().find(|l| l.id() == id) {
            return Some(loc);
        }
        for processor in &mut self.processors {
            for buffer in processor.buffers_mut() {
                if buffer.id() == id {
                    return Some(buffer);
                }
            }
        }
        self.terminals
            .iter_mut()
            .map(Terminal::storage_mut)
            .find(|s| s.id() == id)
    }

    /// Apply a collected set of removals in one step.
    pub fn prune(&mut self, removals: &Removals) {
        self.storage.retain(|l| !removals.storage.contains(l.id()));
        self.processors
            .retain(|p| !removals.processors.contains(p.input_buffer().id()));
        self.terminals
            .retain(|t| !removals.terminals.contains(t.storage().id()));
    }

    /// Locations that count as stock: bulk storage plus processor outputs.
    fn stock_locations(&self) -> impl Iterator<Item = &StorageLocation> {
        self.storage
            .iter()
            .chain(self.processors.iter().map(Processor::output_buffer))
    }

    /// Aggregated counts per (item id, tag data), sorted by item id.
    pub fn inventory(&self) -> Vec<InventoryEntry> {
        let mut totals: BTreeMap<(String, Option<String>), InventoryEntry> = BTreeMap::new();
        for stack in self.stock_locations().flat_map(StorageLocation::occupied) {
            let item = stack.item();
            let key = (item.id().to_string(), item.nbt().map(str::to_string));
            totals
                .entry(key)
                .or_insert_with(|| InventoryEntry {
                    item_id: item.id().to_string(),
                    display_name: item.display_name().to_string(),
                    nbt: item.nbt().map(str::to_string),
                    count: 0,
                })
                .count += u64::from(stack.count());
        }
        totals.into_values().collect()
    }

    pub fn stock_of(&self, item_id: &str) -> u64 {
        self.stock_locations().map(|l| l.count_of(item_id)).sum()
    }

    /// Recipes whose outputs have fallen below their trigger level in the
    /// output buffer of a processor running the same process.
    pub fn eligible_recipes(&self) -> Vec<RestockCandidate> {
        let mut candidates = Vec::new();
        for processor in &self.processors {
            for (recipe_index, recipe) in self.recipes.iter().enumerate() {
                if recipe.process() != processor.process() {
                    continue;
                }
                let shortfalls: Vec<OutputShortfall> = recipe
                    .outputs()
                    .iter()
                    .filter_map(|spec| {
                        let item_id = spec.output().item_id();
                        let stock = processor.output_buffer().count_of(item_id);
                        spec.needs_restock(stock).then(|| OutputShortfall {
                            item_id: item_id.to_string(),
                            stock,
                            min_output_stock: spec.min_output_stock(),
                            max_output_stock: spec.max_output_stock(),
                            deficit: spec.deficit(stock),
                        })
                    })
                    .collect();
                if !shortfalls.is_empty() {
                    candidates.push(RestockCandidate {
                        process: processor.process().to_string(),
                        processor_input: processor.input_buffer().id().clone(),
                        processor_output: processor.output_buffer().id().clone(),
                        recipe_index,
                        shortfalls,
                    });
                }
            }
        }
        candidates
    }
}
