use serde::{Deserialize, Serialize};

use warehouse_core::{DomainError, DomainResult};

/// Unresolved item reference: an item id plus a quantity.
///
/// Resolved against observed inventory at use time, so it carries no `Item`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ItemSpecRepr")]
pub struct RecipeItemSpecification {
    item_id: String,
    count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemSpecRepr {
    item_id: String,
    count: u32,
}

impl TryFrom<ItemSpecRepr> for RecipeItemSpecification {
    type Error = DomainError;

    fn try_from(repr: ItemSpecRepr) -> Result<Self, Self::Error> {
        RecipeItemSpecification::new(repr.item_id, repr.count)
    }
}

impl RecipeItemSpecification {
    pub fn new(item_id: impl Into<String>, count: u32) -> DomainResult<Self> {
        let item_id = item_id.into();
        if item_id.trim().is_empty() {
            return Err(DomainError::malformed("recipe item id cannot be empty"));
        }
        if count == 0 {
            return Err(DomainError::malformed(format!(
                "recipe item {item_id}: count must be positive"
            )));
        }
        Ok(Self { item_id, count })
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Restocking trigger and target for one recipe output.
///
/// Stock below `min_output_stock` makes the recipe eligible; production aims
/// at `max_output_stock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "OutputSpecRepr")]
pub struct RecipeOutputSpecification {
    output: RecipeItemSpecification,
    min_output_stock: u64,
    max_output_stock: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputSpecRepr {
    output: RecipeItemSpecification,
    min_output_stock: u64,
    max_output_stock: u64,
}

impl TryFrom<OutputSpecRepr> for RecipeOutputSpecification {
    type Error = DomainError;

    fn try_from(repr: OutputSpecRepr) -> Result<Self, Self::Error> {
        RecipeOutputSpecification::new(repr.output, repr.min_output_stock, repr.max_output_stock)
    }
}

impl RecipeOutputSpecification {
    pub fn new(
        output: RecipeItemSpecification,
        min_output_stock: u64,
        max_output_stock: u64,
    ) -> DomainResult<Self> {
        if min_output_stock > max_output_stock {
            return Err(DomainError::malformed(format!(
                "output {}: minOutputStock ({min_output_stock}) exceeds maxOutputStock ({max_output_stock})",
                output.item_id()
            )));
        }
        Ok(Self {
            output,
            min_output_stock,
            max_output_stock,
        })
    }

    pub fn output(&self) -> &RecipeItemSpecification {
        &self.output
    }

    pub fn min_output_stock(&self) -> u64 {
        self.min_output_stock
    }

    pub fn max_output_stock(&self) -> u64 {
        self.max_output_stock
    }

    /// True when `stock` has fallen strictly below the trigger level.
    pub fn needs_restock(&self, stock: u64) -> bool {
        stock < self.min_output_stock
    }

    /// Distance from `stock` to the target level (zero when at or above it).
    pub fn deficit(&self, stock: u64) -> u64 {
        self.max_output_stock.saturating_sub(stock)
    }
}

/// Processing recipe: which process turns `inputs` into `outputs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecipeRepr")]
pub struct Recipe {
    process: String,
    inputs: Vec<RecipeItemSpecification>,
    outputs: Vec<RecipeOutputSpecification>,
}

#[derive(Deserialize)]
struct RecipeRepr {
    process: String,
    inputs: Vec<RecipeItemSpecification>,
    outputs: Vec<RecipeOutputSpecification>,
}

impl TryFrom<RecipeRepr> for Recipe {
    type Error = DomainError;

    fn try_from(repr: RecipeRepr) -> Result<Self, Self::Error> {
        Recipe::new(repr.process, repr.inputs, repr.outputs)
    }
}

impl Recipe {
    pub fn new(
        process: impl Into<String>,
        inputs: Vec<RecipeItemSpecification>,
        outputs: Vec<RecipeOutputSpecification>,
    ) -> DomainResult<Self> {
        let process = process.into();
        if process.trim().is_empty() {
            return Err(DomainError::malformed("recipe process cannot be empty"));
        }
        Ok(Self {
            process,
            inputs,
            outputs,
        })
    }

    pub fn process(&self) -> &str {
        &self.process
    }

    pub fn inputs(&self) -> &[RecipeItemSpecification] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[RecipeOutputSpecification] {
        &self.outputs
    }
}
