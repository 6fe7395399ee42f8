//! Recipes: the resources a piece costs to build and refunds on removal.

use serde::{Deserialize, Serialize};

/// Separator between requirement entries in a config string.
const REQUIREMENT_SEPARATOR: &str = ";";
/// Separator between item and amount inside one entry.
const AMOUNT_SEPARATOR: &str = ",";

/// Identifier of a resource item (its item prefab name, e.g. `"Wood"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// An amount of a single resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceStack {
    pub resource: ResourceId,
    pub amount: u32,
}

impl ResourceStack {
    pub fn new(resource: impl Into<ResourceId>, amount: u32) -> Self {
        Self {
            resource: resource.into(),
            amount,
        }
    }
}

impl std::fmt::Display for ResourceStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.resource, self.amount)
    }
}

/// Ordered list of resources handed to the inventory/drop subsystem.
pub type ResourceList = Vec<ResourceStack>;

/// One line of a build recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub resource: ResourceId,
    pub amount: u32,
    /// Only recoverable requirements are refunded when the piece is removed.
    #[serde(default = "default_recover")]
    pub recover: bool,
}

fn default_recover() -> bool {
    true
}

impl Requirement {
    /// Create a recoverable requirement.
    pub fn new(resource: impl Into<ResourceId>, amount: u32) -> Self {
        Self {
            resource: resource.into(),
            amount,
            recover: true,
        }
    }

    /// Mark the requirement as consumed for good on build.
    pub fn non_recoverable(mut self) -> Self {
        self.recover = false;
        self
    }
}

/// An ordered list of requirements.
///
/// Order is significant: refunds are emitted in recipe order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Recipe {
    pub requirements: Vec<Requirement>,
}

impl Recipe {
    /// Create an empty recipe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a recipe of recoverable requirements from `(item, amount)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        Self {
            requirements: pairs
                .into_iter()
                .map(|(item, amount)| Requirement::new(item, amount))
                .collect(),
        }
    }

    /// Parse a config string of the form `Wood,10;Iron,1`.
    ///
    /// A missing or unparsable amount counts as 1. Blank entries are skipped,
    /// so a blank string yields an empty recipe.
    pub fn parse(config: &str) -> Self {
        let requirements = config
            .split(REQUIREMENT_SEPARATOR)
            .filter_map(|entry| {
                let mut values = entry.split(AMOUNT_SEPARATOR);
                let item = values.next()?.trim();
                if item.is_empty() {
                    return None;
                }
                let amount = values
                    .next()
                    .and_then(|amount| amount.trim().parse::<u32>().ok())
                    .unwrap_or(1);
                Some(Requirement::new(item, amount))
            })
            .collect();

        Self { requirements }
    }

    /// Format the recipe back into its config string form.
    pub fn to_config_string(&self) -> String {
        self.requirements
            .iter()
            .map(|r| format!("{}{}{}", r.resource, AMOUNT_SEPARATOR, r.amount))
            .collect::<Vec<_>>()
            .join(REQUIREMENT_SEPARATOR)
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Total amount of a resource across all entries.
    pub fn amount_of(&self, resource: &ResourceId) -> u32 {
        self.requirements
            .iter()
            .filter(|r| &r.resource == resource)
            .map(|r| r.amount)
            .sum()
    }

    /// Subtract `amount` of `resource`, clamping at zero.
    ///
    /// When a resource appears on several lines the subtraction is spread
    /// across them in order.
    pub fn subtract_clamped(&mut self, resource: &ResourceId, amount: u32) {
        let mut remaining = amount;
        for requirement in self
            .requirements
            .iter_mut()
            .filter(|r| &r.resource == resource)
        {
            if remaining == 0 {
                break;
            }
            let taken = requirement.amount.min(remaining);
            requirement.amount -= taken;
            remaining -= taken;
        }
    }

    /// Drop every entry for `resource`.
    pub fn remove_resource(&mut self, resource: &ResourceId) {
        self.requirements.retain(|r| &r.resource != resource);
    }

    /// The refundable part of this recipe: recoverable entries with a
    /// non-zero amount, in recipe order.
    pub fn refund(&self) -> ResourceList {
        self.requirements
            .iter()
            .filter(|r| r.recover && r.amount > 0)
            .map(|r| ResourceStack {
                resource: r.resource.clone(),
                amount: r.amount,
            })
            .collect()
    }
}

impl std::fmt::Display for Recipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_config_string())
    }
}
