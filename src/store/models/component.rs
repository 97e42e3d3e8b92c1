//! Inventory component model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    pub name: String,
    pub category: String,
    pub total_quantity: u32,
    pub available_quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Component {
    /// Units currently lent out
    pub fn borrowed(&self) -> u32 {
        self.total_quantity.saturating_sub(self.available_quantity)
    }

    /// `available <= total`; the lower bound is held by the type
    pub fn is_consistent(&self) -> bool {
        self.available_quantity <= self.total_quantity
    }
}

/// Input for adding a component to the inventory
#[derive(Debug, Clone)]
pub struct NewComponent {
    pub name: String,
    pub category: String,
    pub total_quantity: u32,
    pub description: Option<String>,
}

impl NewComponent {
    /// New stock starts fully available
    pub fn into_component(self) -> Component {
        Component {
            id: super::common::new_id("comp"),
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            total_quantity: self.total_quantity,
            available_quantity: self.total_quantity,
            description: self.description.filter(|d| !d.trim().is_empty()),
        }
    }
}
