// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Thing descriptions registered with the platform.
//!
//! A [`Thing`] is the platform-side representation of a device exposed by a connector.
//! The connector describes it once (see [`Thing::verify`] for the accepted shape) and
//! receives a platform-assigned id in return.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

static URL_CONFORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9\-_]{1,200}$").expect("id pattern compiles")
});

/// Availability of a thing as shown on the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusType {
    /// Not reported yet.
    #[default]
    Unknown,
    /// Reachable.
    Available,
    /// Not reachable.
    Unavailable,
}

/// Type of a property value or action parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueType {
    /// Numeric value.
    Number,
    /// Free text.
    #[default]
    String,
    /// `true` or `false`.
    Boolean,
}

/// A device description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thing {
    /// Platform-assigned id. Empty until the thing is created.
    #[serde(default)]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Manufacturer name.
    #[serde(default)]
    pub manufacturer: String,
    /// Icon hint for user interfaces.
    pub display_type: String,
    /// Component shown by default.
    pub main_component_id: String,
    /// Availability.
    #[serde(default)]
    pub status: StatusType,
    /// Functional units of the thing.
    pub components: Vec<Component>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<ThingAttribute>,
}

/// Key/value metadata stored with a thing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThingAttribute {
    /// Attribute key.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

/// A functional unit of a thing, such as a switch or a sensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Unique within the thing.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Semantic component type.
    pub component_type: String,
    /// Capability identifiers.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Readable values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
    /// Invocable operations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

/// A value exposed by a component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// Unique within the component (case-insensitive).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current value, always transported as text.
    #[serde(default)]
    pub value: String,
    /// Unit of measurement.
    #[serde(default)]
    pub unit: String,
    /// Value type.
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Time of the last change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    /// Semantic property type.
    #[serde(default)]
    pub property_type: String,
}

/// An operation exposed by a component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique within the component (case-insensitive).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Declared arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ActionParameter>,
}

/// Declared argument of an [`Action`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParameter {
    /// Argument name.
    pub name: String,
    /// Argument type.
    #[serde(rename = "type")]
    pub value_type: ValueType,
}

/// Reasons a thing description is rejected before it is sent to the platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThingError {
    /// `displayType` is empty.
    #[error("displayType must not be empty")]
    MissingDisplayType,

    /// The thing has no components.
    #[error("thing has no components")]
    NoComponents,

    /// `mainComponentId` is empty.
    #[error("mainComponentId must not be empty")]
    MissingMainComponent,

    /// `mainComponentId` names no component of the thing.
    #[error("main component '{0}' does not exist")]
    UnknownMainComponent(String),

    /// A component, property or action id is empty or contains characters outside `a-zA-Z0-9-_`.
    #[error("{kind} id '{id}' must match ^[a-zA-Z0-9-_]{{1,200}}$")]
    InvalidId {
        /// `component`, `property` or `action`.
        kind: &'static str,
        /// The offending id.
        id: String,
    },

    /// A component has no component type.
    #[error("component '{0}' has no component type")]
    MissingComponentType(String),

    /// A component has neither properties nor actions.
    #[error("component '{0}' has no properties or actions")]
    EmptyComponent(String),

    /// Two properties or two actions of one component share an id.
    #[error("{kind} id '{id}' is not unique within component '{component}'")]
    DuplicateId {
        /// `property` or `action`.
        kind: &'static str,
        /// Component holding the duplicates.
        component: String,
        /// The duplicated id.
        id: String,
    },
}

impl Thing {
    /// Check that the description is acceptable to the platform.
    pub fn verify(&self) -> Result<(), ThingError> {
        if self.display_type.is_empty() {
            return Err(ThingError::MissingDisplayType);
        }
        if self.components.is_empty() {
            return Err(ThingError::NoComponents);
        }
        if self.main_component_id.is_empty() {
            return Err(ThingError::MissingMainComponent);
        }

        for component in &self.components {
            component.verify()?;
        }

        if !self
            .components
            .iter()
            .any(|c| c.id == self.main_component_id)
        {
            return Err(ThingError::UnknownMainComponent(
                self.main_component_id.clone(),
            ));
        }

        Ok(())
    }
}

impl Component {
    /// Check the component and its properties and actions.
    pub fn verify(&self) -> Result<(), ThingError> {
        check_id("component", &self.id)?;

        if self.component_type.is_empty() {
            return Err(ThingError::MissingComponentType(self.id.clone()));
        }
        if self.properties.is_empty() && self.actions.is_empty() {
            return Err(ThingError::EmptyComponent(self.id.clone()));
        }

        let mut seen = HashSet::new();
        for property in &self.properties {
            check_id("property", &property.id)?;
            if !seen.insert(property.id.to_lowercase()) {
                return Err(ThingError::DuplicateId {
                    kind: "property",
                    component: self.id.clone(),
                    id: property.id.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        for action in &self.actions {
            check_id("action", &action.id)?;
            if !seen.insert(action.id.to_lowercase()) {
                return Err(ThingError::DuplicateId {
                    kind: "action",
                    component: self.id.clone(),
                    id: action.id.clone(),
                });
            }
        }

        Ok(())
    }
}

fn check_id(kind: &'static str, id: &str) -> Result<(), ThingError> {
    if URL_CONFORM.is_match(id) {
        Ok(())
    } else {
        Err(ThingError::InvalidId {
            kind,
            id: id.to_string(),
        })
    }
}
