//! Dashboards and the pending pin-property cache

use super::widget::{Widget, WidgetProperty};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use widgetlink_shared::PinType;

/// A dashboard shared by every connection that works on it
pub type SharedDashboard = Arc<RwLock<Dashboard>>;

/// Hardware device attached to a dashboard
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Device {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    pub token: String,
}

/// Key of a pending property value for a pin no widget currently owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinPropertyKey {
    pub device_id: i32,
    pub pin_type: PinType,
    pub pin: u8,
    pub property: WidgetProperty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dashboard {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "active")]
    pub is_active: bool,
    /// Milliseconds since epoch of the last widget change
    #[serde(skip)]
    pub updated_at: u64,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub widgets: Vec<Widget>,
    #[serde(skip)]
    pin_property_storage: BTreeMap<PinPropertyKey, String>,
}

impl Dashboard {
    #[cfg(test)]
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_active: false,
            updated_at: 0,
            devices: Vec::new(),
            widgets: Vec::new(),
            pin_property_storage: BTreeMap::new(),
        }
    }

    pub fn into_shared(self) -> SharedDashboard {
        Arc::new(RwLock::new(self))
    }

    /// Widget bound to the given device pin, if any
    pub fn find_widget_by_pin(&mut self, device_id: i32, pin_type: PinType, pin: u8) -> Option<&mut Widget> {
        self.widgets
            .iter_mut()
            .find(|w| w.is_bound_to(device_id, pin_type, pin))
    }

    /// Remember a property value for a pin without a widget, replacing any earlier value
    pub fn put_pin_property(
        &mut self,
        device_id: i32,
        pin_type: PinType,
        pin: u8,
        property: WidgetProperty,
        value: impl Into<String>,
    ) {
        let key = PinPropertyKey {
            device_id,
            pin_type,
            pin,
            property,
        };
        self.pin_property_storage.insert(key, value.into());
    }

    #[cfg(test)]
    pub fn pin_property(&self, key: &PinPropertyKey) -> Option<&str> {
        self.pin_property_storage.get(key).map(String::as_str)
    }

    /// All pending property values, ordered by key
    pub fn pin_properties(&self) -> impl Iterator<Item = (&PinPropertyKey, &str)> {
        self.pin_property_storage
            .iter()
            .map(|(key, value)| (key, value.as_str()))
    }

    /// Stamp a change; `updated_at` never moves backwards
    pub fn touch(&mut self, now_ms: u64) {
        self.updated_at = self.updated_at.max(now_ms);
    }
}
