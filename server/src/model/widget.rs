//! Widgets and their display properties

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use widgetlink_shared::{PinType, BODY_SEPARATOR};

/// Display properties a device may change at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WidgetProperty {
    Label,
    Color,
    OnLabel,
    OffLabel,
    Labels,
    Min,
    Max,
    Step,
    IsOnPlay,
    Url,
}

impl WidgetProperty {
    pub const ALL: [WidgetProperty; 10] = [
        WidgetProperty::Label,
        WidgetProperty::Color,
        WidgetProperty::OnLabel,
        WidgetProperty::OffLabel,
        WidgetProperty::Labels,
        WidgetProperty::Min,
        WidgetProperty::Max,
        WidgetProperty::Step,
        WidgetProperty::IsOnPlay,
        WidgetProperty::Url,
    ];

    /// Name of the property on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            WidgetProperty::Label => "label",
            WidgetProperty::Color => "color",
            WidgetProperty::OnLabel => "onLabel",
            WidgetProperty::OffLabel => "offLabel",
            WidgetProperty::Labels => "labels",
            WidgetProperty::Min => "min",
            WidgetProperty::Max => "max",
            WidgetProperty::Step => "step",
            WidgetProperty::IsOnPlay => "isOnPlay",
            WidgetProperty::Url => "url",
        }
    }
}

/// The property whitelist: exact, case-sensitive wire names only
impl FromStr for WidgetProperty {
    type Err = PropertyError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        WidgetProperty::ALL
            .into_iter()
            .find(|p| p.as_str() == name)
            .ok_or_else(|| PropertyError::UnknownProperty(name.to_string()))
    }
}

impl fmt::Display for WidgetProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a widget refused a property update
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropertyError {
    #[error("Unknown property {0}")]
    UnknownProperty(String),

    #[error("Property {property} is not supported by {widget} widgets")]
    Unsupported {
        property: WidgetProperty,
        widget: &'static str,
    },

    #[error("Invalid value {value:?} for property {property}")]
    InvalidValue {
        property: WidgetProperty,
        value: String,
    },
}

/// Capability to accept a runtime display-property update
pub trait PropertyUpdatable {
    fn set_property(&mut self, property: WidgetProperty, value: &str) -> Result<(), PropertyError>;
}

/// Pin a widget is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct PinBinding {
    pub pin_type: PinType,
    pub pin: u8,
}

/// Widget-specific state
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetKind {
    Button {
        #[serde(default)]
        on_label: Option<String>,
        #[serde(default)]
        off_label: Option<String>,
    },
    Slider {
        min: f64,
        max: f64,
    },
    Gauge {
        min: f64,
        max: f64,
    },
    Step {
        min: f64,
        max: f64,
        step: f64,
    },
    Menu {
        #[serde(default)]
        labels: Vec<String>,
    },
    Player {
        #[serde(default)]
        is_on_play: bool,
    },
    Video {
        #[serde(default)]
        url: Option<String>,
    },
    ValueDisplay,
    DeviceSelector {
        #[serde(default)]
        device_ids: Vec<i32>,
    },
}

impl WidgetKind {
    pub fn name(&self) -> &'static str {
        match self {
            WidgetKind::Button { .. } => "button",
            WidgetKind::Slider { .. } => "slider",
            WidgetKind::Gauge { .. } => "gauge",
            WidgetKind::Step { .. } => "step",
            WidgetKind::Menu { .. } => "menu",
            WidgetKind::Player { .. } => "player",
            WidgetKind::Video { .. } => "video",
            WidgetKind::ValueDisplay => "value_display",
            WidgetKind::DeviceSelector { .. } => "device_selector",
        }
    }
}

impl PropertyUpdatable for WidgetKind {
    fn set_property(&mut self, property: WidgetProperty, value: &str) -> Result<(), PropertyError> {
        let widget = self.name();
        match (self, property) {
            (WidgetKind::Button { on_label, .. }, WidgetProperty::OnLabel) => {
                *on_label = Some(value.to_string());
            }
            (WidgetKind::Button { off_label, .. }, WidgetProperty::OffLabel) => {
                *off_label = Some(value.to_string());
            }
            (WidgetKind::Menu { labels }, WidgetProperty::Labels) => {
                *labels = value.split(BODY_SEPARATOR).map(str::to_string).collect();
            }
            (
                WidgetKind::Slider { min, .. }
                | WidgetKind::Gauge { min, .. }
                | WidgetKind::Step { min, .. },
                WidgetProperty::Min,
            ) => {
                *min = parse_number(property, value)?;
            }
            (
                WidgetKind::Slider { max, .. }
                | WidgetKind::Gauge { max, .. }
                | WidgetKind::Step { max, .. },
                WidgetProperty::Max,
            ) => {
                *max = parse_number(property, value)?;
            }
            (WidgetKind::Step { step, .. }, WidgetProperty::Step) => {
                let parsed = parse_number(property, value)?;
                if parsed <= 0.0 {
                    return Err(invalid(property, value));
                }
                *step = parsed;
            }
            (WidgetKind::Player { is_on_play }, WidgetProperty::IsOnPlay) => {
                *is_on_play = value.parse().map_err(|_| invalid(property, value))?;
            }
            (WidgetKind::Video { url }, WidgetProperty::Url) => {
                *url = Some(value.to_string());
            }
            _ => return Err(PropertyError::Unsupported { property, widget }),
        }
        Ok(())
    }
}

/// A dashboard element, optionally bound to a device pin
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Widget {
    pub id: u64,
    #[serde(default)]
    pub label: Option<String>,
    /// RGBA
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub device_id: i32,
    #[serde(default)]
    pub pin: Option<PinBinding>,
    #[serde(flatten)]
    pub kind: WidgetKind,
}

impl Widget {
    pub fn new(id: u64, device_id: i32, pin: Option<PinBinding>, kind: WidgetKind) -> Self {
        Self {
            id,
            label: None,
            color: 0,
            device_id,
            pin,
            kind,
        }
    }

    /// Whether this widget owns `(device_id, pin_type, pin)`
    pub fn is_bound_to(&self, device_id: i32, pin_type: PinType, pin: u8) -> bool {
        self.device_id == device_id
            && self.pin == Some(PinBinding { pin_type, pin })
    }
}

impl PropertyUpdatable for Widget {
    fn set_property(&mut self, property: WidgetProperty, value: &str) -> Result<(), PropertyError> {
        match property {
            WidgetProperty::Label => {
                self.label = Some(value.to_string());
                Ok(())
            }
            WidgetProperty::Color => {
                self.color = parse_color(value).ok_or_else(|| invalid(property, value))?;
                Ok(())
            }
            _ => self.kind.set_property(property, value),
        }
    }
}

/// `#RRGGBB` to RGBA with an opaque alpha channel
fn parse_color(value: &str) -> Option<u32> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let rgb = u32::from_str_radix(hex, 16).ok()?;
    Some((rgb << 8) | 0xFF)
}

fn parse_number(property: WidgetProperty, value: &str) -> Result<f64, PropertyError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| invalid(property, value))
}

fn invalid(property: WidgetProperty, value: &str) -> PropertyError {
    PropertyError::InvalidValue {
        property,
        value: value.to_string(),
    }
}
