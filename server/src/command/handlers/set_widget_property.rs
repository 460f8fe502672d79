//! Hardware request to change a display property of a widget
//!
//! Body: `<pin>\0<property>\0<value>`. Only virtual pins are addressable. When
//! no widget owns the pin (e.g. it sits behind a device selector) the value is
//! kept in the dashboard's pin-property cache instead.

use super::HardwareState;
use crate::model::{PropertyError, PropertyUpdatable, WidgetProperty};
use crate::session::SessionRegistry;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use widgetlink_shared::{now_ms, parse_pin, split3, Command, Message, PinParseError, PinType, Response};

#[derive(Error, Debug)]
pub enum SetPropertyError {
    #[error("expected 3 body fields, got {0}")]
    WrongFieldCount(usize),

    #[error("property name and value must not be empty")]
    EmptyField,

    #[error("unsupported property {0:?}")]
    UnsupportedProperty(String),

    #[error("invalid pin: {0}")]
    InvalidPin(#[from] PinParseError),

    #[error("widget {widget_id} rejected the value: {source}")]
    Rejected {
        widget_id: u64,
        #[source]
        source: PropertyError,
    },
}

/// What a well-formed request did to the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    /// Dashboard is inactive; nothing changed and nothing is answered
    Inactive,
    /// A widget took the new value
    Widget { dash_id: i32 },
    /// No widget on the pin; value cached for later
    Stored { dash_id: i32 },
}

pub struct SetWidgetPropertyLogic {
    registry: Arc<dyn SessionRegistry>,
}

impl SetWidgetPropertyLogic {
    pub fn new(registry: Arc<dyn SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Apply the request and produce the reply for the device, if any
    pub fn message_received(&self, state: &HardwareState, message: &Message) -> Option<Response> {
        let dash_id = match self.apply(state, &message.body) {
            Ok(Applied::Inactive) => return None,
            Ok(Applied::Widget { dash_id }) | Ok(Applied::Stored { dash_id }) => dash_id,
            Err(e) => {
                debug!("SetWidgetProperty {} from device {} refused: {}", message.id, state.device_id, e);
                return Some(Response::illegal_command_body(message.id));
            }
        };

        match self.registry.lookup(&state.user_key) {
            Some(session) => {
                session.send_to_apps(
                    Command::SetWidgetProperty,
                    message.id,
                    dash_id,
                    state.device_id,
                    &message.body,
                );
            }
            None => warn!("No session for {}, SetWidgetProperty not relayed", state.user_key),
        }

        Some(Response::ok(message.id))
    }

    fn apply(&self, state: &HardwareState, body: &str) -> Result<Applied, SetPropertyError> {
        let parts = split3(body);
        if parts.len() != 3 {
            return Err(SetPropertyError::WrongFieldCount(parts.len()));
        }
        let (pin_field, property_name, value) = (parts[0], parts[1], parts[2]);

        if property_name.is_empty() || value.is_empty() {
            return Err(SetPropertyError::EmptyField);
        }

        let mut dash = state.dash.write();
        if !dash.is_active {
            return Ok(Applied::Inactive);
        }

        let property: WidgetProperty = property_name
            .parse()
            .map_err(|_| SetPropertyError::UnsupportedProperty(property_name.to_string()))?;
        let pin = parse_pin(pin_field)?;
        let dash_id = dash.id;

        if let Some(widget) = dash.find_widget_by_pin(state.device_id, PinType::Virtual, pin) {
            widget
                .set_property(property, value)
                .map_err(|source| SetPropertyError::Rejected {
                    widget_id: widget.id,
                    source,
                })?;
            dash.touch(now_ms());
            return Ok(Applied::Widget { dash_id });
        }

        dash.put_pin_property(state.device_id, PinType::Virtual, pin, property, value);
        Ok(Applied::Stored { dash_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dashboard, PinBinding, PinPropertyKey, SharedDashboard, Widget, WidgetKind};
    use crate::session::{ChannelHandle, ConnectionId, Session, UserKey};
    use tokio::sync::mpsc;
    use widgetlink_shared::{Frame, ResponseCode};

    const DASH_ID: i32 = 1;
    const DEVICE_ID: i32 = 0;

    struct FakeRegistry {
        session: Option<Arc<Session>>,
    }

    impl SessionRegistry for FakeRegistry {
        fn lookup(&self, _user_key: &UserKey) -> Option<Arc<Session>> {
            self.session.clone()
        }
    }

    struct Fixture {
        logic: SetWidgetPropertyLogic,
        state: HardwareState,
        app_rx: mpsc::Receiver<Frame>,
    }

    impl Fixture {
        fn new(active: bool) -> Self {
            let mut dash = Dashboard::new(DASH_ID, "Home");
            dash.is_active = active;
            dash.widgets.push(Widget::new(
                10,
                DEVICE_ID,
                Some(PinBinding {
                    pin_type: PinType::Virtual,
                    pin: 5,
                }),
                WidgetKind::Slider { min: 0.0, max: 100.0 },
            ));
            dash.widgets.push(Widget::new(
                11,
                DEVICE_ID,
                Some(PinBinding {
                    pin_type: PinType::Digital,
                    pin: 7,
                }),
                WidgetKind::Button {
                    on_label: None,
                    off_label: None,
                },
            ));
            let dash: SharedDashboard = dash.into_shared();

            let user_key = UserKey::new("owner@example.com");
            let session = Arc::new(Session::new(user_key.clone()));
            let (tx, app_rx) = mpsc::channel(16);
            let addr = "127.0.0.1:9443".parse().expect("addr");
            session.add_app_channel(ChannelHandle::new(ConnectionId(1), addr, tx));

            Self {
                logic: SetWidgetPropertyLogic::new(Arc::new(FakeRegistry { session: Some(session) })),
                state: HardwareState {
                    user_key,
                    dash,
                    device_id: DEVICE_ID,
                },
                app_rx,
            }
        }

        fn send(&self, id: u16, body: &str) -> Option<Response> {
            self.logic
                .message_received(&self.state, &Message::new(Command::SetWidgetProperty, id, body))
        }

        fn broadcasts(&mut self) -> Vec<Frame> {
            let mut frames = Vec::new();
            while let Ok(frame) = self.app_rx.try_recv() {
                frames.push(frame);
            }
            frames
        }

        fn widget(&self, id: u64) -> Widget {
            let dash = self.state.dash.read();
            dash.widgets
                .iter()
                .find(|w| w.id == id)
                .cloned()
                .expect("widget")
        }

        fn pending(&self, pin: u8, property: WidgetProperty) -> Option<String> {
            let key = PinPropertyKey {
                device_id: DEVICE_ID,
                pin_type: PinType::Virtual,
                pin,
                property,
            };
            self.state.dash.read().pin_property(&key).map(str::to_string)
        }

        fn updated_at(&self) -> u64 {
            self.state.dash.read().updated_at
        }

        fn assert_untouched(&mut self) {
            assert!(self.broadcasts().is_empty(), "no broadcast expected");
            assert_eq!(self.updated_at(), 0);
            assert_eq!(self.state.dash.read().pin_properties().count(), 0);
            let slider = self.widget(10);
            assert_eq!(slider.label, None);
            assert_eq!(slider.color, 0);
        }
    }

    #[test]
    fn test_updates_bound_widget_and_broadcasts() {
        let mut fx = Fixture::new(true);

        let reply = fx.send(42, "5\0color\0#FF0000");

        assert_eq!(reply, Some(Response::ok(42)));
        assert_eq!(fx.widget(10).color, 0xFF0000FF);
        assert!(fx.updated_at() > 0);
        assert_eq!(
            fx.broadcasts(),
            vec![Frame::Message(Message::new(
                Command::SetWidgetProperty,
                42,
                "1-0\u{0}5\0color\0#FF0000"
            ))]
        );
    }

    #[test]
    fn test_unbound_pin_goes_to_pending_cache() {
        let mut fx = Fixture::new(true);

        let reply = fx.send(3, "9\0label\0Pump");

        assert_eq!(reply, Some(Response::ok(3)));
        assert_eq!(fx.pending(9, WidgetProperty::Label).as_deref(), Some("Pump"));
        assert_eq!(fx.updated_at(), 0);
        assert_eq!(fx.broadcasts().len(), 1);
    }

    #[test]
    fn test_only_virtual_pins_are_resolved() {
        let mut fx = Fixture::new(true);

        // The button sits on digital pin 7, so virtual pin 7 has no widget
        assert_eq!(fx.send(4, "7\0onLabel\0ON"), Some(Response::ok(4)));
        assert_eq!(fx.pending(7, WidgetProperty::OnLabel).as_deref(), Some("ON"));
        assert_eq!(fx.widget(11).kind, WidgetKind::Button { on_label: None, off_label: None });
        assert_eq!(fx.broadcasts().len(), 1);
    }

    #[test]
    fn test_pending_value_is_overwritten() {
        let mut fx = Fixture::new(true);
        fx.send(1, "9\0label\0first");
        fx.send(2, "9\0label\0second");
        assert_eq!(fx.pending(9, WidgetProperty::Label).as_deref(), Some("second"));
        assert_eq!(fx.broadcasts().len(), 2);
    }

    #[test]
    fn test_malformed_bodies_are_rejected() {
        let mut fx = Fixture::new(true);
        for body in ["", "5", "5\0color", "5\0\0#FF0000", "5\0color\0", "\0\0"] {
            let reply = fx.send(8, body);
            assert_eq!(reply, Some(Response::illegal_command_body(8)), "body {body:?}");
        }
        fx.assert_untouched();
    }

    #[test]
    fn test_unknown_property_is_rejected() {
        let mut fx = Fixture::new(true);
        assert_eq!(fx.send(7, "7\0bogusProp\0value"), Some(Response::illegal_command_body(7)));
        assert_eq!(fx.send(7, "5\0bogusProp\0value"), Some(Response::illegal_command_body(7)));
        assert_eq!(fx.send(7, "5\0Color\0#FF0000"), Some(Response::illegal_command_body(7)));
        fx.assert_untouched();
    }

    #[test]
    fn test_bad_pin_is_rejected() {
        let mut fx = Fixture::new(true);
        for body in ["abc\0color\0red", "\0color\0#FF0000", "256\0color\0#FF0000", "-1\0label\0x", "+5\0label\0x"] {
            let reply = fx.send(9, body);
            assert_eq!(reply.map(|r| r.code), Some(ResponseCode::IllegalCommandBody), "body {body:?}");
        }
        fx.assert_untouched();
    }

    #[test]
    fn test_widget_rejecting_value() {
        let mut fx = Fixture::new(true);
        assert_eq!(fx.send(5, "5\0max\0lots"), Some(Response::illegal_command_body(5)));
        assert_eq!(fx.send(6, "5\0onLabel\0ON"), Some(Response::illegal_command_body(6)));
        assert_eq!(fx.widget(10).kind, WidgetKind::Slider { min: 0.0, max: 100.0 });
        fx.assert_untouched();
    }

    #[test]
    fn test_inactive_dashboard_is_silent() {
        let mut fx = Fixture::new(false);
        assert_eq!(fx.send(1, "5\0color\0#FF0000"), None);
        assert_eq!(fx.send(2, "9\0label\0x"), None);
        assert_eq!(fx.send(3, "7\0bogusProp\0value"), None);
        assert_eq!(fx.send(4, "abc\0color\0red"), None);
        fx.assert_untouched();
    }

    #[test]
    fn test_malformed_body_rejected_even_when_inactive() {
        let mut fx = Fixture::new(false);
        assert_eq!(fx.send(1, "5\0color"), Some(Response::illegal_command_body(1)));
        fx.assert_untouched();
    }

    #[test]
    fn test_repeated_command_is_idempotent() {
        let mut fx = Fixture::new(true);
        fx.send(1, "5\0label\0Speed");
        let once = fx.widget(10);
        fx.send(2, "5\0label\0Speed");
        assert_eq!(fx.widget(10), once);
        assert_eq!(fx.widget(10).label.as_deref(), Some("Speed"));
        assert_eq!(fx.broadcasts().len(), 2);
    }

    #[test]
    fn test_value_may_contain_separator() {
        let mut fx = Fixture::new(true);
        assert_eq!(fx.send(1, "5\0label\0a\0b"), Some(Response::ok(1)));
        assert_eq!(fx.widget(10).label.as_deref(), Some("a\0b"));
    }

    #[test]
    fn test_missing_session_still_acknowledges() {
        let mut fx = Fixture::new(true);
        fx.logic = SetWidgetPropertyLogic::new(Arc::new(FakeRegistry { session: None }));
        assert_eq!(fx.send(1, "5\0label\0x"), Some(Response::ok(1)));
        assert_eq!(fx.widget(10).label.as_deref(), Some("x"));
        assert!(fx.broadcasts().is_empty());
    }
}
