//! Command and response codes carried in the first bytes of every frame

use std::fmt;

/// Command byte of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Response,
    Login,
    HardwareConnected,
    Ping,
    ActivateDashboard,
    DeactivateDashboard,
    SetWidgetProperty,
    Hardware,
    /// A code this build does not know; kept so the server can answer it
    Unknown(u8),
}

impl Command {
    pub fn code(self) -> u8 {
        match self {
            Command::Response => 0,
            Command::Login => 2,
            Command::HardwareConnected => 4,
            Command::Ping => 6,
            Command::ActivateDashboard => 7,
            Command::DeactivateDashboard => 8,
            Command::SetWidgetProperty => 19,
            Command::Hardware => 20,
            Command::Unknown(code) => code,
        }
    }
}

impl From<u8> for Command {
    fn from(code: u8) -> Self {
        match code {
            0 => Command::Response,
            2 => Command::Login,
            4 => Command::HardwareConnected,
            6 => Command::Ping,
            7 => Command::ActivateDashboard,
            8 => Command::DeactivateDashboard,
            19 => Command::SetWidgetProperty,
            20 => Command::Hardware,
            other => Command::Unknown(other),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Response => write!(f, "RESPONSE"),
            Command::Login => write!(f, "LOGIN"),
            Command::HardwareConnected => write!(f, "HARDWARE_CONNECTED"),
            Command::Ping => write!(f, "PING"),
            Command::ActivateDashboard => write!(f, "ACTIVATE_DASHBOARD"),
            Command::DeactivateDashboard => write!(f, "DEACTIVATE_DASHBOARD"),
            Command::SetWidgetProperty => write!(f, "SET_WIDGET_PROPERTY"),
            Command::Hardware => write!(f, "HARDWARE"),
            Command::Unknown(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

/// Status code of a response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    Ok,
    IllegalCommand,
    UserNotAuthenticated,
    NotAllowed,
    InvalidToken,
    IllegalCommandBody,
    ServerError,
    Unknown(u16),
}

impl ResponseCode {
    pub fn code(self) -> u16 {
        match self {
            ResponseCode::Ok => 200,
            ResponseCode::IllegalCommand => 2,
            ResponseCode::UserNotAuthenticated => 5,
            ResponseCode::NotAllowed => 6,
            ResponseCode::InvalidToken => 9,
            ResponseCode::IllegalCommandBody => 11,
            ResponseCode::ServerError => 19,
            ResponseCode::Unknown(code) => code,
        }
    }
}

impl From<u16> for ResponseCode {
    fn from(code: u16) -> Self {
        match code {
            200 => ResponseCode::Ok,
            2 => ResponseCode::IllegalCommand,
            5 => ResponseCode::UserNotAuthenticated,
            6 => ResponseCode::NotAllowed,
            9 => ResponseCode::InvalidToken,
            11 => ResponseCode::IllegalCommandBody,
            19 => ResponseCode::ServerError,
            other => ResponseCode::Unknown(other),
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCode::Ok => write!(f, "OK"),
            ResponseCode::IllegalCommand => write!(f, "ILLEGAL_COMMAND"),
            ResponseCode::UserNotAuthenticated => write!(f, "USER_NOT_AUTHENTICATED"),
            ResponseCode::NotAllowed => write!(f, "NOT_ALLOWED"),
            ResponseCode::InvalidToken => write!(f, "INVALID_TOKEN"),
            ResponseCode::IllegalCommandBody => write!(f, "ILLEGAL_COMMAND_BODY"),
            ResponseCode::ServerError => write!(f, "SERVER_ERROR"),
            ResponseCode::Unknown(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_command_codes() {
        assert_eq!(Command::from(19), Command::SetWidgetProperty);
        assert_eq!(Command::SetWidgetProperty.code(), 19);
        assert_eq!(Command::from(0), Command::Response);
    }

    #[test]
    fn test_unknown_command_keeps_code() {
        let cmd = Command::from(99);
        assert_eq!(cmd, Command::Unknown(99));
        assert_eq!(cmd.code(), 99);
    }

    #[test]
    fn test_response_codes() {
        assert_eq!(ResponseCode::from(200), ResponseCode::Ok);
        assert_eq!(ResponseCode::IllegalCommandBody.code(), 11);
        assert_eq!(ResponseCode::from(1234), ResponseCode::Unknown(1234));
    }
}
