//! Event vocabulary shared by every fragment.
//!
//! [`Event`] is a closed tagged union: the variant is the topic and its
//! field is the payload for that topic. Changing a payload shape breaks
//! every subscriber of that topic.

use marquee_core::UserRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Topic {
    UserLoggedIn,
    UserLoggedOut,
    Notification,
    SeatSelecting,
    SeatReserved,
    SeatReleased,
    SeatConflict,
    TicketBooked,
    BookingFailed,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::UserLoggedIn => "userLoggedIn",
            Topic::UserLoggedOut => "userLoggedOut",
            Topic::Notification => "notification",
            Topic::SeatSelecting => "seatSelecting",
            Topic::SeatReserved => "seatReserved",
            Topic::SeatReleased => "seatReleased",
            Topic::SeatConflict => "seatConflict",
            Topic::TicketBooked => "ticketBooked",
            Topic::BookingFailed => "bookingFailed",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

/// Payload of [`Topic::Notification`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
    #[serde(rename = "type")]
    pub severity: Severity,
}

impl Notice {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Success)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Warning)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Info)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Error)
    }
}

// Booking payloads. The bus carries these without looking inside.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatSelecting {
    pub seat_id: u32,
    pub user_id: String,
    pub timestamp: u64,
    pub expires_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatReserved {
    pub seat_id: u32,
    pub user_id: String,
    pub expires_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatReleased {
    pub seat_id: u32,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatConflict {
    pub seat_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketBooked {
    pub user_id: String,
    pub seats: Vec<u32>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingFailed {
    pub error_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload", rename_all = "camelCase")]
pub enum Event {
    UserLoggedIn(UserRecord),
    UserLoggedOut,
    Notification(Notice),
    SeatSelecting(SeatSelecting),
    SeatReserved(SeatReserved),
    SeatReleased(SeatReleased),
    SeatConflict(SeatConflict),
    TicketBooked(TicketBooked),
    BookingFailed(BookingFailed),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::UserLoggedIn(_) => Topic::UserLoggedIn,
            Event::UserLoggedOut => Topic::UserLoggedOut,
            Event::Notification(_) => Topic::Notification,
            Event::SeatSelecting(_) => Topic::SeatSelecting,
            Event::SeatReserved(_) => Topic::SeatReserved,
            Event::SeatReleased(_) => Topic::SeatReleased,
            Event::SeatConflict(_) => Topic::SeatConflict,
            Event::TicketBooked(_) => Topic::TicketBooked,
            Event::BookingFailed(_) => Topic::BookingFailed,
        }
    }
}

impl From<Notice> for Event {
    fn from(notice: Notice) -> Self {
        Event::Notification(notice)
    }
}
