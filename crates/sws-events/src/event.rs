use std::fmt;

use serde::{Deserialize, Serialize};
use sws_types::{MacAddr, ObjectId};

/// Classification of events. One callback slot exists per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    Object,
    Mac,
    Nat,
    Port,
    PortOperStatus,
    Packet,
    Device,
    Bfd,
}

impl EventKind {
    pub const ALL: [Self; 8] = [
        Self::Object,
        Self::Mac,
        Self::Nat,
        Self::Port,
        Self::PortOperStatus,
        Self::Packet,
        Self::Device,
        Self::Bfd,
    ];

    /// Stable numeric code, as written into record lines.
    pub fn code(self) -> u64 {
        match self {
            Self::Object => 0,
            Self::Mac => 1,
            Self::Nat => 2,
            Self::Port => 3,
            Self::PortOperStatus => 4,
            Self::Packet => 5,
            Self::Device => 6,
            Self::Bfd => 7,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Object => "object",
            Self::Mac => "mac",
            Self::Nat => "nat",
            Self::Port => "port",
            Self::PortOperStatus => "port_oper_status",
            Self::Packet => "packet",
            Self::Device => "device",
            Self::Bfd => "bfd",
        };
        f.write_str(s)
    }
}

/// Object lifecycle operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectOp {
    Create,
    Delete,
    Update,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacOp {
    Learn,
    Age,
    Move,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortOp {
    Add,
    Delete,
}

/// One MAC table notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacEvent {
    pub mac: MacAddr,
    pub vlan: u16,
    pub port: ObjectId,
    pub op: MacOp,
}

/// An event delivered through the notifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Object { id: ObjectId, op: ObjectOp },
    Mac { entries: Vec<MacEvent> },
    Nat { id: ObjectId, hit: bool },
    Port { port: ObjectId, op: PortOp },
    PortOperStatus { port: ObjectId, up: bool },
    Packet { port: ObjectId, data: Vec<u8> },
    Device { device: u16, up: bool },
    Bfd { session: ObjectId, up: bool },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Object { .. } => EventKind::Object,
            Self::Mac { .. } => EventKind::Mac,
            Self::Nat { .. } => EventKind::Nat,
            Self::Port { .. } => EventKind::Port,
            Self::PortOperStatus { .. } => EventKind::PortOperStatus,
            Self::Packet { .. } => EventKind::Packet,
            Self::Device { .. } => EventKind::Device,
            Self::Bfd { .. } => EventKind::Bfd,
        }
    }

    /// The object the event is about, or null.
    pub fn subject(&self) -> ObjectId {
        match self {
            Self::Object { id, .. } | Self::Nat { id, .. } => *id,
            Self::Port { port, .. }
            | Self::PortOperStatus { port, .. }
            | Self::Packet { port, .. } => *port,
            Self::Bfd { session, .. } => *session,
            Self::Mac { entries } => entries.first().map_or(ObjectId::NULL, |e| e.port),
            Self::Device { .. } => ObjectId::NULL,
        }
    }

    /// Human-readable `(name, value)` fields for audit logs.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Object { op, .. } => vec![("op", format!("{op:?}"))],
            Self::Mac { entries } => entries
                .iter()
                .map(|e| ("entry", format!("{:?}/{}/{}/{}", e.op, e.mac, e.vlan, e.port)))
                .collect(),
            Self::Nat { hit, .. } => vec![("hit", hit.to_string())],
            Self::Port { op, .. } => vec![("op", format!("{op:?}"))],
            Self::PortOperStatus { up, .. } | Self::Bfd { up, .. } => {
                vec![("up", up.to_string())]
            }
            Self::Packet { data, .. } => vec![("data", hex::encode(data))],
            Self::Device { device, up } => {
                vec![("device", device.to_string()), ("up", up.to_string())]
            }
        }
    }
}
