//! Wire codec for the radio co-processor protocol.
//!
//! Packet format:
//! ```text
//! ┌──────────┬─────────────┬───────┬──────┬──────────────────┐
//! │ Kind (1B)│ PayloadLen  │ Class │  Id  │ Payload (N B)    │
//! │ 0x00/0x80│ (1B)        │ (1B)  │ (1B) │ positional, LE   │
//! └──────────┴─────────────┴───────┴──────┴──────────────────┘
//! ```
//!
//! Only the message subset this firmware actually consumes is decoded;
//! anything else is a hard [`ProtocolError::UnknownMessage`], because an
//! unexpected packet means the conversation has lost alignment.
//!
//! Multi-byte integers are little-endian.  Variable-length fields carry a
//! one-byte length prefix.

use crate::error::ProtocolError;

/// Packet header length on the wire.
pub const HEADER_LEN: usize = 4;

/// Maximum payload a single packet may declare.
pub const MAX_PAYLOAD_LEN: usize = 60;

/// Payload buffer sized for the largest packet we send or receive.
pub type FramePayload = heapless::Vec<u8, MAX_PAYLOAD_LEN>;

// ── Message classes ───────────────────────────────────────────

const CLASS_SYSTEM: u8 = 0x00;
const CLASS_ATTRIBUTES: u8 = 0x02;
const CLASS_CONNECTION: u8 = 0x03;
const CLASS_GAP: u8 = 0x06;

// ── Message ids (per class) ───────────────────────────────────

const ID_SYSTEM_BOOT: u8 = 0x00;
const ID_SYSTEM_ADDRESS_GET: u8 = 0x02;
const ID_ATTRIBUTES_WRITE: u8 = 0x00;
const ID_ATTRIBUTES_VALUE: u8 = 0x00;
const ID_CONNECTION_STATUS: u8 = 0x00;
const ID_CONNECTION_DISCONNECTED: u8 = 0x04;
const ID_GAP_SET_MODE: u8 = 0x01;
const ID_GAP_SET_ADV_PARAMETERS: u8 = 0x08;
const ID_GAP_SET_ADV_DATA: u8 = 0x09;

// ── GATT handles of the lock service characteristics ──────────

/// Peer-writable characteristic carrying tickets and requests.
pub const HANDLE_LOCK_RECEIVE: u16 = 0x0011;
/// Lock-writable characteristic carrying chunked responses.
pub const HANDLE_LOCK_TRANSMIT: u16 = 0x0014;

// ── GAP mode arguments ────────────────────────────────────────

/// General discoverable mode.
pub const GAP_DISCOVER_GENERAL: u8 = 2;
/// Undirected connectable mode.
pub const GAP_CONNECT_UNDIRECTED: u8 = 2;

// ── Connection status flags ───────────────────────────────────

const CONN_FLAG_CONNECTED: u8 = 0x01;
const CONN_FLAG_COMPLETED: u8 = 0x04;

/// Whether a connection-status event reports a fully established,
/// encryption-completed link.
pub const fn connection_established(flags: u8) -> bool {
    flags & (CONN_FLAG_CONNECTED | CONN_FLAG_COMPLETED)
        == (CONN_FLAG_CONNECTED | CONN_FLAG_COMPLETED)
}

// ── Packet header ─────────────────────────────────────────────

/// Direction/kind discriminator in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    /// Command (host→radio) or its response (radio→host).
    CommandResponse = 0x00,
    /// Unsolicited event from the radio.
    Event = 0x80,
}

impl TryFrom<u8> for PacketKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x00 => Ok(Self::CommandResponse),
            0x80 => Ok(Self::Event),
            _ => Err(ProtocolError::UnknownMessage {
                class: 0,
                id: value,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub kind: PacketKind,
    pub payload_len: u8,
    pub class: u8,
    pub id: u8,
}

impl PacketHeader {
    pub const fn to_bytes(self) -> [u8; HEADER_LEN] {
        [self.kind as u8, self.payload_len, self.class, self.id]
    }

    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Result<Self, ProtocolError> {
        let kind = PacketKind::try_from(bytes[0])?;
        if bytes[1] as usize > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::Oversize);
        }
        Ok(Self {
            kind,
            payload_len: bytes[1],
            class: bytes[2],
            id: bytes[3],
        })
    }
}

// ── Outbound commands ─────────────────────────────────────────

/// Largest variable-length field we place in a command.
pub const MAX_COMMAND_DATA: usize = 31;

/// The five radio commands this firmware issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCommand {
    /// Query the radio's public address.
    GetAddress,
    /// Configure advertising intervals and channel map.
    SetAdvParameters {
        interval_min: u16,
        interval_max: u16,
        channels: u8,
    },
    /// Install advertising data or the scan response payload.
    SetAdvData {
        scan_response: bool,
        data: heapless::Vec<u8, MAX_COMMAND_DATA>,
    },
    /// Enter discoverable + connectable mode (starts advertising).
    SetMode { discoverable: u8, connectable: u8 },
    /// Write a local GATT characteristic value (notifies the peer).
    WriteAttribute {
        handle: u16,
        offset: u8,
        data: heapless::Vec<u8, MAX_COMMAND_DATA>,
    },
}

impl RadioCommand {
    /// Encode into a header + payload ready for the framer.
    pub fn encode(&self) -> (PacketHeader, FramePayload) {
        let mut payload = FramePayload::new();
        let (class, id) = match self {
            Self::GetAddress => (CLASS_SYSTEM, ID_SYSTEM_ADDRESS_GET),
            Self::SetAdvParameters {
                interval_min,
                interval_max,
                channels,
            } => {
                let _ = payload.extend_from_slice(&interval_min.to_le_bytes());
                let _ = payload.extend_from_slice(&interval_max.to_le_bytes());
                let _ = payload.push(*channels);
                (CLASS_GAP, ID_GAP_SET_ADV_PARAMETERS)
            }
            Self::SetAdvData {
                scan_response,
                data,
            } => {
                let _ = payload.push(u8::from(*scan_response));
                let _ = payload.push(data.len() as u8);
                let _ = payload.extend_from_slice(data);
                (CLASS_GAP, ID_GAP_SET_ADV_DATA)
            }
            Self::SetMode {
                discoverable,
                connectable,
            } => {
                let _ = payload.push(*discoverable);
                let _ = payload.push(*connectable);
                (CLASS_GAP, ID_GAP_SET_MODE)
            }
            Self::WriteAttribute {
                handle,
                offset,
                data,
            } => {
                let _ = payload.extend_from_slice(&handle.to_le_bytes());
                let _ = payload.push(*offset);
                let _ = payload.push(data.len() as u8);
                let _ = payload.extend_from_slice(data);
                (CLASS_ATTRIBUTES, ID_ATTRIBUTES_WRITE)
            }
        };
        let header = PacketHeader {
            kind: PacketKind::CommandResponse,
            payload_len: payload.len() as u8,
            class,
            id,
        };
        (header, payload)
    }
}

// ── Inbound messages ──────────────────────────────────────────

/// Largest attribute-value fragment we accept in one event.
pub const MAX_VALUE_FRAGMENT: usize = 32;

/// The exact message subset this firmware consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioMessage {
    AddressResponse { address: [u8; 6] },
    AdvParametersResponse { result: u16 },
    AdvDataResponse { result: u16 },
    ModeResponse { result: u16 },
    WriteAttributeResponse { result: u16 },
    BootEvent,
    ConnectionStatusEvent { flags: u8 },
    DisconnectedEvent { reason: u16 },
    AttributeValueEvent {
        handle: u16,
        data: heapless::Vec<u8, MAX_VALUE_FRAGMENT>,
    },
}

impl RadioMessage {
    /// Decode a framed packet into a typed message.
    pub fn decode(header: &PacketHeader, payload: &[u8]) -> Result<Self, ProtocolError> {
        match (header.kind, header.class, header.id) {
            (PacketKind::CommandResponse, CLASS_SYSTEM, ID_SYSTEM_ADDRESS_GET) => {
                let address: [u8; 6] = payload
                    .get(..6)
                    .and_then(|b| b.try_into().ok())
                    .ok_or(ProtocolError::Truncated)?;
                Ok(Self::AddressResponse { address })
            }
            (PacketKind::CommandResponse, CLASS_GAP, ID_GAP_SET_ADV_PARAMETERS) => {
                Ok(Self::AdvParametersResponse {
                    result: read_u16(payload, 0)?,
                })
            }
            (PacketKind::CommandResponse, CLASS_GAP, ID_GAP_SET_ADV_DATA) => {
                Ok(Self::AdvDataResponse {
                    result: read_u16(payload, 0)?,
                })
            }
            (PacketKind::CommandResponse, CLASS_GAP, ID_GAP_SET_MODE) => Ok(Self::ModeResponse {
                result: read_u16(payload, 0)?,
            }),
            (PacketKind::CommandResponse, CLASS_ATTRIBUTES, ID_ATTRIBUTES_WRITE) => {
                Ok(Self::WriteAttributeResponse {
                    result: read_u16(payload, 0)?,
                })
            }
            // Boot carries version fields we have no use for.
            (PacketKind::Event, CLASS_SYSTEM, ID_SYSTEM_BOOT) => Ok(Self::BootEvent),
            (PacketKind::Event, CLASS_CONNECTION, ID_CONNECTION_STATUS) => {
                // connection(1) flags(1) address(6) addr_type(1) interval(2)
                // timeout(2) latency(2) bonding(1)
                let flags = *payload.get(1).ok_or(ProtocolError::Truncated)?;
                Ok(Self::ConnectionStatusEvent { flags })
            }
            (PacketKind::Event, CLASS_CONNECTION, ID_CONNECTION_DISCONNECTED) => {
                // connection(1) reason(2)
                Ok(Self::DisconnectedEvent {
                    reason: read_u16(payload, 1)?,
                })
            }
            (PacketKind::Event, CLASS_ATTRIBUTES, ID_ATTRIBUTES_VALUE) => {
                // connection(1) reason(1) handle(2) offset(2) value_len(1) value
                let handle = read_u16(payload, 2)?;
                let len = *payload.get(6).ok_or(ProtocolError::Truncated)? as usize;
                let value = payload
                    .get(7..7 + len)
                    .ok_or(ProtocolError::Truncated)?;
                let data = heapless::Vec::from_slice(value).map_err(|()| ProtocolError::Oversize)?;
                Ok(Self::AttributeValueEvent { handle, data })
            }
            _ => Err(ProtocolError::UnknownMessage {
                class: header.class,
                id: header.id,
            }),
        }
    }
}

fn read_u16(payload: &[u8], offset: usize) -> Result<u16, ProtocolError> {
    let bytes: [u8; 2] = payload
        .get(offset..offset + 2)
        .and_then(|b| b.try_into().ok())
        .ok_or(ProtocolError::Truncated)?;
    Ok(u16::from_le_bytes(bytes))
}

// ── Advertising payloads ──────────────────────────────────────

/// Readable identifier advertised in the scan response.
pub const DEVICE_NAME: &[u8; 8] = b"deadbolt";

/// Fixed advertising payload: flags + the lock service UUID.
pub const ADV_DATA: [u8; 21] = [
    0x02, 0x01, 0x06, // flags: LE general discoverable, no BR/EDR
    0x11, 0x07, // 17 bytes, complete 128-bit service UUID list
    0x9e, 0x5d, 0x10, 0xc6, 0x31, 0x8f, 0x44, 0x8a, 0x92, 0x0d, 0x6b, 0x7e, 0xa1, 0x5b, 0x2d,
    0x8c,
];

/// Build the scan response payload for the given radio address.
///
/// Layout: a manufacturer-specific field holding the address rendered as
/// `aa:bb:cc:dd:ee:ff` (most significant byte first), followed by the
/// complete local name.
pub fn scan_response_payload(address: &[u8; 6]) -> heapless::Vec<u8, MAX_COMMAND_DATA> {
    let mut out = heapless::Vec::new();
    let _ = out.push(18); // field length: type + 17 text bytes
    let _ = out.push(0xFF); // manufacturer-specific data
    for (i, byte) in address.iter().rev().enumerate() {
        if i > 0 {
            let _ = out.push(b':');
        }
        let _ = out.push(hex_digit(byte >> 4));
        let _ = out.push(hex_digit(byte & 0x0F));
    }
    let _ = out.push(DEVICE_NAME.len() as u8 + 1);
    let _ = out.push(0x09); // complete local name
    let _ = out.extend_from_slice(DEVICE_NAME);
    out
}

const fn hex_digit(nibble: u8) -> u8 {
    b"0123456789abcdef"[nibble as usize]
}
