use std::fmt;
use std::time::Instant;

/// RFID card UID as reported by the reader (4, 7 or 10 bytes for ISO 14443-A).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardUid(Vec<u8>);

impl CardUid {
    pub const MIN_LEN: usize = 4;
    pub const MAX_LEN: usize = 10;

    pub fn new(bytes: &[u8]) -> Result<Self, String> {
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&bytes.len()) {
            return Err(format!("card uid must be 4-10 bytes, got {}", bytes.len()));
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Parse an uppercase or lowercase hex string, optionally separated by `:`.
    pub fn from_hex(text: &str) -> Result<Self, String> {
        let digits: String = text.chars().filter(|c| *c != ':').collect();
        if !digits.is_ascii() || digits.len() % 2 != 0 {
            return Err(format!("invalid card uid '{}'", text));
        }
        let bytes = (0..digits.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|e| format!("invalid card uid '{}': {}", text, e))?;
        Self::new(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|b| format!("{:02X}", b)).collect();
        f.write_str(&parts.join(":"))
    }
}

/// Card presence change delivered by the RFID collaborator. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CardPresenceEvent {
    pub uid: CardUid,
    pub present: bool,
    pub timestamp: Instant,
}

impl CardPresenceEvent {
    pub fn arrived(uid: CardUid) -> Self {
        Self {
            uid,
            present: true,
            timestamp: Instant::now(),
        }
    }

    pub fn removed(uid: CardUid) -> Self {
        Self {
            uid,
            present: false,
            timestamp: Instant::now(),
        }
    }
}
