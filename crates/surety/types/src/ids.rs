use serde::{Deserialize, Serialize};

/// Amount in the smallest currency unit.
pub type Amount = u128;

/// One unit-equivalent expressed in the smallest currency unit (10^18).
pub const UNIT: Amount = 1_000_000_000_000_000_000;

/// Opaque caller identity: an airline, a passenger, an oracle or the owner.
///
/// The ledger runtime attributes every operation to one of these.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Flight key: BLAKE3 digest of (airline, flight code, departure timestamp).
///
/// The registry owns flights under this key; the insurance ledger and oracle
/// consensus refer to them by the same key and never copy flight records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlightKey(pub [u8; 32]);

impl FlightKey {
    pub fn derive(airline: &AccountId, code: &str, timestamp: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"surety-flight-v1:");
        write_field(&mut hasher, airline.as_str().as_bytes());
        write_field(&mut hasher, code.as_bytes());
        hasher.update(&timestamp.to_le_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl std::fmt::Display for FlightKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", to_hex(&self.0[..8]))
    }
}

/// Oracle request key: BLAKE3 digest of (index, airline, flight code, timestamp).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestKey(pub [u8; 32]);

impl RequestKey {
    pub fn derive(index: u8, airline: &AccountId, code: &str, timestamp: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"surety-request-v1:");
        hasher.update(&[index]);
        write_field(&mut hasher, airline.as_str().as_bytes());
        write_field(&mut hasher, code.as_bytes());
        hasher.update(&timestamp.to_le_bytes());
        Self(*hasher.finalize().as_bytes())
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", to_hex(&self.0[..8]))
    }
}

// Length-prefixed so ("ab", "c") and ("a", "bc") never collide.
fn write_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
