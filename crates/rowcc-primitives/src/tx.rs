//! Transaction identifiers

use crate::error::PrimitiveError;
use std::fmt;
use std::str::FromStr;

/// Id reserved for the pipeline termination sentinel
pub const SENTINEL_TX_ID: TxId = TxId(0);

/// Transaction identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TxId(pub u32);

impl TxId {
    /// Create a new transaction ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Whether this id is the reserved sentinel id
    pub const fn is_sentinel(&self) -> bool {
        self.0 == SENTINEL_TX_ID.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl From<u32> for TxId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl FromStr for TxId {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_prefix('T').unwrap_or(s);
        digits
            .parse::<u32>()
            .map(TxId)
            .map_err(|_| PrimitiveError::InvalidId(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_id() {
        let id1 = TxId::new(1);
        let id2 = TxId::from(2u32);

        assert_eq!(id1.as_u32(), 1);
        assert_eq!(id2.as_u32(), 2);
        assert!(id1 < id2);
        assert_eq!(id1.to_string(), "T1");
    }

    #[test]
    fn test_sentinel() {
        assert!(SENTINEL_TX_ID.is_sentinel());
        assert!(!TxId::new(1).is_sentinel());
    }

    #[test]
    fn test_parse() {
        assert_eq!("T7".parse::<TxId>().unwrap(), TxId::new(7));
        assert_eq!("7".parse::<TxId>().unwrap(), TxId::new(7));
        assert!("Tx".parse::<TxId>().is_err());
    }
}
