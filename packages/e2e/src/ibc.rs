//! ICS-20 denom helpers

use crate::cosmos::Coin;
use sha2::{Digest, Sha256};

pub const TRANSFER_PORT: &str = "transfer";

/// Voucher denom of `base_denom` received over `port`/`channel`
///
/// `ibc/` followed by the uppercase hex SHA-256 of the denom trace path.
pub fn ibc_denom(port: &str, channel: &str, base_denom: &str) -> String {
    let trace = format!("{}/{}/{}", port, channel, base_denom);
    let hash = Sha256::digest(trace.as_bytes());
    format!("ibc/{}", hex::encode_upper(hash))
}

pub fn transfer_coin(port: &str, channel: &str, base_denom: &str, amount: u128) -> Coin {
    Coin::new(amount, &ibc_denom(port, channel, base_denom))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ibc_denom() {
        assert_eq!(
            ibc_denom("transfer", "channel-1", "ujkl"),
            "ibc/08D1E6BD9CB813AE1E5FF4C0EBC9F4B96B1F3D23DE75077EE6BE79127C497145"
        );
    }

    #[test]
    fn test_ibc_denom_depends_on_channel() {
        assert_ne!(
            ibc_denom("transfer", "channel-0", "ujkl"),
            ibc_denom("transfer", "channel-1", "ujkl")
        );
    }

    #[test]
    fn test_transfer_coin() {
        let coin = transfer_coin(TRANSFER_PORT, "channel-1", "ujkl", 250_000_000);
        assert_eq!(coin.amount, "250000000");
        assert!(coin.denom.starts_with("ibc/"));
        assert_eq!(coin.denom.len(), 4 + 64);
        assert_eq!(coin.to_string(), format!("250000000{}", coin.denom));
    }
}
