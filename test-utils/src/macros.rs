//! Test macros for common testing patterns

/// Macro to assert an error contains a specific substring
#[macro_export]
macro_rules! assert_error_contains {
    ($result:expr, $expected:expr) => {{
        match $result {
            Ok(_) => panic!("Expected error containing '{}', but got Ok", $expected),
            Err(e) => {
                let error_str = format!("{}", e);
                if !error_str.contains($expected) {
                    panic!("Expected error to contain '{}', but got '{}'", $expected, error_str);
                }
            }
        }
    }};
}

/// Macro to assert a wallet balance breakdown field by field
#[macro_export]
macro_rules! assert_balance {
    ($wallet:expr, confirmed: $confirmed:expr, unconfirmed: $unconfirmed:expr $(,)?) => {{
        let balance = $wallet.get_balance().await.expect("balance");
        assert_eq!(balance.confirmed, $confirmed, "confirmed balance");
        assert_eq!(balance.unconfirmed, $unconfirmed, "unconfirmed balance");
    }};
}

/// Macro to test serde JSON round-trip serialization
#[macro_export]
macro_rules! test_serde_round_trip {
    ($value:expr) => {{
        let serialized = serde_json::to_string(&$value).expect("Failed to serialize");
        let deserialized = serde_json::from_str(&serialized).expect("Failed to deserialize");
        assert_eq!($value, deserialized, "Serde round-trip failed");
    }};
}

#[cfg(test)]
mod tests {
    use light_wallet::WalletBalance;
    use light_wallet::chain::BlockNotification;
    use light_wallet::error::WalletError;

    use crate::BlockBuilder;
    use light_wallet::types::Identity;

    #[test]
    fn test_error_contains_macro() {
        let result: Result<(), WalletError> = Err(WalletError::InsufficientFunds {
            requested: 10,
            available: 3,
        });
        assert_error_contains!(result, "requested 10");
    }

    #[test]
    #[should_panic(expected = "Expected error")]
    fn test_error_contains_macro_with_ok() {
        let result: Result<i32, String> = Ok(42);
        assert_error_contains!(result, "anything");
    }

    #[test]
    fn test_block_notification_serde() {
        let block: BlockNotification = BlockBuilder::new(2).reward_to(Identity::hash(b"me"), 5).build();
        test_serde_round_trip!(block);
        test_serde_round_trip!(WalletBalance::default());
    }
}
