//! Shared setup for the light-wallet integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use light_wallet::keys::{DerivedKeyChain, KeyedHashSigner, WalletSeed};
use light_wallet::{Amount, Identity, Wallet, WalletConfig};
use test_utils::{HalvingRewardSchedule, funds_for_heights};

pub fn schedule() -> HalvingRewardSchedule {
    HalvingRewardSchedule::default()
}

/// A wallet with a deterministic seed.
pub fn new_wallet(seed: u8, config: WalletConfig) -> Wallet {
    let seed = WalletSeed::new([seed; 32]);
    Wallet::new(config, Arc::new(DerivedKeyChain::new(seed)), Arc::new(KeyedHashSigner::new(&seed)))
        .expect("valid wallet config")
}

/// An identity no test wallet owns.
pub fn outsider() -> Identity {
    Identity::hash(b"outsider")
}

/// Check that nothing was created or lost: every farmed block paid `wallet`,
/// and `sent` has left it (reserved or confirmed).
pub async fn assert_conserved(wallet: &Wallet, sent: Amount) {
    let tip = wallet.ledger().tip().await.height;
    let received = funds_for_heights(&schedule(), 1..=tip);
    let balance = wallet.get_balance().await.unwrap();
    assert!(balance.confirmed + sent <= received, "{} plus {} sent exceeds {} received", balance, sent, received);
    assert_eq!(balance.unconfirmed + balance.immature + sent, received, "{} at height {}", balance, tip);
}
