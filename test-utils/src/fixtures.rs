//! Common test fixtures and constants

use light_wallet::chain::RewardSchedule;
use light_wallet::types::{Amount, Height};

/// Block reward paid by the default schedule before any halving
pub const INITIAL_BLOCK_REWARD: Amount = 1_750_000_000_000;

/// Base fee paid by the default schedule on every block
pub const BASE_FEE: Amount = 250_000_000_000;

/// Blocks between reward halvings in the default schedule
pub const HALVING_INTERVAL: Height = 10;

/// Reward schedule that halves the block reward every `halving_interval`
/// blocks while paying a constant base fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalvingRewardSchedule {
    pub initial_reward: Amount,
    pub base_fee: Amount,
    pub halving_interval: Height,
}

impl Default for HalvingRewardSchedule {
    fn default() -> Self {
        Self {
            initial_reward: INITIAL_BLOCK_REWARD,
            base_fee: BASE_FEE,
            halving_interval: HALVING_INTERVAL,
        }
    }
}

impl RewardSchedule for HalvingRewardSchedule {
    fn reward(&self, height: Height) -> (Amount, Amount) {
        let halvings = height.checked_div(self.halving_interval).unwrap_or(0);
        let block_reward = self.initial_reward.checked_shr(halvings).unwrap_or(0);
        (self.base_fee, block_reward)
    }
}

/// Schedule paying the same split on every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatRewardSchedule {
    pub base_fee: Amount,
    pub block_reward: Amount,
}

impl RewardSchedule for FlatRewardSchedule {
    fn reward(&self, _height: Height) -> (Amount, Amount) {
        (self.base_fee, self.block_reward)
    }
}

/// Total farmer income of the blocks at `heights`, excluding transaction fees.
pub fn funds_for_heights(schedule: &dyn RewardSchedule, heights: impl IntoIterator<Item = Height>) -> Amount {
    heights.into_iter().map(|height| schedule.total(height)).sum()
}
