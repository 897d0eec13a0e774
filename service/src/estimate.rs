//! Local reward estimation.
//!
//! Mirrors the program's published formulas so the gateway can overlay a
//! pending-rewards figure on polled account state between on-chain
//! recalculations.  These are estimates, never authoritative: the record
//! they land in is tagged `Polled`, and the next claim or sync replaces
//! them with ledger truth.

use hatm_program_client::accounts::{GlobalState, UserInfo};

/// Seconds per reward accrual day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Basis-point denominator (10_000 bps = 100%).
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Reward accrued by `staked` base units over `elapsed_secs` at
/// `daily_rate_bps` basis points per day.
///
/// All arithmetic widens to u128 and saturates to zero on the (impossible
/// in practice) overflow paths, matching the program's own checked math.
pub fn accrued_reward(staked: u64, elapsed_secs: u64, daily_rate_bps: u64) -> u64 {
    let daily = (staked as u128)
        .checked_mul(daily_rate_bps as u128)
        .unwrap_or(0)
        .checked_div(BPS_DENOMINATOR as u128)
        .unwrap_or(0);
    let reward = daily
        .checked_mul(elapsed_secs as u128)
        .unwrap_or(0)
        .checked_div(SECONDS_PER_DAY as u128)
        .unwrap_or(0);
    u64::try_from(reward).unwrap_or(u64::MAX)
}

/// Referral reward for a referred stake of `amount` at
/// `referral_rate_bps`.
pub fn referral_reward(amount: u64, referral_rate_bps: u64) -> u64 {
    let reward = (amount as u128)
        .checked_mul(referral_rate_bps as u128)
        .unwrap_or(0)
        .checked_div(BPS_DENOMINATOR as u128)
        .unwrap_or(0);
    u64::try_from(reward).unwrap_or(u64::MAX)
}

/// Annualized percentage yield implied by a daily rate in basis points.
pub fn apy_percent(daily_rate_bps: u64) -> f64 {
    (daily_rate_bps as f64 / 100.0) * 365.0
}

/// Estimated pending rewards for `user`: on-chain accrued figure plus the
/// accrual since the last stake.
pub fn estimated_pending_rewards(user: &UserInfo, state: &GlobalState, now: i64) -> u64 {
    if user.staked_amount == 0 || now <= user.last_stake_time {
        return user.rewards;
    }
    let elapsed = now.saturating_sub(user.last_stake_time) as u64;
    user.rewards
        .saturating_add(accrued_reward(user.staked_amount, elapsed, state.reward_rate))
}

/// Seconds until the position unlocks; `None` once unlocked or when
/// nothing is staked.
pub fn time_until_unlock(user: &UserInfo, state: &GlobalState, now: i64) -> Option<i64> {
    if user.staked_amount == 0 {
        return None;
    }
    let unlock_at = user.last_stake_time.saturating_add(state.unlock_duration);
    if now < unlock_at {
        Some(unlock_at.saturating_sub(now))
    } else {
        None
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
