//! Weighted-average costing calculator
//!
//! Pure functions over stock balance values. The weighted-average
//! contract: every inbound movement re-blends the average cost; outbound
//! movements remove stock at the current average and never change it.
//!
//! Rounding discipline: quantities to 2 decimals, unit/average costs to
//! 4, monetary totals to 2, all round-half-up. Repeated small movements
//! reconcile with one large movement modulo rounding drift; drift is an
//! accepted limitation with no reconciliation pass.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{AppError, AppResult};
use crate::models::StockBalance;

/// Decimal places for on-hand quantities
pub const QUANTITY_DP: u32 = 2;
/// Decimal places for unit and average costs
pub const COST_DP: u32 = 4;
/// Decimal places for monetary totals
pub const VALUE_DP: u32 = 2;

/// Round a quantity to 2 decimals, half-up
pub fn round_quantity(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(QUANTITY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a unit or average cost to 4 decimals, half-up
pub fn round_cost(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(COST_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a monetary total to 2 decimals, half-up
pub fn round_value(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(VALUE_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Result of removing stock from a balance
#[derive(Debug, Clone)]
pub struct IssueOutcome {
    pub balance: StockBalance,
    /// quantity * average cost at removal time
    pub cost_of_removed: Decimal,
}

/// Result of setting a balance to an observed absolute count
#[derive(Debug, Clone)]
pub struct AdjustmentOutcome {
    pub balance: StockBalance,
    /// new quantity minus prior quantity (signed)
    pub quantity_delta: Decimal,
    /// quantity delta valued at the prior average cost (signed)
    pub value_delta: Decimal,
}

/// Apply an inbound movement, blending the average cost.
///
/// new_average = (old_qty * old_avg + qty * unit_cost) / new_qty,
/// guarded against a zero new quantity (average 0).
pub fn apply_receipt(balance: &StockBalance, quantity: Decimal, unit_cost: Decimal) -> StockBalance {
    let new_quantity = round_quantity(balance.quantity + quantity);

    let new_average = if new_quantity.is_zero() {
        Decimal::ZERO
    } else {
        round_cost(
            (balance.quantity * balance.average_cost + quantity * unit_cost) / new_quantity,
        )
    };

    let mut next = balance.clone();
    next.quantity = new_quantity;
    next.average_cost = new_average;
    next.total_value = round_value(new_quantity * new_average);
    next
}

/// Apply an outbound movement at the current average cost.
///
/// The removal is always valued at the balance's own average, never a
/// caller-supplied cost; the average of what remains is unchanged.
pub fn apply_issue(
    balance: &StockBalance,
    quantity: Decimal,
    allow_negative: bool,
) -> AppResult<IssueOutcome> {
    if quantity > balance.quantity && !allow_negative {
        return Err(AppError::InsufficientStock(format!(
            "requested {} but only {} on hand",
            quantity, balance.quantity
        )));
    }

    let new_quantity = round_quantity(balance.quantity - quantity);
    let cost_of_removed = round_value(quantity * balance.average_cost);

    let mut next = balance.clone();
    next.quantity = new_quantity;
    next.total_value = round_value(new_quantity * next.average_cost);

    Ok(IssueOutcome {
        balance: next,
        cost_of_removed,
    })
}

/// Set a balance to an observed absolute count.
///
/// The delta is valued at the prior average cost. The average is
/// preserved unless the count is zero: no inventory, no cost basis.
pub fn apply_absolute_adjustment(balance: &StockBalance, new_quantity: Decimal) -> AdjustmentOutcome {
    let new_quantity = round_quantity(new_quantity);
    let quantity_delta = round_quantity(new_quantity - balance.quantity);
    let value_delta = round_value(quantity_delta * balance.average_cost);

    let mut next = balance.clone();
    next.quantity = new_quantity;
    if new_quantity.is_zero() {
        next.average_cost = Decimal::ZERO;
    }
    next.total_value = round_value(new_quantity * next.average_cost);

    AdjustmentOutcome {
        balance: next,
        quantity_delta,
        value_delta,
    }
}
