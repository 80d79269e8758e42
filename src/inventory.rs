//! Pure inventory-adjustment rule.
//!
//! Called at most once per (booking, line item) pair; the caller's
//! paid-is-terminal guard enforces that, not this function.

/// Result of applying a decrement to a tier's remaining quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    pub new_quantity: u32,
    /// False when the tier held fewer units than requested and the quantity
    /// was clamped to zero instead of going negative.
    pub sufficient: bool,
}

pub fn apply_decrement(current: u32, requested: u32) -> Adjustment {
    Adjustment {
        new_quantity: current.saturating_sub(requested),
        sufficient: current >= requested,
    }
}
