//! Ready-made specs for the console's guarded commands.

use crate::spec::{Action, DangerousActionSpec, Severity};
use botdeck_core::{total_exposure, Position};

pub const FLATTEN_PHRASE: &str = "FLATTEN";
pub const CANCEL_ALL_PHRASE: &str = "CANCEL ALL";
pub const KILL_PHRASE: &str = "KILL";
pub const CLOSE_PHRASE: &str = "CLOSE";

/// Flatten every open position. Shows the current dollar exposure.
pub fn flatten_positions(positions: &[Position], action: Action) -> DangerousActionSpec {
    let exposure = total_exposure(positions);
    DangerousActionSpec::new("Flatten All Positions", action)
        .description("Close every open position at market.")
        .consequence(format!(
            "{} open position(s) will be closed, current exposure ${:.2}",
            positions.len(),
            exposure
        ))
        .consequence("Realized P&L is locked in at current prices")
        .consequence("The bot keeps running and may open new positions")
        .confirm_label("Flatten Positions")
        .severity(Severity::Critical)
        .typed_phrase(FLATTEN_PHRASE)
}

pub fn cancel_all_orders(open_orders: usize, action: Action) -> DangerousActionSpec {
    DangerousActionSpec::new("Cancel All Orders", action)
        .description("Cancel every resting order.")
        .consequence(format!("{open_orders} open order(s) will be cancelled"))
        .consequence("Positions are not affected")
        .confirm_label("Cancel Orders")
        .severity(Severity::Danger)
        .typed_phrase(CANCEL_ALL_PHRASE)
}

pub fn kill_switch(action: Action) -> DangerousActionSpec {
    DangerousActionSpec::new("Activate Kill Switch", action)
        .description("Stop all trading immediately.")
        .consequence("All open orders are cancelled")
        .consequence("The bot stops and must be restarted manually")
        .confirm_label("Kill Bot")
        .severity(Severity::Critical)
        .typed_phrase(KILL_PHRASE)
}

pub fn close_position(position: &Position, action: Action) -> DangerousActionSpec {
    let market = position
        .market_question
        .clone()
        .unwrap_or_else(|| position.condition_id.clone());
    DangerousActionSpec::new("Close Position", action)
        .description(format!("Close the {} position in {market}.", position.side))
        .consequence(format!(
            "Size {} will be closed, exposure ${:.2}",
            position.size,
            position.exposure()
        ))
        .confirm_label("Close Position")
        .severity(Severity::Danger)
        .typed_phrase(CLOSE_PHRASE)
}
