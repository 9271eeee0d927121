//! ATR-based trailing stop-loss placement.

use serde::Serialize;
use tracing::error;

use super::error::EngineError;
use super::stats::round_to;
use super::trade::TradeSide;

pub const DEFAULT_TRAILING_FACTOR: f64 = 2.0;
/// Long stops never sit above this fraction of entry.
const LONG_STOP_CEILING: f64 = 0.95;
/// Short stops never sit below this fraction of entry.
const SHORT_STOP_FLOOR: f64 = 1.05;

#[derive(Debug, Clone, PartialEq)]
pub struct StopRequest {
    pub entry_price: f64,
    pub current_price: f64,
    pub atr: f64,
    pub side: TradeSide,
    pub trailing_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicStop {
    pub stop_loss_price: f64,
    pub stop_distance: f64,
    pub stop_percentage: f64,
    pub atr_multiplier: f64,
    pub is_trailing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DynamicStop {
    fn fallback(request: &StopRequest, reason: String) -> Self {
        DynamicStop {
            stop_loss_price: round_to(static_limit(request.side, request.entry_price), 2),
            stop_distance: 0.0,
            stop_percentage: 0.0,
            atr_multiplier: request.trailing_factor,
            is_trailing: false,
            error: Some(reason),
        }
    }
}

fn static_limit(side: TradeSide, entry_price: f64) -> f64 {
    match side {
        TradeSide::Long => entry_price * LONG_STOP_CEILING,
        TradeSide::Short => entry_price * SHORT_STOP_FLOOR,
    }
}

/// Never fails; bad prices fall back to a fixed 5% stop with an error note.
pub fn dynamic_stop_loss(request: &StopRequest) -> DynamicStop {
    match try_dynamic_stop_loss(request) {
        Ok(stop) => stop,
        Err(e) => {
            error!("error calculating dynamic stop loss: {e}");
            DynamicStop::fallback(request, e.to_string())
        }
    }
}

pub fn try_dynamic_stop_loss(request: &StopRequest) -> Result<DynamicStop, EngineError> {
    let StopRequest {
        entry_price,
        current_price,
        atr,
        side,
        trailing_factor,
    } = *request;

    if !(current_price.is_finite() && current_price > 0.0) {
        return Err(EngineError::computation(
            "dynamic stop",
            format!("current price must be positive, got {current_price}"),
        ));
    }
    if !(entry_price.is_finite() && atr.is_finite() && trailing_factor.is_finite()) {
        return Err(EngineError::computation(
            "dynamic stop",
            "entry price, atr and trailing factor must be finite",
        ));
    }

    let offset = atr * trailing_factor;
    let limit = static_limit(side, entry_price);
    let (basic, trailing, stop) = match side {
        TradeSide::Long => {
            let basic = entry_price - offset;
            let trailing = current_price - offset;
            (basic, trailing, basic.max(trailing).min(limit))
        }
        TradeSide::Short => {
            let basic = entry_price + offset;
            let trailing = current_price + offset;
            (basic, trailing, basic.min(trailing).max(limit))
        }
    };

    let distance = (current_price - stop).abs();
    Ok(DynamicStop {
        stop_loss_price: round_to(stop, 2),
        stop_distance: round_to(distance, 2),
        stop_percentage: round_to(distance / current_price * 100.0, 2),
        atr_multiplier: trailing_factor,
        is_trailing: trailing != basic,
        error: None,
    })
}
