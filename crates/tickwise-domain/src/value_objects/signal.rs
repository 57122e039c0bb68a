use crate::value_objects::action_type::ActionType;
use crate::value_objects::bar::Bar;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
}

impl SignalStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStrength::Weak => "WEAK",
            SignalStrength::Moderate => "MODERATE",
            SignalStrength::Strong => "STRONG",
        }
    }
}

/// Decision taken on the close of one bar. Derived data: it can always be recomputed from
/// the bars and the strategy parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub timestamp: i64,
    pub ticker: String,
    pub action: ActionType,
    pub price: f64,
    pub strength: SignalStrength,
    pub reason: String,
    pub strategy: String,
}

impl Signal {
    pub fn new(
        bar: &Bar,
        strategy: &str,
        action: ActionType,
        strength: SignalStrength,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: bar.timestamp,
            ticker: bar.symbol.clone(),
            action,
            price: bar.close,
            strength,
            reason: reason.into(),
            strategy: strategy.to_string(),
        }
    }

    pub fn hold(bar: &Bar, strategy: &str, reason: impl Into<String>) -> Self {
        Self::new(bar, strategy, ActionType::Hold, SignalStrength::Weak, reason)
    }

    pub fn is_actionable(&self) -> bool {
        self.action != ActionType::Hold
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {:.2} [{}] {} ({})",
            crate::value_objects::timestamp::format_timestamp(self.timestamp),
            self.ticker,
            self.action,
            self.price,
            self.strength.as_str(),
            self.reason,
            self.strategy
        )
    }
}
