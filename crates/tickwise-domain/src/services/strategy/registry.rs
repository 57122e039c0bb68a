use super::{
    BollingerParams, BollingerStrategy, MaCrossover, MaCrossoverParams, MacdStochastic,
    MacdStochasticParams, StrategyKind,
};
use crate::errors::TickwiseError;
use serde::{Deserialize, Serialize};

/// Strategy selection plus its parameters, tagged by `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum StrategyParams {
    MaCrossover(MaCrossoverParams),
    Bollinger(BollingerParams),
    MacdStochastic(MacdStochasticParams),
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams::MaCrossover(MaCrossoverParams::default())
    }
}

pub struct StrategyDescriptor {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub parameters: &'static [&'static str],
}

pub const STRATEGIES: &[StrategyDescriptor] = &[
    StrategyDescriptor {
        name: "ma_crossover",
        aliases: &["ma_cross", "ma", "golden_cross"],
        description: "fast/slow moving-average crossover filtered by RSI",
        parameters: &[
            "fast_period",
            "slow_period",
            "ma_kind",
            "rsi_period",
            "rsi_overbought",
            "rsi_oversold",
        ],
    },
    StrategyDescriptor {
        name: "bollinger",
        aliases: &["bollinger_bands", "bb"],
        description: "Bollinger band mean reversion or volume-confirmed breakout",
        parameters: &[
            "period",
            "multiplier",
            "rsi_period",
            "rsi_overbought",
            "rsi_oversold",
            "mode",
        ],
    },
    StrategyDescriptor {
        name: "macd_stochastic",
        aliases: &["macd_stoch", "macd"],
        description: "MACD signal-line cross confirmed by a stochastic %K/%D cross",
        parameters: &[
            "fast",
            "slow",
            "signal",
            "stoch_k",
            "stoch_d",
            "stoch_smooth",
            "stoch_overbought",
            "stoch_oversold",
        ],
    },
];

pub fn describe(name: &str) -> Result<&'static StrategyDescriptor, TickwiseError> {
    let key = name.trim().to_ascii_lowercase().replace('-', "_");
    STRATEGIES
        .iter()
        .find(|d| d.name == key || d.aliases.contains(&key.as_str()))
        .ok_or_else(|| {
            let known: Vec<&str> = STRATEGIES.iter().map(|d| d.name).collect();
            TickwiseError::UnknownStrategy(format!(
                "{} (known strategies: {})",
                name,
                known.join(", ")
            ))
        })
}

impl StrategyParams {
    pub fn defaults_for(name: &str) -> Result<Self, TickwiseError> {
        Ok(match describe(name)?.name {
            "bollinger" => StrategyParams::Bollinger(BollingerParams::default()),
            "macd_stochastic" => StrategyParams::MacdStochastic(MacdStochasticParams::default()),
            _ => StrategyParams::MaCrossover(MaCrossoverParams::default()),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyParams::MaCrossover(_) => "ma_crossover",
            StrategyParams::Bollinger(_) => "bollinger",
            StrategyParams::MacdStochastic(_) => "macd_stochastic",
        }
    }

    pub fn validate(&self) -> Result<(), TickwiseError> {
        match self {
            StrategyParams::MaCrossover(p) => p.validate(),
            StrategyParams::Bollinger(p) => p.validate(),
            StrategyParams::MacdStochastic(p) => p.validate(),
        }
    }

    /// Resolves the parameters into a ready evaluator. Done once per run.
    pub fn build(&self) -> Result<StrategyKind, TickwiseError> {
        self.validate()?;
        Ok(match self {
            StrategyParams::MaCrossover(p) => StrategyKind::MaCrossover(MaCrossover::new(p.clone())),
            StrategyParams::Bollinger(p) => {
                StrategyKind::Bollinger(BollingerStrategy::new(p.clone()))
            }
            StrategyParams::MacdStochastic(p) => {
                StrategyKind::MacdStochastic(MacdStochastic::new(p.clone()))
            }
        })
    }
}
