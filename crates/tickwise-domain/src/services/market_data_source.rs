use crate::errors::TickwiseError;
use crate::services::ohlcv::validate_bars;
use crate::value_objects::bar::Bar;

pub trait MarketDataSource {
    fn next_bar(&mut self) -> Option<Bar>;
}

pub struct VecBarSource {
    bars: Vec<Bar>,
    index: usize,
}

impl VecBarSource {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars, index: 0 }
    }

    /// Rejects a malformed series up front, before any bar is handed out.
    pub fn validated(ticker: &str, bars: Vec<Bar>) -> Result<Self, TickwiseError> {
        validate_bars(ticker, &bars)?;
        Ok(Self::new(bars))
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

impl MarketDataSource for VecBarSource {
    fn next_bar(&mut self) -> Option<Bar> {
        let bar = self.bars.get(self.index)?.clone();
        self.index += 1;
        Some(bar)
    }
}
