use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceChange {
    pub change: f64,
    pub change_percent: f64,
}

/// Last observed price per symbol. Entries are created on first sight and never removed.
#[derive(Debug, Default)]
pub struct PriceChangeTracker {
    last_prices: Mutex<HashMap<String, f64>>,
}

impl PriceChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `new_price` and returns the percentage move from the previous observation.
    pub fn update(&self, symbol: &str, new_price: f64) -> f64 {
        self.observe(symbol, new_price).change_percent
    }

    pub fn observe(&self, symbol: &str, new_price: f64) -> PriceChange {
        let mut last_prices = self.last_prices.lock();
        let previous = last_prices.insert(symbol.to_string(), new_price);

        match previous {
            Some(prior) if prior != 0.0 => PriceChange {
                change: new_price - prior,
                change_percent: (new_price - prior) / prior * 100.0,
            },
            Some(prior) => PriceChange {
                change: new_price - prior,
                change_percent: 0.0,
            },
            None => PriceChange::default(),
        }
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.last_prices.lock().get(symbol).copied()
    }

    pub fn tracked_symbols(&self) -> usize {
        self.last_prices.lock().len()
    }
}
