//! Ordered resolution strategies: try each in turn, first defined result wins.

/// A named resolution strategy.
pub type Strategy<I, T> = fn(&I) -> Option<T>;

/// Ordered list of strategies for deriving a value from an input.
pub struct PriorityChain<I: ?Sized, T> {
    strategies: Vec<(&'static str, Strategy<I, T>)>,
}

impl<I: ?Sized, T> PriorityChain<I, T> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy after the existing ones.
    pub fn then(mut self, name: &'static str, strategy: Strategy<I, T>) -> Self {
        self.strategies.push((name, strategy));
        self
    }

    /// Run the strategies in order; returns the first result and the name of
    /// the strategy that produced it.
    pub fn resolve(&self, input: &I) -> Option<(&'static str, T)> {
        self.strategies
            .iter()
            .find_map(|(name, strategy)| strategy(input).map(|value| (*name, value)))
    }
}

impl<I: ?Sized, T> Default for PriorityChain<I, T> {
    fn default() -> Self {
        Self::new()
    }
}
