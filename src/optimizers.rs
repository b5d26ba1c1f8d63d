use std::collections::HashMap;

/// Interface of the optimizer handles driven by the schedulers.
/// One optimizer manages one or more parameter groups, each with its own rate.
pub trait Optimizer {
    /// Current learning rate of every parameter group
    fn rates(&self) -> Vec<f64>;

    /// Overwrites the learning rate of every parameter group
    fn set_rates(&mut self, rates: &[f64]);

    /// Drops per-parameter state such as momentum buffers,
    /// requested by restart policies configured with `clear_state`
    fn clear_state(&mut self) {}
}

/// In-memory optimizer handle: per-group rates plus a per-parameter state store
#[derive(Debug, Clone, Default)]
pub struct ParamGroups {
    /// Learning rate of each parameter group
    rates: Vec<f64>,
    /// Optimizer state keyed by parameter name, e.g. momentum buffers
    state: HashMap<String, Vec<f64>>,
}

impl ParamGroups {
    pub fn new(rates: Vec<f64>) -> Self {
        ParamGroups {
            rates,
            state: HashMap::new(),
        }
    }

    /// Stores state for a named parameter, replacing any previous entry
    pub fn insert_state(&mut self, param: impl Into<String>, buffer: Vec<f64>) {
        self.state.insert(param.into(), buffer);
    }

    pub fn state(&self, param: &str) -> Option<&[f64]> {
        self.state.get(param).map(|buffer| buffer.as_slice())
    }

    pub fn state_len(&self) -> usize {
        self.state.len()
    }

    pub fn group_count(&self) -> usize {
        self.rates.len()
    }
}

impl Optimizer for ParamGroups {
    fn rates(&self) -> Vec<f64> {
        self.rates.clone()
    }

    fn set_rates(&mut self, rates: &[f64]) {
        self.rates.clear();
        self.rates.extend_from_slice(rates);
    }

    fn clear_state(&mut self) {
        self.state.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_groups_set_rates() {
        let mut groups = ParamGroups::new(vec![1e-4, 2e-4]);
        groups.set_rates(&[5e-5, 1e-4]);

        assert_eq!(groups.rates(), vec![5e-5, 1e-4]);
        assert_eq!(groups.group_count(), 2);
    }

    #[test]
    fn test_param_groups_clear_state() {
        let mut groups = ParamGroups::new(vec![1e-4]);
        groups.insert_state("conv_first.weight", vec![0.1, 0.2]);
        groups.insert_state("conv_first.bias", vec![0.3]);
        assert_eq!(groups.state_len(), 2);
        assert_eq!(groups.state("conv_first.bias"), Some(&[0.3][..]));

        groups.clear_state();

        assert_eq!(groups.state_len(), 0);
        assert_eq!(groups.rates(), vec![1e-4]);
    }
}
