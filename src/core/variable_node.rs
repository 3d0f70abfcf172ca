use crate::core::{
    message::Message,
    node::{Node, Ports},
};
use ndarray::Array1;

/// A discrete variable of a factor graph together with its edge storage
#[derive(Debug, Clone)]
pub struct VariableNode {
    id: usize,
    name: String,
    dim: usize,
    observed: Option<usize>,
    enabled: bool,
    pub(crate) ports: Ports,
}

impl VariableNode {
    #[inline(always)]
    pub(super) fn new_disconnected(id: usize, name: String, dim: usize) -> Self {
        VariableNode {
            id,
            name,
            dim,
            observed: None,
            enabled: true,
            ports: Ports::default(),
        }
    }

    /// Index of a variable in the order of registration
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Name of a variable
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of states of a variable
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The observed state, if any
    #[inline]
    pub fn observed(&self) -> Option<usize> {
        self.observed
    }

    /// Messages received from adjacent factors
    #[inline]
    pub fn incoming(&self) -> &[Array1<f64>] {
        self.ports.incoming()
    }

    /// Messages prepared for adjacent factors
    #[inline]
    pub fn outgoing(&self) -> &[Array1<f64>] {
        self.ports.outgoing()
    }

    /// Clamps a variable to an observed state. Outgoing messages become one-hot
    /// and are also copied into the previous round snapshot, so the variable
    /// reports convergence right away.
    ///
    /// # Notes
    ///
    /// Enabling of adjacent factors is done by the owning graph
    pub(super) fn condition(&mut self, observed: usize) {
        self.enabled = true;
        self.observed = Some(observed);
        for message in self.ports.outgoing.iter_mut() {
            *message = Array1::one_hot(self.dim, observed);
        }
        self.next_step();
    }

    pub(super) fn reset(&mut self) {
        self.enabled = true;
        self.observed = None;
        self.ports.reset();
    }

    /// Product of all incoming messages normalized to sum to one.
    /// A variable without factors gets a uniform distribution,
    /// an observed variable is concentrated on its observed state
    pub fn marginal(&self) -> Array1<f64> {
        if let Some(observed) = self.observed {
            return Array1::one_hot(self.dim, observed);
        }
        let mut marginal = Array1::<f64>::uniform(self.dim);
        for message in &self.ports.incoming {
            marginal *= message;
        }
        marginal.normalize();
        marginal
    }
}

impl Node for VariableNode {
    #[inline(always)]
    fn ports(&self) -> &Ports {
        &self.ports
    }

    #[inline(always)]
    fn ports_mut(&mut self) -> &mut Ports {
        &mut self.ports
    }

    #[inline(always)]
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline(always)]
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn prep_messages(&mut self, damping: f64) {
        if !self.enabled || self.observed.is_some() || self.degree() <= 1 {
            return;
        }
        self.next_step();
        let Ports {
            incoming, outgoing, ..
        } = &mut self.ports;
        for (index, dst) in outgoing.iter_mut().enumerate() {
            dst.fill(1f64);
            for (_, src) in incoming.iter().enumerate().filter(|(other, _)| *other != index) {
                *dst *= src;
            }
        }
        self.normalize_messages();
        self.damp_messages(damping);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn variable_with_edges(incoming: Vec<Array1<f64>>) -> VariableNode {
        let dim = incoming[0].len();
        let mut variable = VariableNode::new_disconnected(0, "x".to_string(), dim);
        for (i, message) in incoming.into_iter().enumerate() {
            variable.ports.connect(i, 0, dim);
            variable.receive_message(i, &message);
        }
        variable
    }

    #[test]
    fn exclude_self_product() {
        let mut variable =
            variable_with_edges(vec![array![0.5, 0.5], array![0.2, 0.8], array![0.9, 0.1]]);
        variable.prep_messages(0.);
        let expected = [
            array![0.18, 0.08] / 0.26,
            array![0.45, 0.05] / 0.5,
            array![0.1, 0.4] / 0.5,
        ];
        for (got, expected) in variable.outgoing().iter().zip(&expected) {
            assert!(got.discrepancy(expected) < 1e-12, "{got} != {expected}");
        }
        assert_eq!(variable.ports.prev_outgoing()[0], array![1., 1.]);
    }

    #[test]
    fn leaf_variable_keeps_its_messages() {
        let mut variable = variable_with_edges(vec![array![0.3, 0.7]]);
        variable.prep_messages(0.);
        assert_eq!(variable.outgoing()[0], array![1., 1.]);
        assert!(variable.check_convergence(1e-4));
    }

    #[test]
    fn conditioned_variable_is_frozen() {
        let mut variable = variable_with_edges(vec![array![0.5, 0.5, 0.], array![0.2, 0.3, 0.5]]);
        variable.condition(2);
        variable.prep_messages(0.);
        for message in variable.outgoing() {
            assert_eq!(message, &array![0., 0., 1.]);
        }
        assert!(variable.check_convergence(1e-4));
        assert_eq!(variable.marginal(), array![0., 0., 1.]);
    }

    #[test]
    fn disabled_variable_ignores_messages() {
        let mut variable = variable_with_edges(vec![array![0.5, 0.5], array![0.2, 0.8]]);
        variable.set_enabled(false);
        variable.receive_message(0, &array![0.9, 0.1]);
        assert_eq!(variable.incoming()[0], array![0.5, 0.5]);
        assert!(variable.check_convergence(1e-4));
    }
}
