use crate::core::{
    message::Message,
    node::{Node, Ports},
    tensor::{mul_along_axis, sum_except_axis},
};
use ndarray::{Array1, ArrayD};

/// A factor of a factor graph: a nonnegative potential tensor whose `i`-th axis
/// is bound to the `i`-th adjacent variable, together with its edge storage
#[derive(Debug, Clone)]
pub struct FactorNode {
    id: usize,
    potential: ArrayD<f64>,
    enabled: bool,
    pub(crate) ports: Ports,
}

impl FactorNode {
    #[inline(always)]
    pub(super) fn new_disconnected(id: usize, potential: ArrayD<f64>) -> Self {
        FactorNode {
            id,
            potential,
            enabled: true,
            ports: Ports::default(),
        }
    }

    /// Index of a factor in the order of registration
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// The potential tensor, axes follow the order of adjacent variables
    #[inline]
    pub fn potential(&self) -> &ArrayD<f64> {
        &self.potential
    }

    /// Messages received from adjacent variables
    #[inline]
    pub fn incoming(&self) -> &[Array1<f64>] {
        self.ports.incoming()
    }

    /// Messages prepared for adjacent variables
    #[inline]
    pub fn outgoing(&self) -> &[Array1<f64>] {
        self.ports.outgoing()
    }

    pub(super) fn reset(&mut self) {
        self.enabled = true;
        self.ports.reset();
    }

    /// Multiplies the potential by incoming messages of every axis except `skip`
    #[inline]
    fn weighted_potential(&self, skip: Option<usize>) -> ArrayD<f64> {
        let mut weighted = self.potential.clone();
        for (axis, message) in self.ports.incoming.iter().enumerate() {
            if Some(axis) != skip {
                mul_along_axis(&mut weighted, message, axis);
            }
        }
        weighted
    }

    /// Belief over the joint state of the adjacent variables: the potential
    /// multiplied by all incoming messages, normalized to sum to one
    pub fn marginal(&self) -> ArrayD<f64> {
        let mut marginal = self.weighted_potential(None);
        let total = marginal.sum();
        if total > 0f64 {
            marginal /= total;
        }
        marginal
    }
}

impl Node for FactorNode {
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
        if !self.enabled {
            return;
        }
        self.next_step();
        for axis in 0..self.degree() {
            let weighted = self.weighted_potential(Some(axis));
            self.ports.outgoing[axis] = sum_except_axis(weighted, axis);
        }
        self.normalize_messages();
        self.damp_messages(damping);
    }
}
