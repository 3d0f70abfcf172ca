use crate::core::message::{nan_max, Message};
use ndarray::Array1;

/// Per-edge message storage of a node.
///
/// All vectors are parallel: the `i`-th entry of each one describes
/// the edge to the `i`-th neighbor. Positions are fixed when an edge is created.
#[derive(Debug, Clone, Default)]
pub struct Ports {
    /// Arena indices of the neighbors
    pub(crate) neighbors: Vec<usize>,
    /// Position of this node within each neighbor's own neighbor list
    pub(crate) receiver_indices: Vec<usize>,
    pub(crate) incoming: Vec<Array1<f64>>,
    pub(crate) outgoing: Vec<Array1<f64>>,
    pub(crate) prev_outgoing: Vec<Array1<f64>>,
}

impl Ports {
    /// Appends a new edge with uniform messages of length `dim`
    /// and returns its position
    #[inline]
    pub(crate) fn connect(&mut self, neighbor: usize, receiver_index: usize, dim: usize) -> usize {
        self.neighbors.push(neighbor);
        self.receiver_indices.push(receiver_index);
        self.incoming.push(Array1::uniform(dim));
        self.outgoing.push(Array1::uniform(dim));
        self.prev_outgoing.push(Array1::uniform(dim));
        self.neighbors.len() - 1
    }

    /// Restores every message to the all-ones vector keeping edge lengths
    pub(crate) fn reset(&mut self) {
        let messages = self
            .incoming
            .iter_mut()
            .chain(self.outgoing.iter_mut())
            .chain(self.prev_outgoing.iter_mut());
        for message in messages {
            message.fill(1f64);
        }
    }

    /// Arena indices of the neighbors in edge order
    #[inline]
    pub fn neighbors(&self) -> &[usize] {
        &self.neighbors
    }

    /// Messages received from the neighbors in edge order
    #[inline]
    pub fn incoming(&self) -> &[Array1<f64>] {
        &self.incoming
    }

    /// Messages prepared for the neighbors in edge order
    #[inline]
    pub fn outgoing(&self) -> &[Array1<f64>] {
        &self.outgoing
    }

    /// Outgoing messages of the previous round in edge order
    #[inline]
    pub fn prev_outgoing(&self) -> &[Array1<f64>] {
        &self.prev_outgoing
    }
}

/// Message passing contract shared by variable and factor nodes
pub trait Node {
    /// Edge storage of a node
    fn ports(&self) -> &Ports;

    /// Mutable edge storage of a node
    fn ports_mut(&mut self) -> &mut Ports;

    /// Returns true if a node takes part in message passing
    fn is_enabled(&self) -> bool;

    /// Switches a node on or off, neighbors are not affected
    fn set_enabled(&mut self, enabled: bool);

    /// Computes new outgoing messages from the current incoming ones.
    /// Disabled nodes do nothing
    ///
    /// # Arguments
    ///
    /// * `damping` - Weight of the previous outgoing message in the update,
    ///     0 means the plain sum-product rule
    fn prep_messages(&mut self, damping: f64);

    /// Returns the number of adjacent nodes
    #[inline]
    fn degree(&self) -> usize {
        self.ports().neighbors.len()
    }

    /// Snapshots current outgoing messages as the previous ones
    #[inline]
    fn next_step(&mut self) {
        let ports = self.ports_mut();
        for (message, prev) in ports.outgoing.iter().zip(ports.prev_outgoing.iter_mut()) {
            message.memcpy(prev);
        }
    }

    /// Normalizes every outgoing message to sum to one
    #[inline]
    fn normalize_messages(&mut self) {
        for message in self.ports_mut().outgoing.iter_mut() {
            message.normalize();
        }
    }

    /// Mixes freshly computed outgoing messages with the previous ones
    #[inline]
    fn damp_messages(&mut self, damping: f64) {
        if damping <= 0f64 {
            return;
        }
        let ports = self.ports_mut();
        for (message, prev) in ports.outgoing.iter_mut().zip(&ports.prev_outgoing) {
            message.zip_mut_with(prev, |new, old| {
                *new = (1f64 - damping) * *new + damping * old
            });
            // the previous message is unnormalized right after a reset
            message.normalize();
        }
    }

    /// Stores a message sent by the neighbor located at `index` of this node's
    /// neighbor list. Disabled nodes ignore incoming messages
    #[inline]
    fn receive_message(&mut self, index: usize, message: &Array1<f64>) {
        if self.is_enabled() {
            message.memcpy(&mut self.ports_mut().incoming[index]);
        }
    }

    /// Delivers every outgoing message to the corresponding neighbor
    ///
    /// # Arguments
    ///
    /// * `receivers` - The arena holding the neighbors of this node
    #[inline]
    fn send_messages<R: Node>(&self, receivers: &mut [R]) {
        let ports = self.ports();
        let edges = ports.neighbors.iter().zip(&ports.receiver_indices);
        for ((neighbor, receiver_index), message) in edges.zip(&ports.outgoing) {
            receivers[*neighbor].receive_message(*receiver_index, message);
        }
    }

    /// Evaluates the largest elementwise change between current and previous
    /// outgoing messages. Disabled nodes report zero, NaN messages report NaN
    #[inline]
    fn max_discrepancy(&self) -> f64 {
        if !self.is_enabled() {
            return 0f64;
        }
        let ports = self.ports();
        ports
            .outgoing
            .iter()
            .zip(&ports.prev_outgoing)
            .map(|(new_msg, old_msg)| new_msg.discrepancy(old_msg))
            .fold(0f64, nan_max)
    }

    /// Returns true if no outgoing message moved by `tolerance` or more since the
    /// previous round. Disabled nodes always pass
    #[inline]
    fn check_convergence(&self, tolerance: f64) -> bool {
        self.max_discrepancy() < tolerance
    }
}
