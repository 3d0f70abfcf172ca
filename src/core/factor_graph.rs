use std::{error::Error, fmt::Display};

use crate::core::{
    factor_node::FactorNode, message::nan_max, node::Node, variable_node::VariableNode,
};

use indexmap::IndexMap;
use ndarray::{Array1, ArrayD};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Errors that could appear in factor graph's methods
pub enum FGError {
    /// Rank of a potential does not match a number of adjacent variables
    DimensionMismatch {
        /// Rank of the potential tensor
        rank: usize,

        /// Number of variables given
        neighbors: usize,
    },

    /// Length of a potential axis does not match the dimension of its variable
    AxisLengthMismatch {
        /// Axis of the potential tensor
        axis: usize,

        /// Dimension of the variable bound to the axis
        expected: usize,

        /// Actual length of the axis
        found: usize,
    },

    /// A variable is declared with zero states
    NonPositiveDimension(String),

    /// A variable name is already taken
    DuplicateVariable(String),

    /// Index of a variable is out of range
    OutOfRangeVariable(usize, usize),

    /// Index of a factor is out of range
    OutOfRangeFactor(usize, usize),

    /// The same variable is attached twice to one factor
    RepeatedVariable(usize),

    /// A potential contains a negative or non finite entry
    InvalidPotential,

    /// An observed state does not exist
    ObservationOutOfRange {
        /// Name of the variable
        name: String,

        /// The requested state
        observed: usize,

        /// Number of states of the variable
        dim: usize,
    },

    /// No variable with the given name
    UnknownVariable(String),

    /// A variable name occurs more than once in a marginalization query
    RepeatedQueryVariable(String),

    /// Every configuration has zero probability
    DegenerateDistribution,
}

impl Display for FGError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FGError::DimensionMismatch { rank, neighbors } => write!(
                f,
                "Rank of a potential does not match the number of variables. The potential's rank: {}, the number of variables: {}",
                rank, neighbors,
            ),
            FGError::AxisLengthMismatch { axis, expected, found } => write!(
                f,
                "Axis {} of a potential has length {}, but the corresponding variable has {} states",
                axis, found, expected,
            ),
            FGError::NonPositiveDimension(name) => {
                write!(f, "Variable {} must have at least one state", name)
            }
            FGError::DuplicateVariable(name) => {
                write!(f, "Variable {} is already present in the factor graph", name)
            }
            FGError::OutOfRangeVariable(size, pos) => write!(
                f,
                "Index of a variable {} is out of range of [0..{}] variables",
                pos, size,
            ),
            FGError::OutOfRangeFactor(size, pos) => write!(
                f,
                "Index of a factor {} is out of range of [0..{}] factors",
                pos, size,
            ),
            FGError::RepeatedVariable(pos) => write!(
                f,
                "Variable with index {} is attached to the same factor more than once",
                pos,
            ),
            FGError::InvalidPotential => {
                write!(f, "Potential entries must be finite and nonnegative")
            }
            FGError::ObservationOutOfRange { name, observed, dim } => write!(
                f,
                "Observed state {} of variable {} is out of range of [0..{}] states",
                observed, name, dim,
            ),
            FGError::UnknownVariable(name) => write!(f, "Unknown variable {}", name),
            FGError::RepeatedQueryVariable(name) => {
                write!(f, "Variable {} is requested more than once", name)
            }
            FGError::DegenerateDistribution => {
                write!(f, "Every configuration of enabled variables has zero probability")
            }
        }
    }
}

impl Error for FGError {}

/// Factor graph's methods result type
pub type FGResult<T> = Result<T, FGError>;

// ------------------------------------------------------------------------------------------

/// Handle of a variable, valid for the factor graph that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableId(pub(crate) usize);

impl VariableId {
    /// Position of a variable in the order of registration
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Handle of a factor, valid for the factor graph that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactorId(pub(crate) usize);

impl FactorId {
    /// Position of a factor in the order of registration
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

// ------------------------------------------------------------------------------------------

/// Hyper parameters of sum-product message passing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagePassingConfig {
    /// Maximal number of rounds
    pub max_iterations: usize,

    /// A round converges when no outgoing message moves by this value or more
    pub tolerance: f64,

    /// Exponential moving average coefficient, 0 disables damping
    pub damping: f64,
}

impl Default for MessagePassingConfig {
    fn default() -> Self {
        MessagePassingConfig {
            max_iterations: 500,
            tolerance: 1e-4,
            damping: 0f64,
        }
    }
}

/// Information returned after a message passing procedure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePassingInfo {
    /// Whether messages stopped changing before the rounds budget was exhausted
    pub converged: bool,

    /// Number of rounds performed by this call
    pub iterations_number: usize,

    /// Final discrepancy between last and previous round's messages maximized across variables and factors
    pub last_discrepancy: f64,

    /// Dynamics of discrepancy, one entry per round
    pub discrepancy_dynamics: Vec<f64>,
}

impl Display for MessagePassingInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.converged {
            write!(
                f,
                "Messaged passing has converged after {} iterations, last iteration discrepancy: {}",
                self.iterations_number, self.last_discrepancy,
            )
        } else {
            write!(
                f,
                "Messaged passing has not converged after {} iterations, last iteration discrepancy: {}",
                self.iterations_number, self.last_discrepancy,
            )
        }
    }
}

// ------------------------------------------------------------------------------------------

/// A factor graph over discrete variables
#[derive(Debug, Clone, Default)]
pub struct FactorGraph {
    pub(crate) variables: Vec<VariableNode>,
    pub(crate) names: IndexMap<String, VariableId>,
    pub(crate) factors: Vec<FactorNode>,
    pub(crate) converged: bool,
}

impl FactorGraph {
    /// Creates an empty factor graph
    #[inline]
    pub fn new() -> Self {
        FactorGraph::default()
    }

    /// Adds a variable to a factor graph
    ///
    /// # Arguments
    ///
    /// * `name` - A unique name of a variable
    /// * `dim` - A number of states of a variable
    ///
    /// # Example
    ///
    /// ```
    /// use sumprod::core::{FGError, FactorGraph};
    ///
    /// let mut fg = FactorGraph::new();
    /// let a = fg.add_var_node("a", 3).unwrap();
    /// assert_eq!(a.index(), 0);
    /// assert_eq!(fg.add_var_node("a", 2), Err(FGError::DuplicateVariable("a".into())));
    /// assert_eq!(fg.add_var_node("b", 0), Err(FGError::NonPositiveDimension("b".into())));
    /// ```
    pub fn add_var_node(&mut self, name: impl Into<String>, dim: usize) -> FGResult<VariableId> {
        let name = name.into();
        if dim == 0 {
            return Err(FGError::NonPositiveDimension(name));
        }
        if self.names.contains_key(&name) {
            return Err(FGError::DuplicateVariable(name));
        }
        let id = VariableId(self.variables.len());
        debug!(variable = %name, dim, "adding variable");
        self.variables
            .push(VariableNode::new_disconnected(id.0, name.clone(), dim));
        self.names.insert(name, id);
        self.converged = false;
        Ok(id)
    }

    /// Adds a factor to a factor graph
    ///
    /// # Arguments
    ///
    /// * `potential` - A nonnegative tensor, its `i`-th axis corresponds to `variables[i]`
    /// * `variables` - Handles of adjacent variables
    ///
    /// # Notes
    ///
    /// The order of `variables` binds potential axes for the whole life of a factor.
    /// The method fails if the potential rank differs from the number of variables,
    /// if an axis length differs from the dimension of its variable,
    /// if a variable is repeated or if the potential has a negative entry
    ///
    /// # Example
    ///
    /// ```
    /// use ndarray::array;
    /// use sumprod::core::{FGError, FactorGraph};
    ///
    /// let mut fg = FactorGraph::new();
    /// let a = fg.add_var_node("a", 3).unwrap();
    /// let b = fg.add_var_node("b", 2).unwrap();
    /// let p_ab = array![[0.2, 0.8], [0.4, 0.6], [0.1, 0.9]].into_dyn();
    /// fg.add_fac_node(p_ab.clone(), &[a, b]).unwrap();
    /// assert_eq!(
    ///     fg.add_fac_node(p_ab, &[a]),
    ///     Err(FGError::DimensionMismatch { rank: 2, neighbors: 1 }),
    /// );
    /// assert_eq!(fg.get_variable_degrees(), vec![1, 1]);
    /// ```
    pub fn add_fac_node(
        &mut self,
        potential: ArrayD<f64>,
        variables: &[VariableId],
    ) -> FGResult<FactorId> {
        if potential.ndim() != variables.len() {
            return Err(FGError::DimensionMismatch {
                rank: potential.ndim(),
                neighbors: variables.len(),
            });
        }
        for (position, var_id) in variables.iter().enumerate() {
            let variable = self
                .variables
                .get(var_id.0)
                .ok_or(FGError::OutOfRangeVariable(self.variables.len(), var_id.0))?;
            if variables[..position].contains(var_id) {
                return Err(FGError::RepeatedVariable(var_id.0));
            }
            let found = potential.shape()[position];
            if found != variable.dim() {
                return Err(FGError::AxisLengthMismatch {
                    axis: position,
                    expected: variable.dim(),
                    found,
                });
            }
        }
        if potential.iter().any(|x| !x.is_finite() || *x < 0f64) {
            return Err(FGError::InvalidPotential);
        }
        let id = FactorId(self.factors.len());
        let mut factor = FactorNode::new_disconnected(id.0, potential);
        for (position, var_id) in variables.iter().enumerate() {
            let variable = &mut self.variables[var_id.0];
            let dim = variable.dim();
            let var_position = variable.ports.connect(id.0, position, dim);
            factor.ports.connect(var_id.0, var_position, dim);
        }
        debug!(
            factor = id.0,
            variables = ?variables.iter().map(|v| v.0).collect::<Vec<_>>(),
            "adding factor"
        );
        self.factors.push(factor);
        self.converged = false;
        Ok(id)
    }

    /// Returns a handle of a variable by its name
    #[inline]
    pub fn variable_id(&self, name: &str) -> FGResult<VariableId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| FGError::UnknownVariable(name.to_owned()))
    }

    /// Returns a variable node
    #[inline]
    pub fn variable(&self, id: VariableId) -> FGResult<&VariableNode> {
        self.variables
            .get(id.0)
            .ok_or(FGError::OutOfRangeVariable(self.variables.len(), id.0))
    }

    /// Returns a factor node
    #[inline]
    pub fn factor(&self, id: FactorId) -> FGResult<&FactorNode> {
        self.factors
            .get(id.0)
            .ok_or(FGError::OutOfRangeFactor(self.factors.len(), id.0))
    }

    /// Returns true if the last message passing run has converged and
    /// the graph has not been modified since
    #[inline]
    pub fn is_converged(&self) -> bool {
        self.converged
    }

    /// Returns degree (number of adjoint factors) of each variable
    #[inline]
    pub fn get_variable_degrees(&self) -> Vec<usize> {
        self.variables.iter().map(|x| x.degree()).collect()
    }

    /// Returns degree (number of adjoint variables) of each factor
    /// in order they were added to a factor graph
    #[inline]
    pub fn get_factor_degrees(&self) -> Vec<usize> {
        self.factors.iter().map(|x| x.degree()).collect()
    }

    // state control ----------------------------------------------------------------------

    /// Enables a variable together with its adjacent factors
    pub fn enable_variable(&mut self, id: VariableId) -> FGResult<()> {
        let size = self.variables.len();
        let variable = self
            .variables
            .get_mut(id.0)
            .ok_or(FGError::OutOfRangeVariable(size, id.0))?;
        variable.set_enabled(true);
        for fac_index in variable.ports.neighbors() {
            self.factors[*fac_index].set_enabled(true);
        }
        self.converged = false;
        Ok(())
    }

    /// Enables a factor together with its adjacent variables
    pub fn enable_factor(&mut self, id: FactorId) -> FGResult<()> {
        let size = self.factors.len();
        let factor = self
            .factors
            .get_mut(id.0)
            .ok_or(FGError::OutOfRangeFactor(size, id.0))?;
        factor.set_enabled(true);
        for var_index in factor.ports.neighbors() {
            self.variables[*var_index].set_enabled(true);
        }
        self.converged = false;
        Ok(())
    }

    /// Disables a single variable, neighbors stay as they are
    pub fn disable_variable(&mut self, id: VariableId) -> FGResult<()> {
        let size = self.variables.len();
        self.variables
            .get_mut(id.0)
            .ok_or(FGError::OutOfRangeVariable(size, id.0))?
            .set_enabled(false);
        self.converged = false;
        Ok(())
    }

    /// Disables a single factor, neighbors stay as they are
    pub fn disable_factor(&mut self, id: FactorId) -> FGResult<()> {
        let size = self.factors.len();
        self.factors
            .get_mut(id.0)
            .ok_or(FGError::OutOfRangeFactor(size, id.0))?
            .set_enabled(false);
        self.converged = false;
        Ok(())
    }

    /// Disables every node. Useful for switching on small subnetworks afterwards
    pub fn disable_all(&mut self) {
        for variable in &mut self.variables {
            variable.set_enabled(false);
        }
        for factor in &mut self.factors {
            factor.set_enabled(false);
        }
        self.converged = false;
    }

    /// Restores all messages to their initial uniform state, removes evidence
    /// and enables every node
    ///
    /// # Example
    ///
    /// ```
    /// use ndarray::array;
    /// use sumprod::core::FactorGraph;
    ///
    /// let mut fg = FactorGraph::new();
    /// let a = fg.add_var_node("a", 2).unwrap();
    /// fg.add_fac_node(array![0.3, 0.7].into_dyn(), &[a]).unwrap();
    /// let _ = fg.marginals(500);
    /// assert!(fg.is_converged());
    /// fg.reset();
    /// assert!(!fg.is_converged());
    /// assert_eq!(fg.variable(a).unwrap().incoming()[0], array![1., 1.]);
    /// ```
    pub fn reset(&mut self) {
        for variable in &mut self.variables {
            variable.reset();
        }
        for factor in &mut self.factors {
            factor.reset();
        }
        self.converged = false;
    }

    /// Fixes a variable to an observed state. The variable and its adjacent
    /// factors get enabled
    ///
    /// # Arguments
    ///
    /// * `id` - A handle of the observed variable
    /// * `observed` - The observed state, must be smaller than the variable dimension
    pub fn condition(&mut self, id: VariableId, observed: usize) -> FGResult<()> {
        let variable = self
            .variables
            .get(id.0)
            .ok_or(FGError::OutOfRangeVariable(self.variables.len(), id.0))?;
        if observed >= variable.dim() {
            return Err(FGError::ObservationOutOfRange {
                name: variable.name().to_owned(),
                observed,
                dim: variable.dim(),
            });
        }
        debug!(variable = variable.name(), observed, "conditioning");
        self.variables[id.0].condition(observed);
        self.enable_variable(id)?;
        // observed variables never recompute, so the evidence is pushed now
        self.variables[id.0].send_messages(&mut self.factors);
        Ok(())
    }

    // message passing --------------------------------------------------------------------

    /// Runs synchronous sum-product message passing. Every round factors send
    /// messages to variables, then variables send messages to factors.
    /// Rounds stop as soon as all enabled nodes converge or when
    /// `config.max_iterations` rounds have been performed. A graph which has
    /// already converged performs no rounds.
    ///
    /// # Notes
    ///
    /// Exhausting the rounds budget is not an error: on graphs with cycles
    /// messages may never settle, the last messages are still available
    /// as an approximation. Check `MessagePassingInfo::converged`.
    /// A damping coefficient outside of `[0, 1)` is replaced by 0
    pub fn run_message_passing(&mut self, config: &MessagePassingConfig) -> MessagePassingInfo {
        let damping = if (0f64..1f64).contains(&config.damping) {
            config.damping
        } else {
            warn!(damping = config.damping, "damping must lie in [0, 1), falling back to 0");
            0f64
        };
        let mut discrepancy_dynamics = Vec::new();
        let mut last_discrepancy = self.max_discrepancy();
        let mut iterations_number = 0;
        while iterations_number < config.max_iterations && !self.converged {
            iterations_number += 1;
            for factor in self.factors.iter_mut() {
                factor.prep_messages(damping);
                factor.send_messages(&mut self.variables);
            }
            for variable in self.variables.iter_mut() {
                variable.prep_messages(damping);
                variable.send_messages(&mut self.factors);
            }
            let variables_converged = self
                .variables
                .iter()
                .all(|x| x.check_convergence(config.tolerance));
            self.converged = variables_converged
                && self
                    .factors
                    .iter()
                    .all(|x| x.check_convergence(config.tolerance));
            last_discrepancy = self.max_discrepancy();
            discrepancy_dynamics.push(last_discrepancy);
            debug!(iteration = iterations_number, discrepancy = last_discrepancy, "round finished");
        }
        if self.converged {
            info!(iterations = iterations_number, "message passing has converged");
        } else {
            warn!(
                iterations = iterations_number,
                discrepancy = last_discrepancy,
                "message passing has not converged"
            );
        }
        MessagePassingInfo {
            converged: self.converged,
            iterations_number,
            last_discrepancy,
            discrepancy_dynamics,
        }
    }

    /// Runs sum-product message passing with default tolerance and no damping
    ///
    /// # Arguments
    ///
    /// * `max_iterations` - A maximal number of rounds
    #[inline]
    pub fn sum_product(&mut self, max_iterations: usize) -> MessagePassingInfo {
        let config = MessagePassingConfig {
            max_iterations,
            ..MessagePassingConfig::default()
        };
        self.run_message_passing(&config)
    }

    /// Runs message passing and computes marginals of all enabled variables,
    /// indexed by variable names in the order of registration
    ///
    /// # Arguments
    ///
    /// * `max_iterations` - A maximal number of rounds, 500 is a sensible default
    ///
    /// # Example
    ///
    /// ```
    /// use ndarray::array;
    /// use sumprod::core::FactorGraph;
    ///
    /// let mut fg = FactorGraph::new();
    /// let a = fg.add_var_node("a", 3).unwrap();
    /// let b = fg.add_var_node("b", 2).unwrap();
    /// fg.add_fac_node(array![0.3, 0.7].into_dyn(), &[b]).unwrap();
    /// fg.add_fac_node(array![[0.2, 0.8], [0.4, 0.6], [0.1, 0.9]].into_dyn(), &[a, b]).unwrap();
    /// let marginals = fg.marginals(500);
    /// assert!((marginals["b"][0] - 0.11538462).abs() < 1e-6);
    /// assert!((marginals["a"][2] - 0.36263736).abs() < 1e-6);
    /// ```
    #[inline]
    pub fn marginals(&mut self, max_iterations: usize) -> IndexMap<String, Array1<f64>> {
        let config = MessagePassingConfig {
            max_iterations,
            ..MessagePassingConfig::default()
        };
        self.marginals_with_config(&config).1
    }

    /// Same as `marginals` with explicit message passing hyper parameters.
    /// Also returns the message passing report, so that non convergence
    /// can be detected
    pub fn marginals_with_config(
        &mut self,
        config: &MessagePassingConfig,
    ) -> (MessagePassingInfo, IndexMap<String, Array1<f64>>) {
        let info = self.run_message_passing(config);
        (info, self.variable_marginals())
    }

    /// Computes marginals of all enabled variables from the current messages
    /// without running message passing
    pub fn variable_marginals(&self) -> IndexMap<String, Array1<f64>> {
        self.variables
            .iter()
            .filter(|x| x.is_enabled())
            .map(|x| (x.name().to_owned(), x.marginal()))
            .collect()
    }

    /// Computes beliefs of all enabled factors from the current messages.
    /// Axes of each belief follow the order of the factor's variables
    pub fn factor_marginals(&self) -> Vec<(FactorId, ArrayD<f64>)> {
        self.factors
            .iter()
            .filter(|x| x.is_enabled())
            .map(|x| (FactorId(x.id()), x.marginal()))
            .collect()
    }

    #[inline]
    fn max_discrepancy(&self) -> f64 {
        let variables = self.variables.iter().map(|x| x.max_discrepancy());
        let factors = self.factors.iter().map(|x| x.max_discrepancy());
        variables.chain(factors).fold(0f64, nan_max)
    }
}
