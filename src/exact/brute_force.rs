use crate::core::{
    tensor::{permute_axes, sum_except_axis},
    FGError, FGResult, FactorGraph, FactorNode, Message, Node, VariableNode,
};
use crate::exact::odometer::Odometer;
use ndarray::{Array1, ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Exact joint distribution of the enabled variables of a factor graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BruteForceResult {
    /// Normalized joint probabilities, one axis per enabled variable.
    /// An observed variable has a unit length axis
    pub joint: ArrayD<f64>,

    /// Names of the enabled variables in axes order
    pub names: Vec<String>,

    dims: Vec<usize>,
    observed: Vec<Option<usize>>,
}

impl BruteForceResult {
    #[inline]
    fn position(&self, name: &str) -> FGResult<usize> {
        self.names
            .iter()
            .position(|x| x == name)
            .ok_or_else(|| FGError::UnknownVariable(name.to_owned()))
    }

    /// Marginal distribution of one variable obtained by summing the joint
    /// distribution over all other variables.
    /// The marginal of an observed variable is concentrated on its observed state
    ///
    /// # Arguments
    ///
    /// * `name` - Name of a variable included in the joint distribution
    pub fn marginalize(&self, name: &str) -> FGResult<Array1<f64>> {
        let position = self.position(name)?;
        if let Some(observed) = self.observed[position] {
            return Ok(Array1::one_hot(self.dims[position], observed));
        }
        let mut marginal = sum_except_axis(self.joint.clone(), position);
        marginal.normalize();
        Ok(marginal)
    }

    /// Joint marginal distribution of several variables, axes follow the order of `names`.
    /// As in `marginalize`, the axis of an observed variable spans all its states
    /// and carries the whole mass at the observed state
    ///
    /// # Example
    ///
    /// ```
    /// use ndarray::{array, IxDyn};
    /// use sumprod::core::FactorGraph;
    ///
    /// let mut fg = FactorGraph::new();
    /// let a = fg.add_var_node("a", 2).unwrap();
    /// let b = fg.add_var_node("b", 3).unwrap();
    /// fg.add_fac_node(array![[1., 2., 3.], [4., 5., 6.]].into_dyn(), &[a, b]).unwrap();
    /// let brute = fg.brute_force().unwrap();
    /// let ba = brute.marginalize_many(&["b", "a"]).unwrap();
    /// assert_eq!(ba.shape(), &[3, 2]);
    /// assert!((ba[IxDyn(&[2, 0])] - 3. / 21.).abs() < 1e-12);
    /// ```
    pub fn marginalize_many(&self, names: &[&str]) -> FGResult<ArrayD<f64>> {
        let mut positions = Vec::with_capacity(names.len());
        for name in names {
            let position = self.position(name)?;
            if positions.contains(&position) {
                return Err(FGError::RepeatedQueryVariable((*name).to_owned()));
            }
            positions.push(position);
        }
        let mut reduced = self.joint.clone();
        for axis in (0..self.names.len()).rev() {
            if !positions.contains(&axis) {
                reduced = reduced.sum_axis(Axis(axis));
            }
        }
        let mut kept = positions.clone();
        kept.sort_unstable();
        let order: Vec<_> = positions
            .iter()
            .map(|position| kept.iter().position(|x| x == position).unwrap_or_default())
            .collect();
        let mut marginal = permute_axes(reduced, &order);
        for (axis, position) in positions.iter().enumerate() {
            if let Some(observed) = self.observed[*position] {
                let mut shape = marginal.shape().to_vec();
                shape[axis] = self.dims[*position];
                let mut expanded = ArrayD::<f64>::zeros(IxDyn(&shape));
                expanded
                    .index_axis_mut(Axis(axis), observed)
                    .assign(&marginal.index_axis(Axis(axis), 0));
                marginal = expanded;
            }
        }
        let total = marginal.sum();
        if total > 0f64 {
            marginal /= total;
        }
        Ok(marginal)
    }
}

impl FactorGraph {
    /// Computes the exact joint distribution of the enabled variables by
    /// enumerating all their configurations. Observed variables contribute
    /// only their observed state. A factor takes part in the product only
    /// if it and all its variables are enabled.
    ///
    /// # Notes
    ///
    /// The cost grows as the product of dimensions of enabled variables,
    /// the method is meant for validating message passing on small graphs
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
    /// let brute = fg.brute_force().unwrap();
    /// assert_eq!(brute.names, vec!["a".to_string(), "b".to_string()]);
    /// assert_eq!(brute.joint.shape(), &[3, 2]);
    /// let b_marginal = brute.marginalize("b").unwrap();
    /// assert!((b_marginal[0] - 0.11538462).abs() < 1e-6);
    /// ```
    pub fn brute_force(&self) -> FGResult<BruteForceResult> {
        let enabled: Vec<&VariableNode> =
            self.variables.iter().filter(|x| x.is_enabled()).collect();
        let mut axes = vec![None; self.variables.len()];
        for (axis, variable) in enabled.iter().enumerate() {
            axes[variable.id()] = Some(axis);
        }
        let factors: Vec<(&FactorNode, Vec<usize>)> = self
            .factors
            .iter()
            .filter(|x| x.is_enabled())
            .filter_map(|factor| {
                let factor_axes: Option<Vec<usize>> =
                    factor.ports().neighbors().iter().map(|x| axes[*x]).collect();
                factor_axes.map(|x| (factor, x))
            })
            .collect();
        let radices: Vec<usize> = enabled
            .iter()
            .map(|x| if x.observed().is_some() { 1 } else { x.dim() })
            .collect();
        let mut joint = ArrayD::<f64>::zeros(IxDyn(&radices));
        let mut odometer = Odometer::new(radices);
        debug!(
            variables = enabled.len(),
            factors = factors.len(),
            configurations = odometer.configurations_number(),
            "enumerating configurations"
        );
        let mut states = vec![0; enabled.len()];
        let mut arguments = Vec::new();
        while !odometer.is_exhausted() {
            let configuration = states.iter_mut().zip(odometer.digits()).zip(&enabled);
            for ((state, digit), variable) in configuration {
                *state = variable.observed().unwrap_or(*digit);
            }
            let mut potential = 1f64;
            for (factor, factor_axes) in &factors {
                arguments.clear();
                arguments.extend(factor_axes.iter().map(|axis| states[*axis]));
                potential *= factor.potential()[IxDyn(&arguments)];
            }
            joint[IxDyn(odometer.digits())] = potential;
            odometer.advance();
        }
        let total = joint.sum();
        if total <= 0f64 {
            return Err(FGError::DegenerateDistribution);
        }
        joint /= total;
        Ok(BruteForceResult {
            joint,
            names: enabled.iter().map(|x| x.name().to_owned()).collect(),
            dims: enabled.iter().map(|x| x.dim()).collect(),
            observed: enabled.iter().map(|x| x.observed()).collect(),
        })
    }
}
