use crate::core::{FactorGraph, VariableId};
use approx::assert_abs_diff_eq;
use ndarray::{array, Array1, ArrayD, IxDyn};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::Uniform;

pub(super) const EPSILON: f64 = 1e-6;

/// p(b) p(a|b) with a of 3 states and b of 2 states
pub(super) fn make_toy_graph() -> FactorGraph {
    let mut fg = FactorGraph::new();
    let a = fg.add_var_node("a", 3).unwrap();
    let b = fg.add_var_node("b", 2).unwrap();
    fg.add_fac_node(array![0.3, 0.7].into_dyn(), &[b]).unwrap();
    let p_ab = array![[0.2, 0.8], [0.4, 0.6], [0.1, 0.9]].into_dyn();
    fg.add_fac_node(p_ab, &[a, b]).unwrap();
    fg
}

/// Four variables and three factors: f(a), f(b, a), f(d, c, a)
pub(super) fn make_test_graph() -> FactorGraph {
    let mut fg = FactorGraph::new();
    let a = fg.add_var_node("a", 2).unwrap();
    let b = fg.add_var_node("b", 3).unwrap();
    let c = fg.add_var_node("c", 4).unwrap();
    let d = fg.add_var_node("d", 5).unwrap();
    fg.add_fac_node(array![0.3, 0.7].into_dyn(), &[a]).unwrap();
    let p_ba = array![[0.2, 0.8], [0.4, 0.6], [0.1, 0.9]].into_dyn();
    fg.add_fac_node(p_ba, &[b, a]).unwrap();
    let p_dca = array![
        [[3., 1.], [1.2, 0.4], [0.1, 0.9], [0.1, 0.9]],
        [[11., 9.], [8.8, 9.4], [6.4, 0.1], [8.8, 9.4]],
        [[3., 2.], [2., 2.], [2., 2.], [3., 2.]],
        [[0.3, 0.7], [0.44, 0.56], [0.37, 0.63], [0.44, 0.56]],
        [[0.2, 0.1], [0.64, 0.44], [0.37, 0.63], [0.2, 0.1]],
    ]
    .into_dyn();
    fg.add_fac_node(p_dca, &[d, c, a]).unwrap();
    fg
}

#[inline]
pub(super) fn assert_close(found: &Array1<f64>, expected: &[f64]) {
    assert_eq!(found.len(), expected.len(), "{found} vs {expected:?}");
    for (f, e) in found.iter().zip(expected) {
        assert_abs_diff_eq!(*f, *e, epsilon = EPSILON);
    }
}

/// Checks every marginal of enabled variables against exact enumeration
pub(super) fn assert_matches_brute_force(fg: &mut FactorGraph, max_iterations: usize) {
    let marginals = fg.marginals(max_iterations);
    let brute = fg.brute_force().unwrap();
    assert_eq!(
        marginals.keys().collect::<Vec<_>>(),
        brute.names.iter().collect::<Vec<_>>()
    );
    for (name, marginal) in &marginals {
        let exact = brute.marginalize(name).unwrap();
        assert_close(marginal, exact.as_slice().unwrap());
        assert_abs_diff_eq!(marginal.sum(), 1., epsilon = 1e-9);
    }
}

/// Generates a random tree shaped factor graph. Every factor joins one
/// already present variable with fresh ones, some variables also get unary factors
pub(super) fn gen_random_tree(
    rng: &mut impl Rng,
    variables_number: usize,
    max_dim: usize,
    max_arity: usize,
) -> FactorGraph {
    let dims = Uniform::new_inclusive(1, max_dim);
    let values = Uniform::new(0.05, 1.);
    let mut fg = FactorGraph::new();
    let mut ids: Vec<VariableId> = Vec::with_capacity(variables_number);
    ids.push(fg.add_var_node("x0", rng.sample(dims)).unwrap());
    while ids.len() < variables_number {
        let parent = ids[rng.gen_range(0..ids.len())];
        let arity = rng
            .gen_range(2..=max_arity)
            .min(variables_number - ids.len() + 1);
        let mut scope = vec![parent];
        for _ in 1..arity {
            let name = format!("x{}", ids.len());
            let id = fg.add_var_node(name, rng.sample(dims)).unwrap();
            ids.push(id);
            scope.push(id);
        }
        scope.shuffle(rng);
        let shape: Vec<usize> = scope
            .iter()
            .map(|x| fg.variable(*x).unwrap().dim())
            .collect();
        let potential = ArrayD::from_shape_fn(IxDyn(&shape), |_| rng.sample(values));
        fg.add_fac_node(potential, &scope).unwrap();
    }
    for id in ids {
        if rng.gen_bool(0.5) {
            let dim = fg.variable(id).unwrap().dim();
            let potential = ArrayD::from_shape_fn(IxDyn(&[dim]), |_| rng.sample(values));
            fg.add_fac_node(potential, &[id]).unwrap();
        }
    }
    fg
}
