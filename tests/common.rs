#![allow(dead_code)]
use binomial_dropout::dnn::BinomialScale;
use binomial_dropout::tensorshape::TensorShape;
use binomial_dropout::{get_model, ModeHandle, Model, NetFloat};
use ndarray::{Array, ArrayD, IxDyn};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_pcg::Pcg64;

pub fn rng(seed: u64) -> Pcg64 {
    Pcg64::seed_from_u64(seed)
}

pub fn images(batch: usize, side: usize, seed: u64) -> ArrayD<NetFloat> {
    Array::random_using(IxDyn(&[batch, side, side, 1]), Uniform::new(0., 1.), &mut rng(seed))
}

pub fn model(side: usize, num_classes: usize, train_phase: bool, l2_penalty: NetFloat) -> (ModeHandle, Model) {
    get_model(
        &TensorShape::batched(&[side, side, 1]),
        num_classes,
        train_phase,
        l2_penalty,
        &mut rng(0),
    )
    .unwrap()
}

/// Evaluation-mode scaling operations of `model`, in network order.
pub fn binomial_scales(model: &Model) -> Vec<BinomialScale> {
    model
        .dnn()
        .get_graph()
        .get_operations()
        .iter()
        .filter_map(|node| {
            let op = node.get_operation().as_any();
            op.downcast_ref::<BinomialScale>().cloned().or_else(|| {
                op.downcast_ref::<binomial_dropout::graph::Cond>()
                    .and_then(|cond| cond.if_eval().as_any().downcast_ref::<BinomialScale>().cloned())
            })
        })
        .collect()
}
