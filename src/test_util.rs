#![cfg(test)]
use crate::dnn::ReLU;
use crate::graph::Graph;
use crate::NetFloat;
use ndarray::{Array1, Array4};
use proptest::arbitrary::functor::ArbitraryF1;
use proptest::prelude::*;
use proptest::sample::SizeRange;

prop_compose! {
    pub fn array1(len: usize)(v in Vec::lift1_with(-10. .. 10., SizeRange::new(len..=len))) -> Array1<NetFloat> {
        Array1::from_vec(v)
    }
}

prop_compose! {
    pub fn array4(shape: (usize, usize, usize, usize))(v in Vec::lift1_with(-10. .. 10., SizeRange::new(shape.0 * shape.1 * shape.2 * shape.3..=shape.0 * shape.1 * shape.2 * shape.3))) -> Array4<NetFloat> {
        Array4::from_shape_vec(shape, v).unwrap()
    }
}

/// Kernel `[Kh, Kw, Cin, Cout]`, data `[batch, H, W, Cin]` with `H >= Kh` and `W >= Kw`, and bias `[Cout]`.
pub fn conv_test_inputs(
    max_k: usize,
    max_hw: usize,
    max_c_in: usize,
    max_c_out: usize,
) -> impl Strategy<Value = (Array4<NetFloat>, Array4<NetFloat>, Array1<NetFloat>)> {
    (1..=max_k, 1..=max_k, 1..=max_c_in, 1..=max_c_out, 1usize..3)
        .prop_flat_map(move |(k_h, k_w, c_in, c_out, batch)| {
            (
                k_h..=max_hw.max(k_h),
                k_w..=max_hw.max(k_w),
                Just((k_h, k_w, c_in, c_out, batch)),
            )
        })
        .prop_flat_map(|(h, w, (k_h, k_w, c_in, c_out, batch))| {
            (
                array4((k_h, k_w, c_in, c_out)),
                array4((batch, h, w, c_in)),
                array1(c_out),
            )
        })
}

/// `len` ReLUs where operation `i` reads representation `i` and writes `i + 1`.
pub fn relu_chain(len: usize) -> Graph {
    let mut graph = Graph::default();
    for i in 0..len {
        graph
            .add_operation(format!("relu{}", i), Box::new(ReLU::new()), vec![i], vec![i + 1])
            .unwrap();
    }
    graph
}
