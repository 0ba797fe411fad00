use approx::assert_abs_diff_eq;
use binomial_dropout::binomial::binomial_scale;
use binomial_dropout::dnn::{Conv, Dense, DropoutMode, Phase};
use binomial_dropout::graph::ExecuteError;
use binomial_dropout::losses::cross_entropy_mean;
use binomial_dropout::summary::RecordingSummaryWriter;
use binomial_dropout::{inference, ModeFeed, Model};
use binomial_dropout::tensorshape::TensorShape;

mod common;

#[test]
fn test_lenet_dropout_sites() {
    let (_, model) = common::model(28, 10, true, 0.);
    let scales = common::binomial_scales(&model);
    let counts: Vec<usize> = scales.iter().map(|s| s.num_neurons()).collect();
    assert_eq!(counts, vec![25088, 12544, 1024]);
    let keep: Vec<f64> = scales.iter().map(|s| s.keep_prob()).collect();
    assert_eq!(keep, vec![0.7, 0.6, 0.5]);
    assert_abs_diff_eq!(scales[0].scale(), 0.9945038070446002, epsilon = 1e-9);
    assert_abs_diff_eq!(scales[1].scale(), 0.9927292822432981, epsilon = 1e-9);
    assert_abs_diff_eq!(scales[2].scale(), 0.9750721941070205, epsilon = 1e-9);
    assert_eq!(
        model.dnn().output_shapes().unwrap(),
        vec![TensorShape::batched(&[10])]
    );
}

#[test]
fn test_logits_shape_in_both_modes() {
    let (handle, model) = common::model(28, 10, true, 0.);
    let images = common::images(2, 28, 1);
    let mut rng = common::rng(2);
    for is_training in [false, true] {
        let logits = model.logits(&images, handle.feed(is_training), &mut rng).unwrap();
        assert_eq!(logits.shape(), &[2, 10]);
        assert!(logits.iter().all(|x| x.is_finite()));
    }
}

#[test]
fn test_zero_penalty_loss_is_cross_entropy() {
    let (handle, model) = common::model(8, 4, true, 0.);
    assert!(model.weight_decay().is_empty());
    let logits = model
        .logits(&common::images(3, 8, 1), handle.feed(false), &mut common::rng(2))
        .unwrap();
    let labels = [0, 3, 1];
    let mut summary = RecordingSummaryWriter::default();
    let loss = model.loss(&logits, &labels, &mut summary).unwrap();
    assert_eq!(loss, cross_entropy_mean(&logits, &labels).unwrap());
    assert_eq!(summary.last("loss"), Some(loss));
}

#[test]
fn test_weight_decay_terms() {
    let (handle, model) = common::model(8, 4, true, 0.01);
    let names: Vec<&str> = model
        .weight_decay()
        .terms()
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["conv1/weight_loss", "conv2/weight_loss", "fc1/weight_loss"]
    );
    assert!(model.weight_decay().terms().iter().all(|(_, v)| *v > 0.));

    let logits = model
        .logits(&common::images(3, 8, 1), handle.feed(false), &mut common::rng(2))
        .unwrap();
    let labels = [0, 3, 1];
    let loss = model
        .loss(&logits, &labels, &mut RecordingSummaryWriter::default())
        .unwrap();
    assert_abs_diff_eq!(
        loss,
        cross_entropy_mean(&logits, &labels).unwrap() + model.weight_decay().sum(),
        epsilon = 1e-12
    );
}

#[test]
fn test_weight_decay_matches_layer_weights() {
    let (_, model) = common::model(8, 4, true, 0.01);
    let ops: Vec<_> = model
        .dnn()
        .get_graph()
        .get_operations()
        .iter()
        .map(|node| node.get_operation().as_any())
        .collect();
    let convs: Vec<&Conv> = ops.iter().filter_map(|op| op.downcast_ref::<Conv>()).collect();
    let denses: Vec<&Dense> = ops.iter().filter_map(|op| op.downcast_ref::<Dense>()).collect();
    assert_eq!(convs.len(), 2);
    assert_eq!(denses.len(), 2);

    let expected: Vec<f64> = convs
        .iter()
        .map(|conv| conv.kernel().mapv(|w| w * w).sum())
        .chain(std::iter::once(denses[0].weights().mapv(|w| w * w).sum()))
        .map(|sum_sq| 0.01 * sum_sq / 2.)
        .collect();
    let recorded: Vec<f64> = model.weight_decay().terms().iter().map(|(_, v)| *v).collect();
    assert_eq!(recorded.len(), expected.len());
    for (r, e) in recorded.iter().zip(&expected) {
        assert_abs_diff_eq!(*r, *e, epsilon = 1e-12);
    }

    assert!(convs.iter().all(|conv| conv.bias().iter().all(|&b| b == 0.)));
    assert!(denses.iter().all(|dense| dense.bias().iter().all(|&b| b == 0.)));
    assert_eq!(denses[1].weights().dim(), (1024, 4));
}

#[test]
fn test_weight_decay_independent_of_mode() {
    let mut rng = common::rng(0);
    let (_, fixed) = inference(
        &TensorShape::batched(&[8, 8, 1]),
        4,
        DropoutMode::Fixed(Phase::Train),
        0.01,
        &mut rng,
    )
    .unwrap();
    let (_, switchable) = common::model(8, 4, true, 0.01);
    assert_eq!(&fixed, switchable.weight_decay());
}

#[test]
fn test_switchable_mode() {
    let (handle, model) = common::model(8, 4, true, 0.);
    assert!(model.dnn().requires_mode());
    let images = common::images(2, 8, 1);

    let res = model.logits(&images, ModeFeed::default(), &mut common::rng(0));
    assert!(matches!(res, Err(ExecuteError::ModeNotFed)));

    let eval_a = model.logits(&images, handle.feed(false), &mut common::rng(0)).unwrap();
    let eval_b = model.logits(&images, handle.feed(false), &mut common::rng(1)).unwrap();
    assert_eq!(eval_a, eval_b);

    let train_a = model.logits(&images, handle.feed(true), &mut common::rng(0)).unwrap();
    let train_b = model.logits(&images, handle.feed(true), &mut common::rng(1)).unwrap();
    assert_ne!(train_a, train_b);
    assert_ne!(train_a, eval_a);
}

#[test]
fn test_fixed_eval_ignores_flag() {
    let (handle, model) = common::model(8, 4, false, 0.);
    assert_eq!(model.mode(), DropoutMode::Fixed(Phase::Eval));
    assert!(!model.dnn().requires_mode());
    let images = common::images(2, 8, 1);
    let unfed = model
        .logits(&images, ModeFeed::default(), &mut common::rng(0))
        .unwrap();
    for is_training in [false, true] {
        let fed = model
            .logits(&images, handle.feed(is_training), &mut common::rng(3))
            .unwrap();
        assert_eq!(fed, unfed);
    }
}

#[test]
fn test_json_round_trip() {
    let (handle, model) = common::model(8, 4, true, 0.01);
    let reloaded = Model::from_json(&model.to_json().unwrap()).unwrap();
    assert_eq!(reloaded.mode(), model.mode());
    assert_eq!(reloaded.weight_decay().len(), model.weight_decay().len());
    assert_eq!(reloaded.dnn().to_string(), model.dnn().to_string());

    let images = common::images(2, 8, 1);
    let before = model.logits(&images, handle.feed(false), &mut common::rng(0)).unwrap();
    let after = reloaded
        .logits(&images, handle.feed(false), &mut common::rng(0))
        .unwrap();
    assert_eq!(before, after);

    let scales = common::binomial_scales(&reloaded);
    assert_eq!(scales.len(), 3);
    for scale in scales {
        assert_eq!(
            scale.scale().to_bits(),
            binomial_scale(scale.num_neurons(), scale.keep_prob()).to_bits()
        );
    }
}
