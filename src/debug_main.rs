use binomial_dropout::dnn::DropoutMode;
use binomial_dropout::summary::LogSummaryWriter;
use binomial_dropout::util::init_logging;
use binomial_dropout::{get_model, ModelConfig};
use log::{info, LevelFilter};
use ndarray::{Array, IxDyn};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    init_logging(LevelFilter::Debug)?;
    let config = match std::env::args().nth(1) {
        Some(path) => ModelConfig::from_path(path)?,
        None => ModelConfig::default(),
    };
    info!("{:?}", config);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let (handle, model) = get_model(
        &config.image_shape(),
        config.num_classes,
        config.train_phase,
        config.l2_penalty,
        &mut rng,
    )?;
    for (name, value) in model.weight_decay().terms() {
        info!("{} = {}", name, value);
    }

    let images = Array::random_using(
        IxDyn(&[
            config.batch_size,
            config.input_height,
            config.input_width,
            config.input_channels,
        ]),
        Uniform::new(0., 1.),
        &mut rng,
    );
    let labels: Vec<usize> = (0..config.batch_size)
        .map(|_| rng.gen_range(0..config.num_classes))
        .collect();

    let mut phases = vec![false];
    if model.mode() == DropoutMode::Switchable {
        phases.push(true);
    }
    let mut summary = LogSummaryWriter;
    for is_training in phases {
        let logits = model.logits(&images, handle.feed(is_training), &mut rng)?;
        info!(
            "{}={}: logits mean {:?}, std {}",
            handle.name(),
            is_training,
            logits.mean(),
            logits.std(0.)
        );
        model.loss(&logits, &labels, &mut summary)?;
    }
    Ok(())
}
