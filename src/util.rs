//! Utility functions
use crate::NetFloat;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use ndarray::{Array, Dimension, ShapeBuilder};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::Rng;
use std::error::Error;

/// Samples `N(0, 2 / fan_in)` weights.
pub fn he_normal<Sh, D, R>(shape: Sh, fan_in: usize, rng: &mut R) -> Array<NetFloat, D>
where
    Sh: ShapeBuilder<Dim = D>,
    D: Dimension,
    R: Rng,
{
    let std = (2. / fan_in.max(1) as NetFloat).sqrt();
    Array::random_using(shape, StandardNormal, rng) * std
}

/// Routes the `log` facade to stderr through log4rs.
///
/// # Errors
/// If the configuration is rejected or a logger is already installed
pub fn init_logging(level: LevelFilter) -> Result<log4rs::Handle, Box<dyn Error>> {
    let stderr = ConsoleAppender::builder()
        .target(log4rs::append::console::Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%H:%M:%S%.3f)} {h({l:5})} {t} - {m}{n}",
        )))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))?;
    Ok(log4rs::init_config(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn test_he_normal_variance() {
        let mut rng = Pcg64::seed_from_u64(7);
        let fan_in = 50;
        let w: Array2<NetFloat> = he_normal((200, 200), fan_in, &mut rng);
        let mean = w.mean().unwrap();
        let var = w.mapv(|x| (x - mean).powi(2)).mean().unwrap();
        assert!(mean.abs() < 0.01, "mean {}", mean);
        assert!((var - 2. / fan_in as NetFloat).abs() < 0.005, "var {}", var);
    }
}
