//! LeNet classifier with binomial direct dropout after every hidden stage
use crate::dnn::{DNNBuilder, DropoutMode, Padding, Phase, DNN};
use crate::graph::{ExecuteError, ExecutionContext, GraphError};
use crate::losses::{total_loss, LossCollection, LossError};
use crate::summary::SummaryWriter;
use crate::tensorshape::TensorShape;
use crate::NetFloat;
use log::info;
use ndarray::ArrayD;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const MODE_HANDLE_NAME: &str = "is_training_";

/// Builds the forward pipeline on `[batch, H, W, C]` images.
///
/// Conv and hidden dense layers add `l2_penalty * sum(w^2) / 2` to the returned
/// collection when `l2_penalty` is non-zero. The final projection never does.
///
/// # Errors
/// If `images` is not rank 4 with known, positive `H`, `W` and `C`, or
/// `num_classes` is zero
pub fn inference<R: Rng>(
    images: &TensorShape,
    num_classes: usize,
    mode: DropoutMode,
    l2_penalty: NetFloat,
    rng: &mut R,
) -> Result<(DNN, LossCollection), GraphError> {
    let mut builder = DNNBuilder::new(images.clone());

    builder.conv("conv1", 5, 32, 1, Padding::Same, l2_penalty, rng)?;
    builder.relu("conv1")?;
    builder.binomial_direct_drop("conv1", 0.7, mode)?;
    builder.max_pool("pool1", 2, 2)?;

    builder.conv("conv2", 5, 64, 1, Padding::Same, l2_penalty, rng)?;
    builder.relu("conv2")?;
    builder.binomial_direct_drop("conv2", 0.6, mode)?;
    builder.max_pool("pool2", 2, 2)?;

    builder.flatten("pool2")?;
    builder.dense("fc1", 1024, l2_penalty, rng)?;
    builder.relu("fc1")?;
    builder.binomial_direct_drop("fc1", 0.5, mode)?;

    builder.dense("softmax_linear", num_classes, 0., rng)?;
    Ok(builder.build())
}

/// Name of the mode flag fed to switchable models.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeHandle {
    name: String,
}

impl Default for ModeHandle {
    fn default() -> Self {
        Self {
            name: MODE_HANDLE_NAME.to_string(),
        }
    }
}

impl ModeHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn feed(&self, is_training: bool) -> ModeFeed {
        ModeFeed {
            is_training: Some(is_training),
        }
    }
}

/// Value of the mode flag for one run. The default feeds nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModeFeed {
    is_training: Option<bool>,
}

impl ModeFeed {
    pub const fn is_training(&self) -> Option<bool> {
        self.is_training
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Model {
    dnn: DNN,
    weight_decay: LossCollection,
    mode: DropoutMode,
}

impl Model {
    pub const fn dnn(&self) -> &DNN {
        &self.dnn
    }

    pub const fn weight_decay(&self) -> &LossCollection {
        &self.weight_decay
    }

    pub const fn mode(&self) -> DropoutMode {
        self.mode
    }

    /// Raw class scores, one row per image.
    ///
    /// # Errors
    /// `ModeNotFed` if the model is switchable and `feed` is empty, or any
    /// error raised while running the network
    pub fn logits(
        &self,
        images: &ArrayD<NetFloat>,
        feed: ModeFeed,
        rng: &mut dyn RngCore,
    ) -> Result<ArrayD<NetFloat>, ExecuteError> {
        let mut ctx = ExecutionContext::new(feed.is_training(), rng);
        let mut outputs = self.dnn.forward(std::slice::from_ref(images), &mut ctx)?;
        outputs
            .pop()
            .ok_or_else(|| ExecuteError::OneOfRepresentationsNotExist {
                repr_ids: self.dnn.get_output_representation_ids().clone(),
            })
    }

    /// # Errors
    /// See `losses::total_loss`
    pub fn loss(
        &self,
        logits: &ArrayD<NetFloat>,
        labels: &[usize],
        summary: &mut dyn SummaryWriter,
    ) -> Result<NetFloat, LossError> {
        total_loss(logits, labels, &self.weight_decay, summary)
    }

    /// # Errors
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// # Errors
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Builds the classifier and the handle used to feed its mode flag.
///
/// With `train_phase` every dropout site carries both branches and the fed
/// flag picks one per run. Without it only the evaluation branch is built and
/// the flag is ignored.
///
/// # Errors
/// See `inference`
pub fn get_model<R: Rng>(
    images: &TensorShape,
    num_classes: usize,
    train_phase: bool,
    l2_penalty: NetFloat,
    rng: &mut R,
) -> Result<(ModeHandle, Model), GraphError> {
    let mode = if train_phase {
        DropoutMode::Switchable
    } else {
        DropoutMode::Fixed(Phase::Eval)
    };
    let (dnn, weight_decay) = inference(images, num_classes, mode, l2_penalty, rng)?;
    info!(
        "built model with {} parameters and {} weight-decay terms: {}",
        dnn.num_params(),
        weight_decay.len(),
        dnn
    );
    Ok((
        ModeHandle::default(),
        Model {
            dnn,
            weight_decay,
            mode,
        },
    ))
}

#[derive(Debug)]
pub enum ConfigError {
    Io { err: std::io::Error },
    Json { err: serde_json::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io { err } => write!(f, "cannot read config: {}", err),
            Self::Json { err } => write!(f, "cannot parse config: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io { err }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json { err }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub input_height: usize,
    pub input_width: usize,
    pub input_channels: usize,
    pub num_classes: usize,
    pub train_phase: bool,
    pub l2_penalty: NetFloat,
    pub batch_size: usize,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_height: 28,
            input_width: 28,
            input_channels: 1,
            num_classes: 10,
            train_phase: true,
            l2_penalty: 0.,
            batch_size: 8,
            seed: 0,
        }
    }
}

impl ModelConfig {
    /// # Errors
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn image_shape(&self) -> TensorShape {
        TensorShape::batched(&[self.input_height, self.input_width, self.input_channels])
    }
}
