pub mod builder;
pub mod conv;
pub mod dense;
pub mod dnn;
pub mod dropout;
pub mod flatten;
pub mod maxpool;
pub mod relu;

pub use builder::DNNBuilder;
pub use conv::{Conv, Padding};
pub use dense::Dense;
pub use dnn::DNN;
pub use dropout::{binomial_direct_drop, BinomialScale, DirectDropout, DropoutMode, Phase};
pub use flatten::Flatten;
pub use maxpool::MaxPool;
pub use relu::ReLU;
