pub mod classifier_trait;
pub mod factory;
pub mod forest;
pub mod gbdt;
pub mod logistic;
pub mod stacking;
pub mod svm;
pub mod tree;
pub mod utils;

pub use classifier_trait::ClassifierModel;
