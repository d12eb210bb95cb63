pub mod category;

pub use category::CategoryClassifier;
