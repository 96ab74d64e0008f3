pub mod fastforex;

pub use fastforex::FastForexProvider;
