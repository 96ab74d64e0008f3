//! Terminal front-end. Renders what the repository and refresh pipeline return.

pub mod convert;
pub mod currencies;
pub mod rates;
pub mod refresh;
pub mod setup;
pub mod trend;
pub mod ui;
