pub mod candle;
pub mod forecast;
pub mod signal;

pub use candle::*;
pub use forecast::*;
pub use signal::*;
