mod correlate;
mod fft;

pub use correlate::*;
pub use fft::*;
