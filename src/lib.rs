pub mod card;
pub mod card_info;
pub mod chunk;
pub mod config;
pub mod device;
pub mod dma;
pub mod driver;
pub mod error;
pub mod register;
pub mod regs;
pub mod sim;
#[cfg(feature = "spcm")]
pub mod spcm;
pub mod stream;
pub mod trigger;
pub mod tui;
pub mod utils;
pub mod writer;

pub use card::*;
pub use chunk::*;
pub use config::*;
pub use device::*;
pub use dma::*;
pub use driver::*;
pub use error::*;
pub use register::*;
pub use sim::*;
#[cfg(feature = "spcm")]
pub use spcm::*;
pub use stream::*;
pub use trigger::*;
pub use tui::*;
pub use utils::*;
pub use writer::*;
