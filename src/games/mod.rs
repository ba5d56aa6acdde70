pub mod crash;
pub mod dice;
pub mod service;
pub mod slots;
pub mod types;

pub use crash::{CrashManager, CrashRound, CrashSnapshot, CrashState};
pub use dice::DiceEngine;
pub use service::GameService;
pub use slots::SlotsEngine;
pub use types::*;
