pub mod clock;
pub mod input;
pub mod physics;
pub mod sampler;
pub mod session;
pub mod state;

pub use clock::{FrameTiming, SimulationClock};
pub use input::{FieldViewport, InputAction, InputState};
pub use sampler::{ControlIntent, InputSampler};
pub use session::Session;
pub use state::{GamePhase, Role, Side, SimulationState};
