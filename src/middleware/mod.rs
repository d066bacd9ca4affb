pub mod request_gate;

pub use request_gate::{GateState, RequestGate};
