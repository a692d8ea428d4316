//! Defines a mock for the state object

use system_bus::SystemBus;

use crate::State;

/// Build an empty state on a fresh bus
pub fn mock_state() -> State {
    State::new(SystemBus::new())
}
