//! Gamepad polling through gilrs.
//!
//! Each frame the runner drains gilrs' event queue (which updates its cached
//! state) and copies the first [`MAX_GAMEPADS`] connected pads into the raw
//! input state; [`InputState::refresh`] then picks them up with the rest of
//! the frame's input.

use gilrs::{Axis, Button, Gamepad, Gilrs};
use glam::Vec2;
use log::{debug, warn};

use crate::input::{apply_deadzone, GamepadButton, GamepadState, InputState, MAX_GAMEPADS, STICK_DEADZONE};

const BUTTON_MAP: [(Button, GamepadButton); 14] = [
    (Button::South, GamepadButton::A),
    (Button::East, GamepadButton::B),
    (Button::West, GamepadButton::X),
    (Button::North, GamepadButton::Y),
    (Button::LeftTrigger, GamepadButton::LeftShoulder),
    (Button::RightTrigger, GamepadButton::RightShoulder),
    (Button::Select, GamepadButton::Back),
    (Button::Start, GamepadButton::Start),
    (Button::LeftThumb, GamepadButton::LeftStick),
    (Button::RightThumb, GamepadButton::RightStick),
    (Button::DPadUp, GamepadButton::DPadUp),
    (Button::DPadDown, GamepadButton::DPadDown),
    (Button::DPadLeft, GamepadButton::DPadLeft),
    (Button::DPadRight, GamepadButton::DPadRight),
];

pub struct GamepadPoller {
    gilrs: Option<Gilrs>,
}

impl GamepadPoller {
    /// Without a usable backend the poller stays inert and every pad
    /// reports disconnected.
    pub fn new() -> Self {
        let gilrs = match Gilrs::new() {
            Ok(gilrs) => Some(gilrs),
            Err(err) => {
                warn!("gamepad support unavailable: {err}");
                None
            }
        };
        Self { gilrs }
    }

    pub fn is_available(&self) -> bool {
        self.gilrs.is_some()
    }

    pub fn poll(&mut self, input: &mut InputState) {
        let Some(gilrs) = self.gilrs.as_mut() else {
            return;
        };
        while let Some(event) = gilrs.next_event() {
            debug!("gamepad event {:?} from {:?}", event.event, event.id);
        }

        let mut states = [GamepadState::default(); MAX_GAMEPADS];
        for (slot, (_, gamepad)) in gilrs.gamepads().take(MAX_GAMEPADS).enumerate() {
            states[slot] = read_state(&gamepad);
        }
        for (index, state) in states.into_iter().enumerate() {
            input.set_gamepad(index, state);
        }
    }
}

impl Default for GamepadPoller {
    fn default() -> Self {
        Self::new()
    }
}

fn read_state(gamepad: &Gamepad<'_>) -> GamepadState {
    let mut state = GamepadState {
        connected: gamepad.is_connected(),
        ..GamepadState::default()
    };
    for (button, mapped) in BUTTON_MAP {
        state.set_button(mapped, gamepad.is_pressed(button));
    }
    state.left_stick = stick(gamepad, Axis::LeftStickX, Axis::LeftStickY);
    state.right_stick = stick(gamepad, Axis::RightStickX, Axis::RightStickY);
    state.left_trigger = trigger(gamepad, Button::LeftTrigger2);
    state.right_trigger = trigger(gamepad, Button::RightTrigger2);
    state
}

fn stick(gamepad: &Gamepad<'_>, x: Axis, y: Axis) -> Vec2 {
    Vec2::new(
        apply_deadzone(gamepad.value(x), STICK_DEADZONE),
        apply_deadzone(gamepad.value(y), STICK_DEADZONE),
    )
}

fn trigger(gamepad: &Gamepad<'_>, button: Button) -> f32 {
    gamepad
        .button_data(button)
        .map(|data| data.value())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0)
}
