use std::collections::{HashMap, HashSet};

use glam::Vec2;
use winit::{
    event::{ElementState, MouseButton},
    keyboard::KeyCode,
};

use crate::camera::Camera;

pub const MAX_GAMEPADS: usize = 4;
pub const STICK_DEADZONE: f32 = 0.15;

/// Mouse buttons tracked by the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseKey {
    Left,
    Middle,
    Right,
}

impl MouseKey {
    const ALL: [MouseKey; 3] = [MouseKey::Left, MouseKey::Middle, MouseKey::Right];

    fn index(self) -> usize {
        self as usize
    }

    fn from_winit(button: MouseButton) -> Option<Self> {
        match button {
            MouseButton::Left => Some(MouseKey::Left),
            MouseButton::Middle => Some(MouseKey::Middle),
            MouseButton::Right => Some(MouseKey::Right),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GamepadButton {
    A,
    B,
    X,
    Y,
    LeftShoulder,
    RightShoulder,
    Back,
    Start,
    LeftStick,
    RightStick,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
}

impl GamepadButton {
    pub const ALL: [GamepadButton; 14] = [
        GamepadButton::A,
        GamepadButton::B,
        GamepadButton::X,
        GamepadButton::Y,
        GamepadButton::LeftShoulder,
        GamepadButton::RightShoulder,
        GamepadButton::Back,
        GamepadButton::Start,
        GamepadButton::LeftStick,
        GamepadButton::RightStick,
        GamepadButton::DPadUp,
        GamepadButton::DPadDown,
        GamepadButton::DPadLeft,
        GamepadButton::DPadRight,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// State of one gamepad for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GamepadState {
    pub connected: bool,
    pub(crate) buttons: u16,
    pub left_stick: Vec2,
    pub right_stick: Vec2,
    pub left_trigger: f32,
    pub right_trigger: f32,
}

impl GamepadState {
    pub fn is_button_down(&self, button: GamepadButton) -> bool {
        self.buttons & button.bit() != 0
    }

    pub fn set_button(&mut self, button: GamepadButton, down: bool) {
        if down {
            self.buttons |= button.bit();
        } else {
            self.buttons &= !button.bit();
        }
    }
}

/// Zero small stick deflections and rescale the rest to `0.0..=1.0`.
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        let sign = value.signum();
        sign * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}

/// Edge event produced by [`InputState::refresh`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    KeyPressed(KeyCode),
    KeyReleased(KeyCode),
    MousePressed(MouseKey),
    MouseReleased(MouseKey),
    ButtonPressed { gamepad: usize, button: GamepadButton },
    ButtonReleased { gamepad: usize, button: GamepadButton },
}

#[derive(Clone, Debug, Default)]
struct Snapshot {
    keys: HashSet<KeyCode>,
    mouse_position: Vec2,
    mouse_buttons: [bool; 3],
    wheel: f32,
    gamepads: [GamepadState; MAX_GAMEPADS],
}

/// Per-frame input snapshot.
///
/// Window events are accumulated as they arrive; [`InputState::refresh`]
/// promotes them into the frame snapshot once per frame, so every query
/// within a frame sees the same values.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    raw: Snapshot,
    current: Snapshot,
    previous: Snapshot,
    events: Vec<InputEvent>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame: take the accumulated raw state as current and
    /// record the edges against the previous frame.
    pub fn refresh(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.raw.clone());
        self.events.clear();

        let pressed = self.current.keys.difference(&self.previous.keys);
        self.events.extend(pressed.copied().map(InputEvent::KeyPressed));
        let released = self.previous.keys.difference(&self.current.keys);
        self.events.extend(released.copied().map(InputEvent::KeyReleased));

        for key in MouseKey::ALL {
            let (now, before) = (
                self.current.mouse_buttons[key.index()],
                self.previous.mouse_buttons[key.index()],
            );
            if now && !before {
                self.events.push(InputEvent::MousePressed(key));
            } else if !now && before {
                self.events.push(InputEvent::MouseReleased(key));
            }
        }

        for gamepad in 0..MAX_GAMEPADS {
            for button in GamepadButton::ALL {
                let now = self.current.gamepads[gamepad].is_button_down(button);
                let before = self.previous.gamepads[gamepad].is_button_down(button);
                if now && !before {
                    self.events.push(InputEvent::ButtonPressed { gamepad, button });
                } else if !now && before {
                    self.events.push(InputEvent::ButtonReleased { gamepad, button });
                }
            }
        }
    }

    /// Edge events recorded by the last refresh.
    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    /// Handle a keyboard input event from winit.
    pub fn handle_key(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.raw.keys.insert(key);
            }
            ElementState::Released => {
                self.raw.keys.remove(&key);
            }
        }
    }

    /// Handle a mouse button input event from winit.
    pub fn handle_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        if let Some(key) = MouseKey::from_winit(button) {
            self.raw.mouse_buttons[key.index()] = state == ElementState::Pressed;
        }
    }

    /// Handle mouse cursor movement from winit.
    pub fn handle_cursor_moved(&mut self, x: f64, y: f64) {
        self.raw.mouse_position = Vec2::new(x as f32, y as f32);
    }

    /// Accumulate wheel movement, in lines.
    pub fn handle_wheel(&mut self, delta: f32) {
        self.raw.wheel += delta;
    }

    pub fn set_gamepad(&mut self, index: usize, state: GamepadState) {
        if let Some(slot) = self.raw.gamepads.get_mut(index) {
            *slot = state;
        }
    }

    /// Returns true if the key is currently held down.
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.current.keys.contains(&key)
    }

    /// Returns true if the key was pressed this frame.
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.is_key_down(key) && !self.previous.keys.contains(&key)
    }

    /// Returns true if the key was released this frame.
    pub fn is_key_released(&self, key: KeyCode) -> bool {
        !self.is_key_down(key) && self.previous.keys.contains(&key)
    }

    pub fn is_mouse_down(&self, button: MouseKey) -> bool {
        self.current.mouse_buttons[button.index()]
    }

    pub fn is_mouse_pressed(&self, button: MouseKey) -> bool {
        self.is_mouse_down(button) && !self.previous.mouse_buttons[button.index()]
    }

    pub fn is_mouse_released(&self, button: MouseKey) -> bool {
        !self.is_mouse_down(button) && self.previous.mouse_buttons[button.index()]
    }

    /// Current mouse cursor position in logical pixels.
    pub fn mouse_position(&self) -> Vec2 {
        self.current.mouse_position
    }

    /// Cursor movement since the previous frame.
    pub fn mouse_speed(&self) -> Vec2 {
        self.current.mouse_position - self.previous.mouse_position
    }

    /// Cursor position in scene space as seen through `camera`.
    pub fn scene_mouse_position(&self, camera: &Camera) -> Vec2 {
        camera.screen_to_world(self.current.mouse_position)
    }

    /// Accumulated wheel position.
    pub fn wheel_position(&self) -> f32 {
        self.current.wheel
    }

    pub fn wheel_speed(&self) -> f32 {
        self.current.wheel - self.previous.wheel
    }

    /// State of gamepad `index`; disconnected default beyond the limit.
    pub fn gamepad(&self, index: usize) -> GamepadState {
        self.current.gamepads.get(index).copied().unwrap_or_default()
    }

    pub fn is_button_down(&self, gamepad: usize, button: GamepadButton) -> bool {
        self.gamepad(gamepad).is_button_down(button)
    }

    pub fn is_button_pressed(&self, gamepad: usize, button: GamepadButton) -> bool {
        self.events
            .contains(&InputEvent::ButtonPressed { gamepad, button })
    }
}

/// A logical input action (e.g. "throttle", "jump").
///
/// This is a lightweight, data-driven layer on top of `InputState`.
/// Game code binds one or more physical inputs to each action and then
/// queries the action state instead of referencing key codes directly.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActionId(pub String);

impl ActionId {
    /// Create a new action identifier from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        ActionId(name.into())
    }
}

/// A physical button that can be bound to an action or axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    Key(KeyCode),
    Mouse(MouseKey),
    Gamepad(usize, GamepadButton),
}

impl Button {
    fn is_down(self, input: &InputState) -> bool {
        match self {
            Button::Key(k) => input.is_key_down(k),
            Button::Mouse(b) => input.is_mouse_down(b),
            Button::Gamepad(pad, b) => input.is_button_down(pad, b),
        }
    }

    fn is_pressed(self, input: &InputState) -> bool {
        match self {
            Button::Key(k) => input.is_key_pressed(k),
            Button::Mouse(b) => input.is_mouse_pressed(b),
            Button::Gamepad(pad, b) => input.is_button_pressed(pad, b),
        }
    }
}

/// A one-dimensional axis binding (e.g. -1..1 throttle).
#[derive(Clone, Debug)]
pub struct AxisBinding {
    pub negative: Vec<Button>,
    pub positive: Vec<Button>,
}

impl AxisBinding {
    pub fn new(negative: Vec<Button>, positive: Vec<Button>) -> Self {
        Self { negative, positive }
    }
}

/// High-level input mapping from actions/axes to physical inputs.
#[derive(Clone, Debug, Default)]
pub struct InputMap {
    actions: HashMap<ActionId, Vec<Button>>,
    axes: HashMap<ActionId, AxisBinding>,
}

impl InputMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, action: ActionId, button: Button) {
        self.actions.entry(action).or_default().push(button);
    }

    /// Define or replace an axis binding.
    pub fn set_axis(&mut self, axis: ActionId, binding: AxisBinding) {
        self.axes.insert(axis, binding);
    }

    /// Check if an action is currently held down.
    pub fn action_down(&self, input: &InputState, action: &ActionId) -> bool {
        self.actions
            .get(action)
            .map(|buttons| buttons.iter().any(|&b| b.is_down(input)))
            .unwrap_or(false)
    }

    /// Check if an action was pressed this frame.
    pub fn action_pressed(&self, input: &InputState, action: &ActionId) -> bool {
        self.actions
            .get(action)
            .map(|buttons| buttons.iter().any(|&b| b.is_pressed(input)))
            .unwrap_or(false)
    }

    /// Get the value of an axis in the range [-1.0, 1.0].
    ///
    /// If both sides are pressed, they cancel out.
    pub fn axis(&self, input: &InputState, axis: &ActionId) -> f32 {
        let Some(binding) = self.axes.get(axis) else {
            return 0.0;
        };
        let mut value = 0.0;
        if binding.negative.iter().any(|&b| b.is_down(input)) {
            value -= 1.0;
        }
        if binding.positive.iter().any(|&b| b.is_down(input)) {
            value += 1.0;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_raw_events_apply_on_refresh() {
        let mut input = InputState::new();
        input.handle_key(KeyCode::Space, ElementState::Pressed);
        assert!(!input.is_key_down(KeyCode::Space));

        input.refresh();
        assert!(input.is_key_down(KeyCode::Space));
        assert!(input.is_key_pressed(KeyCode::Space));
        assert_eq!(input.events(), &[InputEvent::KeyPressed(KeyCode::Space)]);

        input.refresh();
        assert!(input.is_key_down(KeyCode::Space));
        assert!(!input.is_key_pressed(KeyCode::Space));
        assert!(input.events().is_empty());

        input.handle_key(KeyCode::Space, ElementState::Released);
        input.refresh();
        assert!(input.is_key_released(KeyCode::Space));
    }

    #[test]
    fn test_mouse_speed_and_wheel() {
        let mut input = InputState::new();
        input.handle_cursor_moved(10.0, 10.0);
        input.refresh();
        input.handle_cursor_moved(15.0, 7.0);
        input.handle_wheel(2.0);
        input.refresh();
        assert_eq!(input.mouse_speed(), Vec2::new(5.0, -3.0));
        assert_relative_eq!(input.wheel_speed(), 2.0);
        assert_relative_eq!(input.wheel_position(), 2.0);
    }

    #[test]
    fn test_mouse_button_edges() {
        let mut input = InputState::new();
        input.handle_mouse_button(MouseButton::Right, ElementState::Pressed);
        input.refresh();
        assert!(input.is_mouse_pressed(MouseKey::Right));
        assert!(input.events().contains(&InputEvent::MousePressed(MouseKey::Right)));
        input.handle_mouse_button(MouseButton::Right, ElementState::Released);
        input.refresh();
        assert!(input.is_mouse_released(MouseKey::Right));
    }

    #[test]
    fn test_gamepad_button_events() {
        let mut input = InputState::new();
        let mut pad = GamepadState {
            connected: true,
            ..GamepadState::default()
        };
        pad.set_button(GamepadButton::Start, true);
        input.set_gamepad(1, pad);
        input.refresh();
        assert!(input.is_button_pressed(1, GamepadButton::Start));
        assert!(!input.is_button_down(0, GamepadButton::Start));

        pad.set_button(GamepadButton::Start, false);
        input.set_gamepad(1, pad);
        input.refresh();
        assert_eq!(
            input.events(),
            &[InputEvent::ButtonReleased {
                gamepad: 1,
                button: GamepadButton::Start
            }]
        );
    }

    #[test]
    fn test_scene_mouse_position_uses_camera() {
        let mut input = InputState::new();
        let mut camera = Camera::new(Vec2::new(200.0, 100.0));
        camera.position = Vec2::new(50.0, 0.0);
        input.handle_cursor_moved(10.0, 20.0);
        input.refresh();
        let scene = input.scene_mouse_position(&camera);
        assert_relative_eq!(scene.x, 60.0, epsilon = 1e-4);
        assert_relative_eq!(scene.y, 20.0, epsilon = 1e-4);
    }

    #[test]
    fn test_deadzone() {
        assert_eq!(apply_deadzone(0.1, STICK_DEADZONE), 0.0);
        assert_relative_eq!(apply_deadzone(1.0, STICK_DEADZONE), 1.0);
        assert_relative_eq!(apply_deadzone(-1.0, STICK_DEADZONE), -1.0);
    }

    #[test]
    fn test_axis_binding() {
        let mut input = InputState::new();
        let mut map = InputMap::new();
        let throttle = ActionId::new("throttle");
        map.set_axis(
            throttle.clone(),
            AxisBinding::new(
                vec![Button::Key(KeyCode::ArrowDown)],
                vec![Button::Key(KeyCode::ArrowUp)],
            ),
        );
        input.handle_key(KeyCode::ArrowUp, ElementState::Pressed);
        input.refresh();
        assert_relative_eq!(map.axis(&input, &throttle), 1.0);
    }
}
