use std::collections::HashSet;

use tracing::debug;
use winit::event::{ElementState, KeyEvent, MouseButton};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::math::Vec2;
use crate::sim::{CommandSender, SandboxCommand};

const GRAVITY_NUDGE: f32 = 1.0;

/// What a key press means to the loop runner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum KeyBinding {
    Command(SandboxCommand),
    ToggleOverlay,
    Quit,
}

pub(crate) fn binding_for_key(key: KeyCode) -> Option<KeyBinding> {
    let command = match key {
        KeyCode::Space => SandboxCommand::AddShape { at: None },
        KeyCode::KeyC => SandboxCommand::AddCalmShape { at: None },
        KeyCode::Backspace | KeyCode::Delete => SandboxCommand::DeleteOne,
        KeyCode::KeyX => SandboxCommand::DeleteAll,
        KeyCode::Equal | KeyCode::NumpadAdd => SandboxCommand::IncreaseStepRate,
        KeyCode::Minus | KeyCode::NumpadSubtract => SandboxCommand::DecreaseStepRate,
        KeyCode::KeyD => SandboxCommand::ToggleDebugLines,
        KeyCode::KeyI => SandboxCommand::ToggleInterpolation,
        KeyCode::KeyB => SandboxCommand::ToggleBullet,
        KeyCode::PageUp => SandboxCommand::AdjustGravity {
            dy: -GRAVITY_NUDGE,
        },
        KeyCode::PageDown => SandboxCommand::AdjustGravity { dy: GRAVITY_NUDGE },
        KeyCode::F3 => return Some(KeyBinding::ToggleOverlay),
        KeyCode::Escape => return Some(KeyBinding::Quit),
        _ => return None,
    };
    Some(KeyBinding::Command(command))
}

/// Turns raw window events into queued sandbox commands. Keys and the left
/// mouse button fire once per press; holding them does not repeat.
#[derive(Debug)]
pub(crate) struct InputCollector {
    sender: CommandSender,
    quit_requested: bool,
    keys_down: HashSet<KeyCode>,
    overlay_toggle_pressed_edge: bool,
    left_mouse_is_down: bool,
    cursor_position_px: Option<Vec2>,
}

impl InputCollector {
    pub(crate) fn new(sender: CommandSender) -> Self {
        Self {
            sender,
            quit_requested: false,
            keys_down: HashSet::new(),
            overlay_toggle_pressed_edge: false,
            left_mouse_is_down: false,
            cursor_position_px: None,
        }
    }

    pub(crate) fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    pub(crate) fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub(crate) fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        if let PhysicalKey::Code(code) = key_event.physical_key {
            self.handle_key_state(code, key_event.state);
        }
    }

    pub(crate) fn handle_key_state(&mut self, key: KeyCode, state: ElementState) {
        let pressed_edge = match state {
            ElementState::Pressed => self.keys_down.insert(key),
            ElementState::Released => {
                self.keys_down.remove(&key);
                false
            }
        };
        if !pressed_edge {
            return;
        }

        match binding_for_key(key) {
            Some(KeyBinding::Command(command)) => self.send(command),
            Some(KeyBinding::ToggleOverlay) => self.overlay_toggle_pressed_edge = true,
            Some(KeyBinding::Quit) => self.mark_quit_requested(),
            None => {}
        }
    }

    pub(crate) fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState) {
        if button != MouseButton::Left {
            return;
        }
        match state {
            ElementState::Pressed => {
                if !self.left_mouse_is_down {
                    self.send(SandboxCommand::AddShape {
                        at: self.cursor_position_px,
                    });
                }
                self.left_mouse_is_down = true;
            }
            ElementState::Released => self.left_mouse_is_down = false,
        }
    }

    pub(crate) fn set_cursor_position_px(&mut self, x: f32, y: f32) {
        self.cursor_position_px = Some(Vec2::new(x, y));
    }

    pub(crate) fn clear_cursor_position(&mut self) {
        self.cursor_position_px = None;
    }

    pub(crate) fn take_overlay_toggle_pressed(&mut self) -> bool {
        let was_pressed = self.overlay_toggle_pressed_edge;
        self.overlay_toggle_pressed_edge = false;
        was_pressed
    }

    fn send(&self, command: SandboxCommand) {
        if !self.sender.send(command) {
            debug!(?command, "command_dropped_loop_closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{command_channel, CommandQueue};

    fn collector() -> (InputCollector, CommandQueue) {
        let (sender, queue) = command_channel();
        (InputCollector::new(sender), queue)
    }

    #[test]
    fn key_press_sends_mapped_command() {
        let (mut input, queue) = collector();
        input.handle_key_state(KeyCode::KeyX, ElementState::Pressed);
        input.handle_key_state(KeyCode::Space, ElementState::Pressed);

        assert_eq!(
            queue.drain(),
            vec![
                SandboxCommand::DeleteAll,
                SandboxCommand::AddShape { at: None }
            ]
        );
    }

    #[test]
    fn held_key_does_not_repeat_command() {
        let (mut input, queue) = collector();

        input.handle_key_state(KeyCode::Equal, ElementState::Pressed);
        input.handle_key_state(KeyCode::Equal, ElementState::Pressed);
        assert_eq!(queue.drain(), vec![SandboxCommand::IncreaseStepRate]);

        input.handle_key_state(KeyCode::Equal, ElementState::Released);
        input.handle_key_state(KeyCode::Equal, ElementState::Pressed);
        assert_eq!(queue.drain(), vec![SandboxCommand::IncreaseStepRate]);
    }

    #[test]
    fn alternate_keys_share_a_command() {
        assert_eq!(
            binding_for_key(KeyCode::Delete),
            binding_for_key(KeyCode::Backspace)
        );
        assert_eq!(
            binding_for_key(KeyCode::NumpadSubtract),
            Some(KeyBinding::Command(SandboxCommand::DecreaseStepRate))
        );
        assert_eq!(binding_for_key(KeyCode::KeyQ), None);
    }

    #[test]
    fn gravity_keys_nudge_vertical_axis() {
        assert_eq!(
            binding_for_key(KeyCode::PageDown),
            Some(KeyBinding::Command(SandboxCommand::AdjustGravity { dy: 1.0 }))
        );
        assert_eq!(
            binding_for_key(KeyCode::PageUp),
            Some(KeyBinding::Command(SandboxCommand::AdjustGravity { dy: -1.0 }))
        );
    }

    #[test]
    fn f3_toggle_is_edge_triggered() {
        let (mut input, queue) = collector();

        input.handle_key_state(KeyCode::F3, ElementState::Pressed);
        assert!(input.take_overlay_toggle_pressed());

        input.handle_key_state(KeyCode::F3, ElementState::Pressed);
        assert!(!input.take_overlay_toggle_pressed());

        input.handle_key_state(KeyCode::F3, ElementState::Released);
        input.handle_key_state(KeyCode::F3, ElementState::Pressed);
        assert!(input.take_overlay_toggle_pressed());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn escape_requests_quit() {
        let (mut input, _queue) = collector();
        assert!(!input.quit_requested());
        input.handle_key_state(KeyCode::Escape, ElementState::Pressed);
        assert!(input.quit_requested());
    }

    #[test]
    fn left_click_spawns_at_cursor() {
        let (mut input, queue) = collector();
        input.set_cursor_position_px(100.0, 200.0);
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);

        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        let SandboxCommand::AddShape { at: Some(at) } = drained[0] else {
            panic!("expected AddShape at cursor, got {:?}", drained[0]);
        };
        assert!((at.x - 100.0).abs() < 0.0001);
        assert!((at.y - 200.0).abs() < 0.0001);
    }

    #[test]
    fn held_left_click_does_not_repeat() {
        let (mut input, queue) = collector();
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);
        input.handle_mouse_input(MouseButton::Right, ElementState::Pressed);

        assert_eq!(queue.drain(), vec![SandboxCommand::AddShape { at: None }]);
    }

    #[test]
    fn click_after_cursor_left_has_no_position() {
        let (mut input, queue) = collector();
        input.set_cursor_position_px(5.0, 5.0);
        input.clear_cursor_position();
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);

        assert_eq!(queue.drain(), vec![SandboxCommand::AddShape { at: None }]);
    }
}
