use crate::navigation::Action;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseEventKind};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonEdges {
    pub select: bool,
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Everything the controls reported since the previous poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputFrame {
    pub quit: bool,
    pub back: bool,
    pub encoder_delta: i32,
    pub buttons: ButtonEdges,
}

impl InputFrame {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Translates the frame into navigation actions, encoder first.
    pub fn actions(&self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.encoder_delta != 0 {
            actions.push(Action::Encoder(self.encoder_delta));
        }
        if self.buttons.select {
            actions.push(Action::Select);
        }
        if self.back || self.buttons.up {
            actions.push(Action::Back);
        }
        if self.buttons.down {
            actions.push(Action::TogglePause);
        }
        if self.buttons.left {
            actions.push(Action::Previous);
        }
        if self.buttons.right {
            actions.push(Action::Next);
        }
        actions
    }
}

pub trait InputDevice {
    fn poll(&mut self) -> Result<InputFrame>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Button {
    Select,
    Up,
    Down,
    Left,
    Right,
    Back,
}

impl Button {
    const COUNT: usize = 6;

    fn slot(self) -> usize {
        self as usize
    }
}

/// Per-button cooldown. A press inside the window after the last accepted
/// press of the same button is dropped. Encoder ticks pass through untouched.
#[derive(Debug, Clone)]
pub struct Debouncer {
    cooldown: Duration,
    last_accepted: [Option<Duration>; Button::COUNT],
}

impl Debouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: [None; Button::COUNT],
        }
    }

    fn accept(&mut self, button: Button, pressed: bool, now: Duration) -> bool {
        if !pressed {
            return false;
        }
        let slot = &mut self.last_accepted[button.slot()];
        if let Some(last) = *slot
            && now.saturating_sub(last) < self.cooldown
        {
            return false;
        }
        *slot = Some(now);
        true
    }

    pub fn filter(&mut self, frame: InputFrame, now: Duration) -> InputFrame {
        InputFrame {
            quit: frame.quit,
            back: self.accept(Button::Back, frame.back, now),
            encoder_delta: frame.encoder_delta,
            buttons: ButtonEdges {
                select: self.accept(Button::Select, frame.buttons.select, now),
                up: self.accept(Button::Up, frame.buttons.up, now),
                down: self.accept(Button::Down, frame.buttons.down, now),
                left: self.accept(Button::Left, frame.buttons.left, now),
                right: self.accept(Button::Right, frame.buttons.right, now),
            },
        }
    }
}

/// Keyboard and mouse wheel stand in for the encoder and buttons.
///
/// Up/Down arrows and the wheel turn the encoder, Enter selects, `u` is the
/// up button, Space or `d` the down button, Left/Right the side buttons,
/// `r` or Backspace go back, and `q` or Ctrl+C quit.
#[derive(Debug, Default)]
pub struct TerminalInput;

impl TerminalInput {
    pub fn new() -> Self {
        Self
    }
}

impl InputDevice for TerminalInput {
    fn poll(&mut self) -> Result<InputFrame> {
        let mut frame = InputFrame::default();
        while event::poll(Duration::ZERO)? {
            apply_event(&mut frame, event::read()?);
        }
        Ok(frame)
    }
}

fn apply_event(frame: &mut InputFrame, event: Event) {
    match event {
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollDown => frame.encoder_delta += 1,
            MouseEventKind::ScrollUp => frame.encoder_delta -= 1,
            _ => {}
        },
        Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                frame.quit = true;
            }
            KeyCode::Char('q') | KeyCode::Esc => frame.quit = true,
            KeyCode::Down => frame.encoder_delta += 1,
            KeyCode::Up => frame.encoder_delta -= 1,
            KeyCode::Enter => frame.buttons.select = true,
            KeyCode::Char('u') => frame.buttons.up = true,
            KeyCode::Char(' ') | KeyCode::Char('d') => frame.buttons.down = true,
            KeyCode::Left => frame.buttons.left = true,
            KeyCode::Right => frame.buttons.right = true,
            KeyCode::Char('r') | KeyCode::Backspace => frame.back = true,
            _ => {}
        },
        _ => {}
    }
}

/// Replays canned frames, then reports nothing.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    frames: VecDeque<InputFrame>,
}

impl ScriptedInput {
    pub fn new(frames: impl IntoIterator<Item = InputFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn push(&mut self, frame: InputFrame) {
        self.frames.push_back(frame);
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl InputDevice for ScriptedInput {
    fn poll(&mut self) -> Result<InputFrame> {
        Ok(self.frames.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, MouseEvent};

    fn select() -> InputFrame {
        InputFrame {
            buttons: ButtonEdges {
                select: true,
                ..ButtonEdges::default()
            },
            ..InputFrame::default()
        }
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn debounce_drops_presses_inside_cooldown() {
        let mut debouncer = Debouncer::new(Duration::from_millis(200));
        let ms = Duration::from_millis;

        assert!(debouncer.filter(select(), ms(1_000)).buttons.select);
        assert!(!debouncer.filter(select(), ms(1_150)).buttons.select);
        assert!(debouncer.filter(select(), ms(1_200)).buttons.select);
    }

    #[test]
    fn debounce_is_per_button_and_skips_encoder() {
        let mut debouncer = Debouncer::new(Duration::from_millis(200));
        let now = Duration::from_secs(5);
        debouncer.filter(select(), now);

        let mut frame = select();
        frame.buttons.down = true;
        frame.encoder_delta = -3;
        let filtered = debouncer.filter(frame, now + Duration::from_millis(10));
        assert!(!filtered.buttons.select);
        assert!(filtered.buttons.down);
        assert_eq!(filtered.encoder_delta, -3);
    }

    #[test]
    fn up_button_and_back_key_both_go_back() {
        let mut frame = InputFrame::default();
        frame.buttons.up = true;
        assert_eq!(frame.actions(), vec![Action::Back]);

        let frame = InputFrame {
            back: true,
            ..InputFrame::default()
        };
        assert_eq!(frame.actions(), vec![Action::Back]);
    }

    #[test]
    fn actions_keep_encoder_first() {
        let frame = InputFrame {
            encoder_delta: 2,
            buttons: ButtonEdges {
                select: true,
                down: true,
                right: true,
                ..ButtonEdges::default()
            },
            ..InputFrame::default()
        };
        assert_eq!(
            frame.actions(),
            vec![
                Action::Encoder(2),
                Action::Select,
                Action::TogglePause,
                Action::Next
            ]
        );
        assert!(InputFrame::default().actions().is_empty());
    }

    #[test]
    fn keys_map_to_controls() {
        let mut frame = InputFrame::default();
        for event in [
            key(KeyCode::Down),
            key(KeyCode::Down),
            key(KeyCode::Up),
            key(KeyCode::Enter),
            key(KeyCode::Char(' ')),
            key(KeyCode::Left),
            key(KeyCode::Char('r')),
        ] {
            apply_event(&mut frame, event);
        }
        assert_eq!(frame.encoder_delta, 1);
        assert!(frame.buttons.select && frame.buttons.down && frame.buttons.left);
        assert!(frame.back);
        assert!(!frame.quit);

        apply_event(
            &mut frame,
            Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        );
        assert!(frame.quit);
    }

    #[test]
    fn wheel_turns_encoder() {
        let mut frame = InputFrame::default();
        let wheel = |kind| {
            Event::Mouse(MouseEvent {
                kind,
                column: 0,
                row: 0,
                modifiers: KeyModifiers::NONE,
            })
        };
        apply_event(&mut frame, wheel(MouseEventKind::ScrollUp));
        apply_event(&mut frame, wheel(MouseEventKind::ScrollUp));
        apply_event(&mut frame, wheel(MouseEventKind::ScrollDown));
        assert_eq!(frame.encoder_delta, -1);
    }

    #[test]
    fn scripted_input_drains_then_idles() {
        let mut input = ScriptedInput::new([select()]);
        assert_eq!(input.poll().expect("poll"), select());
        assert!(input.poll().expect("poll").is_empty());
        assert_eq!(input.remaining(), 0);
    }
}
