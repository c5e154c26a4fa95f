//! Key bindings and input modes.
//!
//! Input starts in Insert mode, where everything is forwarded to the active
//! pane. The prefix chord (Ctrl+B by default) enters Normal mode for one
//! command; navigation and resize verbs hop into their own sticky modes so
//! they can be repeated without the prefix.

use crate::input::{Key, KeyEvent, Modifiers};
use crate::wm::layout::{Direction, ResizeDirection};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum InputMode {
    #[default]
    Insert,
    Normal,
    Switch,
    Resize,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NavigateDirection {
    Left,
    Right,
    Up,
    Down,
}

/// What a key binding does.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Action {
    /// Swallow the key; the mode transition does the work.
    EnterNormalMode,
    /// Forward the key to the active pane.
    SendToPane,
    /// Leave whatever mode we are in.
    ResetMode,
    CreateTab,
    SwitchTab(usize),
    Navigate(NavigateDirection),
    Resize(ResizeDirection, i32),
    AddPane(Direction),
    ExitPane,
    Quit,
}

/// One `(key, modifiers, mode) -> action` row. `Key::None` matches any key
/// and serves as the per-mode fallback.
pub struct KeyBind {
    pub key: Key,
    pub modifiers: Modifiers,
    pub mode: InputMode,
    pub next_mode: Option<InputMode>,
    pub action: Action,
}

impl KeyBind {
    fn matches(&self, mode: InputMode, event: &KeyEvent) -> bool {
        if self.mode != mode {
            return false;
        }
        if self.key == Key::None {
            return true;
        }
        let relevant =
            Modifiers::SHIFT | Modifiers::ALT | Modifiers::CONTROL | Modifiers::SUPER;
        self.key == event.key() && (event.modifiers() & relevant) == self.modifiers
    }
}

/// The first bind matching the event in the given mode.
pub fn find_bind<'a>(
    binds: &'a [KeyBind],
    mode: InputMode,
    event: &KeyEvent,
) -> Option<&'a KeyBind> {
    binds.iter().find(|bind| bind.matches(mode, event))
}

fn make_switch_tab_binds(result: &mut Vec<KeyBind>) {
    for i in 1..=9u32 {
        result.push(KeyBind {
            key: Key::Char(char::from_digit(i, 10).unwrap()),
            modifiers: Modifiers::empty(),
            mode: InputMode::Normal,
            next_mode: None,
            action: Action::SwitchTab(i as usize),
        });
    }
}

fn make_navigate_binds(result: &mut Vec<KeyBind>, mode: InputMode, next_mode: InputMode) {
    let keys = [
        ('j', NavigateDirection::Down),
        ('k', NavigateDirection::Up),
        ('l', NavigateDirection::Right),
        ('h', NavigateDirection::Left),
    ];
    for (key, direction) in keys {
        result.push(KeyBind {
            key: Key::Char(key),
            modifiers: Modifiers::CONTROL,
            mode,
            next_mode: Some(next_mode),
            action: Action::Navigate(direction),
        });
    }
}

fn make_resize_binds(result: &mut Vec<KeyBind>, mode: InputMode) {
    let keys = [
        ('j', ResizeDirection::Bottom),
        ('k', ResizeDirection::Top),
        ('l', ResizeDirection::Right),
        ('h', ResizeDirection::Left),
    ];
    for (key, direction) in keys {
        result.push(KeyBind {
            key: Key::Char(key),
            modifiers: Modifiers::empty(),
            mode,
            next_mode: Some(InputMode::Resize),
            action: Action::Resize(direction, 2),
        });
        result.push(KeyBind {
            key: Key::Char(key),
            modifiers: Modifiers::SHIFT,
            mode,
            next_mode: Some(InputMode::Resize),
            action: Action::Resize(direction, -2),
        });
    }
}

/// The default binding table for a given prefix key.
pub fn make_key_binds(prefix: Key) -> Vec<KeyBind> {
    let mut result = Vec::new();

    // Insert mode.
    result.push(KeyBind {
        key: prefix,
        modifiers: Modifiers::CONTROL,
        mode: InputMode::Insert,
        next_mode: Some(InputMode::Normal),
        action: Action::EnterNormalMode,
    });
    result.push(KeyBind {
        key: Key::None,
        modifiers: Modifiers::empty(),
        mode: InputMode::Insert,
        next_mode: Some(InputMode::Insert),
        action: Action::SendToPane,
    });

    // Normal mode.
    result.push(KeyBind {
        key: prefix,
        modifiers: Modifiers::CONTROL,
        mode: InputMode::Normal,
        next_mode: None,
        action: Action::SendToPane,
    });
    make_resize_binds(&mut result, InputMode::Normal);
    make_navigate_binds(&mut result, InputMode::Normal, InputMode::Switch);
    result.push(KeyBind {
        key: Key::Char('c'),
        modifiers: Modifiers::empty(),
        mode: InputMode::Normal,
        next_mode: None,
        action: Action::CreateTab,
    });
    make_switch_tab_binds(&mut result);
    result.push(KeyBind {
        key: Key::Char('d'),
        modifiers: Modifiers::empty(),
        mode: InputMode::Normal,
        next_mode: None,
        action: Action::Quit,
    });
    result.push(KeyBind {
        key: Key::Char('x'),
        modifiers: Modifiers::empty(),
        mode: InputMode::Normal,
        next_mode: None,
        action: Action::ExitPane,
    });
    result.push(KeyBind {
        key: Key::Char('\\'),
        modifiers: Modifiers::SHIFT,
        mode: InputMode::Normal,
        next_mode: None,
        action: Action::AddPane(Direction::Horizontal),
    });
    // Hosts without shifted-key reporting deliver the bar directly.
    result.push(KeyBind {
        key: Key::Char('|'),
        modifiers: Modifiers::empty(),
        mode: InputMode::Normal,
        next_mode: None,
        action: Action::AddPane(Direction::Horizontal),
    });
    result.push(KeyBind {
        key: Key::Char('-'),
        modifiers: Modifiers::empty(),
        mode: InputMode::Normal,
        next_mode: None,
        action: Action::AddPane(Direction::Vertical),
    });
    result.push(KeyBind {
        key: Key::None,
        modifiers: Modifiers::empty(),
        mode: InputMode::Normal,
        next_mode: None,
        action: Action::ResetMode,
    });

    // Switch mode.
    make_navigate_binds(&mut result, InputMode::Switch, InputMode::Switch);
    result.push(KeyBind {
        key: Key::None,
        modifiers: Modifiers::empty(),
        mode: InputMode::Switch,
        next_mode: None,
        action: Action::ResetMode,
    });

    // Resize mode.
    make_resize_binds(&mut result, InputMode::Resize);
    make_navigate_binds(&mut result, InputMode::Resize, InputMode::Resize);
    result.push(KeyBind {
        key: Key::None,
        modifiers: Modifiers::empty(),
        mode: InputMode::Resize,
        next_mode: None,
        action: Action::ResetMode,
    });

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeyEvent;

    fn press(key: Key, modifiers: Modifiers) -> KeyEvent {
        KeyEvent::press(key, modifiers)
    }

    #[test]
    fn test_prefix_enters_normal_mode() {
        let binds = make_key_binds(Key::Char('b'));
        let event = press(Key::Char('b'), Modifiers::CONTROL);

        let bind = find_bind(&binds, InputMode::Insert, &event).unwrap();
        assert_eq!(bind.action, Action::EnterNormalMode);
        assert_eq!(bind.next_mode, Some(InputMode::Normal));

        // The prefix in Normal mode passes the chord through to the pane.
        let bind = find_bind(&binds, InputMode::Normal, &event).unwrap();
        assert_eq!(bind.action, Action::SendToPane);
        assert_eq!(bind.next_mode, None);
    }

    #[test]
    fn test_insert_mode_forwards_everything_else() {
        let binds = make_key_binds(Key::Char('b'));
        let event = press(Key::Char('x'), Modifiers::empty());
        let bind = find_bind(&binds, InputMode::Insert, &event).unwrap();
        assert_eq!(bind.action, Action::SendToPane);
        assert_eq!(bind.next_mode, Some(InputMode::Insert));
    }

    #[test]
    fn test_normal_mode_commands() {
        let binds = make_key_binds(Key::Char('b'));

        let bind = find_bind(
            &binds,
            InputMode::Normal,
            &press(Key::Char('-'), Modifiers::empty()),
        )
        .unwrap();
        assert_eq!(bind.action, Action::AddPane(Direction::Vertical));

        let bind = find_bind(
            &binds,
            InputMode::Normal,
            &press(Key::Char('3'), Modifiers::empty()),
        )
        .unwrap();
        assert_eq!(bind.action, Action::SwitchTab(3));

        let bind = find_bind(
            &binds,
            InputMode::Normal,
            &press(Key::Char('h'), Modifiers::CONTROL),
        )
        .unwrap();
        assert_eq!(bind.action, Action::Navigate(NavigateDirection::Left));
        assert_eq!(bind.next_mode, Some(InputMode::Switch));

        // Resize with and without shift.
        let bind = find_bind(
            &binds,
            InputMode::Normal,
            &press(Key::Char('j'), Modifiers::empty()),
        )
        .unwrap();
        assert_eq!(bind.action, Action::Resize(ResizeDirection::Bottom, 2));
        let bind = find_bind(
            &binds,
            InputMode::Normal,
            &press(Key::Char('j'), Modifiers::SHIFT),
        )
        .unwrap();
        assert_eq!(bind.action, Action::Resize(ResizeDirection::Bottom, -2));
    }

    #[test]
    fn test_unbound_key_resets_mode() {
        let binds = make_key_binds(Key::Char('b'));
        let event = press(Key::Char('z'), Modifiers::empty());

        let bind = find_bind(&binds, InputMode::Normal, &event).unwrap();
        assert_eq!(bind.action, Action::ResetMode);
        let bind = find_bind(&binds, InputMode::Switch, &event).unwrap();
        assert_eq!(bind.action, Action::ResetMode);
        let bind = find_bind(&binds, InputMode::Resize, &event).unwrap();
        assert_eq!(bind.action, Action::ResetMode);
    }

    #[test]
    fn test_sticky_switch_mode() {
        let binds = make_key_binds(Key::Char('b'));
        let event = press(Key::Char('l'), Modifiers::CONTROL);
        let bind = find_bind(&binds, InputMode::Switch, &event).unwrap();
        assert_eq!(bind.action, Action::Navigate(NavigateDirection::Right));
        assert_eq!(bind.next_mode, Some(InputMode::Switch));
    }
}
