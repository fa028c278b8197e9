use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Logical key, independent of the host's keyboard event type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    F(u8),
    Escape,
    ContextMenu,
    Other,
}

/// A key press together with the modifiers held at the time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyChord {
    pub key: Key,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyChord {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            meta: false,
            shift: false,
            alt: false,
        }
    }

    pub fn ctrl(key: Key) -> Self {
        Self {
            ctrl: true,
            ..Self::plain(key)
        }
    }

    pub fn meta(key: Key) -> Self {
        Self {
            meta: true,
            ..Self::plain(key)
        }
    }

    pub fn shifted(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Ctrl on most platforms, Cmd on macOS
    pub fn command_held(&self) -> bool {
        self.ctrl || self.meta
    }

    fn letter(&self) -> Option<char> {
        match self.key {
            Key::Char(c) => Some(c.to_ascii_lowercase()),
            _ => None,
        }
    }
}

impl From<KeyEvent> for KeyChord {
    fn from(ev: KeyEvent) -> Self {
        let key = match ev.code {
            KeyCode::Char(c) => Key::Char(c),
            KeyCode::F(n) => Key::F(n),
            KeyCode::Esc => Key::Escape,
            KeyCode::Menu => Key::ContextMenu,
            _ => Key::Other,
        };
        Self {
            key,
            ctrl: ev.modifiers.contains(KeyModifiers::CONTROL),
            meta: ev.modifiers.contains(KeyModifiers::SUPER)
                || ev.modifiers.contains(KeyModifiers::META),
            shift: ev.modifiers.contains(KeyModifiers::SHIFT),
            alt: ev.modifiers.contains(KeyModifiers::ALT),
        }
    }
}

const COMMAND_LETTERS: [char; 10] = ['c', 'v', 'a', 'x', 's', 'p', 'f', 'u', 'i', 'j'];
const DEVTOOLS_LETTERS: [char; 3] = ['i', 'j', 'c'];

/// Shortcuts that are swallowed unconditionally while a lockdown is active.
///
/// Escape is deliberately absent: it is cancelled too, but also reported as an
/// exit attempt, so the reducer handles it separately.
pub fn is_blocked_shortcut(chord: &KeyChord) -> bool {
    match chord.key {
        Key::F(11) | Key::F(12) | Key::ContextMenu => true,
        Key::Char(_) if chord.command_held() => {
            let Some(letter) = chord.letter() else {
                return false;
            };
            COMMAND_LETTERS.contains(&letter)
                || (chord.shift && DEVTOOLS_LETTERS.contains(&letter))
        }
        _ => false,
    }
}

/// First half of the developer bypass sequence: Shift+"1".
///
/// Terminals deliver the shifted digit as a bare `!` with no modifier, so `!`
/// counts on its own and `1` only with Shift held.
pub fn is_bypass_lead(chord: &KeyChord) -> bool {
    match chord.key {
        Key::Char('!') => true,
        Key::Char('1') => chord.shift,
        _ => false,
    }
}

/// Second half of the developer bypass sequence: "2" without Shift
pub fn is_bypass_follow(chord: &KeyChord) -> bool {
    !chord.shift && chord.key == Key::Char('2')
}
