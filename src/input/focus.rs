//! Focus events (`CSI I` / `CSI O`).

use crate::core::term::Csi;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FocusEvent {
    gained: bool,
}

impl FocusEvent {
    pub fn focus_in() -> Self {
        Self { gained: true }
    }

    pub fn focus_out() -> Self {
        Self { gained: false }
    }

    pub fn is_focus_in(&self) -> bool {
        self.gained
    }
}

pub fn focus_event_from_csi(csi: &Csi) -> Option<FocusEvent> {
    if !csi.intermediate.is_empty() || !csi.params.is_empty() {
        return None;
    }
    match csi.terminator {
        'I' => Some(FocusEvent::focus_in()),
        'O' => Some(FocusEvent::focus_out()),
        _ => None,
    }
}

/// Serialize for a child; only children that enabled focus reporting hear
/// about focus changes.
pub fn serialize_focus_event(event: &FocusEvent, focus_event_mode: bool) -> Option<Vec<u8>> {
    if !focus_event_mode {
        return None;
    }
    Some(if event.is_focus_in() {
        b"\x1b[I".to_vec()
    } else {
        b"\x1b[O".to_vec()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_respects_mode() {
        assert_eq!(serialize_focus_event(&FocusEvent::focus_in(), false), None);
        assert_eq!(
            serialize_focus_event(&FocusEvent::focus_in(), true),
            Some(b"\x1b[I".to_vec())
        );
        assert_eq!(
            serialize_focus_event(&FocusEvent::focus_out(), true),
            Some(b"\x1b[O".to_vec())
        );
    }
}
