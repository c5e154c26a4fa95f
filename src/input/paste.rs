//! Paste events and bracketed-paste markers.

use crate::core::term::Csi;

/// The terminating marker of a bracketed paste.
pub const BRACKETED_PASTE_END: &str = "\x1b[201~";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasteEvent {
    text: String,
}

impl PasteEvent {
    pub fn new(text: String) -> Self {
        Self { text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// True for `CSI 200~`, the start-of-paste marker.
pub fn is_bracketed_paste_begin(csi: &Csi) -> bool {
    csi.intermediate.is_empty() && csi.terminator == '~' && csi.params.get(0) == 200
}

/// Serialize for a child: bracketed when the child asked for it, raw text
/// otherwise.
pub fn serialize_paste_event(event: &PasteEvent, bracketed_paste_mode: bool) -> Vec<u8> {
    if bracketed_paste_mode {
        let mut bytes = b"\x1b[200~".to_vec();
        bytes.extend_from_slice(event.text().as_bytes());
        bytes.extend_from_slice(b"\x1b[201~");
        bytes
    } else {
        event.text().as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_paste() {
        let event = PasteEvent::new("hi".into());
        assert_eq!(serialize_paste_event(&event, false), b"hi".to_vec());
        assert_eq!(
            serialize_paste_event(&event, true),
            b"\x1b[200~hi\x1b[201~".to_vec()
        );
    }
}
