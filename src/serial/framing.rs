/// Buffers raw serial bytes and emits complete newline-terminated lines as
/// trimmed, lowercased tokens. `\r` is normalized to `\n` so CRLF devices
/// and LF devices both frame correctly (blank lines from CRLF are dropped
/// with the rest of the empties).
///
/// The buffer is bounded: a malfunctioning device that streams bytes
/// without ever sending a newline cannot grow it past [`BUFFER_CAP`]; the
/// oldest data is discarded, keeping the newest [`KEEP_ON_OVERFLOW`] bytes.
pub struct LineAccumulator {
    buf: Vec<u8>,
}

const BUFFER_CAP: usize = 4096;
const KEEP_ON_OVERFLOW: usize = 1024;

/// Diagnostic chatter from the panel firmware, dropped before debouncing.
const DIAGNOSTIC_PREFIXES: [&str; 2] = ["button pressed:", "button released:"];

pub fn is_diagnostic(token: &str) -> bool {
    DIAGNOSTIC_PREFIXES
        .iter()
        .any(|prefix| token.starts_with(prefix))
}

impl LineAccumulator {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(512),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        for &b in bytes {
            self.buf.push(if b == b'\r' { b'\n' } else { b });
        }

        let mut tokens = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..pos]);
            let token = text.trim().to_ascii_lowercase();
            if !token.is_empty() {
                tokens.push(token);
            }
        }

        if self.buf.len() > BUFFER_CAP {
            let cut = self.buf.len() - KEEP_ON_OVERFLOW;
            self.buf.drain(..cut);
        }

        tokens
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

impl Default for LineAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_complete_lines() {
        let mut acc = LineAccumulator::new();
        assert_eq!(acc.push(b"blue\nsubmit\n"), vec!["blue", "submit"]);
    }

    #[test]
    fn buffers_partial_lines_across_pushes() {
        let mut acc = LineAccumulator::new();
        assert!(acc.push(b"gre").is_empty());
        assert_eq!(acc.push(b"en\n"), vec!["green"]);
    }

    #[test]
    fn normalizes_crlf_case_and_whitespace() {
        let mut acc = LineAccumulator::new();
        assert_eq!(acc.push(b"  BLUE \r\n"), vec!["blue"]);
    }

    #[test]
    fn drops_empty_lines() {
        let mut acc = LineAccumulator::new();
        assert!(acc.push(b"\n\r\n   \n").is_empty());
    }

    #[test]
    fn bounds_buffer_under_newline_less_flood() {
        let mut acc = LineAccumulator::new();
        assert!(acc.push(&[b'a'; 8000]).is_empty());
        // Only the newest 1024 bytes survive the overflow trim.
        let tokens = acc.push(b"\n");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].len(), 1024);
    }

    #[test]
    fn recognizes_diagnostic_lines() {
        assert!(is_diagnostic("button pressed: 2"));
        assert!(is_diagnostic("button released: 2"));
        assert!(!is_diagnostic("blue"));
    }
}
