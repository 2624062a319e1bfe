/// One classified line of the wire stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Blank line, SSE comment, or control field without meaning here.
    Ignorable,
    /// Explicit end-of-stream marker (`data: [DONE]`).
    Sentinel,
    /// JSON payload text, not yet parsed.
    Payload(String),
}

const CONTROL_PREFIXES: [&str; 4] = ["event:", "id:", "retry:", ":"];
const DONE_MARKER: &str = "[DONE]";

/// Classifies a single line. Never fails; bad payloads are left for the
/// interpreter to reject.
pub fn classify(line: &str) -> Frame {
    let line = line.trim();
    if line.is_empty() {
        return Frame::Ignorable;
    }
    if let Some(rest) = line.strip_prefix("data:") {
        let payload = rest.trim();
        return match payload {
            "" => Frame::Ignorable,
            DONE_MARKER => Frame::Sentinel,
            _ => Frame::Payload(payload.to_string()),
        };
    }
    if CONTROL_PREFIXES
        .iter()
        .any(|prefix| line.starts_with(prefix))
    {
        return Frame::Ignorable;
    }
    // Bare JSON line (the evaluation endpoint does not use `data:` framing).
    Frame::Payload(line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_control_lines_are_ignorable() {
        for line in ["", "   ", "event: progress", "id: 7", "retry: 1000", ": keep-alive", "data:"] {
            assert_eq!(classify(line), Frame::Ignorable, "line {line:?}");
        }
    }

    #[test]
    fn done_marker_is_sentinel() {
        assert_eq!(classify("data: [DONE]"), Frame::Sentinel);
        assert_eq!(classify("  data: [DONE]  "), Frame::Sentinel);
        assert_eq!(classify("data:[DONE]"), Frame::Sentinel);
    }

    #[test]
    fn data_prefix_yields_trimmed_payload() {
        assert_eq!(
            classify("data: {\"event\":\"start\"} "),
            Frame::Payload("{\"event\":\"start\"}".into())
        );
    }

    #[test]
    fn bare_lines_are_payloads() {
        assert_eq!(
            classify("{\"step\":1,\"score\":10}"),
            Frame::Payload("{\"step\":1,\"score\":10}".into())
        );
        assert_eq!(classify("not json"), Frame::Payload("not json".into()));
    }

    #[test]
    fn classification_is_idempotent() {
        for line in [
            "",
            "event: message",
            "data: [DONE]",
            "data: {\"a\":1}",
            "{\"error\":\"boom\"}",
            "garbage",
        ] {
            assert_eq!(classify(line), classify(line));
        }
    }
}
