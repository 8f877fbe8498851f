const MAX_ERROR_LENGTH: usize = 200;
const MAX_PAYLOAD_LENGTH: usize = 500;

/// Cap an error message for log output.
pub fn truncate_error(error: &str) -> String {
    truncate_at(error, MAX_ERROR_LENGTH)
}

/// Cap a record payload (Debug-formatted) for drop logging.
pub fn truncate_payload(payload: &str) -> String {
    truncate_at(payload, MAX_PAYLOAD_LENGTH)
}

fn truncate_at(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }
}
