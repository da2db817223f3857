//! Turning user records into list lines

use crate::api::User;

/// One list line: `name (username) - email`
pub fn render_item(user: &User) -> String {
    format!(
        "{} ({}) - {}",
        sanitize(user.name.as_deref()),
        sanitize(user.username.as_deref()),
        sanitize(user.email.as_deref()),
    )
}

/// Strip ANSI escape sequences and control characters so server data can't
/// drive the terminal.
pub fn sanitize(value: Option<&str>) -> String {
    let Some(value) = value else {
        return String::new();
    };

    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // CSI: ESC [ params final-byte
            if chars.peek() == Some(&'[') {
                chars.next();
                for next in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&next) {
                        break;
                    }
                }
            }
            continue;
        }
        if !c.is_control() {
            result.push(c);
        }
    }
    result
}
