//! Structured-field extraction from free-text event descriptions.
//!
//! Booking tools write a line such as `<b>Booked by</b> Jane Doe jane@example.com`
//! into the events they create. [`extract_booked_by`] pulls the name and email
//! out of that line. A description without the marker, or with a malformed
//! one, simply yields `None`.
//!
//! ```
//! use calhook_core::extract_booked_by;
//!
//! let booked = extract_booked_by(Some("<b>Booked by</b> Jane Doe jane@example.com")).unwrap();
//! assert_eq!(booked.name, "Jane Doe");
//! assert_eq!(booked.email, "jane@example.com");
//! assert!(extract_booked_by(Some("Weekly sync")).is_none());
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::event::BookedBy;

/// Marker phrase, optional surrounding tags and colon, a name, then an
/// email-shaped token on the same line (optionally wrapped in `<>`, `()` or `[]`).
static BOOKED_BY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)booked\s+by(?:\s*</?[a-z][^>]*>)*\s*:?\s*(?P<name>[^<>@\r\n]+?)[ \t]+[<(\[]?(?P<email>[a-z0-9._%+\-]+@[a-z0-9\-]+(?:\.[a-z0-9\-]+)+)",
    )
    .expect("Invalid booked-by regex")
});

/// Extracts the booking attribution from an event description.
pub fn extract_booked_by(description: Option<&str>) -> Option<BookedBy> {
    let text = description?;
    let captures = BOOKED_BY_REGEX.captures(text)?;

    let name = captures.name("name")?.as_str().trim();
    let email = captures.name("email")?.as_str();
    if name.is_empty() {
        return None;
    }

    Some(BookedBy::new(name, email))
}
