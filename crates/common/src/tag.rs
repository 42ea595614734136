//! Uniform accessor trait over the format-specific tag models.

/// The handful of fields every supported tag format can carry.
///
/// Setters take `None` to remove the field. Empty strings are treated as
/// absent by the getters.
pub trait BasicTag {
    fn title(&self) -> Option<String>;
    fn set_title(&mut self, value: Option<&str>);

    fn artist(&self) -> Option<String>;
    fn set_artist(&mut self, value: Option<&str>);

    fn album(&self) -> Option<String>;
    fn set_album(&mut self, value: Option<&str>);

    fn comment(&self) -> Option<String>;
    fn set_comment(&mut self, value: Option<&str>);

    fn genre(&self) -> Option<String>;
    fn set_genre(&mut self, value: Option<&str>);

    fn year(&self) -> Option<u32>;
    fn set_year(&mut self, value: Option<u32>);

    fn track(&self) -> Option<u32>;
    fn set_track(&mut self, value: Option<u32>);

    fn is_empty(&self) -> bool {
        self.title().is_none()
            && self.artist().is_none()
            && self.album().is_none()
            && self.comment().is_none()
            && self.genre().is_none()
            && self.year().is_none()
            && self.track().is_none()
    }
}

/// Parse the leading run of ASCII digits ("2004-03-15" → 2004, "3/12" → 3).
pub fn leading_number(text: &str) -> Option<u32> {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Map empty strings to `None`.
pub fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
