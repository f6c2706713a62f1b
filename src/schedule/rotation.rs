//! Rotating notetaking-duty lists.
//!
//! A [`RotationList`] is an ordered list of names with a cursor pointing at
//! whoever is up next. The cursor advances (wrapping) every time a meeting
//! fires, resets when the list is replaced or cleared, and is clamped back
//! into range when a persisted cursor turns out to be stale.

/// An ordered list of names with a wrapping "up next" cursor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RotationList {
    names: Vec<String>,
    cursor: usize,
}

impl RotationList {
    pub fn new() -> Self {
        RotationList::default()
    }

    /// Rebuilds a persisted list, clamping an out-of-range cursor to 0.
    pub fn from_parts(names: Vec<String>, cursor: usize) -> Self {
        let cursor = if cursor < names.len() { cursor } else { 0 };
        RotationList { names, cursor }
    }

    /// Replaces the list wholesale and resets the cursor to the first name.
    ///
    /// Rejects the replacement (returning `false`, list untouched) if any
    /// name appears twice in `names`. Comparison is case-sensitive exact
    /// match.
    pub fn set(&mut self, names: Vec<String>) -> bool {
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return false;
            }
        }

        self.names = names;
        self.cursor = 0;
        true
    }

    /// Empties the list and resets the cursor.
    pub fn clear(&mut self) {
        self.names.clear();
        self.cursor = 0;
    }

    /// Advances the cursor by `amount`, wrapping modulo the list length.
    /// No-op on an empty list.
    pub fn advance(&mut self, amount: usize) {
        if self.names.is_empty() {
            return;
        }
        self.cursor = (self.cursor + amount) % self.names.len();
    }

    /// Moves the cursor to the first name equal to `name`. Returns `false`
    /// (cursor untouched) if the name is not on the list.
    pub fn set_to(&mut self, name: &str) -> bool {
        match self.names.iter().position(|n| n == name) {
            Some(position) => {
                self.cursor = position;
                true
            }
            None => false,
        }
    }

    /// The name whose turn is next, if the list is non-empty.
    pub fn current(&self) -> Option<&str> {
        self.names.get(self.cursor).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_set_resets_cursor() {
        let mut rotation = RotationList::new();
        assert!(rotation.set(names(&["Chandler", "Glen", "Holly"])));
        rotation.advance(2);

        assert!(rotation.set(names(&["Grant", "David"])));
        assert_eq!(rotation.cursor(), 0);
        assert_eq!(rotation.current(), Some("Grant"));
    }

    #[test]
    fn test_set_rejects_duplicate_names() {
        let mut rotation = RotationList::new();
        assert!(rotation.set(names(&["Glen", "Holly"])));

        assert!(!rotation.set(names(&["Grant", "Grant"])));
        assert_eq!(rotation.names(), names(&["Glen", "Holly"]).as_slice());
    }

    #[test]
    fn test_set_is_case_sensitive() {
        let mut rotation = RotationList::new();
        assert!(rotation.set(names(&["glen", "Glen"])));
    }

    #[test]
    fn test_advance_wraps_around() {
        let mut rotation = RotationList::new();
        assert!(rotation.set(names(&["A", "B", "C"])));
        rotation.advance(2);
        assert_eq!(rotation.cursor(), 2);

        rotation.advance(1);
        assert_eq!(rotation.cursor(), 0);
    }

    #[test]
    fn test_advance_on_empty_list_is_noop() {
        let mut rotation = RotationList::new();
        rotation.advance(3);
        assert_eq!(rotation.cursor(), 0);
        assert_eq!(rotation.current(), None);
    }

    #[test]
    fn test_set_to_moves_cursor() {
        let mut rotation = RotationList::new();
        assert!(rotation.set(names(&["A", "B", "C"])));

        assert!(rotation.set_to("B"));
        assert_eq!(rotation.current(), Some("B"));

        assert!(!rotation.set_to("Z"));
        assert_eq!(rotation.current(), Some("B"));
    }

    #[test]
    fn test_from_parts_clamps_stale_cursor() {
        let rotation = RotationList::from_parts(names(&["A", "B"]), 5);
        assert_eq!(rotation.cursor(), 0);

        let rotation = RotationList::from_parts(names(&["A", "B"]), 1);
        assert_eq!(rotation.cursor(), 1);
    }

    #[test]
    fn test_clear_resets() {
        let mut rotation = RotationList::new();
        assert!(rotation.set(names(&["A", "B"])));
        rotation.advance(1);

        rotation.clear();
        assert!(rotation.is_empty());
        assert_eq!(rotation.cursor(), 0);
    }
}
