/// Decides when the current directory listing must be fetched again.
///
/// Mount always fetches. Afterwards a refresh fetches only while no listing
/// has been loaded yet or when the resolved path moved.
#[derive(Debug, Default)]
pub struct FetchScheduler {
    last_path: Option<String>,
    had_listing: bool,
}

impl FetchScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&mut self, path: &str) -> bool {
        self.last_path = Some(path.to_string());
        true
    }

    /// Called on every refresh with the path the navigation currently targets.
    pub fn should_fetch(&self, path: &str) -> bool {
        !self.had_listing || self.last_path.as_deref() != Some(path)
    }

    /// Records the state a refresh left behind, for comparison with the next one.
    pub fn record(&mut self, path: &str, has_listing: bool) {
        self.last_path = Some(path.to_string());
        self.had_listing = has_listing;
    }
}
