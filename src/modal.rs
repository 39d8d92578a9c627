/// Open/closed state of a confirmation prompt and the data it shows.
///
/// A closed modal always holds `T::default()`, so nothing from one opening can
/// leak into the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModalState<T> {
    open: bool,
    payload: T,
}

impl<T: Default> ModalState<T> {
    pub fn new() -> Self {
        Self {
            open: false,
            payload: T::default(),
        }
    }

    /// Opens with `payload`, replacing whatever an open modal was showing.
    pub fn show(&mut self, payload: T) {
        self.open = true;
        self.payload = payload;
    }

    /// Closes and restores the default payload. Idempotent.
    pub fn reset(&mut self) {
        self.open = false;
        self.payload = T::default();
    }

    /// Closes the modal and hands back what it was showing, or `None` if it
    /// was already closed.
    pub fn take(&mut self) -> Option<T> {
        if !self.open {
            return None;
        }
        self.open = false;
        Some(std::mem::take(&mut self.payload))
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Mutable access while open. A closed modal's payload stays at its default.
    pub fn payload_mut(&mut self) -> Option<&mut T> {
        self.open.then_some(&mut self.payload)
    }
}
