//! View port interface

use crate::domain::view::ViewModel;

/// Severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Port for whatever displays the session to the user
pub trait ViewSink: Send {
    /// Render the current view. Called after every state change.
    fn show(&mut self, view: &ViewModel);

    /// Transient status message
    fn status(&mut self, message: &str, kind: StatusKind);

    /// Leave the current page for `url`
    fn navigate(&mut self, url: &str);

    /// Replace the current page with a server-rendered document
    fn replace_document(&mut self, html: &str);
}
