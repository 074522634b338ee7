//! Viewer view-model.
//!
//! The front end owns pixels and the native selection API. Everything else
//! (selection capture, the floating copy / ask-AI menu, the side panel and the
//! chat transcript) lives in a per-session [`ViewerSession`] that is advanced
//! with [`ViewerEvent`]s and answers with [`Effect`]s for the host to perform.
//! [`ViewerDriver`] runs the async parts: the selection settle delay and the
//! round trip to the query endpoint.

mod driver;
mod session;

pub use driver::{CopilotTransport, ViewerDriver, SELECTION_SETTLE_DELAY};
pub use session::{
    ViewerSession, LOAD_FAILED_MESSAGE, MISSING_INPUT_ALERT, NO_DOCUMENT_ALERT,
    REPLY_ERROR_MESSAGE, SELECT_FIRST_HINT, WELCOME_MESSAGE,
};

use crate::schema::{QueryRequest, UploadResponse};

/// Screen-space point, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Bounding box of a selection range as reported by the browser.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SelectionRect {
    /// Where the floating menu is anchored: centred above the selection.
    pub fn tooltip_anchor(&self, scroll_y: f64) -> Point {
        Point {
            x: self.left + self.width / 2.0,
            y: self.top - 10.0 + scroll_y,
        }
    }
}

/// What the host read from the native selection once it settled.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSelection {
    pub text: String,
    /// `None` when the browser could not produce a range.
    pub rect: Option<SelectionRect>,
    pub page: u32,
    pub scroll_y: f64,
}

/// The passage the user last highlighted.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub text: String,
    /// Floating menu anchor; `None` when the range had no geometry.
    pub anchor: Option<Point>,
    pub page: u32,
}

/// Document shown by the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDocument {
    pub stored_name: String,
    pub display_name: String,
    pub url: String,
}

impl OpenDocument {
    pub fn from_upload(display_name: impl Into<String>, upload: &UploadResponse) -> Self {
        Self {
            stored_name: upload.stored_name().to_string(),
            display_name: display_name.into(),
            url: upload.file_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentState {
    Empty,
    Loading,
    Ready { num_pages: u32 },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    DocumentOpened(OpenDocument),
    DocumentLoaded { num_pages: u32 },
    DocumentFailed(String),
    SelectionSettled(RawSelection),
    /// A click that did not land on the floating menu.
    ClickOutside,
    Copy,
    AskAi,
    ClosePanel,
    DraftChanged(String),
    Submit,
    ReplyReceived(Result<String, String>),
    GoHome,
}

/// Side effects for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CopyToClipboard(String),
    ClearNativeSelection,
    FocusQuestionInput,
    SendQuery(QueryRequest),
    Alert(String),
    ShowUpload,
}
