use super::{DocumentState, Effect, OpenDocument, Point, RawSelection, Selection, ViewerEvent};
use crate::schema::{ChatMessage, QueryRequest};
use tracing::debug;

pub const WELCOME_MESSAGE: &str =
    "Hi! Select some text from the PDF and ask me anything about it.";
pub const REPLY_ERROR_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";
pub const MISSING_INPUT_ALERT: &str = "Please select text and enter a question";
pub const NO_DOCUMENT_ALERT: &str = "Upload a PDF first";
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load PDF. Please try uploading again.";
pub const SELECT_FIRST_HINT: &str = "Select text from the PDF first";

/// State of one viewer tab.
#[derive(Debug, Clone)]
pub struct ViewerSession {
    document: Option<OpenDocument>,
    document_state: DocumentState,
    selection: Option<Selection>,
    tooltip_visible: bool,
    panel_open: bool,
    transcript: Vec<ChatMessage>,
    draft: String,
    in_flight: Option<QueryRequest>,
}

impl Default for ViewerSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerSession {
    pub fn new() -> Self {
        Self {
            document: None,
            document_state: DocumentState::Empty,
            selection: None,
            tooltip_visible: false,
            panel_open: false,
            transcript: vec![ChatMessage::assistant(WELCOME_MESSAGE)],
            draft: String::new(),
            in_flight: None,
        }
    }

    pub fn document(&self) -> Option<&OpenDocument> {
        self.document.as_ref()
    }

    pub fn document_state(&self) -> &DocumentState {
        &self.document_state
    }

    /// Pages to render, top to bottom.
    pub fn pages(&self) -> Vec<u32> {
        match self.document_state {
            DocumentState::Ready { num_pages } => (1..=num_pages).collect(),
            _ => Vec::new(),
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Anchor of the floating menu, if it is showing.
    pub fn tooltip(&self) -> Option<Point> {
        if !self.tooltip_visible {
            return None;
        }
        self.selection.as_ref().and_then(|s| s.anchor)
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The question input accepts typing.
    pub fn input_enabled(&self) -> bool {
        self.selection.is_some() && !self.is_loading()
    }

    /// The ask button is enabled.
    pub fn can_submit(&self) -> bool {
        self.input_enabled() && !self.draft.trim().is_empty()
    }

    /// Hint shown under the input.
    pub fn hint(&self) -> Option<&'static str> {
        self.selection.is_none().then_some(SELECT_FIRST_HINT)
    }

    /// Advance the session by one event.
    pub fn update(&mut self, event: ViewerEvent) -> Vec<Effect> {
        match event {
            ViewerEvent::DocumentOpened(document) => {
                debug!("Viewer: opened {}", document.stored_name);
                *self = Self::new();
                self.document = Some(document);
                self.document_state = DocumentState::Loading;
                Vec::new()
            }
            ViewerEvent::DocumentLoaded { num_pages } => {
                self.document_state = DocumentState::Ready { num_pages };
                Vec::new()
            }
            ViewerEvent::DocumentFailed(reason) => {
                debug!("Viewer: document failed to load: {}", reason);
                self.document_state = DocumentState::Failed(LOAD_FAILED_MESSAGE.to_string());
                Vec::new()
            }
            ViewerEvent::SelectionSettled(raw) => {
                self.capture_selection(raw);
                Vec::new()
            }
            ViewerEvent::ClickOutside => {
                self.tooltip_visible = false;
                Vec::new()
            }
            ViewerEvent::Copy => {
                self.tooltip_visible = false;
                match &self.selection {
                    Some(selection) => vec![
                        Effect::CopyToClipboard(selection.text.clone()),
                        Effect::ClearNativeSelection,
                    ],
                    None => Vec::new(),
                }
            }
            ViewerEvent::AskAi => {
                self.tooltip_visible = false;
                self.panel_open = true;
                vec![Effect::FocusQuestionInput]
            }
            ViewerEvent::ClosePanel => {
                self.panel_open = false;
                Vec::new()
            }
            ViewerEvent::DraftChanged(draft) => {
                self.draft = draft;
                Vec::new()
            }
            ViewerEvent::Submit => self.submit(),
            ViewerEvent::ReplyReceived(reply) => {
                if self.in_flight.take().is_none() {
                    debug!("Viewer: dropping reply with no request in flight");
                    return Vec::new();
                }
                let content = reply.unwrap_or_else(|_| REPLY_ERROR_MESSAGE.to_string());
                self.transcript.push(ChatMessage::assistant(content));
                Vec::new()
            }
            ViewerEvent::GoHome => {
                *self = Self::new();
                vec![Effect::ShowUpload]
            }
        }
    }

    fn capture_selection(&mut self, raw: RawSelection) {
        let text = raw.text.trim();
        if text.is_empty() {
            self.selection = None;
            self.tooltip_visible = false;
            return;
        }

        let anchor = raw.rect.map(|rect| rect.tooltip_anchor(raw.scroll_y));
        self.tooltip_visible = anchor.is_some();
        self.selection = Some(Selection {
            text: text.to_string(),
            anchor,
            page: raw.page,
        });
    }

    fn submit(&mut self) -> Vec<Effect> {
        if self.is_loading() {
            return Vec::new();
        }

        let question = self.draft.trim();
        let Some(selection) = self.selection.as_ref().filter(|_| !question.is_empty()) else {
            return vec![Effect::Alert(MISSING_INPUT_ALERT.to_string())];
        };
        let Some(document) = &self.document else {
            return vec![Effect::Alert(NO_DOCUMENT_ALERT.to_string())];
        };

        let request = QueryRequest {
            text: selection.text.clone(),
            prompt: question.to_string(),
            filename: document.stored_name.clone(),
            page_number: selection.page,
        };

        self.transcript.push(ChatMessage::user(request.prompt.clone()));
        self.draft.clear();
        self.in_flight = Some(request.clone());

        vec![Effect::SendQuery(request)]
    }
}
