use super::{Effect, OpenDocument, RawSelection, ViewerEvent, ViewerSession};
use crate::client::CopilotClient;
use crate::schema::{QueryRequest, UploadResponse};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::warn;

/// Delay after pointer-up before reading the native selection, so the
/// browser has finished adjusting it.
pub const SELECTION_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Server calls the viewer needs.
#[async_trait::async_trait]
pub trait CopilotTransport: Send + Sync {
    async fn upload(&self, filename: &str, data: Vec<u8>) -> anyhow::Result<UploadResponse>;
    async fn ask(&self, request: &QueryRequest) -> anyhow::Result<String>;
}

#[async_trait::async_trait]
impl CopilotTransport for CopilotClient {
    async fn upload(&self, filename: &str, data: Vec<u8>) -> anyhow::Result<UploadResponse> {
        CopilotClient::upload(self, filename, data).await
    }

    async fn ask(&self, request: &QueryRequest) -> anyhow::Result<String> {
        self.query(request).await
    }
}

/// Owns a session and performs its network effects, one request at a time.
pub struct ViewerDriver<T> {
    session: ViewerSession,
    transport: T,
    settle_delay: Duration,
}

impl<T: CopilotTransport> ViewerDriver<T> {
    pub fn new(transport: T) -> Self {
        Self {
            session: ViewerSession::new(),
            transport,
            settle_delay: SELECTION_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn session(&self) -> &ViewerSession {
        &self.session
    }

    /// Upload a file and open it. On failure the session is left untouched.
    pub async fn open(&mut self, filename: &str, data: Vec<u8>) -> anyhow::Result<OpenDocument> {
        let uploaded = self.transport.upload(filename, data).await?;
        let document = OpenDocument::from_upload(filename, &uploaded);
        self.dispatch(ViewerEvent::DocumentOpened(document.clone()))
            .await;
        Ok(document)
    }

    /// Pointer-up / touch-end inside the page area. Waits for the selection
    /// to settle, then reads it with `read_selection`.
    pub async fn pointer_released<F>(&mut self, read_selection: F) -> Vec<Effect>
    where
        F: FnOnce() -> RawSelection,
    {
        tokio::time::sleep(self.settle_delay).await;
        let raw = read_selection();
        self.dispatch(ViewerEvent::SelectionSettled(raw)).await
    }

    /// Apply an event. Queries are sent and their replies fed back before
    /// this returns; every other effect is handed back to the host.
    ///
    /// The session is never observed in its loading state from outside
    /// this call. Hosts that render a loading indicator use [`apply`] and
    /// [`send`] instead.
    ///
    /// [`apply`]: ViewerDriver::apply
    /// [`send`]: ViewerDriver::send
    pub async fn dispatch(&mut self, event: ViewerEvent) -> Vec<Effect> {
        let mut host_effects = Vec::new();
        let mut queries: VecDeque<_> = self.split(event, &mut host_effects);

        while let Some(request) = queries.pop_front() {
            let reply = self.ask(&request).await;
            queries.extend(self.split(ViewerEvent::ReplyReceived(reply), &mut host_effects));
        }

        host_effects
    }

    /// Apply an event without performing any network effect. A
    /// [`Effect::SendQuery`] is returned to the caller, who completes it
    /// with [`send`](ViewerDriver::send) while the session reports loading.
    pub fn apply(&mut self, event: ViewerEvent) -> Vec<Effect> {
        self.session.update(event)
    }

    /// Perform a query returned by [`apply`](ViewerDriver::apply) and feed
    /// the reply back into the session.
    pub async fn send(&mut self, request: QueryRequest) -> Vec<Effect> {
        let reply = self.ask(&request).await;
        self.dispatch(ViewerEvent::ReplyReceived(reply)).await
    }

    async fn ask(&self, request: &QueryRequest) -> Result<String, String> {
        self.transport.ask(request).await.map_err(|e| {
            warn!("AI query failed: {:#}", e);
            e.to_string()
        })
    }

    /// Update the session, moving queries out of the effect list.
    fn split(&mut self, event: ViewerEvent, host_effects: &mut Vec<Effect>) -> VecDeque<QueryRequest> {
        let mut queries = VecDeque::new();
        for effect in self.session.update(event) {
            match effect {
                Effect::SendQuery(request) => queries.push_back(request),
                other => host_effects.push(other),
            }
        }
        queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ChatMessage, Role};
    use crate::viewer::{SelectionRect, REPLY_ERROR_MESSAGE};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl CopilotTransport for Recorder {
        async fn upload(&self, _filename: &str, _data: Vec<u8>) -> anyhow::Result<UploadResponse> {
            Ok(UploadResponse {
                file_path: "/uploads/1718000000000.pdf".into(),
            })
        }

        async fn ask(&self, request: &QueryRequest) -> anyhow::Result<String> {
            self.log.lock().unwrap().push(format!(
                "{}|{}|{}|{}",
                request.text, request.prompt, request.filename, request.page_number
            ));
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(format!("answer to {}", request.prompt))
        }
    }

    fn raw(text: &str, page: u32) -> RawSelection {
        RawSelection {
            text: text.into(),
            rect: Some(SelectionRect {
                left: 0.0,
                top: 50.0,
                width: 20.0,
                height: 10.0,
            }),
            page,
            scroll_y: 0.0,
        }
    }

    async fn ask(driver: &mut ViewerDriver<Recorder>, question: &str) -> Vec<Effect> {
        driver.dispatch(ViewerEvent::AskAi).await;
        driver
            .dispatch(ViewerEvent::DraftChanged(question.into()))
            .await;
        driver.dispatch(ViewerEvent::Submit).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_read_after_settle_delay() {
        let mut driver = ViewerDriver::new(Recorder::default());
        let started = tokio::time::Instant::now();

        driver
            .pointer_released(|| raw("revenue grew 12%", 3))
            .await;

        assert!(started.elapsed() >= SELECTION_SETTLE_DELAY);
        assert!(driver.session().tooltip().is_some());
    }

    #[tokio::test]
    async fn test_upload_then_ask_sends_stored_name_and_page() {
        let mut driver = ViewerDriver::new(Recorder::default()).with_settle_delay(Duration::ZERO);
        let document = driver.open("report.pdf", b"%PDF".to_vec()).await.unwrap();
        assert_eq!(document.stored_name, "1718000000000.pdf");
        assert_eq!(document.display_name, "report.pdf");

        driver
            .pointer_released(|| raw("revenue grew 12%", 3))
            .await;
        let effects = ask(&mut driver, "what does this mean?").await;
        assert!(effects.is_empty());

        assert_eq!(
            driver.transport.log.lock().unwrap().as_slice(),
            &["revenue grew 12%|what does this mean?|1718000000000.pdf|3".to_string()]
        );
        assert_eq!(
            driver.session().transcript().last(),
            Some(&ChatMessage::assistant("answer to what does this mean?"))
        );
        assert!(!driver.session().is_loading());
    }

    #[tokio::test]
    async fn test_sequential_questions_do_not_interleave() {
        let mut driver = ViewerDriver::new(Recorder::default()).with_settle_delay(Duration::ZERO);
        driver.open("report.pdf", b"%PDF".to_vec()).await.unwrap();

        driver.pointer_released(|| raw("first passage", 1)).await;
        ask(&mut driver, "q1").await;
        driver.pointer_released(|| raw("second passage", 4)).await;
        ask(&mut driver, "q2").await;

        let log = driver.transport.log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "first passage|q1|1718000000000.pdf|1".to_string(),
                "second passage|q2|1718000000000.pdf|4".to_string(),
            ]
        );

        let transcript: Vec<_> = driver
            .session()
            .transcript()
            .iter()
            .skip(1)
            .map(|m| (m.role, m.content.clone()))
            .collect();
        assert_eq!(
            transcript,
            vec![
                (Role::User, "q1".to_string()),
                (Role::Assistant, "answer to q1".to_string()),
                (Role::User, "q2".to_string()),
                (Role::Assistant, "answer to q2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_generic_message() {
        let recorder = Recorder {
            fail: true,
            ..Recorder::default()
        };
        let mut driver = ViewerDriver::new(recorder).with_settle_delay(Duration::ZERO);
        driver.open("report.pdf", b"%PDF".to_vec()).await.unwrap();
        driver.pointer_released(|| raw("passage", 2)).await;
        ask(&mut driver, "why?").await;

        assert_eq!(
            driver.session().transcript().last(),
            Some(&ChatMessage::assistant(REPLY_ERROR_MESSAGE))
        );
        assert!(!driver.session().is_loading());
    }

    #[tokio::test]
    async fn test_loading_visible_between_apply_and_send() {
        let mut driver = ViewerDriver::new(Recorder::default()).with_settle_delay(Duration::ZERO);
        driver.open("report.pdf", b"%PDF".to_vec()).await.unwrap();
        driver.pointer_released(|| raw("revenue grew 12%", 3)).await;
        driver.apply(ViewerEvent::AskAi);
        driver.apply(ViewerEvent::DraftChanged("why?".into()));

        let effects = driver.apply(ViewerEvent::Submit);
        let request = match effects.as_slice() {
            [Effect::SendQuery(request)] => request.clone(),
            other => panic!("expected a single query, got {:?}", other),
        };
        assert!(driver.session().is_loading());
        assert!(driver.transport.log.lock().unwrap().is_empty());

        driver.send(request).await;
        assert!(!driver.session().is_loading());
        assert_eq!(
            driver.session().transcript().last(),
            Some(&ChatMessage::assistant("answer to why?"))
        );
    }

    #[tokio::test]
    async fn test_host_effects_passed_through() {
        let mut driver = ViewerDriver::new(Recorder::default()).with_settle_delay(Duration::ZERO);
        driver.pointer_released(|| raw("passage", 2)).await;

        let effects = driver.dispatch(ViewerEvent::Copy).await;
        assert_eq!(
            effects,
            vec![
                Effect::CopyToClipboard("passage".into()),
                Effect::ClearNativeSelection
            ]
        );
    }
}
