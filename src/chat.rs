use tracing::{error, info};

use crate::{
    api::InsightsApi,
    error::ApiResult,
    schema::{ChatMessage, ChatTurnRequest, ChatTurnResponse},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Guard rejected the submit; nothing was sent.
    Skipped,
    Answered,
    Failed,
}

/// Chat panel state: the transcript, the pending input and the latest
/// context label.
///
/// A turn appends the user message before the request goes out. The
/// assistant reply is appended only on success; a failed turn leaves the
/// user message in place with nothing after it.
#[derive(Debug, Default)]
pub struct ChatSession {
    transcript: Vec<ChatMessage>,
    input: String,
    context: Option<String>,
    awaiting: bool,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }

    pub fn can_submit(&self) -> bool {
        !self.awaiting && !self.input.trim().is_empty()
    }

    /// Start a turn from the current input.
    pub fn begin_turn(&mut self) -> Option<ChatTurnRequest> {
        if !self.can_submit() {
            return None;
        }

        let message = std::mem::take(&mut self.input);
        let request = ChatTurnRequest {
            message: message.clone(),
            history: self.transcript.clone(),
        };

        self.transcript.push(ChatMessage::user(message));
        self.awaiting = true;
        Some(request)
    }

    pub fn finish_turn(&mut self, result: &ApiResult<ChatTurnResponse>) -> TurnOutcome {
        self.awaiting = false;

        match result {
            Ok(reply) => {
                self.transcript.push(ChatMessage::assistant(reply.response.clone()));
                if let Some(context) = reply.context.as_ref().filter(|c| !c.is_empty()) {
                    self.context = Some(context.clone());
                }
                TurnOutcome::Answered
            }
            Err(err) => {
                error!("Chat error: {err}");
                TurnOutcome::Failed
            }
        }
    }

    pub async fn send<A: InsightsApi + ?Sized>(&mut self, api: &A) -> TurnOutcome {
        let Some(request) = self.begin_turn() else {
            return TurnOutcome::Skipped;
        };

        info!(history = request.history.len(), "Sending chat turn");
        let result = api.send_chat(&request).await;
        self.finish_turn(&result)
    }

    /// Like [`send`](Self::send), but reads the reply as an event stream and
    /// hands each payload to `on_event` as it arrives. The full reply is
    /// appended once the stream ends; streamed replies carry no context label.
    pub async fn send_streaming<A, F>(&mut self, api: &A, mut on_event: F) -> TurnOutcome
    where
        A: InsightsApi + ?Sized,
        F: FnMut(&str) + Send,
    {
        let Some(request) = self.begin_turn() else {
            return TurnOutcome::Skipped;
        };

        info!(history = request.history.len(), "Streaming chat turn");
        let result = match api.stream_chat(&request).await {
            Ok(mut stream) => {
                let mut response = String::new();
                let mut failed = None;
                while let Some(event) = stream.next_event().await {
                    match event {
                        Ok(payload) => {
                            on_event(&payload);
                            response.push_str(&payload);
                        }
                        Err(err) => {
                            failed = Some(err);
                            break;
                        }
                    }
                }
                match failed {
                    Some(err) => Err(err),
                    None => Ok(ChatTurnResponse { response, context: None }),
                }
            }
            Err(err) => Err(err),
        };

        self.finish_turn(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::schema::ChatRole;
    use reqwest::StatusCode;

    fn reply(text: &str, context: Option<&str>) -> ApiResult<ChatTurnResponse> {
        Ok(ChatTurnResponse {
            response: text.into(),
            context: context.map(String::from),
        })
    }

    fn failure() -> ApiResult<ChatTurnResponse> {
        Err(ApiError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: String::new(),
        })
    }

    #[test]
    fn blank_input_is_not_submitted() {
        let mut chat = ChatSession::new();
        chat.set_input("   \n\t");
        assert!(!chat.can_submit());
        assert!(chat.begin_turn().is_none());
        assert!(chat.transcript().is_empty());
        assert_eq!(chat.input(), "   \n\t");
    }

    #[test]
    fn history_excludes_the_new_message() {
        let mut chat = ChatSession::new();
        chat.set_input("first");
        chat.begin_turn().unwrap();
        chat.finish_turn(&reply("one", None));

        chat.set_input("second");
        let request = chat.begin_turn().unwrap();
        assert_eq!(request.message, "second");
        assert_eq!(
            request.history,
            vec![ChatMessage::user("first"), ChatMessage::assistant("one")]
        );
        assert_eq!(chat.input(), "");
    }

    #[test]
    fn user_message_is_appended_before_reply() {
        let mut chat = ChatSession::new();
        chat.set_input("hello");
        chat.begin_turn().unwrap();

        assert!(chat.is_awaiting());
        assert_eq!(chat.transcript(), &[ChatMessage::user("hello")]);

        assert_eq!(chat.finish_turn(&reply("hi there", None)), TurnOutcome::Answered);
        assert!(!chat.is_awaiting());
        let roles: Vec<ChatRole> = chat.transcript().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::Assistant]);
    }

    #[test]
    fn second_submit_while_awaiting_is_ignored() {
        let mut chat = ChatSession::new();
        chat.set_input("one");
        chat.begin_turn().unwrap();

        chat.set_input("two");
        assert!(chat.begin_turn().is_none());
        assert_eq!(chat.transcript(), &[ChatMessage::user("one")]);
        assert_eq!(chat.input(), "two");
    }

    #[test]
    fn failed_turn_keeps_orphaned_user_message() {
        let mut chat = ChatSession::new();
        chat.set_input("earlier");
        chat.begin_turn().unwrap();
        chat.finish_turn(&reply("ok", None));

        chat.set_input("lost");
        chat.begin_turn().unwrap();
        assert_eq!(chat.finish_turn(&failure()), TurnOutcome::Failed);

        assert!(!chat.is_awaiting());
        assert_eq!(
            chat.transcript(),
            &[
                ChatMessage::user("earlier"),
                ChatMessage::assistant("ok"),
                ChatMessage::user("lost"),
            ]
        );
    }

    #[test]
    fn context_is_replaced_not_cleared() {
        let mut chat = ChatSession::new();
        chat.set_input("a");
        chat.begin_turn().unwrap();
        chat.finish_turn(&reply("x", Some("Deposits, last 30 days")));
        assert_eq!(chat.context(), Some("Deposits, last 30 days"));

        chat.set_input("b");
        chat.begin_turn().unwrap();
        chat.finish_turn(&reply("y", None));
        assert_eq!(chat.context(), Some("Deposits, last 30 days"));

        chat.set_input("c");
        chat.begin_turn().unwrap();
        chat.finish_turn(&reply("z", Some("No data found")));
        assert_eq!(chat.context(), Some("No data found"));
    }

    #[test]
    fn empty_context_keeps_previous_label() {
        let mut chat = ChatSession::new();
        chat.set_input("a");
        chat.begin_turn().unwrap();
        chat.finish_turn(&reply("x", Some("Withdrawals, last 7 days")));

        chat.set_input("b");
        chat.begin_turn().unwrap();
        chat.finish_turn(&reply("y", Some("")));
        assert_eq!(chat.context(), Some("Withdrawals, last 7 days"));
    }
}
