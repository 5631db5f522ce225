//! Terminal-message classification.

use agent_stream_core::{AgentMessage, MessageType};

/// What a message means for the stream's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Keep streaming.
    Continue,
    /// A secondary workstream finished; the run continues.
    WorkstreamComplete(String),
    /// The run is over.
    Finished,
}

pub(crate) fn classify(message: &AgentMessage) -> Verdict {
    match message.kind {
        MessageType::Terminated => Verdict::Finished,
        MessageType::Complete => match message.workstream_id.as_deref() {
            Some(id) if !message.is_main_workstream() => Verdict::WorkstreamComplete(id.to_owned()),
            _ => Verdict::Finished,
        },
        MessageType::System
        | MessageType::Thought
        | MessageType::Plan
        | MessageType::Update
        | MessageType::Warning
        | MessageType::Error
        | MessageType::Answer
        | MessageType::Question
        | MessageType::RequestInput
        | MessageType::Idle
        | MessageType::StreamingChunk
        | MessageType::BatchProgress
        | MessageType::Unknown => Verdict::Continue,
    }
}

#[cfg(test)]
mod tests {
    use agent_stream_core::MAIN_WORKSTREAM;

    use super::*;

    #[test]
    fn test_terminated_ends_any_workstream() {
        let msg = AgentMessage::new(MessageType::Terminated).with_workstream("sub1");
        assert_eq!(classify(&msg), Verdict::Finished);
    }

    #[test]
    fn test_complete_on_main_ends() {
        assert_eq!(classify(&AgentMessage::new(MessageType::Complete)), Verdict::Finished);
        let main = AgentMessage::new(MessageType::Complete).with_workstream(MAIN_WORKSTREAM);
        assert_eq!(classify(&main), Verdict::Finished);
    }

    #[test]
    fn test_complete_on_sub_workstream_continues() {
        let msg = AgentMessage::new(MessageType::Complete).with_workstream("sub1");
        assert_eq!(classify(&msg), Verdict::WorkstreamComplete("sub1".into()));
    }

    #[test]
    fn test_other_types_continue() {
        for kind in [MessageType::Update, MessageType::Error, MessageType::Idle, MessageType::Unknown] {
            assert_eq!(classify(&AgentMessage::new(kind)), Verdict::Continue);
        }
    }
}
