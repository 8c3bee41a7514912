#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to read invocation stream: {source}")]
    ReadInput {
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write reply stream: {source}")]
    WriteOutput {
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode reply: {source}")]
    EncodeReply {
        #[source]
        source: serde_json::Error,
    },
    #[error("router pool completion channel disconnected")]
    CompletionChannelClosed,
}
