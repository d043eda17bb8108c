/// Errors that can occur in the channel layer.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// This end of the channel was disposed, or the other end is gone.
    #[error("channel closed")]
    Closed,

    /// Sending a message failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receiving a message failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Opening a client connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),
}
