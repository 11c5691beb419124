//! The receiving end of the framed message channel.

use std::io;

use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{LEN_TYPE_SIZE, LenType};

/// The receiving end handle of the communication.
pub struct FrameReceiver<R: AsyncRead + Unpin> {
    rx: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReceiver<R> {
    pub(super) fn new(rx: R) -> Self {
        Self {
            rx,
            buf: Vec::new(),
        }
    }

    /// Waits to receive one framed message from the inner reader.
    ///
    /// # Returns
    /// A result object that returns `T` on success or `io::Error` on
    /// failure, including a closed channel or a malformed frame body.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> io::Result<T> {
        let mut size_buf = [0; LEN_TYPE_SIZE];
        self.rx.read_exact(&mut size_buf).await?;
        let len = LenType::from_be_bytes(size_buf) as usize;

        self.buf.resize(len, 0);
        self.rx.read_exact(&mut self.buf).await?;

        Ok(serde_json::from_slice(&self.buf)?)
    }
}
