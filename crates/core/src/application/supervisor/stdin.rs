// Writer for the child's stdin
use std::io;
use tokio::io::AsyncWriteExt;

use super::BoxedWriter;
use crate::error::{Result, SupervisorError};

/// Caller-side writer to the process input; None once closed
pub(crate) struct StdinWriter {
    inner: Option<BoxedWriter>,
}

impl StdinWriter {
    pub(crate) fn new(inner: Option<BoxedWriter>) -> Self {
        Self { inner }
    }

    /// Write `text` and flush it to the pipe
    pub(crate) async fn write<E>(&mut self, text: &str) -> Result<(), E> {
        let Some(writer) = self.inner.as_mut() else {
            return Err(SupervisorError::InvalidState("stdin already closed"));
        };

        writer
            .write_all(text.as_bytes())
            .await
            .map_err(SupervisorError::Io)?;
        writer.flush().await.map_err(SupervisorError::Io)
    }

    /// Close the pipe so the child sees EOF; closing twice is a no-op
    pub(crate) async fn close(&mut self) -> io::Result<()> {
        match self.inner.take() {
            Some(mut writer) => writer.shutdown().await,
            None => Ok(()),
        }
    }
}
