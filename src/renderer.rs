//! Document renderer seam.
//!
//! A [`DocumentRenderer`] turns one source document into a [`ContentTree`].
//! Renderers are stateful and single-tenant: one document is open at a time,
//! and the only way to know a render finished is to poll for it. The
//! orchestrator therefore drives them strictly sequentially through a
//! [`RendererSurface`], a scoped guard that acquires the renderer for one
//! batch and always releases it, whether the batch completes, fails or is
//! cancelled.
//!
//! The production renderer is [`MarkdownRenderer`](crate::markdown::MarkdownRenderer).

use crate::content::ContentTree;
use crate::unit::SourceDocument;
use async_trait::async_trait;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Renderer unavailable: {0}")]
    Unavailable(String),
    #[error("Could not open {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("Render of {0} did not complete within {1:?}")]
    Timeout(String, Duration),
    #[error("No content produced for {0}")]
    MissingContent(String),
    #[error("Unsupported document kind: {0}")]
    UnsupportedKind(String),
}

/// Token for the document currently open in a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderHandle(pub u64);

#[async_trait]
pub trait DocumentRenderer: Send {
    /// Prepare the rendering surface for a batch.
    async fn begin_batch(&mut self) -> Result<(), RenderError>;

    /// Load `document`, replacing whatever was open before.
    async fn open(&mut self, document: &SourceDocument) -> Result<RenderHandle, RenderError>;

    /// Whether the render for `handle` has finished.
    fn poll_render_complete(&self, handle: RenderHandle) -> bool;

    fn extract_content(&mut self, handle: RenderHandle) -> Result<ContentTree, RenderError>;

    /// Release the surface. Called exactly once per acquired batch.
    fn close(&mut self);
}

/// Poll `condition` every `interval` until it holds or `timeout` elapses.
pub async fn wait_until<F>(mut condition: F, timeout: Duration, interval: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Exclusive use of a renderer for one batch.
pub struct RendererSurface<'r, R: DocumentRenderer + ?Sized> {
    renderer: &'r mut R,
    released: bool,
}

impl<'r, R: DocumentRenderer + ?Sized> RendererSurface<'r, R> {
    /// Begin a batch. On failure the renderer is closed before returning.
    pub async fn acquire(renderer: &'r mut R) -> Result<Self, RenderError> {
        if let Err(e) = renderer.begin_batch().await {
            renderer.close();
            return Err(e);
        }
        tracing::debug!("renderer surface acquired");
        Ok(Self {
            renderer,
            released: false,
        })
    }

    /// Open, wait for completion, and extract one document.
    pub async fn render(
        &mut self,
        document: &SourceDocument,
        timeout: Duration,
        interval: Duration,
    ) -> Result<ContentTree, RenderError> {
        let handle = self.renderer.open(document).await?;
        let renderer = &*self.renderer;
        if !wait_until(|| renderer.poll_render_complete(handle), timeout, interval).await {
            return Err(RenderError::Timeout(document.key().to_string(), timeout));
        }
        self.renderer.extract_content(handle)
    }

    pub fn release(mut self) {
        self.close_once();
    }

    fn close_once(&mut self) {
        if !self.released {
            self.released = true;
            self.renderer.close();
            tracing::debug!("renderer surface released");
        }
    }
}

impl<R: DocumentRenderer + ?Sized> Deref for RendererSurface<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &*self.renderer
    }
}

impl<R: DocumentRenderer + ?Sized> DerefMut for RendererSurface<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut *self.renderer
    }
}

impl<R: DocumentRenderer + ?Sized> Drop for RendererSurface<'_, R> {
    fn drop(&mut self) {
        self.close_once();
    }
}
