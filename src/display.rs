//! Seams to the windowing and image-loading collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::error::LoadError;

/// Owner of the currently shown images.
#[async_trait]
pub trait ImageDisplay: Send + Sync {
    /// Close every open image. Does nothing when nothing is open.
    async fn close_all(&self);
}

/// Turns a locator (URL or local path) into a displayed image.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn open(&self, locator: &str) -> Result<(), LoadError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayedImage {
    pub locator: String,
    pub width: u32,
    pub height: u32,
}

/// In-process displayed set, in the order images were opened.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    shown: Arc<Mutex<Vec<DisplayedImage>>>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, image: DisplayedImage) {
        info!(
            locator = %image.locator,
            width = image.width,
            height = image.height,
            "displaying image"
        );
        self.shown.lock().push(image);
    }

    pub fn images(&self) -> Vec<DisplayedImage> {
        self.shown.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.shown.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.lock().is_empty()
    }
}

#[async_trait]
impl ImageDisplay for Gallery {
    async fn close_all(&self) {
        let closed = std::mem::take(&mut *self.shown.lock()).len();
        if closed > 0 {
            info!(closed, "closed displayed images");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(locator: &str) -> DisplayedImage {
        DisplayedImage {
            locator: locator.into(),
            width: 4,
            height: 3,
        }
    }

    #[tokio::test]
    async fn close_all_empties_and_is_idempotent() {
        let gallery = Gallery::new();
        gallery.show(image("a.png"));
        gallery.show(image("b.png"));
        assert_eq!(gallery.len(), 2);

        gallery.close_all().await;
        assert!(gallery.is_empty());
        gallery.close_all().await;
        assert!(gallery.is_empty());
    }

    #[test]
    fn keeps_open_order() {
        let gallery = Gallery::new();
        for name in ["c", "a", "b"] {
            gallery.show(image(name));
        }
        let order: Vec<_> = gallery.images().into_iter().map(|i| i.locator).collect();
        assert_eq!(order, ["c", "a", "b"]);
    }
}
