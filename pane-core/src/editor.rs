//! A single observable editor panel.
//!
//! An editor is either active (with independent `visible` and `selected`
//! flags) or disposed. Disposal is terminal: every later mutation fails with
//! [`EditorError::Disposed`].
//!
//! Listeners run synchronously, in registration order, inside the mutating
//! call. A listener that panics unwinds through the caller of the setter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::EditorContent;

/// Errors from editor operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    /// The editor was disposed and accepts no further mutation.
    #[error("editor is disposed")]
    Disposed,
}

/// Notification delivered to editor listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorEvent {
    /// Content was replaced (always fired, even for identical content).
    ContentChanged,
    /// Visibility flipped to the given value.
    VisibilityChanged(bool),
    /// Selection flipped to the given value.
    SelectionChanged(bool),
    /// The editor was disposed. No events follow.
    Disposed,
}

type Listener = Box<dyn FnMut(&EditorEvent) + Send>;

/// An observable content panel.
pub struct Editor {
    content: EditorContent,
    visible: bool,
    selected: bool,
    disposed: bool,
    listeners: Vec<Listener>,
}

impl Editor {
    /// Create an active, unselected editor.
    pub fn new(content: EditorContent, visible: bool) -> Self {
        Self {
            content,
            visible,
            selected: false,
            disposed: false,
            listeners: Vec::new(),
        }
    }

    /// Register a listener. Listeners are called in registration order.
    pub fn add_listener<F>(&mut self, listener: F)
    where
        F: FnMut(&EditorEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Replace the content and notify, whether or not it differs.
    pub fn set_content(&mut self, content: EditorContent) -> Result<(), EditorError> {
        self.ensure_active()?;
        self.content = content;
        self.notify(EditorEvent::ContentChanged);
        Ok(())
    }

    /// Set visibility. Returns `true` if the value changed.
    pub fn set_visible(&mut self, visible: bool) -> Result<bool, EditorError> {
        self.ensure_active()?;
        if self.visible == visible {
            return Ok(false);
        }
        self.visible = visible;
        self.notify(EditorEvent::VisibilityChanged(visible));
        Ok(true)
    }

    /// Set selection. Returns `true` if the value changed.
    pub fn set_selected(&mut self, selected: bool) -> Result<bool, EditorError> {
        self.ensure_active()?;
        if self.selected == selected {
            return Ok(false);
        }
        self.selected = selected;
        self.notify(EditorEvent::SelectionChanged(selected));
        Ok(true)
    }

    /// Dispose the editor, notifying listeners one last time.
    pub fn dispose(&mut self) -> Result<(), EditorError> {
        self.ensure_active()?;
        self.disposed = true;
        self.notify(EditorEvent::Disposed);
        self.listeners.clear();
        Ok(())
    }

    /// Current content.
    pub fn content(&self) -> &EditorContent {
        &self.content
    }

    /// Whether the editor is visible.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the editor is selected.
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Whether the editor has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Copy of the editor's observable state.
    pub fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            content: self.content.clone(),
            visible: self.visible,
            selected: self.selected,
            disposed: self.disposed,
        }
    }

    fn ensure_active(&self) -> Result<(), EditorError> {
        if self.disposed {
            Err(EditorError::Disposed)
        } else {
            Ok(())
        }
    }

    fn notify(&mut self, event: EditorEvent) {
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("content", &self.content)
            .field("visible", &self.visible)
            .field("selected", &self.selected)
            .field("disposed", &self.disposed)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Point-in-time copy of an editor, safe to hand to other threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorSnapshot {
    /// Content at the time of the snapshot.
    pub content: EditorContent,
    /// Visibility flag.
    pub visible: bool,
    /// Selection flag.
    pub selected: bool,
    /// Disposal flag.
    pub disposed: bool,
}
