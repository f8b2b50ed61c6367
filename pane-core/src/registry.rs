//! Index-keyed collection of editors.
//!
//! The registry applies remote editor commands and local selection. Every
//! mutating call returns the [`EditorChange`]s it produced instead of
//! broadcasting them itself; the caller delivers them once it has released
//! whatever lock guards the registry, which lets change listeners call back
//! into the registry owner.
//!
//! Iteration is ordered by index so batch operations are deterministic.

use std::collections::BTreeMap;

use crate::{Editor, EditorContent, EditorError, EditorSnapshot};

/// What happened to an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A new editor was created.
    Added,
    /// The editor was disposed and removed.
    Removed,
    /// The editor became visible.
    Shown,
    /// The editor became hidden.
    Hidden,
    /// The editor became the selected one.
    Selected,
    /// The editor lost the selection.
    Deselected,
    /// The editor's content was replaced.
    ContentReplaced,
}

/// One structural change, with the editor's state right after it.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorChange {
    /// Editor index.
    pub index: u32,
    /// Kind of change.
    pub kind: ChangeKind,
    /// Editor state after the change.
    pub editor: EditorSnapshot,
}

impl EditorChange {
    fn new(index: u32, kind: ChangeKind, editor: &Editor) -> Self {
        Self {
            index,
            kind,
            editor: editor.snapshot(),
        }
    }
}

/// Mapping from editor index to [`Editor`].
///
/// Invariant: at most one editor is selected.
#[derive(Debug, Default)]
pub struct EditorRegistry {
    editors: BTreeMap<u32, Editor>,
}

impl EditorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update an image editor.
    ///
    /// A new editor is constructed already in its target visibility, so the
    /// `Added` change reflects that visibility.
    pub fn upsert_image_editor(
        &mut self,
        index: u32,
        base64: impl Into<String>,
        visible: bool,
    ) -> Result<Vec<EditorChange>, EditorError> {
        self.upsert_editor(index, EditorContent::image(base64), visible)
    }

    /// Create or update an editor with arbitrary content.
    pub fn upsert_editor(
        &mut self,
        index: u32,
        content: EditorContent,
        visible: bool,
    ) -> Result<Vec<EditorChange>, EditorError> {
        let mut changes = Vec::new();

        match self.editors.get_mut(&index) {
            Some(editor) => {
                editor.set_content(content)?;
                changes.push(EditorChange::new(index, ChangeKind::ContentReplaced, editor));
                if editor.set_visible(visible)? {
                    changes.push(EditorChange::new(index, visibility_kind(visible), editor));
                }
            }
            None => {
                let editor = Editor::new(content, visible);
                changes.push(EditorChange::new(index, ChangeKind::Added, &editor));
                self.editors.insert(index, editor);
                tracing::debug!("Added editor {} (visible: {})", index, visible);
            }
        }

        Ok(changes)
    }

    /// Dispose and remove the editor at `index`.
    ///
    /// An unknown index is tolerated: it is logged and produces no change.
    pub fn remove(&mut self, index: u32) -> Result<Vec<EditorChange>, EditorError> {
        let Some(mut editor) = self.editors.remove(&index) else {
            tracing::warn!("Ignoring removal of unknown editor {}", index);
            return Ok(Vec::new());
        };

        editor.dispose()?;
        tracing::debug!("Removed editor {}", index);
        Ok(vec![EditorChange::new(index, ChangeKind::Removed, &editor)])
    }

    /// Select the editor at `index` and deselect all others.
    ///
    /// Selecting the already-selected editor is a no-op. An unknown index is
    /// logged and leaves the current selection untouched.
    pub fn select_only(&mut self, index: u32) -> Result<Vec<EditorChange>, EditorError> {
        match self.editors.get(&index) {
            None => {
                tracing::warn!("Ignoring selection of unknown editor {}", index);
                return Ok(Vec::new());
            }
            Some(editor) if editor.is_selected() => return Ok(Vec::new()),
            Some(_) => {}
        }

        let mut changes = Vec::new();
        for (&key, editor) in self.editors.iter_mut() {
            let selected = key == index;
            if editor.set_selected(selected)? {
                let kind = if selected {
                    ChangeKind::Selected
                } else {
                    ChangeKind::Deselected
                };
                changes.push(EditorChange::new(key, kind, editor));
            }
        }
        Ok(changes)
    }

    /// Show or hide every editor.
    ///
    /// Only editors whose visibility actually flips produce a change.
    pub fn set_all_visible(&mut self, visible: bool) -> Result<Vec<EditorChange>, EditorError> {
        let keys: Vec<u32> = self.editors.keys().copied().collect();
        let mut changes = Vec::new();

        for key in keys {
            if let Some(editor) = self.editors.get_mut(&key) {
                if editor.set_visible(visible)? {
                    changes.push(EditorChange::new(key, visibility_kind(visible), editor));
                }
            }
        }
        Ok(changes)
    }

    /// Whether the editor at `index` exists and is selected.
    pub fn is_selected(&self, index: u32) -> bool {
        self.editors
            .get(&index)
            .map(Editor::is_selected)
            .unwrap_or(false)
    }

    /// Index of the selected editor, if any.
    pub fn selected_index(&self) -> Option<u32> {
        self.editors
            .iter()
            .find(|(_, editor)| editor.is_selected())
            .map(|(&index, _)| index)
    }

    /// Borrow the editor at `index`.
    pub fn get(&self, index: u32) -> Option<&Editor> {
        self.editors.get(&index)
    }

    /// Mutably borrow the editor at `index` (for attaching listeners).
    pub fn get_mut(&mut self, index: u32) -> Option<&mut Editor> {
        self.editors.get_mut(&index)
    }

    /// Snapshots of all editors, ordered by index.
    pub fn snapshots(&self) -> Vec<(u32, EditorSnapshot)> {
        self.editors
            .iter()
            .map(|(&index, editor)| (index, editor.snapshot()))
            .collect()
    }

    /// Number of editors.
    pub fn len(&self) -> usize {
        self.editors.len()
    }

    /// Whether the registry holds no editors.
    pub fn is_empty(&self) -> bool {
        self.editors.is_empty()
    }
}

fn visibility_kind(visible: bool) -> ChangeKind {
    if visible {
        ChangeKind::Shown
    } else {
        ChangeKind::Hidden
    }
}
