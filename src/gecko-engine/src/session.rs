// Copyright 2024 The Gecko Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use tracing::{debug, warn};

use crate::clipboard::{self, Clipboard};
use crate::clipboard_err;
use crate::common::Result;
use crate::datamodel::ElementRef;
use crate::geometry::Point;
use crate::paste::{self, PasteOutcome};
use crate::project::Project;
use crate::selection::{self, EditorContext};

/// One editing session: the open project and its single clipboard.
///
/// Copy, cut and paste each run against a staged copy of whatever they
/// change and replace the live state only once they have finished.
#[derive(Clone, Debug, Default)]
pub struct Session {
    pub project: Project,
    clipboard: Option<Clipboard>,
}

impl Session {
    pub fn new(project: Project) -> Self {
        Session {
            project,
            clipboard: None,
        }
    }

    pub fn clipboard(&self) -> Option<&Clipboard> {
        self.clipboard.as_ref()
    }

    /// Replaces the clipboard with a copy of `selection`.
    pub fn copy(&mut self, selection: &[ElementRef], ctx: &EditorContext) -> Result<&Clipboard> {
        if !self.project.store.systems.contains_key(&ctx.system) {
            return clipboard_err!(DoesNotExist, format!("system {} is not open", ctx.system));
        }
        let clipboard = clipboard::copy(&mut self.project, selection, ctx)?;
        Ok(self.clipboard.insert(clipboard))
    }

    /// Copy, then remove the selection from the project.  Elements that are
    /// already gone (an edge removed with its state) are skipped; an element
    /// that refuses removal stays and the rest of the cut goes on.
    pub fn cut(&mut self, selection: &[ElementRef], ctx: &EditorContext) -> Result<&Clipboard> {
        if !self.project.store.systems.contains_key(&ctx.system) {
            return clipboard_err!(DoesNotExist, format!("system {} is not open", ctx.system));
        }
        let mut staged = self.project.clone();
        let clipboard = clipboard::copy(&mut staged, selection, ctx)?;
        let closure = selection::collect(&staged.store, selection, ctx)?;
        let removed = remove_all(&mut staged, &closure);
        debug!(removed, "cut finished");
        self.project = staged;
        Ok(self.clipboard.insert(clipboard))
    }

    /// Grafts the clipboard into `ctx.system`, centred on `drop_point`.
    pub fn paste(&mut self, ctx: &EditorContext, drop_point: Point) -> Result<PasteOutcome> {
        let Some(clipboard) = self.clipboard.as_ref().filter(|c| !c.is_empty()) else {
            return clipboard_err!(EmptyClipboard, "nothing to paste".to_string());
        };
        if clipboard.mode != ctx.mode {
            return clipboard_err!(
                ModeMismatch,
                format!("copied in {:?} mode, pasting in {:?} mode", clipboard.mode, ctx.mode)
            );
        }
        if !self.project.store.systems.contains_key(&ctx.system) {
            return clipboard_err!(DoesNotExist, format!("system {} is not open", ctx.system));
        }

        let mut staged = self.project.clone();
        let outcome = paste::paste(&mut staged, clipboard, ctx.system, drop_point)?;
        self.project = staged;
        Ok(outcome)
    }
}

/// Removes each of `elements` still present in `project`, returning how
/// many removals went through.
fn remove_all(project: &mut Project, elements: &[ElementRef]) -> usize {
    let mut removed = 0;
    for element in elements.iter().copied() {
        if !project.store.contains(element) {
            continue;
        }
        match project.remove(element) {
            Ok(()) => removed += 1,
            Err(err) => warn!(%element, error = %err, "element kept by cut"),
        }
    }
    removed
}
