//! Modal focus trapping.
//!
//! While a dialog is open, Tab cycles only among the dialog's own
//! focusable elements. Closing the dialog on any path hands back the
//! element that held focus before it opened, exactly once. If the owner
//! forgets to release, dropping the trap runs the restore hook anyway.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    Escape,
    OutsideClick,
    Completed,
    /// The trap went out of scope without an explicit release.
    Dropped,
}

type RestoreHook<T> = Box<dyn FnOnce(T, ReleaseReason)>;

pub struct FocusTrap<T> {
    return_to: Option<T>,
    restore: Option<RestoreHook<T>>,
    focusables: usize,
    index: usize,
}

impl<T: fmt::Debug> fmt::Debug for FocusTrap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FocusTrap")
            .field("return_to", &self.return_to)
            .field("focusables", &self.focusables)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl<T> FocusTrap<T> {
    /// Open a trap over `focusables` elements, remembering `return_to`.
    pub fn engage(return_to: T, focusables: usize) -> Self {
        Self {
            return_to: Some(return_to),
            restore: None,
            focusables,
            index: 0,
        }
    }

    /// Like [`engage`](Self::engage), running `restore` when the trap is
    /// released (explicitly or on drop).
    pub fn with_restore(
        return_to: T,
        focusables: usize,
        restore: impl FnOnce(T, ReleaseReason) + 'static,
    ) -> Self {
        Self {
            return_to: Some(return_to),
            restore: Some(Box::new(restore)),
            focusables,
            index: 0,
        }
    }

    pub fn is_engaged(&self) -> bool {
        self.return_to.is_some()
    }

    pub fn return_to(&self) -> Option<&T> {
        self.return_to.as_ref()
    }

    /// Index of the focused element inside the dialog.
    pub fn focused(&self) -> usize {
        self.index
    }

    /// Tab / Shift+Tab inside the dialog, wrapping at both ends.
    pub fn cycle(&mut self, forward: bool) -> usize {
        if !self.is_engaged() || self.focusables == 0 {
            return self.index;
        }
        self.index = if forward {
            (self.index + 1) % self.focusables
        } else {
            (self.index + self.focusables - 1) % self.focusables
        };
        self.index
    }

    /// Close the trap. Returns the element to refocus the first time;
    /// later calls return `None`.
    pub fn release(&mut self, reason: ReleaseReason) -> Option<T>
    where
        T: Clone,
    {
        let target = self.return_to.take()?;
        tracing::trace!(?reason, "focus trap released");
        if let Some(restore) = self.restore.take() {
            restore(target.clone(), reason);
        }
        Some(target)
    }
}

impl<T> Drop for FocusTrap<T> {
    fn drop(&mut self) {
        if let Some(target) = self.return_to.take() {
            tracing::debug!("focus trap dropped while engaged");
            if let Some(restore) = self.restore.take() {
                restore(target, ReleaseReason::Dropped);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_release_returns_target_once() {
        let mut trap = FocusTrap::engage((2usize, 1usize), 2);
        assert!(trap.is_engaged());
        assert_eq!(trap.release(ReleaseReason::Escape), Some((2, 1)));
        assert!(!trap.is_engaged());
        assert_eq!(trap.release(ReleaseReason::Completed), None);
    }

    #[test]
    fn test_cycle_wraps() {
        let mut trap = FocusTrap::engage("row", 3);
        assert_eq!(trap.cycle(true), 1);
        assert_eq!(trap.cycle(true), 2);
        assert_eq!(trap.cycle(true), 0);
        assert_eq!(trap.cycle(false), 2);
        trap.release(ReleaseReason::OutsideClick);
        assert_eq!(trap.cycle(true), 2);
    }

    #[test]
    fn test_restore_hook_runs_on_every_close_path() {
        for reason in [
            ReleaseReason::Escape,
            ReleaseReason::OutsideClick,
            ReleaseReason::Completed,
        ] {
            let log = Rc::new(RefCell::new(Vec::new()));
            let sink = log.clone();
            let mut trap = FocusTrap::with_restore(7u32, 1, move |t, r| sink.borrow_mut().push((t, r)));
            trap.release(reason);
            drop(trap);
            assert_eq!(*log.borrow(), vec![(7, reason)]);
        }
    }

    #[test]
    fn test_with_restore_starts_engaged_on_first_element() {
        let mut trap = FocusTrap::with_restore((4usize, 2usize), 3, |_, _| {});
        assert!(trap.is_engaged());
        assert_eq!(trap.focused(), 0);
        assert_eq!(trap.return_to(), Some(&(4, 2)));
        assert_eq!(trap.cycle(false), 2);
        assert_eq!(trap.release(ReleaseReason::Completed), Some((4, 2)));
    }

    #[test]
    fn test_drop_releases_when_forgotten() {
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let sink = log.clone();
            let _trap = FocusTrap::with_restore("grid", 2, move |t, r| sink.borrow_mut().push((t, r)));
        }
        assert_eq!(*log.borrow(), vec![("grid", ReleaseReason::Dropped)]);
    }
}
