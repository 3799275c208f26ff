// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
One-shot signals for device callbacks.

wgpu reports map and completion results through callbacks that run on the poll thread.
We bridge them into futures with continuations.  A continuation must always be resumed, but
the device may discard a pending callback without calling it (typically when it is lost),
so the sender resumes with `None` on drop.
*/

use r#continue::{Future, Sender};

#[derive(Debug)]
pub(super) struct SignalSender<R> {
    sender: Option<Sender<Option<R>>>,
}

impl<R> SignalSender<R> {
    pub(super) fn send(mut self, value: R) {
        if let Some(sender) = self.sender.take() {
            sender.send(Some(value));
        }
    }
}

impl<R> Drop for SignalSender<R> {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            sender.send(None);
        }
    }
}

/// Resolves to `None` if the callback was discarded unsent.
pub(super) fn signal<R>() -> (SignalSender<R>, Future<Option<R>>) {
    let (s, r) = r#continue::continuation();
    (SignalSender { sender: Some(s) }, r)
}
