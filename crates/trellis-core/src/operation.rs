use std::cell::RefCell;
use std::rc::Rc;

use crate::errors::LifecycleFault;

pub type OperationResult = Result<(), LifecycleFault>;

enum OperationState {
    Unsettled(Vec<Box<dyn FnOnce(&OperationResult)>>),
    Settled(OperationResult),
}

/// A settle-once completion token. Lifecycle methods, event callbacks and
/// display commits that cannot finish synchronously hand one of these back;
/// the renderer registers continuations instead of polling.
///
/// Settling is latched: the first of `complete`, `fail` or `cancel` wins and
/// later calls are ignored. Continuations registered after settlement run
/// immediately.
#[derive(Clone)]
pub struct Operation {
    state: Rc<RefCell<OperationState>>,
}

impl Operation {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(OperationState::Unsettled(Vec::new()))),
        }
    }

    /// An operation that is already complete.
    pub fn completed() -> Self {
        Self {
            state: Rc::new(RefCell::new(OperationState::Settled(Ok(())))),
        }
    }

    pub fn complete(&self) {
        self.settle(Ok(()));
    }

    pub fn fail(&self, err: impl std::error::Error + 'static) {
        self.settle(Err(LifecycleFault::error(err)));
    }

    pub fn fail_with(&self, fault: LifecycleFault) {
        self.settle(Err(fault));
    }

    pub fn cancel(&self) {
        self.settle(Err(LifecycleFault::Cancelled));
    }

    pub fn is_settled(&self) -> bool {
        matches!(&*self.state.borrow(), OperationState::Settled(_))
    }

    /// The latched result, if any.
    pub fn result(&self) -> Option<OperationResult> {
        match &*self.state.borrow() {
            OperationState::Settled(result) => Some(result.clone()),
            OperationState::Unsettled(_) => None,
        }
    }

    /// Run `observer` when the operation settles. Runs inline if it already
    /// has.
    pub fn on_settled(&self, observer: impl FnOnce(&OperationResult) + 'static) {
        let mut pending: Option<Box<dyn FnOnce(&OperationResult)>> = Some(Box::new(observer));
        let settled = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                OperationState::Unsettled(observers) => {
                    if let Some(observer) = pending.take() {
                        observers.push(observer);
                    }
                    None
                }
                OperationState::Settled(result) => Some(result.clone()),
            }
        };
        if let (Some(result), Some(observer)) = (settled, pending) {
            observer(&result);
        }
    }

    fn settle(&self, result: OperationResult) {
        let observers = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                OperationState::Settled(_) => return,
                OperationState::Unsettled(observers) => {
                    let taken = std::mem::take(observers);
                    *state = OperationState::Settled(result.clone());
                    taken
                }
            }
        };
        // Borrow released before user code runs; continuations may register
        // further observers or re-enter the renderer.
        for observer in observers {
            observer(&result);
        }
    }
}

impl Default for Operation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settles_once_and_latches() {
        let op = Operation::new();
        assert!(!op.is_settled());
        op.complete();
        op.cancel();
        assert!(matches!(op.result(), Some(Ok(()))));
    }

    #[test]
    fn observers_run_on_settle_and_after() {
        let op = Operation::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = seen.clone();
        op.on_settled(move |result| log.borrow_mut().push(result.is_ok()));
        op.complete();

        let log = seen.clone();
        op.on_settled(move |result| log.borrow_mut().push(result.is_ok()));

        assert_eq!(*seen.borrow(), vec![true, true]);
    }

    #[test]
    fn cancellation_is_distinguishable() {
        let op = Operation::new();
        op.cancel();
        match op.result() {
            Some(Err(fault)) => assert!(fault.is_cancellation()),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
