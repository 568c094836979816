use std::cell::{Cell, RefCell};

use crate::collections::map::HashMap;
use crate::frames::EventCallback;
use crate::{ComponentId, EventHandlerId};

#[derive(Clone)]
pub(crate) struct EventBinding {
    pub(crate) callback: EventCallback,
    pub(crate) owner: ComponentId,
}

/// Handler ids are minted when a callback-valued attribute is first
/// committed and stay valid until the batch that removed them is
/// acknowledged by the display layer, so in-flight dispatches against a
/// just-replaced handler still land on the old callback. Ids are never
/// reused.
pub(crate) struct EventRegistry {
    next_id: Cell<EventHandlerId>,
    bindings: RefCell<HashMap<EventHandlerId, EventBinding>>,
}

impl EventRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            bindings: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn assign(&self, callback: EventCallback, owner: ComponentId) -> EventHandlerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.bindings
            .borrow_mut()
            .insert(id, EventBinding { callback, owner });
        id
    }

    pub(crate) fn get(&self, id: EventHandlerId) -> Option<EventBinding> {
        self.bindings.borrow().get(&id).cloned()
    }

    pub(crate) fn remove_ids(&self, ids: &[EventHandlerId]) {
        let mut bindings = self.bindings.borrow_mut();
        for id in ids {
            bindings.remove(id);
        }
    }

    pub(crate) fn binding_count(&self) -> usize {
        self.bindings.borrow().len()
    }

    pub(crate) fn clear(&self) {
        self.bindings.borrow_mut().clear();
    }
}
