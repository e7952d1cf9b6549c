//! Registration events and their listeners

use crate::command::Command;

/// Fired after a command is attached to the tree.
#[derive(Debug, Clone)]
pub struct RegistrationEvent {
    /// Full dotted name of the registered command.
    pub name: String,
    /// The command as it was when registered.
    pub command: Command,
}

impl RegistrationEvent {
    #[must_use]
    pub fn new(command: &Command) -> Self {
        RegistrationEvent {
            name: command.full_name().to_string(),
            command: command.clone(),
        }
    }
}

/// Whether a listener stays subscribed after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Keep,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Box<dyn FnMut(&RegistrationEvent) -> Delivery + Send>;

struct Listener {
    id: ListenerId,
    callback: Callback,
}

/// Synchronous publisher. Listeners run in subscription order.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<Listener>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventBus {
    pub fn subscribe<F>(&mut self, callback: F) -> ListenerId
    where
        F: FnMut(&RegistrationEvent) -> Delivery + Send + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: &RegistrationEvent) {
        self.listeners
            .retain_mut(|l| (l.callback)(event) == Delivery::Keep);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
