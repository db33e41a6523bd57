//! Sample actions and performers shared by pipeline tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::action::{Action, ActionDefinition, ActionDefinitionBuilder, ActionState, Performer, Subject};
use crate::session::Engine;
use crate::storage::MemoryStore;
use crate::validation::{merge_attributes, AssignAttributes, AttributeResult};

pub(crate) struct Person {
    pub kind: &'static str,
    pub id: u64,
}

impl Performer for Person {
    fn kind(&self) -> &str {
        self.kind
    }

    fn id(&self) -> String {
        self.id.to_string()
    }
}

pub(crate) fn teacher(id: u64) -> Person {
    Person { kind: "Teacher", id }
}

pub(crate) fn student(id: u64) -> Person {
    Person { kind: "Student", id }
}

pub(crate) type Log = Rc<RefCell<Vec<String>>>;

pub(crate) fn setup() -> (MemoryStore, Engine) {
    let store = MemoryStore::new();
    let engine = Engine::new(store.clone());
    (store, engine)
}

/// Publishes a post by writing `post:<title>` in the current savepoint.
pub(crate) struct PublishPost {
    pub definition: Arc<ActionDefinition<PublishPost>>,
    pub state: ActionState,
    pub performer: Option<Person>,
    pub title: String,
    pub ready: bool,
    pub store: MemoryStore,
    pub log: Log,
}

impl PublishPost {
    pub fn new(definition: Arc<ActionDefinition<PublishPost>>, store: &MemoryStore) -> Self {
        Self {
            definition,
            state: ActionState::new(),
            performer: Some(teacher(1)),
            title: "Hello".to_string(),
            ready: true,
            store: store.clone(),
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn performed_by(mut self, performer: Option<Person>) -> Self {
        self.performer = performer;
        self
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.log.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

impl Subject for PublishPost {
    fn performer(&self) -> Option<&dyn Performer> {
        self.performer.as_ref().map(|p| p as &dyn Performer)
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "title" => Some(Value::String(self.title.clone())),
            "ready" => Some(Value::Bool(self.ready)),
            _ => None,
        }
    }
}

/// Assignable attributes of a [`PublishPost`].
#[derive(Serialize, Deserialize)]
struct PostDraft {
    title: String,
    ready: bool,
}

impl AssignAttributes for PublishPost {
    fn assign_attributes(&mut self, attributes: &Map<String, Value>) -> AttributeResult<()> {
        let mut draft = PostDraft {
            title: self.title.clone(),
            ready: self.ready,
        };
        merge_attributes(&mut draft, attributes)?;
        self.title = draft.title;
        self.ready = draft.ready;
        Ok(())
    }
}

impl Action for PublishPost {
    type Output = String;

    fn definition(&self) -> Arc<ActionDefinition<Self>> {
        self.definition.clone()
    }

    fn state(&self) -> &ActionState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ActionState {
        &mut self.state
    }
}

/// Teacher-only definition without a body.
pub(crate) fn teachers_only() -> ActionDefinitionBuilder<PublishPost> {
    ActionDefinition::<PublishPost>::builder("PublishPost")
        .allow_if(|post| matches!(&post.performer, Some(p) if p.kind == "Teacher"))
}

/// Teacher-only definition whose body writes the post and records `body`.
pub(crate) fn publish_post() -> ActionDefinitionBuilder<PublishPost> {
    teachers_only().perform(|post, session, _options| {
        let tx = session.current_savepoint()?;
        post.store.put(&tx, format!("post:{}", post.title), json!(post.title))?;
        post.record("body");
        Ok(format!("published {}", post.title))
    })
}

/// Teacher-only definition that assigns the `attributes` option before
/// writing the post.
pub(crate) fn edit_post() -> ActionDefinitionBuilder<PublishPost> {
    teachers_only().perform(|post, session, options| {
        if let Some(Value::Object(attributes)) = options.get("attributes") {
            post.assign_attributes(attributes)?;
        }
        let tx = session.current_savepoint()?;
        post.store.put(&tx, format!("post:{}", post.title), json!(post.title))?;
        Ok(format!("published {}", post.title))
    })
}

/// Counts evaluations of an always-true policy.
pub(crate) fn counting_policy(counter: &Arc<AtomicUsize>) -> impl Fn(&PublishPost) -> bool + Send + Sync + 'static {
    let counter = counter.clone();
    move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        true
    }
}
