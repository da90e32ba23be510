//! Panel runtime: mounts a panel onto the event bus and drives it.
//!
//! A mounted panel is one tokio task owning the panel value. Inbound bus
//! events are parsed into the panel's command type and queued on an
//! unbounded channel together with host-action completions; slice
//! changes published by the host are watched in the same loop. After each
//! input the task publishes a fresh [`PanelView`].
//!
//! Panels never talk to the bus or the host directly. `handle` and
//! `complete` push [`Effect`]s which the runtime applies: emit a
//! notification, spawn a host future whose output comes back through
//! `complete`, or ask the host to refresh a slice.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::actions::{ActionError, HostAction};
use crate::command::PanelCommand;
use crate::event::{EventBus, PanelEvent, Subscription};
use crate::lifecycle;
use crate::reducer::{StateAction, reduce};
use crate::slice::{PanelContext, SliceKey, SliceScope};
use crate::state::{ActionKind, ListState};
use crate::view::PanelView;

pub type BoxFuture<C> = Pin<Box<dyn Future<Output = C> + Send + 'static>>;

pub enum Effect<C> {
    /// Emit a notification sourced from the panel
    Emit { event_type: &'static str, payload: Value },
    /// Run a host future; its output is fed back to `Panel::complete`
    Spawn(BoxFuture<C>),
    /// Ask the host to reload slices
    Refresh { scope: Option<SliceScope>, name: Option<String> },
}

/// Effects collected while handling one input
pub struct Effects<C> {
    items: Vec<Effect<C>>,
}

impl<C> Default for Effects<C> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<C> Effects<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event_type: &'static str, payload: Value) {
        self.items.push(Effect::Emit { event_type, payload });
    }

    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = C> + Send + 'static,
    {
        self.items.push(Effect::Spawn(Box::pin(future)));
    }

    pub fn refresh(&mut self, key: &SliceKey) {
        self.items.push(Effect::Refresh {
            scope: Some(key.scope),
            name: Some(key.name.clone()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Notifications queued so far, in order
    pub fn emitted(&self) -> Vec<(&'static str, &Value)> {
        self.items
            .iter()
            .filter_map(|e| match e {
                Effect::Emit { event_type, payload } => Some((*event_type, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn refreshes(&self) -> Vec<(Option<SliceScope>, Option<&str>)> {
        self.items
            .iter()
            .filter_map(|e| match e {
                Effect::Refresh { scope, name } => Some((*scope, name.as_deref())),
                _ => None,
            })
            .collect()
    }

    /// Remove and return the queued host futures
    pub fn take_spawned(&mut self) -> Vec<BoxFuture<C>> {
        let mut spawned = Vec::new();
        let mut rest = Vec::new();
        for effect in self.items.drain(..) {
            match effect {
                Effect::Spawn(future) => spawned.push(future),
                other => rest.push(other),
            }
        }
        self.items = rest;
        spawned
    }

    pub fn into_effects(self) -> Vec<Effect<C>> {
        self.items
    }
}

/// Serialize a notification payload; failures are logged and sent as null
pub fn to_payload<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| {
        warn!(%err, "failed to serialize event payload");
        Value::Null
    })
}

/// Outcome of a host action started with [`invoke`]
#[derive(Debug)]
pub struct Settled<O> {
    pub action: ActionKind,
    pub target: String,
    pub result: Result<O, ActionError>,
}

/// Start `action` for `target` unless the same (action, target) is already
/// in flight. The host future's value is mapped through `map` and arrives
/// back at the panel as a [`Settled`].
#[allow(clippy::too_many_arguments)]
pub fn invoke<A, T, O, F>(
    panel: &'static str,
    state: &mut ListState,
    effects: &mut Effects<Settled<O>>,
    kind: ActionKind,
    target: &str,
    action: &HostAction<A, T>,
    args: A,
    map: F,
) -> bool
where
    T: 'static,
    O: Send + 'static,
    F: FnOnce(T) -> O + Send + 'static,
{
    let begin = StateAction::Begin {
        action: kind,
        target: target.to_string(),
    };
    if !reduce(state, &begin) {
        debug!(panel, action = ?kind, entity = target, "action already in flight");
        return false;
    }

    let pending = action(args);
    let target = target.to_string();
    effects.spawn(async move {
        Settled {
            action: kind,
            target,
            result: pending.await.map(map),
        }
    });
    true
}

/// Fold a settled host action into `state`. Returns the outcome on
/// success; failures are logged and leave a banner.
pub fn settle<O>(panel: &'static str, state: &mut ListState, settled: Settled<O>) -> Option<(String, O)> {
    let Settled { action, target, result } = settled;
    match result {
        Ok(outcome) => {
            reduce(
                state,
                &StateAction::Succeed {
                    action,
                    target: target.clone(),
                },
            );
            Some((target, outcome))
        }
        Err(err) => {
            warn!(panel, action = ?action, entity = %target, error = %err, "host action failed");
            reduce(
                state,
                &StateAction::Fail {
                    action,
                    target,
                    message: err.to_string(),
                },
            );
            None
        }
    }
}

/// A panel: a filterable list bridged to the event bus
pub trait Panel: Send + 'static {
    type Command: PanelCommand;
    type Completion: Send + 'static;

    /// Panel id; also the event namespace
    const ID: &'static str;

    fn required_slices(&self) -> Vec<SliceKey>;

    /// Re-read slices after the host published a change
    fn sync(&mut self, context: &PanelContext);

    fn handle(&mut self, command: Self::Command, effects: &mut Effects<Self::Completion>);

    fn complete(&mut self, completion: Self::Completion, effects: &mut Effects<Self::Completion>);

    fn view(&self) -> PanelView;
}

enum PanelInput<P: Panel> {
    Command(P::Command),
    Completed(P::Completion),
    /// Reply once no host future is outstanding
    Idle(oneshot::Sender<()>),
}

/// A panel mounted on a bus. Dropping it unmounts the panel.
pub struct MountedPanel<P: Panel> {
    inputs: mpsc::UnboundedSender<PanelInput<P>>,
    views: watch::Receiver<PanelView>,
    subscriptions: Vec<Subscription>,
    task: JoinHandle<()>,
}

/// Mount `panel`: subscribe its commands on `bus`, request the initial
/// refresh and start its task. Must be called inside a tokio runtime.
pub fn mount<P: Panel>(mut panel: P, bus: &EventBus, context: PanelContext) -> MountedPanel<P> {
    panel.sync(&context);
    let (view_tx, view_rx) = watch::channel(panel.view());
    let (input_tx, input_rx) = mpsc::unbounded_channel();

    let subscriptions = P::Command::EVENT_TYPES
        .iter()
        .map(|event_type| {
            let input_tx = input_tx.clone();
            bus.on(event_type, move |event: &PanelEvent| {
                match P::Command::from_event(event) {
                    Ok(command) => {
                        let _ = input_tx.send(PanelInput::Command(command));
                    }
                    Err(err) => {
                        warn!(panel = P::ID, source = %event.source, error = %err, "ignoring malformed command");
                    }
                }
            })
        })
        .collect();

    let mut initial = Effects::new();
    for key in lifecycle::on_mount(P::ID, &panel.required_slices(), &context) {
        initial.refresh(&key);
    }

    let driver = Driver::<P> {
        bus: bus.clone(),
        context,
        inputs: input_tx.clone(),
        pending: 0,
        waiters: Vec::new(),
    };
    driver.apply(initial);
    let task = tokio::spawn(driver.run(panel, input_rx, view_tx));

    MountedPanel {
        inputs: input_tx,
        views: view_rx,
        subscriptions,
        task,
    }
}

impl<P: Panel> MountedPanel<P> {
    pub fn id(&self) -> &'static str {
        P::ID
    }

    /// Queue a command directly, bypassing the bus
    pub fn dispatch(&self, command: P::Command) -> bool {
        self.inputs.send(PanelInput::Command(command)).is_ok()
    }

    /// The latest published view
    pub fn view(&self) -> PanelView {
        self.views.borrow().clone()
    }

    pub fn views(&self) -> watch::Receiver<PanelView> {
        self.views.clone()
    }

    /// Wait until every queued input is handled and no host future is
    /// outstanding
    pub async fn idle(&self) {
        let (tx, rx) = oneshot::channel();
        if self.inputs.send(PanelInput::Idle(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn unmount(self) {}
}

impl<P: Panel> Drop for MountedPanel<P> {
    fn drop(&mut self) {
        self.subscriptions.clear();
        self.task.abort();
        lifecycle::on_unmount(P::ID);
    }
}

struct Driver<P: Panel> {
    bus: EventBus,
    context: PanelContext,
    inputs: mpsc::UnboundedSender<PanelInput<P>>,
    /// Host futures spawned and not yet completed
    pending: usize,
    waiters: Vec<oneshot::Sender<()>>,
}

impl<P: Panel> Driver<P> {
    async fn run(
        mut self,
        mut panel: P,
        mut inputs: mpsc::UnboundedReceiver<PanelInput<P>>,
        view_tx: watch::Sender<PanelView>,
    ) {
        let mut slices = self.context.watch();
        let mut host_alive = true;

        loop {
            tokio::select! {
                input = inputs.recv() => {
                    let Some(input) = input else { break };
                    // commands see the entity list current at processing time
                    if matches!(slices.has_changed(), Ok(true)) {
                        slices.borrow_and_update();
                        panel.sync(&self.context);
                    }
                    self.step(&mut panel, input);
                }
                changed = slices.changed(), if host_alive => {
                    if changed.is_err() {
                        debug!(panel = P::ID, "host slice publisher closed");
                        host_alive = false;
                        continue;
                    }
                    panel.sync(&self.context);
                }
            }
            view_tx.send_replace(panel.view());
        }
    }

    fn step(&mut self, panel: &mut P, input: PanelInput<P>) {
        let mut effects = Effects::new();
        match input {
            PanelInput::Command(command) => {
                debug!(panel = P::ID, command = ?command, "command");
                panel.handle(command, &mut effects);
            }
            PanelInput::Completed(completion) => {
                self.pending = self.pending.saturating_sub(1);
                panel.complete(completion, &mut effects);
            }
            PanelInput::Idle(waiter) => self.waiters.push(waiter),
        }
        self.pending += self.apply(effects);

        if self.pending == 0 {
            for waiter in self.waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    /// Apply `effects`, returning how many host futures were spawned
    fn apply(&self, effects: Effects<P::Completion>) -> usize {
        let mut spawned = 0;
        for effect in effects.into_effects() {
            match effect {
                Effect::Emit { event_type, payload } => {
                    debug!(panel = P::ID, event_type, "notify");
                    self.bus.emit(PanelEvent::new(event_type, P::ID, payload));
                }
                Effect::Spawn(future) => {
                    spawned += 1;
                    let inputs = self.inputs.clone();
                    tokio::spawn(async move {
                        let completion = future.await;
                        // the panel may have been unmounted meanwhile
                        let _ = inputs.send(PanelInput::Completed(completion));
                    });
                }
                Effect::Refresh { scope, name } => {
                    let context = self.context.clone();
                    tokio::spawn(async move {
                        if let Err(err) = context.refresh(scope, name.as_deref()).await {
                            warn!(panel = P::ID, slice = ?name, error = %err, "refresh failed");
                        }
                    });
                }
            }
        }
        spawned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::host_action;
    use crate::command::{CommandError, decode, unknown};
    use crate::slice::{CurrentScope, HostSlices, SliceSet};
    use crate::view::{PanelStatus, Row, Section};
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    // A minimal panel over a list of names
    #[derive(Debug)]
    enum NamesCommand {
        Filter { filter: String },
        Select { name: String },
        Save { name: String },
    }

    #[derive(Deserialize)]
    struct NamePayload {
        name: String,
    }

    impl PanelCommand for NamesCommand {
        const EVENT_TYPES: &'static [&'static str] = &["names:filter", "names:select", "names:save"];

        fn parse(event_type: &str, payload: &Value) -> Result<Self, CommandError> {
            match event_type {
                "names:filter" => {
                    let p: crate::command::FilterPayload = decode(event_type, payload)?;
                    Ok(Self::Filter { filter: p.filter })
                }
                "names:select" => Ok(Self::Select {
                    name: decode::<NamePayload>(event_type, payload)?.name,
                }),
                "names:save" => Ok(Self::Save {
                    name: decode::<NamePayload>(event_type, payload)?.name,
                }),
                other => Err(unknown(other)),
            }
        }

        fn event_type(&self) -> &'static str {
            match self {
                Self::Filter { .. } => "names:filter",
                Self::Select { .. } => "names:select",
                Self::Save { .. } => "names:save",
            }
        }

        fn payload(&self) -> Value {
            match self {
                Self::Filter { filter } => json!({ "filter": filter }),
                Self::Select { name } | Self::Save { name } => json!({ "name": name }),
            }
        }
    }

    struct Names {
        names: Vec<String>,
        state: ListState,
        save: Option<HostAction<String, ()>>,
    }

    impl Panel for Names {
        type Command = NamesCommand;
        type Completion = Settled<()>;
        const ID: &'static str = "names";

        fn required_slices(&self) -> Vec<SliceKey> {
            vec![SliceKey::global("names")]
        }

        fn sync(&mut self, context: &PanelContext) {
            self.names = context
                .get_slice::<Vec<String>>("names")
                .map(|s| s.data)
                .unwrap_or_default();
        }

        fn handle(&mut self, command: NamesCommand, effects: &mut Effects<Settled<()>>) {
            match command {
                NamesCommand::Filter { filter } => {
                    reduce(&mut self.state, &StateAction::SetFilter { filter });
                }
                NamesCommand::Select { name } => {
                    if self.names.contains(&name) {
                        reduce(&mut self.state, &StateAction::Select { key: name.clone() });
                        effects.emit("names:name:selected", json!({ "name": name }));
                    }
                }
                NamesCommand::Save { name } => {
                    if let Some(save) = &self.save {
                        invoke(Self::ID, &mut self.state, effects, ActionKind::Add, &name, save, name.clone(), |_| ());
                    }
                }
            }
        }

        fn complete(&mut self, completion: Settled<()>, effects: &mut Effects<Settled<()>>) {
            if let Some((name, ())) = settle(Self::ID, &mut self.state, completion) {
                effects.emit("names:name:saved", json!({ "name": name }));
            }
        }

        fn view(&self) -> PanelView {
            let mut view = PanelView::new(Self::ID, &self.state);
            view.status = if self.names.is_empty() {
                PanelStatus::Empty
            } else {
                PanelStatus::Ready
            };
            let rows = self
                .names
                .iter()
                .filter(|n| n.contains(&self.state.filter))
                .map(|n| Row::new(n.as_str(), n.as_str()).selected(self.state.is_selected(n)))
                .collect();
            view.sections.push(Section::flat(rows));
            view
        }
    }

    fn setup(save: Option<HostAction<String, ()>>) -> (EventBus, HostSlices, MountedPanel<Names>) {
        let bus = EventBus::new();
        let host = HostSlices::new(SliceSet::new());
        host.publish(SliceKey::global("names"), &vec!["alpha", "beta"]).unwrap();
        let context = PanelContext::new(CurrentScope::default(), host.subscribe(), None);
        let panel = Names {
            names: Vec::new(),
            state: ListState::new(),
            save,
        };
        let mounted = mount(panel, &bus, context);
        (bus, host, mounted)
    }

    #[tokio::test]
    async fn test_inbound_event_drives_state_and_notifies() {
        let (bus, _host, mounted) = setup(None);
        let mut tap = bus.subscribe_all();

        bus.emit(PanelEvent::new("names:select", "test", json!({ "name": "beta" })));
        bus.emit(PanelEvent::new("names:select", "test", json!({ "name": "gamma" })));
        mounted.idle().await;

        // the inbound events themselves also pass through the tap
        let mut notifications = Vec::new();
        while let Ok(event) = tap.try_recv() {
            if event.source == "names" {
                notifications.push(event);
            }
        }
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].event_type, "names:name:selected");
        assert_eq!(notifications[0].payload["name"], "beta");
        assert_eq!(mounted.view().selected_row().unwrap().key, "beta");
    }

    #[tokio::test]
    async fn test_malformed_payload_is_ignored() {
        let (bus, _host, mounted) = setup(None);
        bus.emit(PanelEvent::new("names:filter", "test", json!({ "query": 3 })));
        bus.emit(PanelEvent::new("names:filter", "test", json!({ "filter": "al" })));
        mounted.idle().await;
        assert_eq!(mounted.view().row_titles(), vec!["alpha"]);
    }

    #[tokio::test]
    async fn test_view_follows_host_slices() {
        let (_bus, host, mounted) = setup(None);
        let mut views = mounted.views();
        host.publish(SliceKey::global("names"), &vec!["gamma"]).unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if views.borrow_and_update().row_titles() == vec!["gamma"] {
                    break;
                }
                views.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_completion_emits_after_host_resolves() {
        let save = host_action(|_name: String| async { Ok(()) });
        let (bus, _host, mounted) = setup(Some(save));
        let mut tap = bus.subscribe_all();

        assert!(mounted.dispatch(NamesCommand::Save { name: "alpha".into() }));
        mounted.idle().await;

        let event = tap.try_recv().unwrap();
        assert_eq!(event.event_type, "names:name:saved");
        assert!(mounted.view().banner.is_none());
    }

    #[tokio::test]
    async fn test_failed_action_sets_banner_and_emits_nothing() {
        let save = host_action(|_name: String| async { Err(ActionError::rejected("save", "disk full")) });
        let (bus, _host, mounted) = setup(Some(save));
        let mut tap = bus.subscribe_all();

        mounted.dispatch(NamesCommand::Save { name: "alpha".into() });
        mounted.idle().await;

        assert!(tap.try_recv().is_err());
        assert_eq!(mounted.view().banner.as_deref(), Some("save failed: disk full"));
    }

    #[tokio::test]
    async fn test_unmount_releases_subscriptions() {
        let (bus, _host, mounted) = setup(None);
        assert_eq!(mounted.subscription_count(), 3);
        assert_eq!(bus.total_handlers(), 3);

        mounted.unmount();
        assert_eq!(bus.total_handlers(), 0);

        // remounting does not accumulate handlers
        let (bus, _host, first) = setup(None);
        drop(first);
        assert_eq!(bus.total_handlers(), 0);
    }

    #[test]
    fn test_invoke_refuses_duplicate_in_flight() {
        let save: HostAction<String, ()> = host_action(|_| async { Ok(()) });
        let mut state = ListState::new();
        let mut effects: Effects<Settled<()>> = Effects::new();

        assert!(invoke("names", &mut state, &mut effects, ActionKind::Add, "a", &save, "a".into(), |_| ()));
        assert!(!invoke("names", &mut state, &mut effects, ActionKind::Add, "a", &save, "a".into(), |_| ()));
        assert!(state.is_in_flight(ActionKind::Add, "a"));
        assert_eq!(effects.take_spawned().len(), 1);
    }
}
