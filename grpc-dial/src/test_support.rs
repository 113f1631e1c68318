//! Scripted connectors and log capture for unit tests.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use http::Uri;
use tonic::transport::{Channel, Endpoint};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use crate::error::BoxError;
use crate::transport::{Connector, TransportSettings};

// ============================================================================
// Scripted connector
// ============================================================================

/// What a [`ScriptedConnector`] does on each attempt.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Script {
    /// Succeed after the delay with a lazy channel.
    ReadyAfter(Duration),
    /// Never complete.
    Never,
    /// Fail immediately.
    Refuse(&'static str),
}

#[derive(Debug, Default)]
struct Journal {
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    last_target: Mutex<Option<Uri>>,
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
    journal: Arc<Journal>,
}

impl ScriptedConnector {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            journal: Arc::default(),
        }
    }

    pub(crate) fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub(crate) fn attempts(&self) -> usize {
        self.journal.attempts.load(Ordering::SeqCst)
    }

    /// Attempts started but neither finished nor dropped.
    pub(crate) fn in_flight(&self) -> usize {
        self.journal.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn last_target(&self) -> Option<Uri> {
        self.journal.last_target.lock().unwrap().clone()
    }
}

struct InFlight(Arc<Journal>);

impl InFlight {
    fn enter(journal: &Arc<Journal>) -> Self {
        journal.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(journal.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Connector for ScriptedConnector {
    fn connect<'a>(
        &'a self,
        target: &'a Uri,
        _settings: &'a TransportSettings,
        _budget: Duration,
    ) -> BoxFuture<'a, Result<Channel, BoxError>> {
        self.journal.attempts.fetch_add(1, Ordering::SeqCst);
        *self.journal.last_target.lock().unwrap() = Some(target.clone());
        let script = *self.script.lock().unwrap();
        let guard = InFlight::enter(&self.journal);

        Box::pin(async move {
            let _guard = guard;
            match script {
                Script::ReadyAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(Endpoint::from_static("http://127.0.0.1:1").connect_lazy())
                }
                Script::Never => futures::future::pending().await,
                Script::Refuse(reason) => Err(BoxError::from(reason)),
            }
        })
    }
}

// ============================================================================
// Log capture
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct CapturedEvent {
    pub(crate) level: Level,
    pub(crate) message: String,
    pub(crate) fields: Vec<(String, String)>,
}

impl CapturedEvent {
    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Records every event dispatched on the current thread while installed.
pub(crate) struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    _guard: DefaultGuard,
}

impl LogCapture {
    pub(crate) fn install() -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(CaptureLayer {
            events: events.clone(),
        });
        let guard = tracing::subscriber::set_default(subscriber);
        Self {
            events,
            _guard: guard,
        }
    }

    pub(crate) fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events at `level` or more severe.
    pub(crate) fn at_or_above(&self, level: Level) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.level <= level)
            .collect()
    }
}

struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push((field.name().to_string(), format!("{value:?}")));
        }
    }
}
