use super::RecordMapper;
use crate::app::LogShipper;
use crate::domain::{CallerFrame, CauseInfo, Level, LogRecord};
use crate::sender::DeliveryClient;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Events from these targets are never shipped. Shipping them would feed the
/// worker's own diagnostics (and its HTTP stack's) back into the queue.
const EXCLUDED_TARGETS: [&str; 6] = [
    "rask_log_batcher",
    "hyper",
    "hyper_util",
    "reqwest",
    "h2",
    "rustls",
];

/// Field holding comma-separated marker names.
const MARKER_FIELD: &str = "marker";

fn is_excluded(target: &str) -> bool {
    EXCLUDED_TARGETS.iter().any(|excluded| {
        target
            .strip_prefix(excluded)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

#[derive(Default)]
struct RecordVisitor {
    message: Option<String>,
    properties: Vec<(String, String)>,
    markers: Vec<String>,
    cause: Option<CauseInfo>,
}

impl RecordVisitor {
    fn record_value(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            MARKER_FIELD => self.markers.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string),
            ),
            name => self.properties.push((name.to_string(), value)),
        }
    }
}

impl Visit for RecordVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_value(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_value(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_value(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record_value(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if self.cause.is_none() {
            self.cause = Some(CauseInfo::from_error(value));
        }
        self.record_value(field, value.to_string());
    }
}

/// Maps a `tracing` event: message field to message, target to logger name,
/// the first recorded error to the cause chain, every other field to a
/// context property.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventMapper;

impl<'a> RecordMapper<Event<'a>> for EventMapper {
    fn map(&self, event: &Event<'a>) -> LogRecord {
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        let thread = std::thread::current();
        let thread_name = match thread.name() {
            Some(name) => name.to_string(),
            None => format!("{:?}", thread.id()),
        };

        let mut builder = LogRecord::builder(visitor.message.unwrap_or_default())
            .level(Level::from(metadata.level()))
            .logger_name(metadata.target())
            .thread_name(thread_name)
            .caller_frame(CallerFrame {
                class_name: metadata.module_path().map(str::to_string),
                method_name: None,
                file_name: metadata.file().map(str::to_string),
                line_number: metadata.line(),
            });

        for marker in visitor.markers {
            builder = builder.marker(marker);
        }
        for (key, value) in visitor.properties {
            builder = builder.context_property(key, value);
        }
        if let Some(cause) = visitor.cause {
            builder = builder.cause(cause);
        }

        builder.build()
    }
}

/// `tracing_subscriber` layer appending every event to a [`LogShipper`].
///
/// ```ignore
/// tracing_subscriber::registry()
///     .with(ShipperLayer::new(shipper.clone()))
///     .init();
/// ```
pub struct ShipperLayer<C: DeliveryClient> {
    shipper: Arc<LogShipper<C>>,
    mapper: EventMapper,
}

impl<C: DeliveryClient> ShipperLayer<C> {
    pub fn new(shipper: Arc<LogShipper<C>>) -> Self {
        Self {
            shipper,
            mapper: EventMapper,
        }
    }
}

impl<S, C> Layer<S> for ShipperLayer<C>
where
    S: Subscriber,
    C: DeliveryClient,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if is_excluded(event.metadata().target()) {
            return;
        }
        self.shipper.append(self.mapper.map(event));
    }
}
