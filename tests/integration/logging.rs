use crate::*;

use std::io;
use std::sync::Mutex;

use listslice_core::SliceLogLevel;
use listslice_transfer::{ParcelableCodec, ParceledListSlice};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt;

/// In-memory log sink for a thread-scoped subscriber.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with every event on this thread written to the returned text.
fn captured<F: FnOnce()>(f: F) -> String {
    let sink = Captured::default();
    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let guard = subscriber.set_default();
    f();
    drop(guard);
    sink.text()
}

fn split_transfer(level: SliceLogLevel) {
    let config = SliceConfig {
        inline_count_limit: Some(2),
        log_level: level,
        ..SliceConfig::default()
    };
    let transport = LocalTransport::from_config(&config);
    let slice = ParceledListSlice::parcelables(pairs(6));
    let decoded = transfer(&slice, ParcelableCodec::new(), &transport, &config).unwrap();
    assert_eq!(decoded.len(), 6);
}

#[test]
fn test_off_level_emits_no_progress_events() {
    let text = captured(|| split_transfer(SliceLogLevel::Off));
    assert!(!text.contains("list slice"), "{text}");
    assert!(!text.contains("remainder batch"), "{text}");
}

#[test]
fn test_batches_level_logs_messages_not_elements() {
    let text = captured(|| split_transfer(SliceLogLevel::Batches));
    assert!(text.contains("list slice written with remainder"), "{text}");
    assert!(text.contains("remainder batch served"), "{text}");
    assert!(text.contains("list slice read"), "{text}");
    assert!(!text.contains("element inlined"), "{text}");
}

#[test]
fn test_elements_level_logs_each_element() {
    let text = captured(|| split_transfer(SliceLogLevel::Elements));
    assert_eq!(text.matches("element inlined").count(), 2, "{text}");
    assert_eq!(text.matches("element read").count(), 6, "{text}");
}

/// Refusals are reported whatever the caller's level.
#[test]
fn test_failures_are_logged_at_off_level() {
    let text = captured(|| {
        let config = SliceConfig::default();
        assert_eq!(config.log_level, SliceLogLevel::Off);
        let transport = LocalTransport::from_config(&config);
        let mixed = ParceledListSlice::parcelables(vec![
            Record::Pair { a: 0, b: 0 },
            Record::Quint { values: [0; 5] },
        ]);
        let mut parcel = Parcel::new();
        assert!(mixed.write_to_parcel(&mut parcel, &transport, &config).is_err());
    });
    assert!(text.contains("refusing heterogeneous list"), "{text}");
    assert!(text.contains("WARN"), "{text}");
}
