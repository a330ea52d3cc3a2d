use crate::{InMemoryServiceRegistry, ServiceTracker};
use infrastructure_common::Properties;
use parking_lot::Mutex;
use registry_abstractions::{
    ServiceReference, ServiceRegistry, ServiceRegistryExt, ServiceTrackerCustomizer,
};
use std::sync::Arc;

trait Counter: Send + Sync {
    fn name(&self) -> &str;
}

struct NamedCounter(&'static str);

impl Counter for NamedCounter {
    fn name(&self) -> &str {
        self.0
    }
}

#[derive(Default)]
struct RecordingCustomizer {
    added: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
}

impl ServiceTrackerCustomizer<dyn Counter> for RecordingCustomizer {
    type Tracked = String;

    fn adding_service(
        &self,
        reference: &ServiceReference,
        service: Arc<dyn Counter>,
    ) -> Option<String> {
        if reference.property("ignore").is_some() {
            return None;
        }
        let name = service.name().to_string();
        self.added.lock().push(name.clone());
        Some(name)
    }

    fn removed_service(&self, _reference: &ServiceReference, tracked: String) {
        self.removed.lock().push(tracked);
    }
}

fn register(registry: &InMemoryServiceRegistry, name: &'static str, props: Properties) -> ServiceReference {
    let service: Arc<dyn Counter> = Arc::new(NamedCounter(name));
    registry.register(service, None, props)
}

#[test]
fn test_tracker_sees_existing_and_new_services() {
    let registry = Arc::new(InMemoryServiceRegistry::new());
    let customizer = Arc::new(RecordingCustomizer::default());

    register(&registry, "before", Properties::new());

    let tracker: ServiceTracker<dyn Counter, RecordingCustomizer> =
        ServiceTracker::new(registry.clone(), Arc::downgrade(&customizer));
    tracker.open();
    assert!(tracker.is_open());

    let after = register(&registry, "after", Properties::new());
    register(&registry, "skipped", Properties::new().with("ignore", true));

    assert_eq!(*customizer.added.lock(), vec!["before", "after"]);
    assert_eq!(tracker.tracking_count(), 2, "被忽略的服务不应计入");

    registry.unregister_service(after.id());
    assert_eq!(*customizer.removed.lock(), vec!["after"]);
    assert_eq!(tracker.tracking_count(), 1);
}

#[test]
fn test_close_reports_remaining_services_and_stops_listening() {
    let registry = Arc::new(InMemoryServiceRegistry::new());
    let customizer = Arc::new(RecordingCustomizer::default());
    let tracker: ServiceTracker<dyn Counter, RecordingCustomizer> =
        ServiceTracker::new(registry.clone(), Arc::downgrade(&customizer));
    tracker.open();

    register(&registry, "a", Properties::new());
    tracker.close();
    tracker.close();

    assert_eq!(*customizer.removed.lock(), vec!["a"], "关闭时应回调一次 removed");
    register(&registry, "b", Properties::new());
    assert_eq!(*customizer.added.lock(), vec!["a"], "关闭后不应再跟踪新服务");
    assert_eq!(tracker.tracking_count(), 0);
}

#[test]
fn test_tracker_is_inert_after_customizer_dropped() {
    let registry = Arc::new(InMemoryServiceRegistry::new());
    let customizer = Arc::new(RecordingCustomizer::default());
    let tracker: ServiceTracker<dyn Counter, RecordingCustomizer> =
        ServiceTracker::new(registry.clone() as Arc<dyn ServiceRegistry>, Arc::downgrade(&customizer));
    tracker.open();
    drop(customizer);

    register(&registry, "late", Properties::new());
    assert_eq!(tracker.tracking_count(), 0);
}
