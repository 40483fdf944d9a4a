use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::BitOr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error};

use crate::snapshot::EnvironmentSnapshot;

/// Capability set a plugin declares once at registration. The registry
/// records membership at construction and never re-checks it per call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    additional_data: bool,
    detection_notice: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        additional_data: false,
        detection_notice: false,
    };
    /// The plugin contributes extra environment facts during a detection pass.
    pub const ADDITIONAL_DATA: Capabilities = Capabilities {
        additional_data: true,
        detection_notice: false,
    };
    /// The plugin wants the full snapshot after each detection pass.
    pub const DETECTION_NOTICE: Capabilities = Capabilities {
        additional_data: false,
        detection_notice: true,
    };
    pub const ALL: Capabilities = Capabilities {
        additional_data: true,
        detection_notice: true,
    };

    pub fn provides_additional_data(self) -> bool {
        self.additional_data
    }

    pub fn wants_detection_notice(self) -> bool {
        self.detection_notice
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities {
            additional_data: self.additional_data || rhs.additional_data,
            detection_notice: self.detection_notice || rhs.detection_notice,
        }
    }
}

/// An externally supplied environment plugin. The detector receives a fixed,
/// ordered collection of these at construction; discovery and loading happen
/// elsewhere. A failing plugin never blocks the others.
pub trait EnvironmentPlugin: Send + Sync {
    /// Stable identifier, unique per instance; used as the snapshot key and
    /// in failure logs.
    fn identifier(&self) -> &str;

    /// Declared capability membership, read once when the registry is built.
    fn capabilities(&self) -> Capabilities;

    /// Extra facts to record under this plugin's identifier. Only a
    /// non-empty JSON object contributes; `None`, empty objects and
    /// non-object values are silently omitted.
    fn additional_environment(&self) -> Option<Value> {
        None
    }

    /// Called with the full snapshot after a detection pass, independent of
    /// whether this plugin contributed data to it.
    fn on_environment_detected(&self, _snapshot: &EnvironmentSnapshot) {}
}

struct Entry {
    plugin: Box<dyn EnvironmentPlugin>,
    capabilities: Capabilities,
}

/// Fixed-at-construction plugin collection with capability membership
/// resolved up front. Iteration order is registration order; plugins must
/// not depend on it.
pub(crate) struct PluginRegistry {
    entries: Vec<Entry>,
}

impl PluginRegistry {
    pub(crate) fn new(plugins: Vec<Box<dyn EnvironmentPlugin>>) -> Self {
        let entries = plugins
            .into_iter()
            .map(|plugin| {
                let capabilities = plugin.capabilities();
                debug!(
                    plugin = plugin.identifier(),
                    ?capabilities,
                    "registered environment plugin"
                );
                Entry {
                    plugin,
                    capabilities,
                }
            })
            .collect();
        Self { entries }
    }

    /// Gather contributions from every data-capable plugin. A panicking
    /// plugin is logged under its identifier and skipped.
    pub(crate) fn collect(&self) -> BTreeMap<String, serde_json::Map<String, Value>> {
        let mut result = BTreeMap::new();
        for entry in self.data_providers() {
            let id = entry.plugin.identifier().to_string();
            match catch_unwind(AssertUnwindSafe(|| entry.plugin.additional_environment())) {
                Ok(Some(Value::Object(facts))) if !facts.is_empty() => {
                    result.insert(id, facts);
                }
                Ok(_) => {}
                Err(_) => {
                    error!(
                        plugin = %id,
                        "error while fetching additional environment data from plugin"
                    );
                }
            }
        }
        result
    }

    /// Deliver the snapshot to every notice-capable plugin. A panicking
    /// plugin is logged under its identifier; delivery continues.
    pub(crate) fn notify(&self, snapshot: &EnvironmentSnapshot) {
        for entry in self.notice_listeners() {
            let id = entry.plugin.identifier();
            let delivery =
                catch_unwind(AssertUnwindSafe(|| entry.plugin.on_environment_detected(snapshot)));
            if delivery.is_err() {
                error!(
                    plugin = %id,
                    "error while sending environment detection result to plugin"
                );
            }
        }
    }

    fn data_providers(&self) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter(|entry| entry.capabilities.provides_additional_data())
    }

    fn notice_listeners(&self) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter(|entry| entry.capabilities.wants_detection_notice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FactsPlugin {
        id: &'static str,
        facts: Option<Value>,
        calls: Arc<AtomicUsize>,
    }

    impl FactsPlugin {
        fn new(id: &'static str, facts: Option<Value>) -> Self {
            Self {
                id,
                facts,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl EnvironmentPlugin for FactsPlugin {
        fn identifier(&self) -> &str {
            self.id
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::ADDITIONAL_DATA
        }

        fn additional_environment(&self) -> Option<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.facts.clone()
        }
    }

    struct PanickingPlugin;

    impl EnvironmentPlugin for PanickingPlugin {
        fn identifier(&self) -> &str {
            "broken"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::ALL
        }

        fn additional_environment(&self) -> Option<Value> {
            panic!("plugin detection failure");
        }

        fn on_environment_detected(&self, _snapshot: &EnvironmentSnapshot) {
            panic!("plugin notification failure");
        }
    }

    #[test]
    fn capability_flags_combine() {
        let combined = Capabilities::ADDITIONAL_DATA | Capabilities::DETECTION_NOTICE;
        assert_eq!(combined, Capabilities::ALL);
        assert!(combined.provides_additional_data());
        assert!(combined.wants_detection_notice());
        assert!(!Capabilities::NONE.provides_additional_data());
    }

    #[test]
    fn collect_skips_empty_none_and_non_object_contributions() {
        let registry = PluginRegistry::new(vec![
            Box::new(FactsPlugin::new("empty", Some(json!({})))),
            Box::new(FactsPlugin::new("none", None)),
            Box::new(FactsPlugin::new("scalar", Some(json!(42)))),
            Box::new(FactsPlugin::new("list", Some(json!(["a", "b"])))),
            Box::new(FactsPlugin::new("good", Some(json!({"key": "value"})))),
        ]);

        let collected = registry.collect();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected["good"]["key"], json!("value"));
    }

    #[test]
    fn collect_survives_panicking_plugin() {
        let registry = PluginRegistry::new(vec![
            Box::new(PanickingPlugin),
            Box::new(FactsPlugin::new("good", Some(json!({"key": "value"})))),
        ]);

        let collected = registry.collect();
        assert_eq!(collected.len(), 1);
        assert!(collected.contains_key("good"));
        assert!(!collected.contains_key("broken"));
    }

    #[test]
    fn collect_respects_capability_membership() {
        struct UndeclaredPlugin {
            calls: Arc<AtomicUsize>,
        }

        impl EnvironmentPlugin for UndeclaredPlugin {
            fn identifier(&self) -> &str {
                "undeclared"
            }

            fn capabilities(&self) -> Capabilities {
                Capabilities::DETECTION_NOTICE
            }

            fn additional_environment(&self) -> Option<Value> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Some(json!({"never": "collected"}))
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let registry = PluginRegistry::new(vec![Box::new(UndeclaredPlugin {
            calls: calls.clone(),
        })]);

        assert!(registry.collect().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn notify_survives_panicking_plugin() {
        struct RecordingPlugin {
            deliveries: Arc<AtomicUsize>,
        }

        impl EnvironmentPlugin for RecordingPlugin {
            fn identifier(&self) -> &str {
                "recorder"
            }

            fn capabilities(&self) -> Capabilities {
                Capabilities::DETECTION_NOTICE
            }

            fn on_environment_detected(&self, _snapshot: &EnvironmentSnapshot) {
                self.deliveries.fetch_add(1, Ordering::SeqCst);
            }
        }

        let deliveries = Arc::new(AtomicUsize::new(0));
        let registry = PluginRegistry::new(vec![
            Box::new(PanickingPlugin),
            Box::new(RecordingPlugin {
                deliveries: deliveries.clone(),
            }),
        ]);

        registry.notify(&EnvironmentSnapshot::default());
        assert_eq!(deliveries.load(Ordering::SeqCst), 1);
    }
}
