//! Host event adapter
//!
//! Turns host notifications into calls on the public store operations:
//! device deletion, plain sample writes and boolean edge expansion. Nothing
//! here touches SQL directly.

use crate::error::{ChartsError, Result};
use crate::retention::DeviceDeletion;
use crate::store::ChartStore;
use crate::types::{DeviceSchema, MeasurementValue, Sample};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEVICE_DELETE_EVENT: &str = "system.device.delete";

/// Notification published by the host event bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEvent {
    /// Dotted `module.type.action` name
    pub event: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl HostEvent {
    pub fn new(event: impl Into<String>, device_id: Option<&str>, params: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            device_id: device_id.map(str::to_string),
            params,
        }
    }
}

/// Extracts chart values from an event's params
///
/// Returns `None` when the event produces nothing worth charting.
pub trait ChartValuesProvider: Send + Sync {
    fn chart_values(&self, event: &str, params: &serde_json::Value) -> Option<serde_json::Value>;
}

/// Reads `params.values` as a list of `{field, value}` objects
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonChartValues;

impl ChartValuesProvider for JsonChartValues {
    fn chart_values(&self, _event: &str, params: &serde_json::Value) -> Option<serde_json::Value> {
        params.get("values").filter(|v| !v.is_null()).cloned()
    }
}

/// Parse raw chart values into samples
pub fn parse_samples(values: &serde_json::Value) -> Result<Vec<Sample>> {
    match values {
        serde_json::Value::Null => Err(ChartsError::missing("values")),
        serde_json::Value::Array(_) => {
            let samples = Vec::<Sample>::deserialize(values)
                .map_err(|e| ChartsError::invalid("values", e.to_string()))?;
            if let Some(unnamed) = samples.iter().find(|s| s.field.is_empty()) {
                return Err(ChartsError::invalid(
                    "values",
                    format!("entry {:?} has no field name", unnamed),
                ));
            }
            Ok(samples)
        }
        other => Err(ChartsError::invalid("values", format!("expected a list, got {}", other))),
    }
}

/// What the dispatcher did with one event
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Ignored,
    DeviceDeleted(DeviceDeletion),
    Written(DeviceSchema),
    /// Single boolean stored as an opposite/actual pair
    EdgeWritten(DeviceSchema),
}

pub struct EventDispatcher {
    store: Arc<ChartStore>,
    provider: Box<dyn ChartValuesProvider>,
}

impl EventDispatcher {
    pub fn new(store: Arc<ChartStore>) -> Self {
        Self::with_provider(store, JsonChartValues)
    }

    pub fn with_provider(store: Arc<ChartStore>, provider: impl ChartValuesProvider + 'static) -> Self {
        Self {
            store,
            provider: Box::new(provider),
        }
    }

    pub fn store(&self) -> &Arc<ChartStore> {
        &self.store
    }

    pub fn handle(&self, event: &HostEvent) -> Result<DispatchOutcome> {
        log::trace!("Event received {:?}", event);

        let device_id = match event.device_id.as_deref().filter(|id| !id.is_empty()) {
            Some(device_id) => device_id,
            None => return Ok(DispatchOutcome::Ignored),
        };

        if event.event == DEVICE_DELETE_EVENT {
            let deletion = self.store.delete_device(device_id)?;
            return Ok(DispatchOutcome::DeviceDeleted(deletion));
        }

        let values = match self.provider.chart_values(&event.event, &event.params) {
            Some(values) => values,
            None => {
                log::debug!("No chart values for event \"{}\"", event.event);
                return Ok(DispatchOutcome::Ignored);
            }
        };
        if !values.as_array().is_some_and(|items| !items.is_empty()) {
            log::debug!("Invalid chart values for event \"{}\": {}", event.event, values);
            return Ok(DispatchOutcome::Ignored);
        }

        let samples = parse_samples(&values)?;
        match samples.as_slice() {
            [Sample {
                field,
                value: MeasurementValue::Bool(current),
            }] => {
                let now = chrono::Utc::now().timestamp();
                let before = [Sample::new(field.clone(), !*current)];
                self.store.write_at(device_id, &event.event, &before, now - 1)?;
                let schema = self.store.write_at(device_id, &event.event, &samples, now)?;
                Ok(DispatchOutcome::EdgeWritten(schema))
            }
            _ => {
                let schema = self.store.write(device_id, &event.event, &samples)?;
                Ok(DispatchOutcome::Written(schema))
            }
        }
    }
}
