//! Hub topic construction
//!
//! Builds the publish destinations and subscription filters the hub expects.
//! Device and module identifiers are never URL-encoded in topic strings;
//! request identifiers and status codes are plain ASCII by construction.

use crate::transport::Category;

/// Topic construction for one device (or device/module) identity
#[derive(Debug, Clone)]
pub struct TopicBuilder {
    device_id: String,
    module_id: Option<String>,
}

impl TopicBuilder {
    pub fn new(device_id: &str, module_id: Option<&str>) -> Self {
        Self {
            device_id: device_id.to_string(),
            module_id: module_id.map(str::to_string),
        }
    }

    fn base(&self) -> String {
        match &self.module_id {
            Some(module_id) => format!("devices/{}/modules/{}", self.device_id, module_id),
            None => format!("devices/{}", self.device_id),
        }
    }

    /// Publish destination for telemetry: `devices/<id>/messages/events/`
    pub fn telemetry_publish(&self) -> String {
        format!("{}/messages/events/", self.base())
    }

    /// Publish destination for a reported-property patch:
    /// `$iothub/twin/PATCH/properties/reported/?$rid=<rid>`
    pub fn reported_properties_publish(&self, request_id: &str) -> String {
        format!("$iothub/twin/PATCH/properties/reported/?$rid={request_id}")
    }

    /// Publish destination for a direct-method response:
    /// `$iothub/methods/res/<status>/?$rid=<rid>`
    pub fn method_response_publish(&self, request_id: &str, status: i32) -> String {
        format!("$iothub/methods/res/{status}/?$rid={request_id}")
    }

    /// Subscription filter for a receive category
    pub fn subscribe_filter(&self, category: Category) -> String {
        match category {
            Category::Messages => format!("{}/messages/devicebound/#", self.base()),
            Category::MethodRequests => "$iothub/methods/POST/#".to_string(),
            Category::TwinPatches => "$iothub/twin/PATCH/properties/desired/#".to_string(),
            Category::InputMessages => format!("{}/inputs/#", self.base()),
        }
    }
}
